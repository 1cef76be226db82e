//! Time anchors: named logical origins shared between streams.
//!
//! An anchor is `t = 0` for every stream bound to it. The origin is set
//! either explicitly with [`TimeAnchor::mark`] or lazily by the first query,
//! so streams bound to the same anchor compute identical block start times.
//!
//! Anchors live in an [`AnchorRegistry`] that is created once by the host and
//! handed to every stream that needs to look one up by name.

use crate::clock::LogicalClock;
use crate::error::{Error, Result};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Named logical origin.
pub struct TimeAnchor {
    name: String,
    clock: Arc<dyn LogicalClock>,
    origin: Mutex<Option<f64>>,
    used_in_stream: AtomicBool,
}

impl TimeAnchor {
    pub fn new(name: impl Into<String>, clock: Arc<dyn LogicalClock>) -> Self {
        Self {
            name: name.into(),
            clock,
            origin: Mutex::new(None),
            used_in_stream: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set the origin to the current logical time.
    pub fn mark(&self) {
        let now = self.clock.now();
        *self.origin.lock() = Some(now);
        tracing::debug!(anchor = %self.name, origin = now, "time anchor marked");
    }

    /// Frames elapsed since the origin, rounded up.
    ///
    /// The first query on an unmarked anchor sets the origin to now.
    pub fn elapsed_frames(&self) -> u64 {
        let now = self.clock.now();
        let mut origin = self.origin.lock();
        let start = *origin.get_or_insert(now);
        (now - start).max(0.0).ceil() as u64
    }

    /// Current origin, `None` until marked or first queried.
    pub fn origin(&self) -> Option<f64> {
        *self.origin.lock()
    }

    /// Record that a stream schedules against this anchor.
    pub fn bind(&self) {
        self.used_in_stream.store(true, Ordering::Release);
    }

    pub fn is_used_in_stream(&self) -> bool {
        self.used_in_stream.load(Ordering::Acquire)
    }
}

impl fmt::Debug for TimeAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimeAnchor")
            .field("name", &self.name)
            .field("origin", &self.origin())
            .field("used_in_stream", &self.is_used_in_stream())
            .finish()
    }
}

/// Anchors by name.
pub struct AnchorRegistry {
    clock: Arc<dyn LogicalClock>,
    anchors: DashMap<String, Arc<TimeAnchor>>,
}

impl AnchorRegistry {
    pub fn new(clock: Arc<dyn LogicalClock>) -> Self {
        Self {
            clock,
            anchors: DashMap::new(),
        }
    }

    /// The clock every anchor in this registry reads.
    pub fn clock(&self) -> Arc<dyn LogicalClock> {
        Arc::clone(&self.clock)
    }

    /// Create an anchor. An existing anchor with the same name is returned as is.
    pub fn create(&self, name: &str) -> Arc<TimeAnchor> {
        let entry = self.anchors.entry(name.to_string()).or_insert_with(|| {
            tracing::debug!(anchor = name, "time anchor created");
            Arc::new(TimeAnchor::new(name, Arc::clone(&self.clock)))
        });
        Arc::clone(entry.value())
    }

    pub fn find(&self, name: &str) -> Option<Arc<TimeAnchor>> {
        self.anchors.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Like [`find`](Self::find) but an error when missing.
    pub fn get(&self, name: &str) -> Result<Arc<TimeAnchor>> {
        self.find(name)
            .ok_or_else(|| Error::AnchorNotFound(name.to_string()))
    }

    /// Drop an anchor from the registry.
    ///
    /// Streams hold weak references, so a removed anchor is not kept alive by
    /// them; they fall back to their local origin. The returned anchor tells
    /// whether any stream had bound to it.
    pub fn remove(&self, name: &str) -> Option<Arc<TimeAnchor>> {
        let (_, anchor) = self.anchors.remove(name)?;
        if anchor.is_used_in_stream() {
            tracing::info!(anchor = name, "time anchor removed while streams depend on it");
        }
        Some(anchor)
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }
}

impl fmt::Debug for AnchorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnchorRegistry")
            .field("anchors", &self.anchors.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::BlockClock;

    fn registry() -> (Arc<BlockClock>, AnchorRegistry) {
        let clock = Arc::new(BlockClock::new());
        let registry = AnchorRegistry::new(clock.clone());
        (clock, registry)
    }

    #[test]
    fn test_lazy_origin() {
        let (clock, registry) = registry();
        clock.advance(500);
        let anchor = registry.create("a");
        assert!(anchor.origin().is_none());
        assert_eq!(anchor.elapsed_frames(), 0);
        assert_eq!(anchor.origin(), Some(500.0));
        clock.advance(64);
        assert_eq!(anchor.elapsed_frames(), 64);
    }

    #[test]
    fn test_mark_resets_origin() {
        let (clock, registry) = registry();
        let anchor = registry.create("a");
        clock.advance(100);
        assert_eq!(anchor.elapsed_frames(), 0);
        clock.advance(100);
        anchor.mark();
        clock.advance(10);
        assert_eq!(anchor.elapsed_frames(), 10);
    }

    #[test]
    fn test_elapsed_rounds_up() {
        let (clock, registry) = registry();
        let anchor = registry.create("a");
        anchor.mark();
        clock.advance(1);
        assert_eq!(anchor.elapsed_frames(), 1);
        let fractional = TimeAnchor::new("f", Arc::new(BlockClock::starting_at(0.25)));
        *fractional.origin.lock() = Some(0.0);
        assert_eq!(fractional.elapsed_frames(), 1);
    }

    #[test]
    fn test_shared_by_name() {
        let (_clock, registry) = registry();
        let first = registry.create("sync");
        let again = registry.create("sync");
        assert!(Arc::ptr_eq(&first, &again));
        assert!(Arc::ptr_eq(&first, &registry.find("sync").unwrap()));
        assert!(registry.get("missing").is_err());
    }

    #[test]
    fn test_remove_reports_binding() {
        let (_clock, registry) = registry();
        registry.create("idle");
        registry.create("bound").bind();
        assert!(!registry.remove("idle").unwrap().is_used_in_stream());
        assert!(registry.remove("bound").unwrap().is_used_in_stream());
        assert!(registry.remove("bound").is_none());
        assert!(registry.is_empty());
    }
}
