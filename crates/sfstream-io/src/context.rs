//! Host-wide services every stream needs.

use sfstream_core::{AnchorRegistry, FormatRegistry, LogicalClock};
use std::sync::Arc;

/// Clock, header formats and time anchors shared by all streams of a host.
#[derive(Clone)]
pub struct StreamContext {
    pub clock: Arc<dyn LogicalClock>,
    pub formats: Arc<FormatRegistry>,
    pub anchors: Arc<AnchorRegistry>,
}

impl StreamContext {
    /// Context with the built-in header formats and an empty anchor registry.
    pub fn new(clock: Arc<dyn LogicalClock>) -> Self {
        Self {
            anchors: Arc::new(AnchorRegistry::new(Arc::clone(&clock))),
            formats: Arc::new(FormatRegistry::with_defaults()),
            clock,
        }
    }

    pub fn with_formats(mut self, formats: FormatRegistry) -> Self {
        self.formats = Arc::new(formats);
        self
    }
}

impl std::fmt::Debug for StreamContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamContext")
            .field("now", &self.clock.now())
            .field("formats", &self.formats)
            .field("anchors", &self.anchors)
            .finish()
    }
}
