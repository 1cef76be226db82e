//! Where a stream's `t = 0` is.
//!
//! A stream either keeps a private origin, reset whenever it is started, or
//! follows a named [`TimeAnchor`] so that several streams agree on block
//! times. Bindings are by name and re-resolved on `prepare`, so an anchor
//! created after the stream still takes effect.

use sfstream_core::{AnchorRegistry, LogicalClock, Result, TimeAnchor};
use std::sync::{Arc, Weak};

/// Name that selects the stream's private origin.
pub const LOCAL_ANCHOR: &str = "self";

pub(crate) struct Timebase {
    clock: Arc<dyn LogicalClock>,
    anchor_name: Option<String>,
    anchor: Option<Weak<TimeAnchor>>,
    local_origin: f64,
}

impl Timebase {
    pub fn new(clock: Arc<dyn LogicalClock>) -> Self {
        let local_origin = clock.now();
        Self {
            clock,
            anchor_name: None,
            anchor: None,
            local_origin,
        }
    }

    /// Follow the anchor called `name`, or the private origin for `None` or
    /// `"self"`.
    ///
    /// An unknown name is kept and retried by [`resolve`](Self::resolve);
    /// until then the private origin applies.
    pub fn bind(&mut self, anchors: &AnchorRegistry, name: Option<&str>) -> Result<()> {
        match name {
            None | Some(LOCAL_ANCHOR) => {
                self.anchor_name = None;
                self.anchor = None;
                Ok(())
            }
            Some(name) => {
                self.anchor_name = Some(name.to_owned());
                self.anchor = None;
                let anchor = anchors.get(name)?;
                anchor.bind();
                self.anchor = Some(Arc::downgrade(&anchor));
                Ok(())
            }
        }
    }

    /// Look the bound name up again.
    pub fn resolve(&mut self, anchors: &AnchorRegistry) {
        let Some(name) = self.anchor_name.as_deref() else {
            return;
        };
        match anchors.find(name) {
            Some(anchor) => {
                anchor.bind();
                self.anchor = Some(Arc::downgrade(&anchor));
            }
            None => {
                tracing::warn!(anchor = name, "time anchor not found, using stream-local time");
                self.anchor = None;
            }
        }
    }

    pub fn anchor_name(&self) -> Option<&str> {
        self.anchor_name.as_deref()
    }

    pub fn restart_local(&mut self) {
        self.local_origin = self.clock.now();
    }

    /// Logical time of the current block, in whole frames.
    pub fn block_start(&self) -> i64 {
        if let Some(anchor) = self.anchor.as_ref().and_then(Weak::upgrade) {
            return anchor.elapsed_frames() as i64;
        }
        (self.clock.now() - self.local_origin).ceil().max(0.0) as i64
    }
}
