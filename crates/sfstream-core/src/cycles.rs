//! Loop cycle queries against a named anchor.

use crate::anchor::AnchorRegistry;
use crate::error::{Error, Result};
use crate::ftc::{self, FrameTimeCode};

/// Loop grid bound to a time anchor by name.
///
/// The anchor is resolved on every query, so a grid can be configured before
/// the anchor exists.
#[derive(Debug, Clone)]
pub struct LoopCycles {
    anchor: String,
    loop_length: i64,
    offset: i64,
    safety: i64,
}

impl LoopCycles {
    pub fn new(anchor: impl Into<String>, loop_length: FrameTimeCode) -> Result<Self> {
        let loop_length = loop_length.to_frames();
        if loop_length < 0 {
            return Err(Error::InvalidLoopLength(loop_length));
        }
        Ok(Self {
            anchor: anchor.into(),
            loop_length,
            offset: 0,
            safety: 0,
        })
    }

    pub fn set_loop_length(&mut self, loop_length: FrameTimeCode) -> Result<()> {
        let frames = loop_length.to_frames();
        if frames < 0 {
            return Err(Error::InvalidLoopLength(frames));
        }
        self.loop_length = frames;
        Ok(())
    }

    pub fn set_offset(&mut self, offset: FrameTimeCode) {
        self.offset = offset.to_frames();
    }

    /// Constant margin added to every computed start.
    pub fn set_safety(&mut self, frames: i64) {
        self.safety = frames;
    }

    pub fn loop_length(&self) -> FrameTimeCode {
        FrameTimeCode::from_frames(self.loop_length)
    }

    /// Next loop boundary after the anchor's current time, `extra_loops` later.
    pub fn next_start(&self, anchors: &AnchorRegistry, extra_loops: i64) -> Result<FrameTimeCode> {
        if self.anchor.is_empty() {
            return Err(Error::InvalidOption(
                "loop cycles need a time anchor name".into(),
            ));
        }
        let now = anchors.get(&self.anchor)?.elapsed_frames() as i64;
        self.next_start_at(now, extra_loops)
    }

    /// Next loop boundary after an explicit time.
    pub fn next_start_at(&self, now: i64, extra_loops: i64) -> Result<FrameTimeCode> {
        ftc::loop_start(now, self.offset, self.loop_length, extra_loops, self.safety)
            .map(FrameTimeCode::from_frames)
    }

    /// Number of loops in `duration`, fractional.
    pub fn loop_count(&self, duration: FrameTimeCode) -> Result<f64> {
        ftc::loops_containing(duration.to_frames(), self.loop_length)
    }
}
