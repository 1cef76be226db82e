//! Logical time source shared by streams and time anchors.

use atomic_float::AtomicF64;
use std::sync::atomic::Ordering;

/// Monotonically increasing logical time, in frames.
pub trait LogicalClock: Send + Sync {
    fn now(&self) -> f64;
}

/// Clock the host advances once per processed block.
///
/// All streams driven from one audio callback should share one `BlockClock`
/// so that their block start times agree.
#[derive(Debug, Default)]
#[repr(align(64))]
pub struct BlockClock {
    frames: AtomicF64,
}

impl BlockClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start counting from `frames` instead of zero.
    pub fn starting_at(frames: f64) -> Self {
        Self {
            frames: AtomicF64::new(frames),
        }
    }

    /// Move logical time forward by one block.
    #[inline]
    pub fn advance(&self, frames: usize) {
        self.frames.fetch_add(frames as f64, Ordering::AcqRel);
    }

    #[inline]
    pub fn frames(&self) -> f64 {
        self.frames.load(Ordering::Acquire)
    }
}

impl LogicalClock for BlockClock {
    #[inline]
    fn now(&self) -> f64 {
        self.frames()
    }
}
