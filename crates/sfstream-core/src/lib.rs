//! Core types for real-time sound file streaming.
//!
//! Everything here is free of threads and shared buffers: the pieces a
//! streaming engine composes.
//!
//! - [`codec`] - raw file bytes to and from `f32` sample vectors
//! - [`ftc`] - frame time codes and loop arithmetic
//! - [`anchor`] - named logical origins shared by streams
//! - [`cycles`] - loop grid queries against an anchor
//! - [`clock`] - the logical clock the host advances per block
//! - [`format`] - header codecs and the format registry
//! - [`soundfile`] - the descriptor of an open file and open/create helpers
//!
//! ## Example
//!
//! ```ignore
//! use sfstream_core::{FrameTimeCode, ftc};
//!
//! let length = FrameTimeCode::from_frames(3 * 44100);
//! let next = ftc::loop_start(now, 0, length.to_frames(), 0, 64)?;
//! ```

pub mod anchor;
pub mod clock;
pub mod codec;
pub mod cycles;
pub mod error;
pub mod format;
pub mod ftc;
pub mod soundfile;

pub use anchor::{AnchorRegistry, TimeAnchor};
pub use clock::{BlockClock, LogicalClock};
pub use cycles::LoopCycles;
pub use error::{Error, Result};
pub use format::{FormatRegistry, HeaderFormat, HeaderInfo, WaveFormat};
pub use ftc::{FrameTimeCode, EPOCH_SIZE};
pub use soundfile::{
    CreateRequest, OpenRequest, RawLayout, SampleLayout, SampleWidth, SoundFile, MAX_CHANNELS,
};
