//! Real-time sound file streaming.
//!
//! Each stream owns one worker thread that performs all file I/O, and a ring
//! buffer shared with the audio thread under a mutex. The audio thread calls
//! `process` once per block and never waits on the disk: late data plays as
//! silence, and a full buffer drops the block being recorded.
//!
//! - [`ReadStream`] - loop a file region into output vectors, scheduled
//!   against a logical clock
//! - [`WriteStream`] - record input vectors to a new file, with scheduled,
//!   threshold-triggered or retroactive start
//! - [`StreamContext`] - the clock, header formats and time anchors the
//!   streams of one host share
//!
//! ## Example
//!
//! ```ignore
//! use sfstream_io::{ReadOptions, ReadStream, StartAt, StreamConfig, StreamContext};
//! use sfstream_core::BlockClock;
//! use std::sync::Arc;
//!
//! let clock = Arc::new(BlockClock::new());
//! let ctx = StreamContext::new(clock.clone());
//! let mut stream = ReadStream::new(2, StreamConfig::default(), ctx)?;
//! stream.open("loop.wav", ReadOptions::default())?;
//! stream.start(StartAt::Now)?;
//!
//! // in the audio callback
//! stream.process(&mut [&mut left[..], &mut right[..]]);
//! clock.advance(left.len());
//! ```

pub mod butler;
pub mod error;

mod context;
mod events;
mod info;
mod reader;
mod timebase;
mod writer;

pub use butler::{IOMetrics, IOMetricsSnapshot, LoopLength, StreamConfig};
pub use context::StreamContext;
pub use error::{Error, Result};
pub use events::StreamEvent;
pub use info::StreamInfo;
pub use reader::{ReadOptions, ReadState, ReadStream, StartAt, StopAt};
pub use timebase::LOCAL_ANCHOR;
pub use writer::{WriteOptions, WriteStart, WriteState, WriteStream, DEFAULT_THRESHOLD};
