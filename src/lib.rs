//! # sfstream - Real-time Sound File Streaming
//!
//! Streams audio between sound files and a real-time processing graph in
//! both directions without blocking the audio thread on disk I/O.
//!
//! ## Architecture
//!
//! sfstream is an umbrella crate over:
//! - **sfstream-core** - Sample codec, frame time codes, time anchors, WAV header format
//! - **sfstream-io** - Worker-thread streams: `ReadStream` (looped, scheduled playback)
//!   and `WriteStream` (scheduled, threshold or retroactive recording)
//!
//! ## Quick Start
//!
//! ```ignore
//! use sfstream::prelude::*;
//! use std::sync::Arc;
//!
//! let clock = Arc::new(BlockClock::new());
//! let ctx = StreamContext::new(clock.clone());
//!
//! let mut player = ReadStream::new(2, StreamConfig::default(), ctx.clone())?;
//! player.open("drums.wav", ReadOptions::default())?;
//! player.set_loop_length(LoopLength::WholeFile)?;
//! player.start(StartAt::Now)?;
//!
//! let mut recorder = WriteStream::new(2, 48000, StreamConfig::default(), ctx)?;
//! recorder.open("take1.wav", WriteOptions::default())?;
//! recorder.start(WriteStart::Threshold(DEFAULT_THRESHOLD))?;
//!
//! // once per block, on the audio thread
//! player.process(&mut outputs);
//! recorder.process(&inputs);
//! clock.advance(block_size);
//! ```

/// Re-export of sfstream-core for direct access
pub use sfstream_core as core;
/// Re-export of sfstream-io for direct access
pub use sfstream_io as io;

// Core types
pub use sfstream_core::{
    // Time
    AnchorRegistry,
    BlockClock,
    // Files
    CreateRequest,
    FormatRegistry,
    FrameTimeCode,
    HeaderFormat,
    HeaderInfo,
    LogicalClock,
    LoopCycles,
    OpenRequest,
    RawLayout,
    SampleLayout,
    SampleWidth,
    SoundFile,
    TimeAnchor,
    WaveFormat,
    EPOCH_SIZE,
    MAX_CHANNELS,
};

// Streams
pub use sfstream_io::{
    Error,
    IOMetrics,
    IOMetricsSnapshot,
    LoopLength,
    ReadOptions,
    ReadState,
    ReadStream,
    Result,
    StartAt,
    StopAt,
    StreamConfig,
    StreamContext,
    StreamEvent,
    StreamInfo,
    WriteOptions,
    WriteStart,
    WriteState,
    WriteStream,
    DEFAULT_THRESHOLD,
    LOCAL_ANCHOR,
};

/// Commonly used types.
pub mod prelude {
    pub use crate::{
        BlockClock, FrameTimeCode, LogicalClock, LoopLength, ReadOptions, ReadStream, StartAt,
        StopAt, StreamConfig, StreamContext, StreamEvent, WriteOptions, WriteStart, WriteStream,
        DEFAULT_THRESHOLD,
    };
}
