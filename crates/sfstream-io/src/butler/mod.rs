//! Worker-thread disk I/O for sound file streams.

mod config;
mod fifo;
mod metrics;
mod read;
mod request;
mod shared_state;
mod thread;
mod write;

pub use config::{StreamConfig, IO_CHUNK_BYTES};
pub use fifo::Fifo;
pub use metrics::{IOMetrics, IOMetricsSnapshot};
pub use read::LoopLength;

pub(crate) use read::{ReadParams, ReadTransfer};
pub(crate) use request::Request;
pub(crate) use thread::Engine;
pub(crate) use write::{request_close, WriteParams, WriteTransfer};
