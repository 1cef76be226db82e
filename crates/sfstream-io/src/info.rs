//! Point-in-time description of a stream, for diagnostics.

use sfstream_core::SoundFile;
use std::path::PathBuf;

/// Snapshot returned by `ReadStream::info` and `WriteStream::info`.
#[derive(Debug, Clone)]
pub struct StreamInfo<S> {
    pub state: S,
    /// File requested by the last `open`.
    pub path: Option<PathBuf>,
    /// Descriptor published by the worker, once the file is open.
    pub sound_file: Option<SoundFile>,
    /// Name of the bound time anchor, `None` for stream-local time.
    pub anchor: Option<String>,
    pub buffered_bytes: usize,
    pub buffer_bytes: usize,
}
