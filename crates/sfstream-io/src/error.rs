//! Error types.

use thiserror::Error;

/// Error type for stream control.
#[derive(Error, Debug)]
pub enum Error {
    /// Format, header, time code or anchor error.
    #[error(transparent)]
    Core(#[from] sfstream_core::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Operation needs an open file.
    #[error("{0}: no file is open")]
    NotOpen(&'static str),

    /// The worker thread stopped responding or could not be started.
    #[error("stream worker error: {0}")]
    Butler(String),
}

/// Result type.
pub type Result<T> = std::result::Result<T, Error>;
