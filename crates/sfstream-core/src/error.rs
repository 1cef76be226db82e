//! Error types.

use thiserror::Error;

/// Error type.
#[derive(Error, Debug)]
pub enum Error {
    /// No registered header format recognizes the file.
    #[error("unknown header format")]
    UnrecognizedFormat,

    /// The header was recognized but its chunks are truncated or inconsistent.
    #[error("bad header format")]
    MalformedHeader,

    /// The container is a variant of a known format that is not handled (RF64, BW64).
    #[error("unsupported header format version")]
    UnsupportedHeaderVersion,

    /// Sample encoding other than 16/24-bit integer or 32/64-bit float.
    #[error("unsupported sample format")]
    UnsupportedSampleFormat,

    /// The file (or the selected loop region) holds no frames.
    #[error("sound file contains no frames")]
    EmptyFile,

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A write syscall accepted fewer bytes than requested.
    #[error("short write: {written} of {requested} bytes")]
    ShortWrite { written: usize, requested: usize },

    /// Frame time code triple with a bad sign, epoch or frame component.
    #[error("invalid frame time code: {0}")]
    InvalidTimeCode(String),

    /// Loop length must be greater than zero frames.
    #[error("loop length must be > 0 frames, got {0}")]
    InvalidLoopLength(i64),

    /// A time argument that must not be negative.
    #[error("{what} must not be negative, got {value}")]
    NegativeTime { what: &'static str, value: i64 },

    /// Channel count outside 1..=64.
    #[error("channel count {0} out of range 1..=64")]
    InvalidChannelCount(usize),

    /// No time anchor registered under this name.
    #[error("{0}: no such time anchor")]
    AnchorNotFound(String),

    /// No header format registered under this name.
    #[error("{0}: no such header format")]
    UnknownFormat(String),

    /// Option value that cannot be honored.
    #[error("invalid option: {0}")]
    InvalidOption(String),
}

/// Result type.
pub type Result<T> = std::result::Result<T, Error>;
