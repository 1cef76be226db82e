//! Header formats.
//!
//! A [`HeaderFormat`] knows how to recognize, parse, write and finalize one
//! container header. Formats are collected in a [`FormatRegistry`] that the
//! host builds once and hands to every stream.

mod registry;
mod wave;

pub use registry::FormatRegistry;
pub use wave::WaveFormat;

use crate::error::Result;
use crate::soundfile::{SampleLayout, SampleWidth, SoundFile};
use std::io::{Read, Seek, Write};
use std::path::{Path, PathBuf};

/// Readable and seekable byte source.
pub trait ReadSeek: Read + Seek {}
impl<T: Read + Seek> ReadSeek for T {}

/// Writable and seekable byte sink.
pub trait WriteSeek: Write + Seek {}
impl<T: Write + Seek> WriteSeek for T {}

/// What a parsed header says about the sample data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderInfo {
    pub layout: SampleLayout,
    pub sample_rate: u32,
    /// Offset of the first sample byte.
    pub header_size: u64,
    /// Length of the sample data in bytes.
    pub data_bytes: u64,
}

/// Container header codec.
pub trait HeaderFormat: Send + Sync {
    /// Short name used to select the format explicitly.
    fn name(&self) -> &'static str;

    /// Bytes needed by [`is_header`](Self::is_header).
    fn min_header_size(&self) -> usize;

    fn is_header(&self, bytes: &[u8]) -> bool;

    /// Parse the header of a source positioned anywhere; it is read from the start.
    fn read_header(&self, reader: &mut dyn ReadSeek) -> Result<HeaderInfo>;

    /// Write a header for `frames_hint` frames at the current position,
    /// returning the header size.
    fn write_header(&self, writer: &mut dyn WriteSeek, sf: &SoundFile, frames_hint: u64)
        -> Result<u64>;

    /// Patch the size fields once the true frame count is known.
    fn update_header(&self, writer: &mut dyn WriteSeek, sf: &SoundFile, frames: u64) -> Result<()>;

    fn has_extension(&self, path: &Path) -> bool;

    fn add_extension(&self, path: &Path) -> PathBuf;

    /// Byte order to write given the caller's request (`None` for no preference).
    fn choose_endianness(&self, requested: Option<bool>, width: SampleWidth) -> bool;
}
