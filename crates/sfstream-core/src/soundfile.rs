//! Sound file descriptor and open/create helpers.

use crate::error::{Error, Result};
use crate::format::{FormatRegistry, HeaderFormat, HeaderInfo};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Most channels a stream can carry.
pub const MAX_CHANNELS: usize = 64;

/// On-disk sample encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SampleWidth {
    /// 16-bit signed integer.
    Int16,
    /// 24-bit signed integer, packed.
    Int24,
    /// 32-bit IEEE float.
    Float32,
    /// 64-bit IEEE float.
    Float64,
}

impl SampleWidth {
    /// Width from a bytes-per-sample count.
    pub fn from_bytes(bytes: usize) -> Result<Self> {
        match bytes {
            2 => Ok(Self::Int16),
            3 => Ok(Self::Int24),
            4 => Ok(Self::Float32),
            8 => Ok(Self::Float64),
            _ => Err(Error::UnsupportedSampleFormat),
        }
    }

    #[inline]
    pub fn bytes(self) -> usize {
        match self {
            Self::Int16 => 2,
            Self::Int24 => 3,
            Self::Float32 => 4,
            Self::Float64 => 8,
        }
    }

    pub fn bits(self) -> u16 {
        self.bytes() as u16 * 8
    }

    pub fn is_float(self) -> bool {
        matches!(self, Self::Float32 | Self::Float64)
    }
}

/// Interleaved frame layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleLayout {
    pub channels: usize,
    pub width: SampleWidth,
    pub big_endian: bool,
}

impl SampleLayout {
    pub fn new(channels: usize, width: SampleWidth, big_endian: bool) -> Result<Self> {
        if channels == 0 || channels > MAX_CHANNELS {
            return Err(Error::InvalidChannelCount(channels));
        }
        Ok(Self {
            channels,
            width,
            big_endian,
        })
    }

    #[inline]
    pub fn bytes_per_frame(&self) -> usize {
        self.channels * self.width.bytes()
    }
}

/// Descriptor of an open sound file.
///
/// The file handle is not part of the descriptor: it belongs to whichever
/// thread performs the I/O, and the descriptor is cloned between threads.
#[derive(Clone)]
pub struct SoundFile {
    /// Header format, `None` for headerless (raw) files.
    pub format: Option<Arc<dyn HeaderFormat>>,
    pub layout: SampleLayout,
    pub sample_rate: u32,
    /// Bytes before the first sample frame.
    pub header_size: u64,
    /// Sample bytes remaining after any skipped onset.
    pub byte_limit: u64,
}

impl SoundFile {
    pub fn from_header(format: Arc<dyn HeaderFormat>, info: HeaderInfo) -> Self {
        Self {
            format: Some(format),
            layout: info.layout,
            sample_rate: info.sample_rate,
            header_size: info.header_size,
            byte_limit: info.data_bytes,
        }
    }

    #[inline]
    pub fn bytes_per_frame(&self) -> usize {
        self.layout.bytes_per_frame()
    }

    pub fn channels(&self) -> usize {
        self.layout.channels
    }

    /// Whole frames available.
    pub fn frames(&self) -> u64 {
        self.byte_limit / self.bytes_per_frame() as u64
    }

    pub fn format_name(&self) -> &'static str {
        self.format.as_ref().map_or("raw", |format| format.name())
    }

    /// Skip `frames` at the start of the data, returning the byte offset of
    /// the first remaining frame relative to the file start.
    pub fn skip_frames(&mut self, frames: u64) -> u64 {
        let skip = frames.saturating_mul(self.bytes_per_frame() as u64);
        self.byte_limit = self.byte_limit.saturating_sub(skip);
        self.header_size + skip
    }
}

impl fmt::Debug for SoundFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoundFile")
            .field("format", &self.format_name())
            .field("layout", &self.layout)
            .field("sample_rate", &self.sample_rate)
            .field("header_size", &self.header_size)
            .field("byte_limit", &self.byte_limit)
            .finish()
    }
}

/// Caller-supplied layout for a file with no recognizable header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawLayout {
    pub header_size: u64,
    pub layout: SampleLayout,
    pub sample_rate: u32,
}

/// How to open a file for reading.
#[derive(Debug, Clone, Default)]
pub struct OpenRequest {
    /// Frames to skip at the start of the data.
    pub onset: u64,
    /// Bypass header detection.
    pub raw: Option<RawLayout>,
    /// Force a header format by name instead of sniffing.
    pub format: Option<String>,
}

/// How to create a file for writing.
#[derive(Debug, Clone)]
pub struct CreateRequest {
    pub channels: usize,
    pub width: SampleWidth,
    pub sample_rate: u32,
    /// Requested byte order; the format has the final word.
    pub big_endian: Option<bool>,
    /// Header format by name, otherwise chosen from the extension.
    pub format: Option<String>,
    /// Frame count written into the initial header.
    pub frames_hint: u64,
}

/// Open `path`, parse or override its header, and position the handle on
/// the first frame after `request.onset`.
pub fn open_soundfile(
    formats: &FormatRegistry,
    path: &Path,
    request: &OpenRequest,
) -> Result<(File, SoundFile)> {
    let mut file = File::open(path)?;

    let mut sf = match request.raw {
        Some(raw) => {
            let file_len = file.metadata()?.len();
            SoundFile {
                format: None,
                layout: raw.layout,
                sample_rate: raw.sample_rate,
                header_size: raw.header_size,
                byte_limit: file_len.saturating_sub(raw.header_size),
            }
        }
        None => {
            let format = match &request.format {
                Some(name) => formats.by_name(name)?,
                None => {
                    let mut prefix = Vec::with_capacity(formats.min_header_size());
                    (&mut file)
                        .take(formats.min_header_size() as u64)
                        .read_to_end(&mut prefix)?;
                    formats
                        .detect(&prefix)
                        .ok_or(Error::UnrecognizedFormat)?
                }
            };
            file.seek(SeekFrom::Start(0))?;
            let info = format.read_header(&mut file)?;
            SoundFile::from_header(format, info)
        }
    };

    let first_frame = sf.skip_frames(request.onset);
    file.seek(SeekFrom::Start(first_frame))?;

    tracing::debug!(
        path = %path.display(),
        format = sf.format_name(),
        channels = sf.channels(),
        bytes_per_sample = sf.layout.width.bytes(),
        sample_rate = sf.sample_rate,
        frames = sf.frames(),
        "opened sound file"
    );
    Ok((file, sf))
}

/// Create a file and write its initial header.
///
/// The format's extension is appended when `path` lacks it; the path
/// actually created is returned alongside the handle.
pub fn create_soundfile(
    formats: &FormatRegistry,
    path: &Path,
    request: &CreateRequest,
) -> Result<(File, SoundFile, PathBuf)> {
    let format = match &request.format {
        Some(name) => formats.by_name(name)?,
        None => formats
            .for_path(path)
            .or_else(|| formats.default_format())
            .ok_or(Error::UnrecognizedFormat)?,
    };
    let path = if format.has_extension(path) {
        path.to_path_buf()
    } else {
        format.add_extension(path)
    };

    let big_endian = format.choose_endianness(request.big_endian, request.width);
    let layout = SampleLayout::new(request.channels, request.width, big_endian)?;
    let mut sf = SoundFile {
        format: Some(Arc::clone(&format)),
        layout,
        sample_rate: request.sample_rate,
        header_size: 0,
        byte_limit: 0,
    };

    let mut file = File::create(&path)?;
    sf.header_size = format.write_header(&mut file, &sf, request.frames_hint)?;

    tracing::debug!(
        path = %path.display(),
        format = format.name(),
        channels = layout.channels,
        bytes_per_sample = layout.width.bytes(),
        "created sound file"
    );
    Ok((file, sf, path))
}

/// Rewrite the header with the final frame count and flush.
pub fn finish_soundfile(file: &mut File, sf: &SoundFile, frames: u64) -> Result<()> {
    if let Some(format) = &sf.format {
        format.update_header(file, sf, frames)?;
    }
    file.flush()?;
    Ok(())
}
