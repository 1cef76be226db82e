//! RIFF/WAVE headers.
//!
//! Reads PCM (16/24-bit), IEEE float (32/64-bit) and WAVE_FORMAT_EXTENSIBLE
//! files carrying either of those. Writes a canonical 44-byte header. WAVE is
//! little-endian; a big-endian request is overridden.

use super::{HeaderFormat, HeaderInfo, ReadSeek, WriteSeek};
use crate::error::{Error, Result};
use crate::soundfile::{SampleLayout, SampleWidth, SoundFile, MAX_CHANNELS};
use std::ffi::OsString;
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

const FORMAT_PCM: u16 = 0x0001;
const FORMAT_IEEE_FLOAT: u16 = 0x0003;
const FORMAT_EXTENSIBLE: u16 = 0xfffe;

/// Size of the header written by [`WaveFormat::write_header`].
const CANONICAL_HEADER_SIZE: u64 = 44;

/// Chunks larger than this are not a fmt chunk anyone wrote on purpose.
const MAX_FMT_CHUNK: u32 = 1024;

/// Microsoft RIFF WAVE.
#[derive(Debug, Clone, Copy, Default)]
pub struct WaveFormat;

struct FmtChunk {
    tag: u16,
    channels: u16,
    sample_rate: u32,
    bits: u16,
}

fn u16_at(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

fn u32_at(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

/// Read exactly `buf.len()` bytes; a truncated header is malformed, not an IO error.
fn read_chunk_bytes(reader: &mut dyn ReadSeek, buf: &mut [u8]) -> Result<()> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        ErrorKind::UnexpectedEof => Error::MalformedHeader,
        _ => Error::Io(e),
    })
}

fn parse_fmt(body: &[u8]) -> Result<FmtChunk> {
    if body.len() < 16 {
        return Err(Error::MalformedHeader);
    }
    let mut tag = u16_at(body, 0);
    if tag == FORMAT_EXTENSIBLE {
        // The subformat GUID starts at byte 24; its first two bytes are the real tag.
        if body.len() < 26 {
            return Err(Error::MalformedHeader);
        }
        tag = u16_at(body, 24);
    }
    Ok(FmtChunk {
        tag,
        channels: u16_at(body, 2),
        sample_rate: u32_at(body, 4),
        bits: u16_at(body, 14),
    })
}

fn sample_width(fmt: &FmtChunk) -> Result<SampleWidth> {
    match (fmt.tag, fmt.bits) {
        (FORMAT_PCM, 16) => Ok(SampleWidth::Int16),
        (FORMAT_PCM, 24) => Ok(SampleWidth::Int24),
        (FORMAT_IEEE_FLOAT, 32) => Ok(SampleWidth::Float32),
        (FORMAT_IEEE_FLOAT, 64) => Ok(SampleWidth::Float64),
        _ => Err(Error::UnsupportedSampleFormat),
    }
}

impl HeaderFormat for WaveFormat {
    fn name(&self) -> &'static str {
        "wave"
    }

    fn min_header_size(&self) -> usize {
        12
    }

    fn is_header(&self, bytes: &[u8]) -> bool {
        bytes.len() >= 12
            && matches!(&bytes[0..4], b"RIFF" | b"RF64" | b"BW64")
            && &bytes[8..12] == b"WAVE"
    }

    fn read_header(&self, reader: &mut dyn ReadSeek) -> Result<HeaderInfo> {
        let file_len = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;

        let mut riff = [0u8; 12];
        read_chunk_bytes(reader, &mut riff)?;
        match &riff[0..4] {
            b"RIFF" => {}
            b"RF64" | b"BW64" => return Err(Error::UnsupportedHeaderVersion),
            _ => return Err(Error::UnrecognizedFormat),
        }
        if &riff[8..12] != b"WAVE" {
            return Err(Error::UnrecognizedFormat);
        }

        let mut position: u64 = 12;
        let mut fmt: Option<FmtChunk> = None;
        loop {
            let mut chunk = [0u8; 8];
            read_chunk_bytes(reader, &mut chunk)?;
            let size = u32_at(&chunk, 4);
            position += 8;

            match &chunk[0..4] {
                b"fmt " => {
                    if size > MAX_FMT_CHUNK {
                        return Err(Error::MalformedHeader);
                    }
                    let mut body = vec![0u8; size as usize];
                    read_chunk_bytes(reader, &mut body)?;
                    fmt = Some(parse_fmt(&body)?);
                    if size % 2 == 1 {
                        reader.seek(SeekFrom::Current(1))?;
                    }
                }
                b"data" => {
                    let fmt = fmt.ok_or(Error::MalformedHeader)?;
                    let width = sample_width(&fmt)?;
                    let channels = fmt.channels as usize;
                    if channels == 0 {
                        return Err(Error::MalformedHeader);
                    }
                    if channels > MAX_CHANNELS {
                        return Err(Error::InvalidChannelCount(channels));
                    }

                    let available = file_len.saturating_sub(position);
                    // Unfinalized recordings carry 0 or 0xffffffff here.
                    let data_bytes = match size {
                        0 | u32::MAX => available,
                        declared => u64::from(declared).min(available),
                    };
                    return Ok(HeaderInfo {
                        layout: SampleLayout::new(channels, width, false)?,
                        sample_rate: fmt.sample_rate,
                        header_size: position,
                        data_bytes,
                    });
                }
                _ => {
                    let skip = u64::from(size) + u64::from(size % 2);
                    reader.seek(SeekFrom::Current(skip as i64))?;
                }
            }
            position += u64::from(size) + u64::from(size % 2);
            if position >= file_len {
                return Err(Error::MalformedHeader);
            }
        }
    }

    fn write_header(
        &self,
        writer: &mut dyn WriteSeek,
        sf: &SoundFile,
        frames_hint: u64,
    ) -> Result<u64> {
        let layout = sf.layout;
        if layout.big_endian {
            return Err(Error::InvalidOption(
                "WAVE files are always little-endian".into(),
            ));
        }
        let bpf = layout.bytes_per_frame() as u64;
        let data_bytes = (frames_hint * bpf).min(u64::from(u32::MAX) - CANONICAL_HEADER_SIZE) as u32;
        let tag = if layout.width.is_float() {
            FORMAT_IEEE_FLOAT
        } else {
            FORMAT_PCM
        };

        let mut header = Vec::with_capacity(CANONICAL_HEADER_SIZE as usize);
        header.extend_from_slice(b"RIFF");
        header.extend_from_slice(&(data_bytes + 36).to_le_bytes());
        header.extend_from_slice(b"WAVE");
        header.extend_from_slice(b"fmt ");
        header.extend_from_slice(&16u32.to_le_bytes());
        header.extend_from_slice(&tag.to_le_bytes());
        header.extend_from_slice(&(layout.channels as u16).to_le_bytes());
        header.extend_from_slice(&sf.sample_rate.to_le_bytes());
        header.extend_from_slice(&(sf.sample_rate.saturating_mul(bpf as u32)).to_le_bytes());
        header.extend_from_slice(&(bpf as u16).to_le_bytes());
        header.extend_from_slice(&layout.width.bits().to_le_bytes());
        header.extend_from_slice(b"data");
        header.extend_from_slice(&data_bytes.to_le_bytes());

        writer.write_all(&header)?;
        Ok(CANONICAL_HEADER_SIZE)
    }

    fn update_header(&self, writer: &mut dyn WriteSeek, sf: &SoundFile, frames: u64) -> Result<()> {
        if sf.header_size < CANONICAL_HEADER_SIZE {
            return Err(Error::MalformedHeader);
        }
        let data_bytes = frames.saturating_mul(sf.bytes_per_frame() as u64);
        let riff_size = (sf.header_size - 8 + data_bytes).min(u64::from(u32::MAX)) as u32;
        let data_size = data_bytes.min(u64::from(u32::MAX)) as u32;

        writer.seek(SeekFrom::Start(4))?;
        writer.write_all(&riff_size.to_le_bytes())?;
        writer.seek(SeekFrom::Start(sf.header_size - 4))?;
        writer.write_all(&data_size.to_le_bytes())?;
        writer.seek(SeekFrom::End(0))?;
        Ok(())
    }

    fn has_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("wav") || ext.eq_ignore_ascii_case("wave"))
    }

    fn add_extension(&self, path: &Path) -> PathBuf {
        let mut name = OsString::from(path.as_os_str());
        name.push(".wav");
        PathBuf::from(name)
    }

    fn choose_endianness(&self, requested: Option<bool>, _width: SampleWidth) -> bool {
        if requested == Some(true) {
            tracing::warn!("WAVE file forced to little endian");
        }
        false
    }
}
