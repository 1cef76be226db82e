//! Disk-to-buffer half of a read stream.
//!
//! The worker plays a loop region of the file into the ring buffer: bytes
//! `[loop_start, loop_start + loop_length)` frames past the onset, repeated
//! forever. Any part of the region beyond the end of the sample data is
//! delivered as silence. Whenever the controller resets the buffer, the
//! worker re-seeks to the loop position matching the requested head time.

use super::metrics::IOMetrics;
use super::request::{Request, Step};
use super::shared_state::{Guard, SharedState};
use super::thread::Transfer;
use parking_lot::MutexGuard;
use sfstream_core::soundfile::open_soundfile;
use sfstream_core::{Error, FormatRegistry, FrameTimeCode, OpenRequest, Result, SoundFile};
use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::PathBuf;
use std::sync::Arc;

/// Length of a read stream's loop region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopLength {
    /// A fixed number of frames, which may extend past the end of the file.
    Frames(u64),
    /// As many frames as the file holds after the onset, counted from the
    /// loop start. With a nonzero loop start the region runs past the end
    /// of the file and that tail plays as silence.
    #[default]
    WholeFile,
}

impl LoopLength {
    /// Fixed loop length from a time code, which must be positive.
    pub fn from_time_code(ftc: FrameTimeCode) -> Result<Self> {
        match ftc.to_frames() {
            n if n > 0 => Ok(Self::Frames(n as u64)),
            n => Err(Error::InvalidLoopLength(n)),
        }
    }
}

/// Read-side parameters shared with the worker.
#[derive(Debug, Default)]
pub(crate) struct ReadParams {
    pub path: Option<PathBuf>,
    pub request: OpenRequest,
    /// Published by the worker once the file is open.
    pub sf: Option<SoundFile>,
    pub loop_start: u64,
    pub loop_length: LoopLength,
    /// Logical time the first byte after a reset belongs to.
    pub head_time_request: i64,
    /// Scheduled start, negative while unresolved.
    pub play_start: i64,
}

struct OpenFile {
    file: File,
    bytes_per_frame: u64,
    /// First byte after the onset.
    data_start: u64,
    /// Sample bytes after the onset.
    data_bytes: u64,
}

pub(crate) struct ReadTransfer {
    formats: Arc<FormatRegistry>,
    metrics: Arc<IOMetrics>,
    io_chunk: usize,
    block_size: usize,
    open: Option<OpenFile>,
    next_seek: u64,
    last_generation: Option<u64>,
    scratch: Vec<u8>,
}

impl ReadTransfer {
    pub fn new(
        formats: Arc<FormatRegistry>,
        metrics: Arc<IOMetrics>,
        io_chunk: usize,
        block_size: usize,
    ) -> Self {
        let io_chunk = io_chunk.max(1);
        Self {
            formats,
            metrics,
            io_chunk,
            block_size,
            open: None,
            next_seek: 0,
            last_generation: None,
            scratch: vec![0u8; io_chunk],
        }
    }

    fn close(&mut self) {
        if self.open.take().is_some() {
            tracing::debug!("read stream closed file");
        }
    }
}

/// Read `dst.len()` bytes at `at`, zero-filling whatever lies past
/// `data_end` or past the physical end of the file.
fn read_region(file: &mut File, at: u64, data_end: u64, dst: &mut [u8]) -> Result<()> {
    let available = data_end.saturating_sub(at).min(dst.len() as u64) as usize;
    let mut filled = 0;
    if available > 0 {
        file.seek(SeekFrom::Start(at))?;
        while filled < available {
            match file.read(&mut dst[filled..available]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
    }
    dst[filled..].fill(0);
    Ok(())
}

impl Transfer for ReadTransfer {
    type Params = ReadParams;
    const DIRECTION: &'static str = "read";

    fn is_open(&self) -> bool {
        self.open.is_some()
    }

    fn open(&mut self, guard: &mut Guard<'_, ReadParams>) -> Result<()> {
        let path = guard
            .params
            .path
            .clone()
            .ok_or_else(|| Error::InvalidOption("no file name".into()))?;
        let request = guard.params.request.clone();
        let formats = Arc::clone(&self.formats);

        let (file, sf) = MutexGuard::unlocked(guard, || open_soundfile(&formats, &path, &request))?;
        if guard.request != Request::Busy {
            tracing::debug!(path = %path.display(), "open superseded");
            return Ok(());
        }

        let bytes_per_frame = sf.bytes_per_frame() as u64;
        let data_start = sf.header_size + request.onset.saturating_mul(bytes_per_frame);
        guard.fifo.configure(sf.bytes_per_frame(), self.block_size);
        guard.params.sf = Some(sf.clone());

        self.open = Some(OpenFile {
            file,
            bytes_per_frame,
            data_start,
            data_bytes: sf.byte_limit,
        });
        self.last_generation = None;
        Ok(())
    }

    fn keep_going(&self, state: &SharedState<ReadParams>) -> bool {
        state.request == Request::Busy
    }

    fn step(&mut self, guard: &mut Guard<'_, ReadParams>) -> Result<Step> {
        let Some(open) = self.open.as_mut() else {
            return Ok(Step::Superseded);
        };

        let loop_bytes = match guard.params.loop_length {
            LoopLength::WholeFile => open.data_bytes,
            LoopLength::Frames(n) => n.saturating_mul(open.bytes_per_frame),
        };
        if loop_bytes == 0 {
            return Err(Error::EmptyFile);
        }
        let loop_base = open.data_start + guard.params.loop_start.saturating_mul(open.bytes_per_frame);
        let loop_end = loop_base + loop_bytes;

        let generation = guard.fifo.generation();
        if self.last_generation != Some(generation) {
            let play_start = guard.params.play_start.max(0);
            let byte_time = (guard.params.head_time_request - play_start)
                .saturating_mul(open.bytes_per_frame as i64);
            self.next_seek = loop_base + byte_time.rem_euclid(loop_bytes as i64) as u64;
            self.last_generation = Some(generation);
            tracing::trace!(
                head_time = guard.params.head_time_request,
                seek = self.next_seek,
                "read stream re-seeked"
            );
        }
        if self.next_seek >= loop_end {
            self.next_seek = loop_base;
        }

        let want = guard
            .fifo
            .producer_chunk(self.io_chunk)
            .min((loop_end - self.next_seek) as usize);
        if want == 0 {
            return Ok(Step::Idle);
        }

        let at = self.next_seek;
        let data_end = open.data_start + open.data_bytes;
        let file = &mut open.file;
        let scratch = &mut self.scratch[..want];
        MutexGuard::unlocked(guard, || read_region(file, at, data_end, scratch))?;

        if guard.request != Request::Busy {
            return Ok(Step::Superseded);
        }
        if guard.fifo.generation() != generation {
            return Ok(Step::Discarded);
        }

        guard.fifo.write_at_head(&self.scratch[..want]);
        guard.fifo.advance_head(want);
        self.next_seek += want as u64;
        if self.next_seek >= loop_end {
            self.next_seek = loop_base;
        }
        self.metrics.record_read(want as u64);
        Ok(Step::Transferred)
    }

    fn after_transfer(&mut self, guard: &mut Guard<'_, ReadParams>) {
        self.close();
        if guard.request != Request::Open {
            guard.fifo.set_eof(true);
        }
    }

    fn finish(&mut self, _guard: &mut Guard<'_, ReadParams>) {
        self.close();
    }
}
