//! Buffer-to-disk half of a write stream.

use super::metrics::IOMetrics;
use super::request::{Request, Step};
use super::shared_state::{Guard, SharedState};
use super::thread::Transfer;
use parking_lot::MutexGuard;
use sfstream_core::soundfile::{create_soundfile, finish_soundfile};
use sfstream_core::{CreateRequest, Error, FormatRegistry, Result, SoundFile};
use std::fs::File;
use std::io::{ErrorKind, Write};
use std::path::PathBuf;
use std::sync::Arc;

/// Write-side parameters shared with the worker.
#[derive(Debug, Default)]
pub(crate) struct WriteParams {
    pub path: Option<PathBuf>,
    pub request: Option<CreateRequest>,
    /// Published by the worker once the file exists.
    pub sf: Option<SoundFile>,
    /// Path actually created, extension included.
    pub created: Option<PathBuf>,
    /// Frame count of the last finished file, taken by the controller.
    pub frames_written: Option<u64>,
    /// Close was asked for before the worker picked up the open.
    pub close_after_open: bool,
}

/// Ask the worker to finish the current file.
///
/// An open the worker has not started yet is left in place and turned into a
/// close once the file exists, so blocks already queued still reach it.
pub(crate) fn request_close(state: &mut SharedState<WriteParams>) {
    if state.request == Request::Open {
        state.params.close_after_open = true;
    } else {
        state.request = Request::Close;
    }
}

struct CreatedFile {
    file: File,
    sf: SoundFile,
    path: PathBuf,
}

pub(crate) struct WriteTransfer {
    formats: Arc<FormatRegistry>,
    metrics: Arc<IOMetrics>,
    io_chunk: usize,
    open: Option<CreatedFile>,
    bytes_written: u64,
    scratch: Vec<u8>,
}

impl WriteTransfer {
    pub fn new(formats: Arc<FormatRegistry>, metrics: Arc<IOMetrics>, io_chunk: usize) -> Self {
        let io_chunk = io_chunk.max(1);
        Self {
            formats,
            metrics,
            io_chunk,
            open: None,
            bytes_written: 0,
            scratch: vec![0u8; io_chunk],
        }
    }
}

/// One write of `data`, returning how much the file accepted. Only an
/// interrupted call is repeated; a partial write is left to the caller.
fn write_chunk<W: Write>(out: &mut W, data: &[u8]) -> std::io::Result<usize> {
    loop {
        match out.write(data) {
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            result => return result,
        }
    }
}

impl Transfer for WriteTransfer {
    type Params = WriteParams;
    const DIRECTION: &'static str = "write";

    fn is_open(&self) -> bool {
        self.open.is_some()
    }

    fn open(&mut self, guard: &mut Guard<'_, WriteParams>) -> Result<()> {
        let path = guard
            .params
            .path
            .clone()
            .ok_or_else(|| Error::InvalidOption("no file name".into()))?;
        let request = guard
            .params
            .request
            .clone()
            .ok_or_else(|| Error::InvalidOption("no file layout".into()))?;
        let formats = Arc::clone(&self.formats);

        let (file, sf, created) =
            MutexGuard::unlocked(guard, || create_soundfile(&formats, &path, &request))?;

        guard.params.sf = Some(sf.clone());
        guard.params.created = Some(created.clone());
        if std::mem::take(&mut guard.params.close_after_open) && guard.request == Request::Busy {
            guard.request = Request::Close;
        }
        self.bytes_written = 0;
        // Kept even if superseded, so the header is finalized by whoever
        // handles the new request.
        self.open = Some(CreatedFile {
            file,
            sf,
            path: created,
        });
        Ok(())
    }

    fn keep_going(&self, state: &SharedState<WriteParams>) -> bool {
        match state.request {
            Request::Busy => true,
            Request::Close => !state.fifo.is_empty(),
            _ => false,
        }
    }

    fn step(&mut self, guard: &mut Guard<'_, WriteParams>) -> Result<Step> {
        let draining = guard.request == Request::Close;
        let n = guard.fifo.consumer_chunk(self.io_chunk, draining);
        if n == 0 {
            return Ok(Step::Idle);
        }
        let Some(open) = self.open.as_mut() else {
            return Ok(Step::Superseded);
        };

        let tail = guard.fifo.tail();
        let generation = guard.fifo.generation();
        self.scratch[..n].copy_from_slice(guard.fifo.chunk_at_tail(n));

        let file = &mut open.file;
        let data = &self.scratch[..n];
        let written = MutexGuard::unlocked(guard, || write_chunk(file, data))?;
        self.bytes_written += written as u64;
        self.metrics.record_write(written as u64);

        if written < n {
            return Err(Error::ShortWrite {
                written,
                requested: n,
            });
        }
        if !matches!(guard.request, Request::Busy | Request::Close) {
            return Ok(Step::Superseded);
        }
        if guard.fifo.tail() != tail || guard.fifo.generation() != generation {
            tracing::warn!("write buffer moved under an in-flight write");
            return Ok(Step::Discarded);
        }
        guard.fifo.advance_tail(n);
        Ok(Step::Transferred)
    }

    fn after_transfer(&mut self, guard: &mut Guard<'_, WriteParams>) {
        // A clean close is finished by the close handler; errors and
        // superseding opens finish here.
        if self.open.is_some() && !matches!(guard.request, Request::Close | Request::Quit) {
            self.finish(guard);
        }
    }

    fn finish(&mut self, guard: &mut Guard<'_, WriteParams>) {
        let Some(mut created) = self.open.take() else {
            return;
        };
        let frames = self.bytes_written / created.sf.bytes_per_frame() as u64;

        let result = MutexGuard::unlocked(guard, || {
            finish_soundfile(&mut created.file, &created.sf, frames)
        });
        match result {
            Ok(()) => tracing::info!(path = %created.path.display(), frames, "finished sound file"),
            Err(error) => {
                tracing::error!(path = %created.path.display(), %error, "could not finalize header");
                if guard.error.is_none() {
                    guard.error = Some(Arc::new(error));
                }
            }
        }
        guard.params.frames_written = Some(frames);
    }
}
