//! Playback side: a file streamed into per-channel sample vectors.
//!
//! A [`ReadStream`] is driven from the audio thread with one
//! [`process`](ReadStream::process) call per block. Commands (`open`,
//! `start`, `stop`, loop settings) come from the same thread or one the host
//! serializes with it. The worker keeps the ring buffer filled with the loop
//! region; `process` only ever copies bytes out of it, emitting silence
//! instead of waiting when data is late.

use crate::butler::{
    Engine, Fifo, IOMetrics, LoopLength, ReadParams, ReadTransfer, Request, StreamConfig,
};
use crate::context::StreamContext;
use crate::error::{Error, Result};
use crate::events::{EventQueue, StreamEvent};
use crate::info::StreamInfo;
use crate::timebase::Timebase;
use crossbeam_channel::Receiver;
use sfstream_core::codec::decode_frames;
use sfstream_core::{
    Error as CoreError, FrameTimeCode, OpenRequest, RawLayout, SampleLayout, MAX_CHANNELS,
};
use std::path::Path;
use std::sync::Arc;

/// Lifecycle of a read stream.
///
/// | from      | event                         | to        |
/// |-----------|-------------------------------|-----------|
/// | any       | `open`                        | `Startup` |
/// | `Startup` | `start`                       | `Stream`  |
/// | `Stream`  | end of window reached         | `Idle`    |
/// | any       | `stop()`                      | `Idle`    |
/// | `Startup`, `Stream` | worker reported an error | `Idle` |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadState {
    Idle,
    /// Opened, waiting for `start`. Frame count is reported from here.
    Startup,
    Stream,
}

/// Options for [`ReadStream::open`].
#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    /// Frames to skip at the start of the sample data.
    pub onset: u64,
    /// Treat the file as headerless with this layout.
    pub raw: Option<RawLayout>,
    /// Header format by name instead of detection.
    pub format: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartAt {
    /// The next processed block.
    Now,
    /// A logical time in frames, `>= 0`.
    At(FrameTimeCode),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopAt {
    /// The next processed block.
    Now,
    /// The end of the loop iteration playing when the stream starts.
    AtLoopEnd,
    /// Loop until told otherwise.
    Never,
    /// A logical time in frames, `>= 0`.
    At(FrameTimeCode),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum End {
    AtLoop,
    Never,
    At(i64),
}

/// A sound file played into sample vectors by a dedicated worker.
pub struct ReadStream {
    engine: Engine<ReadParams>,
    ctx: StreamContext,
    config: StreamConfig,
    metrics: Arc<IOMetrics>,
    events: EventQueue,
    timebase: Timebase,
    state: ReadState,
    layout: Option<SampleLayout>,
    frames_available: Option<u64>,
    /// `None` until resolved to a block start.
    start: Option<i64>,
    end: End,
    loop_request: bool,
    /// Logical time of the byte at the buffer's tail.
    tail_time: i64,
    wake_countdown: usize,
    scratch: Vec<u8>,
}

fn silence(outputs: &mut [&mut [f32]], from: usize, to: usize) {
    if from < to {
        for output in outputs.iter_mut() {
            output[from..to].fill(0.0);
        }
    }
}

fn non_negative(ftc: FrameTimeCode, what: &'static str) -> Result<i64> {
    match ftc.to_frames() {
        n if n >= 0 => Ok(n),
        value => Err(CoreError::NegativeTime { what, value }.into()),
    }
}

impl ReadStream {
    /// Stream with `channels` output vectors and its worker thread.
    pub fn new(channels: usize, config: StreamConfig, ctx: StreamContext) -> Result<Self> {
        if channels == 0 || channels > MAX_CHANNELS {
            return Err(CoreError::InvalidChannelCount(channels).into());
        }
        let metrics = Arc::new(IOMetrics::new());
        let transfer = ReadTransfer::new(
            Arc::clone(&ctx.formats),
            Arc::clone(&metrics),
            config.io_chunk_bytes,
            config.block_size,
        );
        let fifo = Fifo::with_capacity(config.buffer_bytes(channels));
        let params = ReadParams {
            play_start: -1,
            ..Default::default()
        };
        let engine = Engine::spawn(transfer, fifo, params, config.elevate_worker_priority)?;

        Ok(Self {
            engine,
            timebase: Timebase::new(Arc::clone(&ctx.clock)),
            events: EventQueue::new(config.event_capacity),
            scratch: vec![0u8; config.block_size * channels * 8],
            ctx,
            config,
            metrics,
            state: ReadState::Idle,
            layout: None,
            frames_available: None,
            start: None,
            end: End::AtLoop,
            loop_request: false,
            tail_time: 0,
            wake_countdown: 1,
        })
    }

    pub fn state(&self) -> ReadState {
        self.state
    }

    /// Notifications for the host.
    pub fn events(&self) -> Receiver<StreamEvent> {
        self.events.subscribe()
    }

    pub fn metrics(&self) -> Arc<IOMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Open `path` in the background. Playback starts with [`start`](Self::start).
    ///
    /// The schedule is reset to start now and stop at the end of the loop.
    /// Loop settings and the time anchor binding are kept.
    pub fn open(&mut self, path: impl AsRef<Path>, options: ReadOptions) -> Result<()> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(CoreError::InvalidOption("empty file name".into()).into());
        }

        let shared = self.engine.shared();
        let mut guard = shared.lock();
        guard.params.path = Some(path.to_path_buf());
        guard.params.request = OpenRequest {
            onset: options.onset,
            raw: options.raw,
            format: options.format,
        };
        guard.params.sf = None;
        guard.params.play_start = -1;
        guard.params.head_time_request = 0;
        guard.error = None;
        guard.request = Request::Open;
        shared.signal_worker();
        drop(guard);

        tracing::debug!(path = %path.display(), "read stream open requested");
        self.state = ReadState::Startup;
        self.layout = None;
        self.frames_available = None;
        self.start = None;
        self.end = End::AtLoop;
        self.tail_time = 0;
        Ok(())
    }

    pub fn start(&mut self, at: StartAt) -> Result<()> {
        if self.state == ReadState::Idle {
            return Err(Error::NotOpen("start"));
        }
        self.start = match at {
            StartAt::Now => None,
            StartAt::At(ftc) => Some(non_negative(ftc, "start time")?),
        };
        self.loop_request = true;
        self.state = ReadState::Stream;
        self.timebase.restart_local();
        self.engine.shared().signal_worker();
        Ok(())
    }

    /// Stop immediately and close the file.
    pub fn stop(&mut self) -> Result<()> {
        if self.state == ReadState::Idle {
            return Err(Error::NotOpen("stop"));
        }
        let shared = self.engine.shared();
        let mut guard = shared.lock();
        self.state = ReadState::Idle;
        guard.request = Request::Close;
        shared.signal_worker();
        Ok(())
    }

    /// Schedule the end of playback.
    pub fn stop_at(&mut self, at: StopAt) -> Result<()> {
        if self.state == ReadState::Idle {
            return Err(Error::NotOpen("stop"));
        }
        self.end = match at {
            StopAt::Now => End::At(0),
            StopAt::AtLoopEnd => End::AtLoop,
            StopAt::Never => End::Never,
            StopAt::At(ftc) => End::At(non_negative(ftc, "end time")?),
        };
        self.engine.shared().signal_worker();
        Ok(())
    }

    /// Frames into the file (after the onset) where the loop region begins.
    pub fn set_loop_start(&mut self, at: FrameTimeCode) -> Result<()> {
        let frames = non_negative(at, "loop start")?;
        let shared = self.engine.shared();
        shared.lock().params.loop_start = frames as u64;
        self.loop_request = true;
        shared.signal_worker();
        Ok(())
    }

    pub fn set_loop_length(&mut self, length: LoopLength) -> Result<()> {
        if length == LoopLength::Frames(0) {
            return Err(CoreError::InvalidLoopLength(0).into());
        }
        let shared = self.engine.shared();
        shared.lock().params.loop_length = length;
        self.loop_request = true;
        shared.signal_worker();
        Ok(())
    }

    /// Schedule against the named anchor, or stream-local time for `None`
    /// or `"self"`.
    ///
    /// An unknown name is an error but stays bound, so creating the anchor
    /// later and calling [`prepare`](Self::prepare) picks it up.
    pub fn bind_time_authority(&mut self, name: Option<&str>) -> Result<()> {
        self.loop_request = true;
        self.timebase.bind(&self.ctx.anchors, name)?;
        Ok(())
    }

    /// Per-start hook of the host's processing graph.
    pub fn prepare(&mut self, block_size: usize) {
        self.config.block_size = block_size.max(1);
        self.timebase.resolve(&self.ctx.anchors);
        self.wake_countdown = 1;
    }

    /// Bytes in the ring buffer as whole frames, 0 until the file is open.
    pub fn buffered_frames(&self) -> usize {
        let guard = self.engine.shared().lock();
        match guard.params.sf.as_ref() {
            Some(sf) => guard.fifo.len() / sf.bytes_per_frame(),
            None => 0,
        }
    }

    pub fn info(&self) -> StreamInfo<ReadState> {
        let guard = self.engine.shared().lock();
        StreamInfo {
            state: self.state,
            path: guard.params.path.clone(),
            sound_file: guard.params.sf.clone(),
            anchor: self.timebase.anchor_name().map(str::to_owned),
            buffered_bytes: guard.fifo.len(),
            buffer_bytes: guard.fifo.size(),
        }
    }

    /// Fill one block of output vectors.
    pub fn process(&mut self, outputs: &mut [&mut [f32]]) {
        let n = outputs.iter().map(|output| output.len()).min().unwrap_or(0);
        if self.state == ReadState::Idle || n == 0 {
            silence(outputs, 0, n);
            return;
        }

        let shared = self.engine.shared();
        let mut guard = shared.lock();

        if let Some(error) = guard.error.take() {
            drop(guard);
            self.state = ReadState::Idle;
            self.events.emit(StreamEvent::Failed { error });
            self.events.emit(StreamEvent::Finished);
            silence(outputs, 0, n);
            return;
        }

        if self.frames_available.is_none() {
            let Some(sf) = guard.params.sf.as_ref() else {
                drop(guard);
                silence(outputs, 0, n);
                return;
            };
            let frames = sf.frames();
            self.layout = Some(sf.layout);
            self.frames_available = Some(frames);
            self.events
                .emit(StreamEvent::FramesAvailable(FrameTimeCode::from_frames(frames as i64)));
        }
        let (Some(layout), ReadState::Stream) = (self.layout, self.state) else {
            drop(guard);
            silence(outputs, 0, n);
            return;
        };
        let bpf = layout.bytes_per_frame();

        let block_start = self.timebase.block_start();
        let start = *self.start.get_or_insert(block_start);

        let mut resync = std::mem::take(&mut self.loop_request);
        if !resync && self.tail_time != block_start {
            let drift = block_start - self.tail_time;
            let drift_bytes = (drift.max(0) as usize).saturating_mul(bpf);
            if drift > 0 && drift_bytes < guard.fifo.len() {
                guard.fifo.advance_tail(drift_bytes);
                self.tail_time = block_start;
            } else {
                resync = true;
            }
        }
        if resync {
            guard.fifo.reset();
            guard.params.head_time_request = block_start;
            guard.params.play_start = start;
            self.tail_time = block_start;
            self.metrics.record_resync();
            shared.signal_worker();
        }

        if self.end == End::AtLoop {
            let length = match guard.params.loop_length {
                LoopLength::Frames(frames) => frames as i64,
                LoopLength::WholeFile => self.frames_available.unwrap_or(0) as i64,
            };
            let end = if length <= 0 {
                start
            } else if start <= block_start {
                start + length * ((block_start - start).div_euclid(length) + 1)
            } else {
                start + length
            };
            self.end = End::At(end);
        }
        let end = match self.end {
            End::At(end) => end,
            End::AtLoop | End::Never => i64::MAX,
        };

        let finished = block_start.saturating_add(n as i64) > end;
        let to_end = (end - block_start).clamp(0, n as i64) as usize;

        let want = n * bpf;
        // A finishing block only needs the frames before the end.
        let starved = guard.fifo.len() < if finished { to_end * bpf } else { want };
        if starved {
            self.metrics.record_underrun();
            if !finished {
                shared.signal_worker();
                drop(guard);
                silence(outputs, 0, n);
                return;
            }
        }
        let (offset, frames) = if starved {
            (0, 0)
        } else if finished {
            (0, to_end)
        } else if block_start < start {
            let zeros = ((start - block_start) as usize).min(n);
            (zeros, n - zeros)
        } else {
            (0, n)
        };

        let bytes = frames * bpf;
        if self.scratch.len() < bytes {
            self.scratch.resize(bytes, 0);
        }
        guard.fifo.read_at_tail(offset * bpf, &mut self.scratch[..bytes]);

        if finished {
            self.state = ReadState::Idle;
            guard.request = Request::Close;
            shared.signal_worker();
        } else {
            guard.fifo.advance_tail(want);
            self.tail_time += n as i64;
            if self.wake_countdown <= 1 {
                shared.signal_worker();
                self.wake_countdown = self.config.wake_period(guard.fifo.size(), bpf);
            } else {
                self.wake_countdown -= 1;
            }
        }
        drop(guard);

        silence(outputs, 0, offset);
        decode_frames(layout, &self.scratch[..bytes], outputs, offset, frames);
        silence(outputs, offset + frames, n);

        if finished {
            tracing::debug!(end, "read stream reached end of window");
            self.events.emit(StreamEvent::Finished);
        }
    }
}

impl std::fmt::Debug for ReadStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadStream")
            .field("state", &self.state)
            .field("layout", &self.layout)
            .field("frames_available", &self.frames_available)
            .field("start", &self.start)
            .field("end", &self.end)
            .field("tail_time", &self.tail_time)
            .finish()
    }
}
