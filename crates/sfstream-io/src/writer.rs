//! Recording side: per-channel sample vectors streamed into a new file.
//!
//! [`WriteStream::process`] encodes each block into the ring buffer and the
//! worker drains it to disk. Until the scheduled start the stream keeps
//! recording into the buffer without releasing anything to the worker
//! (pre-roll), so a start time that turns out to lie in the past can still
//! be honored from buffered audio.

use crate::butler::{
    request_close, Engine, Fifo, IOMetrics, Request, StreamConfig, WriteParams, WriteTransfer,
};
use crate::context::StreamContext;
use crate::error::{Error, Result};
use crate::events::{EventQueue, StreamEvent};
use crate::info::StreamInfo;
use crate::timebase::Timebase;
use crossbeam_channel::Receiver;
use sfstream_core::codec::{encode_frames, find_threshold};
use sfstream_core::{
    CreateRequest, Error as CoreError, FrameTimeCode, SampleLayout, SampleWidth, MAX_CHANNELS,
};
use std::path::Path;
use std::sync::Arc;

/// Threshold used by hosts that arm recording on signal without a level.
pub const DEFAULT_THRESHOLD: f32 = 0.5;

/// Lifecycle of a write stream.
///
/// | from                         | event                              | to          |
/// |------------------------------|------------------------------------|-------------|
/// | any                          | `open`                             | `Startup`   |
/// | `Startup`                    | `start`                            | `Armed`     |
/// | `Armed`                      | first block committed to the file  | `Stream`    |
/// | `Startup`, `Armed`, `Stream` | end time reached or `stop()`       | `Finishing` |
/// | `Finishing`                  | worker reported frames written     | `Idle`      |
/// | `Armed`, `Stream`, `Finishing` | worker reported an error         | `Idle`      |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteState {
    Idle,
    /// File requested, waiting for `start`.
    Startup,
    /// Started, nothing committed yet. Blocks before the start are pre-rolled.
    Armed,
    Stream,
    /// Close requested; waiting for the final frame count.
    Finishing,
}

/// Options for [`WriteStream::open`].
#[derive(Debug, Clone)]
pub struct WriteOptions {
    /// File channels, the stream's input count when `None`.
    pub channels: Option<usize>,
    pub width: SampleWidth,
    /// The stream's sample rate when `None`.
    pub sample_rate: Option<u32>,
    /// Requested byte order; the header format may override it.
    pub big_endian: Option<bool>,
    /// Header format by name, otherwise chosen from the file extension.
    pub format: Option<String>,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            channels: None,
            width: SampleWidth::Int16,
            sample_rate: None,
            big_endian: None,
            format: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WriteStart {
    /// The next processed block.
    Now,
    /// The first frame whose magnitude reaches the level on any channel.
    Threshold(f32),
    /// A logical time in frames, `>= 0`.
    At(FrameTimeCode),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Start {
    Now,
    Threshold(f32),
    At(i64),
}

/// A new sound file recorded from sample vectors by a dedicated worker.
pub struct WriteStream {
    engine: Engine<WriteParams>,
    ctx: StreamContext,
    config: StreamConfig,
    channels: usize,
    sample_rate: u32,
    metrics: Arc<IOMetrics>,
    events: EventQueue,
    timebase: Timebase,
    state: WriteState,
    layout: Option<SampleLayout>,
    start: Start,
    end: Option<i64>,
    /// Time reported with `Started`.
    start_report: Option<i64>,
    /// Encoded bytes held back from the worker, bounded by the buffer size.
    preroll_bytes: usize,
    wake_countdown: usize,
    scratch: Vec<u8>,
}

fn non_negative(ftc: FrameTimeCode, what: &'static str) -> Result<i64> {
    match ftc.to_frames() {
        n if n >= 0 => Ok(n),
        value => Err(CoreError::NegativeTime { what, value }.into()),
    }
}

impl WriteStream {
    /// Stream with `channels` input vectors at `sample_rate`, and its worker
    /// thread.
    pub fn new(
        channels: usize,
        sample_rate: u32,
        config: StreamConfig,
        ctx: StreamContext,
    ) -> Result<Self> {
        if channels == 0 || channels > MAX_CHANNELS {
            return Err(CoreError::InvalidChannelCount(channels).into());
        }
        let metrics = Arc::new(IOMetrics::new());
        let transfer = WriteTransfer::new(
            Arc::clone(&ctx.formats),
            Arc::clone(&metrics),
            config.io_chunk_bytes,
        );
        let fifo = Fifo::with_capacity(config.buffer_bytes(channels));
        let engine = Engine::spawn(
            transfer,
            fifo,
            WriteParams::default(),
            config.elevate_worker_priority,
        )?;

        Ok(Self {
            engine,
            timebase: Timebase::new(Arc::clone(&ctx.clock)),
            events: EventQueue::new(config.event_capacity),
            scratch: vec![0u8; config.block_size * channels * 8],
            ctx,
            config,
            channels,
            sample_rate,
            metrics,
            state: WriteState::Idle,
            layout: None,
            start: Start::Now,
            end: None,
            start_report: None,
            preroll_bytes: 0,
            wake_countdown: 1,
        })
    }

    pub fn state(&self) -> WriteState {
        self.state
    }

    pub fn events(&self) -> Receiver<StreamEvent> {
        self.events.subscribe()
    }

    pub fn metrics(&self) -> Arc<IOMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Create `path` in the background; recording begins with
    /// [`start`](Self::start).
    ///
    /// A recording in progress is stopped first, and this call waits until
    /// the worker has finalized it.
    pub fn open(&mut self, path: impl AsRef<Path>, options: WriteOptions) -> Result<()> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(CoreError::InvalidOption("empty file name".into()).into());
        }
        let channels = options.channels.unwrap_or(self.channels);
        let format = match &options.format {
            Some(name) => self.ctx.formats.by_name(name)?,
            None => self
                .ctx
                .formats
                .for_path(path)
                .or_else(|| self.ctx.formats.default_format())
                .ok_or(CoreError::UnrecognizedFormat)?,
        };
        let big_endian = format.choose_endianness(options.big_endian, options.width);
        let layout = SampleLayout::new(channels, options.width, big_endian)?;

        let shared = self.engine.shared();
        let mut guard = shared.lock();
        if self.state != WriteState::Idle {
            request_close(&mut guard);
        }
        shared.wait_until_idle(&mut guard);
        if let Some(frames) = guard.params.frames_written.take() {
            if self.state != WriteState::Idle {
                self.events
                    .emit(StreamEvent::FramesWritten(FrameTimeCode::from_frames(frames as i64)));
            }
        }

        guard.fifo.configure(layout.bytes_per_frame(), self.config.block_size);
        guard.params.path = Some(path.to_path_buf());
        guard.params.request = Some(CreateRequest {
            channels,
            width: options.width,
            sample_rate: options.sample_rate.unwrap_or(self.sample_rate),
            big_endian: Some(big_endian),
            format: Some(format.name().to_owned()),
            frames_hint: 0,
        });
        guard.params.sf = None;
        guard.params.created = None;
        guard.params.close_after_open = false;
        guard.error = None;
        guard.request = Request::Open;
        shared.signal_worker();
        drop(guard);

        tracing::debug!(path = %path.display(), format = format.name(), "write stream open requested");
        self.state = WriteState::Startup;
        self.layout = Some(layout);
        self.start = Start::Now;
        self.end = None;
        self.start_report = None;
        self.preroll_bytes = 0;
        Ok(())
    }

    pub fn start(&mut self, at: WriteStart) -> Result<()> {
        if self.state != WriteState::Startup {
            return Err(Error::NotOpen("start"));
        }
        self.start = match at {
            WriteStart::Now => Start::Now,
            WriteStart::Threshold(level) => Start::Threshold(level),
            WriteStart::At(ftc) => Start::At(non_negative(ftc, "start time")?),
        };
        self.state = WriteState::Armed;
        self.timebase.restart_local();
        self.engine.shared().signal_worker();
        Ok(())
    }

    /// Stop now, or schedule the end of the recording at `at`.
    pub fn stop(&mut self, at: Option<FrameTimeCode>) -> Result<()> {
        if !matches!(
            self.state,
            WriteState::Startup | WriteState::Armed | WriteState::Stream
        ) {
            return Err(Error::NotOpen("stop"));
        }
        match at {
            Some(ftc) => {
                self.end = Some(non_negative(ftc, "end time")?);
                self.engine.shared().signal_worker();
            }
            None => {
                let shared = self.engine.shared();
                let mut guard = shared.lock();
                self.state = WriteState::Finishing;
                request_close(&mut guard);
                shared.signal_worker();
                drop(guard);
                self.events.emit(StreamEvent::Finished);
            }
        }
        Ok(())
    }

    /// See [`ReadStream::bind_time_authority`](crate::ReadStream::bind_time_authority).
    pub fn bind_time_authority(&mut self, name: Option<&str>) -> Result<()> {
        self.timebase.bind(&self.ctx.anchors, name)?;
        Ok(())
    }

    pub fn prepare(&mut self, block_size: usize) {
        self.config.block_size = block_size.max(1);
        self.timebase.resolve(&self.ctx.anchors);
        self.wake_countdown = 1;
    }

    pub fn info(&self) -> StreamInfo<WriteState> {
        let guard = self.engine.shared().lock();
        StreamInfo {
            state: self.state,
            path: guard.params.created.clone().or_else(|| guard.params.path.clone()),
            sound_file: guard.params.sf.clone(),
            anchor: self.timebase.anchor_name().map(str::to_owned),
            buffered_bytes: guard.fifo.len(),
            buffer_bytes: guard.fifo.size(),
        }
    }

    /// Record one block of input vectors.
    pub fn process(&mut self, inputs: &[&[f32]]) {
        match self.state {
            WriteState::Armed | WriteState::Stream => {}
            WriteState::Finishing => return self.poll_finished(),
            WriteState::Idle | WriteState::Startup => return,
        }
        let Some(layout) = self.layout else {
            return;
        };
        let n = inputs.iter().map(|input| input.len()).min().unwrap_or(0);
        let bpf = layout.bytes_per_frame();
        let block_start = self.timebase.block_start();

        match self.start {
            Start::Now => {
                self.start = Start::At(block_start);
            }
            Start::Threshold(level) => {
                if let Some(index) = find_threshold(inputs, n, level) {
                    tracing::debug!(index, block_start, "write threshold crossed");
                    self.start = Start::At(block_start + index as i64);
                }
            }
            Start::At(_) => {}
        }

        let shared = self.engine.shared();
        let mut guard = shared.lock();

        if let Some(error) = guard.error.take() {
            drop(guard);
            self.state = WriteState::Idle;
            self.events.emit(StreamEvent::Failed { error });
            self.events.emit(StreamEvent::Finished);
            return;
        }

        let mut offset = 0;
        let mut frames = n;
        let mut preroll = false;
        let mut recovered = 0;
        let finished = self
            .end
            .is_some_and(|end| block_start.saturating_add(n as i64) > end);

        if let (true, Some(end)) = (finished, self.end) {
            frames = (end - block_start).clamp(0, n as i64) as usize;
        } else {
            match self.start {
                Start::At(start) if block_start <= start => {
                    if block_start + n as i64 > start {
                        offset = (start - block_start) as usize;
                        frames = n - offset;
                        guard.fifo.reset();
                        self.start_report = Some(start);
                    } else {
                        preroll = true;
                    }
                }
                Start::Threshold(_) => preroll = true,
                Start::At(start) if self.state == WriteState::Armed => {
                    let overdue = (block_start - start) as usize;
                    // Room for this block stays free behind the recovered audio.
                    let reachable = guard
                        .fifo
                        .size()
                        .saturating_sub(n * bpf + 1)
                        .min(self.preroll_bytes);
                    recovered = overdue.min(reachable / bpf);
                    guard.fifo.retreat_tail(recovered * bpf);
                    self.preroll_bytes = 0;
                    if recovered < overdue {
                        tracing::warn!(
                            requested = start,
                            recovered,
                            overdue,
                            "retroactive start truncated to buffered audio"
                        );
                    }
                    self.start_report = Some(start + (overdue - recovered) as i64);
                }
                _ => {}
            }
        }

        let mut bytes = frames * bpf;
        if bytes > guard.fifo.vacant() {
            shared.signal_worker();
            self.metrics.record_dropped_block();
            tracing::debug!(block_start, "write buffer full, dropping block");
            bytes = 0;
            frames = 0;
        }
        if bytes > 0 {
            if self.scratch.len() < bytes {
                self.scratch.resize(bytes, 0);
            }
            encode_frames(layout, inputs, offset, frames, 1.0, &mut self.scratch[..bytes]);
            guard.fifo.write_at_head(&self.scratch[..bytes]);
            guard.fifo.advance_head(bytes);
        }

        if preroll {
            guard.fifo.catch_up_tail();
            self.preroll_bytes = (self.preroll_bytes + bytes).min(guard.fifo.size());
        } else if self.state == WriteState::Armed && (frames > 0 || recovered > 0) {
            self.state = WriteState::Stream;
            let started = self.start_report.unwrap_or(block_start);
            self.events
                .emit(StreamEvent::Started(FrameTimeCode::from_frames(started)));
        }

        if finished {
            self.state = WriteState::Finishing;
            request_close(&mut guard);
            shared.signal_worker();
            drop(guard);
            self.events.emit(StreamEvent::Finished);
        } else if self.wake_countdown <= 1 {
            shared.signal_worker();
            self.wake_countdown = self.config.wake_period(guard.fifo.size(), bpf);
        } else {
            self.wake_countdown -= 1;
        }
    }

    fn poll_finished(&mut self) {
        let mut guard = self.engine.shared().lock();
        if let Some(error) = guard.error.take() {
            drop(guard);
            self.state = WriteState::Idle;
            self.events.emit(StreamEvent::Failed { error });
            return;
        }
        if let Some(frames) = guard.params.frames_written.take() {
            drop(guard);
            self.state = WriteState::Idle;
            self.events
                .emit(StreamEvent::FramesWritten(FrameTimeCode::from_frames(frames as i64)));
        }
    }
}

impl std::fmt::Debug for WriteStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteStream")
            .field("state", &self.state)
            .field("layout", &self.layout)
            .field("start", &self.start)
            .field("end", &self.end)
            .field("preroll_bytes", &self.preroll_bytes)
            .finish()
    }
}
