//! Test helpers and fixtures for sfstream integration tests
//!
//! Streams are driven by hand: a shared [`BlockClock`] stands in for the
//! audio callback and is advanced once per processed block. The worker
//! thread runs for real, so tests give it time to catch up with the
//! `wait_*` helpers before a block that must not underrun.
//!
//! ## Tolerance Levels
//!
//! Use the appropriate tolerance from [`tolerances`] module:
//! - `FLOAT_EPSILON`: float32 files, which round-trip exactly
//! - `INT16_EPSILON` / `INT24_EPSILON`: integer quantization

#![allow(dead_code)]

pub mod tolerances;

use sfstream::prelude::*;
use sfstream::ReadState;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Sample rate written into fixtures and recordings.
pub const TEST_SAMPLE_RATE: u32 = 48000;

/// Frames per processed block.
pub const TEST_BLOCK: usize = 100;

/// How long a test waits on the worker before failing.
pub const WORKER_TIMEOUT_MS: u64 = 5000;

/// Route `tracing` output through the test harness (`RUST_LOG=debug`).
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Small buffers and a normal-priority worker, so CI machines without
/// realtime privileges behave the same as a workstation.
pub fn test_config() -> StreamConfig {
    StreamConfig {
        buffer_bytes_per_channel: 65536,
        min_buffer_bytes: 65536,
        io_chunk_bytes: 4096,
        block_size: TEST_BLOCK,
        elevate_worker_priority: false,
        ..Default::default()
    }
}

/// One logical clock and the context every stream of a test shares.
pub struct Harness {
    pub clock: Arc<BlockClock>,
    pub ctx: StreamContext,
}

impl Harness {
    pub fn new() -> Self {
        init_tracing();
        let clock = Arc::new(BlockClock::new());
        let ctx = StreamContext::new(clock.clone());
        Self { clock, ctx }
    }

    pub fn advance(&self) {
        self.clock.advance(TEST_BLOCK);
    }
}

// =============================================================================
// Deterministic Signal Generators
// =============================================================================

/// Staircase `i / 65536` for `i` in `0..frames`.
///
/// Every value is exact in `f32`, so a float32 file streamed back must match
/// sample for sample, and the value names the frame it came from.
pub fn staircase(frames: usize) -> Vec<f32> {
    (0..frames).map(staircase_value).collect()
}

pub fn staircase_value(frame: usize) -> f32 {
    frame as f32 / 65536.0
}

/// Generate a test signal: sine wave at given frequency for specified samples.
pub fn generate_sine(frequency: f64, sample_rate: f64, num_samples: usize) -> Vec<f32> {
    (0..num_samples)
        .map(|i| {
            let t = i as f64 / sample_rate;
            (0.5 * (2.0 * std::f64::consts::PI * frequency * t).sin()) as f32
        })
        .collect()
}

// =============================================================================
// Reference File I/O
// =============================================================================

/// Write interleaved samples as a 32-bit float WAV file.
pub fn write_float_wav(path: &Path, channels: u16, interleaved: &[f32]) {
    let spec = hound::WavSpec {
        channels,
        sample_rate: TEST_SAMPLE_RATE,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(path, spec).expect("Failed to create WAV fixture");
    for &sample in interleaved {
        writer.write_sample(sample).expect("Failed to write sample");
    }
    writer.finalize().expect("Failed to finalize WAV fixture");
}

/// Read a WAV file back as interleaved `f32`, integer samples scaled to ±1.
pub fn read_wav(path: &Path) -> (hound::WavSpec, Vec<f32>) {
    let mut reader = hound::WavReader::open(path).expect("Failed to open WAV file");
    let spec = reader.spec();
    let samples = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .map(|s| s.expect("Failed to read sample"))
            .collect(),
        hound::SampleFormat::Int => {
            let scale = 1.0 / (1u32 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.expect("Failed to read sample") as f32 * scale)
                .collect()
        }
    };
    (spec, samples)
}

// =============================================================================
// Driving Streams
// =============================================================================

/// Poll `condition` every millisecond until it holds or the timeout passes.
pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    let timeout = Duration::from_millis(WORKER_TIMEOUT_MS);
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    false
}

pub fn wait_for_buffered(stream: &ReadStream, frames: usize) {
    assert!(
        wait_until(|| stream.buffered_frames() >= frames),
        "worker did not buffer {} frames (have {})",
        frames,
        stream.buffered_frames()
    );
}

/// Run one mono block through a read stream.
pub fn process_mono(stream: &mut ReadStream) -> Vec<f32> {
    let mut out = vec![f32::NAN; TEST_BLOCK];
    stream.process(&mut [&mut out[..]]);
    out
}

/// Get a freshly started read stream to the point where the next block at
/// the current clock time plays without underrun.
///
/// The first block after the file opens repositions the buffer and plays
/// silence; no clock advance follows it, so the stream stays aligned.
pub fn prime_reader(stream: &mut ReadStream) {
    assert!(
        wait_until(|| stream.info().sound_file.is_some()),
        "worker did not open the file"
    );
    let out = process_mono(stream);
    assert!(out.iter().all(|&x| x == 0.0), "priming block must be silent");
    assert_eq!(stream.state(), ReadState::Stream);
    wait_for_buffered(stream, TEST_BLOCK);
}

/// Everything queued on an event channel so far.
pub fn drain(events: &crossbeam_channel::Receiver<StreamEvent>) -> Vec<StreamEvent> {
    events.try_iter().collect()
}

/// Keep processing empty blocks on a finishing write stream until the worker
/// reports the committed frame count.
pub fn wait_frames_written(
    stream: &mut WriteStream,
    events: &crossbeam_channel::Receiver<StreamEvent>,
    seen: &mut Vec<StreamEvent>,
) -> i64 {
    let mut written = None;
    let ok = wait_until(|| {
        stream.process(&[]);
        for event in events.try_iter() {
            if let StreamEvent::FramesWritten(frames) = &event {
                written = Some(frames.to_frames());
            }
            seen.push(event);
        }
        written.is_some()
    });
    assert!(ok, "worker never reported frames written");
    written.unwrap_or_default()
}
