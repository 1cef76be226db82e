//! Playback integration tests
//!
//! A float32 staircase file is streamed through a `ReadStream` block by
//! block, so every output sample names the file frame it came from.
//!
//! Run with:
//! ```bash
//! cargo test -p sfstream --test read_stream
//! ```

#[path = "helpers/mod.rs"]
mod helpers;

use helpers::{
    drain, prime_reader, process_mono, staircase, test_config, wait_for_buffered, wait_until,
    write_float_wav, Harness, TEST_BLOCK,
};
use sfstream::core::Error as CoreError;
use sfstream::prelude::*;
use sfstream::ReadState;
use std::path::PathBuf;

const FILE_FRAMES: usize = 10_000;

fn fixture(dir: &tempfile::TempDir, frames: usize) -> (PathBuf, Vec<f32>) {
    let path = dir.path().join("staircase.wav");
    let data = staircase(frames);
    write_float_wav(&path, 1, &data);
    (path, data)
}

fn ftc(frames: i64) -> FrameTimeCode {
    FrameTimeCode::from_frames(frames)
}

fn count_finished(events: &[StreamEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, StreamEvent::Finished))
        .count()
}

/// Process `blocks` blocks from the current clock time and check each
/// sample against `expected(time)`.
fn play_and_check(
    h: &Harness,
    stream: &mut ReadStream,
    blocks: usize,
    expected: impl Fn(i64) -> f32,
) {
    for _ in 0..blocks {
        let t = h.clock.frames() as i64;
        if stream.state() == ReadState::Stream {
            wait_for_buffered(stream, TEST_BLOCK);
        }
        let out = process_mono(stream);
        for (i, &x) in out.iter().enumerate() {
            let time = t + i as i64;
            assert_eq!(x, expected(time), "sample at logical time {}", time);
        }
        h.advance();
    }
}

fn run_window(start: i64, end: i64) {
    let h = Harness::new();
    let dir = tempfile::tempdir().unwrap();
    let (path, data) = fixture(&dir, FILE_FRAMES);

    let mut stream = ReadStream::new(1, test_config(), h.ctx.clone()).unwrap();
    let events = stream.events();
    stream.open(&path, ReadOptions::default()).unwrap();
    stream.start(StartAt::At(ftc(start))).unwrap();
    stream.stop_at(StopAt::At(ftc(end))).unwrap();
    prime_reader(&mut stream);

    play_and_check(&h, &mut stream, 60, |time| {
        if time >= start && time < end {
            data[(time - start) as usize % FILE_FRAMES]
        } else {
            0.0
        }
    });

    assert_eq!(stream.state(), ReadState::Idle);
    let events = drain(&events);
    assert!(matches!(
        events.first(),
        Some(StreamEvent::FramesAvailable(n)) if n.to_frames() == FILE_FRAMES as i64
    ));
    assert_eq!(count_finished(&events), 1, "events: {:?}", events);

    let metrics = stream.metrics().snapshot();
    assert_eq!(metrics.resyncs, 1);
    assert_eq!(metrics.underruns, 1);
}

#[test]
fn test_block_aligned_window() {
    run_window(1000, 5000);
}

#[test]
fn test_unaligned_window() {
    run_window(1030, 4970);
}

#[test]
fn test_loop_longer_than_file_is_padded_with_silence() {
    let h = Harness::new();
    let dir = tempfile::tempdir().unwrap();
    let (path, data) = fixture(&dir, 600);

    let mut stream = ReadStream::new(1, test_config(), h.ctx.clone()).unwrap();
    stream.open(&path, ReadOptions::default()).unwrap();
    stream.set_loop_length(LoopLength::Frames(1000)).unwrap();
    stream.start(StartAt::Now).unwrap();
    stream.stop_at(StopAt::Never).unwrap();
    prime_reader(&mut stream);

    play_and_check(&h, &mut stream, 25, |time| {
        let position = time as usize % 1000;
        data.get(position).copied().unwrap_or(0.0)
    });
    assert_eq!(stream.state(), ReadState::Stream);
    stream.stop().unwrap();
    assert_eq!(stream.state(), ReadState::Idle);
}

#[test]
fn test_whole_file_plays_once_by_default() {
    let h = Harness::new();
    let dir = tempfile::tempdir().unwrap();
    let (path, data) = fixture(&dir, 650);

    let mut stream = ReadStream::new(1, test_config(), h.ctx.clone()).unwrap();
    let events = stream.events();
    stream.open(&path, ReadOptions::default()).unwrap();
    stream.start(StartAt::Now).unwrap();
    prime_reader(&mut stream);

    play_and_check(&h, &mut stream, 10, |time| {
        data.get(time as usize).copied().unwrap_or(0.0)
    });
    assert_eq!(stream.state(), ReadState::Idle);
    assert_eq!(count_finished(&drain(&events)), 1);
}

#[test]
fn test_loop_start_offsets_region() {
    let h = Harness::new();
    let dir = tempfile::tempdir().unwrap();
    let (path, data) = fixture(&dir, 1000);

    let mut stream = ReadStream::new(1, test_config(), h.ctx.clone()).unwrap();
    stream.open(&path, ReadOptions::default()).unwrap();
    stream.set_loop_start(ftc(100)).unwrap();
    stream.set_loop_length(LoopLength::Frames(250)).unwrap();
    stream.start(StartAt::Now).unwrap();
    stream.stop_at(StopAt::Never).unwrap();
    prime_reader(&mut stream);

    play_and_check(&h, &mut stream, 12, |time| data[100 + time as usize % 250]);
}

#[test]
fn test_onset_skips_frames() {
    let h = Harness::new();
    let dir = tempfile::tempdir().unwrap();
    let (path, data) = fixture(&dir, 1000);

    let mut stream = ReadStream::new(1, test_config(), h.ctx.clone()).unwrap();
    let events = stream.events();
    let options = ReadOptions {
        onset: 400,
        ..Default::default()
    };
    stream.open(&path, options).unwrap();
    stream.start(StartAt::Now).unwrap();
    prime_reader(&mut stream);

    play_and_check(&h, &mut stream, 7, |time| {
        data.get(400 + time as usize).copied().unwrap_or(0.0)
    });
    assert!(drain(&events)
        .iter()
        .any(|e| matches!(e, StreamEvent::FramesAvailable(n) if n.to_frames() == 600)));
}

#[test]
fn test_skipped_block_keeps_alignment() {
    let h = Harness::new();
    let dir = tempfile::tempdir().unwrap();
    let (path, data) = fixture(&dir, FILE_FRAMES);

    let mut stream = ReadStream::new(1, test_config(), h.ctx.clone()).unwrap();
    stream.open(&path, ReadOptions::default()).unwrap();
    stream.start(StartAt::Now).unwrap();
    prime_reader(&mut stream);

    play_and_check(&h, &mut stream, 3, |time| data[time as usize]);

    // The host drops two blocks; the stream skips ahead in its buffer.
    wait_for_buffered(&stream, 4 * TEST_BLOCK);
    h.advance();
    h.advance();
    play_and_check(&h, &mut stream, 3, |time| data[time as usize]);

    assert_eq!(stream.metrics().snapshot().resyncs, 1);
}

#[test]
fn test_stop_now_while_starved() {
    let h = Harness::new();
    let dir = tempfile::tempdir().unwrap();
    let (path, _) = fixture(&dir, FILE_FRAMES);

    let mut stream = ReadStream::new(1, test_config(), h.ctx.clone()).unwrap();
    let events = stream.events();
    stream.open(&path, ReadOptions::default()).unwrap();
    stream.start(StartAt::Now).unwrap();
    assert!(wait_until(|| stream.info().sound_file.is_some()));
    stream.stop_at(StopAt::Now).unwrap();

    // The first block repositions the buffer, so nothing is buffered yet.
    let out = process_mono(&mut stream);
    assert!(out.iter().all(|&x| x == 0.0));
    assert_eq!(stream.state(), ReadState::Idle);
    assert_eq!(count_finished(&drain(&events)), 1);
}

#[test]
fn test_missing_file_reports_failure() {
    let h = Harness::new();
    let dir = tempfile::tempdir().unwrap();

    let mut stream = ReadStream::new(1, test_config(), h.ctx.clone()).unwrap();
    let events = stream.events();
    stream
        .open(dir.path().join("missing.wav"), ReadOptions::default())
        .unwrap();
    stream.start(StartAt::Now).unwrap();

    let mut seen = Vec::new();
    let failed = wait_until(|| {
        let out = process_mono(&mut stream);
        assert!(out.iter().all(|&x| x == 0.0));
        seen.extend(events.try_iter());
        stream.state() == ReadState::Idle
    });
    assert!(failed, "missing file never reported");

    match seen.as_slice() {
        [StreamEvent::Failed { error }, StreamEvent::Finished] => {
            assert!(matches!(**error, CoreError::Io(_)), "error: {}", error);
        }
        other => panic!("unexpected events: {:?}", other),
    }
}

#[test]
fn test_streams_on_one_anchor_agree() {
    let h = Harness::new();
    let dir = tempfile::tempdir().unwrap();
    let (path, data) = fixture(&dir, FILE_FRAMES);

    let bar = h.ctx.anchors.create("bar");
    bar.mark();
    for _ in 0..10 {
        h.advance();
    }

    let mut a = ReadStream::new(1, test_config(), h.ctx.clone()).unwrap();
    let mut b = ReadStream::new(1, test_config(), h.ctx.clone()).unwrap();
    for stream in [&mut a, &mut b] {
        stream.bind_time_authority(Some("bar")).unwrap();
        stream.open(&path, ReadOptions::default()).unwrap();
        stream.start(StartAt::At(ftc(1200))).unwrap();
        stream.stop_at(StopAt::Never).unwrap();
        prime_reader(stream);
        assert_eq!(stream.info().anchor.as_deref(), Some("bar"));
    }

    for _ in 0..6 {
        let t = h.clock.frames() as i64;
        wait_for_buffered(&a, TEST_BLOCK);
        wait_for_buffered(&b, TEST_BLOCK);
        let out_a = process_mono(&mut a);
        let out_b = process_mono(&mut b);
        assert_eq!(out_a, out_b, "block at {}", t);
        for (i, &x) in out_a.iter().enumerate() {
            let time = t + i as i64;
            let expected = if time >= 1200 {
                data[(time - 1200) as usize]
            } else {
                0.0
            };
            assert_eq!(x, expected, "sample at anchor time {}", time);
        }
        h.advance();
    }
}

#[test]
fn test_unknown_anchor_stays_bound() {
    let h = Harness::new();
    let mut stream = ReadStream::new(1, test_config(), h.ctx.clone()).unwrap();
    assert!(stream.bind_time_authority(Some("later")).is_err());
    assert_eq!(stream.info().anchor.as_deref(), Some("later"));

    h.ctx.anchors.create("later");
    stream.prepare(TEST_BLOCK);
    assert!(h.ctx.anchors.get("later").unwrap().is_used_in_stream());
}

#[test]
fn test_commands_before_open() {
    let h = Harness::new();
    let mut stream = ReadStream::new(2, test_config(), h.ctx.clone()).unwrap();
    assert!(stream.start(StartAt::Now).is_err());
    assert!(stream.stop().is_err());
    assert!(stream.set_loop_length(LoopLength::Frames(0)).is_err());
    assert!(stream.set_loop_start(ftc(-5)).is_err());
    assert!(ReadStream::new(0, test_config(), h.ctx.clone()).is_err());

    let mut left = vec![1.0; TEST_BLOCK];
    let mut right = vec![1.0; TEST_BLOCK];
    stream.process(&mut [&mut left[..], &mut right[..]]);
    assert!(left.iter().chain(&right).all(|&x| x == 0.0));
}
