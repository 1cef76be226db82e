//! Counters for one stream's disk traffic and real-time misses.
//!
//! The worker records syscalls, the controller records the blocks it could
//! not serve. Everything is `Relaxed`: the numbers are diagnostics, not
//! synchronization.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct IOMetrics {
    bytes_read: AtomicU64,
    bytes_written: AtomicU64,
    read_ops: AtomicU64,
    write_ops: AtomicU64,
    /// Streaming blocks played as silence because data had not arrived
    underruns: AtomicU64,
    /// Recorded blocks thrown away because the ring buffer had no room
    dropped_blocks: AtomicU64,
    /// Ring buffer resets forced by a new schedule, a loop change or drift
    resyncs: AtomicU64,
}

impl IOMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// One read syscall that returned `bytes`.
    #[inline]
    pub fn record_read(&self, bytes: u64) {
        self.read_ops.fetch_add(1, Ordering::Relaxed);
        self.bytes_read.fetch_add(bytes, Ordering::Relaxed);
    }

    /// One write syscall that committed `bytes`.
    #[inline]
    pub fn record_write(&self, bytes: u64) {
        self.write_ops.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_underrun(&self) {
        self.underruns.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_dropped_block(&self) {
        self.dropped_blocks.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_resync(&self) {
        self.resyncs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> IOMetricsSnapshot {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        IOMetricsSnapshot {
            bytes_read: load(&self.bytes_read),
            bytes_written: load(&self.bytes_written),
            read_ops: load(&self.read_ops),
            write_ops: load(&self.write_ops),
            underruns: load(&self.underruns),
            dropped_blocks: load(&self.dropped_blocks),
            resyncs: load(&self.resyncs),
        }
    }
}

/// Plain copy of [`IOMetrics`], taken with [`IOMetrics::snapshot`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IOMetricsSnapshot {
    pub bytes_read: u64,
    pub bytes_written: u64,
    pub read_ops: u64,
    pub write_ops: u64,
    pub underruns: u64,
    pub dropped_blocks: u64,
    pub resyncs: u64,
}

impl IOMetricsSnapshot {
    /// Blocks the real-time side could not serve, in either direction.
    pub fn missed_blocks(&self) -> u64 {
        self.underruns + self.dropped_blocks
    }
}
