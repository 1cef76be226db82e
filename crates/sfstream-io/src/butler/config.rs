//! Stream buffer configuration.

use serde::{Deserialize, Serialize};

/// Bytes per worker read/write syscall.
pub const IO_CHUNK_BYTES: usize = 65536;

/// Sizes and pacing for one stream's ring buffer and worker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Ring buffer bytes per channel (default: 262144)
    pub buffer_bytes_per_channel: usize,
    /// Lower bound on the ring buffer (default: 4 x 64 KiB)
    pub min_buffer_bytes: usize,
    /// Upper bound on the ring buffer (default: 16 MiB)
    pub max_buffer_bytes: usize,
    /// Largest single read/write the worker issues (default: 64 KiB)
    pub io_chunk_bytes: usize,
    /// Frames per processed block (default: 64)
    pub block_size: usize,
    /// The worker is woken this many times per buffer's worth of blocks (default: 16)
    pub wake_divisions: usize,
    /// Pending notifications kept for the host before new ones are dropped (default: 64)
    pub event_capacity: usize,
    /// Run the worker at maximum thread priority (default: true)
    pub elevate_worker_priority: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            buffer_bytes_per_channel: 262_144,
            min_buffer_bytes: 4 * IO_CHUNK_BYTES,
            max_buffer_bytes: 16 * 1024 * 1024,
            io_chunk_bytes: IO_CHUNK_BYTES,
            block_size: 64,
            wake_divisions: 16,
            event_capacity: 64,
            elevate_worker_priority: true,
        }
    }
}

impl StreamConfig {
    /// Config with a custom block size.
    pub fn with_block_size(block_size: usize) -> Self {
        Self {
            block_size: block_size.max(1),
            ..Default::default()
        }
    }

    /// Ring buffer allocation for `channels`, clamped to the configured bounds.
    pub fn buffer_bytes(&self, channels: usize) -> usize {
        self.buffer_bytes_per_channel
            .saturating_mul(channels.max(1))
            .clamp(self.min_buffer_bytes, self.max_buffer_bytes.max(self.min_buffer_bytes))
    }

    /// Blocks between worker wake-ups for a ring buffer of `fifo_size` bytes.
    pub fn wake_period(&self, fifo_size: usize, bytes_per_frame: usize) -> usize {
        let per_wake = self.wake_divisions.max(1) * bytes_per_frame.max(1) * self.block_size.max(1);
        (fifo_size / per_wake).max(1)
    }
}
