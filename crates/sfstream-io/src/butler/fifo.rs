//! Byte ring buffer shared by a stream controller and its worker.
//!
//! `head` is where the producer writes next, `tail` where the consumer reads
//! next. `head == tail` always means empty, so the producer never fills the
//! buffer to exact capacity. All cursor arithmetic lives here so the read and
//! write directions cannot disagree about wraparound or occupancy.

/// Fixed-allocation ring buffer with an adjustable active size.
pub struct Fifo {
    buf: Box<[u8]>,
    size: usize,
    head: usize,
    tail: usize,
    eof: bool,
    generation: u64,
}

impl Fifo {
    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            buf: vec![0u8; bytes].into_boxed_slice(),
            size: bytes,
            head: 0,
            tail: 0,
            eof: false,
            generation: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Active size in bytes.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Round the active size down to whole blocks of `bytes_per_frame *
    /// block_frames` and empty the buffer.
    pub fn configure(&mut self, bytes_per_frame: usize, block_frames: usize) -> usize {
        let capacity = self.buf.len();
        let quantum = bytes_per_frame.max(1) * block_frames.max(1);
        self.size = if quantum <= capacity {
            capacity - capacity % quantum
        } else {
            capacity - capacity % bytes_per_frame.max(1)
        };
        self.reset();
        self.size
    }

    /// Empty the buffer. Any transfer computed against the old cursors is
    /// invalidated, which the worker detects through [`generation`](Self::generation).
    pub fn reset(&mut self) {
        self.head = 0;
        self.tail = 0;
        self.eof = false;
        self.generation = self.generation.wrapping_add(1);
    }

    #[inline]
    pub fn head(&self) -> usize {
        self.head
    }

    #[inline]
    pub fn tail(&self) -> usize {
        self.tail
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[inline]
    pub fn is_eof(&self) -> bool {
        self.eof
    }

    pub fn set_eof(&mut self, eof: bool) {
        self.eof = eof;
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    /// Occupied bytes.
    #[inline]
    pub fn len(&self) -> usize {
        if self.head >= self.tail {
            self.head - self.tail
        } else {
            self.size - self.tail + self.head
        }
    }

    /// Bytes the producer may still add without making the buffer look empty.
    #[inline]
    pub fn vacant(&self) -> usize {
        self.size.saturating_sub(self.len() + 1)
    }

    /// Size of the next producer transfer, at most `quantum`, or 0 when the
    /// producer should wait.
    ///
    /// A transfer never crosses the end of the buffer and never lands `head`
    /// on `tail`. While `tail` sits at 0 the last `quantum` bytes stay free,
    /// and behind the tail a full quantum of room is required.
    pub fn producer_chunk(&self, quantum: usize) -> usize {
        if self.size == 0 {
            return 0;
        }
        if self.head >= self.tail {
            let to_end = self.size - self.head;
            if self.tail == 0 && to_end <= quantum {
                0
            } else {
                to_end.min(quantum)
            }
        } else {
            let room = self.tail - self.head - 1;
            if room < quantum {
                0
            } else {
                quantum
            }
        }
    }

    /// Size of the next consumer transfer, at most `quantum`, or 0 when the
    /// consumer should wait for more data.
    ///
    /// Data is taken when it wraps, when a full quantum is waiting, or when
    /// `draining` and anything is left.
    pub fn consumer_chunk(&self, quantum: usize, draining: bool) -> usize {
        let wrapped = self.head < self.tail;
        if wrapped || self.head >= self.tail + quantum || (draining && !self.is_empty()) {
            let end = if wrapped { self.size } else { self.head };
            (end - self.tail).min(quantum)
        } else {
            0
        }
    }

    pub fn advance_head(&mut self, bytes: usize) {
        debug_assert!(bytes <= self.size);
        self.head = (self.head + bytes) % self.size;
    }

    pub fn advance_tail(&mut self, bytes: usize) {
        debug_assert!(bytes <= self.len());
        self.tail = (self.tail + bytes) % self.size;
    }

    /// Move the tail back by `bytes`, re-exposing data behind it.
    pub fn retreat_tail(&mut self, bytes: usize) {
        let bytes = bytes.min(self.size.saturating_sub(1));
        self.tail = (self.tail + self.size - bytes) % self.size;
    }

    /// Mark everything written so far as consumed.
    pub fn catch_up_tail(&mut self) {
        self.tail = self.head;
    }

    /// Copy `src` in at `head`, wrapping if needed. Cursors are not moved.
    pub fn write_at_head(&mut self, src: &[u8]) {
        let first = src.len().min(self.size - self.head);
        self.buf[self.head..self.head + first].copy_from_slice(&src[..first]);
        let rest = src.len() - first;
        self.buf[..rest].copy_from_slice(&src[first..]);
    }

    /// Copy `dst.len()` bytes starting `skip` bytes past `tail`, wrapping if
    /// needed. Cursors are not moved.
    pub fn read_at_tail(&self, skip: usize, dst: &mut [u8]) {
        let start = (self.tail + skip) % self.size;
        let first = dst.len().min(self.size - start);
        dst[..first].copy_from_slice(&self.buf[start..start + first]);
        let rest = dst.len() - first;
        dst[first..].copy_from_slice(&self.buf[..rest]);
    }

    /// Contiguous bytes at `tail`, as sized by [`consumer_chunk`](Self::consumer_chunk).
    pub fn chunk_at_tail(&self, bytes: usize) -> &[u8] {
        &self.buf[self.tail..self.tail + bytes]
    }
}

impl std::fmt::Debug for Fifo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fifo")
            .field("size", &self.size)
            .field("head", &self.head)
            .field("tail", &self.tail)
            .field("eof", &self.eof)
            .field("generation", &self.generation)
            .finish()
    }
}
