//! Notifications a stream sends back to its host.
//!
//! Events are queued on a bounded channel from the processing thread with
//! `try_send`, so a host that stops draining them never blocks a block.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use sfstream_core::{Error, FrameTimeCode};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// Frames in the opened file, reported once per open.
    FramesAvailable(FrameTimeCode),
    /// Logical time at which recording actually began.
    Started(FrameTimeCode),
    /// Frames committed to the finished file.
    FramesWritten(FrameTimeCode),
    /// Playback ended or recording stopped.
    Finished,
    /// The worker could not open, read or write the file.
    Failed { error: Arc<Error> },
}

pub(crate) struct EventQueue {
    tx: Sender<StreamEvent>,
    rx: Receiver<StreamEvent>,
}

impl EventQueue {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity.max(1));
        Self { tx, rx }
    }

    pub fn subscribe(&self) -> Receiver<StreamEvent> {
        self.rx.clone()
    }

    pub fn emit(&self, event: StreamEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                tracing::warn!(?event, "stream event queue full, dropping event");
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}
