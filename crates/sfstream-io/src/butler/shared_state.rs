//! State shared between a stream controller and its worker thread.
//!
//! Everything here sits behind one mutex per stream. The two condition
//! variables carry the signalling: the controller wakes the worker when it
//! posts a request or frees/produces data, the worker wakes the controller
//! when a request completes or data moved.

use super::fifo::Fifo;
use super::request::Request;
use parking_lot::{Condvar, Mutex, MutexGuard};
use sfstream_core::Error;
use std::sync::Arc;

/// Mutex-protected part, generic over the direction's parameters.
pub(crate) struct SharedState<P> {
    pub request: Request,
    pub fifo: Fifo,
    /// Failure recorded by the worker, surfaced once by the controller.
    pub error: Option<Arc<Error>>,
    pub params: P,
}

pub(crate) type Guard<'a, P> = MutexGuard<'a, SharedState<P>>;

pub(crate) struct Shared<P> {
    pub state: Mutex<SharedState<P>>,
    /// Controller to worker.
    pub wake_worker: Condvar,
    /// Worker to controller.
    pub wake_caller: Condvar,
}

impl<P> Shared<P> {
    pub fn new(fifo: Fifo, params: P) -> Self {
        Self {
            state: Mutex::new(SharedState {
                request: Request::Nothing,
                fifo,
                error: None,
                params,
            }),
            wake_worker: Condvar::new(),
            wake_caller: Condvar::new(),
        }
    }

    #[inline]
    pub fn lock(&self) -> Guard<'_, P> {
        self.state.lock()
    }

    #[inline]
    pub fn signal_worker(&self) {
        self.wake_worker.notify_one();
    }

    #[inline]
    pub fn signal_caller(&self) {
        self.wake_caller.notify_all();
    }

    /// Block the controller until the worker returns to `Nothing`.
    pub fn wait_until_idle(&self, guard: &mut Guard<'_, P>) {
        while guard.request != Request::Nothing {
            self.signal_worker();
            self.wake_caller.wait(guard);
        }
    }
}
