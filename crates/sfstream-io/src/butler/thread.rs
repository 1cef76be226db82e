//! Worker thread that moves bytes between a stream's ring buffer and disk.
//!
//! One worker serves one stream. The controller posts a [`Request`] under the
//! shared mutex and signals; the worker performs it, dropping the lock around
//! every syscall, and signals back. The direction-specific work is a
//! [`Transfer`], so reading and writing share a single loop.

use super::fifo::Fifo;
use super::request::{Request, Step};
use super::shared_state::{Guard, Shared, SharedState};
use crate::error::Result;
use sfstream_core::Error;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thread_priority::ThreadPriority;

/// Direction-specific half of the worker loop.
///
/// Every method is called with the shared mutex held and may release it
/// around I/O with `MutexGuard::unlocked`. After re-locking, an
/// implementation must re-check the request and the buffer generation
/// before committing anything.
pub(crate) trait Transfer: Send + 'static {
    type Params: Send + 'static;

    /// Used in thread names and log fields.
    const DIRECTION: &'static str;

    fn is_open(&self) -> bool;

    /// Open or create the file named in the parameters.
    fn open(&mut self, guard: &mut Guard<'_, Self::Params>) -> sfstream_core::Result<()>;

    /// Whether the transfer loop should run another step.
    fn keep_going(&self, state: &SharedState<Self::Params>) -> bool;

    fn step(&mut self, guard: &mut Guard<'_, Self::Params>) -> sfstream_core::Result<Step>;

    /// Called once when the transfer loop exits, for any reason.
    fn after_transfer(&mut self, guard: &mut Guard<'_, Self::Params>);

    /// Complete and close the current file.
    fn finish(&mut self, guard: &mut Guard<'_, Self::Params>);
}

/// Owns a worker thread and the state it shares with the controller.
///
/// Dropping the engine asks the worker to quit, waits for it to finish the
/// current file, and joins it.
pub(crate) struct Engine<P: Send + 'static> {
    shared: Arc<Shared<P>>,
    handle: Option<JoinHandle<()>>,
}

impl<P: Send + 'static> Engine<P> {
    pub fn spawn<T>(transfer: T, fifo: Fifo, params: P, elevate_priority: bool) -> Result<Self>
    where
        T: Transfer<Params = P>,
    {
        let shared = Arc::new(Shared::new(fifo, params));
        let worker_shared = Arc::clone(&shared);

        let handle = thread::Builder::new()
            .name(format!("sfstream-{}", T::DIRECTION))
            .spawn(move || {
                if elevate_priority {
                    if let Err(e) = thread_priority::set_current_thread_priority(ThreadPriority::Max) {
                        tracing::debug!(direction = T::DIRECTION, error = ?e, "could not raise worker priority");
                    }
                }
                worker_loop(&worker_shared, transfer);
            })
            .map_err(|e| crate::error::Error::Butler(format!("could not spawn worker: {e}")))?;

        Ok(Self {
            shared,
            handle: Some(handle),
        })
    }

    #[inline]
    pub fn shared(&self) -> &Shared<P> {
        &self.shared
    }
}

impl<P: Send + 'static> Drop for Engine<P> {
    fn drop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        {
            let mut guard = self.shared.lock();
            guard.request = Request::Quit;
            while guard.request != Request::Nothing && !handle.is_finished() {
                self.shared.signal_worker();
                self.shared
                    .wake_caller
                    .wait_for(&mut guard, Duration::from_millis(100));
            }
        }
        if handle.join().is_err() {
            tracing::error!("stream worker panicked");
        }
    }
}

fn record_failure<P>(guard: &mut Guard<'_, P>, error: Error, direction: &'static str) {
    tracing::error!(direction, %error, "stream transfer failed");
    guard.error = Some(Arc::new(error));
    guard.fifo.set_eof(true);
}

fn worker_loop<T: Transfer>(shared: &Shared<T::Params>, mut transfer: T) {
    let mut guard = shared.lock();
    tracing::trace!(direction = T::DIRECTION, "stream worker started");

    loop {
        match guard.request {
            Request::Nothing => {
                shared.signal_caller();
                shared.wake_worker.wait(&mut guard);
            }
            Request::Open => {
                guard.request = Request::Busy;
                guard.error = None;

                if transfer.is_open() {
                    transfer.finish(&mut guard);
                    if guard.request != Request::Busy {
                        continue;
                    }
                }

                match transfer.open(&mut guard) {
                    Ok(()) => {
                        while transfer.keep_going(&guard) {
                            match transfer.step(&mut guard) {
                                Ok(Step::Transferred) => shared.signal_caller(),
                                Ok(Step::Idle) => {
                                    shared.signal_caller();
                                    shared.wake_worker.wait(&mut guard);
                                }
                                Ok(Step::Discarded) => {}
                                Ok(Step::Superseded) => break,
                                Err(e) => {
                                    record_failure(&mut guard, e, T::DIRECTION);
                                    break;
                                }
                            }
                        }
                    }
                    Err(e) => record_failure(&mut guard, e, T::DIRECTION),
                }

                if guard.request == Request::Busy {
                    guard.request = Request::Nothing;
                }
                transfer.after_transfer(&mut guard);
                shared.signal_caller();
            }
            Request::Close | Request::Quit => {
                if transfer.is_open() {
                    transfer.finish(&mut guard);
                }
                match guard.request {
                    Request::Quit => {
                        guard.request = Request::Nothing;
                        shared.signal_caller();
                        break;
                    }
                    Request::Close => guard.request = Request::Nothing,
                    _ => {}
                }
                shared.signal_caller();
            }
            Request::Busy => guard.request = Request::Nothing,
        }
    }

    tracing::trace!(direction = T::DIRECTION, "stream worker exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[derive(Default)]
    struct Log {
        events: Vec<&'static str>,
        fail_open: bool,
    }

    /// Fills the buffer with a constant byte, one 8-byte chunk at a time.
    struct FillTransfer {
        open: bool,
    }

    impl Transfer for FillTransfer {
        type Params = Log;
        const DIRECTION: &'static str = "test";

        fn is_open(&self) -> bool {
            self.open
        }

        fn open(&mut self, guard: &mut Guard<'_, Log>) -> sfstream_core::Result<()> {
            guard.params.events.push("open");
            if guard.params.fail_open {
                return Err(Error::EmptyFile);
            }
            guard.fifo.configure(1, 8);
            self.open = true;
            Ok(())
        }

        fn keep_going(&self, state: &SharedState<Log>) -> bool {
            state.request == Request::Busy
        }

        fn step(&mut self, guard: &mut Guard<'_, Log>) -> sfstream_core::Result<Step> {
            let n = guard.fifo.producer_chunk(8);
            if n == 0 {
                return Ok(Step::Idle);
            }
            guard.fifo.write_at_head(&[7u8; 8][..n]);
            guard.fifo.advance_head(n);
            Ok(Step::Transferred)
        }

        fn after_transfer(&mut self, guard: &mut Guard<'_, Log>) {
            guard.params.events.push("after");
        }

        fn finish(&mut self, guard: &mut Guard<'_, Log>) {
            guard.params.events.push("finish");
            self.open = false;
        }
    }

    fn wait_for<P>(shared: &Shared<P>, mut done: impl FnMut(&SharedState<P>) -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut guard = shared.lock();
        while !done(&guard) {
            assert!(Instant::now() < deadline, "worker did not respond");
            shared.wake_caller.wait_for(&mut guard, Duration::from_millis(10));
        }
    }

    #[test]
    fn test_open_fill_close() {
        let engine = Engine::spawn(
            FillTransfer { open: false },
            Fifo::with_capacity(64),
            Log::default(),
            false,
        )
        .unwrap();
        let shared = engine.shared();

        {
            let mut guard = shared.lock();
            guard.request = Request::Open;
            shared.signal_worker();
        }
        wait_for(shared, |state| state.fifo.len() == 56);

        {
            let mut guard = shared.lock();
            guard.request = Request::Close;
            shared.signal_worker();
            shared.wait_until_idle(&mut guard);
            assert_eq!(guard.params.events, vec!["open", "after", "finish"]);
            assert!(guard.error.is_none());
        }
    }

    #[test]
    fn test_open_failure_is_recorded() {
        let log = Log {
            fail_open: true,
            ..Default::default()
        };
        let engine = Engine::spawn(FillTransfer { open: false }, Fifo::with_capacity(64), log, false)
            .unwrap();
        let shared = engine.shared();

        {
            let mut guard = shared.lock();
            guard.request = Request::Open;
            shared.signal_worker();
        }
        wait_for(shared, |state| state.error.is_some() && state.request == Request::Nothing);

        let guard = shared.lock();
        assert!(guard.fifo.is_eof());
        assert!(matches!(guard.error.as_deref(), Some(Error::EmptyFile)));
    }

    #[test]
    fn test_drop_finishes_open_file() {
        let engine = Engine::spawn(
            FillTransfer { open: false },
            Fifo::with_capacity(64),
            Log::default(),
            false,
        )
        .unwrap();
        let shared = Arc::clone(&engine.shared);
        {
            let mut guard = shared.lock();
            guard.request = Request::Open;
            shared.signal_worker();
        }
        wait_for(&shared, |state| state.fifo.len() > 0);
        drop(engine);

        let guard = shared.lock();
        assert_eq!(guard.request, Request::Nothing);
        assert_eq!(guard.params.events.last(), Some(&"finish"));
    }
}
