//! Request codes exchanged between a stream controller and its worker.

/// What the controller wants the worker to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum Request {
    /// Idle until woken.
    #[default]
    Nothing,
    /// Open (read) or create (write) the file named in the shared parameters.
    Open,
    /// Transferring. The worker switches `Open` to `Busy` when it picks the
    /// request up, so a repeated `Open` is distinguishable from the one in
    /// progress.
    Busy,
    /// Finish the current file: drain and finalize for writes, close for reads.
    Close,
    /// `Close`, then the worker thread exits.
    Quit,
}

/// Outcome of one worker transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    /// Bytes moved and cursors advanced.
    Transferred,
    /// Bytes moved but the buffer was reset meanwhile; nothing committed.
    Discarded,
    /// Nothing to do until the controller consumes or produces more.
    Idle,
    /// The request changed while unlocked; leave the transfer loop.
    Superseded,
}
