//! Run-time error types for graph execution.
//!
//! Build-time validation failures live in [`CompilationError`](crate::graph::CompilationError);
//! everything that can go wrong once a graph is compiled is covered here.
//! Concurrency and lookup errors are returned synchronously from `start` /
//! `resume` / `inspect`; step, router, and store errors that occur inside a
//! running session surface as a terminal [`RunEvent::Failed`](crate::stream::RunEvent)
//! on the session stream instead.

use thiserror::Error;

use crate::memory::CheckpointError;
use crate::state::StateError;

/// Error raised by a pluggable step implementation.
///
/// Steps must not use errors for expected business outcomes (carry decisions
/// in state fields instead); an error here means the step itself could not
/// produce a delta.
#[derive(Debug, Error)]
pub enum StepError {
    /// Step execution failed with a message (e.g. model call failed).
    #[error("step failed: {0}")]
    Failed(String),

    /// A streaming step's fragment sequence ended without a final delta.
    #[error("stream ended without a final delta")]
    MissingFinalDelta,
}

/// Error for one engine operation (`start`, `resume`, `inspect`) or one
/// running session.
///
/// `SessionActive`, `ThreadBusy`, and `NotInterrupted` are concurrency
/// violations: they are reported before any state mutation occurs.
#[derive(Debug, Error)]
pub enum RunError {
    /// A session for this thread id is currently running; calls must not interleave.
    #[error("thread '{0}' already has an active session")]
    SessionActive(String),

    /// `start` was called but the thread already has a non-terminal checkpoint.
    #[error("thread '{0}' has an unfinished run; resume it or use a new thread id")]
    ThreadBusy(String),

    /// No checkpoint exists for this thread id.
    #[error("thread '{0}' has no checkpoint")]
    UnknownThread(String),

    /// `resume` was called but the thread's checkpoint is terminal: the run
    /// already completed and there is nothing to continue.
    #[error("thread '{0}' has no unfinished run to resume")]
    NotInterrupted(String),

    /// A step raised an error; the checkpoint from before this node is left intact.
    #[error("node '{node}' failed: {source}")]
    Step {
        node: String,
        #[source]
        source: StepError,
    },

    /// A router produced a label with no entry in its branch map. Never
    /// defaulted silently; the session terminates.
    #[error("router after '{node}' returned unmapped label '{label}'")]
    UnmappedLabel { node: String, label: String },

    /// A pending node name does not exist in the compiled graph (corrupt or
    /// foreign checkpoint).
    #[error("pending node '{0}' is not part of this graph")]
    UnknownPendingNode(String),

    /// The configured step-count ceiling was exceeded (loop guard).
    #[error("step limit {0} exceeded")]
    StepLimitExceeded(u32),

    /// A delta or feedback referenced a key with no declared merge policy.
    #[error(transparent)]
    State(#[from] StateError),

    /// The checkpoint store failed; the session does not proceed past the
    /// node it was about to persist.
    #[error(transparent)]
    Store(#[from] CheckpointError),
}
