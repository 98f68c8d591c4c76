//! Run-session output: the ordered event stream of one execution.
//!
//! Each `start`/`resume` call spawns one executor task and returns a
//! [`RunSession`] over a bounded channel. Events for one session are totally
//! ordered: a streaming step's fragments arrive in emission order and
//! strictly before that node's [`RunEvent::NodeComplete`], which is sent
//! only after the node's checkpoint was persisted. A slow consumer
//! backpressures the loop, including mid-node on streaming fragments;
//! dropping the session cancels the run, leaving the last persisted
//! checkpoint intact.

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use serde_json::Value;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::Stream;

use crate::state::WorkflowState;

/// One event on a run session's output stream.
#[derive(Debug, Clone)]
pub enum RunEvent {
    /// Informational fragment from a streaming step, in emission order.
    /// Never merged into state.
    Chunk { node: String, chunk: Value },

    /// A node finished and its delta was merged and persisted. Carries the
    /// resulting state view and a millisecond timestamp.
    NodeComplete {
        node: String,
        state: WorkflowState,
        at_ms: u64,
    },

    /// Terminal: execution paused before an interrupt-before node; the
    /// checkpoint is persisted and the thread awaits `resume`.
    Interrupted { node: String, state: WorkflowState },

    /// Terminal: the run reached END.
    Completed { state: WorkflowState },

    /// Terminal: the session failed; the checkpoint from before the failing
    /// node is left intact, so `resume` may retry once the cause is fixed.
    Failed {
        node: Option<String>,
        message: String,
    },
}

impl RunEvent {
    /// True for the three terminal variants that close the session.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunEvent::Interrupted { .. } | RunEvent::Completed { .. } | RunEvent::Failed { .. }
        )
    }
}

/// One execution of a compiled graph against one thread id.
///
/// **Interaction**: Returned by [`CompiledGraph::start`](crate::graph::CompiledGraph::start)
/// and [`resume`](crate::graph::CompiledGraph::resume). Implements
/// [`Stream`]; the channel closes after a terminal event. Dropping the
/// session early stops the executor before it invokes another step.
pub struct RunSession {
    events: ReceiverStream<RunEvent>,
}

impl RunSession {
    pub(crate) fn new(events: ReceiverStream<RunEvent>) -> Self {
        Self { events }
    }
}

impl Stream for RunSession {
    type Item = RunEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.events).poll_next(cx)
    }
}

impl fmt::Debug for RunSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunSession").finish_non_exhaustive()
    }
}
