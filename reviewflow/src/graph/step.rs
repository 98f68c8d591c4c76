//! Step: one unit of work, atomic or streaming.
//!
//! A step receives a read-only state view and contributes a
//! [`StateDelta`]. Atomic steps return it once; streaming steps emit a lazy,
//! finite sequence of fragments where every fragment but the last is
//! informational and only the terminal one is merged into state. Steps are
//! stateless descriptors owned by the graph; the engine does not know what a
//! step computes.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value;

use crate::error::StepError;
use crate::state::{StateDelta, WorkflowState};

/// One emission from a streaming step.
#[derive(Debug, Clone)]
pub enum StepEmission {
    /// Informational fragment, forwarded to the session stream as a
    /// [`RunEvent::Chunk`](crate::stream::RunEvent) and never merged.
    Partial(Value),
    /// Terminal fragment: the delta merged into state. The executor stops
    /// polling the stream after this.
    Final(StateDelta),
}

/// The fragment sequence produced by one streaming-step invocation.
/// Finite and non-restartable.
pub type StepStream = BoxStream<'static, Result<StepEmission, StepError>>;

/// A step that produces its whole delta in one call.
#[async_trait]
pub trait AtomicStep: Send + Sync {
    /// State keys this step may write. Checked against the declared schema
    /// at compile time.
    fn writes(&self) -> Vec<String>;

    /// Runs the step against a read-only state view.
    async fn run(&self, state: &WorkflowState) -> Result<StateDelta, StepError>;
}

/// A step that emits partial fragments before its terminal delta.
pub trait StreamingStep: Send + Sync {
    /// State keys this step may write. Checked against the declared schema
    /// at compile time.
    fn writes(&self) -> Vec<String>;

    /// Starts the step; the returned stream ends with [`StepEmission::Final`].
    /// The snapshot is owned so the stream can outlive the call.
    fn run(&self, state: WorkflowState) -> StepStream;
}

/// A registered step: the closed set of step shapes the executor dispatches on.
#[derive(Clone)]
pub enum Step {
    Atomic(Arc<dyn AtomicStep>),
    Streaming(Arc<dyn StreamingStep>),
}

impl Step {
    /// Wraps an [`AtomicStep`] implementation.
    pub fn atomic(step: impl AtomicStep + 'static) -> Self {
        Step::Atomic(Arc::new(step))
    }

    /// Wraps a [`StreamingStep`] implementation.
    pub fn streaming(step: impl StreamingStep + 'static) -> Self {
        Step::Streaming(Arc::new(step))
    }

    /// Builds an atomic step from a plain function; convenient for tests and
    /// glue steps that need no async work.
    pub fn atomic_fn<F>(writes: impl IntoIterator<Item = impl Into<String>>, f: F) -> Self
    where
        F: Fn(&WorkflowState) -> Result<StateDelta, StepError> + Send + Sync + 'static,
    {
        Step::Atomic(Arc::new(FnStep {
            writes: writes.into_iter().map(Into::into).collect(),
            f,
        }))
    }

    /// Declared write keys of the underlying step.
    pub fn writes(&self) -> Vec<String> {
        match self {
            Step::Atomic(step) => step.writes(),
            Step::Streaming(step) => step.writes(),
        }
    }
}

struct FnStep<F> {
    writes: Vec<String>,
    f: F,
}

#[async_trait]
impl<F> AtomicStep for FnStep<F>
where
    F: Fn(&WorkflowState) -> Result<StateDelta, StepError> + Send + Sync,
{
    fn writes(&self) -> Vec<String> {
        self.writes.clone()
    }

    async fn run(&self, state: &WorkflowState) -> Result<StateDelta, StepError> {
        (self.f)(state)
    }
}
