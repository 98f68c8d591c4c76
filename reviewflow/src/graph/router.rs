//! Router: runtime choice of the next node on a conditional edge.

use crate::state::WorkflowState;

/// Maps state to a symbolic label; the conditional edge's branch map turns
/// the label into the successor node.
///
/// Routers run against the state produced by the source node, after its
/// delta was merged. A label missing from the branch map is a fatal error,
/// never silently defaulted; routers that want a fallback must return a
/// mapped label (conventionally the END label) themselves.
pub trait Router: Send + Sync {
    /// State keys this router reads. Checked against the declared schema at
    /// compile time.
    fn reads(&self) -> Vec<String> {
        Vec::new()
    }

    /// Picks a label from the current state.
    fn route(&self, state: &WorkflowState) -> String;
}

/// Router built from a plain function; convenient for tests and small graphs.
pub struct FnRouter<F> {
    reads: Vec<String>,
    f: F,
}

impl<F> FnRouter<F>
where
    F: Fn(&WorkflowState) -> String + Send + Sync,
{
    pub fn new(reads: impl IntoIterator<Item = impl Into<String>>, f: F) -> Self {
        Self {
            reads: reads.into_iter().map(Into::into).collect(),
            f,
        }
    }
}

impl<F> Router for FnRouter<F>
where
    F: Fn(&WorkflowState) -> String + Send + Sync,
{
    fn reads(&self) -> Vec<String> {
        self.reads.clone()
    }

    fn route(&self, state: &WorkflowState) -> String {
        (self.f)(state)
    }
}
