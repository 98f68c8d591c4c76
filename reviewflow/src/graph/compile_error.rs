//! Graph compilation error.
//!
//! Returned by `StateGraph::compile`. Every configuration mistake is refused
//! here, before anything runs: the engine never discovers a dangling edge or
//! an undeclared state key at dispatch time.

use thiserror::Error;

/// Error when compiling a state graph. Checks run in a fixed order; the
/// first violation wins.
#[derive(Debug, Error)]
pub enum CompilationError {
    /// The same node name was registered twice.
    #[error("duplicate node name: {0}")]
    DuplicateNode(String),

    /// START or END was registered as a user node.
    #[error("node name '{0}' is reserved")]
    ReservedNodeName(String),

    /// An edge endpoint, branch target, or interrupt-before entry names a
    /// node that was never registered.
    #[error("node not found: {0}")]
    UnknownNode(String),

    /// An edge uses END as its source.
    #[error("edge from END is not allowed (edge to '{0}')")]
    EdgeFromEnd(String),

    /// An edge or branch uses START as its target.
    #[error("edge to START is not allowed (edge from '{0}')")]
    EdgeToStart(String),

    /// No edge leaves START, or more than one does.
    #[error("graph must have exactly one edge from START")]
    MissingStart,

    /// A node has more than one direct edge, or more than one conditional
    /// edge set.
    #[error("node '{0}' has more than one outgoing edge of the same kind")]
    DuplicateEdge(String),

    /// A node has both a direct and a conditional edge; the successor would
    /// be ambiguous.
    #[error("node '{0}' has both a direct and a conditional edge")]
    ConflictingEdges(String),

    /// A conditional edge's branch map has no entry for the END label.
    #[error("conditional edge from '{0}' must map the END label")]
    MissingEndBranch(String),

    /// A node other than END has no outgoing edge.
    #[error("node '{0}' has no outgoing edge")]
    NoOutgoingEdge(String),

    /// A node cannot be reached from START over direct and conditional edges.
    #[error("node '{0}' is unreachable from START")]
    Unreachable(String),

    /// A step's declared write or a router's declared read names a state key
    /// with no merge policy.
    #[error("node '{node}' references undeclared state key '{key}'")]
    UndeclaredKey { node: String, key: String },
}
