//! Checkpoint and status-snapshot types.
//!
//! A checkpoint is written after every node completes, so a paused or crashed
//! run can resume exactly where it left off. `pending_nodes` is the ordered
//! list of node names not yet run; an empty list means the run reached END.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::state::WorkflowState;

/// What produced the checkpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CheckpointSource {
    /// Initial write on `start`, before any node has run.
    Input,
    /// Per-node write from the executor loop.
    Loop,
    /// Write at an interrupt-before node, pending external feedback.
    Interrupt,
    /// Write on `resume`, after the feedback delta was merged.
    Resume,
}

/// Metadata for one checkpoint (source, step counter, creation time).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    pub source: CheckpointSource,
    /// Number of nodes run so far on this thread, across resumes.
    pub step: u64,
    pub created_at: Option<SystemTime>,
}

/// One checkpoint: state snapshot plus resumption point.
///
/// **Interaction**: Produced by the executor loop after every node; consumed
/// by [`Checkpointer::put`](super::Checkpointer::put), read back on `resume`
/// and `inspect`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: String,
    pub ts: String,
    pub state: WorkflowState,
    /// Ordered node names not yet run. Empty once the run reached END.
    pub pending_nodes: Vec<String>,
    /// True while the thread is paused at an interrupt-before node.
    pub interrupted: bool,
    pub metadata: CheckpointMetadata,
}

impl Checkpoint {
    /// Creates a checkpoint from the current state and pending nodes. Uses
    /// current time for id/ts.
    pub fn new(
        state: WorkflowState,
        pending_nodes: Vec<String>,
        interrupted: bool,
        source: CheckpointSource,
        step: u64,
    ) -> Self {
        let now = SystemTime::now();
        let ts = format!(
            "{}",
            now.duration_since(SystemTime::UNIX_EPOCH)
                .map(|d| d.as_millis())
                .unwrap_or(0)
        );
        let id = format!("{}-{}", ts, step);
        Self {
            id,
            ts,
            state,
            pending_nodes,
            interrupted,
            metadata: CheckpointMetadata {
                source,
                step,
                created_at: Some(now),
            },
        }
    }

    /// True when the run reached END; a terminal thread id may be started fresh.
    pub fn is_terminal(&self) -> bool {
        self.pending_nodes.is_empty()
    }
}

/// Read-only status view for one thread id, returned by
/// [`CompiledGraph::inspect`](crate::graph::CompiledGraph::inspect).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub state: WorkflowState,
    pub pending_nodes: Vec<String>,
    pub interrupted: bool,
}

impl From<Checkpoint> for StateSnapshot {
    fn from(cp: Checkpoint) -> Self {
        Self {
            state: cp.state,
            pending_nodes: cp.pending_nodes,
            interrupted: cp.interrupted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// **Scenario**: A checkpoint with pending nodes is non-terminal; one
    /// with an empty list is terminal.
    #[test]
    fn is_terminal_tracks_pending_nodes() {
        let pending = Checkpoint::new(
            WorkflowState::new(),
            vec!["human_review".into()],
            true,
            CheckpointSource::Interrupt,
            3,
        );
        assert!(!pending.is_terminal());
        let done = Checkpoint::new(WorkflowState::new(), vec![], false, CheckpointSource::Loop, 8);
        assert!(done.is_terminal());
    }

    /// **Scenario**: Checkpoints round-trip through JSON (durable stores
    /// serialize them).
    #[test]
    fn checkpoint_serde_roundtrip() {
        let cp = Checkpoint::new(
            WorkflowState::new(),
            vec!["a".into(), "b".into()],
            false,
            CheckpointSource::Input,
            0,
        );
        let bytes = serde_json::to_vec(&cp).unwrap();
        let back: Checkpoint = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(back.id, cp.id);
        assert_eq!(back.pending_nodes, cp.pending_nodes);
        assert!(!back.interrupted);
    }

    /// **Scenario**: StateSnapshot::from copies the checkpoint's resumption fields.
    #[test]
    fn snapshot_from_checkpoint() {
        let cp = Checkpoint::new(
            WorkflowState::new(),
            vec!["c".into()],
            true,
            CheckpointSource::Interrupt,
            2,
        );
        let snap = StateSnapshot::from(cp);
        assert_eq!(snap.pending_nodes, vec!["c".to_string()]);
        assert!(snap.interrupted);
    }
}
