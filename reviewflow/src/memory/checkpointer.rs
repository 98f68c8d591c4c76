//! Checkpointer trait: the abstract checkpoint store.

use async_trait::async_trait;
use thiserror::Error;

use super::Checkpoint;

/// Error from a checkpoint store operation.
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// State could not be serialized or deserialized.
    #[error("checkpoint serialization failed: {0}")]
    Serialization(String),

    /// The backing store is unavailable or rejected the operation.
    #[error("checkpoint store failed: {0}")]
    Storage(String),
}

/// Persists one [`Checkpoint`] per thread id.
///
/// Implementations must make `put` atomic per thread id and keep operations
/// on distinct thread ids free of cross-key interference; a per-key lock is
/// sufficient. The engine overwrites the checkpoint after every node and
/// never deletes one.
#[async_trait]
pub trait Checkpointer: Send + Sync {
    /// Returns the latest checkpoint for the thread id, if any.
    async fn get(&self, thread_id: &str) -> Result<Option<Checkpoint>, CheckpointError>;

    /// Writes the checkpoint for the thread id, replacing any prior one.
    async fn put(&self, thread_id: &str, checkpoint: Checkpoint) -> Result<(), CheckpointError>;
}
