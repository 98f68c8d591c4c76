//! In-memory checkpoint store backed by a concurrent map.

use async_trait::async_trait;
use dashmap::DashMap;

use super::{Checkpoint, CheckpointError, Checkpointer};

/// In-memory [`Checkpointer`] for dev and tests.
///
/// `DashMap` gives per-key locking, so concurrent sessions on distinct
/// thread ids never contend on a global lock. Contents are lost on process
/// exit; interrupted runs survive only as long as the process does.
#[derive(Debug, Default)]
pub struct MemorySaver {
    checkpoints: DashMap<String, Checkpoint>,
}

impl MemorySaver {
    /// Creates an empty saver.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Checkpointer for MemorySaver {
    async fn get(&self, thread_id: &str) -> Result<Option<Checkpoint>, CheckpointError> {
        Ok(self.checkpoints.get(thread_id).map(|entry| entry.clone()))
    }

    async fn put(&self, thread_id: &str, checkpoint: Checkpoint) -> Result<(), CheckpointError> {
        self.checkpoints.insert(thread_id.to_string(), checkpoint);
        Ok(())
    }
}
