//! Checkpointing: durable snapshots of a thread's state and resumption point.
//!
//! The [`Checkpointer`] trait is the only state shared across sessions. It is
//! keyed by thread id and must provide atomic read-then-write per thread id;
//! it never needs a global lock. [`MemorySaver`] is the in-process
//! implementation used in dev and tests. Retention is the caller's policy:
//! the engine overwrites, it never deletes.

mod checkpoint;
mod checkpointer;
mod memory_saver;

pub use checkpoint::{Checkpoint, CheckpointMetadata, CheckpointSource, StateSnapshot};
pub use checkpointer::{CheckpointError, Checkpointer};
pub use memory_saver::MemorySaver;
