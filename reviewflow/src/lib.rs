//! # reviewflow
//!
//! An interruptible workflow engine for document review pipelines. Build a
//! directed graph of steps over a shared key-value state, compile it with
//! validation, and run sessions that can pause for a human reviewer and
//! resume later from a checkpoint.
//!
//! ## Design
//!
//! - **Schema-checked state**: a [`state::WorkflowState`] is a map of JSON
//!   values; every key a step writes must be declared in a
//!   [`state::StateSchema`] with a merge policy. Merging never mutates in
//!   place, each node produces a fresh state.
//! - **Steps and routers**: nodes are [`graph::AtomicStep`] (one delta per
//!   run) or [`graph::StreamingStep`] (partial chunks, then a final delta).
//!   Conditional edges use a [`graph::Router`] that maps state to a branch
//!   label.
//! - **Checkpoints**: after every node the engine persists a
//!   [`memory::Checkpoint`] through a [`memory::Checkpointer`], keyed by
//!   thread id. Interrupt-before-node turns the checkpoint into a resumable
//!   pause point.
//! - **Sessions**: [`graph::CompiledGraph::start`] and
//!   [`graph::CompiledGraph::resume`] return a [`stream::RunSession`] of
//!   [`stream::RunEvent`]s. At most one live session per thread id.
//!
//! ## Main Modules
//!
//! - [`graph`]: `StateGraph`, `CompiledGraph`, `Step`, `Router`.
//! - [`state`]: `WorkflowState`, `StateDelta`, `StateSchema`, merge policies.
//! - [`memory`]: `Checkpointer` trait, `MemorySaver`, checkpoint types.
//! - [`stream`]: `RunSession` and the `RunEvent` vocabulary.
//! - [`review`]: the built-in document-review graph with its human-review
//!   pause and decision router.
//! - [`error`]: `StepError` and `RunError`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use reviewflow::graph::{CompileConfig, StateGraph, Step, END, START};
//! use reviewflow::memory::MemorySaver;
//! use reviewflow::state::{MergePolicy, StateDelta, StateSchema};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let schema = StateSchema::new().declare("greeting", MergePolicy::Replace);
//!
//! let mut graph = StateGraph::new(schema);
//! graph.add_node(
//!     "greet",
//!     Step::atomic_fn(["greeting"], |_state| {
//!         Ok(StateDelta::new().with("greeting", "hello"))
//!     }),
//! );
//! graph.add_edge(START, "greet");
//! graph.add_edge("greet", END);
//!
//! let compiled = graph.compile(CompileConfig::new(Arc::new(MemorySaver::new())))?;
//! let mut session = compiled.start("thread-1", StateDelta::new()).await?;
//! while let Some(event) = futures::StreamExt::next(&mut session).await {
//!     println!("{event:?}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod graph;
pub mod memory;
pub mod review;
pub mod state;
pub mod stream;

pub use error::{RunError, StepError};
pub use graph::{
    AtomicStep, CompilationError, CompileConfig, CompiledGraph, FnRouter, Router, StateGraph,
    Step, StreamingStep, END, START,
};
pub use memory::{Checkpoint, CheckpointError, Checkpointer, MemorySaver, StateSnapshot};
pub use state::{MergePolicy, StateDelta, StateSchema, WorkflowState};
pub use stream::{RunEvent, RunSession};
