//! State graph: steps, edges, conditional routing, compile and run.
//!
//! Build a [`StateGraph`] with `add_node` / `add_edge` /
//! `add_conditional_edges` (using [`START`] and [`END`] for entry/exit),
//! then [`compile`](StateGraph::compile) to get a [`CompiledGraph`] that can
//! `start`, `resume`, and `inspect` thread-keyed runs.

mod compile_error;
mod compiled;
mod router;
mod state_graph;
mod step;

pub use compile_error::CompilationError;
pub use compiled::{CompileConfig, CompiledGraph};
pub use router::{FnRouter, Router};
pub use state_graph::{StateGraph, END, START};
pub use step::{AtomicStep, Step, StepEmission, StepStream, StreamingStep};
