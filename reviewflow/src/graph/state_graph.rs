//! State graph builder: named steps plus direct and conditional edges.
//!
//! Add steps with `add_node`, wire them with `add_edge(from, to)` and
//! `add_conditional_edges(from, router, branches)` using `START` and `END`
//! for graph entry/exit, then `compile` with a [`CompileConfig`] to get a
//! runnable [`CompiledGraph`]. All validation happens at compile; a graph
//! that compiles cannot hit a dangling edge or undeclared state key at run
//! time. Cycles through conditional routing are permitted; bound runaway
//! loops with [`CompileConfig::step_limit`].

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use crate::graph::compile_error::CompilationError;
use crate::graph::compiled::{CompileConfig, CompiledGraph, GraphInner};
use crate::graph::router::Router;
use crate::graph::step::Step;
use crate::state::StateSchema;

/// Sentinel for graph entry: use as `from` in `add_edge(START, first_node)`.
pub const START: &str = "__start__";

/// Sentinel for graph exit: use as `to` in `add_edge(last_node, END)`, and as
/// the required fallback label in every conditional branch map.
pub const END: &str = "__end__";

/// One conditional edge: a router plus its label-to-target branch map.
pub(super) struct ConditionalEdge {
    pub router: Arc<dyn Router>,
    pub branches: HashMap<String, String>,
}

/// State graph under construction. Immutable once compiled.
pub struct StateGraph {
    schema: StateSchema,
    nodes: Vec<(String, Step)>,
    edges: Vec<(String, String)>,
    conditional: Vec<(String, ConditionalEdge)>,
}

impl StateGraph {
    /// Creates an empty graph over the given key schema.
    pub fn new(schema: StateSchema) -> Self {
        Self {
            schema,
            nodes: Vec::new(),
            edges: Vec::new(),
            conditional: Vec::new(),
        }
    }

    /// Registers a step under a unique node name. Duplicates and the
    /// reserved START/END names are rejected at compile.
    pub fn add_node(&mut self, id: impl Into<String>, step: Step) -> &mut Self {
        self.nodes.push((id.into(), step));
        self
    }

    /// Adds a direct edge from `from` to `to`. Use `START` for graph entry
    /// and `END` for graph exit. Each node may have at most one direct edge.
    pub fn add_edge(&mut self, from: impl Into<String>, to: impl Into<String>) -> &mut Self {
        self.edges.push((from.into(), to.into()));
        self
    }

    /// Adds a conditional edge: after `from` (a registered node) runs, the
    /// router picks a label and `branches` maps it to the successor (which
    /// may be `END`). The branch map must include an entry for the `END`
    /// label; a router label missing from the map fails the run.
    pub fn add_conditional_edges(
        &mut self,
        from: impl Into<String>,
        router: Arc<dyn Router>,
        branches: HashMap<String, String>,
    ) -> &mut Self {
        self.conditional
            .push((from.into(), ConditionalEdge { router, branches }));
        self
    }

    /// Validates the graph and turns it into a runnable executor.
    ///
    /// Checks, first violation wins: duplicate node names, reserved names,
    /// dangling edge endpoints, a single entry edge from START, at most one
    /// outgoing edge kind per node, a required END branch per conditional
    /// edge, no non-END node without an outgoing edge, reachability from
    /// START, declared state keys for every step write and router read, and
    /// known interrupt-before names.
    pub fn compile(self, config: CompileConfig) -> Result<CompiledGraph, CompilationError> {
        let mut nodes: HashMap<String, Step> = HashMap::new();
        for (id, step) in &self.nodes {
            if nodes.insert(id.clone(), step.clone()).is_some() {
                return Err(CompilationError::DuplicateNode(id.clone()));
            }
        }
        for (id, _) in &self.nodes {
            if id == START || id == END {
                return Err(CompilationError::ReservedNodeName(id.clone()));
            }
        }

        for (from, to) in &self.edges {
            if from == END {
                return Err(CompilationError::EdgeFromEnd(to.clone()));
            }
            if from != START && !nodes.contains_key(from) {
                return Err(CompilationError::UnknownNode(from.clone()));
            }
            if to == START {
                return Err(CompilationError::EdgeToStart(from.clone()));
            }
            if to != END && !nodes.contains_key(to) {
                return Err(CompilationError::UnknownNode(to.clone()));
            }
        }
        for (from, edge) in &self.conditional {
            if !nodes.contains_key(from) {
                return Err(CompilationError::UnknownNode(from.clone()));
            }
            for target in edge.branches.values() {
                if target == START {
                    return Err(CompilationError::EdgeToStart(from.clone()));
                }
                if target != END && !nodes.contains_key(target) {
                    return Err(CompilationError::UnknownNode(target.clone()));
                }
            }
            if !edge.branches.contains_key(END) {
                return Err(CompilationError::MissingEndBranch(from.clone()));
            }
        }

        let start_targets: Vec<&String> = self
            .edges
            .iter()
            .filter(|(f, _)| f == START)
            .map(|(_, t)| t)
            .collect();
        if start_targets.len() != 1 {
            return Err(CompilationError::MissingStart);
        }
        let entry = start_targets[0].clone();

        let mut next: HashMap<String, String> = HashMap::new();
        for (from, to) in &self.edges {
            if from == START {
                continue;
            }
            if next.insert(from.clone(), to.clone()).is_some() {
                return Err(CompilationError::DuplicateEdge(from.clone()));
            }
        }
        let mut conditional: HashMap<String, ConditionalEdge> = HashMap::new();
        for (from, edge) in self.conditional {
            if conditional.insert(from.clone(), edge).is_some() {
                return Err(CompilationError::DuplicateEdge(from));
            }
        }
        for from in conditional.keys() {
            if next.contains_key(from) {
                return Err(CompilationError::ConflictingEdges(from.clone()));
            }
        }

        for (id, _) in &self.nodes {
            if !next.contains_key(id) && !conditional.contains_key(id) {
                return Err(CompilationError::NoOutgoingEdge(id.clone()));
            }
        }

        // Reachability over the union of direct and all conditional branch
        // targets; the router's runtime choice cannot be statically known.
        let mut reached: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<String> = VecDeque::from([entry.clone()]);
        while let Some(id) = queue.pop_front() {
            if id == END || !reached.insert(id.clone()) {
                continue;
            }
            if let Some(to) = next.get(&id) {
                queue.push_back(to.clone());
            }
            if let Some(edge) = conditional.get(&id) {
                for target in edge.branches.values() {
                    queue.push_back(target.clone());
                }
            }
        }
        for (id, _) in &self.nodes {
            if !reached.contains(id) {
                return Err(CompilationError::Unreachable(id.clone()));
            }
        }

        for (id, step) in &self.nodes {
            for key in step.writes() {
                if !self.schema.contains(&key) {
                    return Err(CompilationError::UndeclaredKey {
                        node: id.clone(),
                        key,
                    });
                }
            }
        }
        for (from, edge) in &conditional {
            for key in edge.router.reads() {
                if !self.schema.contains(&key) {
                    return Err(CompilationError::UndeclaredKey {
                        node: from.clone(),
                        key,
                    });
                }
            }
        }

        for id in &config.interrupt_before {
            if !nodes.contains_key(id) {
                return Err(CompilationError::UnknownNode(id.clone()));
            }
        }

        Ok(CompiledGraph::from_inner(GraphInner {
            schema: self.schema,
            nodes,
            next,
            conditional,
            entry,
            interrupt_before: config.interrupt_before.into_iter().collect(),
            step_limit: config.step_limit,
            checkpointer: config.checkpointer,
            active: dashmap::DashMap::new(),
        }))
    }
}
