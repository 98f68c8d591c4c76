//! Compiled graph: immutable executor for thread-keyed runs.
//!
//! Built by `StateGraph::compile`. Each `start`/`resume` spawns one session
//! task that walks nodes from the pending list, merges each step's delta,
//! persists a checkpoint after every node, and emits events to the session
//! stream. Within one thread id execution is strictly sequential; the
//! per-thread registry rejects a second concurrent session. An interrupt
//! terminates the session outright; resumption is reconstructed purely from
//! the persisted checkpoint, never from a blocked task.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::SystemTime;

use dashmap::DashMap;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info};

use crate::error::{RunError, StepError};
use crate::memory::{Checkpoint, CheckpointSource, Checkpointer, StateSnapshot};
use crate::state::{StateDelta, StateSchema, WorkflowState};
use crate::stream::{RunEvent, RunSession};

use super::state_graph::{ConditionalEdge, END};
use super::step::{Step, StepEmission};

/// Compile-time execution options: the checkpoint store, the nodes to pause
/// before, and an optional step-count ceiling for cyclic graphs.
pub struct CompileConfig {
    pub(super) checkpointer: Arc<dyn Checkpointer>,
    pub(super) interrupt_before: Vec<String>,
    pub(super) step_limit: Option<u32>,
}

impl CompileConfig {
    /// Creates a config persisting to the given checkpoint store.
    pub fn new(checkpointer: Arc<dyn Checkpointer>) -> Self {
        Self {
            checkpointer,
            interrupt_before: Vec::new(),
            step_limit: None,
        }
    }

    /// Node names to always pause before, pending an external `resume`.
    pub fn interrupt_before(
        mut self,
        nodes: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.interrupt_before = nodes.into_iter().map(Into::into).collect();
        self
    }

    /// Maximum number of node executions per thread id, across resumes.
    /// Exceeding it fails the session; unset means unbounded.
    pub fn step_limit(mut self, limit: u32) -> Self {
        self.step_limit = Some(limit);
        self
    }
}

pub(super) struct GraphInner {
    pub(super) schema: StateSchema,
    pub(super) nodes: HashMap<String, Step>,
    /// Direct successor per node.
    pub(super) next: HashMap<String, String>,
    pub(super) conditional: HashMap<String, ConditionalEdge>,
    /// START's single successor.
    pub(super) entry: String,
    pub(super) interrupt_before: HashSet<String>,
    pub(super) step_limit: Option<u32>,
    pub(super) checkpointer: Arc<dyn Checkpointer>,
    /// Thread ids with a live session; the mutual-exclusion domain.
    pub(super) active: DashMap<String, ()>,
}

/// Releases the thread id's session slot when the session task ends, on any
/// exit path.
struct SessionGuard {
    inner: Arc<GraphInner>,
    thread_id: String,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.inner.active.remove(&self.thread_id);
    }
}

/// Immutable executor for a validated graph.
///
/// **Interaction**: Produced by [`StateGraph::compile`](super::StateGraph::compile);
/// callers drive it through [`start`](Self::start), [`resume`](Self::resume),
/// and [`inspect`](Self::inspect). Cloning shares the same session registry
/// and checkpoint store.
#[derive(Clone)]
pub struct CompiledGraph {
    inner: Arc<GraphInner>,
}

impl CompiledGraph {
    pub(super) fn from_inner(inner: GraphInner) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    fn acquire(&self, thread_id: &str) -> Result<SessionGuard, RunError> {
        use dashmap::mapref::entry::Entry;
        match self.inner.active.entry(thread_id.to_string()) {
            Entry::Occupied(_) => Err(RunError::SessionActive(thread_id.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(());
                Ok(SessionGuard {
                    inner: Arc::clone(&self.inner),
                    thread_id: thread_id.to_string(),
                })
            }
        }
    }

    /// Begins a fresh run for the thread id with the given initial delta.
    ///
    /// # Errors
    ///
    /// `SessionActive` when a session for this thread id is running,
    /// `ThreadBusy` when a non-terminal checkpoint exists (resume it
    /// instead), `State` when the input references an undeclared key, and
    /// `Store` when the initial checkpoint cannot be persisted. No state is
    /// mutated on any of these.
    pub async fn start(
        &self,
        thread_id: impl Into<String>,
        input: StateDelta,
    ) -> Result<RunSession, RunError> {
        let thread_id = thread_id.into();
        let guard = self.acquire(&thread_id)?;
        if let Some(existing) = self.inner.checkpointer.get(&thread_id).await? {
            if !existing.is_terminal() {
                return Err(RunError::ThreadBusy(thread_id));
            }
        }
        let state = WorkflowState::new().apply(&self.inner.schema, input)?;
        let pending = vec![self.inner.entry.clone()];
        let checkpoint = Checkpoint::new(
            state.clone(),
            pending.clone(),
            false,
            CheckpointSource::Input,
            0,
        );
        self.inner.checkpointer.put(&thread_id, checkpoint).await?;
        info!(thread_id = %thread_id, entry = %self.inner.entry, "starting run");
        Ok(self.spawn_session(guard, thread_id, state, VecDeque::from(pending), 0, None))
    }

    /// Continues an unfinished run: merges the feedback delta into the
    /// checkpointed state and executes from the pending nodes. This covers
    /// an interrupt pause and also a session that ended in `Failed` or was
    /// cancelled by a dropped consumer; in those cases the pending node is
    /// simply retried against the last good checkpoint. When resuming from
    /// an interrupt, the node the run paused before does not re-trigger its
    /// interrupt on this session.
    ///
    /// # Errors
    ///
    /// `SessionActive` when a session for this thread id is running,
    /// `UnknownThread` when no checkpoint exists, `NotInterrupted` when the
    /// checkpoint is terminal (the run already completed), `State` for
    /// undeclared feedback keys, and `Store` on store failure. No state is
    /// mutated on any of these.
    pub async fn resume(
        &self,
        thread_id: impl Into<String>,
        feedback: StateDelta,
    ) -> Result<RunSession, RunError> {
        let thread_id = thread_id.into();
        let guard = self.acquire(&thread_id)?;
        let checkpoint = self
            .inner
            .checkpointer
            .get(&thread_id)
            .await?
            .ok_or_else(|| RunError::UnknownThread(thread_id.clone()))?;
        if checkpoint.is_terminal() {
            return Err(RunError::NotInterrupted(thread_id));
        }
        let was_interrupted = checkpoint.interrupted;
        let state = checkpoint.state.apply(&self.inner.schema, feedback)?;
        let pending = checkpoint.pending_nodes;
        let steps = checkpoint.metadata.step;
        let resumed = Checkpoint::new(
            state.clone(),
            pending.clone(),
            false,
            CheckpointSource::Resume,
            steps,
        );
        self.inner.checkpointer.put(&thread_id, resumed).await?;
        // Only an interrupt pause earns the bypass; a failed or cancelled
        // session re-runs its pending node with normal interrupt handling.
        let skip_interrupt = if was_interrupted {
            pending.first().cloned()
        } else {
            None
        };
        info!(thread_id = %thread_id, node = ?skip_interrupt, "resuming run");
        Ok(self.spawn_session(
            guard,
            thread_id,
            state,
            VecDeque::from(pending),
            steps,
            skip_interrupt,
        ))
    }

    /// Read-only status query for a thread id; never changes the checkpoint.
    /// Usable while interrupted or after completion.
    pub async fn inspect(&self, thread_id: &str) -> Result<StateSnapshot, RunError> {
        let checkpoint = self
            .inner
            .checkpointer
            .get(thread_id)
            .await?
            .ok_or_else(|| RunError::UnknownThread(thread_id.to_string()))?;
        Ok(StateSnapshot::from(checkpoint))
    }

    fn spawn_session(
        &self,
        guard: SessionGuard,
        thread_id: String,
        state: WorkflowState,
        pending: VecDeque<String>,
        steps: u64,
        skip_interrupt: Option<String>,
    ) -> RunSession {
        let (tx, rx) = mpsc::channel(128);
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let _guard = guard;
            run_loop(inner, thread_id, state, pending, steps, skip_interrupt, tx).await;
        });
        RunSession::new(ReceiverStream::new(rx))
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Emits the terminal Failed event for a session.
async fn fail(tx: &mpsc::Sender<RunEvent>, node: Option<String>, err: RunError) {
    error!(node = ?node, error = %err, "run session failed");
    let _ = tx
        .send(RunEvent::Failed {
            node,
            message: err.to_string(),
        })
        .await;
}

/// The executor loop for one session. Terminal on END, interrupt, error, or
/// a dropped consumer; the last persisted checkpoint survives every exit.
async fn run_loop(
    inner: Arc<GraphInner>,
    thread_id: String,
    mut state: WorkflowState,
    mut pending: VecDeque<String>,
    mut steps: u64,
    mut skip_interrupt: Option<String>,
    tx: mpsc::Sender<RunEvent>,
) {
    loop {
        let Some(node_id) = pending.pop_front() else {
            // resume() requires a non-terminal checkpoint, so the queue
            // starts non-empty; an empty queue here means a foreign store
            // write.
            return;
        };

        if node_id == END {
            let checkpoint = Checkpoint::new(
                state.clone(),
                Vec::new(),
                false,
                CheckpointSource::Loop,
                steps,
            );
            if let Err(err) = inner.checkpointer.put(&thread_id, checkpoint).await {
                fail(&tx, None, RunError::from(err)).await;
                return;
            }
            info!(thread_id = %thread_id, steps, "run completed");
            let _ = tx.send(RunEvent::Completed { state }).await;
            return;
        }

        // Only the node named at resume time bypasses its interrupt, and only
        // on the first iteration of this session.
        let bypass = skip_interrupt.take().is_some_and(|n| n == node_id);
        if inner.interrupt_before.contains(&node_id) && !bypass {
            let mut pending_all = vec![node_id.clone()];
            pending_all.extend(pending.iter().cloned());
            let checkpoint = Checkpoint::new(
                state.clone(),
                pending_all,
                true,
                CheckpointSource::Interrupt,
                steps,
            );
            if let Err(err) = inner.checkpointer.put(&thread_id, checkpoint).await {
                fail(&tx, Some(node_id), RunError::from(err)).await;
                return;
            }
            info!(thread_id = %thread_id, node = %node_id, "interrupted before node");
            let _ = tx
                .send(RunEvent::Interrupted {
                    node: node_id,
                    state,
                })
                .await;
            return;
        }

        steps += 1;
        if let Some(limit) = inner.step_limit {
            if steps > u64::from(limit) {
                fail(&tx, Some(node_id), RunError::StepLimitExceeded(limit)).await;
                return;
            }
        }

        let Some(step) = inner.nodes.get(&node_id) else {
            fail(
                &tx,
                Some(node_id.clone()),
                RunError::UnknownPendingNode(node_id),
            )
            .await;
            return;
        };

        debug!(thread_id = %thread_id, node = %node_id, step = steps, "running node");
        let delta = match step {
            Step::Atomic(step) => match step.run(&state).await {
                Ok(delta) => delta,
                Err(err) => {
                    fail(
                        &tx,
                        Some(node_id.clone()),
                        RunError::Step {
                            node: node_id,
                            source: err,
                        },
                    )
                    .await;
                    return;
                }
            },
            Step::Streaming(step) => {
                let mut fragments = step.run(state.clone());
                let mut terminal = None;
                while let Some(item) = fragments.next().await {
                    match item {
                        Ok(StepEmission::Partial(chunk)) => {
                            let event = RunEvent::Chunk {
                                node: node_id.clone(),
                                chunk,
                            };
                            if tx.send(event).await.is_err() {
                                debug!(thread_id = %thread_id, "consumer dropped, cancelling run");
                                return;
                            }
                        }
                        Ok(StepEmission::Final(delta)) => {
                            terminal = Some(delta);
                            break;
                        }
                        Err(err) => {
                            fail(
                                &tx,
                                Some(node_id.clone()),
                                RunError::Step {
                                    node: node_id,
                                    source: err,
                                },
                            )
                            .await;
                            return;
                        }
                    }
                }
                match terminal {
                    Some(delta) => delta,
                    None => {
                        fail(
                            &tx,
                            Some(node_id.clone()),
                            RunError::Step {
                                node: node_id,
                                source: StepError::MissingFinalDelta,
                            },
                        )
                        .await;
                        return;
                    }
                }
            }
        };

        state = match state.apply(&inner.schema, delta) {
            Ok(next_state) => next_state,
            Err(err) => {
                fail(&tx, Some(node_id.clone()), RunError::from(err)).await;
                return;
            }
        };

        let successor = if let Some(edge) = inner.conditional.get(&node_id) {
            let label = edge.router.route(&state);
            match edge.branches.get(&label) {
                Some(target) => {
                    debug!(thread_id = %thread_id, node = %node_id, label = %label, target = %target, "router selected branch");
                    target.clone()
                }
                None => {
                    fail(
                        &tx,
                        Some(node_id.clone()),
                        RunError::UnmappedLabel {
                            node: node_id,
                            label,
                        },
                    )
                    .await;
                    return;
                }
            }
        } else if let Some(target) = inner.next.get(&node_id) {
            target.clone()
        } else {
            fail(
                &tx,
                Some(node_id.clone()),
                RunError::UnknownPendingNode(node_id),
            )
            .await;
            return;
        };
        pending.push_back(successor);

        let checkpoint = Checkpoint::new(
            state.clone(),
            pending.iter().cloned().collect(),
            false,
            CheckpointSource::Loop,
            steps,
        );
        if let Err(err) = inner.checkpointer.put(&thread_id, checkpoint).await {
            fail(&tx, Some(node_id.clone()), RunError::from(err)).await;
            return;
        }

        let event = RunEvent::NodeComplete {
            node: node_id,
            state: state.clone(),
            at_ms: now_ms(),
        };
        if tx.send(event).await.is_err() {
            debug!(thread_id = %thread_id, "consumer dropped, cancelling run");
            return;
        }
    }
}
