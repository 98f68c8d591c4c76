//! Integration tests for the interrupt and resume protocol.
//!
//! Verifies that an interrupted-then-resumed run is observationally
//! equivalent to an uninterrupted one, that `inspect` never mutates the
//! checkpoint, that per-thread mutual exclusion holds under races, and
//! that step and store failures leave a retryable checkpoint behind.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use reviewflow::graph::{CompileConfig, CompiledGraph, StateGraph, Step, END, START};
use reviewflow::memory::{Checkpoint, CheckpointError, Checkpointer, MemorySaver};
use reviewflow::state::{MergePolicy, StateDelta, StateSchema, WorkflowState};
use reviewflow::{RunError, RunEvent, StepError};

/// A three-node chain where each node records its own name, so event order
/// and merged state are both observable.
fn chain_graph() -> StateGraph {
    let schema = StateSchema::new()
        .declare("a", MergePolicy::Replace)
        .declare("b", MergePolicy::Replace)
        .declare("c", MergePolicy::Replace)
        .declare("note", MergePolicy::Replace);
    let mut graph = StateGraph::new(schema);
    for name in ["a", "b", "c"] {
        graph.add_node(
            name,
            Step::atomic_fn([name], move |_state| {
                Ok(StateDelta::new().with(name, format!("ran-{name}")))
            }),
        );
    }
    graph.add_edge(START, "a");
    graph.add_edge("a", "b");
    graph.add_edge("b", "c");
    graph.add_edge("c", END);
    graph
}

fn compile_chain(interrupt_before: &[&str]) -> CompiledGraph {
    chain_graph()
        .compile(
            CompileConfig::new(Arc::new(MemorySaver::new()))
                .interrupt_before(interrupt_before.iter().copied()),
        )
        .unwrap()
}

async fn collect(mut session: reviewflow::RunSession) -> Vec<RunEvent> {
    let mut events = Vec::new();
    while let Some(event) = session.next().await {
        events.push(event);
    }
    events
}

fn final_state(events: &[RunEvent]) -> &WorkflowState {
    match events.last() {
        Some(RunEvent::Completed { state }) => state,
        other => panic!("expected Completed, got {other:?}"),
    }
}

#[tokio::test]
async fn interrupted_then_resumed_matches_uninterrupted_run() {
    let plain = compile_chain(&[]);
    let session = plain.start("t", StateDelta::new()).await.unwrap();
    let uninterrupted = collect(session).await;

    let paused = compile_chain(&["c"]);
    let session = paused.start("t", StateDelta::new()).await.unwrap();
    let first_leg = collect(session).await;
    assert!(matches!(
        first_leg.last(),
        Some(RunEvent::Interrupted { node, .. }) if node == "c"
    ));

    let session = paused.resume("t", StateDelta::new()).await.unwrap();
    let second_leg = collect(session).await;

    // Same nodes completed, in order, and the same final state.
    let completed = |events: &[RunEvent]| -> Vec<String> {
        events
            .iter()
            .filter_map(|e| match e {
                RunEvent::NodeComplete { node, .. } => Some(node.clone()),
                _ => None,
            })
            .collect()
    };
    let mut stitched = completed(&first_leg);
    stitched.extend(completed(&second_leg));
    assert_eq!(stitched, completed(&uninterrupted));
    assert_eq!(
        final_state(&second_leg).values(),
        final_state(&uninterrupted).values()
    );
}

#[tokio::test]
async fn resume_does_not_reinterrupt_the_pending_node() {
    let graph = compile_chain(&["b"]);
    let session = graph.start("t", StateDelta::new()).await.unwrap();
    collect(session).await;

    let session = graph.resume("t", StateDelta::new()).await.unwrap();
    let events = collect(session).await;
    assert!(
        !events.iter().any(|e| matches!(e, RunEvent::Interrupted { .. })),
        "{events:?}"
    );
    assert_eq!(final_state(&events).get_str("b"), Some("ran-b"));
}

#[tokio::test]
async fn feedback_delta_is_merged_before_the_pending_node_runs() {
    let graph = compile_chain(&["c"]);
    let session = graph.start("t", StateDelta::new()).await.unwrap();
    collect(session).await;

    let session = graph
        .resume("t", StateDelta::new().with("note", "from reviewer"))
        .await
        .unwrap();
    let events = collect(session).await;
    assert_eq!(final_state(&events).get_str("note"), Some("from reviewer"));
}

#[tokio::test]
async fn inspect_is_read_only_and_repeatable() {
    let graph = compile_chain(&["c"]);
    let session = graph.start("t", StateDelta::new()).await.unwrap();
    collect(session).await;

    let first = graph.inspect("t").await.unwrap();
    let second = graph.inspect("t").await.unwrap();
    assert!(first.interrupted);
    assert_eq!(first.pending_nodes, vec!["c".to_string()]);
    assert_eq!(first.pending_nodes, second.pending_nodes);
    assert_eq!(first.state.values(), second.state.values());

    // Still resumable after any number of inspections.
    let session = graph.resume("t", StateDelta::new()).await.unwrap();
    let events = collect(session).await;
    assert!(matches!(events.last(), Some(RunEvent::Completed { .. })));
}

#[tokio::test]
async fn start_on_interrupted_thread_is_refused() {
    let graph = compile_chain(&["b"]);
    let session = graph.start("t", StateDelta::new()).await.unwrap();
    collect(session).await;

    let err = graph.start("t", StateDelta::new()).await.unwrap_err();
    assert!(matches!(err, RunError::ThreadBusy(_)), "{err:?}");
}

#[tokio::test]
async fn start_on_completed_thread_runs_fresh() {
    let graph = compile_chain(&[]);
    let session = graph.start("t", StateDelta::new()).await.unwrap();
    collect(session).await;

    let session = graph.start("t", StateDelta::new()).await.unwrap();
    let events = collect(session).await;
    assert!(matches!(events.last(), Some(RunEvent::Completed { .. })));
}

#[tokio::test]
async fn resume_without_checkpoint_is_refused() {
    let graph = compile_chain(&[]);
    let err = graph.resume("nobody", StateDelta::new()).await.unwrap_err();
    assert!(matches!(err, RunError::UnknownThread(_)), "{err:?}");
}

#[tokio::test]
async fn resume_on_completed_thread_is_refused() {
    let graph = compile_chain(&[]);
    let session = graph.start("t", StateDelta::new()).await.unwrap();
    collect(session).await;

    let err = graph.resume("t", StateDelta::new()).await.unwrap_err();
    assert!(matches!(err, RunError::NotInterrupted(_)), "{err:?}");
}

#[tokio::test]
async fn concurrent_resume_race_admits_exactly_one_session() {
    let graph = compile_chain(&["c"]);
    let session = graph.start("t", StateDelta::new()).await.unwrap();
    collect(session).await;

    let left = graph.clone();
    let right = graph.clone();
    let (a, b) = tokio::join!(
        tokio::spawn(async move { left.resume("t", StateDelta::new()).await }),
        tokio::spawn(async move { right.resume("t", StateDelta::new()).await }),
    );
    let results = [a.unwrap(), b.unwrap()];
    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1, "exactly one resume may win the thread");
    // The loser is refused either while the winner's session is still live
    // or, if the winner already finished the run, because nothing is left
    // to resume.
    let loser = results.iter().find(|r| r.is_err()).unwrap();
    assert!(matches!(
        loser.as_ref().unwrap_err(),
        RunError::SessionActive(_) | RunError::NotInterrupted(_)
    ));
}

#[tokio::test]
async fn resume_after_step_failure_retries_the_failed_node() {
    let schema = StateSchema::new()
        .declare("a", MergePolicy::Replace)
        .declare("b", MergePolicy::Replace);
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&attempts);
    let mut graph = StateGraph::new(schema);
    graph.add_node(
        "first",
        Step::atomic_fn(["a"], |_state| Ok(StateDelta::new().with("a", "1"))),
    );
    graph.add_node(
        "flaky",
        Step::atomic_fn(["b"], move |_state| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(StepError::Failed("model unavailable".into()))
            } else {
                Ok(StateDelta::new().with("b", "2"))
            }
        }),
    );
    graph.add_edge(START, "first");
    graph.add_edge("first", "flaky");
    graph.add_edge("flaky", END);
    let graph = graph
        .compile(CompileConfig::new(Arc::new(MemorySaver::new())))
        .unwrap();

    let events = collect(graph.start("t", StateDelta::new()).await.unwrap()).await;
    assert!(
        matches!(
            events.last(),
            Some(RunEvent::Failed { node: Some(n), .. }) if n == "flaky"
        ),
        "{events:?}"
    );

    // The last good checkpoint survives the failure and still names the
    // failed node as pending.
    let snapshot = graph.inspect("t").await.unwrap();
    assert!(!snapshot.interrupted);
    assert_eq!(snapshot.pending_nodes, vec!["flaky".to_string()]);
    assert_eq!(snapshot.state.get_str("a"), Some("1"));

    // Once the cause is fixed, re-issuing resume retries from that point.
    let events = collect(graph.resume("t", StateDelta::new()).await.unwrap()).await;
    match events.last() {
        Some(RunEvent::Completed { state }) => {
            assert_eq!(state.get_str("a"), Some("1"));
            assert_eq!(state.get_str("b"), Some("2"));
        }
        other => panic!("expected Completed, got {other:?}"),
    }
    assert_eq!(attempts.load(Ordering::SeqCst), 2, "failed node ran twice");
}

/// Checkpoint store that starts refusing writes after a budget of puts,
/// while reads keep working.
struct FailingSaver {
    inner: MemorySaver,
    puts_left: AtomicUsize,
}

impl FailingSaver {
    fn new(puts_left: usize) -> Self {
        Self {
            inner: MemorySaver::new(),
            puts_left: AtomicUsize::new(puts_left),
        }
    }
}

#[async_trait]
impl Checkpointer for FailingSaver {
    async fn get(&self, thread_id: &str) -> Result<Option<Checkpoint>, CheckpointError> {
        self.inner.get(thread_id).await
    }

    async fn put(&self, thread_id: &str, checkpoint: Checkpoint) -> Result<(), CheckpointError> {
        if self.puts_left.load(Ordering::SeqCst) == 0 {
            return Err(CheckpointError::Storage("backing store unavailable".into()));
        }
        self.puts_left.fetch_sub(1, Ordering::SeqCst);
        self.inner.put(thread_id, checkpoint).await
    }
}

#[tokio::test]
async fn store_failure_stops_the_session_at_the_failing_node() {
    // Budget covers the initial write and the one after node "a"; the
    // write after node "b" fails, so "c" must never run.
    let graph = chain_graph()
        .compile(CompileConfig::new(Arc::new(FailingSaver::new(2))))
        .unwrap();

    let session = graph.start("t", StateDelta::new()).await.unwrap();
    let events = collect(session).await;
    let completed: Vec<&str> = events
        .iter()
        .filter_map(|e| match e {
            RunEvent::NodeComplete { node, .. } => Some(node.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(completed, vec!["a"], "no completion past the failed persist");
    match events.last() {
        Some(RunEvent::Failed { node, message }) => {
            assert_eq!(node.as_deref(), Some("b"));
            assert!(message.contains("store"), "{message}");
        }
        other => panic!("expected Failed, got {other:?}"),
    }

    // The durable record is the checkpoint from before the failing persist.
    let snapshot = graph.inspect("t").await.unwrap();
    assert_eq!(snapshot.pending_nodes, vec!["b".to_string()]);
    assert_eq!(snapshot.state.get_str("a"), Some("ran-a"));
    assert!(snapshot.state.get_str("b").is_none());
    assert!(snapshot.state.get_str("c").is_none());
}

#[tokio::test]
async fn undeclared_feedback_key_is_refused_and_checkpoint_survives() {
    let graph = compile_chain(&["c"]);
    let session = graph.start("t", StateDelta::new()).await.unwrap();
    collect(session).await;

    let err = graph
        .resume("t", StateDelta::new().with("bogus", 1))
        .await
        .unwrap_err();
    assert!(matches!(err, RunError::State(_)), "{err:?}");

    // The pause point is untouched; a clean resume still works.
    let snapshot = graph.inspect("t").await.unwrap();
    assert!(snapshot.interrupted);
    let session = graph.resume("t", StateDelta::new()).await.unwrap();
    let events = collect(session).await;
    assert!(matches!(events.last(), Some(RunEvent::Completed { .. })));
}
