//! Runs the document-review workflow end to end: analysis chain, pause for
//! the human reviewer, resume with an approval, final report.
//!
//! ```sh
//! cargo run -p reviewflow-examples --example document_review
//! ```

use std::sync::Arc;

use futures::StreamExt;
use reviewflow::memory::MemorySaver;
use reviewflow::review::{compile_review_graph, keys};
use reviewflow::{RunEvent, RunSession, StateDelta};
use reviewflow_examples::mock_review_steps;

async fn drain(mut session: RunSession) {
    while let Some(event) = session.next().await {
        match event {
            RunEvent::Chunk { node, chunk } => println!("  [{node}] {chunk}"),
            RunEvent::NodeComplete { node, .. } => println!("node complete: {node}"),
            RunEvent::Interrupted { node, state } => {
                println!("paused before: {node}");
                if let Some(instruction) = state.get_str(keys::REVIEW_INSTRUCTION) {
                    println!("{instruction}");
                }
            }
            RunEvent::Completed { state } => {
                println!("completed with final status: {:?}", state.get_str(keys::FINAL_STATUS));
            }
            RunEvent::Failed { node, message } => {
                println!("failed at {node:?}: {message}");
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let graph = compile_review_graph(mock_review_steps(), Arc::new(MemorySaver::new()))?;
    let thread_id = "contract-2024-001";

    println!("--- first leg: analysis up to the review pause ---");
    let session = graph
        .start(
            thread_id,
            StateDelta::new()
                .with(keys::DOCUMENT_CONTENT, "Master services agreement, 14 pages.")
                .with(keys::DOCUMENT_TYPE, "contract")
                .with(keys::URGENCY_LEVEL, "normal"),
        )
        .await?;
    drain(session).await;

    let snapshot = graph.inspect(thread_id).await?;
    println!(
        "\npaused: interrupted={}, pending={:?}, risk={:?}",
        snapshot.interrupted,
        snapshot.pending_nodes,
        snapshot.state.get_i64(keys::RISK_SCORE),
    );

    println!("\n--- second leg: reviewer approves ---");
    let session = graph
        .resume(
            thread_id,
            StateDelta::new()
                .with(keys::REVIEW_ACTION, "approve")
                .with(keys::REVIEWER_COMMENTS, "Clause 7 accepted after legal sign-off."),
        )
        .await?;
    drain(session).await;

    Ok(())
}
