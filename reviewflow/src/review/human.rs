//! Human-review step: the pause-for-a-reviewer node.
//!
//! Execution always interrupts before this node, so by the time it runs on a
//! resumed session the reviewer's feedback delta (`review_action`,
//! `reviewer_comments`, `suggested_changes`) has been merged into state. The
//! step turns the action into an explicit next-node override for the
//! decision router. On a session compiled without the interrupt it instead
//! prepares the instruction text a reviewer would see.

use std::time::SystemTime;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::StepError;
use crate::graph::{AtomicStep, END};
use crate::state::{StateDelta, WorkflowState};

use super::decision::{action_label, LABELS};
use super::keys;

/// Engine-owned step bound to the `human_review` node.
pub struct HumanReviewStep;

#[async_trait]
impl AtomicStep for HumanReviewStep {
    fn writes(&self) -> Vec<String> {
        vec![
            keys::HUMAN_NEXT_NODE.to_string(),
            keys::HUMAN_REVIEW_TIMESTAMP.to_string(),
            keys::HUMAN_REVIEW_REQUIRED.to_string(),
            keys::REVIEW_INSTRUCTION.to_string(),
        ]
    }

    async fn run(&self, state: &WorkflowState) -> Result<StateDelta, StepError> {
        match state.get_str(keys::REVIEW_ACTION) {
            Some(action) => {
                // Feedback has arrived; fix the router's destination. A
                // reviewer-supplied next-node override takes precedence over
                // the action word. An unrecognized action ends the workflow,
                // same as the router's own fallback.
                let override_node = state
                    .get_str(keys::HUMAN_NEXT_NODE)
                    .filter(|n| *n != END && LABELS.contains(n));
                let next = match override_node {
                    Some(node) => node,
                    None => match action_label(action) {
                        Some(label) => label,
                        None => {
                            warn!(review_action = %action, "unknown review action, next step is END");
                            END
                        }
                    },
                };
                info!(review_action = %action, next_node = %next, "human review completed");
                Ok(StateDelta::new()
                    .with(keys::HUMAN_NEXT_NODE, next)
                    .with(keys::HUMAN_REVIEW_TIMESTAMP, now_ms()))
            }
            None => {
                info!("human review pending, no feedback yet");
                Ok(StateDelta::new()
                    .with(keys::HUMAN_REVIEW_REQUIRED, true)
                    .with(keys::HUMAN_NEXT_NODE, END)
                    .with(keys::REVIEW_INSTRUCTION, review_instruction(state)))
            }
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Builds the instruction text shown to the reviewer: risk tier, document
/// type, a capped analysis summary, and the action vocabulary.
fn review_instruction(state: &WorkflowState) -> String {
    let document_type = state.get_str(keys::DOCUMENT_TYPE).unwrap_or("general");
    let risk_score = state.get_i64(keys::RISK_SCORE).unwrap_or(5);
    let analysis = state.get_str(keys::AI_ANALYSIS_RESULT).unwrap_or("");

    let tier = if risk_score >= 8 {
        "High-risk document, review carefully."
    } else if risk_score >= 6 {
        "Medium-risk document, proceed with caution."
    } else {
        "Low-risk document."
    };

    let summary: String = if analysis.chars().count() > 200 {
        let head: String = analysis.chars().take(200).collect();
        format!("{head}...")
    } else {
        analysis.to_string()
    };

    format!(
        "Please review the analysis below.\n\n\
         Document type: {document_type}\n\
         Risk score: {risk_score}/10\n\
         {tier}\n\n\
         Analysis summary:\n{summary}\n\n\
         Choose a review action:\n\
         - approve: pass the document\n\
         - reject: refuse the document\n\
         - modify: request changes and re-review"
    )
}
