//! Prebuilt document-review workflow: the analysis chain, the human
//! review pause, the decision branches, and the final report.
//!
//! The graph shape, state keys, and decision vocabulary come with the
//! engine; the seven analysis/drafting steps are pluggable; each is
//! ultimately a call to a generative model with a templated prompt, which
//! the engine treats as opaque. The [`HumanReviewStep`] and the
//! [`ReviewDecisionRouter`] are engine-owned: together they implement the
//! pause-for-a-reviewer protocol around the `human_review` interrupt point.

mod decision;
mod human;

use std::collections::HashMap;
use std::sync::Arc;

use crate::graph::{
    CompilationError, CompileConfig, CompiledGraph, StateGraph, Step, END, START,
};
use crate::memory::Checkpointer;
use crate::state::{MergePolicy, StateSchema};

pub use decision::{action_label, ReviewDecisionRouter};
pub use human::HumanReviewStep;

/// Node names of the review graph.
pub const CONTENT_ANALYSIS: &str = "content_analysis";
pub const COMPLIANCE_CHECK: &str = "compliance_check";
pub const RISK_ASSESSMENT: &str = "risk_assessment";
pub const HUMAN_REVIEW: &str = "human_review";
pub const APPROVAL_PROCESS: &str = "approval_process";
pub const REJECTION_PROCESS: &str = "rejection_process";
pub const MODIFICATION_PROCESS: &str = "modification_process";
pub const FINAL_REPORT: &str = "final_report";

/// Declared state keys of the review workflow.
pub mod keys {
    // Document intake.
    pub const DOCUMENT_CONTENT: &str = "document_content";
    pub const DOCUMENT_TYPE: &str = "document_type";
    pub const URGENCY_LEVEL: &str = "urgency_level";

    // Model analysis results.
    pub const CONTENT_ANALYSIS_RESULT: &str = "content_analysis_result";
    pub const COMPLIANCE_RESULT: &str = "compliance_result";
    pub const RISK_SCORE: &str = "risk_score";
    pub const AI_ANALYSIS_RESULT: &str = "ai_analysis_result";
    pub const ISSUES_FOUND: &str = "issues_found";
    pub const RECOMMENDATIONS: &str = "recommendations";

    // Reviewer feedback.
    pub const REVIEW_ACTION: &str = "review_action";
    pub const REVIEWER_COMMENTS: &str = "reviewer_comments";
    pub const SUGGESTED_CHANGES: &str = "suggested_changes";
    pub const HUMAN_NEXT_NODE: &str = "human_next_node";
    pub const HUMAN_REVIEW_REQUIRED: &str = "human_review_required";
    pub const HUMAN_REVIEW_TIMESTAMP: &str = "human_review_timestamp";
    pub const REVIEW_INSTRUCTION: &str = "review_instruction";

    // Outcome.
    pub const FINAL_STATUS: &str = "final_status";
    pub const APPROVAL_REASON: &str = "approval_reason";
    pub const REJECTION_REASON: &str = "rejection_reason";
    pub const FINAL_REPORT: &str = "final_report";
}

/// The pluggable steps of the review graph; everything else is engine-owned.
pub struct ReviewSteps {
    pub content_analysis: Step,
    pub compliance_check: Step,
    pub risk_assessment: Step,
    pub approval_process: Step,
    pub rejection_process: Step,
    pub modification_process: Step,
    pub final_report: Step,
}

/// The review workflow's key schema: every key uses Replace.
pub fn review_schema() -> StateSchema {
    [
        keys::DOCUMENT_CONTENT,
        keys::DOCUMENT_TYPE,
        keys::URGENCY_LEVEL,
        keys::CONTENT_ANALYSIS_RESULT,
        keys::COMPLIANCE_RESULT,
        keys::RISK_SCORE,
        keys::AI_ANALYSIS_RESULT,
        keys::ISSUES_FOUND,
        keys::RECOMMENDATIONS,
        keys::REVIEW_ACTION,
        keys::REVIEWER_COMMENTS,
        keys::SUGGESTED_CHANGES,
        keys::HUMAN_NEXT_NODE,
        keys::HUMAN_REVIEW_REQUIRED,
        keys::HUMAN_REVIEW_TIMESTAMP,
        keys::REVIEW_INSTRUCTION,
        keys::FINAL_STATUS,
        keys::APPROVAL_REASON,
        keys::REJECTION_REASON,
        keys::FINAL_REPORT,
    ]
    .into_iter()
    .fold(StateSchema::new(), |schema, key| {
        schema.declare(key, MergePolicy::Replace)
    })
}

/// Wires the review graph: the linear analysis chain, the human-review
/// node, the decision branches, and the shared final-report tail.
pub fn review_graph(steps: ReviewSteps) -> StateGraph {
    let mut graph = StateGraph::new(review_schema());
    graph.add_node(CONTENT_ANALYSIS, steps.content_analysis);
    graph.add_node(COMPLIANCE_CHECK, steps.compliance_check);
    graph.add_node(RISK_ASSESSMENT, steps.risk_assessment);
    graph.add_node(HUMAN_REVIEW, Step::atomic(HumanReviewStep));
    graph.add_node(APPROVAL_PROCESS, steps.approval_process);
    graph.add_node(REJECTION_PROCESS, steps.rejection_process);
    graph.add_node(MODIFICATION_PROCESS, steps.modification_process);
    graph.add_node(FINAL_REPORT, steps.final_report);

    graph.add_edge(START, CONTENT_ANALYSIS);
    graph.add_edge(CONTENT_ANALYSIS, COMPLIANCE_CHECK);
    graph.add_edge(COMPLIANCE_CHECK, RISK_ASSESSMENT);
    graph.add_edge(RISK_ASSESSMENT, HUMAN_REVIEW);

    graph.add_conditional_edges(
        HUMAN_REVIEW,
        Arc::new(ReviewDecisionRouter),
        HashMap::from([
            (APPROVAL_PROCESS.to_string(), APPROVAL_PROCESS.to_string()),
            (
                REJECTION_PROCESS.to_string(),
                REJECTION_PROCESS.to_string(),
            ),
            (
                MODIFICATION_PROCESS.to_string(),
                MODIFICATION_PROCESS.to_string(),
            ),
            (END.to_string(), END.to_string()),
        ]),
    );

    graph.add_edge(APPROVAL_PROCESS, FINAL_REPORT);
    graph.add_edge(REJECTION_PROCESS, FINAL_REPORT);
    graph.add_edge(MODIFICATION_PROCESS, FINAL_REPORT);
    graph.add_edge(FINAL_REPORT, END);
    graph
}

/// Compiles the review graph with its canonical interrupt point: execution
/// always pauses before `human_review`, pending reviewer feedback.
pub fn compile_review_graph(
    steps: ReviewSteps,
    checkpointer: Arc<dyn Checkpointer>,
) -> Result<CompiledGraph, CompilationError> {
    review_graph(steps)
        .compile(CompileConfig::new(checkpointer).interrupt_before([HUMAN_REVIEW]))
}
