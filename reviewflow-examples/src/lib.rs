//! Mock review steps for the examples: canned analysis output instead of a
//! model call, with one streaming step to show chunked emission.

use futures::stream;
use reviewflow::graph::{StepEmission, StepStream};
use reviewflow::review::{keys, ReviewSteps};
use reviewflow::{StateDelta, Step, StreamingStep, WorkflowState};

/// A streaming stand-in for a model-backed analysis step: emits a few text
/// chunks, then the merged result delta.
pub struct MockModelStep {
    key: &'static str,
    chunks: Vec<&'static str>,
    result: &'static str,
}

impl MockModelStep {
    pub fn new(key: &'static str, chunks: Vec<&'static str>, result: &'static str) -> Self {
        Self { key, chunks, result }
    }
}

impl StreamingStep for MockModelStep {
    fn writes(&self) -> Vec<String> {
        vec![self.key.to_string()]
    }

    fn run(&self, _state: WorkflowState) -> StepStream {
        let mut emissions: Vec<_> = self
            .chunks
            .iter()
            .map(|c| Ok(StepEmission::Partial((*c).into())))
            .collect();
        emissions.push(Ok(StepEmission::Final(
            StateDelta::new().with(self.key, self.result),
        )));
        Box::pin(stream::iter(emissions))
    }
}

fn set(key: &'static str, value: &'static str) -> Step {
    Step::atomic_fn([key], move |_state| Ok(StateDelta::new().with(key, value)))
}

/// The full review-step set with canned outputs.
pub fn mock_review_steps() -> ReviewSteps {
    ReviewSteps {
        content_analysis: Step::streaming(MockModelStep::new(
            keys::CONTENT_ANALYSIS_RESULT,
            vec!["Scanning sections... ", "summarizing clauses... ", "done."],
            "Standard service contract with two custom clauses.",
        )),
        compliance_check: set(
            keys::COMPLIANCE_RESULT,
            "No regulatory conflicts found; clause 7 needs legal sign-off.",
        ),
        risk_assessment: Step::atomic_fn(
            [keys::RISK_SCORE, keys::AI_ANALYSIS_RESULT],
            |_state| {
                Ok(StateDelta::new()
                    .with(keys::RISK_SCORE, 7)
                    .with(
                        keys::AI_ANALYSIS_RESULT,
                        "Clause 7 shifts liability to the vendor; clause 12 lacks a termination cap.",
                    ))
            },
        ),
        approval_process: set(keys::FINAL_STATUS, "approved"),
        rejection_process: set(keys::FINAL_STATUS, "rejected"),
        modification_process: set(keys::FINAL_STATUS, "returned for modification"),
        final_report: set(
            keys::FINAL_REPORT,
            "Review complete; see final_status for the outcome.",
        ),
    }
}
