//! Review-decision router: picks the post-review branch.

use tracing::{info, warn};

use crate::graph::{Router, END};
use crate::state::WorkflowState;

use super::keys;
use super::{APPROVAL_PROCESS, MODIFICATION_PROCESS, REJECTION_PROCESS};

pub(super) const LABELS: [&str; 3] = [APPROVAL_PROCESS, REJECTION_PROCESS, MODIFICATION_PROCESS];

/// Maps a reviewer action word to its branch label. Case-insensitive over a
/// fixed vocabulary of synonym families; anything unrecognized is `None`.
pub fn action_label(action: &str) -> Option<&'static str> {
    match action.to_lowercase().as_str() {
        "approve" | "approved" | "accept" | "通过" => Some(APPROVAL_PROCESS),
        "reject" | "rejected" | "deny" | "拒绝" => Some(REJECTION_PROCESS),
        "modify" | "modified" | "revise" | "修改" => Some(MODIFICATION_PROCESS),
        _ => None,
    }
}

/// Router on the `human_review` conditional edge.
///
/// Two-tier precedence: an explicit `human_next_node` override written by the
/// human-review step wins, provided it is one of the branch labels;
/// otherwise the label derives from `review_action` via [`action_label`].
/// A missing or unrecognized action routes to END, the single fallback
/// policy used everywhere in this workflow.
pub struct ReviewDecisionRouter;

impl Router for ReviewDecisionRouter {
    fn reads(&self) -> Vec<String> {
        vec![
            keys::REVIEW_ACTION.to_string(),
            keys::HUMAN_NEXT_NODE.to_string(),
        ]
    }

    fn route(&self, state: &WorkflowState) -> String {
        let next = state.get_str(keys::HUMAN_NEXT_NODE).unwrap_or(END);
        if next != END && LABELS.contains(&next) {
            info!(next_node = %next, "review decision: explicit next-node override");
            return next.to_string();
        }

        let action = state.get_str(keys::REVIEW_ACTION).unwrap_or("");
        match action_label(action) {
            Some(label) => {
                info!(review_action = %action, label = %label, "review decision routed");
                label.to_string()
            }
            None => {
                warn!(review_action = %action, "unknown review action, ending workflow");
                END.to_string()
            }
        }
    }
}
