use crate::error::RoutingError;
use crate::machine;
use crate::stage::{RouteContext, RouterStage, StageDecision};

/// Workflow legality: the action must be the single legal next action.
pub struct LegalityStage;

impl RouterStage for LegalityStage {
    fn name(&self) -> &str {
        "legality"
    }

    fn evaluate(&self, context: &RouteContext<'_>) -> StageDecision {
        let action = context.command.action;
        if machine::is_legal(context.state, action) {
            StageDecision::Pass
        } else {
            StageDecision::Reject(RoutingError::IllegalTransition {
                action,
                state: context.state,
            })
        }
    }
}
