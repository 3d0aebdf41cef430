use crate::error::RoutingError;
use crate::stage::{RouteContext, RouterStage, StageDecision};

/// Idempotency check against the client's most recent ledger row.
///
/// A repeated workflow action is a duplicate. A repeated invoice or
/// payment is a duplicate only when the amount is identical too.
pub struct DuplicateStage;

impl RouterStage for DuplicateStage {
    fn name(&self) -> &str {
        "duplicate"
    }

    fn evaluate(&self, context: &RouteContext<'_>) -> StageDecision {
        let command = context.command;
        let (Some(last), Some(kind)) = (context.last_entry, command.action.transaction_type()) else {
            return StageDecision::Pass;
        };
        if last.transaction_type != kind {
            return StageDecision::Pass;
        }
        let same_amount = match command.amount {
            Some(amount) => amount == last.amount,
            None => true,
        };
        if kind.is_financial() && !same_amount {
            return StageDecision::Pass;
        }
        StageDecision::Reject(RoutingError::Duplicate {
            action: command.action,
            client: command.client.clone(),
            amount: command.amount.filter(|_| kind.is_financial()),
        })
    }
}
