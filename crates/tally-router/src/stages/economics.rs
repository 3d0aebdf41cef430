use tally_types::{Action, Decimal, MAX_AMOUNT};

use crate::error::EconomicViolation;
use crate::stage::{RouteContext, RouterStage, StageDecision};

/// Money invariants for invoices and payments.
///
/// Both must carry a positive amount no larger than [`MAX_AMOUNT`].
/// Payments are then checked in order: an invoice exists, the balance is
/// open, and the amount fits within the balance.
pub struct EconomicStage;

impl RouterStage for EconomicStage {
    fn name(&self) -> &str {
        "economics"
    }

    fn evaluate(&self, context: &RouteContext<'_>) -> StageDecision {
        let amount = context.command.amount.unwrap_or(Decimal::ZERO);
        let violation = match context.command.action {
            Action::Invoice => amount_violation("Invoice", amount),
            Action::Payment => {
                amount_violation("Payment", amount).or_else(|| payment_violation(amount, context))
            }
            _ => None,
        };
        match violation {
            Some(violation) => StageDecision::Reject(violation.into()),
            None => StageDecision::Pass,
        }
    }
}

fn amount_violation(subject: &'static str, amount: Decimal) -> Option<EconomicViolation> {
    if amount <= Decimal::ZERO {
        return Some(EconomicViolation::InvalidAmount { subject, amount });
    }
    if amount > MAX_AMOUNT {
        return Some(EconomicViolation::AmountTooLarge {
            subject,
            amount,
            limit: MAX_AMOUNT,
        });
    }
    None
}

fn payment_violation(amount: Decimal, context: &RouteContext<'_>) -> Option<EconomicViolation> {
    let totals = context.financials;
    if totals.invoiced <= Decimal::ZERO {
        return Some(EconomicViolation::NoInvoice);
    }
    if totals.balance <= Decimal::ZERO {
        return Some(EconomicViolation::BalanceSettled {
            balance: totals.balance,
        });
    }
    if amount > totals.balance {
        return Some(EconomicViolation::AmountExceedsBalance {
            amount,
            balance: totals.balance,
        });
    }
    None
}
