use serde::Serialize;
use tally_journal::JournalError;
use tally_ledger::LedgerError;
use tally_types::{Action, ClientId, Decimal, WorkflowState};

/// Machine-readable name of the rule a rejected command violated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RejectionCode {
    ParseError,
    MissingClient,
    IllegalTransition,
    Duplicate,
    InvalidAmount,
    NoInvoice,
    BalanceSettled,
    AmountExceedsBalance,
}

impl RejectionCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ParseError => "parse-error",
            Self::MissingClient => "missing-client",
            Self::IllegalTransition => "illegal-transition",
            Self::Duplicate => "duplicate",
            Self::InvalidAmount => "invalid-amount",
            Self::NoInvoice => "no-invoice",
            Self::BalanceSettled => "balance-settled",
            Self::AmountExceedsBalance => "amount-exceeds-balance",
        }
    }
}

/// A recoverable rejection as reported to the caller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Rejection {
    pub reason: RejectionCode,
    pub message: String,
}

/// A money rule a financial command broke.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum EconomicViolation {
    #[error("{subject} rejected: amount must be positive (got {amount}).")]
    InvalidAmount { subject: &'static str, amount: Decimal },

    #[error("{subject} rejected: amount exceeds the limit of {limit} (got {amount}).")]
    AmountTooLarge {
        subject: &'static str,
        amount: Decimal,
        limit: Decimal,
    },

    #[error("Payment rejected: no invoice issued.")]
    NoInvoice,

    #[error("Payment rejected: balance already settled (balance {balance}).")]
    BalanceSettled { balance: Decimal },

    #[error("Payment rejected: amount exceeds balance (amount {amount}, balance {balance}).")]
    AmountExceedsBalance { amount: Decimal, balance: Decimal },
}

impl EconomicViolation {
    pub fn code(&self) -> RejectionCode {
        match self {
            Self::InvalidAmount { .. } | Self::AmountTooLarge { .. } => RejectionCode::InvalidAmount,
            Self::NoInvoice => RejectionCode::NoInvoice,
            Self::BalanceSettled { .. } => RejectionCode::BalanceSettled,
            Self::AmountExceedsBalance { .. } => RejectionCode::AmountExceedsBalance,
        }
    }
}

/// Errors produced while routing a command.
///
/// Everything except `Store`, `Journal`, and `LockPoisoned` is a
/// recoverable rejection: nothing was written.
#[derive(Debug, thiserror::Error)]
pub enum RoutingError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Missing client name.")]
    MissingClient,

    #[error("Illegal action '{action}' from state '{state}'.")]
    IllegalTransition { action: Action, state: WorkflowState },

    #[error("Duplicate {action}{} for {client} ignored.", amount_phrase(.amount))]
    Duplicate {
        action: Action,
        client: ClientId,
        /// The repeated amount, for invoices and payments.
        amount: Option<Decimal>,
    },

    #[error(transparent)]
    Economic(#[from] EconomicViolation),

    #[error("ledger store failure: {0}")]
    Store(#[from] LedgerError),

    #[error("event log failure: {0}")]
    Journal(#[from] JournalError),

    #[error("client lock poisoned")]
    LockPoisoned,
}

fn amount_phrase(amount: &Option<Decimal>) -> String {
    amount.map_or_else(String::new, |amount| format!(" of {}", amount.normalize()))
}

impl RoutingError {
    /// The caller-facing rejection, or `None` for hard failures.
    pub fn rejection(&self) -> Option<Rejection> {
        let reason = match self {
            Self::Parse(_) => RejectionCode::ParseError,
            Self::MissingClient => RejectionCode::MissingClient,
            Self::IllegalTransition { .. } => RejectionCode::IllegalTransition,
            Self::Duplicate { .. } => RejectionCode::Duplicate,
            Self::Economic(violation) => violation.code(),
            Self::Store(_) | Self::Journal(_) | Self::LockPoisoned => return None,
        };
        Some(Rejection {
            reason,
            message: self.to_string(),
        })
    }

    pub fn is_rejection(&self) -> bool {
        self.rejection().is_some()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn rejection_serializes_code_and_message() {
        let err = RoutingError::IllegalTransition {
            action: Action::Invoice,
            state: WorkflowState::Idle,
        };
        let value = serde_json::to_value(err.rejection().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "reason": "illegal-transition",
                "message": "Illegal action 'invoice' from state 'idle'."
            })
        );
    }

    #[test]
    fn economic_message_names_values() {
        let err = RoutingError::from(EconomicViolation::AmountExceedsBalance {
            amount: Decimal::from(300),
            balance: Decimal::from(200),
        });
        let rejection = err.rejection().unwrap();
        assert_eq!(rejection.reason, RejectionCode::AmountExceedsBalance);
        assert!(rejection.message.contains("300"));
        assert!(rejection.message.contains("200"));
    }

    #[test]
    fn duplicate_message_names_the_amount() {
        let client = ClientId::parse("Noah").unwrap();
        let payment = RoutingError::Duplicate {
            action: Action::Payment,
            client: client.clone(),
            amount: Some(Decimal::new(20000, 2)),
        };
        assert_eq!(payment.to_string(), "Duplicate payment of 200 for Noah ignored.");
        let meeting = RoutingError::Duplicate {
            action: Action::Meet,
            client,
            amount: None,
        };
        assert_eq!(meeting.to_string(), "Duplicate meet for Noah ignored.");
    }

    #[test]
    fn hard_failures_are_not_rejections() {
        assert!(!RoutingError::LockPoisoned.is_rejection());
        assert!(RoutingError::MissingClient.is_rejection());
    }

    #[test]
    fn code_strings_match_serde() {
        for code in [RejectionCode::ParseError, RejectionCode::AmountExceedsBalance] {
            assert_eq!(serde_json::to_value(code).unwrap(), json!(code.as_str()));
        }
    }
}
