use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

// ---------------------------------------------------------------------------
// WorkflowState
// ---------------------------------------------------------------------------

/// Lifecycle stage of one client.
///
/// The lifecycle is a strict linear chain:
/// `idle → intake_completed → meeting_scheduled → follow_up_sent →
/// invoice_issued → payment_received`, where `payment_received` loops onto
/// itself for successive partial payments.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    /// No ledger history yet.
    Idle,
    IntakeCompleted,
    MeetingScheduled,
    FollowUpSent,
    InvoiceIssued,
    PaymentReceived,
}

impl WorkflowState {
    pub const ALL: [WorkflowState; 6] = [
        Self::Idle,
        Self::IntakeCompleted,
        Self::MeetingScheduled,
        Self::FollowUpSent,
        Self::InvoiceIssued,
        Self::PaymentReceived,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::IntakeCompleted => "intake_completed",
            Self::MeetingScheduled => "meeting_scheduled",
            Self::FollowUpSent => "follow_up_sent",
            Self::InvoiceIssued => "invoice_issued",
            Self::PaymentReceived => "payment_received",
        }
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkflowState {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| TypeError::UnknownState(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// TransactionType
// ---------------------------------------------------------------------------

/// Kind of a persisted ledger row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Intake,
    Meeting,
    FollowUp,
    Invoice,
    Payment,
}

impl TransactionType {
    pub const ALL: [TransactionType; 5] = [
        Self::Intake,
        Self::Meeting,
        Self::FollowUp,
        Self::Invoice,
        Self::Payment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Intake => "INTAKE",
            Self::Meeting => "MEETING",
            Self::FollowUp => "FOLLOW_UP",
            Self::Invoice => "INVOICE",
            Self::Payment => "PAYMENT",
        }
    }

    /// The workflow state a client enters once a row of this type is written.
    pub fn resulting_state(&self) -> WorkflowState {
        match self {
            Self::Intake => WorkflowState::IntakeCompleted,
            Self::Meeting => WorkflowState::MeetingScheduled,
            Self::FollowUp => WorkflowState::FollowUpSent,
            Self::Invoice => WorkflowState::InvoiceIssued,
            Self::Payment => WorkflowState::PaymentReceived,
        }
    }

    /// Whether rows of this type carry money.
    pub fn is_financial(&self) -> bool {
        matches!(self, Self::Invoice | Self::Payment)
    }

    /// Default human-readable description for a row of this type.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Intake => "Client intake completed",
            Self::Meeting => "Meeting scheduled",
            Self::FollowUp => "Follow-up sent",
            Self::Invoice => "Invoice issued",
            Self::Payment => "Payment received",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| TypeError::UnknownTransactionType(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

/// A command verb accepted by the router.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Onboard,
    Meet,
    #[serde(rename = "followup")]
    FollowUp,
    Invoice,
    Payment,
    Report,
    Status,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Onboard => "onboard",
            Self::Meet => "meet",
            Self::FollowUp => "followup",
            Self::Invoice => "invoice",
            Self::Payment => "payment",
            Self::Report => "report",
            Self::Status => "status",
        }
    }

    /// `report` and `status` never mutate and are legal from every state.
    pub fn is_read_only(&self) -> bool {
        matches!(self, Self::Report | Self::Status)
    }

    /// Whether this action moves money and therefore requires an amount.
    pub fn requires_amount(&self) -> bool {
        matches!(self, Self::Invoice | Self::Payment)
    }

    /// The ledger row written when this action commits.
    pub fn transaction_type(&self) -> Option<TransactionType> {
        match self {
            Self::Onboard => Some(TransactionType::Intake),
            Self::Meet => Some(TransactionType::Meeting),
            Self::FollowUp => Some(TransactionType::FollowUp),
            Self::Invoice => Some(TransactionType::Invoice),
            Self::Payment => Some(TransactionType::Payment),
            Self::Report | Self::Status => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = TypeError;

    /// Case-insensitive; `follow_up` and `follow-up` are accepted for `followup`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "onboard" => Ok(Self::Onboard),
            "meet" => Ok(Self::Meet),
            "followup" | "follow_up" | "follow-up" => Ok(Self::FollowUp),
            "invoice" => Ok(Self::Invoice),
            "payment" => Ok(Self::Payment),
            "report" => Ok(Self::Report),
            "status" => Ok(Self::Status),
            _ => Err(TypeError::UnknownAction(s.to_string())),
        }
    }
}
