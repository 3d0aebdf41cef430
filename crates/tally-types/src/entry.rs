use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::client::ClientId;
use crate::workflow::{TransactionType, WorkflowState};

/// A ledger row that has not been persisted yet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEntry {
    pub client_name: ClientId,
    pub transaction_type: TransactionType,
    pub amount: Decimal,
    pub date: NaiveDate,
    /// The workflow state the client transitions into.
    pub state: WorkflowState,
    pub description: String,
    pub notes: String,
}

impl NewEntry {
    /// Build a row for `kind`, deriving the resulting state and description.
    pub fn for_transaction(
        client_name: ClientId,
        transaction_type: TransactionType,
        amount: Decimal,
        date: NaiveDate,
    ) -> Self {
        Self {
            client_name,
            transaction_type,
            amount,
            date,
            state: transaction_type.resulting_state(),
            description: transaction_type.description().to_string(),
            notes: String::new(),
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    /// Attach the store-assigned sequence number.
    pub fn into_entry(self, seq: u64) -> LedgerEntry {
        LedgerEntry {
            seq,
            client_name: self.client_name,
            transaction_type: self.transaction_type,
            amount: self.amount,
            date: self.date,
            state: self.state,
            description: self.description,
            notes: self.notes,
        }
    }
}

/// One durable transaction row for a client. Immutable once written.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Store-wide insertion sequence, starting at 1.
    pub seq: u64,
    pub client_name: ClientId,
    pub transaction_type: TransactionType,
    pub amount: Decimal,
    pub date: NaiveDate,
    pub state: WorkflowState,
    pub description: String,
    pub notes: String,
}
