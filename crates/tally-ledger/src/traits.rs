use tally_types::{ClientId, LedgerEntry, NewEntry, WorkflowState};

use crate::error::LedgerError;
use crate::financials::ClientFinancials;

/// How a [`LedgerWriter::transaction`] body wants its writes settled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TxDecision {
    Commit,
    Rollback,
}

/// The view of the ledger inside an exclusive write transaction.
///
/// Reads see every committed row plus this transaction's own appends.
pub trait LedgerTx {
    /// Every row for `client`, in insertion order.
    fn history(&self, client: &ClientId) -> Result<Vec<LedgerEntry>, LedgerError>;

    /// Stage one row; it becomes visible to other readers only on commit.
    fn append(&mut self, entry: NewEntry) -> Result<LedgerEntry, LedgerError>;
}

/// Write boundary for the ledger. The command router is the only caller.
///
/// Implementations must make each append atomic: readers see either the
/// whole row or nothing.
pub trait LedgerWriter: Send + Sync {
    /// Persist one row and return it with its assigned sequence number.
    fn append(&self, entry: NewEntry) -> Result<LedgerEntry, LedgerError>;

    /// Run `work` while holding the store's write lock.
    ///
    /// No other writer, in this process or another one sharing the same
    /// storage, can commit between the reads and appends made by `work`.
    /// Rows appended by `work` are kept only when it returns
    /// `Ok(TxDecision::Commit)`. When this returns `Ok`, `work` ran exactly
    /// once.
    fn transaction(
        &self,
        work: &mut dyn FnMut(&mut dyn LedgerTx) -> Result<TxDecision, LedgerError>,
    ) -> Result<(), LedgerError>;
}

/// Read boundary for the ledger.
pub trait LedgerReader: Send + Sync {
    /// Every row for `client`, in insertion order.
    fn history(&self, client: &ClientId) -> Result<Vec<LedgerEntry>, LedgerError>;

    /// Distinct clients in order of first appearance.
    fn clients(&self) -> Result<Vec<ClientId>, LedgerError>;

    /// Every row in the store, in insertion order.
    fn all_entries(&self) -> Result<Vec<LedgerEntry>, LedgerError>;

    /// The client's most recent row.
    fn last_entry(&self, client: &ClientId) -> Result<Option<LedgerEntry>, LedgerError> {
        Ok(self.history(client)?.pop())
    }

    /// The most recent row's state, or `Idle` for a client with no history.
    fn current_state(&self, client: &ClientId) -> Result<WorkflowState, LedgerError> {
        Ok(self
            .last_entry(client)?
            .map_or(WorkflowState::Idle, |entry| entry.state))
    }

    /// Totals recomputed from the client's full history.
    fn financials(&self, client: &ClientId) -> Result<ClientFinancials, LedgerError> {
        ClientFinancials::from_entries(&self.history(client)?)
    }
}

/// A full ledger: both boundaries.
pub trait LedgerStore: LedgerReader + LedgerWriter {}

impl<T: LedgerReader + LedgerWriter> LedgerStore for T {}
