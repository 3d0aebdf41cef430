use std::sync::RwLock;

use tally_types::{ClientId, LedgerEntry, NewEntry};

use crate::error::LedgerError;
use crate::traits::{LedgerReader, LedgerTx, LedgerWriter, TxDecision};

/// In-memory ledger for tests, local demos, and embedding.
#[derive(Default)]
pub struct InMemoryLedger {
    rows: RwLock<Vec<LedgerEntry>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with rows that already carry sequence numbers.
    pub fn with_entries(entries: Vec<LedgerEntry>) -> Self {
        Self {
            rows: RwLock::new(entries),
        }
    }
}

fn push_row(rows: &mut Vec<LedgerEntry>, entry: NewEntry) -> LedgerEntry {
    let seq = rows.last().map_or(1, |last| last.seq + 1);
    let entry = entry.into_entry(seq);
    rows.push(entry.clone());
    entry
}

fn client_rows(rows: &[LedgerEntry], client: &ClientId) -> Vec<LedgerEntry> {
    rows.iter()
        .filter(|entry| &entry.client_name == client)
        .cloned()
        .collect()
}

/// Transaction view over the write-locked rows.
struct MemoryTx<'a> {
    rows: &'a mut Vec<LedgerEntry>,
}

impl LedgerTx for MemoryTx<'_> {
    fn history(&self, client: &ClientId) -> Result<Vec<LedgerEntry>, LedgerError> {
        Ok(client_rows(self.rows, client))
    }

    fn append(&mut self, entry: NewEntry) -> Result<LedgerEntry, LedgerError> {
        Ok(push_row(self.rows, entry))
    }
}

impl LedgerWriter for InMemoryLedger {
    fn append(&self, entry: NewEntry) -> Result<LedgerEntry, LedgerError> {
        let mut rows = self.rows.write().map_err(|_| LedgerError::LockPoisoned)?;
        Ok(push_row(&mut rows, entry))
    }

    fn transaction(
        &self,
        work: &mut dyn FnMut(&mut dyn LedgerTx) -> Result<TxDecision, LedgerError>,
    ) -> Result<(), LedgerError> {
        let mut rows = self.rows.write().map_err(|_| LedgerError::LockPoisoned)?;
        let start = rows.len();
        let decision = work(&mut MemoryTx { rows: &mut *rows });
        if !matches!(decision, Ok(TxDecision::Commit)) {
            rows.truncate(start);
        }
        decision.map(|_| ())
    }
}

impl LedgerReader for InMemoryLedger {
    fn history(&self, client: &ClientId) -> Result<Vec<LedgerEntry>, LedgerError> {
        let rows = self.rows.read().map_err(|_| LedgerError::LockPoisoned)?;
        Ok(client_rows(&rows, client))
    }

    fn clients(&self) -> Result<Vec<ClientId>, LedgerError> {
        let rows = self.rows.read().map_err(|_| LedgerError::LockPoisoned)?;
        let mut clients: Vec<ClientId> = Vec::new();
        for entry in rows.iter() {
            if !clients.contains(&entry.client_name) {
                clients.push(entry.client_name.clone());
            }
        }
        Ok(clients)
    }

    fn all_entries(&self) -> Result<Vec<LedgerEntry>, LedgerError> {
        let rows = self.rows.read().map_err(|_| LedgerError::LockPoisoned)?;
        Ok(rows.clone())
    }

    fn last_entry(&self, client: &ClientId) -> Result<Option<LedgerEntry>, LedgerError> {
        let rows = self.rows.read().map_err(|_| LedgerError::LockPoisoned)?;
        Ok(rows
            .iter()
            .rev()
            .find(|entry| &entry.client_name == client)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use tally_types::{Decimal, TransactionType, WorkflowState};

    use super::*;

    fn client(name: &str) -> ClientId {
        ClientId::parse(name).unwrap()
    }

    fn row(name: &str, kind: TransactionType, amount: i64) -> NewEntry {
        NewEntry::for_transaction(
            client(name),
            kind,
            Decimal::from(amount),
            NaiveDate::from_ymd_opt(2026, 2, 1).unwrap(),
        )
    }

    #[test]
    fn unknown_client_is_idle() {
        let ledger = InMemoryLedger::new();
        assert_eq!(ledger.current_state(&client("Noah")).unwrap(), WorkflowState::Idle);
        assert!(ledger.history(&client("Noah")).unwrap().is_empty());
    }

    #[test]
    fn append_assigns_sequence_and_tracks_state() {
        let ledger = InMemoryLedger::new();
        let first = ledger.append(row("Noah", TransactionType::Intake, 0)).unwrap();
        let second = ledger.append(row("Mia", TransactionType::Intake, 0)).unwrap();
        let third = ledger.append(row("Noah", TransactionType::Meeting, 0)).unwrap();

        assert_eq!((first.seq, second.seq, third.seq), (1, 2, 3));
        assert_eq!(
            ledger.current_state(&client("Noah")).unwrap(),
            WorkflowState::MeetingScheduled
        );
        assert_eq!(
            ledger.current_state(&client("Mia")).unwrap(),
            WorkflowState::IntakeCompleted
        );
        assert_eq!(ledger.history(&client("Noah")).unwrap().len(), 2);
        assert_eq!(ledger.clients().unwrap(), vec![client("Noah"), client("Mia")]);
    }

    #[test]
    fn financials_follow_history() {
        let ledger = InMemoryLedger::new();
        ledger.append(row("Noah", TransactionType::Invoice, 400)).unwrap();
        ledger.append(row("Noah", TransactionType::Payment, 150)).unwrap();
        let totals = ledger.financials(&client("Noah")).unwrap();
        assert_eq!(totals.balance, Decimal::from(250));
    }

    #[test]
    fn transaction_sees_its_own_rows_and_commits_them() {
        let ledger = InMemoryLedger::new();
        ledger.append(row("Noah", TransactionType::Invoice, 400)).unwrap();
        ledger
            .transaction(&mut |tx| {
                tx.append(row("Noah", TransactionType::Payment, 150))?;
                assert_eq!(tx.history(&client("Noah"))?.len(), 2);
                Ok(TxDecision::Commit)
            })
            .unwrap();
        assert_eq!(ledger.history(&client("Noah")).unwrap().len(), 2);
    }

    #[test]
    fn rolled_back_or_failed_transactions_leave_no_rows() {
        let ledger = InMemoryLedger::new();
        ledger
            .transaction(&mut |tx| {
                tx.append(row("Noah", TransactionType::Intake, 0))?;
                Ok(TxDecision::Rollback)
            })
            .unwrap();
        let err = ledger
            .transaction(&mut |tx| {
                tx.append(row("Noah", TransactionType::Intake, 0))?;
                Err(LedgerError::Overflow { seq: 1 })
            })
            .unwrap_err();
        assert!(matches!(err, LedgerError::Overflow { seq: 1 }));
        assert!(ledger.all_entries().unwrap().is_empty());
        assert_eq!(ledger.append(row("Mia", TransactionType::Intake, 0)).unwrap().seq, 1);
    }
}
