//! Cross-check of the two state representations: the ledger store (live
//! path) against the replayed event log (audit path).

use std::collections::BTreeSet;

use serde::Serialize;
use tally_journal::{ClientTotals, ReplayResult};
use tally_ledger::{LedgerError, LedgerReader};
use tally_types::ClientId;
use tracing::warn;

/// One client whose totals differ between the ledger and the replay.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ClientDrift {
    pub client: ClientId,
    /// `None` when the ledger has no rows for the client.
    pub ledger: Option<ClientTotals>,
    /// `None` when the log has no events for the client.
    pub journal: Option<ClientTotals>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub clients_checked: usize,
    pub drift: Vec<ClientDrift>,
}

impl ReconcileReport {
    pub fn is_consistent(&self) -> bool {
        self.drift.is_empty()
    }
}

/// Compare `{invoiced, paid, balance}` for every client either side knows.
pub fn reconcile<R: LedgerReader + ?Sized>(
    store: &R,
    replayed: &ReplayResult,
) -> Result<ReconcileReport, LedgerError> {
    let mut clients: BTreeSet<ClientId> = store.clients()?.into_iter().collect();
    clients.extend(replayed.state.keys().cloned());

    let mut report = ReconcileReport {
        clients_checked: clients.len(),
        drift: Vec::new(),
    };
    for client in clients {
        let ledger = if store.last_entry(&client)?.is_some() {
            let totals = store.financials(&client)?;
            Some(ClientTotals {
                invoiced: totals.invoiced,
                paid: totals.paid,
                balance: totals.balance,
            })
        } else {
            None
        };
        let journal = replayed.state.get(&client).cloned();
        if ledger != journal {
            warn!(client = %client, ?ledger, ?journal, "ledger and replay disagree");
            report.drift.push(ClientDrift {
                client,
                ledger,
                journal,
            });
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use tally_journal::EntityState;
    use tally_ledger::{InMemoryLedger, LedgerWriter};
    use tally_types::{Decimal, NewEntry, TransactionType};

    use super::*;

    fn client(name: &str) -> ClientId {
        ClientId::parse(name).unwrap()
    }

    fn totals(invoiced: i64, paid: i64) -> ClientTotals {
        ClientTotals {
            invoiced: Decimal::from(invoiced),
            paid: Decimal::from(paid),
            balance: Decimal::from(invoiced - paid),
        }
    }

    fn replayed(state: EntityState) -> ReplayResult {
        ReplayResult {
            state,
            applied_events: 0,
            evaluated_records: 0,
            tail_hash: "GENESIS".into(),
        }
    }

    fn ledger_with_invoice(amount: i64) -> InMemoryLedger {
        let ledger = InMemoryLedger::new();
        ledger
            .append(NewEntry::for_transaction(
                client("Noah"),
                TransactionType::Invoice,
                Decimal::from(amount),
                NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            ))
            .unwrap();
        ledger
    }

    #[test]
    fn matching_sides_are_consistent() {
        let ledger = ledger_with_invoice(400);
        let state = EntityState::from([(client("Noah"), totals(400, 0))]);
        let report = reconcile(&ledger, &replayed(state)).unwrap();
        assert!(report.is_consistent());
        assert_eq!(report.clients_checked, 1);
    }

    #[test]
    fn differing_totals_are_drift() {
        let ledger = ledger_with_invoice(400);
        let state = EntityState::from([(client("Noah"), totals(500, 0))]);
        let report = reconcile(&ledger, &replayed(state)).unwrap();
        assert_eq!(report.drift.len(), 1);
        assert_eq!(report.drift[0].ledger, Some(totals(400, 0)));
        assert_eq!(report.drift[0].journal, Some(totals(500, 0)));
    }

    #[test]
    fn one_sided_clients_are_drift() {
        let ledger = ledger_with_invoice(400);
        let state = EntityState::from([(client("Mia"), totals(0, 0))]);
        let report = reconcile(&ledger, &replayed(state)).unwrap();
        assert_eq!(report.clients_checked, 2);
        assert_eq!(report.drift.len(), 2);
        let mia = report.drift.iter().find(|d| d.client == client("Mia")).unwrap();
        assert_eq!(mia.ledger, None);
    }
}
