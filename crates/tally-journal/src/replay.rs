use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tally_crypto::{hash_canonical, HashChainVerifier, GENESIS};
use tally_types::{normalize_money, ClientId, Decimal};
use tracing::debug;

use crate::error::{JournalError, Result};
use crate::event::{EventKind, EventRecord};
use crate::log::EventLog;

/// Accumulated money for one client.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientTotals {
    pub invoiced: Decimal,
    pub paid: Decimal,
    pub balance: Decimal,
}

impl ClientTotals {
    /// Fold one event in; `None` when a total would overflow.
    fn apply(&mut self, kind: EventKind, amount: Decimal) -> Option<()> {
        match kind {
            EventKind::Invoice => {
                self.invoiced = self.invoiced.checked_add(amount)?;
                self.balance = self.balance.checked_add(amount)?;
            }
            EventKind::Payment => {
                self.paid = self.paid.checked_add(amount)?;
                self.balance = self.balance.checked_sub(amount)?;
            }
            EventKind::Intake | EventKind::Meeting | EventKind::FollowUp => {}
        }
        Some(())
    }

    /// JSON form with normalized decimal strings.
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("balance".into(), money(self.balance));
        map.insert("invoiced".into(), money(self.invoiced));
        map.insert("paid".into(), money(self.paid));
        Value::Object(map)
    }
}

fn money(amount: Decimal) -> Value {
    Value::String(normalize_money(amount).to_string())
}

/// Client identity → accumulated totals, ordered by client.
pub type EntityState = BTreeMap<ClientId, ClientTotals>;

/// Result of replaying the log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplayResult {
    pub state: EntityState,
    /// Records that changed a client's totals.
    pub applied_events: u64,
    pub evaluated_records: u64,
    pub tail_hash: String,
}

impl ReplayResult {
    /// The state as a JSON object, the form that snapshots publish.
    pub fn state_value(&self) -> Value {
        ReplayEngine::state_value(&self.state)
    }

    /// Canonical-JSON SHA-256 of [`Self::state_value`].
    pub fn state_hash(&self) -> String {
        hash_canonical(&self.state_value())
    }
}

/// Deterministic replay of the event log.
///
/// Each record is verified against the chain before it is applied, and the
/// first break aborts the whole replay; no partial state escapes.
/// Only canonical v1 events are interpreted: `invoice` accumulates into
/// `invoiced`, `payment` into `paid`, and workflow kinds register the client
/// with zero totals.
pub struct ReplayEngine;

impl ReplayEngine {
    /// Replay the log file. Failures are reported in line order: a break
    /// in the readable prefix wins over a later unreadable line.
    pub fn replay_log(log: &EventLog) -> Result<ReplayResult> {
        let scan = log.scan()?;
        let result = Self::replay(&scan.records)?;
        match scan.unreadable {
            Some(err) => Err(err.into()),
            None => Ok(result),
        }
    }

    pub fn replay(records: &[EventRecord]) -> Result<ReplayResult> {
        let mut state = EntityState::new();
        let mut applied_events = 0u64;
        let mut evaluated_records = 0u64;
        let mut prev = GENESIS.to_string();

        for record in records {
            prev = HashChainVerifier::verify_link(record, &prev)?;
            let event = record.decode()?;
            evaluated_records += 1;

            let totals = state.entry(event.client).or_default();
            if matches!(event.kind, EventKind::Invoice | EventKind::Payment) {
                totals
                    .apply(event.kind, event.amount)
                    .ok_or(JournalError::Overflow { line: record.line })?;
                applied_events += 1;
            }
        }

        debug!(evaluated_records, applied_events, clients = state.len(), "replay complete");
        Ok(ReplayResult {
            state,
            applied_events,
            evaluated_records,
            tail_hash: prev,
        })
    }

    /// JSON object `{client: {balance, invoiced, paid}}` with keys in client
    /// order and normalized money strings.
    pub fn state_value(state: &EntityState) -> Value {
        let map: Map<String, Value> = state
            .iter()
            .map(|(client, totals)| (client.to_string(), totals.to_value()))
            .collect();
        Value::Object(map)
    }
}
