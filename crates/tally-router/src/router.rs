use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use serde_json::Value;
use tally_journal::{Event, EventLog};
use tally_ledger::{
    ClientFinancials, ClientReport, LedgerError, LedgerReader, LedgerStore, LedgerTx, LedgerWriter, Reporter,
    TxDecision,
};
use tally_types::{Action, ClientId, Clock, Decimal, LedgerEntry, NewEntry, WorkflowState};
use tracing::{debug, warn};

use crate::command::Command;
use crate::error::RoutingError;
use crate::locks::ClientLocks;
use crate::stage::{RouteContext, RouterStage, StageDecision, StageResult};
use crate::stages::{DuplicateStage, EconomicStage, LegalityStage};

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// What an accepted command produced.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// A mutating action was written to the ledger.
    Committed { entry: LedgerEntry, message: String },
    /// `report`: read-only.
    Report { report: ClientReport },
    /// `status`: read-only.
    Status { client: ClientId, state: WorkflowState },
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Committed { message, .. } => f.write_str(message),
            Self::Report { report } => write!(f, "{report}"),
            Self::Status { client, state } => write!(f, "{client} is in state '{state}'."),
        }
    }
}

/// A routed command together with the per-stage audit trail.
#[derive(Debug)]
pub struct RouteResult {
    pub outcome: Result<Outcome, RoutingError>,
    pub stage_results: Vec<StageResult>,
}

// ---------------------------------------------------------------------------
// CommandRouter
// ---------------------------------------------------------------------------

/// The single write path to the ledger.
///
/// Each mutating command takes its client's lock and opens a store
/// transaction. Inside it the router reads the committed position, runs the
/// stage pipeline fail-fast, and only then appends one ledger row and, when
/// a journal is attached, one chained event. A rejection or a failed event
/// append rolls the row back.
pub struct CommandRouter {
    store: Arc<dyn LedgerStore>,
    journal: Option<Arc<EventLog>>,
    clock: Arc<dyn Clock>,
    stages: Vec<Box<dyn RouterStage>>,
    locks: ClientLocks,
}

impl CommandRouter {
    /// A router with no stages. Use [`Self::with_default_stages`] for the
    /// standard pipeline.
    pub fn new(store: Arc<dyn LedgerStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            journal: None,
            clock,
            stages: Vec::new(),
            locks: ClientLocks::new(),
        }
    }

    /// Duplicate -> Legality -> Economics.
    pub fn with_default_stages(store: Arc<dyn LedgerStore>, clock: Arc<dyn Clock>) -> Self {
        let mut router = Self::new(store, clock);
        router.add_stage(Box::new(DuplicateStage));
        router.add_stage(Box::new(LegalityStage));
        router.add_stage(Box::new(EconomicStage));
        router
    }

    /// Mirror every committed row into `journal` as a canonical event.
    pub fn with_journal(mut self, journal: Arc<EventLog>) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn add_stage(&mut self, stage: Box<dyn RouterStage>) {
        self.stages.push(stage);
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    pub fn execute(&self, command: &Command) -> Result<Outcome, RoutingError> {
        self.route(command).outcome
    }

    pub fn execute_text(&self, text: &str) -> Result<Outcome, RoutingError> {
        self.execute(&Command::parse(text)?)
    }

    pub fn execute_json(&self, value: &Value) -> Result<Outcome, RoutingError> {
        self.execute(&Command::from_json(value)?)
    }

    /// Route a command and keep the per-stage results.
    pub fn route(&self, command: &Command) -> RouteResult {
        match command.action {
            Action::Report => RouteResult {
                outcome: Reporter::new(self.store.as_ref())
                    .report(&command.client)
                    .map(|report| Outcome::Report { report })
                    .map_err(RoutingError::from),
                stage_results: Vec::new(),
            },
            Action::Status => RouteResult {
                outcome: self
                    .store
                    .current_state(&command.client)
                    .map(|state| Outcome::Status {
                        client: command.client.clone(),
                        state,
                    })
                    .map_err(RoutingError::from),
                stage_results: Vec::new(),
            },
            _ => self.route_mutation(command),
        }
    }

    fn route_mutation(&self, command: &Command) -> RouteResult {
        let mut stage_results = Vec::with_capacity(self.stages.len());
        let outcome = self.locked_mutation(command, &mut stage_results);
        if let Err(err) = &outcome {
            match err.rejection() {
                Some(rejection) => warn!(
                    client = %command.client,
                    action = %command.action,
                    reason = rejection.reason.as_str(),
                    "command rejected"
                ),
                None => warn!(client = %command.client, action = %command.action, error = %err, "command failed"),
            }
        }
        RouteResult {
            outcome,
            stage_results,
        }
    }

    fn locked_mutation(
        &self,
        command: &Command,
        stage_results: &mut Vec<StageResult>,
    ) -> Result<Outcome, RoutingError> {
        let handle = self.locks.handle(&command.client)?;
        let _guard = handle.lock().map_err(|_| RoutingError::LockPoisoned)?;

        let mut outcome = None;
        self.store.transaction(&mut |tx: &mut dyn LedgerTx| {
            let result = self.evaluate_and_commit(tx, command, stage_results);
            let decision = if result.is_ok() {
                TxDecision::Commit
            } else {
                TxDecision::Rollback
            };
            outcome = Some(result);
            Ok(decision)
        })?;
        outcome.unwrap_or(Err(RoutingError::Store(LedgerError::TransactionNotRun)))
    }

    fn evaluate_and_commit(
        &self,
        tx: &mut dyn LedgerTx,
        command: &Command,
        stage_results: &mut Vec<StageResult>,
    ) -> Result<Outcome, RoutingError> {
        let history = tx.history(&command.client)?;
        let financials = ClientFinancials::from_entries(&history)?;
        let last_entry = history.last();
        let context = RouteContext {
            command,
            state: last_entry.map_or(WorkflowState::Idle, |entry| entry.state),
            last_entry,
            financials: &financials,
        };

        for stage in &self.stages {
            let started = Instant::now();
            let decision = stage.evaluate(&context);
            stage_results.push(StageResult {
                stage_name: stage.name().to_string(),
                passed: decision.is_pass(),
                elapsed: started.elapsed(),
            });
            if let StageDecision::Reject(err) = decision {
                return Err(err);
            }
        }

        self.commit(tx, command)
    }

    fn commit(&self, tx: &mut dyn LedgerTx, command: &Command) -> Result<Outcome, RoutingError> {
        let Some(kind) = command.action.transaction_type() else {
            return Err(RoutingError::Parse(format!(
                "{} does not write to the ledger",
                command.action
            )));
        };
        let amount = command.amount.unwrap_or(Decimal::ZERO);
        let now = self.clock.now();
        let entry = tx.append(NewEntry::for_transaction(
            command.client.clone(),
            kind,
            amount,
            now.date_naive(),
        ))?;
        debug!(seq = entry.seq, client = %entry.client_name, kind = %kind, %amount, "ledger row staged");

        if let Some(journal) = &self.journal {
            let event = Event::new(command.client.clone(), kind.into(), amount, now);
            let record = journal.append(&event)?;
            debug!(line = record.line, "event recorded");
        }

        let message = if kind.is_financial() {
            format!("{} for {} ({}).", entry.description, entry.client_name, amount.normalize())
        } else {
            format!("{} for {}.", entry.description, entry.client_name)
        };
        Ok(Outcome::Committed { entry, message })
    }
}
