use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use tally_journal::{
    ChainReport, EventLog, IntegrityVerdict, NormalizeReport, ReplayEngine, ReplayResult,
    Snapshot, VerifyReport,
};
use tally_ledger::{
    ClientReport, HighValueClient, InMemoryLedger, LedgerReader, LedgerStore, OverdueClient,
    ReportSummary, Reporter, SqliteLedger,
};
use tally_router::{Command, CommandRouter, Outcome, RoutingError};
use tally_types::{ClientId, Clock, Decimal, LedgerEntry, SystemClock, WorkflowState};
use tracing::info;

use crate::config::{LedgerBackend, WorkspaceConfig};
use crate::error::SdkResult;
use crate::reconcile::{reconcile, ReconcileReport};

/// One open tally workspace: the ledger store, the event log, and the
/// router that writes to both.
///
/// Construct once per process with [`Workspace::open`] and pass it to
/// whatever needs it; [`Workspace::close`] flushes the log.
pub struct Workspace {
    config: WorkspaceConfig,
    clock: Arc<dyn Clock>,
    store: Arc<dyn LedgerStore>,
    log: Arc<EventLog>,
    router: CommandRouter,
}

impl Workspace {
    pub fn open(config: WorkspaceConfig) -> SdkResult<Self> {
        Self::open_with_clock(config, Arc::new(SystemClock))
    }

    pub fn open_with_clock(config: WorkspaceConfig, clock: Arc<dyn Clock>) -> SdkResult<Self> {
        std::fs::create_dir_all(&config.data_dir)?;

        let store: Arc<dyn LedgerStore> = match config.ledger {
            LedgerBackend::Sqlite => Arc::new(SqliteLedger::open(&config.ledger_path())?),
            LedgerBackend::Memory => Arc::new(InMemoryLedger::new()),
        };
        let log = Arc::new(EventLog::open(&config.events_path(), config.event_log_config())?);

        let mut router = CommandRouter::with_default_stages(Arc::clone(&store), Arc::clone(&clock));
        if config.record_events {
            router = router.with_journal(Arc::clone(&log));
        }

        info!(
            data_dir = %config.data_dir.display(),
            ledger = ?config.ledger,
            record_events = config.record_events,
            "workspace opened"
        );
        Ok(Self {
            config,
            clock,
            store,
            log,
            router,
        })
    }

    /// Flush and `fsync` the event log.
    pub fn close(self) -> SdkResult<()> {
        self.log.sync()?;
        info!(data_dir = %self.config.data_dir.display(), "workspace closed");
        Ok(())
    }

    pub fn config(&self) -> &WorkspaceConfig {
        &self.config
    }

    pub fn event_log(&self) -> &EventLog {
        &self.log
    }

    pub fn router(&self) -> &CommandRouter {
        &self.router
    }

    // ---- Commands ----

    pub fn execute(&self, command: &Command) -> Result<Outcome, RoutingError> {
        self.router.execute(command)
    }

    pub fn execute_text(&self, text: &str) -> Result<Outcome, RoutingError> {
        self.router.execute_text(text)
    }

    pub fn execute_json(&self, value: &Value) -> Result<Outcome, RoutingError> {
        self.router.execute_json(value)
    }

    // ---- Reporting ----

    fn reporter(&self) -> Reporter<'_, dyn LedgerStore> {
        Reporter::new(self.store.as_ref())
    }

    pub fn report(&self, client: &ClientId) -> SdkResult<ClientReport> {
        Ok(self.reporter().report(client)?)
    }

    pub fn status(&self, client: &ClientId) -> SdkResult<WorkflowState> {
        Ok(self.store.current_state(client)?)
    }

    pub fn history(&self, client: &ClientId) -> SdkResult<Vec<LedgerEntry>> {
        Ok(self.store.history(client)?)
    }

    pub fn clients(&self) -> SdkResult<Vec<ReportSummary>> {
        Ok(self.reporter().all()?)
    }

    /// Uses the configured threshold when `threshold` is `None`.
    pub fn high_value(&self, threshold: Option<Decimal>) -> SdkResult<Vec<HighValueClient>> {
        let threshold = threshold.unwrap_or(self.config.reporting.high_value_threshold);
        Ok(self.reporter().high_value(threshold)?)
    }

    /// Uses the configured window when `days` is `None`; "today" comes
    /// from the workspace clock.
    pub fn overdue(&self, days: Option<u64>) -> SdkResult<Vec<OverdueClient>> {
        let days = days.unwrap_or(self.config.reporting.overdue_days);
        let today = self.clock.now().date_naive();
        Ok(self.reporter().overdue(days, today)?)
    }

    pub fn search(&self, keyword: &str) -> SdkResult<Vec<LedgerEntry>> {
        Ok(self.reporter().search(keyword)?)
    }

    // ---- Event log integrity ----

    pub fn verify(&self) -> SdkResult<VerifyReport> {
        Ok(self.log.verify()?)
    }

    pub fn chain(&self) -> SdkResult<ChainReport> {
        Ok(self.log.chain()?)
    }

    pub fn normalize(&self) -> SdkResult<NormalizeReport> {
        Ok(self.log.normalize(self.clock.as_ref())?)
    }

    pub fn append_raw(&self, raw: &Value) -> SdkResult<usize> {
        Ok(self.log.append_raw(raw, self.clock.as_ref())?.line)
    }

    pub fn replay(&self) -> SdkResult<ReplayResult> {
        Ok(ReplayEngine::replay_log(&self.log)?)
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.config.snapshot_path()
    }

    pub fn snapshot(&self) -> SdkResult<Snapshot> {
        Ok(Snapshot::publish(&self.log, &self.snapshot_path(), self.clock.as_ref())?)
    }

    pub fn check(&self) -> SdkResult<IntegrityVerdict> {
        Ok(Snapshot::check(&self.log, &self.snapshot_path())?)
    }

    /// Replay the log and compare it against the ledger store.
    pub fn reconcile(&self) -> SdkResult<ReconcileReport> {
        let replayed = self.replay()?;
        Ok(reconcile(self.store.as_ref(), &replayed)?)
    }
}
