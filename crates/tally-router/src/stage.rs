use std::time::Duration;

use tally_ledger::ClientFinancials;
use tally_types::{LedgerEntry, WorkflowState};

use crate::command::Command;
use crate::error::RoutingError;

// ---------------------------------------------------------------------------
// RouteContext
// ---------------------------------------------------------------------------

/// What every stage may consult: the command plus the client's committed
/// position, read once inside the store transaction that commits it.
pub struct RouteContext<'a> {
    pub command: &'a Command,
    pub state: WorkflowState,
    pub last_entry: Option<&'a LedgerEntry>,
    pub financials: &'a ClientFinancials,
}

// ---------------------------------------------------------------------------
// StageDecision
// ---------------------------------------------------------------------------

/// The outcome of a single stage evaluation.
#[derive(Debug)]
pub enum StageDecision {
    /// Proceed to the next stage.
    Pass,
    /// Stop; nothing is written.
    Reject(RoutingError),
}

impl StageDecision {
    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }
}

// ---------------------------------------------------------------------------
// StageResult
// ---------------------------------------------------------------------------

/// Recorded result from a completed stage evaluation.
#[derive(Clone, Debug)]
pub struct StageResult {
    pub stage_name: String,
    pub passed: bool,
    pub elapsed: Duration,
}

// ---------------------------------------------------------------------------
// RouterStage trait
// ---------------------------------------------------------------------------

/// A single check in the routing pipeline.
///
/// Stages run in order and the pipeline is fail-fast. They are pure:
/// a stage reads the context and never touches the store.
pub trait RouterStage: Send + Sync {
    fn name(&self) -> &str;

    fn evaluate(&self, context: &RouteContext<'_>) -> StageDecision;
}
