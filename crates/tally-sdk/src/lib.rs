//! High-level SDK for tally.
//!
//! [`Workspace`] is the explicit context object: it is opened once per
//! process from a [`WorkspaceConfig`], owns the ledger store, event log, and
//! command router, and is closed at shutdown.

pub mod config;
pub mod error;
pub mod reconcile;
pub mod workspace;

pub use config::{ConfigError, LedgerBackend, ReportingConfig, WorkspaceConfig, DEFAULT_CONFIG_FILE};
pub use error::{SdkError, SdkResult};
pub use reconcile::{reconcile, ClientDrift, ReconcileReport};
pub use workspace::Workspace;

// Re-export key types
pub use tally_journal::{IntegrityVerdict, TamperReason};
pub use tally_ledger::ClientReport;
pub use tally_router::{Command, Outcome, RejectionCode, RoutingError};
pub use tally_types::{ClientId, Decimal, WorkflowState};

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use tally_types::FixedClock;

    use super::*;

    fn config(dir: &Path) -> WorkspaceConfig {
        WorkspaceConfig::default().with_data_dir(dir.join("books"))
    }

    fn open(dir: &Path) -> Workspace {
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()));
        Workspace::open_with_clock(config(dir), clock).unwrap()
    }

    fn noah() -> ClientId {
        ClientId::parse("Noah").unwrap()
    }

    fn happy_path(ws: &Workspace) {
        for text in ["onboard Noah", "meet Noah", "followup Noah", "invoice Noah 400", "payment Noah 200"] {
            ws.execute_text(text).unwrap();
        }
    }

    #[test]
    fn happy_path_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let ws = open(dir.path());
            happy_path(&ws);
            ws.close().unwrap();
        }
        let ws = open(dir.path());
        assert_eq!(ws.status(&noah()).unwrap(), WorkflowState::PaymentReceived);
        assert_eq!(ws.history(&noah()).unwrap().len(), 5);
        assert_eq!(ws.verify().unwrap().records, 5);
        // Continuing after reopen still chains onto the existing tail.
        ws.execute_text("payment Noah 50").unwrap();
        assert_eq!(ws.verify().unwrap().records, 6);
    }

    #[test]
    fn replay_reconciles_with_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let ws = open(dir.path());
        happy_path(&ws);
        ws.execute_text("onboard Mia").unwrap();
        let _ = ws.execute_text("payment Noah 900");

        let report = ws.reconcile().unwrap();
        assert!(report.is_consistent(), "{report:?}");
        assert_eq!(report.clients_checked, 2);
    }

    #[test]
    fn unrecorded_commands_show_up_as_drift() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path());
        cfg.record_events = false;
        let ws = Workspace::open(cfg).unwrap();
        ws.execute_text("onboard Noah").unwrap();
        let report = ws.reconcile().unwrap();
        assert_eq!(report.drift.len(), 1);
        assert_eq!(report.drift[0].journal, None);
    }

    #[test]
    fn snapshot_then_check_verifies() {
        let dir = tempfile::tempdir().unwrap();
        let ws = open(dir.path());
        assert_eq!(ws.check().unwrap(), IntegrityVerdict::MissingSnapshot);
        happy_path(&ws);
        let snapshot = ws.snapshot().unwrap();
        assert_eq!(snapshot.state["Noah"]["balance"], json!("200"));
        assert_eq!(ws.check().unwrap(), IntegrityVerdict::Verified { hash: snapshot.hash });
    }

    #[test]
    fn tampered_log_fails_check_and_replay() {
        let dir = tempfile::tempdir().unwrap();
        let ws = open(dir.path());
        happy_path(&ws);
        ws.snapshot().unwrap();

        let path = ws.config().events_path();
        let text = std::fs::read_to_string(&path).unwrap();
        std::fs::write(&path, text.replacen("\"amount\":\"400\"", "\"amount\":\"40\"", 1)).unwrap();

        assert!(matches!(
            ws.check().unwrap(),
            IntegrityVerdict::TamperDetected {
                reason: TamperReason::ChainBroken(_)
            }
        ));
        let err = ws.replay().unwrap_err();
        assert!(err.is_integrity());
    }

    #[test]
    fn legacy_log_normalizes_and_replays() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        std::fs::create_dir_all(&cfg.data_dir).unwrap();
        let legacy = [
            json!({"client": "Noah", "type": "Invoice", "amount": 400, "timestamp": "2026-01-01T00:00:00Z"}),
            json!({"client_name": "Noah", "action": "Payment received", "amount": 150.5}),
            json!({"client": "Mia", "event": "credit", "amount": "75"}),
        ];
        let body: String = legacy.iter().map(|v| format!("{v}\n")).collect();
        std::fs::write(cfg.events_path(), body).unwrap();

        let ws = Workspace::open(cfg).unwrap();
        assert!(ws.replay().is_err());
        let report = ws.normalize().unwrap();
        assert_eq!(report.records, 3);
        assert!(report.backup_path.exists());

        let replayed = ws.replay().unwrap();
        assert_eq!(replayed.state[&noah()].balance, Decimal::new(2495, 1));
        assert_eq!(replayed.state[&ClientId::parse("Mia").unwrap()].invoiced, Decimal::from(75));
    }

    #[test]
    fn reporting_uses_configured_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2026, 1, 2, 9, 0, 0).unwrap()));
        let ws = Workspace::open_with_clock(config(dir.path()), clock.clone()).unwrap();
        for text in ["onboard Mia", "meet Mia", "followup Mia", "invoice Mia 1200"] {
            ws.execute_text(text).unwrap();
        }

        assert_eq!(ws.high_value(None).unwrap().len(), 1);
        assert!(ws.high_value(Some(Decimal::from(5000))).unwrap().is_empty());

        assert!(ws.overdue(None).unwrap().is_empty());
        clock.set(Utc.with_ymd_and_hms(2026, 2, 10, 9, 0, 0).unwrap());
        let overdue = ws.overdue(None).unwrap();
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].balance, Decimal::from(1200));

        assert_eq!(ws.search("mia").unwrap().len(), 4);
        assert_eq!(ws.clients().unwrap().len(), 1);
    }

    #[test]
    fn memory_backend_keeps_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path());
        cfg.ledger = LedgerBackend::Memory;
        cfg.record_events = false;
        {
            let ws = Workspace::open(cfg.clone()).unwrap();
            ws.execute_text("onboard Noah").unwrap();
        }
        let ws = Workspace::open(cfg).unwrap();
        assert!(matches!(ws.report(&noah()).unwrap(), ClientReport::NoRecords { .. }));
        assert!(!ws.config().ledger_path().exists());
    }
}
