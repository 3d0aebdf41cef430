//! Append-only event log for tally.
//!
//! The log is a newline-delimited JSON file, one immutable event per line,
//! each stamped into a forward SHA-256 hash chain. This crate provides:
//! - [`Event`]: the canonical (version 1) event schema
//! - [`EventLog`]: durable append, whole-log re-chaining, and verification
//! - [`normalize`]: migration of legacy event dialects into the canonical schema
//! - [`ReplayEngine`]: verified, deterministic fold of the log into client totals
//! - [`Snapshot`]: published replay results and the snapshot integrity check

pub mod error;
pub mod event;
pub mod log;
pub mod normalize;
pub mod replay;
pub mod snapshot;

pub use error::{JournalError, Result};
pub use event::{Event, EventKind, EventRecord, SCHEMA_VERSION};
pub use log::{ChainReport, EventLog, EventLogConfig, LogScan, NormalizeReport, SyncMode, VerifyReport};
pub use normalize::normalize_record;
pub use replay::{ClientTotals, EntityState, ReplayEngine, ReplayResult};
pub use snapshot::{IntegrityVerdict, Snapshot, TamperReason};
