//! Per-client ledger store for tally.
//!
//! The ledger is the live source of truth for every client's workflow
//! position and money. It provides:
//! - `LedgerReader` / `LedgerWriter` trait boundaries, plus `LedgerTx` for
//!   read-decide-write sequences under the store's write lock
//! - `InMemoryLedger` for tests and embedding
//! - `SqliteLedger` for durable storage
//! - `ClientFinancials`, recomputed from history on every read
//! - `Reporter` for per-client and cross-client reports
//!
//! Nothing is cached across writes: every query re-reads committed rows.

pub mod error;
pub mod financials;
pub mod memory;
pub mod report;
pub mod sqlite;
pub mod traits;

pub use error::LedgerError;
pub use financials::ClientFinancials;
pub use memory::InMemoryLedger;
pub use report::{ClientReport, HighValueClient, OverdueClient, ReportSummary, Reporter};
pub use sqlite::SqliteLedger;
pub use traits::{LedgerReader, LedgerStore, LedgerTx, LedgerWriter, TxDecision};
