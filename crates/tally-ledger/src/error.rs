/// Errors produced by ledger store operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("corrupt ledger row {seq}: {reason}")]
    Corrupt { seq: u64, reason: String },

    /// A money total left the representable decimal range.
    #[error("money total overflows at ledger row {seq}")]
    Overflow { seq: u64 },

    /// A transaction returned without running its body.
    #[error("ledger transaction ended before its body ran")]
    TransactionNotRun,

    #[error("ledger lock poisoned")]
    LockPoisoned,
}
