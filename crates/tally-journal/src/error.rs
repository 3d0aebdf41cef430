use std::io;
use std::path::PathBuf;

use tally_crypto::IntegrityError;

/// Errors produced by the event log, replay, and snapshot subsystems.
#[derive(Debug, thiserror::Error)]
pub enum JournalError {
    /// The log or snapshot medium could not be read or written.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// A mandatory backup could not be written; the original is untouched.
    #[error("backup to {path} failed: {source}")]
    BackupFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The hash chain is broken or a record was tampered with.
    #[error(transparent)]
    Integrity(#[from] IntegrityError),

    /// A line is not a JSON object.
    #[error("malformed record at line {line}: {reason}")]
    Malformed { line: usize, reason: String },

    /// A record is not in the canonical schema; run normalization first.
    #[error("record at line {line} is not a canonical v1 event: {reason}")]
    NonCanonical { line: usize, reason: String },

    /// A legacy record cannot be expressed in the canonical schema.
    #[error("cannot normalize record at line {line}: {reason}")]
    Unnormalizable { line: usize, reason: String },

    /// The last record in the log carries no `event_hash`, so a new record
    /// has nothing to chain onto.
    #[error("log tail at line {line} is not chained; re-chain the log before appending")]
    UnchainedTail { line: usize },

    /// Replayed money totals left the representable decimal range.
    #[error("money total overflows at line {line}")]
    Overflow { line: usize },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("event log lock poisoned")]
    LockPoisoned,
}

/// Convenience alias used throughout the journal crate.
pub type Result<T> = std::result::Result<T, JournalError>;
