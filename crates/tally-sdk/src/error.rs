use tally_crypto::IntegrityError;
use tally_journal::JournalError;
use tally_ledger::LedgerError;
use thiserror::Error;

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum SdkError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The event log failed verification. Never recovered from.
    #[error(transparent)]
    Integrity(IntegrityError),

    #[error("event log error: {0}")]
    Journal(JournalError),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

impl From<JournalError> for SdkError {
    fn from(err: JournalError) -> Self {
        match err {
            JournalError::Integrity(integrity) => Self::Integrity(integrity),
            other => Self::Journal(other),
        }
    }
}

impl SdkError {
    pub fn is_integrity(&self) -> bool {
        matches!(self, Self::Integrity(_))
    }
}

pub type SdkResult<T> = Result<T, SdkError>;
