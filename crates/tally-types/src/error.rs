use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("client name must not be empty")]
    EmptyClient,

    #[error("client name '{0}' must not contain whitespace")]
    InvalidClient(String),

    #[error("unknown action '{0}'")]
    UnknownAction(String),

    #[error("unknown workflow state '{0}'")]
    UnknownState(String),

    #[error("unknown transaction type '{0}'")]
    UnknownTransactionType(String),

    #[error("invalid amount '{0}'")]
    InvalidAmount(String),
}
