//! Foundation types for tally.
//!
//! This crate provides the vocabulary shared by every other tally crate:
//! who a client is, where a client sits in the administrative workflow,
//! what one ledger row looks like, and how time is read.
//!
//! # Key Types
//!
//! - [`ClientId`]: Validated client identity string
//! - [`WorkflowState`]: One stage of the intake → payment lifecycle
//! - [`Action`]: A command verb accepted by the router
//! - [`TransactionType`]: The kind of a persisted ledger row
//! - [`LedgerEntry`] / [`NewEntry`]: Durable and pending ledger rows
//! - [`Clock`]: Injectable wall clock

pub mod client;
pub mod entry;
pub mod error;
pub mod money;
pub mod time;
pub mod workflow;

pub use client::ClientId;
pub use entry::{LedgerEntry, NewEntry};
pub use error::TypeError;
pub use money::{normalize_money, parse_amount, MAX_AMOUNT};
pub use rust_decimal::Decimal;
pub use time::{iso8601, Clock, FixedClock, SystemClock};
pub use workflow::{Action, TransactionType, WorkflowState};
