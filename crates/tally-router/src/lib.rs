//! Command router for tally.
//!
//! Every mutation of the ledger passes through [`CommandRouter`]. A command
//! is parsed, the client's lock is taken, and a fail-fast pipeline of stages
//! (duplicate, legality, economics) decides whether one ledger row is
//! written. Rejections are typed and name the rule and values involved.
//!
//! # Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use tally_ledger::InMemoryLedger;
//! use tally_router::CommandRouter;
//! use tally_types::SystemClock;
//!
//! let router = CommandRouter::with_default_stages(
//!     Arc::new(InMemoryLedger::new()),
//!     Arc::new(SystemClock),
//! );
//! router.execute_text("onboard Noah").unwrap();
//! let err = router.execute_text("invoice Noah 400").unwrap_err();
//! assert_eq!(err.rejection().unwrap().reason.as_str(), "illegal-transition");
//! ```

pub mod command;
pub mod error;
pub mod locks;
pub mod machine;
pub mod router;
pub mod stage;
pub mod stages;

pub use command::Command;
pub use error::{EconomicViolation, Rejection, RejectionCode, RoutingError};
pub use locks::ClientLocks;
pub use router::{CommandRouter, Outcome, RouteResult};
pub use stage::{RouteContext, RouterStage, StageDecision, StageResult};
pub use stages::{DuplicateStage, EconomicStage, LegalityStage};
