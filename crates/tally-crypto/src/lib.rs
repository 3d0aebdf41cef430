//! Hashing primitives for tally.
//!
//! Provides the canonical JSON form that every integrity check hashes,
//! SHA-256 hex digests, and forward hash chain stamping/verification for
//! the event log.
//!
//! All crypto operations wrap established libraries; no custom cryptography.

pub mod canonical;
pub mod chain;
pub mod hasher;

pub use canonical::{canonical_event, canonical_json, HASH_FIELDS};
pub use chain::{ChainLink, HashChainVerifier, IntegrityError, GENESIS};
pub use hasher::{hash_canonical, sha256_hex};
