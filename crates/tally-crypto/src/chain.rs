use crate::hasher::sha256_hex;

/// `prev_hash` sentinel carried by the first record of every chain.
pub const GENESIS: &str = "GENESIS";

/// A record that participates in a forward hash chain.
pub trait ChainLink {
    /// 1-based position of the record in its log.
    fn line(&self) -> usize;
    /// The record's own stamped hash, if present.
    fn event_hash(&self) -> Option<&str>;
    /// The stamped hash of the predecessor, if present.
    fn prev_hash(&self) -> Option<&str>;
    /// Canonical form of the record, excluding both hash fields.
    fn canonical_form(&self) -> String;
    /// Overwrite both hash fields.
    fn stamp(&mut self, prev_hash: String, event_hash: String);
}

/// Forward hash chain stamping and verification.
///
/// For record *i*: `event_hash_i = sha256(prev_hash_i ‖ canonical_i)` and
/// `prev_hash_i = event_hash_{i-1}` (or [`GENESIS`] for the first record).
pub struct HashChainVerifier;

impl HashChainVerifier {
    /// Verify a chain of records.
    ///
    /// Checks, per record and in order:
    /// 1. Both hash fields are present
    /// 2. `prev_hash` matches the predecessor's `event_hash`
    /// 3. `event_hash` is correct for the record's canonical form
    ///
    /// Stops at the first failure; a break is never skipped over.
    pub fn verify_chain<L: ChainLink>(links: &[L]) -> Result<(), IntegrityError> {
        let mut expected_prev = GENESIS.to_string();
        for link in links {
            expected_prev = Self::verify_link(link, &expected_prev)?;
        }
        Ok(())
    }

    /// Verify one record against the expected predecessor hash and return
    /// its `event_hash` for the next step.
    pub fn verify_link<L: ChainLink>(
        link: &L,
        expected_prev: &str,
    ) -> Result<String, IntegrityError> {
        let (Some(prev), Some(stored)) = (link.prev_hash(), link.event_hash()) else {
            return Err(IntegrityError::MissingHashFields { line: link.line() });
        };

        if prev != expected_prev {
            return Err(IntegrityError::BrokenLink {
                line: link.line(),
                expected: expected_prev.to_string(),
                found: prev.to_string(),
            });
        }

        let computed = Self::compute_hash(prev, &link.canonical_form());
        if computed != stored {
            return Err(IntegrityError::HashMismatch {
                line: link.line(),
                expected: computed,
                found: stored.to_string(),
            });
        }

        Ok(computed)
    }

    /// Stamp every record in order, starting from [`GENESIS`].
    /// Returns the tail hash (or [`GENESIS`] for an empty slice).
    pub fn chain<L: ChainLink>(links: &mut [L]) -> String {
        let mut prev = GENESIS.to_string();
        for link in links.iter_mut() {
            let hash = Self::compute_hash(&prev, &link.canonical_form());
            link.stamp(prev, hash.clone());
            prev = hash;
        }
        prev
    }

    /// `sha256(prev_hash ‖ canonical)` as lowercase hex.
    pub fn compute_hash(prev_hash: &str, canonical: &str) -> String {
        let mut data = String::with_capacity(prev_hash.len() + canonical.len());
        data.push_str(prev_hash);
        data.push_str(canonical);
        sha256_hex(data.as_bytes())
    }
}

/// A chain break or tamper. Fatal to any computation that depends on the log.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum IntegrityError {
    #[error("integrity failure: missing hash fields at line {line}")]
    MissingHashFields { line: usize },

    /// The line is not a readable record at all (truncated, not JSON, not
    /// UTF-8). Nothing after it can be trusted.
    #[error("integrity failure: unreadable record at line {line}: {reason}")]
    Unreadable { line: usize, reason: String },

    #[error("chain break at line {line}: expected prev_hash={expected}, found {found}")]
    BrokenLink {
        line: usize,
        expected: String,
        found: String,
    },

    #[error("tamper detected at line {line}: event_hash mismatch (expected {expected}, found {found})")]
    HashMismatch {
        line: usize,
        expected: String,
        found: String,
    },
}

impl IntegrityError {
    /// 1-based line of the offending record.
    pub fn line(&self) -> usize {
        match self {
            Self::MissingHashFields { line }
            | Self::Unreadable { line, .. }
            | Self::BrokenLink { line, .. }
            | Self::HashMismatch { line, .. } => *line,
        }
    }
}
