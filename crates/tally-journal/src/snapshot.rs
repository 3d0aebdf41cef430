use std::fs;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tally_crypto::hash_canonical;
use tally_types::{iso8601, Clock};
use tracing::{info, warn};

use crate::error::{JournalError, Result};
use crate::log::EventLog;
use crate::replay::{ReplayEngine, ReplayResult};

/// A published point-in-time replay result.
///
/// `state` is kept as raw JSON so that the integrity check hashes exactly
/// the bytes that were published, not a re-rendering of them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub generated_at: String,
    pub state: Value,
    pub hash: String,
}

impl Snapshot {
    pub fn from_replay(result: &ReplayResult, clock: &dyn Clock) -> Self {
        let state = result.state_value();
        Self {
            generated_at: iso8601(clock.now()),
            hash: hash_canonical(&state),
            state,
        }
    }

    /// Verify the log, replay it, and publish the result to `path`.
    pub fn publish(log: &EventLog, path: &Path, clock: &dyn Clock) -> Result<Self> {
        let result = ReplayEngine::replay_log(log)?;
        let snapshot = Self::from_replay(&result, clock);
        snapshot.write(path)?;
        info!(path = %path.display(), hash = %snapshot.hash, clients = result.state.len(), "snapshot written");
        Ok(snapshot)
    }

    /// Write the snapshot wholesale (temp file + rename).
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let body = serde_json::to_string_pretty(self)
            .map_err(|e| JournalError::Serialization(e.to_string()))?;
        let tmp = path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(body.as_bytes())?;
            file.write_all(b"\n")?;
            file.sync_all()?;
        }
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Load a snapshot; `Ok(None)` when the file does not exist.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| JournalError::Serialization(format!("{}: {e}", path.display())))
    }

    /// Whether the recorded hash matches the recorded state.
    pub fn is_self_consistent(&self) -> bool {
        hash_canonical(&self.state) == self.hash
    }

    /// Compare a published snapshot against a fresh, verified replay of the log.
    ///
    /// Tampering (a chain break, a snapshot whose hash does not match its
    /// own state, or a replay that disagrees with the snapshot) is reported
    /// as a verdict. I/O failures and non-canonical records are errors.
    pub fn check(log: &EventLog, path: &Path) -> Result<IntegrityVerdict> {
        let Some(snapshot) = Self::load(path)? else {
            warn!(path = %path.display(), "snapshot missing");
            return Ok(IntegrityVerdict::MissingSnapshot);
        };

        if !snapshot.is_self_consistent() {
            warn!(hash = %snapshot.hash, "snapshot hash does not match its state");
            return Ok(IntegrityVerdict::TamperDetected {
                reason: TamperReason::SnapshotHashMismatch {
                    recorded: snapshot.hash.clone(),
                    computed: hash_canonical(&snapshot.state),
                },
            });
        }

        let replayed = match ReplayEngine::replay_log(log) {
            Ok(result) => result,
            Err(JournalError::Integrity(err)) => {
                warn!(line = err.line(), "event log chain broken");
                return Ok(IntegrityVerdict::TamperDetected {
                    reason: TamperReason::ChainBroken(err),
                });
            }
            Err(e) => return Err(e),
        };

        let replay_hash = replayed.state_hash();
        if replay_hash != snapshot.hash {
            warn!(replay = %replay_hash, snapshot = %snapshot.hash, "snapshot does not match replay");
            return Ok(IntegrityVerdict::TamperDetected {
                reason: TamperReason::ReplayMismatch {
                    replay_hash,
                    snapshot_hash: snapshot.hash,
                },
            });
        }

        info!(hash = %replay_hash, "snapshot matches replayed state");
        Ok(IntegrityVerdict::Verified { hash: replay_hash })
    }
}

/// Result of [`Snapshot::check`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IntegrityVerdict {
    Verified { hash: String },
    TamperDetected { reason: TamperReason },
    MissingSnapshot,
}

/// Why a snapshot check failed.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TamperReason {
    #[error(transparent)]
    ChainBroken(tally_crypto::IntegrityError),

    #[error("snapshot hash {recorded} does not match its state (computed {computed})")]
    SnapshotHashMismatch { recorded: String, computed: String },

    #[error("snapshot hash {snapshot_hash} does not match replayed state hash {replay_hash}")]
    ReplayMismatch {
        replay_hash: String,
        snapshot_hash: String,
    },
}
