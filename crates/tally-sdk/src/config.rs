//! Workspace configuration, read from `tally.toml`.
//!
//! Every field has a default, so an empty or missing file yields a usable
//! workspace rooted at `.tally/`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tally_journal::{EventLogConfig, SyncMode};
use tally_types::Decimal;

/// Default configuration file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "tally.toml";

/// Which ledger store backs the workspace.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LedgerBackend {
    #[default]
    Sqlite,
    /// Nothing survives the process; useful for dry runs.
    Memory,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReportingConfig {
    pub high_value_threshold: Decimal,
    pub overdue_days: u64,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            high_value_threshold: Decimal::from(1000),
            overdue_days: 30,
        }
    }
}

/// Top-level workspace configuration.
///
/// Relative file paths are resolved against `data_dir`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkspaceConfig {
    pub data_dir: PathBuf,
    pub events_file: PathBuf,
    pub chain_backup_file: PathBuf,
    pub normalize_backup_file: PathBuf,
    pub snapshot_file: PathBuf,
    pub ledger: LedgerBackend,
    pub ledger_db: PathBuf,
    pub sync_mode: SyncMode,
    /// Mirror every committed command into the event log.
    pub record_events: bool,
    pub reporting: ReportingConfig,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".tally"),
            events_file: PathBuf::from("events.jsonl"),
            chain_backup_file: PathBuf::from("events.backup.chain.jsonl"),
            normalize_backup_file: PathBuf::from("events.backup.jsonl"),
            snapshot_file: PathBuf::from("snapshots/latest.json"),
            ledger: LedgerBackend::default(),
            ledger_db: PathBuf::from("ledger.db"),
            sync_mode: SyncMode::default(),
            record_events: true,
            reporting: ReportingConfig::default(),
        }
    }
}

impl WorkspaceConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Load `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::Parse)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    /// `path` under `data_dir`; absolute paths are returned as-is.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        self.data_dir.join(path)
    }

    pub fn events_path(&self) -> PathBuf {
        self.resolve(&self.events_file)
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.resolve(&self.snapshot_file)
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.resolve(&self.ledger_db)
    }

    pub fn event_log_config(&self) -> EventLogConfig {
        EventLogConfig {
            sync_mode: self.sync_mode,
            chain_backup_path: self.resolve(&self.chain_backup_file),
            normalize_backup_path: self.resolve(&self.normalize_backup_file),
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_all_defaults() {
        let config = WorkspaceConfig::from_toml("").unwrap();
        assert_eq!(config, WorkspaceConfig::default());
        assert_eq!(config.events_path(), PathBuf::from(".tally/events.jsonl"));
        assert_eq!(config.snapshot_path(), PathBuf::from(".tally/snapshots/latest.json"));
        assert_eq!(config.reporting.high_value_threshold, Decimal::from(1000));
        assert!(config.record_events);
    }

    #[test]
    fn partial_file_overrides_fields() {
        let config = WorkspaceConfig::from_toml(
            r#"
            data_dir = "/srv/tally"
            ledger = "memory"
            sync_mode = "every-write"

            [reporting]
            overdue_days = 45
            high_value_threshold = "2500.50"
            "#,
        )
        .unwrap();
        assert_eq!(config.ledger, LedgerBackend::Memory);
        assert_eq!(config.sync_mode, SyncMode::EveryWrite);
        assert_eq!(config.reporting.overdue_days, 45);
        assert_eq!(config.reporting.high_value_threshold, Decimal::new(250050, 2));
        assert_eq!(config.ledger_path(), PathBuf::from("/srv/tally/ledger.db"));
        let log = config.event_log_config();
        assert_eq!(log.chain_backup_path, PathBuf::from("/srv/tally/events.backup.chain.jsonl"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(matches!(
            WorkspaceConfig::from_toml("colour = \"blue\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = WorkspaceConfig::load_or_default(&dir.path().join("tally.toml")).unwrap();
        assert_eq!(config, WorkspaceConfig::default());
    }

    #[test]
    fn round_trips_through_toml() {
        let config = WorkspaceConfig::default().with_data_dir("/tmp/books");
        let text = config.to_toml().unwrap();
        assert_eq!(WorkspaceConfig::from_toml(&text).unwrap(), config);
    }
}
