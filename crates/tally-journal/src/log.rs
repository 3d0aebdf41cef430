use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tally_crypto::{ChainLink, HashChainVerifier, IntegrityError, GENESIS};
use tally_types::Clock;
use tracing::{debug, info, warn};

use crate::error::{JournalError, Result};
use crate::event::{Event, EventRecord};
use crate::normalize::normalize_record;

/// Flush/sync strategy for appends.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncMode {
    /// `fsync` after every append (safest, highest latency).
    EveryWrite,
    /// Hand the write to the OS and rely on its page cache.
    #[default]
    OsDefault,
}

/// Configuration for an [`EventLog`].
#[derive(Clone, Debug)]
pub struct EventLogConfig {
    pub sync_mode: SyncMode,
    /// Where [`EventLog::chain`] copies the log before rewriting it.
    pub chain_backup_path: PathBuf,
    /// Where [`EventLog::normalize`] copies the log before rewriting it.
    pub normalize_backup_path: PathBuf,
}

impl EventLogConfig {
    /// Backups placed next to the log file, named after it.
    pub fn beside(log_path: &Path) -> Self {
        let stem = log_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("events");
        Self {
            sync_mode: SyncMode::default(),
            chain_backup_path: log_path.with_file_name(format!("{stem}.backup.chain.jsonl")),
            normalize_backup_path: log_path.with_file_name(format!("{stem}.backup.jsonl")),
        }
    }
}

/// Outcome of a successful [`EventLog::verify`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VerifyReport {
    pub records: usize,
    pub tail_hash: String,
}

/// Outcome of [`EventLog::chain`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChainReport {
    pub records: usize,
    pub tail_hash: String,
    pub backup_path: PathBuf,
}

/// Outcome of [`EventLog::normalize`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NormalizeReport {
    pub records: usize,
    /// Records whose fields changed during normalization.
    pub converted: usize,
    pub tail_hash: String,
    pub backup_path: PathBuf,
}

// ---------------------------------------------------------------------------
// Scanning
// ---------------------------------------------------------------------------

/// The log file as read from disk.
///
/// Reading stops at the first unreadable line: `records` is the readable
/// prefix and `unreadable` names the line that ended it.
#[derive(Debug)]
pub struct LogScan {
    pub records: Vec<EventRecord>,
    pub unreadable: Option<IntegrityError>,
    /// Physical line count up to where reading stopped.
    lines: usize,
    /// Bytes on disk when the scan was taken.
    len: u64,
    /// Empty, or the last byte is a newline.
    ends_with_newline: bool,
}

impl LogScan {
    fn read(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)?;
        let mut scan = Self {
            records: Vec::new(),
            unreadable: None,
            lines: 0,
            len: bytes.len() as u64,
            ends_with_newline: bytes.is_empty() || bytes.ends_with(b"\n"),
        };
        if bytes.is_empty() {
            return Ok(scan);
        }

        let body = bytes.strip_suffix(b"\n").unwrap_or(&bytes);
        for (index, raw) in body.split(|byte| *byte == b'\n').enumerate() {
            let line = index + 1;
            scan.lines = line;
            let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
            let parsed = std::str::from_utf8(raw)
                .map_err(|err| format!("not UTF-8: {err}"))
                .and_then(|text| {
                    if text.trim().is_empty() {
                        return Ok(None);
                    }
                    match EventRecord::parse_line(line, text) {
                        Ok(record) => Ok(Some(record)),
                        Err(JournalError::Malformed { reason, .. }) => Err(reason),
                        Err(other) => Err(other.to_string()),
                    }
                });
            match parsed {
                Ok(Some(record)) => scan.records.push(record),
                Ok(None) => {}
                Err(reason) => {
                    warn!(line, %reason, "unreadable event log line");
                    scan.unreadable = Some(IntegrityError::Unreadable { line, reason });
                    break;
                }
            }
        }
        Ok(scan)
    }

    /// Every record, or the unreadable line as an integrity failure.
    pub fn into_records(self) -> Result<Vec<EventRecord>> {
        match self.unreadable {
            Some(err) => Err(err.into()),
            None => Ok(self.records),
        }
    }

    fn tail(&self) -> Tail {
        if let Some(err) = &self.unreadable {
            return Tail::Unreadable(err.clone());
        }
        match self.records.last() {
            None => Tail::Hash(GENESIS.to_string()),
            Some(last) => match &last.event_hash {
                Some(hash) => Tail::Hash(hash.clone()),
                None => Tail::Unchained(last.line),
            },
        }
    }
}

/// What the next append chains onto.
#[derive(Debug)]
enum Tail {
    Hash(String),
    /// The last record carries no `event_hash`.
    Unchained(usize),
    /// A line could not be read; nothing may be appended after it.
    Unreadable(IntegrityError),
}

impl Tail {
    fn chain_point(&self) -> Result<String> {
        match self {
            Self::Hash(hash) => Ok(hash.clone()),
            Self::Unchained(line) => Err(JournalError::UnchainedTail { line: *line }),
            Self::Unreadable(err) => Err(err.clone().into()),
        }
    }
}

// ---------------------------------------------------------------------------
// EventLog
// ---------------------------------------------------------------------------

/// Mutable state guarded by the log mutex.
struct LogState {
    file: File,
    /// Number of records (non-blank lines).
    records: usize,
    /// Physical line count, used to number the next append.
    lines: usize,
    /// Bytes this handle believes are on disk.
    len: u64,
    ends_with_newline: bool,
    tail: Tail,
}

impl LogState {
    fn from_scan(file: File, scan: &LogScan) -> Self {
        Self {
            file,
            records: scan.records.len(),
            lines: scan.lines,
            len: scan.len,
            ends_with_newline: scan.ends_with_newline,
            tail: scan.tail(),
        }
    }
}

/// Append-only, hash-chained, newline-delimited JSON event log.
///
/// Every operation takes the same mutex: appends are serialized, readers
/// never observe a half-written line, and whole-log rewrites
/// ([`Self::chain`], [`Self::normalize`]) block appenders for their full
/// duration. Before each append the handle checks the file size and
/// rescans if another writer has grown or replaced the file.
pub struct EventLog {
    path: PathBuf,
    config: EventLogConfig,
    state: Mutex<LogState>,
}

impl EventLog {
    /// Open (or create) the log at `path`.
    ///
    /// Opening never fails on content: an unreadable line is remembered
    /// and reported by [`Self::verify`] and refused by [`Self::append`].
    pub fn open(path: &Path, config: EventLogConfig) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = open_for_append(path)?;
        let scan = LogScan::read(path)?;
        let state = LogState::from_scan(file, &scan);

        debug!(path = %path.display(), records = state.records, "event log opened");
        Ok(Self {
            path: path.to_path_buf(),
            config,
            state: Mutex::new(state),
        })
    }

    /// Append one canonical event, stamped onto the current chain tail.
    ///
    /// The line goes out in a single write. If that write (or the sync
    /// requested by [`SyncMode::EveryWrite`]) fails, the file is cut back
    /// to its previous length so no partial record survives.
    pub fn append(&self, event: &Event) -> Result<EventRecord> {
        let mut state = self.lock()?;
        self.refresh(&mut state)?;
        let prev = state.tail.chain_point()?;

        let mut record = EventRecord::from_event(state.lines + 1, event)?;
        let hash = HashChainVerifier::compute_hash(&prev, &record.canonical_form());
        record.stamp(prev, hash.clone());

        let mut bytes = Vec::new();
        if !state.ends_with_newline {
            bytes.push(b'\n');
        }
        bytes.extend_from_slice(record.to_line().as_bytes());
        bytes.push(b'\n');

        let before = state.len;
        if let Err(err) = self.write_line(&mut state.file, &bytes) {
            warn!(error = %err, "event append failed; truncating");
            state.file.set_len(before)?;
            return Err(err.into());
        }

        state.records += 1;
        state.lines += 1;
        state.len = before + bytes.len() as u64;
        state.ends_with_newline = true;
        state.tail = Tail::Hash(hash);

        debug!(line = record.line, client = %event.client, kind = %event.kind, "event appended");
        Ok(record)
    }

    /// Normalize a raw inbound record from any known producer dialect and
    /// append it in canonical form.
    pub fn append_raw(&self, raw: &Value, clock: &dyn Clock) -> Result<EventRecord> {
        let line = self.lock()?.lines + 1;
        let Value::Object(fields) = raw else {
            return Err(JournalError::Malformed {
                line,
                reason: "record is not a JSON object".into(),
            });
        };
        let mut fields = fields.clone();
        fields.remove("prev_hash");
        fields.remove("event_hash");
        let event = normalize_record(line, &fields, clock.now())?;
        self.append(&event)
    }

    /// Read the file as it is now, stopping at the first unreadable line.
    pub fn scan(&self) -> Result<LogScan> {
        let _guard = self.lock()?;
        LogScan::read(&self.path)
    }

    /// Read every record in order. An unreadable line is an integrity
    /// failure at that line.
    pub fn read_all(&self) -> Result<Vec<EventRecord>> {
        self.scan()?.into_records()
    }

    /// Re-derive every hash in order; fails at the first break, counting an
    /// unreadable line as a break at that line.
    pub fn verify(&self) -> Result<VerifyReport> {
        let scan = self.scan()?;
        HashChainVerifier::verify_chain(&scan.records)?;
        let records = scan.into_records()?;
        Ok(VerifyReport {
            records: records.len(),
            tail_hash: records
                .last()
                .and_then(|r| r.event_hash.clone())
                .unwrap_or_else(|| GENESIS.to_string()),
        })
    }

    /// Stamp `prev_hash`/`event_hash` onto every record, from genesis.
    ///
    /// The log is copied to the chain backup first; if that copy fails
    /// nothing is rewritten. The rewrite goes through a temporary file and
    /// an atomic rename, so readers see either the old or the new log.
    pub fn chain(&self) -> Result<ChainReport> {
        let mut state = self.lock()?;
        let mut records = LogScan::read(&self.path)?.into_records()?;
        let backup_path = self.config.chain_backup_path.clone();
        backup(&self.path, &backup_path)?;

        let tail_hash = HashChainVerifier::chain(&mut records);
        self.rewrite(&mut state, &records)?;

        info!(records = records.len(), backup = %backup_path.display(), "event log re-chained");
        Ok(ChainReport {
            records: records.len(),
            tail_hash,
            backup_path,
        })
    }

    /// Rewrite every record into the canonical schema and re-chain.
    ///
    /// Fails without touching the log if any record cannot be normalized.
    pub fn normalize(&self, clock: &dyn Clock) -> Result<NormalizeReport> {
        let mut state = self.lock()?;
        let originals = LogScan::read(&self.path)?.into_records()?;

        let mut converted = 0;
        let mut records = Vec::with_capacity(originals.len());
        for (index, original) in originals.iter().enumerate() {
            let event = normalize_record(original.line, &original.fields, clock.now())?;
            let record = EventRecord::from_event(index + 1, &event)?;
            if record.fields != original.fields {
                converted += 1;
            }
            records.push(record);
        }

        let backup_path = self.config.normalize_backup_path.clone();
        backup(&self.path, &backup_path)?;

        let tail_hash = HashChainVerifier::chain(&mut records);
        self.rewrite(&mut state, &records)?;

        info!(records = records.len(), converted, "event log normalized");
        Ok(NormalizeReport {
            records: records.len(),
            converted,
            tail_hash,
            backup_path,
        })
    }

    /// Number of records currently in the log.
    pub fn len(&self) -> Result<usize> {
        let mut state = self.lock()?;
        self.refresh(&mut state)?;
        Ok(state.records)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Path to the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `fsync` the file.
    pub fn sync(&self) -> Result<()> {
        let state = self.lock()?;
        state.file.sync_all()?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, LogState>> {
        self.state.lock().map_err(|_| JournalError::LockPoisoned)
    }

    fn write_line(&self, file: &mut File, bytes: &[u8]) -> io::Result<()> {
        file.write_all(bytes)?;
        if self.config.sync_mode == SyncMode::EveryWrite {
            file.sync_all()?;
        }
        Ok(())
    }

    /// Rescan when the file on disk no longer matches what this handle
    /// last wrote or read: another process appended, or replaced the log.
    fn refresh(&self, state: &mut LogState) -> Result<()> {
        let on_disk = fs::metadata(&self.path)?.len();
        if on_disk == state.len {
            return Ok(());
        }
        debug!(known = state.len, on_disk, "event log changed on disk; rescanning");
        let file = open_for_append(&self.path)?;
        let scan = LogScan::read(&self.path)?;
        *state = LogState::from_scan(file, &scan);
        Ok(())
    }

    /// Replace the log with `records` (temp file + rename) and reopen the
    /// append handle on the new file.
    fn rewrite(&self, state: &mut LogState, records: &[EventRecord]) -> Result<()> {
        let tmp_path = self.path.with_extension("jsonl.tmp");
        {
            let mut out = BufWriter::new(File::create(&tmp_path)?);
            for record in records {
                out.write_all(record.to_line().as_bytes())?;
                out.write_all(b"\n")?;
            }
            out.flush()?;
            out.get_ref().sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;

        let file = open_for_append(&self.path)?;
        let scan = LogScan::read(&self.path)?;
        *state = LogState::from_scan(file, &scan);
        Ok(())
    }
}

fn open_for_append(path: &Path) -> Result<File> {
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}

fn backup(from: &Path, to: &Path) -> Result<()> {
    if let Some(parent) = to.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|source| JournalError::BackupFailed {
                path: to.to_path_buf(),
                source,
            })?;
        }
    }
    fs::copy(from, to).map_err(|source| JournalError::BackupFailed {
        path: to.to_path_buf(),
        source,
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use tally_crypto::IntegrityError;
    use tally_types::{ClientId, Decimal, FixedClock};

    use super::*;
    use crate::event::EventKind;

    fn clock() -> FixedClock {
        FixedClock::new(Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap())
    }

    fn event(client: &str, kind: EventKind, amount: i64) -> Event {
        Event::new(
            ClientId::parse(client).unwrap(),
            kind,
            Decimal::from(amount),
            Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap(),
        )
    }

    fn open(dir: &tempfile::TempDir) -> EventLog {
        let path = dir.path().join("events.jsonl");
        EventLog::open(&path, EventLogConfig::beside(&path)).unwrap()
    }

    fn five_event_log(log: &EventLog) {
        log.append(&event("Noah", EventKind::Intake, 0)).unwrap();
        log.append(&event("Noah", EventKind::Meeting, 0)).unwrap();
        log.append(&event("Noah", EventKind::Invoice, 400)).unwrap();
        log.append(&event("Noah", EventKind::Payment, 200)).unwrap();
        log.append(&event("Ava", EventKind::Invoice, 90)).unwrap();
    }

    /// Rewrite one line of the log file through `edit`, without re-hashing.
    fn tamper(path: &Path, line: usize, edit: impl FnOnce(&mut serde_json::Map<String, Value>)) {
        let text = fs::read_to_string(path).unwrap();
        let mut lines: Vec<String> = text.lines().map(str::to_string).collect();
        let mut value: Value = serde_json::from_str(&lines[line - 1]).unwrap();
        edit(value.as_object_mut().unwrap());
        lines[line - 1] = value.to_string();
        fs::write(path, lines.join("\n") + "\n").unwrap();
    }

    #[test]
    fn append_and_verify() {
        let dir = tempfile::tempdir().unwrap();
        let log = open(&dir);
        five_event_log(&log);

        let report = log.verify().unwrap();
        assert_eq!(report.records, 5);
        assert_eq!(log.len().unwrap(), 5);

        let records = log.read_all().unwrap();
        assert_eq!(records[0].prev_hash.as_deref(), Some(GENESIS));
        assert_eq!(records[1].prev_hash, records[0].event_hash);
        assert_eq!(Some(report.tail_hash), records[4].event_hash.clone());
    }

    #[test]
    fn empty_log_verifies() {
        let dir = tempfile::tempdir().unwrap();
        let log = open(&dir);
        assert!(log.is_empty().unwrap());
        assert_eq!(log.verify().unwrap().tail_hash, GENESIS);
    }

    #[test]
    fn reopen_continues_the_chain() {
        let dir = tempfile::tempdir().unwrap();
        {
            let log = open(&dir);
            log.append(&event("Noah", EventKind::Intake, 0)).unwrap();
        }
        let log = open(&dir);
        log.append(&event("Noah", EventKind::Meeting, 0)).unwrap();
        assert_eq!(log.verify().unwrap().records, 2);
    }

    #[test]
    fn tampered_amount_breaks_at_its_own_line() {
        let dir = tempfile::tempdir().unwrap();
        let log = open(&dir);
        five_event_log(&log);
        drop(log);

        let path = dir.path().join("events.jsonl");
        tamper(&path, 3, |fields| {
            fields.insert("amount".into(), json!("4000"));
        });

        let log = open(&dir);
        match log.verify() {
            Err(JournalError::Integrity(IntegrityError::HashMismatch { line, .. })) => {
                assert_eq!(line, 3)
            }
            other => panic!("expected hash mismatch, got {other:?}"),
        }
    }

    #[test]
    fn tampered_prev_hash_reports_expected_and_found() {
        let dir = tempfile::tempdir().unwrap();
        let log = open(&dir);
        five_event_log(&log);
        let records = log.read_all().unwrap();
        drop(log);

        let path = dir.path().join("events.jsonl");
        tamper(&path, 4, |fields| {
            fields.insert("prev_hash".into(), json!("forged"));
        });

        let log = open(&dir);
        match log.verify() {
            Err(JournalError::Integrity(IntegrityError::BrokenLink { line, expected, found })) => {
                assert_eq!(line, 4);
                assert_eq!(Some(expected), records[2].event_hash.clone());
                assert_eq!(found, "forged");
            }
            other => panic!("expected broken link, got {other:?}"),
        }
    }

    #[test]
    fn chain_backs_up_then_stamps_legacy_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let legacy = [
            json!({"type": "credit", "client": "Ava", "amount": 10.0}),
            json!({"type": "debit", "client": "Ava", "amount": 4.0}),
        ];
        let body: String = legacy.iter().map(|v| format!("{v}\n")).collect();
        fs::write(&path, &body).unwrap();

        let log = EventLog::open(&path, EventLogConfig::beside(&path)).unwrap();
        assert!(matches!(
            log.append(&event("Ava", EventKind::Invoice, 1)),
            Err(JournalError::UnchainedTail { line: 2 })
        ));
        assert!(log.verify().is_err());

        let report = log.chain().unwrap();
        assert_eq!(report.records, 2);
        assert_eq!(fs::read_to_string(&report.backup_path).unwrap(), body);
        assert!(log.verify().is_ok());

        // Appends chain onto the rewritten tail.
        log.append(&event("Ava", EventKind::Invoice, 1)).unwrap();
        assert_eq!(log.verify().unwrap().records, 3);
    }

    #[test]
    fn chain_fails_atomically_when_backup_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        fs::write(&path, "{\"type\":\"credit\",\"client\":\"Ava\",\"amount\":1}\n").unwrap();

        // A directory where the backup file should go makes the copy fail.
        let blocker = dir.path().join("blocked");
        fs::create_dir_all(&blocker).unwrap();
        let config = EventLogConfig {
            chain_backup_path: blocker.clone(),
            ..EventLogConfig::beside(&path)
        };
        let before = fs::read_to_string(&path).unwrap();
        let log = EventLog::open(&path, config).unwrap();

        assert!(matches!(log.chain(), Err(JournalError::BackupFailed { .. })));
        assert_eq!(fs::read_to_string(&path).unwrap(), before);
    }

    #[test]
    fn normalize_converts_dialects_and_rechains() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let legacy = [
            json!({"timestamp": "2026-01-01T00:00:00", "client_name": "Alice", "type": "Invoice", "amount": 250.0}),
            json!({"client": "Alice", "category": "invoice", "action": "Payment received", "amount": 50}),
        ];
        let body: String = legacy.iter().map(|v| format!("{v}\n")).collect();
        fs::write(&path, &body).unwrap();

        let log = EventLog::open(&path, EventLogConfig::beside(&path)).unwrap();
        let report = log.normalize(&clock()).unwrap();
        assert_eq!(report.records, 2);
        assert_eq!(report.converted, 2);
        assert_eq!(fs::read_to_string(&report.backup_path).unwrap(), body);

        let records = log.read_all().unwrap();
        assert_eq!(records[0].decode().unwrap().kind, EventKind::Invoice);
        assert_eq!(records[1].decode().unwrap().kind, EventKind::Payment);
        assert!(log.verify().is_ok());
    }

    #[test]
    fn normalize_refuses_set_without_touching_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let body = "{\"type\":\"set\",\"client\":\"Ava\",\"amount\":10}\n";
        fs::write(&path, body).unwrap();

        let log = EventLog::open(&path, EventLogConfig::beside(&path)).unwrap();
        assert!(matches!(
            log.normalize(&clock()),
            Err(JournalError::Unnormalizable { line: 1, .. })
        ));
        assert_eq!(fs::read_to_string(&path).unwrap(), body);
    }

    #[test]
    fn append_raw_normalizes_at_write_time() {
        let dir = tempfile::tempdir().unwrap();
        let log = open(&dir);
        let record = log
            .append_raw(
                &json!({"client": "Bo", "action": "Invoice issued", "amount": 12.5}),
                &clock(),
            )
            .unwrap();
        let event = record.decode().unwrap();
        assert_eq!(event.kind, EventKind::Invoice);
        assert_eq!(event.amount, Decimal::new(125, 1));
        assert!(log.verify().is_ok());
    }

    #[test]
    fn unreadable_line_does_not_block_open_and_breaks_at_its_line() {
        let dir = tempfile::tempdir().unwrap();
        let log = open(&dir);
        five_event_log(&log);
        drop(log);

        let path = dir.path().join("events.jsonl");
        let text = fs::read_to_string(&path).unwrap();
        let mut lines: Vec<String> = text.lines().map(str::to_string).collect();
        lines[2].truncate(20);
        fs::write(&path, lines.join("\n") + "\n").unwrap();

        let log = open(&dir);
        match log.verify() {
            Err(JournalError::Integrity(IntegrityError::Unreadable { line, .. })) => assert_eq!(line, 3),
            other => panic!("expected unreadable line 3, got {other:?}"),
        }
        assert!(matches!(
            log.append(&event("Noah", EventKind::Intake, 0)),
            Err(JournalError::Integrity(IntegrityError::Unreadable { line: 3, .. }))
        ));
    }

    #[test]
    fn earlier_break_is_reported_before_a_later_unreadable_line() {
        let dir = tempfile::tempdir().unwrap();
        let log = open(&dir);
        five_event_log(&log);
        drop(log);

        let path = dir.path().join("events.jsonl");
        tamper(&path, 2, |fields| {
            fields.insert("kind".into(), json!("follow_up"));
        });
        let text = fs::read_to_string(&path).unwrap();
        let mut lines: Vec<String> = text.lines().map(str::to_string).collect();
        lines[2] = "{\"v\":1,\"cli".into();
        fs::write(&path, lines.join("\n") + "\n").unwrap();

        let log = open(&dir);
        match log.verify() {
            Err(JournalError::Integrity(IntegrityError::HashMismatch { line, .. })) => assert_eq!(line, 2),
            other => panic!("expected hash mismatch at line 2, got {other:?}"),
        }
        match crate::ReplayEngine::replay_log(&log) {
            Err(JournalError::Integrity(err)) => assert_eq!(err.line(), 2),
            other => panic!("expected integrity failure, got {other:?}"),
        }
    }

    #[test]
    fn append_after_missing_final_newline_starts_a_new_line() {
        let dir = tempfile::tempdir().unwrap();
        let log = open(&dir);
        log.append(&event("Noah", EventKind::Intake, 0)).unwrap();
        drop(log);

        let path = dir.path().join("events.jsonl");
        let text = fs::read_to_string(&path).unwrap();
        fs::write(&path, text.trim_end_matches('\n')).unwrap();

        let log = open(&dir);
        let record = log.append(&event("Noah", EventKind::Meeting, 0)).unwrap();
        assert_eq!(record.line, 2);
        assert_eq!(log.verify().unwrap().records, 2);
        assert!(fs::read_to_string(&path).unwrap().ends_with('\n'));
    }

    #[test]
    fn partial_write_is_never_chained_over() {
        let dir = tempfile::tempdir().unwrap();
        let log = open(&dir);
        log.append(&event("Noah", EventKind::Intake, 0)).unwrap();

        // Half a record with no newline, as an interrupted write leaves it.
        let path = dir.path().join("events.jsonl");
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"{\"v\":1,\"client\":\"No").unwrap();
        drop(file);

        assert!(matches!(
            log.append(&event("Noah", EventKind::Meeting, 0)),
            Err(JournalError::Integrity(IntegrityError::Unreadable { line: 2, .. }))
        ));
        assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 2);
    }

    #[test]
    fn separate_handles_share_one_chain() {
        let dir = tempfile::tempdir().unwrap();
        let first = open(&dir);
        let second = open(&dir);
        first.append(&event("Noah", EventKind::Intake, 0)).unwrap();
        second.append(&event("Ava", EventKind::Intake, 0)).unwrap();
        first.append(&event("Noah", EventKind::Meeting, 0)).unwrap();

        assert_eq!(first.verify().unwrap().records, 3);
        assert_eq!(second.len().unwrap(), 3);
    }

    #[test]
    fn concurrent_appends_keep_chain_intact() {
        let dir = tempfile::tempdir().unwrap();
        let log = std::sync::Arc::new(open(&dir));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let log = log.clone();
                std::thread::spawn(move || {
                    for i in 0..10 {
                        log.append(&event(&format!("C{t}"), EventKind::Invoice, i + 1))
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(log.verify().unwrap().records, 40);
    }
}
