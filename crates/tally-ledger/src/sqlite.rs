//! SQLite-backed ledger store.
//!
//! Rows live in a single `ledger` table. Amounts are stored as decimal
//! text so that totals recomputed in Rust are exact.

use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;
use std::time::Duration;

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use tally_types::{ClientId, Decimal, LedgerEntry, NewEntry, TransactionType, WorkflowState};
use tracing::debug;

use crate::error::LedgerError;
use crate::traits::{LedgerReader, LedgerTx, LedgerWriter, TxDecision};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS ledger (
    seq              INTEGER PRIMARY KEY AUTOINCREMENT,
    client_name      TEXT NOT NULL,
    transaction_type TEXT NOT NULL,
    amount           TEXT NOT NULL,
    date             TEXT NOT NULL,
    state            TEXT NOT NULL,
    description      TEXT NOT NULL,
    notes            TEXT NOT NULL DEFAULT ''
);
CREATE INDEX IF NOT EXISTS idx_ledger_client ON ledger(client_name, seq);
";

const COLUMNS: &str =
    "seq, client_name, transaction_type, amount, date, state, description, notes";

/// How long a writer waits for another connection's write lock before
/// giving up with `SQLITE_BUSY`.
const BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Durable ledger over a single SQLite database file.
///
/// Several `SqliteLedger`s, in one process or many, may share a file.
/// [`LedgerWriter::transaction`] takes the database write lock up front
/// (`BEGIN IMMEDIATE`), so read-then-append sequences never interleave.
pub struct SqliteLedger {
    conn: Mutex<Connection>,
}

impl SqliteLedger {
    /// Open (creating if needed) the database at `path`.
    pub fn open(path: &Path) -> Result<Self, LedgerError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        debug!(path = %path.display(), "opened sqlite ledger");
        Self::with_connection(conn)
    }

    /// A private in-memory database; contents vanish on drop.
    pub fn open_in_memory() -> Result<Self, LedgerError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, LedgerError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn query(&self, sql: &str, client: Option<&ClientId>) -> Result<Vec<LedgerEntry>, LedgerError> {
        let conn = self.conn.lock().map_err(|_| LedgerError::LockPoisoned)?;
        select_entries(&conn, sql, client)
    }
}

fn select_entries(
    conn: &Connection,
    sql: &str,
    client: Option<&ClientId>,
) -> Result<Vec<LedgerEntry>, LedgerError> {
    let mut stmt = conn.prepare(sql)?;
    let raw: Vec<RawRow> = match client {
        Some(client) => stmt
            .query_map(params![client.as_str()], RawRow::from_row)?
            .collect::<Result<_, _>>()?,
        None => stmt
            .query_map([], RawRow::from_row)?
            .collect::<Result<_, _>>()?,
    };
    raw.into_iter().map(RawRow::into_entry).collect()
}

fn client_history(conn: &Connection, client: &ClientId) -> Result<Vec<LedgerEntry>, LedgerError> {
    select_entries(
        conn,
        &format!("SELECT {COLUMNS} FROM ledger WHERE client_name = ?1 ORDER BY seq"),
        Some(client),
    )
}

fn insert_entry(conn: &Connection, entry: NewEntry) -> Result<LedgerEntry, LedgerError> {
    conn.execute(
        "INSERT INTO ledger (client_name, transaction_type, amount, date, state, description, notes)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            entry.client_name.as_str(),
            entry.transaction_type.as_str(),
            entry.amount.to_string(),
            entry.date.to_string(),
            entry.state.as_str(),
            entry.description,
            entry.notes,
        ],
    )?;
    let seq = conn.last_insert_rowid() as u64;
    Ok(entry.into_entry(seq))
}

/// Transaction view over an open `BEGIN IMMEDIATE` transaction.
struct SqliteTx<'a> {
    conn: &'a Connection,
}

impl LedgerTx for SqliteTx<'_> {
    fn history(&self, client: &ClientId) -> Result<Vec<LedgerEntry>, LedgerError> {
        client_history(self.conn, client)
    }

    fn append(&mut self, entry: NewEntry) -> Result<LedgerEntry, LedgerError> {
        insert_entry(self.conn, entry)
    }
}

impl LedgerWriter for SqliteLedger {
    fn append(&self, entry: NewEntry) -> Result<LedgerEntry, LedgerError> {
        let conn = self.conn.lock().map_err(|_| LedgerError::LockPoisoned)?;
        let entry = insert_entry(&conn, entry)?;
        debug!(seq = entry.seq, client = %entry.client_name, kind = %entry.transaction_type, "ledger row committed");
        Ok(entry)
    }

    fn transaction(
        &self,
        work: &mut dyn FnMut(&mut dyn LedgerTx) -> Result<TxDecision, LedgerError>,
    ) -> Result<(), LedgerError> {
        let mut conn = self.conn.lock().map_err(|_| LedgerError::LockPoisoned)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        // Dropping `tx` on the error path rolls it back.
        let decision = work(&mut SqliteTx { conn: &tx })?;
        match decision {
            TxDecision::Commit => {
                tx.commit()?;
                debug!("ledger transaction committed");
            }
            TxDecision::Rollback => tx.rollback()?,
        }
        Ok(())
    }
}

impl LedgerReader for SqliteLedger {
    fn history(&self, client: &ClientId) -> Result<Vec<LedgerEntry>, LedgerError> {
        let conn = self.conn.lock().map_err(|_| LedgerError::LockPoisoned)?;
        client_history(&conn, client)
    }

    fn clients(&self) -> Result<Vec<ClientId>, LedgerError> {
        let conn = self.conn.lock().map_err(|_| LedgerError::LockPoisoned)?;
        let mut stmt = conn.prepare(
            "SELECT client_name, MIN(seq) AS first_seq FROM ledger
             GROUP BY client_name ORDER BY first_seq",
        )?;
        let names: Vec<(String, i64)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<_, _>>()?;
        names
            .into_iter()
            .map(|(name, seq)| {
                ClientId::parse(&name).map_err(|err| LedgerError::Corrupt {
                    seq: seq as u64,
                    reason: err.to_string(),
                })
            })
            .collect()
    }

    fn all_entries(&self) -> Result<Vec<LedgerEntry>, LedgerError> {
        self.query(&format!("SELECT {COLUMNS} FROM ledger ORDER BY seq"), None)
    }

    fn last_entry(&self, client: &ClientId) -> Result<Option<LedgerEntry>, LedgerError> {
        let raw = {
            let conn = self.conn.lock().map_err(|_| LedgerError::LockPoisoned)?;
            conn.query_row(
                &format!(
                    "SELECT {COLUMNS} FROM ledger WHERE client_name = ?1 ORDER BY seq DESC LIMIT 1"
                ),
                params![client.as_str()],
                RawRow::from_row,
            )
            .optional()?
        };
        raw.map(RawRow::into_entry).transpose()
    }
}

// ---------------------------------------------------------------------------
// Row decoding
// ---------------------------------------------------------------------------

struct RawRow {
    seq: i64,
    client_name: String,
    transaction_type: String,
    amount: String,
    date: String,
    state: String,
    description: String,
    notes: String,
}

impl RawRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            seq: row.get(0)?,
            client_name: row.get(1)?,
            transaction_type: row.get(2)?,
            amount: row.get(3)?,
            date: row.get(4)?,
            state: row.get(5)?,
            description: row.get(6)?,
            notes: row.get(7)?,
        })
    }

    fn into_entry(self) -> Result<LedgerEntry, LedgerError> {
        let seq = self.seq as u64;
        let corrupt = |reason: String| LedgerError::Corrupt { seq, reason };
        Ok(LedgerEntry {
            seq,
            client_name: ClientId::parse(&self.client_name).map_err(|e| corrupt(e.to_string()))?,
            transaction_type: TransactionType::from_str(&self.transaction_type)
                .map_err(|e| corrupt(e.to_string()))?,
            amount: Decimal::from_str(&self.amount)
                .map_err(|e| corrupt(format!("amount {:?}: {e}", self.amount)))?,
            date: NaiveDate::from_str(&self.date)
                .map_err(|e| corrupt(format!("date {:?}: {e}", self.date)))?,
            state: WorkflowState::from_str(&self.state).map_err(|e| corrupt(e.to_string()))?,
            description: self.description,
            notes: self.notes,
        })
    }
}
