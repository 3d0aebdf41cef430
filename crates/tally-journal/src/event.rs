use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tally_crypto::{canonical_json, ChainLink};
use tally_types::{iso8601, normalize_money, ClientId, Decimal, TransactionType};

use crate::error::{JournalError, Result};

/// Version tag carried by every canonical event.
pub const SCHEMA_VERSION: u32 = 1;

/// Semantic classifier of a canonical event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Intake,
    Meeting,
    FollowUp,
    Invoice,
    Payment,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Intake => "intake",
            Self::Meeting => "meeting",
            Self::FollowUp => "follow_up",
            Self::Invoice => "invoice",
            Self::Payment => "payment",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<TransactionType> for EventKind {
    fn from(kind: TransactionType) -> Self {
        match kind {
            TransactionType::Intake => Self::Intake,
            TransactionType::Meeting => Self::Meeting,
            TransactionType::FollowUp => Self::FollowUp,
            TransactionType::Invoice => Self::Invoice,
            TransactionType::Payment => Self::Payment,
        }
    }
}

/// One immutable fact in the canonical schema.
///
/// Amounts are normalized on construction so that equal amounts always
/// hash identically.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Event {
    pub v: u32,
    pub timestamp: String,
    pub client: ClientId,
    pub kind: EventKind,
    pub amount: Decimal,
}

impl Event {
    pub fn new(client: ClientId, kind: EventKind, amount: Decimal, at: DateTime<Utc>) -> Self {
        Self {
            v: SCHEMA_VERSION,
            timestamp: iso8601(at),
            client,
            kind,
            amount: normalize_money(amount),
        }
    }

    /// The event's fields as a JSON object, without hash fields.
    pub fn to_fields(&self) -> Result<Map<String, Value>> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(JournalError::Serialization(format!(
                "event serialized to non-object {other}"
            ))),
            Err(e) => Err(JournalError::Serialization(e.to_string())),
        }
    }
}

/// One line of the log as stored on disk.
///
/// Records keep their raw fields so that legacy lines verify under the
/// exact bytes they were hashed with; [`EventRecord::decode`] interprets
/// them as canonical events.
#[derive(Clone, Debug, PartialEq)]
pub struct EventRecord {
    /// 1-based physical line number in the log file.
    pub line: usize,
    /// Every field except `prev_hash` and `event_hash`.
    pub fields: Map<String, Value>,
    pub prev_hash: Option<String>,
    pub event_hash: Option<String>,
}

impl EventRecord {
    /// Wrap a canonical event as an unstamped record.
    pub fn from_event(line: usize, event: &Event) -> Result<Self> {
        Ok(Self {
            line,
            fields: event.to_fields()?,
            prev_hash: None,
            event_hash: None,
        })
    }

    /// Parse one physical line.
    pub fn parse_line(line: usize, text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text).map_err(|e| JournalError::Malformed {
            line,
            reason: e.to_string(),
        })?;
        let Value::Object(mut fields) = value else {
            return Err(JournalError::Malformed {
                line,
                reason: "record is not a JSON object".into(),
            });
        };

        let prev_hash = take_hash(&mut fields, "prev_hash", line)?;
        let event_hash = take_hash(&mut fields, "event_hash", line)?;

        Ok(Self {
            line,
            fields,
            prev_hash,
            event_hash,
        })
    }

    /// Render the record as one compact JSON line (no trailing newline).
    pub fn to_line(&self) -> String {
        let mut all = self.fields.clone();
        if let Some(prev) = &self.prev_hash {
            all.insert("prev_hash".into(), Value::String(prev.clone()));
        }
        if let Some(hash) = &self.event_hash {
            all.insert("event_hash".into(), Value::String(hash.clone()));
        }
        canonical_json(&Value::Object(all))
    }

    /// Interpret the record as a canonical v1 event.
    pub fn decode(&self) -> Result<Event> {
        let event: Event = serde_json::from_value(Value::Object(self.fields.clone())).map_err(
            |e| JournalError::NonCanonical {
                line: self.line,
                reason: e.to_string(),
            },
        )?;
        if event.v != SCHEMA_VERSION {
            return Err(JournalError::NonCanonical {
                line: self.line,
                reason: format!("unsupported schema version {}", event.v),
            });
        }
        Ok(event)
    }
}

fn take_hash(fields: &mut Map<String, Value>, key: &str, line: usize) -> Result<Option<String>> {
    match fields.remove(key) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(JournalError::Malformed {
            line,
            reason: format!("{key} must be a string, found {other}"),
        }),
    }
}

impl ChainLink for EventRecord {
    fn line(&self) -> usize {
        self.line
    }

    fn event_hash(&self) -> Option<&str> {
        self.event_hash.as_deref()
    }

    fn prev_hash(&self) -> Option<&str> {
        self.prev_hash.as_deref()
    }

    fn canonical_form(&self) -> String {
        tally_crypto::canonical_event(&self.fields)
    }

    fn stamp(&mut self, prev_hash: String, event_hash: String) {
        self.prev_hash = Some(prev_hash);
        self.event_hash = Some(event_hash);
    }
}
