//! Migration of legacy event dialects into the canonical schema.
//!
//! Historic producers wrote three shapes into the same log:
//! - arithmetic operations: `{"type": "credit" | "debit" | "set", ...}`
//! - typed events: `{"type": "Invoice" | "Payment", "client_name": ...}`
//! - semantic pairs: `{"category": "invoice", "action": "Invoice issued", ...}`
//!
//! Everything is mapped onto [`EventKind`] here, once, so that replay only
//! ever interprets one dialect. `credit` and `debit` map onto invoice and
//! payment; `set` overwrites a balance outright and has no accumulating
//! equivalent, so it is refused.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tally_types::{iso8601, normalize_money, ClientId, Decimal};

use crate::error::{JournalError, Result};
use crate::event::{Event, EventKind, SCHEMA_VERSION};

/// Convert one raw record (hash fields already stripped) into a canonical
/// event. Records that are already canonical pass through unchanged.
///
/// `fallback_time` stamps legacy records that never carried a timestamp.
pub fn normalize_record(
    line: usize,
    fields: &Map<String, Value>,
    fallback_time: DateTime<Utc>,
) -> Result<Event> {
    if fields.get("v").and_then(Value::as_u64) == Some(u64::from(SCHEMA_VERSION)) {
        return serde_json::from_value(Value::Object(fields.clone())).map_err(|e| {
            JournalError::Unnormalizable {
                line,
                reason: e.to_string(),
            }
        });
    }

    let fail = |reason: String| JournalError::Unnormalizable { line, reason };

    let client_raw = string_field(fields, &["client", "client_name"])
        .ok_or_else(|| fail("record names no client".into()))?;
    let client = ClientId::parse(client_raw).map_err(|e| fail(e.to_string()))?;

    let kind = classify(fields).map_err(fail)?;
    let amount = amount_field(fields).map_err(fail)?;
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(fail(format!("negative amount {amount}")));
    }

    let timestamp = match fields.get("timestamp").and_then(Value::as_str) {
        Some(ts) => ts.to_string(),
        None => iso8601(fallback_time),
    };

    Ok(Event {
        v: SCHEMA_VERSION,
        timestamp,
        client,
        kind,
        amount: normalize_money(amount),
    })
}

fn classify(fields: &Map<String, Value>) -> std::result::Result<EventKind, String> {
    if let Some(tag) = string_field(fields, &["type", "event", "event_type"]) {
        return match tag.to_ascii_lowercase().as_str() {
            "invoice" | "credit" => Ok(EventKind::Invoice),
            "payment" | "debit" => Ok(EventKind::Payment),
            "intake" => Ok(EventKind::Intake),
            "meeting" => Ok(EventKind::Meeting),
            "follow_up" | "followup" => Ok(EventKind::FollowUp),
            "set" => Err("'set' overrides a balance and has no invoice/payment equivalent".into()),
            other => Err(format!("unknown event type '{other}'")),
        };
    }

    let action = string_field(fields, &["action"]).map(str::to_ascii_lowercase);
    let category = string_field(fields, &["category"]).map(str::to_ascii_lowercase);

    if let Some(action) = &action {
        if action.contains("payment") {
            return Ok(EventKind::Payment);
        }
        if action.contains("issued") && category.as_deref().map_or(true, |c| c == "invoice") {
            return Ok(EventKind::Invoice);
        }
    }

    match category.as_deref() {
        Some("intake") => Ok(EventKind::Intake),
        Some("meeting") => Ok(EventKind::Meeting),
        Some("follow_up" | "followup") => Ok(EventKind::FollowUp),
        Some(other) => Err(format!(
            "cannot classify category '{other}' with action '{}'",
            action.unwrap_or_default()
        )),
        None => Err("record carries no type, category, or recognised action".into()),
    }
}

fn string_field<'a>(fields: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|k| fields.get(*k).and_then(Value::as_str))
}

fn amount_field(fields: &Map<String, Value>) -> std::result::Result<Decimal, String> {
    match fields.get("amount") {
        None | Some(Value::Null) => Ok(Decimal::ZERO),
        Some(Value::Number(n)) => {
            let text = n.to_string();
            Decimal::from_str(&text)
                .or_else(|_| Decimal::from_scientific(&text))
                .map_err(|_| format!("amount {text} is not representable"))
        }
        Some(Value::String(s)) => {
            tally_types::parse_amount(s).map_err(|e| e.to_string())
        }
        Some(other) => Err(format!("amount must be a number, found {other}")),
    }
}
