use serde_json::{Map, Value};

/// Fields that carry the chain itself and are never part of the hashed form.
pub const HASH_FIELDS: [&str; 2] = ["event_hash", "prev_hash"];

/// Render a JSON value canonically: object keys sorted lexicographically
/// (by UTF-8 bytes) at every depth, `,` and `:` separators, no whitespace.
///
/// Key order is imposed here rather than inherited from `serde_json::Map`,
/// so the output does not depend on the `preserve_order` feature.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_value(value, &mut out);
    out
}

/// Canonical form of one event record: every field except [`HASH_FIELDS`].
pub fn canonical_event(fields: &Map<String, Value>) -> String {
    let mut out = String::from("{");
    let mut keys: Vec<&String> = fields
        .keys()
        .filter(|k| !HASH_FIELDS.contains(&k.as_str()))
        .collect();
    keys.sort();
    for (i, key) in keys.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        write_string(key, &mut out);
        out.push(':');
        write_value(&fields[key], &mut out);
    }
    out.push('}');
    out
}

fn write_value(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            out.push('{');
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(key, out);
                out.push(':');
                write_value(&map[key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(item, out);
            }
            out.push(']');
        }
        Value::String(s) => write_string(s, out),
        // Scalars have exactly one compact rendering.
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// JSON string with every character outside printable ASCII written as a
/// `\uXXXX` escape (UTF-16 surrogate pairs above the BMP), matching the
/// ASCII-only form legacy writers hashed.
fn write_string(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            ' '..='~' => out.push(c),
            _ => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    out.push_str(&format!("\\u{unit:04x}"));
                }
            }
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn keys_are_sorted_at_every_depth() {
        let value = json!({"b": 1, "a": {"z": true, "m": [ {"y": 1, "x": 2} ]}});
        assert_eq!(
            canonical_json(&value),
            r#"{"a":{"m":[{"x":2,"y":1}],"z":true},"b":1}"#
        );
    }

    #[test]
    fn event_form_excludes_hash_fields() {
        let record = json!({
            "client": "Noah",
            "amount": "400",
            "prev_hash": "GENESIS",
            "event_hash": "abc",
            "kind": "invoice"
        });
        let form = canonical_event(record.as_object().unwrap());
        assert_eq!(form, r#"{"amount":"400","client":"Noah","kind":"invoice"}"#);
    }

    #[test]
    fn float_amounts_render_like_legacy_writers() {
        let record = json!({"amount": 400.0, "client": "Ava"});
        assert_eq!(
            canonical_event(record.as_object().unwrap()),
            r#"{"amount":400.0,"client":"Ava"}"#
        );
    }

    #[test]
    fn non_ascii_is_escaped_as_utf16_units() {
        let value = json!({"n": "Zo\u{eb} \u{1f600}\u{7f}\u{01}"});
        assert_eq!(
            canonical_json(&value),
            r#"{"n":"Zo\u00eb \ud83d\ude00\u007f\u0001"}"#
        );
    }

    #[test]
    fn legacy_hash_vector_with_accented_client() {
        let record = json!({
            "amount": "0",
            "client": "Jos\u{e9}",
            "kind": "intake",
            "timestamp": "2026-01-05T09:00:00Z",
            "v": 1
        });
        let form = canonical_event(record.as_object().unwrap());
        assert_eq!(
            form,
            r#"{"amount":"0","client":"Jos\u00e9","kind":"intake","timestamp":"2026-01-05T09:00:00Z","v":1}"#
        );
        assert_eq!(
            crate::HashChainVerifier::compute_hash(crate::GENESIS, &form),
            "fae76c3b0729cb5ad70c090be36c8de8faf149b058987aa9a76d523bd73011ee"
        );
    }

    #[test]
    fn strings_are_escaped() {
        let value = json!({"note": "say \"hi\"\n"});
        assert_eq!(canonical_json(&value), r#"{"note":"say \"hi\"\n"}"#);
    }
}
