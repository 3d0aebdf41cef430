//! Structured commands and the two wire forms they arrive in: a
//! whitespace-separated line (`invoice Noah 400`) or a JSON object
//! (`{"action": "invoice", "client": "Noah", "amount": 400}`).

use std::str::FromStr;

use serde_json::Value;
use tally_types::{parse_amount, Action, ClientId, Decimal};

use crate::error::RoutingError;

/// One parsed request to the router.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Command {
    pub action: Action,
    pub client: ClientId,
    /// Present for `invoice` and `payment`, absent otherwise.
    pub amount: Option<Decimal>,
}

impl Command {
    pub fn new(action: Action, client: ClientId, amount: Option<Decimal>) -> Self {
        Self {
            action,
            client,
            amount,
        }
    }

    /// Parse `<action> <client> [amount]`.
    pub fn parse(text: &str) -> Result<Self, RoutingError> {
        let mut tokens = text.split_whitespace();
        let action = tokens
            .next()
            .ok_or_else(|| RoutingError::Parse("empty command".into()))?;
        let action = parse_action(action)?;
        let client = tokens.next().ok_or(RoutingError::MissingClient)?;
        let client = parse_client(client)?;
        let amount = tokens.next().map(parse_money).transpose()?;
        if let Some(extra) = tokens.next() {
            return Err(RoutingError::Parse(format!("unexpected token '{extra}'")));
        }
        Self::checked(action, client, amount)
    }

    /// Parse the JSON object form.
    pub fn from_json(value: &Value) -> Result<Self, RoutingError> {
        let object = value
            .as_object()
            .ok_or_else(|| RoutingError::Parse("command must be a JSON object".into()))?;

        let action = match object.get("action") {
            Some(Value::String(action)) => parse_action(action)?,
            Some(other) => return Err(RoutingError::Parse(format!("action must be a string, got {other}"))),
            None => return Err(RoutingError::Parse("missing field 'action'".into())),
        };
        let client = match object.get("client") {
            Some(Value::String(client)) if !client.trim().is_empty() => parse_client(client)?,
            Some(Value::String(_)) | None | Some(Value::Null) => return Err(RoutingError::MissingClient),
            Some(other) => return Err(RoutingError::Parse(format!("client must be a string, got {other}"))),
        };
        let amount = match object.get("amount") {
            None | Some(Value::Null) => None,
            Some(Value::Number(n)) => Some(parse_money(&n.to_string())?),
            Some(Value::String(s)) => Some(parse_money(s)?),
            Some(other) => return Err(RoutingError::Parse(format!("amount must be a number, got {other}"))),
        };
        Self::checked(action, client, amount)
    }

    pub fn from_json_str(text: &str) -> Result<Self, RoutingError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|err| RoutingError::Parse(format!("invalid JSON: {err}")))?;
        Self::from_json(&value)
    }

    fn checked(action: Action, client: ClientId, amount: Option<Decimal>) -> Result<Self, RoutingError> {
        if action.requires_amount() && amount.is_none() {
            return Err(RoutingError::Parse(format!("{action} requires an amount")));
        }
        if !action.requires_amount() && amount.is_some() {
            return Err(RoutingError::Parse(format!("{action} takes no amount")));
        }
        Ok(Self::new(action, client, amount))
    }
}

impl FromStr for Command {
    type Err = RoutingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn parse_action(raw: &str) -> Result<Action, RoutingError> {
    Action::from_str(raw).map_err(|_| RoutingError::Parse(format!("unknown action '{raw}'")))
}

fn parse_client(raw: &str) -> Result<ClientId, RoutingError> {
    ClientId::parse(raw).map_err(|err| RoutingError::Parse(err.to_string()))
}

fn parse_money(raw: &str) -> Result<Decimal, RoutingError> {
    parse_amount(raw).map_err(|err| RoutingError::Parse(err.to_string()))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_text_form() {
        let cmd = Command::parse("  Invoice Noah 400.50 ").unwrap();
        assert_eq!(cmd.action, Action::Invoice);
        assert_eq!(cmd.client.as_str(), "Noah");
        assert_eq!(cmd.amount, Some(Decimal::new(40050, 2)));

        let cmd: Command = "followup Noah".parse().unwrap();
        assert_eq!(cmd.action, Action::FollowUp);
        assert_eq!(cmd.amount, None);
    }

    #[test]
    fn parses_json_form() {
        let cmd = Command::from_json(&json!({"action": "payment", "client": "Noah", "amount": 200})).unwrap();
        assert_eq!(cmd.action, Action::Payment);
        assert_eq!(cmd.amount, Some(Decimal::from(200)));

        let cmd = Command::from_json_str(r#"{"action":"payment","client":"Noah","amount":"0.10"}"#).unwrap();
        assert_eq!(cmd.amount, Some(Decimal::new(10, 2)));
    }

    #[test]
    fn missing_client_is_its_own_error() {
        assert!(matches!(Command::parse("meet"), Err(RoutingError::MissingClient)));
        assert!(matches!(
            Command::from_json(&json!({"action": "meet"})),
            Err(RoutingError::MissingClient)
        ));
        assert!(matches!(
            Command::from_json(&json!({"action": "meet", "client": "  "})),
            Err(RoutingError::MissingClient)
        ));
    }

    #[test]
    fn malformed_commands_are_parse_errors() {
        for text in ["", "dance Noah", "invoice Noah", "invoice Noah lots", "meet Noah 5", "meet Noah extra words"] {
            assert!(
                matches!(Command::parse(text), Err(RoutingError::Parse(_))),
                "{text:?} should not parse"
            );
        }
        assert!(matches!(Command::from_json_str("{not json"), Err(RoutingError::Parse(_))));
        assert!(matches!(Command::from_json(&json!([1, 2])), Err(RoutingError::Parse(_))));
        assert!(matches!(
            Command::from_json(&json!({"action": "invoice", "client": "Noah", "amount": true})),
            Err(RoutingError::Parse(_))
        ));
    }
}
