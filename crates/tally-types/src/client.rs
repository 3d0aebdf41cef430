use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Identity of one client.
///
/// Client names are single tokens (the command grammar splits on
/// whitespace) and are compared exactly; `Noah` and `noah` are different
/// clients.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClientId(String);

impl ClientId {
    /// Validate and wrap a client name. Surrounding whitespace is trimmed.
    pub fn parse(raw: &str) -> Result<Self, TypeError> {
        let name = raw.trim();
        if name.is_empty() {
            return Err(TypeError::EmptyClient);
        }
        if name.chars().any(char::is_whitespace) {
            return Err(TypeError::InvalidClient(name.to_string()));
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ClientId {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ClientId> for String {
    fn from(id: ClientId) -> Self {
        id.0
    }
}

impl AsRef<str> for ClientId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClientId({})", self.0)
    }
}
