//! Protocol configuration defaults and helpers.
//!
//! Protocols receive their runtime settings as a plain JSON object through
//! `init`. This module holds the well-known keys, defaults and the
//! descriptor used to declare a protocol from configuration.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;

/// Configuration handed to init callbacks.
pub type Configuration = Map<String, Value>;

/// Status code for an authenticator that produced no verdict.
pub const AUTH_RESULT_UNAVAILABLE_CODE: u16 = 400;

/// Well-known configuration keys
pub mod keys {
    pub const PROTOCOL_ID: &str = "protocolId";
    pub const PROTOCOL_NAME: &str = "protocolName";
    pub const TRANSPORTS: &str = "transports";
}

/// Environment variable names
pub mod env_vars {
    /// Emit JSON logs when set to `true`
    pub const LOG_JSON: &str = "NEOMIND_LOG_JSON";
    /// Fallback log filter when `RUST_LOG` is unset
    pub const LOG_FILTER: &str = "NEOMIND_LOG";

    pub fn log_json() -> bool {
        std::env::var(LOG_JSON)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(false)
    }

    pub fn log_filter() -> Option<String> {
        std::env::var(LOG_FILTER).ok()
    }
}

/// Identity of a protocol adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolDescriptor {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl ProtocolDescriptor {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn from_json(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn from_json_str(source: &str) -> Result<Self> {
        Ok(serde_json::from_str(source)?)
    }

    /// Read the descriptor from an init configuration map.
    pub fn from_configuration(config: &Configuration) -> Option<Self> {
        let id = config.get(keys::PROTOCOL_ID)?.as_str()?;
        let name = config
            .get(keys::PROTOCOL_NAME)
            .and_then(|v| v.as_str())
            .unwrap_or(id);
        Some(Self::new(id, name))
    }
}
