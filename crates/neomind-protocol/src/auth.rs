//! Device authentication.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::config::AUTH_RESULT_UNAVAILABLE_CODE;
use crate::error::Result;
use crate::operator::{DeviceOperator, DeviceRegistry};
use crate::transport::Transport;

/// Credentials presented by a connecting device.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Credentials {
    /// MQTT-style client id, username and password
    UsernamePassword {
        client_id: String,
        username: String,
        password: String,
    },
    /// Bearer token or pre-shared key
    Token { token: String },
    /// No credentials
    Anonymous,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::UsernamePassword {
                client_id,
                username,
                ..
            } => f
                .debug_struct("UsernamePassword")
                .field("client_id", client_id)
                .field("username", username)
                .field("password", &"***")
                .finish(),
            Credentials::Token { .. } => f.debug_struct("Token").field("token", &"***").finish(),
            Credentials::Anonymous => f.write_str("Anonymous"),
        }
    }
}

/// An authentication attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticationRequest {
    pub transport: Transport,
    /// Device the caller claims to be, if known
    #[serde(default)]
    pub device_id: Option<String>,
    pub credentials: Credentials,
}

impl AuthenticationRequest {
    pub fn new(transport: Transport, credentials: Credentials) -> Self {
        Self {
            transport,
            device_id: None,
            credentials,
        }
    }

    pub fn with_device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }
}

impl fmt::Display for AuthenticationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AuthenticationRequest(transport={}, device={}, credentials={:?})",
            self.transport,
            self.device_id.as_deref().unwrap_or("-"),
            self.credentials
        )
    }
}

/// Outcome of an authentication attempt. A declined request is a normal
/// response with `success == false`, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticationResponse {
    pub success: bool,
    pub code: u16,
    #[serde(default)]
    pub message: Option<String>,
    /// Device the connection is bound to on success
    #[serde(default)]
    pub device_id: Option<String>,
}

impl AuthenticationResponse {
    pub fn success(device_id: impl Into<String>) -> Self {
        Self {
            success: true,
            code: 200,
            message: None,
            device_id: Some(device_id.into()),
        }
    }

    pub fn error(code: u16, message: impl Into<String>) -> Self {
        Self {
            success: false,
            code,
            message: Some(message.into()),
            device_id: None,
        }
    }

    /// Response used when an authenticator produced nothing.
    pub fn unavailable() -> Self {
        Self::error(AUTH_RESULT_UNAVAILABLE_CODE, "authentication result unavailable")
    }
}

/// What the authenticator may consult.
#[derive(Clone)]
pub enum AuthContext {
    /// The connection already claims a specific device
    Device(Arc<dyn DeviceOperator>),
    /// The device must be looked up
    Registry(Arc<dyn DeviceRegistry>),
}

impl fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthContext::Device(device) => {
                f.debug_tuple("Device").field(&device.device_id()).finish()
            }
            AuthContext::Registry(_) => f.write_str("Registry"),
        }
    }
}

/// Per-transport authenticator.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// `Ok(None)` means the authenticator could not reach a verdict.
    async fn authenticate(
        &self,
        request: &AuthenticationRequest,
        context: &AuthContext,
    ) -> Result<Option<AuthenticationResponse>>;
}
