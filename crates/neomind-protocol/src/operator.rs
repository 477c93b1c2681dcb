//! Handles supplied by the surrounding platform.
//!
//! The protocol layer never inspects these beyond their identifiers; they
//! are passed through to hooks, authenticators and connection handlers.

use async_trait::async_trait;
use std::sync::Arc;

use crate::transport::Transport;

/// A registered device as seen by protocol hooks.
pub trait DeviceOperator: Send + Sync {
    fn device_id(&self) -> &str;

    /// Product the device belongs to, if known.
    fn product_id(&self) -> Option<&str> {
        None
    }
}

/// A registered product (device type).
pub trait ProductOperator: Send + Sync {
    fn product_id(&self) -> &str;
}

/// Device lookup used when authenticating a connection that has not yet
/// been bound to a device.
#[async_trait]
pub trait DeviceRegistry: Send + Sync {
    async fn get_device(&self, device_id: &str) -> Option<Arc<dyn DeviceOperator>>;
}

/// A freshly accepted client connection.
pub trait ClientConnection: Send + Sync {
    fn connection_id(&self) -> &str;

    fn transport(&self) -> Transport;

    /// Remote peer address, when the transport has one.
    fn remote_address(&self) -> Option<String> {
        None
    }
}

/// Gateway-side context handed to connection handlers.
pub trait GatewayContext: Send + Sync {
    fn gateway_id(&self) -> &str;
}

/// Device online state as reported by a state checker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceState {
    Online,
    Offline,
    Unknown,
}

/// Protocol-specific device state probe.
#[async_trait]
pub trait DeviceStateChecker: Send + Sync {
    /// Returns `None` when the checker cannot decide.
    async fn check_state(&self, device: Arc<dyn DeviceOperator>) -> Option<DeviceState>;
}
