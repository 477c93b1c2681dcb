//! Message codec interface.
//!
//! A codec turns raw transport payloads into [`DeviceMessage`]s and back.
//! Protocol adapters implement it per transport; the wire format itself is
//! entirely the adapter's business.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

use crate::error::Result;
use crate::message::DeviceMessage;
use crate::transport::Transport;

/// Raw payload received from a device.
#[derive(Debug, Clone)]
pub struct MessageDecodeContext {
    /// Device the connection is bound to, if already known
    pub device_id: Option<String>,
    pub transport: Transport,
    pub payload: Vec<u8>,
    /// Transport-level metadata (e.g., MQTT topic, CoAP path)
    pub attributes: HashMap<String, Value>,
}

impl MessageDecodeContext {
    pub fn new(transport: Transport, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            device_id: None,
            transport,
            payload: payload.into(),
            attributes: HashMap::new(),
        }
    }

    pub fn with_device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// Payload ready to be written to a device.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedMessage {
    pub payload: Vec<u8>,
    pub attributes: HashMap<String, Value>,
}

impl EncodedMessage {
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
            attributes: HashMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// Converts between transport payloads and device messages.
#[async_trait]
pub trait DeviceMessageCodec: Send + Sync {
    /// The transport this codec speaks.
    fn supported_transport(&self) -> Transport;

    /// Decode one payload into zero or more messages.
    async fn decode(&self, context: MessageDecodeContext) -> Result<Vec<DeviceMessage>>;

    /// Encode a message for delivery.
    async fn encode(&self, message: &DeviceMessage) -> Result<EncodedMessage>;
}
