//! Device message model.
//!
//! Messages travel between the platform and devices through the codecs a
//! protocol registers. A [`ChildDeviceMessage`] wraps a message destined for
//! a device that sits behind a gateway; envelopes may nest, forming a chain
//! gateway -> child -> grandchild. The chain must never revisit a device,
//! which [`ChildDeviceMessage::validate`] checks before delivery.
//!
//! ## Replies
//!
//! Only some message kinds expect an answer. [`DeviceMessage::as_repliable`]
//! exposes the reply constructor for those kinds and `None` for the rest,
//! and a child envelope builds its reply by asking its inner message the
//! same question, so reply nesting mirrors request nesting level by level.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

use crate::error::{ProtocolError, Result};

/// Free-form message headers.
pub type Headers = Map<String, Value>;

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Fields shared by every device message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageHeader {
    pub message_id: String,
    pub device_id: String,
    /// Epoch milliseconds
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub headers: Headers,
}

impl MessageHeader {
    /// Header with a fresh message id and the current time.
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            message_id: uuid::Uuid::new_v4().to_string(),
            device_id: device_id.into(),
            timestamp: now_millis(),
            headers: Map::new(),
        }
    }

    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = message_id.into();
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }
}

/// Discriminant for messages and replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    ReadProperty,
    ReadPropertyReply,
    WriteProperty,
    WritePropertyReply,
    InvokeFunction,
    InvokeFunctionReply,
    ReportProperty,
    Event,
    Child,
    ChildReply,
}

/// Request to read device properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadPropertyMessage {
    #[serde(flatten)]
    pub header: MessageHeader,
    #[serde(default)]
    pub properties: Vec<String>,
}

/// Request to write device properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WritePropertyMessage {
    #[serde(flatten)]
    pub header: MessageHeader,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

/// Request to invoke a device function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionInvokeMessage {
    #[serde(flatten)]
    pub header: MessageHeader,
    pub function_id: String,
    #[serde(default)]
    pub inputs: Map<String, Value>,
}

/// Properties pushed by a device on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportPropertyMessage {
    #[serde(flatten)]
    pub header: MessageHeader,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

/// Event raised by a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMessage {
    #[serde(flatten)]
    pub header: MessageHeader,
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

/// Message forwarded through a gateway to a child device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildDeviceMessage {
    #[serde(flatten)]
    pub header: MessageHeader,
    pub child_device_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child_device_message: Option<Box<DeviceMessage>>,
}

/// Any message sent to or received from a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "messageType", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceMessage {
    ReadProperty(ReadPropertyMessage),
    WriteProperty(WritePropertyMessage),
    InvokeFunction(FunctionInvokeMessage),
    ReportProperty(ReportPropertyMessage),
    Event(EventMessage),
    Child(ChildDeviceMessage),
}

/// Message kinds that expect a reply.
pub trait RepliableMessage {
    /// Build an empty, successful reply addressed to the same device.
    fn new_reply(&self) -> DeviceMessageReply;
}

impl DeviceMessage {
    pub fn header(&self) -> &MessageHeader {
        match self {
            Self::ReadProperty(m) => &m.header,
            Self::WriteProperty(m) => &m.header,
            Self::InvokeFunction(m) => &m.header,
            Self::ReportProperty(m) => &m.header,
            Self::Event(m) => &m.header,
            Self::Child(m) => &m.header,
        }
    }

    pub fn header_mut(&mut self) -> &mut MessageHeader {
        match self {
            Self::ReadProperty(m) => &mut m.header,
            Self::WriteProperty(m) => &mut m.header,
            Self::InvokeFunction(m) => &mut m.header,
            Self::ReportProperty(m) => &mut m.header,
            Self::Event(m) => &mut m.header,
            Self::Child(m) => &mut m.header,
        }
    }

    pub fn message_id(&self) -> &str {
        &self.header().message_id
    }

    pub fn device_id(&self) -> &str {
        &self.header().device_id
    }

    pub fn message_type(&self) -> MessageType {
        match self {
            Self::ReadProperty(_) => MessageType::ReadProperty,
            Self::WriteProperty(_) => MessageType::WriteProperty,
            Self::InvokeFunction(_) => MessageType::InvokeFunction,
            Self::ReportProperty(_) => MessageType::ReportProperty,
            Self::Event(_) => MessageType::Event,
            Self::Child(_) => MessageType::Child,
        }
    }

    /// Reply constructor for kinds that expect one.
    pub fn as_repliable(&self) -> Option<&dyn RepliableMessage> {
        let repliable: &dyn RepliableMessage = match self {
            Self::ReadProperty(m) => m,
            Self::WriteProperty(m) => m,
            Self::InvokeFunction(m) => m,
            Self::Child(m) => m,
            Self::ReportProperty(_) | Self::Event(_) => return None,
        };
        Some(repliable)
    }

    /// Structural validation. Only child envelopes carry constraints.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Child(m) => m.validate(),
            _ => Ok(()),
        }
    }

    pub fn to_json(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_json(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }
}

impl ReadPropertyMessage {
    pub fn new(device_id: impl Into<String>, properties: Vec<String>) -> Self {
        Self {
            header: MessageHeader::new(device_id),
            properties,
        }
    }
}

impl WritePropertyMessage {
    pub fn new(device_id: impl Into<String>, properties: Map<String, Value>) -> Self {
        Self {
            header: MessageHeader::new(device_id),
            properties,
        }
    }
}

impl FunctionInvokeMessage {
    pub fn new(device_id: impl Into<String>, function_id: impl Into<String>) -> Self {
        Self {
            header: MessageHeader::new(device_id),
            function_id: function_id.into(),
            inputs: Map::new(),
        }
    }

    pub fn with_input(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.inputs.insert(name.into(), value.into());
        self
    }
}

impl ReportPropertyMessage {
    pub fn new(device_id: impl Into<String>, properties: Map<String, Value>) -> Self {
        Self {
            header: MessageHeader::new(device_id),
            properties,
        }
    }
}

impl EventMessage {
    pub fn new(device_id: impl Into<String>, event: impl Into<String>, data: Value) -> Self {
        Self {
            header: MessageHeader::new(device_id),
            event: event.into(),
            data,
        }
    }
}

impl RepliableMessage for ReadPropertyMessage {
    fn new_reply(&self) -> DeviceMessageReply {
        DeviceMessageReply::ReadPropertyReply(ReadPropertyReply {
            reply: ReplyHeader::for_request(&self.header),
            properties: Map::new(),
        })
    }
}

impl RepliableMessage for WritePropertyMessage {
    fn new_reply(&self) -> DeviceMessageReply {
        DeviceMessageReply::WritePropertyReply(WritePropertyReply {
            reply: ReplyHeader::for_request(&self.header),
            properties: Map::new(),
        })
    }
}

impl RepliableMessage for FunctionInvokeMessage {
    fn new_reply(&self) -> DeviceMessageReply {
        DeviceMessageReply::InvokeFunctionReply(FunctionInvokeReply {
            reply: ReplyHeader::for_request(&self.header),
            function_id: self.function_id.clone(),
            output: Value::Null,
        })
    }
}

impl ChildDeviceMessage {
    /// Wrap `message` so that gateway `device_id` forwards it to the
    /// message's own device.
    pub fn create(device_id: impl Into<String>, message: DeviceMessage) -> Self {
        let header = MessageHeader::new(device_id).with_message_id(message.message_id());
        Self {
            header,
            child_device_id: message.device_id().to_string(),
            child_device_message: Some(Box::new(message)),
        }
    }

    /// Reject envelope chains that visit the same device twice.
    ///
    /// The walk starts at this envelope's device id and follows each nested
    /// child envelope until it reaches a non-envelope message. A nested
    /// envelope whose own device id differs from the id its parent forwards
    /// to contributes both ids to the chain.
    pub fn validate(&self) -> Result<()> {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut chain: Vec<&str> = Vec::new();
        let mut visit = |id| {
            chain.push(id);
            if visited.insert(id) {
                Ok(())
            } else {
                Err(ProtocolError::CyclicDeviceReference {
                    chain: chain.iter().map(|id| id.to_string()).collect(),
                })
            }
        };

        visit(self.header.device_id.as_str())?;
        let mut current = self;
        loop {
            let child_id = current.child_device_id.as_str();
            visit(child_id)?;

            let Some(DeviceMessage::Child(next)) = current.child_device_message.as_deref() else {
                return Ok(());
            };
            if next.header.device_id != child_id {
                visit(next.header.device_id.as_str())?;
            }
            current = next;
        }
    }

    /// Reply whose nesting mirrors this envelope.
    pub fn new_reply(&self) -> ChildDeviceMessageReply {
        ChildDeviceMessageReply {
            reply: ReplyHeader::for_request(&self.header),
            child_device_id: self.child_device_id.clone(),
            child_device_message: self
                .child_device_message
                .as_deref()
                .and_then(DeviceMessage::as_repliable)
                .map(|inner| Box::new(inner.new_reply())),
        }
    }

    /// Number of nested payload links below this envelope.
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut next = self.child_device_message.as_deref();
        while let Some(message) = next {
            depth += 1;
            next = match message {
                DeviceMessage::Child(child) => child.child_device_message.as_deref(),
                _ => None,
            };
        }
        depth
    }
}

impl RepliableMessage for ChildDeviceMessage {
    fn new_reply(&self) -> DeviceMessageReply {
        DeviceMessageReply::ChildReply(ChildDeviceMessage::new_reply(self))
    }
}

/// Fields shared by every reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyHeader {
    #[serde(flatten)]
    pub header: MessageHeader,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ReplyHeader {
    /// Successful reply header addressed like `request`.
    pub fn for_request(request: &MessageHeader) -> Self {
        Self {
            header: MessageHeader {
                message_id: request.message_id.clone(),
                device_id: request.device_id.clone(),
                timestamp: now_millis(),
                headers: Map::new(),
            },
            success: true,
            code: None,
            message: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadPropertyReply {
    #[serde(flatten)]
    pub reply: ReplyHeader,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WritePropertyReply {
    #[serde(flatten)]
    pub reply: ReplyHeader,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionInvokeReply {
    #[serde(flatten)]
    pub reply: ReplyHeader,
    pub function_id: String,
    #[serde(default)]
    pub output: Value,
}

/// Reply travelling back from a child device through its gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildDeviceMessageReply {
    #[serde(flatten)]
    pub reply: ReplyHeader,
    pub child_device_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child_device_message: Option<Box<DeviceMessageReply>>,
}

impl ChildDeviceMessageReply {
    /// Number of nested payload links below this reply.
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut next = self.child_device_message.as_deref();
        while let Some(reply) = next {
            depth += 1;
            next = match reply {
                DeviceMessageReply::ChildReply(child) => child.child_device_message.as_deref(),
                _ => None,
            };
        }
        depth
    }
}

/// Any reply produced by a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "messageType", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceMessageReply {
    ReadPropertyReply(ReadPropertyReply),
    WritePropertyReply(WritePropertyReply),
    InvokeFunctionReply(FunctionInvokeReply),
    ChildReply(ChildDeviceMessageReply),
}

impl DeviceMessageReply {
    pub fn reply_header(&self) -> &ReplyHeader {
        match self {
            Self::ReadPropertyReply(r) => &r.reply,
            Self::WritePropertyReply(r) => &r.reply,
            Self::InvokeFunctionReply(r) => &r.reply,
            Self::ChildReply(r) => &r.reply,
        }
    }

    fn reply_header_mut(&mut self) -> &mut ReplyHeader {
        match self {
            Self::ReadPropertyReply(r) => &mut r.reply,
            Self::WritePropertyReply(r) => &mut r.reply,
            Self::InvokeFunctionReply(r) => &mut r.reply,
            Self::ChildReply(r) => &mut r.reply,
        }
    }

    pub fn message_id(&self) -> &str {
        &self.reply_header().header.message_id
    }

    pub fn device_id(&self) -> &str {
        &self.reply_header().header.device_id
    }

    pub fn is_success(&self) -> bool {
        self.reply_header().success
    }

    pub fn message_type(&self) -> MessageType {
        match self {
            Self::ReadPropertyReply(_) => MessageType::ReadPropertyReply,
            Self::WritePropertyReply(_) => MessageType::WritePropertyReply,
            Self::InvokeFunctionReply(_) => MessageType::InvokeFunctionReply,
            Self::ChildReply(_) => MessageType::ChildReply,
        }
    }

    /// Mark this reply as failed.
    pub fn with_error(mut self, code: impl Into<String>, message: impl Into<String>) -> Self {
        let header = self.reply_header_mut();
        header.success = false;
        header.code = Some(code.into());
        header.message = Some(message.into());
        self
    }

    pub fn to_json(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_json(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }
}
