//! Transport identity.
//!
//! Every per-transport table in the capability registry is keyed by
//! [`TransportKey`]. A [`Transport`] carries a display name and description
//! on top of the key but compares by id only.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Opaque transport identifier used as a map key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransportKey(String);

impl TransportKey {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransportKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for TransportKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TransportKey {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for TransportKey {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&Transport> for TransportKey {
    fn from(transport: &Transport) -> Self {
        transport.key()
    }
}

/// A device communication channel type (MQTT, CoAP, TCP, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transport {
    /// Unique identifier (e.g., "MQTT")
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Optional description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Transport {
    /// Create a transport whose name equals its id.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            description: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// The map key for this transport.
    pub fn key(&self) -> TransportKey {
        TransportKey(self.id.clone())
    }
}

impl PartialEq for Transport {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Transport {}

impl Hash for Transport {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// Transports known to the platform out of the box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DefaultTransport {
    #[serde(rename = "MQTT")]
    Mqtt,
    #[serde(rename = "MQTT_TLS")]
    MqttTls,
    #[serde(rename = "CoAP")]
    Coap,
    #[serde(rename = "CoAP_DTLS")]
    CoapDtls,
    #[serde(rename = "TCP")]
    Tcp,
    #[serde(rename = "TCP_TLS")]
    TcpTls,
    #[serde(rename = "UDP")]
    Udp,
    #[serde(rename = "UDP_DTLS")]
    UdpDtls,
    #[serde(rename = "HTTP")]
    Http,
    #[serde(rename = "HTTPS")]
    Https,
    #[serde(rename = "WebSocket")]
    WebSocket,
    #[serde(rename = "WebSocket_TLS")]
    WebSocketTls,
}

impl DefaultTransport {
    pub const ALL: [DefaultTransport; 12] = [
        DefaultTransport::Mqtt,
        DefaultTransport::MqttTls,
        DefaultTransport::Coap,
        DefaultTransport::CoapDtls,
        DefaultTransport::Tcp,
        DefaultTransport::TcpTls,
        DefaultTransport::Udp,
        DefaultTransport::UdpDtls,
        DefaultTransport::Http,
        DefaultTransport::Https,
        DefaultTransport::WebSocket,
        DefaultTransport::WebSocketTls,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            DefaultTransport::Mqtt => "MQTT",
            DefaultTransport::MqttTls => "MQTT_TLS",
            DefaultTransport::Coap => "CoAP",
            DefaultTransport::CoapDtls => "CoAP_DTLS",
            DefaultTransport::Tcp => "TCP",
            DefaultTransport::TcpTls => "TCP_TLS",
            DefaultTransport::Udp => "UDP",
            DefaultTransport::UdpDtls => "UDP_DTLS",
            DefaultTransport::Http => "HTTP",
            DefaultTransport::Https => "HTTPS",
            DefaultTransport::WebSocket => "WebSocket",
            DefaultTransport::WebSocketTls => "WebSocket_TLS",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            DefaultTransport::Mqtt => "MQTT",
            DefaultTransport::MqttTls => "MQTT over TLS",
            DefaultTransport::Coap => "CoAP",
            DefaultTransport::CoapDtls => "CoAP over DTLS",
            DefaultTransport::Tcp => "TCP",
            DefaultTransport::TcpTls => "TCP over TLS",
            DefaultTransport::Udp => "UDP",
            DefaultTransport::UdpDtls => "UDP over DTLS",
            DefaultTransport::Http => "HTTP",
            DefaultTransport::Https => "HTTPS",
            DefaultTransport::WebSocket => "WebSocket",
            DefaultTransport::WebSocketTls => "WebSocket over TLS",
        }
    }

    /// Look up a default transport by id.
    pub fn lookup(id: &str) -> Option<DefaultTransport> {
        Self::ALL.iter().copied().find(|t| t.id() == id)
    }

    pub fn transport(&self) -> Transport {
        Transport::new(self.id()).with_description(self.description())
    }
}

impl From<DefaultTransport> for Transport {
    fn from(transport: DefaultTransport) -> Self {
        transport.transport()
    }
}
