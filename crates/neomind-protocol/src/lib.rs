//! Protocol capability layer for NeoMind device adapters.
//!
//! A protocol adapter describes what it can do for each transport it speaks
//! (codecs, authentication, configuration schemas, default metadata and
//! connection handling) through a [`CapabilityRegistry`]. The platform sees
//! every adapter through the [`ProtocolSupport`] trait and keeps them in a
//! [`ProtocolRegistry`].
//!
//! The crate also carries the device message model, including
//! gateway-wrapped [`ChildDeviceMessage`]s, and the metadata merge rules
//! used when combining device models.

pub mod auth;
pub mod capability;
pub mod codec;
pub mod config;
pub mod error;
pub mod interceptor;
pub mod lifecycle;
pub mod logging;
pub mod message;
pub mod metadata;
pub mod operator;
pub mod protocols;
pub mod registry;
pub mod support;
pub mod transport;

pub use auth::{AuthContext, AuthenticationRequest, AuthenticationResponse, Authenticator, Credentials};
pub use capability::{CapabilityKind, LazyCapability};
pub use codec::{DeviceMessageCodec, EncodedMessage, MessageDecodeContext};
pub use config::{Configuration, ProtocolDescriptor};
pub use error::{ErrorCode, ProtocolError, Result};
pub use interceptor::{CompositeInterceptor, DeviceMessageSenderInterceptor, InterceptorChain, NoopInterceptor};
pub use message::{
    ChildDeviceMessage, ChildDeviceMessageReply, DeviceMessage, DeviceMessageReply, MessageHeader,
    MessageType, RepliableMessage,
};
pub use metadata::{
    merge_expands, ConfigMetadata, DeviceMetadata, DeviceMetadataCodec, DeviceMetadataType,
    ExpandsMerge, Feature, JsonMetadataCodec, MergeOption,
};
pub use protocols::ProtocolRegistry;
pub use registry::CapabilityRegistry;
pub use support::ProtocolSupport;
pub use transport::{DefaultTransport, Transport, TransportKey};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-exports commonly used types.
pub mod prelude {
    // Registries
    pub use crate::protocols::ProtocolRegistry;
    pub use crate::registry::CapabilityRegistry;
    pub use crate::support::ProtocolSupport;

    // Capabilities
    pub use crate::auth::{AuthContext, AuthenticationRequest, AuthenticationResponse, Authenticator, Credentials};
    pub use crate::capability::{CapabilityKind, LazyCapability};
    pub use crate::codec::{DeviceMessageCodec, EncodedMessage, MessageDecodeContext};
    pub use crate::interceptor::DeviceMessageSenderInterceptor;
    pub use crate::operator::{ClientConnection, DeviceOperator, DeviceRegistry, GatewayContext, ProductOperator};
    pub use crate::transport::{DefaultTransport, Transport};

    // Messages and metadata
    pub use crate::message::{ChildDeviceMessage, DeviceMessage, DeviceMessageReply, RepliableMessage};
    pub use crate::metadata::{ConfigMetadata, DeviceMetadata, ExpandsMerge, Feature, MergeOption};

    // Configuration and errors
    pub use crate::config::Configuration;
    pub use crate::error::{ProtocolError, Result};

    pub use std::sync::Arc;
}
