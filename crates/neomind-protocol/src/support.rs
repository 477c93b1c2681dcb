//! The query surface the platform uses to talk to a protocol adapter.

use async_trait::async_trait;
use std::sync::Arc;

use crate::auth::{AuthContext, AuthenticationRequest, AuthenticationResponse};
use crate::codec::DeviceMessageCodec;
use crate::config::Configuration;
use crate::error::Result;
use crate::interceptor::DeviceMessageSenderInterceptor;
use crate::metadata::{ConfigMetadata, DeviceMetadata, DeviceMetadataCodec, DeviceMetadataType, Feature};
use crate::operator::{ClientConnection, DeviceOperator, DeviceStateChecker, GatewayContext, ProductOperator};
use crate::transport::Transport;

/// A protocol adapter as seen by the platform.
///
/// Lookups return `None` (or an empty list) when the protocol offers nothing
/// for a transport. Lifecycle notifications default to no-ops.
#[async_trait]
pub trait ProtocolSupport: Send + Sync {
    fn id(&self) -> &str;

    fn name(&self) -> &str;

    fn description(&self) -> Option<&str> {
        None
    }

    /// Transports this protocol can encode and decode, derived from its codecs.
    async fn supported_transports(&self) -> Vec<Transport>;

    async fn message_codec(&self, transport: &Transport) -> Option<Arc<dyn DeviceMessageCodec>>;

    /// Interceptor applied to outbound messages; never absent.
    fn sender_interceptor(&self) -> Arc<dyn DeviceMessageSenderInterceptor>;

    async fn authenticate(
        &self,
        request: &AuthenticationRequest,
        context: &AuthContext,
    ) -> Result<AuthenticationResponse>;

    async fn config_metadata(&self, transport: &Transport) -> Option<ConfigMetadata>;

    /// Schema for the protocol's own init configuration.
    fn init_config_metadata(&self) -> Option<ConfigMetadata> {
        None
    }

    async fn default_metadata(&self, transport: &Transport) -> Option<DeviceMetadata>;

    async fn metadata_expands_config(
        &self,
        _transport: &Transport,
        _metadata_type: DeviceMetadataType,
        _metadata_id: &str,
        _data_type_id: &str,
    ) -> Vec<ConfigMetadata> {
        Vec::new()
    }

    async fn features(&self, _transport: &Transport) -> Vec<Feature> {
        Vec::new()
    }

    fn metadata_codec(&self) -> Arc<dyn DeviceMetadataCodec>;

    fn state_checker(&self) -> Option<Arc<dyn DeviceStateChecker>> {
        None
    }

    async fn on_device_register(&self, _device: Arc<dyn DeviceOperator>) -> Result<()> {
        Ok(())
    }

    async fn on_device_unregister(&self, _device: Arc<dyn DeviceOperator>) -> Result<()> {
        Ok(())
    }

    async fn on_device_metadata_changed(&self, _device: Arc<dyn DeviceOperator>) -> Result<()> {
        Ok(())
    }

    async fn on_product_register(&self, _product: Arc<dyn ProductOperator>) -> Result<()> {
        Ok(())
    }

    async fn on_product_unregister(&self, _product: Arc<dyn ProductOperator>) -> Result<()> {
        Ok(())
    }

    async fn on_product_metadata_changed(&self, _product: Arc<dyn ProductOperator>) -> Result<()> {
        Ok(())
    }

    async fn on_client_connect(
        &self,
        _transport: &Transport,
        _connection: Arc<dyn ClientConnection>,
        _context: Arc<dyn GatewayContext>,
    ) -> Result<()> {
        Ok(())
    }

    fn init(&self, _config: &Configuration) {}

    fn dispose(&self) {}

    fn is_disposed(&self) -> bool {
        false
    }
}
