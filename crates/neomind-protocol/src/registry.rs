//! Capability Registry - per-transport behavior of one protocol adapter
//!
//! A protocol adapter registers, for each transport it speaks, any of:
//! - message codec
//! - authenticator
//! - configuration schema
//! - default device metadata
//! - expands-config schema provider
//! - client connection handler
//! - feature set
//!
//! Every table is independently optional: a transport without an entry
//! simply does not offer that capability. Value-producing capabilities are
//! stored as [`LazyCapability`]s and resolved on each lookup.
//!
//! ## Example
//!
//! ```rust,ignore
//! use neomind_protocol::prelude::*;
//!
//! let protocol = CapabilityRegistry::new("demo", "Demo Protocol");
//! protocol.add_message_codec_support(Arc::new(MyMqttCodec))?;
//! protocol.add_authenticator(&DefaultTransport::Mqtt.into(), Arc::new(MyAuthenticator))?;
//! protocol.do_on_device_register(|device| async move {
//!     tracing::info!("device {} registered", device.device_id());
//!     Ok(())
//! })?;
//!
//! let transports = protocol.supported_transports().await;
//! ```
//!
//! ## Disposal
//!
//! [`ProtocolSupport::dispose`] clears the seven transport tables and runs
//! the disposers exactly once. Registration afterwards fails with
//! [`ProtocolError::Disposed`]. Lookups already in flight may still see the
//! old entries.

use async_trait::async_trait;
use dashmap::DashMap;
use futures::future::{join_all, BoxFuture, FutureExt};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::auth::{AuthContext, AuthenticationRequest, AuthenticationResponse, Authenticator};
use crate::capability::{CapabilityKind, LazyCapability};
use crate::codec::DeviceMessageCodec;
use crate::config::{Configuration, ProtocolDescriptor};
use crate::error::{ProtocolError, Result};
use crate::interceptor::{DeviceMessageSenderInterceptor, InterceptorChain};
use crate::lifecycle::{device_hook, product_hook, DeviceEvent, LifecycleHookTable, ProductEvent};
use crate::metadata::{
    ConfigMetadata, DeviceMetadata, DeviceMetadataCodec, DeviceMetadataType,
    ExpandsConfigMetadataProvider, Feature, JsonMetadataCodec,
};
use crate::operator::{ClientConnection, DeviceOperator, DeviceStateChecker, GatewayContext, ProductOperator};
use crate::support::ProtocolSupport;
use crate::transport::{Transport, TransportKey};

/// Handler for a newly accepted client connection.
pub type ConnectionHandler = Arc<
    dyn Fn(Arc<dyn ClientConnection>, Arc<dyn GatewayContext>) -> BoxFuture<'static, Result<()>>
        + Send
        + Sync,
>;

/// Codec capability as stored in the registry.
pub type CodecCapability = LazyCapability<Arc<dyn DeviceMessageCodec>>;

fn lookup<V: Clone>(table: &DashMap<TransportKey, V>, transport: &Transport) -> Option<V> {
    table.get(transport.id.as_str()).map(|entry| entry.value().clone())
}

/// Per-transport capability tables for one protocol adapter.
pub struct CapabilityRegistry {
    descriptor: ProtocolDescriptor,

    codecs: DashMap<TransportKey, CodecCapability>,
    authenticators: DashMap<TransportKey, Arc<dyn Authenticator>>,
    config_metadata: DashMap<TransportKey, LazyCapability<ConfigMetadata>>,
    default_metadata: DashMap<TransportKey, LazyCapability<DeviceMetadata>>,
    expands_config: DashMap<TransportKey, Arc<dyn ExpandsConfigMetadataProvider>>,
    connection_handlers: DashMap<TransportKey, ConnectionHandler>,
    features: DashMap<TransportKey, LazyCapability<Vec<Feature>>>,

    init_config_metadata: RwLock<Option<ConfigMetadata>>,
    metadata_codec: RwLock<Arc<dyn DeviceMetadataCodec>>,
    extra_metadata_codecs: RwLock<Vec<Arc<dyn DeviceMetadataCodec>>>,
    state_checker: RwLock<Option<Arc<dyn DeviceStateChecker>>>,

    interceptors: InterceptorChain,
    hooks: LifecycleHookTable,

    /// Held shared by registrations and exclusively by `dispose`
    gate: RwLock<()>,
    disposed: AtomicBool,
}

impl CapabilityRegistry {
    /// Create an empty registry.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::from_descriptor(ProtocolDescriptor::new(id, name))
    }

    pub fn from_descriptor(descriptor: ProtocolDescriptor) -> Self {
        Self {
            descriptor,
            codecs: DashMap::new(),
            authenticators: DashMap::new(),
            config_metadata: DashMap::new(),
            default_metadata: DashMap::new(),
            expands_config: DashMap::new(),
            connection_handlers: DashMap::new(),
            features: DashMap::new(),
            init_config_metadata: RwLock::new(None),
            metadata_codec: RwLock::new(Arc::new(JsonMetadataCodec)),
            extra_metadata_codecs: RwLock::new(Vec::new()),
            state_checker: RwLock::new(None),
            interceptors: InterceptorChain::new(),
            hooks: LifecycleHookTable::new(),
            gate: RwLock::new(()),
            disposed: AtomicBool::new(false),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.descriptor.description = Some(description.into());
        self
    }

    pub fn descriptor(&self) -> &ProtocolDescriptor {
        &self.descriptor
    }

    /// Run `register` unless the registry is disposed.
    fn guarded<R>(&self, what: &str, register: impl FnOnce() -> R) -> Result<R> {
        let _gate = self.gate.read();
        if self.disposed.load(Ordering::Acquire) {
            tracing::warn!(
                "Rejected {} registration: protocol '{}' is disposed",
                what,
                self.descriptor.id
            );
            return Err(ProtocolError::Disposed(self.descriptor.id.clone()));
        }
        let result = register();
        tracing::debug!("Registered {} on protocol '{}'", what, self.descriptor.id);
        Ok(result)
    }

    // ========================================================================
    // Per-transport capabilities
    // ========================================================================

    /// Register a lazily produced codec for `transport`.
    pub fn add_message_codec(&self, transport: &Transport, codec: CodecCapability) -> Result<()> {
        self.guarded("message codec", || {
            self.codecs.insert(transport.key(), codec);
        })
    }

    /// Register a fixed codec under the transport it declares.
    pub fn add_message_codec_support(&self, codec: Arc<dyn DeviceMessageCodec>) -> Result<()> {
        let transport = codec.supported_transport();
        self.add_message_codec(&transport, LazyCapability::fixed(codec))
    }

    pub fn add_authenticator(&self, transport: &Transport, authenticator: Arc<dyn Authenticator>) -> Result<()> {
        self.guarded("authenticator", || {
            self.authenticators.insert(transport.key(), authenticator);
        })
    }

    pub fn add_config_metadata(
        &self,
        transport: &Transport,
        metadata: LazyCapability<ConfigMetadata>,
    ) -> Result<()> {
        self.guarded("config metadata", || {
            self.config_metadata.insert(transport.key(), metadata);
        })
    }

    pub fn add_default_metadata(
        &self,
        transport: &Transport,
        metadata: LazyCapability<DeviceMetadata>,
    ) -> Result<()> {
        self.guarded("default metadata", || {
            self.default_metadata.insert(transport.key(), metadata);
        })
    }

    pub fn set_expands_config_metadata(
        &self,
        transport: &Transport,
        provider: Arc<dyn ExpandsConfigMetadataProvider>,
    ) -> Result<()> {
        self.guarded("expands config provider", || {
            self.expands_config.insert(transport.key(), provider);
        })
    }

    /// Handle new client connections on `transport`.
    pub fn do_on_client_connect<F, Fut>(&self, transport: &Transport, handler: F) -> Result<()>
    where
        F: Fn(Arc<dyn ClientConnection>, Arc<dyn GatewayContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let handler: ConnectionHandler =
            Arc::new(move |connection, context| handler(connection, context).boxed());
        self.guarded("connection handler", || {
            self.connection_handlers.insert(transport.key(), handler);
        })
    }

    pub fn add_features(&self, transport: &Transport, features: LazyCapability<Vec<Feature>>) -> Result<()> {
        self.guarded("features", || {
            self.features.insert(transport.key(), features);
        })
    }

    /// Whether `transport` has an entry for `kind`. Nothing is resolved.
    pub fn supports(&self, transport: &Transport, kind: CapabilityKind) -> bool {
        let id = transport.id.as_str();
        match kind {
            CapabilityKind::MessageCodec => self.codecs.contains_key(id),
            CapabilityKind::Authenticator => self.authenticators.contains_key(id),
            CapabilityKind::ConfigMetadata => self.config_metadata.contains_key(id),
            CapabilityKind::DefaultMetadata => self.default_metadata.contains_key(id),
            CapabilityKind::ExpandsConfigMetadata => self.expands_config.contains_key(id),
            CapabilityKind::ConnectionHandler => self.connection_handlers.contains_key(id),
            CapabilityKind::Features => self.features.contains_key(id),
        }
    }

    /// Every capability kind registered for `transport`.
    pub fn capabilities(&self, transport: &Transport) -> Vec<CapabilityKind> {
        CapabilityKind::ALL
            .into_iter()
            .filter(|kind| self.supports(transport, *kind))
            .collect()
    }

    // ========================================================================
    // Protocol-wide settings
    // ========================================================================

    pub fn set_init_config_metadata(&self, metadata: ConfigMetadata) -> Result<()> {
        self.guarded("init config metadata", || {
            *self.init_config_metadata.write() = Some(metadata);
        })
    }

    /// Replace the primary metadata codec.
    pub fn set_metadata_codec(&self, codec: Arc<dyn DeviceMetadataCodec>) -> Result<()> {
        self.guarded("metadata codec", || {
            *self.metadata_codec.write() = codec;
        })
    }

    /// Append a secondary metadata codec.
    pub fn add_metadata_codec(&self, codec: Arc<dyn DeviceMetadataCodec>) -> Result<()> {
        self.guarded("metadata codec", || {
            self.extra_metadata_codecs.write().push(codec);
        })
    }

    /// The primary metadata codec followed by the secondary ones.
    pub fn metadata_codecs(&self) -> Vec<Arc<dyn DeviceMetadataCodec>> {
        let mut codecs = vec![Arc::clone(&*self.metadata_codec.read())];
        codecs.extend(self.extra_metadata_codecs.read().iter().cloned());
        codecs
    }

    pub fn set_state_checker(&self, checker: Arc<dyn DeviceStateChecker>) -> Result<()> {
        self.guarded("state checker", || {
            *self.state_checker.write() = Some(checker);
        })
    }

    /// Append an outbound interceptor; earlier ones run first.
    pub fn add_message_sender_interceptor(
        &self,
        interceptor: Arc<dyn DeviceMessageSenderInterceptor>,
    ) -> Result<()> {
        self.guarded("sender interceptor", || self.interceptors.add(interceptor))
    }

    // ========================================================================
    // Lifecycle hooks
    // ========================================================================

    fn set_device_hook<F, Fut>(&self, event: DeviceEvent, hook: F) -> Result<()>
    where
        F: Fn(Arc<dyn DeviceOperator>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let hook = device_hook(hook);
        self.guarded("device hook", || self.hooks.set_device_hook(event, hook))
    }

    fn set_product_hook<F, Fut>(&self, event: ProductEvent, hook: F) -> Result<()>
    where
        F: Fn(Arc<dyn ProductOperator>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let hook = product_hook(hook);
        self.guarded("product hook", || self.hooks.set_product_hook(event, hook))
    }

    pub fn do_on_device_register<F, Fut>(&self, hook: F) -> Result<()>
    where
        F: Fn(Arc<dyn DeviceOperator>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.set_device_hook(DeviceEvent::Register, hook)
    }

    pub fn do_on_device_unregister<F, Fut>(&self, hook: F) -> Result<()>
    where
        F: Fn(Arc<dyn DeviceOperator>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.set_device_hook(DeviceEvent::UnRegister, hook)
    }

    pub fn do_on_device_metadata_changed<F, Fut>(&self, hook: F) -> Result<()>
    where
        F: Fn(Arc<dyn DeviceOperator>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.set_device_hook(DeviceEvent::MetadataChanged, hook)
    }

    pub fn do_on_product_register<F, Fut>(&self, hook: F) -> Result<()>
    where
        F: Fn(Arc<dyn ProductOperator>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.set_product_hook(ProductEvent::Register, hook)
    }

    pub fn do_on_product_unregister<F, Fut>(&self, hook: F) -> Result<()>
    where
        F: Fn(Arc<dyn ProductOperator>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.set_product_hook(ProductEvent::UnRegister, hook)
    }

    pub fn do_on_product_metadata_changed<F, Fut>(&self, hook: F) -> Result<()>
    where
        F: Fn(Arc<dyn ProductOperator>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.set_product_hook(ProductEvent::MetadataChanged, hook)
    }

    /// Run `callback` with the configuration passed to `init`.
    pub fn do_on_init<F>(&self, callback: F) -> Result<()>
    where
        F: Fn(&Configuration) + Send + Sync + 'static,
    {
        self.guarded("init callback", || self.hooks.add_init(Arc::new(callback)))
    }

    /// Run `disposer` when the protocol is disposed. On an already disposed
    /// protocol it runs immediately.
    pub fn do_on_dispose<F>(&self, disposer: F)
    where
        F: FnOnce() + Send + 'static,
    {
        {
            let _gate = self.gate.read();
            if !self.disposed.load(Ordering::Acquire) {
                self.hooks.add_disposer(Box::new(disposer));
                return;
            }
        }
        tracing::debug!(
            "Protocol '{}' already disposed, running disposer now",
            self.descriptor.id
        );
        disposer();
    }
}

#[async_trait]
impl ProtocolSupport for CapabilityRegistry {
    fn id(&self) -> &str {
        &self.descriptor.id
    }

    fn name(&self) -> &str {
        &self.descriptor.name
    }

    fn description(&self) -> Option<&str> {
        self.descriptor.description.as_deref()
    }

    async fn supported_transports(&self) -> Vec<Transport> {
        let producers: Vec<CodecCapability> =
            self.codecs.iter().map(|entry| entry.value().clone()).collect();
        let codecs = join_all(producers.iter().map(LazyCapability::resolve)).await;

        let mut seen = HashSet::new();
        codecs
            .into_iter()
            .flatten()
            .map(|codec| codec.supported_transport())
            .filter(|transport| seen.insert(transport.key()))
            .collect()
    }

    async fn message_codec(&self, transport: &Transport) -> Option<Arc<dyn DeviceMessageCodec>> {
        match lookup(&self.codecs, transport) {
            Some(codec) => codec.resolve().await,
            None => None,
        }
    }

    fn sender_interceptor(&self) -> Arc<dyn DeviceMessageSenderInterceptor> {
        self.interceptors.resolve()
    }

    async fn authenticate(
        &self,
        request: &AuthenticationRequest,
        context: &AuthContext,
    ) -> Result<AuthenticationResponse> {
        let Some(authenticator) = lookup(&self.authenticators, &request.transport) else {
            tracing::warn!(
                "Protocol '{}' has no authenticator for transport {}",
                self.descriptor.id,
                request.transport
            );
            return Err(ProtocolError::UnsupportedAuthentication {
                transport: request.transport.id.clone(),
                request: request.to_string(),
            });
        };

        let response = authenticator.authenticate(request, context).await?;
        Ok(response.unwrap_or_else(AuthenticationResponse::unavailable))
    }

    async fn config_metadata(&self, transport: &Transport) -> Option<ConfigMetadata> {
        match lookup(&self.config_metadata, transport) {
            Some(metadata) => metadata.resolve().await,
            None => None,
        }
    }

    fn init_config_metadata(&self) -> Option<ConfigMetadata> {
        self.init_config_metadata.read().clone()
    }

    async fn default_metadata(&self, transport: &Transport) -> Option<DeviceMetadata> {
        match lookup(&self.default_metadata, transport) {
            Some(metadata) => metadata.resolve().await,
            None => None,
        }
    }

    async fn metadata_expands_config(
        &self,
        transport: &Transport,
        metadata_type: DeviceMetadataType,
        metadata_id: &str,
        data_type_id: &str,
    ) -> Vec<ConfigMetadata> {
        match lookup(&self.expands_config, transport) {
            Some(provider) => {
                provider
                    .config_metadata(metadata_type, metadata_id, data_type_id)
                    .await
            }
            None => Vec::new(),
        }
    }

    async fn features(&self, transport: &Transport) -> Vec<Feature> {
        match lookup(&self.features, transport) {
            Some(features) => features.resolve().await.unwrap_or_default(),
            None => Vec::new(),
        }
    }

    fn metadata_codec(&self) -> Arc<dyn DeviceMetadataCodec> {
        Arc::clone(&*self.metadata_codec.read())
    }

    fn state_checker(&self) -> Option<Arc<dyn DeviceStateChecker>> {
        self.state_checker.read().clone()
    }

    async fn on_device_register(&self, device: Arc<dyn DeviceOperator>) -> Result<()> {
        self.hooks.fire_device(DeviceEvent::Register, device).await
    }

    async fn on_device_unregister(&self, device: Arc<dyn DeviceOperator>) -> Result<()> {
        self.hooks.fire_device(DeviceEvent::UnRegister, device).await
    }

    async fn on_device_metadata_changed(&self, device: Arc<dyn DeviceOperator>) -> Result<()> {
        self.hooks.fire_device(DeviceEvent::MetadataChanged, device).await
    }

    async fn on_product_register(&self, product: Arc<dyn ProductOperator>) -> Result<()> {
        self.hooks.fire_product(ProductEvent::Register, product).await
    }

    async fn on_product_unregister(&self, product: Arc<dyn ProductOperator>) -> Result<()> {
        self.hooks.fire_product(ProductEvent::UnRegister, product).await
    }

    async fn on_product_metadata_changed(&self, product: Arc<dyn ProductOperator>) -> Result<()> {
        self.hooks.fire_product(ProductEvent::MetadataChanged, product).await
    }

    async fn on_client_connect(
        &self,
        transport: &Transport,
        connection: Arc<dyn ClientConnection>,
        context: Arc<dyn GatewayContext>,
    ) -> Result<()> {
        match lookup(&self.connection_handlers, transport) {
            Some(handler) => handler(connection, context).await,
            None => Ok(()),
        }
    }

    fn init(&self, config: &Configuration) {
        tracing::debug!("Initializing protocol '{}'", self.descriptor.id);
        self.hooks.run_init(config);
    }

    fn dispose(&self) {
        {
            let _gate = self.gate.write();
            if self
                .disposed
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                return;
            }

            self.codecs.clear();
            self.authenticators.clear();
            self.config_metadata.clear();
            self.default_metadata.clear();
            self.expands_config.clear();
            self.connection_handlers.clear();
            self.features.clear();
        }

        let disposers = self.hooks.run_disposers();
        tracing::info!(
            "Disposed protocol '{}' ({} disposer(s) run)",
            self.descriptor.id,
            disposers
        );
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}
