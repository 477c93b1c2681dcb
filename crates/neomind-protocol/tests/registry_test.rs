//! Capability Registry Tests
//!
//! Tests the per-transport capability tables including:
//! - Codec lookup and supported transports
//! - Authentication outcomes
//! - Lifecycle dispatch and connection handlers
//! - Disposal

use async_trait::async_trait;
use neomind_protocol::metadata::{ConfigMetadata, DeviceMetadataType, ExpandsConfigMetadataProvider};
use neomind_protocol::prelude::*;
use neomind_protocol::ErrorCode;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Codec that reads and writes messages as JSON documents.
struct JsonCodec {
    transport: DefaultTransport,
}

#[async_trait]
impl DeviceMessageCodec for JsonCodec {
    fn supported_transport(&self) -> Transport {
        self.transport.into()
    }

    async fn decode(&self, context: MessageDecodeContext) -> Result<Vec<DeviceMessage>> {
        let value: serde_json::Value = serde_json::from_slice(&context.payload)?;
        Ok(vec![DeviceMessage::from_json(value)?])
    }

    async fn encode(&self, message: &DeviceMessage) -> Result<EncodedMessage> {
        Ok(EncodedMessage::new(serde_json::to_vec(&message.to_json()?)?))
    }
}

struct FixedAuthenticator(Option<AuthenticationResponse>);

#[async_trait]
impl Authenticator for FixedAuthenticator {
    async fn authenticate(
        &self,
        _request: &AuthenticationRequest,
        _context: &AuthContext,
    ) -> Result<Option<AuthenticationResponse>> {
        Ok(self.0.clone())
    }
}

struct FailingAuthenticator;

#[async_trait]
impl Authenticator for FailingAuthenticator {
    async fn authenticate(
        &self,
        _request: &AuthenticationRequest,
        _context: &AuthContext,
    ) -> Result<Option<AuthenticationResponse>> {
        Err(anyhow::anyhow!("credential store offline").into())
    }
}

struct Device(&'static str);

impl DeviceOperator for Device {
    fn device_id(&self) -> &str {
        self.0
    }
}

struct Product(&'static str);

impl ProductOperator for Product {
    fn product_id(&self) -> &str {
        self.0
    }
}

struct Connection;

impl ClientConnection for Connection {
    fn connection_id(&self) -> &str {
        "conn-1"
    }

    fn transport(&self) -> Transport {
        DefaultTransport::Tcp.into()
    }
}

struct Gateway;

impl GatewayContext for Gateway {
    fn gateway_id(&self) -> &str {
        "gw-1"
    }
}

struct ModbusExpands;

#[async_trait]
impl ExpandsConfigMetadataProvider for ModbusExpands {
    async fn config_metadata(
        &self,
        metadata_type: DeviceMetadataType,
        metadata_id: &str,
        _data_type_id: &str,
    ) -> Vec<ConfigMetadata> {
        if metadata_type == DeviceMetadataType::Property {
            vec![ConfigMetadata::new(format!("register:{}", metadata_id))]
        } else {
            Vec::new()
        }
    }
}

fn anonymous(transport: DefaultTransport) -> AuthenticationRequest {
    AuthenticationRequest::new(transport.into(), Credentials::Anonymous)
}

fn device_context() -> AuthContext {
    AuthContext::Device(Arc::new(Device("d1")))
}

#[tokio::test]
async fn test_unregistered_transport_has_no_codec() {
    let protocol = CapabilityRegistry::new("json", "JSON");
    protocol
        .add_message_codec_support(Arc::new(JsonCodec {
            transport: DefaultTransport::Mqtt,
        }))
        .unwrap();

    let mqtt: Transport = DefaultTransport::Mqtt.into();
    let coap: Transport = DefaultTransport::Coap.into();
    assert!(protocol.message_codec(&mqtt).await.is_some());
    assert!(protocol.message_codec(&coap).await.is_none());

    let transports = protocol.supported_transports().await;
    assert_eq!(transports, vec![mqtt]);
    assert!(!transports.contains(&coap));
}

#[tokio::test]
async fn test_supported_transports_deduplicated() {
    let protocol = CapabilityRegistry::new("json", "JSON");
    let codec: Arc<dyn DeviceMessageCodec> = Arc::new(JsonCodec {
        transport: DefaultTransport::Mqtt,
    });
    protocol.add_message_codec_support(Arc::clone(&codec)).unwrap();
    // Registered under a second key but reporting the same transport
    protocol
        .add_message_codec(&Transport::new("MQTT_ALIAS"), LazyCapability::fixed(codec))
        .unwrap();
    protocol
        .add_message_codec_support(Arc::new(JsonCodec {
            transport: DefaultTransport::Http,
        }))
        .unwrap();
    protocol
        .add_message_codec(&DefaultTransport::Udp.into(), LazyCapability::absent())
        .unwrap();

    let mut ids: Vec<String> = protocol
        .supported_transports()
        .await
        .into_iter()
        .map(|t| t.id)
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["HTTP", "MQTT"]);
}

#[tokio::test]
async fn test_codec_round_trip_through_registry() {
    let protocol = CapabilityRegistry::new("json", "JSON");
    protocol
        .add_message_codec_support(Arc::new(JsonCodec {
            transport: DefaultTransport::Mqtt,
        }))
        .unwrap();

    let codec = protocol
        .message_codec(&DefaultTransport::Mqtt.into())
        .await
        .unwrap();
    let message = DeviceMessage::ReadProperty(neomind_protocol::message::ReadPropertyMessage::new(
        "sensor-1",
        vec!["temperature".to_string()],
    ));

    let encoded = codec.encode(&message).await.unwrap();
    let decoded = codec
        .decode(MessageDecodeContext::new(DefaultTransport::Mqtt.into(), encoded.payload))
        .await
        .unwrap();
    assert_eq!(decoded, vec![message]);
}

#[tokio::test]
async fn test_authenticate_without_authenticator() {
    let protocol = CapabilityRegistry::new("json", "JSON");
    let err = protocol
        .authenticate(&anonymous(DefaultTransport::Coap), &device_context())
        .await
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::UnsupportedMessage);
    match err {
        ProtocolError::UnsupportedAuthentication { transport, request } => {
            assert_eq!(transport, "CoAP");
            assert!(request.contains("Anonymous"));
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn test_authenticate_without_result() {
    let protocol = CapabilityRegistry::new("json", "JSON");
    protocol
        .add_authenticator(&DefaultTransport::Mqtt.into(), Arc::new(FixedAuthenticator(None)))
        .unwrap();

    let response = protocol
        .authenticate(&anonymous(DefaultTransport::Mqtt), &device_context())
        .await
        .unwrap();
    assert!(!response.success);
    assert_eq!(response.code, 400);
    assert_eq!(response.message.as_deref(), Some("authentication result unavailable"));
}

#[tokio::test]
async fn test_authenticate_declined_and_accepted() {
    let protocol = CapabilityRegistry::new("json", "JSON");
    protocol
        .add_authenticator(
            &DefaultTransport::Mqtt.into(),
            Arc::new(FixedAuthenticator(Some(AuthenticationResponse::error(401, "bad password")))),
        )
        .unwrap();
    protocol
        .add_authenticator(
            &DefaultTransport::Http.into(),
            Arc::new(FixedAuthenticator(Some(AuthenticationResponse::success("d1")))),
        )
        .unwrap();

    let declined = protocol
        .authenticate(&anonymous(DefaultTransport::Mqtt), &device_context())
        .await
        .unwrap();
    assert!(!declined.success);
    assert_eq!(declined.code, 401);

    let accepted = protocol
        .authenticate(&anonymous(DefaultTransport::Http), &device_context())
        .await
        .unwrap();
    assert!(accepted.success);
    assert_eq!(accepted.device_id.as_deref(), Some("d1"));
}

#[tokio::test]
async fn test_authenticator_error_propagates() {
    let protocol = CapabilityRegistry::new("json", "JSON");
    protocol
        .add_authenticator(&DefaultTransport::Mqtt.into(), Arc::new(FailingAuthenticator))
        .unwrap();

    let err = protocol
        .authenticate(&anonymous(DefaultTransport::Mqtt), &device_context())
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::SystemError);
    assert!(err.to_string().contains("credential store offline"));
}

#[tokio::test]
async fn test_metadata_lookups() {
    let protocol = CapabilityRegistry::new("modbus", "Modbus");
    let tcp: Transport = DefaultTransport::Tcp.into();
    protocol
        .add_default_metadata(
            &tcp,
            LazyCapability::fixed(DeviceMetadata::new("modbus-device", "Modbus Device")),
        )
        .unwrap();
    protocol
        .add_config_metadata(&tcp, LazyCapability::fixed(ConfigMetadata::new("TCP settings")))
        .unwrap();
    protocol.set_expands_config_metadata(&tcp, Arc::new(ModbusExpands)).unwrap();
    protocol
        .set_init_config_metadata(ConfigMetadata::new("Modbus init"))
        .unwrap();

    assert_eq!(
        protocol.default_metadata(&tcp).await.unwrap().id,
        "modbus-device"
    );
    assert_eq!(protocol.config_metadata(&tcp).await.unwrap().name, "TCP settings");
    assert_eq!(protocol.init_config_metadata().unwrap().name, "Modbus init");

    let expands = protocol
        .metadata_expands_config(&tcp, DeviceMetadataType::Property, "temp", "float")
        .await;
    assert_eq!(expands, vec![ConfigMetadata::new("register:temp")]);

    let udp: Transport = DefaultTransport::Udp.into();
    assert!(protocol.default_metadata(&udp).await.is_none());
    assert!(protocol
        .metadata_expands_config(&udp, DeviceMetadataType::Property, "temp", "float")
        .await
        .is_empty());
}

#[tokio::test]
async fn test_metadata_codecs() {
    let protocol = CapabilityRegistry::new("json", "JSON");
    protocol
        .add_metadata_codec(Arc::new(neomind_protocol::JsonMetadataCodec))
        .unwrap();

    let codecs = protocol.metadata_codecs();
    assert_eq!(codecs.len(), 2);
    assert_eq!(codecs[0].id(), protocol.metadata_codec().id());
}

#[tokio::test]
async fn test_lifecycle_without_hooks_is_noop() {
    let protocol = CapabilityRegistry::new("json", "JSON");

    protocol.on_device_register(Arc::new(Device("d1"))).await.unwrap();
    protocol.on_device_unregister(Arc::new(Device("d1"))).await.unwrap();
    protocol.on_device_metadata_changed(Arc::new(Device("d1"))).await.unwrap();
    protocol.on_product_register(Arc::new(Product("p1"))).await.unwrap();
    protocol.on_product_unregister(Arc::new(Product("p1"))).await.unwrap();
    protocol.on_product_metadata_changed(Arc::new(Product("p1"))).await.unwrap();
    protocol
        .on_client_connect(&DefaultTransport::Tcp.into(), Arc::new(Connection), Arc::new(Gateway))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_lifecycle_hooks_dispatch() {
    let protocol = CapabilityRegistry::new("json", "JSON");
    let devices = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let products = Arc::new(AtomicUsize::new(0));

    let seen = Arc::clone(&devices);
    protocol
        .do_on_device_register(move |device| {
            seen.lock().push(device.device_id().to_string());
            async { Ok(()) }
        })
        .unwrap();
    let counter = Arc::clone(&products);
    protocol
        .do_on_product_metadata_changed(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        })
        .unwrap();

    protocol.on_device_register(Arc::new(Device("d1"))).await.unwrap();
    protocol.on_device_register(Arc::new(Device("d2"))).await.unwrap();
    // Other device events remain unset
    protocol.on_device_unregister(Arc::new(Device("d1"))).await.unwrap();
    protocol.on_product_metadata_changed(Arc::new(Product("p1"))).await.unwrap();

    assert_eq!(*devices.lock(), vec!["d1", "d2"]);
    assert_eq!(products.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_client_connect_handler() {
    let protocol = CapabilityRegistry::new("tcp", "TCP");
    let tcp: Transport = DefaultTransport::Tcp.into();
    let connections = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&connections);
    protocol
        .do_on_client_connect(&tcp, move |connection, gateway| {
            assert_eq!(connection.connection_id(), "conn-1");
            assert_eq!(gateway.gateway_id(), "gw-1");
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        })
        .unwrap();

    protocol
        .on_client_connect(&tcp, Arc::new(Connection), Arc::new(Gateway))
        .await
        .unwrap();
    protocol
        .on_client_connect(&DefaultTransport::Udp.into(), Arc::new(Connection), Arc::new(Gateway))
        .await
        .unwrap();

    assert_eq!(connections.load(Ordering::SeqCst), 1);
    assert!(protocol.supports(&tcp, CapabilityKind::ConnectionHandler));
}

#[tokio::test]
async fn test_init_runs_callbacks_in_order() {
    let protocol = CapabilityRegistry::new("json", "JSON");
    let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

    for name in ["first", "second", "third"] {
        let order = Arc::clone(&order);
        protocol
            .do_on_init(move |config| {
                let host = config.get("host").and_then(|v| v.as_str()).unwrap_or_default();
                order.lock().push(format!("{}:{}", name, host));
            })
            .unwrap();
    }

    let mut config = Configuration::new();
    config.insert("host".to_string(), serde_json::json!("10.0.0.1"));
    protocol.init(&config);

    assert_eq!(
        *order.lock(),
        vec!["first:10.0.0.1", "second:10.0.0.1", "third:10.0.0.1"]
    );
}

#[tokio::test]
async fn test_dispose_twice_runs_disposers_once() {
    let protocol = CapabilityRegistry::new("json", "JSON");
    let mqtt: Transport = DefaultTransport::Mqtt.into();
    protocol
        .add_message_codec_support(Arc::new(JsonCodec {
            transport: DefaultTransport::Mqtt,
        }))
        .unwrap();
    protocol
        .add_authenticator(&mqtt, Arc::new(FixedAuthenticator(None)))
        .unwrap();

    let runs = Arc::new(AtomicUsize::new(0));
    for _ in 0..2 {
        let counter = Arc::clone(&runs);
        protocol.do_on_dispose(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
    }

    protocol.dispose();
    protocol.dispose();

    assert!(protocol.is_disposed());
    assert_eq!(runs.load(Ordering::SeqCst), 2);
    assert!(protocol.capabilities(&mqtt).is_empty());
    assert!(protocol.supported_transports().await.is_empty());
}

#[tokio::test]
async fn test_register_after_dispose_rejected() {
    let protocol = CapabilityRegistry::new("json", "JSON");
    protocol.dispose();

    let err = protocol
        .add_message_codec_support(Arc::new(JsonCodec {
            transport: DefaultTransport::Mqtt,
        }))
        .unwrap_err();
    assert!(matches!(err, ProtocolError::Disposed(id) if id == "json"));
    assert!(protocol.supported_transports().await.is_empty());

    // Late disposers still run, immediately
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&runs);
    protocol.do_on_dispose(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_concurrent_dispose() {
    let protocol = Arc::new(CapabilityRegistry::new("json", "JSON"));
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&runs);
    protocol.do_on_dispose(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let protocol = Arc::clone(&protocol);
            tokio::spawn(async move { protocol.dispose() })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

struct AlwaysOnline;

#[async_trait]
impl neomind_protocol::operator::DeviceStateChecker for AlwaysOnline {
    async fn check_state(
        &self,
        _device: Arc<dyn DeviceOperator>,
    ) -> Option<neomind_protocol::operator::DeviceState> {
        Some(neomind_protocol::operator::DeviceState::Online)
    }
}

#[tokio::test]
async fn test_state_checker() {
    let protocol = CapabilityRegistry::new("json", "JSON");
    assert!(protocol.state_checker().is_none());

    protocol.set_state_checker(Arc::new(AlwaysOnline)).unwrap();
    let state = protocol
        .state_checker()
        .unwrap()
        .check_state(Arc::new(Device("d1")))
        .await;
    assert_eq!(state, Some(neomind_protocol::operator::DeviceState::Online));
}
