//! Protocol Registry Tests
//!
//! Tests hosting several protocol adapters side by side.

use async_trait::async_trait;
use neomind_protocol::prelude::*;
use neomind_protocol::ProtocolDescriptor;
use std::sync::atomic::{AtomicUsize, Ordering};

struct EchoCodec(DefaultTransport);

#[async_trait]
impl DeviceMessageCodec for EchoCodec {
    fn supported_transport(&self) -> Transport {
        self.0.into()
    }

    async fn decode(&self, _context: MessageDecodeContext) -> Result<Vec<DeviceMessage>> {
        Ok(Vec::new())
    }

    async fn encode(&self, _message: &DeviceMessage) -> Result<EncodedMessage> {
        Ok(EncodedMessage::new(Vec::new()))
    }
}

fn protocol_from_json(source: &str) -> CapabilityRegistry {
    let descriptor = ProtocolDescriptor::from_json_str(source).unwrap();
    CapabilityRegistry::from_descriptor(descriptor)
}

#[tokio::test]
async fn test_registry_hosts_multiple_protocols() {
    let registry = ProtocolRegistry::new();

    let mqtt = protocol_from_json(r#"{"id": "mqtt-json", "name": "MQTT JSON"}"#);
    mqtt.add_message_codec_support(Arc::new(EchoCodec(DefaultTransport::Mqtt)))
        .unwrap();
    let coap = protocol_from_json(
        r#"{"id": "coap-cbor", "name": "CoAP CBOR", "description": "Constrained devices"}"#,
    );
    coap.add_message_codec_support(Arc::new(EchoCodec(DefaultTransport::Coap)))
        .unwrap();

    registry.register(Arc::new(mqtt), &Configuration::new()).unwrap();
    registry.register(Arc::new(coap), &Configuration::new()).unwrap();

    let coap = registry.get("coap-cbor").unwrap();
    assert_eq!(coap.description(), Some("Constrained devices"));
    assert_eq!(
        coap.supported_transports().await,
        vec![Transport::from(DefaultTransport::Coap)]
    );
    assert!(registry
        .get("mqtt-json")
        .unwrap()
        .message_codec(&DefaultTransport::Coap.into())
        .await
        .is_none());
}

#[tokio::test]
async fn test_register_runs_init_and_unregister_disposes() {
    let registry = ProtocolRegistry::new();
    let protocol = CapabilityRegistry::new("modbus", "Modbus");
    let inits = Arc::new(AtomicUsize::new(0));
    let disposals = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&inits);
    protocol
        .do_on_init(move |config| {
            assert_eq!(config.get("pollInterval"), Some(&serde_json::json!(500)));
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    let counter = Arc::clone(&disposals);
    protocol.do_on_dispose(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let mut config = Configuration::new();
    config.insert("pollInterval".to_string(), serde_json::json!(500));
    registry.register(Arc::new(protocol), &config).unwrap();
    assert_eq!(inits.load(Ordering::SeqCst), 1);

    let removed = registry.unregister("modbus").unwrap();
    assert!(removed.is_disposed());
    removed.dispose();
    assert_eq!(disposals.load(Ordering::SeqCst), 1);
}
