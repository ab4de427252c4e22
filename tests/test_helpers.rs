//! Test helpers and utilities for integration tests

use lora_sink::bridge::{Bridge, BridgeSettings};
use lora_sink::config::ReconnectMode;
use lora_sink::testing::{MockBrokerClient, MockNetworkLink, MockRadio};
use lora_sink::transport::{BrokerSession, ClientCredentials, ReconnectSettings};
use lora_sink::TopicMapping;
use std::time::Duration;

/// The line the reference sensor node transmits
#[allow(dead_code)]
pub const REFERENCE_LINE: &str = "Temp=21.20 | Hum=37.10 | Soil=0.00 | Rain=0.00";

/// Minimal valid configuration file contents
#[allow(dead_code)]
pub const MINIMAL_CONFIG: &str = r#"
[radio]
device = "-"

[mqtt]
broker_url = "mqtt://localhost:1883"
client_id = "test-sink"
"#;

/// Mock collaborators plus the bridge that owns clones of them
#[allow(dead_code)]
pub struct TestBridge {
    pub broker: MockBrokerClient,
    pub radio: MockRadio,
    pub network: MockNetworkLink,
    pub bridge: Bridge<MockBrokerClient, MockRadio, MockNetworkLink>,
}

/// Build a bridge over mocks with a timer-gated, zero backoff session
#[allow(dead_code)]
pub fn test_bridge(broker: MockBrokerClient) -> TestBridge {
    test_bridge_with(broker, BridgeSettings::default(), Duration::ZERO)
}

#[allow(dead_code)]
pub fn test_bridge_with(
    broker: MockBrokerClient,
    settings: BridgeSettings,
    backoff: Duration,
) -> TestBridge {
    let radio = MockRadio::new();
    let network = MockNetworkLink::default();
    let session = BrokerSession::new(
        broker.clone(),
        ClientCredentials::anonymous("test-sink"),
        ReconnectSettings {
            backoff,
            mode: ReconnectMode::Timer,
        },
    );
    let bridge = Bridge::new(
        session,
        radio.clone(),
        network.clone(),
        TopicMapping::default(),
        BridgeSettings {
            poll_interval: Duration::from_millis(1),
            ..settings
        },
    );

    TestBridge {
        broker,
        radio,
        network,
        bridge,
    }
}
