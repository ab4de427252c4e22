//! Integration Tests with Real MQTT Broker
//!
//! These tests need a broker listening on localhost:1883 (for example
//! `mosquitto -p 1883`) and are ignored by default:
//!
//! ```bash
//! cargo test --test test_mqtt_broker_integration -- --ignored
//! ```

use lora_sink::config::MqttSection;
use lora_sink::transport::mqtt::MqttBrokerClient;
use lora_sink::transport::{BrokerClient, ClientCredentials};
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use std::time::Duration;

const BROKER_URL: &str = "mqtt://localhost:1883";

fn unique_id(prefix: &str) -> String {
    format!("{prefix}-{}", std::process::id())
}

#[tokio::test]
#[ignore = "requires MQTT broker on localhost:1883"]
async fn test_connect_and_disconnect() {
    let mut client = MqttBrokerClient::new(&MqttSection::new(BROKER_URL)).unwrap();

    client
        .connect(&ClientCredentials::anonymous(unique_id("lora-sink-it")))
        .await
        .expect("Connection should succeed");
    assert!(client.is_connected());

    client.disconnect().await.unwrap();
    assert!(!client.is_connected());
}

#[tokio::test]
#[ignore = "requires MQTT broker on localhost:1883"]
async fn test_published_reading_is_retained() {
    let topic = format!("sensor/it-{}", std::process::id());

    let mut client = MqttBrokerClient::new(&MqttSection::new(BROKER_URL)).unwrap();
    client
        .connect(&ClientCredentials::anonymous(unique_id("lora-sink-pub")))
        .await
        .unwrap();
    client.publish(&topic, b"21.20", true).await.unwrap();
    for _ in 0..20 {
        client.service().await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    client.disconnect().await.unwrap();

    // A subscriber that connects afterwards still receives the last value
    let options = MqttOptions::new(unique_id("lora-sink-sub"), "localhost", 1883);
    let (subscriber, mut eventloop) = AsyncClient::new(options, 10);
    subscriber.subscribe(&topic, QoS::AtLeastOnce).await.unwrap();

    let received = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Ok(Event::Incoming(Packet::Publish(publish))) = eventloop.poll().await {
                return publish;
            }
        }
    })
    .await
    .expect("retained message should be delivered");

    assert_eq!(received.topic, topic);
    assert_eq!(&received.payload[..], b"21.20");
    assert!(received.retain);

    // Clear the retained value again
    subscriber.publish(&topic, QoS::AtLeastOnce, true, Vec::<u8>::new()).await.unwrap();
    let _ = tokio::time::timeout(Duration::from_millis(200), eventloop.poll()).await;
}
