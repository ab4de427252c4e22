//! MQTT client implementation for the bridge
//!
//! This module separates pure connection handling from I/O:
//!
//! - [`connection`] - Pure connection state, endpoint parsing and option building
//! - [`client`] - Impure I/O operations over the rumqttc client
//!
//! # Usage
//!
//! ```rust,no_run
//! use lora_sink::config::MqttSection;
//! use lora_sink::transport::mqtt::MqttBrokerClient;
//! use lora_sink::transport::{BrokerClient, ClientCredentials};
//!
//! # tokio_test_block_on(async {
//! let config = MqttSection::new("mqtt://localhost:1883");
//! let mut client = MqttBrokerClient::new(&config)?;
//! client.connect(&ClientCredentials::anonymous("lora-sink")).await?;
//! client.publish("sensor/Temp", b"21.20", true).await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Runtime::new().unwrap().block_on(f)
//! # }
//! ```

pub mod client;
pub mod connection;

// Re-export public types for convenience
pub use client::MqttBrokerClient;
pub use connection::{configure_mqtt_options, BrokerEndpoint, ConnectionState, MqttError};
