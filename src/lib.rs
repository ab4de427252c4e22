//! LoRa sink - radio telemetry to MQTT bridge
//!
//! Receives sensor readings from a LoRa module as text lines such as
//! `Temp=21.20 | Hum=37.10 | Soil=0.00 | Rain=0.00`, decodes them into named
//! fields and republishes every known field as a retained MQTT message on its
//! own topic (`sensor/Temp`, `sensor/Hum`, ...).
//!
//! # Overview
//!
//! - [`telemetry`]: pure line decoding and field-to-topic routing
//! - [`transport`]: broker client abstraction, rumqttc client and the
//!   reconnecting broker session
//! - [`radio`] and [`network`]: the hardware-facing collaborators
//! - [`bridge`]: the cooperative loop that ties everything together
//!
//! # Quick Start
//!
//! ```rust
//! use lora_sink::telemetry::{publish_requests, TopicMapping};
//!
//! let requests = publish_requests(
//!     "Temp=21.20 | Hum=37.10 | Soil=0.00 | Rain=0.00",
//!     &TopicMapping::default(),
//! );
//!
//! assert_eq!(requests.len(), 4);
//! assert_eq!(requests[0].topic, "sensor/Temp");
//! assert_eq!(requests[0].payload, "21.20");
//! assert!(requests.iter().all(|r| r.retain));
//! ```

pub mod bridge;
pub mod config;
pub mod error;
pub mod network;
pub mod observability;
pub mod radio;
pub mod telemetry;
pub mod testing;
pub mod transport;

pub use bridge::{Bridge, BridgeSettings, LineOutcome, TickReport};
pub use config::{BridgeConfig, ConfigError};
pub use error::{BridgeError, BridgeResult};
pub use telemetry::{decode, route, DecodedField, DecodedReading, PublishRequest, TopicMapping};
pub use transport::mqtt::MqttBrokerClient;
pub use transport::{BrokerClient, BrokerSession};
