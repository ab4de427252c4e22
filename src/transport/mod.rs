//! Transport layer for the broker side of the bridge
//!
//! This module provides the broker-client abstraction, its MQTT implementation
//! and the [`session::BrokerSession`] state machine that keeps it connected.

use crate::config::BridgeConfig;

pub mod mqtt;
pub mod session;

pub use session::{BrokerSession, ReconnectSettings, SessionError};

/// Identity presented to the broker on every connection attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientCredentials {
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl ClientCredentials {
    pub fn anonymous(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            username: None,
            password: None,
        }
    }

    /// Resolve the client id and env-held credentials from configuration
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self {
            client_id: config.mqtt.client_id.clone(),
            username: config.get_mqtt_username(),
            password: config.get_mqtt_password(),
        }
    }
}

/// Broker client trait
///
/// Abstracts the publish/subscribe client so the session and the bridge loop
/// can be driven by a mock in tests.
#[async_trait::async_trait]
pub trait BrokerClient: Send {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Open a fresh connection and wait for the broker to accept it
    async fn connect(&mut self, credentials: &ClientCredentials) -> Result<(), Self::Error>;

    /// Hand a message to the client's outgoing buffer
    async fn publish(&mut self, topic: &str, payload: &[u8], retain: bool)
        -> Result<(), Self::Error>;

    /// Drive keepalive and pending network I/O; errors mean the connection is gone
    async fn service(&mut self) -> Result<(), Self::Error>;

    /// Close the connection politely
    async fn disconnect(&mut self) -> Result<(), Self::Error>;

    /// Check if the client believes the connection is alive
    fn is_connected(&self) -> bool;
}
