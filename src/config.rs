//! Configuration system for the LoRa sink
//!
//! The whole configuration is one TOML file parsed once at startup into a
//! [`BridgeConfig`] value that is handed by reference to the session and the
//! bridge loop. Broker credentials are never stored in the file; the file names
//! the environment variables that hold them.

use crate::telemetry::{MappingError, TopicMapping, DEFAULT_TOPICS};
use crate::transport::mqtt::BrokerEndpoint;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Main bridge configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BridgeConfig {
    #[serde(default)]
    pub bridge: BridgeSection,
    pub radio: RadioSection,
    #[serde(default)]
    pub network: NetworkSection,
    pub mqtt: MqttSection,
    /// Field name to topic table; the four reference topics when absent
    #[serde(default = "default_topics")]
    pub topics: BTreeMap<String, String>,
}

/// Bridge loop behaviour
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BridgeSection {
    /// Lines must start with this text to be treated as telemetry
    #[serde(default = "default_telemetry_prefix")]
    pub telemetry_prefix: String,
    /// Pause between loop iterations in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// What to do with fields that carry an empty value
    #[serde(default)]
    pub empty_values: EmptyValuePolicy,
    /// Interval for the periodic counters log line (0 disables it)
    #[serde(default = "default_stats_interval_secs")]
    pub stats_interval_secs: u64,
}

impl Default for BridgeSection {
    fn default() -> Self {
        Self {
            telemetry_prefix: default_telemetry_prefix(),
            poll_interval_ms: default_poll_interval_ms(),
            empty_values: EmptyValuePolicy::default(),
            stats_interval_secs: default_stats_interval_secs(),
        }
    }
}

/// Handling of `name=` fields with no value
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmptyValuePolicy {
    /// Publish an empty retained payload
    #[default]
    Publish,
    /// Drop the field
    Skip,
}

/// Radio link section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RadioSection {
    /// Character device of the radio module, or `-` for stdin
    pub device: String,
    /// Frames buffered between the reader task and the bridge loop
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

/// Network link section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkSection {
    /// Interface whose carrier state is reported (e.g. `wlan0`)
    pub interface: Option<String>,
    /// How often the link state is re-read, in milliseconds
    #[serde(default = "default_link_check_interval_ms")]
    pub check_interval_ms: u64,
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self {
            interface: None,
            check_interval_ms: default_link_check_interval_ms(),
        }
    }
}

/// MQTT section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MqttSection {
    /// MQTT broker URL with protocol and port
    pub broker_url: String,
    /// Client identifier presented on CONNECT
    #[serde(default = "default_client_id")]
    pub client_id: String,
    /// Environment variable containing username
    pub username_env: Option<String>,
    /// Environment variable containing password
    pub password_env: Option<String>,
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Fixed delay between failed connection attempts
    #[serde(default = "default_reconnect_backoff_secs")]
    pub reconnect_backoff_secs: u64,
    #[serde(default)]
    pub reconnect_mode: ReconnectMode,
    /// Outgoing requests the client buffers before rejecting publishes
    #[serde(default = "default_outbound_capacity")]
    pub outbound_capacity: usize,
}

impl MqttSection {
    /// Minimal section pointing at a broker, defaults everywhere else
    pub fn new(broker_url: impl Into<String>) -> Self {
        Self {
            broker_url: broker_url.into(),
            client_id: default_client_id(),
            username_env: None,
            password_env: None,
            keep_alive_secs: default_keep_alive_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            reconnect_backoff_secs: default_reconnect_backoff_secs(),
            reconnect_mode: ReconnectMode::default(),
            outbound_capacity: default_outbound_capacity(),
        }
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_secs(self.reconnect_backoff_secs)
    }
}

/// How the broker session waits out a failed connection attempt
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReconnectMode {
    /// One attempt per tick at most, gated by the backoff timer
    #[default]
    Timer,
    /// Retry in place until connected, stalling the loop
    Blocking,
}

fn default_telemetry_prefix() -> String {
    "Temp=".to_string()
}

fn default_poll_interval_ms() -> u64 {
    10
}

fn default_stats_interval_secs() -> u64 {
    300
}

fn default_link_check_interval_ms() -> u64 {
    1000
}

fn default_channel_capacity() -> usize {
    64
}

fn default_client_id() -> String {
    "lora-sink".to_string()
}

fn default_keep_alive_secs() -> u64 {
    15
}

fn default_connect_timeout_secs() -> u64 {
    5
}

fn default_reconnect_backoff_secs() -> u64 {
    5
}

fn default_outbound_capacity() -> usize {
    16
}

fn default_topics() -> BTreeMap<String, String> {
    DEFAULT_TOPICS
        .iter()
        .map(|(field, topic)| (field.to_string(), topic.to_string()))
        .collect()
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Invalid topic mapping: {0}")]
    InvalidMapping(#[from] MappingError),
    #[error("Invalid topic for field '{field}': {reason}")]
    InvalidTopic { field: String, reason: String },
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl BridgeConfig {
    /// Load configuration from a TOML file and validate it
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: BridgeConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints that serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        BrokerEndpoint::parse(&self.mqtt.broker_url)
            .map_err(|e| ConfigError::InvalidConfig(e.to_string()))?;

        if self.mqtt.client_id.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "mqtt.client_id must not be empty".to_string(),
            ));
        }
        if self.mqtt.outbound_capacity == 0 {
            return Err(ConfigError::InvalidConfig(
                "mqtt.outbound_capacity must be greater than 0".to_string(),
            ));
        }
        if self.bridge.telemetry_prefix.is_empty() {
            return Err(ConfigError::InvalidConfig(
                "bridge.telemetry_prefix must not be empty".to_string(),
            ));
        }
        if self.radio.device.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "radio.device must not be empty".to_string(),
            ));
        }
        if self.radio.channel_capacity == 0 {
            return Err(ConfigError::InvalidConfig(
                "radio.channel_capacity must be greater than 0".to_string(),
            ));
        }

        for (field, topic) in &self.topics {
            validate_topic(field, topic)?;
        }
        self.topic_mapping()?;

        Ok(())
    }

    /// Build the routing table from the `[topics]` section
    pub fn topic_mapping(&self) -> Result<TopicMapping, ConfigError> {
        Ok(TopicMapping::new(
            self.topics
                .iter()
                .map(|(field, topic)| (field.clone(), topic.clone())),
        )?)
    }

    /// Helper method to get environment variable with consistent error handling
    fn get_env_var_optional(env_var_name: Option<&String>) -> Option<String> {
        env_var_name.and_then(|name| std::env::var(name).ok())
    }

    /// Get MQTT username from environment variable
    pub fn get_mqtt_username(&self) -> Option<String> {
        Self::get_env_var_optional(self.mqtt.username_env.as_ref())
    }

    /// Get MQTT password from environment variable
    pub fn get_mqtt_password(&self) -> Option<String> {
        Self::get_env_var_optional(self.mqtt.password_env.as_ref())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.bridge.poll_interval_ms)
    }

    pub fn link_check_interval(&self) -> Duration {
        Duration::from_millis(self.network.check_interval_ms)
    }

    /// Create a test configuration for unit testing
    #[cfg(test)]
    pub fn test_config() -> Self {
        let toml_content = r#"
[radio]
device = "-"

[mqtt]
broker_url = "mqtt://localhost:1883"
client_id = "test-sink"
"#;
        toml::from_str(toml_content).expect("Test config should parse")
    }
}

/// Publish topics must be non-empty and free of subscription wildcards
fn validate_topic(field: &str, topic: &str) -> Result<(), ConfigError> {
    let reason = if topic.is_empty() {
        Some("topic must not be empty")
    } else if topic.contains('+') || topic.contains('#') {
        Some("publish topics cannot contain '+' or '#'")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(ConfigError::InvalidTopic {
            field: field.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}
