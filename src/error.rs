//! Top-level error type for the bridge
//!
//! Component errors convert into [`BridgeError`] with `?`. Only startup
//! failures (configuration, radio device) ever reach `main`; everything that
//! happens inside the loop is logged and retried instead.

use crate::config::ConfigError;
use crate::radio::RadioError;
use crate::transport::mqtt::MqttError;
use thiserror::Error;

/// Main error type for bridge operations
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Radio error: {0}")]
    Radio(#[from] RadioError),

    #[error("MQTT error: {0}")]
    Mqtt(#[from] MqttError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Startup failures the process cannot recover from without operator action
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BridgeError::Config(_) | BridgeError::Radio(_) | BridgeError::Io(_)
        )
    }
}

/// Result type for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_converts() {
        let err: BridgeError = ConfigError::InvalidConfig("bad".to_string()).into();
        assert!(matches!(err, BridgeError::Config(_)));
        assert_eq!(
            err.to_string(),
            "Configuration error: Invalid configuration: bad"
        );
    }

    #[test]
    fn test_radio_error_is_fatal() {
        let err: BridgeError = RadioError::Open {
            device: "/dev/ttyS0".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        }
        .into();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("/dev/ttyS0"));
    }

    #[test]
    fn test_mqtt_error_is_not_fatal() {
        let err: BridgeError = MqttError::InvalidBrokerUrl("ftp://broker".to_string()).into();
        assert!(!err.is_fatal());
        assert_eq!(err.to_string(), "MQTT error: Invalid broker URL: ftp://broker");
    }

    fn builds_client_from(url: &str) -> BridgeResult<()> {
        crate::transport::mqtt::MqttBrokerClient::new(&crate::config::MqttSection::new(url))?;
        Ok(())
    }

    #[test]
    fn test_question_mark_converts_mqtt_errors() {
        assert!(builds_client_from("mqtt://localhost:1883").is_ok());
        assert!(matches!(
            builds_client_from("not a url"),
            Err(BridgeError::Mqtt(MqttError::InvalidBrokerUrl(_)))
        ));
    }

    fn fails_with_io() -> BridgeResult<()> {
        std::fs::read_to_string("/nonexistent/lora-sink/error-test")?;
        Ok(())
    }

    #[test]
    fn test_question_mark_converts_io_errors() {
        assert!(matches!(fails_with_io(), Err(BridgeError::Io(_))));
    }
}
