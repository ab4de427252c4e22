//! Broker session: the connectivity state machine around a [`BrokerClient`]
//!
//! States move `Disconnected -> Connecting -> Connected`, fall back to
//! `Disconnected` on any detected transport failure, and stay in `Connecting`
//! while failed attempts are retried after a fixed backoff. Publishing is only
//! ever forwarded to the client in the `Connected` state.

use super::mqtt::ConnectionState;
use super::{BrokerClient, ClientCredentials};
use crate::config::{MqttSection, ReconnectMode};
use crate::observability::metrics;
use crate::telemetry::PublishRequest;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn, Instrument};

/// Retry behaviour after a failed connection attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectSettings {
    pub backoff: Duration,
    pub mode: ReconnectMode,
}

impl ReconnectSettings {
    pub fn from_config(config: &MqttSection) -> Self {
        Self {
            backoff: config.reconnect_backoff(),
            mode: config.reconnect_mode,
        }
    }
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            backoff: Duration::from_secs(5),
            mode: ReconnectMode::Timer,
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Not connected - current state: {state}")]
    NotConnected { state: ConnectionState },
    #[error("Publish to {topic} failed")]
    PublishFailed {
        topic: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Connectivity state machine that exclusively owns the broker client
pub struct BrokerSession<C: BrokerClient> {
    client: C,
    credentials: ClientCredentials,
    settings: ReconnectSettings,
    state: ConnectionState,
    next_attempt_at: Option<Instant>,
    failed_attempts: u32,
}

impl<C: BrokerClient> BrokerSession<C> {
    pub fn new(client: C, credentials: ClientCredentials, settings: ReconnectSettings) -> Self {
        Self {
            client,
            credentials,
            settings,
            state: ConnectionState::Disconnected,
            next_attempt_at: None,
            failed_attempts: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Consecutive failed attempts since the last successful connect
    pub fn failed_attempts(&self) -> u32 {
        self.failed_attempts
    }

    /// Make sure the session is connected, attempting a connect if needed
    ///
    /// Returns immediately when already connected. In [`ReconnectMode::Timer`]
    /// at most one attempt is made per call and none before the backoff after
    /// a failure has elapsed. In [`ReconnectMode::Blocking`] the call retries
    /// in place until the broker accepts the connection.
    pub async fn ensure_connected(&mut self) -> bool {
        if self.state == ConnectionState::Connected {
            if self.client.is_connected() {
                return true;
            }
            self.mark_disconnected("client reported the connection closed");
        }

        match self.settings.mode {
            ReconnectMode::Timer => {
                if let Some(at) = self.next_attempt_at {
                    if Instant::now() < at {
                        return false;
                    }
                }
                self.attempt_connect().await
            }
            ReconnectMode::Blocking => loop {
                if self.attempt_connect().await {
                    return true;
                }
                sleep(self.settings.backoff).await;
            },
        }
    }

    async fn attempt_connect(&mut self) -> bool {
        self.transition(ConnectionState::Connecting);
        metrics().connection_attempt();
        info!(
            client_id = %self.credentials.client_id,
            attempt = self.failed_attempts + 1,
            "Attempting MQTT connection"
        );

        let span = crate::mqtt_span!(operation = "connect", client_id = %self.credentials.client_id);
        match self.client.connect(&self.credentials).instrument(span).await {
            Ok(()) => {
                self.failed_attempts = 0;
                self.next_attempt_at = None;
                metrics().connection_established();
                self.transition(ConnectionState::Connected);
                true
            }
            Err(e) => {
                self.failed_attempts += 1;
                self.next_attempt_at = Some(Instant::now() + self.settings.backoff);
                warn!(
                    error = %e,
                    retry_in_secs = self.settings.backoff.as_secs_f64(),
                    "MQTT connection failed"
                );
                false
            }
        }
    }

    /// Publish a request; refused unless the session is connected
    pub async fn publish(&mut self, request: &PublishRequest) -> Result<(), SessionError> {
        if self.state != ConnectionState::Connected {
            return Err(SessionError::NotConnected { state: self.state });
        }

        self.client
            .publish(&request.topic, request.payload.as_bytes(), request.retain)
            .await
            .map_err(|e| SessionError::PublishFailed {
                topic: request.topic.clone(),
                source: Box::new(e),
            })
    }

    /// Let the client run keepalive and network I/O; call once per loop iteration
    pub async fn service_tick(&mut self) {
        if self.state != ConnectionState::Connected {
            return;
        }
        if let Err(e) = self.client.service().await {
            warn!(error = %e, "MQTT transport failure");
            self.mark_disconnected("transport failure");
        }
    }

    /// Disconnect politely if connected
    pub async fn shutdown(&mut self) {
        if self.state == ConnectionState::Connected {
            if let Err(e) = self.client.disconnect().await {
                error!("Error during MQTT disconnect: {}", e);
            }
        }
        self.transition(ConnectionState::Disconnected);
    }

    fn mark_disconnected(&mut self, reason: &str) {
        debug!("Marking session disconnected: {}", reason);
        metrics().connection_lost();
        // A lost connection is retried right away; backoff applies to failed attempts
        self.next_attempt_at = None;
        self.transition(ConnectionState::Disconnected);
    }

    fn transition(&mut self, to: ConnectionState) {
        if self.state != to {
            log_state_transition(self.state, to);
            self.state = to;
        }
    }
}

/// Log connection state transition (pure logging function)
pub fn log_state_transition(from: ConnectionState, to: ConnectionState) {
    match (from, to) {
        (ConnectionState::Connecting, ConnectionState::Connected) => {
            info!("Connected to MQTT broker");
        }
        (ConnectionState::Connected, ConnectionState::Disconnected) => {
            warn!("MQTT connection lost");
        }
        _ => {
            debug!("MQTT session state: {} -> {}", from, to);
        }
    }
}
