//! Impure I/O operations for the MQTT client
//!
//! Once CONNACK arrives the rumqttc `EventLoop` is handed to a spawned
//! driver task that owns the socket. `EventLoop::poll` must not be cancelled
//! mid-write, so the bridge loop never polls it directly: publishes go
//! through the client's request channel and [`BrokerClient::service`] only
//! reads the loss state the driver reports.

use super::connection::{configure_mqtt_options, BrokerEndpoint, MqttError};
use crate::config::MqttSection;
use crate::transport::{BrokerClient, ClientCredentials};
use async_trait::async_trait;
use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, Outgoing, Packet, QoS};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// Background task that polls one connection's event loop
struct EventLoopDriver {
    handle: JoinHandle<()>,
    /// `Some(reason)` once the connection has gone away
    lost: watch::Receiver<Option<String>>,
}

impl EventLoopDriver {
    fn spawn(event_loop: EventLoop) -> Self {
        let (lost_tx, lost) = watch::channel(None);
        let handle = tokio::spawn(drive_event_loop(event_loop, lost_tx));
        Self { handle, lost }
    }

    fn loss_reason(&self) -> Option<String> {
        if let Some(reason) = self.lost.borrow().clone() {
            return Some(reason);
        }
        self.handle
            .is_finished()
            .then(|| "Event loop task stopped".to_string())
    }
}

impl Drop for EventLoopDriver {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Poll the event loop until the connection ends or DISCONNECT is sent
async fn drive_event_loop(mut event_loop: EventLoop, lost: watch::Sender<Option<String>>) {
    loop {
        match event_loop.poll().await {
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                debug!("DISCONNECT flushed, stopping event loop");
                return;
            }
            Ok(event) => {
                if let Err(reason) = MqttBrokerClient::handle_event(event) {
                    warn!("MQTT connection closed: {}", reason);
                    let _ = lost.send(Some(reason));
                    return;
                }
            }
            Err(e) => {
                warn!("MQTT event loop error: {}", e);
                let _ = lost.send(Some(e.to_string()));
                return;
            }
        }
    }
}

/// MQTT broker client backed by rumqttc
pub struct MqttBrokerClient {
    endpoint: BrokerEndpoint,
    keep_alive: Duration,
    connect_timeout: Duration,
    capacity: usize,
    client: Option<AsyncClient>,
    driver: Option<EventLoopDriver>,
    connected: bool,
}

impl MqttBrokerClient {
    pub fn new(config: &MqttSection) -> Result<Self, MqttError> {
        let endpoint = BrokerEndpoint::parse(&config.broker_url)?;

        Ok(Self {
            endpoint,
            keep_alive: config.keep_alive(),
            connect_timeout: config.connect_timeout(),
            capacity: config.outbound_capacity,
            client: None,
            driver: None,
            connected: false,
        })
    }

    pub fn endpoint(&self) -> &BrokerEndpoint {
        &self.endpoint
    }

    /// Determine QoS level for a publish (pure function)
    pub fn determine_qos_level(retain: bool) -> QoS {
        match retain {
            true => QoS::AtLeastOnce, // Retained values should use QoS 1 for reliability
            false => QoS::AtMostOnce,
        }
    }

    /// Poll until the broker answers CONNECT
    ///
    /// Cancelling this on timeout is fine: the event loop is dropped with it.
    async fn wait_for_connack(event_loop: &mut EventLoop) -> Result<(), MqttError> {
        loop {
            match event_loop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    return match ack.code {
                        ConnectReturnCode::Success => Ok(()),
                        code => Err(MqttError::ConnectionRefused(format!("{code:?}"))),
                    };
                }
                Ok(event) => trace!("Event before ConnAck: {:?}", event),
                Err(e) => return Err(MqttError::ConnectionFailed(Box::new(e))),
            }
        }
    }

    /// Drop the current connection handles, stopping the driver task
    fn reset(&mut self) {
        self.connected = false;
        self.client = None;
        self.driver = None;
    }

    /// Classify one event; `Err` carries the reason the broker has gone away
    fn handle_event(event: Event) -> Result<(), String> {
        match event {
            Event::Incoming(Packet::Disconnect) => Err("Broker sent DISCONNECT".to_string()),
            Event::Incoming(Packet::PingResp) => {
                trace!("Keepalive acknowledged");
                Ok(())
            }
            Event::Incoming(Packet::PubAck(ack)) => {
                trace!("Publish acknowledged: pkid={}", ack.pkid);
                Ok(())
            }
            Event::Incoming(packet) => {
                debug!(target: "mqtt_transport", "MQTT event: {:?}", packet);
                Ok(())
            }
            Event::Outgoing(_) => Ok(()),
        }
    }
}

#[async_trait]
impl BrokerClient for MqttBrokerClient {
    type Error = MqttError;

    async fn connect(&mut self, credentials: &ClientCredentials) -> Result<(), Self::Error> {
        self.reset();

        let options = configure_mqtt_options(&self.endpoint, credentials, self.keep_alive);
        let (client, mut event_loop) = AsyncClient::new(options, self.capacity);

        debug!(
            "Connecting to {} as {}",
            self.endpoint, credentials.client_id
        );
        match tokio::time::timeout(
            self.connect_timeout,
            Self::wait_for_connack(&mut event_loop),
        )
        .await
        {
            Ok(Ok(())) => {
                self.client = Some(client);
                self.driver = Some(EventLoopDriver::spawn(event_loop));
                self.connected = true;
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(MqttError::ConnectTimeout(self.connect_timeout)),
        }
    }

    async fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        retain: bool,
    ) -> Result<(), Self::Error> {
        let client = match (&self.client, self.connected) {
            (Some(client), true) => client,
            _ => return Err(MqttError::NotConnected),
        };

        // try_publish only enqueues; a full request buffer is reported, not awaited
        client
            .try_publish(
                topic,
                Self::determine_qos_level(retain),
                retain,
                payload.to_vec(),
            )
            .map_err(|e| MqttError::PublishFailed(Box::new(e)))
    }

    async fn service(&mut self) -> Result<(), Self::Error> {
        // Give the driver a turn on a current-thread runtime
        tokio::task::yield_now().await;

        let Some(driver) = self.driver.as_ref() else {
            return Err(MqttError::NotConnected);
        };

        match driver.loss_reason() {
            Some(reason) => {
                self.reset();
                Err(MqttError::ConnectionLost(reason))
            }
            None => Ok(()),
        }
    }

    async fn disconnect(&mut self) -> Result<(), Self::Error> {
        self.connected = false;
        let (Some(client), Some(mut driver)) = (self.client.take(), self.driver.take()) else {
            self.reset();
            return Ok(());
        };

        if driver.loss_reason().is_none() {
            client
                .try_disconnect()
                .map_err(|e| MqttError::ConnectionFailed(Box::new(e)))?;

            // The driver flushes queued publishes, then the DISCONNECT itself
            if tokio::time::timeout(self.connect_timeout, &mut driver.handle)
                .await
                .is_err()
            {
                debug!("Timed out flushing DISCONNECT to {}", self.endpoint);
            }
        }

        info!("MQTT client disconnected from {}", self.endpoint);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    /// CONNACK, session not present, return code 0
    const CONNACK: [u8; 4] = [0x20, 0x02, 0x00, 0x00];
    const DISCONNECT: [u8; 2] = [0xE0, 0x00];

    /// Accept one client on a loopback port and answer its CONNECT
    async fn accept_and_ack(listener: &TcpListener) -> TcpStream {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 256];
        let n = socket.read(&mut buf).await.unwrap();
        assert_eq!(buf[0] >> 4, 1, "expected CONNECT, got {:?}", &buf[..n]);
        socket.write_all(&CONNACK).await.unwrap();
        socket
    }

    async fn loopback_broker() -> (TcpListener, MqttSection) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let mut section = MqttSection::new(&format!("mqtt://127.0.0.1:{port}"));
        section.connect_timeout_secs = 2;
        (listener, section)
    }

    fn test_section() -> MqttSection {
        MqttSection::new("mqtt://localhost:1883")
    }

    #[test]
    fn test_new_client_is_disconnected() {
        let client = MqttBrokerClient::new(&test_section()).unwrap();
        assert!(!client.is_connected());
        assert_eq!(client.endpoint().port, 1883);
    }

    #[test]
    fn test_new_rejects_invalid_url() {
        let section = MqttSection::new("not a url");
        assert!(matches!(
            MqttBrokerClient::new(&section),
            Err(MqttError::InvalidBrokerUrl(_))
        ));
    }

    #[test]
    fn test_qos_for_retained_messages() {
        assert_eq!(MqttBrokerClient::determine_qos_level(true), QoS::AtLeastOnce);
        assert_eq!(MqttBrokerClient::determine_qos_level(false), QoS::AtMostOnce);
    }

    #[tokio::test]
    async fn test_publish_fails_without_connection() {
        let mut client = MqttBrokerClient::new(&test_section()).unwrap();
        let result = client.publish("sensor/Temp", b"21.0", true).await;
        assert!(matches!(result, Err(MqttError::NotConnected)));
    }

    #[tokio::test]
    async fn test_service_fails_without_connection() {
        let mut client = MqttBrokerClient::new(&test_section()).unwrap();
        assert!(client.service().await.is_err());
    }

    #[tokio::test]
    async fn test_disconnect_without_connection() {
        let mut client = MqttBrokerClient::new(&test_section()).unwrap();
        assert!(client.disconnect().await.is_ok());
    }

    #[tokio::test]
    async fn test_connect_to_unreachable_broker_fails() {
        // Port 1 on localhost refuses connections on any sane test host
        let mut section = MqttSection::new("mqtt://127.0.0.1:1");
        section.connect_timeout_secs = 2;
        let mut client = MqttBrokerClient::new(&section).unwrap();

        let result = client.connect(&ClientCredentials::anonymous("sink")).await;

        assert!(result.is_err());
        assert!(!client.is_connected());
    }

    #[test]
    fn test_disconnect_packet_is_connection_loss() {
        let result = MqttBrokerClient::handle_event(Event::Incoming(Packet::Disconnect));
        assert_eq!(result, Err("Broker sent DISCONNECT".to_string()));
    }

    #[test]
    fn test_ping_response_is_benign() {
        let result = MqttBrokerClient::handle_event(Event::Incoming(Packet::PingResp));
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_service_is_quiet_while_broker_idle() {
        let (listener, section) = loopback_broker().await;
        let broker = tokio::spawn(async move { accept_and_ack(&listener).await });
        let mut client = MqttBrokerClient::new(&section).unwrap();

        client
            .connect(&ClientCredentials::anonymous("sink"))
            .await
            .unwrap();
        let _socket = broker.await.unwrap();

        for _ in 0..5 {
            assert!(client.service().await.is_ok());
        }
        assert!(client.is_connected());
    }

    #[tokio::test]
    async fn test_service_reports_loss_seen_by_driver() {
        let (listener, section) = loopback_broker().await;
        let broker = tokio::spawn(async move { accept_and_ack(&listener).await });
        let mut client = MqttBrokerClient::new(&section).unwrap();
        client
            .connect(&ClientCredentials::anonymous("sink"))
            .await
            .unwrap();

        drop(broker.await.unwrap());

        let mut lost = None;
        for _ in 0..200 {
            if let Err(e) = client.service().await {
                lost = Some(e);
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(matches!(lost, Some(MqttError::ConnectionLost(_))));
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn test_publish_and_disconnect_reach_broker_intact() {
        let (listener, section) = loopback_broker().await;
        let broker = tokio::spawn(async move {
            let mut socket = accept_and_ack(&listener).await;
            let mut received = Vec::new();
            socket.read_to_end(&mut received).await.unwrap();
            received
        });
        let mut client = MqttBrokerClient::new(&section).unwrap();
        client
            .connect(&ClientCredentials::anonymous("sink"))
            .await
            .unwrap();

        client.publish("sensor/Temp", b"21.20", true).await.unwrap();
        client.service().await.unwrap();
        client.disconnect().await.unwrap();
        drop(client);

        let received = broker.await.unwrap();
        // PUBLISH, QoS 1, retain
        assert_eq!(received[0], 0x32);
        let topic_len = u16::from_be_bytes([received[2], received[3]]) as usize;
        assert_eq!(&received[4..4 + topic_len], b"sensor/Temp");
        assert!(received.ends_with(&DISCONNECT));
    }
}
