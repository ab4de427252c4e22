//! Mock implementations for testing
//!
//! Provides mock broker client, radio and network link implementations so the
//! session and bridge loop can be exercised without hardware or a broker.
//! Clones share state, so a test can keep a handle after moving the mock in.

use crate::network::NetworkLink;
use crate::radio::{RadioFrame, RadioLink, ReceiveStatus};
use crate::transport::{BrokerClient, ClientCredentials};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

/// A message captured by [`MockBrokerClient`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: String,
    pub retain: bool,
}

#[derive(Debug, Error)]
pub enum MockError {
    #[error("Mock connection failure")]
    ConnectFailed,
    #[error("Mock publish while disconnected")]
    NotConnected,
    #[error("Mock publish buffer full")]
    BufferFull,
    #[error("Mock transport failure")]
    TransportFailed,
}

/// Mock broker client for testing
#[derive(Debug, Clone, Default)]
pub struct MockBrokerClient {
    published: Arc<Mutex<Vec<PublishedMessage>>>,
    credentials: Arc<Mutex<Option<ClientCredentials>>>,
    connect_calls: Arc<AtomicU32>,
    service_calls: Arc<AtomicU32>,
    connect_failures_remaining: Arc<AtomicU32>,
    fail_next_service: Arc<AtomicBool>,
    reject_publish: Arc<AtomicBool>,
    connected: Arc<AtomicBool>,
}

impl MockBrokerClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the first `failures` connection attempts
    pub fn with_connect_failures(failures: u32) -> Self {
        let mock = Self::default();
        mock.connect_failures_remaining
            .store(failures, Ordering::SeqCst);
        mock
    }

    /// Make the next service call report a transport failure
    pub fn fail_next_service(&self) {
        self.fail_next_service.store(true, Ordering::SeqCst);
    }

    /// Simulate the outgoing buffer refusing publishes
    pub fn set_reject_publish(&self, reject: bool) {
        self.reject_publish.store(reject, Ordering::SeqCst);
    }

    /// Simulate the client noticing a dead connection on its own
    pub fn drop_connection(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    pub fn connect_count(&self) -> u32 {
        self.connect_calls.load(Ordering::SeqCst)
    }

    pub fn service_count(&self) -> u32 {
        self.service_calls.load(Ordering::SeqCst)
    }

    pub async fn published(&self) -> Vec<PublishedMessage> {
        self.published.lock().await.clone()
    }

    pub async fn last_credentials(&self) -> Option<ClientCredentials> {
        self.credentials.lock().await.clone()
    }
}

#[async_trait]
impl BrokerClient for MockBrokerClient {
    type Error = MockError;

    async fn connect(&mut self, credentials: &ClientCredentials) -> Result<(), Self::Error> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        *self.credentials.lock().await = Some(credentials.clone());

        let remaining = self.connect_failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.connect_failures_remaining
                .store(remaining - 1, Ordering::SeqCst);
            self.connected.store(false, Ordering::SeqCst);
            return Err(MockError::ConnectFailed);
        }

        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        retain: bool,
    ) -> Result<(), Self::Error> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(MockError::NotConnected);
        }
        if self.reject_publish.load(Ordering::SeqCst) {
            return Err(MockError::BufferFull);
        }

        self.published.lock().await.push(PublishedMessage {
            topic: topic.to_string(),
            payload: String::from_utf8_lossy(payload).into_owned(),
            retain,
        });
        Ok(())
    }

    async fn service(&mut self) -> Result<(), Self::Error> {
        self.service_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_next_service.swap(false, Ordering::SeqCst) {
            self.connected.store(false, Ordering::SeqCst);
            return Err(MockError::TransportFailed);
        }
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), Self::Error> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// Mock radio that replays queued frames, one per poll
#[derive(Debug, Clone, Default)]
pub struct MockRadio {
    frames: Arc<std::sync::Mutex<VecDeque<RadioFrame>>>,
}

impl MockRadio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let radio = Self::new();
        for line in lines {
            radio.push_line(line);
        }
        radio
    }

    pub fn push_line(&self, line: impl Into<String>) {
        self.push_frame(RadioFrame::success(line));
    }

    pub fn push_frame(&self, frame: RadioFrame) {
        if let Ok(mut frames) = self.frames.lock() {
            frames.push_back(frame);
        }
    }

    /// Queue a frame carrying a failure status
    pub fn push_failure(&self, status: ReceiveStatus, data: impl Into<String>) {
        self.push_frame(RadioFrame {
            status,
            data: data.into(),
        });
    }

    pub fn remaining(&self) -> usize {
        self.frames.lock().map(|f| f.len()).unwrap_or(0)
    }
}

impl RadioLink for MockRadio {
    fn try_receive(&mut self) -> Option<RadioFrame> {
        self.frames.lock().ok().and_then(|mut f| f.pop_front())
    }
}

/// Mock network link with a switchable carrier
#[derive(Debug, Clone)]
pub struct MockNetworkLink {
    up: Arc<AtomicBool>,
}

impl MockNetworkLink {
    pub fn new(up: bool) -> Self {
        Self {
            up: Arc::new(AtomicBool::new(up)),
        }
    }

    pub fn set_up(&self, up: bool) {
        self.up.store(up, Ordering::SeqCst);
    }
}

impl Default for MockNetworkLink {
    fn default() -> Self {
        Self::new(true)
    }
}

impl NetworkLink for MockNetworkLink {
    fn is_up(&self) -> bool {
        self.up.load(Ordering::SeqCst)
    }
}
