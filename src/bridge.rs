//! Bridge loop
//!
//! One cooperative loop owns the radio, the network link and the broker
//! session. Every tick it checks the link, keeps the session connected and
//! serviced, then takes at most one line from the radio and republishes its
//! fields. Nothing blocks except a reconnect in [`ReconnectMode::Blocking`].
//!
//! [`ReconnectMode::Blocking`]: crate::config::ReconnectMode::Blocking

use crate::config::{BridgeConfig, EmptyValuePolicy};
use crate::network::NetworkLink;
use crate::observability::metrics;
use crate::radio::{RadioLink, ReceiveStatus};
use crate::telemetry::{decode, route, PublishRequest, TopicMapping};
use crate::transport::{BrokerClient, BrokerSession, SessionError};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn, Instrument};

/// Loop behaviour resolved from the `[bridge]` section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeSettings {
    pub telemetry_prefix: String,
    pub poll_interval: Duration,
    pub empty_values: EmptyValuePolicy,
    /// `None` disables the periodic counters log line
    pub stats_interval: Option<Duration>,
    /// Minimum time between two reads of the network link state
    pub link_check_interval: Duration,
}

impl BridgeSettings {
    pub fn from_config(config: &BridgeConfig) -> Self {
        let stats_secs = config.bridge.stats_interval_secs;
        Self {
            telemetry_prefix: config.bridge.telemetry_prefix.clone(),
            poll_interval: config.poll_interval(),
            empty_values: config.bridge.empty_values,
            stats_interval: (stats_secs > 0).then(|| Duration::from_secs(stats_secs)),
            link_check_interval: config.link_check_interval(),
        }
    }
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            telemetry_prefix: "Temp=".to_string(),
            poll_interval: Duration::from_millis(10),
            empty_values: EmptyValuePolicy::Publish,
            stats_interval: None,
            link_check_interval: Duration::from_secs(1),
        }
    }
}

/// What happened to the radio input during one tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LineOutcome {
    /// Nothing arrived
    #[default]
    NoData,
    /// The radio reported a non-success status; treated as no data
    RadioFailure(ReceiveStatus),
    /// A blank line arrived
    Empty,
    /// The line did not start with the telemetry prefix
    Ignored,
    /// The line was decoded; `requests` counts the fields that had a topic
    Decoded { fields: usize, requests: usize },
}

/// Summary of one loop iteration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub link_up: bool,
    pub connected: bool,
    pub line: LineOutcome,
    pub published: usize,
    pub deferred: usize,
    pub flushed: usize,
}

/// Gate, decode and route one line (pure function)
///
/// Applies the prefix filter and the empty-value policy; fields without a
/// topic are dropped silently.
pub fn line_requests(
    line: &str,
    settings: &BridgeSettings,
    mapping: &TopicMapping,
) -> (LineOutcome, Vec<PublishRequest>) {
    let line = line.trim();
    if line.is_empty() {
        return (LineOutcome::Empty, Vec::new());
    }
    if !line.starts_with(&settings.telemetry_prefix) {
        return (LineOutcome::Ignored, Vec::new());
    }

    let reading = decode(line);
    let requests: Vec<PublishRequest> = reading
        .iter()
        .filter_map(|field| route(field, mapping))
        .filter(|request| match settings.empty_values {
            EmptyValuePolicy::Publish => true,
            EmptyValuePolicy::Skip => {
                if request.payload.is_empty() {
                    debug!(topic = %request.topic, "Skipping empty reading");
                }
                !request.payload.is_empty()
            }
        })
        .collect();

    (
        LineOutcome::Decoded {
            fields: reading.len(),
            requests: requests.len(),
        },
        requests,
    )
}

enum PublishOutcome {
    Published,
    Deferred,
}

/// The top-level loop tying radio, network and broker together
pub struct Bridge<C, R, N>
where
    C: BrokerClient,
    R: RadioLink,
    N: NetworkLink,
{
    session: BrokerSession<C>,
    radio: R,
    network: N,
    mapping: TopicMapping,
    settings: BridgeSettings,
    /// Latest unpublished request per topic
    pending: BTreeMap<String, PublishRequest>,
    link_up: Option<bool>,
    link_checked_at: Option<Instant>,
    last_stats_at: Instant,
}

impl<C, R, N> Bridge<C, R, N>
where
    C: BrokerClient,
    R: RadioLink,
    N: NetworkLink,
{
    pub fn new(
        session: BrokerSession<C>,
        radio: R,
        network: N,
        mapping: TopicMapping,
        settings: BridgeSettings,
    ) -> Self {
        Self {
            session,
            radio,
            network,
            mapping,
            settings,
            pending: BTreeMap::new(),
            link_up: None,
            link_checked_at: None,
            last_stats_at: Instant::now(),
        }
    }

    pub fn session(&self) -> &BrokerSession<C> {
        &self.session
    }

    /// Requests waiting for the broker to come back
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Payload currently held back for `topic`, if any
    pub fn pending_payload(&self, topic: &str) -> Option<&str> {
        self.pending.get(topic).map(|r| r.payload.as_str())
    }

    /// Run one loop iteration
    pub async fn tick(&mut self) -> TickReport {
        let link_up = self.check_link();

        self.session.ensure_connected().await;
        self.session.service_tick().await;

        let mut report = TickReport {
            link_up,
            ..TickReport::default()
        };

        if self.session.is_connected() && !self.pending.is_empty() {
            report.flushed = self.flush_pending().await;
        }

        if let Some(frame) = self.radio.try_receive() {
            if frame.is_success() {
                metrics().line_received();
                debug!(line = %frame.data, "Received radio line");

                let (outcome, requests) =
                    line_requests(&frame.data, &self.settings, &self.mapping);
                report.line = outcome;

                match outcome {
                    LineOutcome::Decoded { .. } => {
                        metrics().reading_decoded();
                        let span = crate::telemetry_span!(line = %frame.data);
                        let (published, deferred) =
                            self.publish_all(requests).instrument(span).await;
                        report.published = published;
                        report.deferred = deferred;
                    }
                    _ => {
                        metrics().line_ignored();
                        debug!(line = %frame.data, "Ignoring non-telemetry line");
                    }
                }
            } else {
                metrics().radio_error();
                debug!(status = %frame.status, "Radio receive failed");
                report.line = LineOutcome::RadioFailure(frame.status);
            }
        }

        report.connected = self.session.is_connected();
        self.maybe_log_stats();
        report
    }

    /// Tick until `shutdown` turns true (or its sender is dropped), then disconnect
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            prefix = %self.settings.telemetry_prefix,
            topics = self.mapping.len(),
            "Bridge loop started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                report = self.tick() => {
                    if report.line != LineOutcome::NoData {
                        debug!(?report, "Tick complete");
                    }
                }
                _ = shutdown.changed() => break,
            }

            tokio::select! {
                _ = sleep(self.settings.poll_interval) => {}
                _ = shutdown.changed() => break,
            }
        }

        if !self.pending.is_empty() {
            warn!(
                pending = self.pending.len(),
                "Shutting down with unpublished readings"
            );
        }
        self.session.shutdown().await;
        info!("Bridge loop stopped");
    }

    /// Log link transitions only; recovery belongs to the host's network manager
    fn check_link(&mut self) -> bool {
        if let (Some(up), Some(checked_at)) = (self.link_up, self.link_checked_at) {
            if checked_at.elapsed() < self.settings.link_check_interval {
                return up;
            }
        }
        self.link_checked_at = Some(Instant::now());

        let up = self.network.is_up();
        if self.link_up != Some(up) {
            match (self.link_up, up) {
                (Some(false), true) => info!("Network link restored"),
                (_, false) => warn!("Network link down"),
                (None, true) => debug!("Network link up"),
                _ => {}
            }
            self.link_up = Some(up);
        }
        up
    }

    async fn publish_all(&mut self, requests: Vec<PublishRequest>) -> (usize, usize) {
        let mut published = 0;
        let mut deferred = 0;
        for request in requests {
            match self.publish_or_defer(request).await {
                PublishOutcome::Published => published += 1,
                PublishOutcome::Deferred => deferred += 1,
            }
        }
        (published, deferred)
    }

    async fn publish_or_defer(&mut self, request: PublishRequest) -> PublishOutcome {
        match self.session.publish(&request).await {
            Ok(()) => {
                metrics().field_published();
                info!(topic = %request.topic, payload = %request.payload, "Published reading");
                self.pending.remove(&request.topic);
                PublishOutcome::Published
            }
            Err(e) => {
                if let SessionError::PublishFailed { .. } = e {
                    metrics().publish_failed();
                    warn!(error = %e, "Publish rejected by client");
                } else {
                    debug!(error = %e, topic = %request.topic, "Deferring publish");
                }
                self.defer(request);
                PublishOutcome::Deferred
            }
        }
    }

    fn defer(&mut self, request: PublishRequest) {
        metrics().publish_deferred();
        self.pending.insert(request.topic.clone(), request);
    }

    /// Publish held-back requests in topic order; stops at the first failure
    async fn flush_pending(&mut self) -> usize {
        let topics: Vec<String> = self.pending.keys().cloned().collect();
        let mut flushed = 0;

        for topic in topics {
            let Some(request) = self.pending.get(&topic).cloned() else {
                continue;
            };
            match self.session.publish(&request).await {
                Ok(()) => {
                    metrics().field_published();
                    info!(topic = %request.topic, payload = %request.payload, "Published deferred reading");
                    self.pending.remove(&topic);
                    flushed += 1;
                }
                Err(e) => {
                    debug!(error = %e, "Flushing deferred readings interrupted");
                    break;
                }
            }
        }
        flushed
    }

    fn maybe_log_stats(&mut self) {
        let Some(interval) = self.settings.stats_interval else {
            return;
        };
        if self.last_stats_at.elapsed() < interval {
            return;
        }
        self.last_stats_at = Instant::now();

        let snapshot = metrics().snapshot();
        info!(
            lines_received = snapshot.lines_received,
            lines_ignored = snapshot.lines_ignored,
            radio_errors = snapshot.radio_errors,
            readings_decoded = snapshot.readings_decoded,
            fields_published = snapshot.fields_published,
            publishes_deferred = snapshot.publishes_deferred,
            publish_failures = snapshot.publish_failures,
            mqtt_connected = snapshot.mqtt_connected,
            connection_attempts = snapshot.connection_attempts,
            connections_established = snapshot.connections_established,
            connections_lost = snapshot.connections_lost,
            pending = self.pending.len(),
            "Bridge statistics"
        );
    }
}
