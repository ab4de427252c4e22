//! Sensor Monitor - LoRa sink
//!
//! Subscribes to the sensor topics published by the bridge and logs every
//! reading, including the retained values delivered right after subscribing.

use clap::Parser;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};

/// Monitor the sensor topics published by lora-sink
#[derive(Parser)]
#[command(name = "sensor-monitor")]
#[command(about = "Monitor the sensor topics published by lora-sink")]
#[command(version)]
struct Args {
    /// MQTT broker host
    #[arg(long, default_value = "localhost")]
    broker_host: String,

    /// MQTT broker port
    #[arg(long, default_value_t = 1883)]
    broker_port: u16,

    /// MQTT username (optional)
    #[arg(long, env = "MQTT_USERNAME")]
    username: Option<String>,

    /// MQTT password (optional)
    #[arg(long, env = "MQTT_PASSWORD")]
    password: Option<String>,

    /// Topic filter to subscribe to
    #[arg(short, long, default_value = "sensor/#")]
    topic: String,

    /// Client ID (defaults to sensor-monitor-<pid>)
    #[arg(long)]
    client_id: Option<String>,
}

/// A reading is valid when the payload parses as a number (pure function)
fn parse_reading(payload: &str) -> Option<f64> {
    payload.trim().parse::<f64>().ok()
}

/// Last topic level, e.g. `Temp` for `sensor/Temp` (pure function)
fn sensor_name(topic: &str) -> &str {
    topic.rsplit('/').next().unwrap_or(topic)
}

fn setup_mqtt_client(args: &Args) -> (AsyncClient, EventLoop) {
    let client_id = args
        .client_id
        .clone()
        .unwrap_or_else(|| format!("sensor-monitor-{}", std::process::id()));
    let mut mqtt_options = MqttOptions::new(client_id, &args.broker_host, args.broker_port);

    if let (Some(username), Some(password)) = (&args.username, &args.password) {
        mqtt_options.set_credentials(username, password);
    }

    mqtt_options.set_keep_alive(Duration::from_secs(60));
    mqtt_options.set_clean_session(true);

    AsyncClient::new(mqtt_options, 10)
}

fn log_reading(topic: &str, payload: &str, retain: bool) {
    match parse_reading(payload) {
        Some(value) => info!(
            sensor = sensor_name(topic),
            topic = %topic,
            value,
            retained = retain,
            "Sensor reading"
        ),
        None => warn!(
            topic = %topic,
            payload = %payload,
            retained = retain,
            "Invalid data received"
        ),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter("sensor_monitor=info,rumqttc=warn")
        .init();

    let args = Args::parse();

    info!(
        "Monitoring {} on {}:{} (Ctrl+C to stop)",
        args.topic, args.broker_host, args.broker_port
    );

    let (client, mut eventloop) = setup_mqtt_client(&args);

    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("Shutdown signal received, disconnecting...");
                if tokio::time::timeout(Duration::from_millis(500), client.disconnect())
                    .await
                    .is_err()
                {
                    warn!("Disconnect timed out");
                }
                break;
            }
            event = eventloop.poll() => match event {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!("Connected to MQTT broker");
                    // Subscriptions do not survive a clean-session reconnect
                    if let Err(e) = client.try_subscribe(args.topic.clone(), QoS::AtMostOnce) {
                        error!("Failed to subscribe to {}: {}", args.topic, e);
                    }
                }
                Ok(Event::Incoming(Packet::SubAck(_))) => {
                    info!("Subscribed to {}", args.topic);
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let payload = String::from_utf8_lossy(&publish.payload);
                    log_reading(&publish.topic, &payload, publish.retain);
                }
                Ok(_) => {}
                Err(e) => {
                    // The event loop reconnects on the next poll
                    warn!("MQTT connection error: {}; retrying in 5 seconds", e);
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
            }
        }
    }
}
