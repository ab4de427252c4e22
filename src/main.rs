//! LoRa sink - main entry point
//!
//! Loads the configuration, wires the radio, network link and MQTT session
//! into the bridge loop and runs it until SIGINT or SIGTERM.

use clap::{Parser, Subcommand};
use lora_sink::bridge::{line_requests, Bridge, BridgeSettings, LineOutcome};
use lora_sink::config::{BridgeConfig, ConfigError};
use lora_sink::lifecycle_span;
use lora_sink::network::link_from_config;
use lora_sink::observability::{init_logging_from_env, level_for_verbosity};
use lora_sink::radio::LineRadio;
use lora_sink::transport::mqtt::MqttBrokerClient;
use lora_sink::transport::{BrokerSession, ClientCredentials, ReconnectSettings};
use lora_sink::{BridgeResult, TopicMapping};
use std::path::PathBuf;
use std::process;
use tokio::signal;
use tokio::sync::watch;
use tracing::{debug, error, info, warn, Instrument};

const DEFAULT_CONFIG_PATHS: [&str; 2] = ["lora-sink.toml", "config/lora-sink.toml"];

/// Bridge LoRa sensor telemetry to retained MQTT topics
#[derive(Parser)]
#[command(name = "lora-sink")]
#[command(about = "Bridge LoRa sensor telemetry to retained MQTT topics")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bridge
    Run,
    /// Validate configuration
    Config {
        /// Show the resolved configuration
        #[arg(long)]
        show: bool,
    },
    /// Decode one telemetry line and print the publishes it would produce
    Decode {
        /// Raw line, e.g. "Temp=21.20 | Hum=37.10 | Soil=0.00 | Rain=0.00"
        line: String,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    init_logging_from_env(level_for_verbosity(cli.verbose));

    let config = match load_configuration(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let result = match (cli.command, config) {
        (Commands::Decode { line }, config) => handle_decode_command(config.as_ref(), &line),
        (_, None) => {
            error!(
                "No configuration file found. Please provide one with -c/--config or create lora-sink.toml"
            );
            process::exit(1);
        }
        (Commands::Run, Some(config)) => run_bridge(config).await,
        (Commands::Config { show }, Some(config)) => handle_config_command(&config, show),
    };

    if let Err(e) = result {
        if e.is_fatal() {
            error!("Fatal startup error: {}", e);
        } else {
            error!("Command failed: {}", e);
        }
        process::exit(1);
    }
}

/// Load the explicit file, or the first default path that exists
fn load_configuration(config_path: &Option<PathBuf>) -> Result<Option<BridgeConfig>, ConfigError> {
    if let Some(path) = config_path {
        info!("Loading configuration from: {}", path.display());
        return BridgeConfig::load_from_file(path).map(Some);
    }

    for path_str in DEFAULT_CONFIG_PATHS {
        let path = PathBuf::from(path_str);
        if path.exists() {
            info!("Loading configuration from: {}", path.display());
            return BridgeConfig::load_from_file(&path).map(Some);
        }
    }

    Ok(None)
}

async fn run_bridge(config: BridgeConfig) -> BridgeResult<()> {
    info!(
        "Starting lora-sink v{} with client ID: {}",
        env!("CARGO_PKG_VERSION"),
        config.mqtt.client_id
    );

    let credentials = ClientCredentials::from_config(&config);
    if config.mqtt.username_env.is_some() && credentials.username.is_none() {
        warn!("MQTT username environment variable is not set; connecting without credentials");
    }
    if config.mqtt.password_env.is_some() && credentials.password.is_none() {
        warn!("MQTT password environment variable is not set");
    }

    let mapping = config.topic_mapping()?;
    for (field, topic) in mapping.entries() {
        debug!(field, topic, "Topic mapping");
    }
    let client = MqttBrokerClient::new(&config.mqtt)?;
    info!("MQTT broker: {}", client.endpoint());

    // Without the radio the bridge has nothing to do
    let radio = LineRadio::open(&config.radio).await?;
    let network = link_from_config(&config.network);

    let session = BrokerSession::new(
        client,
        credentials,
        ReconnectSettings::from_config(&config.mqtt),
    );
    let mut bridge = Bridge::new(
        session,
        radio,
        network,
        mapping,
        BridgeSettings::from_config(&config),
    );

    let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())?;
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        tokio::select! {
            _ = sigint.recv() => info!("Received SIGINT, shutting down gracefully..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down gracefully..."),
        }
        let _ = shutdown_tx.send(true);
    });

    let span = lifecycle_span!(client_id = %config.mqtt.client_id);
    bridge.run(shutdown_rx).instrument(span).await;

    info!("Application shutdown complete");
    Ok(())
}

fn handle_config_command(config: &BridgeConfig, show: bool) -> BridgeResult<()> {
    if show {
        println!("Current configuration:");
        match toml::to_string_pretty(config) {
            Ok(rendered) => println!("{rendered}"),
            Err(e) => warn!("Failed to render configuration: {}", e),
        }
    }

    info!("Configuration validation complete");
    Ok(())
}

fn handle_decode_command(config: Option<&BridgeConfig>, line: &str) -> BridgeResult<()> {
    let (settings, mapping) = match config {
        Some(config) => (BridgeSettings::from_config(config), config.topic_mapping()?),
        None => (BridgeSettings::default(), TopicMapping::default()),
    };

    let (outcome, requests) = line_requests(line, &settings, &mapping);
    match outcome {
        LineOutcome::Empty => println!("Empty line: nothing to publish"),
        LineOutcome::Ignored => println!(
            "Not telemetry (does not start with {:?}): nothing to publish",
            settings.telemetry_prefix
        ),
        LineOutcome::Decoded { fields, requests: routed } => {
            println!("Decoded {fields} field(s), {routed} with a topic");
            for request in &requests {
                println!(
                    "  {} <- {:?}{}",
                    request.topic,
                    request.payload,
                    if request.retain { " (retained)" } else { "" }
                );
            }
        }
        LineOutcome::NoData | LineOutcome::RadioFailure(_) => {}
    }

    Ok(())
}
