use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context as _, Result};
use btleplug::api::Manager as _;
use btleplug::platform::Manager;
use clap::{Parser, Subcommand};
use log::{LevelFilter, info};
use mac_address::MacAddress;
use tokio::io::BufReader;
use tokio::sync::mpsc;

use fan_beacon::beacon::{BeaconAgent, QUIET_PERIOD};
use fan_beacon::config::{AppConfig, Overrides};
use fan_beacon::consumer::Consumer;
use fan_beacon::decision::{FanController, FanPolicy};
use fan_beacon::dispatch::{Actuator, LogActuator, WebhookActuator};
use fan_beacon::manager;
use fan_beacon::mqtt::MqttClient;
use fan_beacon::scanner::Scanner;
use fan_beacon::simulate::{self, LogIndicator, MediumAdvertiser, SharedSensors};

const DEFAULT_CONFIG: &str = "config.toml";
const SIGHTING_QUEUE: usize = 32;
const SAMPLE_QUEUE: usize = 32;

#[derive(Parser, Debug)]
#[command(version, about = "Turns a fan on and off from a BLE orientation beacon")]
struct Cli {
    /// Config file; `config.toml` is read when present
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Beacon address, e.g. AA:BB:CC:DD:EE:FF
    #[arg(long, env = "PUCK_ADDRESS", global = true)]
    address: Option<MacAddress>,

    /// Webhook key
    #[arg(long, env = "IFTTT_API_KEY", hide_env_values = true, global = true)]
    webhook_key: Option<String>,

    /// Temperature in °C above which the fan may run
    #[arg(long, global = true)]
    threshold: Option<f64>,

    /// Log every evaluation
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Watch for the beacon over Bluetooth and drive the webhook (default)
    Scan,
    /// Run a simulated beacon fed from stdin against the consumer
    Simulate {
        /// Seconds between periodic advertisements
        #[arg(long, default_value_t = 60)]
        interval: u64,
    },
}

fn init_logging(verbose: bool) {
    let mut builder = pretty_env_logger::formatted_timed_builder();
    builder.filter_level(LevelFilter::Info);
    if verbose {
        builder.filter_module("fan_beacon", LevelFilter::Debug);
    }
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    builder.init();
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::load(path, true)?,
        None => AppConfig::load(DEFAULT_CONFIG.as_ref(), false)?,
    };
    config.apply(Overrides {
        address: cli.address,
        webhook_key: cli.webhook_key.clone(),
        temperature_threshold: cli.threshold,
    });
    Ok(config)
}

fn start_diagnostics(config: &AppConfig) -> Option<MqttClient> {
    let mqtt_config = config.mqtt.as_ref()?;
    let (client, eventloop) = MqttClient::new(mqtt_config);
    tokio::spawn(MqttClient::event_loop(eventloop));
    info!("Publishing diagnostics to MQTT at {}", mqtt_config.host);
    Some(client)
}

fn build_consumer<A: Actuator>(
    config: &AppConfig,
    target: MacAddress,
    actuator: A,
    diagnostics: Option<MqttClient>,
) -> Consumer<A> {
    let consumer = Consumer::new(
        Scanner::new(target, config.company_id()),
        FanController::new(FanPolicy::new(config.temperature_threshold())),
        actuator,
    );
    match diagnostics {
        Some(mqtt) => consumer.with_diagnostics(mqtt),
        None => consumer,
    }
}

async fn scan(config: AppConfig) -> Result<()> {
    let (target, webhook) = config.require_scan()?;

    let bt_manager = Manager::new().await?;
    // get the first bluetooth adapter
    let adapters = bt_manager.adapters().await?;
    let central = adapters
        .into_iter()
        .next()
        .context("no Bluetooth adapter found")?;

    let diagnostics = start_diagnostics(&config);
    let consumer = build_consumer(
        &config,
        target,
        WebhookActuator::new(&webhook),
        diagnostics.clone(),
    );

    let (tx, rx) = mpsc::channel(SIGHTING_QUEUE);
    let consumer_task = tokio::spawn(consumer.run(rx));

    manager::Manager::new(central).run_loop(tx).await?;
    consumer_task.await?;

    if let Some(mqtt) = diagnostics {
        mqtt.disconnect().await?;
    }
    info!("Exiting scan loop");
    Ok(())
}

async fn run_simulation(config: AppConfig, interval: Duration) -> Result<()> {
    let target = config
        .target_address()
        .unwrap_or_else(simulate::simulated_address);
    let actuator: Box<dyn Actuator + Send> = match config.webhook() {
        Some(webhook) => Box::new(WebhookActuator::new(&webhook)),
        None => Box::new(LogActuator),
    };
    let consumer = build_consumer(&config, target, actuator, start_diagnostics(&config));

    let (sighting_tx, sighting_rx) = mpsc::channel(SIGHTING_QUEUE);
    let (sample_tx, sample_rx) = mpsc::channel(SAMPLE_QUEUE);
    let sensors = SharedSensors::new(
        simulate::DEFAULT_BATTERY_VOLTS,
        simulate::DEFAULT_TEMPERATURE_CELSIUS,
    );
    let agent = BeaconAgent::new(
        MediumAdvertiser::new(target, sighting_tx),
        sensors.clone(),
        LogIndicator,
    )
    .with_company_id(config.company_id())
    .with_timing(QUIET_PERIOD, interval);

    tokio::spawn(consumer.run(sighting_rx));
    let agent_task = tokio::spawn(agent.run(sample_rx));

    info!("Simulated beacon {} ready: up, down, <z>, temp <°C>, battery <V>", target);
    simulate::read_commands(BufReader::new(tokio::io::stdin()), sensors, sample_tx).await?;
    agent_task.abort();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(&cli)?;
    match cli.command.unwrap_or(Command::Scan) {
        Command::Scan => scan(config).await,
        Command::Simulate { interval } => {
            run_simulation(config, Duration::from_secs(interval)).await
        }
    }
}
