//! mqfwd - Datagram to MQTT forwarding bridge
//!
//! Usage:
//!   mqfwd -c <FILE> [OPTIONS]
//!
//! Options:
//!   -c, --config <FILE>        Configuration file path (required)
//!   -l, --listen <ADDR>        Datagram listen address
//!   -t, --send-to <ADDR>       Datagram destination address
//!   -b, --mqtt-broker-addr     MQTT broker address
//!   -s, --mqtt-sub-topic       Topic to subscribe to
//!   -p, --mqtt-pub-topic       Topic to publish received datagrams to
//!       --log-data             Base64-log every payload crossing the bridge
//!       --max-msg-size <N>     Receive buffer size in bytes
//!       --log-level            Log level (error, warn, info, debug, trace)
//!   -h, --help                 Print help

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::broadcast;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use mqfwd::{Config, DatagramListener, DatagramSender, Endpoint, ForwardingBridge, MqttClient};

/// Log level for CLI
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum LogLevel {
    /// Only errors
    Error,
    /// Warnings and errors
    Warn,
    /// Informational messages
    #[default]
    Info,
    /// Debug messages
    Debug,
    /// Trace messages (very verbose)
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Level {
        match self {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

/// mqfwd - Datagram to MQTT forwarding bridge
#[derive(Parser, Debug)]
#[command(name = "mqfwd")]
#[command(version = "0.1.0")]
#[command(about = "Forward datagrams to an MQTT topic and back")]
struct Args {
    /// Configuration file path (TOML format)
    #[arg(short, long)]
    config: PathBuf,

    /// Datagram listen address (udp|udp4|udp6|unixgram://addr)
    #[arg(short, long)]
    listen: Option<String>,

    /// Datagram destination for messages from the subscribed topic
    #[arg(short = 't', long)]
    send_to: Option<String>,

    /// MQTT broker address (tcp|ssl://host:port)
    #[arg(short = 'b', long)]
    mqtt_broker_addr: Option<String>,

    /// Topic to subscribe to
    #[arg(short = 's', long)]
    mqtt_sub_topic: Option<String>,

    /// Topic to publish received datagrams to
    #[arg(short = 'p', long)]
    mqtt_pub_topic: Option<String>,

    /// Base64-log every payload crossing the bridge
    #[arg(long)]
    log_data: bool,

    /// Receive buffer size in bytes
    #[arg(long)]
    max_msg_size: Option<i64>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, value_enum)]
    log_level: Option<LogLevel>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match Config::load(&args.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error loading config file: {}", e);
            std::process::exit(1);
        }
    };

    // CLI args override file config
    if let Some(listen) = args.listen {
        config.listen = listen;
    }
    if let Some(send_to) = args.send_to {
        config.send_to = send_to;
    }
    if let Some(broker) = args.mqtt_broker_addr {
        config.mqtt.broker = broker;
    }
    if let Some(topic) = args.mqtt_sub_topic {
        config.mqtt.sub.topic = topic;
    }
    if let Some(topic) = args.mqtt_pub_topic {
        config.mqtt.publish.topic = topic;
    }
    if args.log_data {
        config.log_data = true;
    }
    if let Some(size) = args.max_msg_size {
        config.max_msg_size = size;
    }

    // Setup logging - CLI overrides config, config overrides default (info)
    let log_level = args.log_level.unwrap_or_else(|| {
        match config.log.level.to_lowercase().as_str() {
            "error" => LogLevel::Error,
            "warn" => LogLevel::Warn,
            "info" => LogLevel::Info,
            "debug" => LogLevel::Debug,
            "trace" => LogLevel::Trace,
            _ => LogLevel::Info,
        }
    });

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level.to_tracing_level())
        .with_target(false)
        .with_thread_ids(true)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Loaded configuration from {:?}", args.config);

    if let Err(e) = config.validate() {
        eprintln!("Error in configuration: {}", e);
        std::process::exit(1);
    }

    run(config).await
}

async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let listen = Endpoint::parse(&config.listen)?;
    let send_to = Endpoint::parse(&config.send_to)?;

    // Invalid MQTT options fail here, before any socket is touched.
    let mut client = MqttClient::new(&config.mqtt)?;

    let sender = DatagramSender::dial(&send_to).await?;
    let listener = DatagramListener::bind(&listen, config.effective_max_msg_size()).await?;

    let bridge = Arc::new(ForwardingBridge::new(
        &config,
        client.publisher(),
        sender,
    )?);

    client.start(bridge.clone());

    info!(
        "listening at [{}], will send mqtt msg to [{}]",
        config.listen, config.send_to
    );

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    // First signal shuts down gracefully, a second one exits immediately.
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::spawn(async move {
        let mut signals = 0u32;
        loop {
            tokio::select! {
                _ = sigint.recv() => {}
                _ = sigterm.recv() => {}
            }
            signals += 1;
            if signals == 1 {
                info!("shutdown signal received, stopping listener");
                let _ = shutdown_tx.send(());
            } else {
                error!("second shutdown signal received, exiting now");
                std::process::exit(1);
            }
        }
    });

    let listener_task = tokio::spawn(listener.run(bridge, shutdown_rx));
    if let Err(e) = listener_task.await {
        error!("listener task failed: {}", e);
    }

    // Give in-flight publishes a chance to reach the broker.
    client.destroy(true).await;

    info!("mqfwd stopped");
    Ok(())
}
