// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/homewatch

//! HomeWatch - home hazard and front-door watch service

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use homewatch::alerting::HazardPolicy;
use homewatch::{Config, Engine, VERSION};

/// HomeWatch - camera pipelines with debounced hazard and visitor alerts
#[derive(Parser, Debug)]
#[command(name = "homewatch")]
#[command(author = "HomeWatch Project")]
#[command(version = VERSION)]
#[command(about = "Fire/smoke alerts and front-door face identification")]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Enable trace-level logging
    #[arg(long)]
    trace: bool,

    /// Demo mode with simulated cameras
    #[arg(long)]
    demo: bool,

    /// Reference image directory
    #[arg(long)]
    images_dir: Option<PathBuf>,

    /// MJPEG viewer port
    #[arg(long)]
    http_port: Option<u16>,

    /// WebSocket server port
    #[arg(long)]
    ws_port: Option<u16>,

    /// MQTT broker address
    #[arg(long)]
    mqtt_broker: Option<String>,

    /// Rate-limit hazard alerts to one per this many seconds
    #[arg(long)]
    cooldown: Option<f64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load or create configuration
    let config_path = args.config.unwrap_or_else(Config::default_path);
    let mut config = Config::load_or_create(&config_path)?;

    // Initialize logging; flags win over the configured level
    let log_level = if args.trace {
        Level::TRACE
    } else if args.debug {
        Level::DEBUG
    } else {
        config.log_level().unwrap_or(Level::INFO)
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(args.debug)
        .with_line_number(args.debug)
        .with_ansi(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("{} v{} - home hazard and front-door watch", config.app_name, VERSION);

    // Override with command line args
    if args.demo {
        config.demo_mode = true;
    }
    if let Some(images_dir) = args.images_dir {
        config.identity.images_dir = images_dir;
    }
    if let Some(port) = args.http_port {
        config.streaming.http_port = port;
    }
    if let Some(port) = args.ws_port {
        config.streaming.websocket_port = port;
    }
    if let Some(mqtt) = args.mqtt_broker {
        config.streaming.mqtt_enabled = true;
        config.streaming.mqtt_broker = mqtt;
    }
    if let Some(cooldown_secs) = args.cooldown {
        config.hazard.policy = HazardPolicy::Cooldown { cooldown_secs };
    }
    config.validate()?;

    info!("Configuration loaded from {:?}", config_path);
    info!("Demo mode: {}", config.demo_mode);
    info!("Hazard policy: {:?}", config.hazard.policy);

    let mut engine = Engine::new(config);
    engine.start().await?;

    info!("HomeWatch running, press Ctrl+C to shut down");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;

    info!("Shutdown signal received, cleaning up...");
    engine.stop().await?;
    info!("HomeWatch shutdown complete after {}s", engine.uptime());

    Ok(())
}
