// src/main.rs

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

use hue_hunter::PickerConfig;
use hue_hunter::grid::GridConfig;
use hue_hunter::picker::console::{ConsoleSurfaceFactory, CtrlCCancelKey};
use hue_hunter::picker::{ColorPicker, PickerOptions};
use hue_hunter::sampler::{SamplerConfig, SamplerManager, SamplerMessage, SamplerSettings};

#[derive(Parser)]
#[command(name = "hue-hunter")]
#[command(version)]
#[command(about = "Magnifying screen color picker", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the sampler binary (overrides HUE_HUNTER_SAMPLER_BIN)
    #[arg(long, global = true, env = "HUE_HUNTER_SAMPLER_BIN")]
    sampler: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true, default_value_t = false)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Pick a color interactively and print its hex value
    Pick,

    /// Stream raw sampler frames to stdout as JSON lines
    Sample {
        /// How long to sample for
        #[arg(long, default_value_t = 5)]
        seconds: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the picked color or frames
    let subscriber = FmtSubscriber::builder()
        .with_max_level(if cli.debug { Level::DEBUG } else { Level::INFO })
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = PickerConfig::from_env();
    if cli.sampler.is_some() {
        config.sampler_binary = cli.sampler.clone();
    }

    match cli.command {
        Commands::Pick => pick(&config).await,
        Commands::Sample { seconds } => sample(&config, Duration::from_secs(seconds)).await,
    }
}

async fn pick(config: &PickerConfig) -> Result<()> {
    let picker = ColorPicker::new(
        PickerOptions::from(config),
        ConsoleSurfaceFactory::new(),
        CtrlCCancelKey,
    );

    match picker.pick_color().await {
        Some(color) => println!("{color}"),
        None => info!("No color selected"),
    }
    Ok(())
}

async fn sample(config: &PickerConfig, duration: Duration) -> Result<()> {
    let settings = SamplerSettings {
        binary: config.sampler_binary.clone(),
        args: Vec::new(),
    };
    let grid = GridConfig::new(config.diameter, config.cell_size);
    let mut sampler = SamplerManager::new(settings);

    let (tx, mut rx) = mpsc::unbounded_channel();
    sampler
        .start(SamplerConfig::new(grid.grid_size(), config.sample_rate), tx)
        .await
        .context("Failed to start sampler")?;

    let deadline = tokio::time::sleep(duration);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            _ = tokio::signal::ctrl_c() => break,
            message = rx.recv() => match message {
                Some(SamplerMessage::Sample(frame)) => {
                    println!("{}", serde_json::to_string(&frame)?);
                }
                Some(SamplerMessage::Error(frame)) => warn!(error = %frame.error, "Sampler error"),
                None => {
                    warn!("Sampler output closed");
                    break;
                }
            },
        }
    }

    sampler.stop().await;
    Ok(())
}
