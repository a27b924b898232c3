//! Audio splitter (split-audio) - Main entry point
//!
//! Routes one capture device to two render devices with independent delay,
//! gain and left/right assignment. Settings persist between runs.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use split_audio::backend::{preferred_inputs, preferred_outputs, CpalBackend, DeviceInfo};
use split_audio::{
    AudioEngine, BlockTiming, ChannelMapping, Destination, DeviceId, EngineEvent, Settings,
    DEFAULT_BLOCK_SIZE, DEFAULT_SAMPLE_RATE, DEFAULT_SETTINGS_FILE,
};
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for split-audio
#[derive(Parser, Debug)]
#[command(name = "split-audio")]
#[command(about = "Split one audio input across two delayed outputs")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List audio devices and their ids
    Devices,
    /// Start splitting until Ctrl+C
    Run(RunArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Settings file to load and update
    #[arg(short, long, default_value = DEFAULT_SETTINGS_FILE, env = "SPLIT_AUDIO_CONFIG")]
    config: PathBuf,

    /// Capture device id
    #[arg(long)]
    input: Option<usize>,

    /// Render device id for destination 1
    #[arg(long)]
    out1: Option<usize>,

    /// Render device id for destination 2
    #[arg(long)]
    out2: Option<usize>,

    /// Destination 1 delay in milliseconds
    #[arg(long)]
    delay1: Option<f64>,

    /// Destination 2 delay in milliseconds
    #[arg(long)]
    delay2: Option<f64>,

    /// Destination 1 linear gain
    #[arg(long)]
    vol1: Option<f32>,

    /// Destination 2 linear gain
    #[arg(long)]
    vol2: Option<f32>,

    /// Send the right channel to destination 1 and the left to destination 2
    #[arg(long)]
    swapped: bool,

    /// Sample rate in Hz
    #[arg(long, default_value_t = DEFAULT_SAMPLE_RATE)]
    sample_rate: u32,

    /// Frames per block
    #[arg(long, default_value_t = DEFAULT_BLOCK_SIZE)]
    block_size: usize,

    /// Seconds between stats log lines
    #[arg(long, default_value = "10")]
    stats_interval: u64,
}

impl RunArgs {
    fn apply(&self, settings: &mut Settings) {
        if let Some(id) = self.input {
            settings.input = DeviceId(id);
        }
        if let Some(id) = self.out1 {
            settings.out1 = DeviceId(id);
        }
        if let Some(id) = self.out2 {
            settings.out2 = DeviceId(id);
        }
        if let Some(ms) = self.delay1 {
            settings.delay1 = ms;
        }
        if let Some(ms) = self.delay2 {
            settings.delay2 = ms;
        }
        if let Some(gain) = self.vol1 {
            settings.vol1 = gain;
        }
        if let Some(gain) = self.vol2 {
            settings.vol2 = gain;
        }
        if self.swapped {
            settings.mapping = ChannelMapping::Swapped;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "split_audio=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Devices => list_devices(),
        Command::Run(args) => run(args).await,
    }
}

fn list_devices() -> Result<()> {
    let devices = CpalBackend::new()
        .list_devices()
        .context("Failed to enumerate audio devices")?;

    let inputs = preferred_inputs(&devices);
    let outputs = preferred_outputs(&devices);
    let marker = |preferred: &[&DeviceInfo], device: &DeviceInfo| {
        if preferred.iter().any(|d| d.id == device.id) {
            "*"
        } else {
            " "
        }
    };

    println!("Inputs:");
    for device in devices.iter().filter(|d| d.is_input()) {
        println!(
            " {} {:>4}  {} ({} ch)",
            marker(&inputs, device),
            device.id.0,
            device.name,
            device.max_input_channels
        );
    }
    println!("Outputs:");
    for device in devices.iter().filter(|d| d.is_output()) {
        println!(
            " {} {:>4}  {} ({} ch)",
            marker(&outputs, device),
            device.id.0,
            device.name,
            device.max_output_channels
        );
    }
    Ok(())
}

async fn run(args: RunArgs) -> Result<()> {
    let mut settings = Settings::load(&args.config);
    args.apply(&mut settings);

    let timing = BlockTiming {
        sample_rate: args.sample_rate,
        block_size: args.block_size,
    };
    let config = settings.to_engine_config(timing);

    let mut engine = AudioEngine::new(CpalBackend::new()).on_event(|event| match event {
        EngineEvent::BlockDropped { .. } => tracing::trace!(?event, "Engine event"),
        event => tracing::debug!(?event, "Engine event"),
    });
    engine
        .start(&config)
        .context("Failed to start audio engine")?;

    if let Err(e) = settings.save(&args.config) {
        tracing::warn!(error = %e, "Failed to save settings");
    }

    let depths = engine.delay_depths();
    for destination in Destination::ALL {
        info!(
            %destination,
            requested_ms = config.parameters.delay_ms(destination),
            effective_ms = timing
                .latency_for_depth(depths[destination.index()])
                .as_secs_f64()
                * 1000.0,
            "Delay"
        );
    }

    let mut ticker = tokio::time::interval(Duration::from_secs(args.stats_interval.max(1)));
    ticker.tick().await;
    loop {
        tokio::select! {
            result = signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl+C")?;
                info!("Received Ctrl+C, shutting down");
                break;
            }
            _ = ticker.tick() => {
                let stats = engine.stats();
                info!(
                    blocks = stats.blocks_processed,
                    written1 = stats.blocks_written[0],
                    written2 = stats.blocks_written[1],
                    dropped = stats.total_dropped(),
                    "Stats"
                );
            }
        }
    }

    let failures = engine.stop();
    if !failures.is_empty() {
        tracing::warn!(count = failures.len(), "Some streams did not shut down cleanly");
    }
    info!("Shutdown complete");
    Ok(())
}
