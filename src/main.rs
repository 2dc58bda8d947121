use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use sketchbooth::capture::{CommandCamera, CommandDetector, CommandPrinter, Printer, SpoolPrinter};
use sketchbooth::config::PrinterConfig;
use sketchbooth::voice::{self, EnergyKeywordClassifier};
use sketchbooth::{
    CapturePipeline, Config, DrawingLookup, Indicator, Orchestrator, TriggerEvent, TriggerFlags,
    WakeWordMonitor,
};

/// Sketchbooth - voice-triggered doodle camera
#[derive(Parser)]
#[command(name = "sketchbooth", version, about)]
struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(short, long, env = "SKETCHBOOTH_CONFIG")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// List audio input devices
    Devices,
    /// List drawing categories in the dataset
    Categories,
    /// Pulse the status LED
    TestLed {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        seconds: u64,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,sketchbooth=info",
        1 => "info,sketchbooth=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Some(Command::Devices) = cli.command {
        return cmd_devices();
    }

    let config = Config::load(cli.config.as_deref())?;
    tracing::debug!(?config, "loaded configuration");

    match cli.command {
        Some(Command::Categories) => cmd_categories(&config),
        Some(Command::TestLed { seconds }) => cmd_test_led(&config, seconds).await,
        Some(Command::Devices) | None => run_appliance(config).await,
    }
}

/// Bring everything up in dependency order and run until Ctrl-C
#[allow(clippy::future_not_send)]
async fn run_appliance(config: Config) -> anyhow::Result<()> {
    let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(()).await;
        }
    });

    let mut drawings = drawing_lookup(&config);
    drawings.setup()?;

    let flags = Arc::new(TriggerFlags::new());
    let button_flags = Arc::clone(&flags);
    let indicator = Indicator::detect(&config.hardware, move || {
        button_flags.raise(TriggerEvent::ManualRequest);
    });

    let classifier =
        EnergyKeywordClassifier::new(config.voice.keywords.len(), config.voice.sensitivity)?;
    let monitor = WakeWordMonitor::start(&config.voice, Box::new(classifier), Arc::clone(&flags))?;

    let camera = CommandCamera::new(
        config.camera.program.clone(),
        config.camera.args.clone(),
        config.camera.device.clone(),
    )
    .with_skip_option(config.camera.skip_option.clone());
    let detector = CommandDetector::new(
        config.detector.program.clone(),
        config.detector.args.clone(),
        &config.detector.labels,
    )?;
    let printer: Box<dyn Printer> = match &config.printer {
        PrinterConfig::Command { program, args } => {
            Box::new(CommandPrinter::new(program.clone(), args.clone()))
        }
        PrinterConfig::Spool { dir } => Box::new(SpoolPrinter::new(dir.clone())?),
    };

    let pipeline = CapturePipeline::new(
        Box::new(camera),
        Box::new(detector),
        drawings,
        printer,
        config.capture.clone(),
    );

    let mut orchestrator = Orchestrator::new(flags, indicator, Some(monitor), pipeline)
        .with_poll_interval(config.poll_interval);

    let phrases: Vec<&str> = config.voice.keywords.iter().map(|k| k.phrase.as_str()).collect();
    tracing::info!(keywords = ?phrases, "sketchbooth ready");

    orchestrator.run(&mut shutdown_rx).await?;

    tracing::info!("sketchbooth stopped");
    Ok(())
}

fn drawing_lookup(config: &Config) -> DrawingLookup {
    DrawingLookup::new(
        config.drawings.dataset_dir.clone(),
        config.drawings.label_map.clone(),
        config.drawings.default_category.clone(),
    )
}

/// List input devices, marking the one auto-selection would pick
fn cmd_devices() -> anyhow::Result<()> {
    let devices = voice::list_input_devices()?;
    if devices.is_empty() {
        println!("No audio input devices found");
        return Ok(());
    }

    let auto = devices.iter().find(|d| d.is_usb()).map(|d| d.index);
    for device in &devices {
        let rate = device
            .default_sample_rate
            .map_or_else(|| "?".to_string(), |r| format!("{r} Hz"));
        let marker = if Some(device.index) == auto { "  (auto)" } else { "" };
        println!("{:>3}  {}  [{rate}]{marker}", device.index, device.name);
    }

    if auto.is_none() {
        println!("\nNo USB microphone found, auto will use the default input");
    }
    Ok(())
}

fn cmd_categories(config: &Config) -> anyhow::Result<()> {
    let mut drawings = drawing_lookup(config);
    drawings.setup()?;

    for category in drawings.categories() {
        let marker = if category == drawings.default_category() {
            "  (default)"
        } else {
            ""
        };
        println!("{category}{marker}");
    }
    println!("\n{} categories in {}", drawings.categories().len(), config.drawings.dataset_dir.display());
    Ok(())
}

async fn cmd_test_led(config: &Config, seconds: u64) -> anyhow::Result<()> {
    let mut indicator = Indicator::detect(&config.hardware, || {
        tracing::info!("button pressed");
    });

    println!("Pulsing LED for {seconds} seconds...");
    indicator.pulse();

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        () = tokio::time::sleep(Duration::from_secs(seconds)) => {}
    }

    indicator.shutdown();
    println!("Done");
    Ok(())
}
