//! serial-scanner - Live serial-number scanner
//!
//! Runs the scan loop against a replayed camera feed, reading operator
//! commands from stdin and printing each tick's report when it changes.

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::{unbounded, Receiver};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use serial_scanner::capture::ImageSequenceSource;
use serial_scanner::config::{self, AppConfig};
use serial_scanner::lookup::{EnrichmentClient, LookupWorker};
use serial_scanner::shared::{clamp_threshold, OperatorCommand, Rotation};
use serial_scanner::storage::{self, SerialHistory};
use serial_scanner::vision::TextExtractor;
use serial_scanner::ScanPipeline;

/// Extra time a lookup gets on top of the HTTP timeout before it is abandoned
const LOOKUP_GRACE: Duration = Duration::from_secs(5);

/// serial-scanner - Live serial-number scanner
#[derive(Parser, Debug)]
#[command(name = "serial-scanner")]
#[command(about = "Reads serial numbers from a camera feed and looks them up")]
struct Args {
    /// Config file (defaults to config.toml in the config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Image file or directory replayed as the camera feed
    #[arg(short, long)]
    source: Option<PathBuf>,

    /// Initial binarization threshold (clamped into 0-255)
    #[arg(short, long, allow_negative_numbers = true)]
    threshold: Option<i32>,

    /// Initial rotation in degrees (0, 90, 180 or 270)
    #[arg(short, long)]
    rotation: Option<u32>,

    /// Run a single tick, wait for its lookups and print the records
    #[arg(long)]
    once: bool,

    /// Stop after this many ticks
    #[arg(long)]
    max_ticks: Option<u64>,

    /// Write the history as JSON to this path on exit
    #[arg(long)]
    export: Option<PathBuf>,

    /// Continue from a previously exported history, retrying pending lookups
    #[arg(long)]
    resume: Option<PathBuf>,

    /// Write the effective configuration and exit
    #[arg(long)]
    write_config: bool,
}

fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => storage::get_config_dir()?.join("config.toml"),
    };
    let mut config = load_config_or_default(&config_path, args.config.is_some())?;
    apply_args(&mut config, &args)?;

    if args.write_config {
        config::save_config(&config, &config_path)?;
        println!("Wrote configuration to {}", config_path.display());
        return Ok(());
    }

    config.apply_env_overrides();

    info!("serial-scanner starting...");

    let source = ImageSequenceSource::from_settings(&config.capture)
        .context("Failed to open frame source")?;
    info!("Replaying {} frame(s)", source.len());

    let extractor = build_extractor(&config)?;

    let client = EnrichmentClient::new(config.lookup.clone())?;
    let deadline = client.timeout() + LOOKUP_GRACE;
    let worker = LookupWorker::new(Arc::new(client), deadline)
        .context("Failed to start lookup worker")?;

    let history = match &args.resume {
        Some(path) => {
            let history = storage::load_history(path)
                .with_context(|| format!("Failed to resume history from {:?}", path))?;
            info!("Resumed {} serials from {:?}", history.len(), path);
            history
        }
        None => SerialHistory::new(),
    };

    let mut pipeline = ScanPipeline::new(
        &config,
        Box::new(source),
        extractor,
        worker,
        history,
    );
    pipeline.resubmit_pending();

    if args.once {
        let report = pipeline.tick();
        println!("{}", report.text);
        pipeline.await_lookups(deadline);
        print_history(pipeline.history());
    } else {
        let commands = spawn_input_thread();
        run_loop(&mut pipeline, &config, &commands, args.max_ticks)?;
        if pipeline.lookups_in_flight() > 0 {
            warn!("Abandoning {} in-flight lookups", pipeline.lookups_in_flight());
        }
    }

    if let Some(path) = &args.export {
        storage::save_history(pipeline.history(), path)?;
    }

    info!(
        "serial-scanner shutdown complete ({} serials, {} successful)",
        pipeline.history().len(),
        pipeline.history().success_count()
    );

    Ok(())
}

/// Load configuration from file or fall back to defaults
fn load_config_or_default(path: &Path, explicit: bool) -> Result<AppConfig> {
    if path.exists() {
        let config = config::load_config(path)
            .with_context(|| format!("Failed to load configuration from {:?}", path))?;
        info!("Loaded configuration from {:?}", path);
        return Ok(config);
    }
    if explicit {
        anyhow::bail!("Configuration file {:?} does not exist", path);
    }
    info!("Using default configuration");
    Ok(AppConfig::default())
}

/// Overlay command-line options onto the configuration
fn apply_args(config: &mut AppConfig, args: &Args) -> Result<()> {
    if let Some(source) = &args.source {
        config.capture.source = Some(source.clone());
    }
    if let Some(threshold) = args.threshold {
        config.preprocess.threshold = clamp_threshold(threshold.into());
    }
    if let Some(degrees) = args.rotation {
        config.preprocess.rotation = Rotation::from_degrees(degrees)
            .with_context(|| format!("Unsupported rotation {}°", degrees))?;
    }
    Ok(())
}

#[cfg(feature = "ocr")]
fn build_extractor(config: &AppConfig) -> Result<Box<dyn TextExtractor>> {
    let extractor = serial_scanner::vision::TesseractExtractor::new(&config.ocr)
        .context("Failed to initialize OCR engine")?;
    Ok(Box::new(extractor))
}

#[cfg(not(feature = "ocr"))]
fn build_extractor(_config: &AppConfig) -> Result<Box<dyn TextExtractor>> {
    anyhow::bail!("No OCR engine available: rebuild with `--features ocr`")
}

/// Read operator commands from stdin on a background thread
fn spawn_input_thread() -> Receiver<OperatorCommand> {
    let (tx, rx) = unbounded();

    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            match OperatorCommand::parse(&line) {
                Some(command) => {
                    if tx.send(command).is_err() {
                        break;
                    }
                }
                None => eprintln!("Unknown command {:?} (+ - t <n> r s p <serial> l q)", line),
            }
        }
    });

    rx
}

/// Tick at the configured rate until quit or the tick limit
fn run_loop(
    pipeline: &mut ScanPipeline,
    config: &AppConfig,
    commands: &Receiver<OperatorCommand>,
    max_ticks: Option<u64>,
) -> Result<()> {
    let period = Duration::from_secs_f64(1.0 / config.capture.fps.max(1) as f64);
    info!("Scanning at {} fps (commands: + - t <n> r s p <serial> l q)", config.capture.fps);

    loop {
        let started = Instant::now();

        while let Ok(command) = commands.try_recv() {
            if command == OperatorCommand::Quit {
                info!("Quit requested");
                return Ok(());
            }
            handle_command(pipeline, &command)?;
        }

        let report = pipeline.tick();
        if report.changed {
            println!("{}", report.text);
        }
        for record in &report.completed {
            println!(
                "{}: {} {}",
                record.serial_number,
                record.status,
                record.name
            );
        }

        if max_ticks.is_some_and(|max| pipeline.runtime().ticks >= max) {
            debug!("Tick limit reached");
            return Ok(());
        }

        if let Some(remaining) = period.checked_sub(started.elapsed()) {
            std::thread::sleep(remaining);
        }
    }
}

fn handle_command(pipeline: &ScanPipeline, command: &OperatorCommand) -> Result<()> {
    match command {
        OperatorCommand::SaveImages => save_images(pipeline)?,
        OperatorCommand::PrintLabel(serial) => match pipeline.record(serial) {
            Some(record) if !record.label_lines().is_empty() => {
                for line in record.label_lines() {
                    println!("{}", line);
                }
            }
            Some(record) => println!("{} has no label ({})", serial, record.status),
            None => println!("{} has not been scanned", serial),
        },
        OperatorCommand::ListHistory => print_history(pipeline.history()),
        other => {
            let controls = pipeline.controls();
            let mut controls = controls.write();
            if other.apply(&mut controls) {
                info!(
                    "Threshold {} rotation {}",
                    controls.threshold, controls.rotation
                );
            }
        }
    }
    Ok(())
}

/// Save the last raw and processed images as PNG into the data directory
fn save_images(pipeline: &ScanPipeline) -> Result<()> {
    let (raw, processed) = pipeline.last_images();
    let (Some(raw), Some(processed)) = (raw, processed) else {
        warn!("No frame captured yet, nothing to save");
        return Ok(());
    };

    let dir = storage::get_data_dir()?.join("images");
    std::fs::create_dir_all(&dir)?;
    let stamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();

    let raw_path = dir.join(format!("raw_{}.png", stamp));
    let processed_path = dir.join(format!("processed_{}.png", stamp));
    raw.save(&raw_path)
        .with_context(|| format!("Failed to save {:?}", raw_path))?;
    processed
        .save(&processed_path)
        .with_context(|| format!("Failed to save {:?}", processed_path))?;

    info!("Saved images to {:?}", dir);
    Ok(())
}

fn print_history(history: &SerialHistory) {
    println!(
        "{} serials, {} successful",
        history.len(),
        history.success_count()
    );
    for record in history.iter() {
        println!(
            "  {} {} {} {}",
            record.serial_number, record.status, record.name, record.description
        );
    }
}
