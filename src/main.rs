//! Photo Batch Tracker - CLI Entry Point
//!
//! Runs an external object-detection classifier over photo datasets and
//! tracks per-photo progress so interrupted runs can resume.
//!
//! This binary is a thin wrapper around the library, handling argument parsing,
//! logging setup, and command dispatch.

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Builder;
use log::{info, LevelFilter};
use photo_batch_tracker::cli::{self, Args, DualWriter};
use photo_batch_tracker::core::config::{Config, LoggingConfig};
use photo_batch_tracker::{NAME, VERSION};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = if let Some(ref config_path) = args.config {
        Config::load(config_path)?
    } else {
        Config::load_default().unwrap_or_else(|e| {
            eprintln!("Warning: {}. Using default settings.", e);
            Config::default()
        })
    };

    // Apply CLI overrides to config
    cli::apply_overrides(&mut config, &args);

    // Set up graceful shutdown handler
    let shutdown_flag = Arc::new(AtomicBool::new(false));
    let shutdown_flag_clone = shutdown_flag.clone();

    ctrlc::set_handler(move || {
        if shutdown_flag_clone.load(Ordering::SeqCst) {
            // Second Ctrl+C - force exit
            eprintln!("\nForce shutdown requested. Exiting immediately...");
            std::process::exit(1);
        } else {
            shutdown_flag_clone.store(true, Ordering::SeqCst);
            eprintln!("\nGraceful shutdown requested. Finishing current photo... (Press Ctrl+C again to force quit)");
        }
    })
    .context("Failed to set Ctrl+C handler")?;

    init_logging(&config.logging)?;

    info!("{} v{}", NAME, VERSION);

    cli::run_command(&args, &config, shutdown_flag)
}

fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let log_level = match logging.level.to_lowercase().as_str() {
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    };

    let mut builder = Builder::new();
    builder.filter_level(log_level).format(|buf, record| {
        writeln!(
            buf,
            "[{} {} {}] {}",
            chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
            record.level(),
            record.target(),
            record.args()
        )
    });

    if logging.log_to_file {
        if let Some(parent) = logging.log_file.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create log directory '{}'", parent.display()))?;
        }

        let log_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&logging.log_file)
            .with_context(|| {
                format!("Failed to open log file '{}'", logging.log_file.display())
            })?;

        builder
            .target(env_logger::Target::Pipe(Box::new(DualWriter {
                console: std::io::stderr(),
                file: log_file,
            })))
            .init();

        info!("Logging to file: {}", logging.log_file.display());
    } else {
        builder.init();
    }

    Ok(())
}
