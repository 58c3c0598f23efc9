//! Command handler implementations
//!
//! This module contains the implementation of all CLI commands.

use crate::classifier::CommandClassifier;
use crate::cli::progress::{
    format_duration, format_percent, print_error, print_header, print_info, print_success,
    print_warning, RunProgress,
};
use crate::cli::{Args, Commands};
use crate::core::config::{init_config, Config};
use crate::core::pipeline::{Pipeline, PipelineOptions, RunSummary};
use crate::core::registry::Registry;
use crate::core::results::JsonResultWriter;
use crate::core::store::JsonFileStore;
use crate::source::{Discoverer, FsDatasetSource};
use anyhow::{bail, Context, Result};
use log::{info, warn};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Apply command-line overrides on top of the loaded configuration
pub fn apply_overrides(config: &mut Config, args: &Args) {
    if let Some(ref dir) = args.datasets_dir {
        config.paths.datasets_dir = dir.clone();
    }
    if let Some(ref file) = args.registry_file {
        config.paths.registry_file = file.clone();
    }
    if let Some(ref dir) = args.results_dir {
        config.paths.results_dir = dir.clone();
    }
    if let Some(ref command) = args.classifier {
        config.classifier.command = command.clone();
    }
    if let Some(workers) = args.workers {
        config.classifier.workers = workers;
    }
    if let Some(timeout) = args.timeout_secs {
        config.classifier.timeout_secs = timeout;
    }
    if let Some(ref level) = args.log_level {
        config.logging.level = level.clone();
    }
}

/// Run the appropriate command based on CLI arguments
pub fn run_command(args: &Args, config: &Config, shutdown_flag: Arc<AtomicBool>) -> Result<()> {
    match args.command.clone().unwrap_or(Commands::Run) {
        Commands::Run => run_pipeline(config, shutdown_flag),
        Commands::Status { json } => show_status(config, json),
        Commands::Pending { dataset } => list_pending(config, &dataset),
        Commands::Discover => discover_datasets(config),
        Commands::ShowConfig => {
            show_config(config);
            Ok(())
        }
        Commands::GenerateConfig { output } => generate_config_file(output),
    }
}

/// Open the registry file named in the configuration
fn open_registry(config: &Config) -> Result<Registry> {
    let store = JsonFileStore::new(&config.paths.registry_file);
    Registry::open(Box::new(store)).with_context(|| {
        format!(
            "Failed to open registry '{}'",
            config.paths.registry_file.display()
        )
    })
}

/// Discover, register and classify every pending photo
pub fn run_pipeline(config: &Config, shutdown_flag: Arc<AtomicBool>) -> Result<()> {
    let Some(classifier) = CommandClassifier::from_config(&config.classifier) else {
        bail!(
            "No classifier configured. Set [classifier] command in the config file or pass --classifier"
        );
    };

    let registry = open_registry(config)?;
    let source = FsDatasetSource::new(&config.paths.datasets_dir);
    let writer = JsonResultWriter::new(&config.paths.results_dir, config.results.merge_existing);
    let options = PipelineOptions::from(&config.classifier);

    print_header("PHOTO BATCH CLASSIFICATION");
    print_info(&format!("Datasets: {}", config.paths.datasets_dir.display()));
    print_info(&format!("Registry: {}", config.paths.registry_file.display()));
    print_info(&format!(
        "Classifier: {} ({} worker(s), timeout {})",
        classifier.program(),
        options.workers,
        options
            .timeout
            .map(format_duration)
            .unwrap_or_else(|| "none".to_string())
    ));
    println!();

    let progress = RunProgress::new();
    let summary = Pipeline::new(&registry, &source, &source, Arc::new(classifier), &writer)
        .with_options(options)
        .with_shutdown_flag(shutdown_flag)
        .run(|event| progress.handle(event))?;

    print_run_summary(&summary, &progress);
    Ok(())
}

fn print_run_summary(summary: &RunSummary, progress: &RunProgress) {
    println!();
    if summary.interrupted {
        print_warning("Run interrupted. Pending photos will be picked up on the next run.");
    }

    for (dataset_id, reason) in &summary.rejected {
        print_error(&format!("Rejected dataset {}: {}", dataset_id, reason));
    }
    for report in &summary.datasets {
        if let Some(ref error) = report.results_error {
            print_error(&format!("Results for {} were not saved: {}", report.dataset_id, error));
        }
    }

    print_success(&format!(
        "Processed {} photo(s) across {} dataset(s) in {}",
        summary.total_processed(),
        summary.datasets.len(),
        format_duration(progress.elapsed())
    ));
    if summary.total_classification_failures() > 0 {
        print_warning(&format!(
            "{} photo(s) could not be classified (recorded without a label)",
            summary.total_classification_failures()
        ));
    }
    if summary.total_missing() > 0 {
        print_warning(&format!(
            "{} photo(s) missing on disk, left pending",
            summary.total_missing()
        ));
    }
    if summary.total_timed_out() > 0 {
        print_warning(&format!(
            "{} photo(s) timed out, left pending",
            summary.total_timed_out()
        ));
    }
    for path in summary.results_files() {
        print_info(&format!("Results: {}", path.display()));
    }
    println!();
}

/// Show per-dataset progress
pub fn show_status(config: &Config, json: bool) -> Result<()> {
    let registry = open_registry(config)?;
    let status = registry.status()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    print_header("REGISTRY STATUS");
    if status.is_empty() {
        print_info("No datasets registered yet");
        println!();
        return Ok(());
    }

    println!(
        "  {:<30} {:>8} {:>10} {:>8} {:>6}",
        "DATASET", "TOTAL", "PROCESSED", "PENDING", "DONE"
    );
    for entry in &status {
        println!(
            "  {:<30} {:>8} {:>10} {:>8} {:>6}",
            entry.dataset_id,
            entry.total,
            entry.processed,
            entry.pending,
            format_percent(entry.processed, entry.total)
        );
    }

    let complete = status.iter().filter(|s| s.is_complete()).count();
    println!();
    print_info(&format!("{} of {} dataset(s) complete", complete, status.len()));
    println!();
    Ok(())
}

/// Print the pending photo ids of one dataset, one per line
pub fn list_pending(config: &Config, dataset_id: &str) -> Result<()> {
    let registry = open_registry(config)?;
    for photo_id in registry.pending_items(dataset_id)? {
        println!("{}", photo_id);
    }
    Ok(())
}

/// Show what discovery would register, without touching the registry
pub fn discover_datasets(config: &Config) -> Result<()> {
    let source = FsDatasetSource::new(&config.paths.datasets_dir);
    let datasets = source.discover()?;

    print_header("DISCOVERED DATASETS");
    if datasets.is_empty() {
        warn!(
            "No datasets with photos found in {}",
            config.paths.datasets_dir.display()
        );
        print_info("No datasets found");
    }
    for dataset in &datasets {
        print_info(&format!(
            "{} ({} photos)",
            dataset.dataset_id,
            dataset.photo_ids.len()
        ));
    }
    println!();
    Ok(())
}

/// Generate a configuration file at the specified or default location
pub fn generate_config_file(output: Option<PathBuf>) -> Result<()> {
    let output_path = match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, Config::generate_default_config())
                .with_context(|| format!("Failed to write '{}'", path.display()))?;
            path
        }
        None => init_config()?,
    };

    info!("Configuration file: {}", output_path.display());
    info!("Edit this file to set the datasets directory and classifier command.");
    Ok(())
}

/// Show the current configuration settings
pub fn show_config(config: &Config) {
    let config_path = Config::get_active_config_path();
    info!("Configuration file: {}", config_path.display());
    if !config_path.exists() {
        info!("(Using default settings - no config file found)");
    }
    info!("");
    info!("Current Configuration:");
    info!("----------------------");
    info!("[paths]");
    info!(
        "  datasets_dir = \"{}\"",
        config.paths.datasets_dir.display()
    );
    info!(
        "  registry_file = \"{}\"",
        config.paths.registry_file.display()
    );
    info!("  results_dir = \"{}\"", config.paths.results_dir.display());
    info!("");
    info!("[classifier]");
    if config.classifier.command.trim().is_empty() {
        info!("  command = (not set)");
    } else {
        info!("  command = \"{}\"", config.classifier.command);
    }
    info!("  args = {:?}", config.classifier.args);
    info!("  timeout_secs = {}", config.classifier.timeout_secs);
    info!("  workers = {}", config.classifier.workers);
    info!("");
    info!("[results]");
    info!("  merge_existing = {}", config.results.merge_existing);
    info!("");
    info!("[logging]");
    info!("  level = \"{}\"", config.logging.level);
    info!("  log_to_file = {}", config.logging.log_to_file);
    info!("  log_file = \"{}\"", config.logging.log_file.display());
}
