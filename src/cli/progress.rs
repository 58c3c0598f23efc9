//! Progress bar utilities for CLI output
//!
//! Key features:
//! - One progress bar per dataset, driven by pipeline events
//! - Progress bars that suspend cleanly when printing warnings
//! - Consistent visual styling across all commands

use crate::core::pipeline::{DatasetReport, PipelineEvent};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::Write;
use std::sync::Mutex;
use std::time::{Duration, Instant};

// ============================================================================
// Styles - Consistent visual appearance
// ============================================================================

/// Get the progress bar style for a dataset being classified
fn progress_bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("  {spinner:.green} {prefix:.bold} [{bar:40.cyan/dim}] {pos}/{len} ({percent}%) {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("━━╾─")
}

/// Get the style for completed progress bars
fn completed_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("  ✓ {prefix:.bold} [{bar:40.green/dim}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("━━━")
}

// ============================================================================
// Console output helpers
// ============================================================================

/// Print a header section with a box
pub fn print_header(title: &str) {
    let width = 68;
    let title_padded = format!("{:^width$}", title, width = width - 4);
    println!();
    println!("╔{}╗", "═".repeat(width - 2));
    println!("║{}║", title_padded);
    println!("╚{}╝", "═".repeat(width - 2));
    println!();
}

/// Print a success message with checkmark
pub fn print_success(msg: &str) {
    println!("  ✓ {}", msg);
}

/// Print an info message with bullet
pub fn print_info(msg: &str) {
    println!("  • {}", msg);
}

/// Print a warning message
pub fn print_warning(msg: &str) {
    println!("  ⚠ {}", msg);
}

/// Print an error message
pub fn print_error(msg: &str) {
    println!("  ✗ {}", msg);
}

// ============================================================================
// Run progress tracker
// ============================================================================

/// Renders pipeline events as one progress bar per dataset
pub struct RunProgress {
    current: Mutex<Option<ProgressBar>>,
    hidden: bool,
    start_time: Instant,
}

impl RunProgress {
    pub fn new() -> Self {
        Self::with_visibility(false)
    }

    /// Tracker that counts events without drawing anything
    pub fn hidden() -> Self {
        Self::with_visibility(true)
    }

    fn with_visibility(hidden: bool) -> Self {
        Self {
            current: Mutex::new(None),
            hidden,
            start_time: Instant::now(),
        }
    }

    /// Update the display for one pipeline event
    pub fn handle(&self, event: PipelineEvent) {
        match event {
            PipelineEvent::DatasetStarted {
                dataset_id,
                pending,
            } => self.start_dataset(&dataset_id, pending),
            PipelineEvent::ItemProcessed {
                photo_id,
                dominant_object,
                ..
            } => {
                self.with_bar(|bar| {
                    bar.set_message(format!(
                        "{} → {}",
                        photo_id,
                        dominant_object.as_deref().unwrap_or("-")
                    ));
                    bar.inc(1);
                });
            }
            PipelineEvent::ItemSkipped {
                photo_id, reason, ..
            } => {
                self.with_bar(|bar| {
                    bar.suspend(|| println!("  ⚠ Skipped {}: {}", photo_id, reason));
                    bar.inc(1);
                });
            }
            PipelineEvent::DatasetFinished { report } => self.finish_dataset(&report),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    fn start_dataset(&self, dataset_id: &str, pending: usize) {
        let bar = ProgressBar::new(pending as u64);
        if self.hidden {
            bar.set_draw_target(ProgressDrawTarget::hidden());
        }
        bar.set_style(progress_bar_style());
        bar.set_prefix(dataset_id.to_string());
        if pending == 0 {
            bar.set_message("nothing pending");
        } else {
            bar.enable_steady_tick(Duration::from_millis(100));
            bar.set_message("Starting...");
        }

        if let Ok(mut current) = self.current.lock() {
            if let Some(previous) = current.replace(bar) {
                previous.finish_and_clear();
            }
        }
    }

    fn finish_dataset(&self, report: &DatasetReport) {
        let Some(bar) = self.current.lock().ok().and_then(|mut c| c.take()) else {
            return;
        };

        bar.set_style(completed_style());
        let mut message = format!("{} processed", report.processed);
        if report.classification_failures > 0 {
            message.push_str(&format!(", {} failed", report.classification_failures));
        }
        if report.left_pending() > 0 {
            message.push_str(&format!(", {} left pending", report.left_pending()));
        }
        bar.finish_with_message(message);
    }

    fn with_bar<F: FnOnce(&ProgressBar)>(&self, f: F) {
        if let Ok(current) = self.current.lock() {
            if let Some(bar) = current.as_ref() {
                f(bar);
            }
        }
    }
}

impl Default for RunProgress {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Utility functions
// ============================================================================

/// Format duration as human-readable string
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 3600 {
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        format!("{}h {}m", hours, mins)
    } else if secs >= 60 {
        let mins = secs / 60;
        let secs = secs % 60;
        format!("{}m {}s", mins, secs)
    } else {
        format!("{:.1}s", duration.as_secs_f64())
    }
}

/// Render a completion ratio as a percentage
pub fn format_percent(done: usize, total: usize) -> String {
    if total == 0 {
        "100%".to_string()
    } else {
        format!("{:.0}%", done as f64 * 100.0 / total as f64)
    }
}

// ============================================================================
// Dual writer for file + console logging
// ============================================================================

/// A writer that writes to both console and file
///
/// Used for logging to both stderr and a log file simultaneously.
pub struct DualWriter {
    pub console: std::io::Stderr,
    pub file: std::fs::File,
}

impl Write for DualWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let _ = self.console.write(buf);
        self.file.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let _ = self.console.flush();
        self.file.flush()
    }
}
