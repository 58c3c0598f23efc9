//! Pipeline driver
//!
//! One pass of the pipeline:
//!
//! 1. **Discover** datasets. A discovery failure aborts the run.
//! 2. **Register** every discovered dataset. Known datasets are left as they
//!    are, so progress from earlier runs is kept.
//! 3. **Process** each dataset in discovery order. For every pending photo:
//!    resolve its path, classify it, mark it processed, record the result.
//!    - A missing file is skipped and stays pending for the next run.
//!    - A classifier timeout is handled the same way.
//!    - A classifier failure still consumes the photo; its result has no
//!      `dominant_object`.
//! 4. **Write** the dataset's results if any photo was processed.
//!
//! There is no dataset-level transaction. A crash part-way through a dataset
//! leaves some photos processed and the rest pending, and the next run picks
//! up from there.
//!
//! With more than one worker, photos of a dataset are classified on a rayon
//! thread pool. Registry updates stay serialized by the registry's own lock
//! and result records keep catalog order.

use crate::classifier::{ClassificationError, Classifier, Label};
use crate::core::config::ClassifierConfig;
use crate::core::error::{Result, TrackerError};
use crate::core::registry::Registry;
use crate::core::results::{ResultRecord, ResultSet, ResultWriter};
use crate::source::{Discoverer, PhotoResolver};
use crossbeam_channel::RecvTimeoutError;
use log::{debug, error, info, warn};
use rayon::prelude::*;
use serde::Serialize;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, UNIX_EPOCH};

/// Tuning knobs for a pipeline run
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Per-photo classification timeout (`None` = wait indefinitely)
    pub timeout: Option<Duration>,
    /// Photos classified concurrently within a dataset
    pub workers: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            workers: 1,
        }
    }
}

impl From<&ClassifierConfig> for PipelineOptions {
    fn from(config: &ClassifierConfig) -> Self {
        Self {
            timeout: config.timeout(),
            workers: config.effective_workers(),
        }
    }
}

/// Why a pending photo was left pending
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The photo file does not exist
    MissingFile(PathBuf),
    /// The classifier did not answer in time
    TimedOut(Duration),
    /// The run was stopped before this photo
    Interrupted,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::MissingFile(path) => write!(f, "file not found: {}", path.display()),
            SkipReason::TimedOut(timeout) => {
                write!(f, "classifier timed out after {:.1}s", timeout.as_secs_f64())
            }
            SkipReason::Interrupted => write!(f, "run interrupted"),
        }
    }
}

/// Progress notifications emitted while the pipeline runs
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// Processing of a dataset begins
    DatasetStarted { dataset_id: String, pending: usize },
    /// A photo was classified and marked processed
    ItemProcessed {
        dataset_id: String,
        photo_id: String,
        dominant_object: Option<Label>,
    },
    /// A photo was left pending
    ItemSkipped {
        dataset_id: String,
        photo_id: String,
        reason: SkipReason,
    },
    /// Processing of a dataset ended
    DatasetFinished { report: DatasetReport },
}

/// What happened to one dataset during a run
#[derive(Debug, Clone, Default, Serialize)]
pub struct DatasetReport {
    pub dataset_id: String,
    /// Registered during this run
    pub newly_registered: bool,
    /// Pending photos when processing started
    pub pending_before: usize,
    /// Photos marked processed
    pub processed: usize,
    /// Processed photos whose classification failed
    pub classification_failures: usize,
    /// Photos left pending because their file is missing
    pub missing_files: usize,
    /// Photos left pending because the classifier timed out
    pub timed_out: usize,
    /// Photos left pending because the run stopped
    pub interrupted: usize,
    /// Results file written for this dataset
    pub results_file: Option<PathBuf>,
    /// Why the results file could not be written
    pub results_error: Option<String>,
}

impl DatasetReport {
    /// Photos still pending after this run
    pub fn left_pending(&self) -> usize {
        self.missing_files + self.timed_out + self.interrupted
    }
}

/// Outcome of a whole pipeline run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    /// Per-dataset reports in processing order
    pub datasets: Vec<DatasetReport>,
    /// Datasets rejected at registration, with the reason
    pub rejected: Vec<(String, String)>,
    /// Whether the run stopped early on request
    pub interrupted: bool,
}

impl RunSummary {
    pub fn total_processed(&self) -> usize {
        self.datasets.iter().map(|d| d.processed).sum()
    }

    pub fn total_classification_failures(&self) -> usize {
        self.datasets.iter().map(|d| d.classification_failures).sum()
    }

    pub fn total_missing(&self) -> usize {
        self.datasets.iter().map(|d| d.missing_files).sum()
    }

    pub fn total_timed_out(&self) -> usize {
        self.datasets.iter().map(|d| d.timed_out).sum()
    }

    pub fn total_left_pending(&self) -> usize {
        self.datasets.iter().map(DatasetReport::left_pending).sum()
    }

    pub fn results_files(&self) -> Vec<&Path> {
        self.datasets
            .iter()
            .filter_map(|d| d.results_file.as_deref())
            .collect()
    }
}

/// Drives discovery, registration and classification for one run
pub struct Pipeline<'a> {
    registry: &'a Registry,
    discoverer: &'a dyn Discoverer,
    resolver: &'a dyn PhotoResolver,
    classifier: Arc<dyn Classifier>,
    writer: &'a dyn ResultWriter,
    options: PipelineOptions,
    shutdown_flag: Arc<AtomicBool>,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        registry: &'a Registry,
        discoverer: &'a dyn Discoverer,
        resolver: &'a dyn PhotoResolver,
        classifier: Arc<dyn Classifier>,
        writer: &'a dyn ResultWriter,
    ) -> Self {
        Self {
            registry,
            discoverer,
            resolver,
            classifier,
            writer,
            options: PipelineOptions::default(),
            shutdown_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    /// Stop between photos once `flag` is set
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = flag;
        self
    }

    /// Run one pass over all discovered datasets
    pub fn run<F>(&self, on_event: F) -> Result<RunSummary>
    where
        F: Fn(PipelineEvent) + Sync,
    {
        info!("Discovering datasets...");
        let datasets = self.discoverer.discover()?;
        info!("Found {} dataset(s)", datasets.len());

        let pool = if self.options.workers > 1 {
            Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(self.options.workers)
                    .thread_name(|i| format!("classify-worker-{}", i))
                    .build()
                    .map_err(|e| {
                        TrackerError::IoError(format!("Failed to start worker pool: {}", e))
                    })?,
            )
        } else {
            None
        };

        let mut summary = RunSummary::default();
        let mut accepted = Vec::with_capacity(datasets.len());

        for dataset in &datasets {
            match self.registry.register(&dataset.dataset_id, &dataset.photo_ids) {
                Ok(newly_registered) => {
                    accepted.push((dataset.dataset_id.as_str(), newly_registered))
                }
                Err(TrackerError::InvalidInput(message)) => {
                    error!("Rejected dataset '{}': {}", dataset.dataset_id, message);
                    summary.rejected.push((dataset.dataset_id.clone(), message));
                }
                Err(e) => return Err(e),
            }
        }

        for (dataset_id, newly_registered) in accepted {
            if self.shutdown_flag.load(Ordering::SeqCst) {
                warn!("Shutdown requested, not starting dataset '{}'", dataset_id);
                summary.interrupted = true;
                break;
            }

            info!("Processing dataset: {}", dataset_id);
            let report =
                self.process_dataset(dataset_id, newly_registered, pool.as_ref(), &on_event)?;
            on_event(PipelineEvent::DatasetFinished {
                report: report.clone(),
            });
            summary.datasets.push(report);
        }

        if self.shutdown_flag.load(Ordering::SeqCst) {
            summary.interrupted = true;
        }

        info!(
            "Pipeline completed: {} processed, {} classification failures, {} left pending",
            summary.total_processed(),
            summary.total_classification_failures(),
            summary.total_left_pending()
        );
        Ok(summary)
    }

    fn process_dataset(
        &self,
        dataset_id: &str,
        newly_registered: bool,
        pool: Option<&rayon::ThreadPool>,
        on_event: &(dyn Fn(PipelineEvent) + Sync),
    ) -> Result<DatasetReport> {
        let pending = self.registry.pending_items(dataset_id)?;
        let mut report = DatasetReport {
            dataset_id: dataset_id.to_string(),
            newly_registered,
            pending_before: pending.len(),
            ..Default::default()
        };

        on_event(PipelineEvent::DatasetStarted {
            dataset_id: dataset_id.to_string(),
            pending: pending.len(),
        });

        if pending.is_empty() {
            debug!("Dataset '{}' has nothing pending", dataset_id);
            return Ok(report);
        }

        let ctx = ItemContext {
            dataset_id,
            registry: self.registry,
            resolver: self.resolver,
            classifier: &self.classifier,
            timeout: self.options.timeout,
            shutdown_flag: &self.shutdown_flag,
            abort: AtomicBool::new(false),
            on_event,
        };

        let outcomes: Vec<Result<ItemOutcome>> = match pool {
            Some(pool) => pool.install(|| {
                pending
                    .par_iter()
                    .map(|photo_id| ctx.process(photo_id))
                    .collect()
            }),
            None => pending.iter().map(|photo_id| ctx.process(photo_id)).collect(),
        };

        let mut results = ResultSet::new();
        let mut first_error = None;

        for outcome in outcomes {
            match outcome {
                Ok(ItemOutcome::Processed {
                    record,
                    classification_failed,
                }) => {
                    report.processed += 1;
                    if classification_failed {
                        report.classification_failures += 1;
                    }
                    results.push(record);
                }
                Ok(ItemOutcome::Skipped(SkipReason::MissingFile(_))) => report.missing_files += 1,
                Ok(ItemOutcome::Skipped(SkipReason::TimedOut(_))) => report.timed_out += 1,
                Ok(ItemOutcome::Skipped(SkipReason::Interrupted)) => report.interrupted += 1,
                Err(e) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        // Photos already marked processed must not lose their results
        if !results.is_empty() {
            match self.writer.write(dataset_id, &results) {
                Ok(path) => report.results_file = Some(path),
                Err(e) => {
                    error!("{}", e);
                    report.results_error = Some(e.to_string());
                }
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }

        info!(
            "Dataset '{}' done: {} processed, {} classification failures, {} left pending",
            dataset_id,
            report.processed,
            report.classification_failures,
            report.left_pending()
        );
        Ok(report)
    }
}

enum ItemOutcome {
    Processed {
        record: ResultRecord,
        classification_failed: bool,
    },
    Skipped(SkipReason),
}

/// Everything a worker needs to process one photo of a dataset
struct ItemContext<'a> {
    dataset_id: &'a str,
    registry: &'a Registry,
    resolver: &'a dyn PhotoResolver,
    classifier: &'a Arc<dyn Classifier>,
    timeout: Option<Duration>,
    shutdown_flag: &'a AtomicBool,
    /// Set after a fatal error so remaining photos stay pending
    abort: AtomicBool,
    on_event: &'a (dyn Fn(PipelineEvent) + Sync),
}

impl ItemContext<'_> {
    fn process(&self, photo_id: &str) -> Result<ItemOutcome> {
        let outcome = self.process_inner(photo_id);

        match &outcome {
            Ok(ItemOutcome::Processed { record, .. }) => {
                (self.on_event)(PipelineEvent::ItemProcessed {
                    dataset_id: self.dataset_id.to_string(),
                    photo_id: photo_id.to_string(),
                    dominant_object: record.dominant_object.clone(),
                })
            }
            Ok(ItemOutcome::Skipped(reason)) => (self.on_event)(PipelineEvent::ItemSkipped {
                dataset_id: self.dataset_id.to_string(),
                photo_id: photo_id.to_string(),
                reason: reason.clone(),
            }),
            Err(_) => self.abort.store(true, Ordering::SeqCst),
        }

        outcome
    }

    fn process_inner(&self, photo_id: &str) -> Result<ItemOutcome> {
        if self.shutdown_flag.load(Ordering::SeqCst) || self.abort.load(Ordering::SeqCst) {
            return Ok(ItemOutcome::Skipped(SkipReason::Interrupted));
        }

        let path = self.resolver.photo_path(self.dataset_id, photo_id);
        if !path.is_file() {
            warn!("Photo {} not found in {}", photo_id, self.dataset_id);
            return Ok(ItemOutcome::Skipped(SkipReason::MissingFile(path)));
        }

        let classification = match classify_with_timeout(self.classifier, &path, self.timeout) {
            Some(result) => result,
            None => {
                let timeout = self.timeout.unwrap_or_default();
                warn!(
                    "Classifier timed out on {} after {:.1}s, leaving it pending",
                    path.display(),
                    timeout.as_secs_f64()
                );
                return Ok(ItemOutcome::Skipped(SkipReason::TimedOut(timeout)));
            }
        };

        let (dominant_object, classification_failed) = match classification {
            Ok(label) => (label, false),
            Err(e) => {
                error!(
                    "{} failed on {}: {}",
                    self.classifier.name(),
                    path.display(),
                    e
                );
                (None, true)
            }
        };

        self.registry.mark_processed(self.dataset_id, photo_id)?;

        let record = ResultRecord {
            dataset_id: self.dataset_id.to_string(),
            photo_id: photo_id.to_string(),
            dominant_object,
            timestamp: modification_time(&path),
        };
        info!("Processed {} -> {:?}", record.key(), record.dominant_object);

        Ok(ItemOutcome::Processed {
            record,
            classification_failed,
        })
    }
}

/// Run the classifier, giving up after `timeout`.
///
/// Returns `None` on timeout. A classifier that supports deadlines stops its
/// own work. Any other classifier runs on a helper thread that is left to
/// finish on its own; its result is discarded.
fn classify_with_timeout(
    classifier: &Arc<dyn Classifier>,
    path: &Path,
    timeout: Option<Duration>,
) -> Option<std::result::Result<Option<Label>, ClassificationError>> {
    let result = match timeout {
        None => guarded(|| classifier.classify(path)),
        Some(timeout) if classifier.supports_deadline() => {
            guarded(|| classifier.classify_with_deadline(path, timeout))
        }
        Some(timeout) => classify_on_helper_thread(classifier, path, timeout)?,
    };

    match result {
        Err(ClassificationError::TimedOut(_)) => None,
        other => Some(other),
    }
}

/// Run a classification on the calling thread, turning a panic into an error
fn guarded<F>(f: F) -> std::result::Result<Option<Label>, ClassificationError>
where
    F: FnOnce() -> std::result::Result<Option<Label>, ClassificationError>,
{
    panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| {
        Err(ClassificationError::Panicked(panic_message(payload.as_ref())))
    })
}

fn classify_on_helper_thread(
    classifier: &Arc<dyn Classifier>,
    path: &Path,
    timeout: Duration,
) -> Option<std::result::Result<Option<Label>, ClassificationError>> {
    let (tx, rx) = crossbeam_channel::bounded(1);
    let worker_classifier = Arc::clone(classifier);
    let worker_path = path.to_path_buf();

    let spawned = thread::Builder::new()
        .name("classify".to_string())
        .spawn(move || {
            // The receiver is gone if the call already timed out
            let _ = tx.send(worker_classifier.classify(&worker_path));
        });

    if let Err(e) = spawned {
        return Some(Err(ClassificationError::Spawn {
            program: classifier.name().to_string(),
            message: e.to_string(),
        }));
    }

    match rx.recv_timeout(timeout) {
        Ok(result) => Some(result),
        Err(RecvTimeoutError::Timeout) => None,
        Err(RecvTimeoutError::Disconnected) => Some(Err(ClassificationError::Panicked(
            "classifier thread ended without a result".to_string(),
        ))),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// File modification time in seconds since the Unix epoch, or now if unknown
fn modification_time(path: &Path) -> f64 {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs_f64())
        .unwrap_or_else(|| chrono::Utc::now().timestamp_millis() as f64 / 1000.0)
}
