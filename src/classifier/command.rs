//! Classifier that delegates to an external program
//!
//! The program is run once per photo with the configured arguments followed
//! by the photo path. The first line of its standard output is the label;
//! empty output means no object was detected. A non-zero exit status is a
//! classification failure. With a deadline, a program that runs too long is
//! killed and reaped.
//!
//! ```toml
//! [classifier]
//! command = "python3"
//! args = ["detect.py", "--conf", "0.7"]
//! ```

use super::{ClassificationError, Classifier, Label};
use crate::core::config::ClassifierConfig;
use log::{trace, warn};
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// How often a running classifier is checked against its deadline
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Classifier backed by an external command
#[derive(Debug, Clone)]
pub struct CommandClassifier {
    program: String,
    args: Vec<String>,
}

impl CommandClassifier {
    /// Create a classifier that runs `program` with `args`
    pub fn new<S: Into<String>>(program: S, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Build a classifier from configuration.
    ///
    /// Returns `None` when no command is configured.
    pub fn from_config(config: &ClassifierConfig) -> Option<Self> {
        let program = config.command.trim();
        if program.is_empty() {
            None
        } else {
            Some(Self::new(program, config.args.clone()))
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn command(&self, path: &Path) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args).arg(path).stdin(Stdio::null());
        command
    }

    fn spawn_error(&self, e: std::io::Error) -> ClassificationError {
        ClassificationError::Spawn {
            program: self.program.clone(),
            message: e.to_string(),
        }
    }

    /// Turn a finished run into a label
    fn interpret(
        status: ExitStatus,
        stdout: Vec<u8>,
        stderr: &[u8],
    ) -> Result<Option<Label>, ClassificationError> {
        if !status.success() {
            return Err(ClassificationError::Failed {
                status: status.to_string(),
                stderr: String::from_utf8_lossy(stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8(stdout)
            .map_err(|e| ClassificationError::InvalidOutput(e.to_string()))?;

        // Only the first line is the label; anything after it is diagnostics
        let label = stdout.lines().next().unwrap_or("").trim();
        if label.is_empty() {
            Ok(None)
        } else {
            Ok(Some(label.to_string()))
        }
    }
}

/// Drain a child pipe on its own thread so a chatty child never blocks
fn drain<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    })
}

fn collect(reader: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    reader.and_then(|r| r.join().ok()).unwrap_or_default()
}

/// Kill a child and reap it so no zombie is left behind
fn stop(child: &mut Child) {
    if let Err(e) = child.kill() {
        trace!("Kill of classifier {} failed: {}", child.id(), e);
    }
    let _ = child.wait();
}

impl Classifier for CommandClassifier {
    fn classify(&self, path: &Path) -> Result<Option<Label>, ClassificationError> {
        trace!("Running {} {:?} {}", self.program, self.args, path.display());

        let output = self
            .command(path)
            .output()
            .map_err(|e| self.spawn_error(e))?;

        Self::interpret(output.status, output.stdout, &output.stderr)
    }

    fn supports_deadline(&self) -> bool {
        true
    }

    fn classify_with_deadline(
        &self,
        path: &Path,
        timeout: Duration,
    ) -> Result<Option<Label>, ClassificationError> {
        trace!("Running {} {:?} {}", self.program, self.args, path.display());

        let mut child = self
            .command(path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);
        let deadline = Instant::now() + timeout;

        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if Instant::now() >= deadline => {
                    warn!(
                        "Stopping {} (pid {}) after {:.1}s on {}",
                        self.program,
                        child.id(),
                        timeout.as_secs_f64(),
                        path.display()
                    );
                    stop(&mut child);
                    // Readers finish on their own once the pipes close
                    return Err(ClassificationError::TimedOut(timeout));
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    stop(&mut child);
                    return Err(ClassificationError::Failed {
                        status: "unknown".to_string(),
                        stderr: e.to_string(),
                    });
                }
            }
        };

        let stdout = collect(stdout);
        let stderr = collect(stderr);
        Self::interpret(status, stdout, &stderr)
    }

    fn name(&self) -> &str {
        &self.program
    }
}
