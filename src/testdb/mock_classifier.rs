//! Scripted classifier for testing without an external program

use crate::classifier::{ClassificationError, Classifier, Label};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// What the classifier does for one photo
#[derive(Clone)]
pub enum ScriptedResponse {
    /// Report this label
    Label(Label),
    /// Report that nothing was found
    Nothing,
    /// Fail with an invalid-output error
    Fail,
    /// Panic inside `classify`
    Panic,
    /// Sleep, then answer with the inner response
    Delay(Duration, Box<ScriptedResponse>),
    /// Run a callback, then answer with the inner response
    Hook(Arc<dyn Fn() + Send + Sync>, Box<ScriptedResponse>),
}

impl std::fmt::Debug for ScriptedResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScriptedResponse::Label(label) => write!(f, "Label({:?})", label),
            ScriptedResponse::Nothing => write!(f, "Nothing"),
            ScriptedResponse::Fail => write!(f, "Fail"),
            ScriptedResponse::Panic => write!(f, "Panic"),
            ScriptedResponse::Delay(d, inner) => write!(f, "Delay({:?}, {:?})", d, inner),
            ScriptedResponse::Hook(_, inner) => write!(f, "Hook({:?})", inner),
        }
    }
}

/// Classifier whose answers are keyed by photo id (the file stem)
#[derive(Debug)]
pub struct ScriptedClassifier {
    responses: HashMap<String, ScriptedResponse>,
    default_response: ScriptedResponse,
    calls: AtomicUsize,
}

impl Default for ScriptedClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedClassifier {
    /// Classifier that finds nothing in any photo
    pub fn new() -> Self {
        Self {
            responses: HashMap::new(),
            default_response: ScriptedResponse::Nothing,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_response(mut self, photo_id: &str, response: ScriptedResponse) -> Self {
        self.responses.insert(photo_id.to_string(), response);
        self
    }

    pub fn with_label(self, photo_id: &str, label: &str) -> Self {
        self.with_response(photo_id, ScriptedResponse::Label(label.to_string()))
    }

    pub fn with_failure(self, photo_id: &str) -> Self {
        self.with_response(photo_id, ScriptedResponse::Fail)
    }

    pub fn with_panic(self, photo_id: &str) -> Self {
        self.with_response(photo_id, ScriptedResponse::Panic)
    }

    /// Sleep for `delay` before answering for `photo_id`
    pub fn with_delay(mut self, photo_id: &str, delay: Duration) -> Self {
        let inner = self.take_response(photo_id);
        self.with_response(photo_id, ScriptedResponse::Delay(delay, Box::new(inner)))
    }

    /// Run `hook` before answering for `photo_id`
    pub fn with_hook<F>(mut self, photo_id: &str, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let inner = self.take_response(photo_id);
        self.with_response(photo_id, ScriptedResponse::Hook(Arc::new(hook), Box::new(inner)))
    }

    /// Label reported for photos without a scripted response
    pub fn with_default_label(mut self, label: &str) -> Self {
        self.default_response = ScriptedResponse::Label(label.to_string());
        self
    }

    /// Number of `classify` calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn take_response(&mut self, photo_id: &str) -> ScriptedResponse {
        self.responses
            .remove(photo_id)
            .unwrap_or_else(|| self.default_response.clone())
    }

    fn answer(
        response: &ScriptedResponse,
        path: &Path,
    ) -> Result<Option<Label>, ClassificationError> {
        match response {
            ScriptedResponse::Label(label) => Ok(Some(label.clone())),
            ScriptedResponse::Nothing => Ok(None),
            ScriptedResponse::Fail => Err(ClassificationError::InvalidOutput(format!(
                "scripted failure for {}",
                path.display()
            ))),
            ScriptedResponse::Panic => panic!("scripted panic for {}", path.display()),
            ScriptedResponse::Delay(delay, inner) => {
                thread::sleep(*delay);
                Self::answer(inner, path)
            }
            ScriptedResponse::Hook(hook, inner) => {
                hook();
                Self::answer(inner, path)
            }
        }
    }
}

impl Classifier for ScriptedClassifier {
    fn classify(&self, path: &Path) -> Result<Option<Label>, ClassificationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let photo_id = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        let response = self
            .responses
            .get(photo_id)
            .unwrap_or(&self.default_response);

        Self::answer(response, path)
    }

    fn name(&self) -> &str {
        "scripted classifier"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_responses_by_stem() {
        let classifier = ScriptedClassifier::new()
            .with_label("001", "cat")
            .with_failure("002");

        assert_eq!(
            classifier.classify(Path::new("/d/ds1/001.jpg")).unwrap(),
            Some("cat".to_string())
        );
        assert!(classifier.classify(Path::new("/d/ds1/002.png")).is_err());
        assert_eq!(classifier.classify(Path::new("/d/ds1/003.jpg")).unwrap(), None);
        assert_eq!(classifier.calls(), 3);
    }

    #[test]
    fn test_delay_keeps_inner_response() {
        let classifier = ScriptedClassifier::new()
            .with_label("001", "dog")
            .with_delay("001", Duration::from_millis(1));
        assert_eq!(
            classifier.classify(Path::new("001.jpg")).unwrap(),
            Some("dog".to_string())
        );
    }

    #[test]
    fn test_hook_runs_before_answer() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let classifier = ScriptedClassifier::new()
            .with_default_label("thing")
            .with_hook("005", move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });

        assert_eq!(
            classifier.classify(Path::new("005.jpg")).unwrap(),
            Some("thing".to_string())
        );
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
