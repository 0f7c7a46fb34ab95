//! Shared test utilities for retab integration tests.
//!
//! Provides an in-process scripted backend that replays fixed fragment
//! sequences, plus a helper for enumerating every way to split a reference
//! output into fragments -- the pipeline must behave identically no matter
//! where the split boundaries fall.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use retab_core::{BackendError, FragmentStream, GenerationBackend};

/// One scripted backend invocation: fragments to yield, then an optional
/// terminal error.
#[derive(Debug, Clone, Default)]
pub struct Script {
    pub fragments: Vec<String>,
    pub error: Option<BackendError>,
}

/// Backend that replays scripted invocations in order.
///
/// Each `stream_generate` call consumes the next script; once the queue is
/// exhausted, further calls yield an empty stream. The instruction of every
/// call is recorded for assertions.
#[derive(Debug, Clone, Default)]
pub struct ScriptedBackend {
    scripts: Arc<Mutex<VecDeque<Script>>>,
    delay: Option<Duration>,
    instructions: Arc<Mutex<Vec<String>>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// One invocation streaming `output` as a single fragment.
    pub fn text(output: &str) -> Self {
        Self::new().push(&[output], None)
    }

    /// One invocation streaming the given fragments.
    pub fn fragments<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let script = Script {
            fragments: fragments.into_iter().map(Into::into).collect(),
            error: None,
        };
        let backend = Self::new();
        backend.scripts.lock().unwrap().push_back(script);
        backend
    }

    /// One invocation that fails immediately, before any fragment.
    pub fn failing(error: BackendError) -> Self {
        Self::new().push(&[], Some(error))
    }

    /// Append another scripted invocation.
    pub fn push(self, fragments: &[&str], error: Option<BackendError>) -> Self {
        let script = Script {
            fragments: fragments.iter().map(|s| s.to_string()).collect(),
            error,
        };
        self.scripts.lock().unwrap().push_back(script);
        self
    }

    /// Attach a terminal error to the most recently pushed invocation.
    pub fn then_error(self, error: BackendError) -> Self {
        {
            let mut scripts = self.scripts.lock().unwrap();
            let script = scripts.back_mut().expect("no script to attach error to");
            script.error = Some(error);
        }
        self
    }

    /// Sleep between fragments, exercising the suspension points.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Instructions received so far, one per `stream_generate` call.
    pub fn instructions(&self) -> Vec<String> {
        self.instructions.lock().unwrap().clone()
    }
}

impl GenerationBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    fn stream_generate(&self, instruction: &str) -> FragmentStream {
        self.instructions
            .lock()
            .unwrap()
            .push(instruction.to_string());
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default();
        let delay = self.delay;
        Box::pin(async_stream::stream! {
            for fragment in script.fragments {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                yield Ok(fragment);
            }
            if let Some(error) = script.error {
                yield Err(error);
            }
        })
    }
}

/// Every way to split `text` into `parts` non-empty fragments at char
/// boundaries.
pub fn char_splits(text: &str, parts: usize) -> Vec<Vec<String>> {
    let boundaries: Vec<usize> = text.char_indices().map(|(i, _)| i).skip(1).collect();
    let mut out = Vec::new();
    let mut acc = Vec::new();
    split_recurse(text, &boundaries, parts, 0, &mut acc, &mut out);
    out
}

fn split_recurse(
    text: &str,
    boundaries: &[usize],
    parts: usize,
    start: usize,
    acc: &mut Vec<String>,
    out: &mut Vec<Vec<String>>,
) {
    if parts == 1 {
        acc.push(text[start..].to_string());
        out.push(acc.clone());
        acc.pop();
        return;
    }
    for &boundary in boundaries.iter().filter(|&&b| b > start) {
        acc.push(text[start..boundary].to_string());
        split_recurse(text, boundaries, parts - 1, boundary, acc, out);
        acc.pop();
    }
}
