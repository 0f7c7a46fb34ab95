//! Transform run lifecycle.
//!
//! A [`TransformRunner`] owns at most one backend invocation at a time and
//! the derived views of its streamed output. The phase graph is small and
//! strictly enforced:
//!
//! ```text
//! Idle     -> Running            (start)
//! Running  -> Idle               (stream exhausted, or failure w/o cooldown)
//! Running  -> Cooldown { n }     (failure with positive cooldown)
//! Cooldown -> Cooldown { n-1 }   (1 Hz countdown)
//! Cooldown -> Idle               (countdown reaches zero)
//! ```
//!
//! Starting a new run invalidates the previous subscription: the old stream
//! is cancelled, and a run-id guard keeps any still-buffered stale fragment
//! from ever touching the new accumulator.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backend::{FragmentStream, GenerationBackend};
use crate::classify::{Failure, classify};
use crate::error::StartError;
use crate::prompt::build_instruction;
use crate::reconcile::{MarkerWatch, ReconciliationResult};
use crate::table::TableFeed;
use crate::template::TemplateSpec;

/// Where the runner currently is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Running,
    /// Retry gate after a failure with a positive cooldown.
    Cooldown { remaining_secs: u32 },
}

/// Inputs for one transform run.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub report_text: String,
    /// Ordered column names; empty means "no constraint yet".
    pub columns: Vec<String>,
    /// Extraction hint, passed to the prompt verbatim.
    pub hint: String,
    /// Expected participants; empty disables the reconciliation channel.
    pub roster: Vec<String>,
}

impl RunRequest {
    /// Run request for a template, with the report text filled in.
    pub fn from_template(template: &TemplateSpec, report_text: impl Into<String>) -> Self {
        Self {
            report_text: report_text.into(),
            columns: template.columns.clone(),
            hint: template.hint.clone(),
            roster: template.roster.clone(),
        }
    }
}

/// State owned by the active run, replaced wholesale on the next start.
struct RunInner {
    phase: RunPhase,
    run_id: Uuid,
    cancel: CancellationToken,
    raw: String,
    feed: TableFeed,
    watch: MarkerWatch,
    failure: Option<Failure>,
    columns: Vec<String>,
}

impl RunInner {
    fn new() -> Self {
        Self {
            phase: RunPhase::Idle,
            run_id: Uuid::nil(),
            cancel: CancellationToken::new(),
            raw: String::new(),
            feed: TableFeed::new(),
            watch: MarkerWatch::new(),
            failure: None,
            columns: Vec::new(),
        }
    }
}

/// Drives one transform run at a time against a generation backend.
///
/// Cheap to clone; clones share the same run state.
#[derive(Clone)]
pub struct TransformRunner {
    backend: Arc<dyn GenerationBackend>,
    inner: Arc<Mutex<RunInner>>,
}

impl TransformRunner {
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self {
            backend,
            inner: Arc::new(Mutex::new(RunInner::new())),
        }
    }

    /// Start a new run.
    ///
    /// Rejects empty report text and any start attempted while a run is
    /// active or a cooldown is ticking -- with no side effects in either
    /// case. On success the previous run's state is discarded, its stream
    /// subscription cancelled, and the consume task spawned.
    pub fn start(&self, request: RunRequest) -> Result<Uuid, StartError> {
        if request.report_text.trim().is_empty() {
            return Err(StartError::EmptyInput);
        }
        let instruction = build_instruction(
            &request.report_text,
            &request.columns,
            &request.hint,
            &request.roster,
        );

        let run_id = Uuid::new_v4();
        let cancel = {
            let mut inner = self.lock();
            match inner.phase {
                RunPhase::Running => return Err(StartError::AlreadyRunning),
                RunPhase::Cooldown { remaining_secs } => {
                    return Err(StartError::CoolingDown { remaining_secs });
                }
                RunPhase::Idle => {}
            }
            // Invalidate any stale subscription before the new stream starts.
            inner.cancel.cancel();
            *inner = RunInner {
                phase: RunPhase::Running,
                run_id,
                cancel: CancellationToken::new(),
                raw: String::new(),
                feed: TableFeed::new(),
                watch: MarkerWatch::new(),
                failure: None,
                columns: request.columns.clone(),
            };
            inner.cancel.clone()
        };

        info!(%run_id, backend = self.backend.name(), "starting transform run");
        let stream = self.backend.stream_generate(&instruction);
        tokio::spawn(consume(Arc::clone(&self.inner), run_id, cancel, stream));
        Ok(run_id)
    }

    pub fn phase(&self) -> RunPhase {
        self.lock().phase
    }

    /// Live row table. Grows monotonically during a run; replaced on start.
    pub fn rows(&self) -> Vec<Vec<String>> {
        self.lock().feed.rows()
    }

    /// Clean snapshot of the run's output so far -- the canonical
    /// exportable text.
    pub fn clean_snapshot(&self) -> String {
        self.lock().feed.snapshot()
    }

    pub fn reconciliation(&self) -> ReconciliationResult {
        self.lock().watch.verdict()
    }

    /// The most recent terminal failure, if the last run ended in one.
    pub fn last_failure(&self) -> Option<Failure> {
        self.lock().failure.clone()
    }

    /// Column specification of the current (or last) run.
    pub fn columns(&self) -> Vec<String> {
        self.lock().columns.clone()
    }

    /// Raw accumulator of the current (or last) run, kept for inspection
    /// after a failure.
    pub fn raw_text(&self) -> String {
        self.lock().raw.clone()
    }

    fn lock(&self) -> MutexGuard<'_, RunInner> {
        // A consume task cannot panic while holding the lock with anything
        // half-applied; recover the guard rather than poisoning every
        // subsequent read.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn lock_inner(inner: &Mutex<RunInner>) -> MutexGuard<'_, RunInner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Consume one run's fragment stream until exhaustion, failure, or
/// cancellation. Every fragment is applied under the lock, guarded by the
/// run id so nothing from a stale stream leaks into a newer run.
async fn consume(
    inner: Arc<Mutex<RunInner>>,
    run_id: Uuid,
    cancel: CancellationToken,
    mut stream: FragmentStream,
) {
    loop {
        let item = tokio::select! {
            _ = cancel.cancelled() => {
                debug!(%run_id, "run cancelled; dropping stream");
                return;
            }
            item = stream.next() => item,
        };
        match item {
            Some(Ok(fragment)) => {
                let mut guard = lock_inner(&inner);
                if guard.run_id != run_id {
                    return;
                }
                guard.raw.push_str(&fragment);
                guard.feed.push(&fragment);
                guard.watch.push(&fragment);
            }
            Some(Err(err)) => {
                let failure = classify(&err);
                let mut guard = lock_inner(&inner);
                if guard.run_id != run_id {
                    return;
                }
                warn!(
                    %run_id,
                    category = %failure.category,
                    cooldown_secs = failure.cooldown_secs,
                    "transform run failed: {}",
                    failure.message
                );
                let cooldown = failure.cooldown_secs;
                guard.failure = Some(failure);
                if cooldown > 0 {
                    guard.phase = RunPhase::Cooldown {
                        remaining_secs: cooldown,
                    };
                    drop(guard);
                    tokio::spawn(countdown(inner, run_id));
                } else {
                    guard.phase = RunPhase::Idle;
                }
                return;
            }
            None => {
                let mut guard = lock_inner(&inner);
                if guard.run_id != run_id {
                    return;
                }
                info!(%run_id, rows = guard.feed.rows().len(), "transform run completed");
                guard.phase = RunPhase::Idle;
                return;
            }
        }
    }
}

/// 1 Hz countdown for a cooldown phase. Only ever decrements the counter and
/// flips the phase at zero; never touches the accumulator.
async fn countdown(inner: Arc<Mutex<RunInner>>, run_id: Uuid) {
    let mut tick = tokio::time::interval(Duration::from_secs(1));
    // The first tick completes immediately; skip it.
    tick.tick().await;
    loop {
        tick.tick().await;
        let mut guard = lock_inner(&inner);
        if guard.run_id != run_id {
            return;
        }
        let RunPhase::Cooldown { remaining_secs } = guard.phase else {
            return;
        };
        let remaining = remaining_secs.saturating_sub(1);
        if remaining == 0 {
            debug!(%run_id, "cooldown finished");
            guard.phase = RunPhase::Idle;
            return;
        }
        guard.phase = RunPhase::Cooldown {
            remaining_secs: remaining,
        };
    }
}
