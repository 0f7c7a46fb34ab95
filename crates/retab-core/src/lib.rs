//! Core transform pipeline: free-text reports in, tab-separated tables out.
//!
//! One [`run::TransformRunner`] owns one backend invocation at a time. A run
//! builds an instruction prompt, streams fragments from a
//! [`backend::GenerationBackend`], and keeps three derived views continuously
//! up to date while the output is still arriving:
//!
//! - the clean snapshot ([`sanitize`]), safe for export,
//! - the row table ([`table`]), tolerant of ragged and partial rows,
//! - the roster reconciliation result ([`reconcile`]).
//!
//! Terminal backend failures classify into a closed category set
//! ([`classify`]); some categories gate the next run behind a cooldown.

pub mod backend;
pub mod classify;
pub mod error;
pub mod prompt;
pub mod reconcile;
pub mod run;
pub mod sanitize;
pub mod table;
pub mod template;

pub use backend::{FragmentStream, GeminiBackend, GeminiConfig, GenerationBackend};
pub use classify::{Failure, FailureCategory, classify};
pub use error::{BackendError, StartError};
pub use reconcile::{MarkerWatch, ReconciliationResult, reconcile};
pub use run::{RunPhase, RunRequest, TransformRunner};
pub use sanitize::sanitize;
pub use table::{TableFeed, project};
pub use template::{TemplateRegistry, TemplateSpec};
