//! The `GenerationBackend` trait -- the adapter interface for
//! text-generation services.

use std::pin::Pin;

use futures::Stream;

use crate::error::BackendError;

/// Ordered, single-pass stream of text fragments from one generation
/// request. Ends by exhaustion on success or after yielding exactly one
/// `Err` -- possibly before the first fragment.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, BackendError>> + Send>>;

/// Adapter interface for issuing one generation request and consuming its
/// incremental output.
///
/// # Object Safety
///
/// This trait is object-safe: both methods return concrete types, so it can
/// be stored as `Arc<dyn GenerationBackend>` by the runner.
pub trait GenerationBackend: Send + Sync {
    /// Human-readable name for this backend (e.g. "gemini").
    fn name(&self) -> &str;

    /// Issue one generation request for `instruction`.
    ///
    /// Fragments arrive in generation order, never duplicated, with no
    /// boundary guarantees: a fragment may split a line or a control marker
    /// at any position. The stream is not restartable; a new run must issue
    /// a new request.
    fn stream_generate(&self, instruction: &str) -> FragmentStream;
}

// Compile-time assertion: the trait must stay object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn GenerationBackend) {}
};
