//! Generation backend interface and adapters.
//!
//! A backend owns one generation request per run and exposes the output as
//! an ordered stream of text fragments. The trait is object-safe so runners
//! can hold `Arc<dyn GenerationBackend>`; the bundled adapter speaks the
//! Gemini-style generative-language SSE protocol.

pub mod gemini;
pub mod trait_def;

pub use gemini::{GeminiBackend, GeminiConfig};
pub use trait_def::{FragmentStream, GenerationBackend};
