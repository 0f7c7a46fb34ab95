//! Typed errors for the transform pipeline.
//!
//! [`BackendError`] is the single tagged union for everything a generation
//! backend can fail with. It is produced at the boundary where the raw
//! HTTP/transport error is first observed, so the failure classifier never
//! inspects loosely-typed data.

use thiserror::Error;

/// Failure surfaced by a generation backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    /// No usable API credential was configured before the call was attempted.
    #[error("no API credential configured: {0}")]
    MissingCredential(String),

    /// The backend answered with a non-success HTTP status. `message` is the
    /// error detail extracted from the JSON body when one is present.
    #[error("backend returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    /// The request never produced a usable response (connect/DNS/timeout),
    /// or the response body could not be read to completion.
    #[error("transport error: {message}")]
    Transport { message: String, timeout: bool },

    /// The stream payload could not be decoded.
    #[error("malformed stream payload: {0}")]
    Protocol(String),
}

/// Precondition failures raised by [`crate::run::TransformRunner::start`]
/// before any backend call is made. None of these have side effects.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StartError {
    /// The report text is empty or whitespace-only.
    #[error("report text is empty")]
    EmptyInput,

    /// A run is currently consuming a stream.
    #[error("a transform run is already active")]
    AlreadyRunning,

    /// The previous failure's cooldown has not elapsed yet.
    #[error("retry available in {remaining_secs}s")]
    CoolingDown { remaining_secs: u32 },
}
