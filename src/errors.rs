//! Error types for the generation orchestration subsystem.
//!
//! Three layers, matching the component boundaries: provider adapters
//! ([`ProviderError`]), callback signature verification
//! ([`SignatureError`]), and the orchestrator itself
//! ([`OrchestrationError`]). Storage failures from the external persistence
//! collaborator surface as [`StoreError`].

use thiserror::Error;

/// Errors produced by a provider adapter while talking to a vendor API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// Non-2xx HTTP response from the provider.
    #[error("provider returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Transport-level failure: connection refused, DNS, timeout.
    #[error("provider request failed: {0}")]
    Request(String),

    /// The provider returned a body that could not be parsed as JSON.
    #[error("failed to parse provider response: {0}")]
    Parse(String),

    /// A task-creation response from which no task id could be extracted.
    /// Hard failure, not a retryable state.
    #[error("provider response did not contain a task id")]
    MissingTaskId,

    /// A 2xx response whose embedded status code indicates a business-level
    /// failure (e.g. an envelope `code != 200`).
    #[error("provider business error (code {code}): {message}")]
    Business { code: i64, message: String },
}

/// Reasons a webhook callback signature fails verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SignatureError {
    /// The timestamp query parameter did not parse as an integer.
    #[error("callback timestamp is not a valid unix timestamp")]
    TimestampMalformed,

    /// The signature was generated outside the validity window.
    #[error("callback signature expired: age {age_secs}s exceeds window {window_secs}s")]
    Expired { age_secs: i64, window_secs: u64 },

    /// The supplied signature does not match the expected HMAC, or either
    /// the task id or signature was tampered with.
    #[error("callback signature is invalid")]
    InvalidSignature,
}

/// Errors from the persistence collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("task {0} already exists")]
    DuplicateTask(String),
    #[error("storage operation failed: {0}")]
    Backend(String),
}

/// Errors surfaced by the orchestrator to the rest of the application.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrchestrationError {
    /// A provider adapter call failed.
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    /// A webhook callback failed signature verification.
    #[error("callback rejected: {0}")]
    Signature(#[from] SignatureError),

    /// The referenced task does not exist in storage.
    #[error("task {0} not found")]
    TaskNotFound(String),

    /// The persistence collaborator failed.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    /// Required configuration is missing or unusable (e.g. no API key for
    /// the requested provider).
    #[error("configuration error: {0}")]
    Configuration(String),
}

pub type ProviderResult<T> = anyhow::Result<T, ProviderError>;
pub type SignatureResult<T> = anyhow::Result<T, SignatureError>;
pub type StoreResult<T> = anyhow::Result<T, StoreError>;
pub type OrchestrationResult<T> = anyhow::Result<T, OrchestrationError>;

impl From<serde_json::Error> for ProviderError {
    fn from(error: serde_json::Error) -> Self {
        ProviderError::Parse(error.to_string())
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            ProviderError::Request(format!("request timed out: {error}"))
        } else if error.is_decode() {
            ProviderError::Parse(error.to_string())
        } else {
            ProviderError::Request(error.to_string())
        }
    }
}
