//! # Provider Adapters
//!
//! Each supported vendor is one adapter behind the [`GenerationProvider`]
//! capability trait: task creation, status lookup and callback parsing.
//! Adding a vendor means adding one [`ProviderKind`] variant and one adapter
//! implementation; the orchestrator never changes.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::errors::{OrchestrationError, OrchestrationResult, ProviderResult};
use crate::models::{GenerationStatus, MediaType};

pub mod extract;
pub mod kie;
pub mod piapi;
pub mod replicate;

pub use kie::KieProvider;
pub use piapi::PiApiProvider;
pub use replicate::ReplicateProvider;

/// Closed set of supported vendors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderKind {
    #[serde(rename = "kie")]
    Kie,
    #[serde(rename = "piapi")]
    PiApi,
    #[serde(rename = "replicate")]
    Replicate,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 3] = [Self::Kie, Self::PiApi, Self::Replicate];
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kie => write!(f, "kie"),
            Self::PiApi => write!(f, "piapi"),
            Self::Replicate => write!(f, "replicate"),
        }
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "kie" => Ok(Self::Kie),
            "piapi" => Ok(Self::PiApi),
            "replicate" => Ok(Self::Replicate),
            _ => Err(format!("Unknown provider: {s}")),
        }
    }
}

/// What the orchestrator hands an adapter to create a provider task.
///
/// The internal task id is already assigned and embedded in `callback_url`
/// before the provider call is made.
#[derive(Debug, Clone)]
pub struct CreateTaskSpec {
    pub prompt: String,
    pub media_type: MediaType,
    pub model: Option<String>,
    pub aspect_ratio: Option<String>,
    /// Signed webhook URL the provider should POST status updates to.
    pub callback_url: String,
    /// Free-form provider-specific parameters merged into the request body.
    pub extra_params: Option<Value>,
}

/// Normalized view of one provider response or callback payload.
///
/// Produced by all three adapter operations so that polling and webhook
/// delivery flow through a single normalization surface.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskSnapshot {
    /// Provider-assigned task id. Always present on creation (its absence
    /// is a hard `MissingTaskId` failure); callbacks may omit it.
    pub provider_task_id: Option<String>,
    pub status: GenerationStatus,
    /// The raw vocabulary word as observed, for logging and diagnostics.
    pub raw_status: Option<String>,
    pub progress: Option<u8>,
    pub result_urls: Vec<String>,
    pub thumbnail_url: Option<String>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    /// Estimated seconds until completion, when the provider hints at it.
    pub estimated_wait_secs: Option<u64>,
}

/// Capability contract implemented once per vendor.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Issue the provider's task-creation call. A response from which no
    /// task id can be extracted is a hard `MissingTaskId` failure.
    async fn create_task(&self, spec: &CreateTaskSpec) -> ProviderResult<TaskSnapshot>;

    /// Query the provider's status endpoint for one task.
    async fn get_task_status(&self, provider_task_id: &str) -> ProviderResult<TaskSnapshot>;

    /// Parse an inbound webhook body using the same extraction rules as the
    /// read path.
    fn parse_callback(&self, payload: &Value) -> ProviderResult<TaskSnapshot>;
}

/// Build the reqwest client shared by an adapter: bearer auth on every
/// request, explicit timeout so a hanging provider cannot block callers.
pub(crate) fn build_http_client(
    api_key: &str,
    timeout_ms: u64,
) -> OrchestrationResult<reqwest::Client> {
    let mut default_headers = reqwest::header::HeaderMap::new();
    let mut auth_value: reqwest::header::HeaderValue = format!("Bearer {api_key}")
        .parse()
        .map_err(|e| OrchestrationError::Configuration(format!("Invalid API key: {e}")))?;
    auth_value.set_sensitive(true);
    default_headers.insert(reqwest::header::AUTHORIZATION, auth_value);

    reqwest::Client::builder()
        .timeout(Duration::from_millis(timeout_ms))
        .user_agent(format!("mediagen-core/{}", env!("CARGO_PKG_VERSION")))
        .default_headers(default_headers)
        .build()
        .map_err(|e| OrchestrationError::Configuration(format!("Failed to create HTTP client: {e}")))
}

/// Log data-quality anomalies in a provider report. Visible to operators,
/// never fatal to the caller.
pub(crate) fn log_snapshot_anomalies(provider: ProviderKind, snapshot: &TaskSnapshot) {
    if snapshot.raw_status.is_none() {
        warn!(
            provider = %provider,
            provider_task_id = snapshot.provider_task_id.as_deref().unwrap_or("<unknown>"),
            "Provider response missing status field, defaulting to pending"
        );
    }

    if snapshot.status == GenerationStatus::Completed && snapshot.result_urls.is_empty() {
        warn!(
            provider = %provider,
            provider_task_id = snapshot.provider_task_id.as_deref().unwrap_or("<unknown>"),
            "Provider reported completed status but no result URL could be extracted"
        );
    }
}
