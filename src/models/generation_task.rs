//! The `GenerationTask` record and its companion request/update types.
//!
//! The orchestrator is the sole writer of `status`, `progress`,
//! `result_urls` and the error fields; the persistence collaborator stores
//! whatever the orchestrator computes and performs no interpretation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::task_id_prefix;
use crate::models::task_status::GenerationStatus;
use crate::providers::ProviderKind;

/// Kind of media a task generates. Drives the task-id prefix and whether a
/// thumbnail URL is expected alongside the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Image,
    Video,
}

impl MediaType {
    pub fn id_prefix(&self) -> &'static str {
        match self {
            Self::Image => task_id_prefix::IMAGE,
            Self::Video => task_id_prefix::VIDEO,
        }
    }
}

/// Generate a fresh task id for the given media type, e.g. `img_c0ffee...`.
///
/// Task ids are assigned before the provider call so the signed callback URL
/// can be embedded in the creation request.
pub fn generate_task_id(media_type: MediaType) -> String {
    format!("{}{}", media_type.id_prefix(), Uuid::new_v4().simple())
}

/// Input to [`GenerationService::submit`](crate::orchestration::GenerationService::submit).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// The generation prompt.
    pub prompt: String,
    /// Image or video.
    pub media_type: MediaType,
    /// Explicit provider; `None` selects the configured default.
    #[serde(default)]
    pub provider: Option<ProviderKind>,
    /// Provider-side model name, passed through verbatim when set.
    #[serde(default)]
    pub model: Option<String>,
    /// Aspect ratio hint, e.g. `"16:9"`. Providers that do not support it
    /// ignore it.
    #[serde(default)]
    pub aspect_ratio: Option<String>,
    /// Free-form provider-specific parameters merged into the creation
    /// request body.
    #[serde(default)]
    pub extra_params: Option<serde_json::Value>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, media_type: MediaType) -> Self {
        Self {
            prompt: prompt.into(),
            media_type,
            provider: None,
            model: None,
            aspect_ratio: None,
            extra_params: None,
        }
    }
}

/// One unit of submitted generation work, tracked through its lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationTask {
    /// Opaque internal id; stable identity and webhook correlation key.
    /// Immutable once created.
    pub id: String,
    /// Task id assigned by the provider on creation; required for polling.
    pub provider_task_id: String,
    /// Fixed at creation time, never changes.
    pub provider: ProviderKind,
    pub media_type: MediaType,
    pub prompt: String,
    pub model: Option<String>,
    pub status: GenerationStatus,
    /// Best-effort progress, 0-100. Providers may omit it.
    pub progress: Option<u8>,
    /// Populated only once `status == Completed`.
    pub result_urls: Vec<String>,
    /// Video tasks may carry a thumbnail alongside the result.
    pub thumbnail_url: Option<String>,
    /// Populated only when `status == Failed`.
    pub error_code: Option<String>,
    /// Populated only when `status == Failed`.
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GenerationTask {
    /// Build the initial record for a freshly created provider task.
    pub fn new(
        id: String,
        provider: ProviderKind,
        provider_task_id: String,
        media_type: MediaType,
        prompt: String,
        model: Option<String>,
        status: GenerationStatus,
        progress: Option<u8>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            provider_task_id,
            provider,
            media_type,
            prompt,
            model,
            status,
            progress,
            result_urls: Vec::new(),
            thumbnail_url: None,
            error_code: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a status update in place. Used by stores that hold the record
    /// directly; the terminal-overwrite decision belongs to the store's
    /// conditional update, not to this method.
    pub fn apply_update(&mut self, update: &StatusUpdate) {
        self.status = update.status;
        if let Some(progress) = update.progress {
            self.progress = Some(progress);
        }
        if !update.result_urls.is_empty() {
            self.result_urls = update.result_urls.clone();
        }
        if let Some(thumbnail) = &update.thumbnail_url {
            self.thumbnail_url = Some(thumbnail.clone());
        }
        if let Some(code) = &update.error_code {
            self.error_code = Some(code.clone());
        }
        if let Some(message) = &update.error_message {
            self.error_message = Some(message.clone());
        }
        self.updated_at = Utc::now();
    }
}

/// Payload for the store's conditional status update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: GenerationStatus,
    pub progress: Option<u8>,
    pub result_urls: Vec<String>,
    pub thumbnail_url: Option<String>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}
