//! Replicate adapter.
//!
//! Vendor contract: REST predictions API with top-level camelCase-free
//! fields (`id`, `status`, `output`, `error`). Raw vocabulary is
//! `starting | processing | succeeded | failed | canceled` — note the
//! single-l `canceled`, which is shimmed to the normalizer's vocabulary
//! before mapping. `output` is either a bare string URL or an array of
//! string URLs depending on the model; `error` is a bare string.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::errors::{OrchestrationResult, ProviderError, ProviderResult};
use crate::models::GenerationStatus;
use crate::providers::extract;
use crate::providers::{
    build_http_client, log_snapshot_anomalies, CreateTaskSpec, GenerationProvider, ProviderKind,
    TaskSnapshot,
};

const DEFAULT_BASE_URL: &str = "https://api.replicate.com";

const TASK_ID_ALIASES: [&str; 2] = ["id", "prediction_id"];
const STATUS_ALIASES: [&str; 1] = ["status"];
const DIRECT_URL_ALIASES: [&str; 1] = ["output"];
const ARRAY_ALIASES: [&str; 1] = ["output"];
const ELEMENT_URL_ALIASES: [&str; 2] = ["url", "file"];

pub struct ReplicateProvider {
    client: reqwest::Client,
    base_url: String,
}

impl ReplicateProvider {
    pub fn new(api_token: &str, timeout_ms: u64) -> OrchestrationResult<Self> {
        Self::with_base_url(api_token, timeout_ms, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(
        api_token: &str,
        timeout_ms: u64,
        base_url: impl Into<String>,
    ) -> OrchestrationResult<Self> {
        Ok(Self {
            client: build_http_client(api_token, timeout_ms)?,
            base_url: base_url.into(),
        })
    }

    async fn request_json(&self, builder: reqwest::RequestBuilder) -> ProviderResult<Value> {
        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ProviderError::Http {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(ProviderError::from)
    }

    /// Shim the vendor's vocabulary onto the normalizer's before mapping.
    fn normalize_status(raw: Option<&str>) -> GenerationStatus {
        match raw {
            Some(s) if s.eq_ignore_ascii_case("canceled") => GenerationStatus::Failed,
            other => GenerationStatus::normalize(other),
        }
    }

    fn snapshot_from(payload: &Value) -> TaskSnapshot {
        let task = extract::unwrap_data(payload);

        let raw_status = extract::string_field(task, &STATUS_ALIASES);
        let status = Self::normalize_status(raw_status.as_deref());

        let error_message = match task.get("error") {
            Some(Value::String(message)) if !message.trim().is_empty() => Some(message.clone()),
            _ => None,
        };

        TaskSnapshot {
            provider_task_id: extract::string_field(task, &TASK_ID_ALIASES),
            status,
            raw_status,
            progress: None,
            result_urls: extract::result_urls(
                task,
                &DIRECT_URL_ALIASES,
                &ARRAY_ALIASES,
                &ELEMENT_URL_ALIASES,
            ),
            thumbnail_url: None,
            error_code: None,
            error_message,
            estimated_wait_secs: None,
        }
    }
}

#[async_trait]
impl GenerationProvider for ReplicateProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Replicate
    }

    async fn create_task(&self, spec: &CreateTaskSpec) -> ProviderResult<TaskSnapshot> {
        let mut input = json!({ "prompt": spec.prompt });
        if let Some(aspect_ratio) = &spec.aspect_ratio {
            input["aspect_ratio"] = json!(aspect_ratio);
        }
        if let Some(Value::Object(extra)) = &spec.extra_params {
            for (key, value) in extra {
                input[key] = value.clone();
            }
        }

        let body = json!({
            "input": input,
            "webhook": spec.callback_url,
            "webhook_events_filter": ["start", "completed"],
        });

        // Model-scoped creation path when a model is named; the generic
        // predictions path otherwise.
        let url = match &spec.model {
            Some(model) => format!("{}/v1/models/{model}/predictions", self.base_url),
            None => format!("{}/v1/predictions", self.base_url),
        };
        debug!(provider = "replicate", url = %url, "Creating prediction");

        let payload = self.request_json(self.client.post(&url).json(&body)).await?;
        let snapshot = Self::snapshot_from(&payload);

        if snapshot.provider_task_id.is_none() {
            return Err(ProviderError::MissingTaskId);
        }

        log_snapshot_anomalies(ProviderKind::Replicate, &snapshot);
        Ok(snapshot)
    }

    async fn get_task_status(&self, provider_task_id: &str) -> ProviderResult<TaskSnapshot> {
        let url = format!("{}/v1/predictions/{provider_task_id}", self.base_url);
        debug!(provider = "replicate", url = %url, "Fetching prediction status");

        let payload = self.request_json(self.client.get(&url)).await?;

        let mut snapshot = Self::snapshot_from(&payload);
        if snapshot.provider_task_id.is_none() {
            snapshot.provider_task_id = Some(provider_task_id.to_string());
        }

        log_snapshot_anomalies(ProviderKind::Replicate, &snapshot);
        Ok(snapshot)
    }

    fn parse_callback(&self, payload: &Value) -> ProviderResult<TaskSnapshot> {
        let snapshot = Self::snapshot_from(payload);
        log_snapshot_anomalies(ProviderKind::Replicate, &snapshot);
        Ok(snapshot)
    }
}
