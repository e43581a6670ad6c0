//! PiApi adapter.
//!
//! Vendor contract: snake_case fields, task objects delivered either
//! top-level or wrapped under `data`. Raw vocabulary includes `waiting` and
//! `success`. Results live under an `output` object whose shape varies by
//! media type: `image_urls` (bare string array), `video_url` (single field)
//! or `works` (object array). Task-level failures are reported inside an
//! `error` object rather than via HTTP status.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::errors::{OrchestrationResult, ProviderError, ProviderResult};
use crate::models::{GenerationStatus, MediaType};
use crate::providers::extract;
use crate::providers::{
    build_http_client, log_snapshot_anomalies, CreateTaskSpec, GenerationProvider, ProviderKind,
    TaskSnapshot,
};

const DEFAULT_BASE_URL: &str = "https://api.piapi.ai";

const TASK_ID_ALIASES: [&str; 3] = ["task_id", "taskId", "id"];
const STATUS_ALIASES: [&str; 2] = ["status", "state"];
const PROGRESS_ALIASES: [&str; 1] = ["progress"];
const DIRECT_URL_ALIASES: [&str; 2] = ["video_url", "image_url"];
const ARRAY_ALIASES: [&str; 2] = ["image_urls", "works"];
const ELEMENT_URL_ALIASES: [&str; 3] = ["url", "resource", "video_url"];
const THUMBNAIL_ALIASES: [&str; 2] = ["thumbnail_url", "cover_url"];
const WAIT_ALIASES: [&str; 1] = ["estimated_time"];

pub struct PiApiProvider {
    client: reqwest::Client,
    base_url: String,
}

impl PiApiProvider {
    pub fn new(api_key: &str, timeout_ms: u64) -> OrchestrationResult<Self> {
        Self::with_base_url(api_key, timeout_ms, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(
        api_key: &str,
        timeout_ms: u64,
        base_url: impl Into<String>,
    ) -> OrchestrationResult<Self> {
        Ok(Self {
            client: build_http_client(api_key, timeout_ms)?,
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

    fn snapshot_from(payload: &Value) -> TaskSnapshot {
        let task = extract::unwrap_data(payload);

        let raw_status = extract::string_field(task, &STATUS_ALIASES);
        let status = GenerationStatus::normalize(raw_status.as_deref());

        // Result fields sit under `output` when present; progress is
        // reported at either level depending on the task type.
        let output = match task.get("output") {
            Some(o) if o.is_object() => o,
            _ => task,
        };

        let (error_code, error_message) = match task.get("error") {
            Some(error) if error.is_object() => (
                extract::string_field(error, &["code"]),
                extract::string_field(error, &["message", "detail"]),
            ),
            _ => (None, None),
        };

        TaskSnapshot {
            provider_task_id: extract::string_field(task, &TASK_ID_ALIASES),
            status,
            raw_status,
            progress: extract::progress_field(output, &PROGRESS_ALIASES)
                .or_else(|| extract::progress_field(task, &PROGRESS_ALIASES)),
            result_urls: extract::result_urls(
                output,
                &DIRECT_URL_ALIASES,
                &ARRAY_ALIASES,
                &ELEMENT_URL_ALIASES,
            ),
            thumbnail_url: extract::string_field(output, &THUMBNAIL_ALIASES),
            error_code,
            error_message,
            estimated_wait_secs: extract::int_field(task, &WAIT_ALIASES)
                .and_then(|v| u64::try_from(v).ok()),
        }
    }
}

#[async_trait]
impl GenerationProvider for PiApiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::PiApi
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

        let mut body = json!({
            "task_type": match spec.media_type {
                MediaType::Image => "image_generation",
                MediaType::Video => "video_generation",
            },
            "input": input,
            "config": {
                "webhook_config": { "endpoint": spec.callback_url }
            },
        });
        if let Some(model) = &spec.model {
            body["model"] = json!(model);
        }

        let url = format!("{}/api/v1/task", self.base_url);
        debug!(provider = "piapi", url = %url, "Creating generation task");

        let payload = self.request_json(self.client.post(&url).json(&body)).await?;
        let snapshot = Self::snapshot_from(&payload);

        if snapshot.provider_task_id.is_none() {
            return Err(ProviderError::MissingTaskId);
        }

        log_snapshot_anomalies(ProviderKind::PiApi, &snapshot);
        Ok(snapshot)
    }

    async fn get_task_status(&self, provider_task_id: &str) -> ProviderResult<TaskSnapshot> {
        let url = format!("{}/api/v1/task/{provider_task_id}", self.base_url);
        debug!(provider = "piapi", url = %url, "Fetching task status");

        let payload = self.request_json(self.client.get(&url)).await?;

        let mut snapshot = Self::snapshot_from(&payload);
        if snapshot.provider_task_id.is_none() {
            snapshot.provider_task_id = Some(provider_task_id.to_string());
        }

        log_snapshot_anomalies(ProviderKind::PiApi, &snapshot);
        Ok(snapshot)
    }

    fn parse_callback(&self, payload: &Value) -> ProviderResult<TaskSnapshot> {
        let snapshot = Self::snapshot_from(payload);
        log_snapshot_anomalies(ProviderKind::PiApi, &snapshot);
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_snapshot_top_level_task_object() {
        let snap = PiApiProvider::snapshot_from(&json!({
            "task_id": "p-123",
            "status": "waiting",
        }));
        assert_eq!(snap.provider_task_id.as_deref(), Some("p-123"));
        assert_eq!(snap.status, GenerationStatus::Pending);
        assert_eq!(snap.raw_status.as_deref(), Some("waiting"));
    }

    #[test]
    fn test_snapshot_data_wrapped_task_object() {
        let snap = PiApiProvider::snapshot_from(&json!({
            "data": {
                "task_id": "p-456",
                "status": "running",
                "output": { "progress": 62 },
            }
        }));
        assert_eq!(snap.provider_task_id.as_deref(), Some("p-456"));
        assert_eq!(snap.status, GenerationStatus::Processing);
        assert_eq!(snap.progress, Some(62));
    }

    #[test]
    fn test_snapshot_success_with_image_urls() {
        let snap = PiApiProvider::snapshot_from(&json!({
            "task_id": "p-789",
            "status": "success",
            "output": {
                "image_urls": ["https://img.piapi.ai/1.png", "https://img.piapi.ai/2.png"],
            }
        }));
        assert_eq!(snap.status, GenerationStatus::Completed);
        assert_eq!(snap.result_urls.len(), 2);
    }

    #[test]
    fn test_snapshot_video_with_thumbnail() {
        let snap = PiApiProvider::snapshot_from(&json!({
            "task_id": "p-v1",
            "status": "completed",
            "output": {
                "video_url": "https://v.piapi.ai/out.mp4",
                "thumbnail_url": "https://v.piapi.ai/out.jpg",
            }
        }));
        assert_eq!(snap.result_urls, vec!["https://v.piapi.ai/out.mp4".to_string()]);
        assert_eq!(snap.thumbnail_url.as_deref(), Some("https://v.piapi.ai/out.jpg"));
    }

    #[test]
    fn test_snapshot_works_array_of_objects() {
        let snap = PiApiProvider::snapshot_from(&json!({
            "task_id": "p-v2",
            "status": "success",
            "output": {
                "works": [ {"resource": "https://v.piapi.ai/w1.mp4"} ],
            }
        }));
        assert_eq!(snap.result_urls, vec!["https://v.piapi.ai/w1.mp4".to_string()]);
    }

    #[test]
    fn test_snapshot_failed_with_error_object() {
        let snap = PiApiProvider::snapshot_from(&json!({
            "task_id": "p-err",
            "status": "failed",
            "error": { "code": 1100, "message": "prompt rejected" },
        }));
        assert_eq!(snap.status, GenerationStatus::Failed);
        assert_eq!(snap.error_code.as_deref(), Some("1100"));
        assert_eq!(snap.error_message.as_deref(), Some("prompt rejected"));
    }

    #[test]
    fn test_callback_uses_same_extraction_as_read_path() {
        let provider = PiApiProvider::with_base_url("key", 1000, "http://localhost").unwrap();
        let payload = json!({
            "data": {
                "task_id": "p-cb",
                "status": "success",
                "output": { "image_urls": ["https://img.piapi.ai/cb.png"] },
            }
        });
        let from_callback = provider.parse_callback(&payload).unwrap();
        let direct = PiApiProvider::snapshot_from(&payload);
        assert_eq!(from_callback, direct);
    }
}
