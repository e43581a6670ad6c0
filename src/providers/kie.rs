//! Kie adapter.
//!
//! Vendor contract: every response is an envelope `{code, msg, data}` where
//! a 2xx HTTP response with `code != 200` is a business-level failure. Task
//! ids are opaque, except unified cross-product ids carrying the `mj_`
//! prefix, which the vendor routes through a different read path than ids
//! returned by its own creation endpoint. Progress may arrive as a bare
//! number or a `"45%"` string.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::errors::{OrchestrationResult, ProviderError, ProviderResult};
use crate::models::{GenerationStatus, MediaType};
use crate::providers::extract;
use crate::providers::{
    build_http_client, log_snapshot_anomalies, CreateTaskSpec, GenerationProvider, ProviderKind,
    TaskSnapshot,
};

const DEFAULT_BASE_URL: &str = "https://api.kie.ai";

/// Prefix marking unified task ids served by the alternate read path.
const UNIFIED_ID_PREFIX: &str = "mj_";

/// Body markers indicating the primary endpoint did not recognize the id.
const UNRECOGNIZED_ID_MARKERS: [&str; 3] = ["not exist", "not found", "record is null"];

const TASK_ID_ALIASES: [&str; 3] = ["taskId", "task_id", "id"];
const STATUS_ALIASES: [&str; 2] = ["status", "state"];
const PROGRESS_ALIASES: [&str; 2] = ["progress", "percent"];
const DIRECT_URL_ALIASES: [&str; 3] = ["resultUrl", "videoUrl", "imageUrl"];
const ARRAY_ALIASES: [&str; 3] = ["resultUrls", "results", "imageUrls"];
const ELEMENT_URL_ALIASES: [&str; 3] = ["resultUrl", "url", "videoUrl"];
const THUMBNAIL_ALIASES: [&str; 2] = ["thumbnailUrl", "coverUrl"];
const ERROR_CODE_ALIASES: [&str; 2] = ["errorCode", "failCode"];
const ERROR_MESSAGE_ALIASES: [&str; 2] = ["errorMessage", "failMsg"];
const WAIT_ALIASES: [&str; 2] = ["estimatedWaitTime", "expectedSeconds"];

pub struct KieProvider {
    client: reqwest::Client,
    base_url: String,
}

impl KieProvider {
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

    async fn get_json(&self, url: &str) -> ProviderResult<Value> {
        let response = self.client.get(url).send().await?;
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

    async fn post_json(&self, url: &str, body: &Value) -> ProviderResult<Value> {
        let response = self.client.post(url).json(body).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(ProviderError::Http {
                status: status.as_u16(),
                body: text,
            });
        }

        serde_json::from_str(&text).map_err(ProviderError::from)
    }

    /// Unwrap the `{code, msg, data}` envelope, surfacing `code != 200` as
    /// a business failure. Responses without a `code` field pass through.
    fn unwrap_envelope(value: Value) -> ProviderResult<Value> {
        let Some(code) = value.get("code").and_then(Value::as_i64) else {
            return Ok(value);
        };

        if code != 200 {
            let message = extract::string_field(&value, &["msg", "message"])
                .unwrap_or_else(|| "unspecified provider error".to_string());
            return Err(ProviderError::Business { code, message });
        }

        Ok(match value.get("data") {
            Some(data) if !data.is_null() => data.clone(),
            _ => value,
        })
    }

    /// Build a snapshot from a task object, after envelope unwrapping.
    fn snapshot_from(task: &Value) -> TaskSnapshot {
        let task = extract::unwrap_data(task);

        let raw_status = extract::string_field(task, &STATUS_ALIASES);
        let status = GenerationStatus::normalize(raw_status.as_deref());

        TaskSnapshot {
            provider_task_id: extract::string_field(task, &TASK_ID_ALIASES),
            status,
            raw_status,
            progress: extract::progress_field(task, &PROGRESS_ALIASES),
            result_urls: extract::result_urls(
                task,
                &DIRECT_URL_ALIASES,
                &ARRAY_ALIASES,
                &ELEMENT_URL_ALIASES,
            ),
            thumbnail_url: extract::string_field(task, &THUMBNAIL_ALIASES),
            error_code: extract::string_field(task, &ERROR_CODE_ALIASES),
            error_message: extract::string_field(task, &ERROR_MESSAGE_ALIASES),
            estimated_wait_secs: extract::int_field(task, &WAIT_ALIASES)
                .and_then(|v| u64::try_from(v).ok()),
        }
    }

    fn status_url(&self, provider_task_id: &str) -> String {
        format!(
            "{}/api/v1/generate/record-info?taskId={provider_task_id}",
            self.base_url
        )
    }

    fn fallback_status_url(&self, provider_task_id: &str) -> String {
        format!(
            "{}/api/v1/mj/record-info?taskId={provider_task_id}",
            self.base_url
        )
    }
}

/// True when a primary-endpoint failure should be retried against the
/// alternate read path: the id carries the unified prefix and the response
/// is a client error whose body says the id was not recognized.
fn should_try_fallback(provider_task_id: &str, error: &ProviderError) -> bool {
    if !provider_task_id.starts_with(UNIFIED_ID_PREFIX) {
        return false;
    }

    match error {
        ProviderError::Http { status, body } if (400..500).contains(status) => {
            let body = body.to_lowercase();
            UNRECOGNIZED_ID_MARKERS
                .iter()
                .any(|marker| body.contains(marker))
        }
        // The vendor sometimes reports an unknown id inside a 2xx envelope.
        ProviderError::Business { message, .. } => {
            let message = message.to_lowercase();
            UNRECOGNIZED_ID_MARKERS
                .iter()
                .any(|marker| message.contains(marker))
        }
        _ => false,
    }
}

#[async_trait]
impl GenerationProvider for KieProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Kie
    }

    async fn create_task(&self, spec: &CreateTaskSpec) -> ProviderResult<TaskSnapshot> {
        let mut body = json!({
            "prompt": spec.prompt,
            "type": match spec.media_type {
                MediaType::Image => "image",
                MediaType::Video => "video",
            },
            "callBackUrl": spec.callback_url,
        });

        if let Some(model) = &spec.model {
            body["model"] = json!(model);
        }
        if let Some(aspect_ratio) = &spec.aspect_ratio {
            body["aspectRatio"] = json!(aspect_ratio);
        }
        if let Some(Value::Object(extra)) = &spec.extra_params {
            for (key, value) in extra {
                body[key] = value.clone();
            }
        }

        let url = format!("{}/api/v1/generate", self.base_url);
        debug!(provider = "kie", url = %url, "Creating generation task");

        let envelope = self.post_json(&url, &body).await?;
        let data = Self::unwrap_envelope(envelope)?;
        let snapshot = Self::snapshot_from(&data);

        if snapshot.provider_task_id.is_none() {
            return Err(ProviderError::MissingTaskId);
        }

        log_snapshot_anomalies(ProviderKind::Kie, &snapshot);
        Ok(snapshot)
    }

    async fn get_task_status(&self, provider_task_id: &str) -> ProviderResult<TaskSnapshot> {
        let primary = self.status_url(provider_task_id);
        debug!(provider = "kie", url = %primary, "Fetching task status");

        let result = self
            .get_json(&primary)
            .await
            .and_then(Self::unwrap_envelope);

        let data = match result {
            Ok(data) => data,
            Err(error) if should_try_fallback(provider_task_id, &error) => {
                let fallback = self.fallback_status_url(provider_task_id);
                warn!(
                    provider = "kie",
                    provider_task_id = %provider_task_id,
                    error = %error,
                    fallback_url = %fallback,
                    "Primary status endpoint did not recognize task id, retrying alternate path"
                );
                self.get_json(&fallback)
                    .await
                    .and_then(Self::unwrap_envelope)?
            }
            Err(error) => return Err(error),
        };

        let mut snapshot = Self::snapshot_from(&data);
        if snapshot.provider_task_id.is_none() {
            snapshot.provider_task_id = Some(provider_task_id.to_string());
        }

        log_snapshot_anomalies(ProviderKind::Kie, &snapshot);
        Ok(snapshot)
    }

    fn parse_callback(&self, payload: &Value) -> ProviderResult<TaskSnapshot> {
        // Callbacks reuse the envelope: a code != 200 reports the task's
        // failure, not a transport problem, so it becomes a failed snapshot
        // rather than an error.
        if let Some(code) = payload.get("code").and_then(Value::as_i64) {
            if code != 200 {
                let message = extract::string_field(payload, &["msg", "message"])
                    .unwrap_or_else(|| "generation failed".to_string());
                let data = extract::unwrap_data(payload);
                return Ok(TaskSnapshot {
                    provider_task_id: extract::string_field(data, &TASK_ID_ALIASES),
                    status: GenerationStatus::Failed,
                    raw_status: extract::string_field(data, &STATUS_ALIASES),
                    error_code: Some(code.to_string()),
                    error_message: Some(message),
                    ..Default::default()
                });
            }
        }

        let snapshot = Self::snapshot_from(payload);
        log_snapshot_anomalies(ProviderKind::Kie, &snapshot);
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unwrap_envelope_success_returns_data() {
        let envelope = json!({"code": 200, "msg": "success", "data": {"taskId": "k-1"}});
        let data = KieProvider::unwrap_envelope(envelope).unwrap();
        assert_eq!(data, json!({"taskId": "k-1"}));
    }

    #[test]
    fn test_unwrap_envelope_business_error() {
        let envelope = json!({"code": 402, "msg": "insufficient credits"});
        let err = KieProvider::unwrap_envelope(envelope).unwrap_err();
        assert_eq!(
            err,
            ProviderError::Business {
                code: 402,
                message: "insufficient credits".to_string(),
            }
        );
    }

    #[test]
    fn test_unwrap_envelope_passthrough_without_code() {
        let bare = json!({"taskId": "k-1", "status": "queued"});
        assert_eq!(KieProvider::unwrap_envelope(bare.clone()).unwrap(), bare);
    }

    #[test]
    fn test_snapshot_camel_and_snake_task_id() {
        let snap = KieProvider::snapshot_from(&json!({"taskId": "k-camel", "status": "queued"}));
        assert_eq!(snap.provider_task_id.as_deref(), Some("k-camel"));
        assert_eq!(snap.status, GenerationStatus::Pending);

        let snap = KieProvider::snapshot_from(&json!({"task_id": "k-snake", "status": "running"}));
        assert_eq!(snap.provider_task_id.as_deref(), Some("k-snake"));
        assert_eq!(snap.status, GenerationStatus::Processing);
    }

    #[test]
    fn test_snapshot_percent_progress_string() {
        let snap = KieProvider::snapshot_from(&json!({
            "taskId": "k-1",
            "status": "processing",
            "progress": "45%",
        }));
        assert_eq!(snap.progress, Some(45));
    }

    #[test]
    fn test_snapshot_completed_with_result_array() {
        let snap = KieProvider::snapshot_from(&json!({
            "taskId": "k-1",
            "status": "success",
            "resultUrls": ["https://cdn.kie.ai/a.png", "https://cdn.kie.ai/b.png"],
        }));
        assert_eq!(snap.status, GenerationStatus::Completed);
        assert_eq!(snap.result_urls.len(), 2);
    }

    #[test]
    fn test_snapshot_video_with_thumbnail() {
        let snap = KieProvider::snapshot_from(&json!({
            "taskId": "k-2",
            "status": "completed",
            "videoUrl": "https://cdn.kie.ai/v.mp4",
            "thumbnailUrl": "https://cdn.kie.ai/v.jpg",
        }));
        assert_eq!(snap.result_urls, vec!["https://cdn.kie.ai/v.mp4".to_string()]);
        assert_eq!(snap.thumbnail_url.as_deref(), Some("https://cdn.kie.ai/v.jpg"));
    }

    #[test]
    fn test_snapshot_missing_status_defaults_pending() {
        let snap = KieProvider::snapshot_from(&json!({"taskId": "k-3"}));
        assert_eq!(snap.status, GenerationStatus::Pending);
        assert!(snap.raw_status.is_none());
    }

    #[test]
    fn test_callback_data_wrapped_payload() {
        let provider = KieProvider::with_base_url("key", 1000, "http://localhost").unwrap();
        let snap = provider
            .parse_callback(&json!({
                "code": 200,
                "data": {
                    "taskId": "k-4",
                    "status": "success",
                    "resultUrls": ["https://cdn.kie.ai/out.png"],
                }
            }))
            .unwrap();
        assert_eq!(snap.status, GenerationStatus::Completed);
        assert_eq!(snap.provider_task_id.as_deref(), Some("k-4"));
    }

    #[test]
    fn test_callback_business_failure_becomes_failed_snapshot() {
        let provider = KieProvider::with_base_url("key", 1000, "http://localhost").unwrap();
        let snap = provider
            .parse_callback(&json!({
                "code": 501,
                "msg": "content policy violation",
                "data": {"taskId": "k-5"}
            }))
            .unwrap();
        assert_eq!(snap.status, GenerationStatus::Failed);
        assert_eq!(snap.error_code.as_deref(), Some("501"));
        assert_eq!(snap.error_message.as_deref(), Some("content policy violation"));
    }

    #[test]
    fn test_fallback_only_for_unified_prefix() {
        let unrecognized = ProviderError::Http {
            status: 404,
            body: r#"{"msg": "record is null"}"#.to_string(),
        };
        assert!(should_try_fallback("mj_abc", &unrecognized));
        assert!(!should_try_fallback("k-abc", &unrecognized));
    }

    #[test]
    fn test_fallback_requires_unrecognized_id_body() {
        let rate_limited = ProviderError::Http {
            status: 429,
            body: "too many requests".to_string(),
        };
        assert!(!should_try_fallback("mj_abc", &rate_limited));

        let server_error = ProviderError::Http {
            status: 500,
            body: "task not found".to_string(),
        };
        assert!(!should_try_fallback("mj_abc", &server_error));
    }

    #[test]
    fn test_fallback_on_business_level_unknown_id() {
        let business = ProviderError::Business {
            code: 400,
            message: "task does not exist".to_string(),
        };
        assert!(should_try_fallback("mj_abc", &business));
    }
}
