//! Test support: scripted provider stubs for exercising the orchestrator
//! without network access.
//!
//! Lives in the main tree so both in-file unit tests and `tests/`
//! integration tests can share it.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::errors::{ProviderError, ProviderResult};
use crate::models::GenerationStatus;
use crate::providers::{
    extract, CreateTaskSpec, GenerationProvider, ProviderKind, TaskSnapshot,
};

/// A provider whose responses are scripted up front.
///
/// `get_task_status` pops responses from a queue and counts invocations so
/// tests can assert on polling behavior (e.g. zero network calls for a
/// terminal task). `parse_callback` uses generic extraction over the
/// payload, mirroring a real adapter's single normalization surface.
pub struct ScriptedProvider {
    kind: ProviderKind,
    create_result: Mutex<Option<ProviderResult<TaskSnapshot>>>,
    status_script: Mutex<VecDeque<ProviderResult<TaskSnapshot>>>,
    status_calls: AtomicUsize,
    last_callback_url: Mutex<Option<String>>,
}

impl ScriptedProvider {
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            create_result: Mutex::new(None),
            status_script: Mutex::new(VecDeque::new()),
            status_calls: AtomicUsize::new(0),
            last_callback_url: Mutex::new(None),
        }
    }

    /// Script the response to the next `create_task` call.
    pub fn on_create(&self, result: ProviderResult<TaskSnapshot>) {
        *self.create_result.lock() = Some(result);
    }

    /// Queue a response for the next `get_task_status` call.
    pub fn push_status(&self, result: ProviderResult<TaskSnapshot>) {
        self.status_script.lock().push_back(result);
    }

    /// How many times `get_task_status` was invoked.
    pub fn status_call_count(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    /// The callback URL embedded in the last `create_task` call.
    pub fn last_callback_url(&self) -> Option<String> {
        self.last_callback_url.lock().clone()
    }

    /// A snapshot for a freshly accepted task.
    pub fn created_snapshot(provider_task_id: &str, raw_status: &str) -> TaskSnapshot {
        TaskSnapshot {
            provider_task_id: Some(provider_task_id.to_string()),
            status: GenerationStatus::normalize(Some(raw_status)),
            raw_status: Some(raw_status.to_string()),
            ..Default::default()
        }
    }

    /// A completed snapshot carrying result URLs.
    pub fn completed_snapshot(provider_task_id: &str, urls: &[&str]) -> TaskSnapshot {
        TaskSnapshot {
            provider_task_id: Some(provider_task_id.to_string()),
            status: GenerationStatus::Completed,
            raw_status: Some("success".to_string()),
            progress: Some(100),
            result_urls: urls.iter().map(|u| (*u).to_string()).collect(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl GenerationProvider for ScriptedProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn create_task(&self, spec: &CreateTaskSpec) -> ProviderResult<TaskSnapshot> {
        *self.last_callback_url.lock() = Some(spec.callback_url.clone());
        self.create_result
            .lock()
            .take()
            .unwrap_or(Err(ProviderError::Request("no scripted create response".to_string())))
    }

    async fn get_task_status(&self, _provider_task_id: &str) -> ProviderResult<TaskSnapshot> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        self.status_script
            .lock()
            .pop_front()
            .unwrap_or(Err(ProviderError::Request("no scripted status response".to_string())))
    }

    fn parse_callback(&self, payload: &Value) -> ProviderResult<TaskSnapshot> {
        let task = extract::unwrap_data(payload);
        let raw_status = extract::string_field(task, &["status"]);
        Ok(TaskSnapshot {
            provider_task_id: extract::string_field(task, &["taskId", "task_id", "id"]),
            status: GenerationStatus::normalize(raw_status.as_deref()),
            raw_status,
            progress: extract::progress_field(task, &["progress"]),
            result_urls: extract::result_urls(task, &["url"], &["results"], &["url"]),
            thumbnail_url: extract::string_field(task, &["thumbnail_url"]),
            error_code: extract::string_field(task, &["error_code"]),
            error_message: extract::string_field(task, &["error_message"]),
            estimated_wait_secs: None,
        })
    }
}
