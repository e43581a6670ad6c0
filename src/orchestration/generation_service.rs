//! # Generation Service
//!
//! The orchestrator: creates tasks against a provider, refreshes their
//! status by polling, and ingests signed webhook callbacks. Polls and
//! callbacks race by design; every terminal write goes through the store's
//! conditional update so that a late or duplicate report can never
//! overwrite a terminal result.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::errors::{OrchestrationError, OrchestrationResult, ProviderError};
use crate::models::{
    generate_task_id, GenerationRequest, GenerationStatus, GenerationTask, StatusUpdate,
};
use crate::persistence::TaskStore;
use crate::providers::{CreateTaskSpec, TaskSnapshot};
use crate::registry::ProviderRegistry;
use crate::signing::CallbackSigner;

/// Notified when a task reaches a terminal state. The credit/billing and
/// persistence side effects behind these hooks belong to external
/// collaborators; this crate only defines the seam.
#[async_trait]
pub trait CompletionListener: Send + Sync {
    /// Final result URLs are available.
    async fn on_completed(&self, task: &GenerationTask);

    /// The task failed; the captured error code/message are final.
    async fn on_failed(&self, task: &GenerationTask);
}

/// Listener that does nothing. Default when no collaborator is wired in.
#[derive(Debug, Clone, Default)]
pub struct NoopListener;

#[async_trait]
impl CompletionListener for NoopListener {
    async fn on_completed(&self, _task: &GenerationTask) {}
    async fn on_failed(&self, _task: &GenerationTask) {}
}

/// Public entry point for the generation subsystem.
pub struct GenerationService {
    registry: Arc<ProviderRegistry>,
    signer: CallbackSigner,
    store: Arc<dyn TaskStore>,
    listener: Arc<dyn CompletionListener>,
}

impl GenerationService {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        signer: CallbackSigner,
        store: Arc<dyn TaskStore>,
    ) -> Self {
        Self::with_listener(registry, signer, store, Arc::new(NoopListener))
    }

    pub fn with_listener(
        registry: Arc<ProviderRegistry>,
        signer: CallbackSigner,
        store: Arc<dyn TaskStore>,
        listener: Arc<dyn CompletionListener>,
    ) -> Self {
        Self {
            registry,
            signer,
            store,
            listener,
        }
    }

    /// Submit a generation request to a provider and persist the initial
    /// task record.
    ///
    /// The task id is generated before the provider call so the signed
    /// callback URL can be embedded in the creation request. If the
    /// provider call fails, nothing is persisted and the error propagates
    /// to the caller.
    pub async fn submit(&self, request: GenerationRequest) -> OrchestrationResult<GenerationTask> {
        let kind = match request.provider {
            Some(kind) => kind,
            None => self.registry.default_kind()?,
        };
        let provider = self.registry.provider(kind)?;

        let task_id = generate_task_id(request.media_type);
        let signed = self.signer.sign(&task_id);

        let spec = CreateTaskSpec {
            prompt: request.prompt.clone(),
            media_type: request.media_type,
            model: request.model.clone(),
            aspect_ratio: request.aspect_ratio.clone(),
            callback_url: signed.url,
            extra_params: request.extra_params.clone(),
        };

        let snapshot = provider.create_task(&spec).await?;
        let provider_task_id = snapshot
            .provider_task_id
            .clone()
            .ok_or(ProviderError::MissingTaskId)?;

        let task = GenerationTask::new(
            task_id,
            kind,
            provider_task_id,
            request.media_type,
            request.prompt,
            request.model,
            snapshot.status,
            snapshot.progress,
        );
        self.store.create_task(&task).await?;

        info!(
            task_id = %task.id,
            provider = %kind,
            provider_task_id = %task.provider_task_id,
            status = %task.status,
            estimated_wait_secs = snapshot.estimated_wait_secs,
            "Submitted generation task"
        );
        Ok(task)
    }

    /// Refresh one task's status from its provider.
    ///
    /// Accepts either the internal task id or the provider task id. A task
    /// already in a terminal state is returned as stored, with zero
    /// outbound network calls. A provider error leaves the stored record
    /// untouched: a caller polling through transient provider failures
    /// keeps seeing the last known status.
    pub async fn refresh_status(&self, task_ref: &str) -> OrchestrationResult<GenerationTask> {
        let task = self
            .load_task(task_ref)
            .await?
            .ok_or_else(|| OrchestrationError::TaskNotFound(task_ref.to_string()))?;

        if task.status.is_terminal() {
            debug!(
                task_id = %task.id,
                status = %task.status,
                "Task already terminal, skipping provider poll"
            );
            return Ok(task);
        }

        let provider = self.registry.provider(task.provider)?;
        let snapshot = provider.get_task_status(&task.provider_task_id).await?;

        self.reconcile(task, &snapshot, "poll").await
    }

    /// Ingest a provider webhook callback.
    ///
    /// Signature verification happens before any storage lookup; a
    /// rejected callback never touches state. The payload is parsed by the
    /// adapter matching the stored task's provider, then reconciled under
    /// the same terminal-overwrite rules as polling.
    pub async fn handle_callback(
        &self,
        task_id: &str,
        timestamp: &str,
        signature: &str,
        payload: &Value,
    ) -> OrchestrationResult<()> {
        self.signer.verify(task_id, timestamp, signature)?;

        let task = self
            .store
            .get_task(task_id)
            .await?
            .ok_or_else(|| OrchestrationError::TaskNotFound(task_id.to_string()))?;

        let provider = self.registry.provider(task.provider)?;
        let snapshot = provider.parse_callback(payload)?;

        if let Some(reported) = &snapshot.provider_task_id {
            if *reported != task.provider_task_id {
                warn!(
                    task_id = %task.id,
                    stored_provider_task_id = %task.provider_task_id,
                    reported_provider_task_id = %reported,
                    "Callback payload reports a different provider task id than stored"
                );
            }
        }

        self.reconcile(task, &snapshot, "callback").await?;
        Ok(())
    }

    async fn load_task(&self, task_ref: &str) -> OrchestrationResult<Option<GenerationTask>> {
        if let Some(task) = self.store.get_task(task_ref).await? {
            return Ok(Some(task));
        }
        Ok(self.store.find_by_provider_task_id(task_ref).await?)
    }

    /// Apply a provider report to the stored record.
    ///
    /// Terminal stored states are never overwritten: a disagreeing late
    /// report is logged as an anomaly and discarded, an agreeing duplicate
    /// is absorbed silently. Non-terminal reports only write when they
    /// carry something new.
    async fn reconcile(
        &self,
        stored: GenerationTask,
        snapshot: &TaskSnapshot,
        source: &str,
    ) -> OrchestrationResult<GenerationTask> {
        if stored.status.is_terminal() {
            if snapshot.status != stored.status {
                warn!(
                    task_id = %stored.id,
                    stored_status = %stored.status,
                    reported_status = %snapshot.status,
                    source = source,
                    "Discarding status report conflicting with terminal state"
                );
            }
            return Ok(stored);
        }

        let same_status = snapshot.status == stored.status;
        let new_progress = snapshot.progress.is_some() && snapshot.progress != stored.progress;
        if same_status && !new_progress {
            return Ok(stored);
        }

        let update = StatusUpdate {
            status: snapshot.status,
            progress: snapshot.progress,
            result_urls: snapshot.result_urls.clone(),
            thumbnail_url: snapshot.thumbnail_url.clone(),
            error_code: snapshot.error_code.clone(),
            error_message: snapshot.error_message.clone(),
        };

        let applied = self
            .store
            .conditional_update_status(&stored.id, update)
            .await?;

        let current = self
            .store
            .get_task(&stored.id)
            .await?
            .ok_or_else(|| OrchestrationError::TaskNotFound(stored.id.clone()))?;

        if !applied {
            // A concurrent poll or callback won the terminal write.
            warn!(
                task_id = %stored.id,
                stored_status = %current.status,
                reported_status = %snapshot.status,
                source = source,
                "Discarding status report conflicting with terminal state"
            );
            return Ok(current);
        }

        debug!(
            task_id = %current.id,
            status = %current.status,
            progress = current.progress,
            source = source,
            "Applied status update"
        );

        match current.status {
            GenerationStatus::Completed => {
                info!(
                    task_id = %current.id,
                    provider = %current.provider,
                    result_count = current.result_urls.len(),
                    "Generation task completed"
                );
                self.listener.on_completed(&current).await;
            }
            GenerationStatus::Failed => {
                info!(
                    task_id = %current.id,
                    provider = %current.provider,
                    error_code = current.error_code.as_deref().unwrap_or("<none>"),
                    error_message = current.error_message.as_deref().unwrap_or("<none>"),
                    "Generation task failed"
                );
                self.listener.on_failed(&current).await;
            }
            _ => {}
        }

        Ok(current)
    }
}
