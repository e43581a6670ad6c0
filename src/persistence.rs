//! # Persistence Contract
//!
//! The database service is an external collaborator: it stores whatever the
//! orchestrator computes and performs no interpretation. This module defines
//! the contract ([`TaskStore`]) and ships one in-memory provider used by
//! tests and embeddable deployments.
//!
//! The concurrency-critical primitive is [`TaskStore::conditional_update_status`]:
//! an atomic "apply only if the stored status is not yet terminal" write.
//! Polling and webhook delivery race by design; this primitive is what makes
//! the race benign. Implementations that cannot express the condition
//! atomically must wrap the read-check-write in a transaction.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::errors::{StoreError, StoreResult};
use crate::models::{GenerationTask, StatusUpdate};

/// Storage contract for generation task records.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Persist a freshly created task record.
    async fn create_task(&self, task: &GenerationTask) -> StoreResult<()>;

    /// Fetch a task by its internal id.
    async fn get_task(&self, id: &str) -> StoreResult<Option<GenerationTask>>;

    /// Fetch a task by the provider-assigned task id.
    async fn find_by_provider_task_id(
        &self,
        provider_task_id: &str,
    ) -> StoreResult<Option<GenerationTask>>;

    /// Apply `update` only if the stored status is not terminal.
    ///
    /// Returns whether the update was applied. A `false` return means a
    /// terminal status was already recorded and the update was discarded.
    async fn conditional_update_status(&self, id: &str, update: StatusUpdate)
        -> StoreResult<bool>;
}

/// In-memory `TaskStore` provider.
///
/// The dashmap entry guard makes `conditional_update_status` a genuine
/// atomic read-modify-write: the terminal check and the mutation happen
/// under the same shard lock.
#[derive(Debug, Default)]
pub struct MemoryTaskStore {
    tasks: DashMap<String, GenerationTask>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn create_task(&self, task: &GenerationTask) -> StoreResult<()> {
        match self.tasks.entry(task.id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(StoreError::DuplicateTask(task.id.clone()))
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(task.clone());
                Ok(())
            }
        }
    }

    async fn get_task(&self, id: &str) -> StoreResult<Option<GenerationTask>> {
        Ok(self.tasks.get(id).map(|entry| entry.clone()))
    }

    async fn find_by_provider_task_id(
        &self,
        provider_task_id: &str,
    ) -> StoreResult<Option<GenerationTask>> {
        Ok(self
            .tasks
            .iter()
            .find(|entry| entry.provider_task_id == provider_task_id)
            .map(|entry| entry.clone()))
    }

    async fn conditional_update_status(
        &self,
        id: &str,
        update: StatusUpdate,
    ) -> StoreResult<bool> {
        let Some(mut entry) = self.tasks.get_mut(id) else {
            return Err(StoreError::Backend(format!("task {id} not found")));
        };

        if entry.status.is_terminal() {
            return Ok(false);
        }

        entry.apply_update(&update);
        Ok(true)
    }
}
