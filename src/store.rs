//! TaskStore — persistence contract for tasks, history, and side-state (C1).
//!
//! The store looks persistent but keeps no promise of surviving a process
//! restart; [`InMemoryTaskStore`] is the only implementation the core ships,
//! backed by a `RwLock<HashMap>` keyed by task id.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::types::{Artifact, Message, PushNotificationConfig, Task, TaskStatus};

/// A partial update to a task. Only the fields present are mutated.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub status: Option<TaskStatus>,
    pub artifacts: Option<Vec<Artifact>>,
    pub metadata: Option<serde_json::Value>,
    pub push_notification_config: Option<Option<PushNotificationConfig>>,
}

/// Persistence contract over tasks, their history, push config, and
/// processor-private internal state.
///
/// Implementations must be `Send + Sync`. "Unknown id" is always a `None`
/// return, never an error; internal faults are the caller's concern to
/// surface as `InternalError`.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// If `id` is supplied and a task with that id exists, returns it
    /// unmodified. Otherwise creates a new task in `submitted` state with
    /// `created_at == updated_at == now`, empty artifacts, and the given
    /// `session_id`/`metadata`.
    async fn create_or_get(
        &self,
        id: Option<String>,
        session_id: Option<String>,
        metadata: Option<serde_json::Value>,
    ) -> Task;

    async fn get(&self, id: &str) -> Option<Task>;

    /// Applies `patch` atomically. Returns `None` if the task does not
    /// exist. If `patch.status` lacks a timestamp, the store supplies one.
    async fn update(&self, id: &str, patch: TaskPatch) -> Option<Task>;

    /// Appends a message to history, filling `timestamp` if missing.
    /// Silent (logged) on an unknown id.
    async fn append_history(&self, id: &str, message: Message);

    /// Returns the last `limit` history messages, oldest-first. `limit <= 0`
    /// returns an empty vec.
    async fn get_history(&self, id: &str, limit: i64) -> Vec<Message>;

    async fn set_push_config(&self, id: &str, config: Option<PushNotificationConfig>);

    async fn get_push_config(&self, id: &str) -> Option<PushNotificationConfig>;

    /// Opaque processor-private blob, never exposed on a read path.
    async fn set_internal_state(&self, id: &str, state: serde_json::Value);

    async fn get_internal_state(&self, id: &str) -> Option<serde_json::Value>;
}

#[derive(Debug)]
struct TaskRecord {
    task: Task,
    history: Vec<Message>,
    internal_state: Option<serde_json::Value>,
}

/// In-memory reference implementation. Data is lost on process exit — this
/// is deliberate: restart survival is out of scope for the core.
#[derive(Debug)]
pub struct InMemoryTaskStore {
    records: Arc<RwLock<HashMap<String, TaskRecord>>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryTaskStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn create_or_get(
        &self,
        id: Option<String>,
        session_id: Option<String>,
        metadata: Option<serde_json::Value>,
    ) -> Task {
        let mut records = self.records.write().await;

        if let Some(ref id) = id {
            if let Some(record) = records.get(id) {
                debug!(task_id = %id, "create_or_get returning existing task");
                return record.task.clone();
            }
        }

        let task_id = id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let now = Utc::now().to_rfc3339();
        let task = Task {
            id: task_id.clone(),
            session_id: session_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            status: TaskStatus {
                state: crate::types::TaskState::Submitted,
                timestamp: now.clone(),
                message: None,
            },
            artifacts: Vec::new(),
            metadata,
            push_notification_config: None,
            created_at: now.clone(),
            updated_at: now,
        };

        records.insert(
            task_id.clone(),
            TaskRecord {
                task: task.clone(),
                history: Vec::new(),
                internal_state: None,
            },
        );
        debug!(task_id = %task_id, "task created");
        task
    }

    async fn get(&self, id: &str) -> Option<Task> {
        let records = self.records.read().await;
        let task = records.get(id).map(|r| r.task.clone());
        debug!(task_id = %id, found = task.is_some(), "task lookup");
        task
    }

    async fn update(&self, id: &str, patch: TaskPatch) -> Option<Task> {
        let mut records = self.records.write().await;
        let record = records.get_mut(id)?;

        if record.task.status.state.is_terminal() {
            warn!(task_id = %id, "ignoring update to terminal task");
            return Some(record.task.clone());
        }

        if let Some(mut status) = patch.status {
            if status.timestamp.is_empty() {
                status.timestamp = Utc::now().to_rfc3339();
            }
            record.task.status = status;
        }
        if let Some(artifacts) = patch.artifacts {
            record.task.artifacts = artifacts;
        }
        if let Some(metadata) = patch.metadata {
            record.task.metadata = Some(metadata);
        }
        if let Some(push_config) = patch.push_notification_config {
            record.task.push_notification_config = push_config;
        }
        record.task.updated_at = Utc::now().to_rfc3339();
        Some(record.task.clone())
    }

    async fn append_history(&self, id: &str, mut message: Message) {
        let mut records = self.records.write().await;
        match records.get_mut(id) {
            Some(record) => {
                if message.timestamp.is_none() {
                    message.timestamp = Some(Utc::now().to_rfc3339());
                }
                record.history.push(message);
            }
            None => warn!(task_id = %id, "append_history on unknown task"),
        }
    }

    async fn get_history(&self, id: &str, limit: i64) -> Vec<Message> {
        if limit <= 0 {
            return Vec::new();
        }
        let records = self.records.read().await;
        match records.get(id) {
            Some(record) => {
                let total = record.history.len();
                let limit = limit as usize;
                if total > limit {
                    record.history[total - limit..].to_vec()
                } else {
                    record.history.clone()
                }
            }
            None => Vec::new(),
        }
    }

    async fn set_push_config(&self, id: &str, config: Option<PushNotificationConfig>) {
        let mut records = self.records.write().await;
        if let Some(record) = records.get_mut(id) {
            record.task.push_notification_config = config;
        } else {
            warn!(task_id = %id, "set_push_config on unknown task");
        }
    }

    async fn get_push_config(&self, id: &str) -> Option<PushNotificationConfig> {
        let records = self.records.read().await;
        records.get(id)?.task.push_notification_config.clone()
    }

    async fn set_internal_state(&self, id: &str, state: serde_json::Value) {
        let mut records = self.records.write().await;
        if let Some(record) = records.get_mut(id) {
            record.internal_state = Some(state);
        } else {
            warn!(task_id = %id, "set_internal_state on unknown task");
        }
    }

    async fn get_internal_state(&self, id: &str) -> Option<serde_json::Value> {
        let records = self.records.read().await;
        records.get(id)?.internal_state.clone()
    }
}
