//! TaskExecutor — per-task serializer, step loop, cancellation, artifact
//! coalescing, and event emission (C4).
//!
//! One [`TaskRecord`] lives per in-flight task in a process-wide registry,
//! created on first step and removed on handle release. `step` always runs
//! outside the record's lock: the handle is checked out of the record for
//! the duration of one step and checked back in (or dropped, on a terminal
//! outcome) before the next command touches that record. This is what lets
//! `cancel` observe and interrupt a long-running step instead of queuing
//! behind it.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::{Mutex, Notify};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::fanout::{NotificationSink, SseFanout};
use crate::producer::{
    ArtifactSignal, Context, Processor, ProducerHandle, Signal, StatusSignal, StepError,
    StepInput, StepOutcome,
};
use crate::store::{TaskPatch, TaskStore};
use crate::types::{Artifact, Event, Message, Part, Role, SendParams, Task, TaskSnapshot, TaskState, TaskStatus};

/// The reserved metadata key under which the selected processor's id is
/// recorded, so a resumed task can be re-associated with it.
pub const PROCESSOR_METADATA_KEY: &str = "a2a:processorId";

/// The outcome of classifying a `send` against existing task state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resumability {
    Initiate,
    Resume,
}

struct TaskRecord {
    /// `None` while a step has this handle checked out.
    handle: Option<Box<dyn ProducerHandle>>,
    context: Context,
    is_canceling: bool,
    /// Notified by `cancel` to interrupt an in-flight `step` future via
    /// `tokio::select!`'s drop-the-loser semantics.
    cancel_signal: Arc<Notify>,
}

pub struct TaskExecutor {
    store: Arc<dyn TaskStore>,
    fanout: Arc<SseFanout>,
    notification_sinks: Vec<Arc<dyn NotificationSink>>,
    processors: Vec<Arc<dyn Processor>>,
    records: Mutex<HashMap<String, Arc<Mutex<TaskRecord>>>>,
    max_history_length: usize,
}

impl TaskExecutor {
    pub fn new(
        store: Arc<dyn TaskStore>,
        fanout: Arc<SseFanout>,
        processors: Vec<Arc<dyn Processor>>,
        notification_sinks: Vec<Arc<dyn NotificationSink>>,
        max_history_length: usize,
    ) -> Self {
        Self {
            store,
            fanout,
            notification_sinks,
            processors,
            records: Mutex::new(HashMap::new()),
            max_history_length,
        }
    }

    pub fn fanout(&self) -> &Arc<SseFanout> {
        &self.fanout
    }

    /// Classifies a `send` by id without mutating anything: new task, known
    /// non-terminal task with a live processor (resumable), or a rejection
    /// (terminal task, or non-terminal task with nothing live to resume —
    /// resuming across a process restart is out of scope).
    pub async fn resolve(&self, id: Option<&str>) -> EngineResult<(String, Resumability)> {
        let Some(id) = id else {
            return Ok((Uuid::new_v4().to_string(), Resumability::Initiate));
        };

        match self.store.get(id).await {
            None => Ok((id.to_string(), Resumability::Initiate)),
            Some(task) => {
                if task.status.state.is_terminal() {
                    Err(EngineError::invalid_request(format!(
                        "task {id} is already in a terminal state"
                    )))
                } else if self.get_record(id).await.is_some() {
                    Ok((id.to_string(), Resumability::Resume))
                } else {
                    Err(EngineError::internal_error(format!(
                        "task {id} has no active processor to resume"
                    )))
                }
            }
        }
    }

    /// Resolves, then initiates or resumes. Returns after the first status
    /// commit — does not wait for the task to reach a terminal state.
    pub async fn send(
        self: &Arc<Self>,
        params: SendParams,
        auth_context: Option<Value>,
    ) -> EngineResult<TaskSnapshot> {
        let (task_id, resumability) = self.resolve(params.id.as_deref()).await?;
        match resumability {
            Resumability::Initiate => self.initiate(task_id, params, auth_context).await,
            Resumability::Resume => self.resume(task_id, params, auth_context).await,
        }
    }

    pub async fn initiate(
        self: &Arc<Self>,
        task_id: String,
        params: SendParams,
        auth_context: Option<Value>,
    ) -> EngineResult<TaskSnapshot> {
        let initial_params = build_initial_params(&params);
        let processor = self.select_processor(&initial_params, None).await?;

        let mut metadata = params.metadata.clone().unwrap_or_else(|| serde_json::json!({}));
        set_processor_id(&mut metadata, processor.id());

        let task = self
            .store
            .create_or_get(Some(task_id), params.session_id.clone(), Some(metadata))
            .await;
        self.store.append_history(&task.id, params.message.clone()).await;

        let task = self.commit_status(&task.id, TaskState::Working, None).await?;

        let context = Context { task: task.clone(), is_canceling: false };
        let handle = processor
            .process(context.clone(), initial_params, auth_context)
            .await?;

        self.register(task.id.clone(), handle, context).await;
        self.schedule_step(task.id.clone(), StepInput::None);

        self.snapshot(task, params.history_length.unwrap_or(0)).await
    }

    pub async fn resume(
        self: &Arc<Self>,
        task_id: String,
        params: SendParams,
        _auth_context: Option<Value>,
    ) -> EngineResult<TaskSnapshot> {
        if self.get_record(&task_id).await.is_none() {
            return Err(EngineError::internal_error(format!(
                "task {task_id} has no active processor to resume"
            )));
        }

        self.store.append_history(&task_id, params.message.clone()).await;
        let task = self.commit_status(&task_id, TaskState::Working, None).await?;

        if let Some(record_arc) = self.get_record(&task_id).await {
            record_arc.lock().await.context.task = task.clone();
        }

        self.schedule_step(task_id.clone(), StepInput::Message(params.message));
        self.snapshot(task, params.history_length.unwrap_or(0)).await
    }

    pub async fn get(&self, task_id: &str, history_length: Option<usize>) -> EngineResult<TaskSnapshot> {
        let task = self
            .store
            .get(task_id)
            .await
            .ok_or_else(|| EngineError::task_not_found(task_id))?;
        self.snapshot(task, history_length.unwrap_or(0)).await
    }

    /// Builds the single synthetic final event a resubscribe to an already
    /// terminal task replays. `Ok(None)` means the task is live — the caller
    /// should register a plain subscription instead, with no synthetic
    /// current-state event.
    pub async fn resubscribe_seed(&self, task_id: &str) -> EngineResult<Option<Event>> {
        let task = self
            .store
            .get(task_id)
            .await
            .ok_or_else(|| EngineError::task_not_found(task_id))?;

        if task.status.state.is_terminal() {
            Ok(Some(Event::StatusUpdate {
                task_id: task.id.clone(),
                status: task.status.clone(),
                is_final: true,
                metadata: None,
            }))
        } else {
            Ok(None)
        }
    }

    /// Cancels a task. A step in flight is interrupted via `cancel_signal`;
    /// an idle (parked, or between steps) handle is canceled directly and
    /// the task committed canceled immediately. Already-terminal is a no-op
    /// returning the current snapshot.
    pub async fn cancel(&self, task_id: &str, message: Option<Message>) -> EngineResult<TaskSnapshot> {
        let task = self
            .store
            .get(task_id)
            .await
            .ok_or_else(|| EngineError::task_not_found(task_id))?;

        if task.status.state.is_terminal() {
            return self.snapshot(task, 0).await;
        }

        let Some(record_arc) = self.get_record(task_id).await else {
            let updated = self.commit_status(task_id, TaskState::Canceled, message).await?;
            return self.snapshot(updated, 0).await;
        };

        let (stepping, cancel_signal) = {
            let mut record = record_arc.lock().await;
            record.is_canceling = true;
            (record.handle.is_none(), record.cancel_signal.clone())
        };

        if stepping {
            // Observed at the step's next suspension: run_step's select! will
            // wake, drop the in-flight step future, and commit canceled itself.
            cancel_signal.notify_waiters();
            return self.snapshot(task, 0).await;
        }

        {
            let mut record = record_arc.lock().await;
            if let Some(handle) = record.handle.as_mut() {
                handle.cancel().await;
            }
        }
        let updated = self.commit_status(task_id, TaskState::Canceled, message).await?;
        self.release(task_id).await;
        self.snapshot(updated, 0).await
    }

    // -- internals --

    async fn select_processor(
        &self,
        initial_params: &Value,
        existing_task: Option<&Task>,
    ) -> EngineResult<Arc<dyn Processor>> {
        for processor in &self.processors {
            if processor.can_handle(initial_params, existing_task).await {
                return Ok(Arc::clone(processor));
            }
        }
        Err(EngineError::method_not_found("no processor can handle this request"))
    }

    async fn snapshot(&self, task: Task, history_length: usize) -> EngineResult<TaskSnapshot> {
        let history = if history_length > 0 {
            let limit = history_length.min(self.max_history_length) as i64;
            Some(self.store.get_history(&task.id, limit).await)
        } else {
            None
        };
        Ok(TaskSnapshot { task, history })
    }

    async fn register(&self, task_id: String, handle: Box<dyn ProducerHandle>, context: Context) {
        let mut records = self.records.lock().await;
        records.insert(
            task_id,
            Arc::new(Mutex::new(TaskRecord {
                handle: Some(handle),
                context,
                is_canceling: false,
                cancel_signal: Arc::new(Notify::new()),
            })),
        );
    }

    async fn get_record(&self, task_id: &str) -> Option<Arc<Mutex<TaskRecord>>> {
        self.records.lock().await.get(task_id).cloned()
    }

    async fn release(&self, task_id: &str) {
        self.records.lock().await.remove(task_id);
        debug!(task_id = %task_id, "task record released");
    }

    fn schedule_step(self: &Arc<Self>, task_id: String, input: StepInput) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.run_step(task_id, input).await;
        });
    }

    /// Checks a handle out of its record, runs one step outside any lock,
    /// then checks it back in (or releases the record) and commits the
    /// outcome. Concurrent cancel/input delivery is served by the record
    /// lock while the handle is checked out — only `run_step` ever takes it.
    async fn run_step(self: Arc<Self>, task_id: String, input: StepInput) {
        let Some(record_arc) = self.get_record(&task_id).await else {
            return;
        };

        let checked_out = {
            let record = record_arc.lock().await;
            record.handle.is_some()
        };
        if !checked_out {
            debug!(task_id = %task_id, "run_step: handle already checked out, skipping");
            return;
        }

        let (mut handle, cancel_signal, mut context) = {
            let mut record = record_arc.lock().await;
            let handle = record.handle.take().expect("checked above");
            (handle, record.cancel_signal.clone(), record.context.clone())
        };

        if let Some(fresh) = self.store.get(&task_id).await {
            context.task = fresh;
        }
        context.is_canceling = record_arc.lock().await.is_canceling;

        let outcome = tokio::select! {
            biased;
            result = handle.step(input) => result,
            _ = cancel_signal.notified() => {
                handle.cancel().await;
                StepOutcome::Err(StepError::Canceled)
            }
        };

        self.apply_outcome(&task_id, &record_arc, handle, context, outcome).await;
    }

    async fn apply_outcome(
        self: &Arc<Self>,
        task_id: &str,
        record_arc: &Arc<Mutex<TaskRecord>>,
        handle: Box<dyn ProducerHandle>,
        context: Context,
        outcome: StepOutcome,
    ) {
        match outcome {
            StepOutcome::Yield(Signal::Status(signal)) if signal.state == TaskState::InputRequired => {
                self.check_in(record_arc, handle, context).await;
                self.park_on_input_required(task_id, signal).await;
            }
            StepOutcome::Yield(Signal::Status(signal)) if signal.state.is_terminal() => {
                let _ = self.commit_status(task_id, signal.state, signal.message).await;
                self.release(task_id).await;
            }
            StepOutcome::Yield(Signal::Status(signal)) => {
                let _ = self.commit_status(task_id, signal.state, signal.message).await;
                self.check_in(record_arc, handle, context).await;
                self.schedule_step(task_id.to_string(), StepInput::None);
            }
            StepOutcome::Yield(Signal::Artifact(signal)) => {
                let _ = self.commit_artifact(task_id, signal).await;
                self.check_in(record_arc, handle, context).await;
                self.schedule_step(task_id.to_string(), StepInput::None);
            }
            StepOutcome::Done => {
                let _ = self.commit_status(task_id, TaskState::Completed, None).await;
                self.release(task_id).await;
            }
            StepOutcome::Err(StepError::Canceled) => {
                let _ = self.commit_status(task_id, TaskState::Canceled, None).await;
                self.release(task_id).await;
            }
            StepOutcome::Err(StepError::Failed(reason)) => {
                let message = Message {
                    role: Role::Agent,
                    parts: vec![Part::Text { text: reason, metadata: None }],
                    timestamp: None,
                    metadata: None,
                };
                let _ = self.commit_status(task_id, TaskState::Failed, Some(message)).await;
                self.release(task_id).await;
            }
        }
    }

    async fn check_in(&self, record_arc: &Arc<Mutex<TaskRecord>>, handle: Box<dyn ProducerHandle>, context: Context) {
        let mut record = record_arc.lock().await;
        record.handle = Some(handle);
        record.context = context;
    }

    async fn park_on_input_required(&self, task_id: &str, signal: StatusSignal) {
        if signal.message.is_none() {
            warn!(task_id = %task_id, "input-required yielded with no message");
        }
        let _ = self.commit_status(task_id, TaskState::InputRequired, signal.message).await;
    }

    /// Persists a status transition and emits the corresponding event.
    /// No-ops (logged) if the task is already terminal. An agent-role
    /// message is appended to history only when the new state isn't
    /// `input-required` — an input-required park keeps its prompt on
    /// `status.message` only, never duplicating it into history.
    async fn commit_status(
        &self,
        task_id: &str,
        state: TaskState,
        message: Option<Message>,
    ) -> EngineResult<Task> {
        let current = self
            .store
            .get(task_id)
            .await
            .ok_or_else(|| EngineError::internal_error(format!("commit_status: unknown task {task_id}")))?;

        if current.status.state.is_terminal() {
            warn!(task_id = %task_id, attempted = ?state, "ignoring status commit on terminal task");
            return Ok(current);
        }

        let timestamp = Utc::now().to_rfc3339();
        let status = TaskStatus { state, timestamp, message: message.clone() };

        let updated = self
            .store
            .update(task_id, TaskPatch { status: Some(status.clone()), ..Default::default() })
            .await
            .ok_or_else(|| EngineError::internal_error(format!("commit_status: task {task_id} vanished mid-update")))?;

        if let Some(msg) = message {
            if msg.role == Role::Agent && state != TaskState::InputRequired {
                self.store.append_history(task_id, msg).await;
            }
        }

        let is_final = state.is_terminal() || state == TaskState::InputRequired;
        self.emit(&Event::StatusUpdate {
            task_id: task_id.to_string(),
            status,
            is_final,
            metadata: None,
        })
        .await;

        Ok(updated)
    }

    /// Persists an artifact signal and emits the corresponding event. The
    /// stored artifact never carries `append`/`last_chunk`; the emitted
    /// event gets a decorated clone. Re-indexes every artifact after the
    /// mutation so `artifacts[i].index == i` always holds.
    async fn commit_artifact(&self, task_id: &str, signal: ArtifactSignal) -> EngineResult<()> {
        let mut task = self
            .store
            .get(task_id)
            .await
            .ok_or_else(|| EngineError::internal_error(format!("commit_artifact: unknown task {task_id}")))?;

        if task.status.state.is_terminal() {
            warn!(task_id = %task_id, "ignoring artifact commit on terminal task");
            return Ok(());
        }

        let now = Utc::now().to_rfc3339();
        let target = signal.index.unwrap_or(task.artifacts.len());

        if signal.append && target < task.artifacts.len() {
            let existing = &mut task.artifacts[target];
            existing.parts.extend(signal.parts.clone());
            existing.timestamp = now;
        } else {
            let artifact = Artifact {
                id: Uuid::new_v4().to_string(),
                index: target,
                name: signal.name.clone(),
                description: signal.description.clone(),
                parts: signal.parts.clone(),
                metadata: signal.metadata.clone(),
                timestamp: now,
            };
            if target >= task.artifacts.len() {
                task.artifacts.push(artifact);
            } else {
                task.artifacts[target] = artifact;
            }
        }

        for (i, artifact) in task.artifacts.iter_mut().enumerate() {
            artifact.index = i;
        }
        let committed_index = target.min(task.artifacts.len() - 1);
        let committed = task.artifacts[committed_index].clone();

        self.store
            .update(task_id, TaskPatch { artifacts: Some(task.artifacts.clone()), ..Default::default() })
            .await;

        let last_chunk = signal.last_chunk.unwrap_or(!signal.append);
        self.emit(&Event::ArtifactUpdate {
            task_id: task_id.to_string(),
            artifact: committed,
            append: signal.append,
            last_chunk,
            metadata: signal.metadata,
        })
        .await;

        Ok(())
    }

    /// Fans an event out to SSE subscribers and any registered notification
    /// collaborators (e.g. push notifications). Each sink is responsible for
    /// its own failure handling — one misbehaving sink never blocks another.
    async fn emit(&self, event: &Event) {
        self.fanout.notify(event).await;
        for sink in &self.notification_sinks {
            sink.notify(event).await;
        }
    }
}

fn build_initial_params(params: &SendParams) -> Value {
    serde_json::json!({
        "message": params.message,
        "metadata": params.metadata,
    })
}

fn set_processor_id(metadata: &mut Value, processor_id: &str) {
    if let Some(obj) = metadata.as_object_mut() {
        obj.insert(PROCESSOR_METADATA_KEY.to_string(), Value::String(processor_id.to_string()));
    }
}
