//! Producer contract — the processor-supplied cooperative generator (C3).
//!
//! A [`ProducerHandle`] is realized here as an explicit state-cursor object
//! with a `step` method, one of three equivalent shapes (the others being a
//! coroutine-with-cancellation-channel, or a goroutine/thread pair
//! communicating over two channels). This shape is the natural one in
//! `async-trait` Rust, and reuses [`crate::error`]'s structured-error idiom.

use async_trait::async_trait;

use crate::error::EngineError;
use crate::types::{Message, Part, Task};

/// Input delivered to a `step` call.
#[derive(Debug, Clone)]
pub enum StepInput {
    /// First step, or a continuation with no new input.
    None,
    /// Client-supplied input after an `input-required` pause.
    Message(Message),
    /// An out-of-band trigger; the producer MUST have advertised support.
    Internal(serde_json::Value),
}

/// A producer's yielded value.
#[derive(Debug, Clone)]
pub enum Signal {
    Status(StatusSignal),
    Artifact(ArtifactSignal),
}

#[derive(Debug, Clone)]
pub struct StatusSignal {
    pub state: crate::types::TaskState,
    /// Required when `state == TaskState::InputRequired`.
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Default)]
pub struct ArtifactSignal {
    pub name: Option<String>,
    pub description: Option<String>,
    pub parts: Vec<Part>,
    pub metadata: Option<serde_json::Value>,
    /// Target artifact slot; `None` means the task's next free slot.
    pub index: Option<usize>,
    pub append: bool,
    /// Advisory only; does not change storage.
    pub last_chunk: Option<bool>,
}

/// The outcome of one `step` call.
pub enum StepOutcome {
    Yield(Signal),
    Done,
    Err(StepError),
}

/// A step's failure. `Canceled` is produced only in response to a prior
/// `cancel()` call and is never surfaced to the initiating RPC call — it
/// always results in the task moving to `canceled`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StepError {
    #[error("canceled")]
    Canceled,
    #[error("{0}")]
    Failed(String),
}

/// The mutable object a producer sees across its lifetime.
///
/// `task` is refreshed by the executor immediately before each `step` call
/// so the producer can observe its own just-committed history.
/// `is_canceling` is set by the executor before delivering a cancellation.
#[derive(Debug, Clone)]
pub struct Context {
    pub task: Task,
    pub is_canceling: bool,
}

/// A cooperative, single-threaded producer bound to one task.
///
/// The producer MUST NOT assume control returns to it quickly — the
/// executor may wait arbitrarily long between `step` calls, e.g. across an
/// `input-required` park.
#[async_trait]
pub trait ProducerHandle: Send {
    /// Drives the producer until its next yield, normal completion, or
    /// error. `input` is present only on resumption (first step always
    /// receives `StepInput::None`, delivered by `process`'s caller from the
    /// initiation sequence).
    async fn step(&mut self, input: StepInput) -> StepOutcome;

    /// Delivers a cancellation into the producer on its next step. The
    /// producer SHOULD unwind and surface `StepError::Canceled` from the
    /// in-flight or next `step` call.
    async fn cancel(&mut self);
}

/// A processor: the factory for `ProducerHandle`s bound to a task.
#[async_trait]
pub trait Processor: Send + Sync {
    /// Whether this processor can handle the given initiation/resumption.
    async fn can_handle(&self, initial_params: &serde_json::Value, existing_task: Option<&Task>) -> bool;

    /// Constructs a handle bound to `context`. Called once per task
    /// lifetime (not once per resume — resuming a parked task reuses the
    /// existing handle).
    async fn process(
        &self,
        context: Context,
        initial_params: serde_json::Value,
        auth_context: Option<serde_json::Value>,
    ) -> Result<Box<dyn ProducerHandle>, EngineError>;

    /// The reserved metadata value this processor registers under (the
    /// "skill id") — used to re-look-up the processor on resume.
    fn id(&self) -> &str;
}
