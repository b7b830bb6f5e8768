//! Shared fixtures for the end-to-end scenario tests in this directory.
//!
//! Each producer here corresponds to one of the literal fixtures in the
//! concrete end-to-end scenarios: `P_stream`, `P_2stage`, `P_hang`, a
//! multi-step history producer, and a pausing producer for resubscribe.

use std::sync::Arc;
use std::time::Duration;

use a2a_engine::error::EngineError;
use a2a_engine::fanout::{SseFanout, SseFrame, SseSink};
use a2a_engine::producer::{
    ArtifactSignal, Context, Processor, ProducerHandle, Signal, StatusSignal, StepError,
    StepInput, StepOutcome,
};
use a2a_engine::rpc::{Capabilities, DefaultRpcFrontDoor};
use a2a_engine::store::InMemoryTaskStore;
use a2a_engine::types::{Message, Part, Role, Task, TaskState};
use async_trait::async_trait;
use tokio::sync::Mutex as TokioMutex;

pub fn user_message(text: &str) -> Message {
    Message {
        role: Role::User,
        parts: vec![Part::Text { text: text.into(), metadata: None }],
        timestamp: None,
        metadata: None,
    }
}

/// A status-carried message authored by a producer. Must be `Role::Agent`
/// for `commit_status` to ever append it to history.
pub fn agent_message(text: &str) -> Message {
    Message {
        role: Role::Agent,
        parts: vec![Part::Text { text: text.into(), metadata: None }],
        timestamp: None,
        metadata: None,
    }
}

pub fn message_text(message: &Message) -> String {
    message
        .parts
        .iter()
        .filter_map(|p| match p {
            Part::Text { text, .. } => Some(text.clone()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("")
}

/// A sink that records every frame it's asked to write, in order.
pub struct RecordingSink {
    pub frames: TokioMutex<Vec<SseFrame>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { frames: TokioMutex::new(Vec::new()) })
    }

    pub async fn events(&self) -> Vec<serde_json::Value> {
        self.frames
            .lock()
            .await
            .iter()
            .filter_map(|frame| match frame {
                SseFrame::Data(json) => Some(serde_json::from_str(json).unwrap()),
                SseFrame::KeepAlive => None,
            })
            .collect()
    }
}

#[async_trait]
impl SseSink for RecordingSink {
    async fn write_frame(&self, frame: SseFrame) -> Result<(), ()> {
        self.frames.lock().await.push(frame);
        Ok(())
    }

    async fn close(&self) {}
}

/// Polls `get` until the task reaches `want` or the attempt budget runs out.
pub async fn wait_for_state(
    front_door: &DefaultRpcFrontDoor,
    task_id: &str,
    want: TaskState,
) -> a2a_engine::types::TaskSnapshot {
    use a2a_engine::rpc::RpcFrontDoor;
    use a2a_engine::types::GetParams;

    for _ in 0..200 {
        let snapshot = front_door
            .get(GetParams { id: task_id.to_string(), history_length: Some(20) })
            .await
            .unwrap();
        if snapshot.task.status.state == want {
            return snapshot;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("task {task_id} did not reach {want:?} in time");
}

pub fn executor(processors: Vec<Arc<dyn Processor>>) -> (Arc<a2a_engine::executor::TaskExecutor>, Arc<DefaultRpcFrontDoor>) {
    let store = Arc::new(InMemoryTaskStore::new());
    let fanout = Arc::new(SseFanout::new());
    let exec = Arc::new(a2a_engine::executor::TaskExecutor::new(
        store.clone(),
        fanout,
        processors,
        Vec::new(),
        20,
    ));
    let front_door = Arc::new(DefaultRpcFrontDoor::new(
        exec.clone(),
        store,
        Capabilities { streaming: true, push_notifications: true },
    ));
    (exec, front_door)
}

/// Builds two front doors sharing one executor/store — `enabled` advertises
/// both capabilities, `disabled` advertises neither — so a capability gate
/// can be tested against a task that demonstrably exists in the same store.
#[allow(dead_code)]
pub fn executor_with_two_capability_views(
    processors: Vec<Arc<dyn Processor>>,
) -> (Arc<DefaultRpcFrontDoor>, Arc<DefaultRpcFrontDoor>) {
    let store = Arc::new(InMemoryTaskStore::new());
    let fanout = Arc::new(SseFanout::new());
    let exec = Arc::new(a2a_engine::executor::TaskExecutor::new(
        store.clone(),
        fanout,
        processors,
        Vec::new(),
        20,
    ));
    let enabled = Arc::new(DefaultRpcFrontDoor::new(
        exec.clone(),
        store.clone(),
        Capabilities { streaming: true, push_notifications: true },
    ));
    let disabled = Arc::new(DefaultRpcFrontDoor::new(exec, store, Capabilities::default()));
    (enabled, disabled)
}

// ---------------------------------------------------------------------------
// P_stream — one streamed artifact across two chunks, then completes.
// ---------------------------------------------------------------------------

pub struct StreamHandle(u8);

#[async_trait]
impl ProducerHandle for StreamHandle {
    async fn step(&mut self, _input: StepInput) -> StepOutcome {
        let outcome = match self.0 {
            0 => StepOutcome::Yield(Signal::Status(StatusSignal {
                state: TaskState::Working,
                message: Some(agent_message("Starting stream...")),
            })),
            1 => StepOutcome::Yield(Signal::Artifact(ArtifactSignal {
                name: Some("streamed_art".into()),
                parts: vec![Part::Text { text: "Chunk 1. ".into(), metadata: None }],
                index: None,
                append: false,
                last_chunk: Some(false),
                ..Default::default()
            })),
            2 => StepOutcome::Yield(Signal::Artifact(ArtifactSignal {
                name: Some("streamed_art".into()),
                parts: vec![Part::Text { text: "Chunk 2.".into(), metadata: None }],
                index: Some(0),
                append: true,
                last_chunk: Some(true),
                ..Default::default()
            })),
            3 => StepOutcome::Yield(Signal::Status(StatusSignal {
                state: TaskState::Completed,
                message: None,
            })),
            _ => StepOutcome::Done,
        };
        self.0 += 1;
        outcome
    }

    async fn cancel(&mut self) {}
}

pub struct StreamProcessor;

#[async_trait]
impl Processor for StreamProcessor {
    async fn can_handle(&self, _initial_params: &serde_json::Value, _existing_task: Option<&Task>) -> bool {
        true
    }
    async fn process(
        &self,
        _context: Context,
        _initial_params: serde_json::Value,
        _auth_context: Option<serde_json::Value>,
    ) -> Result<Box<dyn ProducerHandle>, EngineError> {
        Ok(Box::new(StreamHandle(0)))
    }
    fn id(&self) -> &str {
        "p_stream"
    }
}

// ---------------------------------------------------------------------------
// P_2stage — two input-required parks, then an artifact and completion.
// ---------------------------------------------------------------------------

pub struct TwoStageHandle(u8);

#[async_trait]
impl ProducerHandle for TwoStageHandle {
    async fn step(&mut self, input: StepInput) -> StepOutcome {
        let outcome = match self.0 {
            0 => StepOutcome::Yield(Signal::Status(StatusSignal { state: TaskState::Working, message: None })),
            1 => StepOutcome::Yield(Signal::Status(StatusSignal {
                state: TaskState::InputRequired,
                message: Some(agent_message("stage1?")),
            })),
            2 => {
                assert!(matches!(input, StepInput::Message(_)));
                StepOutcome::Yield(Signal::Status(StatusSignal { state: TaskState::Working, message: None }))
            }
            3 => StepOutcome::Yield(Signal::Status(StatusSignal {
                state: TaskState::InputRequired,
                message: Some(agent_message("stage2?")),
            })),
            4 => {
                assert!(matches!(input, StepInput::Message(_)));
                StepOutcome::Yield(Signal::Artifact(ArtifactSignal {
                    name: Some("two_stage_artifact".into()),
                    parts: vec![Part::Text { text: "done".into(), metadata: None }],
                    ..Default::default()
                }))
            }
            5 => StepOutcome::Yield(Signal::Status(StatusSignal { state: TaskState::Completed, message: None })),
            _ => StepOutcome::Done,
        };
        self.0 += 1;
        outcome
    }

    async fn cancel(&mut self) {}
}

pub struct TwoStageProcessor;

#[async_trait]
impl Processor for TwoStageProcessor {
    async fn can_handle(&self, _initial_params: &serde_json::Value, _existing_task: Option<&Task>) -> bool {
        true
    }
    async fn process(
        &self,
        _context: Context,
        _initial_params: serde_json::Value,
        _auth_context: Option<serde_json::Value>,
    ) -> Result<Box<dyn ProducerHandle>, EngineError> {
        Ok(Box::new(TwoStageHandle(0)))
    }
    fn id(&self) -> &str {
        "p_2stage"
    }
}

// ---------------------------------------------------------------------------
// P_hang — announces work, then awaits a signal that never arrives.
// ---------------------------------------------------------------------------

pub struct HangHandle {
    announced: bool,
    rx: tokio::sync::mpsc::Receiver<()>,
}

#[async_trait]
impl ProducerHandle for HangHandle {
    async fn step(&mut self, _input: StepInput) -> StepOutcome {
        if !self.announced {
            self.announced = true;
            return StepOutcome::Yield(Signal::Status(StatusSignal {
                state: TaskState::Working,
                message: Some(agent_message("Hanging now")),
            }));
        }
        self.rx.recv().await;
        StepOutcome::Done
    }

    async fn cancel(&mut self) {}
}

/// Holds the sender side of `HangHandle`'s gate for as long as the
/// processor itself lives, so the receiver never observes a closed channel
/// and actually hangs until `cancel` interrupts the step.
pub struct HangProcessor {
    _tx: tokio::sync::mpsc::Sender<()>,
    gate: TokioMutex<Option<tokio::sync::mpsc::Receiver<()>>>,
}

impl HangProcessor {
    pub fn new() -> Self {
        let (tx, rx) = tokio::sync::mpsc::channel(1);
        Self { _tx: tx, gate: TokioMutex::new(Some(rx)) }
    }
}

#[async_trait]
impl Processor for HangProcessor {
    async fn can_handle(&self, _initial_params: &serde_json::Value, _existing_task: Option<&Task>) -> bool {
        true
    }
    async fn process(
        &self,
        _context: Context,
        _initial_params: serde_json::Value,
        _auth_context: Option<serde_json::Value>,
    ) -> Result<Box<dyn ProducerHandle>, EngineError> {
        let rx = self.gate.lock().await.take().expect("single use");
        Ok(Box::new(HangHandle { announced: false, rx }))
    }
    fn id(&self) -> &str {
        "p_hang"
    }
}

// ---------------------------------------------------------------------------
// History producer — drives the exact seven-message history from scenario 4.
// ---------------------------------------------------------------------------

pub struct HistoryHandle(u8);

#[async_trait]
impl ProducerHandle for HistoryHandle {
    async fn step(&mut self, input: StepInput) -> StepOutcome {
        let outcome = match self.0 {
            0 => StepOutcome::Yield(Signal::Status(StatusSignal {
                state: TaskState::Working,
                message: Some(agent_message("Working Step 1")),
            })),
            1 => StepOutcome::Yield(Signal::Status(StatusSignal {
                state: TaskState::Working,
                message: Some(agent_message("Working Step 2")),
            })),
            2 => StepOutcome::Yield(Signal::Status(StatusSignal {
                state: TaskState::InputRequired,
                message: Some(agent_message("Input Required: Proceed?")),
            })),
            3 => {
                assert!(matches!(input, StepInput::Message(_)));
                StepOutcome::Yield(Signal::Status(StatusSignal {
                    state: TaskState::Working,
                    message: Some(agent_message("Processing...")),
                }))
            }
            4 => StepOutcome::Yield(Signal::Status(StatusSignal {
                state: TaskState::Completed,
                message: Some(agent_message("Task Completed Successfully.")),
            })),
            _ => StepOutcome::Done,
        };
        self.0 += 1;
        outcome
    }

    async fn cancel(&mut self) {}
}

pub struct HistoryProcessor;

#[async_trait]
impl Processor for HistoryProcessor {
    async fn can_handle(&self, _initial_params: &serde_json::Value, _existing_task: Option<&Task>) -> bool {
        true
    }
    async fn process(
        &self,
        _context: Context,
        _initial_params: serde_json::Value,
        _auth_context: Option<serde_json::Value>,
    ) -> Result<Box<dyn ProducerHandle>, EngineError> {
        Ok(Box::new(HistoryHandle(0)))
    }
    fn id(&self) -> &str {
        "p_history"
    }
}

// ---------------------------------------------------------------------------
// Pausing producer — for the resubscribe-strict scenario.
// ---------------------------------------------------------------------------

pub struct PausingHandle(u8);

#[async_trait]
impl ProducerHandle for PausingHandle {
    async fn step(&mut self, _input: StepInput) -> StepOutcome {
        let outcome = match self.0 {
            0 => StepOutcome::Yield(Signal::Status(StatusSignal { state: TaskState::Working, message: None })),
            1 => {
                tokio::time::sleep(Duration::from_millis(500)).await;
                StepOutcome::Yield(Signal::Status(StatusSignal {
                    state: TaskState::Working,
                    message: Some(agent_message("Resuming after pause.")),
                }))
            }
            2 => StepOutcome::Yield(Signal::Artifact(ArtifactSignal {
                name: Some("pause-result".into()),
                parts: vec![Part::Text { text: "Pause complete".into(), metadata: None }],
                ..Default::default()
            })),
            3 => StepOutcome::Yield(Signal::Status(StatusSignal { state: TaskState::Completed, message: None })),
            _ => StepOutcome::Done,
        };
        self.0 += 1;
        outcome
    }

    async fn cancel(&mut self) {}
}

pub struct PausingProcessor;

#[async_trait]
impl Processor for PausingProcessor {
    async fn can_handle(&self, _initial_params: &serde_json::Value, _existing_task: Option<&Task>) -> bool {
        true
    }
    async fn process(
        &self,
        _context: Context,
        _initial_params: serde_json::Value,
        _auth_context: Option<serde_json::Value>,
    ) -> Result<Box<dyn ProducerHandle>, EngineError> {
        Ok(Box::new(PausingHandle(0)))
    }
    fn id(&self) -> &str {
        "p_pausing"
    }
}

#[allow(dead_code)]
pub fn step_error_is_canceled(err: &StepError) -> bool {
    matches!(err, StepError::Canceled)
}
