//! SseFanout — per-task SSE subscriber broadcast/keep-alive manager (C2).
//!
//! Built around an explicit per-task subscriber list rather than a broadcast
//! channel: each subscriber holds its own transport sink plus the JSON-RPC
//! request id it is bound to, the shape the wire format requires (§6.2).
//! Writes are per-subscriber, so one slow subscriber evicts itself without
//! blocking another task's progress.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::types::{Event, JsonRpcId};

const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// One SSE frame, either a data frame or a keep-alive comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseFrame {
    Data(String),
    KeepAlive,
}

/// A transport-agnostic write target for one subscriber connection.
#[async_trait]
pub trait SseSink: Send + Sync {
    /// Write one frame. `Err` means the connection is gone; the caller
    /// evicts the subscriber.
    async fn write_frame(&self, frame: SseFrame) -> Result<(), ()>;

    async fn close(&self);
}

/// Capability shared by SseFanout and any push-notification sink: "deliver
/// this event". Lets the executor emit once and fan out to any number of
/// sinks, including zero.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, event: &Event);
}

struct Subscriber {
    request_id: JsonRpcId,
    sink: Arc<dyn SseSink>,
    keepalive: JoinHandle<()>,
}

/// Per-task set of live SSE subscribers.
pub struct SseFanout {
    subscribers: Mutex<HashMap<String, Vec<Subscriber>>>,
}

impl SseFanout {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
        }
    }

    /// Registers `sink` for `task_id`, wrapped under `request_id`. Starts a
    /// 30s keep-alive timer that writes a comment frame while the sink is
    /// open. Rejects a duplicate registration of the same sink pointer on
    /// the same task (logged, no-op).
    pub async fn subscribe(&self, task_id: &str, request_id: JsonRpcId, sink: Arc<dyn SseSink>) {
        let mut subscribers = self.subscribers.lock().await;
        let entry = subscribers.entry(task_id.to_string()).or_default();

        if entry.iter().any(|s| Arc::ptr_eq(&s.sink, &sink)) {
            warn!(task_id = %task_id, "duplicate SSE subscription ignored");
            return;
        }

        let keepalive_sink = Arc::clone(&sink);
        let keepalive = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(KEEPALIVE_INTERVAL);
            ticker.tick().await; // first tick fires immediately; skip it
            loop {
                ticker.tick().await;
                if keepalive_sink.write_frame(SseFrame::KeepAlive).await.is_err() {
                    break;
                }
            }
        });

        debug!(task_id = %task_id, "subscriber registered");
        entry.push(Subscriber { request_id, sink, keepalive });
    }

    /// Idempotent removal of `sink` from `task_id`'s subscriber list.
    pub async fn unsubscribe(&self, task_id: &str, sink: &Arc<dyn SseSink>) {
        let mut subscribers = self.subscribers.lock().await;
        if let Some(entry) = subscribers.get_mut(task_id) {
            entry.retain(|s| {
                let keep = !Arc::ptr_eq(&s.sink, sink);
                if !keep {
                    s.keepalive.abort();
                }
                keep
            });
            if entry.is_empty() {
                subscribers.remove(task_id);
            }
        }
    }

    /// Serializes `event` into a JSON-RPC success envelope per subscriber
    /// (the envelope's `id` equals that subscriber's request id) and writes
    /// one data frame to each. A `StatusUpdate` with `final=true` closes and
    /// removes every subscriber for the task immediately after writing.
    pub async fn broadcast(&self, event: &Event) {
        let task_id = event.task_id().to_string();
        let is_final = event.is_final();

        let targets: Vec<Subscriber> = {
            let mut subscribers = self.subscribers.lock().await;
            if is_final {
                subscribers.remove(&task_id).unwrap_or_default()
            } else {
                return self.write_to_live(&task_id, event).await;
            }
        };

        for subscriber in targets {
            let frame = render_frame(&subscriber.request_id, event);
            let _ = subscriber.sink.write_frame(frame).await;
            subscriber.sink.close().await;
            subscriber.keepalive.abort();
        }
    }

    async fn write_to_live(&self, task_id: &str, event: &Event) {
        let mut subscribers = self.subscribers.lock().await;
        let Some(entry) = subscribers.get_mut(task_id) else {
            return;
        };

        let mut dead = Vec::new();
        for (idx, subscriber) in entry.iter().enumerate() {
            let frame = render_frame(&subscriber.request_id, event);
            if subscriber.sink.write_frame(frame).await.is_err() {
                dead.push(idx);
            }
        }
        for idx in dead.into_iter().rev() {
            let subscriber = entry.remove(idx);
            subscriber.keepalive.abort();
        }
        if entry.is_empty() {
            subscribers.remove(task_id);
        }
    }

    /// Writes a single event directly to `sink` under `request_id` and
    /// closes it, without registering it in the subscriber table. Used for
    /// `resubscribe` against a task that has already reached a terminal
    /// state: the caller gets the final event and nothing more.
    pub async fn send_once(&self, request_id: JsonRpcId, sink: &Arc<dyn SseSink>, event: &Event) {
        let frame = render_frame(&request_id, event);
        let _ = sink.write_frame(frame).await;
        sink.close().await;
    }

    /// Closes every subscriber across every task. Used at shutdown.
    pub async fn close_all(&self) {
        let mut subscribers = self.subscribers.lock().await;
        for (_, entry) in subscribers.drain() {
            for subscriber in entry {
                subscriber.sink.close().await;
                subscriber.keepalive.abort();
            }
        }
    }
}

impl Default for SseFanout {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationSink for SseFanout {
    async fn notify(&self, event: &Event) {
        self.broadcast(event).await;
    }
}

fn render_frame(request_id: &JsonRpcId, event: &Event) -> SseFrame {
    let envelope = crate::types::JsonRpcResponse::success(request_id.clone(), event.clone());
    let json = serde_json::to_string(&envelope).expect("Event always serializes");
    SseFrame::Data(json)
}
