//! # a2a-engine — task execution engine for the Agent-to-Agent (A2A) protocol
//!
//! This crate implements the task-lifecycle core of an
//! [A2A protocol](https://a2a-protocol.org/latest/specification/) server: the
//! part that accepts a message, drives a processor through however many
//! steps it needs, coalesces the artifacts and status transitions it
//! produces, and fans the resulting events out to SSE subscribers and
//! push-notification sinks.
//!
//! It does not speak JSON-RPC framing, HTTP routing, or CORS; it does not
//! construct agent cards; it does not implement any particular processor.
//! Those are the concerns of a transport crate built on top of
//! [`rpc::RpcFrontDoor`].
//!
//! ## Modules
//!
//! - [`store`] — the [`store::TaskStore`] persistence contract (C1) and its
//!   in-memory reference implementation.
//! - [`fanout`] — [`fanout::SseFanout`], the per-task SSE subscriber
//!   broadcast/keep-alive manager (C2).
//! - [`producer`] — the [`producer::ProducerHandle`]/[`producer::Processor`]
//!   contract a processor implements to drive a task (C3).
//! - [`executor`] — [`executor::TaskExecutor`], the per-task serializer that
//!   runs the step loop, handles cancellation, coalesces artifacts, and
//!   commits status transitions (C4).
//! - [`rpc`] — [`rpc::RpcFrontDoor`], mapping the five JSON-RPC verbs onto
//!   the executor and fanout (C5).
//! - [`error`] — [`error::EngineError`], the unified error type with
//!   JSON-RPC error code and HTTP status mappings.
//! - [`types`] — wire types: tasks, artifacts, parts, messages, events, and
//!   the JSON-RPC envelope.
//!
//! ## Feature flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `server` | yes     | SSE transport glue ([`transport::sse`]) built on `axum` |
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use a2a_engine::executor::TaskExecutor;
//! use a2a_engine::fanout::SseFanout;
//! use a2a_engine::rpc::{Capabilities, DefaultRpcFrontDoor, RpcFrontDoor};
//! use a2a_engine::store::InMemoryTaskStore;
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = Arc::new(InMemoryTaskStore::new());
//!     let fanout = Arc::new(SseFanout::new());
//!     let processors = vec![/* your Arc<dyn Processor> impls */];
//!     let executor = Arc::new(TaskExecutor::new(
//!         store.clone(),
//!         fanout,
//!         processors,
//!         Vec::new(),
//!         50,
//!     ));
//!     let front_door = DefaultRpcFrontDoor::new(executor, store, Capabilities {
//!         streaming: true,
//!         push_notifications: false,
//!     });
//!     let _ = front_door;
//! }
//! ```

pub mod error;
pub mod executor;
pub mod fanout;
pub mod producer;
pub mod rpc;
pub mod store;
pub mod types;
pub mod utils;

#[cfg(feature = "server")]
pub mod transport;

/// Re-exports commonly used types and traits.
///
/// ```rust
/// use a2a_engine::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{EngineError, EngineResult};
    pub use crate::executor::{Resumability, TaskExecutor};
    pub use crate::fanout::{NotificationSink, SseFanout, SseFrame, SseSink};
    pub use crate::producer::{
        ArtifactSignal, Context, Processor, ProducerHandle, Signal, StatusSignal, StepError,
        StepInput, StepOutcome,
    };
    pub use crate::rpc::{Capabilities, DefaultRpcFrontDoor, RpcFrontDoor};
    pub use crate::store::{InMemoryTaskStore, TaskPatch, TaskStore};
    pub use crate::types::{
        Artifact, Event, FileContent, FileWithBytes, FileWithUri, Message, Part, Role, Task,
        TaskSnapshot, TaskState, TaskStatus,
    };
}
