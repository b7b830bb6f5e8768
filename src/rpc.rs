//! RpcFrontDoor — maps the five JSON-RPC verbs onto the executor and fanout
//! (C5).
//!
//! Mirrors the shape of [`crate::server`]'s `RequestHandler` trait: one
//! method per verb, taking a typed params struct and returning a typed
//! result. Transport framing (HTTP routing, CORS, auth middleware) and
//! agent-card construction are the caller's concern — this module only
//! validates capability gates and parameter shape before handing off to
//! [`TaskExecutor`].

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{EngineError, EngineResult};
use crate::executor::TaskExecutor;
use crate::fanout::SseSink;
use crate::types::{
    CancelParams, GetParams, JsonRpcId, PushNotificationConfigResponse, ResubscribeParams,
    SendParams, SetPushNotificationParams, TaskSnapshot,
};

/// Server-wide capability flags. A capability-gated verb that isn't
/// advertised fails fast with [`EngineError::unsupported_operation`] rather
/// than reaching the executor.
#[derive(Debug, Clone, Copy, Default)]
pub struct Capabilities {
    pub streaming: bool,
    pub push_notifications: bool,
}

/// The five JSON-RPC verbs (plus the two push-notification verbs) as a
/// trait, so a transport layer can depend on an `Arc<dyn RpcFrontDoor>`
/// rather than the concrete executor.
#[async_trait]
pub trait RpcFrontDoor: Send + Sync {
    async fn send(&self, params: SendParams) -> EngineResult<TaskSnapshot>;

    async fn send_subscribe(
        &self,
        request_id: JsonRpcId,
        params: SendParams,
        sink: Arc<dyn SseSink>,
    ) -> EngineResult<TaskSnapshot>;

    async fn resubscribe(
        &self,
        request_id: JsonRpcId,
        params: ResubscribeParams,
        sink: Arc<dyn SseSink>,
    ) -> EngineResult<()>;

    async fn get(&self, params: GetParams) -> EngineResult<TaskSnapshot>;

    async fn cancel(&self, params: CancelParams) -> EngineResult<TaskSnapshot>;

    async fn set_push_notification(
        &self,
        params: SetPushNotificationParams,
    ) -> EngineResult<PushNotificationConfigResponse>;

    async fn get_push_notification(&self, id: &str) -> EngineResult<PushNotificationConfigResponse>;
}

/// The standard front door: a thin dispatcher over [`TaskExecutor`] and its
/// [`SseFanout`](crate::fanout::SseFanout).
pub struct DefaultRpcFrontDoor {
    executor: Arc<TaskExecutor>,
    store: Arc<dyn crate::store::TaskStore>,
    capabilities: Capabilities,
}

impl DefaultRpcFrontDoor {
    pub fn new(
        executor: Arc<TaskExecutor>,
        store: Arc<dyn crate::store::TaskStore>,
        capabilities: Capabilities,
    ) -> Self {
        Self { executor, store, capabilities }
    }
}

#[async_trait]
impl RpcFrontDoor for DefaultRpcFrontDoor {
    async fn send(&self, params: SendParams) -> EngineResult<TaskSnapshot> {
        self.executor.send(params, None).await
    }

    /// Subscribes the sink *before* initiating/resuming so the first
    /// `StatusUpdate` the executor commits is guaranteed to reach it — a
    /// subscription registered after `send` could race the step loop's
    /// first emission and miss it.
    async fn send_subscribe(
        &self,
        request_id: JsonRpcId,
        params: SendParams,
        sink: Arc<dyn SseSink>,
    ) -> EngineResult<TaskSnapshot> {
        if !self.capabilities.streaming {
            return Err(EngineError::unsupported_operation(
                "this server does not advertise the streaming capability",
            ));
        }
        let (task_id, resumability) = self.executor.resolve(params.id.as_deref()).await?;
        self.executor.fanout().subscribe(&task_id, request_id, sink).await;
        match resumability {
            crate::executor::Resumability::Initiate => {
                self.executor.initiate(task_id, params, None).await
            }
            crate::executor::Resumability::Resume => {
                self.executor.resume(task_id, params, None).await
            }
        }
    }

    /// Re-attaches to a task's event stream. A task already at a terminal
    /// state has no live stream to rejoin: the subscriber gets that one
    /// final event and is closed immediately, without entering the live
    /// subscriber table.
    async fn resubscribe(
        &self,
        request_id: JsonRpcId,
        params: ResubscribeParams,
        sink: Arc<dyn SseSink>,
    ) -> EngineResult<()> {
        if !self.capabilities.streaming {
            return Err(EngineError::unsupported_operation(
                "this server does not advertise the streaming capability",
            ));
        }
        match self.executor.resubscribe_seed(&params.id).await? {
            Some(event) => {
                self.executor.fanout().send_once(request_id, &sink, &event).await;
            }
            None => {
                self.executor.fanout().subscribe(&params.id, request_id, sink).await;
            }
        }
        Ok(())
    }

    async fn get(&self, params: GetParams) -> EngineResult<TaskSnapshot> {
        self.executor.get(&params.id, params.history_length).await
    }

    async fn cancel(&self, params: CancelParams) -> EngineResult<TaskSnapshot> {
        self.executor.cancel(&params.id, params.message).await
    }

    async fn set_push_notification(
        &self,
        params: SetPushNotificationParams,
    ) -> EngineResult<PushNotificationConfigResponse> {
        if !self.capabilities.push_notifications {
            return Err(EngineError::push_notifications_not_supported(
                "this server does not advertise the push-notifications capability",
            ));
        }
        if self.store.get(&params.id).await.is_none() {
            return Err(EngineError::task_not_found(params.id));
        }
        self.store
            .set_push_config(&params.id, Some(params.push_notification_config.clone()))
            .await;
        Ok(PushNotificationConfigResponse {
            id: params.id,
            push_notification_config: Some(params.push_notification_config),
        })
    }

    async fn get_push_notification(&self, id: &str) -> EngineResult<PushNotificationConfigResponse> {
        if !self.capabilities.push_notifications {
            return Err(EngineError::push_notifications_not_supported(
                "this server does not advertise the push-notifications capability",
            ));
        }
        if self.store.get(id).await.is_none() {
            return Err(EngineError::task_not_found(id));
        }
        let config = self.store.get_push_config(id).await;
        Ok(PushNotificationConfigResponse { id: id.to_string(), push_notification_config: config })
    }
}
