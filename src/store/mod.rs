//! ConversationStore: adapter to the remote persistence API. See
//! `spec.md` §4.3 and §6 for the persisted-state shape.
//!
//! Failures here are always caught and logged at the call site (the
//! dispatcher); they never block or alter the user-visible reply.

use crate::errors::EngineResult;
use crate::remote::dto::{ConversationRecord, MessageSummary};
use crate::remote::{log_store_failure, RemoteClient};
use crate::types::{OrderId, SessionId, TenantId, UserRef};
use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Bot,
}

/// Mirrors the `context` object in the persisted conversation record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationContext {
    #[serde(rename = "selectedItems", default)]
    pub selected_items: Vec<String>,
    #[serde(rename = "orderTotal", default)]
    pub order_total: Option<String>,
    #[serde(rename = "deliveryAddress", default)]
    pub delivery_address: Option<String>,
    #[serde(rename = "paymentMethod", default)]
    pub payment_method: Option<String>,
    #[serde(rename = "customerName", default)]
    pub customer_name: Option<String>,
    #[serde(rename = "currentOrderId", default)]
    pub current_order_id: Option<String>,
}

/// Adapter to the remote conversation-persistence API. Every method is
/// fire-and-forget from the dispatcher's point of view: callers log and
/// swallow errors rather than propagate them into the user-visible flow.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Idempotent: returns the existing active conversation for
    /// `(tenant, user)` if one exists, otherwise creates one.
    async fn initialize(
        &self,
        tenant: &TenantId,
        user: &UserRef,
    ) -> EngineResult<ConversationRecord>;

    async fn get(&self, session_id: &SessionId) -> EngineResult<Option<ConversationRecord>>;

    async fn append_message(
        &self,
        session_id: &SessionId,
        role: MessageRole,
        text: &str,
    ) -> EngineResult<()>;

    async fn update_state(
        &self,
        session_id: &SessionId,
        intent: Option<&str>,
        step: Option<&str>,
        context: &ConversationContext,
    ) -> EngineResult<()>;

    async fn link_order(&self, session_id: &SessionId, order_id: &OrderId) -> EngineResult<()>;

    async fn reset(&self, session_id: &SessionId) -> EngineResult<()>;

    async fn extend(&self, session_id: &SessionId, ttl_seconds: u64) -> EngineResult<()>;

    async fn end(&self, session_id: &SessionId) -> EngineResult<()>;
}

/// Remote-backed implementation, routed through `RemoteClient`'s shared
/// HTTP orchestration (retry/backoff/metrics all apply uniformly).
pub struct RemoteConversationStore {
    client: RemoteClient,
}

impl RemoteConversationStore {
    #[must_use]
    pub fn new(client: RemoteClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ConversationStore for RemoteConversationStore {
    async fn initialize(
        &self,
        tenant: &TenantId,
        user: &UserRef,
    ) -> EngineResult<ConversationRecord> {
        let body = json!({"tenant": tenant.as_str(), "user": user.as_str()});
        let value = self
            .client
            .conversation_request(Method::POST, "/conversations/initialize", Some(&body))
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn get(&self, session_id: &SessionId) -> EngineResult<Option<ConversationRecord>> {
        let path = format!("/conversations/{session_id}");
        match self
            .client
            .conversation_request(Method::GET, &path, None)
            .await
        {
            Ok(value) => Ok(Some(serde_json::from_value(value)?)),
            Err(err) if matches!(err, crate::errors::EngineError::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn append_message(
        &self,
        session_id: &SessionId,
        role: MessageRole,
        text: &str,
    ) -> EngineResult<()> {
        let summary = MessageSummary {
            role: match role {
                MessageRole::User => "user".to_string(),
                MessageRole::Bot => "bot".to_string(),
            },
            text: text.to_string(),
        };
        let path = format!("/conversations/{session_id}/messages");
        self.client
            .conversation_request(Method::POST, &path, Some(&json!(summary)))
            .await?;
        Ok(())
    }

    async fn update_state(
        &self,
        session_id: &SessionId,
        intent: Option<&str>,
        step: Option<&str>,
        context: &ConversationContext,
    ) -> EngineResult<()> {
        let body = json!({
            "currentIntent": intent,
            "currentStep": step,
            "context": context,
        });
        let path = format!("/conversations/{session_id}/state");
        self.client
            .conversation_request(Method::PATCH, &path, Some(&body))
            .await?;
        Ok(())
    }

    async fn link_order(&self, session_id: &SessionId, order_id: &OrderId) -> EngineResult<()> {
        let body = json!({"orderId": order_id.as_str()});
        let path = format!("/conversations/{session_id}/orders");
        self.client
            .conversation_request(Method::POST, &path, Some(&body))
            .await?;
        Ok(())
    }

    async fn reset(&self, session_id: &SessionId) -> EngineResult<()> {
        let path = format!("/conversations/{session_id}/reset");
        self.client
            .conversation_request(Method::POST, &path, None)
            .await?;
        Ok(())
    }

    async fn extend(&self, session_id: &SessionId, ttl_seconds: u64) -> EngineResult<()> {
        let body = json!({"ttl": ttl_seconds});
        let path = format!("/conversations/{session_id}/extend");
        self.client
            .conversation_request(Method::POST, &path, Some(&body))
            .await?;
        Ok(())
    }

    async fn end(&self, session_id: &SessionId) -> EngineResult<()> {
        let path = format!("/conversations/{session_id}");
        self.client
            .conversation_request(Method::DELETE, &path, None)
            .await?;
        Ok(())
    }
}

/// No-op store, selected when `CONV_SYNC_ENABLED=false`. Every method
/// keeps the exact trait signature; callers cannot tell sync is off.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopConversationStore;

#[async_trait]
impl ConversationStore for NoopConversationStore {
    async fn initialize(
        &self,
        tenant: &TenantId,
        user: &UserRef,
    ) -> EngineResult<ConversationRecord> {
        Ok(ConversationRecord {
            session_id: format!("{tenant}:{user}"),
            current_intent: None,
            current_step: None,
            context: serde_json::Value::Null,
            previous_messages: Vec::new(),
            order_history: Vec::new(),
            last_user_message: None,
            last_bot_message: None,
            ttl: 0,
        })
    }

    async fn get(&self, _session_id: &SessionId) -> EngineResult<Option<ConversationRecord>> {
        Ok(None)
    }

    async fn append_message(
        &self,
        _session_id: &SessionId,
        _role: MessageRole,
        _text: &str,
    ) -> EngineResult<()> {
        Ok(())
    }

    async fn update_state(
        &self,
        _session_id: &SessionId,
        _intent: Option<&str>,
        _step: Option<&str>,
        _context: &ConversationContext,
    ) -> EngineResult<()> {
        Ok(())
    }

    async fn link_order(&self, _session_id: &SessionId, _order_id: &OrderId) -> EngineResult<()> {
        Ok(())
    }

    async fn reset(&self, _session_id: &SessionId) -> EngineResult<()> {
        Ok(())
    }

    async fn extend(&self, _session_id: &SessionId, _ttl_seconds: u64) -> EngineResult<()> {
        Ok(())
    }

    async fn end(&self, _session_id: &SessionId) -> EngineResult<()> {
        Ok(())
    }
}

/// Persists a single step's outcome in the store-write order mandated
/// by `spec.md` §5: user message, then state snapshot, then bot
/// message, then an optional order link. Each write is independent;
/// a failure is logged via [`log_store_failure`] and does not block
/// or invalidate the others.
pub async fn sync_step(
    store: &dyn ConversationStore,
    session_id: &SessionId,
    user_text: &str,
    bot_text: &str,
    intent: Option<&str>,
    step: Option<&str>,
    context: &ConversationContext,
    linked_order: Option<&OrderId>,
) {
    if let Err(err) = store
        .append_message(session_id, MessageRole::User, user_text)
        .await
    {
        log_store_failure("append_message(user)", &err);
    }
    if let Err(err) = store.update_state(session_id, intent, step, context).await {
        log_store_failure("update_state", &err);
    }
    if let Err(err) = store
        .append_message(session_id, MessageRole::Bot, bot_text)
        .await
    {
        log_store_failure("append_message(bot)", &err);
    }
    if let Some(order_id) = linked_order {
        if let Err(err) = store.link_order(session_id, order_id).await {
            log_store_failure("link_order", &err);
        }
    }
}
