//! Dispatcher: concurrent per-session serialization over `(tenant, user)`.
//! See `spec.md` §4.7, §5.

use crate::composer::OutboundPlan;
use crate::errors::EngineResult;
use crate::fsm::{Event, EventBody, Session, SessionFsm, TrailRole};
use crate::store::{sync_step, ConversationContext, ConversationStore};
use crate::types::{TenantId, UserRef};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Delivers an `OutboundPlan` to the WhatsApp transport. Implemented
/// outside this crate's core scope; a logging stub is provided for
/// tests and for running the engine without a live transport.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, tenant: &TenantId, user: &UserRef, plan: &OutboundPlan);
}

#[derive(Debug, Default)]
pub struct LoggingTransport;

#[async_trait]
impl Transport for LoggingTransport {
    async fn send(&self, tenant: &TenantId, user: &UserRef, plan: &OutboundPlan) {
        info!(%tenant, %user, messages = plan.len(), "outbound plan (no transport configured)");
    }
}

struct SessionSlot {
    tx: mpsc::Sender<Event>,
    last_activity_ms: Arc<AtomicI64>,
}

/// Owns one worker per active `(tenant, user)` session and routes
/// inbound events to it through a bounded mailbox, giving strict
/// per-session ordering with no cross-session lock (`spec.md` §5).
pub struct Dispatcher {
    sessions: Arc<DashMap<(TenantId, UserRef), SessionSlot>>,
    fsm: Arc<SessionFsm>,
    store: Arc<dyn ConversationStore>,
    transport: Arc<dyn Transport>,
    idle_ttl: Duration,
    trail_cap: usize,
    mailbox_capacity: usize,
}

impl Dispatcher {
    #[must_use]
    pub fn new(
        fsm: Arc<SessionFsm>,
        store: Arc<dyn ConversationStore>,
        transport: Arc<dyn Transport>,
        idle_ttl: Duration,
        trail_cap: usize,
        mailbox_capacity: usize,
    ) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            fsm,
            store,
            transport,
            idle_ttl,
            trail_cap,
            mailbox_capacity,
        }
    }

    /// Enqueues `event`, spawning a worker for its `(tenant, user)` pair
    /// if none is active. Returns once the event is enqueued, not once
    /// it has been processed.
    pub async fn dispatch(&self, event: Event) -> EngineResult<()> {
        let key = (event.tenant.clone(), event.user.clone());

        let tx = {
            if let Some(slot) = self.sessions.get(&key) {
                slot.last_activity_ms.store(now_ms(), Ordering::Relaxed);
                slot.tx.clone()
            } else {
                let (tx, rx) = mpsc::channel(self.mailbox_capacity);
                let last_activity_ms = Arc::new(AtomicI64::new(now_ms()));
                self.sessions.insert(
                    key.clone(),
                    SessionSlot {
                        tx: tx.clone(),
                        last_activity_ms: Arc::clone(&last_activity_ms),
                    },
                );
                self.spawn_worker(key.clone(), rx, last_activity_ms);
                tx
            }
        };

        if tx.send(event).await.is_err() {
            // Worker died between our lookup and send (e.g. panicked and
            // the entry was swept); retry once by evicting the stale slot.
            self.sessions.remove(&key);
        }
        Ok(())
    }

    fn spawn_worker(
        &self,
        key: (TenantId, UserRef),
        mut rx: mpsc::Receiver<Event>,
        last_activity_ms: Arc<AtomicI64>,
    ) {
        let fsm = Arc::clone(&self.fsm);
        let store = Arc::clone(&self.store);
        let transport = Arc::clone(&self.transport);
        let trail_cap = self.trail_cap;
        let sessions = Arc::clone(&self.sessions);
        let (tenant, user) = key.clone();

        tokio::spawn(async move {
            let mut session = initialize_session(&store, &tenant, &user, trail_cap).await;

            while let Some(event) = rx.recv().await {
                last_activity_ms.store(now_ms(), Ordering::Relaxed);
                let user_text = describe_event(&event);
                session.record(TrailRole::User, user_text.as_str());

                let plan = fsm.step(&mut session, event).await;

                transport.send(&tenant, &user, &plan).await;

                let bot_text = summarize_plan(&plan);
                session.record(TrailRole::Bot, bot_text.as_str());

                spawn_store_sync(Arc::clone(&store), &session, user_text, bot_text);
            }

            sessions.remove(&key);
        });
    }
}

async fn initialize_session(
    store: &Arc<dyn ConversationStore>,
    tenant: &TenantId,
    user: &UserRef,
    trail_cap: usize,
) -> Session {
    match store.initialize(tenant, user).await {
        Ok(record) => Session::new(
            crate::types::SessionId::new(record.session_id),
            tenant.clone(),
            user.clone(),
            trail_cap,
        ),
        Err(err) => {
            warn!(%tenant, %user, "failed to initialize conversation record: {err}");
            Session::new(
                crate::types::SessionId::generate(),
                tenant.clone(),
                user.clone(),
                trail_cap,
            )
        }
    }
}

fn spawn_store_sync(store: Arc<dyn ConversationStore>, session: &Session, user_text: String, bot_text: String) {
    let session_id = session.id.clone();
    let intent = session.last_intent.as_ref().map(|i| format!("{i:?}"));
    let step = format!("{:?}", session.stage);
    let linked_order = session.pending_order.as_ref().and_then(|o| o.id.clone());
    let context = ConversationContext {
        selected_items: session
            .cart
            .items
            .iter()
            .map(|i| i.menu_item_id.as_str().to_string())
            .collect(),
        order_total: session.pending_order.as_ref().map(|o| o.total.to_string()),
        delivery_address: session.customer.address.clone(),
        payment_method: session
            .pending_order
            .as_ref()
            .and_then(|o| o.payment_method)
            .map(|p| format!("{p:?}")),
        customer_name: session.customer.name.clone(),
        current_order_id: linked_order.as_ref().map(|o| o.as_str().to_string()),
    };

    tokio::spawn(async move {
        sync_step(
            store.as_ref(),
            &session_id,
            &user_text,
            &bot_text,
            intent.as_deref(),
            Some(step.as_str()),
            &context,
            linked_order.as_ref(),
        )
        .await;
    });
}

fn describe_event(event: &Event) -> String {
    match &event.body {
        EventBody::Text { text } => text.clone(),
        EventBody::Button { title, .. } => format!("[button: {title}]"),
        EventBody::ListSel { title, .. } => format!("[list: {title}]"),
        EventBody::Location { lat, lng, .. } => format!("[location: {lat},{lng}]"),
        EventBody::Contact { contacts } => format!("[contact: {} entries]", contacts.len()),
    }
}

fn summarize_plan(plan: &OutboundPlan) -> String {
    if plan.is_empty() {
        return String::new();
    }
    plan.iter()
        .map(|m| match m {
            crate::composer::OutboundMessage::Text(t) => t.text.clone(),
            crate::composer::OutboundMessage::Buttons(b) => b.body.clone(),
            crate::composer::OutboundMessage::List(l) => l.body.clone(),
            crate::composer::OutboundMessage::Carousel(c) => c.body.clone(),
            crate::composer::OutboundMessage::Location(_) => "[location]".to_string(),
            crate::composer::OutboundMessage::LocationRequest(l) => l.body.clone(),
            crate::composer::OutboundMessage::Contacts(_) => "[contacts]".to_string(),
        })
        .collect::<Vec<_>>()
        .join(" / ")
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Background sweep: evicts sessions whose mailbox has had no activity
/// for longer than `idle_ttl`. Dropping the map entry drops the
/// sender, which ends the worker's `rx.recv()` loop on its own.
pub async fn run_idle_sweep(dispatcher: Arc<Dispatcher>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        let cutoff = now_ms() - dispatcher.idle_ttl.as_millis() as i64;
        let stale: Vec<(TenantId, UserRef)> = dispatcher
            .sessions
            .iter()
            .filter(|entry| entry.value().last_activity_ms.load(Ordering::Relaxed) < cutoff)
            .map(|entry| entry.key().clone())
            .collect();
        let evicted = stale.len();
        for key in stale {
            dispatcher.sessions.remove(&key);
        }
        if evicted > 0 {
            debug!(evicted, active = dispatcher.sessions.len(), "idle sweep evicted sessions");
        }
    }
}
