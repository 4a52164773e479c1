//! Session state and the transport-agnostic inbound event shape. See
//! `spec.md` §3, §6.

use crate::cart::Cart;
use crate::intent::ClassTag;
use crate::order::{Customer, DeliveryMethod, Order, PaymentMethod};
use crate::pricing::Zone;
use crate::types::{Distance, IdempotencyKey, MenuItemId, SessionId, TenantId, UserRef};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Per-session stage, matching the lifecycle in `spec.md` §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OrderStage {
    Browsing,
    SelectingCategory,
    ViewingProducts,
    Customizing,
    ReviewingCart,
    CheckoutStart,
    AwaitingDeliveryMethod,
    AwaitingLocation,
    AwaitingPhone,
    AwaitingPayment,
    Confirming,
    Confirmed,
    Tracking,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrailRole {
    User,
    Bot,
}

#[derive(Debug, Clone)]
pub struct TrailEntry {
    pub role: TrailRole,
    pub text: String,
    pub at: DateTime<Utc>,
}

/// A single inbound payload shape. Structured replies (`Button`,
/// `ListSel`) carry their own `id` so the FSM resolves them without
/// going through `IntentClassifier`.
#[derive(Debug, Clone)]
pub enum EventBody {
    Text { text: String },
    Button { id: String, title: String },
    ListSel { id: String, title: String, description: Option<String> },
    Location { lat: f64, lng: f64, name: Option<String>, address: Option<String> },
    Contact { contacts: Vec<ContactEntry> },
}

#[derive(Debug, Clone)]
pub struct ContactEntry {
    pub name: String,
    pub phones: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Event {
    pub tenant: TenantId,
    pub user: UserRef,
    pub ts: i64,
    pub body: EventBody,
}

impl EventBody {
    /// Plain text the classifier operates on, or `None` for shapes that
    /// must be resolved structurally (button/list replies).
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text.as_str()),
            _ => None,
        }
    }
}

/// Builds the structured event-summary string `IntentClassifier`
/// classifies non-text events against (`spec.md` §4.5). `Text` events
/// pass their raw text through unchanged.
#[must_use]
pub fn summarize_event(body: &EventBody) -> String {
    match body {
        EventBody::Text { text } => text.clone(),
        EventBody::Button { id, title } => format!("[Button clicked: {title} (ID: {id})]"),
        EventBody::ListSel { id, title, .. } => format!("[List selection: {title} (ID: {id})]"),
        EventBody::Location { lat, lng, name, address } => {
            let name = name.clone().unwrap_or_default();
            let addr = address.clone().unwrap_or_default();
            format!("[Location shared: {name} at ({lat},{lng}) – {addr}]")
        }
        EventBody::Contact { contacts } => {
            let names = contacts.iter().map(|c| c.name.as_str()).collect::<Vec<_>>().join(", ");
            format!("[Contact(s) shared: {names}]")
        }
    }
}

/// Per-session flags that don't warrant their own stage.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionFlags {
    pub phone_known: bool,
}

/// Mutable per-session state owned exclusively by its dispatcher slot.
/// Never shared across workers once assigned (`spec.md` §5).
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub tenant: TenantId,
    pub user: UserRef,
    pub stage: OrderStage,
    pub cart: Cart,
    pub pending_order: Option<Order>,
    pub last_intent: Option<ClassTag>,
    /// Menu item awaiting a size pick while `stage == Customizing`.
    pub pending_customization_item: Option<MenuItemId>,
    pub flags: SessionFlags,
    pub last_activity_at: DateTime<Utc>,
    pub message_trail: VecDeque<TrailEntry>,
    pub idempotency_key: Option<IdempotencyKey>,
    pub delivery_method: Option<DeliveryMethod>,
    pub delivery_zone: Option<Zone>,
    pub delivery_distance: Option<Distance>,
    pub customer: Customer,
    trail_cap: usize,
}

impl Session {
    #[must_use]
    pub fn new(id: SessionId, tenant: TenantId, user: UserRef, trail_cap: usize) -> Self {
        Self {
            id,
            tenant,
            user,
            stage: OrderStage::Browsing,
            cart: Cart::new(),
            pending_order: None,
            last_intent: None,
            pending_customization_item: None,
            flags: SessionFlags::default(),
            last_activity_at: Utc::now(),
            message_trail: VecDeque::with_capacity(trail_cap),
            idempotency_key: None,
            delivery_method: None,
            delivery_zone: None,
            delivery_distance: None,
            customer: Customer::empty(),
            trail_cap,
        }
    }

    pub fn touch(&mut self) {
        self.last_activity_at = Utc::now();
    }

    pub fn record(&mut self, role: TrailRole, text: impl Into<String>) {
        if self.message_trail.len() >= self.trail_cap {
            self.message_trail.pop_front();
        }
        self.message_trail.push_back(TrailEntry {
            role,
            text: text.into(),
            at: Utc::now(),
        });
    }

    #[must_use]
    pub fn is_idle(&self, ttl: chrono::Duration) -> bool {
        Utc::now() - self.last_activity_at > ttl
    }

    /// Resets cart and ordering progress, keeping identity and the
    /// phone-known flag (a returning customer shouldn't have to retype
    /// their number after a restart).
    pub fn reset_order_progress(&mut self) {
        self.cart = Cart::new();
        self.pending_order = None;
        self.stage = OrderStage::Browsing;
        self.delivery_method = None;
        self.delivery_zone = None;
        self.delivery_distance = None;
        self.idempotency_key = None;
        self.pending_customization_item = None;
        self.touch();
    }
}
