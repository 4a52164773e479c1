//! Inbound webhook transport: thin glue between the wire `Event` shape
//! and the `Dispatcher`. No signature verification or media download —
//! both are explicit Non-goals (`spec.md` §9).

use crate::dispatcher::Dispatcher;
use crate::fsm::{ContactEntry, Event, EventBody};
use crate::types::{TenantId, UserRef};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum WireBody {
    Text { text: String },
    Button { id: String, title: String },
    ListSel {
        id: String,
        title: String,
        #[serde(default)]
        description: Option<String>,
    },
    Location {
        lat: f64,
        lng: f64,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        address: Option<String>,
    },
    Contact { contacts: Vec<WireContact> },
}

#[derive(Debug, Deserialize)]
struct WireContact {
    name: String,
    #[serde(default)]
    phones: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct WireEvent {
    tenant: String,
    user: String,
    ts: i64,
    body: WireBody,
}

impl TryFrom<WireEvent> for Event {
    type Error = crate::errors::EngineError;

    fn try_from(wire: WireEvent) -> Result<Self, Self::Error> {
        let body = match wire.body {
            WireBody::Text { text } => EventBody::Text { text },
            WireBody::Button { id, title } => EventBody::Button { id, title },
            WireBody::ListSel { id, title, description } => {
                EventBody::ListSel { id, title, description }
            }
            WireBody::Location { lat, lng, name, address } => {
                EventBody::Location { lat, lng, name, address }
            }
            WireBody::Contact { contacts } => EventBody::Contact {
                contacts: contacts
                    .into_iter()
                    .map(|c| ContactEntry { name: c.name, phones: c.phones })
                    .collect(),
            },
        };
        Ok(Event {
            tenant: TenantId::new(wire.tenant),
            user: UserRef::new(wire.user)?,
            ts: wire.ts,
            body,
        })
    }
}

#[derive(Clone)]
pub struct WebhookState {
    pub dispatcher: Arc<Dispatcher>,
    #[cfg(feature = "monitoring")]
    pub metrics_handle: Option<Arc<metrics_exporter_prometheus::PrometheusHandle>>,
}

pub fn router(state: WebhookState) -> Router {
    let router = Router::new()
        .route("/health", get(health))
        .route("/webhook", post(receive_event));
    #[cfg(feature = "monitoring")]
    let router = router.route("/metrics", get(metrics));
    router.with_state(state)
}

async fn health() -> StatusCode {
    StatusCode::OK
}

#[cfg(feature = "monitoring")]
async fn metrics(State(state): State<WebhookState>) -> String {
    state
        .metrics_handle
        .as_ref()
        .map(|handle| handle.render())
        .unwrap_or_default()
}

async fn receive_event(
    State(state): State<WebhookState>,
    Json(wire): Json<WireEvent>,
) -> StatusCode {
    let event = match Event::try_from(wire) {
        Ok(event) => event,
        Err(err) => {
            warn!("rejected malformed inbound event: {err}");
            return StatusCode::BAD_REQUEST;
        }
    };

    match state.dispatcher.dispatch(event).await {
        Ok(()) => StatusCode::ACCEPTED,
        Err(err) => {
            warn!("failed to enqueue inbound event: {err}");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
