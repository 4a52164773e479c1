//! Shared fixtures for the end-to-end conversation scenarios in
//! `spec.md` §8: a fake menu catalog plus helpers to build a `SessionFsm`
//! wired against a `wiremock` stand-in for the remote backend.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use wiremock::MockServer;

use whatsapp_commerce_engine::cart::{CartEngine, MenuCatalog, MenuItem};
use whatsapp_commerce_engine::errors::EngineResult;
use whatsapp_commerce_engine::fsm::{Event, EventBody, Session, SessionFsm, SessionFsmConfig};
use whatsapp_commerce_engine::intent::{ClassifierConfig, IntentClassifier};
use whatsapp_commerce_engine::pricing::DeliveryPricer;
use whatsapp_commerce_engine::remote::{RemoteClient, RemoteClientConfig};
use whatsapp_commerce_engine::types::{
    ExtrasPriceTable, LatLng, MenuItemId, Money, SessionId, SizeMultipliers, TenantId, UserRef,
};

pub struct FixedCatalog {
    pub items: Vec<MenuItem>,
}

#[async_trait]
impl MenuCatalog for FixedCatalog {
    async fn find(&self, id: &MenuItemId) -> EngineResult<Option<MenuItem>> {
        Ok(self.items.iter().find(|i| &i.id == id).cloned())
    }
}

pub fn burger() -> MenuItem {
    MenuItem {
        id: MenuItemId::new("burger"),
        name: "Cheeseburger".into(),
        price: Money::parse("25.00").unwrap(),
        available: true,
        presentations: vec![],
    }
}

/// Spins up a `wiremock` server standing in for the ordering backend and
/// returns a fully wired `SessionFsm` pointed at it.
pub async fn fsm_against(server: &MockServer) -> SessionFsm {
    let remote_config = RemoteClientConfig {
        base_url: server.uri(),
        api_key: "test-key".into(),
        request_timeout: Duration::from_secs(5),
        max_concurrent_requests: 4,
        tenant_sub_domain: "acme".into(),
        tenant_local_id: "branch-1".into(),
        ..RemoteClientConfig::default()
    };
    let remote = RemoteClient::new(remote_config).unwrap();

    let catalog = Arc::new(FixedCatalog { items: vec![burger()] });
    let cart_engine = Arc::new(CartEngine::new(
        catalog,
        SizeMultipliers::default(),
        ExtrasPriceTable::default(),
    ));
    let classifier = IntentClassifier::new(Arc::new(ClassifierConfig::default()));
    let config = SessionFsmConfig {
        restaurant_location: LatLng { lat: -12.05, lng: -77.03 },
        tax_rate: Decimal::ZERO,
        step_deadline: Duration::from_secs(5),
        sub_domain: "acme".into(),
        local_id: "branch-1".into(),
    };
    SessionFsm::new(cart_engine, Arc::new(DeliveryPricer::new()), remote, classifier, config)
}

pub fn fresh_session() -> Session {
    Session::new(
        SessionId::generate(),
        TenantId::new("acme"),
        UserRef::new("+15551234567").unwrap(),
        20,
    )
}

pub fn text_event(session: &Session, text: &str) -> Event {
    Event {
        tenant: session.tenant.clone(),
        user: session.user.clone(),
        ts: 0,
        body: EventBody::Text { text: text.into() },
    }
}

pub fn button_event(session: &Session, id: &str, title: &str) -> Event {
    Event {
        tenant: session.tenant.clone(),
        user: session.user.clone(),
        ts: 0,
        body: EventBody::Button { id: id.into(), title: title.into() },
    }
}

pub fn list_event(session: &Session, id: &str, title: &str) -> Event {
    Event {
        tenant: session.tenant.clone(),
        user: session.user.clone(),
        ts: 0,
        body: EventBody::ListSel { id: id.into(), title: title.into(), description: None },
    }
}

pub fn location_event(session: &Session, lat: f64, lng: f64) -> Event {
    Event {
        tenant: session.tenant.clone(),
        user: session.user.clone(),
        ts: 0,
        body: EventBody::Location { lat, lng, name: None, address: None },
    }
}
