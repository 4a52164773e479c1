//! End-to-end conversation scenarios against a `SessionFsm` wired to a
//! `wiremock` stand-in for the remote backend. Mirrors the worked
//! examples in `spec.md` §8.

mod common;

use common::*;
use serde_json::json;
use whatsapp_commerce_engine::fsm::OrderStage;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn menu_body() -> serde_json::Value {
    json!({
        "success": true,
        "data": {
            "categories": [{
                "id": "cat-1",
                "name": "Burgers",
                "products": [{
                    "id": "burger",
                    "name": "Cheeseburger",
                    "base_price": "25.00",
                    "available": true
                }]
            }]
        }
    })
}

async fn mount_menu(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/menu/bot-structure"))
        .respond_with(ResponseTemplate::new(200).set_body_json(menu_body()))
        .mount(server)
        .await;
}

/// Scenario 1: pickup happy path — browse, add item, checkout as pickup,
/// pay cash, confirm. No delivery pricing involved.
#[tokio::test]
async fn pickup_happy_path_confirms_order() {
    let server = MockServer::start().await;
    mount_menu(&server).await;
    Mock::given(method("POST"))
        .and(path("/orders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": { "id": "order-123" }
        })))
        .mount(&server)
        .await;

    let fsm = fsm_against(&server).await;
    let mut session = fresh_session();

    fsm.step(&mut session, text_event(&session, "menu")).await;
    assert_eq!(session.stage, OrderStage::SelectingCategory);

    fsm.step(&mut session, list_event(&session, "cat-1", "Burgers")).await;
    assert_eq!(session.stage, OrderStage::ViewingProducts);

    fsm.step(&mut session, list_event(&session, "burger", "Cheeseburger")).await;
    assert_eq!(session.stage, OrderStage::ReviewingCart);
    assert!(!session.cart.is_empty());

    fsm.step(&mut session, button_event(&session, "checkout", "Checkout")).await;
    assert_eq!(session.stage, OrderStage::CheckoutStart);

    fsm.step(&mut session, button_event(&session, "pickup", "Pickup")).await;
    assert_eq!(session.stage, OrderStage::AwaitingPhone);

    fsm.step(&mut session, text_event(&session, "+15557654321")).await;
    assert_eq!(session.stage, OrderStage::AwaitingPayment);
    assert!(session.flags.phone_known);

    fsm.step(&mut session, button_event(&session, "cash", "Cash")).await;
    assert_eq!(session.stage, OrderStage::Confirming);

    let plan = fsm.step(&mut session, button_event(&session, "confirm", "Confirm order")).await;
    assert_eq!(session.stage, OrderStage::Confirmed);
    assert_eq!(
        session.pending_order.as_ref().unwrap().id.as_ref().unwrap().as_str(),
        "order-123"
    );
    assert_eq!(plan.len(), 1);
}

/// Scenario 2: delivery with free-delivery threshold met — fee should be
/// waived and the flow should still reach phone → payment → confirm.
#[tokio::test]
async fn delivery_free_threshold_waives_fee() {
    let server = MockServer::start().await;
    mount_menu(&server).await;
    Mock::given(method("POST"))
        .and(path("/delivery/calculate-cost"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {
                "zone": {
                    "id": "z1",
                    "name": "Central",
                    "base_cost": "5.00",
                    "base_distance_km": 2.0,
                    "incremental_cost": "2.00",
                    "distance_increment_km": 1.0,
                    "minimum_order": "10.00",
                    "estimated_time_min": 30,
                    "allows_free_delivery": true,
                    "minimum_for_free_delivery": "20.00"
                },
                "distanceKm": 3.0
            }
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/orders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": { "id": "order-456" }
        })))
        .mount(&server)
        .await;

    let fsm = fsm_against(&server).await;
    let mut session = fresh_session();

    fsm.step(&mut session, text_event(&session, "menu")).await;
    fsm.step(&mut session, list_event(&session, "cat-1", "Burgers")).await;
    fsm.step(&mut session, list_event(&session, "burger", "Cheeseburger")).await;
    fsm.step(&mut session, button_event(&session, "checkout", "Checkout")).await;

    fsm.step(&mut session, button_event(&session, "delivery", "Delivery")).await;
    assert_eq!(session.stage, OrderStage::AwaitingLocation);

    let plan = fsm.step(&mut session, location_event(&session, -12.06, -77.04)).await;
    assert_eq!(session.stage, OrderStage::AwaitingPhone);
    let first_text = match &plan[0] {
        whatsapp_commerce_engine::composer::OutboundMessage::Text(t) => t.text.clone(),
        _ => panic!("expected text message"),
    };
    assert!(first_text.contains("free delivery applied"));

    fsm.step(&mut session, text_event(&session, "+15557654321")).await;
    fsm.step(&mut session, button_event(&session, "card", "Card")).await;
    assert_eq!(session.stage, OrderStage::Confirming);
    assert_eq!(session.pending_order.as_ref().unwrap().delivery_fee.to_string(), "0.00");

    fsm.step(&mut session, button_event(&session, "confirm", "Confirm order")).await;
    assert_eq!(session.stage, OrderStage::Confirmed);
}

/// Scenario 3: delivery with stepped mileage pricing, below the
/// free-delivery threshold — fee should reflect the base + increments.
#[tokio::test]
async fn delivery_stepped_pricing_applies_increments() {
    let server = MockServer::start().await;
    mount_menu(&server).await;
    Mock::given(method("POST"))
        .and(path("/delivery/calculate-cost"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {
                "zone": {
                    "id": "z1",
                    "name": "Central",
                    "base_cost": "5.00",
                    "base_distance_km": 2.0,
                    "incremental_cost": "2.00",
                    "distance_increment_km": 1.0,
                    "minimum_order": "10.00",
                    "estimated_time_min": 30,
                    "allows_free_delivery": true,
                    "minimum_for_free_delivery": "9999.00"
                },
                "distanceKm": 4.5
            }
        })))
        .mount(&server)
        .await;

    let fsm = fsm_against(&server).await;
    let mut session = fresh_session();

    fsm.step(&mut session, text_event(&session, "menu")).await;
    fsm.step(&mut session, list_event(&session, "cat-1", "Burgers")).await;
    fsm.step(&mut session, list_event(&session, "burger", "Cheeseburger")).await;
    fsm.step(&mut session, button_event(&session, "checkout", "Checkout")).await;
    fsm.step(&mut session, button_event(&session, "delivery", "Delivery")).await;

    let plan = fsm.step(&mut session, location_event(&session, -12.06, -77.04)).await;
    // distance 4.5km, base 2km, increment 1km -> ceil(2.5) = 3 increments
    // fee = 5.00 + 3 * 2.00 = 11.00
    let first_text = match &plan[0] {
        whatsapp_commerce_engine::composer::OutboundMessage::Text(t) => t.text.clone(),
        _ => panic!("expected text message"),
    };
    assert!(first_text.contains("11.00"));
    assert_eq!(session.delivery_zone.as_ref().unwrap().id, "z1");
}

/// Scenario 4: out-of-zone address falls back to pickup/dine-in choice
/// without losing the cart.
#[tokio::test]
async fn out_of_zone_offers_pickup_or_dinein() {
    let server = MockServer::start().await;
    mount_menu(&server).await;
    Mock::given(method("POST"))
        .and(path("/delivery/calculate-cost"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": { "zone": null, "distanceKm": 0.0 }
        })))
        .mount(&server)
        .await;

    let fsm = fsm_against(&server).await;
    let mut session = fresh_session();

    fsm.step(&mut session, text_event(&session, "menu")).await;
    fsm.step(&mut session, list_event(&session, "cat-1", "Burgers")).await;
    fsm.step(&mut session, list_event(&session, "burger", "Cheeseburger")).await;
    fsm.step(&mut session, button_event(&session, "checkout", "Checkout")).await;
    fsm.step(&mut session, button_event(&session, "delivery", "Delivery")).await;

    fsm.step(&mut session, location_event(&session, 40.0, -3.0)).await;
    assert_eq!(session.stage, OrderStage::AwaitingDeliveryMethod);
    assert!(!session.cart.is_empty(), "cart must survive an out-of-zone rejection");

    fsm.step(&mut session, button_event(&session, "pickup", "Pickup")).await;
    assert_eq!(session.stage, OrderStage::AwaitingPhone);
}

/// Scenario 5: phone-missing recovery keeps the same idempotency key
/// across retries on transient failure, but rotates it after a
/// permanent rejection.
#[tokio::test]
async fn idempotency_key_rotates_only_on_permanent_failure() {
    let server = MockServer::start().await;
    mount_menu(&server).await;
    Mock::given(method("POST"))
        .and(path("/orders"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "success": false,
            "message": "invalid address"
        })))
        .mount(&server)
        .await;

    let fsm = fsm_against(&server).await;
    let mut session = fresh_session();

    fsm.step(&mut session, text_event(&session, "menu")).await;
    fsm.step(&mut session, list_event(&session, "cat-1", "Burgers")).await;
    fsm.step(&mut session, list_event(&session, "burger", "Cheeseburger")).await;
    fsm.step(&mut session, button_event(&session, "checkout", "Checkout")).await;
    fsm.step(&mut session, button_event(&session, "pickup", "Pickup")).await;
    fsm.step(&mut session, text_event(&session, "+15557654321")).await;
    fsm.step(&mut session, button_event(&session, "cash", "Cash")).await;

    fsm.step(&mut session, button_event(&session, "confirm", "Confirm order")).await;
    assert_eq!(session.stage, OrderStage::ReviewingCart);
    assert!(session.idempotency_key.is_none(), "permanent rejection must clear the key");
    assert!(!session.cart.is_empty(), "cart must survive a permanent order rejection");
}

/// Scenario 6: a malformed carousel request degrades to plain text (or a
/// split carousel) instead of failing the step outright.
#[tokio::test]
async fn composer_degrades_invalid_carousel_to_text() {
    use whatsapp_commerce_engine::composer::{
        Card, CardButton, CardHeader, CarouselHeaderType, MessageComposer, OutboundMessage,
    };

    fn card(index: u32, kind: CarouselHeaderType) -> Card {
        Card {
            index,
            header: CardHeader {
                kind,
                link: "https://example.com/img.png".into(),
            },
            body: format!("Card {index}"),
            button: CardButton {
                text: "View".into(),
                url: "https://example.com".into(),
            },
        }
    }

    let composer = MessageComposer::new();

    // A single card can't form a carousel (needs at least two); this
    // degrades to a single text message listing it.
    let plan = composer.carousel_or_downgrade(
        "Today's specials",
        vec![card(0, CarouselHeaderType::Image)],
    );
    assert_eq!(plan.len(), 1);
    match &plan[0] {
        OutboundMessage::Text(t) => {
            assert!(t.text.contains("Today's specials"));
            assert!(t.text.contains("Card 0"));
        }
        other => panic!("expected a text fallback message, got {other:?}"),
    }

    // Mixed header types can't share one carousel; this splits into one
    // carousel per header kind rather than failing outright.
    let mixed = vec![
        card(0, CarouselHeaderType::Image),
        card(1, CarouselHeaderType::Image),
        card(2, CarouselHeaderType::Video),
        card(3, CarouselHeaderType::Video),
    ];
    let plan = composer.carousel_or_downgrade("Today's specials", mixed);
    assert_eq!(plan.len(), 2, "expected one carousel per header kind");
    for msg in &plan {
        match msg {
            OutboundMessage::Carousel(c) => {
                assert_eq!(c.cards.len(), 2);
                assert!(c.cards.iter().all(|card| card.header.kind == c.cards[0].header.kind));
            }
            other => panic!("expected a carousel message, got {other:?}"),
        }
    }
}
