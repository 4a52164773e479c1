//! SessionFSM: routes inbound events to stage handlers and emits an
//! `OutboundPlan`. See `spec.md` §4.6.

mod session;

pub use session::{ContactEntry, Event, EventBody, OrderStage, Session, SessionFlags, TrailRole};

use crate::cart::CartEngine;
use crate::composer::{Button, MessageComposer, OutboundPlan, Row, Section};
use crate::errors::{EngineError, EngineResult};
use crate::intent::IntentClassifier;
use crate::order::{DeliveryMethod, Order, PaymentMethod};
use crate::phrase::{phrase_or_fallback, PhraseGenerator, PhraseKind, StaticPhraseGenerator};
use crate::pricing::{validate_address, DeliveryPricer};
use crate::remote::dto::{CreateOrderPayload, DeliveryInfoPayload, OrderCustomerPayload, OrderItemPayload};
use crate::remote::RemoteClient;
use crate::types::{IdempotencyKey, LatLng, MenuItemId, Money, OrderId, Size, UserRef};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct SessionFsmConfig {
    pub restaurant_location: LatLng,
    pub tax_rate: Decimal,
    pub step_deadline: Duration,
    pub sub_domain: String,
    pub local_id: String,
}

impl Default for SessionFsmConfig {
    fn default() -> Self {
        Self {
            restaurant_location: LatLng { lat: 0.0, lng: 0.0 },
            tax_rate: Decimal::ZERO,
            step_deadline: Duration::from_secs(30),
            sub_domain: String::new(),
            local_id: String::new(),
        }
    }
}

/// Orchestrates one tenant's conversation handling. Stateless itself —
/// all mutable state lives in the `Session` passed to `step`.
pub struct SessionFsm {
    cart_engine: Arc<CartEngine>,
    pricer: Arc<DeliveryPricer>,
    remote: RemoteClient,
    composer: MessageComposer,
    classifier: IntentClassifier,
    phrase_generator: Arc<dyn PhraseGenerator>,
    config: SessionFsmConfig,
}

/// Lightweight global shortcuts layered on top of the literal classifier
/// contract (`spec.md` §4.5 defines no equivalent tags) — an FSM-level
/// usability extension, checked before stage dispatch and independent
/// of `IntentClassifier::classify`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GlobalCommand {
    Restart,
    CancelOrder,
    Help,
    TrackOrder,
}

fn detect_global_command(text: &str) -> Option<GlobalCommand> {
    let normalized = text.trim().to_lowercase();
    const RESTART: [&str; 3] = ["restart", "start over", "reset"];
    const CANCEL: [&str; 2] = ["cancel", "stop order"];
    const HELP: [&str; 2] = ["help", "support"];
    const TRACK: [&str; 3] = ["track", "where is my order", "order status"];
    if RESTART.iter().any(|kw| normalized.contains(kw)) {
        Some(GlobalCommand::Restart)
    } else if CANCEL.iter().any(|kw| normalized.contains(kw)) {
        Some(GlobalCommand::CancelOrder)
    } else if HELP.iter().any(|kw| normalized.contains(kw)) {
        Some(GlobalCommand::Help)
    } else if TRACK.iter().any(|kw| normalized.contains(kw)) {
        Some(GlobalCommand::TrackOrder)
    } else {
        None
    }
}

/// Parses a paginated list-row id of the form `page:<category_id>:<offset>`
/// back into its parts. Category ids never contain `:`.
fn parse_page_token(id: &str) -> Option<(String, usize)> {
    let rest = id.strip_prefix("page:")?;
    let (category_id, offset) = rest.rsplit_once(':')?;
    let offset = offset.parse().ok()?;
    Some((category_id.to_string(), offset))
}

/// Capitalized label for a size button, e.g. `size_xlarge` -> "X-Large".
fn size_label(size: Size) -> &'static str {
    match size {
        Size::Small => "Small",
        Size::Medium => "Medium",
        Size::Large => "Large",
        Size::Xlarge => "X-Large",
    }
}

impl SessionFsm {
    #[must_use]
    pub fn new(
        cart_engine: Arc<CartEngine>,
        pricer: Arc<DeliveryPricer>,
        remote: RemoteClient,
        classifier: IntentClassifier,
        config: SessionFsmConfig,
    ) -> Self {
        Self {
            cart_engine,
            pricer,
            remote,
            composer: MessageComposer::new(),
            classifier,
            phrase_generator: Arc::new(StaticPhraseGenerator),
            config,
        }
    }

    /// Swaps in a decorative [`PhraseGenerator`] in place of the static
    /// template table `new` installs by default.
    #[must_use]
    pub fn with_phrase_generator(mut self, phrase_generator: Arc<dyn PhraseGenerator>) -> Self {
        self.phrase_generator = phrase_generator;
        self
    }

    async fn phrase(&self, kind: PhraseKind, context: &str) -> String {
        phrase_or_fallback(self.phrase_generator.as_ref(), kind, context).await
    }

    /// Processes one event end to end. Never lets a handler error, panic
    /// payload, or deadline overrun escape as an `Err` — every path
    /// resolves to an `OutboundPlan`, even if that plan is a single
    /// apology message with the stage left unchanged.
    pub async fn step(&self, session: &mut Session, event: Event) -> OutboundPlan {
        session.touch();
        let deadline = self.config.step_deadline;
        match tokio::time::timeout(deadline, self.handle(session, event)).await {
            Ok(Ok(plan)) => plan,
            Ok(Err(err)) => self.translate_error(session, err).await,
            Err(_) => {
                warn!(session = %session.id, "step exceeded deadline");
                vec![self
                    .composer
                    .text("Sorry, that took too long. Please try again.")]
            }
        }
    }

    async fn handle(&self, session: &mut Session, event: Event) -> EngineResult<OutboundPlan> {
        if let Some(text) = event.body.as_text() {
            if let Some(command) = detect_global_command(text) {
                match command {
                    GlobalCommand::Restart => {
                        session.reset_order_progress();
                        return Ok(vec![self.composer.text(
                            "Starting over. What would you like to order today? Send \"menu\" to browse.",
                        )]);
                    }
                    GlobalCommand::CancelOrder if session.stage != OrderStage::Confirmed => {
                        session.reset_order_progress();
                        return Ok(vec![self.composer.text("Your order has been cancelled.")]);
                    }
                    GlobalCommand::CancelOrder => {}
                    GlobalCommand::Help => {
                        return Ok(vec![self.composer.text(
                            "Send \"menu\" to browse, \"cart\" to review your order, or \"track\" to check an existing order.",
                        )]);
                    }
                    GlobalCommand::TrackOrder => return self.handle_track(session).await,
                }
            }
        }

        session.last_intent = Some(self.classifier.classify(&session::summarize_event(&event.body)));

        match session.stage {
            OrderStage::Browsing | OrderStage::SelectingCategory => {
                self.handle_browsing(session, &event).await
            }
            OrderStage::ViewingProducts => self.handle_viewing_products(session, &event).await,
            OrderStage::Customizing => self.handle_customizing(session, &event).await,
            OrderStage::ReviewingCart => self.handle_reviewing_cart(session, &event).await,
            OrderStage::CheckoutStart => self.handle_checkout_start(session, &event).await,
            OrderStage::AwaitingDeliveryMethod => {
                self.handle_awaiting_delivery_method(session, &event).await
            }
            OrderStage::AwaitingLocation => self.handle_awaiting_location(session, &event).await,
            OrderStage::AwaitingPhone => self.handle_awaiting_phone(session, &event).await,
            OrderStage::AwaitingPayment => self.handle_awaiting_payment(session, &event).await,
            OrderStage::Confirming => self.handle_confirming(session, &event).await,
            OrderStage::Confirmed | OrderStage::Tracking => self.handle_track(session).await,
        }
    }

    async fn handle_browsing(&self, session: &mut Session, event: &Event) -> EngineResult<OutboundPlan> {
        if let EventBody::ListSel { id, .. } = &event.body {
            return self.show_products(session, id, 0).await;
        }
        let tree = self
            .remote
            .get_menu_bot_structure(&self.config.sub_domain, &self.config.local_id)
            .await?;
        let sections: Vec<Section> = vec![Section {
            title: "Categories".to_string(),
            rows: tree
                .categories
                .iter()
                .take(10)
                .map(|c| Row {
                    id: c.id.clone(),
                    title: self.composer.truncate_body(&c.name, 24),
                    description: None,
                })
                .collect(),
        }];
        session.stage = OrderStage::SelectingCategory;
        let msg = self
            .composer
            .list("Here's what we have today:", None, None, "View menu", sections)
            .unwrap_or_else(|_| self.composer.text("Send \"menu\" again to see our categories."));
        Ok(vec![msg])
    }

    /// Products shown per page. `spec.md` §4.6/§8 reserves the list
    /// section's 10th row for a "More" continuation when items remain, so
    /// only 9 real items fit a page alongside it.
    const PRODUCTS_PAGE_SIZE: usize = 9;

    async fn show_products(
        &self,
        session: &mut Session,
        category_id: &str,
        offset: usize,
    ) -> EngineResult<OutboundPlan> {
        let tree = self
            .remote
            .get_menu_bot_structure(&self.config.sub_domain, &self.config.local_id)
            .await?;
        let category = tree
            .categories
            .iter()
            .find(|c| c.id == category_id)
            .ok_or_else(|| EngineError::NotFound(format!("category {category_id}")))?;

        let page: Vec<_> = category
            .products
            .iter()
            .skip(offset)
            .take(Self::PRODUCTS_PAGE_SIZE)
            .collect();
        let has_more = category.products.len() > offset + page.len();

        let mut rows: Vec<Row> = page
            .iter()
            .map(|p| Row {
                id: p.id.clone(),
                title: self.composer.truncate_body(&p.name, 24),
                description: Some(self.composer.truncate_body(&format!("{}", p.base_price), 72)),
            })
            .collect();

        if has_more {
            let next_offset = offset + page.len();
            rows.push(Row {
                id: format!("page:{category_id}:{next_offset}"),
                title: "More".to_string(),
                description: Some("See more items".to_string()),
            });
        }

        session.stage = OrderStage::ViewingProducts;
        let sections = vec![Section {
            title: category.name.clone(),
            rows,
        }];
        let msg = self
            .composer
            .list("Pick an item:", None, None, "View items", sections)
            .unwrap_or_else(|_| self.composer.text("Send a product name to add it to your cart."));
        Ok(vec![msg])
    }

    async fn handle_viewing_products(&self, session: &mut Session, event: &Event) -> EngineResult<OutboundPlan> {
        let EventBody::ListSel { id, .. } = &event.body else {
            return Ok(vec![self.composer.text("Please pick an item from the list, or send \"menu\" to start over.")]);
        };

        if let Some((category_id, offset)) = parse_page_token(id) {
            return self.show_products(session, &category_id, offset).await;
        }

        let menu_item_id = MenuItemId::new(id.clone());
        let catalog_item = self
            .cart_engine
            .lookup(&menu_item_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("menu item {id}")))?;

        if catalog_item.presentations.is_empty() {
            let outcome = self
                .cart_engine
                .add_item(&mut session.cart, &menu_item_id, 1, None, vec![], None)
                .await?;
            session.stage = OrderStage::ReviewingCart;
            let buttons = vec![
                Button { id: "checkout".into(), title: "Checkout".into() },
                Button { id: "add_more".into(), title: "Add more".into() },
            ];
            let body = format!("{}\n\n{}", outcome.message, self.cart_engine.summary(&session.cart));
            let msg = self
                .composer
                .buttons(body, None, None, buttons)
                .unwrap_or_else(|_| self.composer.text(outcome.message));
            return Ok(vec![msg]);
        }

        session.pending_customization_item = Some(menu_item_id);
        session.stage = OrderStage::Customizing;
        let buttons: Vec<Button> = catalog_item
            .presentations
            .iter()
            .take(3)
            .map(|size| Button {
                id: format!("size_{}", size.as_wire_str()),
                title: size_label(*size).to_string(),
            })
            .collect();
        let msg = self
            .composer
            .buttons(
                format!("What size would you like for {}?", catalog_item.name),
                None,
                None,
                buttons,
            )
            .unwrap_or_else(|_| self.composer.text("Please choose a size: small, medium, or large."));
        Ok(vec![msg])
    }

    async fn handle_customizing(&self, session: &mut Session, event: &Event) -> EngineResult<OutboundPlan> {
        let EventBody::Button { id, .. } = &event.body else {
            return Ok(vec![self.composer.text("Please choose a size, or send \"cancel\".")]);
        };
        let Some(size) = id.strip_prefix("size_").and_then(Size::parse_wire) else {
            return Ok(vec![self.composer.text("Please choose one of the listed sizes.")]);
        };
        let Some(menu_item_id) = session.pending_customization_item.take() else {
            session.stage = OrderStage::Browsing;
            return Ok(vec![self.composer.text("Please send \"menu\" to start over.")]);
        };

        let outcome = self
            .cart_engine
            .add_item(&mut session.cart, &menu_item_id, 1, Some(size), vec![], None)
            .await?;
        session.stage = OrderStage::ReviewingCart;
        let buttons = vec![
            Button { id: "checkout".into(), title: "Checkout".into() },
            Button { id: "add_more".into(), title: "Add more".into() },
        ];
        let body = format!("{}\n\n{}", outcome.message, self.cart_engine.summary(&session.cart));
        let msg = self
            .composer
            .buttons(body, None, None, buttons)
            .unwrap_or_else(|_| self.composer.text(outcome.message));
        Ok(vec![msg])
    }

    async fn handle_reviewing_cart(&self, session: &mut Session, event: &Event) -> EngineResult<OutboundPlan> {
        match &event.body {
            EventBody::Button { id, .. } if id == "checkout" => {
                if session.cart.is_empty() {
                    let text = self.phrase(PhraseKind::CartEmpty, "checkout").await;
                    return Ok(vec![self.composer.text(format!("{text} Send \"menu\" to add something first."))]);
                }
                session.stage = OrderStage::CheckoutStart;
                let buttons = vec![
                    Button { id: "delivery".into(), title: "Delivery".into() },
                    Button { id: "pickup".into(), title: "Pickup".into() },
                    Button { id: "dinein".into(), title: "Dine-in".into() },
                ];
                let msg = self
                    .composer
                    .buttons("How would you like to receive your order?", None, None, buttons)
                    .unwrap_or_else(|_| self.composer.text("Reply with delivery, pickup, or dine-in."));
                Ok(vec![msg])
            }
            EventBody::Button { id, .. } if id == "add_more" => {
                session.stage = OrderStage::Browsing;
                self.handle_browsing(session, event).await
            }
            _ => Ok(vec![self.composer.text(self.cart_engine.summary(&session.cart))]),
        }
    }

    async fn handle_checkout_start(&self, session: &mut Session, event: &Event) -> EngineResult<OutboundPlan> {
        let EventBody::Button { id, .. } = &event.body else {
            return Ok(vec![self.composer.text("Reply with delivery, pickup, or dine-in.")]);
        };
        let method = match id.as_str() {
            "delivery" => DeliveryMethod::Delivery,
            "pickup" => DeliveryMethod::Pickup,
            "dinein" => DeliveryMethod::Dinein,
            _ => return Ok(vec![self.composer.text("Reply with delivery, pickup, or dine-in.")]),
        };
        session.delivery_method = Some(method);

        if method == DeliveryMethod::Delivery {
            session.stage = OrderStage::AwaitingLocation;
            return Ok(vec![self
                .composer
                .location_request("Please share your delivery location.")]);
        }

        self.advance_past_location(session)
    }

    async fn handle_awaiting_delivery_method(&self, session: &mut Session, event: &Event) -> EngineResult<OutboundPlan> {
        self.handle_checkout_start(session, event).await
    }

    async fn handle_awaiting_location(&self, session: &mut Session, event: &Event) -> EngineResult<OutboundPlan> {
        let EventBody::Location { lat, lng, .. } = &event.body else {
            return Ok(vec![self.composer.text("Please share your location to continue, or send \"cancel\".")]);
        };
        let destination = LatLng { lat: *lat, lng: *lng };

        let resolution = validate_address(&self.remote, self.config.restaurant_location, destination).await;
        let (zone, distance) = match resolution {
            Ok(pair) => pair,
            Err(EngineError::OutOfZone) => {
                session.stage = OrderStage::AwaitingDeliveryMethod;
                let text = self.phrase(PhraseKind::OutOfZone, "awaiting_location").await;
                let buttons = vec![
                    Button { id: "pickup".into(), title: "Pickup".into() },
                    Button { id: "dinein".into(), title: "Dine-in".into() },
                ];
                let msg = self
                    .composer
                    .buttons(
                        format!("{text} Would pickup or dine-in work instead?"),
                        None,
                        None,
                        buttons,
                    )
                    .unwrap_or_else(|_| self.composer.text(text));
                return Ok(vec![msg]);
            }
            Err(other) => return Err(other),
        };

        let fee_result = self.pricer.compute_fee(&zone, distance, session.cart.subtotal());
        let fee_result = match fee_result {
            Ok(r) => r,
            Err(EngineError::MinimumNotMet { remaining }) => {
                return Ok(vec![self.composer.text(format!(
                    "This zone needs a minimum order of {}. Add {} more to continue.",
                    zone.minimum_order, remaining
                ))]);
            }
            Err(other) => return Err(other),
        };

        session.delivery_zone = Some(zone);
        session.delivery_distance = Some(distance);
        session.customer.address = Some(format!("{lat},{lng}"));
        let free_note = if fee_result.free_applied {
            " (free delivery applied)".to_string()
        } else {
            String::new()
        };
        let plan = self.advance_past_location(session)?;
        let mut plan = plan;
        plan.insert(
            0,
            self.composer
                .text(format!("Delivery fee: {}{free_note}", fee_result.fee)),
        );
        Ok(plan)
    }

    fn advance_past_location(&self, session: &mut Session) -> EngineResult<OutboundPlan> {
        if session.flags.phone_known && session.customer.phone.is_some() {
            self.prompt_payment(session)
        } else {
            session.stage = OrderStage::AwaitingPhone;
            Ok(vec![self.composer.text("What's the best phone number to reach you on for this order?")])
        }
    }

    async fn handle_awaiting_phone(&self, session: &mut Session, event: &Event) -> EngineResult<OutboundPlan> {
        let EventBody::Text { text } = &event.body else {
            return Ok(vec![self.composer.text("Please send your phone number as text.")]);
        };
        let phone = UserRef::new(text.trim())?;
        session.customer.phone = Some(phone);
        session.flags.phone_known = true;
        self.prompt_payment(session)
    }

    fn prompt_payment(&self, session: &mut Session) -> EngineResult<OutboundPlan> {
        session.stage = OrderStage::AwaitingPayment;
        let buttons = vec![
            Button { id: "cash".into(), title: "Cash".into() },
            Button { id: "card".into(), title: "Card".into() },
            Button { id: "yape".into(), title: "Yape".into() },
        ];
        let msg = self
            .composer
            .buttons("How would you like to pay?", None, None, buttons)
            .unwrap_or_else(|_| self.composer.text("Reply with cash, card, or yape."));
        Ok(vec![msg])
    }

    async fn handle_awaiting_payment(&self, session: &mut Session, event: &Event) -> EngineResult<OutboundPlan> {
        let EventBody::Button { id, .. } = &event.body else {
            return Ok(vec![self.composer.text("Reply with cash, card, or yape.")]);
        };
        let method = match id.as_str() {
            "cash" => PaymentMethod::Cash,
            "card" => PaymentMethod::Card,
            "yape" => PaymentMethod::Yape,
            "plin" => PaymentMethod::Plin,
            "mercado_pago" => PaymentMethod::MercadoPago,
            "bank_transfer" => PaymentMethod::BankTransfer,
            _ => return Ok(vec![self.composer.text("Reply with cash, card, or yape.")]),
        };

        let delivery_fee = session
            .delivery_zone
            .as_ref()
            .map(|zone| {
                self.pricer
                    .compute_fee(zone, session.delivery_distance.unwrap_or(crate::types::Distance::from_km(0.0)), session.cart.subtotal())
                    .map(|r| r.fee)
                    .unwrap_or(Money::ZERO)
            })
            .unwrap_or(Money::ZERO);

        let mut order = Order::from_cart(
            session.tenant.clone(),
            session.cart.clone(),
            session.delivery_method.unwrap_or(DeliveryMethod::Pickup),
            self.config.tax_rate,
            delivery_fee,
            Money::ZERO,
        );
        order.payment_method = Some(method);
        order.customer = session.customer.clone();
        session.pending_order = Some(order);
        session.stage = OrderStage::Confirming;

        let order_ref = session.pending_order.as_ref().expect("just set");
        let buttons = vec![
            Button { id: "confirm".into(), title: "Confirm order".into() },
            Button { id: "edit_cart".into(), title: "Edit cart".into() },
        ];
        let body = format!(
            "Order total: {} (subtotal {} + tax {} + delivery {}). Confirm?",
            order_ref.total, order_ref.subtotal, order_ref.tax_amount, order_ref.delivery_fee
        );
        let msg = self
            .composer
            .buttons(body, None, None, buttons)
            .unwrap_or_else(|_| self.composer.text("Reply \"confirm\" to place your order."));
        Ok(vec![msg])
    }

    async fn handle_confirming(&self, session: &mut Session, event: &Event) -> EngineResult<OutboundPlan> {
        let EventBody::Button { id, .. } = &event.body else {
            return Ok(vec![self.composer.text("Reply \"confirm\" to place your order, or \"cancel\" to stop.")]);
        };
        if id == "edit_cart" {
            session.stage = OrderStage::ReviewingCart;
            return Ok(vec![self.composer.text(self.cart_engine.summary(&session.cart))]);
        }
        if id != "confirm" {
            return Ok(vec![self.composer.text("Reply \"confirm\" to place your order, or \"cancel\" to stop.")]);
        }

        let order = session
            .pending_order
            .clone()
            .ok_or_else(|| EngineError::Validation("no pending order to confirm".into()))?;
        let key = *session.idempotency_key.get_or_insert_with(IdempotencyKey::generate);

        let payload = CreateOrderPayload {
            customer: OrderCustomerPayload {
                name: order.customer.name.clone().unwrap_or_default(),
                phone: order.customer.phone.as_ref().map(UserRef::to_string).unwrap_or_default(),
                address: order.customer.address.clone(),
            },
            items: order
                .cart_snapshot
                .items
                .iter()
                .map(|item| OrderItemPayload {
                    product_id: item.menu_item_id.as_str().to_string(),
                    presentation_id: None,
                    name: item.name.clone(),
                    quantity: item.quantity,
                    unit_price: item.base_price,
                    modifiers: item.customization.extras.iter().map(|e| e.as_str().to_string()).collect(),
                })
                .collect(),
            order_type: order.delivery_method.as_wire_str().to_string(),
            payment_method: order
                .payment_method
                .map(|p| p.as_wire_str().to_string())
                .unwrap_or_default(),
            source: "whatsapp",
            delivery_info: order.customer.address.clone().map(|address| DeliveryInfoPayload {
                address,
                delivery_instructions: None,
            }),
        };

        match self
            .remote
            .create_order(&self.config.sub_domain, &self.config.local_id, &payload, key)
            .await
        {
            Ok(order_id) => {
                if let Some(pending) = session.pending_order.as_mut() {
                    pending.confirm(OrderId::new(order_id));
                }
                session.stage = OrderStage::Confirmed;
                let text = self.phrase(PhraseKind::OrderConfirmed, "order_confirmed").await;
                Ok(vec![self.composer.text(format!("{text} We'll let you know when it's ready."))])
            }
            Err(EngineError::PermanentBackend(msg)) => {
                session.stage = OrderStage::ReviewingCart;
                session.idempotency_key = None;
                warn!("order create rejected: {msg}");
                Ok(vec![self.composer.text(
                    "We couldn't place that order. Please review your cart and try again.",
                )])
            }
            Err(err) if err.is_transient() => {
                let text = self.phrase(PhraseKind::TransientApology, "order_confirm_retry").await;
                Ok(vec![self.composer.text(format!("{text} Please try confirming again in a moment."))])
            }
            Err(other) => Err(other),
        }
    }

    async fn handle_track(&self, session: &mut Session) -> EngineResult<OutboundPlan> {
        session.stage = OrderStage::Tracking;
        let Some(order) = session.pending_order.as_ref() else {
            return Ok(vec![self.composer.text("You don't have an active order to track.")]);
        };
        let Some(order_id) = order.id.as_ref() else {
            return Ok(vec![self.composer.text("Your order hasn't been confirmed yet.")]);
        };
        let info = self.remote.get_order(order_id.as_str()).await?;
        Ok(vec![self.composer.text(format!("Order {} is currently: {}", info.id, info.status))])
    }

    /// Translates a propagated handler error into a user-visible plan
    /// per the recovery table in `spec.md` §7. Never re-raises.
    async fn translate_error(&self, session: &mut Session, err: EngineError) -> OutboundPlan {
        match err {
            EngineError::Validation(msg) => vec![self.composer.text(format!("That didn't look right: {msg}"))],
            EngineError::NotFound(what) => vec![self.composer.text(format!("We couldn't find that ({what}). Please try again."))],
            EngineError::OutOfZone => {
                session.stage = OrderStage::AwaitingDeliveryMethod;
                let text = self.phrase(PhraseKind::OutOfZone, "translate_error").await;
                vec![self.composer.text(text)]
            }
            EngineError::MinimumNotMet { remaining } => {
                vec![self.composer.text(format!("Add {remaining} more to meet this zone's minimum order."))]
            }
            EngineError::TransientBackend(_) | EngineError::RateLimited => {
                let text = self.phrase(PhraseKind::TransientApology, "translate_error").await;
                vec![self.composer.text(text)]
            }
            EngineError::PermanentBackend(msg) => {
                if session.stage == OrderStage::Confirming {
                    session.stage = OrderStage::ReviewingCart;
                }
                vec![self.composer.text(format!("Something went wrong on our end: {msg}"))]
            }
            EngineError::Compose(_) => {
                vec![self.composer.text("Sorry, something went wrong displaying that. Please try again.")]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::MenuCatalog;
    use crate::remote::RemoteClientConfig;
    use crate::types::{ExtrasPriceTable, SessionId, SizeMultipliers, TenantId};

    struct EmptyCatalog;
    #[async_trait::async_trait]
    impl MenuCatalog for EmptyCatalog {
        async fn find(&self, _id: &MenuItemId) -> EngineResult<Option<crate::cart::MenuItem>> {
            Ok(None)
        }
    }

    fn fsm() -> SessionFsm {
        let cart_engine = Arc::new(CartEngine::new(
            Arc::new(EmptyCatalog),
            SizeMultipliers::default(),
            ExtrasPriceTable::default(),
        ));
        let remote = RemoteClient::new(RemoteClientConfig::default()).unwrap();
        let classifier = IntentClassifier::new(Arc::new(crate::intent::ClassifierConfig::default()));
        SessionFsm::new(cart_engine, Arc::new(DeliveryPricer::new()), remote, classifier, SessionFsmConfig::default())
    }

    struct SingleItemCatalog {
        presentations: Vec<Size>,
    }

    #[async_trait::async_trait]
    impl MenuCatalog for SingleItemCatalog {
        async fn find(&self, id: &MenuItemId) -> EngineResult<Option<crate::cart::MenuItem>> {
            Ok(Some(crate::cart::MenuItem {
                id: id.clone(),
                name: "Burger".into(),
                price: Money::parse("10.00").unwrap(),
                available: true,
                presentations: self.presentations.clone(),
            }))
        }
    }

    fn fsm_with_catalog(presentations: Vec<Size>) -> SessionFsm {
        let cart_engine = Arc::new(CartEngine::new(
            Arc::new(SingleItemCatalog { presentations }),
            SizeMultipliers::default(),
            ExtrasPriceTable::default(),
        ));
        let remote = RemoteClient::new(RemoteClientConfig::default()).unwrap();
        let classifier = IntentClassifier::new(Arc::new(crate::intent::ClassifierConfig::default()));
        SessionFsm::new(cart_engine, Arc::new(DeliveryPricer::new()), remote, classifier, SessionFsmConfig::default())
    }

    fn session() -> Session {
        Session::new(
            SessionId::generate(),
            TenantId::new("t1"),
            UserRef::new("+15551234567").unwrap(),
            20,
        )
    }

    #[tokio::test]
    async fn help_intent_leaves_stage_unchanged() {
        let fsm = fsm();
        let mut session = session();
        let event = Event {
            tenant: session.tenant.clone(),
            user: session.user.clone(),
            ts: 0,
            body: EventBody::Text { text: "help".into() },
        };
        let plan = fsm.step(&mut session, event).await;
        assert_eq!(session.stage, OrderStage::Browsing);
        assert_eq!(plan.len(), 1);
    }

    #[tokio::test]
    async fn restart_resets_cart() {
        let fsm = fsm();
        let mut session = session();
        session.stage = OrderStage::ReviewingCart;
        let event = Event {
            tenant: session.tenant.clone(),
            user: session.user.clone(),
            ts: 0,
            body: EventBody::Text { text: "restart".into() },
        };
        fsm.step(&mut session, event).await;
        assert_eq!(session.stage, OrderStage::Browsing);
        assert!(session.cart.is_empty());
    }

    #[tokio::test]
    async fn item_with_presentations_routes_to_customizing() {
        let fsm = fsm_with_catalog(vec![Size::Small, Size::Large]);
        let mut session = session();
        session.stage = OrderStage::ViewingProducts;
        let event = Event {
            tenant: session.tenant.clone(),
            user: session.user.clone(),
            ts: 0,
            body: EventBody::ListSel {
                id: "burger".into(),
                title: "Burger".into(),
                description: None,
            },
        };
        fsm.step(&mut session, event).await;
        assert_eq!(session.stage, OrderStage::Customizing);
        assert_eq!(session.pending_customization_item, Some(MenuItemId::new("burger")));
        assert!(session.cart.is_empty());
    }

    #[tokio::test]
    async fn item_without_presentations_is_added_directly() {
        let fsm = fsm_with_catalog(vec![]);
        let mut session = session();
        session.stage = OrderStage::ViewingProducts;
        let event = Event {
            tenant: session.tenant.clone(),
            user: session.user.clone(),
            ts: 0,
            body: EventBody::ListSel {
                id: "burger".into(),
                title: "Burger".into(),
                description: None,
            },
        };
        fsm.step(&mut session, event).await;
        assert_eq!(session.stage, OrderStage::ReviewingCart);
        assert_eq!(session.cart.items.len(), 1);
    }

    #[tokio::test]
    async fn choosing_a_size_completes_the_customization() {
        let fsm = fsm_with_catalog(vec![Size::Small, Size::Large]);
        let mut session = session();
        session.stage = OrderStage::Customizing;
        session.pending_customization_item = Some(MenuItemId::new("burger"));
        let event = Event {
            tenant: session.tenant.clone(),
            user: session.user.clone(),
            ts: 0,
            body: EventBody::Button { id: "size_large".into(), title: "Large".into() },
        };
        fsm.step(&mut session, event).await;
        assert_eq!(session.stage, OrderStage::ReviewingCart);
        assert_eq!(session.cart.items.len(), 1);
        assert_eq!(session.cart.items[0].customization.size, Some(Size::Large));
        assert!(session.pending_customization_item.is_none());
    }

    #[tokio::test]
    async fn products_page_reserves_a_more_row_past_nine_items() {
        assert_eq!(
            parse_page_token("page:cat1:9"),
            Some(("cat1".to_string(), 9))
        );
        assert_eq!(parse_page_token("burger"), None);
    }
}
