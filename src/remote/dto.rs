//! Wire DTOs for the remote backend's REST surface. See `spec.md` §4.3, §6.

use crate::types::{LatLng, Money};
use serde::{Deserialize, Serialize};

/// Raw product record from `menu/bot-structure` or `menu/product-details`.
/// Accepts either `basePrice` or `price`, and either `imageUrl` or
/// `image_url`, normalizing to one canonical shape (`spec.md` §4.4).
#[derive(Debug, Clone, Deserialize)]
pub struct RawProduct {
    pub id: String,
    pub name: String,
    #[serde(alias = "price")]
    pub base_price: Money,
    #[serde(default)]
    pub available: Option<bool>,
    #[serde(default, alias = "image_url")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub presentations: Vec<RawPresentation>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawPresentation {
    pub id: String,
    pub size: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawCategory {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub products: Vec<RawProduct>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MenuTree {
    pub categories: Vec<RawCategory>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeliveryCostRequest {
    #[serde(rename = "restaurantLocation")]
    pub restaurant_location: LatLng,
    #[serde(rename = "deliveryLocation")]
    pub delivery_location: LatLng,
    #[serde(rename = "subDomain")]
    pub sub_domain: String,
    #[serde(rename = "localId")]
    pub local_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryCostResponse {
    pub zone: Option<crate::pricing::Zone>,
    #[serde(rename = "distanceKm")]
    pub distance_km: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderItemPayload {
    #[serde(rename = "productId")]
    pub product_id: String,
    #[serde(rename = "presentationId", skip_serializing_if = "Option::is_none")]
    pub presentation_id: Option<String>,
    pub name: String,
    pub quantity: u32,
    #[serde(rename = "unitPrice")]
    pub unit_price: Money,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modifiers: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderCustomerPayload {
    pub name: String,
    pub phone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeliveryInfoPayload {
    pub address: String,
    #[serde(rename = "deliveryInstructions", skip_serializing_if = "Option::is_none")]
    pub delivery_instructions: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateOrderPayload {
    pub customer: OrderCustomerPayload,
    pub items: Vec<OrderItemPayload>,
    #[serde(rename = "type")]
    pub order_type: String,
    #[serde(rename = "paymentMethod")]
    pub payment_method: String,
    pub source: &'static str,
    #[serde(rename = "deliveryInfo", skip_serializing_if = "Option::is_none")]
    pub delivery_info: Option<DeliveryInfoPayload>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderResponse {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OrderStatusInfo {
    pub id: String,
    pub status: String,
    #[serde(rename = "estimatedReadyAt")]
    pub estimated_ready_at: Option<String>,
}

/// Conversation state record, as persisted by `ConversationStore`.
/// See `spec.md` §6 ("Persisted state").
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConversationRecord {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    #[serde(rename = "currentIntent")]
    pub current_intent: Option<String>,
    #[serde(rename = "currentStep")]
    pub current_step: Option<String>,
    pub context: serde_json::Value,
    #[serde(rename = "previousMessages", default)]
    pub previous_messages: Vec<MessageSummary>,
    #[serde(rename = "orderHistory", default)]
    pub order_history: Vec<String>,
    #[serde(rename = "lastUserMessage")]
    pub last_user_message: Option<String>,
    #[serde(rename = "lastBotMessage")]
    pub last_bot_message: Option<String>,
    pub ttl: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MessageSummary {
    pub role: String,
    pub text: String,
}
