//! Order entity, status lifecycle, and totals. See `spec.md` §3.

use crate::cart::Cart;
use crate::types::{BranchId, Distance, Money, OrderId, TenantId, UserRef};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMethod {
    Delivery,
    Pickup,
    Dinein,
}

impl DeliveryMethod {
    #[must_use]
    pub fn as_wire_str(&self) -> &'static str {
        match self {
            Self::Delivery => "delivery",
            Self::Pickup => "pickup",
            Self::Dinein => "dinein",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    Yape,
    Plin,
    MercadoPago,
    BankTransfer,
}

impl PaymentMethod {
    #[must_use]
    pub fn as_wire_str(&self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::Card => "card",
            Self::Yape => "yape",
            Self::Plin => "plin",
            Self::MercadoPago => "mercado_pago",
            Self::BankTransfer => "bank_transfer",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub name: Option<String>,
    pub phone: Option<UserRef>,
    pub address: Option<String>,
}

impl Customer {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            name: None,
            phone: None,
            address: None,
        }
    }
}

/// Order lifecycle status. `Confirmed` and later are terminal for cart
/// mutation purposes: once `confirmed`, the cart snapshot is immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Preparing,
    Ready,
    Dispatched,
    Delivered,
    Cancelled,
    Rejected,
}

impl OrderStatus {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled | Self::Rejected)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Option<OrderId>,
    pub tenant: TenantId,
    pub branch: Option<BranchId>,
    pub cart_snapshot: Cart,
    pub status: OrderStatus,
    pub delivery_method: DeliveryMethod,
    pub payment_method: Option<PaymentMethod>,
    pub customer: Customer,
    pub delivery_zone: Option<String>,
    pub delivery_distance_km: Option<Distance>,
    pub subtotal: Money,
    pub tax_rate: Decimal,
    pub tax_amount: Money,
    pub delivery_fee: Money,
    pub discount: Money,
    pub total: Money,
    pub created_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub estimated_ready_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Builds a pending order snapshot from a cart, computing
    /// `taxAmount = round(subtotal × taxRate)` and
    /// `total = subtotal + taxAmount + deliveryFee − discount`.
    #[must_use]
    pub fn from_cart(
        tenant: TenantId,
        cart: Cart,
        delivery_method: DeliveryMethod,
        tax_rate: Decimal,
        delivery_fee: Money,
        discount: Money,
    ) -> Self {
        let subtotal = cart.subtotal();
        let tax_amount = subtotal.scale(tax_rate);
        let total = (subtotal + tax_amount + delivery_fee).saturating_sub(discount);
        Self {
            id: None,
            tenant,
            branch: None,
            cart_snapshot: cart,
            status: OrderStatus::Pending,
            delivery_method,
            payment_method: None,
            customer: Customer::empty(),
            delivery_zone: None,
            delivery_distance_km: None,
            subtotal,
            tax_rate,
            tax_amount,
            delivery_fee,
            discount,
            total,
            created_at: Utc::now(),
            confirmed_at: None,
            estimated_ready_at: None,
        }
    }

    /// Marks the order confirmed. The cart snapshot is already immutable
    /// by construction (we only ever clone `Cart` into the order, never
    /// share a mutable reference), so there is nothing further to freeze.
    pub fn confirm(&mut self, id: OrderId) {
        self.id = Some(id);
        self.status = OrderStatus::Confirmed;
        self.confirmed_at = Some(Utc::now());
    }

    #[must_use]
    pub fn is_total_consistent(&self) -> bool {
        let expected = (self.subtotal + self.tax_amount + self.delivery_fee)
            .saturating_sub(self.discount);
        expected == self.total && !self.total.is_negative()
    }
}
