//! Order entity and status lifecycle. See `spec.md` §3.

mod model;

pub use model::{Customer, DeliveryMethod, Order, OrderStatus, PaymentMethod};
