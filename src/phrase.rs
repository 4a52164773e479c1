//! PhraseGenerator: decorative text variation on top of the guaranteed
//! static template table. See `spec.md` §7 ("User-visible tone").
//!
//! Every caller already has a static fallback string in hand; a
//! `PhraseGenerator` call only replaces it when it returns in time.

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

pub const PHRASE_TIMEOUT_MS: u64 = 500;

/// What the phrase is being generated for — lets an implementation
/// vary tone by situation without the caller hand-building a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhraseKind {
    Greeting,
    AddedToCart,
    CartEmpty,
    OutOfZone,
    OrderConfirmed,
    TransientApology,
}

#[async_trait]
pub trait PhraseGenerator: Send + Sync {
    async fn generate(&self, kind: PhraseKind, context: &str) -> Option<String>;
}

/// Always-available static phrasing; used directly or as the fallback
/// layer behind a decorative `PhraseGenerator`.
#[must_use]
pub fn static_template(kind: PhraseKind) -> &'static str {
    match kind {
        PhraseKind::Greeting => "Hi! What would you like to order today?",
        PhraseKind::AddedToCart => "Added to your cart.",
        PhraseKind::CartEmpty => "Your cart is empty.",
        PhraseKind::OutOfZone => "Sorry, that location is outside our delivery zones.",
        PhraseKind::OrderConfirmed => "Your order is confirmed!",
        PhraseKind::TransientApology => "Sorry, we're having trouble right now. Please try again shortly.",
    }
}

/// Calls `generator` with a bounded deadline and falls back to the
/// static template on timeout, `None`, or any generator failure. Never
/// returns an empty string.
pub async fn phrase_or_fallback(
    generator: &dyn PhraseGenerator,
    kind: PhraseKind,
    context: &str,
) -> String {
    match tokio::time::timeout(
        Duration::from_millis(PHRASE_TIMEOUT_MS),
        generator.generate(kind, context),
    )
    .await
    {
        Ok(Some(text)) if !text.trim().is_empty() => text,
        Ok(_) => static_template(kind).to_string(),
        Err(_) => {
            debug!(?kind, "phrase generator exceeded deadline, using static template");
            static_template(kind).to_string()
        }
    }
}

/// A `PhraseGenerator` that always defers to the static table. Used
/// when no decorative generator is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct StaticPhraseGenerator;

#[async_trait]
impl PhraseGenerator for StaticPhraseGenerator {
    async fn generate(&self, kind: PhraseKind, _context: &str) -> Option<String> {
        Some(static_template(kind).to_string())
    }
}
