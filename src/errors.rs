//! Error taxonomy shared across the engine.
//!
//! Every fallible path in the engine resolves to one of these variants.
//! `SessionFsm` handlers translate each variant into a user-facing prompt
//! per the propagation policy; `ConversationStore` failures never reach
//! here because they are swallowed (logged) at the call site.

use thiserror::Error;

/// Top-level engine error taxonomy.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("delivery location is outside all known zones")]
    OutOfZone,

    #[error("subtotal below zone minimum, {remaining} more required")]
    MinimumNotMet { remaining: crate::types::Money },

    #[error("transient backend failure: {0}")]
    TransientBackend(String),

    #[error("permanent backend failure: {0}")]
    PermanentBackend(String),

    #[error("composed payload would violate API limits: {0}")]
    Compose(#[from] ComposeError),

    #[error("rate limited by backend")]
    RateLimited,
}

impl EngineError {
    /// Whether this error should be retried by the caller at a higher level.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientBackend(_) | Self::RateLimited)
    }
}

impl From<reqwest::Error> for EngineError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            Self::TransientBackend(err.to_string())
        } else {
            Self::PermanentBackend(err.to_string())
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        Self::Validation(format!("malformed JSON payload: {err}"))
    }
}

/// Errors raised by `MessageComposer` when a payload would violate a
/// WhatsApp Cloud API cardinality or length limit. Always recoverable by
/// downgrading to a plain text message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ComposeError {
    #[error("buttons payload needs 1..=3 buttons, got {0}")]
    ButtonCount(usize),

    #[error("button title exceeds 20 chars: {0:?}")]
    ButtonTitleTooLong(String),

    #[error("duplicate button id: {0:?}")]
    DuplicateButtonId(String),

    #[error("body exceeds {limit} chars")]
    BodyTooLong { limit: usize },

    #[error("header exceeds 60 chars")]
    HeaderTooLong,

    #[error("footer exceeds 60 chars")]
    FooterTooLong,

    #[error("list payload needs 1..=10 sections, got {0}")]
    SectionCount(usize),

    #[error("list section needs 1..=10 rows, got {0}")]
    RowCount(usize),

    #[error("row title exceeds 24 chars: {0:?}")]
    RowTitleTooLong(String),

    #[error("row description exceeds 72 chars: {0:?}")]
    RowDescriptionTooLong(String),

    #[error("duplicate row id: {0:?}")]
    DuplicateRowId(String),

    #[error("list action text exceeds 20 chars: {0:?}")]
    ActionTextTooLong(String),

    #[error("carousel needs 2..=10 cards, got {0}")]
    CardCount(usize),

    #[error("carousel cards must share one header type (image xor video)")]
    MixedCarouselHeaderTypes,

    #[error("card body exceeds 160 chars: {0:?}")]
    CardBodyTooLong(String),

    #[error("card index {0} is not unique")]
    DuplicateCardIndex(usize),

    #[error("carousel button display text exceeds 20 chars: {0:?}")]
    CardButtonTextTooLong(String),

    #[error("contacts payload needs at least one contact")]
    EmptyContacts,

    #[error("contact {0:?} needs at least one phone number")]
    ContactMissingPhone(String),

    #[error("invalid coordinates: lat={lat}, lng={lng}")]
    InvalidCoordinates { lat: f64, lng: f64 },
}

/// Convenience alias used throughout the engine.
pub type EngineResult<T> = Result<T, EngineError>;
