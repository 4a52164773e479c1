//! MessageComposer: builds outbound WhatsApp interactive payloads and
//! enforces the Cloud API's structural limits. See `spec.md` §4.4.

mod payloads;

pub use payloads::{
    Button, ButtonsOut, Card, CardButton, CardHeader, CarouselHeaderType, CarouselOut, Contact,
    ContactsOut, ListOut, LocationOut, LocationRequestOut, OutboundMessage, OutboundPlan, Row,
    Section, TextOut,
};

use crate::errors::ComposeError;

const BODY_MAX: usize = 1024;
const HEADER_FOOTER_MAX: usize = 60;
const BUTTON_TITLE_MAX: usize = 20;
const ROW_TITLE_MAX: usize = 24;
const ROW_DESCRIPTION_MAX: usize = 72;
const LIST_MAX_TOTAL_ROWS: usize = 10;
const LIST_ACTION_TEXT_MAX: usize = 20;
const CAROUSEL_BODY_MAX: usize = 160;
const CAROUSEL_BUTTON_TEXT_MAX: usize = 20;

/// Truncates `s` to at most `max` characters, backing off to the last
/// whitespace boundary and appending an ellipsis. Returns `s` unchanged
/// if it already fits.
fn truncate_ellipsis(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    if max <= 1 {
        return "…".chars().take(max).collect();
    }
    let budget = max - 1;
    let chars: Vec<char> = s.chars().collect();
    let mut cut = budget.min(chars.len());
    if let Some(space_pos) = chars[..cut].iter().rposition(|c| c.is_whitespace()) {
        if space_pos > 0 {
            cut = space_pos;
        }
    }
    let mut out: String = chars[..cut].iter().collect();
    out.truncate(out.trim_end().len());
    out.push('…');
    out
}

/// Stateless builder for the outbound message shapes described in
/// `spec.md` §6. Every builder validates structural limits and returns
/// a [`ComposeError`] rather than emitting a malformed payload; the FSM
/// decides whether to downgrade to plain text on failure.
#[derive(Debug, Default, Clone, Copy)]
pub struct MessageComposer;

impl MessageComposer {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    pub fn text(&self, body: impl Into<String>) -> OutboundMessage {
        OutboundMessage::Text(TextOut { text: body.into() })
    }

    pub fn buttons(
        &self,
        body: impl Into<String>,
        header: Option<String>,
        footer: Option<String>,
        buttons: Vec<Button>,
    ) -> Result<OutboundMessage, ComposeError> {
        let body = body.into();
        if body.is_empty() || body.chars().count() > BODY_MAX {
            return Err(ComposeError::BodyTooLong { limit: BODY_MAX });
        }
        if let Some(header) = &header {
            if header.chars().count() > HEADER_FOOTER_MAX {
                return Err(ComposeError::HeaderTooLong);
            }
        }
        if let Some(footer) = &footer {
            if footer.chars().count() > HEADER_FOOTER_MAX {
                return Err(ComposeError::FooterTooLong);
            }
        }
        if buttons.is_empty() || buttons.len() > 3 {
            return Err(ComposeError::ButtonCount(buttons.len()));
        }
        let mut seen = std::collections::HashSet::new();
        for b in &buttons {
            if b.title.chars().count() > BUTTON_TITLE_MAX {
                return Err(ComposeError::ButtonTitleTooLong(b.title.clone()));
            }
            if !seen.insert(b.id.clone()) {
                return Err(ComposeError::DuplicateButtonId(b.id.clone()));
            }
        }
        Ok(OutboundMessage::Buttons(ButtonsOut {
            body,
            header,
            footer,
            buttons,
        }))
    }

    pub fn list(
        &self,
        body: impl Into<String>,
        header: Option<String>,
        footer: Option<String>,
        action_text: impl Into<String>,
        sections: Vec<Section>,
    ) -> Result<OutboundMessage, ComposeError> {
        if sections.is_empty() || sections.len() > 10 {
            return Err(ComposeError::SectionCount(sections.len()));
        }
        let action_text = action_text.into();
        if action_text.chars().count() > LIST_ACTION_TEXT_MAX {
            return Err(ComposeError::ActionTextTooLong(action_text));
        }
        let total_rows: usize = sections.iter().map(|s| s.rows.len()).sum();
        if total_rows > LIST_MAX_TOTAL_ROWS {
            return Err(ComposeError::RowCount(total_rows));
        }
        let mut row_ids = std::collections::HashSet::new();
        for section in &sections {
            if section.rows.is_empty() || section.rows.len() > 10 {
                return Err(ComposeError::RowCount(section.rows.len()));
            }
            for row in &section.rows {
                if row.title.chars().count() > ROW_TITLE_MAX {
                    return Err(ComposeError::RowTitleTooLong(row.title.clone()));
                }
                if let Some(desc) = &row.description {
                    if desc.chars().count() > ROW_DESCRIPTION_MAX {
                        return Err(ComposeError::RowDescriptionTooLong(desc.clone()));
                    }
                }
                if !row_ids.insert(row.id.clone()) {
                    return Err(ComposeError::DuplicateRowId(row.id.clone()));
                }
            }
        }
        Ok(OutboundMessage::List(ListOut {
            body: body.into(),
            header,
            footer,
            action_text,
            sections,
        }))
    }

    pub fn carousel(
        &self,
        body: impl Into<String>,
        cards: Vec<Card>,
    ) -> Result<OutboundMessage, ComposeError> {
        let body = body.into();
        if cards.len() < 2 || cards.len() > 10 {
            return Err(ComposeError::CardCount(cards.len()));
        }
        if body.is_empty() || body.chars().count() > BODY_MAX {
            return Err(ComposeError::BodyTooLong { limit: BODY_MAX });
        }
        let header_kind = cards[0].header.kind;
        let mut seen_indexes = std::collections::HashSet::new();
        for card in &cards {
            if card.header.kind != header_kind {
                return Err(ComposeError::MixedCarouselHeaderTypes);
            }
            if card.body.chars().count() > CAROUSEL_BODY_MAX {
                return Err(ComposeError::CardBodyTooLong(card.body.clone()));
            }
            if card.button.text.chars().count() > CAROUSEL_BUTTON_TEXT_MAX {
                return Err(ComposeError::CardButtonTextTooLong(card.button.text.clone()));
            }
            if !seen_indexes.insert(card.index) {
                return Err(ComposeError::DuplicateCardIndex(card.index as usize));
            }
        }
        Ok(OutboundMessage::Carousel(CarouselOut { body, cards }))
    }

    /// Builds a carousel, degrading to plain text/split carousels when the
    /// requested shape can't be sent as-is (`spec.md` §8 scenario 6).
    ///
    /// `MixedCarouselHeaderTypes` partitions the cards by header kind and
    /// retries each partition (which may itself degrade further, e.g. a
    /// lone card falling back to text). Any other error falls back to a
    /// single text message listing every card's body.
    #[must_use]
    pub fn carousel_or_downgrade(&self, body: impl Into<String>, cards: Vec<Card>) -> OutboundPlan {
        let body = body.into();
        match self.carousel(body.clone(), cards.clone()) {
            Ok(msg) => vec![msg],
            Err(ComposeError::MixedCarouselHeaderTypes) => {
                let (image_cards, other_cards): (Vec<Card>, Vec<Card>) = cards
                    .into_iter()
                    .partition(|c| c.header.kind == CarouselHeaderType::Image);
                [image_cards, other_cards]
                    .into_iter()
                    .filter(|group| !group.is_empty())
                    .flat_map(|group| self.carousel_or_downgrade(body.clone(), group))
                    .collect()
            }
            Err(_) => vec![self.text(Self::listing_fallback(&body, &cards))],
        }
    }

    fn listing_fallback(body: &str, cards: &[Card]) -> String {
        let mut lines = vec![body.to_string()];
        lines.extend(cards.iter().map(|c| format!("- {}", c.body)));
        lines.join("\n")
    }

    pub fn location(
        &self,
        lat: f64,
        lng: f64,
        name: Option<String>,
        address: Option<String>,
    ) -> Result<OutboundMessage, ComposeError> {
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
            return Err(ComposeError::InvalidCoordinates { lat, lng });
        }
        Ok(OutboundMessage::Location(LocationOut {
            lat,
            lng,
            name,
            address,
        }))
    }

    pub fn location_request(&self, body: impl Into<String>) -> OutboundMessage {
        OutboundMessage::LocationRequest(LocationRequestOut { body: body.into() })
    }

    pub fn contacts(&self, contacts: Vec<Contact>) -> Result<OutboundMessage, ComposeError> {
        if contacts.is_empty() {
            return Err(ComposeError::EmptyContacts);
        }
        for c in &contacts {
            if c.phones.is_empty() {
                return Err(ComposeError::ContactMissingPhone(c.name.clone()));
            }
        }
        Ok(OutboundMessage::Contacts(ContactsOut { contacts }))
    }

    /// Truncates a free-text body to WhatsApp's practical text-message
    /// budget, leaving headroom for template substitution elsewhere.
    #[must_use]
    pub fn truncate_body(&self, body: &str, max_chars: usize) -> String {
        truncate_ellipsis(body, max_chars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn composer() -> MessageComposer {
        MessageComposer::new()
    }

    #[test]
    fn truncate_breaks_on_word_boundary() {
        let s = "the quick brown fox jumps";
        let out = truncate_ellipsis(s, 12);
        assert!(out.ends_with('…'));
        assert!(out.len() <= 12);
        assert!(!out.trim_end_matches('…').ends_with(' '));
    }

    #[test]
    fn truncate_noop_when_fits() {
        assert_eq!(truncate_ellipsis("short", 20), "short");
    }

    #[test]
    fn buttons_reject_more_than_three() {
        let buttons = (0..4)
            .map(|i| Button {
                id: format!("b{i}"),
                title: "x".into(),
            })
            .collect();
        let err = composer().buttons("body", None, None, buttons).unwrap_err();
        assert_eq!(err, ComposeError::ButtonCount(4));
    }

    #[test]
    fn buttons_reject_duplicate_ids() {
        let buttons = vec![
            Button {
                id: "a".into(),
                title: "One".into(),
            },
            Button {
                id: "a".into(),
                title: "Two".into(),
            },
        ];
        let err = composer().buttons("body", None, None, buttons).unwrap_err();
        assert_eq!(err, ComposeError::DuplicateButtonId("a".into()));
    }

    #[test]
    fn buttons_accept_valid_set() {
        let buttons = vec![
            Button {
                id: "a".into(),
                title: "One".into(),
            },
            Button {
                id: "b".into(),
                title: "Two".into(),
            },
        ];
        assert!(composer().buttons("body", None, None, buttons).is_ok());
    }

    #[test]
    fn buttons_reject_body_too_long() {
        let buttons = vec![Button {
            id: "a".into(),
            title: "One".into(),
        }];
        let err = composer()
            .buttons("x".repeat(BODY_MAX + 1), None, None, buttons)
            .unwrap_err();
        assert_eq!(err, ComposeError::BodyTooLong { limit: BODY_MAX });
    }

    #[test]
    fn buttons_reject_header_too_long() {
        let buttons = vec![Button {
            id: "a".into(),
            title: "One".into(),
        }];
        let err = composer()
            .buttons("body", Some("x".repeat(HEADER_FOOTER_MAX + 1)), None, buttons)
            .unwrap_err();
        assert_eq!(err, ComposeError::HeaderTooLong);
    }

    #[test]
    fn list_rejects_empty_sections() {
        let err = composer()
            .list("body", None, None, "View", vec![])
            .unwrap_err();
        assert_eq!(err, ComposeError::SectionCount(0));
    }

    #[test]
    fn list_rejects_row_title_too_long() {
        let section = Section {
            title: "Mains".into(),
            rows: vec![Row {
                id: "r1".into(),
                title: "x".repeat(ROW_TITLE_MAX + 1),
                description: None,
            }],
        };
        let err = composer()
            .list("body", None, None, "View", vec![section])
            .unwrap_err();
        assert!(matches!(err, ComposeError::RowTitleTooLong(_)));
    }

    #[test]
    fn list_rejects_aggregate_row_count_over_ten() {
        let sections: Vec<Section> = (0..2)
            .map(|s| Section {
                title: format!("Section {s}"),
                rows: (0..6)
                    .map(|r| Row {
                        id: format!("s{s}r{r}"),
                        title: format!("Item {r}"),
                        description: None,
                    })
                    .collect(),
            })
            .collect();
        let err = composer()
            .list("body", None, None, "View", sections)
            .unwrap_err();
        assert_eq!(err, ComposeError::RowCount(12));
    }

    fn card(kind: CarouselHeaderType, index: u32) -> Card {
        Card {
            index,
            header: CardHeader {
                kind,
                link: "https://example.com/a.png".into(),
            },
            body: "body".into(),
            button: CardButton {
                text: "View".into(),
                url: "https://example.com".into(),
            },
        }
    }

    #[test]
    fn carousel_requires_at_least_two_cards() {
        let err = composer()
            .carousel("body", vec![card(CarouselHeaderType::Image, 0)])
            .unwrap_err();
        assert_eq!(err, ComposeError::CardCount(1));
    }

    #[test]
    fn carousel_rejects_mixed_header_types() {
        let cards = vec![card(CarouselHeaderType::Image, 0), card(CarouselHeaderType::Video, 1)];
        let err = composer().carousel("body", cards).unwrap_err();
        assert_eq!(err, ComposeError::MixedCarouselHeaderTypes);
    }

    #[test]
    fn carousel_accepts_uniform_cards() {
        let cards = vec![card(CarouselHeaderType::Image, 0), card(CarouselHeaderType::Image, 1)];
        assert!(composer().carousel("body", cards).is_ok());
    }

    #[test]
    fn carousel_rejects_duplicate_card_index() {
        let cards = vec![card(CarouselHeaderType::Image, 0), card(CarouselHeaderType::Image, 0)];
        let err = composer().carousel("body", cards).unwrap_err();
        assert_eq!(err, ComposeError::DuplicateCardIndex(0));
    }

    #[test]
    fn location_rejects_out_of_range_coordinates() {
        let err = composer().location(200.0, 0.0, None, None).unwrap_err();
        assert!(matches!(err, ComposeError::InvalidCoordinates { .. }));
    }

    #[test]
    fn contacts_require_at_least_one_phone() {
        let contacts = vec![Contact {
            name: "Branch".into(),
            phones: vec![],
            emails: vec![],
            org: None,
            addresses: vec![],
        }];
        let err = composer().contacts(contacts).unwrap_err();
        assert!(matches!(err, ComposeError::ContactMissingPhone(_)));
    }
}
