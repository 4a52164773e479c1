//! IntentClassifier: deterministic, network-free inbound message
//! classification. See `spec.md` §4.5.
//!
//! `classify` accepts either raw user text or one of the structured
//! event-summary strings the FSM builds for non-text events (button,
//! list, location, and contact shares). Structured prefixes always win;
//! free text falls through the configured keyword sets in a fixed
//! priority order; anything left over classifies as `ClassTag::None`.

use rustc_hash::FxHashMap;
use std::sync::{Arc, OnceLock};

use regex::Regex;

/// The classifier's output taxonomy, taken verbatim from `spec.md`
/// §4.5. `Choice` has no documented keyword set in that section — it
/// is declared for completeness but is never produced by the keyword
/// rules below; nothing in the spec's literal text makes it reachable
/// except through a classifier extension this engine does not add.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassTag {
    Binary,
    Confirmation,
    Choice,
    List,
    Location,
    Button(String),
    ListSel(String),
    LocationShared {
        lat: f64,
        lng: f64,
        addr: Option<String>,
    },
    None,
}

/// Keyword-configurable classes. Kept separate from [`ClassTag`]
/// because the latter carries payload data (ids, coordinates) and
/// can't cheaply serve as a hash map key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeywordClass {
    Binary,
    Confirmation,
    List,
    Location,
}

/// Evaluation order for the keyword sets. `spec.md` §4.5 lists binary,
/// confirmation, list, and location keyword sets in this order; it does
/// not state a priority among them, so first-declared wins on overlap
/// (e.g. "ready to confirm" reads as `Binary`, not `Confirmation`,
/// because both sets contain "ready to" and binary is checked first).
const KEYWORD_PRIORITY: [KeywordClass; 4] = [
    KeywordClass::Binary,
    KeywordClass::Confirmation,
    KeywordClass::List,
    KeywordClass::Location,
];

/// Tenant-scoped keyword sets, injected so branches can localize
/// phrasing without a code change. Keys are matched case-insensitively
/// against a normalized (trimmed, lowercased) copy of the input.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    keywords: FxHashMap<KeywordClass, Vec<String>>,
}

impl Default for ClassifierConfig {
    /// Seeds the literal keyword sets from `spec.md` §4.5.
    fn default() -> Self {
        let mut keywords: FxHashMap<KeywordClass, Vec<String>> = FxHashMap::default();
        keywords.insert(
            KeywordClass::Binary,
            vec![
                "do you".into(),
                "would you".into(),
                "should i".into(),
                "shall we".into(),
                "can you help".into(),
                "ready to".into(),
                "want me to".into(),
                "interested in".into(),
            ],
        );
        keywords.insert(
            KeywordClass::Confirmation,
            vec![
                "confirm".into(),
                "verify".into(),
                "are you sure".into(),
                "proceed".into(),
                "ready to".into(),
            ],
        );
        keywords.insert(
            KeywordClass::List,
            vec![
                "menu".into(),
                "show me".into(),
                "what are".into(),
                "list".into(),
                "browse".into(),
                "options".into(),
                "catalog".into(),
            ],
        );
        keywords.insert(
            KeywordClass::Location,
            vec![
                "delivery".into(),
                "where".into(),
                "address".into(),
                "location".into(),
            ],
        );
        Self { keywords }
    }
}

impl ClassifierConfig {
    #[must_use]
    pub fn with_keywords(keywords: FxHashMap<KeywordClass, Vec<String>>) -> Self {
        Self { keywords }
    }
}

/// Stateless, side-effect-free classifier: the same input and config
/// always produce the same [`ClassTag`]. Never touches the network.
#[derive(Debug, Clone)]
pub struct IntentClassifier {
    config: Arc<ClassifierConfig>,
}

impl IntentClassifier {
    #[must_use]
    pub fn new(config: Arc<ClassifierConfig>) -> Self {
        Self { config }
    }

    /// Classifies `input`, which is either raw user text or one of the
    /// structured event-summary strings described in `spec.md` §4.5
    /// (e.g. `"[Button clicked: Pickup (ID: pickup)]"`).
    #[must_use]
    pub fn classify(&self, input: &str) -> ClassTag {
        if let Some(tag) = Self::structured_tag(input) {
            return tag;
        }
        let normalized = input.trim().to_lowercase();
        if normalized.is_empty() {
            return ClassTag::None;
        }
        for class in KEYWORD_PRIORITY {
            if let Some(keywords) = self.config.keywords.get(&class) {
                if keywords.iter().any(|kw| normalized.contains(kw.as_str())) {
                    return match class {
                        KeywordClass::Binary => ClassTag::Binary,
                        KeywordClass::Confirmation => ClassTag::Confirmation,
                        KeywordClass::List => ClassTag::List,
                        KeywordClass::Location => ClassTag::Location,
                    };
                }
            }
        }
        ClassTag::None
    }

    /// Recognizes the four structured event-summary shapes from
    /// `spec.md` §4.5 and extracts their payload verbatim. Contact
    /// shares are recognized but map to `None`: the spec's output
    /// taxonomy names no tag for them.
    fn structured_tag(input: &str) -> Option<ClassTag> {
        static BUTTON_RE: OnceLock<Regex> = OnceLock::new();
        static LIST_SEL_RE: OnceLock<Regex> = OnceLock::new();
        static LOCATION_RE: OnceLock<Regex> = OnceLock::new();

        let button_re = BUTTON_RE
            .get_or_init(|| Regex::new(r"^\[Button clicked: .+ \(ID: (?P<id>[^)]+)\)\]$").unwrap());
        if let Some(caps) = button_re.captures(input) {
            return Some(ClassTag::Button(caps["id"].to_string()));
        }

        let list_sel_re = LIST_SEL_RE
            .get_or_init(|| Regex::new(r"^\[List selection: .+ \(ID: (?P<id>[^)]+)\)\]$").unwrap());
        if let Some(caps) = list_sel_re.captures(input) {
            return Some(ClassTag::ListSel(caps["id"].to_string()));
        }

        let location_re = LOCATION_RE.get_or_init(|| {
            Regex::new(r"^\[Location shared: .+ at \((?P<lat>-?[0-9.]+),(?P<lng>-?[0-9.]+)\) – (?P<addr>.*)\]$")
                .unwrap()
        });
        if let Some(caps) = location_re.captures(input) {
            let lat = caps["lat"].parse().ok()?;
            let lng = caps["lng"].parse().ok()?;
            let addr = caps["addr"].to_string();
            return Some(ClassTag::LocationShared {
                lat,
                lng,
                addr: if addr.is_empty() { None } else { Some(addr) },
            });
        }

        if input.starts_with("[Contact(s) shared:") {
            return Some(ClassTag::None);
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> IntentClassifier {
        IntentClassifier::new(Arc::new(ClassifierConfig::default()))
    }

    #[test]
    fn classifies_binary_keyword() {
        assert_eq!(classifier().classify("Would you like fries with that?"), ClassTag::Binary);
    }

    #[test]
    fn binary_wins_over_overlapping_confirmation_keyword() {
        // Both sets contain "ready to"; binary is checked first.
        assert_eq!(classifier().classify("Ready to order?"), ClassTag::Binary);
    }

    #[test]
    fn classifies_confirmation_keyword() {
        assert_eq!(classifier().classify("Can you verify the total?"), ClassTag::Confirmation);
    }

    #[test]
    fn classifies_list_keyword() {
        assert_eq!(classifier().classify("Show me the menu"), ClassTag::List);
    }

    #[test]
    fn classifies_location_keyword() {
        assert_eq!(classifier().classify("What's your delivery address?"), ClassTag::Location);
    }

    #[test]
    fn blank_text_is_none() {
        assert_eq!(classifier().classify("   "), ClassTag::None);
    }

    #[test]
    fn unmatched_text_falls_back_to_none() {
        assert_eq!(classifier().classify("asdkjflaksjdf"), ClassTag::None);
    }

    #[test]
    fn is_deterministic_across_calls() {
        let c = classifier();
        let a = c.classify("where do you deliver");
        let b = c.classify("where do you deliver");
        assert_eq!(a, b);
    }

    #[test]
    fn structured_button_extracts_id_verbatim() {
        assert_eq!(
            classifier().classify("[Button clicked: Pickup (ID: pickup)]"),
            ClassTag::Button("pickup".into())
        );
    }

    #[test]
    fn structured_list_selection_extracts_id_verbatim() {
        assert_eq!(
            classifier().classify("[List selection: Cheeseburger (ID: burger)]"),
            ClassTag::ListSel("burger".into())
        );
    }

    #[test]
    fn structured_location_share_extracts_coordinates_and_address() {
        let tag = classifier().classify("[Location shared: Home at (-12.05,-77.03) – 123 Main St]");
        assert_eq!(
            tag,
            ClassTag::LocationShared {
                lat: -12.05,
                lng: -77.03,
                addr: Some("123 Main St".into()),
            }
        );
    }

    #[test]
    fn structured_contact_share_has_no_dedicated_tag() {
        assert_eq!(classifier().classify("[Contact(s) shared: Jane Doe]"), ClassTag::None);
    }

    #[test]
    fn custom_keyword_config_is_respected() {
        let mut keywords = FxHashMap::default();
        keywords.insert(KeywordClass::Binary, vec!["salaam".into()]);
        let c = IntentClassifier::new(Arc::new(ClassifierConfig::with_keywords(keywords)));
        assert_eq!(c.classify("salaam alaikum"), ClassTag::Binary);
        assert_eq!(c.classify("hello"), ClassTag::None);
    }
}
