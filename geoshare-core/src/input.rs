//! Detection input and the per-call context handed to every detector.

use std::ops::Range;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::model::{Coordinate, InputSpan};
use crate::ports::HttpPort;

static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(?:https?://|geo:|www\.)[^\s<>"]+"#).expect("valid url pattern")
});

const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', ')', ']', '\''];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
/// Kind of a rich-text entity attached to the input.
pub enum EntityKind {
    /// The spanned text itself is a URL.
    Url,
    /// The spanned text links to a hidden URL.
    TextLink {
        /// Link target.
        url: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Pre-parsed rich-text entity, offsets in bytes into the input text.
pub struct TextEntity {
    /// Start offset.
    pub offset: usize,
    /// Length in bytes.
    pub length: usize,
    /// What the entity carries.
    #[serde(flatten)]
    pub kind: EntityKind,
}

#[derive(Debug, Clone, Copy, PartialEq)]
/// Location attached to a message rather than written in its text.
pub struct SharedLocation {
    /// Shared coordinate.
    pub coordinate: Coordinate,
    /// Whether the location is being updated live.
    pub live: bool,
}

#[derive(Debug, Clone, Default)]
/// Raw input scanned by the detection engine.
pub struct DetectionInput {
    text: String,
    entities: Vec<TextEntity>,
    shared_location: Option<SharedLocation>,
}

impl DetectionInput {
    /// Input consisting of plain text or a single URL.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            entities: Vec::new(),
            shared_location: None,
        }
    }

    /// Attach rich-text entities.
    #[must_use]
    pub fn with_entities(mut self, entities: Vec<TextEntity>) -> Self {
        self.entities = entities;
        self
    }

    /// Attach a shared location.
    #[must_use]
    pub fn with_shared_location(mut self, location: SharedLocation) -> Self {
        self.shared_location = Some(location);
        self
    }

    /// Input text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Rich-text entities.
    #[must_use]
    pub fn entities(&self) -> &[TextEntity] {
        &self.entities
    }

    /// Shared location, if any.
    #[must_use]
    pub fn shared_location(&self) -> Option<&SharedLocation> {
        self.shared_location.as_ref()
    }
}

#[derive(Debug, Clone)]
/// URL found in the input.
pub struct FoundUrl {
    /// Parsed URL.
    pub url: Url,
    /// Where the URL (or the entity linking to it) sits in the input text.
    pub span: InputSpan,
}

impl FoundUrl {
    /// Lowercased host, without a leading `www.`.
    #[must_use]
    pub fn host(&self) -> Option<String> {
        let host = self.url.host_str()?.to_ascii_lowercase();
        Some(host.strip_prefix("www.").map(str::to_owned).unwrap_or(host))
    }

    /// First value of a query parameter.
    #[must_use]
    pub fn query(&self, name: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }
}

/// Everything a detector may look at besides the raw input.
pub struct DetectionContext {
    urls: Vec<FoundUrl>,
    plain_text: String,
    http: Option<Arc<dyn HttpPort>>,
    json_cache_ttl: Option<Duration>,
}

impl DetectionContext {
    /// Extract URLs from the input and prepare the URL-free text view.
    #[must_use]
    pub fn build(
        input: &DetectionInput,
        http: Option<Arc<dyn HttpPort>>,
        json_cache_ttl: Option<Duration>,
    ) -> Self {
        let text = input.text();
        let mut urls = Vec::new();
        let mut masked: Vec<Range<usize>> = Vec::new();

        for found in URL_PATTERN.find_iter(text) {
            let raw = found.as_str().trim_end_matches(TRAILING_PUNCTUATION);
            let span = found.start()..found.start() + raw.len();
            if let Some(url) = parse_url(raw) {
                urls.push(FoundUrl {
                    url,
                    span: span.clone().into(),
                });
            }
            masked.push(span);
        }

        for entity in input.entities() {
            let span = entity.offset..entity.offset.saturating_add(entity.length);
            let target = match &entity.kind {
                EntityKind::Url => {
                    if masked.iter().any(|known| known.start <= span.start && span.end <= known.end) {
                        continue;
                    }
                    masked.push(span.clone());
                    text.get(span.clone()).map(str::to_owned)
                }
                EntityKind::TextLink { url } => Some(url.clone()),
            };
            if let Some(url) = target.as_deref().and_then(parse_url) {
                urls.push(FoundUrl {
                    url,
                    span: span.into(),
                });
            }
        }

        Self {
            urls,
            plain_text: blank_ranges(text, &masked),
            http,
            json_cache_ttl,
        }
    }

    /// URLs found in the text and in entities.
    #[must_use]
    pub fn urls(&self) -> &[FoundUrl] {
        &self.urls
    }

    /// Input text with every URL replaced by spaces, byte offsets preserved.
    #[must_use]
    pub fn plain_text(&self) -> &str {
        &self.plain_text
    }

    /// HTTP access for services that need a lookup.
    #[must_use]
    pub fn http(&self) -> Option<&Arc<dyn HttpPort>> {
        self.http.as_ref()
    }

    /// Cache TTL to request for JSON lookups.
    #[must_use]
    pub fn json_cache_ttl(&self) -> Option<Duration> {
        self.json_cache_ttl
    }
}

fn parse_url(raw: &str) -> Option<Url> {
    if raw.len() >= 4 && raw.get(..4).is_some_and(|prefix| prefix.eq_ignore_ascii_case("www.")) {
        Url::parse(&format!("https://{raw}")).ok()
    } else {
        Url::parse(raw).ok()
    }
}

fn blank_ranges(text: &str, ranges: &[Range<usize>]) -> String {
    let mut plain = String::with_capacity(text.len());
    for (index, ch) in text.char_indices() {
        if ranges.iter().any(|range| range.contains(&index)) {
            plain.extend(std::iter::repeat_n(' ', ch.len_utf8()));
        } else {
            plain.push(ch);
        }
    }
    plain
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_are_found_and_blanked() {
        let input = DetectionInput::new("see https://www.openstreetmap.org/#map=17/50.1/14.4, ok");
        let context = DetectionContext::build(&input, None, None);
        assert_eq!(context.urls().len(), 1);
        assert_eq!(
            context.urls()[0].url.as_str(),
            "https://www.openstreetmap.org/#map=17/50.1/14.4"
        );
        assert_eq!(context.urls()[0].host().as_deref(), Some("openstreetmap.org"));
        assert_eq!(context.plain_text().len(), input.text().len());
        assert!(!context.plain_text().contains("50.1"));
        assert!(context.plain_text().ends_with(", ok"));
    }

    #[test]
    fn text_links_add_hidden_urls() {
        let input = DetectionInput::new("meet here").with_entities(vec![TextEntity {
            offset: 5,
            length: 4,
            kind: EntityKind::TextLink {
                url: "https://www.waze.com/ul?ll=1.5,2.5".to_owned(),
            },
        }]);
        let context = DetectionContext::build(&input, None, None);
        assert_eq!(context.urls().len(), 1);
        assert_eq!(context.urls()[0].query("ll").as_deref(), Some("1.5,2.5"));
        assert_eq!(context.plain_text(), "meet here");
    }

    #[test]
    fn url_entities_outside_char_boundaries_are_ignored() {
        let input = DetectionInput::new("žluťoučký").with_entities(vec![TextEntity {
            offset: 1,
            length: 3,
            kind: EntityKind::Url,
        }]);
        let context = DetectionContext::build(&input, None, None);
        assert!(context.urls().is_empty());
    }

    #[test]
    fn bare_www_links_get_a_scheme() {
        let input = DetectionInput::new("www.google.com/maps/@50.1,14.4,15z");
        let context = DetectionContext::build(&input, None, None);
        assert_eq!(context.urls()[0].url.scheme(), "https");
    }
}
