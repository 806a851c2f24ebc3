//! Detectors and parsing helpers shared by the format services.

use std::ops::Range;

use async_trait::async_trait;
use geoshare_core::{
    Coordinate, DetectionContext, Detector, FoundUrl, GeoError, InputSpan, LocationCollection,
    LocationRecord, ServiceId,
};
use regex::Captures;

/// Characters that glue a number to a neighbouring coordinate token.
const MARKS: &[char] = &['°', '\'', '"', '′', '″', '.', '/', '@', '='];

/// Coordinate found by a URL extractor, with an optional description.
pub(crate) struct Hit {
    pub(crate) coordinate: Coordinate,
    pub(crate) label: Option<&'static str>,
}

impl Hit {
    pub(crate) fn labeled(coordinate: Coordinate, label: &'static str) -> Self {
        Self {
            coordinate,
            label: Some(label),
        }
    }
}

pub(crate) type UrlExtractor = fn(&FoundUrl) -> Vec<Hit>;
pub(crate) type TextFinder = fn(&str) -> Vec<(Coordinate, Range<usize>)>;

/// Detector running a pure extractor over every URL of the input.
pub(crate) struct UrlDetector<'det> {
    service: ServiceId,
    context: &'det DetectionContext,
    extract: UrlExtractor,
    found: Vec<LocationRecord>,
}

impl<'det> UrlDetector<'det> {
    pub(crate) fn new(service: ServiceId, context: &'det DetectionContext, extract: UrlExtractor) -> Self {
        Self {
            service,
            context,
            extract,
            found: Vec::new(),
        }
    }
}

#[async_trait]
impl Detector for UrlDetector<'_> {
    fn validate(&mut self) -> bool {
        let mut found = Vec::new();
        for url in self.context.urls() {
            for hit in (self.extract)(url) {
                let mut record = LocationRecord::new(hit.coordinate, self.service).with_span(url.span);
                if let Some(label) = hit.label {
                    record = record.with_label(label);
                }
                found.push(record);
            }
        }
        self.found = found;
        !self.found.is_empty()
    }

    async fn process(&mut self, out: &mut LocationCollection) -> Result<(), GeoError> {
        for record in self.found.drain(..) {
            out.add(record);
        }
        Ok(())
    }
}

/// Detector running a pattern finder over the URL-free input text.
pub(crate) struct TextDetector<'det> {
    service: ServiceId,
    context: &'det DetectionContext,
    find: TextFinder,
    found: Vec<(Coordinate, Range<usize>)>,
}

impl<'det> TextDetector<'det> {
    pub(crate) fn new(service: ServiceId, context: &'det DetectionContext, find: TextFinder) -> Self {
        Self {
            service,
            context,
            find,
            found: Vec::new(),
        }
    }
}

#[async_trait]
impl Detector for TextDetector<'_> {
    fn validate(&mut self) -> bool {
        self.found = (self.find)(self.context.plain_text());
        !self.found.is_empty()
    }

    async fn process(&mut self, out: &mut LocationCollection) -> Result<(), GeoError> {
        for (coordinate, range) in self.found.drain(..) {
            out.add(LocationRecord::new(coordinate, self.service).with_span(InputSpan::from(range)));
        }
        Ok(())
    }
}

/// Whether a match is not glued to surrounding digits, letters or coordinate marks.
pub(crate) fn isolated(text: &str, range: &Range<usize>) -> bool {
    let before = text.get(..range.start).and_then(|head| head.chars().next_back());
    if before.is_some_and(|ch| ch.is_alphanumeric() || MARKS.contains(&ch) || ch == '-') {
        return false;
    }
    let mut after = text.get(range.end..).unwrap_or_default().chars();
    match after.next() {
        None => true,
        Some('.' | ',') => !after.next().is_some_and(|ch| ch.is_ascii_digit()),
        Some(ch) => !(ch.is_alphanumeric() || MARKS.contains(&ch)),
    }
}

/// Apply a hemisphere letter to an unsigned or signed value.
pub(crate) fn signed(value: f64, hemisphere: Option<&str>) -> f64 {
    match hemisphere {
        Some("S" | "W") => -value.abs(),
        Some(_) => value.abs(),
        None => value,
    }
}

/// Hemisphere letter from either of two optional capture groups.
pub(crate) fn hemisphere<'hay>(caps: &Captures<'hay>, prefix: &str, suffix: &str) -> Option<&'hay str> {
    caps.name(prefix)
        .or_else(|| caps.name(suffix))
        .map(|found| found.as_str())
}

/// Numeric capture group.
pub(crate) fn number(caps: &Captures<'_>, name: &str) -> Option<f64> {
    caps.name(name)?.as_str().parse().ok()
}

/// Combine degrees, minutes and seconds, keeping the sign of the degrees.
pub(crate) fn sexagesimal(degrees: &str, minutes: f64, seconds: f64) -> Option<f64> {
    if !(0.0..60.0).contains(&minutes) || !(0.0..60.0).contains(&seconds) {
        return None;
    }
    let whole: f64 = degrees.parse().ok()?;
    let magnitude = whole.abs() + minutes / 60.0 + seconds / 3600.0;
    Some(if degrees.starts_with('-') { -magnitude } else { magnitude })
}

/// Parse `lat,lon` as found in URL parameters (`+`, spaces and `%2C` tolerated).
pub(crate) fn parse_pair(raw: &str) -> Option<Coordinate> {
    let cleaned = raw.replace("%2C", ",").replace("%2c", ",").replace("%20", " ").replace('+', " ");
    let (lat, lon) = cleaned.split_once(',')?;
    let lon = lon.split(',').next()?;
    Coordinate::new(lat.trim().parse().ok()?, lon.trim().parse().ok()?).ok()
}

/// Parse a pair given in the reverse `lon,lat` order.
pub(crate) fn parse_reversed_pair(raw: &str) -> Option<Coordinate> {
    let swapped = parse_pair(raw)?;
    Coordinate::new(swapped.lon(), swapped.lat()).ok()
}

/// Coordinate from two separately given numbers.
pub(crate) fn from_parts(lat: Option<String>, lon: Option<String>) -> Option<Coordinate> {
    Coordinate::new(lat?.trim().parse().ok()?, lon?.trim().parse().ok()?).ok()
}

/// Whether the URL host is `domain` or one of its subdomains.
pub(crate) fn host_is(url: &FoundUrl, domain: &str) -> bool {
    url.host().is_some_and(|host| {
        host == domain
            || host
                .strip_suffix(domain)
                .is_some_and(|rest| rest.ends_with('.'))
    })
}

/// Value of `key` in a `key=value&...` URL fragment.
pub(crate) fn fragment_value(url: &FoundUrl, key: &str) -> Option<String> {
    url.url.fragment()?.split('&').find_map(|pair| {
        let (name, value) = pair.split_once('=')?;
        (name == key).then(|| value.to_owned())
    })
}

/// Parse a `zoom/lat/lon[/...]` map position with `min..=max` components.
pub(crate) fn parse_position(raw: &str, min: usize, max: usize) -> Option<Coordinate> {
    let parts: Vec<f64> = raw
        .split('/')
        .map(|part| part.parse::<f64>().ok().filter(|value| value.is_finite()))
        .collect::<Option<Vec<f64>>>()?;
    if !(min..=max).contains(&parts.len()) {
        return None;
    }
    let zoom = *parts.first()?;
    if !(0.0..=24.0).contains(&zoom) {
        return None;
    }
    Coordinate::new(*parts.get(1)?, *parts.get(2)?).ok()
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairs_tolerate_url_encoding() {
        let expected = Coordinate::new(50.1, 14.2).expect("valid");
        assert_eq!(parse_pair("50.1,14.2"), Some(expected));
        assert_eq!(parse_pair("50.1,+14.2"), Some(expected));
        assert_eq!(parse_pair("50.1%2C14.2"), Some(expected));
        assert_eq!(parse_pair("50.1,14.2,17z"), Some(expected));
        assert_eq!(parse_pair("95.0,14.2"), None);
        assert_eq!(parse_pair("prague"), None);
    }

    #[test]
    fn isolation_rejects_glued_tokens() {
        let text = "x50.1,14.2 50.1,14.2. 50.1,14.2.5";
        assert!(!isolated(text, &(1..10)));
        assert!(isolated(text, &(11..20)));
        assert!(!isolated(text, &(22..31)));
    }

    #[test]
    fn positions_need_numeric_components() {
        let expected = Coordinate::new(50.08, 14.42).expect("valid");
        assert_eq!(parse_position("16.5/50.08/14.42", 3, 5), Some(expected));
        assert_eq!(parse_position("16.5/50.08/14.42/-20/60", 3, 5), Some(expected));
        assert_eq!(parse_position("16.5/50.08", 3, 5), None);
        assert_eq!(parse_position("16.5/50.08/14.42/a", 3, 5), None);
        assert_eq!(parse_position("1/2/3/4/5/6", 3, 5), None);
    }

    #[test]
    fn sexagesimal_keeps_sign_and_rejects_overflow() {
        assert_eq!(sexagesimal("-10", 30.0, 0.0), Some(-10.5));
        assert_eq!(sexagesimal("10", 60.0, 0.0), None);
    }
}
