//! Degrees, minutes and seconds, e.g. `50°5'14.824"N 14°25'14.416"E`.

use std::ops::Range;
use std::sync::LazyLock;

use geoshare_core::{
    Coordinate, DetectionContext, DetectionInput, Detector, Service, ServiceMeta, ServiceTag,
};
use regex::Regex;

use crate::scan::{TextDetector, hemisphere, isolated, number, sexagesimal, signed};

static PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?x)
        (?:(?P<lat_pre>[NS])\s?)?
        (?P<lat_deg>[-+]?\d{1,2})°\s?(?P<lat_min>\d{1,2})['′]\s?(?P<lat_sec>\d{1,2}(?:\.\d{1,10})?)(?:["″]|'')
        (?:\s?(?P<lat_post>[NS]))?
        (?:\s*[,;]\s*|\s+)
        (?:(?P<lon_pre>[EW])\s?)?
        (?P<lon_deg>[-+]?\d{1,3})°\s?(?P<lon_min>\d{1,2})['′]\s?(?P<lon_sec>\d{1,2}(?:\.\d{1,10})?)(?:["″]|'')
        (?:\s?(?P<lon_post>[EW]))?"#,
    )
    .expect("valid dms pattern")
});

/// Seconds are rendered with three decimals.
const SECOND_SCALE: u64 = 1_000;

/// WGS84 coordinates written as degrees, minutes and seconds.
pub struct DmsService {
    meta: ServiceMeta,
}

impl DmsService {
    /// Create the service.
    #[must_use]
    pub fn new() -> Self {
        Self {
            meta: ServiceMeta::offline(
                3,
                "WGS84 degrees-minutes-seconds",
                &[ServiceTag::GenerateText, ServiceTag::GenerateTextOffline],
            ),
        }
    }
}

impl Default for DmsService {
    fn default() -> Self {
        Self::new()
    }
}

impl Service for DmsService {
    fn meta(&self) -> &ServiceMeta {
        &self.meta
    }

    fn detector<'det>(
        &'det self,
        _input: &'det DetectionInput,
        context: &'det DetectionContext,
    ) -> Box<dyn Detector + 'det> {
        Box::new(TextDetector::new(self.meta.id, context, find))
    }

    fn share_text(&self, coordinate: &Coordinate) -> Option<String> {
        let north = if coordinate.lat() < 0.0 { 'S' } else { 'N' };
        let east = if coordinate.lon() < 0.0 { 'W' } else { 'E' };
        Some(format!(
            "{}{north} {}{east}",
            render(coordinate.lat()),
            render(coordinate.lon())
        ))
    }
}

#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss,
    reason = "magnitude is at most 180 degrees in fixed-point units"
)]
fn render(value: f64) -> String {
    let total = (value.abs() * 3600.0 * SECOND_SCALE as f64).round() as u64;
    let per_minute = 60 * SECOND_SCALE;
    let per_degree = 60 * per_minute;
    let degrees = total / per_degree;
    let minutes = (total % per_degree) / per_minute;
    let seconds = total % per_minute;
    format!(
        "{degrees}°{minutes}'{}.{:03}\"",
        seconds / SECOND_SCALE,
        seconds % SECOND_SCALE
    )
}

fn find(text: &str) -> Vec<(Coordinate, Range<usize>)> {
    PATTERN
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?.range();
            if !isolated(text, &whole) {
                return None;
            }
            let lat = sexagesimal(
                caps.name("lat_deg")?.as_str(),
                number(&caps, "lat_min")?,
                number(&caps, "lat_sec")?,
            )?;
            let lon = sexagesimal(
                caps.name("lon_deg")?.as_str(),
                number(&caps, "lon_min")?,
                number(&caps, "lon_sec")?,
            )?;
            let lat = signed(lat, hemisphere(&caps, "lat_pre", "lat_post"));
            let lon = signed(lon, hemisphere(&caps, "lon_pre", "lon_post"));
            Some((Coordinate::new(lat, lon).ok()?, whole))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::testing::{assert_close, coord, detect};

    #[test]
    fn renders_seconds_with_three_decimals() {
        let text = DmsService::new()
            .share_text(&coord(50.087_451, 14.420_671))
            .expect("text");
        assert_eq!(text, "50°5'14.824\"N 14°25'14.416\"E");
    }

    #[tokio::test]
    async fn detects_prefixed_and_primed_notation() {
        let service = DmsService::new();
        let found = detect(&service, "S 33°51′24.48″, E 151°12′55.08″").await;
        assert_close(&found[0], &coord(-33.8568, 151.2153), 1e-6);
        let found = detect(&service, "40°26'46''N 79°58'56''W").await;
        assert_close(&found[0], &coord(40.446_111, -79.982_222), 1e-6);
    }

    #[tokio::test]
    async fn seconds_out_of_range_are_rejected() {
        let found = detect(&DmsService::new(), "50°5'74\"N 14°25'14\"E").await;
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn share_text_round_trips() {
        let service = DmsService::new();
        for original in [coord(50.087_451, 14.420_671), coord(-0.000_1, -179.999_9)] {
            let text = service.share_text(&original).expect("text");
            let found = detect(&service, &text).await;
            assert_eq!(found.len(), 1, "{text}");
            assert_close(&found[0], &original, 1e-6);
        }
    }
}
