//! Degrees and decimal minutes, e.g. `N 50°5.24706', E 14°25.24026'`.

use std::ops::Range;
use std::sync::LazyLock;

use geoshare_core::{
    Coordinate, DetectionContext, DetectionInput, Detector, Service, ServiceMeta, ServiceTag,
};
use regex::Regex;

use crate::scan::{TextDetector, hemisphere, isolated, number, sexagesimal, signed};

static PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        (?:(?P<lat_pre>[NS])\s?)?
        (?P<lat_deg>[-+]?\d{1,2})°\s?(?P<lat_min>\d{1,2}(?:\.\d{1,10})?)['′]
        (?:\s?(?P<lat_post>[NS]))?
        (?:\s*[,;]\s*|\s+)
        (?:(?P<lon_pre>[EW])\s?)?
        (?P<lon_deg>[-+]?\d{1,3})°\s?(?P<lon_min>\d{1,2}(?:\.\d{1,10})?)['′]
        (?:\s?(?P<lon_post>[EW]))?",
    )
    .expect("valid degrees-minutes pattern")
});

/// Minutes are rendered with five decimals.
const MINUTE_SCALE: u64 = 100_000;

/// WGS84 coordinates written as degrees with decimal minutes.
pub struct DegreesMinutesService {
    meta: ServiceMeta,
}

impl DegreesMinutesService {
    /// Create the service.
    #[must_use]
    pub fn new() -> Self {
        Self {
            meta: ServiceMeta::offline(
                2,
                "WGS84 degrees-minutes",
                &[ServiceTag::GenerateText, ServiceTag::GenerateTextOffline],
            ),
        }
    }
}

impl Default for DegreesMinutesService {
    fn default() -> Self {
        Self::new()
    }
}

impl Service for DegreesMinutesService {
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
        let lat = render(coordinate.lat());
        let lon = render(coordinate.lon());
        let north = if coordinate.lat() < 0.0 { 'S' } else { 'N' };
        let east = if coordinate.lon() < 0.0 { 'W' } else { 'E' };
        Some(format!("{north} {lat}, {east} {lon}"))
    }
}

#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss,
    reason = "magnitude is at most 180 degrees in fixed-point units"
)]
fn render(value: f64) -> String {
    let total = (value.abs() * 60.0 * MINUTE_SCALE as f64).round() as u64;
    let per_degree = 60 * MINUTE_SCALE;
    let degrees = total / per_degree;
    let minutes = total % per_degree;
    format!(
        "{degrees}°{}.{:05}'",
        minutes / MINUTE_SCALE,
        minutes % MINUTE_SCALE
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
            let lat = sexagesimal(caps.name("lat_deg")?.as_str(), number(&caps, "lat_min")?, 0.0)?;
            let lon = sexagesimal(caps.name("lon_deg")?.as_str(), number(&caps, "lon_min")?, 0.0)?;
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
    fn renders_with_hemispheres() {
        let service = DegreesMinutesService::new();
        let text = service.share_text(&coord(50.087_451, 14.420_671)).expect("text");
        assert_eq!(text, "N 50°5.24706', E 14°25.24026'");
        let text = service.share_text(&coord(-0.5, -0.25)).expect("text");
        assert_eq!(text, "S 0°30.00000', W 0°15.00000'");
    }

    #[tokio::test]
    async fn detects_suffix_hemispheres_and_signs() {
        let service = DegreesMinutesService::new();
        let found = detect(&service, "50°5.247'N 14°25.24'E").await;
        assert_close(&found[0], &coord(50.087_45, 14.420_667), 1e-5);
        let found = detect(&service, "-33°51.408', 151°12.918'").await;
        assert_close(&found[0], &coord(-33.8568, 151.2153), 1e-5);
    }

    #[tokio::test]
    async fn rejects_minutes_out_of_range() {
        let found = detect(&DegreesMinutesService::new(), "N 50°65.0', E 14°25.0'").await;
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn share_text_round_trips() {
        let service = DegreesMinutesService::new();
        for original in [coord(50.087_451, 14.420_671), coord(-41.286_46, -174.776_236)] {
            let text = service.share_text(&original).expect("text");
            let found = detect(&service, &text).await;
            assert_eq!(found.len(), 1, "{text}");
            assert_close(&found[0], &original, 1e-6);
        }
    }
}
