//! Compact degrees-minutes-seconds as used in aviation, e.g. `500515N0142514E`.

use std::ops::Range;
use std::sync::LazyLock;

use geoshare_core::{
    Coordinate, DetectionContext, DetectionInput, Detector, Service, ServiceMeta, ServiceTag,
};
use regex::Regex;

use crate::scan::{TextDetector, isolated, number, sexagesimal, signed};

static PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        (?P<lat_deg>\d{2})(?P<lat_min>\d{2})(?P<lat_sec>\d{2}(?:\.\d{1,3})?)(?P<lat_hem>[NS])
        \s?
        (?P<lon_deg>\d{3})(?P<lon_min>\d{2})(?P<lon_sec>\d{2}(?:\.\d{1,3})?)(?P<lon_hem>[EW])",
    )
    .expect("valid compact dms pattern")
});

/// WGS84 coordinates written as fixed-width DMS without separators.
pub struct DmsCompactService {
    meta: ServiceMeta,
}

impl DmsCompactService {
    /// Create the service.
    #[must_use]
    pub fn new() -> Self {
        Self {
            meta: ServiceMeta::offline(
                4,
                "WGS84 DMS compact",
                &[ServiceTag::GenerateText, ServiceTag::GenerateTextOffline],
            ),
        }
    }
}

impl Default for DmsCompactService {
    fn default() -> Self {
        Self::new()
    }
}

impl Service for DmsCompactService {
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

    /// Whole seconds only, so the text is accurate to about 0.0003°.
    fn share_text(&self, coordinate: &Coordinate) -> Option<String> {
        let (lat_deg, lat_min, lat_sec) = split(coordinate.lat());
        let (lon_deg, lon_min, lon_sec) = split(coordinate.lon());
        let north = if coordinate.lat() < 0.0 { 'S' } else { 'N' };
        let east = if coordinate.lon() < 0.0 { 'W' } else { 'E' };
        Some(format!(
            "{lat_deg:02}{lat_min:02}{lat_sec:02}{north}{lon_deg:03}{lon_min:02}{lon_sec:02}{east}"
        ))
    }
}

#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "magnitude is at most 180 degrees in whole seconds"
)]
fn split(value: f64) -> (u64, u64, u64) {
    let total = (value.abs() * 3600.0).round() as u64;
    (total / 3600, (total % 3600) / 60, total % 60)
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
            let lat = signed(lat, caps.name("lat_hem").map(|hem| hem.as_str()));
            let lon = signed(lon, caps.name("lon_hem").map(|hem| hem.as_str()));
            Some((Coordinate::new(lat, lon).ok()?, whole))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::testing::{assert_close, coord, detect};

    #[test]
    fn renders_fixed_width() {
        let text = DmsCompactService::new()
            .share_text(&coord(50.087_451, 14.420_671))
            .expect("text");
        assert_eq!(text, "500515N0142514E");
    }

    #[tokio::test]
    async fn detects_southern_and_western_hemispheres() {
        let found = detect(&DmsCompactService::new(), "fix 334124S 0702818W noted").await;
        assert_close(&found[0], &coord(-33.69, -70.471_667), 1e-5);
    }

    #[tokio::test]
    async fn longer_digit_runs_are_not_compact_dms() {
        let found = detect(&DmsCompactService::new(), "order 1500515N0142514E").await;
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn share_text_round_trips_to_whole_seconds() {
        let service = DmsCompactService::new();
        for original in [coord(50.087_451, 14.420_671), coord(-22.906_847, -43.172_896)] {
            let text = service.share_text(&original).expect("text");
            let found = detect(&service, &text).await;
            assert_eq!(found.len(), 1, "{text}");
            assert_close(&found[0], &original, 0.0003);
        }
    }
}
