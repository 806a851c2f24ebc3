//! Plain decimal degrees, e.g. `50.087451,14.420671` or `N 50.0874, E 14.4206`.

use std::ops::Range;
use std::sync::LazyLock;

use geoshare_core::{
    Coordinate, DetectionContext, DetectionInput, Detector, Service, ServiceMeta, ServiceTag,
};
use regex::Regex;

use crate::scan::{TextDetector, hemisphere, isolated, number, signed};

static PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        (?:(?P<lat_pre>[NS])\s?)?
        (?P<lat>[-+]?\d{1,2}\.\d{1,15})°?
        (?:\s?(?P<lat_post>[NS]))?
        (?:\s*[,;]\s*|\s+)
        (?:(?P<lon_pre>[EW])\s?)?
        (?P<lon>[-+]?\d{1,3}\.\d{1,15})°?
        (?:\s?(?P<lon_post>[EW]))?",
    )
    .expect("valid degrees pattern")
});

/// WGS84 coordinates written in decimal degrees.
pub struct DegreesService {
    meta: ServiceMeta,
}

impl DegreesService {
    /// Create the service.
    #[must_use]
    pub fn new() -> Self {
        Self {
            meta: ServiceMeta::offline(
                1,
                "WGS84 degrees",
                &[ServiceTag::GenerateText, ServiceTag::GenerateTextOffline],
            ),
        }
    }
}

impl Default for DegreesService {
    fn default() -> Self {
        Self::new()
    }
}

impl Service for DegreesService {
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
        Some(format!("{:.6},{:.6}", coordinate.lat(), coordinate.lon()))
    }
}

fn find(text: &str) -> Vec<(Coordinate, Range<usize>)> {
    PATTERN
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?.range();
            if !isolated(text, &whole) {
                return None;
            }
            let lat = signed(number(&caps, "lat")?, hemisphere(&caps, "lat_pre", "lat_post"));
            let lon = signed(number(&caps, "lon")?, hemisphere(&caps, "lon_pre", "lon_post"));
            Some((Coordinate::new(lat, lon).ok()?, whole))
        })
        .collect()
}
