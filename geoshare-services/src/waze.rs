//! Waze live map and navigation links.

use geoshare_core::{
    Coordinate, DetectionContext, DetectionInput, Detector, FoundUrl, GeoError, LinkOptions,
    Service, ServiceMeta, ServiceTag,
};

use crate::scan::{Hit, UrlDetector, host_is, parse_pair};

/// Waze `ul` links.
pub struct WazeService {
    meta: ServiceMeta,
}

impl WazeService {
    /// Create the service.
    #[must_use]
    pub fn new() -> Self {
        Self {
            meta: ServiceMeta::offline(
                10,
                "Waze",
                &[
                    ServiceTag::GenerateLink,
                    ServiceTag::GenerateLinkShare,
                    ServiceTag::GenerateOffline,
                ],
            ),
        }
    }
}

impl Default for WazeService {
    fn default() -> Self {
        Self::new()
    }
}

impl Service for WazeService {
    fn meta(&self) -> &ServiceMeta {
        &self.meta
    }

    fn detector<'det>(
        &'det self,
        _input: &'det DetectionInput,
        context: &'det DetectionContext,
    ) -> Box<dyn Detector + 'det> {
        Box::new(UrlDetector::new(self.meta.id, context, extract))
    }

    fn link(
        &self,
        coordinate: &Coordinate,
        drive: bool,
        options: &LinkOptions,
    ) -> Result<String, GeoError> {
        let zoom = options
            .zoom
            .map(|zoom| format!("&z={zoom}"))
            .unwrap_or_default();
        let navigate = if drive { "&navigate=yes" } else { "" };
        Ok(format!(
            "https://www.waze.com/ul?ll={:.6},{:.6}{zoom}{navigate}",
            coordinate.lat(),
            coordinate.lon()
        ))
    }
}

fn extract(url: &FoundUrl) -> Vec<Hit> {
    if !host_is(url, "waze.com") {
        return Vec::new();
    }
    let destination = url
        .query("to")
        .and_then(|to| to.strip_prefix("ll.").and_then(parse_pair));
    url.query("ll")
        .or_else(|| url.query("latlng"))
        .as_deref()
        .and_then(parse_pair)
        .or(destination)
        .map(|coordinate| Hit {
            coordinate,
            label: None,
        })
        .into_iter()
        .collect()
}
