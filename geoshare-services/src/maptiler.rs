//! MapTiler map links with the position in the URL fragment.

use geoshare_core::{
    Coordinate, DetectionContext, DetectionInput, Detector, FoundUrl, GeoError, LinkOptions,
    Service, ServiceMeta, ServiceTag,
};

use crate::scan::{Hit, UrlDetector, fragment_value, host_is, parse_position};

const DEFAULT_ZOOM: u8 = 17;

/// MapTiler `#zoom/lat/lon[/bearing[/pitch]]` positions.
pub struct MapTilerService {
    meta: ServiceMeta,
}

impl MapTilerService {
    /// Create the service.
    #[must_use]
    pub fn new() -> Self {
        Self {
            meta: ServiceMeta::offline(
                12,
                "MapTiler",
                &[ServiceTag::GenerateLink, ServiceTag::GenerateOffline],
            ),
        }
    }
}

impl Default for MapTilerService {
    fn default() -> Self {
        Self::new()
    }
}

impl Service for MapTilerService {
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
        if drive {
            return Err(GeoError::not_supported("MapTiler has no navigation links"));
        }
        Ok(format!(
            "https://www.maptiler.com/maps/#style=streets-v2&mode=2d&position={}/{:.6}/{:.6}",
            options.zoom.unwrap_or(DEFAULT_ZOOM),
            coordinate.lat(),
            coordinate.lon()
        ))
    }
}

fn extract(url: &FoundUrl) -> Vec<Hit> {
    if !host_is(url, "maptiler.com") {
        return Vec::new();
    }
    let position = fragment_value(url, "position").or_else(|| url.url.fragment().map(str::to_owned));
    position
        .and_then(|raw| parse_position(&raw, 3, 5))
        .map(|coordinate| Hit {
            coordinate,
            label: None,
        })
        .into_iter()
        .collect()
}
