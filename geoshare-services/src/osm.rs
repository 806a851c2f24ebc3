//! OpenStreetMap links.

use geoshare_core::{
    Coordinate, DetectionContext, DetectionInput, Detector, FoundUrl, GeoError, LinkOptions,
    Service, ServiceMeta, ServiceTag,
};

use crate::scan::{Hit, UrlDetector, fragment_value, from_parts, host_is, parse_position};

const DEFAULT_ZOOM: u8 = 17;

/// openstreetmap.org markers and map positions.
pub struct OpenStreetMapService {
    meta: ServiceMeta,
}

impl OpenStreetMapService {
    /// Create the service.
    #[must_use]
    pub fn new() -> Self {
        Self {
            meta: ServiceMeta::offline(
                8,
                "OpenStreetMap",
                &[
                    ServiceTag::GenerateLink,
                    ServiceTag::GenerateLinkShare,
                    ServiceTag::GenerateOffline,
                ],
            ),
        }
    }
}

impl Default for OpenStreetMapService {
    fn default() -> Self {
        Self::new()
    }
}

impl Service for OpenStreetMapService {
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
            return Err(GeoError::not_supported("OpenStreetMap has no navigation links"));
        }
        let (lat, lon) = (coordinate.lat(), coordinate.lon());
        let zoom = options.zoom.unwrap_or(DEFAULT_ZOOM);
        Ok(format!(
            "https://www.openstreetmap.org/?mlat={lat:.6}&mlon={lon:.6}#map={zoom}/{lat:.6}/{lon:.6}"
        ))
    }
}

fn extract(url: &FoundUrl) -> Vec<Hit> {
    if !host_is(url, "openstreetmap.org") && !host_is(url, "osm.org") {
        return Vec::new();
    }
    let mut hits = Vec::new();
    if let Some(coordinate) = from_parts(url.query("mlat"), url.query("mlon")) {
        hits.push(Hit::labeled(coordinate, "Marker"));
    }
    if let Some(coordinate) = fragment_value(url, "map").and_then(|map| parse_position(&map, 3, 3)) {
        hits.push(Hit::labeled(coordinate, "Map center"));
    }
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::testing::{assert_close, coord, detect};

    #[tokio::test]
    async fn marker_and_map_position() {
        let service = OpenStreetMapService::new();
        let found = detect(
            &service,
            "https://www.openstreetmap.org/?mlat=50.0875&mlon=14.4213#map=15/50.0800/14.4300&layers=C",
        )
        .await;
        assert_eq!(found, vec![coord(50.0875, 14.4213), coord(50.08, 14.43)]);
        let found = detect(&service, "https://osm.org/#map=12/-33.8568/151.2153").await;
        assert_eq!(found, vec![coord(-33.8568, 151.2153)]);
    }

    #[tokio::test]
    async fn other_hosts_and_bare_pages_are_ignored() {
        let service = OpenStreetMapService::new();
        assert!(detect(&service, "https://www.openstreetmap.org/about").await.is_empty());
        assert!(detect(&service, "https://notopenstreetmap.org/#map=12/1/2").await.is_empty());
    }

    #[tokio::test]
    async fn link_round_trips_and_refuses_drive() {
        let service = OpenStreetMapService::new();
        let original = coord(50.087_451, 14.420_671);
        let link = service.link(&original, false, &LinkOptions { zoom: Some(12) }).expect("link");
        assert!(link.contains("#map=12/"));
        let found = detect(&service, &link).await;
        assert_eq!(found.len(), 1);
        assert_close(&found[0], &original, 1e-6);
        assert!(matches!(
            service.link(&original, true, &LinkOptions::default()),
            Err(GeoError::NotSupported(_))
        ));
    }
}
