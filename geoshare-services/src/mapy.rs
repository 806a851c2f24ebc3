//! Mapy.com (formerly Mapy.cz) links.

use geoshare_core::{
    Coordinate, DetectionContext, DetectionInput, Detector, FoundUrl, GeoError, LinkOptions,
    Service, ServiceMeta, ServiceTag,
};

use crate::scan::{Hit, UrlDetector, from_parts, host_is, parse_reversed_pair};

const DEFAULT_ZOOM: u8 = 17;

/// Mapy.com points and map positions.
pub struct MapyService {
    meta: ServiceMeta,
}

impl MapyService {
    /// Create the service.
    #[must_use]
    pub fn new() -> Self {
        Self {
            meta: ServiceMeta::offline(
                9,
                "Mapy.com",
                &[
                    ServiceTag::GenerateLink,
                    ServiceTag::GenerateLinkShare,
                    ServiceTag::GenerateOffline,
                ],
            ),
        }
    }
}

impl Default for MapyService {
    fn default() -> Self {
        Self::new()
    }
}

impl Service for MapyService {
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
            return Err(GeoError::not_supported("Mapy.com navigation links are not generated"));
        }
        let (lat, lon) = (coordinate.lat(), coordinate.lon());
        let zoom = options.zoom.unwrap_or(DEFAULT_ZOOM);
        Ok(format!(
            "https://mapy.com/zakladni?source=coor&id={lon:.6},{lat:.6}&x={lon:.6}&y={lat:.6}&z={zoom}"
        ))
    }
}

fn extract(url: &FoundUrl) -> Vec<Hit> {
    if !host_is(url, "mapy.com") && !host_is(url, "mapy.cz") {
        return Vec::new();
    }
    let mut hits = Vec::new();
    if url.query("source").as_deref() == Some("coor") {
        if let Some(coordinate) = url.query("id").as_deref().and_then(parse_reversed_pair) {
            hits.push(Hit::labeled(coordinate, "Point"));
        }
    }
    if let Some(coordinate) = from_parts(url.query("y"), url.query("x")) {
        hits.push(Hit::labeled(coordinate, "Map center"));
    }
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::testing::{assert_close, coord, detect};

    #[tokio::test]
    async fn point_is_given_longitude_first() {
        let found = detect(
            &MapyService::new(),
            "https://en.mapy.cz/zakladni?source=coor&id=14.4213,50.0875&x=14.43&y=50.08&z=15",
        )
        .await;
        assert_eq!(found, vec![coord(50.0875, 14.4213), coord(50.08, 14.43)]);
    }

    #[tokio::test]
    async fn venue_ids_are_not_coordinates() {
        let found = detect(&MapyService::new(), "https://mapy.com/?source=firm&id=12345").await;
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn link_round_trips_to_one_location() {
        let service = MapyService::new();
        let original = coord(-41.286_46, 174.776_236);
        let link = service.link(&original, false, &LinkOptions::default()).expect("link");
        let found = detect(&service, &link).await;
        assert_eq!(found.len(), 1);
        assert_close(&found[0], &original, 1e-6);
        assert!(matches!(
            service.link(&original, true, &LinkOptions::default()),
            Err(GeoError::NotSupported(_))
        ));
    }
}
