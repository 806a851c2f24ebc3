//! Google Maps links.

use std::sync::LazyLock;

use geoshare_core::{
    Coordinate, DetectionContext, DetectionInput, Detector, FoundUrl, GeoError, LinkOptions,
    LocationCollection, Service, ServiceMeta, ServiceTag,
};
use regex::Regex;

use crate::scan::{Hit, UrlDetector, parse_pair};

static PLACE_DATA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"!3d(?P<lat>-?\d{1,2}(?:\.\d+)?)!4d(?P<lon>-?\d{1,3}(?:\.\d+)?)")
        .expect("valid place data pattern")
});

static MAP_CENTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"@(?P<lat>-?\d{1,2}(?:\.\d+)?),(?P<lon>-?\d{1,3}(?:\.\d+)?)")
        .expect("valid map center pattern")
});

/// Query parameters holding a `lat,lon` pair, in order of preference.
const PAIR_PARAMETERS: &[&str] = &["q", "query", "destination", "ll", "daddr"];

/// Google Maps web and short-form app links.
pub struct GoogleMapsService {
    meta: ServiceMeta,
}

impl GoogleMapsService {
    /// Create the service.
    #[must_use]
    pub fn new() -> Self {
        Self {
            meta: ServiceMeta::offline(
                7,
                "Google Maps",
                &[
                    ServiceTag::GenerateLink,
                    ServiceTag::GenerateLinkShare,
                    ServiceTag::GenerateOffline,
                    ServiceTag::GenerateCollectionLink,
                ],
            ),
        }
    }
}

impl Default for GoogleMapsService {
    fn default() -> Self {
        Self::new()
    }
}

impl Service for GoogleMapsService {
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
        let pair = format!("{:.6},{:.6}", coordinate.lat(), coordinate.lon());
        if drive {
            return Ok(format!(
                "https://www.google.com/maps/dir/?api=1&destination={pair}&travelmode=driving"
            ));
        }
        Ok(match options.zoom {
            Some(zoom) => format!("https://www.google.com/maps/search/?api=1&query={pair}&zoom={zoom}"),
            None => format!("https://www.google.com/maps/search/?api=1&query={pair}"),
        })
    }

    fn collection_link(&self, collection: &LocationCollection) -> Option<String> {
        if collection.is_empty() {
            return None;
        }
        let stops: Vec<String> = collection
            .iter()
            .map(|record| {
                let coordinate = record.coordinate();
                format!("{:.6},{:.6}", coordinate.lat(), coordinate.lon())
            })
            .collect();
        Some(format!("https://www.google.com/maps/dir/{}", stops.join("/")))
    }
}

fn is_google_maps(url: &FoundUrl) -> bool {
    let Some(host) = url.host() else {
        return false;
    };
    if host.starts_with("maps.google.") {
        return true;
    }
    host.starts_with("google.") && url.url.path().starts_with("/maps")
}

fn extract(url: &FoundUrl) -> Vec<Hit> {
    if !is_google_maps(url) {
        return Vec::new();
    }
    let path = url.url.path();
    let mut hits = Vec::new();

    if let Some(coordinate) = captured_pair(&PLACE_DATA, path) {
        hits.push(Hit::labeled(coordinate, "Place"));
    }

    let segments: Vec<&str> = url.url.path_segments().map(Iterator::collect).unwrap_or_default();
    match segments.as_slice() {
        ["maps", "dir", stops @ ..] => {
            hits.extend(
                stops
                    .iter()
                    .filter_map(|stop| parse_pair(stop))
                    .map(|coordinate| Hit::labeled(coordinate, "Stop")),
            );
        }
        ["maps", "place" | "search", place, ..] => {
            if let Some(coordinate) = parse_pair(place) {
                hits.push(Hit::labeled(coordinate, "Place"));
            }
        }
        _ => {}
    }

    if let Some(coordinate) = PAIR_PARAMETERS
        .iter()
        .find_map(|name| url.query(name).as_deref().and_then(parse_pair))
    {
        hits.push(Hit::labeled(coordinate, "Place"));
    }

    if let Some(coordinate) = captured_pair(&MAP_CENTER, path) {
        hits.push(Hit::labeled(coordinate, "Map center"));
    }
    hits
}

fn captured_pair(pattern: &Regex, haystack: &str) -> Option<Coordinate> {
    let caps = pattern.captures(haystack)?;
    Coordinate::new(
        caps.name("lat")?.as_str().parse().ok()?,
        caps.name("lon")?.as_str().parse().ok()?,
    )
    .ok()
}

#[cfg(test)]
mod tests {
    use geoshare_core::LocationRecord;

    use super::*;
    use crate::scan::testing::{assert_close, coord, detect};

    #[tokio::test]
    async fn place_data_comes_before_map_center() {
        let found = detect(
            &GoogleMapsService::new(),
            "https://www.google.com/maps/place/Prague+Castle/@50.0910,14.3980,17z/data=!3m1!4b1!4m6!3m5!1s0x0:0x0!8m2!3d50.090987!4d14.400413",
        )
        .await;
        assert_eq!(found, vec![coord(50.090_987, 14.400_413), coord(50.091, 14.398)]);
    }

    #[tokio::test]
    async fn query_parameters_and_hosts() {
        let service = GoogleMapsService::new();
        let found = detect(&service, "https://maps.google.com/?q=-33.8568,151.2153").await;
        assert_eq!(found, vec![coord(-33.8568, 151.2153)]);
        let found = detect(&service, "https://www.google.co.uk/maps?ll=51.5007,-0.1246").await;
        assert_eq!(found, vec![coord(51.5007, -0.1246)]);
        assert!(detect(&service, "https://www.google.com/search?q=50.1,14.2").await.is_empty());
        assert!(detect(&service, "https://www.google.com/maps/place/Prague").await.is_empty());
    }

    #[tokio::test]
    async fn links_round_trip() {
        let service = GoogleMapsService::new();
        let original = coord(50.087_451, 14.420_671);
        for drive in [false, true] {
            let link = service.link(&original, drive, &LinkOptions::default()).expect("link");
            let found = detect(&service, &link).await;
            assert_eq!(found.len(), 1, "{link}");
            assert_close(&found[0], &original, 1e-6);
        }
    }

    #[tokio::test]
    async fn collection_link_lists_every_stop() {
        let service = GoogleMapsService::new();
        assert!(service.collection_link(&LocationCollection::new()).is_none());

        let mut collection = LocationCollection::new();
        collection.add(LocationRecord::new(coord(50.1, 14.2), service.meta().id));
        collection.add(LocationRecord::new(coord(-33.8568, 151.2153), service.meta().id));
        let link = service.collection_link(&collection).expect("link");
        assert_eq!(
            link,
            "https://www.google.com/maps/dir/50.100000,14.200000/-33.856800,151.215300"
        );
        let found = detect(&service, &link).await;
        assert_eq!(found, collection.coordinates());
    }
}
