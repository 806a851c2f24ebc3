//! RFC 5870 `geo:` URIs, including the Android `geo:0,0?q=lat,lon(label)` form.

use geoshare_core::{
    Coordinate, DetectionContext, DetectionInput, Detector, FoundUrl, GeoError, LinkOptions,
    Service, ServiceMeta, ServiceTag,
};

use crate::scan::{Hit, UrlDetector, parse_pair};

/// `geo:` URI scheme.
pub struct GeoUriService {
    meta: ServiceMeta,
}

impl GeoUriService {
    /// Create the service.
    #[must_use]
    pub fn new() -> Self {
        Self {
            meta: ServiceMeta::offline(
                5,
                "Geo URI",
                &[ServiceTag::GenerateLink, ServiceTag::GenerateOffline],
            ),
        }
    }
}

impl Default for GeoUriService {
    fn default() -> Self {
        Self::new()
    }
}

impl Service for GeoUriService {
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
            return Err(GeoError::not_supported("geo URIs carry no navigation intent"));
        }
        let base = format!("geo:{:.6},{:.6}", coordinate.lat(), coordinate.lon());
        Ok(match options.zoom {
            Some(zoom) => format!("{base}?z={zoom}"),
            None => base,
        })
    }
}

fn extract(url: &FoundUrl) -> Vec<Hit> {
    if url.url.scheme() != "geo" {
        return Vec::new();
    }
    let position = url.url.path().split(';').next().and_then(parse_pair);
    let query = url
        .query("q")
        .and_then(|q| parse_pair(q.split('(').next().unwrap_or_default()));

    // Android puts the real position in `q` and a placeholder in the path.
    let chosen = match (position, query) {
        (Some(origin), Some(place)) if is_origin(&origin) => Some(place),
        (Some(position), _) => Some(position),
        (None, query) => query,
    };
    chosen
        .map(|coordinate| Hit {
            coordinate,
            label: None,
        })
        .into_iter()
        .collect()
}

fn is_origin(coordinate: &Coordinate) -> bool {
    coordinate.lat().abs() < f64::EPSILON && coordinate.lon().abs() < f64::EPSILON
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::testing::{assert_close, coord, detect};

    #[tokio::test]
    async fn detects_plain_and_parameterized_uris() {
        let service = GeoUriService::new();
        let found = detect(&service, "geo:50.087451,14.420671").await;
        assert_eq!(found, vec![coord(50.087_451, 14.420_671)]);
        let found = detect(&service, "geo:-33.8568,151.2153,12;u=35;crs=wgs84").await;
        assert_eq!(found, vec![coord(-33.8568, 151.2153)]);
    }

    #[tokio::test]
    async fn android_query_overrides_placeholder_origin() {
        let found = detect(&GeoUriService::new(), "geo:0,0?q=48.8584,2.2945(Eiffel%20Tower)").await;
        assert_eq!(found, vec![coord(48.8584, 2.2945)]);
    }

    #[tokio::test]
    async fn other_schemes_are_ignored() {
        assert!(detect(&GeoUriService::new(), "https://example.com/50.1,14.2").await.is_empty());
    }

    #[tokio::test]
    async fn link_round_trips() {
        let service = GeoUriService::new();
        let original = coord(50.087_451, 14.420_671);
        let link = service.link(&original, false, &LinkOptions::default()).expect("link");
        assert_eq!(link, "geo:50.087451,14.420671");
        let found = detect(&service, &link).await;
        assert_close(&found[0], &original, 1e-6);
    }

    #[test]
    fn drive_links_are_not_supported() {
        let result = GeoUriService::new().link(&coord(1.0, 2.0), true, &LinkOptions::default());
        assert!(matches!(result, Err(GeoError::NotSupported(_))));
    }
}
