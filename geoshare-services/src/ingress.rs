//! Ingress Intel map links.

use geoshare_core::{
    Coordinate, DetectionContext, DetectionInput, Detector, FoundUrl, GeoError, LinkOptions,
    Service, ServiceMeta, ServiceTag,
};

use crate::scan::{Hit, UrlDetector, host_is, parse_pair};

/// Ingress Intel portal and map links.
pub struct IngressService {
    meta: ServiceMeta,
}

impl IngressService {
    /// Create the service.
    #[must_use]
    pub fn new() -> Self {
        Self {
            meta: ServiceMeta::offline(
                11,
                "Ingress Intel",
                &[ServiceTag::GenerateLink, ServiceTag::GenerateOffline],
            ),
        }
    }
}

impl Default for IngressService {
    fn default() -> Self {
        Self::new()
    }
}

impl Service for IngressService {
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
            return Err(GeoError::not_supported("Ingress Intel has no navigation links"));
        }
        let pair = format!("{:.6},{:.6}", coordinate.lat(), coordinate.lon());
        let zoom = options
            .zoom
            .map(|zoom| format!("&z={zoom}"))
            .unwrap_or_default();
        Ok(format!("https://intel.ingress.com/intel?ll={pair}{zoom}&pll={pair}"))
    }
}

fn extract(url: &FoundUrl) -> Vec<Hit> {
    if !host_is(url, "intel.ingress.com") && !host_is(url, "ingress.com") {
        return Vec::new();
    }
    let mut hits = Vec::new();
    if let Some(coordinate) = url.query("pll").as_deref().and_then(parse_pair) {
        hits.push(Hit::labeled(coordinate, "Portal"));
    }
    if let Some(coordinate) = url.query("ll").as_deref().and_then(parse_pair) {
        hits.push(Hit::labeled(coordinate, "Map center"));
    }
    hits
}
