//! Elevation lookup through the Open-Elevation API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use geoshare_core::{Coordinate, ElevationProvider, HttpPort, PortError};

const BASE_URL: &str = "https://api.open-elevation.com/api/v1/lookup";

/// Response from /api/v1/lookup
#[derive(Debug, Deserialize)]
struct LookupResponse {
    results: Vec<LookupResult>,
}

#[derive(Debug, Deserialize)]
struct LookupResult {
    elevation: Option<f64>,
}

/// Elevation backed by Open-Elevation (SRTM data).
pub struct OpenElevationProvider {
    http: Arc<dyn HttpPort>,
    base_url: String,
    cache_ttl: Option<Duration>,
}

impl OpenElevationProvider {
    /// Create a provider using the public Open-Elevation instance.
    #[must_use]
    pub fn new(http: Arc<dyn HttpPort>) -> Self {
        Self {
            http,
            base_url: BASE_URL.to_owned(),
            cache_ttl: None,
        }
    }

    /// Point at a self-hosted instance.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Cache responses for `ttl`.
    #[must_use]
    pub fn with_cache_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.cache_ttl = ttl;
        self
    }
}

#[async_trait]
impl ElevationProvider for OpenElevationProvider {
    async fn elevation(&self, coordinate: Coordinate) -> Result<Option<f64>, PortError> {
        let url = format!(
            "{}?locations={:.6},{:.6}",
            self.base_url,
            coordinate.lat(),
            coordinate.lon()
        );
        let body = self.http.fetch_json(&url, self.cache_ttl, &[]).await?;
        let response: LookupResponse = serde_json::from_value(body)?;
        Ok(response
            .results
            .into_iter()
            .next()
            .and_then(|result| result.elevation)
            .filter(|meters| meters.is_finite()))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::testing::StubHttp;

    fn coord() -> Coordinate {
        Coordinate::new(27.988_056, 86.925_278).expect("valid")
    }

    #[tokio::test]
    async fn first_result_is_used() {
        let http = StubHttp::json(json!({
            "results": [{"latitude": 27.988056, "longitude": 86.925278, "elevation": 8729.0}]
        }));
        let provider = OpenElevationProvider::new(http.port());
        assert_eq!(provider.elevation(coord()).await.expect("lookup"), Some(8729.0));
        assert_eq!(
            http.requested(),
            vec!["https://api.open-elevation.com/api/v1/lookup?locations=27.988056,86.925278".to_owned()]
        );
    }

    #[tokio::test]
    async fn self_hosted_instance_is_queried() {
        let http = StubHttp::json(json!({"results": [{"elevation": 235.0}]}));
        let provider =
            OpenElevationProvider::new(http.port()).with_base_url("http://elevation.local/api/v1/lookup");
        assert_eq!(provider.elevation(coord()).await.expect("lookup"), Some(235.0));
        assert_eq!(
            http.requested(),
            vec!["http://elevation.local/api/v1/lookup?locations=27.988056,86.925278".to_owned()]
        );
    }

    #[tokio::test]
    async fn empty_results_mean_unknown() {
        let provider = OpenElevationProvider::new(StubHttp::json(json!({"results": []})));
        assert_eq!(provider.elevation(coord()).await.expect("lookup"), None);
    }

    #[tokio::test]
    async fn unexpected_shape_is_a_decode_error() {
        let provider = OpenElevationProvider::new(StubHttp::json(json!({"error": "busy"})));
        assert!(matches!(
            provider.elevation(coord()).await,
            Err(PortError::Decode(_))
        ));
    }
}
