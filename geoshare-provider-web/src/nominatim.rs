//! Reverse geocoding through OpenStreetMap Nominatim.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use geoshare_core::{AddressProvider, Coordinate, HttpPort, PortError};

const BASE_URL: &str = "https://nominatim.openstreetmap.org/reverse";

/// Response from /reverse?format=jsonv2
#[derive(Debug, Deserialize)]
struct ReverseResponse {
    #[serde(default)]
    display_name: Option<String>,
    // present instead of a place when nothing is found, e.g. at sea
    #[serde(default)]
    error: Option<String>,
}

/// Address lookup backed by Nominatim.
pub struct NominatimAddressProvider {
    http: Arc<dyn HttpPort>,
    base_url: String,
    language: String,
    cache_ttl: Option<Duration>,
}

impl NominatimAddressProvider {
    /// Create a provider using the public Nominatim instance.
    #[must_use]
    pub fn new(http: Arc<dyn HttpPort>) -> Self {
        Self {
            http,
            base_url: BASE_URL.to_owned(),
            language: "en".to_owned(),
            cache_ttl: None,
        }
    }

    /// Point at a self-hosted instance.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Preferred language of the returned address.
    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
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
impl AddressProvider for NominatimAddressProvider {
    async fn reverse_geocode(&self, coordinate: Coordinate) -> Result<Option<String>, PortError> {
        let url = format!(
            "{}?format=jsonv2&lat={:.6}&lon={:.6}",
            self.base_url,
            coordinate.lat(),
            coordinate.lon()
        );
        let body = self
            .http
            .fetch_json(&url, self.cache_ttl, &[("Accept-Language", self.language.as_str())])
            .await?;
        let response: ReverseResponse = serde_json::from_value(body)?;
        if let Some(reason) = response.error {
            debug!(%coordinate, %reason, "no address found");
            return Ok(None);
        }
        Ok(response.display_name.filter(|name| !name.trim().is_empty()))
    }
}
