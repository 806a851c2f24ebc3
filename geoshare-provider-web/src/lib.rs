//! Web backends for geoshare: HTTP access, enrichment lookups and static maps.

use std::sync::Arc;
use std::time::Duration;

use geoshare_core::{ApiKeys, EnrichmentProviders, HttpPort, StaticMapProvider, TimezoneProvider};

/// Bing Maps static imagery.
pub mod bing;
/// Open-Elevation lookups.
pub mod elevation;
/// GeoNames timezone lookups.
pub mod geonames;
/// `reqwest` based HTTP port.
pub mod http;
/// Nominatim reverse geocoding.
pub mod nominatim;

pub use bing::BingStaticMaps;
pub use elevation::OpenElevationProvider;
pub use geonames::GeoNamesTimezoneProvider;
pub use http::ReqwestHttp;
pub use nominatim::NominatimAddressProvider;

/// Build the enrichment bundle on top of one shared HTTP port.
///
/// The timezone provider is left out when no GeoNames username is configured.
#[must_use]
pub fn enrichment_providers(
    http: &Arc<dyn HttpPort>,
    keys: &ApiKeys,
    cache_ttl: Option<Duration>,
) -> EnrichmentProviders {
    let address = Arc::new(NominatimAddressProvider::new(Arc::clone(http)).with_cache_ttl(cache_ttl));
    let elevation = Arc::new(OpenElevationProvider::new(Arc::clone(http)).with_cache_ttl(cache_ttl));
    let timezone = keys.geonames_username.clone().map(|username| {
        let provider: Arc<dyn TimezoneProvider> = Arc::new(
            GeoNamesTimezoneProvider::new(Arc::clone(http), Some(username)).with_cache_ttl(cache_ttl),
        );
        provider
    });

    EnrichmentProviders {
        address: Some(address),
        elevation: Some(elevation),
        timezone,
    }
}

/// Static map providers for which credentials are configured.
#[must_use]
pub fn static_map_providers(keys: &ApiKeys) -> Vec<Arc<dyn StaticMapProvider>> {
    let mut providers: Vec<Arc<dyn StaticMapProvider>> = Vec::new();
    if let Some(key) = keys.bing_maps.as_deref().filter(|key| !key.is_empty()) {
        providers.push(Arc::new(BingStaticMaps::new(key)));
    }
    providers
}

#[cfg(test)]
mod testing {
    use std::sync::{Arc, Mutex, PoisonError};
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::Value;

    use geoshare_core::{HttpPort, PortError};

    /// Canned HTTP answers that record every requested URL.
    pub(crate) struct StubHttp {
        answer: Result<Value, u16>,
        requested: Mutex<Vec<String>>,
    }

    impl StubHttp {
        pub(crate) fn json(body: Value) -> Arc<Self> {
            Arc::new(Self {
                answer: Ok(body),
                requested: Mutex::new(Vec::new()),
            })
        }

        pub(crate) fn status(code: u16) -> Arc<Self> {
            Arc::new(Self {
                answer: Err(code),
                requested: Mutex::new(Vec::new()),
            })
        }

        /// The same stub behind the port trait, keeping this handle for assertions.
        pub(crate) fn port(self: &Arc<Self>) -> Arc<dyn HttpPort> {
            let port: Arc<Self> = Arc::clone(self);
            port
        }

        pub(crate) fn requested(&self) -> Vec<String> {
            self.requested
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }
    }

    #[async_trait]
    impl HttpPort for StubHttp {
        async fn fetch_json(
            &self,
            url: &str,
            _cache_ttl: Option<Duration>,
            _headers: &[(&str, &str)],
        ) -> Result<Value, PortError> {
            self.requested
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(url.to_owned());
            self.answer.clone().map_err(PortError::Status)
        }

        async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, PortError> {
            self.requested
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(url.to_owned());
            Err(PortError::Internal("bytes are not stubbed".into()))
        }
    }
}
