//! Timezone lookup through the GeoNames web services.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use geoshare_core::{Coordinate, HttpPort, PortError, TimezoneInfo, TimezoneProvider};

const BASE_URL: &str = "http://api.geonames.org/timezoneJSON";

/// Response from /timezoneJSON
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimezoneResponse {
    #[serde(default)]
    timezone_id: Option<String>,
    /// Standard offset in hours, fractional for e.g. India.
    #[serde(default)]
    raw_offset: Option<f64>,
    // GeoNames reports failures in-band
    #[serde(default)]
    status: Option<ErrorStatus>,
}

#[derive(Debug, Deserialize)]
struct ErrorStatus {
    message: String,
}

/// Timezone backed by GeoNames; needs a registered username.
pub struct GeoNamesTimezoneProvider {
    http: Arc<dyn HttpPort>,
    username: Option<String>,
    cache_ttl: Option<Duration>,
}

impl GeoNamesTimezoneProvider {
    /// Create a provider. Without a username every lookup fails.
    #[must_use]
    pub fn new(http: Arc<dyn HttpPort>, username: Option<String>) -> Self {
        Self {
            http,
            username,
            cache_ttl: None,
        }
    }

    /// Cache responses for `ttl`.
    #[must_use]
    pub fn with_cache_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.cache_ttl = ttl;
        self
    }
}

#[async_trait]
impl TimezoneProvider for GeoNamesTimezoneProvider {
    async fn timezone(&self, coordinate: Coordinate) -> Result<Option<TimezoneInfo>, PortError> {
        let username = self
            .username
            .as_deref()
            .ok_or(PortError::MissingCredentials("GeoNames username"))?;
        let url = format!(
            "{BASE_URL}?lat={:.6}&lng={:.6}&username={username}",
            coordinate.lat(),
            coordinate.lon()
        );
        let body = self.http.fetch_json(&url, self.cache_ttl, &[]).await?;
        let response: TimezoneResponse = serde_json::from_value(body)?;
        if let Some(status) = response.status {
            return Err(PortError::Internal(status.message));
        }
        let Some(id) = response.timezone_id.filter(|id| !id.is_empty()) else {
            return Ok(None);
        };
        Ok(Some(TimezoneInfo {
            id,
            offset_seconds: offset_seconds(response.raw_offset.unwrap_or_default()),
        }))
    }
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "offsets stay within a day, far inside i32"
)]
fn offset_seconds(hours: f64) -> i32 {
    (hours * 3600.0).round() as i32
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::testing::StubHttp;

    fn coord() -> Coordinate {
        Coordinate::new(28.6139, 77.209).expect("valid")
    }

    #[tokio::test]
    async fn fractional_offsets_are_converted_to_seconds() {
        let http = StubHttp::json(json!({
            "timezoneId": "Asia/Kolkata",
            "rawOffset": 5.5,
            "gmtOffset": 5.5,
            "dstOffset": 5.5,
            "countryCode": "IN"
        }));
        let provider = GeoNamesTimezoneProvider::new(http.port(), Some("demo".to_owned()));
        let zone = provider.timezone(coord()).await.expect("lookup").expect("zone");
        assert_eq!(zone.id, "Asia/Kolkata");
        assert_eq!(zone.offset_seconds, 19_800);
        assert_eq!(
            http.requested(),
            vec!["http://api.geonames.org/timezoneJSON?lat=28.613900&lng=77.209000&username=demo".to_owned()]
        );
    }

    #[tokio::test]
    async fn missing_username_fails_before_any_request() {
        let http = StubHttp::json(json!({}));
        let provider = GeoNamesTimezoneProvider::new(http.port(), None);
        assert!(matches!(
            provider.timezone(coord()).await,
            Err(PortError::MissingCredentials(_))
        ));
        assert!(http.requested().is_empty());
    }

    #[tokio::test]
    async fn in_band_errors_are_reported() {
        let http = StubHttp::json(json!({"status": {"message": "user does not exist.", "value": 10}}));
        let provider = GeoNamesTimezoneProvider::new(http, Some("nobody".to_owned()));
        assert!(matches!(
            provider.timezone(coord()).await,
            Err(PortError::Internal(message)) if message.contains("does not exist")
        ));
    }
}
