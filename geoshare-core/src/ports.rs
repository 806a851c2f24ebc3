//! Traits describing external collaborators and shared helper types.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Error as ReqwestError;
use serde_json::Error as JsonError;
use serde_json::Value;

use crate::error::GeoError;
use crate::model::Coordinate;
use crate::staticmap::RenderOptions;

#[derive(thiserror::Error, Debug)]
/// Errors that can occur while talking to external backends.
pub enum PortError {
    /// Network layer failed.
    #[error("Network error: {0}")]
    Network(#[from] ReqwestError),
    /// Backend answered with a non-success status.
    #[error("Unexpected HTTP status {0}")]
    Status(u16),
    /// Response body did not have the expected shape.
    #[error("Decode error: {0}")]
    Decode(#[from] JsonError),
    /// Backend did not answer in time.
    #[error("Timed out")]
    Timeout,
    /// Required API credentials are not configured.
    #[error("Missing credentials: {0}")]
    MissingCredentials(&'static str),
    /// Internal provider error.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[async_trait]
/// Opaque HTTP capability used to reach third-party APIs.
pub trait HttpPort: Send + Sync {
    /// Fetch and decode a JSON document.
    ///
    /// A `cache_ttl` of `None` or zero bypasses any response cache.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the request fails or the body is not JSON.
    async fn fetch_json(
        &self,
        url: &str,
        cache_ttl: Option<Duration>,
        headers: &[(&str, &str)],
    ) -> Result<Value, PortError>;

    /// Download a raw response body.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the request fails.
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, PortError>;
}

#[async_trait]
/// Reverse geocoding backend.
pub trait AddressProvider: Send + Sync {
    /// Resolve a coordinate to a postal address, if one is known.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the backend call fails.
    async fn reverse_geocode(&self, coordinate: Coordinate) -> Result<Option<String>, PortError>;
}

#[async_trait]
/// Elevation lookup backend.
pub trait ElevationProvider: Send + Sync {
    /// Elevation above sea level in meters, if known.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the backend call fails.
    async fn elevation(&self, coordinate: Coordinate) -> Result<Option<f64>, PortError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Timezone resolved for a coordinate.
pub struct TimezoneInfo {
    /// IANA timezone name.
    pub id: String,
    /// Standard offset from UTC in seconds, without daylight saving.
    pub offset_seconds: i32,
}

#[async_trait]
/// Timezone lookup backend.
pub trait TimezoneProvider: Send + Sync {
    /// Timezone at the coordinate, if known.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the backend call fails.
    async fn timezone(&self, coordinate: Coordinate) -> Result<Option<TimezoneInfo>, PortError>;
}

/// Backend rendering static map images for a list of markers.
pub trait StaticMapProvider: Send + Sync {
    /// Name used in cache identities. Must stay stable across releases.
    fn name(&self) -> &str;

    /// Build the provider URL (possibly carrying API keys) returning the image.
    ///
    /// # Errors
    ///
    /// Returns a [`GeoError`] when the provider cannot render these markers.
    fn private_url(&self, markers: &[Coordinate], options: &RenderOptions)
    -> Result<String, GeoError>;
}
