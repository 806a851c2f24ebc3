//! Domain data structures for coordinates, detected locations and service descriptors.

use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::GeoError;

/// Default number of decimal digits compared when deduplicating (about 11 cm).
pub const DEFAULT_PRECISION: u8 = 6;
/// Highest precision a [`CoordinateKey`] can carry.
pub const MAX_PRECISION: u8 = 9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinate")]
/// Validated WGS84 latitude/longitude pair in decimal degrees.
pub struct Coordinate {
    lat: f64,
    lon: f64,
}

#[derive(Deserialize)]
struct RawCoordinate {
    lat: f64,
    lon: f64,
}

impl TryFrom<RawCoordinate> for Coordinate {
    type Error = GeoError;

    fn try_from(raw: RawCoordinate) -> Result<Self, Self::Error> {
        Self::new(raw.lat, raw.lon)
    }
}

impl Coordinate {
    /// Build a coordinate, rejecting non-finite or out of range values.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::InvalidCoordinate`] when latitude is outside
    /// `[-90, 90]`, longitude is outside `[-180, 180]` or either is not finite.
    pub fn new(lat: f64, lon: f64) -> Result<Self, GeoError> {
        let lat_ok = lat.is_finite() && (-90.0..=90.0).contains(&lat);
        let lon_ok = lon.is_finite() && (-180.0..=180.0).contains(&lon);
        if lat_ok && lon_ok {
            Ok(Self { lat, lon })
        } else {
            Err(GeoError::InvalidCoordinate { lat, lon })
        }
    }

    /// Latitude in decimal degrees.
    #[must_use]
    pub fn lat(&self) -> f64 {
        self.lat
    }

    /// Longitude in decimal degrees.
    #[must_use]
    pub fn lon(&self) -> f64 {
        self.lon
    }

    /// Project the coordinate onto a fixed-precision key.
    ///
    /// Precision above [`MAX_PRECISION`] is capped.
    #[must_use]
    pub fn key(&self, precision: u8) -> CoordinateKey {
        let precision = precision.min(MAX_PRECISION);
        let scale = 10_f64.powi(i32::from(precision));
        CoordinateKey {
            lat: (self.lat * scale).round() as i64,
            lon: (self.lon * scale).round() as i64,
            precision,
        }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{:.6},{:.6}", self.lat, self.lon)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// Coordinate rounded to a number of decimal digits, stored as scaled integers.
pub struct CoordinateKey {
    lat: i64,
    lon: i64,
    precision: u8,
}

impl CoordinateKey {
    /// Number of decimal digits this key was rounded to.
    #[must_use]
    pub fn precision(&self) -> u8 {
        self.precision
    }
}

impl fmt::Display for CoordinateKey {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_scaled(formatter, self.lat, self.precision)?;
        formatter.write_str(",")?;
        write_scaled(formatter, self.lon, self.precision)
    }
}

fn write_scaled(formatter: &mut fmt::Formatter<'_>, value: i64, precision: u8) -> fmt::Result {
    let sign = if value < 0 { "-" } else { "" };
    let scale = 10_u64.pow(u32::from(precision));
    let magnitude = value.unsigned_abs();
    let whole = magnitude / scale;
    if precision == 0 {
        return write!(formatter, "{sign}{whole}");
    }
    let fraction = magnitude % scale;
    let width = usize::from(precision);
    write!(formatter, "{sign}{whole}.{fraction:0width$}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
/// Stable numeric identifier of a service. Never reused once assigned.
pub struct ServiceId(pub u32);

impl fmt::Display for ServiceId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
/// Capabilities a service may declare.
pub enum ServiceTag {
    /// Renders a coordinate as share text.
    GenerateText,
    /// Share text can be produced without any network access.
    GenerateTextOffline,
    /// Renders a coordinate as a link.
    GenerateLink,
    /// Link is suitable for share menus.
    GenerateLinkShare,
    /// Link can be produced without any network access.
    GenerateOffline,
    /// Renders a whole collection as one link.
    GenerateCollectionLink,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Descriptor of a registered service.
pub struct ServiceMeta {
    /// Stable identifier, persisted externally.
    pub id: ServiceId,
    /// Human-friendly name.
    pub name: String,
    /// Declared capabilities.
    pub tags: Vec<ServiceTag>,
    /// Whether processing needs a network lookup.
    pub network: bool,
}

impl ServiceMeta {
    /// Descriptor for a service that only parses its input.
    #[must_use]
    pub fn offline(id: u32, name: &str, tags: &[ServiceTag]) -> Self {
        Self {
            id: ServiceId(id),
            name: name.to_owned(),
            tags: tags.to_vec(),
            network: false,
        }
    }

    /// Whether the service declares `tag`.
    #[must_use]
    pub fn has_tag(&self, tag: ServiceTag) -> bool {
        self.tags.contains(&tag)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
/// Byte range of the input text a location was detected in.
pub struct InputSpan {
    /// Start offset (inclusive).
    pub start: usize,
    /// End offset (exclusive).
    pub end: usize,
}

impl From<Range<usize>> for InputSpan {
    fn from(range: Range<usize>) -> Self {
        Self {
            start: range.start,
            end: range.end,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
/// A detected location with its provenance and optional enrichment.
pub struct LocationRecord {
    coordinate: Coordinate,
    source: ServiceId,
    span: Option<InputSpan>,
    label: Option<String>,
    /// Reverse-geocoded address.
    pub address: Option<String>,
    /// Elevation above sea level.
    pub elevation_meters: Option<f64>,
    /// IANA timezone name, e.g. `Europe/Prague`.
    pub timezone_id: Option<String>,
    /// Current offset from UTC.
    pub timezone_offset_seconds: Option<i32>,
}

impl LocationRecord {
    /// Create a record detected by `source`.
    #[must_use]
    pub fn new(coordinate: Coordinate, source: ServiceId) -> Self {
        Self {
            coordinate,
            source,
            span: None,
            label: None,
            address: None,
            elevation_meters: None,
            timezone_id: None,
            timezone_offset_seconds: None,
        }
    }

    /// Attach the input range the location was found in.
    #[must_use]
    pub fn with_span(mut self, span: impl Into<InputSpan>) -> Self {
        self.span = Some(span.into());
        self
    }

    /// Attach a short description such as "Place" or a venue name.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Detected coordinate.
    #[must_use]
    pub fn coordinate(&self) -> &Coordinate {
        &self.coordinate
    }

    /// Service that detected this location.
    #[must_use]
    pub fn source(&self) -> ServiceId {
        self.source
    }

    /// Input range the location was detected in, if known.
    #[must_use]
    pub fn span(&self) -> Option<InputSpan> {
        self.span
    }

    /// Label set by the detecting service.
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
/// JSON shape of a location handed to API consumers.
pub struct LocationExport {
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lon: f64,
    /// Detecting service.
    pub source_service_id: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    /// Reverse-geocoded address.
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    /// Elevation in meters.
    pub elevation_meters: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    /// IANA timezone name.
    pub timezone_id: Option<String>,
}

impl From<&LocationRecord> for LocationExport {
    fn from(record: &LocationRecord) -> Self {
        Self {
            lat: record.coordinate.lat,
            lon: record.coordinate.lon,
            source_service_id: record.source.0,
            address: record.address.clone(),
            elevation_meters: record.elevation_meters,
            timezone_id: record.timezone_id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_and_non_finite() {
        assert!(matches!(Coordinate::new(90.000_001, 0.0), Err(_)));
        assert!(matches!(Coordinate::new(0.0, -180.5), Err(_)));
        assert!(matches!(Coordinate::new(f64::NAN, 0.0), Err(_)));
        assert!(matches!(Coordinate::new(0.0, f64::INFINITY), Err(_)));
        assert!(matches!(Coordinate::new(-90.0, 180.0), Ok(_)));
    }

    #[test]
    fn key_rounds_to_requested_precision() {
        let coord = Coordinate::new(50.087_451_4, -14.420_671_6).expect("valid");
        assert_eq!(coord.key(6).to_string(), "50.087451,-14.420672");
        assert_eq!(coord.key(2).to_string(), "50.09,-14.42");
        assert_eq!(coord.key(0).to_string(), "50,-14");
    }

    #[test]
    fn tiny_negative_values_share_the_zero_key() {
        let below = Coordinate::new(-0.000_000_1, 0.0).expect("valid");
        let zero = Coordinate::new(0.0, 0.0).expect("valid");
        assert_eq!(below.key(6), zero.key(6));
        assert_eq!(below.key(6).to_string(), "0.000000,0.000000");
    }

    #[test]
    fn negative_fractions_keep_their_sign() {
        let coord = Coordinate::new(-0.5, -0.000_005).expect("valid");
        assert_eq!(coord.key(6).to_string(), "-0.500000,-0.000005");
    }

    #[test]
    fn precision_is_capped() {
        let coord = Coordinate::new(1.0, 2.0).expect("valid");
        assert_eq!(coord.key(42).precision(), MAX_PRECISION);
    }

    #[test]
    fn deserialization_validates_range() {
        let parsed: Result<Coordinate, _> = serde_json::from_str(r#"{"lat":91.0,"lon":0.0}"#);
        assert!(matches!(parsed, Err(_)));
        let parsed: Coordinate =
            serde_json::from_str(r#"{"lat":50.5,"lon":14.25}"#).expect("valid json");
        assert_eq!(parsed, Coordinate::new(50.5, 14.25).expect("valid"));
    }

    #[test]
    fn export_skips_missing_enrichment() {
        let coord = Coordinate::new(50.087_451, 14.420_671).expect("valid");
        let mut record = LocationRecord::new(coord, ServiceId(1));
        record.address = Some("Prague".to_owned());
        let json = serde_json::to_value(LocationExport::from(&record)).expect("serializable");
        assert_eq!(
            json,
            serde_json::json!({
                "lat": 50.087451,
                "lon": 14.420671,
                "sourceServiceId": 1,
                "address": "Prague"
            })
        );
    }
}
