//! Geohash links such as `http://geohash.org/u2fkbnhu9cxe`.

use geoshare_core::{
    Coordinate, DetectionContext, DetectionInput, Detector, FoundUrl, GeoError, LinkOptions,
    Service, ServiceMeta, ServiceTag,
};

use crate::scan::{Hit, UrlDetector, host_is};

const ALPHABET: &[u8; 32] = b"0123456789bcdefghjkmnpqrstuvwxyz";

/// Characters in rendered links; twelve keep the error well below 1e-6°.
const LINK_LENGTH: usize = 12;

/// Geohash encoded positions on geohash.org.
pub struct GeohashService {
    meta: ServiceMeta,
}

impl GeohashService {
    /// Create the service.
    #[must_use]
    pub fn new() -> Self {
        Self {
            meta: ServiceMeta::offline(
                6,
                "Geohash",
                &[
                    ServiceTag::GenerateLink,
                    ServiceTag::GenerateLinkShare,
                    ServiceTag::GenerateOffline,
                ],
            ),
        }
    }
}

impl Default for GeohashService {
    fn default() -> Self {
        Self::new()
    }
}

impl Service for GeohashService {
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
        _options: &LinkOptions,
    ) -> Result<String, GeoError> {
        if drive {
            return Err(GeoError::not_supported("geohash links carry no navigation intent"));
        }
        Ok(format!("http://geohash.org/{}", encode(coordinate, LINK_LENGTH)))
    }
}

/// Encode a coordinate into a geohash of `length` characters.
#[must_use]
pub fn encode(coordinate: &Coordinate, length: usize) -> String {
    let mut lat_range = (-90.0_f64, 90.0_f64);
    let mut lon_range = (-180.0_f64, 180.0_f64);
    let mut hash = String::with_capacity(length);
    let mut even = true;
    let mut bits = 0_u8;
    let mut index = 0_usize;

    while hash.len() < length {
        let (range, value) = if even {
            (&mut lon_range, coordinate.lon())
        } else {
            (&mut lat_range, coordinate.lat())
        };
        let mid = f64::midpoint(range.0, range.1);
        index <<= 1;
        if value >= mid {
            index |= 1;
            range.0 = mid;
        } else {
            range.1 = mid;
        }
        even = !even;
        bits += 1;
        if bits == 5 {
            if let Some(symbol) = ALPHABET.get(index) {
                hash.push(char::from(*symbol));
            }
            bits = 0;
            index = 0;
        }
    }
    hash
}

/// Decode a geohash to the center of its cell.
#[must_use]
pub fn decode(hash: &str) -> Option<Coordinate> {
    if hash.is_empty() || hash.len() > LINK_LENGTH {
        return None;
    }
    let mut lat_range = (-90.0_f64, 90.0_f64);
    let mut lon_range = (-180.0_f64, 180.0_f64);
    let mut even = true;

    for byte in hash.bytes() {
        let value = ALPHABET
            .iter()
            .position(|candidate| *candidate == byte.to_ascii_lowercase())?;
        for shift in (0..5).rev() {
            let range = if even { &mut lon_range } else { &mut lat_range };
            let mid = f64::midpoint(range.0, range.1);
            if (value >> shift) & 1 == 1 {
                range.0 = mid;
            } else {
                range.1 = mid;
            }
            even = !even;
        }
    }
    Coordinate::new(
        f64::midpoint(lat_range.0, lat_range.1),
        f64::midpoint(lon_range.0, lon_range.1),
    )
    .ok()
}

fn extract(url: &FoundUrl) -> Vec<Hit> {
    if !host_is(url, "geohash.org") {
        return Vec::new();
    }
    let hash = url
        .url
        .path_segments()
        .and_then(|mut segments| segments.next())
        .unwrap_or_default();
    decode(hash)
        .map(|coordinate| Hit {
            coordinate,
            label: None,
        })
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::testing::{assert_close, coord, detect};

    #[test]
    fn encodes_known_hash() {
        assert_eq!(encode(&coord(57.649_11, 10.407_44), 11), "u4pruydqqvj");
    }

    #[test]
    fn decodes_to_cell_center() {
        let decoded = decode("u4pruydqqvj").expect("valid hash");
        assert_close(&decoded, &coord(57.649_11, 10.407_44), 1e-5);
        assert!(decode("u4pa").is_none());
        assert!(decode("").is_none());
    }

    #[tokio::test]
    async fn domain_without_hash_is_not_detected() {
        let service = GeohashService::new();
        assert!(detect(&service, "https://geohash.org/").await.is_empty());
        assert!(detect(&service, "https://geohash.org/site/tips.html").await.is_empty());
    }

    #[tokio::test]
    async fn link_round_trips() {
        let service = GeohashService::new();
        let original = coord(50.087_451, 14.420_671);
        let link = service.link(&original, false, &LinkOptions::default()).expect("link");
        assert!(link.starts_with("http://geohash.org/u2fk"));
        let found = detect(&service, &link).await;
        assert_eq!(found.len(), 1);
        assert_close(&found[0], &original, 1e-6);
    }
}
