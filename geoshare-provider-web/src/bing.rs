//! Bing Maps static imagery.

use geoshare_core::{Coordinate, GeoError, RenderOptions, StaticMapProvider};

const BASE_URL: &str = "https://dev.virtualearth.net/REST/v1/Imagery/Map/Road";

/// Default pushpin style.
const PUSHPIN_STYLE: u8 = 66;

/// Bing accepts at most this many pushpins on a GET request.
const MAX_MARKERS: usize = 100;

/// Static map images from Bing Maps. The URL carries the API key.
pub struct BingStaticMaps {
    api_key: String,
}

impl BingStaticMaps {
    /// Create the provider with a Bing Maps key.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
        }
    }
}

impl StaticMapProvider for BingStaticMaps {
    fn name(&self) -> &str {
        "bing"
    }

    fn private_url(
        &self,
        markers: &[Coordinate],
        options: &RenderOptions,
    ) -> Result<String, GeoError> {
        if markers.is_empty() {
            return Err(GeoError::InvalidInput("static map needs at least one marker".into()));
        }
        if markers.len() > MAX_MARKERS {
            return Err(GeoError::not_supported(format!(
                "Bing renders at most {MAX_MARKERS} markers, got {}",
                markers.len()
            )));
        }
        if !(80..=2000).contains(&options.width) || !(80..=1500).contains(&options.height) {
            return Err(GeoError::InvalidInput(format!(
                "map size {}x{} is outside 80x80..2000x1500",
                options.width, options.height
            )));
        }

        let pushpins: Vec<String> = markers
            .iter()
            .zip(1..)
            .map(|(marker, number)| {
                format!(
                    "pp={:.6},{:.6};{PUSHPIN_STYLE};{number}",
                    marker.lat(),
                    marker.lon()
                )
            })
            .collect();
        Ok(format!(
            "{BASE_URL}?mapSize={},{}&format={}&key={}&{}",
            options.width,
            options.height,
            options.format,
            self.api_key,
            pushpins.join("&")
        ))
    }
}

#[cfg(test)]
mod tests {
    use geoshare_core::ImageFormat;

    use super::*;

    fn options() -> RenderOptions {
        RenderOptions {
            width: 600,
            height: 400,
            format: ImageFormat::Jpeg,
        }
    }

    #[test]
    fn markers_are_numbered_in_order() {
        let markers = [
            Coordinate::new(50.087_451, 14.420_671).expect("valid"),
            Coordinate::new(-33.8568, 151.2153).expect("valid"),
        ];
        let url = BingStaticMaps::new("k").private_url(&markers, &options()).expect("url");
        assert_eq!(
            url,
            "https://dev.virtualearth.net/REST/v1/Imagery/Map/Road?mapSize=600,400&format=jpeg&key=k\
             &pp=50.087451,14.420671;66;1&pp=-33.856800,151.215300;66;2"
        );
    }

    #[test]
    fn limits_are_enforced() {
        let provider = BingStaticMaps::new("k");
        assert!(matches!(
            provider.private_url(&[], &options()),
            Err(GeoError::InvalidInput(_))
        ));
        let many = vec![Coordinate::new(1.0, 2.0).expect("valid"); MAX_MARKERS + 1];
        assert!(matches!(
            provider.private_url(&many, &options()),
            Err(GeoError::NotSupported(_))
        ));
        let huge = RenderOptions {
            width: 4000,
            ..options()
        };
        assert!(matches!(
            provider.private_url(&many[..1], &huge),
            Err(GeoError::InvalidInput(_))
        ));
    }
}
