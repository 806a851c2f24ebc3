//! Tunables passed explicitly into the engine, enrichment pipeline and static map proxy.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::collection::Equivalence;
use crate::error::GeoError;
use crate::model::{DEFAULT_PRECISION, MAX_PRECISION};
use crate::staticmap::{ImageFormat, RenderOptions};

const DEFAULT_JSON_CACHE_TTL_SECS: u64 = 86_400;
const DEFAULT_FAN_OUT: usize = 8;
const DEFAULT_CALL_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_OVERALL_TIMEOUT_MS: u64 = 15_000;
const DEFAULT_RENDER_TIMEOUT_MS: u64 = 20_000;
const DEFAULT_MAP_SIZE: u32 = 600;
const DEFAULT_BASE_URL: &str = "http://localhost:8080";
const DEFAULT_USER_AGENT: &str = "geoshare/0.1";
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
/// Complete geoshare configuration.
pub struct GeoshareConfig {
    /// Detection and dedup settings.
    pub detection: DetectionConfig,
    /// Enrichment fan-out and deadlines.
    pub enrichment: EnrichmentConfig,
    /// Static map cache settings.
    pub static_map: StaticMapConfig,
    /// Third-party credentials.
    pub keys: ApiKeys,
    /// Outgoing HTTP settings.
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
/// Detection and dedup settings.
pub struct DetectionConfig {
    /// Decimal digits compared when deduplicating.
    pub precision: u8,
    /// Whether identical coordinates from different services collapse.
    pub equivalence: Equivalence,
    /// Cache TTL requested for JSON lookups; zero disables caching.
    pub json_cache_ttl_secs: u64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            precision: DEFAULT_PRECISION,
            equivalence: Equivalence::default(),
            json_cache_ttl_secs: DEFAULT_JSON_CACHE_TTL_SECS,
        }
    }
}

impl DetectionConfig {
    /// JSON cache TTL, `None` when disabled.
    #[must_use]
    pub fn json_cache_ttl(&self) -> Option<Duration> {
        (self.json_cache_ttl_secs > 0).then(|| Duration::from_secs(self.json_cache_ttl_secs))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
/// Enrichment fan-out and deadlines.
pub struct EnrichmentConfig {
    /// Maximum provider calls in flight.
    pub fan_out: usize,
    /// Deadline for a single provider call.
    pub call_timeout_ms: u64,
    /// Deadline for a whole `enrich` call.
    pub overall_timeout_ms: u64,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            fan_out: DEFAULT_FAN_OUT,
            call_timeout_ms: DEFAULT_CALL_TIMEOUT_MS,
            overall_timeout_ms: DEFAULT_OVERALL_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
/// Static map cache settings.
pub struct StaticMapConfig {
    /// Directory holding rendered images and the entry index.
    pub cache_dir: PathBuf,
    /// Decimal digits markers are rounded to before hashing.
    pub cache_precision: u8,
    /// Public base URL of the static map endpoint.
    pub base_url: String,
    /// Deadline for one render.
    pub render_timeout_ms: u64,
    /// Default image width in pixels.
    pub width: u32,
    /// Default image height in pixels.
    pub height: u32,
    /// Default image format.
    pub format: ImageFormat,
}

impl Default for StaticMapConfig {
    fn default() -> Self {
        Self {
            cache_dir: env::temp_dir().join("geoshare-static-maps"),
            cache_precision: DEFAULT_PRECISION,
            base_url: DEFAULT_BASE_URL.to_owned(),
            render_timeout_ms: DEFAULT_RENDER_TIMEOUT_MS,
            width: DEFAULT_MAP_SIZE,
            height: DEFAULT_MAP_SIZE,
            format: ImageFormat::Png,
        }
    }
}

impl StaticMapConfig {
    /// Render options built from the configured defaults.
    #[must_use]
    pub fn default_options(&self) -> RenderOptions {
        RenderOptions {
            width: self.width,
            height: self.height,
            format: self.format,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
/// Third-party credentials. Missing keys disable the matching feature.
pub struct ApiKeys {
    /// Bing Maps key for static maps.
    pub bing_maps: Option<String>,
    /// Foursquare client id for venue lookups.
    pub foursquare_client_id: Option<String>,
    /// Foursquare client secret for venue lookups.
    pub foursquare_client_secret: Option<String>,
    /// GeoNames account for timezone lookups.
    pub geonames_username: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
/// Outgoing HTTP settings.
pub struct HttpConfig {
    /// User agent sent with every request.
    pub user_agent: String,
    /// Per-request timeout.
    pub request_timeout_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

impl GeoshareConfig {
    /// Parse a TOML document. Missing sections fall back to defaults.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::Config`] for malformed TOML or invalid values.
    pub fn from_toml_str(source: &str) -> Result<Self, GeoError> {
        let config: Self = toml::from_str(source).map_err(|err| GeoError::Config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file and apply `GEOSHARE_*` environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::Io`] when the file cannot be read and
    /// [`GeoError::Config`] when its content is invalid.
    pub fn load(path: &Path) -> Result<Self, GeoError> {
        let source = fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&source)?;
        config.apply_env()?;
        Ok(config)
    }

    /// Apply overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::Config`] when a variable does not parse.
    pub fn apply_env(&mut self) -> Result<(), GeoError> {
        self.apply_env_with(|name| env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::Config`] when a variable does not parse.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<(), GeoError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("GEOSHARE_PRECISION") {
            self.detection.precision = parse_var("GEOSHARE_PRECISION", &value)?;
        }
        if let Some(value) = lookup("GEOSHARE_FAN_OUT") {
            self.enrichment.fan_out = parse_var("GEOSHARE_FAN_OUT", &value)?;
        }
        if let Some(value) = lookup("GEOSHARE_CACHE_DIR") {
            self.static_map.cache_dir = PathBuf::from(value);
        }
        if let Some(value) = lookup("GEOSHARE_BASE_URL") {
            self.static_map.base_url = value;
        }
        if let Some(value) = lookup("GEOSHARE_BING_MAPS_KEY") {
            self.keys.bing_maps = Some(value);
        }
        if let Some(value) = lookup("GEOSHARE_FOURSQUARE_CLIENT_ID") {
            self.keys.foursquare_client_id = Some(value);
        }
        if let Some(value) = lookup("GEOSHARE_FOURSQUARE_CLIENT_SECRET") {
            self.keys.foursquare_client_secret = Some(value);
        }
        if let Some(value) = lookup("GEOSHARE_GEONAMES_USERNAME") {
            self.keys.geonames_username = Some(value);
        }
        self.validate()
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::Config`] describing the first invalid value.
    pub fn validate(&self) -> Result<(), GeoError> {
        if self.detection.precision > MAX_PRECISION {
            return Err(GeoError::Config(format!(
                "detection.precision must be at most {MAX_PRECISION}"
            )));
        }
        if self.static_map.cache_precision > MAX_PRECISION {
            return Err(GeoError::Config(format!(
                "static_map.cache_precision must be at most {MAX_PRECISION}"
            )));
        }
        if self.enrichment.fan_out == 0 {
            return Err(GeoError::Config("enrichment.fan_out must be at least 1".into()));
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, GeoError> {
    value
        .trim()
        .parse()
        .map_err(|_| GeoError::Config(format!("{name} has invalid value {value:?}")))
}
