//! On-disk cache in front of paid static map providers.
//!
//! A marker set is identified by a [`CacheId`], a SHA-256 fingerprint of the
//! provider, render options and rounded markers. Rendered images are written
//! once under that id and served from disk afterwards. Concurrent requests for
//! the same id share a single render. Registered but not yet rendered marker
//! sets are kept in `pending.json` so another process can serve them.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::StaticMapConfig;
use crate::error::GeoError;
use crate::model::Coordinate;
use crate::ports::{HttpPort, StaticMapProvider};

const INDEX_FILE: &str = "index.json";
const PENDING_FILE: &str = "pending.json";
const CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// Image encoding requested from the provider.
pub enum ImageFormat {
    /// PNG image.
    #[default]
    Png,
    /// JPEG image.
    Jpeg,
}

impl ImageFormat {
    /// File extension used for cached files.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpg",
        }
    }

    /// MIME type served for cached files.
    #[must_use]
    pub fn content_type(self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpeg",
        };
        formatter.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Provider-independent render settings, part of the cache identity.
pub struct RenderOptions {
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Image encoding.
    pub format: ImageFormat,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
/// Hex SHA-256 fingerprint identifying one rendered marker set.
pub struct CacheId(String);

impl CacheId {
    /// Validate an id received from outside, e.g. an HTTP request.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::InvalidInput`] unless `raw` is 64 lowercase hex digits.
    pub fn parse(raw: &str) -> Result<Self, GeoError> {
        let valid = raw.len() == 64
            && raw
                .chars()
                .all(|ch| ch.is_ascii_digit() || ('a'..='f').contains(&ch));
        if valid {
            Ok(Self(raw.to_owned()))
        } else {
            Err(GeoError::InvalidInput(format!("malformed static map id {raw:?}")))
        }
    }

    /// Hex representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

/// Fingerprint a marker set.
///
/// Markers are rounded to `precision` decimals and hashed in order, so
/// permuting them yields a different id.
#[must_use]
pub fn identity_for(
    markers: &[Coordinate],
    provider_name: &str,
    options: &RenderOptions,
    precision: u8,
) -> CacheId {
    let mut hasher = Sha256::new();
    hasher.update(format!("provider={provider_name}\n").as_bytes());
    hasher.update(format!("size={}x{}\n", options.width, options.height).as_bytes());
    hasher.update(format!("format={}\n", options.format).as_bytes());
    for marker in markers {
        hasher.update(format!("marker={}\n", marker.key(precision)).as_bytes());
    }
    CacheId(hex::encode(hasher.finalize()))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// A rendered image stored in the cache directory.
pub struct CacheEntry {
    /// Identity the image was rendered for.
    pub id: CacheId,
    /// Location of the image file.
    pub path: PathBuf,
    /// When the image was rendered.
    pub created_at: DateTime<Utc>,
    /// Provider that rendered it.
    pub provider: String,
    /// Image encoding.
    pub format: ImageFormat,
}

#[derive(Debug, Clone)]
/// Output of a render function.
pub struct RenderedImage {
    /// Encoded image.
    pub bytes: Vec<u8>,
    /// Encoding of `bytes`.
    pub format: ImageFormat,
    /// Provider that produced the image.
    pub provider: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PendingRender {
    id: CacheId,
    provider: String,
    markers: Vec<Coordinate>,
    options: RenderOptions,
}

#[derive(Debug)]
/// Answer of the static map endpoint.
pub enum StaticMapResponse {
    /// Cached image.
    Image {
        /// Encoded image.
        bytes: Vec<u8>,
        /// MIME type.
        content_type: &'static str,
        /// `Cache-Control` header value.
        cache_control: &'static str,
    },
    /// The id is malformed or was never registered.
    NotFound,
    /// Rendering failed.
    Failed,
}

/// Cache of rendered static maps keyed by [`CacheId`].
pub struct StaticMapCacheProxy {
    config: StaticMapConfig,
    providers: HashMap<String, Arc<dyn StaticMapProvider>>,
    index: Mutex<HashMap<CacheId, CacheEntry>>,
    pending: Mutex<HashMap<CacheId, PendingRender>>,
    flights: Mutex<HashMap<CacheId, Arc<tokio::sync::Mutex<()>>>>,
    index_write: tokio::sync::Mutex<()>,
    pending_write: tokio::sync::Mutex<()>,
}

impl StaticMapCacheProxy {
    /// Open (or create) the cache directory and load its entry index and
    /// pending registrations.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::Io`] when the directory cannot be created.
    pub fn open(config: StaticMapConfig) -> Result<Self, GeoError> {
        std::fs::create_dir_all(&config.cache_dir)?;
        let index: HashMap<CacheId, CacheEntry> = load_json(&config.cache_dir.join(INDEX_FILE))
            .into_iter()
            .map(|entry: CacheEntry| (entry.id.clone(), entry))
            .collect();
        let pending: HashMap<CacheId, PendingRender> = load_json(&config.cache_dir.join(PENDING_FILE))
            .into_iter()
            .filter(|request: &PendingRender| !index.contains_key(&request.id))
            .map(|request| (request.id.clone(), request))
            .collect();
        debug!(
            entries = index.len(),
            pending = pending.len(),
            dir = %config.cache_dir.display(),
            "static map cache opened"
        );
        Ok(Self {
            config,
            providers: HashMap::new(),
            index: Mutex::new(index),
            pending: Mutex::new(pending),
            flights: Mutex::new(HashMap::new()),
            index_write: tokio::sync::Mutex::new(()),
            pending_write: tokio::sync::Mutex::new(()),
        })
    }

    /// Make a provider available to [`StaticMapCacheProxy::register`].
    #[must_use]
    pub fn with_provider(mut self, provider: Arc<dyn StaticMapProvider>) -> Self {
        self.providers.insert(provider.name().to_owned(), provider);
        self
    }

    /// Render options from the configured defaults.
    #[must_use]
    pub fn default_options(&self) -> RenderOptions {
        self.config.default_options()
    }

    /// Fingerprint a marker set at the configured cache precision.
    #[must_use]
    pub fn identity_for(
        &self,
        markers: &[Coordinate],
        provider_name: &str,
        options: &RenderOptions,
    ) -> CacheId {
        identity_for(markers, provider_name, options, self.config.cache_precision)
    }

    /// Look up an entry in the index without touching the disk.
    #[must_use]
    pub fn resolve(&self, id: &CacheId) -> Option<CacheEntry> {
        self.index
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Public URL of the endpoint serving `id`.
    #[must_use]
    pub fn public_url(&self, id: &CacheId) -> String {
        format!(
            "{}/api/staticmap?id={id}",
            self.config.base_url.trim_end_matches('/')
        )
    }

    async fn cached(&self, id: &CacheId) -> Option<CacheEntry> {
        let entry = self.resolve(id)?;
        fs::try_exists(&entry.path)
            .await
            .unwrap_or(false)
            .then_some(entry)
    }

    /// Return the cached entry for `id`, rendering it first when missing.
    ///
    /// Only one render per id runs at a time; concurrent callers wait and
    /// reuse its result. The image is written to a temporary file and moved
    /// into place, so a failed render leaves neither a file nor an entry.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::RenderFailed`] when `render` fails or times out and
    /// [`GeoError::Io`] when the image cannot be stored.
    pub async fn ensure_rendered<F, Fut>(&self, id: &CacheId, render: F) -> Result<CacheEntry, GeoError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<RenderedImage, GeoError>>,
    {
        if let Some(entry) = self.cached(id).await {
            return Ok(entry);
        }

        let flight = self.flight(id);
        let guard = flight.lock().await;
        let result = self.render_locked(id, render).await;
        drop(guard);
        self.release(id, &flight);
        result
    }

    async fn render_locked<F, Fut>(&self, id: &CacheId, render: F) -> Result<CacheEntry, GeoError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<RenderedImage, GeoError>>,
    {
        if let Some(entry) = self.cached(id).await {
            debug!(%id, "static map rendered by a concurrent request");
            return Ok(entry);
        }

        let limit = Duration::from_millis(self.config.render_timeout_ms);
        let image = match timeout(limit, render()).await {
            Ok(Ok(image)) => image,
            Ok(Err(GeoError::RenderFailed(reason))) => return Err(GeoError::RenderFailed(reason)),
            Ok(Err(err)) => return Err(GeoError::RenderFailed(err.to_string())),
            Err(_) => return Err(GeoError::RenderFailed(format!("timed out after {limit:?}"))),
        };
        if image.bytes.is_empty() {
            return Err(GeoError::RenderFailed("provider returned an empty image".into()));
        }

        let entry = self.store(id, image).await?;
        info!(%id, provider = %entry.provider, "static map rendered");
        Ok(entry)
    }

    async fn store(&self, id: &CacheId, image: RenderedImage) -> Result<CacheEntry, GeoError> {
        let file_name = format!("{id}.{}", image.format.extension());
        let path = self.config.cache_dir.join(&file_name);
        write_atomically(&path, &image.bytes).await?;

        let entry = CacheEntry {
            id: id.clone(),
            path,
            created_at: Utc::now(),
            provider: image.provider,
            format: image.format,
        };
        self.index
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone(), entry.clone());
        self.persist_index().await;

        let registered = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
            .is_some();
        if registered && let Err(err) = self.persist_pending().await {
            warn!(%id, error = %err, "failed to persist pending static maps");
        }
        Ok(entry)
    }

    async fn persist_pending(&self) -> Result<(), GeoError> {
        let _writer = self.pending_write.lock().await;
        let snapshot: Vec<PendingRender> = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        let bytes = serde_json::to_vec_pretty(&snapshot).map_err(|err| GeoError::Config(err.to_string()))?;
        write_atomically(&self.config.cache_dir.join(PENDING_FILE), &bytes).await
    }

    #[cfg(test)]
    fn pending_len(&self) -> usize {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    async fn persist_index(&self) {
        let _writer = self.index_write.lock().await;
        let snapshot: Vec<CacheEntry> = self
            .index
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        let written = match serde_json::to_vec_pretty(&snapshot) {
            Ok(bytes) => write_atomically(&self.config.cache_dir.join(INDEX_FILE), &bytes).await,
            Err(err) => Err(GeoError::Config(err.to_string())),
        };
        if let Err(err) = written {
            // The image is already on disk; the entry only lives in memory until the next write.
            warn!(error = %err, "failed to persist static map index");
        }
    }

    fn flight(&self, id: &CacheId) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(
            self.flights
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .entry(id.clone())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
        )
    }

    fn release(&self, id: &CacheId, flight: &Arc<tokio::sync::Mutex<()>>) {
        let mut flights = self.flights.lock().unwrap_or_else(PoisonError::into_inner);
        if Arc::strong_count(flight) <= 2 {
            flights.remove(id);
        }
    }

    /// Remember a marker set so the endpoint can render it lazily, possibly
    /// from another process opening the same cache directory.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::InvalidInput`] for an empty marker list,
    /// [`GeoError::NotSupported`] for an unknown provider and [`GeoError::Io`]
    /// when the registration cannot be saved.
    pub async fn register(
        &self,
        markers: &[Coordinate],
        provider_name: &str,
        options: RenderOptions,
    ) -> Result<CacheId, GeoError> {
        if markers.is_empty() {
            return Err(GeoError::InvalidInput("static map needs at least one marker".into()));
        }
        if !self.providers.contains_key(provider_name) {
            return Err(GeoError::not_supported(format!(
                "static map provider {provider_name:?} is not configured"
            )));
        }
        let id = self.identity_for(markers, provider_name, &options);
        if self.resolve(&id).is_some() {
            return Ok(id);
        }
        let added = {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            if pending.contains_key(&id) {
                false
            } else {
                pending.insert(
                    id.clone(),
                    PendingRender {
                        id: id.clone(),
                        provider: provider_name.to_owned(),
                        markers: markers.to_vec(),
                        options,
                    },
                );
                true
            }
        };
        if added {
            self.persist_pending().await?;
        }
        Ok(id)
    }

    /// Render a registered id through its provider, or return the cached image.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::InvalidInput`] for an id that is neither cached nor
    /// registered, otherwise the errors of [`StaticMapCacheProxy::ensure_rendered`].
    pub async fn render(&self, id: &CacheId, http: &dyn HttpPort) -> Result<CacheEntry, GeoError> {
        if let Some(entry) = self.cached(id).await {
            return Ok(entry);
        }
        let pending = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
            .ok_or_else(|| GeoError::InvalidInput(format!("unknown static map {id}")))?;
        self.ensure_rendered(id, || self.download(pending, http)).await
    }

    /// Register a marker set and render it right away.
    ///
    /// # Errors
    ///
    /// See [`StaticMapCacheProxy::register`] and [`StaticMapCacheProxy::render`].
    pub async fn render_markers(
        &self,
        markers: &[Coordinate],
        provider_name: &str,
        options: RenderOptions,
        http: &dyn HttpPort,
    ) -> Result<CacheEntry, GeoError> {
        let id = self.register(markers, provider_name, options).await?;
        self.render(&id, http).await
    }

    async fn download(&self, pending: PendingRender, http: &dyn HttpPort) -> Result<RenderedImage, GeoError> {
        let provider = self.providers.get(&pending.provider).ok_or_else(|| {
            GeoError::RenderFailed(format!("provider {} is gone", pending.provider))
        })?;
        let url = provider.private_url(&pending.markers, &pending.options)?;
        let bytes = http
            .fetch_bytes(&url)
            .await
            .map_err(|err| GeoError::RenderFailed(err.to_string()))?;
        Ok(RenderedImage {
            bytes,
            format: pending.options.format,
            provider: pending.provider,
        })
    }

    /// Answer a static map request carrying an opaque id.
    pub async fn serve(&self, raw_id: &str, http: &dyn HttpPort) -> StaticMapResponse {
        let Ok(id) = CacheId::parse(raw_id) else {
            return StaticMapResponse::NotFound;
        };
        let known = self.resolve(&id).is_some()
            || self
                .pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .contains_key(&id);
        if !known {
            return StaticMapResponse::NotFound;
        }

        let entry = match self.render(&id, http).await {
            Ok(entry) => entry,
            Err(err) => {
                warn!(%id, error = %err, "static map request failed");
                return StaticMapResponse::Failed;
            }
        };
        match fs::read(&entry.path).await {
            Ok(bytes) => StaticMapResponse::Image {
                bytes,
                content_type: entry.format.content_type(),
                cache_control: CACHE_CONTROL,
            },
            Err(err) => {
                warn!(%id, error = %err, "cached static map is unreadable");
                StaticMapResponse::Failed
            }
        }
    }
}

fn load_json<T: DeserializeOwned>(path: &Path) -> Vec<T> {
    let Ok(raw) = std::fs::read(path) else {
        return Vec::new();
    };
    serde_json::from_slice(&raw).unwrap_or_else(|err| {
        warn!(error = %err, path = %path.display(), "ignoring unreadable static map file");
        Vec::new()
    })
}

async fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), GeoError> {
    let mut partial = path.as_os_str().to_owned();
    partial.push(".part");
    let partial = PathBuf::from(partial);

    let written = match fs::write(&partial, bytes).await {
        Ok(()) => fs::rename(&partial, path).await,
        Err(err) => Err(err),
    };
    if let Err(err) = written {
        let _removed = fs::remove_file(&partial).await;
        return Err(err.into());
    }
    Ok(())
}
