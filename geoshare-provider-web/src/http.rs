//! `reqwest` backed [`HttpPort`] with an in-memory JSON response cache.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use tracing::{debug, trace};

use geoshare_core::{GeoError, HttpConfig, HttpPort, PortError};

/// A cached JSON body with its expiry.
struct CachedJson {
    value: Value,
    expires_at: Instant,
}

impl CachedJson {
    fn get(&self) -> Option<Value> {
        (Instant::now() < self.expires_at).then(|| self.value.clone())
    }
}

/// HTTP access shared by services, enrichment providers and the static map cache.
pub struct ReqwestHttp {
    client: Client,
    json_cache: RwLock<HashMap<String, CachedJson>>,
}

impl ReqwestHttp {
    /// Wrap an existing client.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self {
            client,
            json_cache: RwLock::new(HashMap::new()),
        }
    }

    /// Build a client from the configured user agent and request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::Port`] when the TLS backend cannot be initialized.
    pub fn from_config(config: &HttpConfig) -> Result<Self, GeoError> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(PortError::from)?;
        Ok(Self::new(client))
    }

    fn cached(&self, url: &str) -> Option<Value> {
        self.json_cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(url)
            .and_then(CachedJson::get)
    }

    fn remember(&self, url: &str, value: &Value, ttl: Duration) {
        let mut cache = self.json_cache.write().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        cache.retain(|_, entry| entry.expires_at > now);
        cache.insert(
            url.to_owned(),
            CachedJson {
                value: value.clone(),
                expires_at: now + ttl,
            },
        );
    }
}

#[async_trait]
impl HttpPort for ReqwestHttp {
    async fn fetch_json(
        &self,
        url: &str,
        cache_ttl: Option<Duration>,
        headers: &[(&str, &str)],
    ) -> Result<Value, PortError> {
        let ttl = cache_ttl.filter(|ttl| !ttl.is_zero());
        if ttl.is_some() {
            if let Some(value) = self.cached(url) {
                trace!(url = redact(url), "json cache hit");
                return Ok(value);
            }
        }

        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        let value: Value = send(request).await?.json().await?;

        if let Some(ttl) = ttl {
            self.remember(url, &value, ttl);
        }
        Ok(value)
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, PortError> {
        debug!(url = redact(url), "downloading");
        let body = send(self.client.get(url)).await?.bytes().await?;
        Ok(body.to_vec())
    }
}

// Send a request and turn non-success statuses into errors.
async fn send(request: RequestBuilder) -> Result<Response, PortError> {
    let response = request.send().await.map_err(|err| {
        if err.is_timeout() {
            PortError::Timeout
        } else {
            PortError::from(err)
        }
    })?;
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(PortError::Status(status.as_u16()))
    }
}

/// URL without its query, which may carry API keys.
fn redact(url: &str) -> &str {
    url.split_once('?').map_or(url, |(base, _)| base)
}
