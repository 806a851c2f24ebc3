//! Bing rendering through the static map cache.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use geoshare_core::{
    Coordinate, HttpPort, ImageFormat, PortError, RenderOptions, StaticMapCacheProxy,
    StaticMapConfig, StaticMapResponse,
};
use geoshare_provider_web::BingStaticMaps;

const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

#[derive(Default)]
struct ImageHttp {
    requested: Mutex<Vec<String>>,
}

impl ImageHttp {
    fn requested(&self) -> Vec<String> {
        self.requested
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl HttpPort for ImageHttp {
    async fn fetch_json(
        &self,
        _url: &str,
        _cache_ttl: Option<Duration>,
        _headers: &[(&str, &str)],
    ) -> Result<Value, PortError> {
        Err(PortError::Internal("json is not served here".into()))
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, PortError> {
        self.requested
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(url.to_owned());
        Ok(PNG.to_vec())
    }
}

fn proxy(dir: &Path) -> StaticMapCacheProxy {
    let config = StaticMapConfig {
        cache_dir: dir.to_path_buf(),
        base_url: "https://geo.example".to_owned(),
        ..StaticMapConfig::default()
    };
    StaticMapCacheProxy::open(config)
        .expect("cache dir")
        .with_provider(Arc::new(BingStaticMaps::new("k")))
}

fn options() -> RenderOptions {
    RenderOptions {
        width: 600,
        height: 600,
        format: ImageFormat::Png,
    }
}

#[tokio::test]
async fn bing_render_is_fetched_once_and_served_from_disk() {
    let dir = tempfile::tempdir().expect("tempdir");
    let proxy = proxy(dir.path());
    let http = ImageHttp::default();
    let markers = [Coordinate::new(1.0, 2.0).expect("valid")];

    let id = proxy.register(&markers, "bing", options()).await.expect("registered");
    assert_eq!(id, proxy.register(&markers, "bing", options()).await.expect("registered"));
    assert_eq!(
        id.as_str(),
        "4aeb3a60b3d52c81492e366e8d1978341cf4cdd4d85c1b88e915fff420bda41d"
    );
    assert_eq!(
        proxy.public_url(&id),
        format!("https://geo.example/api/staticmap?id={id}")
    );
    assert!(!proxy.public_url(&id).contains("key="));

    let first = proxy.serve(id.as_str(), &http).await;
    let second = proxy.serve(id.as_str(), &http).await;
    for response in [first, second] {
        match response {
            StaticMapResponse::Image {
                bytes,
                content_type,
                ..
            } => {
                assert_eq!(bytes, PNG);
                assert_eq!(content_type, "image/png");
            }
            other => panic!("expected an image, got {other:?}"),
        }
    }

    assert_eq!(
        http.requested(),
        vec![
            "https://dev.virtualearth.net/REST/v1/Imagery/Map/Road?mapSize=600,600&format=png&key=k\
             &pp=1.000000,2.000000;66;1"
                .to_owned()
        ]
    );
}

#[tokio::test]
async fn unknown_ids_are_not_rendered() {
    let dir = tempfile::tempdir().expect("tempdir");
    let proxy = proxy(dir.path());
    let http = ImageHttp::default();

    let missing = proxy.serve(&"0".repeat(64), &http).await;
    assert!(matches!(missing, StaticMapResponse::NotFound));
    let malformed = proxy.serve("../index.json", &http).await;
    assert!(matches!(malformed, StaticMapResponse::NotFound));
    assert!(http.requested().is_empty());
}

#[tokio::test]
async fn registration_from_one_process_is_rendered_by_another() {
    let dir = tempfile::tempdir().expect("tempdir");
    let markers = [Coordinate::new(1.0, 2.0).expect("valid")];
    let id = proxy(dir.path())
        .register(&markers, "bing", options())
        .await
        .expect("registered");

    let http = ImageHttp::default();
    let server = proxy(dir.path());
    assert!(matches!(
        server.serve(id.as_str(), &http).await,
        StaticMapResponse::Image { .. }
    ));
    assert_eq!(http.requested().len(), 1);
}
