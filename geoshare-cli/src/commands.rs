//! Subcommand handlers. Results go to stdout, diagnostics to the log.

use std::fmt::Display;
use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use serde_json::json;
use tracing::{debug, info};

use geoshare_core::{
    Coordinate, DetectionEngine, DetectionInput, EnrichKind, EnrichmentPipeline, GeoError,
    GeoshareConfig, HttpPort, LinkOptions, LocationCollection, LocationExport, Service, ServiceId,
    ServiceRegistry, ServiceTag, SharedLocation, StaticMapCacheProxy,
};
use geoshare_provider_web::{ReqwestHttp, enrichment_providers, static_map_providers};
use geoshare_services::default_registry;

use crate::cli::{CoordinateArgs, DetectArgs, LinkArgs, StaticMapArgs, TextArgs};

fn emit(line: impl Display) -> Result<()> {
    writeln!(io::stdout().lock(), "{line}")?;
    Ok(())
}

fn http(config: &GeoshareConfig) -> Result<Arc<dyn HttpPort>> {
    let http = ReqwestHttp::from_config(&config.http).context("failed to build HTTP client")?;
    Ok(Arc::new(http))
}

fn registry(config: &GeoshareConfig) -> Result<ServiceRegistry> {
    default_registry(&config.keys).context("failed to register services")
}

/// Parse `LAT,LON`.
fn parse_coordinate(raw: &str) -> Result<Coordinate> {
    let Some((lat, lon)) = raw.split_once(',') else {
        bail!("expected LAT,LON, got {raw:?}");
    };
    let lat: f64 = lat.trim().parse().with_context(|| format!("bad latitude in {raw:?}"))?;
    let lon: f64 = lon.trim().parse().with_context(|| format!("bad longitude in {raw:?}"))?;
    Ok(Coordinate::new(lat, lon)?)
}

fn coordinate(args: &CoordinateArgs) -> Result<Coordinate> {
    Ok(Coordinate::new(args.lat, args.lon)?)
}

/// Services a render command applies to: the one asked for, or every service tagged `tag`.
fn targets<'reg>(
    registry: &'reg ServiceRegistry,
    only: Option<u32>,
    tag: ServiceTag,
) -> Result<Vec<&'reg Arc<dyn Service>>> {
    match only {
        Some(id) => {
            let service = registry.by_id(ServiceId(id))?;
            if !service.meta().has_tag(tag) {
                bail!("service {id} ({}) does not support {tag:?}", service.meta().name);
            }
            Ok(vec![service])
        }
        None => Ok(registry.by_tag(tag).collect()),
    }
}

fn link_lines(
    registry: &ServiceRegistry,
    coordinate: &Coordinate,
    only: Option<u32>,
    drive: bool,
    options: &LinkOptions,
) -> Result<Vec<String>> {
    let mut lines = Vec::new();
    for service in targets(registry, only, ServiceTag::GenerateLink)? {
        let meta = service.meta();
        match service.link(coordinate, drive, options) {
            Ok(link) => lines.push(format!("{}\t{}\t{link}", meta.id, meta.name)),
            // only an explicitly chosen service turns this into an error
            Err(GeoError::NotSupported(reason)) if only.is_none() => {
                debug!(service = %meta.id, %reason, "skipping service");
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(lines)
}

fn text_lines(registry: &ServiceRegistry, coordinate: &Coordinate, only: Option<u32>) -> Result<Vec<String>> {
    Ok(targets(registry, only, ServiceTag::GenerateText)?
        .into_iter()
        .filter_map(|service| {
            let meta = service.meta();
            service
                .share_text(coordinate)
                .map(|text| format!("{}\t{}\t{text}", meta.id, meta.name))
        })
        .collect())
}

fn route_links(registry: &ServiceRegistry, collection: &LocationCollection) -> Vec<serde_json::Value> {
    registry
        .by_tag(ServiceTag::GenerateCollectionLink)
        .filter_map(|service| {
            let meta = service.meta();
            service
                .collection_link(collection)
                .map(|link| json!({"serviceId": meta.id.0, "name": meta.name, "link": link}))
        })
        .collect()
}

pub(crate) async fn detect(config: &GeoshareConfig, args: DetectArgs) -> Result<()> {
    let text = if args.text.is_empty() && args.shared.is_none() {
        io::read_to_string(io::stdin()).context("failed to read stdin")?
    } else {
        args.text.join(" ")
    };
    let mut input = DetectionInput::new(text);
    if let Some(raw) = &args.shared {
        input = input.with_shared_location(SharedLocation {
            coordinate: parse_coordinate(raw)?,
            live: args.live,
        });
    }

    let http = http(config)?;
    let engine = DetectionEngine::new(Arc::new(registry(config)?), config.detection.clone())
        .with_http(Arc::clone(&http));
    let mut collection = engine.detect(&input).await;

    if !args.enrich.is_empty() {
        let kinds: Vec<EnrichKind> = args.enrich.iter().copied().map(EnrichKind::from).collect();
        let providers = enrichment_providers(&http, &config.keys, config.detection.json_cache_ttl());
        let pipeline = EnrichmentPipeline::new(providers, config.enrichment.clone());
        let summary = pipeline.enrich(&mut collection, &kinds).await;
        info!(
            completed = summary.completed,
            failed = summary.failed,
            abandoned = summary.abandoned,
            "enrichment finished"
        );
    }

    let locations: Vec<LocationExport> = collection.iter().map(LocationExport::from).collect();
    let mut output = json!({ "locations": locations });
    if args.route {
        output["routes"] = serde_json::Value::Array(route_links(engine.registry(), &collection));
    }
    emit(serde_json::to_string_pretty(&output)?)
}

pub(crate) fn link(config: &GeoshareConfig, args: &LinkArgs) -> Result<()> {
    let registry = registry(config)?;
    let options = LinkOptions { zoom: args.zoom };
    let coordinate = coordinate(&args.coordinate)?;
    for line in link_lines(&registry, &coordinate, args.coordinate.service, args.drive, &options)? {
        emit(line)?;
    }
    Ok(())
}

pub(crate) fn text(config: &GeoshareConfig, args: &TextArgs) -> Result<()> {
    let registry = registry(config)?;
    let coordinate = coordinate(&args.coordinate)?;
    for line in text_lines(&registry, &coordinate, args.coordinate.service)? {
        emit(line)?;
    }
    Ok(())
}

pub(crate) fn services(config: &GeoshareConfig) -> Result<()> {
    for meta in registry(config)?.metas() {
        let tags: Vec<String> = meta.tags.iter().map(|tag| format!("{tag:?}")).collect();
        let network = if meta.network { "network" } else { "offline" };
        emit(format!("{}\t{}\t{network}\t{}", meta.id, meta.name, tags.join(",")))?;
    }
    Ok(())
}

pub(crate) async fn static_map(config: &GeoshareConfig, args: StaticMapArgs) -> Result<()> {
    let markers = args
        .markers
        .iter()
        .map(|raw| parse_coordinate(raw))
        .collect::<Result<Vec<_>>>()?;

    let cache = StaticMapCacheProxy::open(config.static_map.clone())
        .context("failed to open static map cache")?;
    let proxy = static_map_providers(&config.keys)
        .into_iter()
        .fold(cache, StaticMapCacheProxy::with_provider);
    let mut options = proxy.default_options();
    if let Some(width) = args.width {
        options.width = width;
    }
    if let Some(height) = args.height {
        options.height = height;
    }
    if let Some(format) = args.format {
        options.format = format.into();
    }

    if args.lazy {
        let id = proxy.register(&markers, &args.provider, options).await?;
        return emit(proxy.public_url(&id));
    }

    let http = http(config)?;
    let entry = proxy
        .render_markers(&markers, &args.provider, options, http.as_ref())
        .await?;
    emit(proxy.public_url(&entry.id))?;
    emit(entry.path.display())
}
