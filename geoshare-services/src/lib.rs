//! Coordinate notations and map provider URL formats recognized by geoshare.
//!
//! Use [`default_registry`] to get every format in its canonical order.

use std::sync::Arc;

use geoshare_core::{ApiKeys, GeoError, Service, ServiceRegistry};

/// Plain decimal degrees.
pub mod degrees;
/// Degrees with decimal minutes.
pub mod degrees_minutes;
/// Degrees, minutes and seconds.
pub mod dms;
/// Fixed-width DMS without separators.
pub mod dms_compact;
/// Foursquare venues (network lookup).
pub mod foursquare;
/// `geo:` URIs.
pub mod geo_uri;
/// geohash.org links.
pub mod geohash;
/// Google Maps links.
pub mod google;
/// Ingress Intel links.
pub mod ingress;
/// MapTiler links.
pub mod maptiler;
/// Mapy.com links.
pub mod mapy;
/// OpenStreetMap links.
pub mod osm;
mod scan;
/// Locations shared as message attachments.
pub mod telegram;
/// Waze links.
pub mod waze;

pub use degrees::DegreesService;
pub use degrees_minutes::DegreesMinutesService;
pub use dms::DmsService;
pub use dms_compact::DmsCompactService;
pub use foursquare::{FoursquareCredentials, FoursquareService};
pub use geo_uri::GeoUriService;
pub use geohash::GeohashService;
pub use google::GoogleMapsService;
pub use ingress::IngressService;
pub use maptiler::MapTilerService;
pub use mapy::MapyService;
pub use osm::OpenStreetMapService;
pub use telegram::TelegramLocationService;
pub use waze::WazeService;

/// Every service in registration order, which is also the output order of detection.
#[must_use]
pub fn default_services(keys: &ApiKeys) -> Vec<Arc<dyn Service>> {
    let foursquare = keys
        .foursquare_client_id
        .clone()
        .zip(keys.foursquare_client_secret.clone())
        .map(|(client_id, client_secret)| FoursquareCredentials {
            client_id,
            client_secret,
        });
    vec![
        Arc::new(TelegramLocationService::new()),
        Arc::new(DegreesService::new()),
        Arc::new(DegreesMinutesService::new()),
        Arc::new(DmsService::new()),
        Arc::new(DmsCompactService::new()),
        Arc::new(GeoUriService::new()),
        Arc::new(GeohashService::new()),
        Arc::new(GoogleMapsService::new()),
        Arc::new(OpenStreetMapService::new()),
        Arc::new(MapyService::new()),
        Arc::new(WazeService::new()),
        Arc::new(IngressService::new()),
        Arc::new(MapTilerService::new()),
        Arc::new(FoursquareService::new(foursquare)),
    ]
}

/// Registry with every built-in service.
///
/// # Errors
///
/// Returns [`GeoError::DuplicateService`] if two built-in services share an id.
pub fn default_registry(keys: &ApiKeys) -> Result<ServiceRegistry, GeoError> {
    ServiceRegistry::new(default_services(keys))
}

#[cfg(test)]
mod tests {
    use geoshare_core::{ServiceId, ServiceTag};

    use super::*;

    #[test]
    fn registration_order_and_ids_are_stable() {
        let registry = default_registry(&ApiKeys::default()).expect("unique ids");
        let ids: Vec<u32> = registry.metas().iter().map(|meta| meta.id.0).collect();
        assert_eq!(ids, vec![14, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13]);
    }

    #[test]
    fn only_foursquare_needs_the_network() {
        let registry = default_registry(&ApiKeys::default()).expect("unique ids");
        let network: Vec<ServiceId> = registry
            .metas()
            .into_iter()
            .filter(|meta| meta.network)
            .map(|meta| meta.id)
            .collect();
        assert_eq!(network, vec![ServiceId(13)]);
    }

    #[test]
    fn collection_links_come_from_google_only() {
        let registry = default_registry(&ApiKeys::default()).expect("unique ids");
        let names: Vec<String> = registry
            .by_tag(ServiceTag::GenerateCollectionLink)
            .map(|service| service.meta().name.clone())
            .collect();
        assert_eq!(names, vec!["Google Maps".to_owned()]);
    }
}
