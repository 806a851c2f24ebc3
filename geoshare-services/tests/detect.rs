//! End-to-end detection over the built-in registry.

use std::sync::Arc;

use geoshare_core::{
    ApiKeys, Coordinate, DetectionConfig, DetectionEngine, GeoError, LinkOptions, ServiceId,
};
use geoshare_services::default_registry;

fn engine() -> DetectionEngine {
    let registry = default_registry(&ApiKeys::default()).expect("built-in ids are unique");
    DetectionEngine::new(Arc::new(registry), DetectionConfig::default())
}

fn close(actual: &Coordinate, expected: &Coordinate, tolerance: f64) -> bool {
    (actual.lat() - expected.lat()).abs() <= tolerance
        && (actual.lon() - expected.lon()).abs() <= tolerance
}

#[tokio::test]
async fn plain_pair_yields_exactly_one_record() {
    let collection = engine().detect_text("50.087451,14.420671").await;
    assert_eq!(collection.len(), 1);
    let record = collection.iter().next().expect("one record");
    assert_eq!(record.coordinate().lat(), 50.087_451);
    assert_eq!(record.coordinate().lon(), 14.420_671);
    assert_eq!(record.source(), ServiceId(1));
}

#[tokio::test]
async fn tokens_of_different_formats_come_out_in_registration_order() {
    let text = "osm https://www.openstreetmap.org/?mlat=51.5&mlon=-0.12 then geo:35.6895,139.6917, \
                then N 48°51.5', E 2°17.75' and finally 50.087451,14.420671";
    let collection = engine().detect_text(text).await;
    let sources: Vec<u32> = collection.iter().map(|record| record.source().0).collect();
    assert_eq!(sources, vec![1, 2, 5, 8]);
}

#[tokio::test]
async fn same_place_in_two_formats_is_reported_once() {
    let collection = engine()
        .detect_text("50.087451,14.420671 geo:50.087451,14.420671")
        .await;
    assert_eq!(collection.len(), 1);
    assert_eq!(collection.iter().next().map(|record| record.source()), Some(ServiceId(1)));
}

#[tokio::test]
async fn nothing_recognizable_gives_an_empty_collection() {
    assert!(engine().detect_text("see you at the usual place").await.is_empty());
}

#[tokio::test]
async fn every_rendered_format_is_detected_again() {
    let engine = engine();
    let original = Coordinate::new(-33.856_784, 151.215_297).expect("valid");

    for service in engine.registry().all() {
        let meta = service.meta();
        let tolerance = if meta.id == ServiceId(4) { 0.0003 } else { 1e-6 };
        let rendered = service.share_text(&original).into_iter().chain(
            service
                .link(&original, false, &LinkOptions::default())
                .ok(),
        );
        for text in rendered {
            let collection = engine.detect_text(&text).await;
            let first = collection.iter().next().expect("rendered text is detected");
            assert_eq!(first.source(), meta.id, "{text}");
            assert!(close(first.coordinate(), &original, tolerance), "{text}");
        }
    }
}

#[tokio::test]
async fn drive_links_follow_each_format() {
    let engine = engine();
    let original = Coordinate::new(50.1, 14.2).expect("valid");
    let registry = engine.registry();

    let google = registry.by_id(ServiceId(7)).expect("google");
    assert!(
        google
            .link(&original, true, &LinkOptions::default())
            .is_ok_and(|link| link.contains("travelmode=driving"))
    );
    let osm = registry.by_id(ServiceId(8)).expect("osm");
    assert!(matches!(
        osm.link(&original, true, &LinkOptions::default()),
        Err(GeoError::NotSupported(_))
    ));
}
