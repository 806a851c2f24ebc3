//! Foursquare venue pages, resolved through the venues API.

use async_trait::async_trait;
use geoshare_core::{
    Coordinate, DetectionContext, DetectionInput, Detector, GeoError, InputSpan,
    LocationCollection, LocationRecord, Service, ServiceMeta,
};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::scan::host_is;

const API_VERSION: &str = "20231010";

/// Client id and secret for the Foursquare venues API.
#[derive(Debug, Clone)]
pub struct FoursquareCredentials {
    /// OAuth client id.
    pub client_id: String,
    /// OAuth client secret.
    pub client_secret: String,
}

/// Foursquare venue links; processing needs a network lookup.
pub struct FoursquareService {
    meta: ServiceMeta,
    credentials: Option<FoursquareCredentials>,
}

impl FoursquareService {
    /// Create the service. Without credentials every lookup fails.
    #[must_use]
    pub fn new(credentials: Option<FoursquareCredentials>) -> Self {
        let mut meta = ServiceMeta::offline(13, "Foursquare venue", &[]);
        meta.network = true;
        Self { meta, credentials }
    }
}

#[derive(Deserialize)]
struct VenueEnvelope {
    response: VenueResponse,
}

#[derive(Deserialize)]
struct VenueResponse {
    venue: Venue,
}

#[derive(Deserialize)]
struct Venue {
    name: String,
    location: VenueLocation,
}

#[derive(Deserialize)]
struct VenueLocation {
    lat: f64,
    lng: f64,
}

struct VenueDetector<'det> {
    service: &'det FoursquareService,
    context: &'det DetectionContext,
    venues: Vec<(String, InputSpan)>,
}

impl VenueDetector<'_> {
    async fn lookup(&self, venue_id: &str) -> Result<(Coordinate, String), GeoError> {
        let id = self.service.meta.id;
        let http = self
            .context
            .http()
            .ok_or_else(|| GeoError::process(id, "no HTTP access for venue lookup"))?;
        let credentials = self
            .service
            .credentials
            .as_ref()
            .ok_or_else(|| GeoError::process(id, "Foursquare credentials are not configured"))?;
        let url = format!(
            "https://api.foursquare.com/v2/venues/{venue_id}?client_id={}&client_secret={}&v={API_VERSION}",
            credentials.client_id, credentials.client_secret
        );
        debug!(venue = venue_id, "looking up Foursquare venue");
        let body = http.fetch_json(&url, self.context.json_cache_ttl(), &[]).await?;
        let envelope: VenueEnvelope = serde_json::from_value(body)
            .map_err(|err| GeoError::process(id, format!("unexpected venue response: {err}")))?;
        let venue = envelope.response.venue;
        let coordinate = Coordinate::new(venue.location.lat, venue.location.lng)?;
        Ok((coordinate, venue.name))
    }
}

#[async_trait]
impl Detector for VenueDetector<'_> {
    fn validate(&mut self) -> bool {
        self.venues = self
            .context
            .urls()
            .iter()
            .filter(|url| host_is(url, "foursquare.com"))
            .filter_map(|url| venue_id(&url.url).map(|id| (id, url.span)))
            .collect();
        !self.venues.is_empty()
    }

    async fn process(&mut self, out: &mut LocationCollection) -> Result<(), GeoError> {
        for (venue_id, span) in std::mem::take(&mut self.venues) {
            let (coordinate, name) = self.lookup(&venue_id).await?;
            out.add(
                LocationRecord::new(coordinate, self.service.meta.id)
                    .with_span(span)
                    .with_label(name),
            );
        }
        Ok(())
    }
}

impl Service for FoursquareService {
    fn meta(&self) -> &ServiceMeta {
        &self.meta
    }

    fn detector<'det>(
        &'det self,
        _input: &'det DetectionInput,
        context: &'det DetectionContext,
    ) -> Box<dyn Detector + 'det> {
        Box::new(VenueDetector {
            service: self,
            context,
            venues: Vec::new(),
        })
    }
}

/// Venue id from `/v/<slug>/<id>` or `/v/<id>`.
fn venue_id(url: &Url) -> Option<String> {
    let segments: Vec<&str> = url.path_segments()?.filter(|segment| !segment.is_empty()).collect();
    let candidate = match segments.as_slice() {
        ["v", _, id] | ["v", id] => *id,
        _ => return None,
    };
    (candidate.len() == 24 && candidate.bytes().all(|byte| byte.is_ascii_hexdigit()))
        .then(|| candidate.to_ascii_lowercase())
}
