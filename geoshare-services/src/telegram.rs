//! Locations attached to a chat message rather than written in its text.

use async_trait::async_trait;
use geoshare_core::{
    DetectionContext, DetectionInput, Detector, GeoError, LocationCollection, LocationRecord,
    Service, ServiceId, ServiceMeta, SharedLocation,
};

/// Shared (optionally live) message locations.
pub struct TelegramLocationService {
    meta: ServiceMeta,
}

impl TelegramLocationService {
    /// Create the service.
    #[must_use]
    pub fn new() -> Self {
        Self {
            meta: ServiceMeta::offline(14, "Telegram location", &[]),
        }
    }
}

impl Default for TelegramLocationService {
    fn default() -> Self {
        Self::new()
    }
}

struct SharedLocationDetector {
    service: ServiceId,
    shared: Option<SharedLocation>,
}

#[async_trait]
impl Detector for SharedLocationDetector {
    fn validate(&mut self) -> bool {
        self.shared.is_some()
    }

    async fn process(&mut self, out: &mut LocationCollection) -> Result<(), GeoError> {
        let Some(shared) = self.shared.take() else {
            return Err(GeoError::process(self.service, "no shared location"));
        };
        let label = if shared.live { "Live location" } else { "Location" };
        out.add(LocationRecord::new(shared.coordinate, self.service).with_label(label));
        Ok(())
    }
}

impl Service for TelegramLocationService {
    fn meta(&self) -> &ServiceMeta {
        &self.meta
    }

    fn detector<'det>(
        &'det self,
        input: &'det DetectionInput,
        _context: &'det DetectionContext,
    ) -> Box<dyn Detector + 'det> {
        Box::new(SharedLocationDetector {
            service: self.meta.id,
            shared: input.shared_location().copied(),
        })
    }
}
