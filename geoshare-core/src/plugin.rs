//! Service contract and the registry all services are resolved from.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;

use crate::collection::LocationCollection;
use crate::error::GeoError;
use crate::input::{DetectionContext, DetectionInput};
use crate::model::{Coordinate, ServiceId, ServiceMeta, ServiceTag};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
/// Extra knobs for rendering a link.
pub struct LinkOptions {
    /// Requested zoom level, when the format carries one.
    pub zoom: Option<u8>,
}

#[async_trait]
/// One detection attempt of a service, bound to a single input.
///
/// The engine calls [`Detector::validate`] once and [`Detector::process`]
/// only after a successful validation.
pub trait Detector: Send {
    /// Whether the input matches this format precisely enough to process.
    ///
    /// Must not fail and must not touch the network.
    fn validate(&mut self) -> bool;

    /// Extract locations into `out`.
    ///
    /// # Errors
    ///
    /// Returns a [`GeoError`] when a validated input cannot be turned into a
    /// location, e.g. because a lookup failed.
    async fn process(&mut self, out: &mut LocationCollection) -> Result<(), GeoError>;
}

/// A format recognized by geoshare: detection plus optional rendering.
pub trait Service: Send + Sync {
    /// Descriptor of this service.
    fn meta(&self) -> &ServiceMeta;

    /// Open a detection attempt for `input`.
    fn detector<'det>(
        &'det self,
        input: &'det DetectionInput,
        context: &'det DetectionContext,
    ) -> Box<dyn Detector + 'det>;

    /// Render a coordinate in this format's canonical text form.
    fn share_text(&self, _coordinate: &Coordinate) -> Option<String> {
        None
    }

    /// Render a coordinate as this format's canonical URL.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::NotSupported`] when the format has no link or does
    /// not offer the requested option, e.g. `drive`.
    fn link(
        &self,
        _coordinate: &Coordinate,
        _drive: bool,
        _options: &LinkOptions,
    ) -> Result<String, GeoError> {
        Err(GeoError::not_supported(format!(
            "{} does not generate links",
            self.meta().name
        )))
    }

    /// Render several coordinates as one link. `None` for an empty collection.
    fn collection_link(&self, _collection: &LocationCollection) -> Option<String> {
        None
    }
}

/// Registry of every known service, in registration order.
pub struct ServiceRegistry {
    services: Vec<Arc<dyn Service>>,
}

impl ServiceRegistry {
    /// Build a registry from an explicit registration list.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::DuplicateService`] when two services share an id.
    pub fn new(services: Vec<Arc<dyn Service>>) -> Result<Self, GeoError> {
        let mut ids = HashSet::new();
        for service in &services {
            let id = service.meta().id;
            if !ids.insert(id) {
                return Err(GeoError::DuplicateService(id));
            }
        }
        Ok(Self { services })
    }

    /// All services in registration order.
    #[must_use]
    pub fn all(&self) -> &[Arc<dyn Service>] {
        &self.services
    }

    /// Descriptors of all services in registration order.
    #[must_use]
    pub fn metas(&self) -> Vec<ServiceMeta> {
        self.services
            .iter()
            .map(|service| service.meta().clone())
            .collect()
    }

    /// Services declaring `tag`, in registration order.
    pub fn by_tag(&self, tag: ServiceTag) -> impl Iterator<Item = &Arc<dyn Service>> {
        self.services
            .iter()
            .filter(move |service| service.meta().has_tag(tag))
    }

    /// Look up a service by its persisted identifier.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::UnknownService`] when no service has this id.
    pub fn by_id(&self, id: ServiceId) -> Result<&Arc<dyn Service>, GeoError> {
        self.services
            .iter()
            .find(|service| service.meta().id == id)
            .ok_or(GeoError::UnknownService(id))
    }

    /// Number of registered services.
    #[must_use]
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Whether nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Dummy {
        meta: ServiceMeta,
    }

    struct NeverMatches;

    #[async_trait]
    impl Detector for NeverMatches {
        fn validate(&mut self) -> bool {
            false
        }

        async fn process(&mut self, _out: &mut LocationCollection) -> Result<(), GeoError> {
            Ok(())
        }
    }

    impl Service for Dummy {
        fn meta(&self) -> &ServiceMeta {
            &self.meta
        }

        fn detector<'det>(
            &'det self,
            _input: &'det DetectionInput,
            _context: &'det DetectionContext,
        ) -> Box<dyn Detector + 'det> {
            Box::new(NeverMatches)
        }
    }

    fn dummy(id: u32, tags: &[ServiceTag]) -> Arc<dyn Service> {
        Arc::new(Dummy {
            meta: ServiceMeta::offline(id, &format!("dummy {id}"), tags),
        })
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let result = ServiceRegistry::new(vec![dummy(1, &[]), dummy(1, &[])]);
        assert!(matches!(result, Err(GeoError::DuplicateService(ServiceId(1)))));
    }

    #[test]
    fn by_tag_keeps_registration_order() {
        let registry = ServiceRegistry::new(vec![
            dummy(9, &[ServiceTag::GenerateLink]),
            dummy(2, &[ServiceTag::GenerateText]),
            dummy(5, &[ServiceTag::GenerateLink, ServiceTag::GenerateText]),
        ])
        .expect("unique ids");
        let ids: Vec<u32> = registry
            .by_tag(ServiceTag::GenerateLink)
            .map(|service| service.meta().id.0)
            .collect();
        assert_eq!(ids, vec![9, 5]);
    }

    #[test]
    fn unknown_ids_are_reported() {
        let registry = ServiceRegistry::new(vec![dummy(1, &[])]).expect("unique ids");
        assert!(matches!(registry.by_id(ServiceId(1)), Ok(_)));
        assert!(matches!(
            registry.by_id(ServiceId(404)),
            Err(GeoError::UnknownService(ServiceId(404)))
        ));
    }

    #[test]
    fn default_link_is_not_supported() {
        let service = dummy(3, &[]);
        let coord = Coordinate::new(1.0, 2.0).expect("valid");
        assert!(matches!(
            service.link(&coord, false, &LinkOptions::default()),
            Err(GeoError::NotSupported(_))
        ));
        assert!(service.share_text(&coord).is_none());
    }
}
