//! Error taxonomy shared by the detection, rendering and caching layers.

use crate::model::ServiceId;
use crate::ports::PortError;

#[derive(thiserror::Error, Debug)]
/// Errors surfaced by geoshare operations.
pub enum GeoError {
    /// Latitude or longitude out of range or not finite.
    #[error("Invalid coordinate: lat {lat}, lon {lon}")]
    InvalidCoordinate {
        /// Rejected latitude.
        lat: f64,
        /// Rejected longitude.
        lon: f64,
    },
    /// A service matched its input but failed to extract a location.
    #[error("Service {service} failed: {reason}")]
    ServiceProcess {
        /// Failing service.
        service: ServiceId,
        /// What went wrong.
        reason: String,
    },
    /// The service does not offer the requested capability or option.
    #[error("Not supported: {0}")]
    NotSupported(String),
    /// No service is registered under this identifier.
    #[error("Unknown service id {0}")]
    UnknownService(ServiceId),
    /// Two services were registered with the same identifier.
    #[error("Duplicate service id {0}")]
    DuplicateService(ServiceId),
    /// Static map generation or download failed.
    #[error("Static map render failed: {0}")]
    RenderFailed(String),
    /// Caller supplied malformed input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// Configuration could not be loaded or is inconsistent.
    #[error("Configuration error: {0}")]
    Config(String),
    /// An external collaborator failed.
    #[error(transparent)]
    Port(#[from] PortError),
    /// Local filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GeoError {
    /// Shorthand for a [`GeoError::ServiceProcess`] failure.
    pub fn process(service: ServiceId, reason: impl Into<String>) -> Self {
        Self::ServiceProcess {
            service,
            reason: reason.into(),
        }
    }

    /// Shorthand for a [`GeoError::NotSupported`] failure.
    pub fn not_supported(what: impl Into<String>) -> Self {
        Self::NotSupported(what.into())
    }
}
