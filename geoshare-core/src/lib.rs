//! Core types and pipeline for the geoshare location extractor.

/// Ordered, deduplicated location container.
pub mod collection;
/// Configuration passed into the engine, pipeline and cache.
pub mod config;
/// Detection engine dispatching input to every service.
pub mod engine;
/// Best-effort enrichment of detected locations.
pub mod enrich;
/// Error taxonomy.
pub mod error;
/// Detection input and per-call context.
pub mod input;
/// Coordinates, records and service descriptors.
pub mod model;
/// Service contract and registry.
pub mod plugin;
/// Traits describing external collaborators.
pub mod ports;
/// Static map cache proxy.
pub mod staticmap;

pub use collection::*;
pub use config::*;
pub use engine::*;
pub use enrich::*;
pub use error::*;
pub use input::*;
pub use model::*;
pub use plugin::*;
pub use ports::*;
pub use staticmap::*;
