//! Coordinate systems: registry, transforms and detection.

pub mod detection;
mod manager;
pub mod registry;
mod transformer;

pub use detection::{suggest_coordinate_system, SystemSuggestion};
pub use manager::{
    CoordinateSystemManager, ManagerState, SANITY_EXPECTED, SANITY_SOURCE, SANITY_TOLERANCE,
};
pub use registry::{
    builtin_definitions, CoordinateSystemDefinition, CoordinateSystemRegistry, NONE, SWISS_LV03,
    SWISS_LV95, WGS84,
};
pub use transformer::{CoordinateTransformer, TransformerStats};
