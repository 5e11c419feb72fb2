//! Wayfarer SDK
//!
//! Shared library providing the error taxonomy, the typed data-source contract and
//! the payload types exchanged between the engine and its data tools.

/// Error types and handling
pub mod errors;

/// Tool gateway trait and typed outcomes
pub mod gateway;

/// Travel data types
pub mod types;

// Re-export commonly used types
pub use errors::{TravelError, WayfarerErrorExt};
pub use gateway::{
    FailureCause, FlightOutcome, GeocodeOutcome, PoiOutcome, ToolGateway, WeatherOutcome,
};
pub use types::{
    Coordinates, Location, Origin, PointOfInterest, Season, TemperatureBand, TravelWhen,
    WeatherSummary,
};
