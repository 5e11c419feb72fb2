//! Conductor System
//!
//! Plans candidate destinations, scores them, and keeps the session's
//! feedback memory that both stages consult.

pub mod memory;
pub mod planner;
pub mod scorer;
pub mod seeds;
pub mod types;

pub use memory::{FeedbackMemory, MemorySnapshot, ShownOption, WeatherPreference};
pub use planner::Planner;
pub use scorer::{score, ScoringContext};
pub use types::{
    ActivityCategory, CandidateDestination, PlanningFailure, RankedEntry, RankedResult, Score,
    TripQuery,
};
