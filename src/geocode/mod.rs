//! Address to coordinate resolution.

pub mod resolver;
pub mod strategies;
pub mod variants;

pub use resolver::{AttemptOutcome, GeocodingResolver, Resolution, ResolutionAttempt};
