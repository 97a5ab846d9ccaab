//! Data model, persistence and the refresh engine.

pub mod engine;
pub mod error;
pub mod geo;
pub mod hash;
pub mod store;
pub mod tables;
pub mod time;
pub mod types;
