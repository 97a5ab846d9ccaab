pub mod cli;
pub mod config;
pub mod core;
pub mod geocode;
pub mod pipeline;
pub mod sources;
