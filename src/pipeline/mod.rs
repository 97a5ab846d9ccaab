//! Address and hazard processing stages.

pub mod classifier;
pub mod correlator;
pub mod normalizer;
pub mod reporter;
pub mod scorer;
