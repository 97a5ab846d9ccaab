use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::core::error::ProviderError;
use crate::core::types::{Conditions, Coordinate, HazardRecord, Region};

pub mod google;
pub mod nominatim;
pub mod nws;
pub mod rate_limiter;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    pub coordinate: Coordinate,
    pub formatted_address: String,
    pub types: Vec<String>,
    pub resolved_country: Option<String>,
}

/// A forward geocoding service.
#[async_trait]
pub trait GeocodingProvider: Send + Sync {
    fn name(&self) -> &str;

    /// `country_bias` is a lower-case two-letter code.
    async fn search(
        &self,
        query: &str,
        country_bias: Option<&str>,
    ) -> Result<Vec<Candidate>, ProviderError>;
}

#[derive(Debug, Clone, Default)]
pub struct FeedBatch {
    pub records: Vec<HazardRecord>,
    /// Records dropped as malformed.
    pub skipped: usize,
    pub conditions: Option<Conditions>,
    /// Which lookup answered (forecast zone, county, state...).
    pub scope: String,
}

/// A source of active hazards around a coordinate.
#[async_trait]
pub trait HazardFeed: Send + Sync {
    fn name(&self) -> &str;

    fn supports(&self, region: Region) -> bool;

    async fn fetch(&self, coordinate: Coordinate) -> Result<FeedBatch, ProviderError>;
}

pub fn build_http_client(user_agent: &str, timeout_ms: u64) -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .user_agent(user_agent.to_string())
        .timeout(Duration::from_millis(timeout_ms))
        .redirect(reqwest::redirect::Policy::limited(4))
        .build()
        .map_err(ProviderError::from)
}
