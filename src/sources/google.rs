use async_trait::async_trait;
use serde::Deserialize;

use crate::core::error::ProviderError;
use crate::core::types::Coordinate;
use crate::sources::{Candidate, GeocodingProvider};

pub const DEFAULT_BASE_URL: &str = "https://maps.googleapis.com";

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    #[serde(default)]
    formatted_address: String,
    #[serde(default)]
    types: Vec<String>,
    geometry: ResultGeometry,
    #[serde(default)]
    address_components: Vec<AddressComponent>,
}

#[derive(Debug, Deserialize)]
struct ResultGeometry {
    location: LatLng,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Deserialize)]
struct AddressComponent {
    long_name: String,
    #[serde(default)]
    types: Vec<String>,
}

/// Keyed Google Geocoding API client.
pub struct GoogleGeocoder {
    name: String,
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GoogleGeocoder {
    pub fn new(
        name: impl Into<String>,
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl GeocodingProvider for GoogleGeocoder {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(
        &self,
        query: &str,
        country_bias: Option<&str>,
    ) -> Result<Vec<Candidate>, ProviderError> {
        let url = format!(
            "{}/maps/api/geocode/json",
            self.base_url.trim_end_matches('/')
        );
        let mut params = vec![("address", query), ("key", self.api_key.as_str())];
        if let Some(region) = country_bias {
            params.push(("region", region));
        }

        let body: GeocodeResponse = self
            .client
            .get(url)
            .query(&params)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let detail = body.error_message.unwrap_or_else(|| body.status.clone());
        match body.status.as_str() {
            "OK" => Ok(body.results.into_iter().map(into_candidate).collect()),
            "ZERO_RESULTS" => Ok(Vec::new()),
            "OVER_QUERY_LIMIT" | "OVER_DAILY_LIMIT" => Err(ProviderError::RateLimited(detail)),
            "REQUEST_DENIED" => Err(ProviderError::Auth(detail)),
            "INVALID_REQUEST" | "NOT_FOUND" => Err(ProviderError::NotFound(detail)),
            _ => Err(ProviderError::Request(detail)),
        }
    }
}

fn into_candidate(result: GeocodeResult) -> Candidate {
    let resolved_country = result
        .address_components
        .iter()
        .find(|c| c.types.iter().any(|t| t == "country"))
        .map(|c| c.long_name.clone());
    Candidate {
        coordinate: Coordinate {
            lat: result.geometry.location.lat,
            lng: result.geometry.location.lng,
        },
        formatted_address: result.formatted_address,
        types: result.types,
        resolved_country,
    }
}
