use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::core::error::ProviderError;
use crate::core::types::Coordinate;
use crate::sources::rate_limiter::RateLimiter;
use crate::sources::{Candidate, GeocodingProvider};

pub const DEFAULT_BASE_URL: &str = "https://nominatim.openstreetmap.org";

#[derive(Debug, Deserialize)]
struct Place {
    lat: String,
    lon: String,
    #[serde(default)]
    display_name: String,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    class: Option<String>,
    #[serde(default)]
    address: Option<PlaceAddress>,
}

#[derive(Debug, Deserialize)]
struct PlaceAddress {
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    house_number: Option<String>,
}

/// OpenStreetMap Nominatim search. No key, but calls are spaced out.
pub struct NominatimGeocoder {
    name: String,
    client: reqwest::Client,
    base_url: String,
    limiter: RateLimiter,
}

impl NominatimGeocoder {
    pub fn new(
        name: impl Into<String>,
        client: reqwest::Client,
        base_url: impl Into<String>,
        min_interval: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            client,
            base_url: base_url.into(),
            limiter: RateLimiter::new(min_interval),
        }
    }
}

#[async_trait]
impl GeocodingProvider for NominatimGeocoder {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(
        &self,
        query: &str,
        country_bias: Option<&str>,
    ) -> Result<Vec<Candidate>, ProviderError> {
        self.limiter.acquire().await;

        let url = format!("{}/search", self.base_url.trim_end_matches('/'));
        let mut params = vec![
            ("q", query),
            ("format", "json"),
            ("addressdetails", "1"),
            ("limit", "5"),
        ];
        if let Some(code) = country_bias {
            params.push(("countrycodes", code));
        }

        let places: Vec<Place> = self
            .client
            .get(url)
            .query(&params)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let mut candidates = Vec::with_capacity(places.len());
        let mut has_house_number = Vec::with_capacity(places.len());
        for place in places {
            let (Ok(lat), Ok(lng)) = (place.lat.parse::<f64>(), place.lon.parse::<f64>()) else {
                tracing::debug!("nominatim returned unparseable point for {}", place.display_name);
                continue;
            };
            let address = place.address.unwrap_or(PlaceAddress {
                country: None,
                house_number: None,
            });
            has_house_number.push(address.house_number.is_some());
            candidates.push(Candidate {
                coordinate: Coordinate { lat, lng },
                formatted_address: place.display_name,
                types: place.class.into_iter().chain(place.kind).collect(),
                resolved_country: address.country,
            });
        }

        // Street-level hits first for US or unbiased queries.
        if matches!(country_bias, None | Some("us")) {
            let mut paired: Vec<(bool, Candidate)> =
                has_house_number.into_iter().zip(candidates).collect();
            paired.sort_by_key(|(exact, _)| !*exact);
            candidates = paired.into_iter().map(|(_, c)| c).collect();
        }
        Ok(candidates)
    }
}
