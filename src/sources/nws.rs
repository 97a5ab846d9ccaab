use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::core::error::ProviderError;
use crate::core::types::{Conditions, Coordinate, Region};
use crate::pipeline::correlator::parse_collection;
use crate::sources::{FeedBatch, HazardFeed};

pub const DEFAULT_BASE_URL: &str = "https://api.weather.gov";

#[derive(Debug, Deserialize)]
struct PointsResponse {
    properties: PointProperties,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PointProperties {
    #[serde(default)]
    forecast_zone: Option<String>,
    #[serde(default)]
    county: Option<String>,
    #[serde(default)]
    grid_id: Option<String>,
    #[serde(default)]
    grid_x: Option<i64>,
    #[serde(default)]
    grid_y: Option<i64>,
    #[serde(default)]
    relative_location: Option<RelativeLocation>,
}

#[derive(Debug, Deserialize)]
struct RelativeLocation {
    properties: RelativeProperties,
}

#[derive(Debug, Deserialize)]
struct RelativeProperties {
    #[serde(default)]
    state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    properties: ForecastProperties,
}

#[derive(Debug, Deserialize)]
struct ForecastProperties {
    #[serde(default)]
    periods: Vec<ForecastPeriod>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ForecastPeriod {
    #[serde(default)]
    short_forecast: String,
    #[serde(default)]
    detailed_forecast: String,
}

/// National Weather Service active alerts.
pub struct NwsFeed {
    client: reqwest::Client,
    base_url: String,
}

impl NwsFeed {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: String,
        query: &[(&str, &str)],
    ) -> Result<T, ProviderError> {
        Ok(self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/geo+json")
            .query(query)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?)
    }

    async fn point(&self, coordinate: Coordinate) -> Result<PointProperties, ProviderError> {
        let path = format!(
            "/points/{},{}",
            round2(coordinate.lat),
            round2(coordinate.lng)
        );
        let resp: PointsResponse = self.get_json(self.url(&path), &[]).await?;
        Ok(resp.properties)
    }

    async fn conditions(&self, point: &PointProperties) -> Result<Option<Conditions>, ProviderError> {
        let (Some(grid), Some(x), Some(y)) = (&point.grid_id, point.grid_x, point.grid_y) else {
            return Ok(None);
        };
        let path = format!("/gridpoints/{grid}/{x},{y}/forecast");
        let resp: ForecastResponse = self.get_json(self.url(&path), &[]).await?;
        Ok(resp.properties.periods.into_iter().next().map(|p| Conditions {
            short_forecast: p.short_forecast,
            detailed_forecast: p.detailed_forecast,
        }))
    }

    /// Active alerts for one zone (`zone=`) or state (`area=`).
    pub async fn fetch_zone(&self, param: &str, id: &str) -> Result<FeedBatch, ProviderError> {
        let raw: Value = self
            .get_json(self.url("/alerts/active"), &[(param, id)])
            .await?;
        let (records, skipped) =
            parse_collection(&raw).map_err(|e| ProviderError::Decode(e.to_string()))?;
        for err in &skipped {
            tracing::warn!("{}: {}", id, err);
        }
        Ok(FeedBatch {
            records,
            skipped: skipped.len(),
            conditions: None,
            scope: format!("{param}={id}"),
        })
    }
}

#[async_trait]
impl HazardFeed for NwsFeed {
    fn name(&self) -> &str {
        "nws"
    }

    fn supports(&self, region: Region) -> bool {
        matches!(region, Region::Us | Region::Unknown)
    }

    async fn fetch(&self, coordinate: Coordinate) -> Result<FeedBatch, ProviderError> {
        let point = self.point(coordinate).await?;
        let conditions = match self.conditions(&point).await {
            Ok(c) => c,
            Err(err) => {
                tracing::debug!("forecast unavailable for {}: {}", coordinate, err);
                None
            }
        };

        let state = point
            .relative_location
            .as_ref()
            .and_then(|r| r.properties.state.clone());
        let lookups = [
            ("zone", point.forecast_zone.as_deref().map(last_segment)),
            ("zone", point.county.as_deref().map(last_segment)),
            ("area", state.as_deref()),
        ];

        let mut last_err = ProviderError::NotFound(format!("no alert zone for {coordinate}"));
        for (param, id) in lookups {
            let Some(id) = id.filter(|s| !s.is_empty()) else {
                continue;
            };
            match self.fetch_zone(param, id).await {
                Ok(mut batch) => {
                    tracing::debug!(
                        "{} alerts for {} via {}",
                        batch.records.len(),
                        coordinate,
                        batch.scope
                    );
                    batch.conditions = conditions;
                    return Ok(batch);
                }
                Err(err) => {
                    tracing::warn!("alert lookup {}={} failed: {}", param, id, err);
                    last_err = err;
                }
            }
        }
        Err(last_err)
    }
}

fn last_segment(url: &str) -> &str {
    url.trim_end_matches('/').rsplit('/').next().unwrap_or(url)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
