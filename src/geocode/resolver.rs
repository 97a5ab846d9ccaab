use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::core::error::{ProviderError, ResolveError};
use crate::core::geo::parse_literal;
use crate::core::types::{Coordinate, Region};
use crate::geocode::strategies::{default_chain, PlannedQuery, ProviderSlot, ResolveContext, Step, Strategy};
use crate::pipeline::classifier::RegionClassifier;
use crate::pipeline::normalizer::AddressNormalizer;
use crate::sources::{Candidate, GeocodingProvider};

pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_millis(15_000);
pub const STATIC_TABLE_PROVIDER: &str = "static-table";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum AttemptOutcome {
    Resolved {
        coordinate: Coordinate,
        formatted_address: String,
    },
    Failed {
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolutionAttempt {
    pub strategy: &'static str,
    pub query: String,
    pub provider: String,
    pub country_bias: Option<String>,
    pub outcome: AttemptOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    pub coordinate: Coordinate,
    pub region: Region,
    pub strategy: &'static str,
    pub query: String,
    pub formatted_address: Option<String>,
    pub attempts: Vec<ResolutionAttempt>,
}

/// Turns free-form addresses into coordinates by walking a chain of
/// query strategies against one or two geocoding providers.
pub struct GeocodingResolver {
    primary: Arc<dyn GeocodingProvider>,
    fallback: Option<Arc<dyn GeocodingProvider>>,
    normalizer: AddressNormalizer,
    classifier: RegionClassifier,
    strategies: Vec<Box<dyn Strategy>>,
    call_timeout: Duration,
}

impl GeocodingResolver {
    pub fn new(
        primary: Arc<dyn GeocodingProvider>,
        fallback: Option<Arc<dyn GeocodingProvider>>,
    ) -> Self {
        Self {
            primary,
            fallback,
            normalizer: AddressNormalizer::new(),
            classifier: RegionClassifier::default(),
            strategies: default_chain(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    pub fn with_classifier(mut self, classifier: RegionClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_strategies(mut self, strategies: Vec<Box<dyn Strategy>>) -> Self {
        self.strategies = strategies;
        self
    }

    pub fn provider_names(&self) -> Vec<String> {
        std::iter::once(&self.primary)
            .chain(self.fallback.as_ref())
            .map(|p| p.name().to_string())
            .collect()
    }

    pub async fn resolve(&self, raw: &str) -> Result<Coordinate, ResolveError> {
        self.resolve_traced(raw).await.map(|r| r.coordinate)
    }

    pub async fn resolve_traced(&self, raw: &str) -> Result<Resolution, ResolveError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ResolveError::EmptyAddress);
        }
        if let Some(literal) = parse_literal(trimmed) {
            let coordinate = literal?;
            tracing::debug!("{} is a coordinate literal", trimmed);
            return Ok(Resolution {
                coordinate,
                region: Region::Unknown,
                strategy: "literal",
                query: trimmed.to_string(),
                formatted_address: None,
                attempts: Vec::new(),
            });
        }

        let address = self.normalizer.normalize(trimmed);
        let region = self.classifier.classify(&address);
        tracing::debug!("resolving '{}' as {} ({})", trimmed, address.canonical, region);
        let ctx = ResolveContext {
            address: &address,
            region,
        };

        let mut seen = HashSet::new();
        let mut attempts = Vec::new();
        for strategy in &self.strategies {
            for step in strategy.plan(&ctx) {
                match step {
                    Step::Fixed { label, coordinate } => {
                        tracing::info!(
                            "resolved '{}' from built-in table entry '{}'",
                            trimmed,
                            label
                        );
                        attempts.push(ResolutionAttempt {
                            strategy: strategy.name(),
                            query: label.clone(),
                            provider: STATIC_TABLE_PROVIDER.to_string(),
                            country_bias: None,
                            outcome: AttemptOutcome::Resolved {
                                coordinate,
                                formatted_address: label.clone(),
                            },
                        });
                        return Ok(Resolution {
                            coordinate,
                            region,
                            strategy: strategy.name(),
                            query: label,
                            formatted_address: None,
                            attempts,
                        });
                    }
                    Step::Query(planned) => {
                        let Some(provider) = self.provider(planned.slot) else {
                            continue;
                        };
                        let key = (planned.query.to_lowercase(), planned.slot, planned.bias);
                        if !seen.insert(key) {
                            continue;
                        }
                        let outcome = self.attempt(provider.as_ref(), &planned).await;
                        let record = ResolutionAttempt {
                            strategy: strategy.name(),
                            query: planned.query.clone(),
                            provider: provider.name().to_string(),
                            country_bias: planned.bias.map(str::to_string),
                            outcome: match &outcome {
                                Ok(c) => AttemptOutcome::Resolved {
                                    coordinate: c.coordinate,
                                    formatted_address: c.formatted_address.clone(),
                                },
                                Err(reason) => AttemptOutcome::Failed {
                                    reason: reason.clone(),
                                },
                            },
                        };
                        attempts.push(record);
                        match outcome {
                            Ok(candidate) => {
                                tracing::info!(
                                    "resolved '{}' via {} ({}): {}",
                                    trimmed,
                                    strategy.name(),
                                    provider.name(),
                                    candidate.coordinate
                                );
                                return Ok(Resolution {
                                    coordinate: candidate.coordinate,
                                    region,
                                    strategy: strategy.name(),
                                    query: planned.query,
                                    formatted_address: Some(candidate.formatted_address),
                                    attempts,
                                });
                            }
                            Err(reason) => {
                                tracing::debug!(
                                    "{} '{}' via {}: {}",
                                    strategy.name(),
                                    planned.query,
                                    provider.name(),
                                    reason
                                );
                            }
                        }
                    }
                }
            }
        }

        tracing::warn!("could not resolve '{}' after {} attempts", trimmed, attempts.len());
        Err(ResolveError::UnresolvableAddress {
            address: trimmed.to_string(),
            attempts: attempts
                .iter()
                .map(|a| format!("{}: {}", a.provider, a.query))
                .collect(),
        })
    }

    fn provider(&self, slot: ProviderSlot) -> Option<&Arc<dyn GeocodingProvider>> {
        match slot {
            ProviderSlot::Primary => Some(&self.primary),
            ProviderSlot::Fallback => self.fallback.as_ref(),
        }
    }

    async fn attempt(
        &self,
        provider: &dyn GeocodingProvider,
        planned: &PlannedQuery,
    ) -> Result<Candidate, String> {
        let search = provider.search(&planned.query, planned.bias);
        let candidates = match tokio::time::timeout(self.call_timeout, search).await {
            Err(_) => return Err(ProviderError::Timeout.to_string()),
            Ok(Err(err)) => return Err(err.to_string()),
            Ok(Ok(candidates)) => candidates,
        };
        if candidates.is_empty() {
            return Err("no results".to_string());
        }

        let first = candidates.into_iter().find(|c| match planned.require_country {
            Some(want) => c
                .resolved_country
                .as_deref()
                .is_some_and(|got| got.eq_ignore_ascii_case(want)),
            None => true,
        });
        match first {
            Some(c) if c.coordinate.is_valid() => Ok(c),
            Some(c) => Err(format!("invalid coordinate {}", c.coordinate)),
            None => Err(format!(
                "no result in {}",
                planned.require_country.unwrap_or("requested country")
            )),
        }
    }
}
