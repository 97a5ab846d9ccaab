use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::core::error::StormError;
use crate::pipeline::correlator::FallbackPolicy;

pub const DEFAULT_CONFIG_PATH: &str = "config/stormsite.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Google,
    Nominatim,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    pub kind: ProviderKind,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Environment variable consulted when `api_key` is unset.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub min_interval_ms: Option<u64>,
}

impl ProviderConfig {
    pub fn resolved_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| {
                self.api_key_env
                    .as_deref()
                    .and_then(|var| std::env::var(var).ok())
                    .filter(|k| !k.trim().is_empty())
            })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocodingConfig {
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderConfig>,
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            call_timeout_ms: default_call_timeout_ms(),
            providers: default_providers(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HazardFeedConfig {
    #[serde(default = "default_feed_url")]
    pub base_url: String,
    #[serde(default = "default_feed_timeout_ms")]
    pub call_timeout_ms: u64,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for HazardFeedConfig {
    fn default() -> Self {
        Self {
            base_url: default_feed_url(),
            call_timeout_ms: default_feed_timeout_ms(),
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorrelationConfig {
    #[serde(default)]
    pub fallback_policy: FallbackPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
    #[serde(default = "default_db_path")]
    pub db_path: String,
    #[serde(default)]
    pub geocoding: GeocodingConfig,
    #[serde(default)]
    pub hazard_feed: HazardFeedConfig,
    #[serde(default)]
    pub correlation: CorrelationConfig,
}

impl AppConfig {
    /// Enabled providers in declaration order; the first is primary, the second fallback.
    pub fn active_providers(&self) -> Vec<&ProviderConfig> {
        self.geocoding
            .providers
            .iter()
            .filter(|p| p.enabled)
            .filter(|p| match p.kind {
                ProviderKind::Google if p.resolved_key().is_none() => {
                    tracing::warn!("provider {} has no api key; skipping", p.name);
                    false
                }
                _ => true,
            })
            .take(2)
            .collect()
    }
}

pub fn load_config(path: Option<&str>) -> Result<AppConfig, StormError> {
    let default_path = Path::new(DEFAULT_CONFIG_PATH);
    let path = path.map(Path::new).unwrap_or(default_path);

    if !path.exists() {
        tracing::debug!("no config at {}; using defaults", path.display());
        return Ok(default_config());
    }

    let content = fs::read_to_string(path).map_err(|e| StormError::Config(e.to_string()))?;
    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<AppConfig, StormError> {
    let cfg: AppConfig =
        toml::from_str(content).map_err(|e| StormError::Config(e.to_string()))?;
    if cfg.max_concurrent_requests == 0 {
        return Err(StormError::Config(
            "max_concurrent_requests must be at least 1".to_string(),
        ));
    }
    Ok(cfg)
}

pub fn apply_provider_filter(cfg: AppConfig, names: Option<&[String]>) -> AppConfig {
    if let Some(list) = names {
        let mut cfg = cfg;
        let lowered: Vec<String> = list.iter().map(|s| s.to_lowercase()).collect();
        for p in cfg.geocoding.providers.iter_mut() {
            p.enabled = lowered.iter().any(|n| n == &p.name.to_lowercase());
        }
        return cfg;
    }
    cfg
}

pub fn default_config() -> AppConfig {
    AppConfig {
        timeout_ms: default_timeout_ms(),
        user_agent: default_user_agent(),
        max_concurrent_requests: default_max_concurrent(),
        refresh_interval_secs: default_refresh_interval(),
        db_path: default_db_path(),
        geocoding: GeocodingConfig::default(),
        hazard_feed: HazardFeedConfig::default(),
        correlation: CorrelationConfig::default(),
    }
}

fn default_providers() -> Vec<ProviderConfig> {
    vec![
        ProviderConfig {
            name: "google".to_string(),
            kind: ProviderKind::Google,
            enabled: true,
            base_url: None,
            api_key: None,
            api_key_env: Some("GOOGLE_MAPS_API_KEY".to_string()),
            min_interval_ms: None,
        },
        ProviderConfig {
            name: "nominatim".to_string(),
            kind: ProviderKind::Nominatim,
            enabled: true,
            base_url: None,
            api_key: None,
            api_key_env: None,
            min_interval_ms: Some(1_000),
        },
    ]
}

fn default_true() -> bool {
    true
}

fn default_timeout_ms() -> u64 {
    15_000
}

fn default_call_timeout_ms() -> u64 {
    15_000
}

fn default_feed_timeout_ms() -> u64 {
    10_000
}

fn default_feed_url() -> String {
    crate::sources::nws::DEFAULT_BASE_URL.to_string()
}

fn default_user_agent() -> String {
    format!("stormsite/{} (site-weather-monitor)", env!("CARGO_PKG_VERSION"))
}

fn default_max_concurrent() -> usize {
    5
}

fn default_refresh_interval() -> u64 {
    120
}

fn default_db_path() -> String {
    "data/stormsite.db".to_string()
}
