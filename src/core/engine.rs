use std::{
    collections::HashSet,
    future::Future,
    path::Path,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::{sync::Semaphore, task::JoinSet, time::MissedTickBehavior};

use crate::{
    config::{AppConfig, ProviderConfig, ProviderKind},
    core::{
        error::{ResolveError, StormError},
        geo::parse_literal,
        hash::site_id,
        store::{SiteStore, StoreInfo},
        time::now_utc,
        types::{
            AlertSource, Coordinate, EffectiveAlertState, HazardRecord, NewSite, Region, Site,
            SiteCategory, SiteEdit, StructuredAddress, Tier,
        },
    },
    geocode::GeocodingResolver,
    pipeline::{
        classifier::RegionClassifier,
        correlator::{AppliedHazard, HazardCorrelator},
        scorer::SeverityModel,
    },
    sources::{
        build_http_client, google::GoogleGeocoder, nominatim::NominatimGeocoder, nws::NwsFeed,
        GeocodingProvider, HazardFeed,
    },
};

pub const UNSUPPORTED_REGION: &str = "Weather alerts are not available for this location.";
pub const FEED_DISABLED: &str = "Weather alert feed is disabled.";

#[derive(Debug, Clone, Serialize)]
pub struct SiteReport {
    pub site_id: String,
    pub nickname: String,
    pub coordinate: Coordinate,
    pub region: Region,
    pub state: EffectiveAlertState,
    /// Feed lookup that answered, when one did.
    pub scope: Option<String>,
    pub applied: Vec<AppliedHazard>,
    pub hazard_ids: Vec<String>,
    pub degraded: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefreshReport {
    pub cycle_started: DateTime<Utc>,
    pub sites: Vec<SiteReport>,
    /// Hazards that applied to at least one site, first occurrence kept.
    pub hazards: Vec<HazardRecord>,
    pub degraded: usize,
}

struct SiteOutcome {
    report: SiteReport,
    hazards: Vec<HazardRecord>,
}

pub struct Engine {
    resolver: GeocodingResolver,
    feed: Option<Arc<dyn HazardFeed>>,
    correlator: Arc<HazardCorrelator>,
    classifier: RegionClassifier,
    store: Mutex<SiteStore>,
    semaphore: Arc<Semaphore>,
    cycle: tokio::sync::Mutex<()>,
    fetch_timeout: Duration,
}

impl Engine {
    pub fn new(config: &AppConfig) -> Result<Self, StormError> {
        let client = build_http_client(&config.user_agent, config.timeout_ms)?;
        let resolver = build_resolver(config, client.clone())?;
        let feed: Option<Arc<dyn HazardFeed>> = config.hazard_feed.enabled.then(|| {
            Arc::new(NwsFeed::new(client.clone(), config.hazard_feed.base_url.clone()))
                as Arc<dyn HazardFeed>
        });
        let correlator =
            HazardCorrelator::new(SeverityModel::default(), config.correlation.fallback_policy);
        let store = SiteStore::open(Path::new(&config.db_path))?;

        Ok(Self::with_components(
            resolver,
            feed,
            correlator,
            store,
            config.max_concurrent_requests,
            Duration::from_millis(config.hazard_feed.call_timeout_ms),
        ))
    }

    pub fn with_components(
        resolver: GeocodingResolver,
        feed: Option<Arc<dyn HazardFeed>>,
        correlator: HazardCorrelator,
        store: SiteStore,
        max_concurrent: usize,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            resolver,
            feed,
            correlator: Arc::new(correlator),
            classifier: RegionClassifier::default(),
            store: Mutex::new(store),
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
            cycle: tokio::sync::Mutex::new(()),
            fetch_timeout,
        }
    }

    pub fn resolver(&self) -> &GeocodingResolver {
        &self.resolver
    }

    pub fn feed(&self) -> Option<&Arc<dyn HazardFeed>> {
        self.feed.as_ref()
    }

    pub fn correlator(&self) -> &HazardCorrelator {
        &self.correlator
    }

    fn store(&self) -> Result<MutexGuard<'_, SiteStore>, StormError> {
        self.store
            .lock()
            .map_err(|_| StormError::Db("site store lock poisoned".to_string()))
    }

    async fn locate(
        &self,
        address: &StructuredAddress,
        literal: Option<&str>,
    ) -> Result<Coordinate, StormError> {
        if let Some(raw) = literal {
            return match parse_literal(raw) {
                Some(parsed) => Ok(parsed?),
                None => Err(ResolveError::InvalidCoordinateFormat(raw.trim().to_string()).into()),
            };
        }
        Ok(self.resolver.resolve(&address.one_line()).await?)
    }

    fn with_region(&self, mut address: StructuredAddress) -> StructuredAddress {
        if address.country == Region::Unknown {
            address.country = self.classifier.classify_text(&address.one_line());
        }
        address
    }

    pub async fn create_site(&self, new: NewSite) -> Result<Site, StormError> {
        let nickname = new.nickname.trim().to_string();
        if nickname.is_empty() {
            return Err(StormError::InvalidSite("nickname is required".to_string()));
        }
        let line = new.address.one_line();
        if line.is_empty() {
            return Err(StormError::InvalidSite("address is required".to_string()));
        }

        let coordinate = self.locate(&new.address, new.coordinate.as_deref()).await?;
        let created_at = now_utc();
        let site = Site {
            id: site_id(&nickname, &line, &created_at),
            nickname,
            address: self.with_region(new.address),
            coordinate,
            category: new.category,
            contact: new.contact.filter(|c| !c.is_empty()),
            alert: EffectiveAlertState::default(),
            created_at,
            updated_at: created_at,
        };
        self.store()?.create_site(&site)?;
        tracing::info!("created site {} ({}) at {}", site.id, site.nickname, site.coordinate);
        Ok(site)
    }

    /// Applies an edit. Any geocoding happens first; the stored site is then
    /// re-read under the store lock so a refresh committed meanwhile keeps
    /// its alert state.
    pub async fn update_site(&self, id: &str, edit: SiteEdit) -> Result<Site, StormError> {
        let current = self.get_site(id)?;

        let nickname = match edit.nickname {
            Some(nickname) => {
                let nickname = nickname.trim().to_string();
                if nickname.is_empty() {
                    return Err(StormError::InvalidSite("nickname is required".to_string()));
                }
                Some(nickname)
            }
            None => None,
        };

        let address = edit.address.map(|address| StructuredAddress {
            country: Region::Unknown,
            ..address
        });
        let address_changed = address
            .as_ref()
            .is_some_and(|a| a.one_line() != current.address.one_line());
        let coordinate = match (&address, edit.coordinate.as_deref()) {
            (Some(address), raw) if raw.is_some() || address_changed => {
                Some(self.locate(address, raw).await?)
            }
            (None, Some(raw)) => Some(self.locate(&current.address, Some(raw)).await?),
            _ => None,
        };
        let address = address.map(|a| self.with_region(a));

        let site = {
            let mut store = self.store()?;
            let mut site = store
                .get_site(id)?
                .ok_or_else(|| StormError::SiteNotFound(id.to_string()))?;
            if let Some(nickname) = nickname {
                site.nickname = nickname;
            }
            if let Some(category) = edit.category {
                site.category = category;
            }
            if let Some(contact) = edit.contact {
                site.contact = (!contact.is_empty()).then_some(contact);
            }
            if let Some(address) = address {
                site.address = address;
            }
            if let Some(coordinate) = coordinate {
                site.coordinate = coordinate;
            }
            site.updated_at = now_utc();
            store.update_site(&site)?;
            site
        };
        tracing::info!("updated site {} ({})", site.id, site.nickname);
        Ok(site)
    }

    pub fn delete_site(&self, id: &str) -> Result<Site, StormError> {
        let site = self.store()?.delete_site(id)?;
        tracing::info!("removed site {} ({})", site.id, site.nickname);
        Ok(site)
    }

    pub fn get_site(&self, id: &str) -> Result<Site, StormError> {
        self.store()?
            .get_site(id)?
            .ok_or_else(|| StormError::SiteNotFound(id.to_string()))
    }

    pub fn list_sites(&self) -> Result<Vec<Site>, StormError> {
        self.store()?.list_sites()
    }

    /// Sites of one category, or all of them.
    pub fn list_sites_in(&self, category: Option<SiteCategory>) -> Result<Vec<Site>, StormError> {
        let mut sites = self.list_sites()?;
        if let Some(category) = category {
            sites.retain(|s| s.category == category);
        }
        Ok(sites)
    }

    pub fn info(&self) -> Result<StoreInfo, StormError> {
        self.store()?.info()
    }

    /// Pins a site's tier until the next refresh recomputes it from the feed.
    pub fn override_alert(&self, id: &str, tier: Tier) -> Result<Site, StormError> {
        let mut site = self.get_site(id)?;
        let label = match tier {
            Tier::None => String::new(),
            _ => format!("Manual {}", SeverityModel::headline(tier)),
        };
        site.alert = EffectiveAlertState {
            tier,
            headline: SeverityModel::headline(tier).to_string(),
            description: format!("Alert level manually set to {}.", tier),
            icon: SeverityModel::icon_for(&label, tier),
            label,
            source: AlertSource::Manual,
            hazard_id: None,
            updated_at: now_utc(),
        };
        site.updated_at = site.alert.updated_at;
        self.store()?.update_site(&site)?;
        tracing::info!("site {} manually set to {}", site.id, tier);
        Ok(site)
    }

    /// Runs one refresh cycle over every site. Overlapping calls are
    /// rejected with `CycleInProgress`.
    pub async fn refresh(&self) -> Result<RefreshReport, StormError> {
        let _cycle = self
            .cycle
            .try_lock()
            .map_err(|_| StormError::CycleInProgress)?;
        let cycle_started = now_utc();
        let sites = self.list_sites()?;
        tracing::debug!("refresh cycle over {} sites", sites.len());

        let mut tasks = JoinSet::new();
        for (position, site) in sites.into_iter().enumerate() {
            let feed = self.feed.clone();
            let correlator = Arc::clone(&self.correlator);
            let semaphore = Arc::clone(&self.semaphore);
            let fetch_timeout = self.fetch_timeout;
            tasks.spawn(async move {
                let outcome = match semaphore.acquire_owned().await {
                    Ok(_permit) => evaluate_site(feed, &correlator, site, fetch_timeout).await,
                    Err(_) => degraded(site, "scheduler closed"),
                };
                (position, outcome)
            });
        }

        let mut outcomes = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(pair) => outcomes.push(pair),
                Err(err) => tracing::warn!("site evaluation aborted: {}", err),
            }
        }
        outcomes.sort_by_key(|(position, _)| *position);

        let mut seen = HashSet::new();
        let mut hazards = Vec::new();
        let mut reports = Vec::with_capacity(outcomes.len());
        for (_, outcome) in outcomes {
            for hazard in outcome.hazards {
                if seen.insert(hazard.id.clone()) {
                    hazards.push(hazard);
                }
            }
            reports.push(outcome.report);
        }

        let states: Vec<(String, EffectiveAlertState)> = reports
            .iter()
            .map(|r| (r.site_id.clone(), r.state.clone()))
            .collect();
        let written = self.store()?.commit_states(&states)?;
        let degraded = reports.iter().filter(|r| r.degraded).count();
        tracing::info!(
            "refresh committed {} of {} sites ({} degraded, {} hazards)",
            written,
            reports.len(),
            degraded,
            hazards.len()
        );

        Ok(RefreshReport {
            cycle_started,
            sites: reports,
            hazards,
            degraded,
        })
    }

    /// Refreshes on a fixed period until `shutdown` resolves. Ticks missed
    /// while a cycle runs are skipped rather than queued.
    pub async fn watch<S, F>(&self, period: Duration, shutdown: S, mut on_report: F)
    where
        S: Future<Output = ()>,
        F: FnMut(&RefreshReport),
    {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("watch stopped");
                    return;
                }
                _ = ticker.tick() => {
                    match self.refresh().await {
                        Ok(report) => on_report(&report),
                        Err(StormError::CycleInProgress) => {
                            tracing::debug!("previous cycle still running; tick skipped");
                        }
                        Err(err) => tracing::warn!("refresh failed: {}", err),
                    }
                }
            }
        }
    }
}

/// Primary and fallback geocoders from the first two usable providers.
pub fn build_resolver(
    config: &AppConfig,
    client: reqwest::Client,
) -> Result<GeocodingResolver, StormError> {
    let providers = config.active_providers();
    let mut built = providers.iter().map(|p| build_provider(p, client.clone()));
    let primary = built
        .next()
        .ok_or_else(|| StormError::Config("no geocoding provider enabled".to_string()))??;
    let fallback = built.next().transpose()?;
    tracing::debug!(
        "geocoding via {}{}",
        primary.name(),
        fallback
            .as_ref()
            .map(|f| format!(" then {}", f.name()))
            .unwrap_or_default()
    );
    Ok(GeocodingResolver::new(primary, fallback)
        .with_timeout(Duration::from_millis(config.geocoding.call_timeout_ms)))
}

pub fn build_provider(
    cfg: &ProviderConfig,
    client: reqwest::Client,
) -> Result<Arc<dyn GeocodingProvider>, StormError> {
    Ok(match cfg.kind {
        ProviderKind::Google => {
            let key = cfg.resolved_key().ok_or_else(|| {
                StormError::Config(format!("provider {} requires an api key", cfg.name))
            })?;
            let base = cfg
                .base_url
                .clone()
                .unwrap_or_else(|| crate::sources::google::DEFAULT_BASE_URL.to_string());
            Arc::new(GoogleGeocoder::new(cfg.name.clone(), client, base, key))
        }
        ProviderKind::Nominatim => {
            let base = cfg
                .base_url
                .clone()
                .unwrap_or_else(|| crate::sources::nominatim::DEFAULT_BASE_URL.to_string());
            let interval = Duration::from_millis(cfg.min_interval_ms.unwrap_or(1_000));
            Arc::new(NominatimGeocoder::new(cfg.name.clone(), client, base, interval))
        }
    })
}

fn placeholder(site: Site, description: &str) -> SiteOutcome {
    SiteOutcome {
        report: SiteReport {
            site_id: site.id,
            nickname: site.nickname,
            coordinate: site.coordinate,
            region: site.address.country,
            state: EffectiveAlertState::clear(description),
            scope: None,
            applied: Vec::new(),
            hazard_ids: Vec::new(),
            degraded: false,
        },
        hazards: Vec::new(),
    }
}

fn degraded(site: Site, reason: &str) -> SiteOutcome {
    tracing::warn!("site {} degraded: {}", site.nickname, reason);
    let mut outcome = placeholder(site, &format!("Unable to fetch weather data: {reason}"));
    outcome.report.degraded = true;
    outcome
}

async fn evaluate_site(
    feed: Option<Arc<dyn HazardFeed>>,
    correlator: &HazardCorrelator,
    site: Site,
    fetch_timeout: Duration,
) -> SiteOutcome {
    let Some(feed) = feed else {
        return placeholder(site, FEED_DISABLED);
    };
    if !feed.supports(site.address.country) {
        return placeholder(site, UNSUPPORTED_REGION);
    }

    let batch = match tokio::time::timeout(fetch_timeout, feed.fetch(site.coordinate)).await {
        Err(_) => return degraded(site, "timed out"),
        Ok(Err(err)) => return degraded(site, &err.to_string()),
        Ok(Ok(batch)) => batch,
    };

    let ctx = correlator.context_for(&site);
    let outcome = correlator.evaluate(&ctx, &batch.records, batch.conditions.as_ref());
    let hazards: Vec<HazardRecord> = outcome
        .applied
        .iter()
        .filter_map(|a| batch.records.get(a.index).cloned())
        .collect();
    tracing::debug!(
        "{}: {} of {} hazards apply, tier {}",
        site.nickname,
        hazards.len(),
        batch.records.len(),
        outcome.state.tier
    );

    SiteOutcome {
        report: SiteReport {
            site_id: site.id,
            nickname: site.nickname,
            coordinate: site.coordinate,
            region: site.address.country,
            state: outcome.state,
            scope: Some(batch.scope),
            applied: outcome.applied,
            hazard_ids: hazards.iter().map(|h| h.id.clone()).collect(),
            degraded: false,
        },
        hazards,
    }
}
