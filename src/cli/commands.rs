use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};

use crate::cli::flags::{AddressArgs, Cli, Command, OutputFormatArg, PolicyArg, SiteCommand};
use crate::config::{apply_provider_filter, load_config, AppConfig};
use crate::core::engine::{build_provider, build_resolver, Engine, RefreshReport};
use crate::core::time::now_utc;
use crate::core::types::{Coordinate, NewSite, OutputFormat, SiteEdit, StructuredAddress};
use crate::geocode::AttemptOutcome;
use crate::pipeline::classifier::RegionClassifier;
use crate::pipeline::correlator::{parse_collection, HazardCorrelator, SiteContext};
use crate::pipeline::normalizer::AddressNormalizer;
use crate::pipeline::reporter::{render_refresh, render_sites, write_refresh_report};
use crate::pipeline::scorer::SeverityModel;
use crate::sources::nws::NwsFeed;
use crate::sources::{build_http_client, GeocodingProvider, HazardFeed};

const PROBE_ADDRESS: &str = "1600 Pennsylvania Avenue NW, Washington, DC 20500";
const PROBE_POINT: Coordinate = Coordinate {
    lat: 38.8977,
    lng: -77.0365,
};

pub async fn run(cli: Cli) -> Result<()> {
    let mut cfg = load_config(cli.config.as_deref())?;
    cfg = apply_provider_filter(cfg, cli.providers.as_deref());
    if let Some(db_path) = &cli.db_path {
        cfg.db_path = db_path.clone();
    }

    match cli.command {
        Command::Resolve { address, trace } => run_resolve(&cfg, &address, trace).await,
        Command::Site { action } => run_site(&cfg, action).await,
        Command::Refresh {
            watch,
            interval,
            format,
            output,
        } => run_refresh(&cfg, watch, interval, format, output).await,
        Command::Correlate {
            feed,
            lat,
            lng,
            address,
            policy,
        } => run_correlate(&cfg, &feed, lat, lng, address.as_deref(), policy),
        Command::Diagnose => run_diagnose(&cfg).await,
    }
}

async fn run_resolve(cfg: &AppConfig, address: &str, trace: bool) -> Result<()> {
    let client = build_http_client(&cfg.user_agent, cfg.timeout_ms)?;
    let resolver = build_resolver(cfg, client)?;
    let resolution = resolver
        .resolve_traced(address)
        .await
        .with_context(|| format!("resolving {address}"))?;

    if trace {
        for attempt in &resolution.attempts {
            let (mark, detail) = match &attempt.outcome {
                AttemptOutcome::Resolved { coordinate, .. } => ("ok", coordinate.to_string()),
                AttemptOutcome::Failed { reason } => ("--", reason.clone()),
            };
            println!(
                "{mark} {:<18} {:<10} {:<3} {} => {}",
                attempt.strategy,
                attempt.provider,
                attempt.country_bias.as_deref().unwrap_or("-"),
                attempt.query,
                detail
            );
        }
    }
    println!("{}", serde_json::to_string_pretty(&resolution)?);
    Ok(())
}

async fn run_site(cfg: &AppConfig, action: SiteCommand) -> Result<()> {
    let engine = Engine::new(cfg)?;
    match action {
        SiteCommand::Add {
            nickname,
            address,
            category,
            contact,
            coordinate,
        } => {
            let site = engine
                .create_site(NewSite {
                    nickname,
                    address: address.merge_into(&StructuredAddress::default()),
                    category,
                    contact: contact.to_contact(),
                    coordinate,
                })
                .await?;
            println!("{}", serde_json::to_string_pretty(&site)?);
        }
        SiteCommand::List { format, category } => {
            let sites = engine.list_sites_in(category)?;
            print!("{}", render_sites(&sites, now_utc(), format.into())?);
        }
        SiteCommand::Show { id } => {
            let site = engine.get_site(&id)?;
            println!("{}", serde_json::to_string_pretty(&site)?);
        }
        SiteCommand::Edit {
            id,
            nickname,
            address,
            category,
            contact,
            coordinate,
        } => {
            let existing = engine.get_site(&id)?;
            let edit = SiteEdit {
                nickname,
                address: edited_address(&address, &existing.address),
                category,
                contact: contact.to_contact(),
                coordinate,
            };
            let site = engine.update_site(&id, edit).await?;
            println!("{}", serde_json::to_string_pretty(&site)?);
        }
        SiteCommand::Remove { id } => {
            let site = engine.delete_site(&id)?;
            println!("removed {} ({})", site.id, site.nickname);
        }
        SiteCommand::Override { id, tier } => {
            let site = engine.override_alert(&id, tier)?;
            println!("{} set to {} until the next refresh", site.nickname, site.alert.tier);
        }
    }
    Ok(())
}

fn edited_address(args: &AddressArgs, current: &StructuredAddress) -> Option<StructuredAddress> {
    (!args.is_empty()).then(|| args.merge_into(current))
}

async fn run_refresh(
    cfg: &AppConfig,
    watch: bool,
    interval: Option<u64>,
    format: OutputFormatArg,
    output: Option<PathBuf>,
) -> Result<()> {
    let engine = Engine::new(cfg)?;
    let format: OutputFormat = format.into();

    if !watch {
        let report = engine.refresh().await?;
        return emit(&report, format, output.as_deref());
    }

    let period = Duration::from_secs(interval.unwrap_or(cfg.refresh_interval_secs).max(1));
    tracing::info!("watching sites every {}s; Ctrl-C to stop", period.as_secs());
    let shutdown = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!("cannot listen for Ctrl-C: {}", err);
            std::future::pending::<()>().await;
        }
    };
    engine
        .watch(period, shutdown, |report| {
            if let Err(err) = emit(report, format, output.as_deref()) {
                tracing::warn!("report output failed: {}", err);
            }
        })
        .await;
    Ok(())
}

fn emit(report: &RefreshReport, format: OutputFormat, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            write_refresh_report(report, format, path)?;
            tracing::info!("report written to {}", path.display());
        }
        None => print!("{}", render_refresh(report, format)?),
    }
    Ok(())
}

fn run_correlate(
    cfg: &AppConfig,
    feed: &Path,
    lat: f64,
    lng: f64,
    address: Option<&str>,
    policy: Option<PolicyArg>,
) -> Result<()> {
    let coordinate = Coordinate::new(lat, lng)?;
    let raw = fs::read_to_string(feed).with_context(|| format!("reading {}", feed.display()))?;
    let value: serde_json::Value = serde_json::from_str(&raw)?;
    let (records, skipped) = parse_collection(&value)?;
    for err in &skipped {
        tracing::warn!("{}", err);
    }

    let subdivision = address.and_then(|a| {
        let normalized = AddressNormalizer::new().normalize(a);
        RegionClassifier::default().subdivision(&normalized)
    });
    let policy = policy
        .map(Into::into)
        .unwrap_or(cfg.correlation.fallback_policy);
    let correlator = HazardCorrelator::new(SeverityModel::default(), policy);
    let outcome = correlator.evaluate(
        &SiteContext {
            coordinate,
            subdivision,
        },
        &records,
        None,
    );

    let applied: Vec<serde_json::Value> = outcome
        .applied
        .iter()
        .filter_map(|a| {
            records.get(a.index).map(|r| {
                serde_json::json!({
                    "id": r.id,
                    "event": r.event,
                    "basis": a.basis,
                    "tier": a.tier,
                })
            })
        })
        .collect();
    let body = serde_json::json!({
        "state": outcome.state,
        "applied": applied,
        "records": records.len(),
        "skipped": skipped.len(),
    });
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

async fn run_diagnose(cfg: &AppConfig) -> Result<()> {
    let client = build_http_client(&cfg.user_agent, cfg.timeout_ms)?;
    let mut failures = 0usize;

    let active = cfg.active_providers();
    if active.is_empty() {
        println!("FAIL geocoding: no usable provider configured");
        failures += 1;
    }
    for provider_cfg in active {
        let provider = build_provider(provider_cfg, client.clone())?;
        let started = Instant::now();
        let call = provider.search(PROBE_ADDRESS, Some("us"));
        match tokio::time::timeout(Duration::from_millis(cfg.geocoding.call_timeout_ms), call).await {
            Ok(Ok(candidates)) if !candidates.is_empty() => println!(
                "ok   {}: {} candidates, first {} ({} ms)",
                provider.name(),
                candidates.len(),
                candidates[0].coordinate,
                started.elapsed().as_millis()
            ),
            Ok(Ok(_)) => {
                failures += 1;
                println!("FAIL {}: no candidates for probe address", provider.name());
            }
            Ok(Err(err)) => {
                failures += 1;
                println!("FAIL {}: {}", provider.name(), err);
            }
            Err(_) => {
                failures += 1;
                println!("FAIL {}: timed out", provider.name());
            }
        }
    }

    if cfg.hazard_feed.enabled {
        let feed = NwsFeed::new(client, cfg.hazard_feed.base_url.clone());
        let started = Instant::now();
        let call = feed.fetch(PROBE_POINT);
        match tokio::time::timeout(Duration::from_millis(cfg.hazard_feed.call_timeout_ms), call).await {
            Ok(Ok(batch)) => println!(
                "ok   {}: {} active alerts via {} ({} ms)",
                feed.name(),
                batch.records.len(),
                batch.scope,
                started.elapsed().as_millis()
            ),
            Ok(Err(err)) => {
                failures += 1;
                println!("FAIL {}: {}", feed.name(), err);
            }
            Err(_) => {
                failures += 1;
                println!("FAIL {}: timed out", feed.name());
            }
        }
    } else {
        println!("skip hazard feed: disabled");
    }

    if failures > 0 {
        return Err(anyhow!("{failures} check(s) failed"));
    }
    Ok(())
}
