use std::fs;
use std::path::Path;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::engine::{RefreshReport, SiteReport};
use crate::core::types::{
    AlertSource, EffectiveAlertState, HazardRecord, OutputFormat, Site, Tier,
};

/// One line per site, independent of how the state was produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteRow {
    pub id: String,
    pub nickname: String,
    pub lat: f64,
    pub lng: f64,
    pub tier: Tier,
    pub label: String,
    pub icon: String,
    pub description: String,
    pub source: AlertSource,
    pub degraded: bool,
}

impl SiteRow {
    fn build(
        id: &str,
        nickname: &str,
        lat: f64,
        lng: f64,
        state: &EffectiveAlertState,
        degraded: bool,
    ) -> Self {
        Self {
            id: id.to_string(),
            nickname: nickname.to_string(),
            lat,
            lng,
            tier: state.tier,
            label: state.label.clone(),
            icon: state.icon.as_str().to_string(),
            description: state.description.clone(),
            source: state.source,
            degraded,
        }
    }
}

impl From<&SiteReport> for SiteRow {
    fn from(r: &SiteReport) -> Self {
        Self::build(&r.site_id, &r.nickname, r.coordinate.lat, r.coordinate.lng, &r.state, r.degraded)
    }
}

impl From<&Site> for SiteRow {
    fn from(s: &Site) -> Self {
        Self::build(&s.id, &s.nickname, s.coordinate.lat, s.coordinate.lng, &s.alert, false)
    }
}

#[derive(Serialize)]
struct ReportBundle<'a> {
    generated_at: DateTime<Utc>,
    sites: Vec<SiteRow>,
    hazards: &'a [HazardRecord],
    degraded: usize,
}

#[derive(Serialize)]
#[serde(tag = "record_type", content = "record")]
enum ReportRecord<'a> {
    #[serde(rename = "cycle")]
    Cycle {
        generated_at: DateTime<Utc>,
        sites: usize,
        degraded: usize,
    },
    #[serde(rename = "site")]
    Site(SiteRow),
    #[serde(rename = "hazard")]
    Hazard(&'a HazardRecord),
}

pub fn render_refresh(report: &RefreshReport, format: OutputFormat) -> Result<String> {
    let rows: Vec<SiteRow> = report.sites.iter().map(SiteRow::from).collect();
    render(report.cycle_started, rows, &report.hazards, report.degraded, format)
}

pub fn render_sites(sites: &[Site], generated_at: DateTime<Utc>, format: OutputFormat) -> Result<String> {
    let rows: Vec<SiteRow> = sites.iter().map(SiteRow::from).collect();
    render(generated_at, rows, &[], 0, format)
}

pub fn write_refresh_report(report: &RefreshReport, format: OutputFormat, path: &Path) -> Result<()> {
    let body = render_refresh(report, format)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, body)?;
    Ok(())
}

fn render(
    generated_at: DateTime<Utc>,
    sites: Vec<SiteRow>,
    hazards: &[HazardRecord],
    degraded: usize,
    format: OutputFormat,
) -> Result<String> {
    match format {
        OutputFormat::Json => {
            let bundle = ReportBundle {
                generated_at,
                sites,
                hazards,
                degraded,
            };
            Ok(serde_json::to_string_pretty(&bundle)?)
        }
        OutputFormat::Jsonl => {
            let mut out = String::new();
            let header = ReportRecord::Cycle {
                generated_at,
                sites: sites.len(),
                degraded,
            };
            out.push_str(&serde_json::to_string(&header)?);
            out.push('\n');
            for row in sites {
                out.push_str(&serde_json::to_string(&ReportRecord::Site(row))?);
                out.push('\n');
            }
            for hazard in hazards {
                out.push_str(&serde_json::to_string(&ReportRecord::Hazard(hazard))?);
                out.push('\n');
            }
            Ok(out)
        }
        OutputFormat::Markdown => Ok(markdown(generated_at, &sites, hazards, degraded)),
    }
}

fn markdown(
    generated_at: DateTime<Utc>,
    sites: &[SiteRow],
    hazards: &[HazardRecord],
    degraded: usize,
) -> String {
    let count = |tier: Tier| sites.iter().filter(|s| s.tier == tier).count();

    let mut out = String::new();
    out.push_str("# Site Weather Report\n\n");
    out.push_str(&format!("Generated {}\n\n", generated_at.to_rfc3339()));
    out.push_str("## Summary\n");
    out.push_str(&format!("- Sites: {}\n", sites.len()));
    out.push_str(&format!("- Warnings: {}\n", count(Tier::Warning)));
    out.push_str(&format!("- Watches: {}\n", count(Tier::Watch)));
    out.push_str(&format!("- Advisories: {}\n", count(Tier::Advisory)));
    if degraded > 0 {
        out.push_str(&format!("- Unavailable: {}\n", degraded));
    }
    out.push('\n');

    out.push_str("## Sites\n\n");
    if sites.is_empty() {
        out.push_str("No sites.\n\n");
    } else {
        out.push_str("| Site | Location | Level | Alert | Details |\n");
        out.push_str("|---|---|---|---|---|\n");
        let mut ordered: Vec<&SiteRow> = sites.iter().collect();
        ordered.sort_by(|a, b| b.tier.cmp(&a.tier).then_with(|| a.nickname.cmp(&b.nickname)));
        for row in ordered {
            let label = match (row.label.is_empty(), row.source) {
                (true, _) => "-".to_string(),
                (false, AlertSource::Manual) => format!("{} (manual)", row.label),
                (false, AlertSource::Feed) => row.label.clone(),
            };
            out.push_str(&format!(
                "| {} | {:.4}, {:.4} | {} | {} | {} |\n",
                cell(&row.nickname),
                row.lat,
                row.lng,
                row.tier,
                cell(&label),
                cell(&row.description)
            ));
        }
        out.push('\n');
    }

    if !hazards.is_empty() {
        out.push_str("## Active Hazards\n\n");
        for hazard in hazards {
            out.push_str(&format!("### {}\n", hazard.event));
            if let Some(headline) = &hazard.headline {
                out.push_str(&format!("- Headline: {}\n", headline));
            }
            out.push_str(&format!("- Area: {}\n", hazard.area_desc));
            out.push_str(&format!("- Urgency: {:?}\n", hazard.urgency));
            out.push_str(&format!("- Id: {}\n\n", hazard.id));
        }
    }
    out
}

fn cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Coordinate, HazardIcon, Region, Urgency};
    use chrono::TimeZone;

    fn report() -> RefreshReport {
        let at = Utc.with_ymd_and_hms(2024, 5, 6, 12, 0, 0).unwrap();
        let warned = EffectiveAlertState {
            tier: Tier::Warning,
            label: "Tornado Warning".into(),
            headline: "Severe Weather Warning".into(),
            description: "Take shelter | now".into(),
            icon: HazardIcon::Tornado,
            source: AlertSource::Feed,
            hazard_id: Some("hz-1".into()),
            updated_at: at,
        };
        let site = |id: &str, nickname: &str, state: EffectiveAlertState, degraded: bool| SiteReport {
            site_id: id.into(),
            nickname: nickname.into(),
            coordinate: Coordinate {
                lat: 35.4676,
                lng: -97.5164,
            },
            region: Region::Us,
            state,
            scope: None,
            applied: Vec::new(),
            hazard_ids: Vec::new(),
            degraded,
        };
        RefreshReport {
            cycle_started: at,
            sites: vec![
                site("site_a", "Alpha DC", EffectiveAlertState::clear("Unable to fetch weather data: timeout"), true),
                site("site_b", "Bravo Plant", warned, false),
            ],
            hazards: vec![HazardRecord {
                id: "hz-1".into(),
                event: "Tornado Warning".into(),
                urgency: Urgency::Immediate,
                geometry: None,
                area_desc: "Oklahoma, OK".into(),
                description: None,
                headline: Some("Tornado Warning issued".into()),
            }],
            degraded: 1,
        }
    }

    #[test]
    fn jsonl_has_header_sites_and_hazards() {
        let out = render_refresh(&report(), OutputFormat::Jsonl).unwrap();
        let lines: Vec<serde_json::Value> = out
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0]["record_type"], "cycle");
        assert_eq!(lines[0]["record"]["degraded"], 1);
        assert_eq!(lines[2]["record"]["tier"], "warning");
        assert_eq!(lines[2]["record"]["icon"], "tornado");
        assert_eq!(lines[3]["record_type"], "hazard");
    }

    #[test]
    fn json_bundle_lists_rows() {
        let out = render_refresh(&report(), OutputFormat::Json).unwrap();
        let v: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["sites"].as_array().unwrap().len(), 2);
        assert_eq!(v["sites"][0]["degraded"], true);
        assert_eq!(v["hazards"][0]["id"], "hz-1");
    }

    #[test]
    fn markdown_orders_by_tier_and_escapes_cells() {
        let out = render_refresh(&report(), OutputFormat::Markdown).unwrap();
        assert!(out.contains("- Warnings: 1"));
        assert!(out.contains("- Unavailable: 1"));
        let bravo = out.find("Bravo Plant").unwrap();
        let alpha = out.find("Alpha DC").unwrap();
        assert!(bravo < alpha);
        assert!(out.contains("Take shelter \\| now"));
        assert!(out.contains("### Tornado Warning"));
    }

    #[test]
    fn write_creates_parent_dirs() {
        let dir = std::env::temp_dir().join(format!("stormsite-report-{}", std::process::id()));
        let path = dir.join("nested").join("report.md");
        write_refresh_report(&report(), OutputFormat::Markdown, &path).unwrap();
        assert!(fs::read_to_string(&path).unwrap().starts_with("# Site Weather Report"));
        let _ = fs::remove_dir_all(dir);
    }
}
