use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::error::HazardError;
use crate::core::geo::point_in_ring;
use crate::core::hash::hazard_key;
use crate::core::tables::Subdivision;
use crate::core::time::now_utc;
use crate::core::types::{
    AlertSource, Conditions, Coordinate, EffectiveAlertState, HazardGeometry, HazardRecord, Site,
    Tier, Urgency,
};
use crate::pipeline::classifier::RegionClassifier;
use crate::pipeline::normalizer::AddressNormalizer;
use crate::pipeline::scorer::SeverityModel;

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// What to do when the feed is non-empty but nothing matches by geometry or area text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FallbackPolicy {
    /// Treat every record as applicable; the feed was already scoped to the site.
    #[default]
    IncludeAll,
    Strict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchBasis {
    Polygon,
    AreaDescription,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AppliedHazard {
    /// Position in the input slice.
    pub index: usize,
    pub basis: MatchBasis,
    pub tier: Tier,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationOutcome {
    pub state: EffectiveAlertState,
    pub applied: Vec<AppliedHazard>,
    pub winner: Option<usize>,
}

/// The parts of a site the correlator looks at.
#[derive(Debug, Clone, Copy)]
pub struct SiteContext {
    pub coordinate: Coordinate,
    pub subdivision: Option<&'static Subdivision>,
}

pub struct HazardCorrelator {
    model: SeverityModel,
    policy: FallbackPolicy,
    normalizer: AddressNormalizer,
    classifier: RegionClassifier,
}

impl Default for HazardCorrelator {
    fn default() -> Self {
        Self::new(SeverityModel::default(), FallbackPolicy::default())
    }
}

impl HazardCorrelator {
    pub fn new(model: SeverityModel, policy: FallbackPolicy) -> Self {
        Self {
            model,
            policy,
            normalizer: AddressNormalizer::new(),
            classifier: RegionClassifier::default(),
        }
    }

    pub fn policy(&self) -> FallbackPolicy {
        self.policy
    }

    pub fn context_for(&self, site: &Site) -> SiteContext {
        let normalized = self.normalizer.normalize(&site.address.one_line());
        SiteContext {
            coordinate: site.coordinate,
            subdivision: self.classifier.subdivision(&normalized),
        }
    }

    pub fn correlate(&self, site: &Site, hazards: &[HazardRecord]) -> EffectiveAlertState {
        self.evaluate(&self.context_for(site), hazards, None).state
    }

    /// Parses a raw feed (a GeoJSON FeatureCollection or a bare array) and
    /// correlates the well-formed records. Malformed records are skipped.
    pub fn correlate_feed(
        &self,
        site: &Site,
        feed: &Value,
        conditions: Option<&Conditions>,
    ) -> Result<(Vec<HazardRecord>, CorrelationOutcome), HazardError> {
        let (records, skipped) = parse_collection(feed)?;
        for err in &skipped {
            tracing::warn!("skipping hazard for {}: {}", site.nickname, err);
        }
        let outcome = self.evaluate(&self.context_for(site), &records, conditions);
        Ok((records, outcome))
    }

    pub fn evaluate(
        &self,
        site: &SiteContext,
        hazards: &[HazardRecord],
        conditions: Option<&Conditions>,
    ) -> CorrelationOutcome {
        let mut applied: Vec<AppliedHazard> = hazards
            .iter()
            .enumerate()
            .filter_map(|(index, hazard)| {
                self.match_basis(site, hazard).map(|basis| AppliedHazard {
                    index,
                    basis,
                    tier: self.model.hazard_tier(&hazard.event, hazard.urgency),
                })
            })
            .collect();

        if applied.is_empty() && !hazards.is_empty() && self.policy == FallbackPolicy::IncludeAll {
            tracing::debug!(
                "no hazard matched by geometry or area; treating all {} as applicable",
                hazards.len()
            );
            applied = hazards
                .iter()
                .enumerate()
                .map(|(index, hazard)| AppliedHazard {
                    index,
                    basis: MatchBasis::Fallback,
                    tier: self.model.hazard_tier(&hazard.event, hazard.urgency),
                })
                .collect();
        }

        let mut winner: Option<&AppliedHazard> = None;
        for candidate in &applied {
            if winner.map_or(true, |best| candidate.tier > best.tier) {
                winner = Some(candidate);
            }
        }

        let Some(winner) = winner.copied() else {
            return CorrelationOutcome {
                state: EffectiveAlertState::clear(quiet_description(conditions)),
                applied,
                winner: None,
            };
        };

        let top = &hazards[winner.index];
        let label = SeverityModel::select_label(
            applied.iter().map(|a| hazards[a.index].event.as_str()),
            &top.event,
        );
        let description = top
            .description
            .as_deref()
            .map(|d| WHITESPACE_RE.replace_all(d.trim(), " ").into_owned())
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| synthesize_description(winner.tier, &top.event, conditions));

        let state = EffectiveAlertState {
            tier: winner.tier,
            icon: SeverityModel::icon_for(&label, winner.tier),
            headline: SeverityModel::headline(winner.tier).to_string(),
            label,
            description,
            source: AlertSource::Feed,
            hazard_id: Some(top.id.clone()),
            updated_at: now_utc(),
        };
        CorrelationOutcome {
            state,
            applied,
            winner: Some(winner.index),
        }
    }

    fn match_basis(&self, site: &SiteContext, hazard: &HazardRecord) -> Option<MatchBasis> {
        if let Some(ring) = hazard.geometry.as_ref().and_then(|g| g.outer_ring()) {
            return point_in_ring(&site.coordinate, ring).then_some(MatchBasis::Polygon);
        }
        let sub = site.subdivision?;
        area_mentions(&hazard.area_desc, sub).then_some(MatchBasis::AreaDescription)
    }
}

/// Full name anywhere (any case), or the upper-case code as a whole word.
fn area_mentions(area_desc: &str, sub: &Subdivision) -> bool {
    if area_desc
        .to_lowercase()
        .contains(&sub.name.to_lowercase())
    {
        return true;
    }
    area_desc
        .split(|c: char| !c.is_ascii_alphanumeric())
        .any(|word| word == sub.code)
}

fn quiet_description(conditions: Option<&Conditions>) -> String {
    match conditions.filter(|c| !c.short_forecast.is_empty()) {
        Some(c) => format!(
            "No active weather alerts. Current conditions: {}. {}",
            c.short_forecast, c.detailed_forecast
        )
        .trim_end()
        .to_string(),
        None => "No active weather alerts.".to_string(),
    }
}

fn synthesize_description(tier: Tier, event: &str, conditions: Option<&Conditions>) -> String {
    let headline = SeverityModel::headline(tier);
    match conditions.filter(|c| !c.short_forecast.is_empty()) {
        Some(c) => format!(
            "{} - {}. {}",
            headline.to_uppercase(),
            c.short_forecast,
            c.detailed_forecast
        )
        .trim_end()
        .to_string(),
        None => format!("{headline}: {event}"),
    }
}

/// Splits a feed into well-formed records and per-record errors.
pub fn parse_collection(
    feed: &Value,
) -> Result<(Vec<HazardRecord>, Vec<HazardError>), HazardError> {
    let items = match feed {
        Value::Array(items) => items,
        Value::Object(map) => match map.get("features") {
            Some(Value::Array(items)) => items,
            _ => return Err(HazardError::NotACollection),
        },
        _ => return Err(HazardError::NotACollection),
    };
    let mut records = Vec::with_capacity(items.len());
    let mut skipped = Vec::new();
    for (index, item) in items.iter().enumerate() {
        match parse_feature(index, item) {
            Ok(record) => records.push(record),
            Err(err) => skipped.push(err),
        }
    }
    Ok((records, skipped))
}

pub fn parse_feature(index: usize, item: &Value) -> Result<HazardRecord, HazardError> {
    let malformed = |reason: &str| HazardError::MalformedRecord {
        index,
        reason: reason.to_string(),
    };
    if !item.is_object() {
        return Err(malformed("not an object"));
    }
    let props = item.get("properties").filter(|p| p.is_object()).unwrap_or(item);
    let text = |key: &str| {
        props
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    let event = text("event").ok_or_else(|| malformed("missing event"))?;
    let area_desc = text("areaDesc").unwrap_or_default();
    let id = item
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| text("id"))
        .unwrap_or_else(|| hazard_key(&event, &area_desc, index));
    let urgency = text("urgency")
        .map(|u| Urgency::parse(&u))
        .unwrap_or_default();
    let geometry = match item.get("geometry") {
        None | Some(Value::Null) => None,
        Some(geom) => parse_geometry(geom).map_err(|reason| malformed(&reason))?,
    };

    Ok(HazardRecord {
        id,
        event,
        urgency,
        geometry,
        area_desc,
        description: text("description"),
        headline: text("headline"),
    })
}

fn parse_geometry(geom: &Value) -> Result<Option<HazardGeometry>, String> {
    let kind = geom.get("type").and_then(Value::as_str).unwrap_or_default();
    let coords = geom.get("coordinates");
    let polygons = match (kind, coords) {
        ("Polygon", Some(rings)) => vec![parse_rings(rings)?],
        ("MultiPolygon", Some(Value::Array(polys))) => polys
            .iter()
            .map(parse_rings)
            .collect::<Result<Vec<_>, _>>()?,
        _ => return Ok(None),
    };
    if polygons.iter().all(|rings| rings.is_empty()) {
        return Ok(None);
    }
    Ok(Some(HazardGeometry { polygons }))
}

fn parse_rings(rings: &Value) -> Result<Vec<Vec<Coordinate>>, String> {
    let rings = rings.as_array().ok_or("polygon is not an array")?;
    rings
        .iter()
        .map(|ring| -> Result<Vec<Coordinate>, String> {
            ring.as_array()
                .ok_or_else(|| "ring is not an array".to_string())?
                .iter()
                .map(parse_vertex)
                .collect()
        })
        .collect()
}

fn parse_vertex(vertex: &Value) -> Result<Coordinate, String> {
    match vertex.as_array().map(Vec::as_slice) {
        Some([lng, lat, ..]) => match (lng.as_f64(), lat.as_f64()) {
            (Some(lng), Some(lat)) => Ok(Coordinate { lat, lng }),
            _ => Err(format!("non-numeric vertex {vertex}")),
        },
        _ => Err(format!("bad vertex {vertex}")),
    }
}
