use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::error::ResolveError;
use crate::core::time::now_utc;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Result<Self, ResolveError> {
        let coord = Self { lat, lng };
        if coord.is_valid() {
            Ok(coord)
        } else {
            Err(ResolveError::InvalidCoordinateFormat(format!(
                "latitude {lat} / longitude {lng} out of range"
            )))
        }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}, {:.6}", self.lat, self.lng)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Region {
    Us,
    Canada,
    Mexico,
    Europe,
    #[default]
    Unknown,
}

impl Region {
    /// Two-letter country code used to bias provider queries.
    pub fn country_code(&self) -> Option<&'static str> {
        match self {
            Region::Us => Some("us"),
            Region::Canada => Some("ca"),
            Region::Mexico => Some("mx"),
            Region::Europe | Region::Unknown => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Us => "us",
            Region::Canada => "canada",
            Region::Mexico => "mexico",
            Region::Europe => "europe",
            Region::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredAddress {
    pub street: String,
    pub city: String,
    /// State or province, code or full name.
    pub region: String,
    pub postal_code: String,
    #[serde(default)]
    pub country: Region,
}

impl StructuredAddress {
    /// `"street, city, REGION postal"`, skipping blank parts.
    pub fn one_line(&self) -> String {
        let tail = [self.region.trim(), self.postal_code.trim()]
            .iter()
            .filter(|s| !s.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(" ");
        [self.street.trim(), self.city.trim(), tail.as_str()]
            .iter()
            .filter(|s| !s.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressComponents {
    pub street: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub postal_code: Option<String>,
    pub country_hint: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedAddress {
    pub canonical: String,
    pub components: AddressComponents,
}

impl NormalizedAddress {
    pub fn segments(&self) -> Vec<&str> {
        self.canonical
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SiteCategory {
    Warehouse,
    Plant,
    #[serde(rename = "3pl-warehouse")]
    ThirdPartyWarehouse,
    Office,
    Supplier,
    MachineShop,
    Land,
    Parking,
    #[default]
    Other,
}

impl SiteCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            SiteCategory::Warehouse => "warehouse",
            SiteCategory::Plant => "plant",
            SiteCategory::ThirdPartyWarehouse => "3pl-warehouse",
            SiteCategory::Office => "office",
            SiteCategory::Supplier => "supplier",
            SiteCategory::MachineShop => "machine-shop",
            SiteCategory::Land => "land",
            SiteCategory::Parking => "parking",
            SiteCategory::Other => "other",
        }
    }
}

impl FromStr for SiteCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "warehouse" => Ok(SiteCategory::Warehouse),
            "plant" => Ok(SiteCategory::Plant),
            "3pl-warehouse" | "3pl" => Ok(SiteCategory::ThirdPartyWarehouse),
            "office" => Ok(SiteCategory::Office),
            "supplier" => Ok(SiteCategory::Supplier),
            "machine-shop" => Ok(SiteCategory::MachineShop),
            "land" => Ok(SiteCategory::Land),
            "parking" => Ok(SiteCategory::Parking),
            "other" | "" => Ok(SiteCategory::Other),
            other => Err(format!("unknown site category: {other}")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub name: Option<String>,
    pub title: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl Contact {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.title.is_none() && self.phone.is_none() && self.email.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    None,
    Advisory,
    Watch,
    Warning,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::None => "none",
            Tier::Advisory => "advisory",
            Tier::Watch => "watch",
            Tier::Warning => "warning",
        }
    }

    pub fn rank(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(Tier::None),
            "advisory" => Ok(Tier::Advisory),
            "watch" => Ok(Tier::Watch),
            "warning" => Ok(Tier::Warning),
            other => Err(format!("unknown tier: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Urgency {
    Immediate,
    Expected,
    Future,
    #[default]
    Unknown,
}

impl Urgency {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "immediate" => Urgency::Immediate,
            "expected" => Urgency::Expected,
            "future" => Urgency::Future,
            _ => Urgency::Unknown,
        }
    }
}

/// Polygons as lists of rings; each ring is a closed list of vertices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HazardGeometry {
    pub polygons: Vec<Vec<Vec<Coordinate>>>,
}

impl HazardGeometry {
    /// Outer ring of the first polygon, when it has enough vertices to enclose an area.
    pub fn outer_ring(&self) -> Option<&[Coordinate]> {
        self.polygons
            .first()
            .and_then(|rings| rings.first())
            .filter(|ring| ring.len() >= 3)
            .map(|ring| ring.as_slice())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HazardRecord {
    pub id: String,
    pub event: String,
    pub urgency: Urgency,
    pub geometry: Option<HazardGeometry>,
    pub area_desc: String,
    pub description: Option<String>,
    pub headline: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conditions {
    pub short_forecast: String,
    pub detailed_forecast: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AlertSource {
    #[default]
    Feed,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HazardIcon {
    Tornado,
    Thunderstorm,
    Flood,
    Wind,
    Winter,
    Heat,
    Fire,
    Fog,
    Tropical,
    Avalanche,
    Marine,
    Warning,
    Watch,
    Advisory,
    Clear,
}

impl HazardIcon {
    pub fn as_str(&self) -> &'static str {
        match self {
            HazardIcon::Tornado => "tornado",
            HazardIcon::Thunderstorm => "thunderstorm",
            HazardIcon::Flood => "flood",
            HazardIcon::Wind => "wind",
            HazardIcon::Winter => "winter",
            HazardIcon::Heat => "heat",
            HazardIcon::Fire => "fire",
            HazardIcon::Fog => "fog",
            HazardIcon::Tropical => "tropical",
            HazardIcon::Avalanche => "avalanche",
            HazardIcon::Marine => "marine",
            HazardIcon::Warning => "warning",
            HazardIcon::Watch => "watch",
            HazardIcon::Advisory => "advisory",
            HazardIcon::Clear => "clear",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectiveAlertState {
    pub tier: Tier,
    pub label: String,
    pub headline: String,
    pub description: String,
    pub icon: HazardIcon,
    pub source: AlertSource,
    #[serde(default)]
    pub hazard_id: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl EffectiveAlertState {
    pub fn clear(description: impl Into<String>) -> Self {
        Self {
            tier: Tier::None,
            label: String::new(),
            headline: "No Active Alerts".to_string(),
            description: description.into(),
            icon: HazardIcon::Clear,
            source: AlertSource::Feed,
            hazard_id: None,
            updated_at: now_utc(),
        }
    }
}

impl Default for EffectiveAlertState {
    fn default() -> Self {
        Self::clear("No active weather alerts.")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub id: String,
    pub nickname: String,
    pub address: StructuredAddress,
    pub coordinate: Coordinate,
    pub category: SiteCategory,
    #[serde(default)]
    pub contact: Option<Contact>,
    pub alert: EffectiveAlertState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewSite {
    pub nickname: String,
    pub address: StructuredAddress,
    pub category: SiteCategory,
    pub contact: Option<Contact>,
    /// Literal `"lat, lng"` supplied instead of geocoding.
    pub coordinate: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SiteEdit {
    pub nickname: Option<String>,
    pub address: Option<StructuredAddress>,
    pub category: Option<SiteCategory>,
    pub contact: Option<Contact>,
    pub coordinate: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Jsonl,
    Markdown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_are_ordered() {
        assert!(Tier::None < Tier::Advisory);
        assert!(Tier::Advisory < Tier::Watch);
        assert!(Tier::Watch < Tier::Warning);
        assert_eq!(Tier::Warning.rank(), 3);
    }

    #[test]
    fn one_line_skips_blank_parts() {
        let addr = StructuredAddress {
            street: "1 Apple Park Way".into(),
            city: "Cupertino".into(),
            region: "CA".into(),
            postal_code: "95014".into(),
            country: Region::Us,
        };
        assert_eq!(addr.one_line(), "1 Apple Park Way, Cupertino, CA 95014");

        let partial = StructuredAddress {
            city: "Toronto".into(),
            region: "ON".into(),
            ..Default::default()
        };
        assert_eq!(partial.one_line(), "Toronto, ON");
    }

    #[test]
    fn coordinate_range_is_checked() {
        assert!(Coordinate::new(90.0, -180.0).is_ok());
        assert!(Coordinate::new(90.5, 0.0).is_err());
        assert!(Coordinate::new(0.0, 181.0).is_err());
    }

    #[test]
    fn category_parses_3pl() {
        assert_eq!(
            "3pl-warehouse".parse::<SiteCategory>().unwrap(),
            SiteCategory::ThirdPartyWarehouse
        );
        assert!("castle".parse::<SiteCategory>().is_err());
    }
}
