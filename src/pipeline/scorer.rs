use std::cmp::Ordering;
use std::collections::HashMap;

use crate::core::types::{HazardIcon, Tier, Urgency};

pub const DEFAULT_SEVERITY_TABLE: &[(&str, Tier)] = &[
    ("Tornado Warning", Tier::Warning),
    ("Severe Thunderstorm Warning", Tier::Warning),
    ("Flash Flood Warning", Tier::Warning),
    ("Flood Warning", Tier::Warning),
    ("Extreme Wind Warning", Tier::Warning),
    ("Severe Weather Statement", Tier::Warning),
    ("Coastal Flood Warning", Tier::Warning),
    ("Severe Local Storm", Tier::Warning),
    ("Severe Weather", Tier::Warning),
    ("Tornado Watch", Tier::Watch),
    ("Severe Thunderstorm Watch", Tier::Watch),
    ("Flash Flood Watch", Tier::Watch),
    ("Flood Watch", Tier::Watch),
    ("Wind Advisory", Tier::Advisory),
    ("Heat Advisory", Tier::Advisory),
    ("Flood Advisory", Tier::Advisory),
    ("Dense Fog Advisory", Tier::Advisory),
    ("Winter Weather Advisory", Tier::Advisory),
    ("Coastal Flood Advisory", Tier::Advisory),
    ("Rip Current Statement", Tier::Advisory),
    ("Special Weather Statement", Tier::Advisory),
];

/// Labels preferred for display, most significant first. Matched as substrings
/// of the event label.
pub const LABEL_PRIORITY: &[&str] = &[
    "Tornado Warning",
    "Tornado Watch",
    "Severe Thunderstorm Warning",
    "Severe Thunderstorm Watch",
    "Flash Flood Warning",
    "Flood Warning",
    "Flood Watch",
    "Flood Advisory",
    "Extreme Wind Warning",
    "Severe Weather Statement",
    "Special Weather Statement",
];

const ICON_KEYWORDS: &[(&[&str], HazardIcon)] = &[
    (&["tornado"], HazardIcon::Tornado),
    (&["hurricane", "tropical"], HazardIcon::Tropical),
    (&["winter", "snow", "blizzard", "ice storm", "freeze"], HazardIcon::Winter),
    (&["thunderstorm", "storm"], HazardIcon::Thunderstorm),
    (&["flood"], HazardIcon::Flood),
    (&["wind"], HazardIcon::Wind),
    (&["heat"], HazardIcon::Heat),
    (&["fire", "red flag"], HazardIcon::Fire),
    (&["fog", "smoke"], HazardIcon::Fog),
    (&["avalanche"], HazardIcon::Avalanche),
    (&["marine", "small craft", "gale"], HazardIcon::Marine),
];

/// Event-type to tier knowledge. Unknown event types map to advisory.
#[derive(Debug, Clone)]
pub struct SeverityModel {
    table: HashMap<String, Tier>,
}

impl Default for SeverityModel {
    fn default() -> Self {
        let table = DEFAULT_SEVERITY_TABLE
            .iter()
            .map(|(label, tier)| (label.to_lowercase(), *tier))
            .collect();
        Self { table }
    }
}

impl SeverityModel {
    pub fn with_mapping(mut self, label: &str, tier: Tier) -> Self {
        self.table.insert(label.trim().to_lowercase(), tier);
        self
    }

    pub fn tier_for(&self, event: &str) -> Tier {
        self.table
            .get(&event.trim().to_lowercase())
            .copied()
            .unwrap_or(Tier::Advisory)
    }

    /// Tier after urgency elevation.
    pub fn hazard_tier(&self, event: &str, urgency: Urgency) -> Tier {
        let base = self.tier_for(event);
        if urgency == Urgency::Future {
            Self::elevate(base)
        } else {
            base
        }
    }

    pub fn elevate(tier: Tier) -> Tier {
        match tier {
            Tier::None => Tier::Advisory,
            Tier::Advisory => Tier::Watch,
            Tier::Watch | Tier::Warning => Tier::Warning,
        }
    }

    pub fn compare(a: Tier, b: Tier) -> Ordering {
        a.rank().cmp(&b.rank())
    }

    /// First priority label found among `events`, else `fallback`.
    pub fn select_label<'a, I>(events: I, fallback: &str) -> String
    where
        I: IntoIterator<Item = &'a str> + Clone,
    {
        for wanted in LABEL_PRIORITY {
            if events.clone().into_iter().any(|e| e.contains(wanted)) {
                return wanted.to_string();
            }
        }
        fallback.to_string()
    }

    pub fn icon_for(label: &str, tier: Tier) -> HazardIcon {
        let lower = label.to_lowercase();
        ICON_KEYWORDS
            .iter()
            .find(|(words, _)| words.iter().any(|w| lower.contains(w)))
            .map(|(_, icon)| *icon)
            .unwrap_or(match tier {
                Tier::Warning => HazardIcon::Warning,
                Tier::Watch => HazardIcon::Watch,
                Tier::Advisory => HazardIcon::Advisory,
                Tier::None => HazardIcon::Clear,
            })
    }

    pub fn headline(tier: Tier) -> &'static str {
        match tier {
            Tier::Warning => "Severe Weather Warning",
            Tier::Watch => "Weather Watch",
            Tier::Advisory => "Weather Advisory",
            Tier::None => "No Active Alerts",
        }
    }
}
