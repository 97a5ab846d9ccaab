use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::core::tables::{
    province_by_code, subdivision_by_code, subdivision_by_name, DOTTED_ABBREVIATIONS,
    EU_COUNTRIES,
};
use crate::core::types::{AddressComponents, NormalizedAddress};

static GLUED_STREET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(Road|Rd|Street|St|Avenue|Ave|Boulevard|Blvd|Drive|Dr|Lane|Ln|Court|Ct|Place|Pl|Circle|Cir|Terrace|Ter|Trail|Way|Parkway|Pkwy|Highway|Hwy)([A-Z][a-z]+)",
    )
    .expect("valid glued street regex")
});

static CA_POSTAL_LOOSE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([A-Za-z][0-9][A-Za-z])\s?([0-9][A-Za-z][0-9])\b").expect("valid postal regex")
});

static US_STATE_ZIP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([A-Za-z.])\s+([A-Z]{2}\s+[0-9]{5}(?:-[0-9]{4})?)\b").expect("valid zip regex")
});

static PROVINCE_POSTAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([A-Za-z.])\s+(([A-Z]{2})\s+[A-Z][0-9][A-Z] [0-9][A-Z][0-9])\b")
        .expect("valid province regex")
});

static BARE_POSTAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([A-Za-z.]+)\s+([A-Z][0-9][A-Z] [0-9][A-Z][0-9])\b").expect("valid postal regex")
});

static TRAILING_COUNTRY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)([0-9])\s+(canada|usa|united states|mexico)$").expect("valid country regex")
});

static REGION_SEGMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^([A-Za-z][A-Za-z .]*?)(?:\s+([0-9]{5}(?:-[0-9]{4})?|[A-Z][0-9][A-Z] [0-9][A-Z][0-9]))?$",
    )
    .expect("valid region segment regex")
});

static POSTAL_ONLY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]{5}(?:-[0-9]{4})?|[A-Z][0-9][A-Z] [0-9][A-Z][0-9])$")
        .expect("valid postal regex")
});

const COUNTRY_SEGMENTS: &[&str] = &[
    "canada",
    "usa",
    "us",
    "u.s.a.",
    "u.s.",
    "united states",
    "united states of america",
    "mexico",
    "méxico",
    "uk",
];

/// Cleans raw address text into a canonical comma-separated form and parses
/// its components.
#[derive(Debug, Clone, Copy, Default)]
pub struct AddressNormalizer;

impl AddressNormalizer {
    pub fn new() -> Self {
        Self
    }

    pub fn normalize(&self, raw: &str) -> NormalizedAddress {
        let mut text = collapse_whitespace(raw);
        text = GLUED_STREET_RE.replace_all(&text, "$1, $2").into_owned();
        text = CA_POSTAL_LOOSE_RE
            .replace_all(&text, |caps: &Captures| {
                format!("{} {}", caps[1].to_uppercase(), caps[2].to_uppercase())
            })
            .into_owned();
        text = US_STATE_ZIP_RE.replace_all(&text, "$1, $2").into_owned();
        text = PROVINCE_POSTAL_RE
            .replace_all(&text, |caps: &Captures| {
                if province_by_code(&caps[3]).is_some() {
                    format!("{}, {}", &caps[1], &caps[2])
                } else {
                    caps[0].to_string()
                }
            })
            .into_owned();
        text = BARE_POSTAL_RE
            .replace_all(&text, |caps: &Captures| {
                let word = &caps[1];
                let is_code = word.len() == 2
                    && word.chars().all(|c| c.is_ascii_uppercase())
                    && subdivision_by_code(word).is_some();
                if is_code {
                    caps[0].to_string()
                } else {
                    format!("{}, {}", word, &caps[2])
                }
            })
            .into_owned();
        text = TRAILING_COUNTRY_RE.replace(&text, "$1, $2").into_owned();
        text = repair_punctuation(&text);
        text = expand_street_abbreviations(&text);

        let components = parse_components(&text);
        NormalizedAddress {
            canonical: text,
            components,
        }
    }
}

fn collapse_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn repair_punctuation(text: &str) -> String {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Expands dotted abbreviations in the street segment. The first word of a
/// segment is left alone so names like "St. Catharines" survive.
fn expand_street_abbreviations(text: &str) -> String {
    let mut segments: Vec<String> = text.split(", ").map(str::to_string).collect();
    if segments.is_empty() {
        return text.to_string();
    }
    let words: Vec<String> = segments[0]
        .split(' ')
        .enumerate()
        .map(|(i, word)| {
            if i == 0 {
                return word.to_string();
            }
            match DOTTED_ABBREVIATIONS
                .iter()
                .find(|(abbr, _)| abbr.eq_ignore_ascii_case(word))
            {
                Some((_, full)) if word.starts_with(|c: char| c.is_lowercase()) => {
                    full.to_lowercase()
                }
                Some((_, full)) => full.to_string(),
                None => word.to_string(),
            }
        })
        .collect();
    segments[0] = words.join(" ");
    segments.join(", ")
}

fn is_country_segment(segment: &str) -> bool {
    let lower = segment.trim().to_lowercase();
    COUNTRY_SEGMENTS.contains(&lower.as_str()) || EU_COUNTRIES.contains(&lower.as_str())
}

fn region_of_segment(segment: &str) -> Option<(String, Option<String>)> {
    let caps = REGION_SEGMENT_RE.captures(segment)?;
    let name = caps.get(1)?.as_str().trim();
    let known = (name.len() == 2 && subdivision_by_code(name).is_some())
        || subdivision_by_name(name).is_some();
    if !known {
        return None;
    }
    Some((name.to_string(), caps.get(2).map(|m| m.as_str().to_string())))
}

pub fn parse_components(canonical: &str) -> AddressComponents {
    let mut segments: Vec<&str> = canonical
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    let mut components = AddressComponents::default();

    if segments.len() > 1 {
        if let Some(last) = segments.last() {
            if is_country_segment(last) {
                components.country_hint = Some(last.to_string());
                segments.pop();
            }
        }
    }

    let region_at = segments
        .iter()
        .enumerate()
        .skip(1)
        .rev()
        .find_map(|(i, seg)| region_of_segment(seg).map(|found| (i, found)));

    match region_at {
        Some((i, (region, postal))) => {
            components.region = Some(region);
            components.postal_code = postal;
            if i >= 1 {
                components.city = Some(segments[i - 1].to_string());
            }
            if i >= 2 {
                components.street = Some(segments[..i - 1].join(", "));
            }
        }
        None => {
            let rest: Vec<&str> = segments
                .iter()
                .copied()
                .filter(|s| !POSTAL_ONLY_RE.is_match(s))
                .collect();
            match rest.as_slice() {
                [] => {}
                [only] if only.starts_with(|c: char| c.is_ascii_digit()) => {
                    components.street = Some(only.to_string());
                }
                [only] => components.city = Some(only.to_string()),
                [street, city, ..] => {
                    components.street = Some(street.to_string());
                    components.city = Some(city.to_string());
                }
            }
        }
    }

    if components.postal_code.is_none() {
        components.postal_code = segments
            .iter()
            .find(|s| POSTAL_ONLY_RE.is_match(s))
            .map(|s| s.to_string());
    }
    components
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(raw: &str) -> NormalizedAddress {
        AddressNormalizer::new().normalize(raw)
    }

    #[test]
    fn collapses_whitespace_and_commas() {
        let n = norm("  1 Main St ,,  Tulsa ,  OK   74103 ");
        assert_eq!(n.canonical, "1 Main St, Tulsa, OK 74103");
    }

    #[test]
    fn splits_glued_street_and_city() {
        let n = norm("525 Boundary RdCornwall, ON K6H 6K8, Canada");
        assert_eq!(n.canonical, "525 Boundary Rd, Cornwall, ON K6H 6K8, Canada");
        assert_eq!(n.components.city.as_deref(), Some("Cornwall"));
        assert_eq!(n.components.region.as_deref(), Some("ON"));
        assert_eq!(n.components.postal_code.as_deref(), Some("K6H 6K8"));
        assert_eq!(n.components.country_hint.as_deref(), Some("Canada"));
        assert_eq!(n.components.street.as_deref(), Some("525 Boundary Rd"));
    }

    #[test]
    fn inserts_comma_before_state_and_zip() {
        let n = norm("1 Apple Park Way Cupertino CA 95014");
        assert_eq!(n.canonical, "1 Apple Park Way Cupertino, CA 95014");
        assert_eq!(n.components.region.as_deref(), Some("CA"));
        assert_eq!(n.components.postal_code.as_deref(), Some("95014"));
    }

    #[test]
    fn keeps_province_with_postal_code() {
        let n = norm("100 Pitt St Cornwall ON k6h6k8");
        assert_eq!(n.canonical, "100 Pitt St Cornwall, ON K6H 6K8");

        let bare = norm("100 Pitt St Cornwall K6H 6K8");
        assert_eq!(bare.canonical, "100 Pitt St Cornwall, K6H 6K8");
    }

    #[test]
    fn expands_street_abbreviations_only_in_street_segment() {
        let n = norm("12 Queen St. Apt. 4, St. Catharines, ON");
        assert_eq!(n.canonical, "12 Queen Street Apartment 4, St. Catharines, ON");

        let soo = norm("1 Bay St., Sault Ste. Marie, ON");
        assert_eq!(soo.canonical, "1 Bay Street, Sault Ste. Marie, ON");
    }

    #[test]
    fn trailing_country_gets_its_own_segment() {
        let n = norm("Cornwall, ON K6H 6K8 Canada");
        assert_eq!(n.canonical, "Cornwall, ON K6H 6K8, Canada");
    }

    #[test]
    fn normalization_is_idempotent() {
        for raw in [
            "525 Boundary RdCornwall, ON K6H 6K8, Canada",
            "1 Apple Park Way Cupertino CA 95014",
            "12 Queen St. Apt. 4, St. Catharines, ON",
            "Madison, WI",
            "Calle 5 de Mayo 10, Colonia Centro, Ciudad de Mexico",
        ] {
            let once = norm(raw);
            let twice = norm(&once.canonical);
            assert_eq!(once, twice, "not idempotent for {raw}");
        }
    }

    #[test]
    fn parses_city_only_and_street_city_forms() {
        let city = norm("Toronto");
        assert_eq!(city.components.city.as_deref(), Some("Toronto"));

        let pair = norm("9 Stuart Road, Chelmsford");
        assert_eq!(pair.components.street.as_deref(), Some("9 Stuart Road"));
        assert_eq!(pair.components.city.as_deref(), Some("Chelmsford"));

        let full_name = norm("2 Elm St, Springfield, Illinois 62701");
        assert_eq!(full_name.components.region.as_deref(), Some("Illinois"));
        assert_eq!(full_name.components.city.as_deref(), Some("Springfield"));
    }
}
