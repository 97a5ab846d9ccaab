use std::sync::LazyLock;

use regex::Regex;

use crate::core::tables::{
    subdivision_by_code, subdivision_by_name, Subdivision, CA_PROVINCES, EU_COUNTRIES,
    MX_ADDRESS_HINTS, MX_STATES, US_STATES,
};
use crate::core::types::{NormalizedAddress, Region};
use crate::pipeline::normalizer::AddressNormalizer;

static CA_POSTAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Za-z][0-9][A-Za-z] ?[0-9][A-Za-z][0-9]\b").expect("valid postal regex")
});

static SLOT_CODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z]{2})(?:\s+(?:[0-9]{5}(?:-[0-9]{4})?|[A-Z][0-9][A-Z] ?[0-9][A-Z][0-9]))?$")
        .expect("valid slot regex")
});

static CODE_ZIP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([A-Z]{2})\s+[0-9]{5}(?:-[0-9]{4})?\b").expect("valid zip regex")
});

static TRAILING_ZIP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[0-9]{5}(?:-[0-9]{4})?$").expect("valid zip regex"));

static UK_POSTAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Z]{1,2}[0-9][A-Z0-9]? ?[0-9][A-Z]{2}\b").expect("valid uk regex")
});

static LEADING_POSTAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[0-9]{4} ?[A-Z]{2}|[0-9]{5})\s+\p{L}").expect("valid eu postal regex")
});

static US_KEYWORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:united states(?: of america)?|usa|u\.s\.a\.?|u\.s\.)(?:\W|$)")
        .expect("valid us regex")
});

static CANADA_KEYWORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bcanada\b").expect("valid canada regex"));

static MEXICO_KEYWORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:m[eé]xico|cdmx)\b").expect("valid mexico regex"));

static NEW_MEXICO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bnew\s+mexico\b").expect("valid mask regex"));

static EU_KEYWORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    let names = EU_COUNTRIES
        .iter()
        .map(|n| regex::escape(n))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b(?:{names}|uk)\b")).expect("valid europe regex")
});

fn word_regex(phrase: &str) -> Regex {
    Regex::new(&format!(r"(?i)\b{}\b", regex::escape(phrase))).expect("valid word regex")
}

static MX_STATE_RES: LazyLock<Vec<Regex>> =
    LazyLock::new(|| MX_STATES.iter().map(|n| word_regex(n)).collect());

static US_NAME_RES: LazyLock<Vec<(Regex, &'static Subdivision)>> =
    LazyLock::new(|| US_STATES.iter().map(|s| (word_regex(s.name), s)).collect());

static CA_NAME_RES: LazyLock<Vec<(Regex, &'static Subdivision)>> =
    LazyLock::new(|| CA_PROVINCES.iter().map(|s| (word_regex(s.name), s)).collect());

/// Everything after the street line. Street names borrow place names
/// ("France Ave", "Prince of Wales Dr"), so only later segments count.
/// A single-segment address is taken whole.
fn beyond_street(address: &NormalizedAddress) -> String {
    match address.segments().split_first() {
        Some((_, rest)) if !rest.is_empty() => rest.join(", "),
        _ => address.canonical.clone(),
    }
}

/// One region heuristic. Rules are consulted in order and the first verdict wins.
pub trait RegionRule: Send + Sync {
    fn name(&self) -> &'static str;
    fn classify(&self, address: &NormalizedAddress) -> Option<Region>;
}

/// Country names spelled out after the street line. When several appear the
/// one furthest right wins, since countries trail.
pub struct ExplicitCountryRule;

impl RegionRule for ExplicitCountryRule {
    fn name(&self) -> &'static str {
        "explicit-country"
    }

    fn classify(&self, address: &NormalizedAddress) -> Option<Region> {
        let scope = beyond_street(address);
        let masked = NEW_MEXICO_RE.replace_all(&scope, "");
        let mut best: Option<(usize, Region)> = None;
        let candidates: [(&Regex, Region); 4] = [
            (&US_KEYWORD_RE, Region::Us),
            (&CANADA_KEYWORD_RE, Region::Canada),
            (&MEXICO_KEYWORD_RE, Region::Mexico),
            (&EU_KEYWORD_RE, Region::Europe),
        ];
        for (re, region) in candidates {
            if let Some(pos) = re.find_iter(&masked).map(|m| m.start()).last() {
                if best.map_or(true, |(at, _)| pos >= at) {
                    best = Some((pos, region));
                }
            }
        }
        let segments = address.segments();
        if best.is_none() && segments.len() > 1 && segments.last() == Some(&"US") {
            return Some(Region::Us);
        }
        best.map(|(_, region)| region)
    }
}

pub struct CanadianPostalRule;

impl RegionRule for CanadianPostalRule {
    fn name(&self) -> &'static str {
        "canadian-postal"
    }

    fn classify(&self, address: &NormalizedAddress) -> Option<Region> {
        CA_POSTAL_RE
            .is_match(&address.canonical)
            .then_some(Region::Canada)
    }
}

/// Two-letter state or province code standing alone in a comma segment
/// (optionally followed by its postal code), or directly before a ZIP.
pub struct SubdivisionCodeRule;

impl RegionRule for SubdivisionCodeRule {
    fn name(&self) -> &'static str {
        "subdivision-code"
    }

    fn classify(&self, address: &NormalizedAddress) -> Option<Region> {
        let segments = address.segments();
        for seg in segments.iter().skip(1).rev() {
            if let Some(caps) = SLOT_CODE_RE.captures(seg) {
                if let Some(sub) = subdivision_by_code(&caps[1]) {
                    return Some(sub.region);
                }
            }
        }
        CODE_ZIP_RE
            .captures_iter(&address.canonical)
            .filter_map(|caps| subdivision_by_code(&caps[1]))
            .map(|sub| sub.region)
            .next()
    }
}

pub struct SubdivisionNameRule;

impl RegionRule for SubdivisionNameRule {
    fn name(&self) -> &'static str {
        "subdivision-name"
    }

    fn classify(&self, address: &NormalizedAddress) -> Option<Region> {
        let scope = beyond_street(address);
        let text = scope.as_str();
        if MX_STATES
            .iter()
            .zip(MX_STATE_RES.iter())
            .any(|(name, re)| name.contains(' ') && re.is_match(text))
        {
            return Some(Region::Mexico);
        }
        if CA_NAME_RES.iter().any(|(re, _)| re.is_match(text)) {
            return Some(Region::Canada);
        }
        if US_NAME_RES.iter().any(|(re, _)| re.is_match(text)) {
            return Some(Region::Us);
        }
        if MX_STATE_RES.iter().any(|re| re.is_match(text)) {
            return Some(Region::Mexico);
        }
        let lower = address.canonical.to_lowercase();
        MX_ADDRESS_HINTS
            .iter()
            .any(|hint| lower.split([' ', ',']).any(|w| w == *hint))
            .then_some(Region::Mexico)
    }
}

/// A ZIP closing a comma segment.
pub struct UsZipRule;

impl RegionRule for UsZipRule {
    fn name(&self) -> &'static str {
        "us-zip"
    }

    fn classify(&self, address: &NormalizedAddress) -> Option<Region> {
        address
            .segments()
            .iter()
            .skip(1)
            .any(|seg| TRAILING_ZIP_RE.is_match(seg))
            .then_some(Region::Us)
    }
}

/// UK postcodes anywhere, or a postcode leading a non-street segment
/// ("10117 Berlin", "1012 LG Amsterdam").
pub struct EuropeanPostalRule;

impl RegionRule for EuropeanPostalRule {
    fn name(&self) -> &'static str {
        "european-postal"
    }

    fn classify(&self, address: &NormalizedAddress) -> Option<Region> {
        if UK_POSTAL_RE.is_match(&address.canonical) {
            return Some(Region::Europe);
        }
        address
            .segments()
            .iter()
            .skip(1)
            .any(|seg| LEADING_POSTAL_RE.is_match(seg))
            .then_some(Region::Europe)
    }
}

pub struct RegionClassifier {
    rules: Vec<Box<dyn RegionRule>>,
}

impl Default for RegionClassifier {
    fn default() -> Self {
        Self::new(vec![
            Box::new(ExplicitCountryRule),
            Box::new(CanadianPostalRule),
            Box::new(SubdivisionCodeRule),
            Box::new(SubdivisionNameRule),
            Box::new(UsZipRule),
            Box::new(EuropeanPostalRule),
        ])
    }
}

impl RegionClassifier {
    pub fn new(rules: Vec<Box<dyn RegionRule>>) -> Self {
        Self { rules }
    }

    /// Adds a rule ahead of the existing ones.
    pub fn with_rule(mut self, rule: Box<dyn RegionRule>) -> Self {
        self.rules.insert(0, rule);
        self
    }

    pub fn classify(&self, address: &NormalizedAddress) -> Region {
        for rule in &self.rules {
            if let Some(region) = rule.classify(address) {
                tracing::trace!("region {} via rule {}", region, rule.name());
                return region;
            }
        }
        Region::Unknown
    }

    pub fn classify_text(&self, raw: &str) -> Region {
        self.classify(&AddressNormalizer::new().normalize(raw))
    }

    /// The US state or Canadian province an address sits in, if one can be named.
    pub fn subdivision(&self, address: &NormalizedAddress) -> Option<&'static Subdivision> {
        if let Some(region) = address.components.region.as_deref() {
            let found = if region.len() == 2 {
                subdivision_by_code(region)
            } else {
                subdivision_by_name(region)
            };
            if found.is_some() {
                return found;
            }
        }
        for seg in address.segments().iter().skip(1).rev() {
            if let Some(caps) = SLOT_CODE_RE.captures(seg) {
                if let Some(sub) = subdivision_by_code(&caps[1]) {
                    return Some(sub);
                }
            }
        }
        let scope = beyond_street(address);
        CA_NAME_RES
            .iter()
            .chain(US_NAME_RES.iter())
            .find(|(re, _)| re.is_match(&scope))
            .map(|(_, sub)| *sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(raw: &str) -> Region {
        RegionClassifier::default().classify_text(raw)
    }

    #[test]
    fn state_code_wins_over_canadian_collisions() {
        assert_eq!(classify("Madison, WI"), Region::Us);
        assert_eq!(classify("1 Apple Park Way, Cupertino, CA 95014"), Region::Us);
        assert_eq!(classify("Suite 5 on Main, Springfield, IL"), Region::Us);
    }

    #[test]
    fn canadian_postal_and_province_codes() {
        assert_eq!(classify("123 Main, ON K1A 0B1"), Region::Canada);
        assert_eq!(classify("Toronto, ON"), Region::Canada);
        assert_eq!(classify("Halifax, Nova Scotia"), Region::Canada);
        assert_eq!(
            classify("525 Boundary Rd, Cornwall, ON K6H 6K8, Canada"),
            Region::Canada
        );
    }

    #[test]
    fn two_letter_codes_need_word_boundaries() {
        // "on" and "in" appear inside words and as words, never in the state slot.
        assert_eq!(classify("Union Station, Downtown"), Region::Unknown);
        assert_eq!(classify("Lot 4 in the back, Onslow"), Region::Unknown);
    }

    #[test]
    fn explicit_keywords_beat_codes() {
        assert_eq!(classify("Avenida Reforma 222, CDMX"), Region::Mexico);
        assert_eq!(classify("Monterrey, Nuevo Leon, Mexico"), Region::Mexico);
        assert_eq!(classify("Albuquerque, New Mexico"), Region::Us);
        assert_eq!(classify("Berlin, Germany"), Region::Europe);
        assert_eq!(classify("10 Downing St, London, UK"), Region::Europe);
        assert_eq!(classify("Lancaster, PA, United States"), Region::Us);
    }

    #[test]
    fn place_names_in_street_line_are_ignored() {
        assert_eq!(classify("7001 France Ave S, Edina, MN 55435"), Region::Us);
        assert_eq!(classify("200 Ireland Ave, Tulsa, OK 74103"), Region::Us);
        assert_eq!(classify("1 Prince of Wales Dr, Ottawa, ON"), Region::Canada);
        assert_eq!(classify("50 Georgia St, Vancouver, BC"), Region::Canada);
    }

    #[test]
    fn postal_patterns_are_weak_signals() {
        assert_eq!(classify("500 Elm, Somewhere 73102"), Region::Us);
        assert_eq!(classify("Unter den Linden 1, 10117 Berlin"), Region::Europe);
        assert_eq!(classify("Baker Street, NW1 6XE"), Region::Europe);
    }

    #[test]
    fn classification_is_idempotent() {
        let normalizer = AddressNormalizer::new();
        let classifier = RegionClassifier::default();
        for raw in ["Madison, WI", "123 Main, ON K1A 0B1", "Berlin, Germany", "Nowhere"] {
            let once = normalizer.normalize(raw);
            let twice = normalizer.normalize(&once.canonical);
            assert_eq!(classifier.classify(&once), classifier.classify(&twice));
            assert_eq!(classifier.classify(&once), classifier.classify(&once));
        }
    }

    #[test]
    fn injected_rule_runs_first() {
        struct AlwaysEurope;
        impl RegionRule for AlwaysEurope {
            fn name(&self) -> &'static str {
                "always-europe"
            }
            fn classify(&self, _: &NormalizedAddress) -> Option<Region> {
                Some(Region::Europe)
            }
        }
        let classifier = RegionClassifier::default().with_rule(Box::new(AlwaysEurope));
        assert_eq!(classifier.classify_text("Madison, WI"), Region::Europe);
    }

    #[test]
    fn subdivision_from_code_name_or_text() {
        let normalizer = AddressNormalizer::new();
        let classifier = RegionClassifier::default();
        let okc = normalizer.normalize("100 N Broadway, Oklahoma City, OK 73102");
        assert_eq!(classifier.subdivision(&okc).map(|s| s.name), Some("Oklahoma"));

        let named = normalizer.normalize("Ottawa, Ontario");
        assert_eq!(classifier.subdivision(&named).map(|s| s.code), Some("ON"));

        let nm = normalizer.normalize("Albuquerque, New Mexico");
        assert_eq!(classifier.subdivision(&nm).map(|s| s.code), Some("NM"));
    }
}
