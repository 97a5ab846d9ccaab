use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::core::tables::{us_state_by_code, CityCoordinate, CANADIAN_CITIES, STREET_TYPES};
use crate::core::types::NormalizedAddress;

static CA_POSTAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Za-z][0-9][A-Za-z] ?[0-9][A-Za-z][0-9]\b").expect("valid postal regex")
});

static US_ZIP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Z]{2}\s+([0-9]{5}(?:-[0-9]{4})?)\b").expect("valid zip regex")
});

static UK_POSTAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Za-z]{1,2}[0-9][A-Za-z0-9]? ?[0-9][A-Za-z]{2}\b").expect("valid uk regex")
});

static FIVE_DIGIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[0-9]{5}\b").expect("valid postal regex"));

static LEADING_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+[A-Za-z]?\s+").expect("valid number regex"));

static STATE_ZIP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Z]{2})\s+([0-9]{5}(?:-[0-9]{4})?)$").expect("valid state zip regex")
});

static PROVINCE_POSTAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Z]{2})\s+([A-Z][0-9][A-Z] [0-9][A-Z][0-9])$").expect("valid province regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostalFormat {
    Canadian,
    UsZip,
    Uk,
    FiveDigit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostalCode {
    pub value: String,
    pub format: PostalFormat,
}

/// Finds a postal code token. ZIPs and generic codes prefer the last
/// occurrence, since a leading five-digit number is usually a street number.
pub fn extract_postal(text: &str) -> Option<PostalCode> {
    if let Some(m) = CA_POSTAL_RE.find(text) {
        let chars: Vec<char> = m
            .as_str()
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| c.to_ascii_uppercase())
            .collect();
        let (fsa, ldu) = chars.split_at(chars.len().min(3));
        return Some(PostalCode {
            value: format!(
                "{} {}",
                fsa.iter().collect::<String>(),
                ldu.iter().collect::<String>()
            ),
            format: PostalFormat::Canadian,
        });
    }
    if let Some(caps) = US_ZIP_RE.captures_iter(text).last() {
        return Some(PostalCode {
            value: caps[1].to_string(),
            format: PostalFormat::UsZip,
        });
    }
    if let Some(m) = UK_POSTAL_RE.find(text) {
        return Some(PostalCode {
            value: m.as_str().to_uppercase(),
            format: PostalFormat::Uk,
        });
    }
    let leading_number = LEADING_NUMBER_RE.is_match(text);
    FIVE_DIGIT_RE
        .find_iter(text)
        .filter(|m| !(leading_number && m.start() == 0))
        .last()
        .map(|m| PostalCode {
            value: m.as_str().to_string(),
            format: PostalFormat::FiveDigit,
        })
}

fn segments_without_country(addr: &NormalizedAddress) -> Vec<&str> {
    let mut segments = addr.segments();
    if addr.components.country_hint.is_some() && segments.len() > 1 {
        segments.pop();
    }
    segments
}

/// Last two comma segments, usually "city, region".
pub fn simplified_query(addr: &NormalizedAddress) -> Option<String> {
    let segments = segments_without_country(addr);
    if segments.len() < 3 {
        return None;
    }
    Some(segments[segments.len() - 2..].join(", "))
}

/// The parsed city, or the first comma segment that is neither numeric-led nor a postal code.
pub fn city_query(addr: &NormalizedAddress) -> Option<String> {
    if let Some(city) = addr.components.city.as_deref() {
        if !city.starts_with(|c: char| c.is_ascii_digit()) {
            return Some(city.to_string());
        }
    }
    let segments = segments_without_country(addr);
    let upto = segments.len().saturating_sub(1).max(1);
    segments
        .iter()
        .take(upto)
        .find(|s| {
            !s.starts_with(|c: char| c.is_ascii_digit()) && extract_postal(s).map_or(true, |p| p.value.len() < s.len())
        })
        .map(|s| s.to_string())
}

fn province_code(addr: &NormalizedAddress) -> Option<String> {
    let region = addr.components.region.as_deref()?;
    crate::core::tables::province_by_code(region)
        .or_else(|| crate::core::tables::subdivision_by_name(region))
        .map(|p| p.code.to_string())
}

/// Canada-first query variants, most specific first.
pub fn canadian_queries(addr: &NormalizedAddress) -> Vec<String> {
    let city = addr.components.city.clone();
    let province = province_code(addr);
    let postal = addr
        .components
        .postal_code
        .clone()
        .or_else(|| extract_postal(&addr.canonical).map(|p| p.value));

    let mut out = Vec::new();
    if let (Some(city), Some(province)) = (&city, &province) {
        out.push(format!("{city}, {province}, Canada"));
        out.push(format!("{city}, {province}"));
    }
    if let (Some(city), Some(postal)) = (&city, &postal) {
        out.push(format!("{city} {postal}"));
    }
    if let (Some(province), Some(postal)) = (&province, &postal) {
        out.push(format!("{province} {postal}"));
    }
    if let Some(city) = &city {
        out.push(format!("{city}, Canada"));
    }
    if let Some(postal) = &postal {
        out.push(postal.clone());
    }
    if out.is_empty() {
        out.push(with_suffix(&addr.canonical, "Canada"));
    }
    dedupe(out)
}

/// Recombinations of street, city, region and postal code.
pub fn component_variations(addr: &NormalizedAddress) -> Vec<String> {
    let segments = segments_without_country(addr);
    let mut out = vec![addr.canonical.clone()];
    match segments.as_slice() {
        [street, city, tail, ..] => {
            if let Some(caps) = STATE_ZIP_RE.captures(tail) {
                let (state, zip) = (&caps[1], &caps[2]);
                out.push(format!("{city}, {state}"));
                out.push(format!("{city}, {state} {zip}"));
                out.push(format!("{street}, {city}, {state}"));
                out.push(format!("{city} {zip}"));
                out.push(format!("{state} {zip}"));
            } else if let Some(caps) = PROVINCE_POSTAL_RE.captures(tail) {
                let (province, postal) = (&caps[1], &caps[2]);
                out.push(format!("{city}, {province}, Canada"));
                out.push(format!("{city}, {province}"));
                out.push(format!("{city} {postal}, Canada"));
                out.push(format!("{street}, {city}, Canada"));
                out.push(format!("{postal}, Canada"));
            }
        }
        [first, tail] => {
            if let Some(caps) = STATE_ZIP_RE.captures(tail) {
                let (state, zip) = (&caps[1], &caps[2]);
                out.push(format!("{first}, {state}"));
                out.push(format!("{first} {zip}"));
                out.push(format!("{state} {zip}"));
            }
        }
        _ => {}
    }
    dedupe(out)
}

fn contains_word(haystack: &str, word: &str) -> bool {
    haystack
        .split(|c: char| !c.is_alphanumeric() && c != '.')
        .any(|w| w.trim_end_matches('.').eq_ignore_ascii_case(word))
}

fn with_suffix(text: &str, suffix: &str) -> String {
    format!("{}, {}", text.trim_end_matches(','), suffix)
}

fn replace_word(text: &str, from: &str, to: &str) -> String {
    let re = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(from)));
    match re {
        Ok(re) => re.replace_all(text, to).into_owned(),
        Err(_) => text.to_string(),
    }
}

/// US-flavoured rewrites: country suffixes, the first state code spelled out,
/// street-type swaps and the address without its house number.
pub fn us_variations(addr: &NormalizedAddress) -> Vec<String> {
    let base = segments_without_country(addr).join(", ");
    let mut out = vec![base.clone()];
    let lowered = addr.canonical.to_lowercase();
    for suffix in ["United States", "USA", "US"] {
        if !contains_phrase(&lowered, &suffix.to_lowercase()) {
            out.push(with_suffix(&base, suffix));
        }
    }

    let first_code = base
        .split(|c: char| !c.is_ascii_alphabetic())
        .find_map(|token| {
            (token.len() == 2 && token.chars().all(|c| c.is_ascii_uppercase()))
                .then(|| us_state_by_code(token))
                .flatten()
        });
    if let Some(state) = first_code {
        let expanded = Regex::new(&format!(r"\b{}\b", state.code))
            .map(|re| re.replace_all(&base, state.name).into_owned())
            .unwrap_or_else(|_| base.clone());
        out.push(expanded);
    }

    let (street, rest) = match base.split_once(", ") {
        Some((street, rest)) => (street.to_string(), Some(rest.to_string())),
        None => (base.clone(), None),
    };
    let rejoin = |s: String| match &rest {
        Some(rest) => format!("{s}, {rest}"),
        None => s,
    };
    for (full, abbr) in STREET_TYPES {
        if contains_word(&street, full) {
            out.push(rejoin(replace_word(&street, full, abbr)));
        } else if contains_word(&street, abbr) {
            out.push(rejoin(replace_word(&street, abbr, full)));
        }
    }

    if LEADING_NUMBER_RE.is_match(&base) {
        out.push(LEADING_NUMBER_RE.replace(&base, "").into_owned());
    }
    dedupe(out)
}

/// The address with and without a trailing "Canada".
pub fn canada_suffix_variations(addr: &NormalizedAddress) -> Vec<String> {
    let base = segments_without_country(addr).join(", ");
    dedupe(vec![with_suffix(&base, "Canada"), base])
}

fn fold_accents(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            'à' | 'â' | 'ä' | 'á' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'î' | 'ï' | 'í' => 'i',
            'ô' | 'ö' | 'ó' => 'o',
            'û' | 'ü' | 'ù' | 'ú' => 'u',
            'ç' => 'c',
            other => other,
        })
        .collect()
}

fn contains_phrase(haystack: &str, phrase: &str) -> bool {
    haystack.match_indices(phrase).any(|(at, _)| {
        let before = haystack[..at].chars().next_back();
        let after = haystack[at + phrase.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

/// Looks up a Canadian city in the built-in table. The parsed city is tried
/// before the other non-street segments; among substring hits the longest
/// name wins, and a single-typo match is accepted for longer names.
pub fn lookup_canadian_city(addr: &NormalizedAddress) -> Option<&'static CityCoordinate> {
    lookup_city_in(addr, CANADIAN_CITIES)
}

pub fn lookup_city_in<'t>(
    addr: &NormalizedAddress,
    table: &'t [CityCoordinate],
) -> Option<&'t CityCoordinate> {
    let mut haystacks: Vec<String> = Vec::new();
    if let Some(city) = &addr.components.city {
        haystacks.push(fold_accents(&city.to_lowercase()));
    }
    let segments = addr.segments();
    let skip = usize::from(segments.len() > 1);
    haystacks.extend(
        segments
            .iter()
            .skip(skip)
            .map(|s| fold_accents(&s.to_lowercase())),
    );

    for hay in &haystacks {
        let best = table
            .iter()
            .filter(|c| contains_phrase(hay, c.name))
            .max_by_key(|c| c.name.len());
        if best.is_some() {
            return best;
        }
    }

    let city = haystacks.first()?;
    table
        .iter()
        .filter(|c| c.name.len() >= 6)
        .map(|c| (strsim::levenshtein(city, c.name), c))
        .filter(|(d, _)| *d <= 1)
        .min_by_key(|(d, _)| *d)
        .map(|(_, c)| c)
}

pub fn dedupe(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|s| !s.trim().is_empty() && seen.insert(s.to_lowercase()))
        .collect()
}
