use crate::core::types::{Coordinate, NormalizedAddress, Region};
use crate::geocode::variants::{
    canada_suffix_variations, canadian_queries, city_query, component_variations, extract_postal,
    lookup_canadian_city, simplified_query, us_variations, PostalFormat,
};

/// Country name candidates must report when a Canadian filter is applied.
pub const CANADA: &str = "Canada";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderSlot {
    Primary,
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedQuery {
    pub query: String,
    pub slot: ProviderSlot,
    pub bias: Option<&'static str>,
    pub require_country: Option<&'static str>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Query(PlannedQuery),
    Fixed { label: String, coordinate: Coordinate },
}

pub struct ResolveContext<'a> {
    pub address: &'a NormalizedAddress,
    pub region: Region,
}

impl ResolveContext<'_> {
    fn is_canadian(&self) -> bool {
        self.region == Region::Canada
    }

    fn bias(&self) -> Option<&'static str> {
        self.region.country_code()
    }

    fn query(&self, query: String, slot: ProviderSlot, bias: Option<&'static str>) -> Step {
        let require_country = (bias == Some("ca")).then_some(CANADA);
        Step::Query(PlannedQuery {
            query,
            slot,
            bias,
            require_country,
        })
    }
}

/// One link of the resolution chain. Strategies only plan queries; the
/// resolver runs them in order and stops at the first accepted candidate.
pub trait Strategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn plan(&self, ctx: &ResolveContext<'_>) -> Vec<Step>;
}

pub struct CanadianVariants;

impl Strategy for CanadianVariants {
    fn name(&self) -> &'static str {
        "canadian-variants"
    }

    fn plan(&self, ctx: &ResolveContext<'_>) -> Vec<Step> {
        if !ctx.is_canadian() {
            return Vec::new();
        }
        canadian_queries(ctx.address)
            .into_iter()
            .map(|q| ctx.query(q, ProviderSlot::Primary, Some("ca")))
            .collect()
    }
}

/// European addresses geocode best without a region hint.
pub struct Unrestricted;

impl Strategy for Unrestricted {
    fn name(&self) -> &'static str {
        "unrestricted"
    }

    fn plan(&self, ctx: &ResolveContext<'_>) -> Vec<Step> {
        if ctx.region != Region::Europe {
            return Vec::new();
        }
        vec![ctx.query(ctx.address.canonical.clone(), ProviderSlot::Primary, None)]
    }
}

pub struct RegionBiased;

impl Strategy for RegionBiased {
    fn name(&self) -> &'static str {
        "primary"
    }

    fn plan(&self, ctx: &ResolveContext<'_>) -> Vec<Step> {
        vec![ctx.query(ctx.address.canonical.clone(), ProviderSlot::Primary, ctx.bias())]
    }
}

pub struct FallbackProvider;

impl Strategy for FallbackProvider {
    fn name(&self) -> &'static str {
        "fallback-provider"
    }

    fn plan(&self, ctx: &ResolveContext<'_>) -> Vec<Step> {
        vec![ctx.query(ctx.address.canonical.clone(), ProviderSlot::Fallback, None)]
    }
}

pub struct Simplified;

impl Strategy for Simplified {
    fn name(&self) -> &'static str {
        "simplified"
    }

    fn plan(&self, ctx: &ResolveContext<'_>) -> Vec<Step> {
        simplified_query(ctx.address)
            .map(|q| vec![ctx.query(q, ProviderSlot::Primary, ctx.bias())])
            .unwrap_or_default()
    }
}

pub struct CityOnly;

impl Strategy for CityOnly {
    fn name(&self) -> &'static str {
        "city-only"
    }

    fn plan(&self, ctx: &ResolveContext<'_>) -> Vec<Step> {
        let Some(city) = city_query(ctx.address) else {
            return Vec::new();
        };
        let mut steps = Vec::new();
        if ctx.is_canadian() {
            steps.push(ctx.query(format!("{city}, {CANADA}"), ProviderSlot::Primary, Some("ca")));
        }
        steps.push(ctx.query(city, ProviderSlot::Primary, None));
        steps
    }
}

pub struct PostalOnly;

impl Strategy for PostalOnly {
    fn name(&self) -> &'static str {
        "postal-only"
    }

    fn plan(&self, ctx: &ResolveContext<'_>) -> Vec<Step> {
        let Some(postal) = extract_postal(&ctx.address.canonical) else {
            return Vec::new();
        };
        let bias = match postal.format {
            PostalFormat::Canadian => Some("ca"),
            PostalFormat::UsZip => Some("us"),
            PostalFormat::Uk | PostalFormat::FiveDigit => None,
        };
        vec![ctx.query(postal.value, ProviderSlot::Primary, bias)]
    }
}

pub struct AddressVariants;

impl Strategy for AddressVariants {
    fn name(&self) -> &'static str {
        "variants"
    }

    fn plan(&self, ctx: &ResolveContext<'_>) -> Vec<Step> {
        let mut queries = component_variations(ctx.address);
        match ctx.region {
            Region::Us => queries.extend(us_variations(ctx.address)),
            Region::Canada => queries.extend(canada_suffix_variations(ctx.address)),
            _ => {}
        }
        queries
            .into_iter()
            .map(|q| ctx.query(q, ProviderSlot::Primary, ctx.bias()))
            .collect()
    }
}

pub struct StaticCityTable;

impl Strategy for StaticCityTable {
    fn name(&self) -> &'static str {
        "static-table"
    }

    fn plan(&self, ctx: &ResolveContext<'_>) -> Vec<Step> {
        if !ctx.is_canadian() {
            return Vec::new();
        }
        lookup_canadian_city(ctx.address)
            .map(|city| {
                vec![Step::Fixed {
                    label: city.name.to_string(),
                    coordinate: Coordinate {
                        lat: city.lat,
                        lng: city.lng,
                    },
                }]
            })
            .unwrap_or_default()
    }
}

pub fn default_chain() -> Vec<Box<dyn Strategy>> {
    vec![
        Box::new(CanadianVariants),
        Box::new(Unrestricted),
        Box::new(RegionBiased),
        Box::new(FallbackProvider),
        Box::new(Simplified),
        Box::new(CityOnly),
        Box::new(PostalOnly),
        Box::new(AddressVariants),
        Box::new(StaticCityTable),
    ]
}
