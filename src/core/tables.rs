//! Process-wide lookup tables. Read-only; never mutated at runtime.

use crate::core::types::Region;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subdivision {
    pub code: &'static str,
    pub name: &'static str,
    pub region: Region,
}

const fn us(code: &'static str, name: &'static str) -> Subdivision {
    Subdivision {
        code,
        name,
        region: Region::Us,
    }
}

const fn ca(code: &'static str, name: &'static str) -> Subdivision {
    Subdivision {
        code,
        name,
        region: Region::Canada,
    }
}

pub const US_STATES: &[Subdivision] = &[
    us("AL", "Alabama"),
    us("AK", "Alaska"),
    us("AZ", "Arizona"),
    us("AR", "Arkansas"),
    us("CA", "California"),
    us("CO", "Colorado"),
    us("CT", "Connecticut"),
    us("DE", "Delaware"),
    us("DC", "District of Columbia"),
    us("FL", "Florida"),
    us("GA", "Georgia"),
    us("HI", "Hawaii"),
    us("ID", "Idaho"),
    us("IL", "Illinois"),
    us("IN", "Indiana"),
    us("IA", "Iowa"),
    us("KS", "Kansas"),
    us("KY", "Kentucky"),
    us("LA", "Louisiana"),
    us("ME", "Maine"),
    us("MD", "Maryland"),
    us("MA", "Massachusetts"),
    us("MI", "Michigan"),
    us("MN", "Minnesota"),
    us("MS", "Mississippi"),
    us("MO", "Missouri"),
    us("MT", "Montana"),
    us("NE", "Nebraska"),
    us("NV", "Nevada"),
    us("NH", "New Hampshire"),
    us("NJ", "New Jersey"),
    us("NM", "New Mexico"),
    us("NY", "New York"),
    us("NC", "North Carolina"),
    us("ND", "North Dakota"),
    us("OH", "Ohio"),
    us("OK", "Oklahoma"),
    us("OR", "Oregon"),
    us("PA", "Pennsylvania"),
    us("RI", "Rhode Island"),
    us("SC", "South Carolina"),
    us("SD", "South Dakota"),
    us("TN", "Tennessee"),
    us("TX", "Texas"),
    us("UT", "Utah"),
    us("VT", "Vermont"),
    us("VA", "Virginia"),
    us("WA", "Washington"),
    us("WV", "West Virginia"),
    us("WI", "Wisconsin"),
    us("WY", "Wyoming"),
];

pub const CA_PROVINCES: &[Subdivision] = &[
    ca("AB", "Alberta"),
    ca("BC", "British Columbia"),
    ca("MB", "Manitoba"),
    ca("NB", "New Brunswick"),
    ca("NL", "Newfoundland and Labrador"),
    ca("NS", "Nova Scotia"),
    ca("NT", "Northwest Territories"),
    ca("NU", "Nunavut"),
    ca("ON", "Ontario"),
    ca("PE", "Prince Edward Island"),
    ca("QC", "Quebec"),
    ca("SK", "Saskatchewan"),
    ca("YT", "Yukon"),
];

/// Multi-word names are listed first so they are matched before their substrings.
pub const MX_STATES: &[&str] = &[
    "baja california sur",
    "baja california",
    "ciudad de mexico",
    "estado de mexico",
    "nuevo leon",
    "quintana roo",
    "san luis potosi",
    "aguascalientes",
    "campeche",
    "chiapas",
    "chihuahua",
    "coahuila",
    "colima",
    "durango",
    "guanajuato",
    "guerrero",
    "hidalgo",
    "jalisco",
    "michoacan",
    "morelos",
    "nayarit",
    "oaxaca",
    "puebla",
    "queretaro",
    "sinaloa",
    "sonora",
    "tabasco",
    "tamaulipas",
    "tlaxcala",
    "veracruz",
    "yucatan",
    "zacatecas",
];

pub const MX_ADDRESS_HINTS: &[&str] = &["colonia", "col.", "delegacion", "alcaldia", "municipio"];

pub const EU_COUNTRIES: &[&str] = &[
    "united kingdom",
    "czech republic",
    "germany",
    "deutschland",
    "france",
    "italy",
    "italia",
    "spain",
    "espana",
    "portugal",
    "netherlands",
    "nederland",
    "belgium",
    "austria",
    "switzerland",
    "poland",
    "sweden",
    "norway",
    "denmark",
    "finland",
    "ireland",
    "england",
    "scotland",
    "wales",
    "greece",
    "czechia",
    "hungary",
    "romania",
    "bulgaria",
    "croatia",
    "slovakia",
    "slovenia",
    "luxembourg",
    "estonia",
    "latvia",
    "lithuania",
];

/// (full, abbreviation) pairs used for street-type swaps.
pub const STREET_TYPES: &[(&str, &str)] = &[
    ("Road", "Rd"),
    ("Street", "St"),
    ("Avenue", "Ave"),
    ("Drive", "Dr"),
    ("Boulevard", "Blvd"),
    ("Lane", "Ln"),
    ("Court", "Ct"),
    ("Place", "Pl"),
    ("Circle", "Cir"),
    ("Terrace", "Ter"),
    ("Highway", "Hwy"),
    ("Freeway", "Fwy"),
    ("Expressway", "Expy"),
    ("Parkway", "Pkwy"),
];

/// Dotted abbreviations expanded in the street segment.
pub const DOTTED_ABBREVIATIONS: &[(&str, &str)] = &[
    ("St.", "Street"),
    ("Ave.", "Avenue"),
    ("Blvd.", "Boulevard"),
    ("Rd.", "Road"),
    ("Dr.", "Drive"),
    ("Ln.", "Lane"),
    ("Ct.", "Court"),
    ("Pl.", "Place"),
    ("Cir.", "Circle"),
    ("Apt.", "Apartment"),
    ("Ste.", "Suite"),
    ("Fl.", "Floor"),
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CityCoordinate {
    pub name: &'static str,
    pub lat: f64,
    pub lng: f64,
}

const fn city(name: &'static str, lat: f64, lng: f64) -> CityCoordinate {
    CityCoordinate { name, lat, lng }
}

pub const CANADIAN_CITIES: &[CityCoordinate] = &[
    city("cornwall", 45.0189, -74.7281),
    city("toronto", 43.6532, -79.3832),
    city("montreal", 45.5017, -73.5673),
    city("vancouver", 49.2827, -123.1207),
    city("calgary", 51.0447, -114.0719),
    city("edmonton", 53.5461, -113.4938),
    city("ottawa", 45.4215, -75.6972),
    city("winnipeg", 49.8951, -97.1384),
    city("halifax", 44.6488, -63.5752),
    city("victoria", 48.4284, -123.3656),
    city("saskatoon", 52.1332, -106.67),
    city("regina", 50.4452, -104.6189),
    city("quebec", 46.8139, -71.208),
    city("mississauga", 43.589, -79.6441),
    city("brampton", 43.6832, -79.7629),
    city("hamilton", 43.2557, -79.8711),
    city("london", 42.9849, -81.2453),
    city("kitchener", 43.4516, -80.4925),
    city("windsor", 42.3149, -83.0364),
    city("oakville", 43.4675, -79.6877),
    city("burlington", 43.3255, -79.799),
    city("richmond hill", 43.8828, -79.4403),
    city("markham", 43.8561, -79.337),
    city("vaughan", 43.8361, -79.4989),
    city("scarborough", 43.7764, -79.2318),
    city("etobicoke", 43.6205, -79.5132),
    city("north york", 43.7615, -79.4111),
    city("ajax", 43.8509, -79.0205),
    city("pickering", 43.8384, -79.0868),
    city("oshawa", 43.8971, -78.8658),
    city("whitby", 43.8975, -78.9428),
    city("barrie", 44.3894, -79.6903),
    city("kingston", 44.2312, -76.486),
    city("guelph", 43.5448, -80.2482),
    city("cambridge", 43.3616, -80.3144),
    city("waterloo", 43.4643, -80.5204),
    city("st. catharines", 43.1594, -79.2469),
    city("niagara falls", 43.0962, -79.0377),
    city("brantford", 43.1394, -80.2644),
    city("peterborough", 44.3091, -78.3197),
    city("belleville", 44.1628, -77.3834),
    city("sarnia", 42.9749, -82.4066),
    city("sault ste. marie", 46.5218, -84.3461),
    city("thunder bay", 48.3809, -89.2477),
    city("sudbury", 46.4917, -80.993),
    city("north bay", 46.3091, -79.4608),
    city("timmins", 48.4758, -81.3305),
    city("sherbrooke", 45.4, -71.8997),
    city("trois-rivieres", 46.3508, -72.5477),
    city("saguenay", 48.4284, -71.0534),
    city("laval", 45.5697, -73.7244),
    city("gatineau", 45.4765, -75.7013),
    city("longueuil", 45.5367, -73.5107),
    city("surrey", 49.1913, -122.849),
    city("burnaby", 49.2488, -122.9805),
    city("richmond", 49.1666, -123.1336),
    city("abbotsford", 49.0504, -122.3045),
    city("coquitlam", 49.2838, -122.7932),
    city("kelowna", 49.8877, -119.4965),
    city("nanaimo", 49.1659, -123.9401),
    city("kamloops", 50.6745, -120.3273),
    city("prince george", 53.9171, -122.7497),
    city("red deer", 52.2696, -113.8117),
    city("lethbridge", 49.6935, -112.8418),
    city("medicine hat", 50.0421, -110.7192),
    city("grande prairie", 55.1699, -118.7979),
    city("prince albert", 53.2001, -105.7677),
    city("moose jaw", 50.4005, -105.5505),
    city("brandon", 49.8469, -99.953),
    city("thompson", 55.7433, -97.8551),
    city("st. john's", 47.5615, -52.7126),
    city("mount pearl", 47.5183, -52.8084),
    city("corner brook", 48.95, -57.9333),
    city("grand falls-windsor", 48.9333, -55.65),
    city("charlottetown", 46.2382, -63.1311),
    city("summerside", 46.3959, -63.7876),
    city("moncton", 46.0878, -64.7782),
    city("saint john", 45.2733, -66.0633),
    city("fredericton", 45.9636, -66.6431),
    city("bathurst", 47.6181, -65.6511),
    city("miramichi", 47.0285, -65.5018),
    city("sydney", 46.1368, -60.1942),
    city("dartmouth", 44.6659, -63.5674),
    city("whitehorse", 60.7212, -135.0568),
    city("yellowknife", 62.454, -114.3718),
    city("iqaluit", 63.7467, -68.517),
];

pub fn us_state_by_code(code: &str) -> Option<&'static Subdivision> {
    US_STATES.iter().find(|s| s.code.eq_ignore_ascii_case(code))
}

pub fn province_by_code(code: &str) -> Option<&'static Subdivision> {
    CA_PROVINCES.iter().find(|s| s.code.eq_ignore_ascii_case(code))
}

pub fn subdivision_by_code(code: &str) -> Option<&'static Subdivision> {
    us_state_by_code(code).or_else(|| province_by_code(code))
}

pub fn subdivision_by_name(name: &str) -> Option<&'static Subdivision> {
    let name = name.trim();
    US_STATES
        .iter()
        .chain(CA_PROVINCES.iter())
        .find(|s| s.name.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn us_and_canadian_codes_do_not_collide() {
        for p in CA_PROVINCES {
            assert!(us_state_by_code(p.code).is_none(), "{} collides", p.code);
        }
    }

    #[test]
    fn city_table_has_no_duplicates() {
        let mut names: Vec<&str> = CANADIAN_CITIES.iter().map(|c| c.name).collect();
        let before = names.len();
        names.sort();
        names.dedup();
        assert_eq!(before, names.len());
        assert!(before >= 80);
    }

    #[test]
    fn lookups_are_case_insensitive() {
        assert_eq!(subdivision_by_code("wi").map(|s| s.name), Some("Wisconsin"));
        assert_eq!(subdivision_by_name("ontario").map(|s| s.code), Some("ON"));
    }
}
