use std::sync::LazyLock;

use regex::Regex;

use crate::core::error::ResolveError;
use crate::core::types::Coordinate;

static LITERAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([-+]?[0-9.]+)\s*,\s*([-+]?[0-9.]+)\s*$").expect("valid literal regex")
});

/// Parses a `"lat, lng"` literal.
///
/// Returns `None` when the input does not look like a coordinate pair at all,
/// `Some(Err(_))` when it does but the numbers are malformed or out of range.
pub fn parse_literal(input: &str) -> Option<Result<Coordinate, ResolveError>> {
    let caps = LITERAL_RE.captures(input)?;
    let lat = caps.get(1)?.as_str();
    let lng = caps.get(2)?.as_str();
    let parsed = match (lat.parse::<f64>(), lng.parse::<f64>()) {
        (Ok(lat), Ok(lng)) => Coordinate::new(lat, lng),
        _ => Err(ResolveError::InvalidCoordinateFormat(input.trim().to_string())),
    };
    Some(parsed)
}

/// Even-odd ray casting. Vertices are compared as (x = lng, y = lat).
pub fn point_in_ring(point: &Coordinate, ring: &[Coordinate]) -> bool {
    if ring.len() < 3 {
        return false;
    }
    let (x, y) = (point.lng, point.lat);
    let mut inside = false;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let (xi, yi) = (ring[i].lng, ring[i].lat);
        let (xj, yj) = (ring[j].lng, ring[j].lat);
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Area-weighted centroid; falls back to the vertex mean for degenerate rings.
pub fn centroid(ring: &[Coordinate]) -> Option<Coordinate> {
    if ring.is_empty() {
        return None;
    }
    let mut area = 0.0;
    let mut cx = 0.0;
    let mut cy = 0.0;
    for i in 0..ring.len() {
        let a = ring[i];
        let b = ring[(i + 1) % ring.len()];
        let cross = a.lng * b.lat - b.lng * a.lat;
        area += cross;
        cx += (a.lng + b.lng) * cross;
        cy += (a.lat + b.lat) * cross;
    }
    if area.abs() < f64::EPSILON {
        let n = ring.len() as f64;
        return Some(Coordinate {
            lat: ring.iter().map(|c| c.lat).sum::<f64>() / n,
            lng: ring.iter().map(|c| c.lng).sum::<f64>() / n,
        });
    }
    area *= 0.5;
    Some(Coordinate {
        lat: cy / (6.0 * area),
        lng: cx / (6.0 * area),
    })
}

/// (south-west, north-east) corners.
pub fn bounding_box(ring: &[Coordinate]) -> Option<(Coordinate, Coordinate)> {
    let first = ring.first()?;
    let mut min = *first;
    let mut max = *first;
    for c in ring {
        min.lat = min.lat.min(c.lat);
        min.lng = min.lng.min(c.lng);
        max.lat = max.lat.max(c.lat);
        max.lng = max.lng.max(c.lng);
    }
    Some((min, max))
}
