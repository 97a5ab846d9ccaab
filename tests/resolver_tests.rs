use std::sync::Arc;
use std::time::Duration;

use httpmock::prelude::*;
use serde_json::json;
use stormsite::core::error::ResolveError;
use stormsite::geocode::{AttemptOutcome, GeocodingResolver};
use stormsite::sources::build_http_client;
use stormsite::sources::google::GoogleGeocoder;
use stormsite::sources::nominatim::NominatimGeocoder;

fn client() -> reqwest::Client {
    build_http_client("stormsite-test", 5_000).unwrap()
}

fn google(server: &MockServer) -> Arc<GoogleGeocoder> {
    Arc::new(GoogleGeocoder::new("google", client(), server.base_url(), "test-key"))
}

fn nominatim(server: &MockServer) -> Arc<NominatimGeocoder> {
    Arc::new(NominatimGeocoder::new(
        "nominatim",
        client(),
        server.base_url(),
        Duration::ZERO,
    ))
}

fn google_hit(lat: f64, lng: f64, country: &str) -> serde_json::Value {
    json!({
        "status": "OK",
        "results": [{
            "formatted_address": format!("somewhere, {country}"),
            "types": ["street_address"],
            "geometry": { "location": { "lat": lat, "lng": lng } },
            "address_components": [
                { "long_name": country, "short_name": "XX", "types": ["country", "political"] }
            ]
        }]
    })
}

#[tokio::test]
async fn us_address_resolves_on_first_biased_attempt() {
    let server = MockServer::start();
    let hit = server.mock(|when, then| {
        when.method(GET)
            .path("/maps/api/geocode/json")
            .query_param("address", "1 Apple Park Way, Cupertino, CA 95014")
            .query_param("key", "test-key")
            .query_param("region", "us");
        then.status(200).json_body(google_hit(37.3349, -122.009, "United States"));
    });

    let resolver = GeocodingResolver::new(google(&server), None);
    let res = resolver
        .resolve_traced("1 Apple Park Way, Cupertino, CA 95014")
        .await
        .unwrap();

    hit.assert_hits(1);
    assert_eq!(res.strategy, "primary");
    assert_eq!(res.attempts.len(), 1);
    assert!((res.coordinate.lat - 37.3349).abs() < 1e-9);
    assert!((res.coordinate.lng + 122.009).abs() < 1e-9);
}

#[tokio::test]
async fn canadian_address_rejects_foreign_candidates() {
    let server = MockServer::start();
    let wrong_country = server.mock(|when, then| {
        when.method(GET)
            .path("/maps/api/geocode/json")
            .query_param("address", "Cornwall, ON, Canada");
        then.status(200).json_body(google_hit(41.44, -74.03, "United States"));
    });
    let right_country = server.mock(|when, then| {
        when.method(GET)
            .path("/maps/api/geocode/json")
            .query_param("address", "Cornwall, ON")
            .query_param("region", "ca");
        then.status(200).json_body(google_hit(45.0213, -74.7303, "Canada"));
    });

    let resolver = GeocodingResolver::new(google(&server), None);
    let res = resolver
        .resolve_traced("525 Boundary RdCornwall, ON K6H 6K8, Canada")
        .await
        .unwrap();

    wrong_country.assert_hits(1);
    right_country.assert_hits(1);
    assert_eq!(res.strategy, "canadian-variants");
    assert_eq!(res.query, "Cornwall, ON");
    assert!(matches!(
        &res.attempts[0].outcome,
        AttemptOutcome::Failed { reason } if reason.contains("Canada")
    ));
    assert!((res.coordinate.lat - 45.0213).abs() < 1e-9);
}

#[tokio::test]
async fn coordinate_literal_makes_no_requests() {
    let server = MockServer::start();
    let any = server.mock(|when, then| {
        when.method(GET);
        then.status(200).json_body(json!({ "status": "ZERO_RESULTS", "results": [] }));
    });

    let resolver = GeocodingResolver::new(google(&server), Some(nominatim(&server)));
    let c = resolver.resolve("35.4676, -97.5164").await.unwrap();

    any.assert_hits(0);
    assert!((c.lat - 35.4676).abs() < 1e-9);
    assert!((c.lng + 97.5164).abs() < 1e-9);
}

#[tokio::test]
async fn denied_primary_falls_back_to_nominatim() {
    let google_server = MockServer::start();
    let denied = google_server.mock(|when, then| {
        when.method(GET).path("/maps/api/geocode/json");
        then.status(200)
            .json_body(json!({ "status": "REQUEST_DENIED", "error_message": "bad key" }));
    });
    let osm_server = MockServer::start();
    let osm = osm_server.mock(|when, then| {
        when.method(GET)
            .path("/search")
            .query_param("q", "1 Duro Way, Walton, KY 41094")
            .query_param("format", "json");
        then.status(200).json_body(json!([
            {
                "lat": "38.8700", "lon": "-84.6100",
                "display_name": "Walton, Boone County, Kentucky",
                "class": "place", "type": "town",
                "address": { "country": "United States" }
            },
            {
                "lat": "38.8751", "lon": "-84.6102",
                "display_name": "1, Duro Way, Walton",
                "class": "building", "type": "house",
                "address": { "country": "United States", "house_number": "1" }
            }
        ]));
    });

    let resolver = GeocodingResolver::new(google(&google_server), Some(nominatim(&osm_server)));
    let res = resolver
        .resolve_traced("1 Duro Way, Walton, KY 41094")
        .await
        .unwrap();

    denied.assert_hits(1);
    osm.assert_hits(1);
    assert_eq!(res.strategy, "fallback-provider");
    assert!(matches!(
        &res.attempts[0].outcome,
        AttemptOutcome::Failed { reason } if reason.contains("bad key")
    ));
    // Street-level result is promoted ahead of the town centroid.
    assert!((res.coordinate.lat - 38.8751).abs() < 1e-9);
}

#[tokio::test]
async fn slow_provider_times_out_and_chain_continues() {
    let google_server = MockServer::start();
    google_server.mock(|when, then| {
        when.method(GET).path("/maps/api/geocode/json");
        then.status(200)
            .delay(Duration::from_millis(800))
            .json_body(google_hit(36.15, -95.99, "United States"));
    });
    let osm_server = MockServer::start();
    osm_server.mock(|when, then| {
        when.method(GET).path("/search");
        then.status(200).json_body(json!([
            { "lat": "36.1540", "lon": "-95.9928", "display_name": "Tulsa", "address": { "country": "United States" } }
        ]));
    });

    let resolver = GeocodingResolver::new(google(&google_server), Some(nominatim(&osm_server)))
        .with_timeout(Duration::from_millis(100));
    let res = resolver.resolve_traced("1 Main St, Tulsa, OK 74103").await.unwrap();

    assert_eq!(res.strategy, "fallback-provider");
    assert!(matches!(
        &res.attempts[0].outcome,
        AttemptOutcome::Failed { reason } if reason == "timeout"
    ));
    assert!((res.coordinate.lat - 36.154).abs() < 1e-9);
}

#[tokio::test]
async fn exhausted_chain_reports_every_attempt() {
    let server = MockServer::start();
    let empty = server.mock(|when, then| {
        when.method(GET).path("/maps/api/geocode/json");
        then.status(200).json_body(json!({ "status": "ZERO_RESULTS", "results": [] }));
    });

    let resolver = GeocodingResolver::new(google(&server), None);
    let err = resolver.resolve("Nowhere Special").await.unwrap_err();

    let ResolveError::UnresolvableAddress { address, attempts } = err else {
        panic!("expected UnresolvableAddress");
    };
    assert_eq!(address, "Nowhere Special");
    assert!(!attempts.is_empty());
    assert_eq!(empty.hits(), attempts.len());
    assert!(attempts.iter().all(|a| a.starts_with("google: ")));
}
