use std::sync::Arc;
use std::time::Duration;

use httpmock::prelude::*;
use serde_json::json;
use stormsite::core::engine::{Engine, UNSUPPORTED_REGION};
use stormsite::core::error::{ResolveError, StormError};
use stormsite::core::store::SiteStore;
use stormsite::core::types::{
    AlertSource, HazardIcon, NewSite, Region, Site, SiteCategory, SiteEdit, StructuredAddress,
    Tier,
};
use stormsite::geocode::GeocodingResolver;
use stormsite::pipeline::correlator::HazardCorrelator;
use stormsite::sources::google::GoogleGeocoder;
use stormsite::sources::nws::NwsFeed;
use stormsite::sources::{build_http_client, HazardFeed};

fn engine(server: &MockServer) -> Engine {
    let client = build_http_client("stormsite-test", 5_000).unwrap();
    let google = Arc::new(GoogleGeocoder::new(
        "google",
        client.clone(),
        server.base_url(),
        "test-key",
    ));
    Engine::with_components(
        GeocodingResolver::new(google, None),
        Some(Arc::new(NwsFeed::new(client, server.base_url()))),
        HazardCorrelator::default(),
        SiteStore::open_in_memory().unwrap(),
        2,
        Duration::from_secs(5),
    )
}

async fn okc_site(engine: &Engine) -> Site {
    engine
        .create_site(NewSite {
            nickname: "OKC DC".into(),
            address: StructuredAddress {
                street: "1 Main St".into(),
                city: "Oklahoma City".into(),
                region: "OK".into(),
                postal_code: "73102".into(),
                ..Default::default()
            },
            category: SiteCategory::Other,
            contact: None,
            coordinate: Some("35.4676, -97.5164".into()),
        })
        .await
        .unwrap()
}

fn mock_point(server: &MockServer) -> httpmock::Mock<'_> {
    server.mock(|when, then| {
        when.method(GET).path("/points/35.47,-97.52");
        then.status(200).json_body(json!({
            "properties": {
                "forecastZone": "https://api.weather.gov/zones/forecast/OKZ025",
                "county": "https://api.weather.gov/zones/county/OKC109",
                "gridId": "OUN",
                "gridX": 97,
                "gridY": 94,
                "relativeLocation": { "properties": { "state": "OK" } }
            }
        }));
    })
}

fn mock_forecast(server: &MockServer) -> httpmock::Mock<'_> {
    server.mock(|when, then| {
        when.method(GET).path("/gridpoints/OUN/97,94/forecast");
        then.status(200).json_body(json!({
            "properties": {
                "periods": [
                    { "shortForecast": "Thunderstorms", "detailedForecast": "Severe storms likely." }
                ]
            }
        }));
    })
}

fn mock_alerts(server: &MockServer, features: serde_json::Value) -> httpmock::Mock<'_> {
    server.mock(|when, then| {
        when.method(GET)
            .path("/alerts/active")
            .query_param("zone", "OKZ025");
        then.status(200).json_body(json!({
            "type": "FeatureCollection",
            "features": features
        }));
    })
}

fn tornado_warning() -> serde_json::Value {
    json!([{
        "id": "urn:oid:tor-1",
        "geometry": {
            "type": "Polygon",
            "coordinates": [[
                [-97.7, 35.3], [-97.3, 35.3], [-97.3, 35.7], [-97.7, 35.7], [-97.7, 35.3]
            ]]
        },
        "properties": {
            "event": "Tornado Warning",
            "urgency": "Immediate",
            "areaDesc": "Oklahoma, OK",
            "headline": "Tornado Warning issued",
            "description": "A confirmed tornado is moving east."
        }
    }])
}

#[tokio::test]
async fn refresh_applies_polygon_warning() {
    let server = MockServer::start();
    mock_point(&server);
    mock_forecast(&server);
    let alerts = mock_alerts(&server, tornado_warning());

    let engine = engine(&server);
    let site = okc_site(&engine).await;
    let report = engine.refresh().await.unwrap();

    alerts.assert_hits(1);
    assert_eq!(report.sites.len(), 1);
    assert_eq!(report.degraded, 0);
    assert_eq!(report.hazards.len(), 1);
    let row = &report.sites[0];
    assert_eq!(row.state.tier, Tier::Warning);
    assert_eq!(row.state.label, "Tornado Warning");
    assert_eq!(row.state.icon, HazardIcon::Tornado);
    assert_eq!(row.scope.as_deref(), Some("zone=OKZ025"));
    assert_eq!(row.hazard_ids, vec!["urn:oid:tor-1".to_string()]);

    let stored = engine.get_site(&site.id).unwrap();
    assert_eq!(stored.alert.tier, Tier::Warning);
    assert_eq!(stored.alert.hazard_id.as_deref(), Some("urn:oid:tor-1"));
}

#[tokio::test]
async fn quiet_feed_reports_current_conditions() {
    let server = MockServer::start();
    mock_point(&server);
    mock_forecast(&server);
    mock_alerts(&server, json!([]));

    let engine = engine(&server);
    okc_site(&engine).await;
    let report = engine.refresh().await.unwrap();

    let row = &report.sites[0];
    assert_eq!(row.state.tier, Tier::None);
    assert!(row
        .state
        .description
        .contains("Current conditions: Thunderstorms"));
    assert!(report.hazards.is_empty());
}

#[tokio::test]
async fn feed_failure_degrades_site_only() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/points/35.47,-97.52");
        then.status(500);
    });

    let engine = engine(&server);
    okc_site(&engine).await;
    let report = engine.refresh().await.unwrap();

    assert_eq!(report.degraded, 1);
    let row = &report.sites[0];
    assert!(row.degraded);
    assert_eq!(row.state.tier, Tier::None);
    assert!(row
        .state
        .description
        .starts_with("Unable to fetch weather data"));
}

#[tokio::test]
async fn canadian_site_is_not_sent_to_feed() {
    let server = MockServer::start();
    let points = server.mock(|when, then| {
        when.method(GET).path_contains("/points/");
        then.status(200).json_body(json!({ "properties": {} }));
    });

    let engine = engine(&server);
    engine
        .create_site(NewSite {
            nickname: "Toronto Yard".into(),
            address: StructuredAddress {
                street: "1 Yonge St".into(),
                city: "Toronto".into(),
                region: "ON".into(),
                postal_code: "M5E 1E5".into(),
                country: Region::Canada,
            },
            coordinate: Some("43.6426, -79.3752".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    let report = engine.refresh().await.unwrap();

    points.assert_hits(0);
    assert_eq!(report.sites[0].state.description, UNSUPPORTED_REGION);
    assert!(!report.sites[0].degraded);
}

#[tokio::test]
async fn overlapping_refresh_is_rejected() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/points/35.47,-97.52");
        then.status(500).delay(Duration::from_millis(400));
    });

    let engine = engine(&server);
    okc_site(&engine).await;
    let (a, b) = tokio::join!(engine.refresh(), engine.refresh());

    let rejected = [&a, &b]
        .iter()
        .filter(|r| matches!(r, Err(StormError::CycleInProgress)))
        .count();
    assert_eq!(rejected, 1);
    assert!(a.is_ok() || b.is_ok());
}

#[tokio::test]
async fn refresh_replaces_manual_override() {
    let server = MockServer::start();
    mock_point(&server);
    mock_forecast(&server);
    mock_alerts(&server, json!([]));

    let engine = engine(&server);
    let site = okc_site(&engine).await;
    let pinned = engine.override_alert(&site.id, Tier::Watch).unwrap();
    assert_eq!(pinned.alert.source, AlertSource::Manual);
    assert_eq!(pinned.alert.label, "Manual Weather Watch");

    engine.refresh().await.unwrap();
    let stored = engine.get_site(&site.id).unwrap();
    assert_eq!(stored.alert.tier, Tier::None);
    assert_eq!(stored.alert.source, AlertSource::Feed);
}

#[tokio::test]
async fn unresolvable_address_is_not_stored() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/maps/api/geocode/json");
        then.status(200)
            .json_body(json!({ "status": "ZERO_RESULTS", "results": [] }));
    });

    let engine = engine(&server);
    let err = engine
        .create_site(NewSite {
            nickname: "Ghost".into(),
            address: StructuredAddress {
                street: "Nowhere Special".into(),
                ..Default::default()
            },
            ..Default::default()
        })
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        StormError::Resolve(ResolveError::UnresolvableAddress { .. })
    ));
    assert!(engine.list_sites().unwrap().is_empty());
}

#[tokio::test]
async fn edit_during_refresh_keeps_committed_alert() {
    let server = MockServer::start();
    mock_point(&server);
    mock_forecast(&server);
    mock_alerts(&server, tornado_warning());
    server.mock(|when, then| {
        when.method(GET).path("/maps/api/geocode/json");
        then.status(200)
            .delay(Duration::from_millis(800))
            .json_body(json!({
                "status": "OK",
                "results": [{
                    "formatted_address": "2 Main St, Oklahoma City, OK 73102, USA",
                    "types": ["street_address"],
                    "geometry": { "location": { "lat": 35.4701, "lng": -97.5202 } },
                    "address_components": [
                        { "long_name": "United States", "short_name": "US", "types": ["country"] }
                    ]
                }]
            }));
    });

    let engine = engine(&server);
    let site = okc_site(&engine).await;
    let edit = SiteEdit {
        address: Some(StructuredAddress {
            street: "2 Main St".into(),
            ..site.address.clone()
        }),
        ..Default::default()
    };

    let (edited, refreshed) = tokio::join!(engine.update_site(&site.id, edit), async {
        tokio::time::sleep(Duration::from_millis(150)).await;
        engine.refresh().await
    });

    assert_eq!(refreshed.unwrap().sites[0].state.tier, Tier::Warning);
    let edited = edited.unwrap();
    assert_eq!(edited.address.street, "2 Main St");
    assert_eq!(edited.alert.tier, Tier::Warning);

    let stored = engine.get_site(&site.id).unwrap();
    assert_eq!(stored.alert.tier, Tier::Warning);
    assert!((stored.coordinate.lat - 35.4701).abs() < 1e-9);
}

#[tokio::test]
async fn street_named_after_country_keeps_us_region() {
    let server = MockServer::start();
    let engine = engine(&server);
    let site = engine
        .create_site(NewSite {
            nickname: "Edina Store".into(),
            address: StructuredAddress {
                street: "7001 France Ave S".into(),
                city: "Edina".into(),
                region: "MN".into(),
                postal_code: "55435".into(),
                ..Default::default()
            },
            coordinate: Some("44.8780, -93.3290".into()),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(site.address.country, Region::Us);
    assert!(engine.feed().unwrap().supports(site.address.country));
}

#[tokio::test]
async fn sites_filter_by_category() {
    let server = MockServer::start();
    let engine = engine(&server);
    okc_site(&engine).await;
    engine
        .create_site(NewSite {
            nickname: "Tulsa Shop".into(),
            address: StructuredAddress {
                street: "200 Ireland Ave".into(),
                city: "Tulsa".into(),
                region: "OK".into(),
                postal_code: "74103".into(),
                ..Default::default()
            },
            category: SiteCategory::MachineShop,
            coordinate: Some("36.1540, -95.9928".into()),
            ..Default::default()
        })
        .await
        .unwrap();

    let shops = engine.list_sites_in(Some(SiteCategory::MachineShop)).unwrap();
    assert_eq!(shops.len(), 1);
    assert_eq!(shops[0].nickname, "Tulsa Shop");
    assert_eq!(shops[0].address.country, Region::Us);
    assert_eq!(engine.list_sites_in(None).unwrap().len(), 2);
}
