//! Chequeo de buffer de red y estrategias de respaldo

mod support;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use geo::{LineString, MultiLineString, Point};
use support::{node_lon, north, road_gateway, TestNetwork, LAT};
use transit_network::config::NetworkConfig;
use transit_network::models::RouteGeometry;
use transit_network::repositories::NetworkStore;
use transit_network::services::{RouteValidation, RouteValidator, ValidationStrategy};
use transit_network::spatial::{NodeId, RoadEdge, SpatialQueryGateway};
use transit_network::utils::errors::{AppError, AppResult};

/// Recorrido sobre la calle entre los nodos 0 y 2
fn on_road() -> RouteGeometry {
    RouteGeometry::from(LineString::from(vec![(node_lon(0), LAT), (node_lon(1), LAT), (node_lon(2), LAT)]))
}

/// Recorrido que se separa 60 m de la calle en su tramo central
fn bulge() -> RouteGeometry {
    RouteGeometry::from(LineString::from(vec![
        (node_lon(0), LAT),
        (-56.004, north(60.0)),
        (-56.006, north(60.0)),
        (node_lon(2), LAT),
    ]))
}

async fn network_with_terminals(net: TestNetwork) -> TestNetwork {
    net.stop("Ciudadela", 0).await;
    net.stop("Tres Cruces", 2).await;
    net
}

async fn validate(net: &TestNetwork, route: &RouteGeometry) -> AppResult<RouteValidation> {
    let mut tx = net.store.begin().await?;
    net.state.validator.validate(tx.as_mut(), route).await
}

#[tokio::test]
async fn sampled_rejection_is_final() {
    let net = network_with_terminals(TestNetwork::new()).await;

    let report = validate(&net, &bulge()).await.unwrap();
    assert!(!report.network_ok);
    assert_eq!(report.strategy, ValidationStrategy::Sampled);
    assert!(report.samples > 2);

    let err = report.into_result().unwrap_err();
    assert!(matches!(err, AppError::RouteOutsideNetworkBuffer(_)), "{err:?}");
}

#[tokio::test]
async fn failing_batch_query_falls_back_to_key_points() {
    let net = network_with_terminals(TestNetwork::new()).await;
    net.gateway.set_network_checks_failing(true);

    let report = validate(&net, &on_road()).await.unwrap();
    assert!(report.is_valid());
    assert_eq!(report.strategy, ValidationStrategy::KeyPoints);
    assert_eq!(report.samples, 5);
}

#[tokio::test]
async fn slow_batch_query_times_out_into_key_points() {
    let gateway = road_gateway().with_latency(Duration::from_millis(250));
    let net = network_with_terminals(TestNetwork::with_timeout(gateway, Duration::from_millis(20))).await;

    let report = validate(&net, &on_road()).await.unwrap();
    assert!(report.is_valid());
    assert_eq!(report.strategy, ValidationStrategy::KeyPoints);
}

#[tokio::test]
async fn permissive_majority_accepts_a_small_detour() {
    let net = network_with_terminals(TestNetwork::new()).await;
    net.gateway.set_network_checks_failing(true);

    let report = validate(&net, &bulge()).await.unwrap();
    assert!(report.is_valid(), "{:?}", report.failures);
    assert_eq!(report.strategy, ValidationStrategy::Permissive);
    assert_eq!(report.samples, 3);
}

#[tokio::test]
async fn without_permissive_fallback_key_point_failure_is_final() {
    let config = NetworkConfig {
        permissive_fallback: false,
        ..NetworkConfig::default()
    };
    let net = network_with_terminals(TestNetwork::with(road_gateway(), config)).await;
    net.gateway.set_network_checks_failing(true);

    let report = validate(&net, &bulge()).await.unwrap();
    assert!(!report.network_ok);
    assert_eq!(report.strategy, ValidationStrategy::KeyPoints);
}

#[tokio::test]
async fn every_failed_check_is_reported() {
    let net = TestNetwork::new();

    let report = validate(&net, &bulge()).await.unwrap();
    assert!(!report.start_near_stop && !report.end_near_stop);
    assert_eq!(report.failures.len(), 2);

    match report.into_result().unwrap_err() {
        AppError::RouteOutsideNetworkBuffer(reason) => assert!(reason.contains("neither the start nor the end"), "{reason}"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn missing_stop_at_one_endpoint_names_it() {
    let net = TestNetwork::new();
    net.stop("Ciudadela", 0).await;

    let err = validate(&net, &on_road()).await.unwrap().into_result().unwrap_err();
    match err {
        AppError::RouteEndpointsNotNearStops(reason) => assert!(reason.starts_with("the end"), "{reason}"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn empty_routes_are_invalid_geometry() {
    let net = TestNetwork::new();
    let empty = RouteGeometry::from_multi(MultiLineString::new(vec![]));
    let err = validate(&net, &empty).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidGeometry(_)));
}

/// Almacén espacial caído: toda consulta falla
struct UnavailableGateway;

fn unavailable<T>() -> AppResult<T> {
    Err(AppError::Database(sqlx::Error::PoolTimedOut))
}

#[async_trait]
impl SpatialQueryGateway for UnavailableGateway {
    async fn nearest_node(&self, _point: Point<f64>) -> AppResult<Option<NodeId>> {
        unavailable()
    }

    async fn distance_to_network(&self, _point: Point<f64>) -> AppResult<Option<f64>> {
        unavailable()
    }

    async fn shortest_path(&self, _nodes: &[NodeId], _directed: bool) -> AppResult<Vec<RoadEdge>> {
        unavailable()
    }

    async fn merge_geometry(&self, _edges: &[RoadEdge]) -> AppResult<RouteGeometry> {
        unavailable()
    }

    async fn within_distance(
        &self,
        _a: &geo::Geometry<f64>,
        _b: &geo::Geometry<f64>,
        _meters: f64,
    ) -> AppResult<bool> {
        unavailable()
    }

    async fn containing_region(&self, _point: Point<f64>) -> AppResult<Option<String>> {
        unavailable()
    }

    async fn kilometre_post(&self, _road: i32, _km: i32) -> AppResult<Option<Point<f64>>> {
        unavailable()
    }

    async fn intersects(&self, _geometry: &geo::Geometry<f64>, _polygon_geojson: &str) -> AppResult<bool> {
        unavailable()
    }

    async fn points_within_network(&self, _points: &[Point<f64>], _meters: f64) -> AppResult<bool> {
        unavailable()
    }
}

#[tokio::test]
async fn unavailable_datastore_is_a_database_error_not_a_rejection() {
    let net = network_with_terminals(TestNetwork::new()).await;
    let validator = RouteValidator::new(Arc::new(UnavailableGateway), &NetworkConfig::default());

    let mut tx = net.store.begin().await.unwrap();
    let err = validator.validate(tx.as_mut(), &on_road()).await.unwrap_err();
    assert!(matches!(err, AppError::Database(_)), "{err:?}");

    let err = validator.ensure_valid(tx.as_mut(), &bulge()).await.unwrap_err();
    assert!(matches!(err, AppError::Database(_)), "{err:?}");
}
