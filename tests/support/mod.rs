//! Red de prueba en memoria
//!
//! Una calle recta sobre la latitud -34.9 con cinco nodos separados ~456 m.
//! Los nodos 1 a 3 caen en "Montevideo" y los nodos 4 y 5 en "San José".

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use geo::{polygon, MultiLineString, Point};
use transit_network::config::NetworkConfig;
use transit_network::models::{NewStop, Stop};
use transit_network::repositories::{MemoryNetworkStore, NetworkStore};
use transit_network::services::{CreateLine, LineOutcome};
use transit_network::spatial::MemoryGateway;
use transit_network::utils::geo::point_to_lines_m;
use transit_network::AppState;

pub const LAT: f64 = -34.9;
pub const NODE_STEP: f64 = 0.005;
const METERS_PER_DEGREE_LAT: f64 = 111_195.0;

/// Longitud del nodo `i` (0..=4)
pub fn node_lon(i: usize) -> f64 {
    -56.0 - NODE_STEP * i as f64
}

/// Latitud `meters` al norte de la calle
pub fn north(meters: f64) -> f64 {
    LAT + meters / METERS_PER_DEGREE_LAT
}

/// Punto sobre el nodo `i`, desplazado `meters` al norte
pub fn near_node(i: usize, meters: f64) -> Point<f64> {
    Point::new(node_lon(i), north(meters))
}

pub fn road_gateway() -> MemoryGateway {
    let mut gateway = MemoryGateway::new();
    for i in 0..5 {
        gateway = gateway.with_node(i as i64 + 1, node_lon(i), LAT);
    }
    for i in 1..5 {
        gateway = gateway.with_edge(100 + i as i64, i as i64, i as i64 + 1);
    }
    gateway
        .with_region(
            "Montevideo",
            polygon![(x: -56.0125, y: -34.95), (x: -55.95, y: -34.95), (x: -55.95, y: -34.85), (x: -56.0125, y: -34.85)],
        )
        .with_region(
            "San José",
            polygon![(x: -56.05, y: -34.95), (x: -56.0125, y: -34.95), (x: -56.0125, y: -34.85), (x: -56.05, y: -34.85)],
        )
}

pub struct TestNetwork {
    pub state: AppState,
    pub store: MemoryNetworkStore,
    pub gateway: Arc<MemoryGateway>,
    pub config: NetworkConfig,
}

impl TestNetwork {
    pub fn new() -> Self {
        Self::with(road_gateway(), NetworkConfig::default())
    }

    pub fn with(gateway: MemoryGateway, config: NetworkConfig) -> Self {
        let store = MemoryNetworkStore::new();
        let gateway = Arc::new(gateway);
        let state = AppState::new(config.clone(), Arc::new(store.clone()), gateway.clone());
        Self {
            state,
            store,
            gateway,
            config,
        }
    }

    pub fn with_timeout(gateway: MemoryGateway, timeout: Duration) -> Self {
        let config = NetworkConfig {
            route_validation_timeout: timeout,
            ..NetworkConfig::default()
        };
        Self::with(gateway, config)
    }

    /// Parada 10 m al norte del nodo `i`
    pub async fn stop(&self, name: &str, i: usize) -> Stop {
        self.state
            .stops
            .create_stop(NewStop {
                name: name.to_string(),
                location: near_node(i, 10.0),
                shelter: false,
                note: None,
            })
            .await
            .expect("stop near the road")
    }

    /// Alta de línea con waypoints 30 m al norte de los nodos indicados
    pub async fn line(&self, description: &str, nodes: &[usize]) -> LineOutcome {
        self.state
            .lines
            .create_line(line_request(description, nodes))
            .await
            .expect("line created")
    }

    pub async fn stop_by_id(&self, id: uuid::Uuid) -> Stop {
        self.state.stops.get_stop(id).await.unwrap()
    }

    /// Verifica los invariantes derivados sobre el estado confirmado
    pub async fn assert_invariants(&self) {
        let mut tx = self.store.begin().await.unwrap();
        let min = self.config.line_min_valid_associations as i64;

        for stop in tx.list_stops().await.unwrap() {
            let enabled = tx.count_enabled_associations_for_stop(stop.id).await.unwrap();
            assert_eq!(stop.enabled, enabled >= 1, "stop '{}' with {} enabled associations", stop.name, enabled);
        }

        let lines = tx.list_lines().await.unwrap();
        for line in &lines {
            let valid = tx.count_valid_associations_for_line(line.id).await.unwrap();
            assert_eq!(line.enabled, valid >= min, "line '{}' with {} valid associations", line.description, valid);
        }

        for association in tx.list_associations().await.unwrap() {
            if !association.enabled {
                continue;
            }
            let stop = tx.find_stop(association.stop_id).await.unwrap().unwrap();
            let line = tx.find_line(association.line_id).await.unwrap().unwrap();
            let route = line.route.unwrap_or_else(|| MultiLineString::new(vec![]));
            let distance = point_to_lines_m(stop.location, &route);
            assert!(
                distance <= self.config.association_max_distance_m,
                "enabled association with stop '{}' {:.1} m from line '{}'",
                stop.name,
                distance,
                line.description
            );
        }
    }
}

pub fn line_request(description: &str, nodes: &[usize]) -> CreateLine {
    CreateLine {
        description: description.to_string(),
        company: "CUTCSA".to_string(),
        waypoints: nodes.iter().map(|i| near_node(*i, 30.0)).collect(),
        note: None,
        route: None,
    }
}
