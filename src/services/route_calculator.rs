//! Cálculo de recorridos sobre la red vial
//!
//! Cada waypoint se ajusta al nodo más cercano del grafo (con una distancia
//! máxima de ajuste), se busca el camino mínimo que respeta el orden de los
//! waypoints y los tramos resultantes se fusionan en una geometría.

use std::sync::Arc;

use futures::future::try_join_all;
use geo::Point;
use tracing::{debug, info, warn};

use crate::config::NetworkConfig;
use crate::models::RouteGeometry;
use crate::spatial::{NodeId, SpatialQueryGateway};
use crate::utils::errors::{AppError, AppResult};

/// Recorrido calculado junto con los nodos usados en la búsqueda
#[derive(Debug, Clone)]
pub struct ComputedRoute {
    pub geometry: RouteGeometry,
    pub nodes: Vec<NodeId>,
    pub edge_count: usize,
}

impl ComputedRoute {
    /// `false` cuando la fusión no logró una única línea continua
    pub fn is_continuous(&self) -> bool {
        self.geometry.is_continuous()
    }
}

pub struct RouteCalculator {
    gateway: Arc<dyn SpatialQueryGateway>,
    max_snap_distance_m: f64,
    directed: bool,
}

impl RouteCalculator {
    pub fn new(gateway: Arc<dyn SpatialQueryGateway>, config: &NetworkConfig) -> Self {
        Self {
            gateway,
            max_snap_distance_m: config.max_snap_distance_m,
            directed: config.routing_directed,
        }
    }

    /// Calcula el recorrido con la distancia de ajuste configurada
    pub async fn compute(&self, waypoints: &[Point<f64>]) -> AppResult<ComputedRoute> {
        self.compute_route(waypoints, self.max_snap_distance_m).await
    }

    pub async fn compute_route(&self, waypoints: &[Point<f64>], max_snap_distance_m: f64) -> AppResult<ComputedRoute> {
        if waypoints.len() < 2 {
            return Err(AppError::InsufficientWaypoints(format!(
                "at least 2 waypoints are required to compute a route, got {}",
                waypoints.len()
            )));
        }

        let mut nodes: Vec<NodeId> = try_join_all(
            waypoints
                .iter()
                .enumerate()
                .map(|(index, waypoint)| self.snap(index, *waypoint, max_snap_distance_m)),
        )
        .await?;
        // Waypoints consecutivos sobre el mismo nodo no aportan tramos
        nodes.dedup();

        if nodes.len() < 2 {
            return Err(AppError::RouteGeometryMergeFailed(
                "all waypoints snap to the same road node".to_string(),
            ));
        }

        let edges = self.gateway.shortest_path(&nodes, self.directed).await?;
        if edges.is_empty() {
            warn!(?nodes, "no path found between snapped nodes");
            return Err(AppError::RouteGeometryMergeFailed(format!(
                "no road path connects nodes {:?}",
                nodes
            )));
        }

        let geometry = self.gateway.merge_geometry(&edges).await?;
        if geometry.is_empty() {
            return Err(AppError::RouteGeometryMergeFailed(
                "merged route geometry is empty".to_string(),
            ));
        }
        if !geometry.is_continuous() {
            warn!(edges = edges.len(), "route merged into a multi-line geometry");
        }

        info!(
            waypoints = waypoints.len(),
            nodes = nodes.len(),
            edges = edges.len(),
            continuous = geometry.is_continuous(),
            "route computed"
        );

        Ok(ComputedRoute {
            geometry,
            nodes,
            edge_count: edges.len(),
        })
    }

    async fn snap(&self, index: usize, waypoint: Point<f64>, max_snap_distance_m: f64) -> AppResult<NodeId> {
        let too_far = |detail: String| {
            AppError::WaypointTooFarFromNetwork(format!(
                "waypoint {} ({}, {}) {}",
                index,
                waypoint.x(),
                waypoint.y(),
                detail
            ))
        };

        let distance = self
            .gateway
            .distance_to_network(waypoint)
            .await?
            .ok_or_else(|| too_far("has no road network nearby".to_string()))?;

        if distance > max_snap_distance_m {
            return Err(too_far(format!(
                "is {:.1} m from the road network (max {} m)",
                distance, max_snap_distance_m
            )));
        }

        let node = self
            .gateway
            .nearest_node(waypoint)
            .await?
            .ok_or_else(|| too_far("has no road node nearby".to_string()))?;

        debug!(index, node, distance, "waypoint snapped");
        Ok(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::MemoryGateway;

    fn calculator() -> RouteCalculator {
        let gateway = MemoryGateway::new()
            .with_node(1, -56.000, -34.9)
            .with_node(2, -56.005, -34.9)
            .with_node(3, -56.010, -34.9)
            .with_edge(10, 1, 2)
            .with_edge(11, 2, 3);
        RouteCalculator::new(Arc::new(gateway), &NetworkConfig::default())
    }

    #[tokio::test]
    async fn rejects_a_single_waypoint() {
        let err = calculator().compute(&[Point::new(-56.0, -34.9)]).await.unwrap_err();
        assert!(matches!(err, AppError::InsufficientWaypoints(_)));
    }

    #[tokio::test]
    async fn waypoint_far_from_network_is_named_in_the_error() {
        // ~200 m al norte de la calle
        let err = calculator()
            .compute(&[Point::new(-56.0, -34.9), Point::new(-56.01, -34.9 + 0.0018)])
            .await
            .unwrap_err();
        match err {
            AppError::WaypointTooFarFromNetwork(msg) => assert!(msg.starts_with("waypoint 1 "), "{msg}"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn computes_a_continuous_route_through_via_nodes() {
        let route = calculator()
            .compute(&[
                Point::new(-56.0, -34.9002),
                Point::new(-56.005, -34.9002),
                Point::new(-56.01, -34.9002),
            ])
            .await
            .unwrap();
        assert_eq!(route.nodes, vec![1, 2, 3]);
        assert_eq!(route.edge_count, 2);
        assert!(route.is_continuous());
        assert_eq!(route.geometry.start(), Some(Point::new(-56.0, -34.9)));
        assert_eq!(route.geometry.end(), Some(Point::new(-56.01, -34.9)));
    }

    #[tokio::test]
    async fn waypoints_on_one_node_cannot_form_a_route() {
        let err = calculator()
            .compute(&[Point::new(-56.0, -34.9001), Point::new(-56.0001, -34.9001)])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::RouteGeometryMergeFailed(_)));
    }
}
