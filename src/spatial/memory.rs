//! Gateway espacial en memoria
//!
//! Grafo vial, departamentos y postes kilométricos cargados desde código. Se
//! usa con `STORAGE=memory` (sobre `sample_network`) y en los tests; los
//! caminos mínimos se resuelven con Dijkstra sobre la longitud de cada tramo.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::time::Duration;

use async_trait::async_trait;
use geo::{polygon, Contains, Coord, Intersects, LineString, MultiLineString, Point, Polygon};

use super::{NodeId, RoadEdge, SpatialQueryGateway};
use crate::models::RouteGeometry;
use crate::utils::errors::{AppError, AppResult};
use crate::utils::geo::{
    geometry_distance_m, haversine_m, parse_polygon_geojson, point_to_line_m, route_length_m,
};

#[derive(Debug, Clone)]
struct MemoryEdge {
    id: i64,
    source: NodeId,
    target: NodeId,
    geometry: LineString<f64>,
    cost: f64,
}

#[derive(Default)]
pub struct MemoryGateway {
    nodes: HashMap<NodeId, Point<f64>>,
    edges: Vec<MemoryEdge>,
    regions: Vec<(String, Polygon<f64>)>,
    kilometre_posts: HashMap<(i32, i32), Point<f64>>,
    latency: Option<Duration>,
    failing_network_checks: AtomicBool,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_node(mut self, id: NodeId, lon: f64, lat: f64) -> Self {
        self.nodes.insert(id, Point::new(lon, lat));
        self
    }

    /// Tramo recto entre dos nodos ya cargados
    pub fn with_edge(self, id: i64, source: NodeId, target: NodeId) -> Self {
        let coords: Vec<Coord<f64>> = [source, target]
            .iter()
            .filter_map(|n| self.nodes.get(n))
            .map(|p| p.0)
            .collect();
        self.with_edge_geometry(id, source, target, LineString::new(coords))
    }

    pub fn with_edge_geometry(mut self, id: i64, source: NodeId, target: NodeId, geometry: LineString<f64>) -> Self {
        let cost = route_length_m(&MultiLineString::new(vec![geometry.clone()]));
        self.edges.push(MemoryEdge {
            id,
            source,
            target,
            geometry,
            cost,
        });
        self
    }

    pub fn with_region(mut self, name: impl Into<String>, polygon: Polygon<f64>) -> Self {
        self.regions.push((name.into(), polygon));
        self
    }

    pub fn with_kilometre_post(mut self, road: i32, km: i32, lon: f64, lat: f64) -> Self {
        self.kilometre_posts.insert((road, km), Point::new(lon, lat));
        self
    }

    /// Cuadrícula de 4x4 nodos separados 0.005° al oeste del centro de
    /// Montevideo, partida entre "Montevideo" y "Canelones", con los postes
    /// 0 a 3 de la ruta 1 sobre la fila sur.
    pub fn sample_network() -> Self {
        const SIZE: usize = 4;
        const STEP: f64 = 0.005;
        const LON0: f64 = -56.20;
        const LAT0: f64 = -34.90;

        let id = |row: usize, col: usize| (row * SIZE + col + 1) as NodeId;
        let lon = |col: usize| LON0 - STEP * col as f64;
        let lat = |row: usize| LAT0 + STEP * row as f64;

        let mut gateway = Self::new();
        for row in 0..SIZE {
            for col in 0..SIZE {
                gateway = gateway.with_node(id(row, col), lon(col), lat(row));
            }
        }

        let mut edge_id = 1000;
        for row in 0..SIZE {
            for col in 0..SIZE {
                if col + 1 < SIZE {
                    gateway = gateway.with_edge(edge_id, id(row, col), id(row, col + 1));
                    edge_id += 1;
                }
                if row + 1 < SIZE {
                    gateway = gateway.with_edge(edge_id, id(row, col), id(row + 1, col));
                    edge_id += 1;
                }
            }
        }

        for km in 0..SIZE {
            gateway = gateway.with_kilometre_post(1, km as i32, lon(km), lat(0));
        }

        let split = LON0 - STEP * 1.5;
        gateway
            .with_region(
                "Montevideo",
                polygon![(x: split, y: -34.95), (x: -56.15, y: -34.95), (x: -56.15, y: -34.85), (x: split, y: -34.85)],
            )
            .with_region(
                "Canelones",
                polygon![(x: -56.25, y: -34.95), (x: split, y: -34.95), (x: split, y: -34.85), (x: -56.25, y: -34.85)],
            )
    }

    /// Demora artificial en las consultas de muestreo
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Hace fallar `points_within_network` para ejercitar las estrategias de respaldo
    pub fn set_network_checks_failing(&self, failing: bool) {
        self.failing_network_checks.store(failing, AtomicOrdering::SeqCst);
    }

    fn neighbours(&self, directed: bool) -> HashMap<NodeId, Vec<(NodeId, usize)>> {
        let mut adjacency: HashMap<NodeId, Vec<(NodeId, usize)>> = HashMap::new();
        for (index, edge) in self.edges.iter().enumerate() {
            adjacency.entry(edge.source).or_default().push((edge.target, index));
            if !directed {
                adjacency.entry(edge.target).or_default().push((edge.source, index));
            }
        }
        adjacency
    }

    fn dijkstra(
        &self,
        adjacency: &HashMap<NodeId, Vec<(NodeId, usize)>>,
        start: NodeId,
        end: NodeId,
    ) -> Option<Vec<RoadEdge>> {
        let mut dist: HashMap<NodeId, f64> = HashMap::new();
        let mut previous: HashMap<NodeId, (NodeId, usize)> = HashMap::new();
        let mut heap = BinaryHeap::new();

        dist.insert(start, 0.0);
        heap.push(State { cost: 0.0, node: start });

        while let Some(State { cost, node }) = heap.pop() {
            if node == end {
                break;
            }
            if cost > *dist.get(&node).unwrap_or(&f64::INFINITY) {
                continue;
            }
            for &(next, edge_index) in adjacency.get(&node).into_iter().flatten() {
                let candidate = cost + self.edges[edge_index].cost;
                if candidate < *dist.get(&next).unwrap_or(&f64::INFINITY) {
                    dist.insert(next, candidate);
                    previous.insert(next, (node, edge_index));
                    heap.push(State { cost: candidate, node: next });
                }
            }
        }

        if !dist.contains_key(&end) {
            return None;
        }

        let mut path = Vec::new();
        let mut current = end;
        while current != start {
            let (from, edge_index) = previous.get(&current).copied()?;
            let edge = &self.edges[edge_index];
            let mut geometry = edge.geometry.clone();
            if edge.source != from {
                geometry.0.reverse();
            }
            path.push(RoadEdge { id: edge.id, geometry });
            current = from;
        }
        path.reverse();
        Some(path)
    }
}

#[derive(Debug, Clone, Copy)]
struct State {
    cost: f64,
    node: NodeId,
}

impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        self.cost.total_cmp(&other.cost) == Ordering::Equal && self.node == other.node
    }
}

impl Eq for State {}

impl Ord for State {
    // Min-heap sobre el costo acumulado
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| self.node.cmp(&other.node))
    }
}

impl PartialOrd for State {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Encadena tramos cuyos extremos coinciden; los que no empalman abren una nueva parte
fn chain_edges(edges: &[RoadEdge]) -> MultiLineString<f64> {
    let mut parts: Vec<Vec<Coord<f64>>> = Vec::new();
    for edge in edges.iter().filter(|e| !e.geometry.0.is_empty()) {
        let coords = &edge.geometry.0;
        let tail = parts.last().and_then(|p| p.last()).copied();
        match tail {
            Some(end) if coords[0] == end => {
                if let Some(part) = parts.last_mut() {
                    part.extend_from_slice(&coords[1..]);
                }
            }
            Some(end) if coords[coords.len() - 1] == end => {
                if let Some(part) = parts.last_mut() {
                    part.extend(coords.iter().rev().skip(1));
                }
            }
            _ => parts.push(coords.clone()),
        }
    }
    MultiLineString::new(parts.into_iter().map(LineString::new).collect())
}

#[async_trait]
impl SpatialQueryGateway for MemoryGateway {
    async fn nearest_node(&self, point: Point<f64>) -> AppResult<Option<NodeId>> {
        let nearest = self
            .nodes
            .iter()
            .map(|(id, node)| (*id, haversine_m(point, *node)))
            .min_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)))
            .map(|(id, _)| id);
        Ok(nearest)
    }

    async fn distance_to_network(&self, point: Point<f64>) -> AppResult<Option<f64>> {
        let distance = self
            .edges
            .iter()
            .map(|edge| point_to_line_m(point, &edge.geometry))
            .min_by(|a, b| a.total_cmp(b));
        Ok(distance)
    }

    async fn shortest_path(&self, nodes: &[NodeId], directed: bool) -> AppResult<Vec<RoadEdge>> {
        let adjacency = self.neighbours(directed);
        let mut path = Vec::new();
        for leg in nodes.windows(2) {
            if leg[0] == leg[1] {
                continue;
            }
            match self.dijkstra(&adjacency, leg[0], leg[1]) {
                Some(edges) => path.extend(edges),
                None => return Ok(Vec::new()),
            }
        }
        Ok(path)
    }

    async fn merge_geometry(&self, edges: &[RoadEdge]) -> AppResult<RouteGeometry> {
        let merged = chain_edges(edges);
        if merged.0.is_empty() {
            return Err(AppError::RouteGeometryMergeFailed(
                "no edges to merge".to_string(),
            ));
        }
        Ok(RouteGeometry::from_multi(merged))
    }

    async fn within_distance(
        &self,
        a: &geo::Geometry<f64>,
        b: &geo::Geometry<f64>,
        meters: f64,
    ) -> AppResult<bool> {
        Ok(geometry_distance_m(a, b)? <= meters)
    }

    async fn containing_region(&self, point: Point<f64>) -> AppResult<Option<String>> {
        Ok(self
            .regions
            .iter()
            .find(|(_, polygon)| polygon.contains(&point))
            .map(|(name, _)| name.clone()))
    }

    async fn kilometre_post(&self, road: i32, km: i32) -> AppResult<Option<Point<f64>>> {
        Ok(self.kilometre_posts.get(&(road, km)).copied())
    }

    async fn intersects(&self, geometry: &geo::Geometry<f64>, polygon_geojson: &str) -> AppResult<bool> {
        let polygons = parse_polygon_geojson(polygon_geojson)?;
        let hit = match geometry {
            geo::Geometry::Point(p) => p.intersects(&polygons),
            geo::Geometry::LineString(l) => l.intersects(&polygons),
            geo::Geometry::MultiLineString(m) => m.intersects(&polygons),
            other => {
                return Err(AppError::InvalidGeometry(format!(
                    "intersection not supported for {:?}",
                    other
                )))
            }
        };
        Ok(hit)
    }

    async fn points_within_network(&self, points: &[Point<f64>], meters: f64) -> AppResult<bool> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.failing_network_checks.load(AtomicOrdering::SeqCst) {
            return Err(AppError::Internal("sampled network check unavailable".to_string()));
        }

        let within = points.iter().all(|p| {
            self.edges
                .iter()
                .any(|edge| point_to_line_m(*p, &edge.geometry) <= meters)
        });
        Ok(within)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> MemoryGateway {
        // 1 - 2 - 3 en línea recta y un atajo 1 - 4 - 3 más largo
        MemoryGateway::new()
            .with_node(1, -56.00, -34.90)
            .with_node(2, -56.01, -34.90)
            .with_node(3, -56.02, -34.90)
            .with_node(4, -56.01, -34.88)
            .with_edge(10, 1, 2)
            .with_edge(11, 2, 3)
            .with_edge(12, 1, 4)
            .with_edge(13, 4, 3)
    }

    #[tokio::test]
    async fn shortest_path_prefers_the_cheaper_edges() {
        let gateway = grid();
        let path = gateway.shortest_path(&[1, 3], false).await.unwrap();
        let ids: Vec<i64> = path.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![10, 11]);
    }

    #[tokio::test]
    async fn undirected_paths_reverse_edge_geometry() {
        let gateway = grid();
        let path = gateway.shortest_path(&[3, 1], false).await.unwrap();
        let merged = gateway.merge_geometry(&path).await.unwrap();
        assert!(merged.is_continuous());
        assert_eq!(merged.start(), Some(Point::new(-56.02, -34.90)));
        assert_eq!(merged.end(), Some(Point::new(-56.00, -34.90)));
    }

    #[tokio::test]
    async fn directed_search_respects_edge_orientation() {
        let gateway = grid();
        assert!(gateway.shortest_path(&[3, 1], true).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn disjoint_edges_merge_into_multiline() {
        let gateway = grid();
        let edges = vec![
            RoadEdge {
                id: 1,
                geometry: LineString::from(vec![(0.0, 0.0), (1.0, 0.0)]),
            },
            RoadEdge {
                id: 2,
                geometry: LineString::from(vec![(5.0, 0.0), (6.0, 0.0)]),
            },
        ];
        let merged = gateway.merge_geometry(&edges).await.unwrap();
        assert!(!merged.is_continuous());
        assert!(gateway.merge_geometry(&[]).await.is_err());
    }

    #[tokio::test]
    async fn polygon_intersection_accepts_lines_and_points() {
        let gateway = grid();
        let square = r#"{"type":"Polygon","coordinates":[[[-56.012,-34.91],[-56.008,-34.91],[-56.008,-34.89],[-56.012,-34.89],[-56.012,-34.91]]]}"#;
        let crossing = geo::Geometry::LineString(LineString::from(vec![(-56.0, -34.9), (-56.02, -34.9)]));
        let outside = geo::Geometry::Point(Point::new(-56.05, -34.9));
        assert!(gateway.intersects(&crossing, square).await.unwrap());
        assert!(!gateway.intersects(&outside, square).await.unwrap());
        assert!(gateway.intersects(&crossing, "{}").await.is_err());
    }

    #[tokio::test]
    async fn sample_network_is_routable_and_has_posts() {
        let gateway = MemoryGateway::sample_network();
        let corner = Point::new(-56.20, -34.90);
        assert_eq!(gateway.distance_to_network(corner).await.unwrap(), Some(0.0));
        assert_eq!(gateway.nearest_node(corner).await.unwrap(), Some(1));

        // esquina opuesta de la cuadrícula: tres tramos por eje
        let path = gateway.shortest_path(&[1, 16], false).await.unwrap();
        assert_eq!(path.len(), 6);

        let post = gateway.kilometre_post(1, 2).await.unwrap().unwrap();
        assert!((post.x() - -56.21).abs() < 1e-9 && post.y() == -34.90, "{post:?}");
        assert_eq!(gateway.kilometre_post(1, 9).await.unwrap(), None);
        assert_eq!(
            gateway.containing_region(corner).await.unwrap().as_deref(),
            Some("Montevideo")
        );
        assert_eq!(
            gateway.containing_region(Point::new(-56.215, -34.89)).await.unwrap().as_deref(),
            Some("Canelones")
        );
    }

    #[tokio::test]
    async fn network_checks_can_be_forced_to_fail() {
        let gateway = grid();
        let on_road = [Point::new(-56.005, -34.9001)];
        assert!(gateway.points_within_network(&on_road, 40.0).await.unwrap());
        gateway.set_network_checks_failing(true);
        assert!(gateway.points_within_network(&on_road, 40.0).await.is_err());
    }
}
