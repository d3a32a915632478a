//! Gateway de consultas espaciales
//!
//! Interfaz delgada sobre el almacén espacial: vecino más cercano en el grafo
//! vial, distancias, camino mínimo, fusión de geometrías, contención,
//! intersección y postes kilométricos. Todas las coordenadas son SRID 4326 y las distancias metros.

pub mod memory;
pub mod postgis;

use async_trait::async_trait;
use geo::{LineString, Point};

use crate::models::RouteGeometry;
use crate::utils::errors::AppResult;

pub use memory::MemoryGateway;
pub use postgis::PostgisGateway;

/// Identificador de nodo del grafo vial
pub type NodeId = i64;

/// Tramo del grafo vial devuelto por una búsqueda de camino mínimo
#[derive(Debug, Clone, PartialEq)]
pub struct RoadEdge {
    pub id: i64,
    pub geometry: LineString<f64>,
}

#[async_trait]
pub trait SpatialQueryGateway: Send + Sync {
    /// Nodo del grafo vial más cercano al punto
    async fn nearest_node(&self, point: Point<f64>) -> AppResult<Option<NodeId>>;

    /// Distancia en metros al tramo vial más cercano
    async fn distance_to_network(&self, point: Point<f64>) -> AppResult<Option<f64>>;

    /// Camino mínimo que visita los nodos en orden; vacío si no hay camino
    async fn shortest_path(&self, nodes: &[NodeId], directed: bool) -> AppResult<Vec<RoadEdge>>;

    /// Fusiona tramos en una línea, o en una multilínea si no son contiguos
    async fn merge_geometry(&self, edges: &[RoadEdge]) -> AppResult<RouteGeometry>;

    async fn within_distance(
        &self,
        a: &geo::Geometry<f64>,
        b: &geo::Geometry<f64>,
        meters: f64,
    ) -> AppResult<bool>;

    /// Nombre del departamento que contiene el punto
    async fn containing_region(&self, point: Point<f64>) -> AppResult<Option<String>>;

    /// Ubicación del poste kilométrico `km` de la ruta nacional `road`
    async fn kilometre_post(&self, road: i32, km: i32) -> AppResult<Option<Point<f64>>>;

    async fn intersects(&self, geometry: &geo::Geometry<f64>, polygon_geojson: &str) -> AppResult<bool>;

    /// Verdadero si todos los puntos están a `meters` o menos de la red vial
    async fn points_within_network(&self, points: &[Point<f64>], meters: f64) -> AppResult<bool>;
}
