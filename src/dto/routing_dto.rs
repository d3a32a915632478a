use serde::{Deserialize, Serialize};
use validator::Validate;

use super::geojson_value;
use crate::services::{ComputedRoute, RouteValidation};
use crate::utils::geo::route_length_m;

#[derive(Debug, Deserialize, Validate)]
pub struct ShortestPathRequest {
    /// Pares `[lon, lat]` en orden de recorrido
    pub waypoints: Vec<[f64; 2]>,
    #[validate(range(min = 0.0, max = 10000.0))]
    pub max_snap_distance_m: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct ShortestPathResponse {
    pub route: geojson::Geometry,
    pub continuous: bool,
    pub nodes: Vec<i64>,
    pub edges: usize,
    pub length_m: f64,
}

impl From<ComputedRoute> for ShortestPathResponse {
    fn from(computed: ComputedRoute) -> Self {
        Self {
            route: geojson_value(&computed.geometry.to_geometry()),
            continuous: computed.is_continuous(),
            length_m: route_length_m(&computed.geometry.to_multi()),
            nodes: computed.nodes,
            edges: computed.edge_count,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ValidateRouteRequest {
    pub route: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct ValidateRouteResponse {
    pub valid: bool,
    #[serde(flatten)]
    pub report: RouteValidation,
}

impl From<RouteValidation> for ValidateRouteResponse {
    fn from(report: RouteValidation) -> Self {
        Self {
            valid: report.is_valid(),
            report,
        }
    }
}
