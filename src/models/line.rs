//! Modelo de Line (línea de ómnibus)

use chrono::{DateTime, Utc};
use geo::{MultiLineString, Point};
use uuid::Uuid;

use super::geometry::RouteGeometry;

/// Línea: recorrido geométrico más metadatos. `enabled` es derivado.
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub id: Uuid,
    pub description: String,
    pub company: String,
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub note: Option<String>,
    pub waypoints: Vec<Point<f64>>,
    pub route: Option<MultiLineString<f64>>,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

impl Line {
    pub fn route_geometry(&self) -> Option<RouteGeometry> {
        self.route.clone().map(RouteGeometry::from_multi)
    }

    /// Extremos operativos de la línea: primer y último waypoint, o los
    /// extremos del recorrido si no hay waypoints cargados.
    pub fn endpoints(&self) -> Option<(Point<f64>, Point<f64>)> {
        line_endpoints(&self.waypoints, self.route_geometry().as_ref())
    }
}

pub fn line_endpoints(
    waypoints: &[Point<f64>],
    route: Option<&RouteGeometry>,
) -> Option<(Point<f64>, Point<f64>)> {
    match (waypoints.first(), waypoints.last()) {
        (Some(first), Some(last)) => Some((*first, *last)),
        _ => {
            let route = route?;
            Some((route.start()?, route.end()?))
        }
    }
}

/// Datos para dar de alta una línea ya validada
#[derive(Debug, Clone)]
pub struct NewLine {
    pub description: String,
    pub company: String,
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub note: Option<String>,
    pub waypoints: Vec<Point<f64>>,
    pub route: MultiLineString<f64>,
}
