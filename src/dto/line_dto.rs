use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::association_dto::AssociationResponse;
use super::{geojson_text, geojson_value, to_coords, to_points};
use crate::models::Line;
use crate::services::{CreateLine, LineChanges, LineOutcome};
use crate::utils::errors::AppResult;
use crate::utils::geo::{multi_line_to_wkt, parse_route_geojson};

// Request para crear una línea
#[derive(Debug, Deserialize, Validate)]
pub struct CreateLineRequest {
    #[validate(length(min = 1, max = 200))]
    pub description: String,
    #[validate(length(min = 1, max = 200))]
    pub company: String,
    /// Pares `[lon, lat]` en orden de recorrido
    #[validate(length(min = 1))]
    pub waypoints: Vec<[f64; 2]>,
    pub note: Option<String>,
    /// Recorrido GeoJSON ya validado; si falta se calcula sobre la red
    pub route: Option<serde_json::Value>,
}

impl CreateLineRequest {
    pub fn into_command(self) -> AppResult<CreateLine> {
        let route = self
            .route
            .as_ref()
            .map(|value| parse_route_geojson(&geojson_text(value)))
            .transpose()?;
        Ok(CreateLine {
            description: self.description,
            company: self.company,
            waypoints: to_points(&self.waypoints)?,
            note: self.note,
            route,
        })
    }
}

// Request para modificar una línea
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateLineRequest {
    #[validate(length(min = 1, max = 200))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub company: Option<String>,
    pub note: Option<String>,
    pub enabled: Option<bool>,
    pub waypoints: Option<Vec<[f64; 2]>>,
    pub route: Option<serde_json::Value>,
}

impl UpdateLineRequest {
    pub fn into_changes(self) -> AppResult<LineChanges> {
        let route = self
            .route
            .as_ref()
            .map(|value| parse_route_geojson(&geojson_text(value)))
            .transpose()?;
        let waypoints = self.waypoints.as_deref().map(to_points).transpose()?;
        Ok(LineChanges {
            description: self.description,
            company: self.company,
            note: self.note,
            enabled: self.enabled,
            waypoints,
            route,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct LineListQuery {
    pub company: Option<String>,
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    /// Ruta nacional y kilómetro de un poste
    pub road: Option<i32>,
    pub km: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct PolygonSearchRequest {
    pub polygon: serde_json::Value,
}

// Response de línea
#[derive(Debug, Serialize)]
pub struct LineResponse {
    pub id: Uuid,
    pub description: String,
    pub company: String,
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub note: Option<String>,
    pub enabled: bool,
    pub waypoints: Vec<[f64; 2]>,
    pub route: Option<geojson::Geometry>,
    /// `false` cuando el recorrido quedó como multilínea
    pub continuous: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route_wkt: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl LineResponse {
    /// Agrega la representación WKT del recorrido (solo en el detalle)
    pub fn with_wkt(mut self, line: &Line) -> Self {
        self.route_wkt = line.route.as_ref().map(multi_line_to_wkt);
        self
    }
}

impl From<Line> for LineResponse {
    fn from(line: Line) -> Self {
        let geometry = line.route_geometry();
        Self {
            id: line.id,
            description: line.description,
            company: line.company,
            origin: line.origin,
            destination: line.destination,
            note: line.note,
            enabled: line.enabled,
            waypoints: to_coords(&line.waypoints),
            route: geometry.as_ref().map(|g| geojson_value(&g.to_geometry())),
            continuous: geometry.as_ref().is_some_and(|g| g.is_continuous()),
            route_wkt: None,
            created_at: line.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LineOutcomeResponse {
    pub line: LineResponse,
    pub associations: Vec<AssociationResponse>,
}

impl From<LineOutcome> for LineOutcomeResponse {
    fn from(outcome: LineOutcome) -> Self {
        Self {
            line: outcome.line.into(),
            associations: outcome.associations.into_iter().map(AssociationResponse::from).collect(),
        }
    }
}
