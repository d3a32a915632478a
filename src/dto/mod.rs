//! DTOs de la API
//!
//! Requests validados con `validator` y responses serializables. Las
//! geometrías viajan como GeoJSON y las coordenadas como pares `[lon, lat]`.

pub mod association_dto;
pub mod line_dto;
pub mod routing_dto;
pub mod stop_dto;

use chrono::NaiveTime;
use geo::Point;
use serde::{Deserialize, Serialize};
use validator::{ValidationError, ValidationErrors};

use crate::utils::errors::{AppError, AppResult};
use crate::utils::geo::validate_lon_lat;

/// Envoltorio estándar de las respuestas exitosas
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: Option<String>,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
        }
    }

    pub fn success_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: None,
        }
    }
}

/// Request genérico para habilitar o deshabilitar una entidad
#[derive(Debug, Deserialize)]
pub struct SetEnabledRequest {
    pub enabled: bool,
}

/// Error de validación sobre un único campo
pub fn invalid_field(field: &'static str, code: &'static str) -> AppError {
    let mut errors = ValidationErrors::new();
    errors.add(field, ValidationError::new(code));
    AppError::Validation(errors)
}

/// Acepta `HH:MM` o `HH:MM:SS`
pub fn parse_time(field: &'static str, raw: &str) -> AppResult<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .map_err(|_| invalid_field(field, "time_format"))
}

pub fn parse_times(field: &'static str, raw: &[String]) -> AppResult<Vec<NaiveTime>> {
    raw.iter().map(|t| parse_time(field, t)).collect()
}

pub fn to_points(coords: &[[f64; 2]]) -> AppResult<Vec<Point<f64>>> {
    coords.iter().map(|[lon, lat]| validate_lon_lat(*lon, *lat)).collect()
}

pub fn to_coords(points: &[Point<f64>]) -> Vec<[f64; 2]> {
    points.iter().map(|p| [p.x(), p.y()]).collect()
}

/// Texto GeoJSON de un valor JSON que puede venir como objeto o como string
pub fn geojson_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(raw) => raw.clone(),
        other => other.to_string(),
    }
}

pub fn geojson_value(geometry: &geo::Geometry<f64>) -> geojson::Geometry {
    geojson::Geometry::new(geojson::Value::from(geometry))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn times_accept_minutes_precision() {
        assert_eq!(parse_time("time", "08:30").unwrap(), NaiveTime::from_hms_opt(8, 30, 0).unwrap());
        assert_eq!(parse_time("time", "23:05:10").unwrap(), NaiveTime::from_hms_opt(23, 5, 10).unwrap());
        assert!(matches!(parse_time("time", "8h30"), Err(AppError::Validation(_))));
    }

    #[test]
    fn geojson_text_unwraps_strings() {
        let raw = r#"{"type":"Point","coordinates":[1.0,2.0]}"#;
        assert_eq!(geojson_text(&serde_json::Value::String(raw.to_string())), raw);
        let object: serde_json::Value = serde_json::from_str(raw).unwrap();
        assert!(geojson_text(&object).contains("\"Point\""));
    }
}
