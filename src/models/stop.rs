//! Modelo de Stop (parada)

use chrono::{DateTime, Utc};
use geo::Point;
use uuid::Uuid;

/// Parada de ómnibus. `enabled` es un valor derivado de sus asociaciones.
#[derive(Debug, Clone, PartialEq)]
pub struct Stop {
    pub id: Uuid,
    pub name: String,
    pub location: Point<f64>,
    pub enabled: bool,
    pub shelter: bool,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Datos para dar de alta una parada
#[derive(Debug, Clone)]
pub struct NewStop {
    pub name: String,
    pub location: Point<f64>,
    pub shelter: bool,
    pub note: Option<String>,
}

/// Cambios parciales sobre una parada existente
#[derive(Debug, Clone, Default)]
pub struct StopChanges {
    pub name: Option<String>,
    pub location: Option<Point<f64>>,
    pub shelter: Option<bool>,
    pub note: Option<String>,
}
