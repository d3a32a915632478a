use chrono::{DateTime, Utc};
use geo::Point;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::invalid_field;
use crate::models::{NewStop, Stop, StopChanges};
use crate::utils::errors::AppResult;

// Request para crear una parada
#[derive(Debug, Deserialize, Validate)]
pub struct CreateStopRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[serde(default)]
    pub shelter: bool,
    pub note: Option<String>,
}

impl CreateStopRequest {
    pub fn into_new_stop(self) -> NewStop {
        NewStop {
            name: self.name,
            location: Point::new(self.longitude, self.latitude),
            shelter: self.shelter,
            note: self.note,
        }
    }
}

// Request para modificar una parada; la ubicación se cambia con ambas coordenadas
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateStopRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: Option<f64>,
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: Option<f64>,
    pub shelter: Option<bool>,
    pub note: Option<String>,
}

impl UpdateStopRequest {
    pub fn into_changes(self) -> AppResult<StopChanges> {
        let location = match (self.longitude, self.latitude) {
            (Some(lon), Some(lat)) => Some(Point::new(lon, lat)),
            (None, None) => None,
            (None, Some(_)) => return Err(invalid_field("longitude", "required_with_latitude")),
            (Some(_), None) => return Err(invalid_field("latitude", "required_with_longitude")),
        };
        Ok(StopChanges {
            name: self.name,
            location,
            shelter: self.shelter,
            note: self.note,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct NearLinesQuery {
    pub distance_m: Option<f64>,
}

// Response de parada
#[derive(Debug, Serialize)]
pub struct StopResponse {
    pub id: Uuid,
    pub name: String,
    pub longitude: f64,
    pub latitude: f64,
    pub enabled: bool,
    pub shelter: bool,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Stop> for StopResponse {
    fn from(stop: Stop) -> Self {
        Self {
            id: stop.id,
            name: stop.name,
            longitude: stop.location.x(),
            latitude: stop.location.y(),
            enabled: stop.enabled,
            shelter: stop.shelter,
            note: stop.note,
            created_at: stop.created_at,
        }
    }
}
