use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::stop_dto::StopResponse;
use crate::models::{Association, Schedule};
use crate::services::{AssociationDetail, LineStop};

// Request para asociar una parada a una línea
#[derive(Debug, Deserialize, Validate)]
pub struct CreateAssociationRequest {
    pub stop_id: Uuid,
    pub line_id: Uuid,
    /// Horarios `HH:MM` o `HH:MM:SS`
    #[serde(default)]
    #[validate(length(max = 500))]
    pub schedules: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddSchedulesRequest {
    #[validate(length(min = 1, max = 500))]
    pub times: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ScheduleResponse {
    pub id: Uuid,
    pub association_id: Uuid,
    pub time: NaiveTime,
}

impl From<Schedule> for ScheduleResponse {
    fn from(schedule: Schedule) -> Self {
        Self {
            id: schedule.id,
            association_id: schedule.association_id,
            time: schedule.time,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AssociationResponse {
    pub id: Uuid,
    pub stop_id: Uuid,
    pub line_id: Uuid,
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedules: Option<Vec<ScheduleResponse>>,
}

impl From<Association> for AssociationResponse {
    fn from(association: Association) -> Self {
        Self {
            id: association.id,
            stop_id: association.stop_id,
            line_id: association.line_id,
            enabled: association.enabled,
            schedules: None,
        }
    }
}

impl From<AssociationDetail> for AssociationResponse {
    fn from(detail: AssociationDetail) -> Self {
        Self {
            schedules: Some(detail.schedules.into_iter().map(ScheduleResponse::from).collect()),
            ..AssociationResponse::from(detail.association)
        }
    }
}

/// Parada de una línea con horarios y posición sobre el recorrido
#[derive(Debug, Serialize)]
pub struct LineStopResponse {
    pub association_id: Uuid,
    pub enabled: bool,
    pub position: f64,
    pub stop: StopResponse,
    pub schedules: Vec<ScheduleResponse>,
}

impl From<LineStop> for LineStopResponse {
    fn from(line_stop: LineStop) -> Self {
        Self {
            association_id: line_stop.association.id,
            enabled: line_stop.association.enabled,
            position: line_stop.position,
            stop: line_stop.stop.into(),
            schedules: line_stop.schedules.into_iter().map(ScheduleResponse::from).collect(),
        }
    }
}
