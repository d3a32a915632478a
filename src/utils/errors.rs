//! Sistema de manejo de errores
//!
//! Este módulo define los tipos de error del núcleo de red (líneas, paradas,
//! asociaciones) y su conversión a respuestas HTTP.

use std::fmt;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Entidades persistidas que pueden no existir
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Line,
    Stop,
    Association,
    Schedule,
    KilometrePost,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Entity::Line => "line",
            Entity::Stop => "stop",
            Entity::Association => "association",
            Entity::Schedule => "schedule",
            Entity::KilometrePost => "kilometre post",
        };
        f.write_str(name)
    }
}

/// Errores principales de la aplicación
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{entity} not found: {message}")]
    NotFound { entity: Entity, message: String },

    #[error("{entity} already exists: {message}")]
    AlreadyExists { entity: Entity, message: String },

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Insufficient waypoints: {0}")]
    InsufficientWaypoints(String),

    #[error("Waypoint too far from network: {0}")]
    WaypointTooFarFromNetwork(String),

    #[error("Route geometry merge failed: {0}")]
    RouteGeometryMergeFailed(String),

    #[error("Route outside network buffer: {0}")]
    RouteOutsideNetworkBuffer(String),

    #[error("Route endpoints not near stops: {0}")]
    RouteEndpointsNotNearStops(String),

    #[error("Association too far from route: {0}")]
    AssociationTooFarFromRoute(String),

    #[error("Stop too far from network: {0}")]
    StopTooFarFromNetwork(String),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Código estable expuesto en el cuerpo JSON de las respuestas
    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound { .. } => "NOT_FOUND",
            AppError::AlreadyExists { .. } => "ALREADY_EXISTS",
            AppError::InvalidGeometry(_) => "INVALID_GEOMETRY",
            AppError::InsufficientWaypoints(_) => "INSUFFICIENT_WAYPOINTS",
            AppError::WaypointTooFarFromNetwork(_) => "WAYPOINT_TOO_FAR_FROM_NETWORK",
            AppError::RouteGeometryMergeFailed(_) => "ROUTE_GEOMETRY_MERGE_FAILED",
            AppError::RouteOutsideNetworkBuffer(_) => "ROUTE_OUTSIDE_NETWORK_BUFFER",
            AppError::RouteEndpointsNotNearStops(_) => "ROUTE_ENDPOINTS_NOT_NEAR_STOPS",
            AppError::AssociationTooFarFromRoute(_) => "ASSOCIATION_TOO_FAR_FROM_ROUTE",
            AppError::StopTooFarFromNetwork(_) => "STOP_TOO_FAR_FROM_NETWORK",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Database(_) => "DB_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Rechazos de negocio: la operación es válida pero la red no la admite
    pub fn is_rejection(&self) -> bool {
        !matches!(self, AppError::Database(_) | AppError::Internal(_))
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::AlreadyExists { .. } => StatusCode::CONFLICT,
            AppError::InvalidGeometry(_)
            | AppError::InsufficientWaypoints(_)
            | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::WaypointTooFarFromNetwork(_)
            | AppError::RouteGeometryMergeFailed(_)
            | AppError::RouteOutsideNetworkBuffer(_)
            | AppError::RouteEndpointsNotNearStops(_)
            | AppError::AssociationTooFarFromRoute(_)
            | AppError::StopTooFarFromNetwork(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Database(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Respuesta de error para la API
#[derive(Debug, serde::Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
    code: &'static str,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let error_response = match self {
            AppError::Database(e) => {
                tracing::error!(error = %e, "database error");
                ErrorResponse {
                    error: "Database Error".to_string(),
                    message: "The datastore is temporarily unavailable".to_string(),
                    details: Some(json!({ "sql_error": e.to_string() })),
                    code,
                }
            }
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "internal error");
                ErrorResponse {
                    error: "Internal Server Error".to_string(),
                    message: "An unexpected error occurred".to_string(),
                    details: Some(json!({ "internal_error": msg })),
                    code,
                }
            }
            AppError::Validation(e) => {
                tracing::warn!(error = %e, "validation error");
                ErrorResponse {
                    error: "Validation Error".to_string(),
                    message: "The provided data is invalid".to_string(),
                    details: Some(json!(e)),
                    code,
                }
            }
            other => {
                tracing::warn!(code, reason = %other, "operation rejected");
                ErrorResponse {
                    error: status
                        .canonical_reason()
                        .unwrap_or("Rejected")
                        .to_string(),
                    message: other.to_string(),
                    details: None,
                    code,
                }
            }
        };

        (status, Json(error_response)).into_response()
    }
}

/// Resultado tipado para operaciones que pueden fallar
pub type AppResult<T> = Result<T, AppError>;

/// Función helper para crear errores de recurso no encontrado
pub fn not_found_error(entity: Entity, id: impl fmt::Display) -> AppError {
    AppError::NotFound {
        entity,
        message: format!("{} with id '{}' not found", entity, id),
    }
}

/// Función helper para crear errores de duplicado
pub fn already_exists_error(entity: Entity, message: impl Into<String>) -> AppError {
    AppError::AlreadyExists {
        entity,
        message: message.into(),
    }
}

/// Función helper para crear errores internos
pub fn internal_error(message: &str) -> AppError {
    AppError::Internal(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_message_names_entity_and_id() {
        let err = not_found_error(Entity::Stop, 42);
        assert_eq!(err.to_string(), "stop not found: stop with id '42' not found");
        assert_eq!(err.code(), "NOT_FOUND");
        assert!(err.is_rejection());
    }

    #[test]
    fn spatial_rejections_map_to_unprocessable_entity() {
        let err = AppError::RouteEndpointsNotNearStops("end".into());
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let err = AppError::AssociationTooFarFromRoute("150 m".into());
        assert_eq!(err.into_response().status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn infrastructure_failures_are_not_rejections() {
        let err = internal_error("boom");
        assert!(!err.is_rejection());
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            AppError::Database(sqlx::Error::PoolTimedOut).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
