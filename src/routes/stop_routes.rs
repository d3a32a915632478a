use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::dto::line_dto::LineResponse;
use crate::dto::stop_dto::{CreateStopRequest, NearLinesQuery, StopResponse, UpdateStopRequest};
use crate::dto::{invalid_field, ApiResponse};
use crate::state::AppState;
use crate::utils::errors::AppResult;

pub fn create_stop_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_stop).get(list_stops))
        .route("/:id", get(get_stop).put(update_stop).delete(delete_stop))
        .route("/:id/lines", get(lines_near_stop))
}

async fn create_stop(
    State(state): State<AppState>,
    Json(request): Json<CreateStopRequest>,
) -> AppResult<Json<ApiResponse<StopResponse>>> {
    request.validate()?;
    let stop = state.stops.create_stop(request.into_new_stop()).await?;
    Ok(Json(ApiResponse::success(stop.into())))
}

async fn list_stops(State(state): State<AppState>) -> AppResult<Json<Vec<StopResponse>>> {
    let stops = state.stops.list_stops().await?;
    Ok(Json(stops.into_iter().map(StopResponse::from).collect()))
}

async fn get_stop(State(state): State<AppState>, Path(id): Path<Uuid>) -> AppResult<Json<StopResponse>> {
    let stop = state.stops.get_stop(id).await?;
    Ok(Json(stop.into()))
}

async fn update_stop(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateStopRequest>,
) -> AppResult<Json<ApiResponse<StopResponse>>> {
    request.validate()?;
    let stop = state.stops.modify_stop(id, request.into_changes()?).await?;
    Ok(Json(ApiResponse::success(stop.into())))
}

async fn delete_stop(State(state): State<AppState>, Path(id): Path<Uuid>) -> AppResult<Json<ApiResponse<()>>> {
    state.stops.delete_stop(id).await?;
    Ok(Json(ApiResponse::message("Stop deleted")))
}

/// Líneas que pasan cerca de la parada (por defecto, la distancia de asociación)
async fn lines_near_stop(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<NearLinesQuery>,
) -> AppResult<Json<Vec<LineResponse>>> {
    let distance = query.distance_m.unwrap_or(state.network.association_max_distance_m);
    if !distance.is_finite() || distance < 0.0 {
        return Err(invalid_field("distance_m", "range"));
    }
    let lines = state.line_queries.lines_near_stop(id, distance).await?;
    Ok(Json(lines.into_iter().map(LineResponse::from).collect()))
}
