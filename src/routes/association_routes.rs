use axum::{
    extract::{Path, State},
    routing::{delete, post, put},
    Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::dto::association_dto::{
    AddSchedulesRequest, AssociationResponse, CreateAssociationRequest, ScheduleResponse,
};
use crate::dto::{parse_times, ApiResponse, SetEnabledRequest};
use crate::state::AppState;
use crate::utils::errors::AppResult;

pub fn create_association_router() -> Router<AppState> {
    Router::new()
        .route("/associations", post(create_association).get(list_associations))
        .route("/associations/:id", delete(delete_association))
        .route("/associations/:id/enabled", put(set_association_enabled))
        .route("/associations/:id/schedules", post(add_schedules))
        .route("/schedules/:id", delete(delete_schedule))
}

async fn create_association(
    State(state): State<AppState>,
    Json(request): Json<CreateAssociationRequest>,
) -> AppResult<Json<ApiResponse<AssociationResponse>>> {
    request.validate()?;
    let times = parse_times("schedules", &request.schedules)?;
    let detail = state
        .associations
        .associate(request.stop_id, request.line_id, &times)
        .await?;
    Ok(Json(ApiResponse::success(detail.into())))
}

async fn list_associations(State(state): State<AppState>) -> AppResult<Json<Vec<AssociationResponse>>> {
    let details = state.associations.list_associations().await?;
    Ok(Json(details.into_iter().map(AssociationResponse::from).collect()))
}

async fn set_association_enabled(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<SetEnabledRequest>,
) -> AppResult<Json<ApiResponse<AssociationResponse>>> {
    let association = state
        .associations
        .set_association_enabled(id, request.enabled)
        .await?;
    Ok(Json(ApiResponse::success(association.into())))
}

async fn delete_association(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<()>>> {
    state.associations.delete_association(id).await?;
    Ok(Json(ApiResponse::message("Association deleted")))
}

async fn add_schedules(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<AddSchedulesRequest>,
) -> AppResult<Json<ApiResponse<Vec<ScheduleResponse>>>> {
    request.validate()?;
    let times = parse_times("times", &request.times)?;
    let schedules = state.associations.add_schedules(id, &times).await?;
    Ok(Json(ApiResponse::success(
        schedules.into_iter().map(ScheduleResponse::from).collect(),
    )))
}

async fn delete_schedule(State(state): State<AppState>, Path(id): Path<Uuid>) -> AppResult<Json<ApiResponse<()>>> {
    state.associations.delete_schedule(id).await?;
    Ok(Json(ApiResponse::message("Schedule deleted")))
}
