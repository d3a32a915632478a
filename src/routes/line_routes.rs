use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::dto::association_dto::LineStopResponse;
use crate::dto::line_dto::{
    CreateLineRequest, LineListQuery, LineOutcomeResponse, LineResponse, PolygonSearchRequest, UpdateLineRequest,
};
use crate::dto::{geojson_text, invalid_field, parse_time, ApiResponse, SetEnabledRequest};
use crate::models::Line;
use crate::state::AppState;
use crate::utils::errors::AppResult;

pub fn create_line_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_line).get(list_lines))
        .route("/search/polygon", post(search_by_polygon))
        .route("/:id", get(get_line).put(update_line).delete(delete_line))
        .route("/:id/enabled", put(set_line_enabled))
        .route("/:id/stops", get(line_stops))
}

fn responses(lines: Vec<Line>) -> Vec<LineResponse> {
    lines.into_iter().map(LineResponse::from).collect()
}

async fn create_line(
    State(state): State<AppState>,
    Json(request): Json<CreateLineRequest>,
) -> AppResult<Json<ApiResponse<LineOutcomeResponse>>> {
    request.validate()?;
    let outcome = state.lines.create_line(request.into_command()?).await?;
    Ok(Json(ApiResponse::success(outcome.into())))
}

/// Filtros excluyentes: empresa, origen+destino, destino, rango horario o
/// ruta+kilómetro
async fn list_lines(
    State(state): State<AppState>,
    Query(query): Query<LineListQuery>,
) -> AppResult<Json<Vec<LineResponse>>> {
    let lines = match query {
        LineListQuery { company: Some(company), .. } => state.line_queries.lines_by_company(&company).await?,
        LineListQuery {
            origin: Some(origin),
            destination: Some(destination),
            ..
        } => {
            state
                .line_queries
                .lines_by_origin_destination(&origin, &destination)
                .await?
        }
        LineListQuery {
            origin: None,
            destination: Some(destination),
            ..
        } => state.line_queries.lines_by_destination(&destination).await?,
        LineListQuery {
            from: Some(from),
            to: Some(to),
            ..
        } => {
            let from = parse_time("from", &from)?;
            let to = parse_time("to", &to)?;
            state.line_queries.lines_active_between(from, to).await?
        }
        LineListQuery {
            road: Some(road),
            km: Some(km),
            ..
        } => state.line_queries.lines_at_kilometre(road, km).await?,
        LineListQuery { origin: Some(_), .. } => return Err(invalid_field("destination", "required_with_origin")),
        LineListQuery { from: Some(_), .. } => return Err(invalid_field("to", "required_with_from")),
        LineListQuery { to: Some(_), .. } => return Err(invalid_field("from", "required_with_to")),
        LineListQuery { road: Some(_), .. } => return Err(invalid_field("km", "required_with_road")),
        LineListQuery { km: Some(_), .. } => return Err(invalid_field("road", "required_with_km")),
        _ => state.line_queries.list_lines().await?,
    };
    Ok(Json(responses(lines)))
}

async fn get_line(State(state): State<AppState>, Path(id): Path<Uuid>) -> AppResult<Json<LineResponse>> {
    let line = state.line_queries.get_line(id).await?;
    let response = LineResponse::from(line.clone()).with_wkt(&line);
    Ok(Json(response))
}

async fn update_line(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateLineRequest>,
) -> AppResult<Json<ApiResponse<LineOutcomeResponse>>> {
    request.validate()?;
    let outcome = state.lines.modify_line(id, request.into_changes()?).await?;
    Ok(Json(ApiResponse::success(outcome.into())))
}

async fn delete_line(State(state): State<AppState>, Path(id): Path<Uuid>) -> AppResult<Json<ApiResponse<()>>> {
    state.lines.delete_line(id).await?;
    Ok(Json(ApiResponse::message("Line deleted")))
}

async fn set_line_enabled(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<SetEnabledRequest>,
) -> AppResult<Json<ApiResponse<LineOutcomeResponse>>> {
    let outcome = state.lines.set_line_enabled(id, request.enabled).await?;
    Ok(Json(ApiResponse::success(outcome.into())))
}

async fn line_stops(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<LineStopResponse>>> {
    let stops = state.associations.line_stops(id).await?;
    Ok(Json(stops.into_iter().map(LineStopResponse::from).collect()))
}

async fn search_by_polygon(
    State(state): State<AppState>,
    Json(request): Json<PolygonSearchRequest>,
) -> AppResult<Json<Vec<LineResponse>>> {
    let lines = state
        .line_queries
        .lines_intersecting_polygon(&geojson_text(&request.polygon))
        .await?;
    Ok(Json(responses(lines)))
}
