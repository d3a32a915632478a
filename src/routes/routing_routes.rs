use axum::{extract::State, routing::post, Json, Router};
use validator::Validate;

use crate::dto::routing_dto::{ShortestPathRequest, ShortestPathResponse, ValidateRouteRequest, ValidateRouteResponse};
use crate::dto::{geojson_text, to_points, ApiResponse};
use crate::models::RouteGeometry;
use crate::state::AppState;
use crate::utils::errors::AppResult;
use crate::utils::geo::parse_route_geojson;

pub fn create_routing_router() -> Router<AppState> {
    Router::new()
        .route("/shortest-path", post(shortest_path))
        .route("/validate", post(validate_route))
}

async fn shortest_path(
    State(state): State<AppState>,
    Json(request): Json<ShortestPathRequest>,
) -> AppResult<Json<ApiResponse<ShortestPathResponse>>> {
    request.validate()?;
    let waypoints = to_points(&request.waypoints)?;
    let max_snap = request
        .max_snap_distance_m
        .unwrap_or(state.network.max_snap_distance_m);

    let computed = state.calculator.compute_route(&waypoints, max_snap).await?;
    let response = ShortestPathResponse::from(computed);
    if response.continuous {
        Ok(Json(ApiResponse::success(response)))
    } else {
        Ok(Json(ApiResponse::success_with_message(
            response,
            "route could not be merged into a single line",
        )))
    }
}

/// Rechaza con 422 si algún chequeo falla
async fn validate_route(
    State(state): State<AppState>,
    Json(request): Json<ValidateRouteRequest>,
) -> AppResult<Json<ApiResponse<ValidateRouteResponse>>> {
    let route = RouteGeometry::from_multi(parse_route_geojson(&geojson_text(&request.route))?);

    let mut tx = state.store.begin().await?;
    let report = state.validator.ensure_valid(tx.as_mut(), &route).await?;
    drop(tx);

    Ok(Json(ApiResponse::success(report.into())))
}
