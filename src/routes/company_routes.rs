use axum::{extract::State, routing::get, Json, Router};

use crate::state::AppState;
use crate::utils::errors::AppResult;

pub fn create_company_router() -> Router<AppState> {
    Router::new().route("/", get(list_companies))
}

/// Empresas registradas al dar de alta o modificar líneas
async fn list_companies(State(state): State<AppState>) -> AppResult<Json<Vec<String>>> {
    let companies = state.line_queries.list_companies().await?;
    Ok(Json(companies))
}
