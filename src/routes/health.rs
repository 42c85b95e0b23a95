use axum::{extract::State, http::StatusCode, response::Json};
use diesel::{sql_query, RunQueryDsl};
use serde_json::json;

use crate::{error::AppResult, state::AppState};

pub async fn liveness() -> Json<serde_json::Value> {
    Json(json!({ "message": "API running" }))
}

pub async fn health_check(
    State(state): State<AppState>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let mut conn = state.db()?;
    sql_query("SELECT 1").execute(&mut conn)?;
    Ok((StatusCode::OK, Json(json!({ "status": "ok" }))))
}
