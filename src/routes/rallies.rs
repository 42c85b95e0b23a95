use axum::{extract::State, Json};
use chrono::Utc;
use diesel::prelude::*;
use serde::Deserialize;
use tracing::info;

use crate::{
    auth::{AdminUser, AuthenticatedUser},
    error::{AppError, AppResult},
    models::{NewRallyConfig, Rally, RallyConfig},
    rally::{find_active_rally, find_config},
    schema::{configuration, rallies},
    state::AppState,
    utils::extract::ApiJson,
};

use super::users::UpdatedResponse;

#[derive(Deserialize)]
pub struct UpdateConfigRequest {
    pub max_photos_user: Option<i32>,
    pub upload_deadline: Option<i32>,
    pub voting_deadline: Option<i32>,
    pub id_rally: Option<i32>,
}

pub async fn current_rally(State(state): State<AppState>) -> AppResult<Json<Rally>> {
    let mut conn = state.db()?;
    let rally = find_active_rally(&mut conn, Utc::now().date_naive())?
        .ok_or_else(|| AppError::not_found_with("no active rally"))?;
    Ok(Json(rally))
}

pub async fn get_config(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> AppResult<Json<RallyConfig>> {
    let mut conn = state.db()?;
    let rally = find_active_rally(&mut conn, Utc::now().date_naive())?
        .ok_or_else(|| AppError::not_found_with("no active rally"))?;
    let config = find_config(&mut conn, rally.id_rally)?
        .ok_or_else(|| AppError::not_found_with("configuration not found"))?;
    Ok(Json(config))
}

pub async fn update_config(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiJson(payload): ApiJson<UpdateConfigRequest>,
) -> AppResult<Json<UpdatedResponse>> {
    let mut errors = Vec::new();
    let max_photos_user = non_negative("max_photos_user", payload.max_photos_user, &mut errors);
    let upload_deadline = non_negative("upload_deadline", payload.upload_deadline, &mut errors);
    let voting_deadline = non_negative("voting_deadline", payload.voting_deadline, &mut errors);
    if !errors.is_empty() {
        return Err(AppError::validation(errors));
    }

    let mut conn = state.db()?;
    let id_rally = match payload.id_rally {
        Some(id_rally) => rallies::table
            .find(id_rally)
            .select(rallies::id_rally)
            .first::<i32>(&mut conn)
            .optional()?
            .ok_or_else(|| AppError::not_found_with("rally not found"))?,
        None => {
            find_active_rally(&mut conn, Utc::now().date_naive())?
                .ok_or_else(|| AppError::not_found_with("no active rally"))?
                .id_rally
        }
    };

    let values = NewRallyConfig {
        id_rally,
        max_photos_user,
        upload_deadline,
        voting_deadline,
    };

    diesel::insert_into(configuration::table)
        .values(&values)
        .on_conflict(configuration::id_rally)
        .do_update()
        .set(&values)
        .execute(&mut conn)?;

    info!(
        admin = admin.id_user,
        id_rally, max_photos_user, upload_deadline, voting_deadline, "updated rally configuration"
    );
    Ok(Json(UpdatedResponse { updated: true }))
}

fn non_negative(field: &str, value: Option<i32>, errors: &mut Vec<String>) -> i32 {
    match value {
        Some(value) if value >= 0 => value,
        Some(_) => {
            errors.push(format!("{field} must not be negative"));
            0
        }
        None => {
            errors.push(format!("{field} is required"));
            0
        }
    }
}
