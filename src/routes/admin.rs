use axum::{extract::State, Json};
use diesel::prelude::*;
use serde::Deserialize;
use tracing::info;

use crate::{
    auth::AdminUser,
    error::{AppError, AppResult},
    models::{Role, User},
    schema::users,
    state::AppState,
    utils::extract::{ApiJson, ApiPath},
};

use super::auth::{email_taken, normalize_email};
use super::users::{
    apply_user_changes, delete_user_cascade, validated_name, DeletedResponse, UpdatedResponse,
    UserChangeset, UserResponse,
};

#[derive(Deserialize)]
pub struct AdminUpdateUserRequest {
    pub id_user: Option<i32>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub rol: Option<String>,
}

pub async fn list_users(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> AppResult<Json<Vec<UserResponse>>> {
    let mut conn = state.db()?;
    let records: Vec<User> = users::table.order(users::id_user.asc()).load(&mut conn)?;
    Ok(Json(records.into_iter().map(UserResponse::from).collect()))
}

pub async fn update_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiJson(payload): ApiJson<AdminUpdateUserRequest>,
) -> AppResult<Json<UpdatedResponse>> {
    let id_user = payload
        .id_user
        .ok_or_else(|| AppError::validation(vec!["id_user is required".to_string()]))?;

    let mut conn = state.db()?;
    let mut changes = UserChangeset {
        name: validated_name(payload.name)?,
        ..Default::default()
    };

    if let Some(email) = payload.email {
        let email = normalize_email(&email)?;
        if email_taken(&mut conn, &email, Some(id_user))? {
            return Err(AppError::bad_request("email already in use"));
        }
        changes.email = Some(email);
    }

    if let Some(rol) = payload.rol {
        let rol: Role = rol.parse().map_err(AppError::bad_request)?;
        changes.rol = Some(rol.as_str().to_string());
    }

    apply_user_changes(&mut conn, id_user, &changes)?;
    info!(admin = admin.id_user, id_user, "admin updated user");
    Ok(Json(UpdatedResponse { updated: true }))
}

pub async fn delete_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiPath(id_user): ApiPath<i32>,
) -> AppResult<Json<DeletedResponse>> {
    let mut conn = state.db()?;
    delete_user_cascade(&mut conn, id_user)?;
    info!(admin = admin.id_user, id_user, "admin deleted user");
    Ok(Json(DeletedResponse { deleted: true }))
}
