use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use diesel::{prelude::*, PgConnection};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    auth::{password, AuthenticatedUser},
    error::{AppError, AppResult},
    models::{User, MAX_NAME_LEN},
    schema::{photography, user_votes_control, users},
    state::AppState,
    utils::{extract::ApiJson, json::length_errors},
};

use super::auth::{email_taken, normalize_email};

#[derive(Serialize)]
pub struct UserResponse {
    pub id_user: i32,
    pub name: String,
    pub email: String,
    pub rol: String,
    pub creation_date: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id_user: user.id_user,
            name: user.name,
            email: user.email,
            rol: user.rol,
            creation_date: user.creation_date,
        }
    }
}

#[derive(Serialize)]
pub struct UpdatedResponse {
    pub updated: bool,
}

#[derive(Serialize)]
pub struct DeletedResponse {
    pub deleted: bool,
}

#[derive(Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(AsChangeset, Default)]
#[diesel(table_name = users)]
pub(crate) struct UserChangeset {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub rol: Option<String>,
}

impl UserChangeset {
    pub(crate) fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.password.is_none() && self.rol.is_none()
    }
}

pub async fn get_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<UserResponse>> {
    let mut conn = state.db()?;
    let record: User = users::table
        .find(user.id_user)
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| AppError::not_found_with("user not found"))?;
    Ok(Json(record.into()))
}

pub async fn update_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiJson(payload): ApiJson<UpdateProfileRequest>,
) -> AppResult<Json<UpdatedResponse>> {
    let mut conn = state.db()?;

    let mut changes = UserChangeset {
        name: validated_name(payload.name)?,
        ..Default::default()
    };

    if let Some(email) = payload.email {
        let email = normalize_email(&email)?;
        if email_taken(&mut conn, &email, Some(user.id_user))? {
            return Err(AppError::bad_request("email already in use"));
        }
        changes.email = Some(email);
    }

    if let Some(new_password) = payload.password {
        if new_password.is_empty() {
            return Err(AppError::bad_request("password must not be empty"));
        }
        changes.password = Some(password::hash_password(&new_password)?);
    }

    apply_user_changes(&mut conn, user.id_user, &changes)?;
    Ok(Json(UpdatedResponse { updated: true }))
}

pub async fn delete_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<DeletedResponse>> {
    let mut conn = state.db()?;
    delete_user_cascade(&mut conn, user.id_user)?;
    Ok(Json(DeletedResponse { deleted: true }))
}

pub(crate) fn validated_name(name: Option<String>) -> AppResult<Option<String>> {
    match name {
        None => Ok(None),
        Some(name) => {
            let trimmed = name.trim();
            if trimmed.is_empty() {
                return Err(AppError::bad_request("name must not be empty"));
            }
            let errors = length_errors(&[("name", Some(trimmed), MAX_NAME_LEN)]);
            if !errors.is_empty() {
                return Err(AppError::validation(errors));
            }
            Ok(Some(trimmed.to_string()))
        }
    }
}

pub(crate) fn apply_user_changes(
    conn: &mut PgConnection,
    id_user: i32,
    changes: &UserChangeset,
) -> AppResult<()> {
    if changes.is_empty() {
        return Err(AppError::bad_request("nothing to update"));
    }

    let updated = match diesel::update(users::table.find(id_user))
        .set(changes)
        .execute(conn)
    {
        Ok(rows) => rows,
        Err(diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::UniqueViolation,
            _,
        )) => {
            return Err(AppError::bad_request("email already in use"));
        }
        Err(err) => return Err(AppError::from(err)),
    };

    if updated == 0 {
        return Err(AppError::not_found_with("user not found"));
    }
    Ok(())
}

/// Removes a user's votes (and the totals they contributed), detaches their
/// photos and deletes the account, all or nothing.
pub(crate) fn delete_user_cascade(conn: &mut PgConnection, id_user: i32) -> AppResult<()> {
    conn.transaction::<(), AppError, _>(|conn| {
        let voted_photos: Vec<i32> = diesel::delete(
            user_votes_control::table.filter(user_votes_control::id_user.eq(id_user)),
        )
        .returning(user_votes_control::id_photo)
        .get_results(conn)?;

        // One vote per user and photo, so each listed photo loses exactly one.
        if !voted_photos.is_empty() {
            diesel::update(photography::table.filter(photography::id_photo.eq_any(&voted_photos)))
                .set(photography::total_votes.eq(photography::total_votes - 1))
                .execute(conn)?;
        }

        let photos = diesel::update(photography::table.filter(photography::id_user.eq(id_user)))
            .set(photography::id_user.eq(None::<i32>))
            .execute(conn)?;

        let deleted = diesel::delete(users::table.find(id_user)).execute(conn)?;
        if deleted == 0 {
            return Err(AppError::not_found_with("user not found"));
        }

        info!(
            id_user,
            votes = voted_photos.len(),
            photos,
            "deleted user account"
        );
        Ok(())
    })
}
