use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use diesel::{prelude::*, PgConnection};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::{
    error::{AppError, AppResult},
    models::{Photo, PhotoState, MAX_TITLE_LEN},
    schema::photography,
    state::AppState,
    upload::{self, ImageDataUrl, UploadRequest},
    utils::{
        extract::{ApiJson, ApiPath, ApiQuery},
        json::{
            classify_nullable, length_errors, optional_string, required_fields, NullableValue,
        },
    },
};

use super::users::{DeletedResponse, UpdatedResponse};

#[derive(Serialize)]
pub struct PhotoResponse {
    pub id_photo: i32,
    pub id_user: Option<i32>,
    pub title: String,
    pub description: Option<String>,
    pub file: String,
    pub state: String,
    pub upload_date: DateTime<Utc>,
    pub total_votes: i32,
    pub id_rally: i32,
}

impl From<Photo> for PhotoResponse {
    fn from(photo: Photo) -> Self {
        Self {
            id_photo: photo.id_photo,
            id_user: photo.id_user,
            title: photo.title,
            description: photo.description,
            file: photo.file,
            state: photo.state,
            upload_date: photo.upload_date,
            total_votes: photo.total_votes,
            id_rally: photo.id_rally,
        }
    }
}

#[derive(Deserialize)]
pub struct PhotoListQuery {
    pub state: Option<String>,
    pub rally_id: Option<i32>,
}

#[derive(Deserialize)]
pub struct UploadPhotoRequest {
    pub id_user: Option<i32>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub file: Option<String>,
    pub id_rally: Option<i32>,
}

#[derive(Serialize)]
pub struct UploadPhotoResponse {
    pub id_photo: i32,
}

#[derive(AsChangeset, Default)]
#[diesel(table_name = photography)]
struct UpdatePhotoChangeset {
    title: Option<String>,
    description: Option<Option<String>>,
    state: Option<String>,
}

pub async fn list_photos(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<PhotoListQuery>,
) -> AppResult<Json<Vec<PhotoResponse>>> {
    let mut query = photography::table.into_boxed();

    if let Some(raw_state) = params.state.as_deref() {
        let photo_state: PhotoState = raw_state.parse().map_err(AppError::bad_request)?;
        query = query.filter(photography::state.eq(photo_state.as_str()));
    }
    if let Some(rally_id) = params.rally_id {
        query = query.filter(photography::id_rally.eq(rally_id));
    }

    let mut conn = state.db()?;
    let photos: Vec<Photo> = query.order(photography::id_photo.asc()).load(&mut conn)?;
    Ok(Json(photos.into_iter().map(PhotoResponse::from).collect()))
}

pub async fn get_photo(
    State(state): State<AppState>,
    ApiPath(id_photo): ApiPath<i32>,
) -> AppResult<Json<PhotoResponse>> {
    let mut conn = state.db()?;
    let photo = find_photo(&mut conn, id_photo)?;
    Ok(Json(photo.into()))
}

pub async fn upload_photo(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<UploadPhotoRequest>,
) -> AppResult<(StatusCode, Json<UploadPhotoResponse>)> {
    let mut errors = required_fields(&[
        ("title", payload.title.as_deref()),
        ("file", payload.file.as_deref()),
    ]);
    if payload.id_user.is_none() {
        errors.insert(0, "id_user is required".to_string());
    }
    errors.extend(length_errors(&[(
        "title",
        payload.title.as_deref().map(str::trim),
        MAX_TITLE_LEN,
    )]));
    if let Some(file) = payload.file.as_deref().filter(|f| !f.trim().is_empty()) {
        if let Err(err) = ImageDataUrl::parse(file) {
            errors.push(err.to_string());
        }
    }
    if !errors.is_empty() {
        return Err(AppError::validation(errors));
    }

    let request = UploadRequest {
        id_user: payload.id_user.unwrap_or_default(),
        title: payload.title.unwrap_or_default().trim().to_string(),
        description: payload.description,
        file: payload.file.unwrap_or_default(),
        id_rally: payload.id_rally,
    };
    let id_user = request.id_user;

    let mut conn = state.db()?;
    let photo = upload::admit_photo(&mut conn, request, Utc::now().date_naive()).map_err(
        |err| {
            debug!(id_user, reason = %err, "photo upload rejected");
            AppError::from(err)
        },
    )?;

    info!(
        id_user,
        id_photo = photo.id_photo,
        id_rally = photo.id_rally,
        "photo uploaded"
    );
    Ok((
        StatusCode::CREATED,
        Json(UploadPhotoResponse {
            id_photo: photo.id_photo,
        }),
    ))
}

pub async fn update_photo(
    State(state): State<AppState>,
    ApiPath(id_photo): ApiPath<i32>,
    ApiJson(body): ApiJson<Value>,
) -> AppResult<Json<UpdatedResponse>> {
    let mut changes = UpdatePhotoChangeset::default();

    if let Some(title) = optional_string(&body, "title").map_err(AppError::bad_request)? {
        let trimmed = title.trim();
        if trimmed.is_empty() {
            return Err(AppError::bad_request("title must not be empty"));
        }
        let errors = length_errors(&[("title", Some(trimmed), MAX_TITLE_LEN)]);
        if !errors.is_empty() {
            return Err(AppError::validation(errors));
        }
        changes.title = Some(trimmed.to_string());
    }

    match classify_nullable(body.get("description")).map_err(AppError::bad_request)? {
        NullableValue::Omitted => {}
        NullableValue::Null => changes.description = Some(None),
        NullableValue::String(value) => changes.description = Some(Some(value)),
    }

    if let Some(raw_state) = optional_string(&body, "state").map_err(AppError::bad_request)? {
        let photo_state: PhotoState = raw_state.parse().map_err(AppError::bad_request)?;
        changes.state = Some(photo_state.as_str().to_string());
    }

    if changes.title.is_none() && changes.description.is_none() && changes.state.is_none() {
        return Err(AppError::bad_request("nothing to update"));
    }

    let mut conn = state.db()?;
    let updated = diesel::update(photography::table.find(id_photo))
        .set(&changes)
        .execute(&mut conn)?;
    if updated == 0 {
        return Err(photo_not_found());
    }

    if let Some(photo_state) = changes.state.as_deref() {
        info!(id_photo, state = photo_state, "photo moderated");
    }
    Ok(Json(UpdatedResponse { updated: true }))
}

pub async fn delete_photo(
    State(state): State<AppState>,
    ApiPath(id_photo): ApiPath<i32>,
) -> AppResult<Json<DeletedResponse>> {
    let mut conn = state.db()?;
    let deleted = diesel::delete(photography::table.find(id_photo)).execute(&mut conn)?;
    if deleted == 0 {
        return Err(photo_not_found());
    }
    info!(id_photo, "photo deleted");
    Ok(Json(DeletedResponse { deleted: true }))
}

pub(crate) fn find_photo(conn: &mut PgConnection, id_photo: i32) -> AppResult<Photo> {
    photography::table
        .find(id_photo)
        .first::<Photo>(conn)
        .optional()?
        .ok_or_else(photo_not_found)
}

fn photo_not_found() -> AppError {
    AppError::not_found_with("photo not found")
}
