use axum::{extract::State, http::StatusCode, Json};
use diesel::{prelude::*, PgConnection};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    auth::password,
    error::{AppError, AppResult},
    models::{NewUser, Role, User, MAX_EMAIL_LEN, MAX_NAME_LEN},
    schema::users,
    state::AppState,
    utils::{
        extract::ApiJson,
        json::{length_errors, required_fields},
    },
};

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Serialize)]
pub struct RegisterResponse {
    pub id_user: i32,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: String,
    pub expires_in: i64,
}

pub async fn register(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> AppResult<(StatusCode, Json<RegisterResponse>)> {
    let mut errors = required_fields(&[
        ("name", payload.name.as_deref()),
        ("email", payload.email.as_deref()),
        ("password", payload.password.as_deref()),
    ]);
    errors.extend(length_errors(&[
        ("name", payload.name.as_deref().map(str::trim), MAX_NAME_LEN),
        ("email", payload.email.as_deref().map(str::trim), MAX_EMAIL_LEN),
    ]));
    if !errors.is_empty() {
        return Err(AppError::validation(errors));
    }

    let name = payload.name.unwrap_or_default().trim().to_string();
    let email = normalize_email(&payload.email.unwrap_or_default())?;
    let password_hash = password::hash_password(&payload.password.unwrap_or_default())?;

    let mut conn = state.db()?;

    if email_taken(&mut conn, &email, None)? {
        return Err(AppError::bad_request("email already registered"));
    }

    let new_user = NewUser {
        name,
        email,
        password: password_hash,
        rol: Role::Participant.as_str().to_string(),
    };

    let id_user = match diesel::insert_into(users::table)
        .values(&new_user)
        .returning(users::id_user)
        .get_result::<i32>(&mut conn)
    {
        Ok(id) => id,
        Err(diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::UniqueViolation,
            _,
        )) => {
            return Err(AppError::bad_request("email already registered"));
        }
        Err(err) => return Err(AppError::from(err)),
    };

    info!(id_user, "registered user");
    Ok((StatusCode::CREATED, Json(RegisterResponse { id_user })))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let mut conn = state.db()?;
    let email = payload.email.trim();

    let user: Option<User> = users::table
        .filter(users::email.eq(email))
        .first(&mut conn)
        .optional()?;

    let Some(user) = user else {
        warn!("login attempt for unknown email");
        return Err(invalid_credentials());
    };

    let valid = password::verify_password(&payload.password, &user.password)
        .map_err(|_| invalid_credentials())?;
    if !valid {
        warn!(id_user = user.id_user, "login attempt with wrong password");
        return Err(invalid_credentials());
    }

    let rol: Role = user.rol.parse().map_err(AppError::internal)?;
    let token = state.jwt.generate_token(user.id_user, rol)?;

    Ok(Json(LoginResponse {
        token,
        token_type: "Bearer".to_string(),
        expires_in: state.jwt.expires_in_seconds(),
    }))
}

fn invalid_credentials() -> AppError {
    AppError::new(StatusCode::UNAUTHORIZED, "invalid credentials")
}

pub(crate) fn normalize_email(raw: &str) -> AppResult<String> {
    let email = raw.trim();
    let errors = length_errors(&[("email", Some(email), MAX_EMAIL_LEN)]);
    if !errors.is_empty() {
        return Err(AppError::validation(errors));
    }
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {
            Ok(email.to_string())
        }
        _ => Err(AppError::bad_request("email is not valid")),
    }
}

/// Whether `email` belongs to a user other than `except`.
pub(crate) fn email_taken(
    conn: &mut PgConnection,
    email: &str,
    except: Option<i32>,
) -> AppResult<bool> {
    let mut query = users::table
        .filter(users::email.eq(email))
        .select(users::id_user)
        .into_boxed();
    if let Some(id_user) = except {
        query = query.filter(users::id_user.ne(id_user));
    }
    Ok(query.first::<i32>(conn).optional()?.is_some())
}
