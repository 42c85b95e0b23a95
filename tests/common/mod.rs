use std::env;

use anyhow::{anyhow, ensure, Context, Result};
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use chrono::{Duration, NaiveDate, Utc};
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::PgConnection;
use http_body_util::BodyExt;
use once_cell::sync::Lazy;
use rally::auth::{jwt::JwtService, password};
use rally::config::{AppConfig, DEFAULT_MAX_BODY_BYTES};
use rally::db::{self, PgPool};
use rally::models::{NewRally, NewRallyConfig, NewUser};
use rally::routes;
use rally::schema::{configuration, photography, rallies, users};
use rally::state::AppState;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;
use tower::util::ServiceExt;

static DB_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

pub const PARTICIPANT: &str = "participante";
pub const ADMIN: &str = "administrador";

pub struct TestApp {
    pub state: AppState,
    router: Router,
}

impl TestApp {
    pub async fn new() -> Result<Self> {
        let database_url = env::var("TEST_DATABASE_URL")
            .context("TEST_DATABASE_URL must be set for integration tests")?;

        let config = AppConfig {
            database_url: database_url.clone(),
            database_max_pool_size: 4,
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            jwt_secret: "test-secret".to_string(),
            jwt_issuer: "test-issuer".to_string(),
            jwt_audience: "test-audience".to_string(),
            jwt_expiry_minutes: 60,
            cors_allowed_origins: None,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        };

        let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
        prepare_database(&pool).await?;

        let jwt = JwtService::from_config(&config)?;
        let state = AppState::new(pool, config, jwt);
        let router = routes::create_router(state.clone());

        Ok(Self { state, router })
    }

    pub async fn cleanup(&self) -> Result<()> {
        self.with_conn(truncate_all).await
    }

    pub async fn insert_user(
        &self,
        name: &str,
        email: &str,
        password: &str,
        rol: &str,
    ) -> Result<i32> {
        let user = NewUser {
            name: name.to_string(),
            email: email.to_string(),
            password: password::hash_password(password)?,
            rol: rol.to_string(),
        };
        self.with_conn(move |conn| {
            diesel::insert_into(users::table)
                .values(&user)
                .returning(users::id_user)
                .get_result(conn)
                .context("failed to insert user")
        })
        .await
    }

    /// Inserts a rally spanning `[today + start_offset, today + end_offset]`.
    pub async fn insert_rally(&self, name: &str, start_offset: i64, end_offset: i64) -> Result<i32> {
        let today = Utc::now().date_naive();
        let rally = NewRally {
            name: name.to_string(),
            theme: format!("{name} theme"),
            start_date: today + Duration::days(start_offset),
            end_date: today + Duration::days(end_offset),
        };
        self.with_conn(move |conn| {
            diesel::insert_into(rallies::table)
                .values(&rally)
                .returning(rallies::id_rally)
                .get_result(conn)
                .context("failed to insert rally")
        })
        .await
    }

    #[allow(dead_code)]
    pub async fn insert_rally_on(&self, name: &str, start: NaiveDate, end: NaiveDate) -> Result<i32> {
        let rally = NewRally {
            name: name.to_string(),
            theme: format!("{name} theme"),
            start_date: start,
            end_date: end,
        };
        self.with_conn(move |conn| {
            diesel::insert_into(rallies::table)
                .values(&rally)
                .returning(rallies::id_rally)
                .get_result(conn)
                .context("failed to insert rally")
        })
        .await
    }

    #[allow(dead_code)]
    pub async fn insert_config(&self, id_rally: i32, max_photos_user: i32) -> Result<()> {
        let config = NewRallyConfig {
            id_rally,
            max_photos_user,
            upload_deadline: 7,
            voting_deadline: 14,
        };
        self.with_conn(move |conn| {
            diesel::insert_into(configuration::table)
                .values(&config)
                .execute(conn)
                .context("failed to insert configuration")?;
            Ok(())
        })
        .await
    }

    #[allow(dead_code)]
    pub async fn set_photo_state(&self, id_photo: i32, state: &str) -> Result<()> {
        let state = state.to_string();
        self.with_conn(move |conn| {
            diesel::update(photography::table.find(id_photo))
                .set(photography::state.eq(state))
                .execute(conn)
                .context("failed to update photo state")?;
            Ok(())
        })
        .await
    }

    #[allow(dead_code)]
    pub async fn count_configs(&self, id_rally: i32) -> Result<i64> {
        self.with_conn(move |conn| {
            configuration::table
                .filter(configuration::id_rally.eq(id_rally))
                .count()
                .get_result(conn)
                .context("failed to count configurations")
        })
        .await
    }

    pub async fn login_token(&self, email: &str, password: &str) -> Result<String> {
        #[derive(Serialize)]
        struct LoginPayload<'a> {
            email: &'a str,
            password: &'a str,
        }

        let response = self
            .post_json("/login", &LoginPayload { email, password }, None)
            .await?;

        ensure!(
            response.status() == StatusCode::OK,
            "login failed with status {}",
            response.status()
        );

        #[derive(serde::Deserialize)]
        struct LoginResponse {
            token: String,
        }
        let parsed: LoginResponse = json_body(response).await?;
        Ok(parsed.token)
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        self.send_json(Method::POST, path, payload, token, &[]).await
    }

    #[allow(dead_code)]
    pub async fn put_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        self.send_json(Method::PUT, path, payload, token, &[]).await
    }

    pub async fn send_json<T: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        payload: &T,
        token: Option<&str>,
        headers: &[(&str, &str)],
    ) -> Result<hyper::Response<Body>> {
        let body = serde_json::to_vec(payload)?;
        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let request = builder.body(Body::from(body))?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    #[allow(dead_code)]
    pub async fn post_raw(&self, path: &str, body: &str) -> Result<hyper::Response<Body>> {
        let request = Request::builder()
            .method(Method::POST)
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        let mut builder = Request::builder().method(Method::GET).uri(path);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(Body::empty())?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    #[allow(dead_code)]
    pub async fn delete(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        let builder = Request::builder().method(Method::DELETE).uri(path);
        let builder = if let Some(token) = token {
            builder.header("authorization", format!("Bearer {token}"))
        } else {
            builder
        };
        let request = builder.body(Body::empty())?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    #[allow(dead_code)]
    pub async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut PgConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.state.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|err| anyhow!("failed to get database connection: {err}"))?;
            f(&mut conn)
        })
        .await
        .context("connection task panicked")?
    }
}

/// A small valid image data URL; `seed` makes the payload unique.
#[allow(dead_code)]
pub fn image(seed: u32) -> String {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    let mut bytes = vec![0x89, b'P', b'N', b'G'];
    bytes.extend_from_slice(&seed.to_be_bytes());
    format!("data:image/png;base64,{}", STANDARD.encode(bytes))
}

pub async fn acquire_db_lock() -> tokio::sync::MutexGuard<'static, ()> {
    DB_LOCK.lock().await
}

pub async fn body_to_vec(body: Body) -> Result<Vec<u8>> {
    let collected = body
        .collect()
        .await
        .map_err(|err| anyhow!("failed to read response body: {err}"))?;
    Ok(collected.to_bytes().to_vec())
}

pub async fn json_body<T: DeserializeOwned>(response: hyper::Response<Body>) -> Result<T> {
    let body = body_to_vec(response.into_body()).await?;
    serde_json::from_slice(&body).with_context(|| {
        format!(
            "unexpected response body: {}",
            String::from_utf8_lossy(&body)
        )
    })
}

async fn prepare_database(pool: &PgPool) -> Result<()> {
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || -> Result<()> {
        db::run_migrations(&pool)?;
        let mut conn = pool
            .get()
            .map_err(|err| anyhow!("failed to acquire connection: {err}"))?;
        truncate_all(&mut conn)?;
        Ok(())
    })
    .await
    .context("migration task panicked")?
}

fn truncate_all(conn: &mut PgConnection) -> Result<()> {
    conn.batch_execute(
        "TRUNCATE TABLE anonymous_votes_control, user_votes_control, photography, configuration, rallies, users RESTART IDENTITY CASCADE;",
    )
    .context("failed to truncate tables")?;
    Ok(())
}
