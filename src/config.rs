use std::env;

use anyhow::{anyhow, Context, Result};
use url::Url;

use crate::db::DEFAULT_MAX_POOL_SIZE;

pub const DEFAULT_MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_pool_size: u32,
    pub server_host: String,
    pub server_port: u16,
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    pub jwt_expiry_minutes: i64,
    pub cors_allowed_origins: Option<String>,
    pub max_body_bytes: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let database_url = match env::var("DATABASE_URL") {
            Ok(url) => url,
            Err(_) => {
                let name = env::var("DB_NAME")
                    .context("DB_NAME must be set when DATABASE_URL is not provided")?;
                let host = env::var("DB_HOST").unwrap_or_else(|_| "localhost".to_string());
                let port = env::var("DB_PORT")
                    .unwrap_or_else(|_| "5432".to_string())
                    .parse()
                    .context("DB_PORT must be a valid u16")?;
                let user = env::var("DB_USER").ok();
                let pass = env::var("DB_PASS").ok();
                let sslmode = env::var("DB_SSLMODE").unwrap_or_else(|_| "prefer".to_string());
                build_database_url(
                    &host,
                    port,
                    &name,
                    user.as_deref(),
                    pass.as_deref(),
                    &sslmode,
                )?
            }
        };
        let database_max_pool_size = env::var("DATABASE_MAX_POOL_SIZE")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(DEFAULT_MAX_POOL_SIZE);
        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let server_port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .context("SERVER_PORT must be a valid u16")?;
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
        let jwt_issuer = env::var("JWT_ISSUER").unwrap_or_else(|_| "rally".to_string());
        let jwt_audience =
            env::var("JWT_AUDIENCE").unwrap_or_else(|_| "rally-clients".to_string());
        let jwt_expiry_minutes = env::var("JWT_EXPIRY_MINUTES")
            .unwrap_or_else(|_| "60".to_string())
            .parse()
            .context("JWT_EXPIRY_MINUTES must be an integer")?;
        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS").ok();
        let max_body_bytes = env::var("MAX_BODY_BYTES")
            .ok()
            .map(|value| value.parse())
            .transpose()
            .context("MAX_BODY_BYTES must be an integer")?
            .unwrap_or(DEFAULT_MAX_BODY_BYTES);

        Ok(Self {
            database_url,
            database_max_pool_size,
            server_host,
            server_port,
            jwt_secret,
            jwt_issuer,
            jwt_audience,
            jwt_expiry_minutes,
            cors_allowed_origins,
            max_body_bytes,
        })
    }

    pub fn redacted_database_url(&self) -> String {
        redact_database_url(&self.database_url)
    }
}

/// Assembles a libpq-style URL from the discrete `DB_*` settings.
/// Credentials are percent-encoded by `Url`.
pub fn build_database_url(
    host: &str,
    port: u16,
    name: &str,
    user: Option<&str>,
    password: Option<&str>,
    sslmode: &str,
) -> Result<String> {
    let mut url = Url::parse(&format!("postgres://{host}"))
        .with_context(|| format!("DB_HOST is not a valid host: {host}"))?;
    url.set_port(Some(port))
        .map_err(|_| anyhow!("cannot set port on database url"))?;
    if let Some(user) = user.filter(|u| !u.is_empty()) {
        url.set_username(user)
            .map_err(|_| anyhow!("cannot set user on database url"))?;
    }
    if let Some(password) = password.filter(|p| !p.is_empty()) {
        url.set_password(Some(password))
            .map_err(|_| anyhow!("cannot set password on database url"))?;
    }
    url.set_path(name);
    url.query_pairs_mut().append_pair("sslmode", sslmode);
    Ok(url.to_string())
}

fn redact_database_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("*****"));
            }
            parsed.to_string()
        }
        Err(_) => "***".to_string(),
    }
}
