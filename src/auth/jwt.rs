use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::models::Role;

#[derive(Clone)]
pub struct JwtService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    expiry: Duration,
}

impl JwtService {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let expiry = Duration::try_minutes(config.jwt_expiry_minutes)
            .filter(|expiry| *expiry > Duration::zero())
            .with_context(|| {
                format!(
                    "JWT_EXPIRY_MINUTES must be a positive number of minutes, got {}",
                    config.jwt_expiry_minutes
                )
            })?;
        Ok(Self::new(
            &config.jwt_secret,
            &config.jwt_issuer,
            &config.jwt_audience,
            expiry,
        ))
    }

    pub fn new(secret: &str, issuer: &str, audience: &str, expiry: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.to_owned(),
            audience: audience.to_owned(),
            expiry,
        }
    }

    pub fn expires_in_seconds(&self) -> i64 {
        self.expiry.num_seconds()
    }

    pub fn generate_token(&self, id_user: i32, rol: Role) -> Result<String> {
        self.generate_token_at(id_user, rol, Utc::now())
    }

    /// Issues a token as if it had been created at `issued_at`.
    pub fn generate_token_at(
        &self,
        id_user: i32,
        rol: Role,
        issued_at: DateTime<Utc>,
    ) -> Result<String> {
        let exp = issued_at + self.expiry;
        let claims = Claims {
            id_user,
            rol,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: issued_at.timestamp(),
            exp: exp.timestamp(),
        };

        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::default();
        validation.leeway = 0;
        validation.set_audience(&[self.audience.clone()]);
        validation.set_issuer(&[self.issuer.clone()]);
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        Ok(data.claims)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub id_user: i32,
    pub rol: Role,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}
