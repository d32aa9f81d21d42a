//! HS256 session tokens with a refresh window measured from the original issue time.

use crate::config::SecurityConfig;
use crate::error::AppError;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Claims {
    pub username: String,
    pub exp: i64,
    pub iat: i64,
    /// Issue time of the first token in a refresh chain.
    pub orig_iat: i64,
}

pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    expiry: Duration,
    refresh_window: Duration,
}

impl JwtKeys {
    pub fn from_config(security: &SecurityConfig) -> Self {
        JwtKeys {
            encoding: EncodingKey::from_secret(security.jwt_secret.as_bytes()),
            decoding: DecodingKey::from_secret(security.jwt_secret.as_bytes()),
            expiry: Duration::minutes(security.jwt_expiry_minutes),
            refresh_window: Duration::days(security.refresh_expiry_days),
        }
    }

    pub fn issue(&self, username: &str) -> Result<String, AppError> {
        let now = Utc::now().timestamp();
        self.sign(Claims {
            username: username.to_string(),
            exp: now + self.expiry.num_seconds(),
            iat: now,
            orig_iat: now,
        })
    }

    /// New token for the same user, keeping `orig_iat`.
    pub fn refresh(&self, token: &str) -> Result<(Claims, String), AppError> {
        let claims = self.decode(token).map_err(|_| AppError::BadRequest("Error decoding token.".into()))?;
        let now = Utc::now().timestamp();
        if now > claims.orig_iat + self.refresh_window.num_seconds() {
            return Err(AppError::BadRequest("Refresh has expired.".into()));
        }
        let refreshed = Claims {
            username: claims.username,
            exp: now + self.expiry.num_seconds(),
            iat: now,
            orig_iat: claims.orig_iat,
        };
        let token = self.sign(refreshed.clone())?;
        Ok((refreshed, token))
    }

    pub fn decode(&self, token: &str) -> Result<Claims, AppError> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "token rejected");
                AppError::Unauthorized("Invalid or expired token.".into())
            })
    }

    fn sign(&self, claims: Claims) -> Result<String, AppError> {
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(format!("token generation: {}", e)))
    }
}
