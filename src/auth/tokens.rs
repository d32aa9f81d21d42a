//! Persistence of login state: the user's registered token plus the issued-token rows.

use crate::config::{AdminConfig, ResolvedEntity};
use crate::db::Session;
use crate::error::{AppError, ConfigError};
use crate::service::{as_flag, Actor, CrudService};
use crate::sql::BindValue;
use crate::state::AppState;
use serde_json::{json, Map, Value};

pub const PASSWORD_COLUMN: &str = "PASSWORD";
pub const TOKEN_COLUMN: &str = "TOKEN";
pub const ACTIVE_COLUMN: &str = "IS_ACTIVE";
const EXPIRED_AT_COLUMN: &str = "EXPIRED_AT";
const LAST_LOGIN_COLUMN: &str = "LAST_LOGIN";
const ISSUED_USER_COLUMN: &str = "USER_ID";
const ISSUED_EXPIRY_COLUMN: &str = "EXPIRED_DT";

pub struct TokenStore<'a> {
    state: &'a AppState,
    session: &'a Session,
}

impl<'a> TokenStore<'a> {
    pub fn new(state: &'a AppState, session: &'a Session) -> Self {
        TokenStore { state, session }
    }

    pub fn users(&self) -> Result<&'a ResolvedEntity, AppError> {
        entity(self.state, &self.state.security.user_entity)
    }

    fn issued(&self) -> Result<&'a ResolvedEntity, AppError> {
        entity(self.state, &self.state.security.token_entity)
    }

    /// Raw user row, including password and token.
    pub async fn find_user(&self, username: &str) -> Result<Option<Value>, AppError> {
        let users = self.users()?;
        CrudService::find_by(
            self.state,
            self.session,
            users,
            &users.pk_column,
            BindValue::coerce(&Value::String(username.to_string()), users.pk_kind),
        )
        .await
    }

    /// Check credentials. Unknown users, wrong passwords and inactive accounts look the same.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<Value, AppError> {
        let rejected = || AppError::BadRequest("Unable to log in with provided credentials.".into());
        let user = self.find_user(username).await?.ok_or_else(rejected)?;
        let stored = user.get(PASSWORD_COLUMN).and_then(Value::as_str).unwrap_or_default();
        if !super::password::verify_password(password, stored) || !as_flag(user.get(ACTIVE_COLUMN)) {
            tracing::info!(username = %username, "login rejected");
            return Err(rejected());
        }
        Ok(user)
    }

    /// Register `token` as the user's only valid token (login and refresh).
    pub async fn record_login(&self, username: &str, token: &str, ip: Option<String>) -> Result<(), AppError> {
        let users = self.users()?;
        let issued = self.issued()?;
        let now = chrono::Utc::now();
        let expires = (now + chrono::Duration::minutes(self.state.security.jwt_expiry_minutes)).to_rfc3339();
        let user_id = BindValue::coerce(&Value::String(username.to_string()), users.pk_kind);

        let mut sets = vec![
            (TOKEN_COLUMN.to_string(), BindValue::text(token)),
            (EXPIRED_AT_COLUMN.to_string(), BindValue::text(&expires)),
            (LAST_LOGIN_COLUMN.to_string(), BindValue::text(now.to_rfc3339())),
        ];
        sets.retain(|(c, _)| users.column(c).is_some());
        CrudService::set_columns(self.state, self.session, users, user_id, &sets).await?;

        CrudService::delete_where(
            self.state,
            self.session,
            issued,
            ISSUED_USER_COLUMN,
            BindValue::text(username),
        )
        .await?;
        let mut row = Map::new();
        row.insert(TOKEN_COLUMN.to_string(), json!(token));
        row.insert(ISSUED_USER_COLUMN.to_string(), json!(username));
        row.insert(ISSUED_EXPIRY_COLUMN.to_string(), json!(expires));
        CrudService::create(self.state, self.session, issued, &row, &Actor::new(username, ip)).await?;
        tracing::info!(username = %username, "token issued");
        Ok(())
    }

    /// Drop every issued token and unregister the current one.
    pub async fn revoke(&self, username: &str) -> Result<(), AppError> {
        let users = self.users()?;
        let issued = self.issued()?;
        CrudService::delete_where(
            self.state,
            self.session,
            issued,
            ISSUED_USER_COLUMN,
            BindValue::text(username),
        )
        .await?;
        let user_id = BindValue::coerce(&Value::String(username.to_string()), users.pk_kind);
        let cleared = [(TOKEN_COLUMN.to_string(), BindValue::Null(crate::config::ValueKind::Text))];
        CrudService::set_columns(self.state, self.session, users, user_id, &cleared).await?;
        tracing::info!(username = %username, "tokens revoked");
        Ok(())
    }

    /// Create the configured superuser unless it already exists.
    pub async fn ensure_admin(&self, admin: &AdminConfig) -> Result<bool, AppError> {
        if self.find_user(&admin.username).await?.is_some() {
            return Ok(false);
        }
        let users = self.users()?;
        let mut body = Map::new();
        body.insert(users.pk_column.clone(), json!(admin.username));
        body.insert(PASSWORD_COLUMN.to_string(), json!(admin.password));
        body.insert("NM".to_string(), json!(admin.name.clone().unwrap_or_else(|| admin.username.clone())));
        body.insert("EMAIL".to_string(), json!(admin.email.clone().unwrap_or_default()));
        body.insert(ACTIVE_COLUMN.to_string(), json!(1));
        body.insert("IS_STAFF".to_string(), json!(1));
        body.insert("IS_SUPERUSER".to_string(), json!(1));
        CrudService::create(self.state, self.session, users, &body, &Actor::new("system", None)).await?;
        tracing::info!(username = %admin.username, "admin user created");
        Ok(true)
    }
}

fn entity<'a>(state: &'a AppState, path: &str) -> Result<&'a ResolvedEntity, AppError> {
    state.model.entity_by_path(path).ok_or_else(|| {
        ConfigError::MissingReference {
            kind: "entity",
            id: path.to_string(),
        }
        .into()
    })
}
