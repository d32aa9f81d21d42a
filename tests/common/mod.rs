#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use crossdb_admin::{initialize, AppConfig, App};
use serde_json::{json, Value};
use std::path::PathBuf;
use tower::ServiceExt;

pub const ADMIN: &str = "admin";
pub const ADMIN_PASSWORD: &str = "admin1234";

/// A fresh SQLite file path under the temp dir.
pub fn temp_db(label: &str) -> PathBuf {
    std::env::temp_dir().join(format!("crossdb_{}_{}.sqlite3", label, uuid::Uuid::new_v4().simple()))
}

pub fn sqlite_db(alias: &str, path: &PathBuf) -> Value {
    json!({
        "alias": alias,
        "engine": "sqlite",
        "url": format!("sqlite://{}?mode=rwc", path.display()),
        "name": path.display().to_string(),
    })
}

fn user_entities() -> Vec<Value> {
    vec![
        json!({
            "app": "account", "name": "User", "table": "SYSTEM_USER", "path": "users",
            "primary_key": "USER_ID",
            "columns": [
                {"name": "USER_ID", "type": "VARCHAR(20)", "nullable": false},
                {"name": "PASSWORD", "type": "VARCHAR(128)", "nullable": false},
                {"name": "NM", "type": "VARCHAR(50)", "nullable": false},
                {"name": "EMAIL", "type": "VARCHAR(50)", "nullable": false, "unique": true},
                {"name": "TOKEN", "type": "VARCHAR(500)"},
                {"name": "EXPIRED_AT", "type": "VARCHAR(40)"},
                {"name": "LAST_LOGIN", "type": "VARCHAR(40)"},
                {"name": "IS_ACTIVE", "type": "INTEGER", "nullable": false, "default": 1},
                {"name": "IS_STAFF", "type": "INTEGER", "nullable": false, "default": 0},
                {"name": "IS_SUPERUSER", "type": "INTEGER", "nullable": false, "default": 0}
            ],
            "ordering": ["USER_ID"],
            "sensitive_columns": ["PASSWORD", "TOKEN"],
            "hashed_columns": ["PASSWORD"],
            "validation": {"EMAIL": {"format": "email"}}
        }),
        json!({
            "app": "account", "name": "IssuedToken", "table": "SYSTEM_USER_TOKEN", "path": "user_tokens",
            "primary_key": "TOKEN",
            "operations": [],
            "columns": [
                {"name": "TOKEN", "type": "VARCHAR(500)", "nullable": false},
                {"name": "USER_ID", "type": "VARCHAR(20)", "nullable": false},
                {"name": "EXPIRED_DT", "type": "VARCHAR(40)"}
            ]
        }),
    ]
}

fn menu_entity(db_alias: Option<&str>) -> Value {
    let mut menu = json!({
        "app": "system", "name": "SystemMenu", "table": "SYSTEM_MENU", "path": "menus",
        "primary_key": "MENU_CD_KEY",
        "key_from": ["SYSTEM_DIV_CD", "MENU_CD"],
        "columns": [
            {"name": "MENU_CD_KEY", "type": "VARCHAR(30)", "nullable": false},
            {"name": "SYSTEM_DIV_CD", "type": "VARCHAR(40)", "nullable": false},
            {"name": "MENU_CD", "type": "VARCHAR(20)", "nullable": false},
            {"name": "MENU_NM", "type": "VARCHAR(100)", "nullable": false},
            {"name": "ORDER", "type": "INTEGER", "nullable": false},
            {"name": "USE_YN", "type": "VARCHAR(1)", "nullable": false, "default": "Y"},
            {"name": "UPPER_MENU_CD_KEY", "type": "VARCHAR(30)"}
        ],
        "unique_together": [["SYSTEM_DIV_CD", "MENU_CD"]],
        "relations": [{"name": "upper_menu", "column": "UPPER_MENU_CD_KEY", "model": "SystemMenu", "expand": ["MENU_NM"]}],
        "ordering": ["ORDER"],
        "validation": {"USE_YN": {"allowed": ["Y", "N"]}}
    });
    if let Some(alias) = db_alias {
        menu["db_alias"] = json!(alias);
    }
    menu
}

fn user_auth_entity(db_alias: &str) -> Value {
    json!({
        "app": "system", "name": "SystemUserAuth", "table": "SYSTEM_USER_AUTH", "path": "user_auths",
        "db_alias": db_alias,
        "primary_key": "USER_AUTH_CD_KEY",
        "key_from": ["AUTH_CD_KEY", "USER_ID"],
        "columns": [
            {"name": "USER_AUTH_CD_KEY", "type": "VARCHAR(100)", "nullable": false},
            {"name": "AUTH_CD_KEY", "type": "VARCHAR(80)", "nullable": false},
            {"name": "USER_ID", "type": "VARCHAR(20)", "nullable": false}
        ],
        "relations": [{"name": "user", "column": "USER_ID", "model": "User", "expand": ["NM", "EMAIL"]}]
    })
}

fn security() -> Value {
    json!({
        "jwt_secret": "test-secret",
        "password_iterations": 1000,
        "admin": {"username": ADMIN, "password": ADMIN_PASSWORD, "name": "Administrator", "email": "admin@example.com"}
    })
}

/// One SQLite database holding users and menus.
pub fn single_db_config() -> AppConfig {
    let path = temp_db("default");
    let mut entities = user_entities();
    entities.push(menu_entity(None));
    serde_json::from_value(json!({
        "databases": [sqlite_db("default", &path)],
        "security": security(),
        "entities": entities,
    }))
    .expect("config")
}

/// Users on `default`, menus and user grants on `system`, joined through attached databases.
pub fn join_mode_config() -> AppConfig {
    let default = temp_db("default");
    let system = temp_db("system");
    let mut entities = user_entities();
    entities.push(menu_entity(Some("system")));
    entities.push(user_auth_entity("system"));
    serde_json::from_value(json!({
        "databases": [sqlite_db("default", &default), sqlite_db("system", &system)],
        "multi_join": true,
        "security": security(),
        "entities": entities,
    }))
    .expect("config")
}

pub async fn start(config: AppConfig) -> App {
    initialize(config).await.expect("initialize")
}

pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(t) = token {
        req = req.header(header::AUTHORIZATION, format!("Bearer {}", t));
    }
    let req = match body {
        Some(b) => req
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(b.to_string())),
        None => req.body(Body::empty()),
    }
    .expect("request");
    let res = app.clone().oneshot(req).await.expect("response");
    let status = res.status();
    let bytes = axum::body::to_bytes(res.into_body(), 1 << 20).await.expect("body");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, value)
}

pub async fn login(app: &Router, username: &str, password: &str) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/auth/login/",
        None,
        Some(json!({"username": username, "password": password})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "login failed: {}", body);
    body["token"].as_str().expect("token").to_string()
}

pub async fn admin_token(app: &Router) -> String {
    login(app, ADMIN, ADMIN_PASSWORD).await
}

pub fn new_user(id: &str, email: &str) -> Value {
    json!({"USER_ID": id, "PASSWORD": "secret-pass", "NM": format!("User {}", id), "EMAIL": email})
}
