mod common;

use axum::http::{Method, StatusCode};
use common::*;
use serde_json::json;

#[tokio::test]
async fn join_mode_expands_relation_across_databases() -> anyhow::Result<()> {
    let app = start(join_mode_config()).await;
    let router = &app.router;
    let catalog = app.state.router.catalog().clone();
    assert_eq!(catalog.owner("SYSTEM_USER"), Some("default"));
    assert_eq!(catalog.owner("SYSTEM_USER_AUTH"), Some("system"));
    assert_eq!(catalog.owner("SYSTEM_MENU"), Some("system"));

    let token = admin_token(router).await;
    let (status, body) = send(
        router,
        Method::POST,
        "/api/users/",
        Some(&token),
        Some(new_user("kim", "kim@example.com")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);

    let (status, body) = send(
        router,
        Method::POST,
        "/api/user_auths/",
        Some(&token),
        Some(json!({"AUTH_CD_KEY": "ADM/MANAGER", "USER_ID": "kim"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["USER_AUTH_CD_KEY"], "ADM/MANAGER/kim");

    let (status, body) = send(router, Method::GET, "/api/user_auths/", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["meta"]["count"], 1);
    assert_eq!(body["data"][0]["user__NM"], "User kim");
    assert_eq!(body["data"][0]["user__EMAIL"], "kim@example.com");
    Ok(())
}

#[tokio::test]
async fn batch_spanning_two_databases_is_atomic() -> anyhow::Result<()> {
    let app = start(join_mode_config()).await;
    let router = &app.router;
    let token = admin_token(router).await;

    let (status, body) = send(
        router,
        Method::POST,
        "/batch/",
        Some(&token),
        Some(json!([
            {"url": "/api/menus/", "method": "POST",
             "data": {"SYSTEM_DIV_CD": "ADM", "MENU_CD": "M01", "MENU_NM": "Menus", "ORDER": 1}},
            {"url": "/api/users/", "method": "POST", "data": new_user("admin", "dup@example.com")}
        ])),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);
    assert_eq!(body, json!([]));

    let (status, body) = send(router, Method::GET, "/api/menus/", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["count"], 0);
    Ok(())
}

#[tokio::test]
async fn migrations_land_on_owning_database() -> anyhow::Result<()> {
    let app = start(join_mode_config()).await;
    let system = app.state.databases.get("system")?;
    let names: Vec<String> = sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
        .fetch_all(&system.pool)
        .await?;
    assert!(names.contains(&"SYSTEM_MENU".to_string()));
    assert!(!names.contains(&"SYSTEM_USER".to_string()));
    assert!(!names.contains(&"_migrations".to_string()));

    let default = app.state.databases.get("default")?;
    let names: Vec<String> = sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
        .fetch_all(&default.pool)
        .await?;
    assert!(names.contains(&"SYSTEM_USER".to_string()));
    assert!(names.contains(&"_migrations".to_string()));
    assert!(!names.contains(&"SYSTEM_MENU".to_string()));
    Ok(())
}
