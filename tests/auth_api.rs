mod common;

use axum::http::{Method, StatusCode};
use common::*;
use crossdb_admin::with_method_override;
use serde_json::json;

#[tokio::test]
async fn login_crud_logout() -> anyhow::Result<()> {
    let app = start(single_db_config()).await;
    let router = &app.router;
    let token = admin_token(router).await;

    let (status, body) = send(
        router,
        Method::POST,
        "/api/menus/",
        Some(&token),
        Some(json!({"SYSTEM_DIV_CD": "ADM", "MENU_CD": "M01", "MENU_NM": "Menus", "ORDER": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["MENU_CD_KEY"], "ADM/M01");
    assert_eq!(body["data"]["USE_YN"], "Y");
    assert_eq!(body["data"]["INS_USER_ID"], ADMIN);

    let (status, body) = send(
        router,
        Method::PATCH,
        "/api/menus/ADM%2FM01/",
        Some(&token),
        Some(json!({"MENU_NM": "Menu admin"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["MENU_NM"], "Menu admin");
    assert_eq!(body["data"]["UPD_USER_ID"], ADMIN);

    let (status, body) = send(router, Method::GET, "/api/menus/?USE_YN=Y", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["count"], 1);
    assert_eq!(body["data"][0]["MENU_NM"], "Menu admin");

    let (status, _) = send(router, Method::DELETE, "/api/menus/ADM%2FM01/", Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(router, Method::GET, "/api/menus/ADM%2FM01/", Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(router, Method::POST, "/auth/logout/", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], "Successfully logged out.");

    let (status, body) = send(router, Method::GET, "/api/menus/", Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN, "{}", body);
    Ok(())
}

#[tokio::test]
async fn login_rejects_bad_credentials() -> anyhow::Result<()> {
    let app = start(single_db_config()).await;
    let (status, body) = send(
        &app.router,
        Method::POST,
        "/auth/login/",
        None,
        Some(json!({"username": ADMIN, "password": "wrong"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");
    Ok(())
}

#[tokio::test]
async fn login_returns_profile_without_secrets() -> anyhow::Result<()> {
    let app = start(single_db_config()).await;
    let (status, body) = send(
        &app.router,
        Method::POST,
        "/auth/login/",
        None,
        Some(json!({"username": ADMIN, "password": ADMIN_PASSWORD})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["USER_ID"], ADMIN);
    assert_eq!(body["user"]["EMAIL"], "admin@example.com");
    assert!(body["user"].get("PASSWORD").is_none());

    let token = body["token"].as_str().unwrap_or_default();
    let (status, body) = send(&app.router, Method::GET, "/api/users/admin/", Some(token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].get("PASSWORD").is_none());
    assert!(body["data"].get("TOKEN").is_none());
    Ok(())
}

#[tokio::test]
async fn requests_without_token_are_unauthorized() -> anyhow::Result<()> {
    let app = start(single_db_config()).await;
    let (status, _) = send(&app.router, Method::GET, "/api/menus/", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = send(&app.router, Method::GET, "/api/menus/", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn refresh_registers_new_token() -> anyhow::Result<()> {
    let app = start(single_db_config()).await;
    let token = admin_token(&app.router).await;
    let (status, body) = send(
        &app.router,
        Method::POST,
        "/auth/token/refresh/",
        None,
        Some(json!({"token": token})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let refreshed = body["token"].as_str().unwrap_or_default().to_string();

    let (status, body) = send(&app.router, Method::GET, "/auth/jwt-authentication-view/", Some(&refreshed), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], ADMIN);
    Ok(())
}

#[tokio::test]
async fn transfer_user_switches_principal() -> anyhow::Result<()> {
    let app = start(single_db_config()).await;
    let token = admin_token(&app.router).await;
    let (status, _) = send(
        &app.router,
        Method::POST,
        "/api/users/",
        Some(&token),
        Some(new_user("kim", "kim@example.com")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let whoami = |target: &'static str| {
        let router = app.router.clone();
        let token = token.clone();
        async move {
            let req = axum::http::Request::builder()
                .uri("/auth/jwt-authentication-view/")
                .header("Authorization", format!("Bearer {}", token))
                .header("X-Transfer-User", target)
                .body(axum::body::Body::empty())?;
            let res = tower::ServiceExt::oneshot(router, req).await?;
            let status = res.status();
            let bytes = axum::body::to_bytes(res.into_body(), 1 << 16).await?;
            let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap_or_default();
            anyhow::Ok((status, body))
        }
    };

    let (status, body) = whoami("kim").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "kim");
    assert_eq!(body["orig_username"], ADMIN);

    let (status, _) = whoami("nobody").await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = whoami(ADMIN).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn validation_errors_are_per_field() -> anyhow::Result<()> {
    let app = start(single_db_config()).await;
    let token = admin_token(&app.router).await;
    let (status, body) = send(
        &app.router,
        Method::POST,
        "/api/menus/",
        Some(&token),
        Some(json!({"SYSTEM_DIV_CD": "ADM", "MENU_CD": "M02", "USE_YN": "X", "ORDER": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "validation_error");
    assert_eq!(body["error"]["details"]["MENU_NM"][0], "This field is required.");
    assert_eq!(body["error"]["details"]["USE_YN"][0], "\"X\" is not a valid choice.");
    Ok(())
}

#[tokio::test]
async fn method_override_header() -> anyhow::Result<()> {
    let app = start(single_db_config()).await;
    let token = admin_token(&app.router).await;
    let router = with_method_override(app.router.clone());

    let req = axum::http::Request::builder()
        .method(Method::POST)
        .uri("/auth/jwt-authentication-view/")
        .header("Authorization", format!("Bearer {}", token))
        .header("X-HTTP-Method", "GET")
        .body(axum::body::Body::empty())?;
    let res = tower::ServiceExt::oneshot(router.clone(), req).await?;
    assert_eq!(res.status(), StatusCode::OK);

    let req = axum::http::Request::builder()
        .method(Method::POST)
        .uri("/auth/jwt-authentication-view/")
        .header("X-HTTP-Method", "TRACE")
        .body(axum::body::Body::empty())?;
    let res = tower::ServiceExt::oneshot(router, req).await?;
    assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
    Ok(())
}

#[tokio::test]
async fn operational_routes() -> anyhow::Result<()> {
    let app = start(single_db_config()).await;
    let (status, _) = send(&app.router, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app.router, Method::GET, "/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}
