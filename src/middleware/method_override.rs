//! `X-HTTP-Method` rewrites the request method before routing.

use crate::error::AppError;
use axum::{
    extract::Request,
    http::Method,
    middleware::{from_fn, Next},
    response::{IntoResponse, Response},
    Router,
};

pub const METHOD_OVERRIDE_HEADER: &str = "X-HTTP-Method";

pub async fn method_override(mut request: Request, next: Next) -> Response {
    let Some(raw) = request.headers().get(METHOD_OVERRIDE_HEADER) else {
        return next.run(request).await;
    };
    let requested = raw.to_str().unwrap_or_default().trim().to_ascii_lowercase();
    if requested.is_empty() {
        return next.run(request).await;
    }
    let method = match requested.as_str() {
        "get" => Method::GET,
        "post" => Method::POST,
        "put" => Method::PUT,
        "patch" => Method::PATCH,
        "delete" => Method::DELETE,
        _ => return AppError::MethodNotAllowed(requested).into_response(),
    };
    tracing::debug!(from = %request.method(), to = %method, "method overridden");
    *request.method_mut() = method;
    next.run(request).await
}

/// Wraps the whole app so the override happens before any route is matched.
pub fn with_method_override(app: Router) -> Router {
    Router::new().fallback_service(app).layer(from_fn(method_override))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode, routing::get};
    use tower::ServiceExt;

    fn app() -> Router {
        with_method_override(Router::new().route("/thing/", get(|| async { "got" }).delete(|| async { "deleted" })))
    }

    async fn send(method: Method, header: Option<&str>) -> (StatusCode, String) {
        let mut req = Request::builder().method(method).uri("/thing/");
        if let Some(h) = header {
            req = req.header(METHOD_OVERRIDE_HEADER, h);
        }
        let res = app().oneshot(req.body(Body::empty()).expect("request")).await.expect("response");
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), 1 << 16).await.expect("body");
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    #[tokio::test]
    async fn rewrites_method_case_insensitively() {
        assert_eq!(send(Method::POST, Some("DeLeTe")).await, (StatusCode::OK, "deleted".into()));
        assert_eq!(send(Method::GET, None).await, (StatusCode::OK, "got".into()));
    }

    #[tokio::test]
    async fn unknown_override_is_405() {
        let (status, _) = send(Method::POST, Some("trace")).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }
}
