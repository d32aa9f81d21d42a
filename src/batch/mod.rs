//! Atomic batch requests: several sub-requests replayed in order under one session.

mod dispatch;
mod executor;

pub use dispatch::{BatchScope, Dispatch, ReplayRequest, ReplayResponse, RouterDispatcher};
pub use executor::{BatchExecutor, BatchOutcome};

use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One sub-request of a batch payload.
#[derive(Clone, Debug, Deserialize)]
pub struct BatchOption {
    pub url: String,
    pub method: BatchMethod,
    #[serde(default)]
    pub data: Option<Value>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum BatchMethod {
    Get,
    Options,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Unknown(String),
}

impl From<String> for BatchMethod {
    fn from(s: String) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "GET" => BatchMethod::Get,
            "OPTIONS" => BatchMethod::Options,
            "HEAD" => BatchMethod::Head,
            "POST" => BatchMethod::Post,
            "PUT" => BatchMethod::Put,
            "PATCH" => BatchMethod::Patch,
            "DELETE" => BatchMethod::Delete,
            _ => BatchMethod::Unknown(s),
        }
    }
}

impl BatchMethod {
    /// Only state-changing methods may run inside a batch.
    pub fn batchable(&self) -> Option<Method> {
        match self {
            BatchMethod::Post => Some(Method::POST),
            BatchMethod::Put => Some(Method::PUT),
            BatchMethod::Delete => Some(Method::DELETE),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            BatchMethod::Get => "GET",
            BatchMethod::Options => "OPTIONS",
            BatchMethod::Head => "HEAD",
            BatchMethod::Post => "POST",
            BatchMethod::Put => "PUT",
            BatchMethod::Patch => "PATCH",
            BatchMethod::Delete => "DELETE",
            BatchMethod::Unknown(s) => s,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BatchResult {
    pub status_code: u16,
    pub data: Value,
}

const FORWARDED: [&str; 5] = ["X-CSRFToken", "Referer", "User-Agent", "X-Current-Menu", "Authorization"];

/// Headers every sub-request inherits from the batch request. `X-Forwarded-For` carries the client IP.
pub fn forwarded_headers(incoming: &HeaderMap, client_ip: Option<&str>) -> HeaderMap {
    let mut out = HeaderMap::new();
    if let Some(v) = incoming.get(header::CONTENT_TYPE) {
        out.insert(header::CONTENT_TYPE, v.clone());
    }
    if let Some(ip) = client_ip.and_then(|ip| HeaderValue::from_str(ip).ok()) {
        out.insert(HeaderName::from_static("x-forwarded-for"), ip);
    }
    for name in FORWARDED {
        if let Some(v) = incoming.get(name) {
            if let Ok(name) = HeaderName::from_bytes(name.as_bytes()) {
                out.insert(name, v.clone());
            }
        }
    }
    out
}
