//! Transport abstraction
//!
//! The reconciler talks to the remote API through a single primitive,
//! `send(method, url, body) -> (status, body)`. Status interpretation lives
//! here too, so every caller maps 404/409/412 the same way.

use crate::error::{Error, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;

/// HTTP methods the reconciler issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }

    /// Whether the request may change remote state
    pub fn is_mutating(self) -> bool {
        !matches!(self, Method::Get)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// Raw response: status code and decoded JSON body (null when empty)
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub body: Value,
}

impl Response {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Request/response primitive against a JSON REST API
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, method: Method, url: &str, body: Option<&Value>) -> Result<Response>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    async fn send(&self, method: Method, url: &str, body: Option<&Value>) -> Result<Response> {
        (**self).send(method, url, body).await
    }
}

/// Map a response status to the error taxonomy, returning the body on success.
///
/// `resource` names what was being accessed, for error context.
pub fn check_status(response: Response, resource: &str) -> Result<Value> {
    if response.is_success() {
        return Ok(response.body);
    }

    let message = error_message(&response.body);
    match response.status {
        404 => Err(Error::NotFound {
            resource: resource.to_string(),
        }),
        409 | 412 => Err(Error::Conflict {
            resource: resource.to_string(),
            message,
        }),
        status => Err(Error::Api { status, message }),
    }
}

/// Pull the message out of a Google API error envelope
fn error_message(body: &Value) -> String {
    body.get("error")
        .and_then(|e| e.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_default()
}

/// Send a request and check its status in one step
pub async fn call(
    transport: &dyn Transport,
    method: Method,
    url: &str,
    body: Option<&Value>,
    resource: &str,
) -> Result<Value> {
    let response = transport.send(method, url, body).await?;
    check_status(response, resource)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_returns_body() {
        let body = check_status(Response::new(200, json!({"name": "c1"})), "c1").unwrap();
        assert_eq!(body["name"], "c1");
    }

    #[test]
    fn test_not_found_and_conflicts() {
        let err = check_status(Response::new(404, Value::Null), "awsClusters/c1").unwrap_err();
        assert!(err.is_not_found());

        for status in [409, 412] {
            let err = check_status(
                Response::new(status, json!({"error": {"message": "etag mismatch"}})),
                "awsClusters/c1",
            )
            .unwrap_err();
            assert!(err.is_conflict(), "status {} should be a conflict", status);
        }
    }

    #[test]
    fn test_other_status_keeps_message() {
        let err = check_status(
            Response::new(400, json!({"error": {"code": 400, "message": "bad subnet"}})),
            "c1",
        )
        .unwrap_err();
        match err {
            Error::Api { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "bad subnet");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_only_get_is_read_only() {
        assert!(!Method::Get.is_mutating());
        assert!(Method::Post.is_mutating());
        assert!(Method::Patch.is_mutating());
        assert!(Method::Delete.is_mutating());
    }
}
