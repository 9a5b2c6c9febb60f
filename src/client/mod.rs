//! Transport layer for the secret store API
//!
//! Storage logic talks to the backend only through the [`Transport`] trait.
//! Requests carry a path relative to the API base URL (`<address>/v1/`), an
//! optional token and an optional JSON body; responses are returned raw so
//! the caller decides how to interpret each status code.

pub mod http;
pub mod memory;

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use crate::error::Result;
use crate::wire::ErrorResponse;

pub use http::HttpTransport;
pub use memory::MemoryTransport;

/// Start of the message the backend returns when a check-and-set write
/// finds a different current version
pub const CAS_MISMATCH: &str = "check-and-set parameter did not match";

/// HTTP verbs understood by the backend. `List` is a custom verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Delete,
    List,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Delete => "DELETE",
            Method::List => "LIST",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single request against the backend
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub token: Option<String>,
    pub body: Option<serde_json::Value>,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            token: None,
            body: None,
        }
    }

    /// Attach a token. An empty token is sent as no token at all.
    pub fn token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.token = if token.is_empty() { None } else { Some(token) };
        self
    }

    pub fn json<T: serde::Serialize>(mut self, body: &T) -> Result<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }
}

/// Raw backend response
#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub body: Bytes,
}

impl Response {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn is_not_found(&self) -> bool {
        self.status == StatusCode::NOT_FOUND
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// True if a write was rejected only because its check-and-set version
    /// was stale
    pub fn is_cas_mismatch(&self) -> bool {
        self.status == StatusCode::BAD_REQUEST && self.vault_errors().contains(CAS_MISMATCH)
    }

    /// Joined backend error messages, empty if the body has none
    pub fn vault_errors(&self) -> String {
        serde_json::from_slice::<ErrorResponse>(&self.body)
            .ok()
            .and_then(|e| e.joined())
            .unwrap_or_default()
    }

    /// Error message to surface for a failed response: the joined backend
    /// errors, or the status line when the backend gave no messages
    pub fn error_message(&self) -> String {
        let errors = self.vault_errors();
        if errors.is_empty() {
            format!("HTTP {}", self.status)
        } else {
            errors
        }
    }
}

/// Transport trait for backend implementations
#[async_trait]
pub trait Transport: Send + Sync {
    /// Base URL requests are resolved against, used for diagnostics
    fn base_url(&self) -> &str;

    /// Send a request. Only connection-level failures are errors; any HTTP
    /// status, including 4xx/5xx, is returned as a `Response`.
    async fn send(&self, request: Request) -> Result<Response>;

    /// Full URL of a relative path
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url(), path)
    }
}
