//! HTTP transport backed by reqwest.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use tracing::trace;

use super::{Method, Request, Response, Transport};
use crate::error::{Result, StorageError};

/// Header carrying the client token
pub const TOKEN_HEADER: &str = "X-Vault-Token";

const KEEP_ALIVE: Duration = Duration::from_secs(3);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Transport talking to a real secret store over HTTP(S)
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// Create a transport for `address` (e.g. `https://vault.example.org:8201`).
    /// All request paths are resolved against `<address>/v1/`.
    pub fn new(address: &str, insecure_skip_verify: bool) -> Result<Self> {
        let client = reqwest::Client::builder()
            .tcp_keepalive(KEEP_ALIVE)
            .connect_timeout(CONNECT_TIMEOUT)
            .danger_accept_invalid_certs(insecure_skip_verify)
            .build()?;

        Ok(Self {
            client,
            base_url: Self::base_url_for(address),
        })
    }

    fn base_url_for(address: &str) -> String {
        format!("{}/v1/", address.trim_end_matches('/'))
    }

    fn method(method: Method) -> Result<reqwest::Method> {
        match method {
            Method::Get => Ok(reqwest::Method::GET),
            Method::Post => Ok(reqwest::Method::POST),
            Method::Delete => Ok(reqwest::Method::DELETE),
            Method::List => reqwest::Method::from_bytes(b"LIST")
                .map_err(|e| StorageError::Config(format!("Invalid HTTP method LIST: {}", e))),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send(&self, request: Request) -> Result<Response> {
        let url = self.url(&request.path);
        trace!("send: method={} url={}", request.method, url);

        let mut builder = self
            .client
            .request(Self::method(request.method)?, &url)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json");

        if let Some(token) = &request.token {
            builder = builder.header(TOKEN_HEADER, token);
        }

        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        Ok(Response::new(status, body))
    }
}
