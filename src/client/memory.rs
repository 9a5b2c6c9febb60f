//! In-memory transport emulating a versioned KV secrets engine
//!
//! Useful for tests and local development. It reproduces the parts of the
//! backend's HTTP contract the storage layer relies on:
//! - `GET <mount>/data/<key>` returns the latest version or 404
//! - `POST <mount>/data/<key>` writes a new version, honoring `options.cas`
//! - `DELETE <mount>/metadata/<key>` removes every version or returns 404
//! - `LIST <mount>/metadata/<prefix>` returns sorted direct children, with
//!   nested groups reported as `name/`, or 404 when there are none
//! - `POST auth/.../login` and `POST auth/token/revoke-self` for role login
//!
//! Token checks are only enforced once a static token or a role login has
//! been registered.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use reqwest::StatusCode;
use serde::Serialize;
use tracing::trace;

use super::{Method, Request, Response, Transport};
use crate::error::Result;
use crate::path::Namespace;
use crate::wire::{
    AuthData, ErrorResponse, ListData, ListResponse, LoginRequest, LoginResponse, ReadData,
    ReadResponse, VersionMetadata, WriteRequest,
};

const BASE_URL: &str = "memory://vault/v1/";
const CAS_REJECTED: &str = "check-and-set parameter did not match the current version";

/// One stored key with its latest version
#[derive(Debug, Clone)]
struct StoredSecret {
    data: serde_json::Value,
    created_time: DateTime<Utc>,
    deletion_time: Option<DateTime<Utc>>,
    version: u64,
}

impl StoredSecret {
    fn metadata(&self) -> VersionMetadata {
        VersionMetadata {
            created_time: Some(self.created_time),
            deletion_time: self.deletion_time,
            destroyed: false,
            version: self.version,
        }
    }
}

/// Credentials accepted by the emulated role login endpoint
#[derive(Debug, Clone)]
struct AppRoleFixture {
    role_id: String,
    secret_id: String,
    lease_duration: Duration,
}

/// In-memory backend
pub struct MemoryTransport {
    mount: String,
    secrets: DashMap<String, StoredSecret>,
    /// Live tokens and their expiry (None = never expires)
    tokens: DashMap<String, Option<Instant>>,
    enforce_tokens: bool,
    approle: Option<AppRoleFixture>,
    /// Paths (by prefix) that answer with a forced error
    failures: DashMap<String, (StatusCode, Vec<String>)>,
    logins: AtomicUsize,
    next_token: AtomicU64,
}

impl MemoryTransport {
    /// Create an empty backend with a secrets engine mounted at `mount`
    pub fn new(mount: impl Into<String>) -> Self {
        Self {
            mount: mount.into().trim_matches('/').to_lowercase(),
            secrets: DashMap::new(),
            tokens: DashMap::new(),
            enforce_tokens: false,
            approle: None,
            failures: DashMap::new(),
            logins: AtomicUsize::new(0),
            next_token: AtomicU64::new(1),
        }
    }

    /// Accept `token` forever and start rejecting unknown tokens
    pub fn with_static_token(self, token: impl Into<String>) -> Self {
        self.tokens.insert(token.into(), None);
        Self {
            enforce_tokens: true,
            ..self
        }
    }

    /// Enable role login with the given credentials; issued tokens expire
    /// after `lease_duration`
    pub fn with_approle(
        self,
        role_id: impl Into<String>,
        secret_id: impl Into<String>,
        lease_duration: Duration,
    ) -> Self {
        Self {
            enforce_tokens: true,
            approle: Some(AppRoleFixture {
                role_id: role_id.into(),
                secret_id: secret_id.into(),
                lease_duration,
            }),
            ..self
        }
    }

    /// Number of successful logins so far
    pub fn login_count(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }

    /// Whether `token` would currently be accepted
    pub fn token_is_live(&self, token: &str) -> bool {
        match self.tokens.get(token) {
            Some(expiry) => (*expiry).map_or(true, |at| Instant::now() < at),
            None => false,
        }
    }

    /// Make every request whose path starts with `path_prefix` fail
    pub fn fail_path(&self, path_prefix: impl Into<String>, status: StatusCode, errors: &[&str]) {
        self.failures.insert(
            path_prefix.into(),
            (status, errors.iter().map(|e| e.to_string()).collect()),
        );
    }

    pub fn clear_failures(&self) {
        self.failures.clear();
    }

    /// Latest stored payload at a full data or metadata path
    pub fn secret(&self, path: &str) -> Option<serde_json::Value> {
        let (_, key) = self.split(path)?;
        self.secrets
            .get(&key)
            .filter(|s| s.deletion_time.is_none())
            .map(|s| s.data.clone())
    }

    /// Latest version number at a full data or metadata path
    pub fn version(&self, path: &str) -> Option<u64> {
        let (_, key) = self.split(path)?;
        self.secrets.get(&key).map(|s| s.version)
    }

    /// Soft-delete the latest version, leaving its metadata behind
    pub fn soft_delete(&self, path: &str) -> bool {
        let Some((_, key)) = self.split(path) else {
            return false;
        };
        match self.secrets.get_mut(&key) {
            Some(mut secret) => {
                secret.deletion_time = Some(Utc::now());
                true
            }
            None => false,
        }
    }

    /// Split `<mount>/<namespace>/<key>` into its namespace and key
    fn split(&self, path: &str) -> Option<(Namespace, String)> {
        let path = path.to_lowercase();
        let rest = path.strip_prefix(&self.mount)?.strip_prefix('/')?;
        let (namespace, key) = rest.split_once('/')?;
        let namespace = match namespace {
            "data" => Namespace::Data,
            "metadata" => Namespace::Metadata,
            _ => return None,
        };
        Some((namespace, key.to_string()))
    }

    fn forced_failure(&self, path: &str) -> Option<Response> {
        self.failures
            .iter()
            .find(|entry| path.starts_with(entry.key().as_str()))
            .map(|entry| {
                let (status, errors) = entry.value();
                let errors: Vec<&str> = errors.iter().map(String::as_str).collect();
                error_response(*status, &errors)
            })
    }

    fn authorized(&self, token: Option<&str>) -> bool {
        if !self.enforce_tokens {
            return true;
        }
        token.map_or(false, |t| self.token_is_live(t))
    }

    fn handle_auth(&self, request: &Request) -> Response {
        if request.method != Method::Post {
            return error_response(StatusCode::METHOD_NOT_ALLOWED, &["unsupported operation"]);
        }

        if request.path.ends_with("revoke-self") {
            return match request.token.as_deref() {
                Some(token) if self.token_is_live(token) => {
                    self.tokens.remove(token);
                    Response::new(StatusCode::NO_CONTENT, Vec::new())
                }
                _ => error_response(StatusCode::FORBIDDEN, &["permission denied"]),
            };
        }

        let Some(fixture) = &self.approle else {
            return error_response(StatusCode::NOT_FOUND, &[]);
        };

        let login: Option<LoginRequest> = request
            .body
            .clone()
            .and_then(|body| serde_json::from_value(body).ok());

        match login {
            Some(login) if login.role_id == fixture.role_id && login.secret_id == fixture.secret_id => {
                let token = format!("hvs.memory-{}", self.next_token.fetch_add(1, Ordering::SeqCst));
                self.tokens
                    .insert(token.clone(), Some(Instant::now() + fixture.lease_duration));
                self.logins.fetch_add(1, Ordering::SeqCst);

                json_response(
                    StatusCode::OK,
                    &LoginResponse {
                        auth: Some(AuthData {
                            client_token: token,
                            lease_duration: fixture.lease_duration.as_secs(),
                            renewable: true,
                            accessor: String::new(),
                            policies: vec!["default".to_string()],
                        }),
                    },
                )
            }
            Some(_) => error_response(StatusCode::BAD_REQUEST, &["invalid role or secret ID"]),
            None => error_response(StatusCode::BAD_REQUEST, &["missing role_id or secret_id"]),
        }
    }

    fn read(&self, key: &str) -> Response {
        match self.secrets.get(key) {
            Some(secret) if secret.deletion_time.is_none() => json_response(
                StatusCode::OK,
                &ReadResponse {
                    data: ReadData {
                        data: Some(secret.data.clone()),
                        metadata: secret.metadata(),
                    },
                },
            ),
            Some(secret) => json_response(
                StatusCode::NOT_FOUND,
                &ReadResponse::<serde_json::Value> {
                    data: ReadData {
                        data: None,
                        metadata: secret.metadata(),
                    },
                },
            ),
            None => error_response(StatusCode::NOT_FOUND, &[]),
        }
    }

    fn write(&self, key: String, body: Option<serde_json::Value>) -> Response {
        let Some(request) = body.and_then(|b| serde_json::from_value::<WriteRequest<serde_json::Value>>(b).ok())
        else {
            return error_response(StatusCode::BAD_REQUEST, &["no data provided"]);
        };
        let cas = request.options.map(|o| o.cas);
        let now = Utc::now();

        let metadata = match self.secrets.entry(key) {
            Entry::Occupied(mut entry) => {
                let current = entry.get_mut();
                if cas.is_some_and(|cas| cas != current.version) {
                    return error_response(StatusCode::BAD_REQUEST, &[CAS_REJECTED]);
                }
                current.version += 1;
                current.data = request.data;
                current.created_time = now;
                current.deletion_time = None;
                current.metadata()
            }
            Entry::Vacant(entry) => {
                if cas.is_some_and(|cas| cas != 0) {
                    return error_response(StatusCode::BAD_REQUEST, &[CAS_REJECTED]);
                }
                entry
                    .insert(StoredSecret {
                        data: request.data,
                        created_time: now,
                        deletion_time: None,
                        version: 1,
                    })
                    .metadata()
            }
        };

        json_response(StatusCode::OK, &serde_json::json!({ "data": metadata }))
    }

    fn delete(&self, key: &str) -> Response {
        match self.secrets.remove(key) {
            Some(_) => Response::new(StatusCode::NO_CONTENT, Vec::new()),
            None => error_response(StatusCode::NOT_FOUND, &[]),
        }
    }

    fn list(&self, prefix: &str) -> Response {
        let mut prefix = prefix.to_string();
        if !prefix.is_empty() && !prefix.ends_with('/') {
            prefix.push('/');
        }

        let entries: BTreeSet<String> = self
            .secrets
            .iter()
            .filter(|s| s.deletion_time.is_none())
            .filter_map(|s| {
                let rest = s.key().strip_prefix(prefix.as_str())?;
                if rest.is_empty() {
                    return None;
                }
                Some(match rest.find('/') {
                    Some(idx) => rest[..=idx].to_string(),
                    None => rest.to_string(),
                })
            })
            .collect();

        if entries.is_empty() {
            return error_response(StatusCode::NOT_FOUND, &[]);
        }

        json_response(
            StatusCode::OK,
            &ListResponse {
                data: ListData {
                    keys: entries.into_iter().collect(),
                },
            },
        )
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    fn base_url(&self) -> &str {
        BASE_URL
    }

    async fn send(&self, request: Request) -> Result<Response> {
        trace!("send: method={} path={}", request.method, request.path);

        if let Some(response) = self.forced_failure(&request.path) {
            return Ok(response);
        }

        if request.path.starts_with("auth/") {
            return Ok(self.handle_auth(&request));
        }

        if !self.authorized(request.token.as_deref()) {
            return Ok(error_response(StatusCode::FORBIDDEN, &["permission denied"]));
        }

        let Some((namespace, key)) = self.split(&request.path) else {
            return Ok(error_response(StatusCode::NOT_FOUND, &["no handler for route"]));
        };

        let response = match (request.method, namespace) {
            (Method::Get, Namespace::Data) => self.read(&key),
            (Method::Post, Namespace::Data) => self.write(key, request.body),
            (Method::Delete, Namespace::Metadata) => self.delete(&key),
            (Method::List, Namespace::Metadata) => self.list(&key),
            _ => error_response(StatusCode::METHOD_NOT_ALLOWED, &["unsupported operation"]),
        };

        Ok(response)
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response {
    match serde_json::to_vec(body) {
        Ok(bytes) => Response::new(status, bytes),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &[&e.to_string()]),
    }
}

fn error_response(status: StatusCode, errors: &[&str]) -> Response {
    let body = ErrorResponse {
        errors: errors.iter().map(|e| e.to_string()).collect(),
    };
    let bytes = serde_json::to_vec(&body).unwrap_or_default();
    Response::new(status, bytes)
}
