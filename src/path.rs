//! Mapping from logical keys to physical secret store paths.
//!
//! Every key lives under two paths in a versioned KV engine:
//!
//! ```text
//!     'data' path: <secrets_path>/data/<path_prefix>/<key>
//! 'metadata' path: <secrets_path>/metadata/<path_prefix>/<key>
//! ```
//!
//! Values are read and written through the data path; delete, list and
//! version metadata go through the metadata path. The whole path is lower-cased.

use std::fmt;

/// Suffix appended to a key to derive the key holding its lock record
pub const LOCK_SUFFIX: &str = ".lock";

/// Namespace segment inside the secrets engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    Data,
    Metadata,
}

impl Namespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Data => "data",
            Namespace::Metadata => "metadata",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stateless formatter for data and metadata paths
#[derive(Debug, Clone)]
pub struct PathFormatter {
    secrets_path: String,
    path_prefix: String,
}

impl PathFormatter {
    pub fn new(secrets_path: impl Into<String>, path_prefix: impl Into<String>) -> Self {
        Self {
            secrets_path: secrets_path.into(),
            path_prefix: path_prefix.into(),
        }
    }

    pub fn format(&self, namespace: Namespace, key: &str) -> String {
        format!(
            "{}/{}/{}/{}",
            self.secrets_path, namespace, self.path_prefix, key
        )
        .to_lowercase()
    }

    pub fn data(&self, key: &str) -> String {
        self.format(Namespace::Data, key)
    }

    pub fn metadata(&self, key: &str) -> String {
        self.format(Namespace::Metadata, key)
    }
}

/// Key under which the lock record for `key` is stored
pub fn lock_key(key: &str) -> String {
    format!("{}{}", key, LOCK_SUFFIX)
}
