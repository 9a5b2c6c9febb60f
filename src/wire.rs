//! JSON wire types for the secret store API
//!
//! Read:   `{"data": {"data": {...}, "metadata": {...}}}`
//! Write:  `{"data": {...}, "options": {"cas": N}}`
//! List:   `{"data": {"keys": ["leaf", "group/"]}}`
//! Login:  `{"auth": {"client_token": "...", "lease_duration": N}}`
//! Errors: `{"errors": ["...", "..."]}`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Payload stored at a key. Certificates use `certificate_payload`; lock
/// records use `lock_expiration` (and `lock_owner`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CertificateSecret {
    #[serde(default, skip_serializing_if = "Option::is_none", with = "payload")]
    pub certificate_payload: Option<Vec<u8>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_expiration: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_owner: Option<String>,
}

impl CertificateSecret {
    pub fn certificate(value: &[u8]) -> Self {
        Self {
            certificate_payload: Some(value.to_vec()),
            ..Default::default()
        }
    }

    pub fn lock(expiration: DateTime<Utc>, owner: String) -> Self {
        Self {
            lock_expiration: Some(expiration),
            lock_owner: Some(owner),
            ..Default::default()
        }
    }
}

/// Body of a write to a data path
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteRequest<T = CertificateSecret> {
    pub data: T,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<WriteOptions>,
}

/// Check-and-set option: the write only succeeds if the current version
/// equals `cas` (0 meaning the key must not exist).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteOptions {
    pub cas: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadResponse<T = CertificateSecret> {
    pub data: ReadData<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadData<T = CertificateSecret> {
    pub data: Option<T>,

    #[serde(default)]
    pub metadata: VersionMetadata,
}

impl<T> ReadData<T> {
    /// A version that was soft-deleted or destroyed reads as absent
    pub fn is_live(&self) -> bool {
        self.data.is_some() && !self.metadata.destroyed && self.metadata.deletion_time.is_none()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VersionMetadata {
    #[serde(default, deserialize_with = "lenient_time")]
    pub created_time: Option<DateTime<Utc>>,

    #[serde(default, deserialize_with = "lenient_time")]
    pub deletion_time: Option<DateTime<Utc>>,

    #[serde(default)]
    pub destroyed: bool,

    #[serde(default)]
    pub version: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResponse {
    pub data: ListData,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListData {
    #[serde(default)]
    pub keys: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub errors: Vec<String>,
}

impl ErrorResponse {
    /// All backend messages joined with "; ", or None if there were none
    pub fn joined(&self) -> Option<String> {
        if self.errors.is_empty() {
            None
        } else {
            Some(self.errors.join("; "))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub role_id: String,
    pub secret_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub auth: Option<AuthData>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthData {
    pub client_token: String,

    /// Token lifetime in seconds
    #[serde(default)]
    pub lease_duration: u64,

    #[serde(default)]
    pub renewable: bool,

    #[serde(default)]
    pub accessor: String,

    #[serde(default)]
    pub policies: Vec<String>,
}

/// The backend reports unset timestamps as empty strings
fn lenient_time<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref() {
        None | Some("") => Ok(None),
        Some(s) => DateTime::parse_from_rfc3339(s)
            .map(|t| Some(t.with_timezone(&Utc)))
            .map_err(serde::de::Error::custom),
    }
}

/// Byte payloads travel as standard base64 strings
mod payload {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(bytes) => serializer.serialize_str(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        raw.map(|s| STANDARD.decode(s).map_err(serde::de::Error::custom))
            .transpose()
    }
}
