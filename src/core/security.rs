use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use axum::http::HeaderMap;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::core::errors::ApiError;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Shared secret every `/api/v1` request must present.
#[derive(Clone)]
pub struct ApiKey {
    value: String,
}

impl ApiKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    fn matches(&self, candidate: &str) -> bool {
        self.value.as_bytes().ct_eq(candidate.as_bytes()).into()
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKey").field("value", &"****").finish()
    }
}

/// Uses the configured key, or reuses/generates one stored at `key_path`.
pub fn init_api_key(configured: Option<&str>, key_path: &Path) -> ApiKey {
    if let Some(key) = configured.map(str::trim).filter(|key| !key.is_empty()) {
        return ApiKey::new(key);
    }

    if let Ok(existing) = fs::read_to_string(key_path) {
        let existing = existing.trim();
        if !existing.is_empty() {
            tracing::info!("Using API key from {}", key_path.display());
            return ApiKey::new(existing);
        }
    }

    let key = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
    match persist_key(key_path, &key) {
        Ok(()) => tracing::warn!(
            "No API key configured; generated one at {}",
            key_path.display()
        ),
        Err(err) => tracing::warn!("Failed to write generated API key: {}", err),
    }

    ApiKey::new(key)
}

/// Writes `key` to `key_path`, readable only by the owner on unix.
fn persist_key(key_path: &Path, key: &str) -> io::Result<()> {
    if let Some(parent) = key_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(key_path)?;

    // `mode` only applies on creation; tighten a pre-existing file too.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(err) = file.set_permissions(fs::Permissions::from_mode(0o600)) {
            tracing::warn!(
                "Failed to restrict permissions on {}: {}",
                key_path.display(),
                err
            );
        }
    }

    file.write_all(key.as_bytes())
}

pub fn require_api_key(headers: &HeaderMap, expected: &ApiKey) -> Result<(), ApiError> {
    let header_value = headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");

    if header_value.is_empty() || !expected.matches(header_value) {
        return Err(ApiError::Unauthorized);
    }

    Ok(())
}
