//! OAuth token documents and their file-backed storage.
//!
//! The token file holds a single JSON object: either an access token as
//! returned by Google's token endpoint (stamped with a `created` time), or an
//! error indicator left behind by a failed exchange. An error indicator means
//! the user has to authorise again.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::{ProviderError, ProviderResult};

/// Tokens are treated as expired this many seconds before their real expiry.
const EXPIRY_LEEWAY_SECS: i64 = 30;

/// An OAuth access token and its bookkeeping fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    /// Lifetime in seconds, counted from `created`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    /// Unix timestamp (seconds) at which the token was issued.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<i64>,
    /// Fields this crate does not interpret, kept for round-tripping.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AccessToken {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: Some("Bearer".to_string()),
            expires_in: None,
            refresh_token: None,
            scope: None,
            id_token: None,
            created: None,
            extra: Map::new(),
        }
    }

    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    /// Sets issue time and lifetime.
    pub fn with_lifetime(mut self, created: DateTime<Utc>, expires_in_secs: i64) -> Self {
        self.created = Some(created.timestamp());
        self.expires_in = Some(expires_in_secs);
        self
    }

    /// When the token stops being valid, if known and representable.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let created = DateTime::from_timestamp(self.created?, 0)?;
        created.checked_add_signed(Duration::try_seconds(self.expires_in?)?)
    }

    /// Returns true if the token is expired (or about to be) at `now`.
    ///
    /// Tokens without issue time or lifetime never expire. Bookkeeping values
    /// outside the representable time range count as expired.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        if self.created.is_none() || self.expires_in.is_none() {
            return false;
        }
        self.expires_at()
            .and_then(|at| at.checked_sub_signed(Duration::seconds(EXPIRY_LEEWAY_SECS)))
            .is_none_or(|deadline| deadline <= now)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// Error indicator returned by the token endpoint and persisted in place of
/// a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthError {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
    /// Refresh token carried over from the token that failed to refresh.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl OAuthError {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            error_description: None,
            refresh_token: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.error_description = Some(description.into());
        self
    }
}

impl fmt::Display for OAuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.error_description {
            Some(ref description) => write!(f, "{}: {}", self.error, description),
            None => f.write_str(&self.error),
        }
    }
}

/// Contents of the token file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TokenDocument {
    Error(OAuthError),
    Token(AccessToken),
}

impl TokenDocument {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    pub fn token(&self) -> Option<&AccessToken> {
        match self {
            Self::Token(token) => Some(token),
            Self::Error(_) => None,
        }
    }

    /// Parses a token endpoint response body, stamping tokens with `now` as
    /// their issue time.
    pub fn from_response(body: &str, now: DateTime<Utc>) -> ProviderResult<Self> {
        let mut document: Self = serde_json::from_str(body).map_err(|e| {
            ProviderError::invalid_response(format!("invalid token response: {}", e))
        })?;
        if let Self::Token(ref mut token) = document {
            token.created.get_or_insert(now.timestamp());
        }
        Ok(document)
    }
}

impl From<AccessToken> for TokenDocument {
    fn from(token: AccessToken) -> Self {
        Self::Token(token)
    }
}

impl From<OAuthError> for TokenDocument {
    fn from(error: OAuthError) -> Self {
        Self::Error(error)
    }
}

/// File-backed token storage.
///
/// Keeps an in-memory copy of the last document read or written. Writes go
/// through a temp file and a rename.
#[derive(Debug)]
pub struct TokenStorage {
    path: PathBuf,
    document: RwLock<Option<TokenDocument>>,
}

impl TokenStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            document: RwLock::new(None),
        }
    }

    /// Reads the token file into memory.
    ///
    /// Returns `Ok(None)` when the file does not exist. A file that is not a
    /// token or an error indicator is a configuration error.
    pub fn load(&self) -> ProviderResult<Option<TokenDocument>> {
        if !self.path.exists() {
            debug!("no token file at {:?}", self.path);
            *self.document.write().unwrap_or_else(PoisonError::into_inner) = None;
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path).map_err(|e| {
            ProviderError::configuration(format!("failed to read token file: {}", e))
                .with_source(e)
        })?;

        let document: TokenDocument = serde_json::from_str(&content).map_err(|e| {
            ProviderError::configuration(format!(
                "failed to parse token file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        debug!(
            error = document.is_error(),
            "loaded token file {:?}", self.path
        );
        *self.document.write().unwrap_or_else(PoisonError::into_inner) = Some(document.clone());
        Ok(Some(document))
    }

    /// Replaces the stored document, in memory and on disk.
    pub fn set(&self, document: TokenDocument) -> ProviderResult<()> {
        self.write_file(&document)?;
        *self.document.write().unwrap_or_else(PoisonError::into_inner) = Some(document);
        Ok(())
    }

    fn write_file(&self, document: &TokenDocument) -> ProviderResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                ProviderError::configuration(format!("failed to create token directory: {}", e))
                    .with_source(e)
            })?;
        }

        let content = serde_json::to_string(document)
            .map_err(|e| ProviderError::internal(format!("failed to serialize token: {}", e)))?;

        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, content).map_err(|e| {
            ProviderError::configuration(format!("failed to write token file: {}", e))
                .with_source(e)
        })?;
        fs::rename(&temp_path, &self.path).map_err(|e| {
            ProviderError::configuration(format!("failed to rename token file: {}", e))
                .with_source(e)
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600));
        }

        info!("saved token file {:?}", self.path);
        Ok(())
    }

    /// The document last loaded or stored.
    pub fn get(&self) -> Option<TokenDocument> {
        self.document
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The current access token, if the document holds one.
    pub fn token(&self) -> Option<AccessToken> {
        self.get().and_then(|doc| doc.token().cloned())
    }

    /// Removes the token from memory and disk.
    pub fn clear(&self) -> ProviderResult<()> {
        *self.document.write().unwrap_or_else(PoisonError::into_inner) = None;
        if self.path.exists() {
            fs::remove_file(&self.path).map_err(|e| {
                ProviderError::configuration(format!("failed to remove token file: {}", e))
                    .with_source(e)
            })?;
            info!("removed token file {:?}", self.path);
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn expiry_uses_created_plus_lifetime() {
        let token = AccessToken::new("access").with_lifetime(now(), 3600);
        assert_eq!(
            token.expires_at(),
            Some(now() + Duration::seconds(3600))
        );
        assert!(!token.is_expired_at(now()));
        assert!(!token.is_expired_at(now() + Duration::seconds(3500)));
        // inside the leeway window
        assert!(token.is_expired_at(now() + Duration::seconds(3580)));
        assert!(token.is_expired_at(now() + Duration::hours(2)));
    }

    #[test]
    fn out_of_range_lifetime_counts_as_expired() {
        let token: AccessToken = serde_json::from_str(
            r#"{"access_token":"ya29.x","created":1700000000,"expires_in":9223372036854775807,"refresh_token":"1//r"}"#,
        )
        .unwrap();
        assert!(token.expires_at().is_none());
        assert!(token.is_expired_at(now()));

        let token = AccessToken::new("access").with_lifetime(now(), i64::MIN);
        assert!(token.is_expired_at(now()));

        let mut token = AccessToken::new("access");
        token.created = Some(i64::MAX);
        token.expires_in = Some(3600);
        assert!(token.is_expired_at(now()));
    }

    #[test]
    fn token_without_lifetime_never_expires() {
        let token = AccessToken::new("access");
        assert!(token.expires_at().is_none());
        assert!(!token.is_expired_at(now() + Duration::days(365)));
    }

    #[test]
    fn document_distinguishes_error_indicator() {
        let error: TokenDocument =
            serde_json::from_str(r#"{"error":"invalid_grant","error_description":"Bad Request"}"#)
                .unwrap();
        assert!(error.is_error());
        assert!(error.token().is_none());

        let token: TokenDocument = serde_json::from_str(
            r#"{"access_token":"ya29.x","expires_in":3599,"created":1700000000,"refresh_token":"1//r"}"#,
        )
        .unwrap();
        assert!(!token.is_error());
        assert_eq!(token.token().unwrap().refresh_token.as_deref(), Some("1//r"));
    }

    #[test]
    fn unknown_token_fields_survive_round_trip() {
        let json = r#"{"access_token":"ya29.x","expires_in":3599,"created":1700000000,"refresh_token_expires_in":604799}"#;
        let document: TokenDocument = serde_json::from_str(json).unwrap();
        let value = serde_json::to_value(&document).unwrap();
        assert_eq!(value["refresh_token_expires_in"], 604799);
        assert_eq!(value["access_token"], "ya29.x");
    }

    #[test]
    fn response_is_stamped_with_issue_time() {
        let document = TokenDocument::from_response(
            r#"{"access_token":"ya29.new","expires_in":3599,"token_type":"Bearer"}"#,
            now(),
        )
        .unwrap();
        assert_eq!(document.token().unwrap().created, Some(now().timestamp()));

        let error = TokenDocument::from_response(r#"{"error":"invalid_grant"}"#, now()).unwrap();
        assert_eq!(error, TokenDocument::Error(OAuthError::new("invalid_grant")));

        assert!(TokenDocument::from_response("<html>", now()).is_err());
    }

    #[test]
    fn oauth_error_display() {
        let error = OAuthError::new("invalid_grant").with_description("Token has been expired or revoked.");
        assert_eq!(
            error.to_string(),
            "invalid_grant: Token has been expired or revoked."
        );
    }

    #[test]
    fn storage_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = TokenStorage::new(dir.path().join("token.json"));
        assert!(storage.load().unwrap().is_none());
        assert!(storage.get().is_none());
    }

    #[test]
    fn storage_set_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("token.json");
        let storage = TokenStorage::new(&path);

        let token = AccessToken::new("ya29.x")
            .with_refresh_token("1//r")
            .with_lifetime(now(), 3600);
        storage.set(token.clone().into()).unwrap();
        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());

        let reloaded = TokenStorage::new(&path);
        assert_eq!(reloaded.load().unwrap(), Some(TokenDocument::Token(token.clone())));
        assert_eq!(reloaded.token(), Some(token));
    }

    #[cfg(unix)]
    #[test]
    fn storage_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        let storage = TokenStorage::new(&path);
        storage.set(AccessToken::new("ya29.x").into()).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn storage_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        fs::write(&path, "not json").unwrap();

        let err = TokenStorage::new(&path).load().unwrap_err();
        assert_eq!(
            err.code(),
            crate::error::ProviderErrorCode::ConfigurationError
        );
    }

    #[test]
    fn storage_error_document_has_no_token() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        fs::write(&path, r#"{"error":"invalid_grant"}"#).unwrap();

        let storage = TokenStorage::new(&path);
        assert!(storage.load().unwrap().unwrap().is_error());
        assert!(storage.token().is_none());
    }

    #[test]
    fn storage_clear() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        let storage = TokenStorage::new(&path);
        storage.set(AccessToken::new("ya29.x").into()).unwrap();

        storage.clear().unwrap();
        assert!(!path.exists());
        assert!(storage.get().is_none());
    }
}
