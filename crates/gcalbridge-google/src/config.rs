//! Credential manager and calendar accessor configuration.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use gcalbridge_core::CalendarRef;
use serde::{Deserialize, Serialize};

use crate::error::{ProviderError, ProviderResult};

const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const DEFAULT_REDIRECT_URI: &str = "http://localhost";

/// OAuth client registration loaded from the Google Cloud Console secret file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    /// Registered redirect URIs; the first one is used for the consent flow.
    pub redirect_uris: Vec<String>,
    pub auth_uri: String,
    pub token_uri: String,
}

/// On-disk shape of the secret file: an `installed` or `web` section, or flat.
#[derive(Debug, Deserialize)]
struct SecretFile {
    installed: Option<SecretSection>,
    web: Option<SecretSection>,
    #[serde(flatten)]
    flat: FlatSection,
}

#[derive(Debug, Deserialize)]
struct SecretSection {
    client_id: String,
    client_secret: String,
    #[serde(default)]
    redirect_uris: Vec<String>,
    auth_uri: Option<String>,
    token_uri: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FlatSection {
    client_id: Option<String>,
    client_secret: Option<String>,
    #[serde(default)]
    redirect_uris: Vec<String>,
}

impl ClientSecrets {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uris: Vec::new(),
            auth_uri: DEFAULT_AUTH_URI.to_string(),
            token_uri: DEFAULT_TOKEN_URI.to_string(),
        }
    }

    /// Loads the secret file downloaded from the Google Cloud Console.
    pub fn from_file(path: impl AsRef<Path>) -> ProviderResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ProviderError::configuration(format!(
                "failed to read client secret file {}: {}",
                path.display(),
                e
            ))
            .with_source(e)
        })?;
        Self::from_json(&content)
    }

    /// Parses either `{"installed": {...}}`, `{"web": {...}}` or a flat
    /// `{"client_id": ..., "client_secret": ...}` document.
    pub fn from_json(json: &str) -> ProviderResult<Self> {
        let file: SecretFile = serde_json::from_str(json).map_err(|e| {
            ProviderError::configuration(format!("failed to parse client secret JSON: {}", e))
        })?;

        if let Some(section) = file.installed.or(file.web) {
            let mut secrets = Self::new(section.client_id, section.client_secret);
            secrets.redirect_uris = section.redirect_uris;
            if let Some(uri) = section.auth_uri {
                secrets.auth_uri = uri;
            }
            if let Some(uri) = section.token_uri {
                secrets.token_uri = uri;
            }
            return Ok(secrets);
        }

        match (file.flat.client_id, file.flat.client_secret) {
            (Some(id), Some(secret)) => {
                let mut secrets = Self::new(id, secret);
                secrets.redirect_uris = file.flat.redirect_uris;
                Ok(secrets)
            }
            _ => Err(ProviderError::configuration(
                "client secret file must contain an 'installed'/'web' section or 'client_id'/'client_secret' at root level",
            )),
        }
    }

    pub fn with_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uris.insert(0, uri.into());
        self
    }

    /// The redirect URI sent with the consent and code-exchange requests.
    pub fn redirect_uri(&self) -> &str {
        self.redirect_uris
            .first()
            .map(String::as_str)
            .unwrap_or(DEFAULT_REDIRECT_URI)
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        if self.client_id.is_empty() {
            return Err("client_id is required");
        }
        if self.client_secret.is_empty() {
            return Err("client_secret is required");
        }
        Ok(())
    }
}

/// Whether Google should issue a refresh token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessType {
    /// Issue a refresh token so access survives the access token's expiry.
    #[default]
    Offline,
    Online,
}

impl AccessType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Offline => "offline",
            Self::Online => "online",
        }
    }
}

impl fmt::Display for AccessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the consent screen is shown even for previously granted scopes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalPrompt {
    /// Always prompt, which makes Google re-issue a refresh token.
    #[default]
    Force,
    Auto,
}

/// Configuration shared by the credential manager and the calendar accessor.
#[derive(Debug, Clone)]
pub struct GoogleConfig {
    /// Application name, sent as the HTTP user agent.
    pub application_name: String,
    /// OAuth scopes to request.
    pub scopes: Vec<String>,
    /// Path to the Google Cloud Console client secret JSON.
    pub client_secret_path: PathBuf,
    /// Path of the persisted token file.
    pub token_path: PathBuf,
    pub access_type: AccessType,
    pub approval_prompt: ApprovalPrompt,
    /// Time zone applied to event times that carry none.
    pub time_zone: String,
    /// Calendar used when the caller does not name one.
    pub calendar_id: CalendarRef,
    /// Upper bound for [`list_events`](crate::CalendarAccessor::list_events).
    pub max_results: u32,
    /// HTTP request timeout.
    pub timeout: Duration,
}

impl GoogleConfig {
    /// Read/write access to calendars and events.
    pub const SCOPE_CALENDAR: &'static str = "https://www.googleapis.com/auth/calendar";

    /// Read-only access.
    pub const SCOPE_CALENDAR_READONLY: &'static str =
        "https://www.googleapis.com/auth/calendar.readonly";

    pub const DEFAULT_TIME_ZONE: &'static str = "Pacific/Auckland";

    pub const DEFAULT_MAX_RESULTS: u32 = 10;

    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    pub fn new(client_secret_path: impl Into<PathBuf>, token_path: impl Into<PathBuf>) -> Self {
        Self {
            application_name: format!("gcalbridge/{}", env!("CARGO_PKG_VERSION")),
            scopes: vec![Self::SCOPE_CALENDAR.to_string()],
            client_secret_path: client_secret_path.into(),
            token_path: token_path.into(),
            access_type: AccessType::Offline,
            approval_prompt: ApprovalPrompt::Force,
            time_zone: Self::DEFAULT_TIME_ZONE.to_string(),
            calendar_id: CalendarRef::primary(),
            max_results: Self::DEFAULT_MAX_RESULTS,
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Default token file location, `~/.local/share/gcalbridge/token.json`.
    pub fn default_token_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gcalbridge")
            .join("token.json")
    }

    pub fn with_application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = name.into();
        self
    }

    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    pub fn with_access_type(mut self, access_type: AccessType) -> Self {
        self.access_type = access_type;
        self
    }

    pub fn with_approval_prompt(mut self, prompt: ApprovalPrompt) -> Self {
        self.approval_prompt = prompt;
        self
    }

    pub fn with_time_zone(mut self, time_zone: impl Into<String>) -> Self {
        self.time_zone = time_zone.into();
        self
    }

    pub fn with_calendar_id(mut self, calendar: impl Into<CalendarRef>) -> Self {
        self.calendar_id = calendar.into();
        self
    }

    pub fn with_max_results(mut self, max_results: u32) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Reads and validates the client secret file.
    pub fn load_secrets(&self) -> ProviderResult<ClientSecrets> {
        let secrets = ClientSecrets::from_file(&self.client_secret_path)?;
        secrets
            .validate()
            .map_err(|e| ProviderError::configuration(format!("invalid client secret: {}", e)))?;
        Ok(secrets)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.scopes.is_empty() {
            return Err("at least one OAuth scope is required".to_string());
        }
        if self.application_name.trim().is_empty() {
            return Err("application_name must not be empty".to_string());
        }
        if self.token_path.as_os_str().is_empty() {
            return Err("credentials_path must not be empty".to_string());
        }
        if self.calendar_id.as_str().is_empty() {
            return Err("calendar_id must not be empty".to_string());
        }
        if self.max_results == 0 {
            return Err("max_results must be at least 1".to_string());
        }
        Ok(())
    }

    /// Builds the HTTP client used for both OAuth and calendar requests.
    pub(crate) fn http_client(&self) -> ProviderResult<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(&self.application_name)
            .build()
            .map_err(|e| {
                ProviderError::internal(format!("failed to create HTTP client: {}", e))
                    .with_source(e)
            })
    }
}
