//! Client configuration.
//!
//! All settings live in a single `config.toml` file at
//! `~/.config/gcalbridge/config.toml` by default:
//!
//! ```toml
//! [google_calendar]
//! application_name = "My calendar bridge"
//! client_secret_path = "client_secret.json"
//! credentials_path = "credentials.json"
//! client_access_type = "offline"
//! time_zone = "Pacific/Auckland"
//! calendar_id = "primary"
//! ```
//!
//! Relative paths are resolved against `base_folder`, which defaults to the
//! directory holding the config file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use gcalbridge_core::CalendarRef;
use gcalbridge_google::{AccessType, ApprovalPrompt, GoogleConfig};
use serde::{Deserialize, Serialize};

/// Configuration for the gcalbridge client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Google Calendar settings.
    pub google_calendar: GoogleCalendarSettings,

    /// File this configuration was loaded from.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

/// The `[google_calendar]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleCalendarSettings {
    /// Sent to Google as the user agent.
    pub application_name: String,

    /// Google Cloud Console OAuth client secret file.
    pub client_secret_path: PathBuf,

    /// Token file. Defaults to `~/.local/share/gcalbridge/token.json`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials_path: Option<PathBuf>,

    pub client_access_type: AccessType,

    pub approval_prompt: ApprovalPrompt,

    /// OAuth scopes; read/write calendar access when empty.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,

    /// Time zone for event times given without one.
    pub time_zone: String,

    /// Calendar used when a command names none.
    pub calendar_id: CalendarRef,

    /// Number of upcoming events listed.
    pub max_results: u32,

    /// HTTP timeout in seconds.
    pub timeout_secs: u64,

    /// Directory relative paths are resolved against.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_folder: Option<PathBuf>,
}

impl Default for GoogleCalendarSettings {
    fn default() -> Self {
        Self {
            application_name: "gcalbridge".to_string(),
            client_secret_path: PathBuf::from("client_secret.json"),
            credentials_path: None,
            client_access_type: AccessType::Offline,
            approval_prompt: ApprovalPrompt::Force,
            scopes: Vec::new(),
            time_zone: GoogleConfig::DEFAULT_TIME_ZONE.to_string(),
            calendar_id: CalendarRef::primary(),
            max_results: GoogleConfig::DEFAULT_MAX_RESULTS,
            timeout_secs: GoogleConfig::DEFAULT_TIMEOUT_SECS,
            base_folder: None,
        }
    }
}

impl ClientConfig {
    /// Loads configuration from the default path.
    ///
    /// A missing file yields the defaults.
    pub fn load() -> Result<Self, String> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self {
                source: Some(path),
                ..Self::default()
            })
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, String> {
        let content =
            std::fs::read_to_string(path).map_err(|e| format!("failed to read config: {}", e))?;
        let mut config: Self =
            toml::from_str(&content).map_err(|e| format!("failed to parse config: {}", e))?;
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    /// Returns the default configuration directory.
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gcalbridge")
    }

    /// Path of the config file in use.
    pub fn path(&self) -> PathBuf {
        self.source.clone().unwrap_or_else(Self::default_path)
    }

    /// Directory relative paths are resolved against.
    pub fn base_folder(&self) -> PathBuf {
        let config_dir = self
            .path()
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(Self::default_config_dir);

        match self.google_calendar.base_folder {
            Some(ref base) => config_dir.join(base),
            None => config_dir,
        }
    }

    /// Resolves `path` against the base folder unless it is absolute.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_folder().join(path)
        }
    }

    /// Token file location.
    pub fn token_path(&self) -> PathBuf {
        match self.google_calendar.credentials_path {
            Some(ref path) => self.resolve_path(path),
            None => GoogleConfig::default_token_path(),
        }
    }

    /// Builds the provider configuration.
    pub fn to_provider_config(&self) -> Result<GoogleConfig, String> {
        let settings = &self.google_calendar;

        let mut config = GoogleConfig::new(
            self.resolve_path(&settings.client_secret_path),
            self.token_path(),
        )
        .with_application_name(&settings.application_name)
        .with_access_type(settings.client_access_type)
        .with_approval_prompt(settings.approval_prompt)
        .with_time_zone(&settings.time_zone)
        .with_calendar_id(settings.calendar_id.clone())
        .with_max_results(settings.max_results)
        .with_timeout(Duration::from_secs(settings.timeout_secs));

        if !settings.scopes.is_empty() {
            config = config.with_scopes(settings.scopes.clone());
        }

        config.validate()?;
        Ok(config)
    }
}
