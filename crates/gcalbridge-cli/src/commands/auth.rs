//! Authorisation commands.

use serde_json::json;
use tracing::info;

use gcalbridge_google::{CredentialManager, TokenDocument, TokenStorage};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::output::OutputFormat;

/// Builds a credential manager from the configuration.
pub fn credential_manager(config: &ClientConfig) -> ClientResult<CredentialManager> {
    let provider_config = config.to_provider_config().map_err(ClientError::Config)?;
    Ok(CredentialManager::new(provider_config)?)
}

/// Print (or open) the consent URL.
pub fn link(config: &ClientConfig, html: bool, open_browser: bool) -> ClientResult<()> {
    let credentials = credential_manager(config)?;
    let url = credentials.auth_url();
    if url.is_empty() {
        return Err(ClientError::Config(
            "could not build the authorisation URL from the client secret".to_string(),
        ));
    }

    if open_browser {
        open::that(&url)
            .map_err(|e| ClientError::Action(format!("failed to open browser: {}", e)))?;
        info!("opened consent page in browser");
    }

    if html {
        println!("{}", credentials.auth_link_html());
    } else {
        println!("{}", url);
    }
    Ok(())
}

/// Exchange a verification code or refresh the stored token.
pub async fn configure(config: &ClientConfig, code: Option<&str>) -> ClientResult<()> {
    let credentials = credential_manager(config)?;

    if credentials.configure(code).await? {
        println!(
            "Google Calendar access is configured ({}).",
            credentials.storage().path().display()
        );
        return Ok(());
    }

    let hint = if code.is_some_and(|c| !c.trim().is_empty()) {
        "the verification code was rejected; retrieve a new one"
    } else {
        "supply a verification code with --code"
    };
    Err(ClientError::AuthRequired(format!(
        "{}. Retrieve one at:\n  {}",
        hint,
        credentials.auth_url()
    )))
}

/// Report whether a valid token is stored.
pub fn status(config: &ClientConfig, format: OutputFormat) -> ClientResult<()> {
    let storage = TokenStorage::new(config.token_path());
    let document = storage.load()?;

    let (state, expires_at) = match document {
        None => ("missing", None),
        Some(TokenDocument::Error(_)) => ("rejected", None),
        Some(TokenDocument::Token(ref token)) => {
            let state = if token.is_expired() { "expired" } else { "valid" };
            (state, token.expires_at())
        }
    };

    match format {
        OutputFormat::Json => {
            let value = json!({
                "state": state,
                "token_path": storage.path(),
                "expires_at": expires_at.map(|t| t.to_rfc3339()),
                "refresh_token": document
                    .as_ref()
                    .and_then(TokenDocument::token)
                    .is_some_and(|t| t.refresh_token.is_some()),
            });
            println!("{:#}", value);
        }
        OutputFormat::Text => {
            println!("token: {} ({})", state, storage.path().display());
            if let Some(expires_at) = expires_at {
                println!("expires: {}", expires_at.to_rfc3339());
            }
            if let Some(TokenDocument::Error(ref error)) = document {
                println!("last error: {}", error);
            }
        }
    }
    Ok(())
}

/// Remove the stored token.
pub fn reset(config: &ClientConfig) -> ClientResult<()> {
    let storage = TokenStorage::new(config.token_path());
    storage.clear()?;
    println!("Removed token {}", storage.path().display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GoogleCalendarSettings;
    use std::path::PathBuf;

    fn config_in(dir: &tempfile::TempDir) -> ClientConfig {
        ClientConfig {
            google_calendar: GoogleCalendarSettings {
                credentials_path: Some(PathBuf::from("credentials.json")),
                ..Default::default()
            },
            source: Some(dir.path().join("config.toml")),
        }
    }

    fn write_secret(dir: &tempfile::TempDir) {
        std::fs::write(
            dir.path().join("client_secret.json"),
            r#"{"installed":{"client_id":"id.apps.googleusercontent.com","client_secret":"s","redirect_uris":["http://localhost"]}}"#,
        )
        .unwrap();
    }

    #[test]
    fn manager_needs_client_secret() {
        let dir = tempfile::tempdir().unwrap();
        let err = credential_manager(&config_in(&dir)).err().unwrap();
        assert!(matches!(err, ClientError::Provider(_)));
    }

    #[test]
    fn manager_auth_url_uses_secret() {
        let dir = tempfile::tempdir().unwrap();
        write_secret(&dir);
        let credentials = credential_manager(&config_in(&dir)).unwrap();
        assert!(credentials.auth_url().contains("client_id=id.apps.googleusercontent.com"));
        assert_eq!(
            credentials.storage().path(),
            dir.path().join("credentials.json")
        );
    }

    #[tokio::test]
    async fn configure_without_code_requires_auth() {
        let dir = tempfile::tempdir().unwrap();
        write_secret(&dir);
        let err = configure(&config_in(&dir), None).await.unwrap_err();
        match err {
            ClientError::AuthRequired(msg) => {
                assert!(msg.contains("--code"));
                assert!(msg.contains("accounts.google.com"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn reset_removes_token_file() {
        let dir = tempfile::tempdir().unwrap();
        let token = dir.path().join("credentials.json");
        std::fs::write(&token, r#"{"error":"invalid_grant"}"#).unwrap();

        reset(&config_in(&dir)).unwrap();
        assert!(!token.exists());
        // nothing left to remove is fine
        reset(&config_in(&dir)).unwrap();
    }

    #[test]
    fn status_reads_token_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("credentials.json"),
            r#"{"access_token":"ya29.a","expires_in":3600,"created":0}"#,
        )
        .unwrap();
        status(&config_in(&dir), OutputFormat::Text).unwrap();

        std::fs::write(dir.path().join("credentials.json"), "not json").unwrap();
        assert!(status(&config_in(&dir), OutputFormat::Json).is_err());
    }
}
