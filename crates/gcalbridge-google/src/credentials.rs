//! Credential manager: keeps a usable access token in the token file.

use tracing::{debug, info, warn};

use crate::config::GoogleConfig;
use crate::error::{ProviderError, ProviderResult};
use crate::oauth::{OAuthClient, OAuthEndpoint, auth_link_html};
use crate::tokens::{AccessToken, TokenDocument, TokenStorage};

/// Owns the OAuth configuration and the persisted token.
pub struct CredentialManager {
    config: GoogleConfig,
    storage: TokenStorage,
    endpoint: Box<dyn OAuthEndpoint>,
}

impl CredentialManager {
    /// Creates a manager talking to Google, reading the client secret file
    /// named in `config`.
    pub fn new(config: GoogleConfig) -> ProviderResult<Self> {
        config.validate().map_err(ProviderError::configuration)?;
        let secrets = config.load_secrets()?;
        let endpoint = OAuthClient::new(&config, secrets)?;
        Ok(Self::with_endpoint(config, endpoint))
    }

    /// Creates a manager over an arbitrary OAuth endpoint.
    pub fn with_endpoint(config: GoogleConfig, endpoint: impl OAuthEndpoint + 'static) -> Self {
        let storage = TokenStorage::new(&config.token_path);
        Self {
            config,
            storage,
            endpoint: Box::new(endpoint),
        }
    }

    pub fn config(&self) -> &GoogleConfig {
        &self.config
    }

    pub fn storage(&self) -> &TokenStorage {
        &self.storage
    }

    /// Consent page URL where the user obtains a verification code.
    pub fn auth_url(&self) -> String {
        self.endpoint.authorization_url()
    }

    /// The consent URL as an HTML link.
    pub fn auth_link_html(&self) -> String {
        auth_link_html(&self.auth_url())
    }

    /// The current access token, once [`configure`](Self::configure) succeeded.
    pub fn access_token(&self) -> Option<AccessToken> {
        self.storage.token()
    }

    /// Returns true if a token is held that has not expired.
    pub fn is_configured(&self) -> bool {
        self.access_token().is_some_and(|t| !t.is_expired())
    }

    /// Makes sure a valid access token is available.
    ///
    /// Without a token file, or with one holding an error indicator, the
    /// `verification_code` is exchanged for a new token; lacking a code, this
    /// returns `Ok(false)`. Whatever the exchange returns is persisted. An
    /// expired token is refreshed and the refreshed token persisted, keeping
    /// the refresh token.
    ///
    /// # Errors
    ///
    /// Token file I/O failures and transport failures talking to the token
    /// endpoint.
    pub async fn configure(&self, verification_code: Option<&str>) -> ProviderResult<bool> {
        let stored = self.storage.load()?;

        let token = match stored {
            Some(TokenDocument::Token(token)) => token,
            Some(TokenDocument::Error(ref error)) => {
                debug!("token file holds an error indicator: {}", error);
                match self.exchange(verification_code).await? {
                    Some(token) => token,
                    None => return Ok(false),
                }
            }
            None => match self.exchange(verification_code).await? {
                Some(token) => token,
                None => return Ok(false),
            },
        };

        if token.is_expired() {
            return self.refresh(token).await;
        }

        Ok(true)
    }

    /// Exchanges the verification code, persisting the outcome.
    async fn exchange(&self, verification_code: Option<&str>) -> ProviderResult<Option<AccessToken>> {
        let Some(code) = verification_code.map(str::trim).filter(|c| !c.is_empty()) else {
            info!("no valid token and no verification code supplied");
            return Ok(None);
        };

        let document = self.endpoint.exchange_code(code).await?;
        self.storage.set(document.clone())?;

        match document {
            TokenDocument::Token(token) => Ok(Some(token)),
            TokenDocument::Error(error) => {
                warn!("verification code rejected: {}", error);
                Ok(None)
            }
        }
    }

    /// Renews an expired token, persisting the outcome.
    async fn refresh(&self, expired: AccessToken) -> ProviderResult<bool> {
        let Some(refresh_token) = expired.refresh_token.clone() else {
            warn!("access token expired and no refresh token is stored");
            return Ok(false);
        };

        match self.endpoint.refresh(&refresh_token).await? {
            TokenDocument::Token(mut token) => {
                token.refresh_token.get_or_insert(refresh_token);
                self.storage.set(TokenDocument::Token(token))?;
                Ok(true)
            }
            TokenDocument::Error(mut error) => {
                warn!("token refresh rejected: {}", error);
                error.refresh_token = Some(refresh_token);
                self.storage.set(TokenDocument::Error(error))?;
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::BoxFuture;
    use crate::tokens::OAuthError;
    use chrono::{Duration, Utc};
    use std::sync::{Arc, Mutex};

    /// Scripted token endpoint recording what it was asked.
    #[derive(Default, Clone)]
    pub(crate) struct FakeEndpoint {
        pub exchange_response: Option<TokenDocument>,
        pub refresh_response: Option<TokenDocument>,
        pub codes: Arc<Mutex<Vec<String>>>,
        pub refreshes: Arc<Mutex<Vec<String>>>,
    }

    impl OAuthEndpoint for FakeEndpoint {
        fn authorization_url(&self) -> String {
            "https://accounts.example.com/auth?client_id=test&scope=calendar".to_string()
        }

        fn exchange_code<'a>(
            &'a self,
            code: &'a str,
        ) -> BoxFuture<'a, ProviderResult<TokenDocument>> {
            self.codes.lock().unwrap().push(code.to_string());
            let response = self.exchange_response.clone();
            Box::pin(async move {
                response.ok_or_else(|| ProviderError::network("connection refused"))
            })
        }

        fn refresh<'a>(
            &'a self,
            refresh_token: &'a str,
        ) -> BoxFuture<'a, ProviderResult<TokenDocument>> {
            self.refreshes.lock().unwrap().push(refresh_token.to_string());
            let response = self.refresh_response.clone();
            Box::pin(async move {
                response.ok_or_else(|| ProviderError::network("connection refused"))
            })
        }
    }

    fn fresh_token(access: &str) -> AccessToken {
        AccessToken::new(access)
            .with_refresh_token("1//refresh")
            .with_lifetime(Utc::now(), 3600)
    }

    fn expired_token() -> AccessToken {
        AccessToken::new("ya29.stale")
            .with_refresh_token("1//refresh")
            .with_lifetime(Utc::now() - Duration::hours(2), 3600)
    }

    fn manager(dir: &tempfile::TempDir, endpoint: FakeEndpoint) -> CredentialManager {
        let config = GoogleConfig::new(
            dir.path().join("client_secret.json"),
            dir.path().join("token.json"),
        );
        CredentialManager::with_endpoint(config, endpoint)
    }

    fn write_token_file(dir: &tempfile::TempDir, document: &TokenDocument) {
        std::fs::write(
            dir.path().join("token.json"),
            serde_json::to_string(document).unwrap(),
        )
        .unwrap();
    }

    fn read_token_file(dir: &tempfile::TempDir) -> TokenDocument {
        let content = std::fs::read_to_string(dir.path().join("token.json")).unwrap();
        serde_json::from_str(&content).unwrap()
    }

    #[tokio::test]
    async fn no_token_file_and_no_code_fails() {
        let dir = tempfile::tempdir().unwrap();
        let endpoint = FakeEndpoint::default();
        let codes = endpoint.codes.clone();
        let manager = manager(&dir, endpoint);

        assert!(!manager.configure(None).await.unwrap());
        assert!(!manager.configure(Some("   ")).await.unwrap());
        assert!(codes.lock().unwrap().is_empty());
        assert!(!dir.path().join("token.json").exists());
        assert!(!manager.is_configured());
    }

    #[tokio::test]
    async fn error_indicator_without_code_fails() {
        let dir = tempfile::tempdir().unwrap();
        write_token_file(&dir, &OAuthError::new("invalid_grant").into());
        let manager = manager(&dir, FakeEndpoint::default());

        assert!(!manager.configure(None).await.unwrap());
        assert!(manager.access_token().is_none());
    }

    #[tokio::test]
    async fn verification_code_is_exchanged_and_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let endpoint = FakeEndpoint {
            exchange_response: Some(fresh_token("ya29.new").into()),
            ..Default::default()
        };
        let codes = endpoint.codes.clone();
        let manager = manager(&dir, endpoint);

        assert!(manager.configure(Some(" 4/0Acode ")).await.unwrap());
        assert_eq!(codes.lock().unwrap().as_slice(), ["4/0Acode"]);
        assert_eq!(
            read_token_file(&dir).token().unwrap().access_token,
            "ya29.new"
        );
        assert!(manager.is_configured());
    }

    #[tokio::test]
    async fn error_indicator_is_replaced_by_new_token() {
        let dir = tempfile::tempdir().unwrap();
        write_token_file(&dir, &OAuthError::new("invalid_grant").into());
        let endpoint = FakeEndpoint {
            exchange_response: Some(fresh_token("ya29.new").into()),
            ..Default::default()
        };
        let manager = manager(&dir, endpoint);

        assert!(manager.configure(Some("4/0Acode")).await.unwrap());
        assert!(!read_token_file(&dir).is_error());
    }

    #[tokio::test]
    async fn rejected_code_persists_error_and_fails() {
        let dir = tempfile::tempdir().unwrap();
        let endpoint = FakeEndpoint {
            exchange_response: Some(
                OAuthError::new("invalid_grant")
                    .with_description("Malformed auth code.")
                    .into(),
            ),
            ..Default::default()
        };
        let manager = manager(&dir, endpoint);

        assert!(!manager.configure(Some("bogus")).await.unwrap());
        assert!(read_token_file(&dir).is_error());
    }

    #[tokio::test]
    async fn valid_token_needs_no_remote_call() {
        let dir = tempfile::tempdir().unwrap();
        write_token_file(&dir, &fresh_token("ya29.current").into());
        let endpoint = FakeEndpoint::default();
        let codes = endpoint.codes.clone();
        let refreshes = endpoint.refreshes.clone();
        let manager = manager(&dir, endpoint);

        assert!(manager.configure(Some("ignored")).await.unwrap());
        assert!(codes.lock().unwrap().is_empty());
        assert!(refreshes.lock().unwrap().is_empty());
        assert_eq!(manager.access_token().unwrap().access_token, "ya29.current");
    }

    #[tokio::test]
    async fn expired_token_is_refreshed_and_persisted() {
        let dir = tempfile::tempdir().unwrap();
        write_token_file(&dir, &expired_token().into());
        let refreshed = AccessToken::new("ya29.fresh").with_lifetime(Utc::now(), 3599);
        let endpoint = FakeEndpoint {
            refresh_response: Some(refreshed.into()),
            ..Default::default()
        };
        let refreshes = endpoint.refreshes.clone();
        let manager = manager(&dir, endpoint);

        assert!(manager.configure(None).await.unwrap());
        assert_eq!(refreshes.lock().unwrap().as_slice(), ["1//refresh"]);

        let persisted = read_token_file(&dir);
        let token = persisted.token().unwrap();
        assert_eq!(token.access_token, "ya29.fresh");
        assert_eq!(token.refresh_token.as_deref(), Some("1//refresh"));
        assert!(manager.is_configured());
    }

    #[tokio::test]
    async fn out_of_range_lifetime_triggers_refresh() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("token.json"),
            r#"{"access_token":"ya29.x","created":1700000000,"expires_in":9223372036854775807,"refresh_token":"1//r"}"#,
        )
        .unwrap();
        let endpoint = FakeEndpoint {
            refresh_response: Some(
                AccessToken::new("ya29.fresh")
                    .with_lifetime(Utc::now(), 3599)
                    .into(),
            ),
            ..Default::default()
        };
        let refreshes = endpoint.refreshes.clone();
        let manager = manager(&dir, endpoint);

        assert!(manager.configure(None).await.unwrap());
        assert_eq!(refreshes.lock().unwrap().as_slice(), ["1//r"]);
        assert_eq!(
            read_token_file(&dir).token().unwrap().access_token,
            "ya29.fresh"
        );
    }

    #[tokio::test]
    async fn expired_token_without_refresh_token_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut token = expired_token();
        token.refresh_token = None;
        write_token_file(&dir, &token.into());
        let manager = manager(&dir, FakeEndpoint::default());

        assert!(!manager.configure(None).await.unwrap());
    }

    #[tokio::test]
    async fn rejected_refresh_persists_error_indicator() {
        let dir = tempfile::tempdir().unwrap();
        write_token_file(&dir, &expired_token().into());
        let endpoint = FakeEndpoint {
            refresh_response: Some(OAuthError::new("invalid_grant").into()),
            ..Default::default()
        };
        let manager = manager(&dir, endpoint);

        assert!(!manager.configure(None).await.unwrap());
        match read_token_file(&dir) {
            TokenDocument::Error(error) => {
                assert_eq!(error.error, "invalid_grant");
                assert_eq!(error.refresh_token.as_deref(), Some("1//refresh"));
            }
            other => panic!("expected error indicator, got {:?}", other),
        }
        // next call now needs a verification code
        assert!(!manager.configure(None).await.unwrap());
    }

    #[tokio::test]
    async fn transport_failure_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(&dir, FakeEndpoint::default());

        let err = manager.configure(Some("4/0Acode")).await.unwrap_err();
        assert_eq!(err.code(), crate::error::ProviderErrorCode::NetworkError);
        assert!(!dir.path().join("token.json").exists());
    }

    #[tokio::test]
    async fn garbage_token_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("token.json"), "{ truncated").unwrap();
        let manager = manager(&dir, FakeEndpoint::default());

        assert!(manager.configure(None).await.is_err());
    }

    #[test]
    fn auth_link_wraps_endpoint_url() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(&dir, FakeEndpoint::default());
        assert_eq!(
            manager.auth_link_html(),
            "<a href=\"https://accounts.example.com/auth?client_id=test&amp;scope=calendar\" target=\"_blank\">Retrieve Verification Code</a>"
        );
    }

    #[test]
    fn new_requires_client_secret_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = GoogleConfig::new(
            dir.path().join("client_secret.json"),
            dir.path().join("token.json"),
        );
        assert!(CredentialManager::new(config).is_err());
    }
}
