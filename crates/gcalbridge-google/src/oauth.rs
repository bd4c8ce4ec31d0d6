//! OAuth 2.0 authorization-code flow against Google's endpoints.
//!
//! The user opens the consent URL from [`OAuthEndpoint::authorization_url`],
//! grants access, and pastes the verification code back. That code is traded
//! for tokens with [`OAuthEndpoint::exchange_code`]; expired access tokens are
//! renewed with [`OAuthEndpoint::refresh`].
//!
//! Both token calls return a [`TokenDocument`]: an OAuth-level rejection such
//! as `invalid_grant` comes back as an error indicator, while transport
//! failures and unparseable responses are `Err`.

use chrono::Utc;
use tracing::{debug, info, warn};
use url::Url;

use crate::BoxFuture;
use crate::config::{ApprovalPrompt, ClientSecrets, GoogleConfig};
use crate::error::{ProviderError, ProviderResult};
use crate::tokens::TokenDocument;

/// The OAuth server as seen by the credential manager.
pub trait OAuthEndpoint: Send + Sync {
    /// URL of the consent page that hands out verification codes.
    fn authorization_url(&self) -> String;

    /// Trades a verification code for a token document.
    fn exchange_code<'a>(&'a self, code: &'a str) -> BoxFuture<'a, ProviderResult<TokenDocument>>;

    /// Trades a refresh token for a new access token document.
    fn refresh<'a>(&'a self, refresh_token: &'a str)
    -> BoxFuture<'a, ProviderResult<TokenDocument>>;
}

/// Google OAuth client over `reqwest`.
#[derive(Debug)]
pub struct OAuthClient {
    secrets: ClientSecrets,
    scopes: Vec<String>,
    access_type: crate::config::AccessType,
    approval_prompt: ApprovalPrompt,
    http_client: reqwest::Client,
}

impl OAuthClient {
    pub fn new(config: &GoogleConfig, secrets: ClientSecrets) -> ProviderResult<Self> {
        Ok(Self {
            secrets,
            scopes: config.scopes.clone(),
            access_type: config.access_type,
            approval_prompt: config.approval_prompt,
            http_client: config.http_client()?,
        })
    }

    /// Builds the consent URL.
    pub fn build_auth_url(&self) -> ProviderResult<Url> {
        let scope = self.scopes.join(" ");
        let mut params = vec![
            ("response_type", "code"),
            ("client_id", self.secrets.client_id.as_str()),
            ("redirect_uri", self.secrets.redirect_uri()),
            ("scope", scope.as_str()),
            ("access_type", self.access_type.as_str()),
        ];
        if self.approval_prompt == ApprovalPrompt::Force {
            params.push(("prompt", "consent"));
        }

        Url::parse_with_params(&self.secrets.auth_uri, &params).map_err(|e| {
            ProviderError::configuration(format!(
                "invalid auth_uri {:?}: {}",
                self.secrets.auth_uri, e
            ))
        })
    }

    async fn post_token_form(&self, params: &[(&str, &str)]) -> ProviderResult<TokenDocument> {
        let response = self
            .http_client
            .post(&self.secrets.token_uri)
            .form(params)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            ProviderError::network(format!("failed to read token response: {}", e))
        })?;

        parse_token_response(status.as_u16(), &body)
    }
}

impl OAuthEndpoint for OAuthClient {
    fn authorization_url(&self) -> String {
        match self.build_auth_url() {
            Ok(url) => url.into(),
            Err(e) => {
                warn!("{}", e);
                String::new()
            }
        }
    }

    fn exchange_code<'a>(&'a self, code: &'a str) -> BoxFuture<'a, ProviderResult<TokenDocument>> {
        Box::pin(async move {
            debug!("exchanging verification code for tokens");
            let document = self
                .post_token_form(&[
                    ("code", code),
                    ("client_id", self.secrets.client_id.as_str()),
                    ("client_secret", self.secrets.client_secret.as_str()),
                    ("redirect_uri", self.secrets.redirect_uri()),
                    ("grant_type", "authorization_code"),
                ])
                .await?;
            if !document.is_error() {
                info!("obtained tokens from verification code");
            }
            Ok(document)
        })
    }

    fn refresh<'a>(
        &'a self,
        refresh_token: &'a str,
    ) -> BoxFuture<'a, ProviderResult<TokenDocument>> {
        Box::pin(async move {
            debug!("refreshing access token");
            let document = self
                .post_token_form(&[
                    ("refresh_token", refresh_token),
                    ("client_id", self.secrets.client_id.as_str()),
                    ("client_secret", self.secrets.client_secret.as_str()),
                    ("grant_type", "refresh_token"),
                ])
                .await?;
            if !document.is_error() {
                info!("refreshed access token");
            }
            Ok(document)
        })
    }
}

/// Interprets a token endpoint response.
///
/// Success bodies and OAuth error bodies (any status) become documents; other
/// failures become errors.
pub(crate) fn parse_token_response(status: u16, body: &str) -> ProviderResult<TokenDocument> {
    match TokenDocument::from_response(body, Utc::now()) {
        Ok(document) if (200..300).contains(&status) || document.is_error() => Ok(document),
        Ok(_) => Err(ProviderError::from_status(status, body)),
        Err(_) if !(200..300).contains(&status) => Err(ProviderError::from_status(status, body)),
        Err(e) => Err(e),
    }
}

/// Wraps a consent URL in the link markup shown to users of a web front end.
pub fn auth_link_html(url: &str) -> String {
    format!(
        "<a href=\"{}\" target=\"_blank\">Retrieve Verification Code</a>",
        url.replace('&', "&amp;").replace('"', "&quot;")
    )
}
