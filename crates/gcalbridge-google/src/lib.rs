//! Google Calendar access for gcalbridge.
//!
//! Two halves:
//!
//! - [`CredentialManager`] - keeps a valid OAuth access token in a token
//!   file, exchanging verification codes and refreshing expired tokens
//! - [`CalendarAccessor`] - lists calendars and events, and creates, reads,
//!   updates and deletes single events
//!
//! # Example
//!
//! ```ignore
//! use gcalbridge_google::{CalendarAccessor, CredentialManager, GoogleConfig};
//!
//! let config = GoogleConfig::new("client_secret.json", "token.json");
//! let credentials = CredentialManager::new(config)?;
//! if let Some(calendar) = CalendarAccessor::connect(&credentials, None).await? {
//!     for event in calendar.list_events(None).await? {
//!         println!("{:?} {:?}", event.start, event.summary);
//!     }
//! } else {
//!     println!("authorise at {}", credentials.auth_url());
//! }
//! ```

use std::future::Future;
use std::pin::Pin;

pub mod accessor;
pub mod client;
pub mod config;
pub mod credentials;
pub mod error;
pub mod oauth;
pub mod tokens;

/// A boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub use accessor::CalendarAccessor;
pub use client::{
    ApiAttendee, ApiEvent, CalendarApi, CalendarListEntry, EventQuery, GoogleCalendarClient,
};
pub use config::{AccessType, ApprovalPrompt, ClientSecrets, GoogleConfig};
pub use credentials::CredentialManager;
pub use error::{ProviderError, ProviderErrorCode, ProviderResult};
pub use oauth::{OAuthClient, OAuthEndpoint, auth_link_html};
pub use tokens::{AccessToken, OAuthError, TokenDocument, TokenStorage};
