//! Credential model and encrypted credential storage.
//!
//! Credentials are what the platform presents to external servers (issue
//! trackers, SCM, OAuth-enabled services). They exist in two shapes:
//!
//! - [`Credentials`]: the runtime value handed to a connector.
//! - [`ManageableCredentials`]: the management-time value an administrator
//!   configures, which knows where it may be kept and how to build the
//!   runtime value.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │       CredentialStore                    │
//! │  - upsert / find / delete by server id   │
//! │  - key fingerprint per record            │
//! └─────────────────────────────────────────┘
//!          ↓                    ↑
//!    (encrypt)            (decrypt)
//!          ↓                    ↑
//! ┌─────────────────────────────────────────┐
//! │       Encryption Module                  │
//! │  - AES-256-GCM, unique nonce per record  │
//! └─────────────────────────────────────────┘
//!          ↓                    ↑
//! ┌─────────────────────────────────────────┐
//! │       SQLite Database                    │
//! │  - one row per external server           │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use squash_credentials::credentials::{CredentialStore, ManageableCredentials};
//!
//! # fn main() -> anyhow::Result<()> {
//! let secret = std::env::var("SQUASH_CREDENTIALS_SECRET").ok();
//! let store = CredentialStore::new("credentials.db", secret.as_deref())?;
//!
//! store.store_credentials(
//!     7,
//!     &ManageableCredentials::Basic {
//!         username: "jira-bot".to_string(),
//!         password: "hunter2".to_string(),
//!     },
//! )?;
//!
//! if let Some(creds) = store.unsecured_find_credentials(7)? {
//!     println!("Server 7 uses {:?}", creds.kind());
//! }
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

mod encryption;
mod storage;

pub use storage::CredentialStore;

pub use encryption::{decrypt, encrypt, key_fingerprint, validate_key};

use crate::error::StoreError;

/// Identifier of an external server (bug tracker, SCM, ...).
pub type ServerId = i64;

/// Authentication scheme a credential implements and a connector supports.
///
/// Ordered by declaration so protocol sets iterate deterministically.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthenticationProtocol {
    BasicAuth,
    #[serde(rename = "OAUTH_1A")]
    OAuth1a,
    TokenAuth,
}

impl fmt::Display for AuthenticationProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthenticationProtocol::BasicAuth => write!(f, "BASIC_AUTH"),
            AuthenticationProtocol::OAuth1a => write!(f, "OAUTH_1A"),
            AuthenticationProtocol::TokenAuth => write!(f, "TOKEN_AUTH"),
        }
    }
}

/// Whether a server is contacted with per-user credentials or with the
/// credentials an administrator configured for the whole application.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthenticationPolicy {
    User,
    AppLevel,
}

/// Runtime credentials presented to an external server.
///
/// Value object: immutable once built, compared by content.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Credentials {
    Basic {
        username: String,
        password: String,
    },
    #[serde(rename = "oauth1a_token")]
    OAuth1aToken {
        token: String,
        token_secret: String,
    },
    Token {
        token: String,
    },
}

impl Credentials {
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    /// The protocol this credential implements.
    pub fn protocol(&self) -> AuthenticationProtocol {
        match self {
            Credentials::Basic { .. } => AuthenticationProtocol::BasicAuth,
            Credentials::OAuth1aToken { .. } => AuthenticationProtocol::OAuth1a,
            Credentials::Token { .. } => AuthenticationProtocol::TokenAuth,
        }
    }

    /// Only basic credentials may live in a session-scoped cache.
    pub fn is_cacheable(&self) -> bool {
        matches!(self, Credentials::Basic { .. })
    }
}

// Secrets never reach logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"***")
                .finish(),
            Credentials::OAuth1aToken { .. } => f
                .debug_struct("OAuth1aToken")
                .field("token", &"***")
                .field("token_secret", &"***")
                .finish(),
            Credentials::Token { .. } => f.debug_struct("Token").field("token", &"***").finish(),
        }
    }
}

/// Management-time credentials, as configured by an administrator.
///
/// `AppLevel` is a token-less marker meaning "use whatever is stored for
/// this server at application level".
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ManageableCredentials {
    Basic {
        username: String,
        password: String,
    },
    #[serde(rename = "oauth1a_token")]
    OAuth1aToken {
        token: String,
        token_secret: String,
    },
    Token {
        token: String,
    },
    AppLevel,
}

impl ManageableCredentials {
    pub fn kind(&self) -> &'static str {
        match self {
            ManageableCredentials::Basic { .. } => "basic",
            ManageableCredentials::OAuth1aToken { .. } => "oauth1a_token",
            ManageableCredentials::Token { .. } => "token",
            ManageableCredentials::AppLevel => "app_level",
        }
    }

    /// Whether the built credentials may be cached in a user's live set.
    pub fn allows_user_level_storage(&self) -> bool {
        matches!(self, ManageableCredentials::Basic { .. })
    }

    /// Whether these credentials may be persisted in the encrypted store.
    pub fn allows_app_level_storage(&self) -> bool {
        !matches!(self, ManageableCredentials::AppLevel)
    }

    /// Builds the runtime credentials for `server_id`.
    ///
    /// Returns `Ok(None)` when nothing can be built; whether that is fatal
    /// is the caller's decision.
    pub fn build(
        &self,
        store: &CredentialStore,
        server_id: ServerId,
    ) -> Result<Option<Credentials>, StoreError> {
        match self {
            ManageableCredentials::AppLevel => {
                let stored = store.unsecured_find_credentials(server_id)?;
                Ok(stored.and_then(|creds| creds.into_runtime()))
            }
            other => Ok(other.clone().into_runtime()),
        }
    }

    fn into_runtime(self) -> Option<Credentials> {
        match self {
            ManageableCredentials::Basic { username, password } => {
                Some(Credentials::Basic { username, password })
            }
            ManageableCredentials::OAuth1aToken { token, token_secret } => {
                Some(Credentials::OAuth1aToken { token, token_secret })
            }
            ManageableCredentials::Token { token } => Some(Credentials::Token { token }),
            ManageableCredentials::AppLevel => None,
        }
    }
}

impl From<Credentials> for ManageableCredentials {
    fn from(credentials: Credentials) -> Self {
        match credentials {
            Credentials::Basic { username, password } => {
                ManageableCredentials::Basic { username, password }
            }
            Credentials::OAuth1aToken { token, token_secret } => {
                ManageableCredentials::OAuth1aToken { token, token_secret }
            }
            Credentials::Token { token } => ManageableCredentials::Token { token },
        }
    }
}

impl fmt::Debug for ManageableCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManageableCredentials::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"***")
                .finish(),
            ManageableCredentials::AppLevel => write!(f, "AppLevel"),
            other => write!(f, "{}(***)", other.kind()),
        }
    }
}
