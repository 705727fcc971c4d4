//! Error taxonomy for the credential layer.
//!
//! Each component owns a small error enum so callers can branch on the
//! failure kind (re-prompt, retry, report to an administrator).
//! [`CredentialError`] unifies them for callers that cross components.

use crate::credentials::{AuthenticationProtocol, ServerId};
use thiserror::Error;

/// Top-level error encompassing every component of the credential layer.
#[derive(Error, Debug)]
pub enum CredentialError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Connector(#[from] ConnectorError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    OAuth(#[from] OAuthError),
}

/// Errors raised by the encrypted credential store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// No administrator secret is configured, so nothing can be encrypted.
    #[error("Cannot store credentials: no encryption key is configured")]
    MissingEncryptionKey,

    /// A record exists but was encrypted under a different secret.
    #[error("Stored credentials for server {server_id} cannot be decrypted with the configured key")]
    KeyMismatch { server_id: ServerId },

    /// The caller may not read application-level credentials.
    #[error("User '{user}' is not allowed to read credentials of server {server_id}")]
    AccessDenied { user: String, server_id: ServerId },

    /// The credential kind cannot be persisted at application level.
    #[error("Credentials of kind '{kind}' cannot be persisted")]
    StorageNotAllowed { kind: &'static str },

    /// The configured secret is not a base64 encoded 32-byte key.
    #[error("Invalid encryption key: {0}")]
    InvalidKey(String),

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised by connectors and the capability shim.
#[derive(Error, Debug)]
pub enum ConnectorError {
    /// The connector cannot honor the given credential kind.
    #[error("Unsupported authentication mode: {protocol}")]
    UnsupportedAuthenticationMode { protocol: AuthenticationProtocol },

    /// The remote server rejected the credentials outright.
    #[error("Remote server rejected the credentials: {0}")]
    NoCredentials(String),

    /// The remote server could not be reached or answered unexpectedly.
    #[error("Remote server error: {0}")]
    Remote(String),

    /// No connector is registered for this server kind.
    #[error("No connector registered for kind '{0}'")]
    UnknownConnectorKind(String),
}

impl ConnectorError {
    /// True when the remote explicitly rejected the credentials, meaning the
    /// user should be prompted for new ones rather than retried.
    pub fn is_authentication_rejection(&self) -> bool {
        matches!(self, ConnectorError::NoCredentials(_))
    }
}

impl From<reqwest::Error> for ConnectorError {
    fn from(e: reqwest::Error) -> Self {
        ConnectorError::Remote(e.to_string())
    }
}

/// Errors raised by live credential sets.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CacheError {
    /// Two live sets of different users were about to be merged.
    #[error("Live credentials of '{expected}' cannot absorb those of '{actual}'")]
    UserMismatch { expected: String, actual: String },
}

/// Errors raised by the current-user credentials provider.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The execution context carries no user identity.
    #[error("No user identity is attached to the current context")]
    NoUserContext,

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors raised during the OAuth1a token dance.
#[derive(Error, Debug)]
pub enum OAuthError {
    /// The temporary exchange was lost, expired or already used.
    #[error("No pending OAuth exchange for server {server_id}; restart the authorization")]
    NoPendingExchange { server_id: ServerId },

    /// The temporary token does not belong to the pending exchange.
    #[error("Temporary token does not match the pending exchange")]
    TokenMismatch,

    /// `authorize` was called before the callback supplied a verifier.
    #[error("OAuth verifier is missing")]
    MissingVerifier,

    /// The remote server refused to exchange the token.
    #[error("OAuth server rejected the request: {0}")]
    Rejected(String),

    #[error("OAuth server unreachable: {0}")]
    Remote(#[from] reqwest::Error),

    #[error("Malformed OAuth response: {0}")]
    MalformedResponse(String),

    /// No OAuth consumer is configured for the server.
    #[error("OAuth is not configured for server {0}")]
    UnknownServer(ServerId),

    #[error(transparent)]
    Store(#[from] StoreError),
}
