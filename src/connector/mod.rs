//! Connector capabilities and credential backporting.
//!
//! Connectors talk to one external server. Modern connectors implement
//! [`Connector`] and consume [`Credentials`] directly. Older connectors
//! implement [`LegacyConnector`] and only understand the reduced
//! [`LegacyCredentials`] shape; [`ConnectorShim`] negotiates between the two
//! by backporting the generic credential into the protocol the connector
//! declares.
//!
//! # Example
//! ```no_run
//! use async_trait::async_trait;
//! use squash_credentials::connector::{ConnectorShim, LegacyConnector, LegacyCredentials};
//! use squash_credentials::credentials::Credentials;
//! use squash_credentials::error::ConnectorError;
//! use std::sync::Arc;
//!
//! struct Probe;
//!
//! #[async_trait]
//! impl LegacyConnector for Probe {
//!     async fn authenticate(&self, _: &LegacyCredentials) -> Result<(), ConnectorError> {
//!         Ok(())
//!     }
//!
//!     async fn check_credentials(&self, _: &LegacyCredentials) -> Result<(), ConnectorError> {
//!         Ok(())
//!     }
//! }
//!
//! # async fn run() -> Result<(), ConnectorError> {
//! let shim = ConnectorShim::Legacy(Arc::new(Probe));
//! shim.check_credentials(&Credentials::basic("alice", "pw")).await?;
//! # Ok(())
//! # }
//! ```

use crate::credentials::{AuthenticationProtocol, Credentials};
use crate::error::ConnectorError;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;


/// Protocols a connector supports when it declares nothing else.
pub fn default_protocols() -> BTreeSet<AuthenticationProtocol> {
    BTreeSet::from([AuthenticationProtocol::BasicAuth])
}

/// Multi-protocol connector consuming generic credentials.
#[async_trait]
pub trait Connector: Send + Sync {
    fn supported_protocols(&self) -> BTreeSet<AuthenticationProtocol> {
        default_protocols()
    }

    fn supports(&self, protocol: AuthenticationProtocol) -> bool {
        self.supported_protocols().contains(&protocol)
    }

    /// Uses `credentials` for subsequent calls to the remote server.
    async fn authenticate(&self, credentials: &Credentials) -> Result<(), ConnectorError>;

    /// Performs a round-trip to the remote server with `credentials`.
    ///
    /// # Errors
    /// - [`ConnectorError::NoCredentials`] when the server rejects them
    /// - [`ConnectorError::Remote`] on any other remote or network failure
    async fn check_credentials(&self, credentials: &Credentials) -> Result<(), ConnectorError>;
}

/// Credentials as understood by single-protocol connectors.
///
/// Carries only what the wire needs; the generic kind is lost.
#[derive(Clone, PartialEq, Eq)]
pub enum LegacyCredentials {
    UsernamePassword { username: String, password: String },
    BearerToken(String),
    OAuth1a { token: String, token_secret: String },
}

impl std::fmt::Debug for LegacyCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LegacyCredentials::UsernamePassword { username, .. } => {
                write!(f, "UsernamePassword({}, ***)", username)
            }
            LegacyCredentials::BearerToken(_) => write!(f, "BearerToken(***)"),
            LegacyCredentials::OAuth1a { .. } => write!(f, "OAuth1a(***)"),
        }
    }
}

/// Connector predating generic credentials.
#[async_trait]
pub trait LegacyConnector: Send + Sync {
    fn supported_protocols(&self) -> BTreeSet<AuthenticationProtocol> {
        default_protocols()
    }

    async fn authenticate(&self, credentials: &LegacyCredentials) -> Result<(), ConnectorError>;

    async fn check_credentials(&self, credentials: &LegacyCredentials)
        -> Result<(), ConnectorError>;
}

/// Converts `credentials` into the legacy shape of one of the `supported`
/// protocols.
///
/// Fails with [`ConnectorError::UnsupportedAuthenticationMode`] naming the
/// credential's protocol when no supported protocol matches it.
pub fn backport(
    credentials: &Credentials,
    supported: &BTreeSet<AuthenticationProtocol>,
) -> Result<LegacyCredentials, ConnectorError> {
    let protocol = credentials.protocol();
    if !supported.contains(&protocol) {
        return Err(ConnectorError::UnsupportedAuthenticationMode { protocol });
    }

    let legacy = match credentials {
        Credentials::Basic { username, password } => LegacyCredentials::UsernamePassword {
            username: username.clone(),
            password: password.clone(),
        },
        Credentials::Token { token } => LegacyCredentials::BearerToken(token.clone()),
        Credentials::OAuth1aToken {
            token,
            token_secret,
        } => LegacyCredentials::OAuth1a {
            token: token.clone(),
            token_secret: token_secret.clone(),
        },
    };

    Ok(legacy)
}

/// A connector of either generation behind one capability interface.
#[derive(Clone)]
pub enum ConnectorShim {
    Modern(Arc<dyn Connector>),
    Legacy(Arc<dyn LegacyConnector>),
}

impl ConnectorShim {
    pub fn supported_protocols(&self) -> BTreeSet<AuthenticationProtocol> {
        match self {
            ConnectorShim::Modern(connector) => connector.supported_protocols(),
            ConnectorShim::Legacy(connector) => connector.supported_protocols(),
        }
    }

    pub fn supports(&self, protocol: AuthenticationProtocol) -> bool {
        match self {
            ConnectorShim::Modern(connector) => connector.supports(protocol),
            ConnectorShim::Legacy(connector) => connector.supported_protocols().contains(&protocol),
        }
    }

    fn ensure_supported(&self, credentials: &Credentials) -> Result<(), ConnectorError> {
        let protocol = credentials.protocol();
        if self.supports(protocol) {
            Ok(())
        } else {
            debug!(%protocol, "Connector does not support protocol");
            Err(ConnectorError::UnsupportedAuthenticationMode { protocol })
        }
    }

    pub async fn authenticate(&self, credentials: &Credentials) -> Result<(), ConnectorError> {
        self.ensure_supported(credentials)?;
        match self {
            ConnectorShim::Modern(connector) => connector.authenticate(credentials).await,
            ConnectorShim::Legacy(connector) => {
                let legacy = backport(credentials, &connector.supported_protocols())?;
                connector.authenticate(&legacy).await
            }
        }
    }

    pub async fn check_credentials(&self, credentials: &Credentials) -> Result<(), ConnectorError> {
        self.ensure_supported(credentials)?;
        match self {
            ConnectorShim::Modern(connector) => connector.check_credentials(credentials).await,
            ConnectorShim::Legacy(connector) => {
                let legacy = backport(credentials, &connector.supported_protocols())?;
                connector.check_credentials(&legacy).await
            }
        }
    }
}
