// Credential model and encrypted storage
pub mod credentials;

// Connector capabilities and credential backporting
pub mod connector;

// Session-scoped live credentials
pub mod live;

// Current-user credentials access
pub mod context;
pub mod provider;
pub mod session;

// OAuth1a token dance
pub mod oauth;

// Configuration and errors
pub mod config;
pub mod error;

pub use connector::{Connector, ConnectorShim, LegacyConnector, LegacyCredentials};
pub use context::UserContext;
pub use credentials::{
    AuthenticationPolicy, AuthenticationProtocol, CredentialStore, Credentials,
    ManageableCredentials, ServerId,
};
pub use error::CredentialError;
pub use live::{CacheOutcome, LiveCredentialSet};
pub use provider::CredentialsProvider;
pub use session::{InMemorySessionStore, SessionStore};
