//! Generic HTTP connectors.
//!
//! Both connectors validate credentials by requesting a probe path on the
//! server (typically a "current user" endpoint). 401 and 403 mean the
//! credentials were rejected; anything else that is not a success is a
//! remote failure.

use async_trait::async_trait;
use squash_credentials::connector::{Connector, LegacyConnector, LegacyCredentials};
use squash_credentials::error::ConnectorError;
use squash_credentials::{AuthenticationProtocol, Credentials};
use std::collections::BTreeSet;
use std::sync::Mutex;
use tracing::debug;

const DEFAULT_PROBE_PATH: &str = "/";

enum ProbeAuth<'a> {
    Basic { username: &'a str, password: &'a str },
    Bearer(&'a str),
}

async fn probe(client: &reqwest::Client, url: &str, auth: ProbeAuth<'_>) -> Result<(), ConnectorError> {
    let request = client.get(url);
    let request = match auth {
        ProbeAuth::Basic { username, password } => request.basic_auth(username, Some(password)),
        ProbeAuth::Bearer(token) => request.bearer_auth(token),
    };

    let response = request.send().await?;
    let status = response.status();
    debug!(url, %status, "Credentials probe answered");

    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(ConnectorError::NoCredentials(format!("{} answered {}", url, status)));
    }
    if !status.is_success() {
        return Err(ConnectorError::Remote(format!("{} answered {}", url, status)));
    }
    Ok(())
}

fn probe_url(base_url: &str, probe_path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        probe_path.trim_start_matches('/')
    )
}

/// Single-protocol connector for servers accepting HTTP basic auth.
pub struct HttpBasicConnector {
    client: reqwest::Client,
    base_url: String,
    probe_path: String,
    credentials: Mutex<Option<LegacyCredentials>>,
}

impl HttpBasicConnector {
    pub const KIND: &'static str = "http-basic";

    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.to_string(),
            probe_path: DEFAULT_PROBE_PATH.to_string(),
            credentials: Mutex::new(None),
        }
    }

    pub fn with_probe_path(mut self, probe_path: &str) -> Self {
        self.probe_path = probe_path.to_string();
        self
    }

    /// Credentials set by the last `authenticate` call.
    pub fn current_credentials(&self) -> Option<LegacyCredentials> {
        self.credentials
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl LegacyConnector for HttpBasicConnector {
    async fn authenticate(&self, credentials: &LegacyCredentials) -> Result<(), ConnectorError> {
        *self
            .credentials
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(credentials.clone());
        Ok(())
    }

    async fn check_credentials(
        &self,
        credentials: &LegacyCredentials,
    ) -> Result<(), ConnectorError> {
        let LegacyCredentials::UsernamePassword { username, password } = credentials else {
            return Err(ConnectorError::UnsupportedAuthenticationMode {
                protocol: AuthenticationProtocol::BasicAuth,
            });
        };

        let url = probe_url(&self.base_url, &self.probe_path);
        probe(&self.client, &url, ProbeAuth::Basic { username, password }).await
    }
}

/// Connector for servers accepting HTTP basic auth or bearer tokens.
pub struct HttpTokenConnector {
    client: reqwest::Client,
    base_url: String,
    probe_path: String,
    credentials: Mutex<Option<Credentials>>,
}

impl HttpTokenConnector {
    pub const KIND: &'static str = "http-token";

    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.to_string(),
            probe_path: DEFAULT_PROBE_PATH.to_string(),
            credentials: Mutex::new(None),
        }
    }

    pub fn with_probe_path(mut self, probe_path: &str) -> Self {
        self.probe_path = probe_path.to_string();
        self
    }

    pub fn current_credentials(&self) -> Option<Credentials> {
        self.credentials
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl Connector for HttpTokenConnector {
    fn supported_protocols(&self) -> BTreeSet<AuthenticationProtocol> {
        BTreeSet::from([
            AuthenticationProtocol::BasicAuth,
            AuthenticationProtocol::TokenAuth,
        ])
    }

    async fn authenticate(&self, credentials: &Credentials) -> Result<(), ConnectorError> {
        *self
            .credentials
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(credentials.clone());
        Ok(())
    }

    async fn check_credentials(&self, credentials: &Credentials) -> Result<(), ConnectorError> {
        let auth = match credentials {
            Credentials::Basic { username, password } => ProbeAuth::Basic { username, password },
            Credentials::Token { token } => ProbeAuth::Bearer(token),
            other => {
                return Err(ConnectorError::UnsupportedAuthenticationMode {
                    protocol: other.protocol(),
                })
            }
        };

        let url = probe_url(&self.base_url, &self.probe_path);
        probe(&self.client, &url, auth).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use squash_credentials::ConnectorShim;
    use std::sync::Arc;

    #[test]
    fn test_probe_url_joins_slashes() {
        assert_eq!(probe_url("https://a/", "/myself"), "https://a/myself");
        assert_eq!(probe_url("https://a", "myself"), "https://a/myself");
    }

    #[tokio::test]
    async fn test_basic_probe_accepts_valid_credentials() {
        let mut server = mockito::Server::new_async().await;
        // alice:pw
        let mock = server
            .mock("GET", "/rest/myself")
            .match_header("authorization", "Basic YWxpY2U6cHc=")
            .with_status(200)
            .create_async()
            .await;

        let connector = HttpBasicConnector::new(&server.url()).with_probe_path("/rest/myself");
        let shim = ConnectorShim::Legacy(Arc::new(connector));
        shim.check_credentials(&Credentials::basic("alice", "pw"))
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_basic_probe_rejection_and_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/")
            .match_header("authorization", "Basic YWxpY2U6cHc=")
            .with_status(401)
            .create_async()
            .await;
        server
            .mock("GET", "/")
            .match_header("authorization", "Basic Ym9iOnB3")
            .with_status(503)
            .create_async()
            .await;

        let connector = HttpBasicConnector::new(&server.url());

        let rejected = connector
            .check_credentials(&LegacyCredentials::UsernamePassword {
                username: "alice".into(),
                password: "pw".into(),
            })
            .await
            .unwrap_err();
        assert!(rejected.is_authentication_rejection());

        let failed = connector
            .check_credentials(&LegacyCredentials::UsernamePassword {
                username: "bob".into(),
                password: "pw".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(failed, ConnectorError::Remote(_)));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_remote_error() {
        let connector = HttpBasicConnector::new("http://127.0.0.1:1");
        let err = connector
            .check_credentials(&LegacyCredentials::UsernamePassword {
                username: "alice".into(),
                password: "pw".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectorError::Remote(_)));
    }

    #[tokio::test]
    async fn test_token_probe_uses_bearer() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/user")
            .match_header("authorization", "Bearer tok-1")
            .with_status(200)
            .create_async()
            .await;

        let connector = HttpTokenConnector::new(&server.url()).with_probe_path("api/user");
        connector
            .check_credentials(&Credentials::Token {
                token: "tok-1".into(),
            })
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_authenticate_remembers_credentials() {
        let connector = Arc::new(HttpTokenConnector::new("https://tracker.example.com"));
        let shim = ConnectorShim::Modern(connector.clone());

        shim.authenticate(&Credentials::Token { token: "t".into() })
            .await
            .unwrap();
        assert_eq!(
            connector.current_credentials(),
            Some(Credentials::Token { token: "t".into() })
        );

        let basic = Arc::new(HttpBasicConnector::new("https://tracker.example.com"));
        let shim = ConnectorShim::Legacy(basic.clone());
        let err = shim
            .authenticate(&Credentials::Token { token: "t".into() })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ConnectorError::UnsupportedAuthenticationMode {
                protocol: AuthenticationProtocol::TokenAuth
            }
        ));
        assert!(basic.current_credentials().is_none());
    }
}
