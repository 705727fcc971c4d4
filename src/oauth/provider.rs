//! OAuth1a consumer configuration and provider contract.

use super::TemporaryTokenExchange;
use crate::credentials::{Credentials, ServerId};
use crate::error::OAuthError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Talks OAuth1a to the remote servers.
#[async_trait]
pub trait OAuth1aProvider: Send + Sync {
    /// Obtains temporary credentials and the URL the user must visit.
    async fn request_temporary_token(
        &self,
        server_id: ServerId,
        callback_url: &str,
    ) -> Result<TemporaryTokenExchange, OAuthError>;

    /// Exchanges the verified temporary token for a permanent access token.
    async fn exchange_verifier(
        &self,
        server_id: ServerId,
        exchange: &TemporaryTokenExchange,
        verifier: &str,
    ) -> Result<Credentials, OAuthError>;
}

/// OAuth1a consumer registration for one external server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OAuth1aConsumerConfig {
    pub server_id: ServerId,

    /// Consumer key registered on the remote server
    pub consumer_key: String,

    /// Consumer secret (PLAINTEXT signatures)
    #[serde(default)]
    pub consumer_secret: String,

    /// Temporary credential request endpoint
    pub request_token_url: String,

    /// Resource owner authorization endpoint
    pub authorize_url: String,

    /// Token request endpoint
    pub access_token_url: String,
}

impl OAuth1aConsumerConfig {
    /// URL the end user is redirected to in order to authorize `temp_token`.
    pub fn build_authorize_url(&self, temp_token: &str) -> String {
        let separator = if self.authorize_url.contains('?') { '&' } else { '?' };
        format!(
            "{}{}oauth_token={}",
            self.authorize_url,
            separator,
            urlencoding::encode(temp_token)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(authorize_url: &str) -> OAuth1aConsumerConfig {
        OAuth1aConsumerConfig {
            server_id: 1,
            consumer_key: "squash".to_string(),
            consumer_secret: String::new(),
            request_token_url: "https://jira.example.com/plugins/servlet/oauth/request-token".to_string(),
            authorize_url: authorize_url.to_string(),
            access_token_url: "https://jira.example.com/plugins/servlet/oauth/access-token".to_string(),
        }
    }

    #[test]
    fn test_build_authorize_url() {
        let url = config("https://jira.example.com/plugins/servlet/oauth/authorize")
            .build_authorize_url("tok/en+1");
        assert_eq!(
            url,
            "https://jira.example.com/plugins/servlet/oauth/authorize?oauth_token=tok%2Fen%2B1"
        );
    }

    #[test]
    fn test_build_authorize_url_with_query() {
        let url = config("https://tracker.example.com/authorize?lang=en").build_authorize_url("t");
        assert_eq!(url, "https://tracker.example.com/authorize?lang=en&oauth_token=t");
    }

    #[test]
    fn test_config_deserialization() {
        let toml = r#"
            server_id = 4
            consumer_key = "squash"
            request_token_url = "https://a/request"
            authorize_url = "https://a/authorize"
            access_token_url = "https://a/access"
        "#;
        let config: OAuth1aConsumerConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.server_id, 4);
        assert!(config.consumer_secret.is_empty());
    }
}
