//! OAuth1a token requests over HTTP.
//!
//! Requests are signed with the `PLAINTEXT` method, so the consumer and
//! token secrets travel as the signature; endpoints must be HTTPS in
//! production.

use super::provider::{OAuth1aConsumerConfig, OAuth1aProvider};
use super::TemporaryTokenExchange;
use crate::credentials::{Credentials, ServerId};
use crate::error::OAuthError;
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use std::collections::HashMap;
use uuid::Uuid;

/// Temporary credentials response
#[derive(Deserialize, Debug)]
struct TemporaryTokenResponse {
    oauth_token: String,
    oauth_token_secret: String,
    #[serde(default)]
    oauth_callback_confirmed: Option<String>,
}

/// Token credentials response
#[derive(Deserialize, Debug)]
struct AccessTokenResponse {
    oauth_token: String,
    oauth_token_secret: String,
}

/// [`OAuth1aProvider`] for servers registered in configuration.
pub struct HttpOAuth1aProvider {
    client: reqwest::Client,
    consumers: HashMap<ServerId, OAuth1aConsumerConfig>,
}

impl HttpOAuth1aProvider {
    pub fn new(consumers: impl IntoIterator<Item = OAuth1aConsumerConfig>) -> Self {
        Self {
            client: reqwest::Client::new(),
            consumers: consumers
                .into_iter()
                .map(|config| (config.server_id, config))
                .collect(),
        }
    }

    fn consumer(&self, server_id: ServerId) -> Result<&OAuth1aConsumerConfig, OAuthError> {
        self.consumers
            .get(&server_id)
            .ok_or(OAuthError::UnknownServer(server_id))
    }

    async fn post_signed(&self, url: &str, authorization: String) -> Result<String, OAuthError> {
        tracing::debug!("Requesting OAuth1a token at {}", url);

        let response = self
            .client
            .post(url)
            .header("Authorization", authorization)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status.is_client_error() {
            return Err(OAuthError::Rejected(format!("status {}: {}", status, body)));
        }
        if !status.is_success() {
            return Err(OAuthError::MalformedResponse(format!(
                "unexpected status {}: {}",
                status, body
            )));
        }

        Ok(body)
    }
}

/// Builds the `Authorization: OAuth ...` header value.
fn authorization_header(
    consumer: &OAuth1aConsumerConfig,
    token_secret: &str,
    extra: &[(&str, &str)],
) -> String {
    let signature = format!(
        "{}&{}",
        urlencoding::encode(&consumer.consumer_secret),
        urlencoding::encode(token_secret)
    );
    let nonce = Uuid::new_v4().simple().to_string();
    let timestamp = Utc::now().timestamp().to_string();

    let mut params: Vec<(&str, &str)> = vec![
        ("oauth_consumer_key", consumer.consumer_key.as_str()),
        ("oauth_nonce", nonce.as_str()),
        ("oauth_signature_method", "PLAINTEXT"),
        ("oauth_timestamp", timestamp.as_str()),
        ("oauth_version", "1.0"),
    ];
    params.extend_from_slice(extra);
    params.push(("oauth_signature", signature.as_str()));

    let rendered: Vec<String> = params
        .iter()
        .map(|(name, value)| format!("{}=\"{}\"", name, urlencoding::encode(value)))
        .collect();

    format!("OAuth {}", rendered.join(", "))
}

#[async_trait]
impl OAuth1aProvider for HttpOAuth1aProvider {
    async fn request_temporary_token(
        &self,
        server_id: ServerId,
        callback_url: &str,
    ) -> Result<TemporaryTokenExchange, OAuthError> {
        let consumer = self.consumer(server_id)?;
        let authorization =
            authorization_header(consumer, "", &[("oauth_callback", callback_url)]);

        let body = self
            .post_signed(&consumer.request_token_url, authorization)
            .await?;
        let response: TemporaryTokenResponse = serde_urlencoded::from_str(&body)
            .map_err(|e| OAuthError::MalformedResponse(e.to_string()))?;

        if response.oauth_callback_confirmed.as_deref() != Some("true") {
            return Err(OAuthError::MalformedResponse(
                "oauth_callback_confirmed is not true".to_string(),
            ));
        }

        let redirect_url = consumer.build_authorize_url(&response.oauth_token);
        Ok(TemporaryTokenExchange::new(
            response.oauth_token,
            response.oauth_token_secret,
            redirect_url,
        ))
    }

    async fn exchange_verifier(
        &self,
        server_id: ServerId,
        exchange: &TemporaryTokenExchange,
        verifier: &str,
    ) -> Result<Credentials, OAuthError> {
        let consumer = self.consumer(server_id)?;
        let authorization = authorization_header(
            consumer,
            &exchange.temp_token_secret,
            &[
                ("oauth_token", exchange.temp_token.as_str()),
                ("oauth_verifier", verifier),
            ],
        );

        let body = self
            .post_signed(&consumer.access_token_url, authorization)
            .await?;
        let response: AccessTokenResponse = serde_urlencoded::from_str(&body)
            .map_err(|e| OAuthError::MalformedResponse(e.to_string()))?;

        Ok(Credentials::OAuth1aToken {
            token: response.oauth_token,
            token_secret: response.oauth_token_secret,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn consumer(base_url: &str) -> OAuth1aConsumerConfig {
        OAuth1aConsumerConfig {
            server_id: 1,
            consumer_key: "squash".to_string(),
            consumer_secret: "cs".to_string(),
            request_token_url: format!("{}/oauth/request-token", base_url),
            authorize_url: format!("{}/oauth/authorize", base_url),
            access_token_url: format!("{}/oauth/access-token", base_url),
        }
    }

    #[test]
    fn test_authorization_header_plaintext_signature() {
        let header = authorization_header(&consumer("https://a"), "ts", &[("oauth_verifier", "v 1")]);
        assert!(header.starts_with("OAuth "));
        assert!(header.contains("oauth_consumer_key=\"squash\""));
        assert!(header.contains("oauth_signature_method=\"PLAINTEXT\""));
        assert!(header.contains("oauth_verifier=\"v%201\""));
        // "cs&ts" percent-encoded once more as a header parameter
        assert!(header.contains("oauth_signature=\"cs%26ts\""));
    }

    #[test]
    fn test_response_deserialization() {
        let body = "oauth_token=abc&oauth_token_secret=def&oauth_callback_confirmed=true";
        let response: TemporaryTokenResponse = serde_urlencoded::from_str(body).unwrap();
        assert_eq!(response.oauth_token, "abc");
        assert_eq!(response.oauth_token_secret, "def");
        assert_eq!(response.oauth_callback_confirmed.as_deref(), Some("true"));
    }

    #[tokio::test]
    async fn test_request_temporary_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/oauth/request-token")
            .match_header(
                "authorization",
                Matcher::Regex("oauth_callback=\"https%3A%2F%2Fsquash%2Fcb\"".to_string()),
            )
            .with_status(200)
            .with_body("oauth_token=temp&oauth_token_secret=temp-secret&oauth_callback_confirmed=true")
            .create_async()
            .await;

        let provider = HttpOAuth1aProvider::new([consumer(&server.url())]);
        let exchange = provider
            .request_temporary_token(1, "https://squash/cb")
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(exchange.temp_token, "temp");
        assert_eq!(exchange.temp_token_secret, "temp-secret");
        assert_eq!(
            exchange.redirect_url,
            format!("{}/oauth/authorize?oauth_token=temp", server.url())
        );
    }

    #[tokio::test]
    async fn test_unconfirmed_callback_is_malformed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/oauth/request-token")
            .with_status(200)
            .with_body("oauth_token=temp&oauth_token_secret=s")
            .create_async()
            .await;

        let provider = HttpOAuth1aProvider::new([consumer(&server.url())]);
        let result = provider.request_temporary_token(1, "https://squash/cb").await;
        assert!(matches!(result, Err(OAuthError::MalformedResponse(_))));
    }

    #[tokio::test]
    async fn test_exchange_verifier_rejected() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/oauth/access-token")
            .with_status(401)
            .with_body("oauth_problem=token_rejected")
            .create_async()
            .await;

        let provider = HttpOAuth1aProvider::new([consumer(&server.url())]);
        let exchange = TemporaryTokenExchange::new("temp", "s", "https://x");
        let result = provider.exchange_verifier(1, &exchange, "bad").await;
        assert!(matches!(result, Err(OAuthError::Rejected(_))));
    }

    #[tokio::test]
    async fn test_unknown_server() {
        let provider = HttpOAuth1aProvider::new(Vec::new());
        let result = provider.request_temporary_token(9, "https://squash/cb").await;
        assert!(matches!(result, Err(OAuthError::UnknownServer(9))));
    }
}
