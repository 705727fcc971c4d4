//! OAuth1a token dance for external servers.
//!
//! Two calls, with a user redirect in between:
//! 1. `request_temporary_token` obtains temporary credentials and the URL the
//!    user must visit; the exchange is kept pending for the session
//! 2. The remote server calls back with a verifier
//! 3. `authorize` trades the temporary token and verifier for a permanent
//!    access token and stores it encrypted
//!
//! A pending exchange that was lost (restart, expiry, already used) cannot
//! be recovered; the dance starts over.

mod exchange;
mod pending;
mod provider;

pub use exchange::HttpOAuth1aProvider;
pub use pending::{run_pending_cleanup, PendingExchanges, TemporaryTokenExchange};
pub use provider::{OAuth1aConsumerConfig, OAuth1aProvider};

use crate::config::OAuthConfig;
use crate::credentials::{CredentialStore, ServerId};
use crate::error::OAuthError;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Drives the OAuth1a dance and persists the resulting tokens.
pub struct OAuth1aTokenDance {
    provider: Arc<dyn OAuth1aProvider>,
    store: Arc<CredentialStore>,
    pending: PendingExchanges,
}

impl OAuth1aTokenDance {
    pub fn new(
        provider: Arc<dyn OAuth1aProvider>,
        store: Arc<CredentialStore>,
        pending: PendingExchanges,
    ) -> Self {
        Self {
            provider,
            store,
            pending,
        }
    }

    /// Dance against the OAuth1a servers registered in `config`.
    ///
    /// Spawns the expired-exchange cleanup loop, so it must be called from
    /// within a tokio runtime.
    pub fn from_config(config: &OAuthConfig, store: Arc<CredentialStore>) -> Self {
        let provider = HttpOAuth1aProvider::new(config.servers.iter().cloned());
        let pending = PendingExchanges::new(config.pending_expiry_seconds);

        tokio::spawn(run_pending_cleanup(
            pending.clone(),
            config.cleanup_interval_seconds.max(1),
        ));

        info!(
            servers = config.servers.len(),
            expiry_seconds = config.pending_expiry_seconds,
            "OAuth1a token dance configured"
        );

        Self::new(Arc::new(provider), store, pending)
    }

    pub fn pending(&self) -> &PendingExchanges {
        &self.pending
    }

    /// First step: the caller redirects the user to the returned
    /// `redirect_url`.
    pub async fn request_temporary_token(
        &self,
        session_id: &str,
        server_id: ServerId,
        callback_url: &str,
    ) -> Result<TemporaryTokenExchange, OAuthError> {
        debug!(server_id, "Requesting OAuth1a temporary token");

        let exchange = self
            .provider
            .request_temporary_token(server_id, callback_url)
            .await
            .map_err(|e| {
                warn!(server_id, error = %e, "Temporary token request failed");
                e
            })?;

        self.pending.insert(session_id, server_id, exchange.clone());

        info!(server_id, "OAuth1a temporary token issued, awaiting user authorization");
        Ok(exchange)
    }

    /// Second step: `exchange` carries the verifier from the remote
    /// callback. Nothing is stored unless the remote server accepts it.
    pub async fn authorize(
        &self,
        session_id: &str,
        server_id: ServerId,
        exchange: &TemporaryTokenExchange,
    ) -> Result<(), OAuthError> {
        let pending = self
            .pending
            .take(session_id, server_id)
            .ok_or(OAuthError::NoPendingExchange { server_id })?;

        if pending.temp_token != exchange.temp_token {
            warn!(server_id, "Temporary token does not match the pending exchange");
            return Err(OAuthError::TokenMismatch);
        }

        let verifier = exchange
            .verifier
            .as_deref()
            .filter(|v| !v.is_empty())
            .ok_or(OAuthError::MissingVerifier)?;

        let credentials = self
            .provider
            .exchange_verifier(server_id, &pending, verifier)
            .await
            .map_err(|e| {
                warn!(server_id, error = %e, "OAuth1a token exchange failed");
                e
            })?;

        self.store
            .store_credentials(server_id, &credentials.into())
            .map_err(|e| {
                warn!(server_id, error = %e, "Failed to store OAuth1a token");
                e
            })?;

        info!(server_id, "OAuth1a authorization completed");
        Ok(())
    }
}
