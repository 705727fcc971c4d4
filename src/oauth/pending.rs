//! Temporary tokens awaiting the user's authorization.
//!
//! Between the two calls of the token dance the temporary exchange is kept
//! here, keyed by session and server. Entries are single-use and expire; a
//! lost entry means the dance restarts.

use crate::credentials::ServerId;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Temporary credentials obtained in the first step of the dance.
#[derive(Clone, PartialEq, Eq)]
pub struct TemporaryTokenExchange {
    pub temp_token: String,
    pub temp_token_secret: String,
    /// Where the end user authorizes the temporary token.
    pub redirect_url: String,
    /// Supplied by the remote callback.
    pub verifier: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TemporaryTokenExchange {
    pub fn new(
        temp_token: impl Into<String>,
        temp_token_secret: impl Into<String>,
        redirect_url: impl Into<String>,
    ) -> Self {
        Self {
            temp_token: temp_token.into(),
            temp_token_secret: temp_token_secret.into(),
            redirect_url: redirect_url.into(),
            verifier: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_verifier(mut self, verifier: impl Into<String>) -> Self {
        self.verifier = Some(verifier.into());
        self
    }
}

impl std::fmt::Debug for TemporaryTokenExchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemporaryTokenExchange")
            .field("temp_token", &self.temp_token)
            .field("temp_token_secret", &"***")
            .field("redirect_url", &self.redirect_url)
            .field("verifier", &self.verifier.as_ref().map(|_| "***"))
            .field("created_at", &self.created_at)
            .finish()
    }
}

type ExchangeKey = (String, ServerId);

/// In-memory pending exchanges with automatic expiration.
#[derive(Clone)]
pub struct PendingExchanges {
    exchanges: Arc<Mutex<HashMap<ExchangeKey, TemporaryTokenExchange>>>,
    expiry_duration: Duration,
}

impl PendingExchanges {
    /// `expiry_seconds`: how long an exchange remains usable (default: 600)
    pub fn new(expiry_seconds: i64) -> Self {
        Self {
            exchanges: Arc::new(Mutex::new(HashMap::new())),
            expiry_duration: Duration::seconds(expiry_seconds),
        }
    }

    fn exchanges(&self) -> MutexGuard<'_, HashMap<ExchangeKey, TemporaryTokenExchange>> {
        self.exchanges
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Remembers `exchange`, replacing any previous one for the same
    /// session and server.
    pub fn insert(&self, session_id: &str, server_id: ServerId, exchange: TemporaryTokenExchange) {
        self.exchanges()
            .insert((session_id.to_string(), server_id), exchange);
    }

    /// Removes and returns the exchange if present and not expired.
    pub fn take(&self, session_id: &str, server_id: ServerId) -> Option<TemporaryTokenExchange> {
        let entry = self
            .exchanges()
            .remove(&(session_id.to_string(), server_id))?;

        if Utc::now() - entry.created_at > self.expiry_duration {
            return None;
        }

        Some(entry)
    }

    pub fn cleanup_expired(&self) {
        let now = Utc::now();
        let expiry = self.expiry_duration;
        self.exchanges()
            .retain(|_, entry| now - entry.created_at <= expiry);
    }

    pub fn count(&self) -> usize {
        self.exchanges().len()
    }
}

/// Background task to periodically drop expired exchanges
pub async fn run_pending_cleanup(pending: PendingExchanges, interval_seconds: u64) {
    let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(interval_seconds));

    loop {
        interval.tick().await;
        pending.cleanup_expired();
        tracing::debug!(
            remaining = pending.count(),
            "OAuth pending exchange cleanup complete"
        );
    }
}
