//! Credentials of the current user.
//!
//! A [`CredentialsProvider`] is built for one request (or any interactive
//! execution) from the caller's [`UserContext`]. The request infrastructure
//! attaches the session's [`LiveCredentialSet`] with
//! [`restore_live_credentials`](CredentialsProvider::restore_live_credentials)
//! and detaches it with
//! [`clear_live_credentials`](CredentialsProvider::clear_live_credentials)
//! to write it back to the session.
//!
//! System-initiated work has no user and must use
//! [`CredentialStore`] directly.

use crate::context::UserContext;
use crate::credentials::{AuthenticationPolicy, CredentialStore, Credentials, ServerId};
use crate::error::{CacheError, ProviderError};
use crate::live::{CacheOutcome, LiveCredentialSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

pub struct CredentialsProvider {
    context: Option<UserContext>,
    store: Arc<CredentialStore>,
    live: Mutex<Option<Arc<LiveCredentialSet>>>,
}

impl CredentialsProvider {
    pub fn new(context: Option<UserContext>, store: Arc<CredentialStore>) -> Self {
        Self {
            context,
            store,
            live: Mutex::new(None),
        }
    }

    fn live_slot(&self) -> MutexGuard<'_, Option<Arc<LiveCredentialSet>>> {
        self.live.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn current_user(&self) -> Result<&UserContext, ProviderError> {
        self.context.as_ref().ok_or(ProviderError::NoUserContext)
    }

    pub fn current_username(&self) -> Result<&str, ProviderError> {
        Ok(self.current_user()?.username())
    }

    pub fn has_credentials(&self, server_id: ServerId) -> Result<bool, ProviderError> {
        Ok(self.get_live_credentials()?.has_credentials(server_id))
    }

    pub fn get_credentials(&self, server_id: ServerId) -> Result<Option<Credentials>, ProviderError> {
        Ok(self.get_live_credentials()?.get_credentials(server_id))
    }

    /// Reads the credentials to use for a server according to its policy:
    /// the application-level record for `AppLevel` servers, the user's live
    /// credentials otherwise.
    pub fn credentials_for(
        &self,
        server_id: ServerId,
        policy: AuthenticationPolicy,
    ) -> Result<Option<Credentials>, ProviderError> {
        match policy {
            AuthenticationPolicy::AppLevel => {
                self.current_user()?;
                let stored = self.store.unsecured_find_credentials(server_id)?;
                match stored {
                    Some(manageable) => Ok(manageable.build(&self.store, server_id)?),
                    None => Ok(None),
                }
            }
            AuthenticationPolicy::User => self.get_credentials(server_id),
        }
    }

    pub fn add_to_live_credentials(
        &self,
        server_id: ServerId,
        credentials: Credentials,
    ) -> Result<CacheOutcome, ProviderError> {
        Ok(self
            .get_live_credentials()?
            .cache_if_allowed(server_id, credentials))
    }

    pub fn remove_from_live_credentials(
        &self,
        server_id: ServerId,
    ) -> Result<Option<Credentials>, ProviderError> {
        Ok(self.get_live_credentials()?.uncache(server_id))
    }

    /// Attaches a previously stored live set to this provider.
    pub fn restore_live_credentials(
        &self,
        credentials: Arc<LiveCredentialSet>,
    ) -> Result<(), ProviderError> {
        let user = self.current_user()?;
        if credentials.user() != user.username() {
            return Err(CacheError::UserMismatch {
                expected: user.username().to_string(),
                actual: credentials.user().to_string(),
            }
            .into());
        }

        *self.live_slot() = Some(credentials);
        Ok(())
    }

    /// The attached live set, created empty on first use.
    pub fn get_live_credentials(&self) -> Result<Arc<LiveCredentialSet>, ProviderError> {
        let user = self.current_user()?;
        let mut slot = self.live_slot();
        let live = slot.get_or_insert_with(|| {
            debug!(user = %user.username(), "Creating live credentials");
            Arc::new(LiveCredentialSet::new(user.username()))
        });
        Ok(Arc::clone(live))
    }

    /// Detaches the live set, returning it so the caller can persist it in
    /// the session.
    pub fn clear_live_credentials(
        &self,
    ) -> Result<Option<Arc<LiveCredentialSet>>, ProviderError> {
        self.current_user()?;
        Ok(self.live_slot().take())
    }
}
