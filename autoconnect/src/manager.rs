//! Auto-connect manager - Connects a freshly logged-in user to every
//! external server reachable from their projects.
//!
//! On login success the manager submits one background batch:
//! 1. Ask the server directory for the user's servers
//! 2. Skip servers configured with application-level credentials
//! 3. Check the login credentials against every other server
//! 4. Collect the accepted credentials in a fresh live set
//! 5. Merge that set into the session (existing entries win) and write it back
//!
//! The batch is best-effort: per-server failures are logged and skipped, and
//! nothing ever reaches the login response.

use crate::directory::{ExternalServer, ServerDirectory};
use crate::events::{LoginListener, LoginSuccessEvent};
use crate::executor::TaskExecutor;
use crate::registry::ConnectorRegistry;
use futures::FutureExt;
use squash_credentials::config::AutoConnectConfig;
use squash_credentials::{
    AuthenticationPolicy, CacheOutcome, Credentials, LiveCredentialSet, ServerId, SessionStore,
    UserContext,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What happened to each server of one batch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConnectReport {
    /// Servers a credentials check was attempted on, in order
    pub attempted: Vec<ServerId>,
    pub connected: Vec<ServerId>,
    /// Servers using application-level credentials
    pub skipped: Vec<ServerId>,
    pub failed: Vec<ServerId>,
}

/// Listens for logins and runs auto-connect batches.
///
/// # Responsibilities
/// - Skip silently while the executor or connector registry is missing
/// - Snapshot the user context into the background task
/// - Never let a failure reach the login
pub struct AutoConnectManager {
    directory: Arc<dyn ServerDirectory>,
    sessions: Arc<dyn SessionStore>,
    registry: Option<Arc<ConnectorRegistry>>,
    executor: Option<Arc<dyn TaskExecutor>>,
    enabled: bool,
}

impl AutoConnectManager {
    pub fn new(directory: Arc<dyn ServerDirectory>, sessions: Arc<dyn SessionStore>) -> Self {
        Self {
            directory,
            sessions,
            registry: None,
            executor: None,
            enabled: true,
        }
    }

    pub fn with_registry(mut self, registry: Arc<ConnectorRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_executor(mut self, executor: Arc<dyn TaskExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn with_config(mut self, config: &AutoConnectConfig) -> Self {
        self.enabled = config.enabled;
        self
    }

    /// Attaches the connector registry once it becomes available.
    pub fn set_registry(&mut self, registry: Arc<ConnectorRegistry>) {
        self.registry = Some(registry);
    }

    /// Attaches the executor once it becomes available.
    pub fn set_executor(&mut self, executor: Arc<dyn TaskExecutor>) {
        self.executor = Some(executor);
    }
}

impl LoginListener for AutoConnectManager {
    fn on_login_success(&self, event: &LoginSuccessEvent) {
        if !self.enabled {
            debug!("Auto-connect disabled");
            return;
        }

        let (Some(executor), Some(registry)) = (&self.executor, &self.registry) else {
            debug!("Auto-connect not ready (no executor or connector registry), skipping");
            return;
        };

        let directory = Arc::clone(&self.directory);
        let sessions = Arc::clone(&self.sessions);
        let registry = Arc::clone(registry);
        // Snapshot: the task acts as this user after the request is gone
        let event = event.clone();

        executor.submit(
            async move {
                let (fresh, report) = connect_all(
                    directory.as_ref(),
                    &registry,
                    &event.context,
                    &event.username,
                    &event.password,
                )
                .await;

                info!(
                    user = %event.context.username(),
                    attempted = report.attempted.len(),
                    connected = report.connected.len(),
                    skipped = report.skipped.len(),
                    failed = report.failed.len(),
                    "Auto-connect batch finished"
                );

                publish(sessions.as_ref(), &event.session_id, fresh);
            }
            .boxed(),
        );
    }
}

/// Checks the login credentials against every server reachable by
/// `context` and collects the accepted ones in a fresh live set.
///
/// Servers are attempted one after another in ascending id order. No
/// per-server failure stops the batch.
pub async fn connect_all(
    directory: &dyn ServerDirectory,
    registry: &ConnectorRegistry,
    context: &UserContext,
    username: &str,
    password: &str,
) -> (LiveCredentialSet, ConnectReport) {
    let live = LiveCredentialSet::new(context.username());
    let mut report = ConnectReport::default();

    let servers = match directory.servers_for(context) {
        Ok(servers) => servers,
        Err(e) => {
            warn!(user = %context.username(), error = %e, "Failed to list servers for auto-connect");
            return (live, report);
        }
    };

    let servers: BTreeMap<ServerId, ExternalServer> =
        servers.into_iter().map(|server| (server.id, server)).collect();
    let credentials = Credentials::basic(username, password);

    for server in servers.values() {
        if server.policy == AuthenticationPolicy::AppLevel {
            debug!(server_id = server.id, "Server uses application-level credentials, skipping");
            report.skipped.push(server.id);
            continue;
        }

        report.attempted.push(server.id);

        let connector = match registry.connector_for(server) {
            Ok(connector) => connector,
            Err(e) => {
                warn!(server_id = server.id, server = %server.name, error = %e, "No connector for server");
                report.failed.push(server.id);
                continue;
            }
        };

        match connector.check_credentials(&credentials).await {
            Ok(()) => {
                if live.cache_if_allowed(server.id, credentials.clone()) == CacheOutcome::Cached {
                    debug!(server_id = server.id, server = %server.name, "Auto-connected");
                    report.connected.push(server.id);
                }
            }
            Err(e) if e.is_authentication_rejection() => {
                info!(
                    server_id = server.id,
                    server = %server.name,
                    user = %context.username(),
                    "Login credentials rejected by server"
                );
                report.failed.push(server.id);
            }
            Err(e) => {
                warn!(
                    server_id = server.id,
                    server = %server.name,
                    error = %e,
                    "Auto-connect failed"
                );
                report.failed.push(server.id);
            }
        }
    }

    (live, report)
}

/// Merges `fresh` into the session's live credentials in one atomic step.
///
/// Entries already in the session win, including a set the request path
/// stored while the batch was running. Returns the set now stored.
pub fn publish(
    sessions: &dyn SessionStore,
    session_id: &str,
    fresh: LiveCredentialSet,
) -> Arc<LiveCredentialSet> {
    let merged = sessions.merge(session_id, fresh);
    debug!(session_id, entries = merged.len(), "Published auto-connect results");
    merged
}
