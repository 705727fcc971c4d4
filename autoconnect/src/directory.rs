//! External servers reachable by a user.
//!
//! The project model lives elsewhere; auto-connect only needs the distinct
//! servers bound to the projects a user can read.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use squash_credentials::{AuthenticationPolicy, ServerId, UserContext};
use std::collections::{BTreeMap, BTreeSet};

/// An external server (bug tracker, SCM, ...) as seen by auto-connect.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalServer {
    pub id: ServerId,
    pub name: String,
    /// Connector kind, used to pick a connector from the registry
    pub kind: String,
    pub url: String,
    pub policy: AuthenticationPolicy,
    /// Endpoint answering only to valid credentials ("current user")
    #[serde(default)]
    pub probe_path: Option<String>,
}

/// Lookup of the servers a user can reach.
pub trait ServerDirectory: Send + Sync {
    /// Distinct servers reachable from the projects `context` can read.
    fn servers_for(&self, context: &UserContext) -> Result<Vec<ExternalServer>>;
}

/// Fixed directory: servers plus the users allowed to see each of them.
#[derive(Default)]
pub struct StaticServerDirectory {
    servers: BTreeMap<ServerId, ExternalServer>,
    readers: BTreeMap<ServerId, BTreeSet<String>>,
}

impl StaticServerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `server` as reachable by each of `users`.
    pub fn add_server<I, S>(&mut self, server: ExternalServer, users: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let readers = self.readers.entry(server.id).or_default();
        readers.extend(users.into_iter().map(Into::into));
        self.servers.insert(server.id, server);
    }
}

impl ServerDirectory for StaticServerDirectory {
    fn servers_for(&self, context: &UserContext) -> Result<Vec<ExternalServer>> {
        Ok(self
            .servers
            .values()
            .filter(|server| {
                self.readers
                    .get(&server.id)
                    .is_some_and(|users| users.contains(context.username()))
            })
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server(id: ServerId) -> ExternalServer {
        ExternalServer {
            id,
            name: format!("tracker-{}", id),
            kind: "http-basic".to_string(),
            url: format!("https://tracker-{}.example.com", id),
            policy: AuthenticationPolicy::User,
            probe_path: None,
        }
    }

    #[test]
    fn test_servers_filtered_by_reader() {
        let mut directory = StaticServerDirectory::new();
        directory.add_server(server(2), ["alice", "bob"]);
        directory.add_server(server(1), ["alice"]);
        directory.add_server(server(3), ["bob"]);

        let ids: Vec<ServerId> = directory
            .servers_for(&UserContext::new("alice"))
            .unwrap()
            .iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec![1, 2]);

        assert!(directory
            .servers_for(&UserContext::new("carol"))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_probe_path_is_optional_in_config() {
        let server: ExternalServer = serde_json::from_str(
            r#"{"id":4,"name":"jira","kind":"http-basic","url":"https://jira","policy":"user"}"#,
        )
        .unwrap();
        assert_eq!(server.probe_path, None);

        let server: ExternalServer = serde_json::from_str(
            r#"{"id":4,"name":"jira","kind":"http-basic","url":"https://jira","policy":"user","probe_path":"/rest/api/2/myself"}"#,
        )
        .unwrap();
        assert_eq!(server.probe_path.as_deref(), Some("/rest/api/2/myself"));
    }
}
