//! Encrypted credential storage using SQLite.
//!
//! Stores the application-level credentials of each external server. Every
//! payload is encrypted with the administrator secret; without a secret the
//! store refuses to write.

use super::{encryption, ManageableCredentials, ServerId};
use crate::context::UserContext;
use crate::error::StoreError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Encrypted credential storage backed by SQLite.
///
/// # Schema
/// ```sql
/// CREATE TABLE stored_credentials (
///     server_id INTEGER PRIMARY KEY,
///     payload TEXT NOT NULL,          -- Encrypted JSON of ManageableCredentials
///     nonce TEXT NOT NULL,            -- Nonce for payload
///     key_fingerprint TEXT NOT NULL,  -- Fingerprint of the key used
///     created_at TEXT NOT NULL,       -- ISO 8601 timestamp
///     updated_at TEXT NOT NULL        -- ISO 8601 timestamp
/// );
/// ```
///
/// # Thread Safety
/// - Connection is wrapped in Mutex for safe concurrent access
/// - Concurrent writes to the same server id are last-write-wins
pub struct CredentialStore {
    conn: Mutex<Connection>,
    encryption_key: Option<Vec<u8>>,
}

struct StoredRecord {
    payload: String,
    nonce: String,
    key_fingerprint: String,
}

impl CredentialStore {
    /// Creates or opens a credential store.
    ///
    /// `secret` is the base64 encoded 32-byte administrator key. `None`
    /// opens the store read-only in practice: lookups of existing records
    /// and writes both fail until a secret is configured.
    pub fn new<P: AsRef<Path>>(db_path: P, secret: Option<&str>) -> Result<Self, StoreError> {
        let conn = Connection::open(db_path)?;
        Self::init(conn, secret)
    }

    /// Store backed by a private in-memory database.
    pub fn in_memory(secret: Option<&str>) -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?, secret)
    }

    fn init(conn: Connection, secret: Option<&str>) -> Result<Self, StoreError> {
        let encryption_key = secret.map(encryption::validate_key).transpose()?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS stored_credentials (
                server_id INTEGER PRIMARY KEY,
                payload TEXT NOT NULL,
                nonce TEXT NOT NULL,
                key_fingerprint TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
            [],
        )?;

        if encryption_key.is_none() {
            warn!("No credentials encryption key configured; storing credentials is disabled");
        }

        Ok(Self {
            conn: Mutex::new(conn),
            encryption_key,
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_secret_configured(&self) -> bool {
        self.encryption_key.is_some()
    }

    /// Stores credentials for a server, replacing any previous record.
    pub fn store_credentials(
        &self,
        server_id: ServerId,
        credentials: &ManageableCredentials,
    ) -> Result<(), StoreError> {
        let key = self
            .encryption_key
            .as_deref()
            .ok_or(StoreError::MissingEncryptionKey)?;

        if !credentials.allows_app_level_storage() {
            return Err(StoreError::StorageNotAllowed {
                kind: credentials.kind(),
            });
        }

        let plaintext = serde_json::to_string(credentials)?;
        let (payload, nonce) = encryption::encrypt(&plaintext, key)?;
        let fingerprint = encryption::key_fingerprint(key);
        let now = Utc::now().to_rfc3339();

        self.conn().execute(
            r#"
            INSERT INTO stored_credentials (
                server_id, payload, nonce, key_fingerprint, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(server_id) DO UPDATE SET
                payload = excluded.payload,
                nonce = excluded.nonce,
                key_fingerprint = excluded.key_fingerprint,
                updated_at = excluded.updated_at
            "#,
            params![server_id, payload, nonce, fingerprint, now, now],
        )?;

        info!(server_id, kind = credentials.kind(), "Stored credentials");
        Ok(())
    }

    /// Looks up the credentials of a server on behalf of `context`.
    ///
    /// Only administrators may read application-level credentials.
    pub fn find_credentials(
        &self,
        context: &UserContext,
        server_id: ServerId,
    ) -> Result<Option<ManageableCredentials>, StoreError> {
        if !context.is_admin() {
            warn!(user = %context.username(), server_id, "Denied credentials lookup");
            return Err(StoreError::AccessDenied {
                user: context.username().to_string(),
                server_id,
            });
        }
        self.unsecured_find_credentials(server_id)
    }

    /// Same lookup as [`find_credentials`](Self::find_credentials) without
    /// the authorization check. Reserved for system callers.
    pub fn unsecured_find_credentials(
        &self,
        server_id: ServerId,
    ) -> Result<Option<ManageableCredentials>, StoreError> {
        let record = self
            .conn()
            .query_row(
                "SELECT payload, nonce, key_fingerprint FROM stored_credentials WHERE server_id = ?1",
                params![server_id],
                |row| {
                    Ok(StoredRecord {
                        payload: row.get(0)?,
                        nonce: row.get(1)?,
                        key_fingerprint: row.get(2)?,
                    })
                },
            )
            .optional()?;

        let Some(record) = record else {
            debug!(server_id, "No stored credentials");
            return Ok(None);
        };

        let key = self
            .encryption_key
            .as_deref()
            .ok_or(StoreError::MissingEncryptionKey)?;

        if record.key_fingerprint != encryption::key_fingerprint(key) {
            warn!(server_id, "Stored credentials were encrypted with another key");
            return Err(StoreError::KeyMismatch { server_id });
        }

        let plaintext = encryption::decrypt(&record.payload, &record.nonce, key)
            .ok_or(StoreError::KeyMismatch { server_id })?;

        Ok(Some(serde_json::from_str(&plaintext)?))
    }

    /// Deletes the credentials of a server.
    ///
    /// Returns `true` when a record existed.
    pub fn delete_credentials(&self, server_id: ServerId) -> Result<bool, StoreError> {
        let rows_affected = self.conn().execute(
            "DELETE FROM stored_credentials WHERE server_id = ?1",
            params![server_id],
        )?;

        if rows_affected > 0 {
            info!(server_id, "Deleted credentials");
        }
        Ok(rows_affected > 0)
    }

    /// Lists every server id with stored credentials, ascending.
    pub fn list_server_ids(&self) -> Result<Vec<ServerId>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT server_id FROM stored_credentials ORDER BY server_id")?;

        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<ServerId>, _>>()?;

        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

    fn key(byte: u8) -> String {
        BASE64.encode([byte; 32])
    }

    fn create_test_store() -> CredentialStore {
        CredentialStore::in_memory(Some(&key(0))).expect("Failed to create test store")
    }

    fn basic(username: &str, password: &str) -> ManageableCredentials {
        ManageableCredentials::Basic {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    #[test]
    fn test_store_and_find() {
        let store = create_test_store();
        assert!(store.is_secret_configured());

        store.store_credentials(1, &basic("jira", "pw")).unwrap();

        let found = store.unsecured_find_credentials(1).unwrap();
        assert_eq!(found, Some(basic("jira", "pw")));
    }

    #[test]
    fn test_find_nonexistent() {
        let store = create_test_store();
        assert_eq!(store.unsecured_find_credentials(42).unwrap(), None);
    }

    #[test]
    fn test_store_twice_is_upsert() {
        let store = create_test_store();
        let creds = basic("jira", "pw");

        store.store_credentials(1, &creds).unwrap();
        store.store_credentials(1, &creds).unwrap();

        assert_eq!(store.unsecured_find_credentials(1).unwrap(), Some(creds));
        assert_eq!(store.list_server_ids().unwrap(), vec![1]);

        store.store_credentials(1, &basic("jira", "rotated")).unwrap();
        assert_eq!(
            store.unsecured_find_credentials(1).unwrap(),
            Some(basic("jira", "rotated"))
        );
    }

    #[test]
    fn test_missing_secret_refuses_writes() {
        let store = CredentialStore::in_memory(None).unwrap();
        assert!(!store.is_secret_configured());

        let result = store.store_credentials(1, &basic("u", "p"));
        assert!(matches!(result, Err(StoreError::MissingEncryptionKey)));

        // Nothing was written
        assert!(store.list_server_ids().unwrap().is_empty());
        assert_eq!(store.unsecured_find_credentials(1).unwrap(), None);
    }

    #[test]
    fn test_app_level_marker_is_not_persisted() {
        let store = create_test_store();
        let result = store.store_credentials(1, &ManageableCredentials::AppLevel);
        assert!(matches!(result, Err(StoreError::StorageNotAllowed { .. })));
    }

    #[test]
    fn test_rotated_key_is_reported_not_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.db");

        {
            let store = CredentialStore::new(&path, Some(&key(1))).unwrap();
            store.store_credentials(5, &basic("u", "p")).unwrap();
        }

        let rotated = CredentialStore::new(&path, Some(&key(2))).unwrap();
        let result = rotated.unsecured_find_credentials(5);
        assert!(matches!(result, Err(StoreError::KeyMismatch { server_id: 5 })));

        // Unknown ids are still plain absence
        assert_eq!(rotated.unsecured_find_credentials(6).unwrap(), None);

        // Re-storing under the new key repairs the record
        rotated.store_credentials(5, &basic("u", "p2")).unwrap();
        assert_eq!(
            rotated.unsecured_find_credentials(5).unwrap(),
            Some(basic("u", "p2"))
        );
    }

    #[test]
    fn test_existing_record_without_secret() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.db");

        CredentialStore::new(&path, Some(&key(1)))
            .unwrap()
            .store_credentials(5, &basic("u", "p"))
            .unwrap();

        let keyless = CredentialStore::new(&path, None).unwrap();
        assert!(matches!(
            keyless.unsecured_find_credentials(5),
            Err(StoreError::MissingEncryptionKey)
        ));
        assert!(keyless.delete_credentials(5).unwrap());
    }

    #[test]
    fn test_find_requires_admin() {
        let store = create_test_store();
        store.store_credentials(1, &basic("u", "p")).unwrap();

        let user = UserContext::new("alice");
        assert!(matches!(
            store.find_credentials(&user, 1),
            Err(StoreError::AccessDenied { .. })
        ));

        let admin = UserContext::new("root").with_authority(UserContext::ROLE_ADMIN);
        assert_eq!(store.find_credentials(&admin, 1).unwrap(), Some(basic("u", "p")));
    }

    #[test]
    fn test_delete() {
        let store = create_test_store();
        store.store_credentials(1, &basic("u", "p")).unwrap();

        assert!(store.delete_credentials(1).unwrap());
        assert_eq!(store.unsecured_find_credentials(1).unwrap(), None);
        assert!(!store.delete_credentials(1).unwrap());
    }

    #[test]
    fn test_payload_is_not_cleartext() {
        let store = create_test_store();
        store.store_credentials(1, &basic("u", "very-secret")).unwrap();

        let payload: String = store
            .conn()
            .query_row(
                "SELECT payload FROM stored_credentials WHERE server_id = 1",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert!(!payload.contains("very-secret"));
    }

    #[test]
    fn test_invalid_encryption_key() {
        assert!(matches!(
            CredentialStore::in_memory(Some("short")),
            Err(StoreError::InvalidKey(_))
        ));
    }
}
