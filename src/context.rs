//! Explicit user identity passed through credential operations.
//!
//! There is no ambient "current user": request handling builds a
//! [`UserContext`] and hands it to whatever needs it. Background work takes
//! a clone of the context into its task (the snapshot), so it acts as the
//! same user after the originating request has completed.

use std::collections::BTreeSet;

/// Identity of the user on whose behalf an operation runs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserContext {
    username: String,
    authorities: BTreeSet<String>,
}

impl UserContext {
    /// Authority allowed to manage application-level credentials.
    pub const ROLE_ADMIN: &'static str = "ROLE_ADMIN";

    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            authorities: BTreeSet::new(),
        }
    }

    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.authorities.insert(authority.into());
        self
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn has_authority(&self, authority: &str) -> bool {
        self.authorities.contains(authority)
    }

    pub fn is_admin(&self) -> bool {
        self.has_authority(Self::ROLE_ADMIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorities() {
        let ctx = UserContext::new("alice");
        assert_eq!(ctx.username(), "alice");
        assert!(!ctx.is_admin());

        let admin = ctx.clone().with_authority(UserContext::ROLE_ADMIN);
        assert!(admin.is_admin());
        assert!(admin.has_authority("ROLE_ADMIN"));
        assert_ne!(ctx, admin);
    }
}
