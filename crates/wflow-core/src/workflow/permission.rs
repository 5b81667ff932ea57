//! Ownership checks before a run starts or resumes.
//!
//! The engine asks an [`OwnerPolicy`] whether the run's owner may invoke the
//! workflow. The shipped policy is a plain allow-list; anything richer plugs
//! in behind the same trait.

use std::collections::HashSet;

use wflow_types::config::DEFAULT_OWNER;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum PermissionError {
    #[error("owner '{owner}' is not permitted to run workflow '{workflow}'")]
    NotPermitted { owner: String, workflow: String },
}

// ---------------------------------------------------------------------------
// OwnerPolicy
// ---------------------------------------------------------------------------

pub trait OwnerPolicy: Send + Sync {
    fn check(&self, owner: &str, workflow: &str) -> Result<(), PermissionError>;
}

/// Permits a fixed set of owners. An empty set permits everyone.
#[derive(Debug, Clone)]
pub struct AllowListPolicy {
    owners: HashSet<String>,
}

impl AllowListPolicy {
    pub fn new<I, S>(owners: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            owners: owners.into_iter().map(Into::into).collect(),
        }
    }

    /// Allows any owner.
    pub fn open() -> Self {
        Self {
            owners: HashSet::new(),
        }
    }
}

impl Default for AllowListPolicy {
    fn default() -> Self {
        Self::new([DEFAULT_OWNER])
    }
}

impl OwnerPolicy for AllowListPolicy {
    fn check(&self, owner: &str, workflow: &str) -> Result<(), PermissionError> {
        if self.owners.is_empty() || self.owners.contains(owner) {
            Ok(())
        } else {
            Err(PermissionError::NotPermitted {
                owner: owner.to_string(),
                workflow: workflow.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_allows_only_placeholder_owner() {
        let policy = AllowListPolicy::default();
        assert!(policy.check(DEFAULT_OWNER, "ap").is_ok());
        let err = policy.check("mallory@example.com", "ap").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("mallory@example.com"), "got: {msg}");
        assert!(msg.contains("'ap'"), "got: {msg}");
    }

    #[test]
    fn test_open_policy_allows_anyone() {
        assert!(AllowListPolicy::open().check("anyone", "ap").is_ok());
        assert!(AllowListPolicy::new(Vec::<String>::new()).check("anyone", "ap").is_ok());
    }
}
