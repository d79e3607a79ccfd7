//! Authorization gate.

use blockrun_types::{AppScope, Identity, User};

use crate::error::RunError;

/// Outcome of comparing a caller against an app owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Access {
    read_only: bool,
}

impl Access {
    /// Read-only unless the caller is present and is the owner.
    pub fn for_caller(caller: Option<&Identity>, owner: &User) -> Self {
        let read_only = caller.is_none_or(|identity| identity.provider_id != owner.provider_id);
        Self { read_only }
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Lookup predicate for the app record.
    pub fn lookup_scope(&self) -> AppScope {
        if self.read_only {
            AppScope::Visible
        } else {
            AppScope::Owner
        }
    }

    /// Run creation is reserved to the owner, whatever the app's visibility.
    pub fn require_owner(&self) -> Result<(), RunError> {
        if self.read_only {
            Err(RunError::Unauthorized)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> User {
        User {
            id: 1,
            username: "alice".into(),
            provider_id: "gh-1".into(),
        }
    }

    #[test]
    fn owner_has_full_access() {
        let access = Access::for_caller(Some(&Identity::new("gh-1")), &owner());
        assert!(!access.is_read_only());
        assert_eq!(access.lookup_scope(), AppScope::Owner);
        assert!(access.require_owner().is_ok());
    }

    #[test]
    fn anonymous_and_strangers_are_read_only() {
        for caller in [None, Some(Identity::new("gh-2"))] {
            let access = Access::for_caller(caller.as_ref(), &owner());
            assert!(access.is_read_only());
            assert_eq!(access.lookup_scope(), AppScope::Visible);
            assert!(matches!(access.require_owner(), Err(RunError::Unauthorized)));
        }
    }
}
