// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ownership enforcement for vault records.
//!
//! The only access rule the vault applies is "owner or admin". Anything
//! finer grained belongs to the surrounding gateway.

use crate::auth::{Requester, Role};

/// The requester is neither the owner nor an admin.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("user {user_id} cannot access {resource}")]
pub struct AccessDenied {
    pub user_id: String,
    pub resource: String,
}

/// Trait for resources that have an owner.
pub trait OwnedResource {
    /// Get the owner's user ID.
    fn owner_user_id(&self) -> &str;

    /// Human readable label used in permission errors.
    fn resource_label(&self) -> String {
        "resource".to_string()
    }
}

/// Trait for enforcing ownership on storage operations.
pub trait OwnershipEnforcer {
    /// Verify that the requester owns this resource or is an admin.
    ///
    /// # Errors
    /// Returns [`AccessDenied`] otherwise.
    fn verify_access(&self, requester: &Requester) -> Result<(), AccessDenied>;
}

impl<T: OwnedResource> OwnershipEnforcer for T {
    fn verify_access(&self, requester: &Requester) -> Result<(), AccessDenied> {
        if self.owner_user_id() == requester.user_id || requester.role.has_privilege(Role::Admin)
        {
            Ok(())
        } else {
            Err(AccessDenied {
                user_id: requester.user_id.clone(),
                resource: self.resource_label(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestResource {
        owner: String,
    }

    impl OwnedResource for TestResource {
        fn owner_user_id(&self) -> &str {
            &self.owner
        }
    }

    fn resource(owner: &str) -> TestResource {
        TestResource {
            owner: owner.to_string(),
        }
    }

    #[test]
    fn owner_passes() {
        let requester = Requester::new("user_123", Role::Client);
        assert!(resource("user_123").verify_access(&requester).is_ok());
    }

    #[test]
    fn non_owner_fails() {
        let requester = Requester::new("user_456", Role::Client);
        let result = resource("user_123").verify_access(&requester);
        match result {
            Err(AccessDenied { user_id, resource }) => {
                assert_eq!(user_id, "user_456");
                assert_eq!(resource, "resource");
            }
            Ok(()) => panic!("non-owner was granted access"),
        }
    }

    #[test]
    fn admin_passes_for_any_owner() {
        let admin = Requester::new("root", Role::Admin);
        assert!(resource("user_123").verify_access(&admin).is_ok());
    }
}
