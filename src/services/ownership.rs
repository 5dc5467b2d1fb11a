//! Post ownership check for mutating routes.
//!
//! Only reachable after required-mode authentication; the gate pipeline refuses
//! to build an ownership stage without one.

use std::sync::Arc;

use crate::repos::{PostOwnership, RepoError, ResourceStore};
use crate::services::auth::Identity;

/// How identity fields are compared against a post's owner fields.
///
/// `Either` accepts a match on email OR id (posts may carry only one of them).
/// `Both` requires both to match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchPolicy {
    #[default]
    Either,
    Both,
}

impl MatchPolicy {
    pub fn matches(&self, identity: &Identity, owner: &PostOwnership) -> bool {
        // An absent owner field never matches.
        let email = owner.owner_email.as_deref() == Some(identity.email.as_str());
        let id = owner.owner_id.as_deref() == Some(identity.id.as_str());

        match self {
            Self::Either => email || id,
            Self::Both => email && id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    Allowed,
    NotFound,
    Forbidden,
}

#[derive(Clone)]
pub struct OwnershipGuard {
    store: Arc<dyn ResourceStore>,
    policy: MatchPolicy,
}

impl std::fmt::Debug for OwnershipGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OwnershipGuard")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl OwnershipGuard {
    pub fn new(store: Arc<dyn ResourceStore>, policy: MatchPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> MatchPolicy {
        self.policy
    }

    /// Store failures are returned as `Err`, never folded into `NotFound`/`Forbidden`.
    pub async fn authorize(&self, identity: &Identity, post_id: i64) -> Result<Ownership, RepoError> {
        let Some(owner) = self.store.find_ownership(post_id).await? else {
            return Ok(Ownership::NotFound);
        };

        if self.policy.matches(identity, &owner) {
            Ok(Ownership::Allowed)
        } else {
            Ok(Ownership::Forbidden)
        }
    }
}
