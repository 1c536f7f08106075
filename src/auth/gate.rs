use uuid::Uuid;

use super::{AuthError, AuthUser, IdentityClaim};
use crate::entities::user;

/// Anything that names a user.
pub trait Subject {
    fn subject(&self) -> Uuid;
}

impl Subject for Uuid {
    fn subject(&self) -> Uuid {
        *self
    }
}

impl Subject for IdentityClaim {
    fn subject(&self) -> Uuid {
        self.user_id
    }
}

impl Subject for AuthUser {
    fn subject(&self) -> Uuid {
        self.user_id
    }
}

impl Subject for user::Model {
    fn subject(&self) -> Uuid {
        self.id
    }
}

/// Identity and membership checks applied before any mutation.
pub struct AuthorizationGate;

impl AuthorizationGate {
    /// Both sides must name the same user.
    pub fn require_identity_match<A, B>(a: &A, b: &B) -> Result<(), AuthError>
    where
        A: Subject + ?Sized,
        B: Subject + ?Sized,
    {
        if a.subject() == b.subject() {
            Ok(())
        } else {
            Err(AuthError::IdentityMismatch)
        }
    }

    /// The user must list `store_id` among the stores it works at.
    pub fn require_store_membership(user: &user::Model, store_id: Uuid) -> Result<(), AuthError> {
        if user.works_at(&store_id) {
            Ok(())
        } else {
            Err(AuthError::NoStoreAccess)
        }
    }
}
