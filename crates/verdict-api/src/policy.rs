//! The authorization policy: pure decision functions over actor role and
//! resource ownership. No storage access and no side effects; handlers pass
//! both the actor and the target explicitly.

use uuid::Uuid;

use verdict_types::models::{Actor, Role};

use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
}

/// Target of an access check. Ownership travels with the resource so the
/// decision never needs a lookup.
#[derive(Debug, Clone, Copy)]
pub enum Resource {
    Category,
    Genre,
    Title,
    Review { author_id: Uuid },
    Comment { author_id: Uuid },
    /// Arbitrary user records (the admin management surface). The
    /// self-service `/users/me` path is routed separately and never consults
    /// this resource.
    UserAccount,
}

/// `None` actor means anonymous. Rules are a disjunction: any match grants.
pub fn allowed(actor: Option<&Actor>, action: Action, resource: Resource) -> bool {
    match (resource, action) {
        // Catalog and review content is world-readable.
        (
            Resource::Category
            | Resource::Genre
            | Resource::Title
            | Resource::Review { .. }
            | Resource::Comment { .. },
            Action::Read,
        ) => true,

        // Catalog writes are admin-only.
        (Resource::Category | Resource::Genre | Resource::Title, _) => {
            matches!(actor, Some(a) if a.role == Role::Admin)
        }

        // Any authenticated actor may publish reviews and comments.
        (Resource::Review { .. } | Resource::Comment { .. }, Action::Create) => actor.is_some(),

        // Mutating existing reviews/comments: the author, or staff.
        (
            Resource::Review { author_id } | Resource::Comment { author_id },
            Action::Update | Action::Delete,
        ) => match actor {
            Some(a) => a.id == author_id || matches!(a.role, Role::Moderator | Role::Admin),
            None => false,
        },

        // User management is admin-only, reads included.
        (Resource::UserAccount, _) => matches!(actor, Some(a) if a.role == Role::Admin),
    }
}

/// Handler-side guard: authenticated-but-denied surfaces as 403. Anonymous
/// callers never reach this; the auth middleware answers 401 first.
pub fn authorize(actor: &Actor, action: Action, resource: Resource) -> Result<(), ApiError> {
    if allowed(Some(actor), action, resource) {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor(role: Role) -> Actor {
        Actor {
            id: Uuid::new_v4(),
            username: format!("{}-user", role.as_str()),
            role,
        }
    }

    #[test]
    fn anonymous_reads_everything() {
        let review = Resource::Review {
            author_id: Uuid::new_v4(),
        };
        for resource in [
            Resource::Category,
            Resource::Genre,
            Resource::Title,
            review,
        ] {
            assert!(allowed(None, Action::Read, resource));
        }
    }

    #[test]
    fn anonymous_writes_nothing() {
        let review = Resource::Review {
            author_id: Uuid::new_v4(),
        };
        for action in [Action::Create, Action::Update, Action::Delete] {
            assert!(!allowed(None, action, Resource::Title));
            assert!(!allowed(None, action, review));
        }
        assert!(!allowed(None, Action::Read, Resource::UserAccount));
    }

    #[test]
    fn catalog_writes_are_admin_only() {
        for resource in [Resource::Category, Resource::Genre, Resource::Title] {
            assert!(allowed(Some(&actor(Role::Admin)), Action::Create, resource));
            assert!(!allowed(Some(&actor(Role::Moderator)), Action::Create, resource));
            assert!(!allowed(Some(&actor(Role::User)), Action::Delete, resource));
        }
    }

    #[test]
    fn authors_mutate_their_own_reviews() {
        let author = actor(Role::User);
        let own = Resource::Review {
            author_id: author.id,
        };
        assert!(allowed(Some(&author), Action::Update, own));
        assert!(allowed(Some(&author), Action::Delete, own));

        let stranger = actor(Role::User);
        assert!(!allowed(Some(&stranger), Action::Update, own));
    }

    #[test]
    fn staff_mutate_any_review() {
        let own = Resource::Review {
            author_id: Uuid::new_v4(),
        };
        assert!(allowed(Some(&actor(Role::Moderator)), Action::Update, own));
        assert!(allowed(Some(&actor(Role::Admin)), Action::Delete, own));
    }

    #[test]
    fn any_authenticated_actor_creates_reviews() {
        let user = actor(Role::User);
        let resource = Resource::Review {
            author_id: user.id,
        };
        assert!(allowed(Some(&user), Action::Create, resource));
    }

    #[test]
    fn user_management_requires_admin() {
        assert!(allowed(Some(&actor(Role::Admin)), Action::Read, Resource::UserAccount));
        assert!(!allowed(Some(&actor(Role::Moderator)), Action::Read, Resource::UserAccount));
        assert!(!allowed(Some(&actor(Role::User)), Action::Update, Resource::UserAccount));
    }
}
