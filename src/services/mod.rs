pub mod auth;
pub mod bootstrap_admin;
pub mod cache;
pub mod category;
pub mod last_post;
pub mod post;
pub mod slug;
pub mod topic;

use crate::error::{AppError, AppResult};

/// The authenticated caller, passed explicitly into every mutating operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: i32,
    pub username: String,
    pub is_admin: bool,
}

impl Actor {
    /// Authors may modify their own content; admins may modify anything.
    pub fn can_modify(&self, author_id: i32) -> bool {
        self.is_admin || self.user_id == author_id
    }

    pub fn require_admin(&self) -> AppResult<()> {
        if self.is_admin {
            Ok(())
        } else {
            Err(AppError::forbidden("Admin privileges required"))
        }
    }

    pub fn require_author_or_admin(&self, author_id: i32) -> AppResult<()> {
        if self.can_modify(author_id) {
            Ok(())
        } else {
            Err(AppError::forbidden("Only the author or an admin can do this"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor(user_id: i32, is_admin: bool) -> Actor {
        Actor {
            user_id,
            username: format!("user{user_id}"),
            is_admin,
        }
    }

    #[test]
    fn author_can_modify_own_content() {
        assert!(actor(3, false).can_modify(3));
        assert!(!actor(3, false).can_modify(4));
    }

    #[test]
    fn admin_can_modify_anything() {
        assert!(actor(1, true).can_modify(99));
        assert!(actor(1, true).require_admin().is_ok());
    }

    #[test]
    fn non_admin_rejected() {
        assert!(matches!(
            actor(2, false).require_admin(),
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            actor(2, false).require_author_or_admin(5),
            Err(AppError::Forbidden(_))
        ));
    }
}
