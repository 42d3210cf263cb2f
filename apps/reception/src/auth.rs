//! # Session
//!
//! Who is signed in at the reception desk. Mutations read the current user
//! once per call; no user means no write.

use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};

/// Roles allowed to confirm the business day closed.
pub const MANAGEMENT_ROLES: &[&str] = &["owner", "admin", "manager"];

/// The signed-in operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub uid: String,
    /// Name written into ledger records (`user`, `openedBy`, `confirmedBy`).
    pub user_name: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl User {
    pub fn new(uid: impl Into<String>, user_name: impl Into<String>) -> Self {
        User {
            uid: uid.into(),
            user_name: user_name.into(),
            roles: Vec::new(),
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r.eq_ignore_ascii_case(role))
    }

    pub fn is_management(&self) -> bool {
        MANAGEMENT_ROLES.iter().any(|role| self.has_role(role))
    }
}

/// Current sign-in state, shared by every service.
#[derive(Debug, Default)]
pub struct Session {
    user: RwLock<Option<User>>,
}

impl Session {
    /// A session nobody is signed into.
    pub fn anonymous() -> Self {
        Session::default()
    }

    pub fn signed_in(user: User) -> Self {
        Session {
            user: RwLock::new(Some(user)),
        }
    }

    pub fn current(&self) -> Option<User> {
        self.user
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn sign_in(&self, user: User) {
        *self.user.write().unwrap_or_else(PoisonError::into_inner) = Some(user);
    }

    pub fn sign_out(&self) {
        *self.user.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_sign_in_and_out() {
        let session = Session::anonymous();
        assert!(session.current().is_none());

        session.sign_in(User::new("u1", "anna"));
        assert_eq!(session.current().map(|u| u.user_name), Some("anna".to_string()));

        session.sign_out();
        assert!(session.current().is_none());
    }

    #[test]
    fn test_management_roles() {
        assert!(User::new("u1", "anna").with_role("Manager").is_management());
        assert!(!User::new("u2", "marco").with_role("staff").is_management());
        assert!(!User::new("u3", "luca").is_management());
    }
}
