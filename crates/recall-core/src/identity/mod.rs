//! Current-user identity consumed by the sync engine

use std::sync::{PoisonError, RwLock};

/// Opaque source of the signed-in user's id.
pub trait Identity: Send + Sync {
    /// Id of the signed-in user, or `None` when nobody is signed in.
    fn current_user_id(&self) -> Option<String>;

    fn is_authenticated(&self) -> bool {
        self.current_user_id().is_some()
    }
}

/// Mutable identity updated by the host's sign-in/sign-out flow.
#[derive(Debug, Default)]
pub struct SessionIdentity {
    user_id: RwLock<Option<String>>,
}

impl SessionIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signed_in(user_id: impl Into<String>) -> Self {
        Self {
            user_id: RwLock::new(Some(user_id.into())),
        }
    }

    pub fn sign_in(&self, user_id: impl Into<String>) {
        let user_id = user_id.into();
        tracing::debug!("Session identity set to {user_id}");
        *self.user_id.write().unwrap_or_else(PoisonError::into_inner) = Some(user_id);
    }

    pub fn sign_out(&self) {
        *self.user_id.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl Identity for SessionIdentity {
    fn current_user_id(&self) -> Option<String> {
        self.user_id
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_in_and_out() {
        let identity = SessionIdentity::new();
        assert!(!identity.is_authenticated());

        identity.sign_in("u1");
        assert_eq!(identity.current_user_id().as_deref(), Some("u1"));

        identity.sign_out();
        assert_eq!(identity.current_user_id(), None);
    }

    #[test]
    fn test_signed_in_constructor() {
        assert!(SessionIdentity::signed_in("u1").is_authenticated());
    }
}
