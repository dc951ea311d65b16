use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::sync::{Mutex, MutexGuard};

use tracing::info;

use crate::ValidationError;

/// Storage key the API credential lives under.
pub const SESSION_KEY: &str = "marketdesk.api_token";

/// Opaque API credential. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiToken(String);

impl ApiToken {
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into().trim().to_owned();
        if value.is_empty() {
            return Err(ValidationError::EmptyCredential);
        }
        Ok(Self(value))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl Debug for ApiToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiToken(<redacted>)")
    }
}

/// Process-lifetime session storage with an explicit login/logout lifecycle.
#[derive(Default)]
pub struct SessionStore {
    entries: Mutex<HashMap<&'static str, ApiToken>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates (or replaces) the session.
    pub fn login(&self, token: impl Into<String>) -> Result<ApiToken, ValidationError> {
        let token = ApiToken::new(token)?;
        self.entries().insert(SESSION_KEY, token.clone());
        info!("session created");
        Ok(token)
    }

    pub fn logout(&self) {
        if self.entries().remove(SESSION_KEY).is_some() {
            info!("session destroyed");
        }
    }

    pub fn current(&self) -> Option<ApiToken> {
        self.entries().get(SESSION_KEY).cloned()
    }

    pub fn is_authenticated(&self) -> bool {
        self.entries().contains_key(SESSION_KEY)
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<&'static str, ApiToken>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Debug for SessionStore {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_logout_lifecycle() {
        let store = SessionStore::new();
        assert!(store.current().is_none());

        store.login(" tok-123 ").expect("login");
        assert_eq!(store.current().map(|t| t.expose().to_owned()), Some(String::from("tok-123")));

        store.logout();
        store.logout();
        assert!(!store.is_authenticated());
    }

    #[test]
    fn empty_token_is_rejected() {
        let store = SessionStore::new();
        assert_eq!(store.login("   ").expect_err("must fail"), ValidationError::EmptyCredential);
        assert!(!store.is_authenticated());
    }

    #[test]
    fn debug_output_redacts_token() {
        let store = SessionStore::new();
        let token = store.login("very-secret").expect("login");
        assert!(!format!("{token:?}").contains("very-secret"));
        assert!(!format!("{store:?}").contains("very-secret"));
    }
}
