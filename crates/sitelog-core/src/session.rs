//! Session storage collaborator.

use std::collections::HashMap;

use parking_lot::Mutex;

/// Bearer token used by the HTTP transport.
pub const TOKEN_KEY: &str = "token";
/// Identity of the logged-in operator, stamped on every check-in.
pub const OPERATOR_ID_KEY: &str = "userId";

/// Key/value storage for the logged-in session.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// Drop everything that identifies the session. Called when the backend
/// answers 401.
pub fn clear_credentials(store: &dyn SessionStore) {
    store.remove(TOKEN_KEY);
    store.remove(OPERATOR_ID_KEY);
    tracing::info!("session credentials cleared");
}

/// Process-local [`SessionStore`].
#[derive(Debug, Default)]
pub struct MemorySession {
    entries: Mutex<HashMap<String, String>>,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, handy when seeding from configuration.
    pub fn with(self, key: &str, value: &str) -> Self {
        self.set(key, value);
        self
    }
}

impl SessionStore for MemorySession {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries.lock().insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.entries.lock().remove(key);
    }
}
