use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::token;

/// Live login sessions: token → display name.
///
/// One lock, shared for lookups and exclusive for create/remove. Token
/// generation happens inside the write lock, so two concurrent creates can
/// never both insert the same token.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, String>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session for `name` and return its fresh token.
    pub async fn create(&self, name: &str) -> Result<String, rand::Error> {
        let mut sessions = self.sessions.write().await;
        loop {
            let token = token::generate()?;
            if !sessions.contains_key(&token) {
                sessions.insert(token.clone(), name.to_string());
                return Ok(token);
            }
        }
    }

    /// Look up the display name attached to a token.
    pub async fn lookup(&self, token: &str) -> Option<String> {
        self.sessions.read().await.get(token).cloned()
    }

    /// Remove a session, returning its display name. Removing an unknown
    /// token is a no-op.
    pub async fn remove(&self, token: &str) -> Option<String> {
        self.sessions.write().await.remove(token)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
