//! In-memory bearer-token sessions.
//!
//! Login issues an opaque token, subsequent requests present it as
//! `Authorization: Bearer <token>`, logout revokes it.  Sessions live for
//! the server's lifetime only; there is no persistence across restarts.

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::HeaderMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use colis_core::auth::Identity;

#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<Mutex<HashMap<Uuid, Identity>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an identity and hand back its bearer token.
    pub async fn issue(&self, identity: Identity) -> Uuid {
        let token = Uuid::new_v4();
        self.sessions.lock().await.insert(token, identity);
        token
    }

    /// Resolve a token back to the identity it was issued for.
    pub async fn get(&self, token: Uuid) -> Option<Identity> {
        self.sessions.lock().await.get(&token).cloned()
    }

    /// Drop a session.  Returns `true` if the token was live.
    pub async fn revoke(&self, token: Uuid) -> bool {
        self.sessions.lock().await.remove(&token).is_some()
    }

    /// Resolve the identity for a request from its `Authorization` header.
    pub async fn identity_from_headers(&self, headers: &HeaderMap) -> Option<Identity> {
        let token = bearer_token(headers)?;
        self.get(token).await
    }
}

/// Extract and parse the bearer token, if any.
pub fn bearer_token(headers: &HeaderMap) -> Option<Uuid> {
    let auth = headers.get("authorization")?.to_str().ok()?;
    let token = auth.strip_prefix("Bearer ").unwrap_or(auth);
    Uuid::parse_str(token.trim()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use colis_store::Role;

    fn identity() -> Identity {
        Identity {
            user_id: 1,
            email: "c@colis.test".to_string(),
            role: Role::Client,
            agent_id: None,
        }
    }

    #[tokio::test]
    async fn issue_get_revoke_cycle() {
        let store = SessionStore::new();
        let token = store.issue(identity()).await;

        assert_eq!(store.get(token).await, Some(identity()));
        assert!(store.revoke(token).await);
        assert!(store.get(token).await.is_none());
        assert!(!store.revoke(token).await);
    }

    #[tokio::test]
    async fn header_resolution() {
        let store = SessionStore::new();
        let token = store.issue(identity()).await;

        let mut headers = HeaderMap::new();
        headers.insert("authorization", format!("Bearer {token}").parse().unwrap());
        assert_eq!(store.identity_from_headers(&headers).await, Some(identity()));

        headers.insert("authorization", "Bearer not-a-uuid".parse().unwrap());
        assert!(store.identity_from_headers(&headers).await.is_none());
    }
}
