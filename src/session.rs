//! Per-caller session state.
//!
//! The platform identifies end users by an integer uid. The first request
//! carrying a uid creates a [`Session`]; later requests with the same uid
//! observe the same instance (identity, not value, equality), so state
//! written during one request is visible to the next.
//!
//! Sessions idle longer than the configured TTL are swept lazily on access;
//! a TTL of `None` keeps every session for the process lifetime.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::token::Token;

/// State held for one end user.
#[derive(Debug)]
pub struct Session {
    uid: u64,
    created_at: DateTime<Utc>,
    user_token: RwLock<String>,
}

impl Session {
    fn new(uid: u64) -> Self {
        Self {
            uid,
            created_at: Utc::now(),
            user_token: RwLock::new(String::new()),
        }
    }

    /// Platform-assigned id of the user this session belongs to.
    pub fn uid(&self) -> u64 {
        self.uid
    }

    /// When this session was first created.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// The user's relayed credential; empty until the platform supplies one.
    pub async fn user_token(&self) -> String {
        self.user_token.read().await.clone()
    }

    /// Replaces the stored credential.
    pub async fn set_user_token(&self, token: impl Into<String>) {
        *self.user_token.write().await = token.into();
    }

    /// The stored credential wrapped as an encrypted [`Token`], ready for
    /// billed calls on this user's behalf. `None` while no credential has
    /// been relayed yet.
    pub async fn relayed_token(&self) -> Option<Token> {
        let token = self.user_token.read().await;
        if token.is_empty() {
            None
        } else {
            Some(Token::encrypted(token.clone()))
        }
    }
}

struct SessionEntry {
    session: Arc<Session>,
    last_seen: Instant,
}

/// Concurrent map of active sessions keyed by uid.
pub struct SessionStore {
    ttl: Option<Duration>,
    inner: RwLock<HashMap<u64, SessionEntry>>,
}

impl SessionStore {
    /// Creates a store whose entries expire after `ttl` of inactivity,
    /// or never when `ttl` is `None`.
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            ttl,
            inner: RwLock::new(HashMap::new()),
        }
    }

    /// Fetches the session for `uid`, creating it on first contact.
    /// Accessing a session refreshes its idle clock.
    pub async fn get_or_create(&self, uid: u64) -> Arc<Session> {
        let mut map = self.inner.write().await;
        sweep(&mut map, self.ttl);
        let entry = map.entry(uid).or_insert_with(|| SessionEntry {
            session: Arc::new(Session::new(uid)),
            last_seen: Instant::now(),
        });
        entry.last_seen = Instant::now();
        Arc::clone(&entry.session)
    }

    /// Fetches the session for `uid` if one is live, without creating it.
    pub async fn get(&self, uid: u64) -> Option<Arc<Session>> {
        let mut map = self.inner.write().await;
        sweep(&mut map, self.ttl);
        map.get_mut(&uid).map(|entry| {
            entry.last_seen = Instant::now();
            Arc::clone(&entry.session)
        })
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        let mut map = self.inner.write().await;
        sweep(&mut map, self.ttl);
        map.len()
    }

    /// Whether no sessions are live.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn sweep(map: &mut HashMap<u64, SessionEntry>, ttl: Option<Duration>) {
    if let Some(ttl) = ttl {
        let now = Instant::now();
        map.retain(|_, entry| now.duration_since(entry.last_seen) < ttl);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_uid_returns_the_same_instance() {
        let store = SessionStore::new(None);
        let first = store.get_or_create(7).await;
        let second = store.get_or_create(7).await;
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.len().await, 1);

        let other = store.get_or_create(8).await;
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn new_sessions_start_with_an_empty_token() {
        let store = SessionStore::new(None);
        let session = store.get_or_create(1).await;
        assert_eq!(session.user_token().await, "");
        assert!(session.relayed_token().await.is_none());

        session.set_user_token("relayed-credential").await;
        assert_eq!(session.user_token().await, "relayed-credential");
        let token = session.relayed_token().await.unwrap();
        assert_eq!(token.payload(), "relayed-credential");
    }

    #[tokio::test]
    async fn token_written_in_one_request_is_visible_in_the_next() {
        let store = SessionStore::new(None);
        store.get_or_create(3).await.set_user_token("abc").await;
        let again = store.get_or_create(3).await;
        assert_eq!(again.user_token().await, "abc");
    }

    #[tokio::test]
    async fn idle_sessions_expire_after_the_ttl() {
        let store = SessionStore::new(Some(Duration::from_millis(20)));
        store.get_or_create(1).await;
        assert_eq!(store.len().await, 1);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(store.get(1).await.is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn accessing_a_session_refreshes_its_idle_clock() {
        let store = SessionStore::new(Some(Duration::from_millis(80)));
        let first = store.get_or_create(1).await;

        // Keep touching the session at intervals shorter than the TTL.
        for _ in 0..3 {
            tokio::time::sleep(Duration::from_millis(40)).await;
            assert!(store.get(1).await.is_some());
        }

        let still = store.get_or_create(1).await;
        assert!(Arc::ptr_eq(&first, &still));
    }

    #[tokio::test]
    async fn disabled_ttl_never_evicts() {
        let store = SessionStore::new(None);
        store.get_or_create(1).await;
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(store.get(1).await.is_some());
    }
}
