//! Admin session cache.
//!
//! Sessions live only in memory: a token maps to the user it was issued for
//! and the instant it was issued. Expiry is checked lazily when a token is
//! read; expired entries are evicted on that read or by [`SessionCache::purge_expired`].

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use crate::crypto::generate_token;
use crate::models::SessionUser;

#[derive(Debug)]
struct Entry {
    user: SessionUser,
    issued_at: Instant,
}

#[derive(Debug)]
pub struct SessionCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, Entry>>,
}

impl SessionCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a new token for `user`.
    pub fn insert(&self, user: SessionUser) -> String {
        let token = generate_token();
        self.insert_at(token.clone(), user, Instant::now());
        token
    }

    fn insert_at(&self, token: String, user: SessionUser, issued_at: Instant) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(token, Entry { user, issued_at });
        }
    }

    pub fn get(&self, token: &str) -> Option<SessionUser> {
        self.get_at(token, Instant::now())
    }

    fn get_at(&self, token: &str, now: Instant) -> Option<SessionUser> {
        {
            let entries = self.entries.read().ok()?;
            let entry = entries.get(token)?;
            if now.saturating_duration_since(entry.issued_at) < self.ttl {
                return Some(entry.user.clone());
            }
        }

        // Expired: evict under the write lock, re-checking in case it was replaced
        if let Ok(mut entries) = self.entries.write()
            && let Some(entry) = entries.get(token)
            && now.saturating_duration_since(entry.issued_at) >= self.ttl
        {
            entries.remove(token);
        }
        None
    }

    pub fn remove(&self, token: &str) -> bool {
        self.entries
            .write()
            .map(|mut entries| entries.remove(token).is_some())
            .unwrap_or(false)
    }

    /// Drop every session belonging to a user, e.g. after the user is deleted.
    pub fn remove_user(&self, user_id: &str) -> usize {
        let Ok(mut entries) = self.entries.write() else {
            return 0;
        };
        let before = entries.len();
        entries.retain(|_, entry| entry.user.user_id != user_id);
        before - entries.len()
    }

    /// Remove all expired sessions. Returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Instant::now())
    }

    fn purge_expired_at(&self, now: Instant) -> usize {
        let Ok(mut entries) = self.entries.write() else {
            return 0;
        };
        let before = entries.len();
        entries.retain(|_, entry| now.saturating_duration_since(entry.issued_at) < self.ttl);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
