use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use log::*;
use mkt_common::Secret;

/// How long before expiry a cached token is considered stale. Refreshing early avoids racing the provider clock
/// and ever presenting a just-expired token.
const REFRESH_MARGIN_SECONDS: i64 = 60;

#[derive(Debug, Clone)]
pub struct CachedToken {
    token: Secret<String>,
    expires_at: DateTime<Utc>,
}

/// A best-effort auth token cache shared between clones of a provider client.
///
/// Correctness never depends on the cache: an empty or stale cache simply costs one extra authentication round
/// trip. Tokens are held in a [`Secret`] so they never appear in logs.
#[derive(Debug, Clone, Default)]
pub struct TokenCache {
    inner: Arc<Mutex<Option<CachedToken>>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached token if it is still comfortably inside its validity window.
    pub fn current(&self) -> Option<Secret<String>> {
        let guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some(cached) if cached.expires_at - Utc::now() > Duration::seconds(REFRESH_MARGIN_SECONDS) => {
                Some(cached.token.clone())
            },
            Some(_) => {
                trace!("🔐️ Cached provider token is inside the refresh margin; a new one will be fetched");
                None
            },
            None => None,
        }
    }

    /// Stores a freshly issued token with its provider-reported lifetime.
    pub fn store(&self, token: Secret<String>, expires_in_seconds: i64) {
        self.store_until(token, Utc::now() + Duration::seconds(expires_in_seconds))
    }

    pub fn store_until(&self, token: Secret<String>, expires_at: DateTime<Utc>) {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        *guard = Some(CachedToken { token, expires_at });
    }

    pub fn clear(&self) {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        *guard = None;
    }
}
