//! Signing-key resolution: token `kid` → cached key set → `SigningKey`.
//!
//! The cache is an explicitly owned object (`KeyCache`) handed to the resolver
//! by the caller; it starts empty, is populated lazily, and lives as long as
//! whoever holds the `Arc`.

use std::{
    sync::{
        Arc, PoisonError, RwLock,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use tokio::sync::Mutex;

use crate::services::auth::{
    error::AuthError,
    jwks::{KeySet, KeySetSource, SigningKey},
};

/// Process-wide key-set cache.
///
/// Holds an immutable snapshot and swaps it atomically, so readers see either
/// the previous set or the new one.
#[derive(Debug, Default)]
pub struct KeyCache {
    current: RwLock<Option<Arc<KeySet>>>,
}

impl KeyCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Option<Arc<KeySet>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn replace(&self, set: Arc<KeySet>) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(set);
    }
}

fn same_snapshot(a: &Option<Arc<KeySet>>, b: &Option<Arc<KeySet>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

/// Outcome of the most recent completed fetch.
#[derive(Debug, Default)]
struct LastFetch {
    at: Option<Instant>,
    failure: Option<AuthError>,
}

pub struct KeyResolver {
    source: Arc<dyn KeySetSource>,
    cache: Arc<KeyCache>,
    // Serializes refreshes.
    refresh: Mutex<LastFetch>,
    // Bumped (under `refresh`) every time a fetch completes, success or not.
    generation: AtomicU64,
    refresh_cooldown: Duration,
}

impl std::fmt::Debug for KeyResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyResolver")
            .field("source", &self.source.describe())
            .field("refresh_cooldown", &self.refresh_cooldown)
            .finish()
    }
}

impl KeyResolver {
    pub fn new(
        source: Arc<dyn KeySetSource>,
        cache: Arc<KeyCache>,
        refresh_cooldown: Duration,
    ) -> Self {
        Self {
            source,
            cache,
            refresh: Mutex::new(LastFetch::default()),
            generation: AtomicU64::new(0),
            refresh_cooldown,
        }
    }

    /// Resolve the key the token claims to be signed with.
    ///
    /// Reads only the unverified JOSE header. On a cache miss the key set is
    /// refreshed once (refresh-on-miss) before failing with `KeyNotFound`.
    /// Callers that queued behind a refresh take its outcome (keys or failure)
    /// instead of fetching again, so a request waits for at most one fetch.
    pub async fn resolve(&self, token: &str) -> Result<Arc<SigningKey>, AuthError> {
        let kid = token_kid(token)?;

        let seen = self.cache.snapshot();
        if let Some(key) = seen.as_ref().and_then(|set| set.get(&kid)) {
            return Ok(key);
        }

        let seen_generation = self.generation.load(Ordering::Acquire);
        let mut last = self.refresh.lock().await;

        // A fetch completed while we were waiting for the lock: share its outcome.
        if self.generation.load(Ordering::Acquire) != seen_generation {
            if let Some(err) = &last.failure {
                return Err(err.clone());
            }
            return self
                .cache
                .snapshot()
                .and_then(|set| set.get(&kid))
                .ok_or(AuthError::KeyNotFound { kid });
        }

        // The cache was replaced by another resolver sharing it.
        let current = self.cache.snapshot();
        if !same_snapshot(&current, &seen) {
            return current
                .and_then(|set| set.get(&kid))
                .ok_or(AuthError::KeyNotFound { kid });
        }

        if current.is_some()
            && let Some(at) = last.at
            && at.elapsed() < self.refresh_cooldown
        {
            tracing::debug!(kid = %kid, "unknown kid within refresh cooldown");
            return Err(AuthError::KeyNotFound { kid });
        }

        last.at = Some(Instant::now());
        let fetched = self.source.fetch().await;
        self.generation.fetch_add(1, Ordering::Release);

        let jwks = match fetched {
            Ok(jwks) => {
                last.failure = None;
                jwks
            }
            Err(err) => {
                tracing::warn!(error = %err, source = %self.source.describe(), "key set fetch failed");
                let failure = AuthError::KeySetUnavailable {
                    reason: err.to_string(),
                };
                last.failure = Some(failure.clone());
                return Err(failure);
            }
        };

        let set = Arc::new(KeySet::from_jwks(&jwks));
        tracing::info!(keys = set.len(), source = %self.source.describe(), "key set refreshed");
        self.cache.replace(set.clone());

        set.get(&kid).ok_or(AuthError::KeyNotFound { kid })
    }
}

fn token_kid(token: &str) -> Result<String, AuthError> {
    let header = jsonwebtoken::decode_header(token).map_err(|e| {
        tracing::debug!(error = ?e, "undecodable token header");
        AuthError::MalformedToken
    })?;

    header
        .kid
        .filter(|kid| !kid.is_empty())
        .ok_or(AuthError::MalformedToken)
}
