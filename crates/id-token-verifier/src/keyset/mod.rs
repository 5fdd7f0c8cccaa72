//! Signing key cache.
//!
//! Holds the provider's current key set for the lifetime of the owning verifier:
//! - Lazy population on first use, reloaded after the TTL
//! - Refresh on unknown `kid`, rate limited and coalesced across callers
//! - Every remote fetch bounded by a timeout
//!
//! Cold-cache loads go through moka's `try_get_with`, which already runs a single
//! init future for concurrent callers. Forced refreshes take `refresh_lock` and
//! compare generations, so callers queued behind a refresh reuse its result.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use jsonwebtoken::jwk::{Jwk, JwkSet};
use moka::future::Cache;
use tokio::sync::Mutex;

use crate::config::Config;
use crate::error::{FetchError, FetchResult, VerifyError, VerifyResult};

/// Single cache slot; one cache serves one key endpoint.
const CACHE_KEY: &str = "jwks";

/// Somewhere a key set can be fetched from.
#[async_trait]
pub trait KeySource: Send + Sync {
    /// Fetch the current key set.
    async fn fetch(&self) -> FetchResult<JwkSet>;
}

/// An immutable snapshot of the provider's signing keys.
///
/// Keys without a `kid` are kept apart: they can never match a token that names
/// a key, only a kid-less token against a single-key set.
#[derive(Debug)]
pub struct KeySet {
    keys: HashMap<String, Jwk>,
    unnamed: Vec<Jwk>,
    generation: u64,
}

impl KeySet {
    fn from_jwks(jwks: JwkSet, generation: u64) -> FetchResult<Self> {
        let mut keys = HashMap::with_capacity(jwks.keys.len());
        let mut unnamed = Vec::new();
        for jwk in jwks.keys {
            match jwk.common.key_id.clone() {
                Some(kid) => {
                    keys.insert(kid, jwk);
                }
                None => unnamed.push(jwk),
            }
        }

        let set = Self { keys, unnamed, generation };
        if set.is_empty() {
            return Err(FetchError::EmptyKeySet);
        }
        if !set.unnamed.is_empty() && set.len() > 1 {
            tracing::warn!(unnamed = set.unnamed.len(), "Key set has JWKs without kid");
        }
        Ok(set)
    }

    /// Key for a token header. Without a `kid` only a single-key set is unambiguous.
    #[must_use]
    pub fn select(&self, kid: Option<&str>) -> Option<&Jwk> {
        match kid {
            Some(kid) => self.keys.get(kid),
            None if self.len() == 1 => self.keys.values().next().or_else(|| self.unnamed.first()),
            None => None,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len() + self.unnamed.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Monotonic fetch counter; a higher generation is a newer set.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }
}

/// Process-wide cache of the provider's key set.
pub struct KeySetCache {
    source: Arc<dyn KeySource>,
    cache: Cache<&'static str, Arc<KeySet>>,
    refresh_lock: Mutex<()>,
    refresh_limiter: Option<DefaultDirectRateLimiter>,
    fetch_timeout: Duration,
    generation: AtomicU64,
    fetches: AtomicU64,
}

impl KeySetCache {
    /// Create an empty cache over `source`.
    #[must_use]
    pub fn new(source: Arc<dyn KeySource>, config: &Config) -> Self {
        let cache = Cache::builder().max_capacity(1).time_to_live(config.jwks_cache_ttl).build();

        // `None` for a zero interval: every unknown kid may refresh.
        let refresh_limiter =
            Quota::with_period(config.min_refresh_interval).map(RateLimiter::direct);

        Self {
            source,
            cache,
            refresh_lock: Mutex::new(()),
            refresh_limiter,
            fetch_timeout: config.fetch_timeout,
            generation: AtomicU64::new(0),
            fetches: AtomicU64::new(0),
        }
    }

    /// Resolve the verification key for a token's `kid`.
    ///
    /// On a miss the set is refreshed once (subject to rate limiting) and the
    /// lookup retried. Fetch failures surface as [`VerifyError::KeyFetch`], never
    /// as an unknown key.
    pub async fn resolve(&self, kid: Option<&str>) -> VerifyResult<Jwk> {
        let set = self.current().await?;
        if let Some(jwk) = set.select(kid) {
            return Ok(jwk.clone());
        }

        let unknown = || VerifyError::UnknownKey { kid: kid.map(str::to_string) };
        if kid.is_none() {
            return Err(unknown());
        }

        tracing::debug!(kid, generation = set.generation, "Key id not in cached set, refreshing");
        let refreshed = self.refresh_after(set.generation).await?;
        refreshed.select(kid).cloned().ok_or_else(unknown)
    }

    /// Current key set, loading it if the cache is cold or expired.
    ///
    /// The error is shared because every caller waiting on the same load sees it.
    pub async fn current(&self) -> Result<Arc<KeySet>, Arc<FetchError>> {
        self.cache.try_get_with(CACHE_KEY, self.load()).await
    }

    /// Refresh unless a set newer than `seen_generation` is already cached or the
    /// refresh budget is spent. Returns whichever set is current afterwards.
    pub async fn refresh_after(
        &self,
        seen_generation: u64,
    ) -> Result<Arc<KeySet>, Arc<FetchError>> {
        let _guard = self.refresh_lock.lock().await;

        if let Some(current) = self.cache.get(&CACHE_KEY).await {
            if current.generation > seen_generation {
                tracing::debug!(generation = current.generation, "Key set already refreshed");
                return Ok(current);
            }
            if let Some(limiter) = &self.refresh_limiter {
                if limiter.check().is_err() {
                    tracing::debug!(generation = current.generation, "Key set refresh rate limited");
                    return Ok(current);
                }
            }
        }

        let set = self.load().await.map_err(Arc::new)?;
        self.cache.insert(CACHE_KEY, Arc::clone(&set)).await;
        Ok(set)
    }

    /// Drop the cached set; the next lookup fetches.
    pub async fn invalidate(&self) {
        self.cache.invalidate(&CACHE_KEY).await;
    }

    /// Number of keys currently cached, without triggering a fetch.
    pub async fn cached_key_count(&self) -> Option<usize> {
        self.cache.get(&CACHE_KEY).await.map(|set| set.len())
    }

    /// Remote fetches attempted so far.
    #[must_use]
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }

    async fn load(&self) -> FetchResult<Arc<KeySet>> {
        self.fetches.fetch_add(1, Ordering::Relaxed);

        let jwks = match tokio::time::timeout(self.fetch_timeout, self.source.fetch()).await {
            Ok(result) => result.inspect_err(|e| {
                tracing::warn!(error = %e, "Key set fetch failed");
            })?,
            Err(_) => {
                tracing::warn!(timeout = ?self.fetch_timeout, "Key set fetch timed out");
                return Err(FetchError::Timeout(self.fetch_timeout));
            }
        };

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let set = KeySet::from_jwks(jwks, generation)?;
        tracing::info!(generation, keys = set.len(), "Loaded signing key set");
        Ok(Arc::new(set))
    }
}

impl std::fmt::Debug for KeySetCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeySetCache")
            .field("fetches", &self.fetch_count())
            .field("fetch_timeout", &self.fetch_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::AtomicUsize;

    fn jwk(kid: &str) -> Jwk {
        serde_json::from_value(serde_json::json!({
            "kty": "RSA",
            "alg": "RS256",
            "use": "sig",
            "kid": kid,
            "n": "sXchDaQebHnPiGvyDOAT4saGEUetSyo9MKLOoWFsueri23bOdgWp4Dy1WlUzewbgBHod5pcM9H95GQRV3JDXboIRROSBigeC5yjU1hGzHHyXss8UDprecbAYxknTcQkhslANGRUZmdTOQ5qTRsLAt6BTYuyvVRdhS8exSZEy_c4gs_7svlJJQ4H9_NxsiIoLwAEk7-Q3UXERGYw_75IDrGA84-lA_-Ct4eTlXHBIY2EaV7t7LjJaynVJCpkv4LKjTTAumiGUIuQhrNhZLuF_RJLqHpM2kgWFLU7-VTdL1VbC2tejvcI2BlMkEpk1BzBZI0KQB0GaDWFLN-aEAw3vRw",
            "e": "AQAB"
        }))
        .unwrap()
    }

    struct CountingSource {
        kids: Vec<&'static str>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl KeySource for CountingSource {
        async fn fetch(&self) -> FetchResult<JwkSet> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(JwkSet { keys: self.kids.iter().map(|k| jwk(k)).collect() })
        }
    }

    fn cache_over(kids: Vec<&'static str>, config: &Config) -> (Arc<CountingSource>, KeySetCache) {
        let source = Arc::new(CountingSource { kids, calls: AtomicUsize::new(0) });
        let cache = KeySetCache::new(Arc::clone(&source) as Arc<dyn KeySource>, config);
        (source, cache)
    }

    #[tokio::test]
    async fn test_lazy_population_and_hit() {
        let (source, cache) = cache_over(vec!["a", "b"], &Config::for_testing("http://unused"));
        assert_eq!(cache.cached_key_count().await, None);

        assert!(cache.resolve(Some("a")).await.is_ok());
        assert!(cache.resolve(Some("b")).await.is_ok());
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.cached_key_count().await, Some(2));
    }

    #[tokio::test]
    async fn test_unknown_kid_refreshes_once() {
        let (source, cache) = cache_over(vec!["a"], &Config::for_testing("http://unused"));
        let err = cache.resolve(Some("zzz")).await.unwrap_err();
        assert!(matches!(err, VerifyError::UnknownKey { kid: Some(ref k) } if k == "zzz"));
        // Initial load plus one forced refresh.
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_refresh_is_rate_limited() {
        let mut config = Config::for_testing("http://unused");
        config.min_refresh_interval = Duration::from_secs(3600);
        let (source, cache) = cache_over(vec!["a"], &config);

        for _ in 0..5 {
            let _ = cache.resolve(Some("crafted")).await;
        }
        // Initial load plus the single refresh the budget allows.
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_missing_kid_uses_single_key() {
        let (_, single) = cache_over(vec!["only"], &Config::for_testing("http://unused"));
        assert!(single.resolve(None).await.is_ok());

        let (source, multi) = cache_over(vec!["a", "b"], &Config::for_testing("http://unused"));
        assert!(matches!(multi.resolve(None).await, Err(VerifyError::UnknownKey { kid: None })));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_single_unnamed_key_is_selectable() {
        let mut only = jwk("ignored");
        only.common.key_id = None;
        let set = KeySet::from_jwks(JwkSet { keys: vec![only] }, 1).unwrap();

        assert_eq!(set.len(), 1);
        assert!(set.select(None).is_some());
        assert!(set.select(Some("ignored")).is_none());
    }

    #[test]
    fn test_unnamed_key_makes_kidless_lookup_ambiguous() {
        let mut unnamed = jwk("ignored");
        unnamed.common.key_id = None;
        let set = KeySet::from_jwks(JwkSet { keys: vec![jwk("a"), unnamed] }, 1).unwrap();

        assert_eq!(set.len(), 2);
        assert!(set.select(None).is_none());
        assert!(set.select(Some("a")).is_some());
    }

    #[tokio::test]
    async fn test_empty_key_set_is_fetch_error() {
        let (_, cache) = cache_over(vec![], &Config::for_testing("http://unused"));
        assert!(matches!(
            cache.resolve(Some("a")).await,
            Err(VerifyError::KeyFetch(ref e)) if matches!(**e, FetchError::EmptyKeySet)
        ));
    }

    #[tokio::test]
    async fn test_invalidate_forces_fetch() {
        let (source, cache) = cache_over(vec!["a"], &Config::for_testing("http://unused"));
        cache.current().await.unwrap();
        cache.invalidate().await;
        let set = cache.current().await.unwrap();
        assert_eq!(set.generation(), 2);
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.fetch_count(), 2);
    }
}
