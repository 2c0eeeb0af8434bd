//! Per-identity snapshot cache for the first page of the Default view.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::traits::{Clock, IdentityProvider, KeyValueStore};
use crate::pages::ResponsePage;

/// Stored value, one per identity key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
  pub owner_id: String,
  pub response: ResponsePage,
  /// Epoch milliseconds at write time
  pub timestamp: i64,
}

/// Why a read produced nothing. None of these reach the caller as errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMiss {
  SignedOut,
  StorageUnavailable,
  NotFound,
  /// Entry belonged to another identity and was evicted
  IdentityMismatch,
  /// Older than the TTL; left in place
  Expired,
  /// Entry could not be decoded; left in place
  Corrupt,
}

/// Snapshot cache scoped to the signed-in identity.
///
/// Fail-open: store errors are logged and degrade to a miss or a no-op, so a
/// caller can always fall back to a live fetch.
pub struct IdentityCache {
  identity: Arc<dyn IdentityProvider>,
  store: Arc<dyn KeyValueStore>,
  clock: Arc<dyn Clock>,
  prefix: String,
  ttl: Duration,
  /// Identity seen by the last read or write
  last_owner: Mutex<Option<String>>,
}

impl IdentityCache {
  pub const DEFAULT_PREFIX: &'static str = "savedPages_cache";

  pub fn new(
    identity: Arc<dyn IdentityProvider>,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
  ) -> Self {
    Self {
      identity,
      store,
      clock,
      prefix: Self::DEFAULT_PREFIX.to_string(),
      ttl: Duration::from_secs(300),
      last_owner: Mutex::new(None),
    }
  }

  /// Set the key prefix. The bare prefix is also the legacy unscoped key.
  pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
    self.prefix = prefix.into();
    self
  }

  /// Set how long an entry stays readable.
  pub fn with_ttl(mut self, ttl: Duration) -> Self {
    self.ttl = ttl;
    self
  }

  /// Storage key for an identity. Injective for a fixed prefix.
  pub fn key(&self, owner_id: &str) -> String {
    format!("{}_{}", self.prefix, owner_id)
  }

  /// Key written by the earlier, unscoped cache generation.
  pub fn legacy_key(&self) -> &str {
    &self.prefix
  }

  fn is_expired(&self, stored_at_ms: i64) -> bool {
    let age = self.clock.now_ms().saturating_sub(stored_at_ms);
    age > self.ttl.as_millis() as i64
  }

  /// Cached first page for the current identity, if any.
  pub async fn get(&self) -> Option<ResponsePage> {
    match self.lookup().await {
      Ok(page) => Some(page),
      Err(miss) => {
        debug!(?miss, "cache miss");
        None
      }
    }
  }

  /// Like [`get`](Self::get) but reports why nothing was returned.
  pub async fn lookup(&self) -> Result<ResponsePage, CacheMiss> {
    let owner = self.identity.current_user().ok_or(CacheMiss::SignedOut)?;
    let switched = self.observe_owner(&owner).await;

    let key = self.key(&owner);
    let raw = match self.store.get(&key).await {
      Ok(Some(raw)) => raw,
      Ok(None) if switched => return Err(CacheMiss::IdentityMismatch),
      Ok(None) => return Err(CacheMiss::NotFound),
      Err(e) => {
        warn!(key = %key, error = %e, "cache store unavailable");
        return Err(CacheMiss::StorageUnavailable);
      }
    };

    let entry: CacheEntry = serde_json::from_str(&raw).map_err(|e| {
      warn!(key = %key, error = %e, "unreadable cache entry");
      CacheMiss::Corrupt
    })?;

    if entry.owner_id != owner {
      info!(key = %key, stored_owner = %entry.owner_id, "evicting cache entry of another identity");
      self.remove_key(&key).await;
      return Err(CacheMiss::IdentityMismatch);
    }

    if self.is_expired(entry.timestamp) {
      return Err(CacheMiss::Expired);
    }

    Ok(entry.response)
  }

  /// Identity reads and writes currently apply to.
  pub fn owner(&self) -> Option<String> {
    self.identity.current_user()
  }

  /// Overwrite the current identity's entry.
  #[cfg(test)]
  pub async fn set(&self, snapshot: &ResponsePage) {
    let Some(owner) = self.identity.current_user() else {
      debug!("not caching: signed out");
      return;
    };
    self.write(owner, snapshot).await;
  }

  /// Overwrite `owner`'s entry, but only while `owner` is still signed in.
  pub async fn set_as(&self, owner: &str, snapshot: &ResponsePage) {
    if self.identity.current_user().as_deref() != Some(owner) {
      debug!(owner, "not caching: identity changed since the fetch started");
      return;
    }
    self.write(owner.to_string(), snapshot).await;
  }

  async fn write(&self, owner: String, snapshot: &ResponsePage) {
    self.observe_owner(&owner).await;

    let entry = CacheEntry {
      owner_id: owner.clone(),
      response: snapshot.clone(),
      timestamp: self.clock.now_ms(),
    };
    let value = match serde_json::to_string(&entry) {
      Ok(value) => value,
      Err(e) => {
        warn!(error = %e, "failed to encode cache entry");
        return;
      }
    };

    let key = self.key(&owner);
    match self.store.set(&key, value).await {
      Ok(()) => debug!(key = %key, items = snapshot.items.len(), "cached first page"),
      Err(e) => warn!(key = %key, error = %e, "failed to write cache entry"),
    }
  }

  /// Drop the current identity's entry.
  pub async fn invalidate(&self) {
    if let Some(owner) = self.identity.current_user() {
      let key = self.key(&owner);
      self.remove_key(&key).await;
    }
  }

  /// Wipe the whole store, every identity included.
  pub async fn clear_all(&self) {
    *self.last_owner.lock().unwrap_or_else(PoisonError::into_inner) = None;
    match self.store.clear().await {
      Ok(()) => info!("cleared page cache"),
      Err(e) => warn!(error = %e, "failed to clear page cache"),
    }
  }

  /// Remove the unscoped key left by the earlier cache generation.
  pub async fn prune_legacy_key(&self) {
    let key = self.legacy_key().to_string();
    self.remove_key(&key).await;
  }

  async fn remove_key(&self, key: &str) {
    if let Err(e) = self.store.remove(key).await {
      warn!(key = %key, error = %e, "failed to remove cache entry");
    }
  }

  /// Record `owner` as the active identity. When it differs from the one seen
  /// last, the previous identity's entry is evicted. Returns whether a switch
  /// happened.
  async fn observe_owner(&self, owner: &str) -> bool {
    let previous = self
      .last_owner
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .replace(owner.to_string());

    match previous {
      Some(previous) if previous != owner => {
        info!(from = %previous, to = %owner, "identity switched, evicting previous cache entry");
        let key = self.key(&previous);
        self.remove_key(&key).await;
        true
      }
      _ => false,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{MemoryStore, SessionIdentity};
  use crate::pages::{PageRecord, PaginationMeta};
  use crate::testing::{FailingStore, ManualClock};

  struct Fixture {
    identity: Arc<SessionIdentity>,
    store: Arc<MemoryStore>,
    clock: Arc<ManualClock>,
    cache: IdentityCache,
  }

  fn fixture(user: Option<&str>) -> Fixture {
    let identity = Arc::new(SessionIdentity::new(user.map(String::from)));
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(1_000_000));
    let cache = IdentityCache::new(identity.clone(), store.clone(), clock.clone());
    Fixture {
      identity,
      store,
      clock,
      cache,
    }
  }

  fn snapshot(n: usize) -> ResponsePage {
    ResponsePage {
      items: (0..n)
        .map(|i| PageRecord {
          id: format!("p{}", i),
          url: format!("https://example.com/{}", i),
          title: format!("Page {}", i),
          tags: vec!["saved".into()],
          classifications: Vec::new(),
          extra: Default::default(),
        })
        .collect(),
      pagination: PaginationMeta {
        total: 120,
        has_next_page: true,
        next_cursor: None,
      },
    }
  }

  #[test]
  fn test_keys_are_distinct_per_identity() {
    let f = fixture(None);
    assert_eq!(f.cache.key("u1"), "savedPages_cache_u1");
    assert_ne!(f.cache.key("u1"), f.cache.key("u2"));
    assert_ne!(f.cache.key("u1"), f.cache.key("u1_"));
    assert_ne!(f.cache.key(""), f.cache.legacy_key());
  }

  #[tokio::test]
  async fn test_set_then_get_returns_identical_snapshot() {
    let f = fixture(Some("u1"));
    let page = snapshot(3);
    f.cache.set(&page).await;
    assert_eq!(f.cache.get().await, Some(page));
  }

  #[tokio::test]
  async fn test_persisted_layout() {
    let f = fixture(Some("u1"));
    f.cache.set(&snapshot(1)).await;
    let raw = f.store.get("savedPages_cache_u1").await.unwrap().unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(value["ownerId"], "u1");
    assert_eq!(value["timestamp"], 1_000_000);
    assert_eq!(value["response"]["pages"][0]["id"], "p0");
    assert_eq!(value["response"]["pagination"]["hasNextPage"], true);
    assert!(value["response"]["pagination"]["nextCursor"].is_null());
  }

  #[tokio::test]
  async fn test_signed_out_reads_and_writes_nothing() {
    let f = fixture(None);
    f.cache.set(&snapshot(1)).await;
    assert_eq!(f.cache.lookup().await, Err(CacheMiss::SignedOut));
    assert_eq!(f.store.get("savedPages_cache_").await.unwrap(), None);
  }

  #[tokio::test]
  async fn test_identity_switch_misses_and_evicts_previous_entry() {
    let f = fixture(Some("a"));
    f.cache.set(&snapshot(2)).await;

    f.identity.sign_in("b");
    assert_eq!(f.cache.lookup().await, Err(CacheMiss::IdentityMismatch));
    assert_eq!(f.store.get("savedPages_cache_a").await.unwrap(), None);
  }

  #[tokio::test]
  async fn test_foreign_owner_under_own_key_is_evicted() {
    let f = fixture(Some("b"));
    let foreign = CacheEntry {
      owner_id: "a".into(),
      response: snapshot(1),
      timestamp: f.clock.now_ms(),
    };
    f.store
      .set("savedPages_cache_b", serde_json::to_string(&foreign).unwrap())
      .await
      .unwrap();

    assert_eq!(f.cache.lookup().await, Err(CacheMiss::IdentityMismatch));
    assert_eq!(f.store.get("savedPages_cache_b").await.unwrap(), None);
  }

  #[tokio::test]
  async fn test_expired_entry_misses_without_eviction() {
    let f = fixture(Some("u1"));
    f.cache.set(&snapshot(1)).await;

    f.clock.advance(300_000);
    assert!(f.cache.get().await.is_some(), "exactly at the TTL is still fresh");

    f.clock.advance(1);
    assert_eq!(f.cache.lookup().await, Err(CacheMiss::Expired));
    assert!(f.store.get("savedPages_cache_u1").await.unwrap().is_some());
  }

  #[tokio::test]
  async fn test_custom_ttl() {
    let f = fixture(Some("u1"));
    let cache = IdentityCache::new(f.identity.clone(), f.store.clone(), f.clock.clone())
      .with_ttl(Duration::from_secs(1));
    cache.set(&snapshot(1)).await;
    f.clock.advance(1_001);
    assert_eq!(cache.lookup().await, Err(CacheMiss::Expired));
  }

  #[tokio::test]
  async fn test_set_as_skips_write_after_identity_switch() {
    let f = fixture(Some("a"));
    f.identity.sign_in("b");
    f.cache.set_as("a", &snapshot(1)).await;

    assert_eq!(f.store.get("savedPages_cache_a").await.unwrap(), None);
    assert_eq!(f.store.get("savedPages_cache_b").await.unwrap(), None);

    f.cache.set_as("b", &snapshot(2)).await;
    assert_eq!(f.cache.get().await, Some(snapshot(2)));
  }

  #[tokio::test]
  async fn test_clear_all_forgets_every_identity() {
    let f = fixture(Some("u1"));
    f.cache.set(&snapshot(1)).await;
    f.identity.sign_in("u2");
    f.cache.set(&snapshot(2)).await;

    f.cache.clear_all().await;

    assert_eq!(f.cache.get().await, None);
    f.identity.sign_in("u1");
    assert_eq!(f.cache.get().await, None);
  }

  #[tokio::test]
  async fn test_invalidate_removes_only_current_identity() {
    let f = fixture(Some("u1"));
    f.cache.set(&snapshot(1)).await;
    f.store
      .set("savedPages_cache_other", "{}".into())
      .await
      .unwrap();

    f.cache.invalidate().await;
    assert_eq!(f.cache.lookup().await, Err(CacheMiss::NotFound));
    assert!(f.store.get("savedPages_cache_other").await.unwrap().is_some());

    // Absent entry is a no-op
    f.cache.invalidate().await;
  }

  #[tokio::test]
  async fn test_prune_legacy_key() {
    let f = fixture(Some("u1"));
    f.store.set("savedPages_cache", "{}".into()).await.unwrap();
    f.cache.set(&snapshot(1)).await;

    f.cache.prune_legacy_key().await;

    assert_eq!(f.store.get("savedPages_cache").await.unwrap(), None);
    assert!(f.cache.get().await.is_some());
  }

  #[tokio::test]
  async fn test_corrupt_entry_is_a_miss() {
    let f = fixture(Some("u1"));
    f.store
      .set("savedPages_cache_u1", "not json".into())
      .await
      .unwrap();
    assert_eq!(f.cache.lookup().await, Err(CacheMiss::Corrupt));
  }

  #[tokio::test]
  async fn test_unavailable_store_degrades_silently() {
    let identity = Arc::new(SessionIdentity::new(Some("u1".into())));
    let cache = IdentityCache::new(
      identity,
      Arc::new(FailingStore),
      Arc::new(ManualClock::new(0)),
    );

    cache.set(&snapshot(1)).await;
    assert_eq!(cache.lookup().await, Err(CacheMiss::StorageUnavailable));
    cache.invalidate().await;
    cache.clear_all().await;
    cache.prune_legacy_key().await;
  }
}
