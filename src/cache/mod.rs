//! Offline-first cache for the dashboard's first page.
//!
//! This module provides:
//! - The collaborator traits the cache is built on (store, identity, clock)
//! - SQLite, in-memory and no-op store backends
//! - `IdentityCache`, a per-identity snapshot cache with a short TTL that
//!   never surfaces a failure to its caller

mod identity;
mod storage;
mod traits;

pub use identity::{CacheEntry, CacheMiss, IdentityCache};
pub use storage::{MemoryStore, NoopStore, SqliteStore};
pub use traits::{Clock, IdentityProvider, KeyValueStore, SessionIdentity, SystemClock};
