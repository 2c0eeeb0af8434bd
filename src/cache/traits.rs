//! Collaborator traits the cache depends on.

use chrono::Utc;
use color_eyre::Result;
use futures::future::BoxFuture;
use std::sync::{Mutex, PoisonError};

/// Async persistent key-value store. Any operation may fail; callers in the
/// cache treat every failure as a miss or a no-op.
pub trait KeyValueStore: Send + Sync {
  fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>>>;

  fn set<'a>(&'a self, key: &'a str, value: String) -> BoxFuture<'a, Result<()>>;

  fn remove<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<()>>;

  /// Wipe every key in the store.
  fn clear(&self) -> BoxFuture<'_, Result<()>>;
}

/// Exposes the signed-in user, or `None` when signed out.
pub trait IdentityProvider: Send + Sync {
  fn current_user(&self) -> Option<String>;
}

/// Wall clock in epoch milliseconds.
pub trait Clock: Send + Sync {
  fn now_ms(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now_ms(&self) -> i64 {
    Utc::now().timestamp_millis()
  }
}

/// Identity held for the lifetime of a dashboard session.
#[derive(Debug, Default)]
pub struct SessionIdentity {
  user: Mutex<Option<String>>,
}

impl SessionIdentity {
  pub fn new(user: Option<String>) -> Self {
    Self {
      user: Mutex::new(user.filter(|u| !u.is_empty())),
    }
  }

  pub fn sign_in(&self, user: impl Into<String>) {
    *self.user.lock().unwrap_or_else(PoisonError::into_inner) = Some(user.into());
  }

  pub fn sign_out(&self) {
    *self.user.lock().unwrap_or_else(PoisonError::into_inner) = None;
  }
}

impl IdentityProvider for SessionIdentity {
  fn current_user(&self) -> Option<String> {
    self
      .user
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .clone()
  }
}
