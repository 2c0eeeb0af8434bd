use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::pagination::{InitialLoad, PaginationStore};

/// Debounced free-text search.
///
/// The query text updates immediately so the UI can react (clear button,
/// echo), but the reload only happens once input has been quiet for the
/// debounce period. Each keystroke cancels the previous pending reload.
pub struct SearchController {
  store: PaginationStore,
  debounce: Duration,
  query: Mutex<String>,
  pending: Mutex<Option<JoinHandle<()>>>,
}

impl SearchController {
  pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

  pub fn new(store: PaginationStore) -> Self {
    Self {
      store,
      debounce: Self::DEFAULT_DEBOUNCE,
      query: Mutex::new(String::new()),
      pending: Mutex::new(None),
    }
  }

  pub fn with_debounce(mut self, debounce: Duration) -> Self {
    self.debounce = debounce;
    self
  }

  fn query_mut(&self) -> MutexGuard<'_, String> {
    self.query.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Text as last typed, before any debounce.
  pub fn query(&self) -> String {
    self.query_mut().clone()
  }

  /// Whether a debounced reload is still waiting to fire.
  #[cfg(test)]
  pub fn has_pending_reload(&self) -> bool {
    self
      .pending
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .as_ref()
      .is_some_and(|handle| !handle.is_finished())
  }

  fn cancel_pending(&self) {
    if let Some(handle) = self
      .pending
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .take()
    {
      handle.abort();
    }
  }

  /// Input changed. Must be called from within a tokio runtime.
  pub fn on_search_change(&self, text: &str) {
    *self.query_mut() = text.to_string();
    self.cancel_pending();

    let store = self.store.clone();
    let deadline = tokio::time::Instant::now() + self.debounce;
    let text = text.to_string();
    let handle = tokio::spawn(async move {
      tokio::time::sleep_until(deadline).await;
      let active = store.active_filter();
      if active.search.trim() == text.trim() {
        debug!(search = %text, "search unchanged, skipping reload");
        return;
      }
      debug!(search = %text, "search settled");
      // Past this point the context has switched, so the fetch runs to
      // completion; later keystrokes only cancel reloads still waiting.
      let load = store.begin_initial(active.with_search(text));
      tokio::spawn(async move {
        store.finish_initial(load).await;
      });
    });
    *self.pending.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
  }

  /// Clear the search and switch the store to the unsearched filter right
  /// away, skipping the debounce. The first page arrives once the returned
  /// load is finished.
  pub fn clear_search(&self) -> InitialLoad {
    self.cancel_pending();
    self.query_mut().clear();
    let filter = self.store.active_filter().with_search("");
    self.store.begin_initial(filter)
  }

  /// Drop the query and any pending reload without reloading.
  pub fn reset(&self) {
    self.cancel_pending();
    self.query_mut().clear();
  }
}

impl Drop for SearchController {
  fn drop(&mut self) {
    self.cancel_pending();
  }
}
