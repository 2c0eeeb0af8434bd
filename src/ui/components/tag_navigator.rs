use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

use crate::pages::{TagPath, TagStep};
use crate::pagination::{InitialLoad, PaginationStore};

/// Navigation mode of the dashboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavState {
  /// No tag selected
  Default,
  /// Drilling into a non-empty tag lineage
  Discovery(TagPath),
}

impl NavState {
  fn from_path(path: TagPath) -> Self {
    if path.is_empty() {
      NavState::Default
    } else {
      NavState::Discovery(path)
    }
  }

  pub fn tag_path(&self) -> TagPath {
    match self {
      NavState::Default => TagPath::new(),
      NavState::Discovery(path) => path.clone(),
    }
  }
}

/// Breadcrumb state machine over the tag hierarchy.
///
/// Every transition begins a first-page load with a filter that ANDs all
/// steps of the new path. The transition itself is synchronous; callers
/// finish the returned [`InitialLoad`] to fetch.
pub struct TagNavigator {
  store: PaginationStore,
  state: Mutex<NavState>,
}

impl TagNavigator {
  pub fn new(store: PaginationStore) -> Self {
    Self {
      store,
      state: Mutex::new(NavState::Default),
    }
  }

  fn state_mut(&self) -> MutexGuard<'_, NavState> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  #[cfg(test)]
  pub fn state(&self) -> NavState {
    self.state_mut().clone()
  }

  pub fn tag_path(&self) -> TagPath {
    self.state_mut().tag_path()
  }

  pub fn breadcrumbs(&self) -> Vec<String> {
    self.tag_path().breadcrumbs()
  }

  /// Extend the current lineage with `kind: label` and switch the store to
  /// it. The first page arrives once the returned load is finished.
  pub fn handle_tag_click(&self, kind: &str, label: &str) -> InitialLoad {
    let mut state = self.state_mut();
    let path = state.tag_path().pushed(TagStep::new(kind, label));
    debug!(depth = path.len(), kind, label, "tag selected");
    *state = NavState::from_path(path.clone());
    self.begin(path)
  }

  /// Jump back to breadcrumb `index` (0 = root), keeping steps `0..=index`.
  /// Out-of-range indexes are ignored and return `None`.
  pub fn navigate_to_breadcrumb(&self, index: usize) -> Option<InitialLoad> {
    let mut state = self.state_mut();
    let current = state.tag_path();
    if index >= current.len() {
      debug!(index, depth = current.len(), "breadcrumb out of range");
      return None;
    }
    let path = current.truncated(index + 1);
    *state = NavState::from_path(path.clone());
    Some(self.begin(path))
  }

  /// Drop the path and switch to the Default view with an empty filter.
  pub fn reset_to_default_view(&self) -> InitialLoad {
    let mut state = self.state_mut();
    *state = NavState::Default;
    self
      .store
      .begin_initial(self.store.active_filter().default_view())
  }

  /// Back to Default without reloading (e.g. on sign-out).
  pub fn clear(&self) {
    *self.state_mut() = NavState::Default;
  }

  /// Called with the navigation lock held so path and store stay in step.
  fn begin(&self, path: TagPath) -> InitialLoad {
    let filter = self.store.active_filter().with_tag_path(path);
    self.store.begin_initial(filter)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{IdentityCache, MemoryStore, SessionIdentity};
  use crate::testing::{page_of, ManualClock, RecordingUi, ScriptedFetcher};
  use std::sync::Arc;

  fn navigator() -> (Arc<ScriptedFetcher>, PaginationStore, TagNavigator) {
    let cache = Arc::new(IdentityCache::new(
      Arc::new(SessionIdentity::new(None)),
      Arc::new(MemoryStore::new()),
      Arc::new(ManualClock::new(0)),
    ));
    let fetcher = Arc::new(ScriptedFetcher::new());
    let store = PaginationStore::new(cache, fetcher.clone(), Arc::new(RecordingUi::new()), 50);
    let navigator = TagNavigator::new(store.clone());
    (fetcher, store, navigator)
  }

  fn ok_pages(fetcher: &ScriptedFetcher, n: usize) {
    for _ in 0..n {
      fetcher.push_ok(page_of(0, 1, 1, false));
    }
  }

  #[tokio::test]
  async fn test_tag_clicks_accumulate() {
    let (fetcher, store, nav) = navigator();
    ok_pages(&fetcher, 2);

    store.finish_initial(nav.handle_tag_click("domain", "Travel")).await;
    assert_eq!(
      nav.state(),
      NavState::Discovery(vec![TagStep::new("domain", "Travel")].into())
    );

    store.finish_initial(nav.handle_tag_click("topic", "Hiking")).await;
    let expected: TagPath = vec![
      TagStep::new("domain", "Travel"),
      TagStep::new("topic", "Hiking"),
    ]
    .into();
    assert_eq!(nav.tag_path(), expected);
    assert_eq!(store.active_filter().tag_path, expected);
    // The fetch filter carries every ancestor, not only the leaf
    assert_eq!(fetcher.requests()[1].tag_path, expected);
  }

  #[tokio::test]
  async fn test_breadcrumb_truncates() {
    let (fetcher, store, nav) = navigator();
    ok_pages(&fetcher, 4);
    store.finish_initial(nav.handle_tag_click("domain", "Travel")).await;
    store.finish_initial(nav.handle_tag_click("topic", "Hiking")).await;
    store.finish_initial(nav.handle_tag_click("region", "Alps")).await;

    let load = nav.navigate_to_breadcrumb(0).expect("breadcrumb in range");
    store.finish_initial(load).await;

    assert_eq!(
      nav.tag_path(),
      TagPath::from(vec![TagStep::new("domain", "Travel")])
    );
    assert_eq!(fetcher.calls(), 4);
    assert_eq!(nav.breadcrumbs(), vec!["domain: Travel".to_string()]);
  }

  #[tokio::test]
  async fn test_breadcrumb_out_of_range_is_ignored() {
    let (fetcher, _store, nav) = navigator();
    assert!(nav.navigate_to_breadcrumb(0).is_none());
    assert_eq!(nav.state(), NavState::Default);
    assert_eq!(fetcher.calls(), 0);
  }

  #[tokio::test]
  async fn test_reset_to_default_view() {
    let (fetcher, store, nav) = navigator();
    ok_pages(&fetcher, 2);
    store.finish_initial(nav.handle_tag_click("domain", "Travel")).await;

    store.finish_initial(nav.reset_to_default_view()).await;

    assert_eq!(nav.state(), NavState::Default);
    assert!(store.active_filter().is_default_view());
    assert!(fetcher.requests()[1].tag_path.is_empty());
  }

  #[tokio::test]
  async fn test_tag_click_keeps_active_search() {
    let (fetcher, store, nav) = navigator();
    ok_pages(&fetcher, 2);
    store
      .load_initial(store.active_filter().with_search("boots"))
      .await;

    store.finish_initial(nav.handle_tag_click("domain", "Travel")).await;

    assert_eq!(fetcher.requests()[1].search, "boots");
  }

  #[tokio::test]
  async fn test_transitions_apply_before_fetches_run() {
    let (fetcher, store, nav) = navigator();
    let first = nav.handle_tag_click("domain", "Travel");
    let second = nav.handle_tag_click("topic", "Hiking");
    assert_eq!(store.active_filter().tag_path, nav.tag_path());
    assert_eq!(nav.tag_path().len(), 2);

    fetcher.push_ok(page_of(0, 1, 1, false));
    fetcher.push_ok(page_of(0, 9, 9, false));
    assert!(store.finish_initial(second).await);
    assert!(!store.finish_initial(first).await);
    assert_eq!(store.snapshot().loaded(), 1);
  }
}
