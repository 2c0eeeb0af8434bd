//! Loaded pages and pagination metadata for the active filter.
//!
//! `PaginationStore` reconciles the cached first page of the Default view with
//! pages fetched incrementally afterwards. State lives behind a mutex that is
//! only held between suspension points, so UI events can interleave with
//! in-flight fetches.
//!
//! Every fetch captures the store's `generation` when it starts. `load_initial`
//! and `reset` bump the generation, and a result that resolves under an older
//! generation is dropped instead of being merged into the new context.
//!
//! ```ignore
//! let store = PaginationStore::new(cache, fetcher, ui, 50);
//! store.load_initial(FilterState::new(50)).await;
//! // Sentinel near the bottom of the list
//! store.load_more().await;
//! ```

use futures::future::BoxFuture;
use futures::FutureExt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, trace, warn};

use crate::cache::IdentityCache;
use crate::pages::{
  FetchRequest, FilterState, PageAnchor, PageFetcher, PageRecord, ResponsePage, TagPath,
};
use crate::ui::components::LoadMoreTarget;
use crate::ui::{PageSource, PageView, UiSink};

/// What the scroll trigger needs to decide whether to load more.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadGuard {
  pub has_more_pages: bool,
  pub is_loading: bool,
}

impl LoadGuard {
  pub fn allows_load(&self) -> bool {
    self.has_more_pages && !self.is_loading
  }
}

#[derive(Debug)]
struct PageState {
  filter: FilterState,
  items: Vec<PageRecord>,
  total: u64,
  has_next_page: bool,
  next_cursor: Option<String>,
  is_loading_initial: bool,
  is_loading_more: bool,
  source: Option<PageSource>,
  /// Fetch token; bumped whenever the filter context is replaced
  generation: u64,
}

impl PageState {
  fn new(limit: u32) -> Self {
    Self {
      filter: FilterState::new(limit),
      items: Vec::new(),
      total: 0,
      has_next_page: false,
      next_cursor: None,
      is_loading_initial: false,
      is_loading_more: false,
      source: None,
      generation: 0,
    }
  }

  /// Drop everything loaded and start a new context for `filter`.
  fn begin_context(&mut self, filter: FilterState) -> u64 {
    self.generation += 1;
    self.filter = filter;
    self.filter.offset = 0;
    self.items.clear();
    self.total = 0;
    self.has_next_page = false;
    self.next_cursor = None;
    self.is_loading_initial = false;
    self.is_loading_more = false;
    self.source = None;
    self.generation
  }

  fn apply_pagination(&mut self, page: &ResponsePage) {
    let loaded = self.items.len() as u64;
    if page.pagination.total < loaded {
      debug!(total = page.pagination.total, loaded, "server total below loaded count");
    }
    self.total = page.pagination.total.max(loaded);
    self.has_next_page = page.pagination.has_next_page;
    self.next_cursor = page.pagination.next_cursor.clone();
  }

  fn view(&self) -> PageView {
    PageView {
      filter: self.filter.clone(),
      items: self.items.clone(),
      total: self.total,
      has_next_page: self.has_next_page,
      is_loading_initial: self.is_loading_initial,
      is_loading_more: self.is_loading_more,
      source: self.source,
    }
  }
}

struct StoreInner {
  state: Mutex<PageState>,
  cache: Arc<IdentityCache>,
  fetcher: Arc<dyn PageFetcher>,
  ui: Arc<dyn UiSink>,
}

impl StoreInner {
  fn state(&self) -> MutexGuard<'_, PageState> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn render(&self) {
    let view = self.state().view();
    self.ui.render(&view);
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadKind {
  Initial,
  More,
}

/// Clears a loading flag when a load ends, however it ends (including the
/// future being dropped), unless a newer context has already taken over.
struct LoadingRelease<'a> {
  inner: &'a StoreInner,
  generation: u64,
  kind: LoadKind,
}

impl Drop for LoadingRelease<'_> {
  fn drop(&mut self) {
    let changed = {
      let mut state = self.inner.state();
      if state.generation != self.generation {
        return;
      }
      match self.kind {
        LoadKind::Initial => std::mem::replace(&mut state.is_loading_initial, false),
        LoadKind::More => std::mem::replace(&mut state.is_loading_more, false),
      }
    };
    // An initial load only still holds its flag here if it was abandoned
    if changed && self.kind == LoadKind::Initial {
      debug!(generation = self.generation, "first-page load abandoned");
      self.inner.render();
    }
  }
}

/// A first-page load whose context is already active. Created by
/// [`PaginationStore::begin_initial`], completed by
/// [`PaginationStore::finish_initial`].
#[derive(Debug)]
#[must_use = "the first page is only fetched once the load is finished"]
pub struct InitialLoad {
  generation: u64,
  filter: FilterState,
  /// Identity signed in when the load began
  owner: Option<String>,
}

/// Log records the server returned outside the requested tag path.
fn check_tag_path(tag_path: &TagPath, page: &ResponsePage) {
  if tag_path.is_empty() {
    return;
  }
  let stray = page
    .items
    .iter()
    .filter(|record| !record.matches_tag_path(tag_path))
    .count();
  if stray > 0 {
    warn!(stray, depth = tag_path.len(), "records outside the requested tag path");
  }
}

/// Pages loaded for the active filter. Cloning shares the same state.
#[derive(Clone)]
pub struct PaginationStore {
  inner: Arc<StoreInner>,
}

impl PaginationStore {
  pub fn new(
    cache: Arc<IdentityCache>,
    fetcher: Arc<dyn PageFetcher>,
    ui: Arc<dyn UiSink>,
    page_size: u32,
  ) -> Self {
    Self {
      inner: Arc::new(StoreInner {
        state: Mutex::new(PageState::new(page_size.max(1))),
        cache,
        fetcher,
        ui,
      }),
    }
  }

  /// Filter the loaded items belong to.
  pub fn active_filter(&self) -> FilterState {
    self.inner.state().filter.clone()
  }

  pub fn snapshot(&self) -> PageView {
    self.inner.state().view()
  }

  pub fn guard(&self) -> LoadGuard {
    let state = self.inner.state();
    LoadGuard {
      has_more_pages: state.has_next_page,
      is_loading: state.is_loading_initial || state.is_loading_more,
    }
  }

  fn is_current(&self, generation: u64) -> bool {
    self.inner.state().generation == generation
  }

  /// Replace the loaded pages with the first page for `filter`.
  ///
  /// The Default view is served from the identity cache when possible; a
  /// fresh Default-view page is written back to it. Returns whether the page
  /// was installed.
  pub async fn load_initial(&self, filter: FilterState) -> bool {
    let load = self.begin_initial(filter);
    self.finish_initial(load).await
  }

  /// Switch to `filter` right away: clear the list and mark it loading. The
  /// first page arrives when the returned load is finished.
  pub fn begin_initial(&self, filter: FilterState) -> InitialLoad {
    let load = {
      let mut state = self.inner.state();
      let generation = state.begin_context(filter);
      state.is_loading_initial = true;
      InitialLoad {
        generation,
        filter: state.filter.clone(),
        owner: self.inner.cache.owner(),
      }
    };
    self.inner.render();
    load
  }

  /// Fetch (or read from cache) the first page of a begun load.
  pub async fn finish_initial(&self, load: InitialLoad) -> bool {
    let InitialLoad {
      generation,
      filter,
      owner,
    } = load;
    let _release = LoadingRelease {
      inner: &self.inner,
      generation,
      kind: LoadKind::Initial,
    };

    let default_view = filter.is_default_view();
    if default_view {
      if let Some(page) = self.inner.cache.get().await {
        let applied = self.apply_first_page(generation, page, PageSource::Cache);
        if applied {
          info!(generation, "default view served from cache");
        }
        return applied;
      }
    }

    debug!(generation, search = %filter.search, tags = filter.tag_path.len(), "loading first page");
    let result = self
      .inner
      .fetcher
      .fetch(FetchRequest::first_page(&filter))
      .await;

    match result {
      Ok(page) => {
        check_tag_path(&filter.tag_path, &page);
        let snapshot = default_view.then(|| page.clone());
        if !self.apply_first_page(generation, page, PageSource::Network) {
          return false;
        }
        if let (Some(snapshot), Some(owner)) = (snapshot, owner) {
          self.inner.cache.set_as(&owner, &snapshot).await;
        }
        true
      }
      Err(e) => {
        {
          let mut state = self.inner.state();
          if state.generation != generation {
            debug!(generation, "discarding failure of a superseded load");
            return false;
          }
          state.is_loading_initial = false;
        }
        self.inner.render();
        self
          .inner
          .ui
          .show_error(&format!("Failed to load saved pages: {}", e));
        false
      }
    }
  }

  /// Install a first page if `generation` is still the active context.
  fn apply_first_page(&self, generation: u64, page: ResponsePage, source: PageSource) -> bool {
    {
      let mut state = self.inner.state();
      if state.generation != generation {
        debug!(generation, current = state.generation, "discarding stale first page");
        return false;
      }
      state.items = page.items.clone();
      state.apply_pagination(&page);
      state.is_loading_initial = false;
      state.source = Some(source);
    }
    self.inner.render();
    true
  }

  /// Fetch and append the next page. A no-op unless there is a next page and
  /// nothing is loading. Never touches the cache.
  pub async fn load_more(&self) {
    let (generation, request) = {
      let mut state = self.inner.state();
      if !state.has_next_page || state.is_loading_more || state.is_loading_initial {
        trace!(
          has_next_page = state.has_next_page,
          is_loading_more = state.is_loading_more,
          "load more ignored"
        );
        return;
      }
      state.is_loading_more = true;
      let loaded = state.items.len() as u64;
      state.filter.offset = loaded;
      let anchor = match &state.next_cursor {
        Some(cursor) => PageAnchor::Cursor(cursor.clone()),
        None => PageAnchor::Offset(loaded),
      };
      (
        state.generation,
        FetchRequest::next_page(&state.filter, anchor),
      )
    };
    let release = LoadingRelease {
      inner: &self.inner,
      generation,
      kind: LoadKind::More,
    };
    self.inner.render();

    debug!(generation, anchor = ?request.anchor, "loading more");
    let tag_path = request.tag_path.clone();
    let result = self.inner.fetcher.fetch(request).await;

    let error = match result {
      Ok(page) => {
        check_tag_path(&tag_path, &page);
        let mut state = self.inner.state();
        if state.generation != generation {
          debug!(generation, current = state.generation, "discarding stale page");
          return;
        }
        state.items.extend(page.items.iter().cloned());
        state.apply_pagination(&page);
        None
      }
      Err(e) => {
        if !self.is_current(generation) {
          debug!(generation, "discarding failure of a superseded load");
          return;
        }
        Some(e)
      }
    };

    drop(release);
    self.inner.render();
    if let Some(e) = error {
      self
        .inner
        .ui
        .show_error(&format!("Failed to load more saved pages: {}", e));
    }
  }

  /// Forget everything loaded (e.g. on sign-out). In-flight results are dropped.
  pub fn reset(&self) {
    {
      let mut state = self.inner.state();
      let filter = state.filter.default_view();
      state.begin_context(filter);
    }
    self.inner.render();
  }
}

impl LoadMoreTarget for PaginationStore {
  fn load_guard(&self) -> LoadGuard {
    self.guard()
  }

  fn load_more(&self) -> BoxFuture<'_, ()> {
    PaginationStore::load_more(self).boxed()
  }
}
