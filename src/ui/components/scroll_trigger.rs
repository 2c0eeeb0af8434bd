use futures::future::BoxFuture;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::trace;

use crate::pagination::LoadGuard;
use crate::ui::UiSink;

/// Something that can load another page when the list end comes into view.
pub trait LoadMoreTarget: Send + Sync {
  /// Pulled on every notification to decide whether to load.
  fn load_guard(&self) -> LoadGuard;

  fn load_more(&self) -> BoxFuture<'_, ()>;
}

/// Marker placed after the last rendered item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sentinel {
  /// Number of items rendered before the marker
  pub after_item: usize,
}

/// Visible region of the list, in logical pixels from the top of the content.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
  pub top: f64,
  pub height: f64,
}

impl Viewport {
  pub fn bottom(&self) -> f64 {
    self.top + self.height
  }
}

#[derive(Debug, Default)]
struct TriggerState {
  sentinel: Option<Sentinel>,
  observing: bool,
  indicator_visible: bool,
}

/// Infinite-scroll trigger.
///
/// The binding layer reports viewport changes; the trigger decides whether the
/// sentinel is within the lookahead margin and then pulls the target's guard.
/// The guard, not the notification rate, is what keeps loads from overlapping.
pub struct ScrollTrigger {
  target: Arc<dyn LoadMoreTarget>,
  ui: Arc<dyn UiSink>,
  margin_px: f64,
  state: Mutex<TriggerState>,
}

impl ScrollTrigger {
  pub const DEFAULT_MARGIN_PX: f64 = 200.0;

  pub fn new(target: Arc<dyn LoadMoreTarget>, ui: Arc<dyn UiSink>) -> Self {
    Self {
      target,
      ui,
      margin_px: Self::DEFAULT_MARGIN_PX,
      state: Mutex::new(TriggerState::default()),
    }
  }

  pub fn with_margin(mut self, margin_px: f64) -> Self {
    self.margin_px = margin_px.max(0.0);
    self
  }

  fn state(&self) -> MutexGuard<'_, TriggerState> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Place a fresh sentinel after `rendered_items` and start observing.
  /// Any previous sentinel is torn down first.
  pub fn init(&self, rendered_items: usize) {
    self.cleanup();
    let mut state = self.state();
    state.sentinel = Some(Sentinel {
      after_item: rendered_items,
    });
    state.observing = true;
  }

  /// Keep the sentinel after the last item once more items are rendered.
  pub fn reposition(&self, rendered_items: usize) {
    if let Some(sentinel) = self.state().sentinel.as_mut() {
      sentinel.after_item = rendered_items;
    }
  }

  #[cfg(test)]
  pub fn sentinel(&self) -> Option<Sentinel> {
    self.state().sentinel
  }

  pub fn is_observing(&self) -> bool {
    self.state().observing
  }

  /// Whether a sentinel at `sentinel_top` intersects the viewport grown by the
  /// lookahead margin on both edges.
  pub fn is_intersecting(&self, viewport: Viewport, sentinel_top: f64) -> bool {
    sentinel_top <= viewport.bottom() + self.margin_px
      && sentinel_top >= viewport.top - self.margin_px
  }

  /// Viewport moved. Returns whether a load was started.
  pub async fn on_viewport_change(&self, viewport: Viewport, sentinel_top: f64) -> bool {
    if !self.is_observing() || !self.is_intersecting(viewport, sentinel_top) {
      return false;
    }
    self.on_scroll_near_bottom().await
  }

  /// Sentinel came into range. Loads iff the target has more pages and is not
  /// already loading. Returns whether a load was started.
  pub async fn on_scroll_near_bottom(&self) -> bool {
    if !self.is_observing() {
      return false;
    }

    let guard = self.target.load_guard();
    if !guard.allows_load() {
      trace!(?guard, "intersection ignored");
      return false;
    }

    self.show_loading_indicator();
    self.target.load_more().await;
    self.hide_loading_indicator();
    true
  }

  pub fn show_loading_indicator(&self) {
    let changed = {
      let mut state = self.state();
      !std::mem::replace(&mut state.indicator_visible, true)
    };
    if changed {
      self.ui.show_loading_indicator();
    }
  }

  pub fn hide_loading_indicator(&self) {
    let changed = std::mem::replace(&mut self.state().indicator_visible, false);
    if changed {
      self.ui.hide_loading_indicator();
    }
  }

  /// Stop observing and drop the sentinel. Safe to call repeatedly or before
  /// `init`.
  pub fn cleanup(&self) {
    {
      let mut state = self.state();
      state.observing = false;
      state.sentinel = None;
    }
    self.hide_loading_indicator();
  }
}
