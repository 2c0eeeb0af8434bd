pub mod components;
pub mod console;

use crate::pages::{FilterState, PageRecord};

/// Where the items on screen came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSource {
  Network,
  Cache,
}

/// Immutable snapshot handed to the render layer on every state change.
#[derive(Debug, Clone, PartialEq)]
pub struct PageView {
  pub filter: FilterState,
  pub items: Vec<PageRecord>,
  pub total: u64,
  pub has_next_page: bool,
  pub is_loading_initial: bool,
  pub is_loading_more: bool,
  pub source: Option<PageSource>,
}

impl PageView {
  pub fn loaded(&self) -> usize {
    self.items.len()
  }
}

/// Render layer the engine reports to. Implementations must be cheap; they
/// are called while the engine is between suspension points.
pub trait UiSink: Send + Sync {
  /// State changed; redraw from the snapshot.
  fn render(&self, view: &PageView);

  /// A fetch failed. Called once per failed call.
  fn show_error(&self, message: &str);

  fn show_loading_indicator(&self);

  fn hide_loading_indicator(&self);
}
