use color_eyre::Result;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::sync::Arc;
use tracing::{debug, info};

use crate::cache::{Clock, IdentityCache, KeyValueStore, SessionIdentity};
use crate::commands::UiCommand;
use crate::config::Config;
use crate::event::{Event, EventHandler};
use crate::pages::PageFetcher;
use crate::pagination::{InitialLoad, PaginationStore};
use crate::ui::components::{
  LoadMoreTarget, ScrollTrigger, SearchController, TagNavigator, Viewport,
};
use crate::ui::console::help_text;
use crate::ui::UiSink;

/// Height of one printed row in the scroll geometry
const ROW_HEIGHT_PX: f64 = 20.0;
/// Visible height of the console list
const SCREEN_HEIGHT_PX: f64 = 600.0;

/// Work left over once a command has updated state; only I/O happens here.
pub type CommandWork = BoxFuture<'static, ()>;

/// The saved-pages dashboard: one identity, one list, and the controls on it.
///
/// Cloning is cheap and shares all state. Commands update state in arrival
/// order on the input loop; only the fetches they start run on spawned tasks.
#[derive(Clone)]
pub struct Dashboard {
  identity: Arc<SessionIdentity>,
  cache: Arc<IdentityCache>,
  store: PaginationStore,
  scroll: Arc<ScrollTrigger>,
  tags: Arc<TagNavigator>,
  search: Arc<SearchController>,
  ui: Arc<dyn UiSink>,
}

impl Dashboard {
  pub fn new(
    config: &Config,
    identity: Arc<SessionIdentity>,
    kv: Arc<dyn KeyValueStore>,
    fetcher: Arc<dyn PageFetcher>,
    ui: Arc<dyn UiSink>,
    clock: Arc<dyn Clock>,
  ) -> Self {
    let cache = Arc::new(
      IdentityCache::new(identity.clone(), kv, clock)
        .with_prefix(config.cache.key_prefix.clone())
        .with_ttl(config.cache.ttl()),
    );
    let store = PaginationStore::new(cache.clone(), fetcher, ui.clone(), config.page_size);
    let target: Arc<dyn LoadMoreTarget> = Arc::new(store.clone());
    let scroll = ScrollTrigger::new(target, ui.clone()).with_margin(f64::from(config.scroll_margin_px));
    let search = SearchController::new(store.clone()).with_debounce(config.search_debounce());

    Self {
      identity,
      cache,
      tags: Arc::new(TagNavigator::new(store.clone())),
      search: Arc::new(search),
      scroll: Arc::new(scroll),
      store,
      ui,
    }
  }

  /// First load of the Default view.
  pub async fn start(&self) {
    self.cache.prune_legacy_key().await;
    self.clear_controls();
    if self.store.load_initial(self.store.active_filter().default_view()).await {
      self.reinit_scroll();
    }
  }

  fn clear_controls(&self) {
    self.search.reset();
    self.tags.clear();
    self.scroll.cleanup();
  }

  fn begin_default_view(&self) -> InitialLoad {
    self.clear_controls();
    self
      .store
      .begin_initial(self.store.active_filter().default_view())
  }

  /// Switch to another account. The previous account's cache entry is evicted
  /// by the identity cache on the next read.
  fn begin_sign_in(&self, user: &str) -> InitialLoad {
    info!(user, "signing in");
    self.identity.sign_in(user);
    self.begin_default_view()
  }

  /// Everything but the store wipe, which the caller awaits.
  fn begin_sign_out(&self) {
    info!("signing out");
    self.identity.sign_out();
    self.clear_controls();
    self.store.reset();
  }

  /// Complete a first-page load and put the sentinel after the new list.
  async fn finish(&self, load: InitialLoad) {
    if self.store.finish_initial(load).await {
      self.reinit_scroll();
    }
  }

  /// Drop the current identity's entry, then complete the reload.
  async fn finish_refresh(&self, load: InitialLoad) {
    self.cache.invalidate().await;
    self.finish(load).await;
  }

  fn reinit_scroll(&self) {
    self.scroll.init(self.store.snapshot().loaded());
  }

  fn spawnable(&self, load: InitialLoad) -> CommandWork {
    let dashboard = self.clone();
    async move { dashboard.finish(load).await }.boxed()
  }

  /// Apply a command's state change now and return the I/O still to run.
  pub fn dispatch(&self, command: UiCommand) -> Option<CommandWork> {
    debug!(?command, "command");
    match command {
      UiCommand::Search(text) => {
        self.search.on_search_change(&text);
        None
      }
      UiCommand::ClearSearch => Some(self.spawnable(self.search.clear_search())),
      UiCommand::Tag(step) => Some(self.spawnable(self.tags.handle_tag_click(&step.kind, &step.label))),
      UiCommand::Breadcrumb(index) => match self.tags.navigate_to_breadcrumb(index) {
        Some(load) => Some(self.spawnable(load)),
        None => {
          let depth = self.tags.breadcrumbs().len();
          self.ui.show_error(&format!(
            "No breadcrumb {} (the current path has {})",
            index + 1,
            depth
          ));
          None
        }
      },
      UiCommand::Home => {
        self.search.reset();
        Some(self.spawnable(self.tags.reset_to_default_view()))
      }
      UiCommand::More => Some(self.scroll_to_end()),
      UiCommand::Refresh => {
        let load = self.store.begin_initial(self.store.active_filter());
        let dashboard = self.clone();
        Some(async move { dashboard.finish_refresh(load).await }.boxed())
      }
      UiCommand::SignIn(user) => Some(self.spawnable(self.begin_sign_in(&user))),
      UiCommand::SignOut => {
        self.begin_sign_out();
        let cache = self.cache.clone();
        Some(async move { cache.clear_all().await }.boxed())
      }
      UiCommand::Help => {
        println!("{}", help_text());
        None
      }
      UiCommand::Quit => None,
    }
  }

  /// Scroll the console viewport to the end of the list.
  fn scroll_to_end(&self) -> CommandWork {
    // A debounced search may have replaced the list since the sentinel was placed
    let loaded = self.store.snapshot().loaded();
    self.scroll.reposition(loaded);
    let sentinel_top = loaded as f64 * ROW_HEIGHT_PX;
    let viewport = Viewport {
      top: (sentinel_top - SCREEN_HEIGHT_PX).max(0.0),
      height: SCREEN_HEIGHT_PX,
    };

    let scroll = self.scroll.clone();
    let store = self.store.clone();
    async move {
      if scroll.on_viewport_change(viewport, sentinel_top).await {
        scroll.reposition(store.snapshot().loaded());
      }
    }
    .boxed()
  }

  /// Dispatch a command and wait for everything it started.
  #[cfg(test)]
  pub async fn handle_command(&self, command: UiCommand) {
    if let Some(work) = self.dispatch(command) {
      work.await;
    }
  }

  /// Read commands from stdin until `quit` or end of input.
  pub async fn run(&self) -> Result<()> {
    let mut events = EventHandler::stdin();

    self.start().await;

    while let Some(event) = events.next().await {
      match event {
        Event::Command(UiCommand::Quit) | Event::Eof => break,
        Event::Command(command) => {
          // The store wipe finishes before later commands can write to it
          let inline = command == UiCommand::SignOut;
          if let Some(work) = self.dispatch(command) {
            if inline {
              work.await;
            } else {
              tokio::spawn(work);
            }
          }
        }
        Event::Invalid(message) => eprintln!("{}", message),
      }
    }

    self.search.reset();
    self.scroll.cleanup();
    Ok(())
  }
}
