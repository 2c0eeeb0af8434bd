//! Test doubles for the engine's collaborators.

use color_eyre::{eyre::eyre, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::oneshot;

use crate::cache::{Clock, KeyValueStore};
use crate::pages::{FetchRequest, PageFetcher, PageRecord, PaginationMeta, ResponsePage, TagStep};
use crate::ui::{PageView, UiSink};

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock(AtomicI64);

impl ManualClock {
  pub fn new(now_ms: i64) -> Self {
    Self(AtomicI64::new(now_ms))
  }

  pub fn advance(&self, ms: i64) {
    self.0.fetch_add(ms, Ordering::SeqCst);
  }
}

impl Clock for ManualClock {
  fn now_ms(&self) -> i64 {
    self.0.load(Ordering::SeqCst)
  }
}

/// Store whose every operation fails.
pub struct FailingStore;

impl KeyValueStore for FailingStore {
  fn get<'a>(&'a self, _key: &'a str) -> BoxFuture<'a, Result<Option<String>>> {
    async { Err(eyre!("store unavailable")) }.boxed()
  }

  fn set<'a>(&'a self, _key: &'a str, _value: String) -> BoxFuture<'a, Result<()>> {
    async { Err(eyre!("store unavailable")) }.boxed()
  }

  fn remove<'a>(&'a self, _key: &'a str) -> BoxFuture<'a, Result<()>> {
    async { Err(eyre!("store unavailable")) }.boxed()
  }

  fn clear(&self) -> BoxFuture<'_, Result<()>> {
    async { Err(eyre!("store unavailable")) }.boxed()
  }
}

type Reply = std::result::Result<ResponsePage, String>;

enum Scripted {
  Ready(Reply),
  Gated(oneshot::Receiver<Reply>),
}

/// Fetcher that replays queued responses and records every request.
#[derive(Default)]
pub struct ScriptedFetcher {
  replies: Mutex<VecDeque<Scripted>>,
  requests: Mutex<Vec<FetchRequest>>,
}

impl ScriptedFetcher {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn push_ok(&self, page: ResponsePage) {
    self.push(Scripted::Ready(Ok(page)));
  }

  pub fn push_err(&self, message: &str) {
    self.push(Scripted::Ready(Err(message.to_string())));
  }

  /// Queue a response that resolves only when the returned sender fires.
  pub fn push_gated(&self) -> oneshot::Sender<Reply> {
    let (tx, rx) = oneshot::channel();
    self.push(Scripted::Gated(rx));
    tx
  }

  fn push(&self, scripted: Scripted) {
    self.replies.lock().unwrap().push_back(scripted);
  }

  pub fn calls(&self) -> usize {
    self.requests.lock().unwrap().len()
  }

  pub fn requests(&self) -> Vec<FetchRequest> {
    self.requests.lock().unwrap().clone()
  }
}

impl PageFetcher for ScriptedFetcher {
  fn fetch(&self, request: FetchRequest) -> BoxFuture<'_, Result<ResponsePage>> {
    self.requests.lock().unwrap().push(request);
    let next = self.replies.lock().unwrap().pop_front();
    async move {
      let reply = match next {
        Some(Scripted::Ready(reply)) => reply,
        Some(Scripted::Gated(rx)) => rx.await.unwrap_or_else(|_| Err("gate dropped".into())),
        None => Err("no scripted response".into()),
      };
      reply.map_err(|e| eyre!(e))
    }
    .boxed()
  }
}

/// Render layer that remembers everything it was told.
#[derive(Default)]
pub struct RecordingUi {
  renders: Mutex<Vec<PageView>>,
  errors: Mutex<Vec<String>>,
  shown: AtomicUsize,
  hidden: AtomicUsize,
}

impl RecordingUi {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn last_render(&self) -> Option<PageView> {
    self.renders.lock().unwrap().last().cloned()
  }

  pub fn render_count(&self) -> usize {
    self.renders.lock().unwrap().len()
  }

  pub fn errors(&self) -> Vec<String> {
    self.errors.lock().unwrap().clone()
  }

  pub fn indicator_calls(&self) -> (usize, usize) {
    (
      self.shown.load(Ordering::SeqCst),
      self.hidden.load(Ordering::SeqCst),
    )
  }
}

impl UiSink for RecordingUi {
  fn render(&self, view: &PageView) {
    self.renders.lock().unwrap().push(view.clone());
  }

  fn show_error(&self, message: &str) {
    self.errors.lock().unwrap().push(message.to_string());
  }

  fn show_loading_indicator(&self) {
    self.shown.fetch_add(1, Ordering::SeqCst);
  }

  fn hide_loading_indicator(&self) {
    self.hidden.fetch_add(1, Ordering::SeqCst);
  }
}

pub fn record(id: &str) -> PageRecord {
  PageRecord {
    id: id.to_string(),
    url: format!("https://example.com/{}", id),
    title: format!("Page {}", id),
    tags: Vec::new(),
    classifications: vec![TagStep::new("domain", "Travel")],
    extra: Default::default(),
  }
}

/// Page of records `start..end` out of `total`.
pub fn page_of(start: usize, end: usize, total: u64, has_next_page: bool) -> ResponsePage {
  ResponsePage {
    items: (start..end).map(|i| record(&format!("p{}", i))).collect(),
    pagination: PaginationMeta {
      total,
      has_next_page,
      next_cursor: None,
    },
  }
}
