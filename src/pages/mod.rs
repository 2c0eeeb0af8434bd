//! Saved-pages domain types and the remote fetch collaborator.

pub mod api_types;
pub mod client;
pub mod types;

use color_eyre::Result;
use futures::future::BoxFuture;

pub use client::HttpPageFetcher;
pub use types::{
  FetchRequest, FilterState, PageAnchor, PageRecord, PaginationMeta, ResponsePage, TagPath,
  TagStep,
};

/// Remote paginated fetch API.
///
/// Failures are reported as errors and never retried by the caller.
pub trait PageFetcher: Send + Sync {
  fn fetch(&self, request: FetchRequest) -> BoxFuture<'_, Result<ResponsePage>>;
}
