//! Serde types matching the saved-pages search API.
//!
//! These are kept apart from the domain types so the wire format can drift
//! (extra fields, missing pagination) without leaking into the engine.

use serde::{Deserialize, Serialize};

use super::types::{FetchRequest, PageAnchor, PageRecord, PaginationMeta, ResponsePage, TagStep};

// ============================================================================
// Search request body
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiSearchRequest<'a> {
  pub search: &'a str,
  pub tag_path: &'a [TagStep],
  pub limit: u32,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub offset: Option<u64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub cursor: Option<&'a str>,
}

impl<'a> From<&'a FetchRequest> for ApiSearchRequest<'a> {
  fn from(request: &'a FetchRequest) -> Self {
    let (offset, cursor) = match &request.anchor {
      PageAnchor::Offset(offset) => (Some(*offset), None),
      PageAnchor::Cursor(cursor) => (None, Some(cursor.as_str())),
    };
    Self {
      search: &request.search,
      tag_path: request.tag_path.steps(),
      limit: request.limit,
      offset,
      cursor,
    }
  }
}

// ============================================================================
// Search response
// ============================================================================

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ApiPagination {
  #[serde(default)]
  pub total: Option<u64>,
  #[serde(default)]
  pub has_next_page: bool,
  #[serde(default)]
  pub next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApiSearchResponse {
  #[serde(default)]
  pub pages: Vec<PageRecord>,
  #[serde(default)]
  pub pagination: ApiPagination,
}

impl ApiSearchResponse {
  /// Convert into a domain page. A missing total falls back to the number of
  /// records received relative to the request's offset.
  pub fn into_page(self, request: &FetchRequest) -> ResponsePage {
    let received = self.pages.len() as u64;
    let total = self.pagination.total.unwrap_or(match request.anchor {
      PageAnchor::Offset(offset) => offset + received,
      PageAnchor::Cursor(_) => received,
    });
    ResponsePage {
      items: self.pages,
      pagination: PaginationMeta {
        total,
        has_next_page: self.pagination.has_next_page,
        next_cursor: self.pagination.next_cursor.filter(|c| !c.is_empty()),
      },
    }
  }
}
