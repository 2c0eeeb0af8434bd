use serde::{Deserialize, Serialize};

/// One level of a hierarchical classification, e.g. `domain: Travel`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TagStep {
  #[serde(rename = "type")]
  pub kind: String,
  pub label: String,
}

impl TagStep {
  pub fn new(kind: impl Into<String>, label: impl Into<String>) -> Self {
    Self {
      kind: kind.into(),
      label: label.into(),
    }
  }

  /// Case-insensitive match on both the type and the label.
  pub fn matches(&self, other: &TagStep) -> bool {
    self.kind.eq_ignore_ascii_case(&other.kind) && self.label.eq_ignore_ascii_case(&other.label)
  }
}

/// Ordered breadcrumb path. Operations return a new path and leave `self` untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagPath(Vec<TagStep>);

impl TagPath {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn steps(&self) -> &[TagStep] {
    &self.0
  }

  /// Extend the current lineage by one step.
  pub fn pushed(&self, step: TagStep) -> TagPath {
    let mut steps = self.0.clone();
    steps.push(step);
    TagPath(steps)
  }

  /// Keep the first `len` steps.
  pub fn truncated(&self, len: usize) -> TagPath {
    TagPath(self.0.iter().take(len).cloned().collect())
  }

  /// Labels for a breadcrumb bar, root first.
  pub fn breadcrumbs(&self) -> Vec<String> {
    self
      .0
      .iter()
      .map(|step| format!("{}: {}", step.kind, step.label))
      .collect()
  }
}

impl From<Vec<TagStep>> for TagPath {
  fn from(steps: Vec<TagStep>) -> Self {
    Self(steps)
  }
}

/// A saved page. Only `id` and `classifications` matter to the engine; the
/// rest is carried through untouched for rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRecord {
  pub id: String,
  #[serde(default)]
  pub url: String,
  #[serde(default)]
  pub title: String,
  #[serde(default)]
  pub tags: Vec<String>,
  /// AI-derived classification labels
  #[serde(default)]
  pub classifications: Vec<TagStep>,
  #[serde(flatten)]
  pub extra: serde_json::Map<String, serde_json::Value>,
}

impl PageRecord {
  /// AND semantics: every step in the path must be among this page's classifications.
  pub fn matches_tag_path(&self, path: &TagPath) -> bool {
    path
      .steps()
      .iter()
      .all(|step| self.classifications.iter().any(|c| c.matches(step)))
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationMeta {
  pub total: u64,
  pub has_next_page: bool,
  #[serde(default)]
  pub next_cursor: Option<String>,
}

/// One fetched page of results plus its pagination metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponsePage {
  #[serde(rename = "pages")]
  pub items: Vec<PageRecord>,
  pub pagination: PaginationMeta,
}

/// Filter context for the dashboard. An empty search and empty tag path is
/// the Default view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterState {
  pub search: String,
  pub tag_path: TagPath,
  pub limit: u32,
  pub offset: u64,
}

impl FilterState {
  pub fn new(limit: u32) -> Self {
    Self {
      search: String::new(),
      tag_path: TagPath::new(),
      limit,
      offset: 0,
    }
  }

  pub fn is_default_view(&self) -> bool {
    self.search.trim().is_empty() && self.tag_path.is_empty()
  }

  /// Changing the search text starts a new filter context at offset 0.
  pub fn with_search(&self, search: impl Into<String>) -> Self {
    Self {
      search: search.into(),
      offset: 0,
      ..self.clone()
    }
  }

  /// Changing the tag path starts a new filter context at offset 0.
  pub fn with_tag_path(&self, tag_path: TagPath) -> Self {
    Self {
      tag_path,
      offset: 0,
      ..self.clone()
    }
  }

  /// Same filter with no search and no tags.
  pub fn default_view(&self) -> Self {
    Self::new(self.limit)
  }
}

/// Where the next page starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageAnchor {
  Offset(u64),
  Cursor(String),
}

/// Request handed to the remote fetch collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
  pub search: String,
  pub tag_path: TagPath,
  pub limit: u32,
  pub anchor: PageAnchor,
}

impl FetchRequest {
  pub fn first_page(filter: &FilterState) -> Self {
    Self {
      search: filter.search.trim().to_string(),
      tag_path: filter.tag_path.clone(),
      limit: filter.limit,
      anchor: PageAnchor::Offset(0),
    }
  }

  pub fn next_page(filter: &FilterState, anchor: PageAnchor) -> Self {
    Self {
      anchor,
      ..Self::first_page(filter)
    }
  }
}
