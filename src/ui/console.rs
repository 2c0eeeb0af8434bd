//! Line-oriented renderer for the terminal.

use std::io::Write;
use std::sync::{Mutex, PoisonError};

use super::{PageSource, PageView, UiSink};
use crate::commands::COMMANDS;
use crate::pages::{FilterState, PageRecord};

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

/// Header line: breadcrumbs and search for the filter on screen
pub fn format_header(filter: &FilterState) -> String {
  let mut parts = vec!["Saved pages".to_string()];
  parts.extend(
    filter
      .tag_path
      .breadcrumbs()
      .into_iter()
      .enumerate()
      .map(|(i, crumb)| format!("[{}] {}", i + 1, crumb)),
  );
  let mut header = parts.join(" > ");
  if !filter.search.trim().is_empty() {
    header.push_str(&format!("  /{}", filter.search.trim()));
  }
  header
}

pub fn format_item(position: usize, page: &PageRecord) -> String {
  let title = if page.title.is_empty() {
    &page.url
  } else {
    &page.title
  };
  let mut line = format!("{:>4}. {:<50} {}", position, truncate(title, 50), page.url);
  if !page.classifications.is_empty() {
    let labels: Vec<String> = page
      .classifications
      .iter()
      .map(|c| format!("{}:{}", c.kind, c.label))
      .collect();
    line.push_str(&format!("  [{}]", labels.join(", ")));
  }
  line
}

pub fn format_footer(view: &PageView) -> String {
  let source = match view.source {
    Some(PageSource::Cache) => " (cached)",
    _ => "",
  };
  let more = if view.has_next_page {
    " - 'more' to load the next page"
  } else {
    ""
  };
  format!(
    "Showing {} of {}{}{}",
    view.loaded(),
    view.total,
    source,
    more
  )
}

pub fn help_text() -> String {
  COMMANDS
    .iter()
    .map(|cmd| format!("  {:<32} {}", cmd.usage, cmd.description))
    .collect::<Vec<_>>()
    .join("\n")
}

#[derive(Debug, Default)]
struct Printed {
  filter: Option<FilterState>,
  items: usize,
  /// Footer or empty notice already shown for `items`
  settled: bool,
}

/// Prints to stdout. Appended pages only print the new rows.
#[derive(Debug, Default)]
pub struct ConsoleUi {
  printed: Mutex<Printed>,
}

impl ConsoleUi {
  pub fn new() -> Self {
    Self::default()
  }

  /// Lines to print for `view`, given what is already on screen.
  fn lines_for(&self, view: &PageView) -> Vec<String> {
    let mut printed = self.printed.lock().unwrap_or_else(PoisonError::into_inner);

    let mut context = view.filter.clone();
    context.offset = 0;
    let new_context = printed.filter.as_ref() != Some(&context) || view.loaded() < printed.items;

    if view.is_loading_initial {
      *printed = Printed {
        filter: Some(context),
        items: 0,
        settled: false,
      };
      return vec![format_header(&view.filter), "  loading...".to_string()];
    }

    let mut lines = Vec::new();
    if new_context {
      *printed = Printed {
        filter: Some(context),
        items: 0,
        settled: false,
      };
      lines.push(format_header(&view.filter));
    }

    if view.is_loading_more {
      return lines;
    }

    for (i, page) in view.items.iter().enumerate().skip(printed.items) {
      lines.push(format_item(i + 1, page));
    }
    if view.loaded() > printed.items {
      printed.items = view.loaded();
      printed.settled = false;
    }

    if !printed.settled {
      if view.items.is_empty() {
        lines.push("  No saved pages found.".to_string());
      } else {
        lines.push(format_footer(view));
      }
      printed.settled = true;
    }
    lines
  }
}

impl UiSink for ConsoleUi {
  fn render(&self, view: &PageView) {
    let lines = self.lines_for(view);
    if lines.is_empty() {
      return;
    }
    let mut out = std::io::stdout().lock();
    for line in lines {
      let _ = writeln!(out, "{}", line);
    }
    let _ = out.flush();
  }

  fn show_error(&self, message: &str) {
    eprintln!("error: {}", message);
  }

  fn show_loading_indicator(&self) {
    println!("  loading more...");
  }

  fn hide_loading_indicator(&self) {}
}
