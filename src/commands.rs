/// Available console commands and input parsing
use crate::pages::TagStep;

#[derive(Debug, Clone)]
pub struct Command {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub usage: &'static str,
  pub description: &'static str,
}

/// All available commands
pub const COMMANDS: &[Command] = &[
  Command {
    name: "search",
    aliases: &["s", "find"],
    usage: "search <text>   (or /<text>)",
    description: "Filter saved pages by text",
  },
  Command {
    name: "clear",
    aliases: &["c"],
    usage: "clear",
    description: "Clear the search immediately",
  },
  Command {
    name: "tag",
    aliases: &["t"],
    usage: "tag <type>:<label>",
    description: "Drill into a tag, extending the breadcrumb",
  },
  Command {
    name: "crumb",
    aliases: &["b", "breadcrumb"],
    usage: "crumb <n>",
    description: "Jump back to breadcrumb n (1 = root)",
  },
  Command {
    name: "home",
    aliases: &["h", "default"],
    usage: "home",
    description: "Back to the default view",
  },
  Command {
    name: "more",
    aliases: &["m", "next"],
    usage: "more",
    description: "Scroll to the end of the list and load more",
  },
  Command {
    name: "refresh",
    aliases: &["r", "reload"],
    usage: "refresh",
    description: "Drop the cached page and reload",
  },
  Command {
    name: "signin",
    aliases: &["login"],
    usage: "signin <user>",
    description: "Sign in as another user",
  },
  Command {
    name: "signout",
    aliases: &["logout"],
    usage: "signout",
    description: "Sign out and wipe the cache",
  },
  Command {
    name: "help",
    aliases: &["?"],
    usage: "help",
    description: "Show this list",
  },
  Command {
    name: "quit",
    aliases: &["q", "exit"],
    usage: "quit",
    description: "Exit pageshelf",
  },
];

/// Get autocomplete suggestions for a given input
pub fn get_suggestions(input: &str) -> Vec<&'static Command> {
  let input_lower = input.to_lowercase();

  if input_lower.is_empty() {
    return COMMANDS.iter().collect();
  }

  let mut matches: Vec<(&Command, u32)> = Vec::new();

  for cmd in COMMANDS {
    // Exact match on name
    if cmd.name == input_lower {
      matches.push((cmd, 0)); // Highest priority
      continue;
    }

    // Exact match on alias
    if cmd.aliases.contains(&input_lower.as_str()) {
      matches.push((cmd, 1));
      continue;
    }

    // Prefix match on name
    if cmd.name.starts_with(&input_lower) {
      matches.push((cmd, 2));
      continue;
    }

    // Prefix match on alias
    if cmd.aliases.iter().any(|a| a.starts_with(&input_lower)) {
      matches.push((cmd, 3));
    }
  }

  // Sort by priority
  matches.sort_by_key(|(_, priority)| *priority);

  matches.into_iter().map(|(cmd, _)| cmd).collect()
}

/// A user action decoded from one line of input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiCommand {
  Search(String),
  ClearSearch,
  Tag(TagStep),
  /// Zero-based breadcrumb index
  Breadcrumb(usize),
  Home,
  More,
  Refresh,
  SignIn(String),
  SignOut,
  Help,
  Quit,
}

/// Parse a line of console input.
pub fn parse_line(line: &str) -> Result<UiCommand, String> {
  let line = line.trim();

  if let Some(text) = line.strip_prefix('/') {
    return Ok(UiCommand::Search(text.to_string()));
  }

  let (word, rest) = match line.split_once(char::is_whitespace) {
    Some((word, rest)) => (word, rest.trim()),
    None => (line, ""),
  };

  if word.is_empty() {
    return Ok(UiCommand::More);
  }

  let cmd = get_suggestions(word)
    .into_iter()
    .next()
    .ok_or_else(|| format!("Unknown command '{}'. Type 'help' for a list.", word))?;

  match cmd.name {
    "search" => Ok(UiCommand::Search(rest.to_string())),
    "clear" => Ok(UiCommand::ClearSearch),
    "tag" => parse_tag(rest).map(UiCommand::Tag),
    "crumb" => {
      let n: usize = rest
        .parse()
        .map_err(|_| format!("Usage: {}", cmd.usage))?;
      if n == 0 {
        return Err("Breadcrumbs are numbered from 1".to_string());
      }
      Ok(UiCommand::Breadcrumb(n - 1))
    }
    "home" => Ok(UiCommand::Home),
    "more" => Ok(UiCommand::More),
    "refresh" => Ok(UiCommand::Refresh),
    "signin" if !rest.is_empty() => Ok(UiCommand::SignIn(rest.to_string())),
    "signin" => Err(format!("Usage: {}", cmd.usage)),
    "signout" => Ok(UiCommand::SignOut),
    "help" => Ok(UiCommand::Help),
    _ => Ok(UiCommand::Quit),
  }
}

/// `type:label` or `type label words`
fn parse_tag(rest: &str) -> Result<TagStep, String> {
  let (kind, label) = rest
    .split_once(':')
    .or_else(|| rest.split_once(char::is_whitespace))
    .ok_or_else(|| "Usage: tag <type>:<label>".to_string())?;
  let (kind, label) = (kind.trim(), label.trim());
  if kind.is_empty() || label.is_empty() {
    return Err("Usage: tag <type>:<label>".to_string());
  }
  Ok(TagStep::new(kind, label))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_empty_input_returns_all() {
    let suggestions = get_suggestions("");
    assert_eq!(suggestions.len(), COMMANDS.len());
  }

  #[test]
  fn test_alias_match() {
    let suggestions = get_suggestions("q");
    assert_eq!(suggestions[0].name, "quit");
  }

  #[test]
  fn test_prefix_match() {
    let suggestions = get_suggestions("ref");
    assert_eq!(suggestions[0].name, "refresh");
  }

  #[test]
  fn test_exact_name_beats_prefix() {
    assert_eq!(get_suggestions("signin")[0].name, "signin");
    assert_eq!(get_suggestions("signout")[0].name, "signout");
  }

  #[test]
  fn test_slash_is_search() {
    assert_eq!(
      parse_line("/hiking boots"),
      Ok(UiCommand::Search("hiking boots".into()))
    );
    assert_eq!(parse_line("/"), Ok(UiCommand::Search(String::new())));
  }

  #[test]
  fn test_tag_forms() {
    let expected = Ok(UiCommand::Tag(TagStep::new("domain", "Travel Plans")));
    assert_eq!(parse_line("tag domain:Travel Plans"), expected);
    assert_eq!(parse_line("t domain Travel Plans"), expected);
    assert!(parse_line("tag domain").is_err());
    assert!(parse_line("tag :x").is_err());
  }

  #[test]
  fn test_crumb_is_one_based() {
    assert_eq!(parse_line("crumb 1"), Ok(UiCommand::Breadcrumb(0)));
    assert!(parse_line("crumb 0").is_err());
    assert!(parse_line("crumb x").is_err());
  }

  #[test]
  fn test_blank_line_loads_more() {
    assert_eq!(parse_line("   "), Ok(UiCommand::More));
  }

  #[test]
  fn test_signin_requires_user() {
    assert_eq!(parse_line("login u2"), Ok(UiCommand::SignIn("u2".into())));
    assert!(parse_line("signin").is_err());
  }

  #[test]
  fn test_unknown_command() {
    assert!(parse_line("frobnicate").is_err());
  }
}
