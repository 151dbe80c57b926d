/// Available interactive commands and suggestion logic

#[derive(Debug, Clone)]
pub struct Command {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub description: &'static str,
}

/// All available commands
pub const COMMANDS: &[Command] = &[
  Command {
    name: "list",
    aliases: &["l", "ls"],
    description: "List stock moves (list [page] [product=..] [warehouse=..] [type=IN|OUT|ADJUST])",
  },
  Command {
    name: "next",
    aliases: &["n"],
    description: "Next page of the current list",
  },
  Command {
    name: "prev",
    aliases: &["p"],
    description: "Previous page of the current list",
  },
  Command {
    name: "show",
    aliases: &["s", "detail"],
    description: "Show one stock move (show <id>)",
  },
  Command {
    name: "set-ref",
    aliases: &["ref", "edit"],
    description: "Edit a move's reference (set-ref <id> <text>)",
  },
  Command {
    name: "refresh",
    aliases: &["r", "reload"],
    description: "Refetch the current list from the server",
  },
  Command {
    name: "help",
    aliases: &["h", "?"],
    description: "Show available commands",
  },
  Command {
    name: "quit",
    aliases: &["q", "exit"],
    description: "Exit kardex",
  },
];

/// Get suggestions for a given input
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
      continue;
    }

    // Fuzzy match (contains)
    if cmd.name.contains(&input_lower) {
      matches.push((cmd, 4));
      continue;
    }

    // Fuzzy match on alias
    if cmd.aliases.iter().any(|a| a.contains(&input_lower)) {
      matches.push((cmd, 5));
    }
  }

  // Sort by priority
  matches.sort_by_key(|(_, priority)| *priority);

  matches.into_iter().map(|(cmd, _)| cmd).collect()
}

/// Resolve an input word to a single command, when it matches a name or
/// alias exactly.
pub fn resolve(input: &str) -> Option<&'static Command> {
  let input_lower = input.to_lowercase();
  COMMANDS
    .iter()
    .find(|cmd| cmd.name == input_lower || cmd.aliases.contains(&input_lower.as_str()))
}
