//! REPL command parsing.

/// Commands offered for completion and hints.
pub const COMMANDS: &[&str] = &[
    "/list", "/new", "/switch", "/rename", "/delete", "/history", "/refs", "/help",
];

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Refresh the session list, optionally filtered by title
    List(Option<String>),
    New(Option<String>),
    /// Switch by id or by 1-based position in the last listing
    Switch(String),
    Rename(String),
    /// Delete the given session, or the active one
    Delete(Option<String>),
    History,
    /// Show the reference panel, optionally for one message
    Refs(Option<String>),
    Help,
    Quit,
    Ask(String),
    Unknown(String),
}

fn argument(rest: &str) -> Option<String> {
    let rest = rest.trim();
    (!rest.is_empty()).then(|| rest.to_string())
}

impl Command {
    /// Parses a trimmed, non-empty input line.
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line == "quit" || line == "exit" {
            return Command::Quit;
        }
        let Some(stripped) = line.strip_prefix('/') else {
            return Command::Ask(line.to_string());
        };
        let (name, rest) = stripped.split_once(char::is_whitespace).unwrap_or((stripped, ""));
        match name {
            "list" | "ls" => Command::List(argument(rest)),
            "new" => Command::New(argument(rest)),
            "switch" | "sw" => match argument(rest) {
                Some(target) => Command::Switch(target),
                None => Command::Unknown(line.to_string()),
            },
            "rename" => match argument(rest) {
                Some(title) => Command::Rename(title),
                None => Command::Unknown(line.to_string()),
            },
            "delete" | "rm" => Command::Delete(argument(rest)),
            "history" => Command::History,
            "refs" => Command::Refs(argument(rest)),
            "help" => Command::Help,
            _ => Command::Unknown(line.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_a_question() {
        assert_eq!(Command::parse("  what about asthma? "), Command::Ask("what about asthma?".into()));
    }

    #[test]
    fn test_commands_with_arguments() {
        assert_eq!(Command::parse("/new My chat"), Command::New(Some("My chat".into())));
        assert_eq!(Command::parse("/new"), Command::New(None));
        assert_eq!(Command::parse("/switch 2"), Command::Switch("2".into()));
        assert_eq!(Command::parse("/rename  Better title "), Command::Rename("Better title".into()));
        assert_eq!(Command::parse("/ls asthma"), Command::List(Some("asthma".into())));
        assert_eq!(Command::parse("/refs a1"), Command::Refs(Some("a1".into())));
        assert_eq!(Command::parse("/rm"), Command::Delete(None));
    }

    #[test]
    fn test_missing_required_argument_is_unknown() {
        assert_eq!(Command::parse("/switch"), Command::Unknown("/switch".into()));
        assert_eq!(Command::parse("/rename   "), Command::Unknown("/rename".into()));
        assert_eq!(Command::parse("/frobnicate"), Command::Unknown("/frobnicate".into()));
    }

    #[test]
    fn test_quit_words() {
        assert_eq!(Command::parse("quit"), Command::Quit);
        assert_eq!(Command::parse("exit"), Command::Quit);
    }
}
