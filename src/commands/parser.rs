//! Parser for bot commands in issue, PR and comment bodies.
//!
//! This module provides a pure parser that extracts every mention-prefixed
//! line from unstructured text.

use super::types::ParsedCommand;

/// Parses every command line in `body`.
///
/// # Parsing Rules
///
/// - Each line is split on whitespace; blank lines are skipped
/// - A line is a command iff its first word is the mention, with or without
///   a leading `@` (so `bot` and `@bot` are equivalent)
/// - The match is exact and case-sensitive
/// - The remaining words, possibly none, form the command
/// - Commands are returned in line order
///
/// # Examples
///
/// ```
/// use snekomatic::commands::{ParsedCommand, parse_commands};
///
/// assert_eq!(
///     parse_commands(Some("Thanks!\n@snekomatic ping"), "snekomatic"),
///     vec![ParsedCommand::new(["ping"])]
/// );
/// assert!(parse_commands(None, "snekomatic").is_empty());
/// // Mentions must start the line:
/// assert!(parse_commands(Some("hey @snekomatic ping"), "snekomatic").is_empty());
/// ```
pub fn parse_commands(body: Option<&str>, mention: &str) -> Vec<ParsedCommand> {
    let Some(body) = body else {
        return Vec::new();
    };
    let mention = strip_at(mention);
    if mention.is_empty() {
        return Vec::new();
    }

    body.lines()
        .filter_map(|line| {
            let mut words = line.split_whitespace();
            let first = words.next()?;
            (strip_at(first) == mention).then(|| ParsedCommand::new(words))
        })
        .collect()
}

fn strip_at(token: &str) -> &str {
    token.strip_prefix('@').unwrap_or(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn words(commands: &[ParsedCommand]) -> Vec<Vec<&str>> {
        commands
            .iter()
            .map(|c| c.words.iter().map(String::as_str).collect())
            .collect()
    }

    #[test]
    fn single_command() {
        assert_eq!(words(&parse_commands(Some("/bot hi"), "/bot")), [["hi"]]);
    }

    #[test]
    fn bare_mention_and_blank_lines() {
        let parsed = parse_commands(Some("ok\n/bot\n\n/bot hello"), "/bot");
        assert_eq!(words(&parsed), vec![vec![], vec!["hello"]]);
    }

    #[test]
    fn no_body() {
        assert!(parse_commands(None, "/bot").is_empty());
    }

    #[test]
    fn at_prefix_optional_on_either_side() {
        for (body, mention) in [
            ("@bot ping", "bot"),
            ("bot ping", "bot"),
            ("bot ping", "@bot"),
            ("@bot ping", "@bot"),
        ] {
            assert_eq!(
                words(&parse_commands(Some(body), mention)),
                [["ping"]],
                "body {body:?} mention {mention:?}"
            );
        }
    }

    #[test]
    fn mention_must_match_exactly() {
        assert!(parse_commands(Some("@Bot ping"), "bot").is_empty());
        assert!(parse_commands(Some("@bots ping"), "bot").is_empty());
        assert!(parse_commands(Some("@bot, ping"), "bot").is_empty());
    }

    #[test]
    fn flexible_whitespace() {
        let parsed = parse_commands(Some("  @bot\tlabel   bug  \r\n"), "bot");
        assert_eq!(words(&parsed), [["label", "bug"]]);
    }

    #[test]
    fn empty_mention_matches_nothing() {
        assert!(parse_commands(Some("@ ping\nping"), "").is_empty());
        assert!(parse_commands(Some("@ ping"), "@").is_empty());
    }

    proptest! {
        #[test]
        fn never_panics(body: String, mention: String) {
            let _ = parse_commands(Some(&body), &mention);
        }

        /// Every parsed command corresponds to a line starting with the
        /// mention, and no such line is missed.
        #[test]
        fn one_command_per_mention_line(
            lines in prop::collection::vec(
                prop_oneof![
                    Just("@bot".to_string()),
                    "[a-z]{1,6}( [a-z]{1,6}){0,3}",
                    "@bot( [a-z]{1,6}){1,3}",
                ],
                0..8,
            )
        ) {
            let body = lines.join("\n");
            let expected = lines
                .iter()
                .filter(|l| l.split_whitespace().next().map(strip_at) == Some("bot"))
                .count();
            prop_assert_eq!(parse_commands(Some(&body), "bot").len(), expected);
        }
    }
}
