//! Command types.

use std::fmt;

/// The words of one mention-prefixed line, with the mention removed.
///
/// A bare mention yields a command with no words.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedCommand {
    pub words: Vec<String>,
}

impl ParsedCommand {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            words: words.into_iter().map(Into::into).collect(),
        }
    }

    /// The command name (first word), if any.
    pub fn name(&self) -> Option<&str> {
        self.words.first().map(String::as_str)
    }

    /// Everything after the command name.
    pub fn args(&self) -> &[String] {
        self.words.get(1..).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

impl fmt::Display for ParsedCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.words.join(" "))
    }
}
