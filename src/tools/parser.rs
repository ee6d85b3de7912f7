//! Command Token Parser
//!
//! Turns the loose command forms accepted from callers and config files into
//! [`CanonicalCommand`]s: an ordered, non-empty list of argument tokens with the
//! program name first.
//!
//! Tokenization follows shell-lexical rules (quotes group words, unquoted
//! whitespace separates them). Nothing else a shell does is emulated: no
//! pipes, redirection, globbing or variable expansion.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::CommandError;

/// A command as supplied by a caller, before normalization
///
/// Config files may use either form:
///
/// ```toml
/// commands = ["git status", ["pip", "install", "-e", ".[dev]"]]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawCommand {
    /// A whole command line, e.g. `"pip install -e '.[dev]'"`
    Line(String),

    /// An argument list, possibly still holding a command line in its first slot
    Args(Vec<String>),
}

impl fmt::Display for RawCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Line(line) => f.write_str(line),
            Self::Args(args) => write!(f, "{:?}", args),
        }
    }
}

impl From<&str> for RawCommand {
    fn from(line: &str) -> Self {
        Self::Line(line.to_string())
    }
}

impl From<String> for RawCommand {
    fn from(line: String) -> Self {
        Self::Line(line)
    }
}

impl From<Vec<String>> for RawCommand {
    fn from(args: Vec<String>) -> Self {
        Self::Args(args)
    }
}

impl From<Vec<&str>> for RawCommand {
    fn from(args: Vec<&str>) -> Self {
        Self::Args(args.into_iter().map(str::to_string).collect())
    }
}

impl<const N: usize> From<[&str; N]> for RawCommand {
    fn from(args: [&str; N]) -> Self {
        Self::Args(args.iter().map(|s| s.to_string()).collect())
    }
}

/// A normalized command: `tokens[0]` is the program, the rest are its arguments
///
/// Never empty, and the program token never contains whitespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct CanonicalCommand {
    tokens: Vec<String>,
}

impl CanonicalCommand {
    /// Build a command from already-split tokens
    ///
    /// Tokens are taken verbatim. Fails if the list is empty or the program
    /// token is blank or contains whitespace.
    pub fn new<I, S>(tokens: I) -> Result<Self, CommandError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tokens: Vec<String> = tokens.into_iter().map(Into::into).collect();
        let raw = format!("{:?}", tokens);
        Self::from_tokens(tokens, raw)
    }

    fn from_tokens(tokens: Vec<String>, raw: String) -> Result<Self, CommandError> {
        let Some(program) = tokens.first() else {
            return Err(CommandError::MalformedCommand {
                raw,
                reason: "command is empty".to_string(),
            });
        };

        if program.trim().is_empty() {
            return Err(CommandError::MalformedCommand {
                raw,
                reason: "program name is blank".to_string(),
            });
        }

        if program.chars().any(char::is_whitespace) {
            return Err(CommandError::MalformedCommand {
                raw,
                reason: "program name contains whitespace".to_string(),
            });
        }

        Ok(Self { tokens })
    }

    /// The program name (first token)
    pub fn program(&self) -> &str {
        &self.tokens[0]
    }

    /// Arguments after the program name
    pub fn args(&self) -> &[String] {
        &self.tokens[1..]
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Command line suitable for logs, quoted so it can be pasted into a shell
    pub fn command_line(&self) -> String {
        shell_words::join(&self.tokens)
    }
}

impl fmt::Display for CanonicalCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command_line())
    }
}

impl PartialEq<[&str]> for CanonicalCommand {
    fn eq(&self, other: &[&str]) -> bool {
        self.tokens.len() == other.len() && self.tokens.iter().zip(other).all(|(a, b)| a == b)
    }
}

impl<const N: usize> PartialEq<[&str; N]> for CanonicalCommand {
    fn eq(&self, other: &[&str; N]) -> bool {
        self == &other[..]
    }
}

/// Normalize a raw command into canonical tokens
///
/// - A command line is split with shell quoting rules.
/// - An argument list whose first element contains whitespace has that element
///   split the same way; any remaining elements are appended verbatim.
/// - Any other argument list is taken as-is.
///
/// # Errors
///
/// Returns [`CommandError::MalformedCommand`] when quoting is unbalanced or the
/// result has no usable program token.
///
/// # Example
///
/// ```
/// use cmdguard::tools::{parse_command, RawCommand};
///
/// let raw = RawCommand::Args(vec!["pip install -e '.[dev]'".to_string()]);
/// let cmd = parse_command(&raw).unwrap();
/// assert_eq!(cmd.tokens(), ["pip", "install", "-e", ".[dev]"]);
/// ```
pub fn parse_command(raw: &RawCommand) -> Result<CanonicalCommand, CommandError> {
    let tokens = match raw {
        RawCommand::Line(line) => tokenize(line)?,
        RawCommand::Args(args) => match args.split_first() {
            Some((first, rest)) if first.chars().any(char::is_whitespace) => {
                let mut tokens = tokenize(first)?;
                tokens.extend(rest.iter().cloned());
                tokens
            }
            _ => args.clone(),
        },
    };

    CanonicalCommand::from_tokens(tokens, raw.to_string())
}

/// Parse every raw command, stopping at the first malformed one
pub fn parse_all<'a, I>(raws: I) -> Result<Vec<CanonicalCommand>, CommandError>
where
    I: IntoIterator<Item = &'a RawCommand>,
{
    raws.into_iter().map(parse_command).collect()
}

fn tokenize(line: &str) -> Result<Vec<String>, CommandError> {
    shell_words::split(line).map_err(|e| CommandError::MalformedCommand {
        raw: line.to_string(),
        reason: e.to_string(),
    })
}
