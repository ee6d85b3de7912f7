//! Command Set
//!
//! An ordered list of commands that has been parsed and validated as a whole.
//! Construction is all-or-nothing: every raw command is parsed before any is
//! validated, and the first problem aborts the build. Once built, a set is
//! immutable and its order is the execution order.

use std::ops::Deref;

use serde::Serialize;

use super::error::CommandError;
use super::parser::{parse_all, CanonicalCommand, RawCommand};
use super::validator::{CommandValidator, PathResolver, Whitelist};

/// Build policy for command sets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SetPolicy {
    /// Accept an empty command list instead of failing with
    /// [`CommandError::EmptyCommandSet`]. Off by default.
    pub allow_empty: bool,
}

impl SetPolicy {
    /// Policy that accepts an empty command list
    pub fn allowing_empty() -> Self {
        Self { allow_empty: true }
    }
}

/// Validated, ordered commands
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CommandSet {
    commands: Vec<CanonicalCommand>,
}

impl CommandSet {
    /// Parse and validate `raws` against `whitelist`
    ///
    /// # Errors
    ///
    /// - [`CommandError::EmptyCommandSet`] if `raws` is empty and the policy
    ///   does not allow it
    /// - [`CommandError::MalformedCommand`] for the first unparsable command
    /// - [`CommandError::ProgramNotFound`] / [`CommandError::ProgramNotPermitted`]
    ///   for the first command failing validation
    ///
    /// # Example
    ///
    /// ```
    /// use std::path::PathBuf;
    /// use cmdguard::tools::{CommandSet, CommandValidator, RawCommand, SetPolicy, Whitelist};
    ///
    /// let validator = CommandValidator::with_resolver(|p: &str| Some(PathBuf::from("/usr/bin").join(p)));
    /// let raws = vec![RawCommand::from("git status")];
    /// let set = CommandSet::build(&raws, &Whitelist::default(), &validator, SetPolicy::default()).unwrap();
    /// assert_eq!(set.len(), 1);
    /// ```
    pub fn build<R: PathResolver>(
        raws: &[RawCommand],
        whitelist: &Whitelist,
        validator: &CommandValidator<R>,
        policy: SetPolicy,
    ) -> Result<Self, CommandError> {
        if raws.is_empty() && !policy.allow_empty {
            return Err(CommandError::EmptyCommandSet);
        }

        let commands = parse_all(raws)?;
        validator.validate_all(&commands, whitelist)?;

        Ok(Self { commands })
    }

    /// Parse and validate against the real `PATH` with the default policy
    pub fn from_raw(raws: &[RawCommand], whitelist: &Whitelist) -> Result<Self, CommandError> {
        Self::build(raws, whitelist, &CommandValidator::new(), SetPolicy::default())
    }

    /// An empty set, for callers that allow running nothing
    pub fn empty() -> Self {
        Self {
            commands: Vec::new(),
        }
    }

    pub fn commands(&self) -> &[CanonicalCommand] {
        &self.commands
    }
}

impl Deref for CommandSet {
    type Target = [CanonicalCommand];

    fn deref(&self) -> &Self::Target {
        &self.commands
    }
}

impl<'a> IntoIterator for &'a CommandSet {
    type Item = &'a CanonicalCommand;
    type IntoIter = std::slice::Iter<'a, CanonicalCommand>;

    fn into_iter(self) -> Self::IntoIter {
        self.commands.iter()
    }
}
