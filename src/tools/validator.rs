//! Command Validation Module
//!
//! A command may only run if its program resolves on the search path and is
//! named in the caller's whitelist. Existence is checked first, then
//! permission, so a missing program is always reported as missing.

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::error::CommandError;
use super::parser::CanonicalCommand;

/// Programs permitted when the caller does not supply a whitelist
pub const DEFAULT_PERMITTED_COMMANDS: [&str; 4] = ["git", "python", "pip", "gh"];

/// Set of program names permitted to execute
///
/// Owned and mutated by the caller; validators only ever borrow it, so a
/// change is seen by the next validation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Whitelist {
    programs: BTreeSet<String>,
}

impl Default for Whitelist {
    fn default() -> Self {
        Self::with_programs(DEFAULT_PERMITTED_COMMANDS)
    }
}

impl Whitelist {
    /// An empty whitelist (nothing may run)
    pub fn empty() -> Self {
        Self {
            programs: BTreeSet::new(),
        }
    }

    /// Create a whitelist from program names
    pub fn with_programs<I, S>(programs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            programs: programs.into_iter().map(Into::into).collect(),
        }
    }

    /// Permit a program. Returns `false` if it was already permitted.
    pub fn allow(&mut self, program: impl Into<String>) -> bool {
        self.programs.insert(program.into())
    }

    /// Stop permitting a program. Returns `false` if it was not permitted.
    pub fn revoke(&mut self, program: &str) -> bool {
        self.programs.remove(program)
    }

    /// Check if a program is in the whitelist
    pub fn is_allowed(&self, program: &str) -> bool {
        self.programs.contains(program)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.programs.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for Whitelist {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::with_programs(iter)
    }
}

impl<S: Into<String>> Extend<S> for Whitelist {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        self.programs.extend(iter.into_iter().map(Into::into));
    }
}

/// Resolves a program name to an executable on the search path
///
/// Any `Fn(&str) -> Option<PathBuf>` closure is a resolver, which keeps tests
/// independent of what happens to be installed.
pub trait PathResolver: Send + Sync {
    fn resolve(&self, program: &str) -> Option<PathBuf>;
}

impl<F> PathResolver for F
where
    F: Fn(&str) -> Option<PathBuf> + Send + Sync,
{
    fn resolve(&self, program: &str) -> Option<PathBuf> {
        self(program)
    }
}

/// Looks programs up on the process `PATH`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemPath;

impl PathResolver for SystemPath {
    fn resolve(&self, program: &str) -> Option<PathBuf> {
        which::which(program).ok()
    }
}

/// Command validator that enforces the search-path and whitelist checks
///
/// Holds no state beyond the resolver; the whitelist is passed per call.
#[derive(Debug, Clone, Default)]
pub struct CommandValidator<R = SystemPath> {
    resolver: R,
}

impl CommandValidator<SystemPath> {
    /// Create a validator that consults the real `PATH`
    pub fn new() -> Self {
        Self {
            resolver: SystemPath,
        }
    }
}

impl<R: PathResolver> CommandValidator<R> {
    /// Create a validator with a custom resolver
    pub fn with_resolver(resolver: R) -> Self {
        Self { resolver }
    }

    /// Validate one command against `whitelist`
    ///
    /// # Errors
    ///
    /// - [`CommandError::ProgramNotFound`] if the program does not resolve
    /// - [`CommandError::ProgramNotPermitted`] if it resolves but is not whitelisted
    ///
    /// # Example
    ///
    /// ```
    /// use std::path::PathBuf;
    /// use cmdguard::tools::{CanonicalCommand, CommandValidator, Whitelist};
    ///
    /// let validator = CommandValidator::with_resolver(|p: &str| Some(PathBuf::from("/usr/bin").join(p)));
    /// let cmd = CanonicalCommand::new(["git", "status"]).unwrap();
    /// assert!(validator.validate(&cmd, &Whitelist::default()).is_ok());
    /// ```
    pub fn validate(
        &self,
        command: &CanonicalCommand,
        whitelist: &Whitelist,
    ) -> Result<(), CommandError> {
        let program = command.program();
        self.check_search_path(program)?;
        Self::check_whitelist(program, whitelist)?;
        Ok(())
    }

    /// Validate every command, stopping at the first violation
    pub fn validate_all<'a, I>(&self, commands: I, whitelist: &Whitelist) -> Result<(), CommandError>
    where
        I: IntoIterator<Item = &'a CanonicalCommand>,
    {
        commands
            .into_iter()
            .try_for_each(|command| self.validate(command, whitelist))
    }

    /// Check that the program resolves on the search path
    fn check_search_path(&self, program: &str) -> Result<PathBuf, CommandError> {
        self.resolver
            .resolve(program)
            .ok_or_else(|| CommandError::ProgramNotFound {
                name: program.to_string(),
            })
    }

    /// Check if the program is in the whitelist
    fn check_whitelist(program: &str, whitelist: &Whitelist) -> Result<(), CommandError> {
        if !whitelist.is_allowed(program) {
            return Err(CommandError::ProgramNotPermitted {
                name: program.to_string(),
            });
        }
        Ok(())
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Resolver that only knows the given programs
    fn fake_path(known: &'static [&'static str]) -> impl PathResolver {
        move |program: &str| {
            known
                .contains(&program)
                .then(|| PathBuf::from("/mock/path").join(program))
        }
    }

    fn cmd(tokens: &[&str]) -> CanonicalCommand {
        CanonicalCommand::new(tokens.iter().copied()).unwrap()
    }

    #[test]
    fn test_default_whitelist() {
        let whitelist = Whitelist::default();

        assert!(whitelist.is_allowed("git"));
        assert!(whitelist.is_allowed("python"));
        assert!(whitelist.is_allowed("pip"));
        assert!(whitelist.is_allowed("gh"));
        assert_eq!(whitelist.len(), 4);

        assert!(!whitelist.is_allowed("rm"));
        assert!(!whitelist.is_allowed("bash"));
        assert!(!whitelist.is_allowed("ls"));
    }

    #[test]
    fn test_whitelist_mutation() {
        let mut whitelist = Whitelist::default();
        assert!(whitelist.allow("ls"));
        assert!(!whitelist.allow("ls"));
        assert!(whitelist.is_allowed("ls"));

        assert!(whitelist.revoke("git"));
        assert!(!whitelist.revoke("git"));
        assert!(!whitelist.is_allowed("git"));

        whitelist.extend(["make", "cargo"]);
        assert_eq!(
            whitelist.iter().collect::<Vec<_>>(),
            ["cargo", "gh", "ls", "make", "pip", "python"]
        );
    }

    #[test]
    fn test_empty_whitelist() {
        let whitelist = Whitelist::empty();
        assert!(whitelist.is_empty());
        let validator = CommandValidator::with_resolver(fake_path(&["git"]));
        let err = validator.validate(&cmd(&["git"]), &whitelist).unwrap_err();
        assert!(matches!(err, CommandError::ProgramNotPermitted { .. }));
    }

    #[test]
    fn test_validate_allowed_command() {
        let validator = CommandValidator::with_resolver(fake_path(&["git", "python"]));
        let result = validator.validate(&cmd(&["git", "status"]), &Whitelist::default());
        assert!(result.is_ok());
    }

    #[test]
    fn test_missing_program_reported_before_permission() {
        // Neither on the path nor whitelisted: existence wins
        let validator = CommandValidator::with_resolver(fake_path(&["git"]));
        let err = validator
            .validate(&cmd(&["nonexistent", "arg1"]), &Whitelist::default())
            .unwrap_err();
        assert_eq!(
            err,
            CommandError::ProgramNotFound {
                name: "nonexistent".to_string()
            }
        );
        assert_eq!(
            err.to_string(),
            "Command 'nonexistent' not found in system PATH"
        );
    }

    #[test]
    fn test_not_permitted_command() {
        let validator = CommandValidator::with_resolver(fake_path(&["rm"]));
        let err = validator
            .validate(&cmd(&["rm", "-rf", "/"]), &Whitelist::default())
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Command 'rm' is not in the permitted commands list"
        );
    }

    #[test]
    fn test_whitelist_change_seen_by_next_validation() {
        let validator = CommandValidator::with_resolver(fake_path(&["ls"]));
        let mut whitelist = Whitelist::default();
        let ls = cmd(&["ls", "-la", "/"]);

        assert!(validator.validate(&ls, &whitelist).is_err());
        whitelist.allow("ls");
        assert!(validator.validate(&ls, &whitelist).is_ok());
    }

    #[test]
    fn test_validate_all_stops_at_first_violation() {
        let validator = CommandValidator::with_resolver(fake_path(&["git", "python"]));
        let commands = vec![
            cmd(&["git", "status"]),
            cmd(&["nonexistent", "arg1"]),
            cmd(&["python", "--help"]),
        ];
        let err = validator
            .validate_all(&commands, &Whitelist::default())
            .unwrap_err();
        assert!(matches!(err, CommandError::ProgramNotFound { name } if name == "nonexistent"));
    }

    #[test]
    fn test_system_path_resolves_shell() {
        let validator = CommandValidator::new();
        assert!(validator.resolver().resolve("sh").is_some());
        assert!(validator
            .resolver()
            .resolve("this-command-does-not-exist-12345")
            .is_none());

        let err = validator
            .validate(
                &cmd(&["this-command-does-not-exist-12345"]),
                &Whitelist::with_programs(["this-command-does-not-exist-12345"]),
            )
            .unwrap_err();
        assert!(matches!(err, CommandError::ProgramNotFound { .. }));
    }

    proptest! {
        #[test]
        fn prop_unresolvable_programs_are_not_found(program in "[a-z][a-z0-9_-]{0,15}") {
            let validator = CommandValidator::with_resolver(|_: &str| None::<PathBuf>);
            let whitelist = Whitelist::with_programs([program.clone()]);
            let result = validator.validate(&cmd(&[program.as_str()]), &whitelist);
            prop_assert!(
                matches!(result, Err(CommandError::ProgramNotFound { .. })),
                "expected ProgramNotFound, got {:?}",
                result
            );
        }

        #[test]
        fn prop_resolvable_but_unlisted_programs_are_not_permitted(
            program in "[a-z][a-z0-9_-]{0,15}"
        ) {
            prop_assume!(!DEFAULT_PERMITTED_COMMANDS.contains(&program.as_str()));
            let validator =
                CommandValidator::with_resolver(|p: &str| Some(PathBuf::from("/mock/path").join(p)));
            let result = validator.validate(&cmd(&[program.as_str()]), &Whitelist::default());
            prop_assert!(
                matches!(result, Err(CommandError::ProgramNotPermitted { .. })),
                "expected ProgramNotPermitted, got {:?}",
                result
            );
        }
    }
}
