//! Command Manager
//!
//! Single entry point for embedding callers: takes the raw command list, the
//! whitelist and the run options, validates everything up front and then runs
//! the commands on request.

use std::sync::Arc;

use super::command_set::{CommandSet, SetPolicy};
use super::error::CommandError;
use super::executor::{ExecutorConfig, ProcessExecutor, ToolExecutor};
use super::parser::{parse_command, CanonicalCommand, RawCommand};
use super::runner::{RunReport, SequentialRunner};
use super::timeout::ExecutionTimeout;
use super::validator::{CommandValidator, PathResolver, SystemPath, Whitelist};
use crate::logging::{default_sink, LogSink};

/// Everything besides commands and whitelist that shapes a run
#[derive(Debug, Clone, Default)]
pub struct ManagerOptions {
    pub timeout: ExecutionTimeout,
    pub policy: SetPolicy,
    pub executor: ExecutorConfig,
}

impl ManagerOptions {
    pub fn with_timeout(mut self, timeout: ExecutionTimeout) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_policy(mut self, policy: SetPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_executor(mut self, executor: ExecutorConfig) -> Self {
        self.executor = executor;
        self
    }
}

/// Validated commands plus the means to run them
pub struct CommandManager<R = SystemPath> {
    raw_commands: Vec<RawCommand>,
    whitelist: Whitelist,
    options: ManagerOptions,
    validator: CommandValidator<R>,
    commands: CommandSet,
    sink: Arc<dyn LogSink>,
}

impl CommandManager<SystemPath> {
    /// Validate `raw_commands` against the real `PATH` and `whitelist`
    ///
    /// # Errors
    ///
    /// Any parse or validation error from building the [`CommandSet`]. No
    /// command has run when this fails.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use cmdguard::tools::{CommandManager, ManagerOptions, RawCommand, Whitelist};
    ///
    /// # async fn demo() -> Result<(), cmdguard::tools::CommandError> {
    /// let manager = CommandManager::new(
    ///     vec![RawCommand::from("git status")],
    ///     Whitelist::default(),
    ///     ManagerOptions::default(),
    /// )?;
    /// let report = manager.run_all().await?;
    /// println!("{}", report.commands[0].stdout);
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(
        raw_commands: Vec<RawCommand>,
        whitelist: Whitelist,
        options: ManagerOptions,
    ) -> Result<Self, CommandError> {
        Self::with_validator(raw_commands, whitelist, options, CommandValidator::new())
    }
}

impl<R: PathResolver> CommandManager<R> {
    /// Same as [`CommandManager::new`] with a caller-supplied validator
    pub fn with_validator(
        raw_commands: Vec<RawCommand>,
        whitelist: Whitelist,
        options: ManagerOptions,
        validator: CommandValidator<R>,
    ) -> Result<Self, CommandError> {
        let commands = CommandSet::build(&raw_commands, &whitelist, &validator, options.policy)?;

        Ok(Self {
            raw_commands,
            whitelist,
            options,
            validator,
            commands,
            sink: default_sink(),
        })
    }

    /// Route progress and outcome messages to `sink`
    pub fn with_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn commands(&self) -> &CommandSet {
        &self.commands
    }

    pub fn raw_commands(&self) -> &[RawCommand] {
        &self.raw_commands
    }

    pub fn whitelist(&self) -> &Whitelist {
        &self.whitelist
    }

    pub fn options(&self) -> &ManagerOptions {
        &self.options
    }

    /// Replace the whitelist and revalidate the commands against it
    ///
    /// On error the previous whitelist and commands are kept.
    pub fn set_whitelist(&mut self, whitelist: Whitelist) -> Result<(), CommandError> {
        let commands = CommandSet::build(
            &self.raw_commands,
            &whitelist,
            &self.validator,
            self.options.policy,
        )?;
        self.whitelist = whitelist;
        self.commands = commands;
        Ok(())
    }

    /// Run every command in order with the configured executor
    pub async fn run_all(&self) -> Result<RunReport, CommandError> {
        self.run_all_with(self.executor()).await
    }

    /// Run every command in order with a caller-supplied executor
    pub async fn run_all_with<E: ProcessExecutor>(&self, executor: E) -> Result<RunReport, CommandError> {
        let mut runner =
            SequentialRunner::with_executor(executor, self.options.timeout, Arc::clone(&self.sink));
        runner.run_all(&self.commands).await
    }

    /// Run a single command that is not part of the managed set
    ///
    /// The command is validated against the current whitelist first, so it
    /// gets the same checks as the managed commands.
    pub async fn run_one(&self, command: &CanonicalCommand) -> Result<String, CommandError> {
        self.validator.validate(command, &self.whitelist)?;
        let mut runner = SequentialRunner::with_executor(
            self.executor(),
            self.options.timeout,
            Arc::clone(&self.sink),
        );
        runner.run_one(command).await
    }

    /// Parse, validate and run a raw command
    pub async fn run_raw(&self, raw: &RawCommand) -> Result<String, CommandError> {
        let command = parse_command(raw)?;
        self.run_one(&command).await
    }

    fn executor(&self) -> ToolExecutor {
        ToolExecutor::with_config(self.options.executor.clone()).with_sink(Arc::clone(&self.sink))
    }
}

impl<R> std::fmt::Debug for CommandManager<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandManager")
            .field("commands", &self.commands)
            .field("whitelist", &self.whitelist)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{MemorySink, SinkLevel};
    use crate::tools::executor::ExecutionOutcome;
    use crate::tools::runner::ALL_COMMANDS_SUCCEEDED;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn mock_validator() -> CommandValidator<impl PathResolver> {
        CommandValidator::with_resolver(|program: &str| match program {
            "git" | "python" | "pip" | "gh" | "rm" | "ls" => {
                Some(PathBuf::from("/mock/path").join(program))
            }
            _ => None,
        })
    }

    fn mock_manager(raws: Vec<RawCommand>) -> Result<CommandManager<impl PathResolver>, CommandError> {
        CommandManager::with_validator(
            raws,
            Whitelist::default(),
            ManagerOptions::default(),
            mock_validator(),
        )
    }

    /// Succeeds for everything except `pip`, counting calls
    #[derive(Default)]
    struct CountingExecutor {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ProcessExecutor for CountingExecutor {
        async fn execute(
            &self,
            command: &CanonicalCommand,
            _timeout: ExecutionTimeout,
        ) -> ExecutionOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if command.program() == "pip" {
                ExecutionOutcome::Failure {
                    exit_code: 2,
                    stderr: "ERROR: No matching distribution".to_string(),
                }
            } else {
                ExecutionOutcome::Success {
                    stdout: String::new(),
                }
            }
        }
    }

    #[test]
    fn test_validation_happens_at_construction() {
        let err = mock_manager(vec![RawCommand::from(["rm", "-rf", "/"])]).unwrap_err();
        assert!(matches!(err, CommandError::ProgramNotPermitted { .. }));

        let err = mock_manager(vec![]).unwrap_err();
        assert_eq!(err, CommandError::EmptyCommandSet);
    }

    #[test]
    fn test_empty_allowed_by_options() {
        let manager = CommandManager::with_validator(
            vec![],
            Whitelist::default(),
            ManagerOptions::default().with_policy(SetPolicy::allowing_empty()),
            mock_validator(),
        )
        .unwrap();
        assert!(manager.commands().is_empty());
    }

    #[test]
    fn test_set_whitelist_revalidates() {
        let mut manager = mock_manager(vec![RawCommand::from("git status")]).unwrap();

        let err = manager
            .set_whitelist(Whitelist::with_programs(["ls"]))
            .unwrap_err();
        assert!(matches!(err, CommandError::ProgramNotPermitted { ref name } if name == "git"));
        // Rejected change leaves the manager untouched
        assert!(manager.whitelist().is_allowed("git"));

        manager
            .set_whitelist(Whitelist::with_programs(["git", "ls"]))
            .unwrap();
        assert!(manager.whitelist().is_allowed("ls"));
        assert_eq!(manager.commands().len(), 1);
    }

    #[tokio::test]
    async fn test_run_all_with_is_fail_fast() {
        let sink = Arc::new(MemorySink::new());
        let manager = mock_manager(vec![
            RawCommand::from("git status"),
            RawCommand::from("pip install nothing"),
            RawCommand::from("gh --help"),
        ])
        .unwrap()
        .with_sink(sink.clone());
        let executor = CountingExecutor::default();
        let calls = Arc::clone(&executor.calls);

        let err = manager.run_all_with(executor).await.unwrap_err();

        assert!(err.to_string().starts_with("Command failed: pip install nothing"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(!sink.contains(SinkLevel::Info, ALL_COMMANDS_SUCCEEDED));
    }

    #[tokio::test]
    async fn test_run_all_with_real_executor() {
        let sink = Arc::new(MemorySink::new());
        let manager = CommandManager::new(
            vec![RawCommand::from("echo hello")],
            Whitelist::with_programs(["echo"]),
            ManagerOptions::default(),
        )
        .unwrap()
        .with_sink(sink.clone());

        let report = manager.run_all().await.unwrap();

        assert_eq!(report.commands[0].stdout, "hello\n");
        assert!(sink.contains(SinkLevel::Info, "Command output:\nhello"));
        assert!(sink.contains(SinkLevel::Info, ALL_COMMANDS_SUCCEEDED));
    }

    #[tokio::test]
    async fn test_run_one_checks_current_whitelist() {
        let manager = CommandManager::new(
            vec![RawCommand::from("echo hello")],
            Whitelist::with_programs(["echo"]),
            ManagerOptions::default(),
        )
        .unwrap();

        let stdout = manager
            .run_one(&CanonicalCommand::new(["echo", "again"]).unwrap())
            .await
            .unwrap();
        assert_eq!(stdout, "again\n");

        let err = manager
            .run_raw(&RawCommand::from("sh -c 'exit 1'"))
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::ProgramNotPermitted { ref name } if name == "sh"));
    }

    #[tokio::test]
    async fn test_run_raw_reports_parse_errors() {
        let manager = mock_manager(vec![RawCommand::from("git status")]).unwrap();
        let err = manager
            .run_raw(&RawCommand::from("git commit -m 'unterminated"))
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::MalformedCommand { .. }));
    }

    #[test]
    fn test_options_builders() {
        let options = ManagerOptions::default()
            .with_timeout(ExecutionTimeout::from_secs_f64(5.0).unwrap())
            .with_executor(ExecutorConfig::default().without_stdout_capture());
        assert_eq!(options.timeout.as_secs_f64(), 5.0);
        assert!(!options.executor.capture_stdout);
        assert!(!options.policy.allow_empty);
    }
}
