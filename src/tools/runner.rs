//! Sequential Runner
//!
//! Executes a validated [`CommandSet`] one command at a time, in order, and
//! stops at the first command that does not succeed.
//!
//! Per run the state moves `Idle -> Running -> {Completed | Aborted}`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use super::command_set::CommandSet;
use super::error::CommandError;
use super::executor::{ProcessExecutor, ToolExecutor};
use super::parser::CanonicalCommand;
use super::timeout::ExecutionTimeout;
use crate::logging::LogSink;

/// Summary message logged when every command succeeded
pub const ALL_COMMANDS_SUCCEEDED: &str = "All commands executed successfully";

/// Where the runner is in its current (or last) run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Aborted,
}

/// One successfully executed command
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandRecord {
    pub command: String,
    pub stdout: String,
    pub elapsed: Duration,
}

/// Everything a completed run produced
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub commands: Vec<CommandRecord>,
}

/// Drives a [`ProcessExecutor`] over a command set, fail-fast
pub struct SequentialRunner<E = ToolExecutor> {
    executor: E,
    timeout: ExecutionTimeout,
    sink: Arc<dyn LogSink>,
    state: RunState,
}

impl SequentialRunner<ToolExecutor> {
    /// Runner over a default [`ToolExecutor`] that shares `sink`
    pub fn new(timeout: ExecutionTimeout, sink: Arc<dyn LogSink>) -> Self {
        let executor = ToolExecutor::new().with_sink(Arc::clone(&sink));
        Self::with_executor(executor, timeout, sink)
    }
}

impl<E: ProcessExecutor> SequentialRunner<E> {
    pub fn with_executor(executor: E, timeout: ExecutionTimeout, sink: Arc<dyn LogSink>) -> Self {
        Self {
            executor,
            timeout,
            sink,
            state: RunState::Idle,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn timeout(&self) -> ExecutionTimeout {
        self.timeout
    }

    pub fn set_timeout(&mut self, timeout: ExecutionTimeout) {
        self.timeout = timeout;
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Run every command in `set`, in order
    ///
    /// # Errors
    ///
    /// Returns the classified error of the first command that fails, times
    /// out or cannot be launched. No later command is started.
    pub async fn run_all(&mut self, set: &CommandSet) -> Result<RunReport, CommandError> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        self.state = RunState::Running;
        debug!(%run_id, commands = set.len(), timeout = %self.timeout, "Starting command run");

        let mut records = Vec::with_capacity(set.len());
        for (index, command) in set.iter().enumerate() {
            match self.execute_one(command).await {
                Ok(record) => records.push(record),
                Err(e) => {
                    self.state = RunState::Aborted;
                    self.sink.error(&format!(
                        "Run aborted at command {} of {}: {}",
                        index + 1,
                        set.len(),
                        command
                    ));
                    return Err(e);
                }
            }
        }

        self.state = RunState::Completed;
        self.sink.info(ALL_COMMANDS_SUCCEEDED);

        Ok(RunReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            commands: records,
        })
    }

    /// Run a single command under the same outcome contract as [`run_all`](Self::run_all)
    ///
    /// Returns the captured stdout on success.
    pub async fn run_one(&mut self, command: &CanonicalCommand) -> Result<String, CommandError> {
        self.state = RunState::Running;
        match self.execute_one(command).await {
            Ok(record) => {
                self.state = RunState::Completed;
                Ok(record.stdout)
            }
            Err(e) => {
                self.state = RunState::Aborted;
                Err(e)
            }
        }
    }

    async fn execute_one(&self, command: &CanonicalCommand) -> Result<CommandRecord, CommandError> {
        let start = Instant::now();
        let stdout = self
            .executor
            .execute(command, self.timeout)
            .await
            .into_result(command)?;

        Ok(CommandRecord {
            command: command.command_line(),
            stdout,
            elapsed: start.elapsed(),
        })
    }
}
