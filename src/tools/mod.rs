//! Command Execution Subsystem
//!
//! Turns a caller-supplied list of commands into validated, tokenized
//! invocations and runs them one after another without ever going through a
//! shell.
//!
//! # Guarantees
//!
//! - **Whitelisting**: only programs named in the caller's [`Whitelist`] run
//! - **Search path check**: every program must resolve on `PATH` before anything runs
//! - **All-or-nothing validation**: a [`CommandSet`] is fully parsed and validated before execution
//! - **Timeouts**: each command is killed once it exceeds its [`ExecutionTimeout`]
//! - **Fail-fast**: the first failing command stops the run
//!
//! # Architecture
//!
//! - `parser.rs`: shell-lexical tokenization into [`CanonicalCommand`]s
//! - `validator.rs`: search path and whitelist checks
//! - `command_set.rs`: validated, ordered command lists
//! - `executor.rs`: subprocess execution with timeout handling
//! - `runner.rs`: sequential, fail-fast execution of a set
//! - `manager.rs`: facade tying the pieces together
//!
//! # Example
//!
//! ```no_run
//! use cmdguard::tools::{CommandManager, ManagerOptions, RawCommand, Whitelist};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let manager = CommandManager::new(
//!         vec![RawCommand::from("git status"), RawCommand::from(["gh", "--help"])],
//!         Whitelist::default(),
//!         ManagerOptions::default(),
//!     )?;
//!
//!     let report = manager.run_all().await?;
//!     for entry in &report.commands {
//!         println!("{} took {:?}", entry.command, entry.elapsed);
//!     }
//!
//!     Ok(())
//! }
//! ```

mod command_set;
mod error;
mod executor;
mod manager;
mod parser;
mod runner;
mod timeout;
mod validator;

pub use command_set::{CommandSet, SetPolicy};
pub use error::{CommandError, NO_ERROR_MESSAGE};
pub use executor::{
    ExecutionOutcome, ExecutorConfig, ProcessExecutor, ToolExecutor, MAX_OUTPUT_SIZE,
    UNKNOWN_EXIT_CODE,
};
pub use manager::{CommandManager, ManagerOptions};
pub use parser::{parse_all, parse_command, CanonicalCommand, RawCommand};
pub use runner::{CommandRecord, RunReport, RunState, SequentialRunner, ALL_COMMANDS_SUCCEEDED};
pub use timeout::{ExecutionTimeout, DEFAULT_TIMEOUT_SECS};
pub use validator::{
    CommandValidator, PathResolver, SystemPath, Whitelist, DEFAULT_PERMITTED_COMMANDS,
};
