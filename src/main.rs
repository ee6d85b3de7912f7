// cmdguard - Main Entry Point
//
// Command-line front end for the command runner:
// - Loads configuration (file + environment + flags)
// - Validates the configured commands against PATH and the whitelist
// - Runs them in order, stopping at the first failure

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cmdguard::config::Config;
use cmdguard::logging::{init_tracing, LogSink, TracingSink};
use cmdguard::tools::{CommandManager, RawCommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// cmdguard: run whitelisted commands in sequence
#[derive(Parser, Debug)]
#[command(name = "cmdguard")]
#[command(author = "cmdguard Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Validate and run whitelisted commands, one at a time", long_about = None)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (default: ~/.config/cmdguard/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate and run the configured commands
    Run(RunArgs),
    /// Validate the configured commands without running them
    Check {
        #[command(flatten)]
        run: RunArgs,

        /// Print the canonical commands as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the effective whitelist
    Whitelist {
        /// Additional program to permit (repeatable)
        #[arg(long = "allow", value_name = "PROG")]
        allow: Vec<String>,
    },
}

#[derive(clap::Args, Debug, Default)]
struct RunArgs {
    /// Additional program to permit (repeatable)
    #[arg(long = "allow", value_name = "PROG")]
    allow: Vec<String>,

    /// Per-command timeout in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<f64>,

    /// Succeed when there is nothing to run
    #[arg(long)]
    allow_empty: bool,

    /// Absolute directory to run commands in
    #[arg(long, value_name = "DIR")]
    workdir: Option<PathBuf>,

    /// Pass command stdout through instead of capturing it
    #[arg(long)]
    no_capture: bool,

    /// Commands to append to the configured ones, e.g. "git status"
    #[arg(value_name = "COMMAND")]
    commands: Vec<String>,
}

impl RunArgs {
    /// Layer the flags on top of the loaded configuration
    fn apply(self, config: &mut Config) -> Result<()> {
        config.runner.whitelist.extend(self.allow);
        if let Some(secs) = self.timeout {
            config.runner.timeout_secs = secs;
        }
        if self.allow_empty {
            config.runner.allow_empty = true;
        }
        if let Some(dir) = self.workdir {
            config.runner.working_dir = Some(dir);
        }
        if self.no_capture {
            config.runner.capture_stdout = false;
        }
        config
            .runner
            .commands
            .extend(self.commands.into_iter().map(RawCommand::Line));

        config.validate().context("Invalid command-line options")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();

    let config = load_config(args.config.as_deref())?;

    // Initialize tracing
    init_tracing(config.log_level()?, config.log_format()?, args.verbose)?;
    debug!("cmdguard v{} starting...", env!("CARGO_PKG_VERSION"));

    let sink: Arc<dyn LogSink> = Arc::new(TracingSink::new(config.logging.handle.clone()));

    match args.command {
        Some(Commands::Run(run)) => run_commands(config, run, sink).await?,
        Some(Commands::Check { run, json }) => check_commands(config, run, json)?,
        Some(Commands::Whitelist { allow }) => print_whitelist(config, allow),
        None => {
            info!("No command specified. Use \"cmdguard --help\" for usage.");
        }
    }

    Ok(())
}

fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    match path {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            Config::load_from_path(path)
        }
        None => Config::load(),
    }
}

fn build_manager(mut config: Config, run: RunArgs) -> Result<CommandManager> {
    run.apply(&mut config)?;
    let options = config.manager_options()?;
    let manager = CommandManager::new(config.runner.commands.clone(), config.whitelist(), options)?;
    Ok(manager)
}

/// Validate, then run every command
async fn run_commands(config: Config, run: RunArgs, sink: Arc<dyn LogSink>) -> Result<()> {
    let manager = build_manager(config, run)?.with_sink(sink);
    info!("Running {} command(s)", manager.commands().len());

    let report = manager.run_all().await?;
    debug!(run_id = %report.run_id, "Run finished");

    for entry in &report.commands {
        print!("{}", entry.stdout);
    }
    Ok(())
}

/// Validate only and print the canonical commands
fn check_commands(config: Config, run: RunArgs, json: bool) -> Result<()> {
    let manager = build_manager(config, run)?;

    if json {
        let rendered = serde_json::to_string_pretty(manager.commands())
            .context("Failed to serialize commands")?;
        println!("{}", rendered);
    } else {
        for command in manager.commands() {
            println!("{}", command);
        }
    }
    Ok(())
}

fn print_whitelist(config: Config, allow: Vec<String>) {
    let mut whitelist = config.whitelist();
    whitelist.extend(allow);
    for program in whitelist.iter() {
        println!("{}", program);
    }
}
