// Command runner demo
//
// Runs `ls -la` in the current directory with a whitelist that only
// permits `ls`.
//
// Usage: cargo run --example command_demo

use std::sync::Arc;

use anyhow::Result;
use cmdguard::logging::{init_tracing, LogFormat, LogLevel, TracingSink};
use cmdguard::tools::{CommandManager, ManagerOptions, RawCommand, Whitelist};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing(LogLevel::Info, LogFormat::Pretty, false)?;

    let manager = CommandManager::new(
        vec![RawCommand::from("ls -la")],
        Whitelist::with_programs(["ls"]),
        ManagerOptions::default(),
    )?
    .with_sink(Arc::new(TracingSink::new("command_demo")));

    let report = manager.run_all().await?;
    for entry in &report.commands {
        println!("{} finished in {:?}", entry.command, entry.elapsed);
    }

    Ok(())
}
