// Configuration File Support
//
// This module provides configuration file parsing for cmdguard.
// Supports TOML format with environment variable overrides.
// Configuration files are loaded from XDG config directory: ~/.config/cmdguard/config.toml

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::logging::{LogFormat, LogLevel, DEFAULT_LOG_HANDLE};
use crate::tools::{
    ExecutionTimeout, ExecutorConfig, ManagerOptions, RawCommand, SetPolicy, Whitelist,
    DEFAULT_PERMITTED_COMMANDS, DEFAULT_TIMEOUT_SECS, MAX_OUTPUT_SIZE,
};
use crate::workdir::WorkingDir;

/// Accepted length range for the log handle
const LOG_HANDLE_LEN: std::ops::RangeInclusive<usize> = 4..=50;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// Command runner configuration
    pub runner: RunnerConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (debug, info, warning, error, critical)
    pub level: String,

    /// Log format (json, pretty, compact)
    pub format: String,

    /// Name attached to every command log event
    pub handle: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
            handle: DEFAULT_LOG_HANDLE.to_string(),
        }
    }
}

/// Command runner configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RunnerConfig {
    /// Per-command timeout in seconds
    pub timeout_secs: f64,

    /// Accept an empty command list
    pub allow_empty: bool,

    /// Programs permitted to run
    pub whitelist: Vec<String>,

    /// Capture child stdout instead of passing it through
    pub capture_stdout: bool,

    /// Maximum captured bytes per stream
    pub max_output_size: usize,

    /// Absolute directory to run commands in (default: current directory)
    pub working_dir: Option<PathBuf>,

    /// Commands to run, each a string or a list of strings
    pub commands: Vec<RawCommand>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            allow_empty: false,
            whitelist: DEFAULT_PERMITTED_COMMANDS
                .iter()
                .map(|p| p.to_string())
                .collect(),
            capture_stdout: true,
            max_output_size: MAX_OUTPUT_SIZE,
            working_dir: None,
            commands: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from the default XDG config directory
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    /// If the config file does not exist, returns default configuration.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    ///
    /// Environment overrides are applied whether or not the file exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or
    /// parsed, or if the resulting configuration is invalid.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let config = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file from {:?}", path))?;

            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file from {:?}", path))?;

            tracing::debug!("Loaded configuration from {:?}", path);
            config
        } else {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            Self::default()
        };

        let config = config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path
    ///
    /// Returns `~/.config/cmdguard/config.toml` on Linux
    pub fn config_path() -> PathBuf {
        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "cmdguard") {
            proj_dirs.config_dir().join("config.toml")
        } else {
            // Fallback if XDG dirs cannot be determined
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home)
                .join(".config")
                .join("cmdguard")
                .join("config.toml")
        }
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// Environment variables take precedence over config file values:
    /// - CMDGUARD_LOG_LEVEL
    /// - CMDGUARD_LOG_FORMAT
    /// - CMDGUARD_TIMEOUT_SECS
    /// - CMDGUARD_ALLOW_EMPTY
    fn apply_env_overrides(self) -> Self {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    fn apply_overrides_from<F>(mut self, var: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = var("CMDGUARD_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("CMDGUARD_LOG_FORMAT") {
            self.logging.format = format;
        }

        if let Some(secs) = var("CMDGUARD_TIMEOUT_SECS") {
            if let Ok(secs) = secs.parse::<f64>() {
                if ExecutionTimeout::from_secs_f64(secs).is_ok() {
                    self.runner.timeout_secs = secs;
                }
            }
        }
        if let Some(allow) = var("CMDGUARD_ALLOW_EMPTY") {
            self.runner.allow_empty = allow.parse().unwrap_or(self.runner.allow_empty);
        }

        self
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        self.log_level()?;
        self.log_format()?;

        if !LOG_HANDLE_LEN.contains(&self.logging.handle.chars().count()) {
            anyhow::bail!(
                "Log handle must be between {} and {} characters, got {:?}",
                LOG_HANDLE_LEN.start(),
                LOG_HANDLE_LEN.end(),
                self.logging.handle
            );
        }

        if ExecutionTimeout::from_secs_f64(self.runner.timeout_secs).is_err() {
            anyhow::bail!(
                "Runner timeout must be a positive number of seconds, got {}",
                self.runner.timeout_secs
            );
        }
        if self.runner.max_output_size == 0 {
            anyhow::bail!("Runner max output size must be > 0");
        }
        for program in &self.runner.whitelist {
            if program.trim().is_empty() {
                anyhow::bail!("Whitelist contains an empty program name");
            }
        }

        Ok(())
    }

    /// Parsed log level
    pub fn log_level(&self) -> Result<LogLevel> {
        self.logging.level.parse()
    }

    /// Parsed log format
    pub fn log_format(&self) -> Result<LogFormat> {
        self.logging.format.parse()
    }

    /// Whitelist built from `runner.whitelist`
    pub fn whitelist(&self) -> Whitelist {
        self.runner.whitelist.iter().cloned().collect()
    }

    /// Run options built from the `[runner]` section
    ///
    /// # Errors
    ///
    /// Returns an error if the timeout is invalid or the working directory
    /// fails validation.
    pub fn manager_options(&self) -> Result<ManagerOptions> {
        let timeout = ExecutionTimeout::from_secs_f64(self.runner.timeout_secs)
            .context("Invalid runner timeout")?;

        let mut executor =
            ExecutorConfig::default().with_max_output_size(self.runner.max_output_size);
        if !self.runner.capture_stdout {
            executor = executor.without_stdout_capture();
        }
        if let Some(dir) = &self.runner.working_dir {
            let dir = WorkingDir::new(dir.clone())
                .with_context(|| format!("Invalid working directory {:?}", dir))?;
            executor = executor.with_working_dir(dir);
        }

        Ok(ManagerOptions {
            timeout,
            policy: SetPolicy {
                allow_empty: self.runner.allow_empty,
            },
            executor,
        })
    }
}
