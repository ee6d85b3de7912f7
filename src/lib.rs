//! cmdguard Library
//!
//! Runs whitelisted development commands (git, pip, gh, ...) in sequence with
//! search-path validation, per-command timeouts and fail-fast semantics.

pub mod config;
pub mod logging;
pub mod tools;
pub mod workdir;
