//! Command-line interface definitions using clap
//!
//! This module defines the CLI structure for shortener using clap's derive macros.

use clap::{Parser, Subcommand};

/// Shortener - URL shortener storage core with deferred deletion
#[derive(Parser, Debug)]
#[command(name = "shortener")]
#[command(version)]
#[command(about = "URL shortener storage core with deferred deletion", long_about = None)]
pub struct Cli {
    /// Configuration file path (TOML)
    #[arg(long, short = 'c', global = true, default_value = "config.toml")]
    pub config: String,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Run the repository and deletion pipeline until Ctrl+C (default)
    Serve,

    /// Print user and URL counts from the configured repository
    Stats,

    /// Print the delete batches recorded in a fallback log
    InspectFallback {
        /// Fallback log path (default: deletion.fallback_log_path)
        path: Option<String>,
    },

    /// Apply the delete batches recorded in a fallback log to the repository
    ApplyFallback {
        /// Fallback log path (default: deletion.fallback_log_path)
        path: Option<String>,
    },

    /// Print a sample configuration file
    GenerateConfig,
}

impl Cli {
    pub fn command(&self) -> &Commands {
        self.command.as_ref().unwrap_or(&Commands::Serve)
    }
}
