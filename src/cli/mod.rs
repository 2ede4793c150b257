//! CLI module - Command-line interface for Gamekeep
//!
//! This module provides a structured CLI using clap for argument parsing.

mod commands;

use clap::{Parser, Subcommand};

/// Gamekeep - Account and access-control service for the game submission portal
#[derive(Parser)]
#[command(name = "gamekeep")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the API server with background maintenance jobs
    #[command(alias = "-d", alias = "--daemon")]
    Daemon,

    /// Create default config file
    #[command(alias = "--init")]
    Init,

    /// Create an administrator account
    CreateAdmin {
        /// Username for the new admin
        username: String,

        /// Email address for the new admin
        email: String,

        /// Password for the account; generated and printed when omitted
        #[arg(long)]
        password: Option<String>,
    },

    /// Mark long-dormant accounts inactive, then exit
    SweepInactive,
}

pub use commands::*;
