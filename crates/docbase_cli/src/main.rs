//! docbase CLI
//!
//! Command-line tools for docbase store management.
//!
//! # Commands
//!
//! - `inspect` - Display store statistics from a data log
//! - `issue-token` - Issue a signed subscription token
//! - `verify-token` - Verify a token and print its claims

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// docbase command-line store tools.
#[derive(Parser)]
#[command(name = "docbase")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display store statistics from a data log
    Inspect {
        /// Show per-collection details
        #[arg(short, long)]
        collections: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Issue a signed subscription token
    IssueToken {
        /// Tenant the token is scoped to
        #[arg(short, long)]
        tenant: String,

        /// Collection grant, `*` for all collections
        #[arg(short, long, default_value = "*")]
        grant: String,

        /// Token lifetime in seconds
        #[arg(short, long)]
        lifetime: Option<u64>,

        /// Signing secret
        #[arg(short, long, env = "DOCBASE_SECRET")]
        secret: String,
    },

    /// Verify a token and print its claims
    VerifyToken {
        /// Hex-encoded token to verify
        token: String,

        /// Signing secret
        #[arg(short, long, env = "DOCBASE_SECRET")]
        secret: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Inspect {
            collections,
            format,
        } => {
            let path = cli.path.ok_or("Store path required for inspect")?;
            commands::inspect::run(&path, collections, &format)?;
        }
        Commands::IssueToken {
            tenant,
            grant,
            lifetime,
            secret,
        } => {
            commands::token::issue(&secret, &tenant, &grant, lifetime)?;
        }
        Commands::VerifyToken { token, secret } => {
            commands::token::verify(&secret, &token)?;
        }
        Commands::Version => {
            println!("docbase CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
