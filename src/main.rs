// Copyright 2026 DCMR Harvest Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use dcmr_harvest::cli;
use dcmr_harvest::extract::Strictness;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "dcmr",
    about = "DCMR Harvest — crawl, download, and normalize the DC zoning code",
    version,
    after_help = "Run 'dcmr <command> --help' for details on each command."
)]
struct Cli {
    /// Output results as JSON (machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Suppress non-essential output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Enable verbose/debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl the subtitle/chapter/section hierarchy and download documents
    Crawl {
        /// JSON config file (defaults target DCMR Title 11)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Root folder for the downloaded tree
        #[arg(long)]
        root: Option<PathBuf>,
        /// Limit the run to these subtitle identifiers (e.g. "11-A"). Can
        /// be repeated.
        #[arg(long = "subtitle")]
        subtitles: Vec<String>,
        /// Post-click settle interval in milliseconds
        #[arg(long)]
        settle_ms: Option<u64>,
    },
    /// Rename downloaded documents from their extracted titles
    Rename {
        /// Root of the downloaded tree
        root: PathBuf,
        /// Title-pattern strictness (strict requires a 3+-digit ordinal)
        #[arg(long, default_value = "loose")]
        strictness: Strictness,
    },
    /// Look up zoning and historic-district attributes for an address
    Lookup {
        /// Street address (e.g. "1729 T St NW, Washington, DC")
        address: String,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set global flags via environment variables so all modules can check them
    if cli.json {
        std::env::set_var("DCMR_JSON", "1");
    }
    if cli.quiet {
        std::env::set_var("DCMR_QUIET", "1");
    }
    if cli.verbose {
        std::env::set_var("DCMR_VERBOSE", "1");
    }
    if cli.no_color {
        std::env::set_var("DCMR_NO_COLOR", "1");
    }

    let default_level = if cli.verbose {
        "dcmr_harvest=debug"
    } else if cli.quiet {
        "dcmr_harvest=error"
    } else {
        "dcmr_harvest=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(default_level.parse().unwrap()),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Crawl {
            config,
            root,
            subtitles,
            settle_ms,
        } => cli::crawl_cmd::run(config.as_deref(), root, &subtitles, settle_ms).await,
        Commands::Rename { root, strictness } => cli::rename_cmd::run(&root, strictness).await,
        Commands::Lookup { address } => cli::lookup_cmd::run(&address).await,
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "dcmr", &mut std::io::stdout());
            Ok(())
        }
    };

    // Consistent exit codes: 0=success, 1=error
    if let Err(e) = &result {
        if !cli::output::is_quiet() && !cli::output::is_json() {
            eprintln!("  Error: {e:#}");
        }
        if cli::output::is_json() {
            cli::output::print_json(&serde_json::json!({
                "error": true,
                "message": format!("{e:#}"),
            }));
        }
        std::process::exit(1);
    }

    result
}
