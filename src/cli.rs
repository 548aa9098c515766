use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use crate::strategy::Strategy;

#[derive(Debug, Parser)]
#[command(
    name = "vaultrag",
    about = "Ask questions about your notes vault",
    version
)]
pub struct Cli {
    /// Override the XDG data directory
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Config file (defaults to config.toml in the data directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Notes vault to index (overrides system.vault_path)
    #[arg(long, global = true)]
    pub vault: Option<PathBuf>,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Index new and changed notes (incremental)
    Index(IndexArgs),
    /// Retrieve passages relevant to a query
    Search(SearchArgs),
    /// Answer a question from the vault
    Ask(AskArgs),
    /// Show configuration and index statistics
    Status(StatusArgs),
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

// -- Index --

#[derive(Debug, Parser)]
pub struct IndexArgs {
    /// Clear the index and rebuild it from scratch
    #[arg(long)]
    pub rebuild: bool,

    /// Output the report as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Search --

#[derive(Debug, Parser)]
pub struct SearchArgs {
    /// The search query
    pub query: String,

    /// Retrieval strategy (overrides retrieval.strategy)
    #[arg(short, long, value_enum)]
    pub strategy: Option<Strategy>,

    /// Number of passages per retriever (overrides retrieval.top_k)
    #[arg(short = 'n', long)]
    pub count: Option<usize>,

    /// Do not fall back to web search when nothing is found
    #[arg(long)]
    pub no_web: bool,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Ask --

#[derive(Debug, Parser)]
pub struct AskArgs {
    /// The question
    pub query: String,

    /// Retrieval strategy (overrides retrieval.strategy)
    #[arg(short, long, value_enum)]
    pub strategy: Option<Strategy>,

    /// Do not fall back to web search when nothing is found
    #[arg(long)]
    pub no_web: bool,

    /// Output the answer as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Status --

#[derive(Debug, Parser)]
pub struct StatusArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Completions --

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsArgs {
    /// Generate shell completions and print to stdout.
    pub fn generate(&self) {
        let mut cmd = Cli::command();
        clap_complete::generate(
            self.shell,
            &mut cmd,
            "vaultrag",
            &mut std::io::stdout(),
        );
    }
}
