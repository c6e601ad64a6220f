use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Shared application context for global flags
#[derive(Clone, Debug)]
pub struct AppContext {
    pub quiet: bool,    // global --quiet
    pub no_color: bool, // global --no-color
    pub dry_run: bool,  // global --dry-run
}

#[derive(Parser)]
#[command(name = "patchup")]
#[command(
    about = "A precise, transactional find-and-replace CLI for applying batched edits to text files"
)]
#[command(version, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Show what would be done without writing target files
    #[arg(long, global = true)]
    pub dry_run: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Apply a batch of find-and-replace edits from a request document
    Apply(ApplyArgs),

    /// Initialize a patchup.toml config file
    Init(InitArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Parser)]
pub struct ApplyArgs {
    /// Request document (JSON); use '-' to read from stdin
    pub request: String,

    /// Skip the pre-edit backup (single-file requests only)
    #[arg(long)]
    pub no_backup: bool,

    /// Include the final file content in the report
    #[arg(long)]
    pub include_content: bool,

    /// Emit the structured report as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Context lines around each hunk in dry-run previews
    #[arg(long)]
    pub context_lines: Option<usize>,
}

#[derive(Parser)]
pub struct InitArgs {
    /// Overwrite an existing config file
    #[arg(long)]
    pub force: bool,

    /// Where to write the config
    #[arg(long, default_value = "patchup.toml")]
    pub path: PathBuf,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[derive(Parser)]
pub struct CompletionsArgs {
    /// Target shell
    #[arg(value_enum)]
    pub shell: Shell,

    /// Write the completion file into this directory
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Print the completion script to stdout instead
    #[arg(long)]
    pub stdout: bool,
}
