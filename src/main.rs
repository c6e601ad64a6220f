use clap::Parser;
use patchup::cli::{AppContext, Cli, Commands};
use patchup::core::apply::{CliError, exit_code_for};
use tracing_subscriber::EnvFilter;

fn main() {
    // Logs go to stderr and are RUST_LOG opt-in; stdout carries reports.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Build a context once, pass everywhere
    let ctx = AppContext {
        quiet: cli.quiet,
        no_color: cli.no_color,
        dry_run: cli.dry_run,
    };

    let result = match cli.command {
        Commands::Apply(args) => patchup::core::apply::run(args, &ctx),
        Commands::Init(args) => patchup::infra::config::init(args, &ctx),
        Commands::Completions(args) => patchup::completion::run(args, &ctx),
    };

    if let Err(err) = result {
        eprintln!("error: {err:#}");
        let code = err
            .downcast_ref::<CliError>()
            .map_or(1, exit_code_for);
        std::process::exit(code);
    }
}
