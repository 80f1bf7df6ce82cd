use anyhow::Result;
use clap::Parser;
use fragforge::cli::{AppContext, Cli, Commands};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_ansi(!cli.no_color)
        .init();

    // A broken config file should not block store access
    let mut config = fragforge::load_config().unwrap_or_else(|e| {
        tracing::warn!("ignoring configuration: {e:#}");
        Default::default()
    });
    if let Some(store) = &cli.store {
        config.store.path = store.display().to_string();
    }

    // Build a context once, pass everywhere
    let ctx = AppContext {
        quiet: cli.quiet,
        no_color: cli.no_color,
        dry_run: cli.dry_run,
        config,
    };

    match cli.command {
        Commands::Parametrize(args) => fragforge::parametrize_run(args, &ctx),
        Commands::Synthesize(args) => fragforge::synthesize_run(args, &ctx),
        Commands::Add(args) => fragforge::cli_ext::store_cmd::add(args, &ctx),
        Commands::Edit(args) => fragforge::cli_ext::store_cmd::edit(args, &ctx),
        Commands::Delete(args) => fragforge::cli_ext::store_cmd::delete(args, &ctx),
        Commands::Show(args) => fragforge::cli_ext::store_cmd::show(args, &ctx),
        Commands::List(args) => fragforge::cli_ext::store_cmd::list(args, &ctx),
        Commands::Folder(args) => fragforge::cli_ext::store_cmd::folder(args, &ctx),
        Commands::Init(args) => fragforge::infra::config::init(args, &ctx),
        Commands::Completions(args) => fragforge::completion::run(args, &ctx),
    }
}
