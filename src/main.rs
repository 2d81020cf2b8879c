use clap::Parser;

use treewatch::cli::commands::{init, watch};
use treewatch::cli::{Cli, Commands};
use treewatch::{Settings, logging};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Load configuration
    let settings = match &cli.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    }
    .unwrap_or_else(|e| {
        eprintln!("Configuration error: {e}");
        Settings::default()
    });

    logging::init_with_config(&settings.logging);

    match cli.command {
        Commands::Init { force } => init::run_init(force),

        Commands::Config => init::run_config(&settings),

        Commands::Watch {
            root,
            log_file,
            quiet,
            single_level,
        } => {
            let args = watch::WatchArgs {
                root,
                log_file,
                quiet,
                single_level,
            };
            match watch::run(args, settings).await {
                Ok(stats) => {
                    eprintln!(
                        "Stopped after {} events ({} lines logged, {} directories added)",
                        stats.events, stats.lines_logged, stats.directories_added
                    );
                }
                Err(e) => {
                    eprintln!("Error: {e:#}");
                    std::process::exit(1);
                }
            }
        }
    }
}
