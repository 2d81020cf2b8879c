//! CLI argument parsing using clap.

use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use std::path::PathBuf;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Recursive directory watcher
#[derive(Parser, Debug)]
#[command(
    name = "treewatch",
    version = env!("CARGO_PKG_VERSION"),
    about = "Record filesystem mutations under a directory tree",
    long_about = "Watch every directory under a root, including ones created later, and append one line per mutation to a log file.",
    next_line_help = true,
    styles = clap_cargo_style()
)]
pub struct Cli {
    /// Path to custom settings.toml file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Watch a directory tree
    #[command(
        about = "Watch a directory tree and log every mutation",
        after_help = "Examples:\n  treewatch watch /srv/share\n  treewatch watch ./data --log-file /var/log/data.log --quiet\n\nLog format:\n  File: <directory>/<name> --- <EVENT>"
    )]
    Watch {
        /// Root directory to watch
        #[arg(value_name = "ROOT")]
        root: PathBuf,

        /// Mutation log (overrides watch.log_file)
        #[arg(long, value_name = "PATH")]
        log_file: Option<PathBuf>,

        /// Do not echo log lines to stdout
        #[arg(short, long)]
        quiet: bool,

        /// Register only new directories themselves, not their contents
        #[arg(long)]
        single_level: bool,
    },

    /// Initialize configuration
    #[command(about = "Create .treewatch/settings.toml with default configuration")]
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Show current configuration settings
    #[command(about = "Display active settings")]
    Config,
}
