//! Watch command - register the tree and run the dispatch loop.

use std::path::{Component, Path, PathBuf};

use anyhow::Context;

use crate::config::{Settings, WatchConfig};
use crate::watcher::{DispatchStats, ExtendPolicy};

/// Arguments for the watch command.
#[derive(Debug)]
pub struct WatchArgs {
    pub root: PathBuf,
    pub log_file: Option<PathBuf>,
    pub quiet: bool,
    pub single_level: bool,
}

/// Apply CLI overrides on top of the loaded watch settings.
pub fn effective_config(args: &WatchArgs, settings: &Settings) -> WatchConfig {
    let mut watch = settings.watch.clone();
    if let Some(log_file) = &args.log_file {
        watch.log_file = log_file.clone();
    }
    if args.quiet {
        watch.echo_stdout = false;
    }
    if args.single_level {
        watch.extend_policy = ExtendPolicy::Single;
    }
    watch
}

/// Absolute form of the root argument, without `.` components.
pub fn resolve_root(root: &Path, cwd: &Path) -> PathBuf {
    let joined = if root.is_absolute() {
        root.to_path_buf()
    } else {
        cwd.join(root)
    };
    joined
        .components()
        .filter(|component| !matches!(component, Component::CurDir))
        .collect()
}

/// Run the watch command until the stream ends or Ctrl-C is pressed.
#[cfg(target_os = "linux")]
pub async fn run(args: WatchArgs, settings: Settings) -> anyhow::Result<DispatchStats> {
    use std::sync::atomic::Ordering;

    use crate::watcher::{Dispatcher, InotifySource, LogSink};

    let cwd = std::env::current_dir().context("cannot determine current directory")?;
    let root = resolve_root(&args.root, &cwd);
    let watch = effective_config(&args, &settings);

    let source = InotifySource::new().context("cannot create inotify instance")?;
    let sink = LogSink::new(watch.log_path(&cwd)).with_echo(watch.echo_stdout);
    let log_path = sink.path().to_path_buf();
    let mut dispatcher = Dispatcher::new(source, sink, watch.dispatch_options());

    let shutdown = dispatcher.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Received shutdown signal");
            shutdown.store(true, Ordering::Relaxed);
        }
    });

    let stats = tokio::task::spawn_blocking(move || {
        let summary = dispatcher
            .watch_root(&root)
            .with_context(|| format!("cannot watch {}", root.display()))?;
        eprintln!(
            "Watching {} ({} directories)",
            root.display(),
            summary.registered
        );
        eprintln!("Recording changes to {}", log_path.display());

        dispatcher.run().context("event dispatch failed")
    })
    .await
    .context("dispatch thread panicked")??;

    Ok(stats)
}

#[cfg(not(target_os = "linux"))]
pub async fn run(_args: WatchArgs, _settings: Settings) -> anyhow::Result<DispatchStats> {
    anyhow::bail!("watching requires Linux inotify")
}
