//! Event dispatch loop.
//!
//! Reads chunks from the notification source, decodes them in stream order,
//! logs every mutation of a visible entry and widens coverage when a
//! directory is created in or moved into a watched directory.

use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::decoder::{DecodedEvent, EventDecoder, HEADER_SIZE};
use super::error::{WatchError, WatchResult};
use super::kind::{MutationKind, MutationMask};
use super::registrar::{self, WalkSummary};
use super::registry::WatchRegistry;
use super::sink::LogSink;
use super::source::{NotifySource, ReadOutcome};

/// Smallest buffer guaranteed to hold one record with a maximal name.
pub const MIN_BUFFER_SIZE: usize = HEADER_SIZE + 256;

/// How a directory appearing under a watched directory is covered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtendPolicy {
    /// Walk the new directory and register its whole subtree.
    #[default]
    Recursive,
    /// Register only the new directory itself.
    Single,
}

/// Tunables for [`Dispatcher`].
#[derive(Debug, Clone)]
pub struct DispatchOptions {
    pub mask: MutationMask,
    pub buffer_size: usize,
    /// Upper bound on how long a read waits before the shutdown flag is rechecked.
    pub poll_interval: Duration,
    pub extend: ExtendPolicy,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            mask: MutationMask::DEFAULT_WATCH,
            buffer_size: 8192,
            poll_interval: Duration::from_millis(500),
            extend: ExtendPolicy::Recursive,
        }
    }
}

/// Counters collected while dispatching.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchStats {
    pub events: u64,
    pub lines_logged: u64,
    pub directories_added: u64,
    pub directories_forgotten: u64,
    pub truncated_chunks: u64,
    pub overflows: u64,
}

/// Owns the source, the registry and the sink, and runs the event loop.
pub struct Dispatcher<S: NotifySource> {
    source: S,
    registry: WatchRegistry,
    sink: LogSink,
    options: DispatchOptions,
    shutdown: Arc<AtomicBool>,
    stats: DispatchStats,
    buf: Vec<u8>,
}

impl<S: NotifySource> Dispatcher<S> {
    pub fn new(source: S, sink: LogSink, options: DispatchOptions) -> Self {
        let buf = vec![0u8; options.buffer_size.max(MIN_BUFFER_SIZE)];
        Self {
            source,
            registry: WatchRegistry::new(),
            sink,
            options,
            shutdown: Arc::new(AtomicBool::new(false)),
            stats: DispatchStats::default(),
            buf,
        }
    }

    /// Flag that stops [`run`](Self::run) before its next read once set.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    pub fn registry(&self) -> &WatchRegistry {
        &self.registry
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    /// Register the root tree. Call once before [`run`](Self::run).
    pub fn watch_root(&mut self, root: &Path) -> WatchResult<WalkSummary> {
        let summary =
            registrar::register_tree(&mut self.source, &mut self.registry, root, self.options.mask)?;
        crate::log_event!(
            "dispatch",
            "watching",
            "{} ({} directories, {} skipped)",
            root.display(),
            summary.registered,
            summary.skipped
        );
        Ok(summary)
    }

    /// Consume the event stream until it ends, shutdown is requested, or an
    /// unrecoverable error occurs.
    pub fn run(&mut self) -> WatchResult<DispatchStats> {
        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                crate::log_event!("dispatch", "shutdown requested");
                break;
            }
            if !self.step()? {
                crate::log_event!("dispatch", "event stream closed");
                break;
            }
        }

        Ok(self.stats)
    }

    /// Wait up to one poll interval for events and apply them.
    ///
    /// Returns `false` once the source reports end of stream.
    pub fn step(&mut self) -> WatchResult<bool> {
        let mut buf = std::mem::take(&mut self.buf);
        let result = self.read_and_apply(&mut buf);
        self.buf = buf;
        result
    }

    fn read_and_apply(&mut self, buf: &mut [u8]) -> WatchResult<bool> {
        let len = match self.source.read_events(buf, self.options.poll_interval) {
            Ok(ReadOutcome::TimedOut) => return Ok(true),
            Ok(ReadOutcome::Data(0)) => return Ok(false),
            Ok(ReadOutcome::Data(len)) => len,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => return Ok(true),
            Err(e) => return Err(WatchError::StreamRead(e)),
        };

        self.process_chunk(&buf[..len])?;
        Ok(true)
    }

    /// Apply every record in one read chunk, in order.
    ///
    /// A malformed tail is logged and the rest of the chunk discarded. Only an
    /// unknown handle is returned as an error.
    pub fn process_chunk(&mut self, chunk: &[u8]) -> WatchResult<()> {
        for event in EventDecoder::new(chunk) {
            match event {
                Ok(event) => self.apply(event)?,
                Err(e) => {
                    tracing::error!("[dispatch] {e}; discarding rest of chunk");
                    self.stats.truncated_chunks += 1;
                    break;
                }
            }
        }
        Ok(())
    }

    fn apply(&mut self, event: DecodedEvent) -> WatchResult<()> {
        self.stats.events += 1;

        if event.mask.contains(MutationMask::Q_OVERFLOW) {
            tracing::warn!("[dispatch] kernel event queue overflowed, events were lost");
            self.stats.overflows += 1;
            return Ok(());
        }

        if event.mask.contains(MutationMask::IGNORED) {
            if let Some(path) = self.registry.forget(event.handle) {
                crate::debug_event!("dispatch", "unwatched", "{} ({})", path.display(), event.handle);
                self.stats.directories_forgotten += 1;
            }
            return Ok(());
        }

        let dir = self.registry.resolve(event.handle)?.to_path_buf();

        let Some(name) = event.name.as_deref() else {
            crate::debug_event!("dispatch", "self event", "{} {:?}", dir.display(), event.mask);
            return Ok(());
        };

        if !event.is_hidden() {
            for kind in event.kinds() {
                if self.sink.record(&dir, name, kind) {
                    self.stats.lines_logged += 1;
                }
            }
        }

        if event.has_kind(MutationKind::Create) || event.has_kind(MutationKind::MovedTo) {
            self.extend_coverage(&dir, name);
        }

        Ok(())
    }

    /// Start watching `dir/name` if it turned out to be a directory.
    fn extend_coverage(&mut self, dir: &Path, name: &OsStr) {
        let candidate: PathBuf = dir.join(name);

        let metadata = match fs::symlink_metadata(&candidate) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                crate::debug_event!("dispatch", "gone before stat", "{}", candidate.display());
                return;
            }
            Err(e) => {
                tracing::warn!("[dispatch] cannot stat {}: {e}", candidate.display());
                return;
            }
        };
        if !metadata.is_dir() {
            return;
        }

        let mask = self.options.mask;
        let tracked_before = self.registry.len();
        let registered = match self.options.extend {
            ExtendPolicy::Recursive => {
                registrar::register_tree(&mut self.source, &mut self.registry, &candidate, mask)
                    .map(|summary| summary.registered)
            }
            ExtendPolicy::Single => {
                registrar::register_directory(&mut self.source, &mut self.registry, &candidate, mask)
                    .map(|_| 1)
            }
        };

        match registered {
            Ok(count) => {
                // A directory renamed within the tree comes back with the handles it already had
                let added = self.registry.len().saturating_sub(tracked_before);
                self.stats.directories_added += added as u64;
                crate::log_event!(
                    "dispatch",
                    "extended",
                    "{} ({count} directories, {added} new)",
                    candidate.display()
                );
            }
            Err(e) => tracing::warn!("[dispatch] not watching {}: {e}", candidate.display()),
        }
    }
}
