//! Recursive registration of a directory tree.
//!
//! The notification source only reports changes to the immediate children of
//! a watched directory, so full coverage requires registering every directory
//! in the tree individually.
//!
//! Symbolic links are never followed and never registered, whatever they
//! point to. Only the root itself is resolved if it is a link. Entries that
//! are neither directories nor links are ignored.

use std::fs;
use std::path::Path;

use walkdir::WalkDir;

use super::error::{WatchError, WatchResult};
use super::kind::MutationMask;
use super::registry::{WatchHandle, WatchRegistry};
use super::source::NotifySource;

/// Outcome of a tree walk.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WalkSummary {
    /// Directories now covered by a watch.
    pub registered: usize,
    /// Subtrees left uncovered because they could not be read or watched.
    pub skipped: usize,
}

/// Register a single directory and record its handle.
pub fn register_directory<S: NotifySource + ?Sized>(
    source: &mut S,
    registry: &mut WatchRegistry,
    path: &Path,
    mask: MutationMask,
) -> WatchResult<WatchHandle> {
    let handle = source.add_watch(path, mask)?;
    if let Some(previous) = registry.register(handle, path) {
        crate::debug_event!(
            "registry",
            "handle reused",
            "{handle}: {} -> {}",
            previous.display(),
            path.display()
        );
    }
    crate::debug_event!("registrar", "watching", "{} ({handle})", path.display());
    Ok(handle)
}

/// Register `root` and every directory below it.
///
/// Fails only if `root` itself cannot be opened as a directory or watched.
/// Problems further down are logged and the affected subtree is skipped.
pub fn register_tree<S: NotifySource + ?Sized>(
    source: &mut S,
    registry: &mut WatchRegistry,
    root: &Path,
    mask: MutationMask,
) -> WatchResult<WalkSummary> {
    let metadata = fs::metadata(root).map_err(|e| WatchError::from_open(root, e))?;
    if !metadata.is_dir() {
        return Err(WatchError::NotADirectory {
            path: root.to_path_buf(),
        });
    }
    fs::read_dir(root).map_err(|e| WatchError::from_open(root, e))?;

    register_directory(source, registry, root, mask)?;
    let mut summary = WalkSummary {
        registered: 1,
        skipped: 0,
    };

    let mut walker = WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| entry.file_type().is_dir());

    while let Some(entry) = walker.next() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().map(|p| p.display().to_string()).unwrap_or_default();
                tracing::warn!("[registrar] skipping unreadable {path}: {e}");
                summary.skipped += 1;
                continue;
            }
        };

        match register_directory(source, registry, entry.path(), mask) {
            Ok(_) => summary.registered += 1,
            Err(e) => {
                tracing::warn!("[registrar] {e}");
                summary.skipped += 1;
                walker.skip_current_dir();
            }
        }
    }

    Ok(summary)
}
