//! Watch registry mapping kernel-issued handles to directory paths.
//!
//! Entries are keyed strictly by the handle value the notification source
//! returned. Handles are not sequential and may be reused after the kernel
//! drops a watch, so a reused handle overwrites the stale entry.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use super::error::{WatchError, WatchResult};

/// Identifier returned by the notification source for a registered path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatchHandle(i32);

impl WatchHandle {
    /// Handle carried by queue-overflow records, which belong to no watch.
    pub const OVERFLOW: WatchHandle = WatchHandle(-1);

    pub fn new(raw: i32) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> i32 {
        self.0
    }
}

impl fmt::Display for WatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bidirectional handle <-> path association.
#[derive(Debug, Default)]
pub struct WatchRegistry {
    by_handle: HashMap<WatchHandle, PathBuf>,
    by_path: HashMap<PathBuf, WatchHandle>,
}

impl WatchRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the entry for `handle`.
    ///
    /// Returns the path previously bound to the handle, if it was reused.
    ///
    /// When `path` already belongs to another handle (the directory was moved
    /// away and a new one created in its place), the older handle keeps its
    /// entry until the kernel reports it ignored. Only the path lookup moves
    /// to the newest handle.
    pub fn register(&mut self, handle: WatchHandle, path: impl Into<PathBuf>) -> Option<PathBuf> {
        let path = path.into();

        let previous = self.by_handle.insert(handle, path.clone());
        if let Some(prev) = &previous {
            if *prev != path && self.by_path.get(prev) == Some(&handle) {
                self.by_path.remove(prev);
            }
        }
        self.by_path.insert(path.clone(), handle);

        previous.filter(|prev| *prev != path)
    }

    /// Path registered for `handle`.
    pub fn resolve(&self, handle: WatchHandle) -> WatchResult<&Path> {
        self.by_handle
            .get(&handle)
            .map(PathBuf::as_path)
            .ok_or(WatchError::UnknownHandle { handle })
    }

    /// Handle registered for `path`, if any.
    pub fn handle_for(&self, path: &Path) -> Option<WatchHandle> {
        self.by_path.get(path).copied()
    }

    /// Drop the entry for a handle the kernel no longer reports.
    pub fn forget(&mut self, handle: WatchHandle) -> Option<PathBuf> {
        let path = self.by_handle.remove(&handle)?;
        if self.by_path.get(&path) == Some(&handle) {
            self.by_path.remove(&path);
        }
        Some(path)
    }

    pub fn contains_path(&self, path: &Path) -> bool {
        self.by_path.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.by_handle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_handle.is_empty()
    }

    /// All live entries, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (WatchHandle, &Path)> {
        self.by_handle
            .iter()
            .map(|(handle, path)| (*handle, path.as_path()))
    }
}
