//! Scripted notification source for unit tests.

use std::collections::{HashSet, VecDeque};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::error::{WatchError, WatchResult};
use super::kind::MutationMask;
use super::registry::WatchHandle;
use super::source::{NotifySource, ReadOutcome};

/// Hands out sparse, non-sequential handles and replays queued chunks.
///
/// Once the queue is drained, reads report end of stream.
#[derive(Debug)]
pub(crate) struct ScriptedSource {
    next_handle: i32,
    pub(crate) watched: Vec<(WatchHandle, PathBuf, MutationMask)>,
    chunks: VecDeque<Option<Vec<u8>>>,
    refused: HashSet<PathBuf>,
}

impl ScriptedSource {
    pub(crate) fn new() -> Self {
        Self {
            next_handle: 100,
            watched: Vec::new(),
            chunks: VecDeque::new(),
            refused: HashSet::new(),
        }
    }

    pub(crate) fn push_chunk(&mut self, bytes: Vec<u8>) {
        self.chunks.push_back(Some(bytes));
    }

    /// Queue one idle poll before the next chunk.
    pub(crate) fn push_timeout(&mut self) {
        self.chunks.push_back(None);
    }

    pub(crate) fn refuse(&mut self, path: impl Into<PathBuf>) {
        self.refused.insert(path.into());
    }

    /// Follow a directory rename the way the kernel does: existing watches
    /// keep their handles under the new name.
    pub(crate) fn rename(&mut self, from: &Path, to: &Path) {
        for (_, path, _) in &mut self.watched {
            if let Ok(rest) = path.strip_prefix(from) {
                *path = to.join(rest);
            }
        }
    }

    pub(crate) fn watched_paths(&self) -> Vec<&Path> {
        self.watched.iter().map(|(_, p, _)| p.as_path()).collect()
    }
}

impl NotifySource for ScriptedSource {
    fn add_watch(&mut self, path: &Path, mask: MutationMask) -> WatchResult<WatchHandle> {
        if self.refused.contains(path) {
            return Err(WatchError::RegistrationFailed {
                path: path.to_path_buf(),
                source: io::Error::from_raw_os_error(28),
            });
        }
        if let Some((handle, _, _)) = self.watched.iter().find(|(_, p, _)| p == path) {
            return Ok(*handle);
        }

        let handle = WatchHandle::new(self.next_handle);
        self.next_handle += 7;
        self.watched.push((handle, path.to_path_buf(), mask));
        Ok(handle)
    }

    fn read_events(&mut self, buf: &mut [u8], _timeout: Duration) -> io::Result<ReadOutcome> {
        match self.chunks.pop_front() {
            Some(Some(chunk)) => {
                buf[..chunk.len()].copy_from_slice(&chunk);
                Ok(ReadOutcome::Data(chunk.len()))
            }
            Some(None) => Ok(ReadOutcome::TimedOut),
            None => Ok(ReadOutcome::Data(0)),
        }
    }
}
