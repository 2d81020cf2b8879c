//! Notification source boundary.
//!
//! The rest of the watcher only needs three things from the OS: create an
//! instance, add a non-recursive watch on a directory, and read packed event
//! records. [`NotifySource`] captures exactly that so the dispatch loop can be
//! driven by a scripted source in tests.

use std::io;
use std::path::Path;
use std::time::Duration;

use super::error::WatchResult;
use super::kind::MutationMask;
use super::registry::WatchHandle;

/// Result of waiting for event bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// `n` bytes were written to the buffer; `0` means end of stream.
    Data(usize),
    /// Nothing arrived before the timeout.
    TimedOut,
}

/// Source of packed filesystem event records.
pub trait NotifySource {
    /// Watch the immediate children of `path`. Never recursive.
    fn add_watch(&mut self, path: &Path, mask: MutationMask) -> WatchResult<WatchHandle>;

    /// Wait up to `timeout` for events and copy whole records into `buf`.
    fn read_events(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<ReadOutcome>;
}

#[cfg(target_os = "linux")]
pub use linux::InotifySource;

#[cfg(target_os = "linux")]
mod linux {
    use std::ffi::CString;
    use std::io;
    use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
    use std::os::unix::ffi::OsStrExt;
    use std::path::Path;
    use std::time::Duration;

    use super::{NotifySource, ReadOutcome};
    use crate::watcher::error::{WatchError, WatchResult};
    use crate::watcher::kind::MutationMask;
    use crate::watcher::registry::WatchHandle;

    /// Linux inotify instance.
    #[derive(Debug)]
    pub struct InotifySource {
        fd: OwnedFd,
    }

    impl InotifySource {
        pub fn new() -> WatchResult<Self> {
            // SAFETY: inotify_init1 takes no pointers; a non-negative return is a fresh fd we own.
            let raw = unsafe { libc::inotify_init1(libc::IN_CLOEXEC) };
            if raw < 0 {
                return Err(WatchError::InitFailed {
                    reason: io::Error::last_os_error().to_string(),
                });
            }
            // SAFETY: raw is a valid, open file descriptor not owned elsewhere.
            let fd = unsafe { OwnedFd::from_raw_fd(raw) };
            Ok(Self { fd })
        }
    }

    impl NotifySource for InotifySource {
        fn add_watch(&mut self, path: &Path, mask: MutationMask) -> WatchResult<WatchHandle> {
            let c_path = CString::new(path.as_os_str().as_bytes()).map_err(|e| {
                WatchError::RegistrationFailed {
                    path: path.to_path_buf(),
                    source: io::Error::new(io::ErrorKind::InvalidInput, e),
                }
            })?;

            // SAFETY: c_path is NUL-terminated and outlives the call.
            let wd = unsafe {
                libc::inotify_add_watch(self.fd.as_raw_fd(), c_path.as_ptr(), mask.bits())
            };
            if wd < 0 {
                return Err(WatchError::RegistrationFailed {
                    path: path.to_path_buf(),
                    source: io::Error::last_os_error(),
                });
            }
            Ok(WatchHandle::new(wd))
        }

        fn read_events(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<ReadOutcome> {
            let mut pfd = libc::pollfd {
                fd: self.fd.as_raw_fd(),
                events: libc::POLLIN,
                revents: 0,
            };
            let millis = timeout.as_millis().min(libc::c_int::MAX as u128) as libc::c_int;

            // SAFETY: pfd points to exactly one initialised pollfd.
            let ready = unsafe { libc::poll(&mut pfd, 1, millis) };
            if ready < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    return Ok(ReadOutcome::TimedOut);
                }
                return Err(err);
            }
            if ready == 0 {
                return Ok(ReadOutcome::TimedOut);
            }

            // SAFETY: buf is valid for writes of buf.len() bytes.
            let n = unsafe {
                libc::read(
                    self.fd.as_raw_fd(),
                    buf.as_mut_ptr().cast::<libc::c_void>(),
                    buf.len(),
                )
            };
            if n < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    return Ok(ReadOutcome::TimedOut);
                }
                return Err(err);
            }
            Ok(ReadOutcome::Data(n as usize))
        }
    }
}

#[cfg(all(test, target_os = "linux"))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_inotify_reports_create() {
        let temp = TempDir::new().unwrap();
        let mut source = InotifySource::new().unwrap();
        let handle = source
            .add_watch(temp.path(), MutationMask::DEFAULT_WATCH)
            .unwrap();

        std::fs::write(temp.path().join("hello.txt"), b"hi").unwrap();

        let mut buf = vec![0u8; 4096];
        let outcome = source
            .read_events(&mut buf, Duration::from_secs(5))
            .unwrap();
        let ReadOutcome::Data(n) = outcome else {
            panic!("no events before timeout");
        };

        let event = crate::watcher::EventDecoder::new(&buf[..n])
            .next()
            .unwrap()
            .unwrap();
        assert_eq!(event.handle, handle);
        assert!(event.has_kind(crate::watcher::MutationKind::Create));
        assert_eq!(event.name.as_deref(), Some(std::ffi::OsStr::new("hello.txt")));
    }

    #[test]
    fn test_add_watch_missing_path_fails() {
        let temp = TempDir::new().unwrap();
        let mut source = InotifySource::new().unwrap();

        let err = source
            .add_watch(&temp.path().join("missing"), MutationMask::DEFAULT_WATCH)
            .unwrap_err();
        assert!(matches!(
            err,
            crate::watcher::WatchError::RegistrationFailed { .. }
        ));
    }

    #[test]
    fn test_read_times_out_when_idle() {
        let temp = TempDir::new().unwrap();
        let mut source = InotifySource::new().unwrap();
        source
            .add_watch(temp.path(), MutationMask::DEFAULT_WATCH)
            .unwrap();

        let mut buf = vec![0u8; 1024];
        let outcome = source
            .read_events(&mut buf, Duration::from_millis(20))
            .unwrap();
        assert_eq!(outcome, ReadOutcome::TimedOut);
    }
}
