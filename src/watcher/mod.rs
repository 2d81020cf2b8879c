//! Recursive directory watcher.
//!
//! The kernel only reports changes to the immediate children of a watched
//! directory, so every directory in the tree carries its own watch and the
//! registry maps each returned handle back to its path.
//!
//! # Architecture
//!
//! ```text
//! Dispatcher
//!   - NotifySource (inotify fd)
//!   - EventDecoder (per read chunk)
//!   - WatchRegistry (handle -> path)
//!   - LogSink (append-only log)
//!         |
//!    create / moved_to of a directory
//!         |
//!   registrar::register_tree
//! ```

mod decoder;
mod dispatch;
mod error;
mod kind;
pub mod registrar;
mod registry;
mod sink;
mod source;

#[cfg(test)]
pub(crate) mod testing;

pub use decoder::{DecodedEvent, EventDecoder, HEADER_SIZE, encode_record};
pub use dispatch::{DispatchOptions, DispatchStats, Dispatcher, ExtendPolicy, MIN_BUFFER_SIZE};
pub use error::{WatchError, WatchResult};
pub use kind::{MutationKind, MutationMask};
pub use registrar::WalkSummary;
pub use registry::{WatchHandle, WatchRegistry};
pub use sink::{LogSink, format_line};
#[cfg(target_os = "linux")]
pub use source::InotifySource;
pub use source::{NotifySource, ReadOutcome};
