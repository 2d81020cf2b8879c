pub mod cli;
pub mod config;
pub mod logging;
pub mod watcher;

pub use config::Settings;
pub use watcher::{
    DecodedEvent, DispatchOptions, DispatchStats, Dispatcher, EventDecoder, LogSink,
    MutationKind, MutationMask, NotifySource, WatchError, WatchHandle, WatchRegistry,
};
