//! Development server with live reload for kiln.
//!
//! Serves the build output, watches the source tree, reruns the changed asset
//! class and pushes reload messages to connected browsers over a WebSocket.

pub mod livereload;
pub mod server;
pub mod watcher;

pub use livereload::{ReloadHub, ReloadMessage};
pub use server::{router, DevServer, DevServerConfig, ServerError};
pub use watcher::{ChangeKind, FileWatcher, WatchEvent};
