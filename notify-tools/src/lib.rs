//! Watch bookkeeping and event reading on top of Linux inotify
//!
//! # Installation
//!
//! ```toml
//! [dependencies]
//! notify-tools = "0.1.0"
//! ```
//!
//! ## Features
//!
//! - `serde` for serialization of [`EventMask`] and [`RawEvent`]
//!
//! # Overview
//!
//! An [`InotifyTools`] context owns one inotify instance. It remembers which path every watch
//! descriptor belongs to, reassembles the kernel's variable-length records into [`RawEvent`]s,
//! can watch whole directory trees, drops events matching an ignore pattern, counts events
//! per watch and renders events through `printf`-like templates.
//!
//! ```rust
//! use notify_tools::{EventMask, InotifyTools, Result};
//! use std::time::Duration;
//!
//! fn main() -> Result<()> {
//!     let mut tools = InotifyTools::new();
//!     tools.initialize()?;
//!
//!     let dir = std::env::temp_dir();
//!     tools.watch_file(&dir, EventMask::CREATE | EventMask::DELETE)?;
//!
//!     // poll once, don't block the doctest
//!     if let Some(event) = tools.next_event(Some(Duration::ZERO))? {
//!         println!("{}", tools.format_event(&event, "%w%f %e")?);
//!     }
//!
//!     tools.cleanup();
//!     Ok(())
//! }
//! ```
//!
//! # Known Problems
//!
//! ### Linux: No space left on device
//!
//! Adding a watch fails with [`ErrorKind::MaxFilesWatch`] once the per-user watch limit is
//! reached. Every directory of a recursively watched tree counts towards it. See
//! [`limits::max_user_watches`] for the current value; it can be raised via
//! ```sh
//! sudo sysctl fs.inotify.max_user_watches=524288 # example number
//! ```
//!
//! ### Queue overflow
//!
//! When events come in faster than they are read, the kernel drops them and reports a single
//! [`EventMask::Q_OVERFLOW`] event instead.

#![deny(missing_docs)]

pub use backend::Backend;
pub use config::Config;
pub use error::{Error, ErrorKind, ProtocolError, Result};
pub use format::{EventFormatter, FormatError, MAX_STRLEN};
pub use inotify::Inotify;
pub use notify_tools_types::{EventMask, ParseMaskError, RawEvent};
pub use reader::{
    EventReader, DEFAULT_BUFFER_CAPACITY, HEADER_SIZE, MAX_EVENTS, MAX_RECORD_SIZE,
};
pub use recursive::TreeWalker;
pub use registry::{Watch, WatchRegistry};
pub use stats::{Counters, SortOrder, Stats};
pub use tools::InotifyTools;

mod backend;
mod config;
mod error;
pub mod format;
mod inotify;
pub mod limits;
pub mod reader;
pub mod recursive;
pub mod registry;
pub mod stats;
mod tools;
