//! Plain data types shared by the notify-tools crates.
//!
//! [`EventMask`] mirrors the kernel's inotify bits and knows how to convert itself to and
//! from the `NAME,NAME` text form used on command lines. [`RawEvent`] is one decoded kernel
//! record.

#![deny(missing_docs)]

pub mod event;
pub mod mask;

pub use event::RawEvent;
pub use mask::{EventMask, ParseMaskError, DEFAULT_SEPARATOR};
