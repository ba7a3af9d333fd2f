//! The `EventMask` bitmask and its textual form.
//!
//! Masks are converted to and from separator-joined lists of kind names such as
//! `MODIFY,CLOSE_WRITE`. Names are the inotify constants without the `IN_` prefix and are
//! matched case-insensitively.

use std::{error::Error as StdError, fmt, str::FromStr};

use bitflags::bitflags;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

bitflags! {
    /// Kinds of filesystem activity, laid out exactly as the kernel's `IN_*` bits.
    ///
    /// A single raw record carries one or more of these bits. The same type is used to
    /// describe which kinds a watch should listen for.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
    #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
    pub struct EventMask: u32 {
        /// File was accessed.
        ///
        /// When monitoring a directory, the event may occur both for the directory itself and
        /// the files within.
        const ACCESS = 0x0000_0001;

        /// File was modified.
        ///
        /// When monitoring a directory, the event may occur *only* for the files within, not
        /// the directory itself.
        const MODIFY = 0x0000_0002;

        /// Metadata has changed: permissions, timestamps, extended attributes, link count or
        /// ownership.
        const ATTRIB = 0x0000_0004;

        /// File opened for writing was closed.
        const CLOSE_WRITE = 0x0000_0008;

        /// File not opened for writing was closed.
        const CLOSE_NOWRITE = 0x0000_0010;

        /// File was opened.
        const OPEN = 0x0000_0020;

        /// File or directory was moved away from a watched directory.
        const MOVED_FROM = 0x0000_0040;

        /// File or directory was moved into a watched directory.
        const MOVED_TO = 0x0000_0080;

        /// File or directory was created inside a watched directory.
        const CREATE = 0x0000_0100;

        /// File or directory was deleted from a watched directory.
        const DELETE = 0x0000_0200;

        /// Watched file or directory was deleted.
        ///
        /// An `IGNORED` record will subsequently be generated.
        const DELETE_SELF = 0x0000_0400;

        /// Watched file or directory was moved.
        const MOVE_SELF = 0x0000_0800;

        /// Filesystem containing the watched object was unmounted.
        const UNMOUNT = 0x0000_2000;

        /// The kernel event queue overflowed; records were lost.
        const Q_OVERFLOW = 0x0000_4000;

        /// The watch was removed, explicitly or because its object went away.
        const IGNORED = 0x0000_8000;

        /// Option: only watch the path if it is a directory.
        const ONLYDIR = 0x0100_0000;

        /// Option: don't dereference the path if it is a symbolic link.
        const DONT_FOLLOW = 0x0200_0000;

        /// Option: don't report events for children after they were unlinked.
        const EXCL_UNLINK = 0x0400_0000;

        /// Option: add to the mask of an existing watch instead of replacing it.
        const MASK_ADD = 0x2000_0000;

        /// Info: the subject of this record is a directory.
        const ISDIR = 0x4000_0000;

        /// Option: listen for one event, then remove the watch.
        const ONESHOT = 0x8000_0000;

        /// Both close kinds.
        const CLOSE = Self::CLOSE_WRITE.bits() | Self::CLOSE_NOWRITE.bits();

        /// Both halves of a move.
        const MOVE = Self::MOVED_FROM.bits() | Self::MOVED_TO.bits();

        /// Every kind of activity a watch can listen for.
        const ALL_EVENTS = Self::ACCESS.bits()
            | Self::MODIFY.bits()
            | Self::ATTRIB.bits()
            | Self::CLOSE_WRITE.bits()
            | Self::CLOSE_NOWRITE.bits()
            | Self::OPEN.bits()
            | Self::MOVED_FROM.bits()
            | Self::MOVED_TO.bits()
            | Self::CREATE.bits()
            | Self::DELETE.bits()
            | Self::DELETE_SELF.bits()
            | Self::MOVE_SELF.bits();
    }
}

/// Single-bit names, in the order they are rendered.
const NAMES: [(EventMask, &str); 17] = [
    (EventMask::ACCESS, "ACCESS"),
    (EventMask::MODIFY, "MODIFY"),
    (EventMask::ATTRIB, "ATTRIB"),
    (EventMask::CLOSE_WRITE, "CLOSE_WRITE"),
    (EventMask::CLOSE_NOWRITE, "CLOSE_NOWRITE"),
    (EventMask::OPEN, "OPEN"),
    (EventMask::MOVED_FROM, "MOVED_FROM"),
    (EventMask::MOVED_TO, "MOVED_TO"),
    (EventMask::CREATE, "CREATE"),
    (EventMask::DELETE, "DELETE"),
    (EventMask::DELETE_SELF, "DELETE_SELF"),
    (EventMask::UNMOUNT, "UNMOUNT"),
    (EventMask::Q_OVERFLOW, "Q_OVERFLOW"),
    (EventMask::IGNORED, "IGNORED"),
    (EventMask::MOVE_SELF, "MOVE_SELF"),
    (EventMask::ISDIR, "ISDIR"),
    (EventMask::ONESHOT, "ONESHOT"),
];

// Accepted when parsing, never produced when rendering.
const ALIASES: [(EventMask, &str); 3] = [
    (EventMask::CLOSE, "CLOSE"),
    (EventMask::MOVE, "MOVE"),
    (EventMask::ALL_EVENTS, "ALL_EVENTS"),
];

/// The separator used by [`FromStr`] and [`Display`](fmt::Display).
pub const DEFAULT_SEPARATOR: char = ',';

impl EventMask {
    /// Parses a `sep`-separated list of kind names into a mask.
    ///
    /// Names are matched case-insensitively and may be composite aliases (`CLOSE`, `MOVE`,
    /// `ALL_EVENTS`). An empty input yields the empty mask.
    ///
    /// Tokens are read left to right: the first unknown name fails the whole parse, and an
    /// empty token (a leading, trailing or doubled separator) ends it with the empty mask.
    ///
    /// # Errors
    ///
    /// - `InvalidSeparator` if `sep` is an ASCII letter or `_`, since it could then appear
    ///   inside a name.
    /// - `UnknownEvent` if a token is not a known name.
    ///
    /// ```
    /// use notify_tools_types::EventMask;
    ///
    /// let mask = EventMask::parse("modify:close:create", ':').unwrap();
    /// assert_eq!(mask, EventMask::MODIFY | EventMask::CLOSE | EventMask::CREATE);
    /// ```
    pub fn parse(text: &str, sep: char) -> Result<EventMask, ParseMaskError> {
        if sep == '_' || sep.is_ascii_alphabetic() {
            return Err(ParseMaskError::InvalidSeparator(sep));
        }

        let mut mask = EventMask::empty();
        if text.is_empty() {
            return Ok(mask);
        }

        for token in text.split(sep) {
            if token.is_empty() {
                return Ok(EventMask::empty());
            }
            match EventMask::from_kind_name(token) {
                Some(kind) => mask |= kind,
                None => return Err(ParseMaskError::UnknownEvent(token.to_owned())),
            }
        }

        Ok(mask)
    }

    /// Looks up a single kind name or alias, ignoring case.
    pub fn from_kind_name(name: &str) -> Option<EventMask> {
        NAMES
            .iter()
            .chain(ALIASES.iter())
            .find(|(_, known)| known.eq_ignore_ascii_case(name))
            .map(|&(kind, _)| kind)
    }

    /// Renders the mask as kind names joined by `sep`.
    ///
    /// Names are emitted in a fixed order for every named bit present. When no named bit is
    /// set, the raw value is rendered as zero-padded hexadecimal instead (`0x00000000`).
    pub fn render(self, sep: char) -> String {
        let mut out = String::new();
        self.render_into(&mut out, sep);
        out
    }

    /// Same as [`EventMask::render`], appending to an existing buffer.
    pub fn render_into(self, out: &mut String, sep: char) {
        let start = out.len();
        for (kind, name) in NAMES.iter() {
            if self.contains(*kind) {
                if out.len() > start {
                    out.push(sep);
                }
                out.push_str(name);
            }
        }

        if out.len() == start {
            out.push_str(&format!("0x{:08x}", self.bits()));
        }
    }

    /// Iterates over the named single bits present in this mask, in render order.
    pub fn kinds(self) -> impl Iterator<Item = (EventMask, &'static str)> {
        NAMES
            .iter()
            .copied()
            .filter(move |(kind, _)| self.contains(*kind))
    }
}

impl FromStr for EventMask {
    type Err = ParseMaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventMask::parse(s, DEFAULT_SEPARATOR)
    }
}

impl fmt::Display for EventMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(DEFAULT_SEPARATOR))
    }
}

/// Failure to parse an [`EventMask`] from text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParseMaskError {
    /// The separator could be part of a kind name.
    InvalidSeparator(char),

    /// A token matched no kind name.
    UnknownEvent(String),
}

impl fmt::Display for ParseMaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseMaskError::InvalidSeparator(sep) => {
                write!(f, "invalid event separator {sep:?}")
            }
            ParseMaskError::UnknownEvent(name) => write!(f, "unknown event {name:?}"),
        }
    }
}

impl StdError for ParseMaskError {}
