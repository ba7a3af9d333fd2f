//! The decoded form of one kernel record.

use std::ffi::{OsStr, OsString};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::mask::EventMask;

/// One notification as delivered by the kernel.
///
/// The record names the watch it belongs to by descriptor only; resolving it to a path is
/// the job of whoever owns the watches.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RawEvent {
    /// Watch descriptor the record was produced for.
    pub wd: i32,

    /// Kinds of activity, plus the `ISDIR` flag when the subject is a directory.
    pub mask: EventMask,

    /// Links the two halves of a rename; zero when unused.
    pub cookie: u32,

    /// Name of the entry inside a watched directory, when the subject is a child.
    pub name: Option<OsString>,
}

impl RawEvent {
    /// Creates a record without a name or cookie.
    pub fn new(wd: i32, mask: EventMask) -> Self {
        RawEvent {
            wd,
            mask,
            cookie: 0,
            name: None,
        }
    }

    /// Sets the rename cookie.
    pub fn set_cookie(mut self, cookie: u32) -> Self {
        self.cookie = cookie;
        self
    }

    /// Sets the child entry name.
    pub fn set_name(mut self, name: impl Into<OsString>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// The child entry name, or an empty string when there is none.
    pub fn name_or_empty(&self) -> &OsStr {
        self.name.as_deref().unwrap_or_else(|| OsStr::new(""))
    }

    /// Whether the subject of the record is a directory.
    pub fn is_dir(&self) -> bool {
        self.mask.contains(EventMask::ISDIR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders() {
        let event = RawEvent::new(3, EventMask::MOVED_FROM | EventMask::ISDIR)
            .set_cookie(42)
            .set_name("sub");

        assert_eq!(event.wd, 3);
        assert_eq!(event.cookie, 42);
        assert_eq!(event.name_or_empty(), OsStr::new("sub"));
        assert!(event.is_dir());
    }

    #[test]
    fn nameless_record() {
        let event = RawEvent::new(1, EventMask::DELETE_SELF);
        assert_eq!(event.name, None);
        assert_eq!(event.name_or_empty(), OsStr::new(""));
        assert!(!event.is_dir());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serde_round_trip() {
        let event = RawEvent::new(7, EventMask::CREATE).set_name("file");
        let json = serde_json::to_string(&event).unwrap();
        let back: RawEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
