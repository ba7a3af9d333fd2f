//! The seam between the library and the kernel notification facility.

use std::{io, path::Path, time::Duration};

use notify_tools_types::EventMask;

/// A source of raw notification records.
///
/// The kernel implementation is [`Inotify`](crate::Inotify). Anything that can establish
/// watches, report readiness and hand out the raw record byte stream can stand in for it.
pub trait Backend {
    /// Opens a new notification source.
    fn open() -> io::Result<Self>
    where
        Self: Sized;

    /// Starts watching `path` for the kinds in `mask`, returning the watch descriptor.
    ///
    /// Adding a path that is already watched returns the existing descriptor.
    fn add_watch(&mut self, path: &Path, mask: EventMask) -> io::Result<i32>;

    /// Stops the watch identified by `wd`.
    fn remove_watch(&mut self, wd: i32) -> io::Result<()>;

    /// Waits until the record stream is readable.
    ///
    /// `None` blocks indefinitely and `Some(Duration::ZERO)` only polls. Returns `false` when
    /// the timeout expired first. A `true` result may be spurious, in which case a following
    /// [`Backend::read`] fails with [`io::ErrorKind::WouldBlock`].
    fn wait(&mut self, timeout: Option<Duration>) -> io::Result<bool>;

    /// Number of bytes that can be read right now without blocking.
    fn available(&self) -> io::Result<usize>;

    /// Reads raw record bytes into `buf`.
    ///
    /// Returning `Ok(0)` means the stream has ended.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}
