//! Backend implementation for the inotify Linux API
//!
//! The inotify API provides a mechanism for monitoring filesystem events.  Inotify can be used to
//! monitor individual files, or to monitor directories.  When a directory is monitored, inotify
//! will return events for the directory itself, and for files inside the directory.

use std::{
    ffi::CString,
    fs::File,
    io::{self, Read},
    os::{
        fd::{AsRawFd, FromRawFd, OwnedFd, RawFd},
        unix::ffi::OsStrExt,
    },
    path::Path,
    time::Duration,
};

use mio::{unix::SourceFd, Events, Interest, Poll, Token};
use notify_tools_types::EventMask;

use crate::Backend;

const INOTIFY: Token = Token(0);

/// A kernel inotify instance.
///
/// The descriptor is non-blocking and close-on-exec. Readiness is waited for through a
/// `mio::Poll` the descriptor is registered with.
pub struct Inotify {
    file: File,
    poll: Poll,
    events: Events,
}

impl AsRawFd for Inotify {
    fn as_raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}

impl std::fmt::Debug for Inotify {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inotify")
            .field("fd", &self.file.as_raw_fd())
            .finish_non_exhaustive()
    }
}

impl Backend for Inotify {
    fn open() -> io::Result<Self> {
        // SAFETY: inotify_init1 takes no pointers, failure is reported through the return value.
        let fd = unsafe { libc::inotify_init1(libc::IN_CLOEXEC | libc::IN_NONBLOCK) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: `fd` was just returned by inotify_init1 and is owned by nobody else.
        let file = File::from(unsafe { OwnedFd::from_raw_fd(fd) });

        let poll = Poll::new()?;
        poll.registry()
            .register(&mut SourceFd(&fd), INOTIFY, Interest::READABLE)?;

        Ok(Inotify {
            file,
            poll,
            events: Events::with_capacity(16),
        })
    }

    fn add_watch(&mut self, path: &Path, mask: EventMask) -> io::Result<i32> {
        let c_path = CString::new(path.as_os_str().as_bytes())
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;

        // SAFETY: the descriptor is owned by `self.file` and `c_path` is a NUL-terminated string
        // that outlives the call.
        let wd = unsafe {
            libc::inotify_add_watch(self.file.as_raw_fd(), c_path.as_ptr(), mask.bits())
        };
        if wd < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(wd)
        }
    }

    fn remove_watch(&mut self, wd: i32) -> io::Result<()> {
        // SAFETY: the descriptor is owned by `self.file`; an unknown `wd` is reported as EINVAL.
        if unsafe { libc::inotify_rm_watch(self.file.as_raw_fd(), wd) } < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(())
        }
    }

    fn wait(&mut self, timeout: Option<Duration>) -> io::Result<bool> {
        // the poll is edge triggered, bytes left over from an earlier wakeup raise no new event
        if self.available()? > 0 {
            return Ok(true);
        }

        self.poll.poll(&mut self.events, timeout)?;
        Ok(self.events.iter().any(|event| event.token() == INOTIFY))
    }

    fn available(&self) -> io::Result<usize> {
        let mut bytes: libc::c_int = 0;
        let fd = self.file.as_raw_fd();
        // SAFETY: FIONREAD writes a single `c_int` through the pointer, which refers to `bytes`.
        if unsafe { libc::ioctl(fd, libc::FIONREAD, &mut bytes as *mut libc::c_int) } < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(usize::try_from(bytes).unwrap_or(0))
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_and_poll_quiet_instance() {
        let mut inotify = Inotify::open().expect("inotify_init1");
        assert!(inotify.as_raw_fd() >= 0);
        assert_eq!(inotify.available().expect("FIONREAD"), 0);
        assert!(!inotify.wait(Some(Duration::ZERO)).expect("poll"));
    }

    #[test]
    fn watch_reports_readiness() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut inotify = Inotify::open().expect("inotify_init1");

        let wd = inotify
            .add_watch(dir.path(), EventMask::CREATE)
            .expect("add_watch");
        assert!(wd > 0);

        std::fs::write(dir.path().join("entry"), b"").expect("write");
        assert!(inotify
            .wait(Some(Duration::from_secs(5)))
            .expect("poll"));
        assert!(inotify.available().expect("FIONREAD") >= 16);

        inotify.remove_watch(wd).expect("rm_watch");
        assert!(inotify.remove_watch(wd).is_err());
    }

    #[test]
    fn missing_path_is_not_found() {
        let mut inotify = Inotify::open().expect("inotify_init1");
        let err = inotify
            .add_watch(Path::new("/this/path/does/not/exist"), EventMask::ALL_EVENTS)
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
