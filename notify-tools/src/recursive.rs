//! Depth-first establishment of watches on a directory tree.

use std::{
    ffi::{OsStr, OsString},
    fs, io,
    os::unix::ffi::OsStrExt,
    path::Path,
};

use walkdir::WalkDir;

use crate::{Error, ErrorKind, Result};

/// Walks a directory tree, handing every directory to a watch callback.
///
/// Children are watched before their parent. Symbolic links are never followed. Directories
/// whose path, without trailing `/`, equals an exclude entry are neither descended into nor
/// watched.
#[derive(Clone, Debug, Default)]
pub struct TreeWalker {
    excludes: Vec<OsString>,
}

impl TreeWalker {
    /// Creates a walker skipping the given directories.
    ///
    /// A single trailing `/` on an exclude entry is ignored.
    pub fn new<I, P>(excludes: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let excludes = excludes
            .into_iter()
            .map(|exclude| OsString::from(strip_slash(exclude.as_ref().as_os_str())))
            .collect();
        TreeWalker { excludes }
    }

    /// Watches `path`, and every real directory below it when it is a directory.
    ///
    /// Directories are passed to `watch` with a trailing `/`. A `path` that is not a
    /// directory is passed on unchanged.
    ///
    /// Permission errors, entries vanishing mid-walk and symlink loops below `path` only skip
    /// the affected subtree. Any other error stops the walk; watches established until then
    /// stay in place.
    pub fn walk<F>(&self, path: &Path, watch: &mut F) -> Result<()>
    where
        F: FnMut(&Path) -> Result<()>,
    {
        match fs::metadata(path) {
            Ok(metadata) if metadata.is_dir() => {
                let mut dir = path.as_os_str().to_owned();
                if !dir.as_bytes().ends_with(b"/") {
                    dir.push("/");
                }
                self.walk_dir(&dir, watch)
            }
            _ => watch(path),
        }
    }

    fn walk_dir<F>(&self, dir: &OsStr, watch: &mut F) -> Result<()>
    where
        F: FnMut(&Path) -> Result<()>,
    {
        let entries = WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(false)
            .sort_by_file_name();

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) if err.depth() > 0 && is_tolerable_walk(&err) => {
                    log::debug!("skipping entry below {:?}: {}", dir, err);
                    continue;
                }
                Err(err) => return Err(walk_error(err)),
            };
            if !entry.file_type().is_dir() {
                continue;
            }

            let mut child = dir.to_owned();
            child.push(entry.file_name());
            if self.is_excluded(&child) {
                log::debug!("excluded from recursive watch: {:?}", child);
                continue;
            }
            child.push("/");

            match self.walk_dir(&child, watch) {
                Ok(()) => {}
                Err(err) if is_tolerable(&err) => {
                    log::debug!("skipping {:?}: {}", child, err);
                }
                Err(err) => return Err(err),
            }
        }

        watch(Path::new(dir))
    }

    fn is_excluded(&self, dir: &OsStr) -> bool {
        let dir = strip_slash(dir);
        self.excludes.iter().any(|exclude| exclude.as_os_str() == dir)
    }
}

fn strip_slash(path: &OsStr) -> &OsStr {
    let bytes = path.as_bytes();
    match bytes.strip_suffix(b"/") {
        Some(stripped) if !stripped.is_empty() => OsStr::from_bytes(stripped),
        _ => path,
    }
}

fn is_tolerable_io(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::PermissionDenied | io::ErrorKind::NotFound
    ) || err.raw_os_error() == Some(libc::ELOOP)
}

fn is_tolerable_walk(err: &walkdir::Error) -> bool {
    err.loop_ancestor().is_some() || err.io_error().is_some_and(is_tolerable_io)
}

fn is_tolerable(err: &Error) -> bool {
    match &err.kind {
        ErrorKind::PathNotFound => true,
        ErrorKind::Io(err) => is_tolerable_io(err),
        _ => false,
    }
}

fn walk_error(err: walkdir::Error) -> Error {
    let path = err.path().map(Path::to_path_buf);
    let err = Error::io(
        err.into_io_error()
            .unwrap_or_else(|| io::Error::from_raw_os_error(libc::ELOOP)),
    );
    match path {
        Some(path) => err.add_path(path),
        None => err,
    }
}
