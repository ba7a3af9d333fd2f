//! The dual-indexed store of live watches.
//!
//! Every watch is reachable both by its descriptor and by its path. The descriptor index owns
//! the records and orders them numerically. The path index maps path bytes to descriptors
//! and orders them byte-wise, which is not the same as the component-wise ordering of
//! [`Path`].

use std::{
    collections::BTreeMap,
    ffi::{OsStr, OsString},
    io,
    ops::Bound,
    os::unix::ffi::{OsStrExt, OsStringExt},
    path::{Path, PathBuf},
};

use crate::stats::Counters;

/// One live watch: a descriptor, the path it was established for, and its counters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Watch {
    wd: i32,
    path: PathBuf,
    counters: Counters,
}

impl Watch {
    /// The kernel watch descriptor.
    pub fn wd(&self) -> i32 {
        self.wd
    }

    /// The watched path. Directories end with `/`.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Event counters, meaningful while statistics are enabled.
    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    pub(crate) fn counters_mut(&mut self) -> &mut Counters {
        &mut self.counters
    }
}

/// Live watches indexed by descriptor and by path.
#[derive(Debug, Default)]
pub struct WatchRegistry {
    by_wd: BTreeMap<i32, Watch>,
    by_path: BTreeMap<OsString, i32>,
}

impl WatchRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a newly established watch.
    ///
    /// Returns `None` without recording anything when `wd` is not positive or `path` is
    /// empty. The kernel never hands out a live descriptor twice, but if it does the old
    /// record is replaced. A path already owned by another descriptor moves to the new one.
    /// Recording the same descriptor and path again keeps the existing watch and its counters.
    pub fn create(&mut self, wd: i32, path: impl Into<PathBuf>) -> Option<&Watch> {
        let path = path.into();
        if wd <= 0 || path.as_os_str().is_empty() {
            return None;
        }
        let unchanged = self
            .by_wd
            .get(&wd)
            .is_some_and(|watch| watch.path.as_os_str() == path.as_os_str());
        if unchanged {
            return self.by_wd.get(&wd);
        }

        if let Some(old) = self.by_wd.remove(&wd) {
            self.by_path.remove(old.path.as_os_str());
        }
        if let Some(stale) = self.by_path.remove(path.as_os_str()) {
            log::debug!(
                "watch descriptor {} replaces {} for {}",
                wd,
                stale,
                path.display()
            );
            self.by_wd.remove(&stale);
        }

        self.by_path.insert(path.as_os_str().to_owned(), wd);
        let watch = Watch {
            wd,
            path,
            counters: Counters::default(),
        };
        Some(&*self.by_wd.entry(wd).or_insert(watch))
    }

    /// Looks up a watch by descriptor.
    pub fn by_wd(&self, wd: i32) -> Option<&Watch> {
        self.by_wd.get(&wd)
    }

    pub(crate) fn by_wd_mut(&mut self, wd: i32) -> Option<&mut Watch> {
        self.by_wd.get_mut(&wd)
    }

    /// Looks up a watch by its exact path.
    pub fn by_path(&self, path: impl AsRef<Path>) -> Option<&Watch> {
        self.by_path
            .get(path.as_ref().as_os_str())
            .and_then(|wd| self.by_wd.get(wd))
    }

    /// Removes the watch `wd`, calling `release` to tear down the kernel side first.
    ///
    /// An unknown descriptor is a successful no-op. When `release` fails the registry is left
    /// unchanged and the failure is returned.
    pub fn remove_with<F>(&mut self, wd: i32, release: F) -> io::Result<Option<Watch>>
    where
        F: FnOnce(i32) -> io::Result<()>,
    {
        if !self.by_wd.contains_key(&wd) {
            return Ok(None);
        }

        release(wd)?;

        let watch = self.by_wd.remove(&wd);
        if let Some(watch) = &watch {
            self.by_path.remove(watch.path.as_os_str());
        }
        Ok(watch)
    }

    /// Changes the path of watch `wd`.
    ///
    /// Returns `false` when there is no such watch, or when `new_path` already belongs to a
    /// different watch.
    pub fn rename_by_wd(&mut self, wd: i32, new_path: impl Into<PathBuf>) -> bool {
        let new_path = new_path.into();
        match self.by_path.get(new_path.as_os_str()) {
            Some(&owner) if owner == wd => return true,
            Some(_) => return false,
            None => {}
        }

        let Some(watch) = self.by_wd.get_mut(&wd) else {
            return false;
        };

        // the path index is keyed by the path, so take the entry out before changing it
        self.by_path.remove(watch.path.as_os_str());
        watch.path = new_path;
        self.by_path.insert(watch.path.as_os_str().to_owned(), wd);
        true
    }

    /// Changes the path of the watch currently at `old_path`.
    pub fn rename_by_path(
        &mut self,
        old_path: impl AsRef<Path>,
        new_path: impl Into<PathBuf>,
    ) -> bool {
        match self.by_path.get(old_path.as_ref().as_os_str()) {
            Some(&wd) => self.rename_by_wd(wd, new_path),
            None => false,
        }
    }

    /// Substitutes `old_prefix` with `new_prefix` in every watched path that starts with it.
    ///
    /// Prefixes are compared as raw bytes, so `/a/` matches `/a/x` but not `/ab`. Watches
    /// whose replacement would be the path of another watch keep their path. Returns the
    /// number of watches renamed.
    pub fn rename_prefix(
        &mut self,
        old_prefix: impl AsRef<OsStr>,
        new_prefix: impl AsRef<OsStr>,
    ) -> usize {
        let old_prefix = old_prefix.as_ref().as_bytes();
        let new_prefix = new_prefix.as_ref().as_bytes();

        let matching: Vec<(OsString, i32)> = self
            .by_path
            .range::<OsStr, _>((
                Bound::Included(OsStr::from_bytes(old_prefix)),
                Bound::Unbounded,
            ))
            .take_while(|(path, _)| path.as_bytes().starts_with(old_prefix))
            .map(|(path, wd)| (path.clone(), *wd))
            .collect();

        let mut renamed = 0;
        for (path, wd) in matching {
            let mut replaced = new_prefix.to_vec();
            replaced.extend_from_slice(&path.as_bytes()[old_prefix.len()..]);
            let replaced = OsString::from_vec(replaced);

            if replaced == path {
                continue;
            }
            if self.by_path.contains_key(&replaced) {
                log::debug!(
                    "not renaming {:?} to {:?}: already watched",
                    path,
                    replaced
                );
                continue;
            }

            if self.rename_by_wd(wd, PathBuf::from(replaced)) {
                renamed += 1;
            }
        }
        renamed
    }

    /// Number of live watches.
    pub fn len(&self) -> usize {
        self.by_path.len()
    }

    /// Whether there are no live watches.
    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }

    /// Zeroes the counters of every watch.
    pub fn reset_counters(&mut self) {
        for watch in self.by_wd.values_mut() {
            watch.counters.reset();
        }
    }

    /// Forgets every watch.
    pub fn clear(&mut self) {
        self.by_wd.clear();
        self.by_path.clear();
    }

    /// Watches in ascending descriptor order.
    pub fn iter(&self) -> impl Iterator<Item = &Watch> {
        self.by_wd.values()
    }

    /// Watches in ascending byte-wise path order.
    pub fn iter_by_path(&self) -> impl Iterator<Item = &Watch> {
        self.by_path.values().filter_map(|wd| self.by_wd.get(wd))
    }
}
