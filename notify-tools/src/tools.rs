//! The context tying watches, the record stream, filtering, statistics and formatting together.

use std::{
    ffi::OsStr,
    fs,
    io::Write,
    os::unix::ffi::OsStrExt,
    path::{Path, PathBuf},
    time::Duration,
};

use notify_tools_types::{EventMask, RawEvent};
use regex::Regex;

use crate::{
    format::{EventFormatter, MAX_STRLEN},
    reader::{EventReader, MAX_EVENTS},
    recursive::TreeWalker,
    registry::{Watch, WatchRegistry},
    stats::{self, SortOrder, Stats},
    Backend, Config, Error, Inotify, Result,
};

/// Template the ignore filter is matched against.
const FILTER_TEMPLATE: &str = "%w%f";

/// One inotify session: the watches it established and the events it reads.
///
/// A context starts out uninitialized. [`InotifyTools::initialize`] opens the backend and
/// [`InotifyTools::cleanup`] tears everything down again, after which it can be initialized
/// afresh.
///
/// The context is not reentrant: reading and filtering share scratch storage, so use one
/// context per thread or guard it with a lock.
///
/// # Panics
///
/// Every method other than construction, `initialize*`, `cleanup` and `is_initialized`
/// panics when the context is not initialized.
///
/// ```no_run
/// # use std::time::Duration;
/// # use notify_tools::{EventMask, InotifyTools};
/// # fn main() -> notify_tools::Result<()> {
/// let mut tools = InotifyTools::new();
/// tools.initialize()?;
/// tools.watch_recursively("/tmp", EventMask::ALL_EVENTS)?;
///
/// while let Some(event) = tools.next_event(Some(Duration::from_secs(10)))? {
///     println!("{}", tools.format_event(&event, "%w%f %e")?);
/// }
/// # Ok(())
/// # }
/// ```
pub struct InotifyTools<B: Backend = Inotify> {
    config: Config,
    session: Option<Session<B>>,
}

struct Session<B> {
    backend: B,
    registry: WatchRegistry,
    reader: EventReader,
    stats: Stats,
    filter: Option<Regex>,
    formatter: EventFormatter,
    scratch: String,
}

impl<B: Backend> Default for InotifyTools<B> {
    fn default() -> Self {
        Self::with_config(Config::default())
    }
}

impl InotifyTools {
    /// Creates an uninitialized kernel-backed context with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }
}

impl<B: Backend> InotifyTools<B> {
    /// Creates an uninitialized context applying `config` on initialization.
    pub fn with_config(config: Config) -> Self {
        InotifyTools {
            config,
            session: None,
        }
    }

    /// The configuration applied on initialization.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Opens the backend and applies the configuration.
    ///
    /// Does nothing when already initialized.
    pub fn initialize(&mut self) -> Result<()> {
        if self.session.is_some() {
            return Ok(());
        }
        let backend = B::open()?;
        self.initialize_with(backend)
    }

    /// Like [`InotifyTools::initialize`], using an already opened backend.
    ///
    /// When already initialized, `backend` is dropped and the current session is kept.
    pub fn initialize_with(&mut self, backend: B) -> Result<()> {
        if self.session.is_some() {
            return Ok(());
        }

        let mut session = Session {
            backend,
            registry: WatchRegistry::new(),
            reader: EventReader::with_capacity(self.config.buffer_capacity()),
            stats: Stats::default(),
            filter: None,
            formatter: EventFormatter::new(),
            scratch: String::with_capacity(MAX_STRLEN),
        };

        session
            .formatter
            .set_time_format(self.config.time_format().map(Into::into));
        if let Some(pattern) = self.config.ignore_regex() {
            session.filter = Some(Regex::new(pattern)?);
        }
        if self.config.collect_stats() {
            session.stats.enable(&mut session.registry);
        }

        self.session = Some(session);
        Ok(())
    }

    /// Closes the backend and forgets all watches, buffered records, the filter, the time
    /// format and statistics.
    pub fn cleanup(&mut self) {
        if let Some(session) = self.session.take() {
            log::trace!("closing session with {} watches", session.registry.len());
        }
    }

    /// Whether [`InotifyTools::initialize`] has been called since the last cleanup.
    pub fn is_initialized(&self) -> bool {
        self.session.is_some()
    }

    fn session(&self) -> &Session<B> {
        self.session.as_ref().expect("initialize not called yet")
    }

    fn session_mut(&mut self) -> &mut Session<B> {
        self.session.as_mut().expect("initialize not called yet")
    }

    /// The notification source.
    pub fn backend(&self) -> &B {
        &self.session().backend
    }

    /// The notification source, mutably.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.session_mut().backend
    }

    /// The live watches.
    pub fn registry(&self) -> &WatchRegistry {
        &self.session().registry
    }

    /// Watches a single file or directory, returning its descriptor.
    ///
    /// Directories are recorded with a trailing `/`.
    pub fn watch_file(&mut self, path: impl AsRef<Path>, mask: EventMask) -> Result<i32> {
        self.session_mut().watch_file(path.as_ref(), mask)
    }

    /// Watches several paths, stopping at the first failure.
    ///
    /// Paths watched before the failure stay watched.
    pub fn watch_files<I, P>(&mut self, paths: I, mask: EventMask) -> Result<()>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let session = self.session_mut();
        for path in paths {
            session.watch_file(path.as_ref(), mask)?;
        }
        Ok(())
    }

    /// Watches `path` and every directory below it.
    pub fn watch_recursively(&mut self, path: impl AsRef<Path>, mask: EventMask) -> Result<()> {
        self.watch_recursively_with_exclude(path, mask, std::iter::empty::<&Path>())
    }

    /// Watches `path` and every directory below it, except the excluded ones and their
    /// subtrees.
    ///
    /// See [`TreeWalker::walk`] for the error semantics.
    pub fn watch_recursively_with_exclude<I, P>(
        &mut self,
        path: impl AsRef<Path>,
        mask: EventMask,
        excludes: I,
    ) -> Result<()>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let walker = TreeWalker::new(excludes);
        let session = self.session_mut();
        walker.walk(path.as_ref(), &mut |dir: &Path| {
            session.watch_file(dir, mask).map(|_| ())
        })
    }

    /// Removes the watch with descriptor `wd`. Unknown descriptors are ignored.
    pub fn remove_watch_by_wd(&mut self, wd: i32) -> Result<()> {
        self.session_mut().remove_watch(wd)
    }

    /// Removes the watch established for exactly `path`. Unknown paths are ignored.
    pub fn remove_watch_by_path(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let session = self.session_mut();
        match session.registry.by_path(path).map(Watch::wd) {
            Some(wd) => session.remove_watch(wd),
            None => Ok(()),
        }
    }

    /// The path watch `wd` was established for.
    pub fn path_from_wd(&self, wd: i32) -> Option<&Path> {
        self.session().registry.by_wd(wd).map(Watch::path)
    }

    /// The descriptor of the watch established for exactly `path`.
    pub fn wd_from_path(&self, path: impl AsRef<Path>) -> Option<i32> {
        self.session().registry.by_path(path).map(Watch::wd)
    }

    /// Records that the object watched by `wd` now lives at `path`.
    pub fn set_path_by_wd(&mut self, wd: i32, path: impl Into<PathBuf>) -> bool {
        self.session_mut().registry.rename_by_wd(wd, path)
    }

    /// Records that the object watched at `old_path` now lives at `new_path`.
    pub fn set_path_by_path(
        &mut self,
        old_path: impl AsRef<Path>,
        new_path: impl Into<PathBuf>,
    ) -> bool {
        self.session_mut().registry.rename_by_path(old_path, new_path)
    }

    /// Rewrites every watched path starting with `old_prefix` to start with `new_prefix`.
    ///
    /// Meant for following a directory rename. Returns the number of watches changed.
    pub fn replace_path_prefix(
        &mut self,
        old_prefix: impl AsRef<OsStr>,
        new_prefix: impl AsRef<OsStr>,
    ) -> usize {
        self.session_mut()
            .registry
            .rename_prefix(old_prefix, new_prefix)
    }

    /// Number of live watches.
    pub fn num_watches(&self) -> usize {
        self.session().registry.len()
    }

    /// Live watches in ascending descriptor order.
    pub fn watches(&self) -> impl Iterator<Item = &Watch> {
        self.session().registry.iter()
    }

    /// Live watches in ascending byte-wise path order.
    pub fn watches_by_path(&self) -> impl Iterator<Item = &Watch> {
        self.session().registry.iter_by_path()
    }

    /// Waits for the next event. See [`InotifyTools::next_events`].
    pub fn next_event(&mut self, timeout: Option<Duration>) -> Result<Option<RawEvent>> {
        self.next_events(timeout, 1)
    }

    /// Returns the next event that passes the ignore filter.
    ///
    /// `timeout` applies afresh to every wait: `None` blocks, `Some(Duration::ZERO)` only
    /// polls. `hint` is how many events the caller is about to consume, capped at
    /// [`MAX_EVENTS`]; a hint of zero returns no event. Returns `Ok(None)` on timeout.
    ///
    /// Returned events are counted when statistics are enabled. Events for descriptors
    /// without a live watch are returned as well, their path resolves to nothing.
    pub fn next_events(
        &mut self,
        timeout: Option<Duration>,
        hint: usize,
    ) -> Result<Option<RawEvent>> {
        let session = self.session_mut();
        if hint == 0 {
            return Ok(None);
        }
        let hint = hint.min(MAX_EVENTS);

        loop {
            let Some(event) = session
                .reader
                .next_record(&mut session.backend, timeout, hint)?
            else {
                return Ok(None);
            };

            if session.is_ignored(&event) {
                log::trace!("ignoring event matching filter: {:?}", session.scratch);
                continue;
            }
            if session.registry.by_wd(event.wd).is_none() {
                log::debug!("event for unknown watch descriptor {}", event.wd);
            }

            session.stats.record(&mut session.registry, &event);
            return Ok(Some(event));
        }
    }

    /// Drops events whose `%w%f` rendering matches `pattern` from now on. `None` stops
    /// filtering.
    ///
    /// An invalid pattern clears the previous filter and returns
    /// [`ErrorKind::InvalidPattern`](crate::ErrorKind::InvalidPattern).
    pub fn ignore_events_by_regex(&mut self, pattern: Option<&str>) -> Result<()> {
        let session = self.session_mut();
        session.filter = None;
        if let Some(pattern) = pattern {
            session.filter = Some(Regex::new(pattern)?);
        }
        Ok(())
    }

    /// Sets the strftime pattern `%T` expands with. `None` makes `%T` expand to nothing.
    pub fn set_time_format(&mut self, format: Option<&str>) {
        self.session_mut()
            .formatter
            .set_time_format(format.map(Into::into));
    }

    /// Renders `event` through `template`, bounded to [`MAX_STRLEN`] - 1 characters.
    pub fn format_event(&self, event: &RawEvent, template: &str) -> Result<String> {
        self.format_event_bounded(event, template, MAX_STRLEN)
    }

    /// Renders `event` through `template`, bounded to `max_len - 1` characters.
    pub fn format_event_bounded(
        &self,
        event: &RawEvent,
        template: &str,
        max_len: usize,
    ) -> Result<String> {
        let session = self.session();
        let path = session.registry.by_wd(event.wd).map(Watch::path);
        Ok(session.formatter.render(path, event, template, max_len)?)
    }

    /// Renders `event` through `template` into `writer`, returning the number of bytes
    /// written.
    pub fn write_event<W: Write>(
        &self,
        writer: &mut W,
        event: &RawEvent,
        template: &str,
    ) -> Result<usize> {
        let text = self.format_event(event, template)?;
        writer.write_all(text.as_bytes())?;
        Ok(text.len())
    }

    /// Zeroes every counter and starts collecting statistics.
    pub fn initialize_stats(&mut self) {
        let session = self.session_mut();
        session.stats.enable(&mut session.registry);
    }

    /// Count of `kind` for watch `wd`; an empty `kind` asks for the total.
    ///
    /// `None` when statistics are off, the watch is unknown or `kind` isn't counted.
    pub fn stat_by_wd(&self, wd: i32, kind: EventMask) -> Option<u64> {
        let session = self.session();
        session.stats.get(session.registry.by_wd(wd), kind)
    }

    /// Count of `kind` for the watch established for `path`.
    pub fn stat_by_path(&self, path: impl AsRef<Path>, kind: EventMask) -> Option<u64> {
        let session = self.session();
        session.stats.get(session.registry.by_path(path), kind)
    }

    /// Count of `kind` over all watches.
    pub fn stat_total(&self, kind: EventMask) -> Option<u64> {
        self.session().stats.global(kind)
    }

    /// Every watch ordered by its count of `kind`, ties broken by descriptor.
    pub fn watches_sorted_by(&self, kind: EventMask, order: SortOrder) -> Option<Vec<&Watch>> {
        stats::watches_sorted_by(&self.session().registry, kind, order)
    }
}

impl<B: Backend> Session<B> {
    fn watch_file(&mut self, path: &Path, mask: EventMask) -> Result<i32> {
        log::trace!("adding inotify watch: {}", path.display());

        let wd = self
            .backend
            .add_watch(path, mask)
            .map_err(|err| Error::io_watch(err, path))?;

        if self.registry.create(wd, watched_path(path)).is_none() {
            return Err(Error::generic(&format!("invalid watch descriptor {wd}")).add_path(path));
        }
        Ok(wd)
    }

    fn remove_watch(&mut self, wd: i32) -> Result<()> {
        let Session {
            backend, registry, ..
        } = self;

        match registry.remove_with(wd, |wd| backend.remove_watch(wd)) {
            Ok(Some(watch)) => {
                log::trace!("removed inotify watch: {}", watch.path().display());
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(err) => {
                log::warn!("cannot remove inotify watch {}: {}", wd, err);
                let err = Error::io(err);
                Err(match registry.by_wd(wd) {
                    Some(watch) => err.add_path(watch.path()),
                    None => err,
                })
            }
        }
    }

    /// Renders the filter text for `event` into the scratch buffer and tests it.
    fn is_ignored(&mut self, event: &RawEvent) -> bool {
        let Some(filter) = &self.filter else {
            return false;
        };

        let path = self.registry.by_wd(event.wd).map(Watch::path);
        self.scratch.clear();
        match self
            .formatter
            .render_into(&mut self.scratch, path, event, FILTER_TEMPLATE, MAX_STRLEN)
        {
            Ok(()) => filter.is_match(&self.scratch),
            Err(err) => {
                log::debug!("cannot render filter text: {}", err);
                false
            }
        }
    }
}

/// The path to record for a watch: directories, but not symlinks to them, end with `/`.
fn watched_path(path: &Path) -> PathBuf {
    let is_dir = fs::symlink_metadata(path).is_ok_and(|metadata| metadata.is_dir());
    if is_dir && !path.as_os_str().as_bytes().ends_with(b"/") {
        let mut dir = path.as_os_str().to_owned();
        dir.push("/");
        PathBuf::from(dir)
    } else {
        path.to_path_buf()
    }
}
