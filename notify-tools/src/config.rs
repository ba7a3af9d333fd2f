//! Configuration types

use crate::reader::{DEFAULT_BUFFER_CAPACITY, HEADER_SIZE};

/// Settings applied when an [`InotifyTools`](crate::InotifyTools) context is initialized.
///
/// ```rust
/// # use notify_tools::Config;
/// let config = Config::default()
///     .with_collect_stats(true)
///     .with_time_format(Some("%H:%M:%S"));
/// ```
///
/// Everything except the buffer capacity can also be changed on a live context.
#[derive(Clone, PartialEq, Eq, Debug, Hash)]
pub struct Config {
    /// See [Config::with_collect_stats]
    collect_stats: bool,

    /// See [Config::with_time_format]
    time_format: Option<String>,

    /// See [Config::with_ignore_regex]
    ignore_regex: Option<String>,

    /// See [Config::with_buffer_capacity]
    buffer_capacity: usize,
}

impl Config {
    /// Start counting events per watch and globally right away.
    ///
    /// Off by default.
    pub fn with_collect_stats(mut self, collect_stats: bool) -> Self {
        self.collect_stats = collect_stats;
        self
    }

    /// Returns current setting
    pub fn collect_stats(&self) -> bool {
        self.collect_stats
    }

    /// The strftime pattern the `%T` format token expands with.
    ///
    /// Unset by default, which makes `%T` expand to nothing.
    pub fn with_time_format(mut self, time_format: Option<&str>) -> Self {
        self.time_format = time_format.map(Into::into);
        self
    }

    /// Returns current setting
    pub fn time_format(&self) -> Option<&str> {
        self.time_format.as_deref()
    }

    /// Drop events whose `%w%f` rendering matches this regular expression.
    ///
    /// The pattern is compiled on initialization, which fails if it is invalid.
    pub fn with_ignore_regex(mut self, ignore_regex: Option<&str>) -> Self {
        self.ignore_regex = ignore_regex.map(Into::into);
        self
    }

    /// Returns current setting
    pub fn ignore_regex(&self) -> Option<&str> {
        self.ignore_regex.as_deref()
    }

    /// Size in bytes of the buffer raw records are read into.
    ///
    /// Every record must fit in it, so it should hold at least
    /// [`MAX_RECORD_SIZE`](crate::MAX_RECORD_SIZE) bytes. Reading a record that does not fit
    /// fails with [`ErrorKind::Protocol`](crate::ErrorKind::Protocol). Smaller values are
    /// raised to one header. Defaults to room for 4096 nameless records.
    ///
    /// This can't be changed during runtime.
    pub fn with_buffer_capacity(mut self, buffer_capacity: usize) -> Self {
        self.buffer_capacity = buffer_capacity.max(HEADER_SIZE);
        self
    }

    /// Returns current setting
    pub fn buffer_capacity(&self) -> usize {
        self.buffer_capacity
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            collect_stats: false,
            time_format: None,
            ignore_regex: None,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder() {
        let config = Config::default()
            .with_collect_stats(true)
            .with_time_format(Some("%T"))
            .with_ignore_regex(Some("\\.swp$"))
            .with_buffer_capacity(1);

        assert!(config.collect_stats());
        assert_eq!(config.time_format(), Some("%T"));
        assert_eq!(config.ignore_regex(), Some("\\.swp$"));
        assert_eq!(config.buffer_capacity(), HEADER_SIZE);
    }

    #[test]
    fn defaults() {
        let config = Config::default();
        assert!(!config.collect_stats());
        assert_eq!(config.time_format(), None);
        assert_eq!(config.ignore_regex(), None);
        assert_eq!(config.buffer_capacity(), 65536);
    }
}
