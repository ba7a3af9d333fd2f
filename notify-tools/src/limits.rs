//! Kernel inotify tunables.
//!
//! Each limit is a single decimal integer in a file below `/proc/sys/fs/inotify/`. A limit
//! that can't be read or parsed is reported as `None`.

use std::{fs, path::Path};

const PROC_DIR: &str = "/proc/sys/fs/inotify";

/// Maximum number of events the kernel queues for one inotify instance.
pub fn max_queued_events() -> Option<u64> {
    read_limit(Path::new(PROC_DIR).join("max_queued_events"))
}

/// Maximum number of inotify instances a single user can create.
pub fn max_user_instances() -> Option<u64> {
    read_limit(Path::new(PROC_DIR).join("max_user_instances"))
}

/// Maximum number of watches a single user can establish.
pub fn max_user_watches() -> Option<u64> {
    read_limit(Path::new(PROC_DIR).join("max_user_watches"))
}

/// Reads the first whitespace separated decimal integer from `path`.
pub fn read_limit(path: impl AsRef<Path>) -> Option<u64> {
    let path = path.as_ref();
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) => {
            log::debug!("cannot read {}: {}", path.display(), err);
            return None;
        }
    };

    match contents.split_whitespace().next().map(str::parse::<u64>) {
        Some(Ok(limit)) => Some(limit),
        _ => {
            log::debug!("no integer in {}: {:?}", path.display(), contents);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_first_integer() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("limit");

        fs::write(&file, "8192\n").unwrap();
        assert_eq!(read_limit(&file), Some(8192));

        fs::write(&file, "  16384 trailing").unwrap();
        assert_eq!(read_limit(&file), Some(16384));
    }

    #[test]
    fn unreadable_or_garbage_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("limit");

        assert_eq!(read_limit(&file), None);

        fs::write(&file, "").unwrap();
        assert_eq!(read_limit(&file), None);

        fs::write(&file, "lots").unwrap();
        assert_eq!(read_limit(&file), None);

        fs::write(&file, "-1").unwrap();
        assert_eq!(read_limit(&file), None);
    }
}
