#![cfg(target_os = "linux")]

use std::{
    ffi::OsStr,
    fs,
    path::Path,
    time::{Duration, Instant},
};

use notify_tools::{
    limits, Config, ErrorKind, EventMask, InotifyTools, RawEvent, SortOrder, MAX_RECORD_SIZE,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

const TIMEOUT: Option<Duration> = Some(Duration::from_secs(5));

fn testdir() -> TempDir {
    tempfile::Builder::new()
        .prefix("notify-tools")
        .tempdir()
        .expect("failed to create temporary directory")
}

fn tools() -> InotifyTools {
    tools_with(Config::default())
}

fn tools_with(config: Config) -> InotifyTools {
    let mut tools: InotifyTools = InotifyTools::with_config(config);
    tools.initialize().expect("failed to initialize inotify");
    tools
}

fn dir_path(dir: &Path) -> String {
    format!("{}/", dir.display())
}

fn next(tools: &mut InotifyTools) -> RawEvent {
    tools
        .next_event(TIMEOUT)
        .expect("failed to read event")
        .expect("timed out waiting for an event")
}

#[test]
fn create_event_names_the_child() {
    let dir = testdir();
    let mut tools = tools();
    let wd = tools.watch_file(dir.path(), EventMask::CREATE).unwrap();

    fs::write(dir.path().join("entry"), b"").unwrap();

    let event = next(&mut tools);
    assert_eq!(event.wd, wd);
    assert_eq!(event.mask, EventMask::CREATE);
    assert_eq!(event.name_or_empty(), OsStr::new("entry"));
    assert_eq!(
        tools.format_event(&event, "%w%f %e").unwrap(),
        format!("{}entry CREATE", dir_path(dir.path()))
    );
}

#[test]
fn directory_events_carry_isdir() {
    let dir = testdir();
    let mut tools = tools();
    tools.watch_file(dir.path(), EventMask::CREATE).unwrap();

    fs::create_dir(dir.path().join("sub")).unwrap();

    let event = next(&mut tools);
    assert_eq!(event.mask, EventMask::CREATE | EventMask::ISDIR);
    assert_eq!(
        tools.format_event(&event, "in %w: %e").unwrap(),
        format!("in {}: CREATE,ISDIR", dir_path(dir.path()))
    );
}

#[test]
fn timeout_yields_nothing() {
    let dir = testdir();
    let mut tools = tools();
    tools.watch_file(dir.path(), EventMask::ALL_EVENTS).unwrap();

    assert_eq!(tools.next_event(Some(Duration::ZERO)).unwrap(), None);

    let start = Instant::now();
    assert_eq!(
        tools.next_event(Some(Duration::from_millis(50))).unwrap(),
        None
    );
    assert!(start.elapsed() >= Duration::from_millis(40));
}

#[test]
fn batch_of_events_is_read_in_order() {
    let dir = testdir();
    let mut tools = tools();
    tools.watch_file(dir.path(), EventMask::CREATE).unwrap();

    for name in ["one", "two", "three"] {
        fs::write(dir.path().join(name), b"").unwrap();
    }

    let names: Vec<_> = (0..3)
        .map(|_| {
            let event = tools.next_events(TIMEOUT, 3).unwrap().unwrap();
            event.name_or_empty().to_string_lossy().into_owned()
        })
        .collect();
    assert_eq!(names, vec!["one", "two", "three"]);
}

#[test]
fn recursive_watch_with_exclude() {
    let dir = testdir();
    fs::create_dir_all(dir.path().join("a/deep")).unwrap();
    fs::create_dir_all(dir.path().join("b/inner")).unwrap();
    fs::write(dir.path().join("a/file"), b"").unwrap();

    let mut tools = tools();
    let excludes = [dir.path().join("b")];
    tools
        .watch_recursively_with_exclude(dir.path(), EventMask::CREATE, excludes)
        .unwrap();

    let base = dir_path(dir.path());
    let paths: Vec<String> = tools
        .watches_by_path()
        .map(|watch| watch.path().to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        paths,
        vec![base.clone(), format!("{base}a/"), format!("{base}a/deep/")]
    );

    // events from the excluded subtree never arrive
    fs::write(dir.path().join("b/inner/ignored"), b"").unwrap();
    fs::write(dir.path().join("a/deep/seen"), b"").unwrap();

    let event = next(&mut tools);
    assert_eq!(
        tools.format_event(&event, "%w%f").unwrap(),
        format!("{base}a/deep/seen")
    );
}

#[test]
fn recursive_watch_on_file_watches_it() {
    let dir = testdir();
    let file = dir.path().join("file");
    fs::write(&file, b"").unwrap();

    let mut tools = tools();
    tools.watch_recursively(&file, EventMask::MODIFY).unwrap();

    assert_eq!(tools.num_watches(), 1);
    assert!(tools.wd_from_path(&file).is_some());
}

#[test]
fn ignore_filter_and_stats() {
    let dir = testdir();
    let mut tools = tools_with(Config::default().with_collect_stats(true));
    let wd = tools.watch_file(dir.path(), EventMask::CREATE).unwrap();
    tools.ignore_events_by_regex(Some("\\.swp$")).unwrap();

    fs::write(dir.path().join("edit.swp"), b"").unwrap();
    fs::write(dir.path().join("edit.txt"), b"").unwrap();

    let event = next(&mut tools);
    assert_eq!(event.name_or_empty(), OsStr::new("edit.txt"));

    assert_eq!(tools.stat_total(EventMask::CREATE), Some(1));
    assert_eq!(tools.stat_by_wd(wd, EventMask::empty()), Some(1));
    assert_eq!(tools.stat_by_path(dir_path(dir.path()), EventMask::CREATE), Some(1));

    let sorted = tools
        .watches_sorted_by(EventMask::CREATE, SortOrder::Descending)
        .unwrap();
    assert_eq!(sorted.len(), 1);
    assert_eq!(sorted[0].wd(), wd);
}

#[test]
fn removed_watch_reports_ignored() {
    let dir = testdir();
    let mut tools = tools();
    let wd = tools.watch_file(dir.path(), EventMask::CREATE).unwrap();

    tools.remove_watch_by_path(dir_path(dir.path())).unwrap();
    assert_eq!(tools.num_watches(), 0);

    let event = next(&mut tools);
    assert_eq!(event.wd, wd);
    assert!(event.mask.contains(EventMask::IGNORED));
    assert_eq!(tools.path_from_wd(wd), None);
}

#[test]
fn renamed_directory_follows_prefix() {
    let dir = testdir();
    fs::create_dir_all(dir.path().join("old/sub")).unwrap();

    let mut tools = tools();
    tools
        .watch_recursively(dir.path().join("old"), EventMask::CREATE)
        .unwrap();

    fs::rename(dir.path().join("old"), dir.path().join("new")).unwrap();
    let base = dir_path(dir.path());
    let renamed = tools.replace_path_prefix(format!("{base}old/"), format!("{base}new/"));
    assert_eq!(renamed, 2);

    fs::write(dir.path().join("new/sub/file"), b"").unwrap();
    let event = next(&mut tools);
    assert_eq!(
        tools.format_event(&event, "%w%f").unwrap(),
        format!("{base}new/sub/file")
    );
}

#[test]
fn short_buffer_is_a_protocol_error() {
    let dir = testdir();
    let mut tools = tools_with(Config::default().with_buffer_capacity(32));
    tools.watch_file(dir.path(), EventMask::CREATE).unwrap();

    fs::write(dir.path().join("a-rather-long-file-name"), b"").unwrap();

    let err = tools.next_event(TIMEOUT).unwrap_err();
    assert!(
        matches!(err.kind, ErrorKind::Protocol(_)),
        "unexpected error {err:?}"
    );
}

#[test]
fn buffer_of_max_record_size_reads_any_name() {
    let dir = testdir();
    let mut tools = tools_with(Config::default().with_buffer_capacity(MAX_RECORD_SIZE));
    tools.watch_file(dir.path(), EventMask::CREATE).unwrap();

    let name = "n".repeat(255);
    fs::write(dir.path().join(&name), b"").unwrap();

    let event = next(&mut tools);
    assert_eq!(event.name_or_empty(), OsStr::new(&name));
}

#[test]
fn missing_path_is_reported() {
    let dir = testdir();
    let mut tools = tools();

    let err = tools
        .watch_file(dir.path().join("missing"), EventMask::ALL_EVENTS)
        .unwrap_err();
    assert!(matches!(err.kind, ErrorKind::PathNotFound));
    assert_eq!(err.paths, vec![dir.path().join("missing")]);
}

#[test]
fn kernel_limits_are_positive() {
    for limit in [
        limits::max_queued_events(),
        limits::max_user_instances(),
        limits::max_user_watches(),
    ]
    .into_iter()
    .flatten()
    {
        assert!(limit > 0);
    }
}
