use notify_tools::{Config, EventMask, InotifyTools};
use std::path::Path;

const DEFAULT_FORMAT: &str = "%T %w%f %e";

/// Example for watching a tree and printing every event through a template
fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let path = args.next().expect("Argument 1 needs to be a path");
    let events = args.next().unwrap_or_else(|| "all_events".to_string());
    let format = args.next().unwrap_or_else(|| DEFAULT_FORMAT.to_string());

    log::info!("Watching {path} for {events}");

    if let Err(error) = watch(path, &events, &format) {
        log::error!("Error: {error:?}");
    }
}

fn watch<P: AsRef<Path>>(path: P, events: &str, format: &str) -> notify_tools::Result<()> {
    let mask: EventMask = events.parse()?;

    let config = Config::default()
        .with_time_format(Some("%H:%M:%S"))
        .with_collect_stats(true);
    let mut tools: InotifyTools = InotifyTools::with_config(config);
    tools.initialize()?;

    tools.watch_recursively(path.as_ref(), mask)?;
    log::info!("Established {} watches", tools.num_watches());

    // block until the process is interrupted
    while let Some(event) = tools.next_event(None)? {
        println!("{}", tools.format_event(&event, format)?);
    }

    Ok(())
}
