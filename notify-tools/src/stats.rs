//! Per-watch and global event counters.

use notify_tools_types::{EventMask, RawEvent};

use crate::registry::{Watch, WatchRegistry};

const KIND_COUNTERS: usize = 13;

/// Kinds that get their own counter, besides the total.
pub const COUNTED_KINDS: [EventMask; KIND_COUNTERS] = [
    EventMask::ACCESS,
    EventMask::MODIFY,
    EventMask::ATTRIB,
    EventMask::CLOSE_WRITE,
    EventMask::CLOSE_NOWRITE,
    EventMask::OPEN,
    EventMask::MOVED_FROM,
    EventMask::MOVED_TO,
    EventMask::CREATE,
    EventMask::DELETE,
    EventMask::DELETE_SELF,
    EventMask::UNMOUNT,
    EventMask::MOVE_SELF,
];

fn counter_index(kind: EventMask) -> Option<usize> {
    COUNTED_KINDS.iter().position(|counted| *counted == kind)
}

/// Hit counts for each counted kind plus a total.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Counters {
    hits: [u64; KIND_COUNTERS],
    total: u64,
}

impl Counters {
    /// Counts one record: every counted kind bit in `mask` once, and the total once.
    pub fn record(&mut self, mask: EventMask) {
        for (hits, kind) in self.hits.iter_mut().zip(COUNTED_KINDS) {
            if mask.contains(kind) {
                *hits += 1;
            }
        }
        self.total += 1;
    }

    /// The count for a single counted kind, or the total when `kind` is empty.
    ///
    /// Returns `None` for anything else, including unions of kinds.
    pub fn get(&self, kind: EventMask) -> Option<u64> {
        if kind.is_empty() {
            Some(self.total)
        } else {
            counter_index(kind).map(|index| self.hits[index])
        }
    }

    /// Number of records counted.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Zeroes every counter.
    pub fn reset(&mut self) {
        *self = Counters::default();
    }
}

/// Direction for [`watches_sorted_by`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SortOrder {
    /// Smallest count first.
    Ascending,

    /// Largest count first.
    Descending,
}

/// Whether statistics are collected, and the global counters.
#[derive(Debug, Default)]
pub struct Stats {
    enabled: bool,
    global: Counters,
}

impl Stats {
    /// Zeroes all counters, per watch and global, and starts collecting.
    ///
    /// Calling this again while enabled starts over from zero.
    pub fn enable(&mut self, registry: &mut WatchRegistry) {
        registry.reset_counters();
        self.global.reset();
        self.enabled = true;
    }

    /// Whether statistics are being collected.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Counts `event` against its watch and globally.
    ///
    /// Nothing is counted when collection is off or the descriptor has no live watch.
    pub fn record(&mut self, registry: &mut WatchRegistry, event: &RawEvent) {
        if !self.enabled {
            return;
        }

        match registry.by_wd_mut(event.wd) {
            Some(watch) => {
                watch.counters_mut().record(event.mask);
                self.global.record(event.mask);
            }
            None => log::debug!("not counting event for unknown watch descriptor {}", event.wd),
        }
    }

    /// The count of `kind` for one watch.
    pub fn get(&self, watch: Option<&Watch>, kind: EventMask) -> Option<u64> {
        if !self.enabled {
            return None;
        }
        watch?.counters().get(kind)
    }

    /// The count of `kind` over all watches.
    pub fn global(&self, kind: EventMask) -> Option<u64> {
        if !self.enabled {
            return None;
        }
        self.global.get(kind)
    }
}

/// Every watch ordered by its count of `kind`, ties broken by ascending descriptor.
///
/// `kind` is a single counted kind, or empty for the total. Returns `None` for other masks.
pub fn watches_sorted_by(
    registry: &WatchRegistry,
    kind: EventMask,
    order: SortOrder,
) -> Option<Vec<&Watch>> {
    if !kind.is_empty() && counter_index(kind).is_none() {
        return None;
    }

    let mut watches: Vec<(u64, &Watch)> = registry
        .iter()
        .map(|watch| (watch.counters().get(kind).unwrap_or(0), watch))
        .collect();

    watches.sort_by(|(a, wa), (b, wb)| {
        let by_count = match order {
            SortOrder::Ascending => a.cmp(b),
            SortOrder::Descending => b.cmp(a),
        };
        by_count.then(wa.wd().cmp(&wb.wd()))
    });

    Some(watches.into_iter().map(|(_, watch)| watch).collect())
}
