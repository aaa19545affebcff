use std::borrow::Cow;
use std::collections::BTreeMap;

use tracing::debug;

use crate::models::decision::ConflictReport;
use crate::models::interval::{BusyWindow, TimeInterval};

/// Busy windows per participant identifier.
///
/// A `BTreeMap` keeps iteration order, and therefore every report built from
/// it, stable across runs.
pub type BusyMap = BTreeMap<String, Vec<BusyWindow>>;

/// Report which participants are busy during `interval`.
///
/// Pure function of its inputs. Windows are expected sorted by start per
/// participant, but unsorted input is sorted locally before scanning.
pub fn detect(interval: &TimeInterval, busy: &BusyMap) -> ConflictReport {
    let mut conflicts = Vec::new();

    for (participant, windows) in busy {
        let overlapping = overlapping_windows(interval, windows);
        if !overlapping.is_empty() {
            debug!(
                "{} has {} busy window(s) overlapping {} - {}",
                participant,
                overlapping.len(),
                interval.start(),
                interval.end()
            );
        }
        conflicts.extend(overlapping);
    }

    ConflictReport::new(*interval, conflicts)
}

/// Number of distinct participants busy during `interval`.
pub fn count_conflicting_participants(interval: &TimeInterval, busy: &BusyMap) -> usize {
    busy.values()
        .filter(|windows| {
            sorted(windows)
                .iter()
                .take_while(|window| window.interval.start() < interval.end())
                .any(|window| window.interval.overlaps(interval))
        })
        .count()
}

/// Sort each participant's windows by start time.
pub fn normalize(busy: &mut BusyMap) {
    for windows in busy.values_mut() {
        if !is_sorted(windows) {
            windows.sort_by_key(|window| window.interval);
        }
    }
}

fn overlapping_windows(interval: &TimeInterval, windows: &[BusyWindow]) -> Vec<BusyWindow> {
    sorted(windows)
        .iter()
        // Sorted by start: nothing past the requested end can overlap
        .take_while(|window| window.interval.start() < interval.end())
        .filter(|window| window.interval.overlaps(interval))
        .cloned()
        .collect()
}

fn sorted(windows: &[BusyWindow]) -> Cow<'_, [BusyWindow]> {
    if is_sorted(windows) {
        Cow::Borrowed(windows)
    } else {
        let mut owned = windows.to_vec();
        owned.sort_by_key(|window| window.interval);
        Cow::Owned(owned)
    }
}

fn is_sorted(windows: &[BusyWindow]) -> bool {
    windows
        .windows(2)
        .all(|pair| pair[0].interval.start() <= pair[1].interval.start())
}
