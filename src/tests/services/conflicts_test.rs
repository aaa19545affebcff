use crate::services::conflicts::{count_conflicting_participants, detect, normalize};
use crate::tests::common::fixtures::{busy, busy_map, interval};

#[cfg(test)]
mod conflicts_tests {
    use super::*;

    #[test]
    fn test_non_overlapping_windows_report_no_conflicts() {
        let map = busy_map(vec![
            busy("alice", 8, 0, 9, 0),
            busy("alice", 12, 0, 13, 0),
            busy("bob", 14, 0, 15, 0),
        ]);

        let report = detect(&interval(10, 0, 11, 0), &map);

        assert!(report.is_free());
        assert_eq!(report.requested, interval(10, 0, 11, 0));
    }

    #[test]
    fn test_identical_interval_reports_that_window() {
        let window = busy("bob", 10, 0, 11, 0);
        let map = busy_map(vec![busy("alice", 13, 0, 14, 0), window.clone()]);

        let report = detect(&interval(10, 0, 11, 0), &map);

        assert_eq!(report.conflicts, vec![window]);
        assert_eq!(report.conflicting_participants().into_iter().collect::<Vec<_>>(), vec!["bob"]);
    }

    #[test]
    fn test_touching_intervals_never_conflict() {
        let map = busy_map(vec![busy("alice", 9, 0, 10, 0), busy("bob", 11, 0, 12, 0)]);

        let report = detect(&interval(10, 0, 11, 0), &map);

        assert!(report.is_free());
        assert_eq!(count_conflicting_participants(&interval(10, 0, 11, 0), &map), 0);
    }

    #[test]
    fn test_partial_overlap_is_reported() {
        // Requested 10:30-11:30 against bob's 10:00-11:00
        let map = busy_map(vec![busy("bob", 10, 0, 11, 0)]);

        let report = detect(&interval(10, 30, 11, 30), &map);

        assert_eq!(report.conflicts.len(), 1);
        assert_eq!(report.conflicts[0].participant, "bob");
        assert_eq!(report.conflicts[0].interval, interval(10, 0, 11, 0));
    }

    #[test]
    fn test_unsorted_windows_are_handled() {
        let map = busy_map(vec![
            busy("alice", 15, 0, 16, 0),
            busy("alice", 10, 30, 11, 30),
            busy("alice", 9, 0, 9, 30),
        ]);

        let report = detect(&interval(10, 0, 11, 0), &map);

        assert_eq!(report.conflicts, vec![busy("alice", 10, 30, 11, 30)]);
    }

    #[test]
    fn test_counts_distinct_participants() {
        let map = busy_map(vec![
            busy("alice", 10, 0, 10, 30),
            busy("alice", 10, 30, 11, 0),
            busy("bob", 10, 15, 10, 45),
            busy("carol", 12, 0, 13, 0),
        ]);

        let requested = interval(10, 0, 11, 0);
        let report = detect(&requested, &map);

        assert_eq!(report.conflicts.len(), 3);
        assert_eq!(count_conflicting_participants(&requested, &map), 2);
    }

    #[test]
    fn test_normalize_sorts_each_participant() {
        let mut map = busy_map(vec![busy("alice", 15, 0, 16, 0), busy("alice", 9, 0, 10, 0)]);

        normalize(&mut map);

        let starts: Vec<_> = map["alice"].iter().map(|w| w.interval.start()).collect();
        let mut sorted = starts.clone();
        sorted.sort();
        assert_eq!(starts, sorted);
    }

    #[test]
    fn test_detection_is_pure() {
        let map = busy_map(vec![busy("alice", 10, 0, 11, 0), busy("bob", 10, 30, 12, 0)]);
        let requested = interval(10, 0, 11, 0);

        assert_eq!(detect(&requested, &map), detect(&requested, &map));
    }
}
