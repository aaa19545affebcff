use std::fs;
use std::sync::Arc;

use tempfile::tempdir;

use crate::error::BookingError;
use crate::models::request::Priority;
use crate::providers::ledger::{BookingLedger, STATUS_BOOKED};
use crate::providers::{AvailabilitySource, BookingMetadata, BookingSink};
use crate::tests::common::fixtures::interval;

#[cfg(test)]
mod ledger_tests {
    use super::*;

    fn metadata(title: &str) -> BookingMetadata {
        BookingMetadata {
            title: title.to_string(),
            description: String::new(),
            priority: Priority::High,
        }
    }

    fn ids(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    #[test]
    fn test_new_ledger_writes_headers() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data").join("bookings.csv");

        let ledger = BookingLedger::new(&path).unwrap();

        assert!(path.exists());
        let contents = fs::read_to_string(ledger.path()).unwrap();
        assert!(contents.starts_with("booking_id,participant,title,priority,start_time,end_time,status"));
        assert!(ledger.active_bookings("alice").unwrap().is_empty());
    }

    #[test]
    fn test_book_stores_one_row_per_participant() {
        let dir = tempdir().unwrap();
        let ledger = BookingLedger::new(dir.path().join("bookings.csv")).unwrap();

        let confirmation = ledger
            .book(&interval(10, 0, 11, 0), &ids(&["alice", "bob"]), &metadata("Design review"))
            .unwrap()
            .unwrap();

        assert!(confirmation.booking_id.starts_with("booking_"));
        for participant in ["alice", "bob"] {
            let records = ledger.active_bookings(participant).unwrap();
            assert_eq!(records.len(), 1);
            assert_eq!(records[0].booking_id, confirmation.booking_id);
            assert_eq!(records[0].status, STATUS_BOOKED);
            assert_eq!(records[0].priority, "high");
            assert_eq!(records[0].interval(), Some(interval(10, 0, 11, 0)));
        }
    }

    #[test]
    fn test_overlapping_booking_conflicts() {
        let dir = tempdir().unwrap();
        let ledger = BookingLedger::new(dir.path().join("bookings.csv")).unwrap();
        ledger
            .book(&interval(10, 0, 11, 0), &ids(&["bob"]), &metadata("1:1"))
            .unwrap()
            .unwrap();

        let clash = ledger
            .book(&interval(10, 30, 11, 30), &ids(&["alice", "bob"]), &metadata("Sync"))
            .unwrap();
        assert!(matches!(clash, Err(BookingError::Conflict(reason)) if reason.contains("bob")));
        // Nothing was written for alice
        assert!(ledger.active_bookings("alice").unwrap().is_empty());

        // Touching bookings are fine
        let adjacent = ledger
            .book(&interval(11, 0, 12, 0), &ids(&["alice", "bob"]), &metadata("Sync"))
            .unwrap();
        assert!(adjacent.is_ok());
    }

    #[test]
    fn test_cancel_frees_the_slot() {
        let dir = tempdir().unwrap();
        let ledger = BookingLedger::new(dir.path().join("bookings.csv")).unwrap();
        let first = ledger
            .book(&interval(10, 0, 11, 0), &ids(&["alice", "bob"]), &metadata("Sync"))
            .unwrap()
            .unwrap();

        assert_eq!(ledger.cancel(&first.booking_id).unwrap(), 2);
        assert_eq!(ledger.cancel(&first.booking_id).unwrap(), 0);
        assert!(ledger.active_bookings("alice").unwrap().is_empty());

        let again = ledger
            .book(&interval(10, 0, 11, 0), &ids(&["alice"]), &metadata("Sync"))
            .unwrap();
        assert!(again.is_ok());
    }

    #[tokio::test]
    async fn test_active_bookings_are_busy_windows() {
        let dir = tempdir().unwrap();
        let ledger = BookingLedger::new(dir.path().join("bookings.csv")).unwrap();
        ledger
            .commit(&interval(14, 0, 15, 0), &ids(&["alice"]), &metadata("Late"))
            .await
            .unwrap();
        ledger
            .commit(&interval(9, 0, 10, 0), &ids(&["alice"]), &metadata("Early"))
            .await
            .unwrap();

        let windows = ledger
            .fetch_busy_windows("alice", &interval(8, 0, 14, 30))
            .await
            .unwrap();

        let intervals: Vec<_> = windows.iter().map(|w| w.interval).collect();
        assert_eq!(intervals, vec![interval(9, 0, 10, 0), interval(14, 0, 15, 0)]);
        assert!(windows.iter().all(|w| w.source == "existing-meeting"));

        let outside = ledger
            .fetch_busy_windows("alice", &interval(11, 0, 12, 0))
            .await
            .unwrap();
        assert!(outside.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_commits_only_one_wins() {
        let dir = tempdir().unwrap();
        let ledger = Arc::new(BookingLedger::new(dir.path().join("bookings.csv")).unwrap());

        let mut handles = Vec::new();
        for n in 0..8 {
            let ledger = Arc::clone(&ledger);
            handles.push(tokio::spawn(async move {
                ledger
                    .commit(
                        &interval(10, 0, 11, 0),
                        &ids(&["alice"]),
                        &metadata(&format!("Race {}", n)),
                    )
                    .await
            }));
        }

        let mut wins = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => wins += 1,
                Err(err) => assert!(matches!(err, BookingError::Conflict(_))),
            }
        }

        assert_eq!(wins, 1);
        assert_eq!(ledger.active_bookings("alice").unwrap().len(), 1);
    }
}
