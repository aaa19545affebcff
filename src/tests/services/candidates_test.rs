use chrono::{Duration, NaiveTime, Weekday};

use crate::config::SchedulerConfig;
use crate::models::interval::TimeInterval;
use crate::models::participant::WorkingHours;
use crate::services::candidates::CandidateGenerator;
use crate::tests::common::fixtures::{at, on, participant, request};

#[cfg(test)]
mod candidates_tests {
    use super::*;

    fn starts(candidates: &[TimeInterval]) -> Vec<chrono::DateTime<chrono::Utc>> {
        candidates.iter().map(|c| c.start()).collect()
    }

    #[test]
    fn test_enumerates_every_step_inside_the_horizon() {
        let config = SchedulerConfig::default();
        let req = request("Team sync", &["alice", "bob"], 60, 9, 12);

        let candidates: Vec<_> = CandidateGenerator::new(&req, &config).iter().collect();

        assert_eq!(
            starts(&candidates),
            vec![at(9, 0), at(9, 30), at(10, 0), at(10, 30), at(11, 0)]
        );
        assert!(candidates.iter().all(|c| c.duration() == Duration::minutes(60)));
    }

    #[test]
    fn test_never_leaves_the_horizon() {
        let config = SchedulerConfig::default();
        let req = request("Team sync", &["alice"], 45, 9, 17);
        let generator = CandidateGenerator::new(&req, &config);

        assert_eq!(generator.last_start(), at(16, 15));
        for candidate in &generator {
            assert!(candidate.start() >= req.earliest_start);
            assert!(candidate.start() <= req.latest_start - req.duration);
        }
    }

    #[test]
    fn test_respects_working_hours() {
        let config = SchedulerConfig::default();
        // Horizon covers the whole day; default hours are 09:00-17:00
        let req = request("Team sync", &["alice"], 60, 0, 23);

        let candidates: Vec<_> = CandidateGenerator::new(&req, &config).iter().collect();

        assert_eq!(candidates.first().map(|c| c.start()), Some(at(9, 0)));
        assert_eq!(candidates.last().map(|c| c.end()), Some(at(17, 0)));
        assert!(candidates
            .iter()
            .all(|c| participant("alice").is_available_during(c, &config.default_working_hours)));
    }

    #[test]
    fn test_intersects_participants_timezones() {
        let config = SchedulerConfig::default();
        let mut req = request("Team sync", &["alice"], 60, 0, 23);
        // New York is UTC-4 in April: 09:00-17:00 local is 13:00-21:00 UTC
        req.participants
            .push(participant("bob").with_timezone(chrono_tz::America::New_York));

        let candidates: Vec<_> = CandidateGenerator::new(&req, &config).iter().collect();

        assert_eq!(
            starts(&candidates),
            vec![at(13, 0), at(13, 30), at(14, 0), at(14, 30), at(15, 0), at(15, 30), at(16, 0)]
        );
    }

    #[test]
    fn test_custom_working_hours_override_default() {
        let config = SchedulerConfig::default();
        let mut req = request("Team sync", &[], 60, 0, 23);
        req.participants.push(participant("early").with_working_hours(WorkingHours::new(
            NaiveTime::from_hms_opt(7, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        )));

        let candidates: Vec<_> = CandidateGenerator::new(&req, &config).iter().collect();

        assert_eq!(starts(&candidates), vec![at(7, 0), at(7, 30), at(8, 0)]);
    }

    #[test]
    fn test_skips_non_working_days() {
        let config = SchedulerConfig::default();
        let mut req = request("Team sync", &["alice"], 60, 9, 12);
        // Saturday 2025-04-05
        req.earliest_start = on(5, 9, 0);
        req.latest_start = on(5, 17, 0);

        assert_eq!(CandidateGenerator::new(&req, &config).iter().count(), 0);

        req.participants[0] = participant("alice").with_working_hours(
            WorkingHours::default().with_days(vec![Weekday::Sat]),
        );
        assert_eq!(CandidateGenerator::new(&req, &config).iter().count(), 15);
    }

    #[test]
    fn test_step_and_cap() {
        let config = SchedulerConfig::default();
        let req = request("Team sync", &["alice"], 30, 9, 17);

        let hourly: Vec<_> = CandidateGenerator::new(&req, &config)
            .with_step(Duration::hours(1))
            .iter()
            .collect();
        assert_eq!(hourly.len(), 8);

        let capped: Vec<_> = CandidateGenerator::new(&req, &config)
            .with_max_candidates(3)
            .iter()
            .collect();
        assert_eq!(starts(&capped), vec![at(9, 0), at(9, 30), at(10, 0)]);
    }

    #[test]
    fn test_horizon_cap_limits_far_horizons() {
        let config = SchedulerConfig {
            horizon_cap: Duration::days(1),
            max_candidates: 1000,
            ..SchedulerConfig::default()
        };
        let mut req = request("Team sync", &["alice"], 60, 9, 12);
        req.latest_start = on(30, 17, 0);

        let generator = CandidateGenerator::new(&req, &config);

        assert_eq!(generator.last_start(), on(2, 9, 0));
        assert!(generator.iter().all(|c| c.start() <= on(2, 9, 0)));
    }

    #[test]
    fn test_iteration_restarts() {
        let config = SchedulerConfig::default();
        let req = request("Team sync", &["alice"], 60, 9, 12);
        let generator = CandidateGenerator::new(&req, &config);

        let first: Vec<_> = generator.iter().collect();
        let second: Vec<_> = generator.iter().collect();
        assert_eq!(first, second);

        let mut exhausted = generator.iter();
        exhausted.by_ref().for_each(drop);
        assert_eq!(exhausted.next(), None);
    }

    #[test]
    fn test_huge_step_and_horizon_stop_cleanly() {
        let huge = Duration::try_days(100_000_000_000).unwrap();
        let config = SchedulerConfig {
            step: huge,
            horizon_cap: huge,
            ..SchedulerConfig::default()
        };
        let req = request("Team sync", &["alice"], 60, 9, 12);

        let generator = CandidateGenerator::new(&req, &config);
        let candidates: Vec<_> = generator.iter().collect();

        assert_eq!(generator.last_start(), at(11, 0));
        assert_eq!(starts(&candidates), vec![at(9, 0)]);
    }
}
