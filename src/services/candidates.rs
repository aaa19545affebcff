use std::iter::FusedIterator;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::config::SchedulerConfig;
use crate::models::interval::TimeInterval;
use crate::models::participant::{Participant, WorkingHours};
use crate::models::request::MeetingRequest;

/// Enumerates candidate meeting intervals for a request.
///
/// Starts run from `earliest_start` to `latest_start - duration` (inclusive)
/// in `step` increments, further capped by the search horizon. A start is
/// kept only when the whole meeting falls inside every participant's working
/// hours, evaluated in each participant's own timezone. Enumeration stops
/// quietly after `max_candidates` emitted slots.
///
/// The generator itself holds no cursor: every call to [`iter`](Self::iter)
/// restarts from the beginning.
#[derive(Debug, Clone)]
pub struct CandidateGenerator<'a> {
    participants: &'a [Participant],
    default_hours: &'a WorkingHours,
    duration: Duration,
    step: Duration,
    first_start: DateTime<Utc>,
    last_start: DateTime<Utc>,
    max_candidates: usize,
}

impl<'a> CandidateGenerator<'a> {
    /// Expects a validated request and configuration.
    pub fn new(request: &'a MeetingRequest, config: &'a SchedulerConfig) -> Self {
        let horizon_end = request.latest_start - request.duration;
        let capped_end = request
            .earliest_start
            .checked_add_signed(config.horizon_cap)
            .unwrap_or(horizon_end);

        Self {
            participants: &request.participants,
            default_hours: &config.default_working_hours,
            duration: request.duration,
            step: config.step,
            first_start: request.earliest_start,
            last_start: horizon_end.min(capped_end),
            max_candidates: config.max_candidates,
        }
    }

    pub fn with_step(mut self, step: Duration) -> Self {
        assert!(step > Duration::zero(), "candidate step must be positive");
        self.step = step;
        self
    }

    pub fn with_max_candidates(mut self, max_candidates: usize) -> Self {
        self.max_candidates = max_candidates;
        self
    }

    /// Latest start time that may be emitted.
    pub fn last_start(&self) -> DateTime<Utc> {
        self.last_start
    }

    pub fn iter(&self) -> Candidates<'a> {
        debug!(
            "Generating candidates from {} to {} every {} minutes (max {})",
            self.first_start,
            self.last_start,
            self.step.num_minutes(),
            self.max_candidates
        );

        Candidates {
            participants: self.participants,
            default_hours: self.default_hours,
            duration: self.duration,
            step: self.step,
            cursor: self.first_start,
            last_start: self.last_start,
            remaining: self.max_candidates,
        }
    }
}

impl<'a> IntoIterator for &CandidateGenerator<'a> {
    type Item = TimeInterval;
    type IntoIter = Candidates<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Lazy candidate sequence produced by [`CandidateGenerator::iter`].
#[derive(Debug, Clone)]
pub struct Candidates<'a> {
    participants: &'a [Participant],
    default_hours: &'a WorkingHours,
    duration: Duration,
    step: Duration,
    cursor: DateTime<Utc>,
    last_start: DateTime<Utc>,
    remaining: usize,
}

impl Candidates<'_> {
    fn fits_everyone(&self, interval: &TimeInterval) -> bool {
        self.participants
            .iter()
            .all(|participant| participant.is_available_during(interval, self.default_hours))
    }
}

impl Iterator for Candidates<'_> {
    type Item = TimeInterval;

    fn next(&mut self) -> Option<TimeInterval> {
        while self.remaining > 0 && self.cursor <= self.last_start {
            let interval = TimeInterval::starting_at(self.cursor, self.duration);
            match self.cursor.checked_add_signed(self.step) {
                Some(next) => self.cursor = next,
                // Past the representable range: this start is the last one
                None => self.last_start = DateTime::<Utc>::MIN_UTC,
            }

            if self.fits_everyone(&interval) {
                self.remaining -= 1;
                return Some(interval);
            }
        }
        None
    }
}

impl FusedIterator for Candidates<'_> {}
