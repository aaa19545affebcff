use std::cmp::Ordering;
use std::collections::BTreeMap;

use std::ops::RangeInclusive;

use chrono::{Datelike, Duration, Timelike, Weekday};
use tracing::debug;

use crate::config::{ScoringWeights, SchedulerConfig, TimeOfDayCurve};
use crate::models::decision::SlotCandidate;
use crate::models::interval::TimeInterval;
use crate::models::request::{MeetingRequest, Priority};
use crate::services::conflicts::{self, BusyMap};

pub const FACTOR_CONFLICT: &str = "conflict";
pub const FACTOR_PROXIMITY: &str = "proximity";
pub const FACTOR_TIME_OF_DAY: &str = "time_of_day";
pub const FACTOR_URGENCY: &str = "urgency";

/// Scores closer than this are considered equal when ranking.
pub const SCORE_EPSILON: f64 = 1e-9;

/// Time-of-day multiplier for high-priority meetings on a Monday or Friday.
pub const EDGE_OF_WEEK_MULTIPLIER: f64 = 0.85;
/// Time-of-day multiplier for high-priority meetings on a weekend.
pub const WEEKEND_MULTIPLIER: f64 = 0.7;

/// Meetings at least this long are steered into the morning.
pub const LONG_MEETING_MINUTES: i64 = 90;
pub const LONG_MEETING_HOURS: RangeInclusive<u32> = 9..=11;
pub const LONG_MEETING_OFF_PEAK_MULTIPLIER: f64 = 0.8;

/// Time-of-day score lost per hour away from the organizer's preferred hour.
pub const PREFERRED_HOUR_PENALTY: f64 = 0.05;

/// Strategy turning a candidate interval into a scored [`SlotCandidate`].
///
/// Implementations must be deterministic: identical inputs yield identical
/// scores, otherwise ranking stops being reproducible.
pub trait ScoringStrategy: Send + Sync {
    fn score(
        &self,
        candidate: &TimeInterval,
        request: &MeetingRequest,
        busy: &BusyMap,
    ) -> SlotCandidate;
}

/// Weighted sum of four normalized factors.
#[derive(Debug, Clone)]
pub struct WeightedScorer {
    weights: ScoringWeights,
    curve: TimeOfDayCurve,
    proximity_max_distance: Duration,
}

impl WeightedScorer {
    pub fn new(weights: ScoringWeights, curve: TimeOfDayCurve, proximity_max_distance: Duration) -> Self {
        Self {
            weights,
            curve,
            proximity_max_distance,
        }
    }

    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self::new(
            config.weights.clone(),
            config.time_of_day.clone(),
            config.proximity_max_distance,
        )
    }

    /// 1 when nobody is busy, 0 as soon as anyone is.
    fn conflict_factor(conflicting: usize) -> f64 {
        if conflicting == 0 {
            1.0
        } else {
            0.0
        }
    }

    /// Linear decay from 1 at the preferred start to 0 at the max distance.
    fn proximity_factor(&self, candidate: &TimeInterval, request: &MeetingRequest) -> f64 {
        let Some(preferred) = &request.preferred else {
            return 0.0;
        };
        let distance = candidate.start_distance(preferred).num_seconds() as f64;
        let max_distance = self.proximity_max_distance.num_seconds().max(1) as f64;
        (1.0 - distance / max_distance).clamp(0.0, 1.0)
    }

    /// Mean over participants of the curve at their local start hour, scaled
    /// by day-of-week and meeting-length preferences, then by distance from the
    /// organizer's preferred hour.
    fn time_of_day_factor(&self, candidate: &TimeInterval, request: &MeetingRequest) -> f64 {
        if request.participants.is_empty() {
            return 0.0;
        }
        let priority = request.effective_priority();
        let long_meeting = request.duration >= Duration::minutes(LONG_MEETING_MINUTES);

        let total: f64 = request
            .participants
            .iter()
            .map(|participant| {
                let local = candidate.start().with_timezone(&participant.timezone);
                let mut value = self.curve.value_at(local.hour());
                value *= weekday_multiplier(local.weekday(), priority);
                if long_meeting && !LONG_MEETING_HOURS.contains(&local.hour()) {
                    value *= LONG_MEETING_OFF_PEAK_MULTIPLIER;
                }
                value
            })
            .sum();
        let mean = total / request.participants.len() as f64;

        let preferred = request
            .time_preferences
            .hours_from_preferred(candidate.start())
            .map(|hours| (1.0 - PREFERRED_HOUR_PENALTY * hours as f64).max(0.0))
            .unwrap_or(1.0);

        (mean * preferred).clamp(0.0, 1.0)
    }

    /// Priority-scaled bonus, largest at `earliest_start` and fading to 0 at the last possible start.
    fn urgency_factor(candidate: &TimeInterval, request: &MeetingRequest) -> f64 {
        let urgency = request.effective_priority().urgency_factor();
        let span = (request.latest_start - request.duration - request.earliest_start).num_seconds();
        if span <= 0 {
            return urgency;
        }
        let offset = (candidate.start() - request.earliest_start).num_seconds() as f64;
        let earliness = (1.0 - offset / span as f64).clamp(0.0, 1.0);
        urgency * earliness
    }
}

/// High and urgent meetings favour the middle of the week.
fn weekday_multiplier(weekday: Weekday, priority: Priority) -> f64 {
    if priority < Priority::High {
        return 1.0;
    }
    match weekday {
        Weekday::Tue | Weekday::Wed | Weekday::Thu => 1.0,
        Weekday::Mon | Weekday::Fri => EDGE_OF_WEEK_MULTIPLIER,
        Weekday::Sat | Weekday::Sun => WEEKEND_MULTIPLIER,
    }
}

impl ScoringStrategy for WeightedScorer {
    fn score(
        &self,
        candidate: &TimeInterval,
        request: &MeetingRequest,
        busy: &BusyMap,
    ) -> SlotCandidate {
        let conflicting = conflicts::count_conflicting_participants(candidate, busy);

        let contributions = [
            (FACTOR_CONFLICT, self.weights.conflict * Self::conflict_factor(conflicting)),
            (
                FACTOR_PROXIMITY,
                self.weights.proximity * self.proximity_factor(candidate, request),
            ),
            (
                FACTOR_TIME_OF_DAY,
                self.weights.time_of_day * self.time_of_day_factor(candidate, request),
            ),
            (
                FACTOR_URGENCY,
                self.weights.urgency * Self::urgency_factor(candidate, request),
            ),
        ];

        let breakdown: BTreeMap<String, f64> = contributions
            .iter()
            .map(|(name, value)| (name.to_string(), *value))
            .collect();
        let score = contributions.iter().map(|(_, value)| value).sum();

        SlotCandidate {
            interval: *candidate,
            score,
            breakdown,
            conflicting_participants: conflicting,
        }
    }
}

/// Whether `candidate` may be scored at all.
///
/// Drops starts the organizer's time preferences exclude and, with
/// `request.hard_constraint` set, any candidate with a conflict. Without the
/// hard constraint conflicting candidates stay rankable with a low score.
pub fn is_admissible(candidate: &TimeInterval, request: &MeetingRequest, busy: &BusyMap) -> bool {
    if !request.time_preferences.admits(candidate.start()) {
        return false;
    }
    !request.hard_constraint || conflicts::count_conflicting_participants(candidate, busy) == 0
}

/// Score every admissible candidate and return them in rank order.
pub fn score_candidates<I>(
    candidates: I,
    request: &MeetingRequest,
    busy: &BusyMap,
    strategy: &dyn ScoringStrategy,
) -> Vec<SlotCandidate>
where
    I: IntoIterator<Item = TimeInterval>,
{
    let mut filtered = 0usize;
    let scored: Vec<SlotCandidate> = candidates
        .into_iter()
        .filter(|candidate| {
            let keep = is_admissible(candidate, request, busy);
            if !keep {
                filtered += 1;
            }
            keep
        })
        .map(|candidate| strategy.score(&candidate, request, busy))
        .collect();

    debug!(
        "Scored {} candidates ({} dropped by constraints or preferences)",
        scored.len(),
        filtered
    );

    rank(scored)
}

/// Order by descending score; near-equal scores fall back to earliest start,
/// then fewer conflicting participants.
pub fn rank(mut scored: Vec<SlotCandidate>) -> Vec<SlotCandidate> {
    scored.sort_by(compare_candidates);
    scored
}

fn compare_candidates(a: &SlotCandidate, b: &SlotCandidate) -> Ordering {
    quantize(b.score)
        .cmp(&quantize(a.score))
        .then_with(|| a.interval.start().cmp(&b.interval.start()))
        .then_with(|| a.conflicting_participants.cmp(&b.conflicting_participants))
        .then_with(|| a.interval.end().cmp(&b.interval.end()))
}

/// Snap a score onto an `SCORE_EPSILON` grid so the comparison stays a total order.
fn quantize(score: f64) -> i64 {
    if score.is_nan() {
        return i64::MIN;
    }
    (score / SCORE_EPSILON).round() as i64
}
