use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::SchedulerConfig;
use crate::error::{BookingError, ConfigError, SchedulingError};
use crate::models::decision::{Outcome, SchedulingDecision, SlotCandidate};
use crate::models::interval::TimeInterval;
use crate::models::request::MeetingRequest;
use crate::providers::{AvailabilitySource, BookingMetadata, BookingSink};
use crate::services::candidates::CandidateGenerator;
use crate::services::conflicts::{self, BusyMap};
use crate::services::scoring::{self, ScoringStrategy, WeightedScorer};

/// Availability gathered for one request.
#[derive(Debug, Default)]
struct AvailabilitySnapshot {
    busy: BusyMap,
    /// Participant id -> reason their calendar could not be read.
    unknown: BTreeMap<String, String>,
}

/// Entry point of the engine.
///
/// Holds only read-only configuration and handles to the collaborators, so a
/// single instance can serve concurrent requests.
pub struct Scheduler {
    config: SchedulerConfig,
    availability: Arc<dyn AvailabilitySource>,
    booking: Arc<dyn BookingSink>,
    scorer: Arc<dyn ScoringStrategy>,
}

impl Scheduler {
    pub fn new(
        config: SchedulerConfig,
        availability: Arc<dyn AvailabilitySource>,
        booking: Arc<dyn BookingSink>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let scorer = Arc::new(WeightedScorer::from_config(&config));

        Ok(Self {
            config,
            availability,
            booking,
            scorer,
        })
    }

    /// Replace the default weighted scorer.
    pub fn with_scorer(mut self, scorer: Arc<dyn ScoringStrategy>) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Report conflicts and recommendations without booking anything.
    pub async fn analyze(&self, request: &MeetingRequest) -> Result<SchedulingDecision, SchedulingError> {
        self.schedule_with_cancellation(request, false, &CancellationToken::new())
            .await
    }

    /// Like [`analyze`](Self::analyze), booking the best slot when `auto_commit` is set.
    pub async fn schedule(
        &self,
        request: &MeetingRequest,
        auto_commit: bool,
    ) -> Result<SchedulingDecision, SchedulingError> {
        self.schedule_with_cancellation(request, auto_commit, &CancellationToken::new())
            .await
    }

    /// Cancellable variant of [`schedule`](Self::schedule).
    ///
    /// Cancelling aborts in-flight availability fetches and prevents further
    /// booking attempts. A booking already issued is always awaited and its
    /// outcome reported, so cancellation never leaves an unobserved booking.
    pub async fn schedule_with_cancellation(
        &self,
        request: &MeetingRequest,
        auto_commit: bool,
        cancel: &CancellationToken,
    ) -> Result<SchedulingDecision, SchedulingError> {
        request.validate(self.config.max_meeting_duration)?;

        info!(
            "Scheduling '{}' for {} participant(s), {} minutes, priority {}, auto_commit={}",
            request.title,
            request.participants.len(),
            request.duration.num_minutes(),
            request.effective_priority().as_str(),
            auto_commit
        );

        // Unreadable calendars degrade to warnings, they never fail the request
        let snapshot = self.fetch_availability(request, cancel).await?;
        let mut decision = SchedulingDecision::new(request);
        record_unknown(&mut decision, &snapshot);

        // A free preferred slot ends the search
        if let Some(preferred) = request.preferred {
            let report = conflicts::detect(&preferred, &snapshot.busy);
            let free = report.is_free();

            if free {
                info!(
                    "Requested slot {} - {} is free for all participants",
                    preferred.start(),
                    preferred.end()
                );
                decision.chosen = Some(preferred);
                decision.outcome = Outcome::RequestedSlotFree;
            } else {
                info!(
                    "Requested slot {} - {} conflicts with {} busy window(s)",
                    preferred.start(),
                    preferred.end(),
                    report.conflicts.len()
                );
            }
            decision.requested_conflicts = Some(report);
        }

        // Conflicting or absent preferred slot: rank alternatives
        if decision.chosen.is_none() {
            decision.ranked = self.generate_and_rank(request, &snapshot.busy, &[]);

            match decision.ranked.first() {
                Some(top) => {
                    info!(
                        "Top candidate {} - {} scored {:.3} ({} ranked)",
                        top.interval.start(),
                        top.interval.end(),
                        top.score,
                        decision.ranked.len()
                    );
                    decision.chosen = Some(top.interval);
                    decision.outcome = Outcome::Recommended;
                }
                None => {
                    warn!("No feasible slot for '{}'", request.title);
                    return Ok(no_feasible_slot(decision));
                }
            }
        }

        if !auto_commit {
            return Ok(decision);
        }

        self.commit_with_retries(request, decision, cancel).await
    }

    /// Fan out availability fetches under one aggregate deadline.
    ///
    /// Failed or still-pending fetches mark the participant as unknown instead
    /// of failing the request.
    async fn fetch_availability(
        &self,
        request: &MeetingRequest,
        cancel: &CancellationToken,
    ) -> Result<AvailabilitySnapshot, SchedulingError> {
        let window = request.search_window();
        let mut snapshot = AvailabilitySnapshot::default();

        let mut pending: FuturesUnordered<_> = request
            .participants
            .iter()
            .map(|participant| {
                let id = participant.id.clone();
                let source = Arc::clone(&self.availability);
                async move {
                    let result = source.fetch_busy_windows(&id, &window).await;
                    (id, result)
                }
            })
            .collect();

        // Counted by hand: the stream is mutably borrowed inside select!
        let mut outstanding = pending.len();
        let deadline = tokio::time::sleep(self.config.fetch_timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    warn!("Availability fetch cancelled with {} request(s) in flight", outstanding);
                    return Err(SchedulingError::Cancelled);
                }
                _ = &mut deadline => {
                    warn!(
                        "Availability deadline of {:?} reached with {} request(s) pending",
                        self.config.fetch_timeout,
                        outstanding
                    );
                    break;
                }
                next = pending.next() => match next {
                    Some((id, Ok(windows))) => {
                        outstanding -= 1;
                        debug!("Fetched {} busy window(s) for {}", windows.len(), id);
                        let windows = windows
                            .into_iter()
                            .map(|window| window.padded(self.config.buffer))
                            .collect();
                        snapshot.busy.insert(id, windows);
                    }
                    Some((id, Err(err))) => {
                        outstanding -= 1;
                        warn!("Availability for {} unknown: {}", id, err);
                        snapshot.unknown.insert(id, err.to_string());
                    }
                    None => break,
                },
            }
        }

        // Whoever never answered before the deadline is unknown as well
        for participant in &request.participants {
            if !snapshot.busy.contains_key(&participant.id)
                && !snapshot.unknown.contains_key(&participant.id)
            {
                snapshot
                    .unknown
                    .insert(participant.id.clone(), "availability fetch timed out".to_string());
            }
        }

        // Adapters may return windows out of order
        conflicts::normalize(&mut snapshot.busy);
        Ok(snapshot)
    }

    /// Generate, filter and rank candidates against `busy`.
    ///
    /// The candidate cap counts only slots that survive the filters, so a run
    /// of conflicting early slots cannot hide a feasible later one.
    fn generate_and_rank(
        &self,
        request: &MeetingRequest,
        busy: &BusyMap,
        exclude: &[TimeInterval],
    ) -> Vec<SlotCandidate> {
        let generator =
            CandidateGenerator::new(request, &self.config).with_max_candidates(usize::MAX);
        let candidates = generator
            .iter()
            .filter(|candidate| !exclude.contains(candidate))
            .filter(|candidate| scoring::is_admissible(candidate, request, busy))
            .take(self.config.max_candidates);

        scoring::score_candidates(candidates, request, busy, self.scorer.as_ref())
    }

    /// Book the chosen slot, falling back to re-ranked alternatives on conflicts.
    ///
    /// Every attempt books only a slot that is conflict-free against the
    /// latest availability snapshot. Without such a slot the outcome is
    /// `NoFeasibleSlot` with an empty ranked list.
    async fn commit_with_retries(
        &self,
        request: &MeetingRequest,
        mut decision: SchedulingDecision,
        cancel: &CancellationToken,
    ) -> Result<SchedulingDecision, SchedulingError> {
        let participants = request.participant_ids();
        let metadata = BookingMetadata::from_request(request);
        let max_attempts = self.config.max_booking_attempts;

        // A free requested slot was already checked; otherwise walk the ranking
        let mut queue: VecDeque<TimeInterval> = match decision.outcome {
            Outcome::RequestedSlotFree => decision.chosen.into_iter().collect(),
            _ => {
                let queue = bookable(&decision.ranked);
                if queue.len() < decision.ranked.len() {
                    debug!(
                        "Skipping {} ranked candidate(s) with known conflicts",
                        decision.ranked.len() - queue.len()
                    );
                }
                queue
            }
        };
        let mut failed: Vec<TimeInterval> = Vec::new();

        while decision.booking_attempts < max_attempts {
            let Some(target) = queue.pop_front() else {
                warn!(
                    "No conflict-free candidate for '{}' after {} attempt(s)",
                    request.title, decision.booking_attempts
                );
                decision.warnings.push(if decision.booking_attempts == 0 {
                    "every ranked candidate conflicts with a participant's calendar; nothing booked"
                        .to_string()
                } else {
                    format!(
                        "no conflict-free candidate left after {} conflicting attempt(s)",
                        decision.booking_attempts
                    )
                });
                return Ok(no_feasible_slot(decision));
            };

            // Checked only between attempts; an issued booking is never abandoned
            if cancel.is_cancelled() {
                warn!("Scheduling cancelled before booking attempt {}", decision.booking_attempts + 1);
                return Err(SchedulingError::Cancelled);
            }

            decision.booking_attempts += 1;
            info!(
                "Booking attempt {}/{} for {} - {}",
                decision.booking_attempts,
                max_attempts,
                target.start(),
                target.end()
            );

            // Issued bookings are awaited to completion regardless of cancellation
            match self.booking.commit(&target, &participants, &metadata).await {
                Ok(confirmation) => {
                    info!("Booked {} as {}", request.title, confirmation.booking_id);
                    decision.chosen = Some(target);
                    decision.booking = Some(confirmation);
                    decision.outcome = Outcome::Committed;
                    return Ok(decision);
                }
                Err(BookingError::Rejected(reason)) => {
                    error!("Booking rejected for {}: {}", request.title, reason);
                    return Err(SchedulingError::BookingRejected(reason));
                }
                Err(BookingError::Conflict(reason)) => {
                    warn!(
                        "Booking attempt {} conflicted: {}",
                        decision.booking_attempts, reason
                    );
                    decision.warnings.push(format!(
                        "booking attempt {} for {} conflicted: {}",
                        decision.booking_attempts,
                        target.start().to_rfc3339(),
                        reason
                    ));
                    failed.push(target);

                    if decision.booking_attempts >= max_attempts {
                        break;
                    }

                    // Someone else wrote in the meantime: drop cached reads and look again
                    self.availability.invalidate();
                    let refreshed = self.fetch_availability(request, cancel).await?;
                    record_unknown(&mut decision, &refreshed);

                    // Re-rank without the intervals that already failed
                    decision.ranked = self.generate_and_rank(request, &refreshed.busy, &failed);
                    queue = bookable(&decision.ranked);
                    debug!("{} conflict-free candidate(s) after refresh", queue.len());
                }
            }
        }

        warn!(
            "Giving up on '{}' after {} conflicting booking attempt(s)",
            request.title, decision.booking_attempts
        );
        decision.chosen = None;
        decision.outcome = Outcome::BookingContention;
        Ok(decision)
    }
}

/// Ranked intervals nobody is known to be busy in, best first.
fn bookable(ranked: &[SlotCandidate]) -> VecDeque<TimeInterval> {
    ranked
        .iter()
        .filter(|candidate| candidate.conflicting_participants == 0)
        .map(|candidate| candidate.interval)
        .collect()
}

fn no_feasible_slot(mut decision: SchedulingDecision) -> SchedulingDecision {
    decision.chosen = None;
    decision.ranked.clear();
    decision.outcome = Outcome::NoFeasibleSlot;
    decision
}

fn record_unknown(decision: &mut SchedulingDecision, snapshot: &AvailabilitySnapshot) {
    for (participant, reason) in &snapshot.unknown {
        if decision.unknown_availability.contains(participant) {
            continue;
        }
        decision.unknown_availability.push(participant.clone());
        decision.warnings.push(format!(
            "availability unknown for {}: {}; treated as free",
            participant, reason
        ));
    }
}
