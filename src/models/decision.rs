use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::models::interval::{BusyWindow, TimeInterval};
use crate::models::request::{minutes, MeetingRequest, Priority};

/// Busy windows that overlap a requested interval.
///
/// An empty conflict list means every participant with known availability is
/// free for the whole interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictReport {
    pub requested: TimeInterval,
    pub conflicts: Vec<BusyWindow>,
}

impl ConflictReport {
    pub fn new(requested: TimeInterval, conflicts: Vec<BusyWindow>) -> Self {
        Self {
            requested,
            conflicts,
        }
    }

    pub fn is_free(&self) -> bool {
        self.conflicts.is_empty()
    }

    pub fn conflicting_participants(&self) -> BTreeSet<&str> {
        self.conflicts
            .iter()
            .map(|window| window.participant.as_str())
            .collect()
    }
}

/// A scored candidate slot. Produced and ranked within a single request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotCandidate {
    pub interval: TimeInterval,
    pub score: f64,
    /// Weighted contribution of each scoring factor.
    pub breakdown: BTreeMap<String, f64>,
    pub conflicting_participants: usize,
}

/// Terminal state of a scheduling run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The preferred interval is free for everyone; nothing was booked.
    RequestedSlotFree,
    /// Ranked alternatives are ready for confirmation; nothing was booked.
    Recommended,
    /// The chosen interval was booked.
    Committed,
    /// No candidate satisfies the request's constraints.
    NoFeasibleSlot,
    /// Every booking attempt raced with another writer; caller must intervene.
    BookingContention,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingConfirmation {
    pub booking_id: String,
    pub interval: TimeInterval,
    pub participants: Vec<String>,
}

/// Result of `analyze`/`schedule`, handed to the persistence layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulingDecision {
    pub title: String,
    #[serde(rename = "duration_minutes", with = "minutes")]
    pub duration: Duration,
    pub priority: Priority,
    pub outcome: Outcome,
    pub chosen: Option<TimeInterval>,
    pub ranked: Vec<SlotCandidate>,
    /// Conflict report for the preferred interval, when one was given.
    pub requested_conflicts: Option<ConflictReport>,
    /// Participants whose calendars could not be read; treated as free.
    pub unknown_availability: Vec<String>,
    pub warnings: Vec<String>,
    pub booking: Option<BookingConfirmation>,
    pub booking_attempts: u32,
}

impl SchedulingDecision {
    pub fn new(request: &MeetingRequest) -> Self {
        Self {
            title: request.title.clone(),
            duration: request.duration,
            priority: request.effective_priority(),
            outcome: Outcome::NoFeasibleSlot,
            chosen: None,
            ranked: Vec::new(),
            requested_conflicts: None,
            unknown_availability: Vec::new(),
            warnings: Vec::new(),
            booking: None,
            booking_attempts: 0,
        }
    }

    pub fn is_committed(&self) -> bool {
        self.outcome == Outcome::Committed
    }

    /// Up to `limit` ranked slots other than the chosen one.
    pub fn alternatives(&self, limit: usize) -> Vec<&SlotCandidate> {
        self.ranked
            .iter()
            .filter(|candidate| Some(candidate.interval) != self.chosen)
            .take(limit)
            .collect()
    }

    /// Human-readable report of the decision.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Meeting: {}", self.title);
        let _ = writeln!(
            out,
            "Duration: {} minutes, priority {}",
            self.duration.num_minutes(),
            self.priority.as_str()
        );

        let status = match self.outcome {
            Outcome::RequestedSlotFree => "requested slot is free",
            Outcome::Recommended => "recommendation ready for confirmation",
            Outcome::Committed => "booked",
            Outcome::NoFeasibleSlot => "no feasible slot found",
            Outcome::BookingContention => "booking attempts exhausted, manual intervention required",
        };
        let _ = writeln!(out, "Status: {}", status);

        if let Some(chosen) = &self.chosen {
            let _ = writeln!(
                out,
                "Selected time: {} - {}",
                chosen.start().format("%A, %B %d, %Y at %H:%M UTC"),
                chosen.end().format("%H:%M UTC")
            );
        }

        if let Some(booking) = &self.booking {
            let _ = writeln!(out, "Booking: {}", booking.booking_id);
        }

        if let Some(report) = &self.requested_conflicts {
            if !report.is_free() {
                let names: Vec<&str> = report.conflicting_participants().into_iter().collect();
                let _ = writeln!(
                    out,
                    "Requested slot conflicts with: {}",
                    names.join(", ")
                );
            }
        }

        let alternatives = self.alternatives(4);
        if !alternatives.is_empty() {
            let _ = writeln!(out, "Alternatives:");
            for candidate in alternatives {
                let _ = writeln!(
                    out,
                    "  {} - {} (score {:.2})",
                    candidate.interval.start().format("%Y-%m-%d %H:%M"),
                    candidate.interval.end().format("%H:%M"),
                    candidate.score
                );
            }
        }

        for warning in &self.warnings {
            let _ = writeln!(out, "Warning: {}", warning);
        }

        out
    }
}
