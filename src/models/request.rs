use std::collections::BTreeSet;

use chrono::{DateTime, Duration, NaiveTime, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::SchedulingError;
use crate::models::interval::TimeInterval;
use crate::models::participant::Participant;

const URGENT_KEYWORDS: [&str; 6] = ["urgent", "emergency", "asap", "critical", "immediate", "crisis"];
const HIGH_KEYWORDS: [&str; 6] = ["client", "interview", "deadline", "review", "demo", "presentation"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Normal,
    High,
    Urgent,
}

impl Priority {
    /// Keyword heuristic used when a request carries no explicit priority.
    pub fn infer(title: &str, description: &str) -> Priority {
        let text = format!("{} {}", title, description).to_lowercase();

        if URGENT_KEYWORDS.iter().any(|keyword| text.contains(keyword)) {
            Priority::Urgent
        } else if HIGH_KEYWORDS.iter().any(|keyword| text.contains(keyword)) {
            Priority::High
        } else {
            Priority::Normal
        }
    }

    /// How strongly this priority pulls the meeting toward the earliest slot, in [0, 1].
    pub fn urgency_factor(&self) -> f64 {
        match self {
            Priority::Low => 0.0,
            Priority::Normal => 0.25,
            Priority::High => 0.6,
            Priority::Urgent => 1.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }
}

/// Serde helper storing a `chrono::Duration` as whole minutes.
pub mod minutes {
    use chrono::Duration;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(duration.num_minutes())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let minutes = i64::deserialize(deserializer)?;
        Duration::try_minutes(minutes)
            .ok_or_else(|| D::Error::custom(format!("{} minutes is out of range", minutes)))
    }
}

/// Organizer preferences on the local start time, evaluated in `timezone`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TimePreferences {
    /// Start hours a meeting may begin in. Empty allows every hour.
    #[serde(default)]
    pub allowed_hours: Vec<u32>,
    /// Exact start times to skip, e.g. `"12:30"`.
    #[serde(default)]
    pub avoid_times: Vec<NaiveTime>,
    /// Candidates lose time-of-day score the further they start from this hour.
    #[serde(default)]
    pub preferred_hour: Option<u32>,
    #[serde(default)]
    pub timezone: Tz,
}

impl TimePreferences {
    pub fn is_empty(&self) -> bool {
        self.allowed_hours.is_empty() && self.avoid_times.is_empty() && self.preferred_hour.is_none()
    }

    /// Whether a meeting may start at `start` at all.
    pub fn admits(&self, start: DateTime<Utc>) -> bool {
        let local = start.with_timezone(&self.timezone);

        if !self.allowed_hours.is_empty() && !self.allowed_hours.contains(&local.hour()) {
            return false;
        }

        !self.avoid_times.iter().any(|avoided| {
            avoided.hour() == local.hour() && avoided.minute() == local.minute()
        })
    }

    /// Whole hours between the local start hour and `preferred_hour`.
    pub fn hours_from_preferred(&self, start: DateTime<Utc>) -> Option<u32> {
        let local_hour = start.with_timezone(&self.timezone).hour();
        self.preferred_hour.map(|hour| hour.abs_diff(local_hour))
    }

    fn validate(&self) -> Result<(), SchedulingError> {
        let hours = self.allowed_hours.iter().chain(self.preferred_hour.iter());
        for hour in hours {
            if *hour > 23 {
                return Err(SchedulingError::InvalidRequest(format!(
                    "hour {} in time preferences is out of range",
                    hour
                )));
            }
        }
        Ok(())
    }
}

/// A request to find (and possibly book) a slot for a meeting.
///
/// `earliest_start`..`latest_start` is the search horizon: candidate meetings
/// start no earlier than `earliest_start` and end no later than `latest_start`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeetingRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub participants: Vec<Participant>,
    #[serde(rename = "duration_minutes", with = "minutes")]
    pub duration: Duration,
    /// Inferred from title and description when absent.
    #[serde(default)]
    pub priority: Option<Priority>,
    pub earliest_start: DateTime<Utc>,
    pub latest_start: DateTime<Utc>,
    #[serde(default)]
    pub preferred: Option<TimeInterval>,
    /// Forbid any participant conflict in the chosen slot.
    #[serde(default)]
    pub hard_constraint: bool,
    #[serde(default, skip_serializing_if = "TimePreferences::is_empty")]
    pub time_preferences: TimePreferences,
}

impl MeetingRequest {
    pub fn new(
        title: &str,
        participants: Vec<Participant>,
        duration: Duration,
        earliest_start: DateTime<Utc>,
        latest_start: DateTime<Utc>,
    ) -> Self {
        Self {
            title: title.to_string(),
            description: String::new(),
            participants,
            duration,
            priority: None,
            earliest_start,
            latest_start,
            preferred: None,
            hard_constraint: false,
            time_preferences: TimePreferences::default(),
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_preferred(mut self, preferred: TimeInterval) -> Self {
        self.preferred = Some(preferred);
        self
    }

    pub fn with_hard_constraint(mut self, hard_constraint: bool) -> Self {
        self.hard_constraint = hard_constraint;
        self
    }

    pub fn with_time_preferences(mut self, time_preferences: TimePreferences) -> Self {
        self.time_preferences = time_preferences;
        self
    }

    pub fn effective_priority(&self) -> Priority {
        self.priority
            .unwrap_or_else(|| Priority::infer(&self.title, &self.description))
    }

    pub fn participant_ids(&self) -> Vec<String> {
        self.participants.iter().map(|p| p.id.clone()).collect()
    }

    /// Window whose availability must be known: the horizon plus the preferred interval.
    ///
    /// Only meaningful on a validated request.
    pub fn search_window(&self) -> TimeInterval {
        let horizon = TimeInterval::new(self.earliest_start, self.latest_start);
        match &self.preferred {
            Some(preferred) => horizon.hull(preferred),
            None => horizon,
        }
    }

    /// Reject malformed requests before any I/O happens.
    pub fn validate(&self, max_duration: Duration) -> Result<(), SchedulingError> {
        if self.participants.is_empty() {
            return Err(SchedulingError::InvalidRequest(
                "at least one participant is required".to_string(),
            ));
        }

        let mut seen = BTreeSet::new();
        for participant in &self.participants {
            if participant.id.trim().is_empty() {
                return Err(SchedulingError::InvalidRequest(
                    "participant identifier must not be empty".to_string(),
                ));
            }
            if !seen.insert(participant.id.as_str()) {
                return Err(SchedulingError::InvalidRequest(format!(
                    "participant {} listed more than once",
                    participant.id
                )));
            }
            if let Some(hours) = &participant.working_hours {
                if !hours.is_valid() {
                    return Err(SchedulingError::InvalidRequest(format!(
                        "working hours for {} are empty",
                        participant.id
                    )));
                }
            }
        }

        if self.duration <= Duration::zero() {
            return Err(SchedulingError::InvalidRequest(format!(
                "duration must be positive, got {} minutes",
                self.duration.num_minutes()
            )));
        }

        if self.duration > max_duration {
            return Err(SchedulingError::InvalidRequest(format!(
                "duration of {} minutes exceeds the maximum of {} minutes",
                self.duration.num_minutes(),
                max_duration.num_minutes()
            )));
        }

        if self.earliest_start >= self.latest_start {
            return Err(SchedulingError::InvalidRequest(format!(
                "earliest start {} must be before latest start {}",
                self.earliest_start, self.latest_start
            )));
        }

        if self.duration > self.latest_start - self.earliest_start {
            return Err(SchedulingError::InvalidRequest(format!(
                "duration of {} minutes does not fit between {} and {}",
                self.duration.num_minutes(),
                self.earliest_start,
                self.latest_start
            )));
        }

        self.time_preferences.validate()
    }
}
