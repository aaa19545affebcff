use chrono::{Datelike, NaiveTime, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::models::interval::TimeInterval;

/// Eligible daily window and weekdays for scheduling, in the owner's timezone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingHours {
    pub start: NaiveTime,
    pub end: NaiveTime,
    #[serde(default = "default_working_days")]
    pub days: Vec<Weekday>,
}

pub fn default_working_days() -> Vec<Weekday> {
    vec![
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
    ]
}

impl Default for WorkingHours {
    fn default() -> Self {
        Self {
            start: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN),
            end: NaiveTime::from_hms_opt(17, 0, 0).unwrap_or(NaiveTime::MIN),
            days: default_working_days(),
        }
    }
}

impl WorkingHours {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self {
            start,
            end,
            days: default_working_days(),
        }
    }

    pub fn with_days(mut self, days: Vec<Weekday>) -> Self {
        self.days = days;
        self
    }

    pub fn is_valid(&self) -> bool {
        self.start < self.end && !self.days.is_empty()
    }

    /// Whether `interval` lies entirely inside this policy once converted to `tz`.
    ///
    /// The interval must start on a working day and finish on the same local
    /// calendar day.
    pub fn contains(&self, interval: &TimeInterval, tz: &Tz) -> bool {
        let local_start = interval.start().with_timezone(tz);
        let local_end = interval.end().with_timezone(tz);

        if !self.days.contains(&local_start.weekday()) {
            return false;
        }
        if local_start.date_naive() != local_end.date_naive() {
            return false;
        }

        local_start.time() >= self.start && local_end.time() <= self.end
    }
}

/// Someone invited to the meeting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    /// Stable identifier, usually an email address.
    pub id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default = "default_timezone")]
    pub timezone: Tz,
    /// Falls back to the configured default when absent.
    #[serde(default)]
    pub working_hours: Option<WorkingHours>,
}

fn default_timezone() -> Tz {
    chrono_tz::UTC
}

impl Participant {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            display_name: id.to_string(),
            timezone: default_timezone(),
            working_hours: None,
        }
    }

    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    pub fn with_working_hours(mut self, working_hours: WorkingHours) -> Self {
        self.working_hours = Some(working_hours);
        self
    }

    pub fn working_hours_or<'a>(&'a self, default: &'a WorkingHours) -> &'a WorkingHours {
        self.working_hours.as_ref().unwrap_or(default)
    }

    /// Whether `interval` falls in this participant's working hours.
    pub fn is_available_during(&self, interval: &TimeInterval, default: &WorkingHours) -> bool {
        self.working_hours_or(default)
            .contains(interval, &self.timezone)
    }
}
