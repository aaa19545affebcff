use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Source tag for busy windows coming from already booked meetings.
pub const SOURCE_EXISTING_MEETING: &str = "existing-meeting";

/// Half-open time range `[start, end)` with `start < end`.
///
/// Two intervals that merely touch (one ends when the other starts) do not
/// overlap. Fields are private so the invariant holds for the lifetime of the
/// value; deserialization rejects inverted or empty ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawInterval")]
pub struct TimeInterval {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

#[derive(Deserialize)]
struct RawInterval {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TryFrom<RawInterval> for TimeInterval {
    type Error = String;

    fn try_from(raw: RawInterval) -> Result<Self, Self::Error> {
        TimeInterval::try_new(raw.start, raw.end).ok_or_else(|| {
            format!(
                "interval start {} must be before end {}",
                raw.start, raw.end
            )
        })
    }
}

impl TimeInterval {
    /// Build an interval from trusted values.
    ///
    /// # Panics
    ///
    /// Panics if `start >= end`. Use [`TimeInterval::try_new`] for data coming
    /// from outside the engine.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        assert!(
            start < end,
            "interval start {} must be before end {}",
            start,
            end
        );
        Self { start, end }
    }

    pub fn try_new(start: DateTime<Utc>, end: DateTime<Utc>) -> Option<Self> {
        (start < end).then_some(Self { start, end })
    }

    /// Interval of `duration` beginning at `start`. `duration` must be positive.
    pub fn starting_at(start: DateTime<Utc>, duration: Duration) -> Self {
        Self::new(start, start + duration)
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &TimeInterval) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Absolute distance between the two start times.
    pub fn start_distance(&self, other: &TimeInterval) -> Duration {
        (self.start - other.start).abs()
    }

    /// Smallest interval covering both.
    pub fn hull(&self, other: &TimeInterval) -> TimeInterval {
        Self {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Widen both ends by `buffer`. A non-positive buffer returns `self`.
    pub fn padded(&self, buffer: Duration) -> TimeInterval {
        if buffer <= Duration::zero() {
            return *self;
        }
        Self {
            start: self
                .start
                .checked_sub_signed(buffer)
                .unwrap_or(DateTime::<Utc>::MIN_UTC),
            end: self
                .end
                .checked_add_signed(buffer)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }
}

/// A span of time during which one participant is already committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusyWindow {
    pub participant: String,
    pub interval: TimeInterval,
    pub source: String,
}

impl BusyWindow {
    pub fn new(participant: &str, interval: TimeInterval, source: &str) -> Self {
        Self {
            participant: participant.to_string(),
            interval,
            source: source.to_string(),
        }
    }

    pub fn existing_meeting(participant: &str, interval: TimeInterval) -> Self {
        Self::new(participant, interval, SOURCE_EXISTING_MEETING)
    }

    pub fn padded(&self, buffer: Duration) -> BusyWindow {
        Self {
            interval: self.interval.padded(buffer),
            ..self.clone()
        }
    }
}
