use std::env;
use std::str::FromStr;

use chrono::{Duration, NaiveTime};
use dotenv::dotenv;
use tracing::info;

use crate::error::ConfigError;
use crate::models::participant::WorkingHours;

/// Relative weight of each scoring factor. Must be non-negative and sum to 1.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringWeights {
    pub conflict: f64,
    pub proximity: f64,
    pub time_of_day: f64,
    pub urgency: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            conflict: 0.5,
            proximity: 0.2,
            time_of_day: 0.2,
            urgency: 0.1,
        }
    }
}

impl ScoringWeights {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let weights = [self.conflict, self.proximity, self.time_of_day, self.urgency];

        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(ConfigError::Weights(format!(
                "weights must be finite and non-negative: {:?}",
                self
            )));
        }

        let total: f64 = weights.iter().sum();
        if (total - 1.0).abs() > 1e-6 {
            return Err(ConfigError::Weights(format!(
                "weights must sum to 1, got {}",
                total
            )));
        }

        Ok(())
    }
}

/// Score assigned to local start hours in `[from_hour, to_hour)`.
#[derive(Debug, Clone, PartialEq)]
pub struct HourBand {
    pub from_hour: u32,
    pub to_hour: u32,
    pub value: f64,
}

/// Preference curve over the local hour a meeting starts in.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeOfDayCurve {
    pub bands: Vec<HourBand>,
    pub fallback: f64,
}

impl Default for TimeOfDayCurve {
    fn default() -> Self {
        let band = |from_hour, to_hour, value| HourBand {
            from_hour,
            to_hour,
            value,
        };
        Self {
            bands: vec![
                band(8, 9, 0.6),
                band(9, 12, 1.0),
                band(12, 14, 0.5),
                band(14, 17, 0.85),
                band(17, 18, 0.6),
            ],
            fallback: 0.2,
        }
    }
}

impl TimeOfDayCurve {
    /// First matching band wins.
    pub fn value_at(&self, hour: u32) -> f64 {
        self.bands
            .iter()
            .find(|band| band.from_hour <= hour && hour < band.to_hour)
            .map(|band| band.value)
            .unwrap_or(self.fallback)
            .clamp(0.0, 1.0)
    }
}

/// Engine configuration, read once at process start.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    pub weights: ScoringWeights,
    pub time_of_day: TimeOfDayCurve,
    /// Distance from the preferred start at which proximity reaches 0.
    pub proximity_max_distance: Duration,
    /// Candidate start time granularity.
    pub step: Duration,
    pub max_candidates: usize,
    /// Candidates never start later than `earliest_start + horizon_cap`.
    pub horizon_cap: Duration,
    pub max_booking_attempts: u32,
    /// Aggregate deadline for all availability fetches of one request.
    pub fetch_timeout: std::time::Duration,
    /// Padding applied around every busy window.
    pub buffer: Duration,
    pub max_meeting_duration: Duration,
    pub default_working_hours: WorkingHours,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            weights: ScoringWeights::default(),
            time_of_day: TimeOfDayCurve::default(),
            proximity_max_distance: Duration::hours(24),
            step: Duration::minutes(30),
            max_candidates: 200,
            horizon_cap: Duration::days(14),
            max_booking_attempts: 3,
            fetch_timeout: std::time::Duration::from_secs(5),
            buffer: Duration::zero(),
            max_meeting_duration: Duration::minutes(480),
            default_working_hours: WorkingHours::default(),
        }
    }
}

impl SchedulerConfig {
    /// Load configuration from the environment (and `.env` if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();
        let config = Self::from_lookup(|key| env::var(key).ok())?;

        info!(
            "Scheduler configured: step={}m, max_candidates={}, horizon={}d, booking_attempts={}",
            config.step.num_minutes(),
            config.max_candidates,
            config.horizon_cap.num_days(),
            config.max_booking_attempts
        );

        Ok(config)
    }

    /// Build configuration from an arbitrary key lookup; missing keys keep defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let minutes = |key: &str, default: Duration| {
            duration_or(&lookup, key, default, Duration::try_minutes)
        };

        let weights = ScoringWeights {
            conflict: parse_or(&lookup, "SCHEDULER_WEIGHT_CONFLICT", defaults.weights.conflict)?,
            proximity: parse_or(&lookup, "SCHEDULER_WEIGHT_PROXIMITY", defaults.weights.proximity)?,
            time_of_day: parse_or(
                &lookup,
                "SCHEDULER_WEIGHT_TIME_OF_DAY",
                defaults.weights.time_of_day,
            )?,
            urgency: parse_or(&lookup, "SCHEDULER_WEIGHT_URGENCY", defaults.weights.urgency)?,
        };

        let work_start = time_or(
            &lookup,
            "SCHEDULER_WORK_START",
            defaults.default_working_hours.start,
        )?;
        let work_end = time_or(&lookup, "SCHEDULER_WORK_END", defaults.default_working_hours.end)?;

        let fetch_timeout_ms = parse_or(
            &lookup,
            "SCHEDULER_FETCH_TIMEOUT_MS",
            defaults.fetch_timeout.as_millis() as u64,
        )?;

        let config = Self {
            weights,
            time_of_day: defaults.time_of_day,
            proximity_max_distance: minutes(
                "SCHEDULER_PROXIMITY_MAX_MINUTES",
                defaults.proximity_max_distance,
            )?,
            step: minutes("SCHEDULER_STEP_MINUTES", defaults.step)?,
            max_candidates: parse_or(&lookup, "SCHEDULER_MAX_CANDIDATES", defaults.max_candidates)?,
            horizon_cap: duration_or(
                &lookup,
                "SCHEDULER_HORIZON_CAP_DAYS",
                defaults.horizon_cap,
                Duration::try_days,
            )?,
            max_booking_attempts: parse_or(
                &lookup,
                "SCHEDULER_MAX_BOOKING_ATTEMPTS",
                defaults.max_booking_attempts,
            )?,
            fetch_timeout: std::time::Duration::from_millis(fetch_timeout_ms),
            buffer: minutes("SCHEDULER_BUFFER_MINUTES", defaults.buffer)?,
            max_meeting_duration: minutes(
                "SCHEDULER_MAX_MEETING_MINUTES",
                defaults.max_meeting_duration,
            )?,
            default_working_hours: WorkingHours::new(work_start, work_end),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.weights.validate()?;

        let positive = [
            ("step", self.step),
            ("horizon_cap", self.horizon_cap),
            ("proximity_max_distance", self.proximity_max_distance),
            ("max_meeting_duration", self.max_meeting_duration),
        ];
        for (key, value) in positive {
            if value <= Duration::zero() {
                return Err(ConfigError::Invalid {
                    key: key.to_string(),
                    value: format!("{} minutes", value.num_minutes()),
                });
            }
        }

        if self.buffer < Duration::zero() {
            return Err(ConfigError::Invalid {
                key: "buffer".to_string(),
                value: format!("{} minutes", self.buffer.num_minutes()),
            });
        }
        if self.max_candidates == 0 {
            return Err(ConfigError::Invalid {
                key: "max_candidates".to_string(),
                value: "0".to_string(),
            });
        }
        if self.max_booking_attempts == 0 {
            return Err(ConfigError::Invalid {
                key: "max_booking_attempts".to_string(),
                value: "0".to_string(),
            });
        }
        if !self.default_working_hours.is_valid() {
            return Err(ConfigError::WorkingHours(format!(
                "{} - {}",
                self.default_working_hours.start, self.default_working_hours.end
            )));
        }

        Ok(())
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse::<T>().map_err(|_| ConfigError::Invalid {
            key: key.to_string(),
            value: raw,
        }),
        None => Ok(default),
    }
}

/// Parse a whole number of `unit`s; values chrono cannot represent are invalid.
fn duration_or<F>(
    lookup: &F,
    key: &str,
    default: Duration,
    unit: fn(i64) -> Option<Duration>,
) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<i64>()
            .ok()
            .and_then(unit)
            .ok_or(ConfigError::Invalid {
                key: key.to_string(),
                value: raw,
            }),
        None => Ok(default),
    }
}

fn time_or<F>(lookup: &F, key: &str, default: NaiveTime) -> Result<NaiveTime, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => NaiveTime::parse_from_str(raw.trim(), "%H:%M").map_err(|_| ConfigError::Invalid {
            key: key.to_string(),
            value: raw,
        }),
        None => Ok(default),
    }
}
