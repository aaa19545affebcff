//! Meeting Scheduler
//!
//! Given a meeting request (participants, duration, priority, time horizon and
//! an optional preferred slot) the engine detects conflicts against the
//! participants' calendars, proposes ranked alternatives, and optionally books
//! the best slot.
//!
//! # Modules
//!
//! - `models`: value types shared by every layer
//! - `services`: conflict detection, candidate generation, scoring and the
//!   `Scheduler` orchestrator
//! - `providers`: the `AvailabilitySource` / `BookingSink` traits plus a CSV
//!   booking ledger, a signed HTTP calendar client and a TTL cache
//! - `config`: `SchedulerConfig`, loaded from the environment
//!
//! # Concurrency
//!
//! A `Scheduler` holds no per-request state. Availability for all participants
//! is fetched concurrently under one aggregate deadline; bookings go through
//! the sink's own atomic check, and the orchestrator retries a bounded number
//! of times when another writer wins the slot.

pub mod config;
pub mod error;
pub mod models;
pub mod providers;
pub mod services;

pub use config::{SchedulerConfig, ScoringWeights};
pub use error::{BookingError, ConfigError, ProviderError, SchedulingError};
pub use models::{
    BookingConfirmation, BusyWindow, ConflictReport, MeetingRequest, Outcome, Participant, Priority,
    SchedulingDecision, SlotCandidate, TimeInterval, TimePreferences, WorkingHours,
};
pub use providers::{AvailabilitySource, BookingLedger, BookingSink, CachedAvailability, HttpCalendarClient};
pub use services::Scheduler;
