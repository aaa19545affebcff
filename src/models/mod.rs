pub mod decision;
pub mod interval;
pub mod participant;
pub mod request;

pub use decision::{BookingConfirmation, ConflictReport, Outcome, SchedulingDecision, SlotCandidate};
pub use interval::{BusyWindow, TimeInterval, SOURCE_EXISTING_MEETING};
pub use participant::{Participant, WorkingHours};
pub use request::{MeetingRequest, Priority, TimePreferences};
