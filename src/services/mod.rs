pub mod candidates;
pub mod conflicts;
pub mod scheduler;
pub mod scoring;

pub use scheduler::Scheduler;
