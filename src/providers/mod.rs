//! Calendar collaborators the engine reads from and books into.
//!
//! Provider-specific clients stay behind [`AvailabilitySource`] and
//! [`BookingSink`]; nothing outside this module depends on them.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{BookingError, ProviderError};
use crate::models::decision::BookingConfirmation;
use crate::models::interval::{BusyWindow, TimeInterval};
use crate::models::request::{MeetingRequest, Priority};

pub mod cache;
pub mod http;
pub mod ledger;
pub mod signing;

pub use cache::CachedAvailability;
pub use http::HttpCalendarClient;
pub use ledger::BookingLedger;
pub use signing::RequestSigner;

/// Read side of a calendar provider.
#[async_trait]
pub trait AvailabilitySource: Send + Sync {
    /// Busy windows of `participant` overlapping `window`, ordered by start.
    async fn fetch_busy_windows(
        &self,
        participant: &str,
        window: &TimeInterval,
    ) -> Result<Vec<BusyWindow>, ProviderError>;

    /// Drop any memoized availability so the next fetch reads fresh data.
    fn invalidate(&self);
}

#[async_trait]
impl<T: AvailabilitySource + ?Sized> AvailabilitySource for Arc<T> {
    async fn fetch_busy_windows(
        &self,
        participant: &str,
        window: &TimeInterval,
    ) -> Result<Vec<BusyWindow>, ProviderError> {
        (**self).fetch_busy_windows(participant, window).await
    }

    fn invalidate(&self) {
        (**self).invalidate()
    }
}

/// Write side of a calendar provider.
#[async_trait]
pub trait BookingSink: Send + Sync {
    async fn commit(
        &self,
        interval: &TimeInterval,
        participants: &[String],
        metadata: &BookingMetadata,
    ) -> Result<BookingConfirmation, BookingError>;
}

/// Descriptive data passed along with a booking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingMetadata {
    pub title: String,
    pub description: String,
    pub priority: Priority,
}

impl BookingMetadata {
    pub fn from_request(request: &MeetingRequest) -> Self {
        Self {
            title: request.title.clone(),
            description: request.description.clone(),
            priority: request.effective_priority(),
        }
    }
}
