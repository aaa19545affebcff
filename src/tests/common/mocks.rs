use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use mockall::mock;

use crate::error::{BookingError, ProviderError};
use crate::models::decision::BookingConfirmation;
use crate::models::interval::{BusyWindow, TimeInterval};
use crate::providers::{AvailabilitySource, BookingMetadata, BookingSink};
use crate::services::conflicts::BusyMap;

mock! {
    pub Calendar {}

    #[async_trait]
    impl AvailabilitySource for Calendar {
        async fn fetch_busy_windows(
            &self,
            participant: &str,
            window: &TimeInterval,
        ) -> Result<Vec<BusyWindow>, ProviderError>;

        fn invalidate(&self);
    }
}

mock! {
    pub Bookings {}

    #[async_trait]
    impl BookingSink for Bookings {
        async fn commit(
            &self,
            interval: &TimeInterval,
            participants: &[String],
            metadata: &BookingMetadata,
        ) -> Result<BookingConfirmation, BookingError>;
    }
}

/// Successful confirmation for a mocked booking.
pub fn confirmation(booking_id: &str, interval: &TimeInterval, participants: &[String]) -> BookingConfirmation {
    BookingConfirmation {
        booking_id: booking_id.to_string(),
        interval: *interval,
        participants: participants.to_vec(),
    }
}

/// In-memory calendar whose contents can change between fetches.
#[derive(Default)]
pub struct FakeCalendar {
    busy: Mutex<BusyMap>,
    failing: BTreeMap<String, ProviderError>,
    delays: BTreeMap<String, Duration>,
    fetches: AtomicUsize,
    invalidations: AtomicUsize,
}

impl FakeCalendar {
    pub fn new(windows: Vec<BusyWindow>) -> Self {
        let calendar = Self::default();
        for window in windows {
            calendar.add_busy(window);
        }
        calendar
    }

    pub fn failing(mut self, participant: &str, error: ProviderError) -> Self {
        self.failing.insert(participant.to_string(), error);
        self
    }

    pub fn delayed(mut self, participant: &str, delay: Duration) -> Self {
        self.delays.insert(participant.to_string(), delay);
        self
    }

    /// Simulate a booking made by someone else.
    pub fn add_busy(&self, window: BusyWindow) {
        self.busy
            .lock()
            .unwrap()
            .entry(window.participant.clone())
            .or_default()
            .push(window);
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn invalidations(&self) -> usize {
        self.invalidations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AvailabilitySource for FakeCalendar {
    async fn fetch_busy_windows(
        &self,
        participant: &str,
        window: &TimeInterval,
    ) -> Result<Vec<BusyWindow>, ProviderError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delays.get(participant) {
            tokio::time::sleep(*delay).await;
        }
        if let Some(error) = self.failing.get(participant) {
            return Err(error.clone());
        }

        let busy = self.busy.lock().unwrap();
        Ok(busy
            .get(participant)
            .map(|windows| {
                windows
                    .iter()
                    .filter(|busy| busy.interval.overlaps(window))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn invalidate(&self) {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
    }
}
