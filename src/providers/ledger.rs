use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use csv::{ReaderBuilder, WriterBuilder};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::error::{BookingError, ProviderError};
use crate::models::decision::BookingConfirmation;
use crate::models::interval::{BusyWindow, TimeInterval};
use crate::providers::{AvailabilitySource, BookingMetadata, BookingSink};

pub const STATUS_BOOKED: &str = "booked";
pub const STATUS_CANCELLED: &str = "cancelled";

const HEADERS: [&str; 9] = [
    "booking_id",
    "participant",
    "title",
    "priority",
    "start_time",
    "end_time",
    "status",
    "created_at",
    "cancelled_at",
];

/// One row per participant per booking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingRecord {
    pub booking_id: String,
    pub participant: String,
    pub title: String,
    pub priority: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl BookingRecord {
    pub fn is_active(&self) -> bool {
        self.status == STATUS_BOOKED
    }

    pub fn interval(&self) -> Option<TimeInterval> {
        TimeInterval::try_new(self.start_time, self.end_time)
    }
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("ledger CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("ledger record corrupt: {0}")]
    Corrupt(String),

    #[error("ledger lock poisoned")]
    Poisoned,
}

/// CSV-backed booking store.
///
/// Serves as both availability source and booking sink: active bookings are
/// the busy windows, and [`book`](Self::book) checks for overlaps and appends
/// under a single lock, so two concurrent writers can never both win a slot.
pub struct BookingLedger {
    csv_path: PathBuf,
    file_mutex: Mutex<()>,
}

impl BookingLedger {
    pub fn new(csv_path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let csv_path = csv_path.as_ref().to_path_buf();

        if !csv_path.exists() {
            info!("Creating new booking ledger at {}", csv_path.display());
            if let Some(dir) = csv_path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
                std::fs::create_dir_all(dir)?;
            }

            let file = File::create(&csv_path)?;
            let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
            writer.write_record(HEADERS)?;
            writer.flush()?;
        }

        Ok(Self {
            csv_path,
            file_mutex: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.csv_path
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>, LedgerError> {
        self.file_mutex.lock().map_err(|_| LedgerError::Poisoned)
    }

    /// Active bookings of `participant`, ordered by start.
    pub fn active_bookings(&self, participant: &str) -> Result<Vec<BookingRecord>, LedgerError> {
        let _lock = self.lock()?;
        let mut records: Vec<BookingRecord> = self
            .read_records()?
            .into_iter()
            .filter(|record| record.participant == participant && record.is_active())
            .collect();
        records.sort_by_key(|record| record.start_time);
        Ok(records)
    }

    /// Book `interval` for every participant, or fail if any of them is taken.
    pub fn book(
        &self,
        interval: &TimeInterval,
        participants: &[String],
        metadata: &BookingMetadata,
    ) -> Result<Result<BookingConfirmation, BookingError>, LedgerError> {
        let _lock = self.lock()?;
        let existing = self.read_records()?;

        let clash = existing.iter().find(|record| {
            record.is_active()
                && participants.contains(&record.participant)
                && record
                    .interval()
                    .is_some_and(|booked| booked.overlaps(interval))
        });
        if let Some(record) = clash {
            warn!(
                "Slot {} - {} already booked for {} by {}",
                interval.start(),
                interval.end(),
                record.participant,
                record.booking_id
            );
            return Ok(Err(BookingError::Conflict(format!(
                "{} is already booked from {} to {} ({})",
                record.participant,
                record.start_time.to_rfc3339(),
                record.end_time.to_rfc3339(),
                record.booking_id
            ))));
        }

        let booking_id = format!("booking_{:08x}", rand::thread_rng().gen::<u32>());
        let now = Utc::now();
        let rows: Vec<BookingRecord> = participants
            .iter()
            .map(|participant| BookingRecord {
                booking_id: booking_id.clone(),
                participant: participant.clone(),
                title: metadata.title.clone(),
                priority: metadata.priority.as_str().to_string(),
                start_time: interval.start(),
                end_time: interval.end(),
                status: STATUS_BOOKED.to_string(),
                created_at: now,
                cancelled_at: None,
            })
            .collect();
        self.append(&rows)?;

        info!(
            "Stored booking {} for {} participant(s) at {}",
            booking_id,
            participants.len(),
            interval.start()
        );

        Ok(Ok(BookingConfirmation {
            booking_id,
            interval: *interval,
            participants: participants.to_vec(),
        }))
    }

    /// Mark every row of `booking_id` as cancelled. Returns the number of rows changed.
    pub fn cancel(&self, booking_id: &str) -> Result<usize, LedgerError> {
        let _lock = self.lock()?;
        let mut records = self.read_records()?;
        let now = Utc::now();

        let mut cancelled = 0;
        for record in records
            .iter_mut()
            .filter(|record| record.booking_id == booking_id && record.is_active())
        {
            record.status = STATUS_CANCELLED.to_string();
            record.cancelled_at = Some(now);
            cancelled += 1;
        }

        if cancelled == 0 {
            warn!("No active booking found with id {}", booking_id);
            return Ok(0);
        }

        let file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&self.csv_path)?;
        let mut writer = WriterBuilder::new().has_headers(true).from_writer(file);
        for record in &records {
            writer.serialize(record)?;
        }
        writer.flush()?;

        info!("Cancelled booking {} ({} row(s))", booking_id, cancelled);
        Ok(cancelled)
    }

    // Callers hold the file mutex
    fn read_records(&self) -> Result<Vec<BookingRecord>, LedgerError> {
        let file = File::open(&self.csv_path)?;
        let mut reader = ReaderBuilder::new().has_headers(true).from_reader(file);

        let mut records = Vec::new();
        for result in reader.deserialize::<BookingRecord>() {
            let record = result?;
            if record.start_time >= record.end_time {
                return Err(LedgerError::Corrupt(format!(
                    "booking {} ends before it starts",
                    record.booking_id
                )));
            }
            records.push(record);
        }
        Ok(records)
    }

    // Callers hold the file mutex
    fn append(&self, rows: &[BookingRecord]) -> Result<(), LedgerError> {
        let file = OpenOptions::new().append(true).open(&self.csv_path)?;
        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        Ok(())
    }
}

#[async_trait]
impl AvailabilitySource for BookingLedger {
    async fn fetch_busy_windows(
        &self,
        participant: &str,
        window: &TimeInterval,
    ) -> Result<Vec<BusyWindow>, ProviderError> {
        let records = self
            .active_bookings(participant)
            .map_err(|e| ProviderError::Unavailable {
                participant: participant.to_string(),
                reason: e.to_string(),
            })?;

        Ok(records
            .iter()
            .filter_map(|record| record.interval())
            .filter(|interval| interval.overlaps(window))
            .map(|interval| BusyWindow::existing_meeting(participant, interval))
            .collect())
    }

    fn invalidate(&self) {}
}

#[async_trait]
impl BookingSink for BookingLedger {
    async fn commit(
        &self,
        interval: &TimeInterval,
        participants: &[String],
        metadata: &BookingMetadata,
    ) -> Result<BookingConfirmation, BookingError> {
        self.book(interval, participants, metadata)
            .map_err(|e| BookingError::Rejected(e.to_string()))?
    }
}
