use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::models::interval::{BusyWindow, TimeInterval};
use crate::models::participant::Participant;
use crate::models::request::MeetingRequest;
use crate::services::conflicts::BusyMap;

/// Time of day on Tuesday 2025-04-01, UTC.
pub fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 4, 1, hour, minute, 0).unwrap()
}

/// Same as [`at`] on another day of April 2025.
pub fn on(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 4, day, hour, minute, 0).unwrap()
}

pub fn interval(start_hour: u32, start_minute: u32, end_hour: u32, end_minute: u32) -> TimeInterval {
    TimeInterval::new(at(start_hour, start_minute), at(end_hour, end_minute))
}

pub fn busy(
    participant: &str,
    start_hour: u32,
    start_minute: u32,
    end_hour: u32,
    end_minute: u32,
) -> BusyWindow {
    BusyWindow::existing_meeting(
        participant,
        interval(start_hour, start_minute, end_hour, end_minute),
    )
}

pub fn participant(id: &str) -> Participant {
    Participant::new(id)
}

/// Request on 2025-04-01 between `earliest_hour` and `latest_hour` UTC.
pub fn request(
    title: &str,
    ids: &[&str],
    minutes: i64,
    earliest_hour: u32,
    latest_hour: u32,
) -> MeetingRequest {
    MeetingRequest::new(
        title,
        ids.iter().map(|id| participant(id)).collect(),
        Duration::minutes(minutes),
        at(earliest_hour, 0),
        at(latest_hour, 0),
    )
}

pub fn busy_map(windows: Vec<BusyWindow>) -> BusyMap {
    let mut map = BusyMap::new();
    for window in windows {
        map.entry(window.participant.clone()).or_default().push(window);
    }
    map
}
