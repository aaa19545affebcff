use std::env;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dotenv::dotenv;
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{BookingError, ConfigError, ProviderError};
use crate::models::decision::BookingConfirmation;
use crate::models::interval::{BusyWindow, TimeInterval, SOURCE_EXISTING_MEETING};
use crate::providers::signing::RequestSigner;
use crate::providers::{AvailabilitySource, BookingMetadata, BookingSink};

#[derive(Debug, Serialize, Deserialize)]
pub struct BusyPeriod {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FreeBusyResponse {
    #[serde(default)]
    pub busy: Vec<BusyPeriod>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BookingRequestBody {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub participants: Vec<String>,
    #[serde(flatten)]
    pub metadata: BookingMetadata,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BookingResponse {
    pub booking_id: String,
}

/// Calendar provider reached over signed HTTP requests.
///
/// `GET /v1/freebusy/{participant}?start=..&end=..` returns busy periods and
/// `POST /v1/bookings` creates a meeting; a `409 Conflict` answer means the
/// slot was taken in the meantime.
pub struct HttpCalendarClient {
    client: Client,
    endpoint: String,
    signer: RequestSigner,
}

impl HttpCalendarClient {
    pub fn new(endpoint: &str, key_id: &str, secret_key: &str) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            signer: RequestSigner::new(key_id, secret_key),
        }
    }

    /// Build a client from `CALENDAR_API_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();

        let endpoint = env::var("CALENDAR_API_ENDPOINT")
            .map_err(|_| ConfigError::Missing("CALENDAR_API_ENDPOINT".to_string()))?;
        let key_id = env::var("CALENDAR_API_KEY_ID").unwrap_or_default();
        let secret_key = env::var("CALENDAR_API_SECRET").unwrap_or_default();

        if secret_key.is_empty() {
            warn!("CALENDAR_API_SECRET is empty; requests will be signed with an empty key");
        }

        Ok(Self::new(&endpoint, &key_id, &secret_key))
    }

    /// Free/busy URL with the participant id as a single percent-encoded path segment.
    fn freebusy_url(&self, participant: &str, window: &TimeInterval) -> Result<Url, ProviderError> {
        let invalid = |reason: String| ProviderError::Unavailable {
            participant: participant.to_string(),
            reason,
        };

        let mut url = Url::parse(&self.endpoint)
            .map_err(|e| invalid(format!("invalid endpoint {}: {}", self.endpoint, e)))?;
        url.path_segments_mut()
            .map_err(|_| invalid(format!("endpoint {} cannot take a path", self.endpoint)))?
            .pop_if_empty()
            .extend(["v1", "freebusy", participant]);
        url.query_pairs_mut()
            .append_pair("start", &window.start().timestamp().to_string())
            .append_pair("end", &window.end().timestamp().to_string());

        Ok(url)
    }

    fn transport_error(participant: &str, err: reqwest::Error) -> ProviderError {
        if err.is_timeout() {
            ProviderError::Timeout {
                participant: participant.to_string(),
            }
        } else {
            ProviderError::Unavailable {
                participant: participant.to_string(),
                reason: err.to_string(),
            }
        }
    }
}

#[async_trait]
impl AvailabilitySource for HttpCalendarClient {
    async fn fetch_busy_windows(
        &self,
        participant: &str,
        window: &TimeInterval,
    ) -> Result<Vec<BusyWindow>, ProviderError> {
        let method = "GET";
        let url = self.freebusy_url(participant, window)?;
        // Signed over the encoded path and query exactly as sent
        let full_uri = format!("{}?{}", url.path(), url.query().unwrap_or_default());
        debug!("Fetching availability from {}", url);

        let mut request = self.client.get(url).header("Content-Type", "application/json");
        for (name, value) in self.signer.headers(method, &full_uri, "") {
            request = request.header(name, value);
        }

        let res = request
            .send()
            .await
            .map_err(|e| Self::transport_error(participant, e))?;

        if !res.status().is_success() {
            warn!("Availability request for {} failed with {}", participant, res.status());
            return Err(ProviderError::Unavailable {
                participant: participant.to_string(),
                reason: format!("status {}", res.status()),
            });
        }

        let body = res
            .json::<FreeBusyResponse>()
            .await
            .map_err(|e| ProviderError::Malformed(format!("{}: {}", participant, e)))?;

        let mut windows: Vec<BusyWindow> = body
            .busy
            .into_iter()
            .filter_map(|period| match TimeInterval::try_new(period.start, period.end) {
                Some(interval) => Some(BusyWindow::new(
                    participant,
                    interval,
                    period.source.as_deref().unwrap_or(SOURCE_EXISTING_MEETING),
                )),
                None => {
                    warn!(
                        "Dropping empty busy period {} - {} for {}",
                        period.start, period.end, participant
                    );
                    None
                }
            })
            .collect();
        windows.sort_by_key(|window| window.interval);

        Ok(windows)
    }

    fn invalidate(&self) {}
}

#[async_trait]
impl BookingSink for HttpCalendarClient {
    async fn commit(
        &self,
        interval: &TimeInterval,
        participants: &[String],
        metadata: &BookingMetadata,
    ) -> Result<BookingConfirmation, BookingError> {
        let method = "POST";
        let uri = "/v1/bookings";
        let url = format!("{}{}", self.endpoint, uri);

        let body = BookingRequestBody {
            start: interval.start(),
            end: interval.end(),
            participants: participants.to_vec(),
            metadata: metadata.clone(),
        };
        let body = serde_json::to_string(&body)
            .map_err(|e| BookingError::Rejected(format!("failed to encode booking: {}", e)))?;

        info!("Creating booking '{}' at {}", metadata.title, interval.start());

        let mut request = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .body(body.clone());
        for (name, value) in self.signer.headers(method, uri, &body) {
            request = request.header(name, value);
        }

        let res = request
            .send()
            .await
            .map_err(|e| BookingError::Rejected(format!("booking request failed: {}", e)))?;
        info!("Booking response received with status: {}", res.status());

        match res.status() {
            StatusCode::CONFLICT => {
                let text = res.text().await.unwrap_or_default();
                Err(BookingError::Conflict(if text.is_empty() {
                    "slot already taken".to_string()
                } else {
                    text
                }))
            }
            status if status.is_success() => {
                let response = res
                    .json::<BookingResponse>()
                    .await
                    .map_err(|e| BookingError::Rejected(format!("malformed booking response: {}", e)))?;
                Ok(BookingConfirmation {
                    booking_id: response.booking_id,
                    interval: *interval,
                    participants: participants.to_vec(),
                })
            }
            status => {
                let text = res.text().await.unwrap_or_default();
                Err(BookingError::Rejected(format!("status {}: {}", status, text)))
            }
        }
    }
}
