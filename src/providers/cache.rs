use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use tracing::debug;

use crate::error::ProviderError;
use crate::models::interval::{BusyWindow, TimeInterval};
use crate::providers::AvailabilitySource;

const DEFAULT_CAPACITY: u64 = 10_000;

/// Memoizes busy-window fetches of another source for a fixed TTL.
///
/// Only successful fetches are cached. [`invalidate`](AvailabilitySource::invalidate)
/// drops every entry and forwards to the wrapped source.
pub struct CachedAvailability<S> {
    inner: S,
    cache: Cache<(String, TimeInterval), Arc<Vec<BusyWindow>>>,
}

impl<S: AvailabilitySource> CachedAvailability<S> {
    pub fn new(inner: S, ttl: Duration) -> Self {
        Self::with_capacity(inner, ttl, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(inner: S, ttl: Duration, capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(capacity)
            .time_to_live(ttl)
            .build();

        Self { inner, cache }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: AvailabilitySource> AvailabilitySource for CachedAvailability<S> {
    async fn fetch_busy_windows(
        &self,
        participant: &str,
        window: &TimeInterval,
    ) -> Result<Vec<BusyWindow>, ProviderError> {
        let key = (participant.to_string(), *window);

        if let Some(cached) = self.cache.get(&key).await {
            debug!("Availability cache hit for {}", participant);
            return Ok(cached.as_ref().clone());
        }

        let windows = self.inner.fetch_busy_windows(participant, window).await?;
        self.cache.insert(key, Arc::new(windows.clone())).await;
        Ok(windows)
    }

    fn invalidate(&self) {
        debug!("Invalidating availability cache");
        self.cache.invalidate_all();
        self.inner.invalidate();
    }
}
