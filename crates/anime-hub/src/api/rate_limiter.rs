//! Per-source request budget.
//!
//! Each source gets a fixed number of requests per wall-clock window plus a
//! minimum gap between consecutive requests. A request over the window budget
//! is rejected immediately. A request that comes too soon is given the next
//! free slot, and the caller waits out the returned delay before sending.

use crate::error::{ApiError, ApiResult};
use shared::config::Config;
use shared::Source;
use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

/// Fixed-window request budget with a minimum inter-request delay
#[derive(Debug)]
pub struct RequestBudget {
    /// Maximum requests per window, per source
    limits: HashMap<Source, u32>,
    /// Window length after which every counter resets to zero
    window: Duration,
    /// Minimum delay between two requests to the same source
    min_interval: Duration,
    /// Start of the current window
    window_start: Instant,
    /// Requests attempted in the current window
    counts: HashMap<Source, u32>,
    /// Last attempted request per source
    last_request: HashMap<Source, Instant>,
}

impl RequestBudget {
    /// Create a new budget
    pub fn new(limits: HashMap<Source, u32>, window: Duration, min_interval: Duration) -> Self {
        Self {
            limits,
            window,
            min_interval,
            window_start: Instant::now(),
            counts: HashMap::new(),
            last_request: HashMap::new(),
        }
    }

    /// Build the budget described by the `[sources]` and `[rate_limit]` sections
    pub fn from_config(config: &Config) -> Self {
        let limits = HashMap::from([
            (Source::AniList, config.sources.anilist.requests_per_window),
            (Source::Jikan, config.sources.jikan.requests_per_window),
            (Source::Omdb, config.sources.omdb.requests_per_window),
        ]);

        Self::new(
            limits,
            Duration::from_secs(config.rate_limit.window_seconds),
            Duration::from_millis(config.rate_limit.min_interval_ms),
        )
    }

    /// Reserve a request slot, returning how long to wait before sending
    ///
    /// Fails with [`ApiError::RateLimitExceeded`] when the window budget is spent.
    pub fn try_acquire(&mut self, source: Source) -> ApiResult<Duration> {
        self.try_acquire_at(source, Instant::now())
    }

    /// Same as [`RequestBudget::try_acquire`] with an explicit clock reading
    pub fn try_acquire_at(&mut self, source: Source, now: Instant) -> ApiResult<Duration> {
        self.roll_window(now);

        // Sources without a configured limit are unrestricted
        if let Some(&limit) = self.limits.get(&source) {
            let count = self.counts.get(&source).copied().unwrap_or(0);
            if count >= limit {
                tracing::warn!(source = %source, count, limit, "Rate limit exceeded");
                return Err(ApiError::RateLimitExceeded { api: source });
            }
        }

        let wait = self.remaining_gap_at(source, now);
        if !wait.is_zero() {
            tracing::debug!(
                source = %source,
                wait_ms = wait.as_millis(),
                "Request too soon after previous one, delaying"
            );
        }

        *self.counts.entry(source).or_insert(0) += 1;
        self.last_request.insert(source, now + wait);
        Ok(wait)
    }

    /// Time left before `source` may be called again
    pub fn remaining_gap(&self, source: Source) -> Duration {
        self.remaining_gap_at(source, Instant::now())
    }

    pub fn remaining_gap_at(&self, source: Source, now: Instant) -> Duration {
        self.last_request
            .get(&source)
            .map(|&last| (last + self.min_interval).saturating_duration_since(now))
            .unwrap_or(Duration::ZERO)
    }

    /// Requests attempted per source in the current window
    pub fn counts(&mut self) -> BTreeMap<Source, u32> {
        self.roll_window(Instant::now());
        self.counts.iter().map(|(s, c)| (*s, *c)).collect()
    }

    fn roll_window(&mut self, now: Instant) {
        if now.saturating_duration_since(self.window_start) >= self.window {
            self.counts.clear();
            self.window_start = now;
        }
    }
}
