//! In-memory [`MediaSource`] doubles for aggregator and suggestion tests.

use crate::api::{ListingCategory, MediaSource, SearchPage};
use crate::error::{ApiError, ApiResult};
use async_trait::async_trait;
use shared::{EpisodeRating, MediaImages, MediaRecord, MediaTitle, Rating, Source};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Build a minimal search-level record
pub(crate) fn record(
    source: Source,
    id: &str,
    title: &str,
    popularity: Option<u32>,
    score: Option<f64>,
) -> MediaRecord {
    MediaRecord {
        id: id.to_string(),
        source,
        title: MediaTitle::new(Some(title.to_string()), None, None),
        images: MediaImages {
            large: "https://img.test/large.jpg".to_string(),
            medium: "https://img.test/medium.jpg".to_string(),
        },
        banner: None,
        description: None,
        episodes: None,
        duration_minutes: None,
        status: None,
        genres: Vec::new(),
        year: None,
        start_date: None,
        end_date: None,
        rating: Rating::new(source, score),
        popularity,
        favourites: None,
        members: None,
        url: None,
        details: None,
        enhanced_ratings: None,
    }
}

fn unavailable(source: Source) -> ApiError {
    ApiError::UpstreamHttp {
        api: source,
        status: 503,
        body: "unavailable".to_string(),
    }
}

/// Scripted source; every call is counted and search queries are recorded
pub(crate) struct FakeSource {
    source: Source,
    search_results: Option<Vec<MediaRecord>>,
    details: HashMap<String, MediaRecord>,
    details_fail: bool,
    episodes: Option<Vec<EpisodeRating>>,
    listing: Option<Vec<MediaRecord>>,
    delay: Duration,
    calls: AtomicUsize,
    queries: Mutex<Vec<String>>,
}

impl FakeSource {
    pub(crate) fn new(source: Source) -> Self {
        Self {
            source,
            search_results: Some(Vec::new()),
            details: HashMap::new(),
            details_fail: false,
            episodes: Some(Vec::new()),
            listing: None,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_search(mut self, results: Vec<MediaRecord>) -> Self {
        self.search_results = Some(results);
        self
    }

    pub(crate) fn failing_search(mut self) -> Self {
        self.search_results = None;
        self
    }

    pub(crate) fn with_details(mut self, record: MediaRecord) -> Self {
        self.details.insert(record.id.clone(), record);
        self
    }

    pub(crate) fn failing_details(mut self) -> Self {
        self.details_fail = true;
        self
    }

    pub(crate) fn with_episodes(mut self, episodes: Vec<EpisodeRating>) -> Self {
        self.episodes = Some(episodes);
        self
    }

    pub(crate) fn failing_episodes(mut self) -> Self {
        self.episodes = None;
        self
    }

    pub(crate) fn with_listing(mut self, records: Vec<MediaRecord>) -> Self {
        self.listing = Some(records);
        self
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }

    async fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

#[async_trait]
impl MediaSource for FakeSource {
    fn source(&self) -> Source {
        self.source
    }

    async fn search(&self, query: &str, _page: u32) -> ApiResult<SearchPage> {
        self.queries.lock().unwrap().push(query.to_string());
        self.hit().await;

        let results = self
            .search_results
            .clone()
            .ok_or_else(|| unavailable(self.source))?;
        Ok(SearchPage {
            total: Some(results.len() as u32),
            results,
            has_next_page: false,
        })
    }

    async fn details(&self, id: &str) -> ApiResult<Option<MediaRecord>> {
        self.hit().await;
        if self.details_fail {
            return Err(unavailable(self.source));
        }
        Ok(self.details.get(id).cloned())
    }

    async fn episode_ratings(&self, _id: &str) -> ApiResult<Vec<EpisodeRating>> {
        self.hit().await;
        self.episodes.clone().ok_or_else(|| unavailable(self.source))
    }

    async fn listing(&self, _category: ListingCategory, _page: u32) -> ApiResult<Vec<MediaRecord>> {
        self.hit().await;
        self.listing.clone().ok_or_else(|| unavailable(self.source))
    }
}
