//! Live search suggestions.
//!
//! Each keystroke starts a new suggestion search. Starting one aborts the
//! search still in flight, whose caller then gets `Ok(None)`.

use crate::aggregator::Aggregator;
use crate::api::SharedCache;
use crate::error::ApiResult;
use shared::MediaRecord;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::AbortHandle;
use tracing::debug;

/// Suggestion search on top of an [`Aggregator`]
pub struct SuggestionSearch {
    aggregator: Arc<Aggregator>,
    cache: SharedCache,
    ttl: Duration,
    max_suggestions: usize,
    in_flight: Mutex<Option<(u64, AbortHandle)>>,
    generation: AtomicU64,
}

impl SuggestionSearch {
    pub fn new(
        aggregator: Arc<Aggregator>,
        cache: SharedCache,
        ttl: Duration,
        max_suggestions: usize,
    ) -> Self {
        Self {
            aggregator,
            cache,
            ttl,
            max_suggestions,
            in_flight: Mutex::new(None),
            generation: AtomicU64::new(0),
        }
    }

    /// Suggestions for `query`, or `Ok(None)` if a newer suggestion superseded it
    pub async fn suggest(&self, query: &str) -> ApiResult<Option<Vec<MediaRecord>>> {
        let query = query.trim().to_string();
        let key = format!("suggestions_{}", query.to_lowercase());

        let cached = self.cache.lock().await.get::<Vec<MediaRecord>>(&key);
        if let Some(hit) = cached {
            debug!(query = %query, "Suggestions served from cache");
            return Ok(Some(hit));
        }

        let aggregator = Arc::clone(&self.aggregator);
        let task_query = query.clone();
        let handle = tokio::spawn(async move { aggregator.search(&task_query, 1).await });

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut in_flight = self.in_flight.lock().await;
            if let Some((previous, abort)) = in_flight.replace((generation, handle.abort_handle())) {
                debug!(generation = previous, "Aborting superseded suggestion search");
                abort.abort();
            }
        }

        let outcome = handle.await;

        {
            let mut in_flight = self.in_flight.lock().await;
            if matches!(*in_flight, Some((current, _)) if current == generation) {
                *in_flight = None;
            }
        }

        let results = match outcome {
            Ok(results) => results?,
            Err(e) if e.is_cancelled() => {
                debug!(query = %query, "Suggestion search superseded");
                return Ok(None);
            }
            Err(e) => std::panic::resume_unwind(e.into_panic()),
        };

        let mut suggestions = results.results;
        suggestions.truncate(self.max_suggestions);
        self.cache.lock().await.set(&key, &suggestions, self.ttl);
        Ok(Some(suggestions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::SearchSettings;
    use crate::api::RequestBudget;
    use crate::cache::TtlCache;
    use crate::error::ApiError;
    use crate::test_support::{record, FakeSource};
    use shared::config::SearchConfig;
    use shared::{Config, Source};

    fn suggester(anilist: Arc<FakeSource>) -> Arc<SuggestionSearch> {
        let config = Config::default();
        let cache = Arc::new(Mutex::new(TtlCache::new(100)));
        let aggregator = Aggregator::new(
            anilist,
            Arc::new(FakeSource::new(Source::Jikan)),
            Arc::new(FakeSource::new(Source::Omdb)),
            cache.clone(),
            Arc::new(Mutex::new(RequestBudget::from_config(&config))),
            SearchSettings::from(&SearchConfig::default()),
        );
        Arc::new(SuggestionSearch::new(
            Arc::new(aggregator),
            cache,
            Duration::from_secs(300),
            config.search.max_suggestions,
        ))
    }

    #[tokio::test]
    async fn test_suggestions_are_truncated_and_cached() {
        let many = (0..10)
            .map(|i| record(Source::AniList, &i.to_string(), &format!("Monogatari {}", i), Some(i), None))
            .collect();
        let anilist = Arc::new(FakeSource::new(Source::AniList).with_search(many));
        let suggester = suggester(anilist.clone());

        let first = suggester.suggest("Mono").await.unwrap().unwrap();
        assert_eq!(first.len(), 8);

        // Same query with different case is a cache hit
        let second = suggester.suggest("mono").await.unwrap().unwrap();
        assert_eq!(second, first);
        assert_eq!(anilist.calls(), 1);
    }

    #[tokio::test]
    async fn test_new_suggestion_aborts_previous() {
        let anilist = Arc::new(
            FakeSource::new(Source::AniList)
                .with_search(vec![record(Source::AniList, "1", "Naruto", Some(1), None)])
                .with_delay(Duration::from_millis(200)),
        );
        let suggester = suggester(anilist);

        let earlier = {
            let suggester = Arc::clone(&suggester);
            tokio::spawn(async move { suggester.suggest("nar").await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let latest = suggester.suggest("naru").await.unwrap();
        assert_eq!(latest.unwrap().len(), 1);
        assert!(earlier.await.unwrap().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_short_query_is_rejected() {
        let suggester = suggester(Arc::new(FakeSource::new(Source::AniList)));
        let err = suggester.suggest("n").await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput { .. }));
    }
}
