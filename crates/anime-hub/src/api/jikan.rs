//! Jikan (MyAnimeList) REST client.

use super::http::ApiContext;
use super::source::{ListingCategory, MediaSource, SearchPage};
use super::types::*;
use crate::cache::cache_key;
use crate::error::{ApiError, ApiResult};
use crate::normalize::{normalize, RawMedia};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use shared::{AudienceStatistics, EpisodeRating, MediaRecord, Source};
use tracing::{debug, info, warn};

/// Jikan API v4 client
pub struct JikanClient {
    ctx: ApiContext,
    /// Base URL for Jikan API
    base_url: String,
    /// Results requested per search page
    per_page: usize,
}

impl JikanClient {
    pub fn new(ctx: ApiContext, base_url: impl Into<String>, per_page: usize) -> Self {
        Self {
            ctx,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            per_page,
        }
    }

    /// GET an endpoint relative to the base URL; `Ok(None)` on 404
    async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> ApiResult<Option<T>> {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!(url = %url, "Making API request");

        let request = self.ctx.client().get(&url).query(query);
        self.ctx.send_json(Source::Jikan, request).await
    }

    /// Fetch watch-status statistics
    pub async fn statistics(&self, mal_id: u64) -> ApiResult<Option<AudienceStatistics>> {
        let response: Option<DataResponse<JikanStatistics>> = self
            .get(&format!("/anime/{}/statistics", mal_id), &[])
            .await?;

        Ok(response.and_then(|r| r.data).map(|stats| AudienceStatistics {
            watching: stats.watching,
            completed: stats.completed,
            on_hold: stats.on_hold,
            dropped: stats.dropped,
            plan_to_watch: stats.plan_to_watch,
            total: stats.total,
        }))
    }
}

fn parse_mal_id(id: &str) -> Option<u64> {
    id.trim().parse().ok()
}

#[async_trait]
impl MediaSource for JikanClient {
    fn source(&self) -> Source {
        Source::Jikan
    }

    async fn search(&self, query: &str, page: u32) -> ApiResult<SearchPage> {
        let key = cache_key("jikan_search", query, page);

        self.ctx
            .cached(&key, self.ctx.ttl().search_results, move || async move {
                info!(source = "jikan", query = %query, page, "Searching");
                let params = [
                    ("q", query.to_string()),
                    ("page", page.to_string()),
                    ("limit", self.per_page.to_string()),
                ];

                let response: PaginatedResponse<JikanAnime> =
                    match self.get("/anime", &params).await? {
                        Some(response) => response,
                        None => return Ok(SearchPage::default()),
                    };

                let pagination = response.pagination.unwrap_or_default();
                let results: Vec<MediaRecord> = response
                    .data
                    .into_iter()
                    .map(|anime| normalize(RawMedia::Jikan(anime), false, self.ctx.fallback_image()))
                    .collect();
                debug!(source = "jikan", count = results.len(), "Search complete");

                Ok(SearchPage {
                    results,
                    has_next_page: pagination.has_next_page,
                    total: pagination.items.map(|items| items.total),
                })
            })
            .await
    }

    async fn details(&self, id: &str) -> ApiResult<Option<MediaRecord>> {
        let Some(mal_id) = parse_mal_id(id) else {
            debug!(source = "jikan", id = %id, "Not a MAL id");
            return Ok(None);
        };

        let key = cache_key("jikan_details", mal_id, 1);
        if let Some(record) = self.ctx.lookup::<MediaRecord>(&key).await {
            return Ok(Some(record));
        }

        info!(source = "jikan", mal_id, "Fetching anime details");
        let anime = self
            .get::<DataResponse<JikanAnime>>(&format!("/anime/{}", mal_id), &[])
            .await?
            .and_then(|response| response.data);

        let Some(anime) = anime else {
            info!(source = "jikan", mal_id, "Anime not found");
            return Ok(None);
        };

        let mut record = normalize(RawMedia::Jikan(anime), true, self.ctx.fallback_image());

        match self.statistics(mal_id).await {
            Ok(Some(stats)) => {
                if let Some(details) = record.details.as_mut() {
                    details.statistics = Some(stats);
                }
            }
            Ok(None) => debug!(source = "jikan", mal_id, "No statistics available"),
            Err(e) => warn!(source = "jikan", mal_id, error = %e, "Failed to fetch statistics"),
        }

        self.ctx.store(&key, &record, self.ctx.ttl().details).await;
        Ok(Some(record))
    }

    async fn episode_ratings(&self, id: &str) -> ApiResult<Vec<EpisodeRating>> {
        let Some(mal_id) = parse_mal_id(id) else {
            return Ok(Vec::new());
        };
        let key = cache_key("jikan_episodes", mal_id, 1);

        self.ctx
            .cached(&key, self.ctx.ttl().details, move || async move {
                debug!(source = "jikan", mal_id, "Fetching episode ratings");
                let response: Option<PaginatedResponse<JikanEpisode>> = self
                    .get(&format!("/anime/{}/episodes", mal_id), &[])
                    .await?;

                // Only episodes that carry a rating are kept
                Ok(response
                    .map(|r| r.data)
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(|episode| {
                        let rating = episode.score.filter(|score| *score > 0.0)?;
                        Some(EpisodeRating {
                            number: episode.mal_id,
                            title: episode.title,
                            rating,
                            aired: episode.aired,
                        })
                    })
                    .collect())
            })
            .await
    }

    /// Only the all-time top list is available
    async fn listing(&self, category: ListingCategory, page: u32) -> ApiResult<Vec<MediaRecord>> {
        if category != ListingCategory::TopRated {
            return Err(ApiError::Unsupported {
                api: Source::Jikan,
                operation: category.as_str(),
            });
        }

        let key = cache_key("jikan_top", "anime", page);
        self.ctx
            .cached(&key, self.ctx.ttl().top_rated, move || async move {
                info!(source = "jikan", page, "Fetching top anime");
                let params = [("page", page.to_string()), ("limit", self.per_page.to_string())];
                let response: Option<PaginatedResponse<JikanAnime>> =
                    self.get("/top/anime", &params).await?;

                Ok(response
                    .map(|r| r.data)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|anime| normalize(RawMedia::Jikan(anime), false, self.ctx.fallback_image()))
                    .collect())
            })
            .await
    }
}
