//! AniList GraphQL catalog client.

use super::http::ApiContext;
use super::source::{ListingCategory, MediaSource, SearchPage};
use super::types::{GraphQlResponse, MediaData, PageData};
use crate::cache::cache_key;
use crate::error::{ApiError, ApiResult};
use crate::normalize::{normalize, RawMedia};
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use shared::{MediaRecord, Source};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Fields requested for every media entry in list queries
macro_rules! media_list_fields {
    () => {
        "id
        title { romaji english native }
        coverImage { extraLarge large medium }
        bannerImage
        startDate { year month day }
        endDate { year month day }
        description
        episodes
        duration
        status
        genres
        averageScore
        popularity
        favourites
        format
        siteUrl"
    };
}

const SEARCH_QUERY: &str = concat!(
    "query SearchAnime($search: String!, $page: Int, $perPage: Int) {
        Page(page: $page, perPage: $perPage) {
            pageInfo { hasNextPage total }
            media(search: $search, type: ANIME, sort: POPULARITY_DESC) {",
    media_list_fields!(),
    "}
        }
    }"
);

const DETAILS_QUERY: &str = concat!(
    "query AnimeDetails($id: Int!) {
        Media(id: $id, type: ANIME) {",
    media_list_fields!(),
    "
            source
            season
            seasonYear
            studios { nodes { name } }
            staff { nodes { name { full } } }
            characters { nodes { name { full } } }
            externalLinks { url site }
            streamingEpisodes { title thumbnail url site }
            relations {
                nodes {
                    id
                    title { romaji english }
                    coverImage { large medium }
                    type
                    format
                    averageScore
                }
            }
            recommendations {
                nodes {
                    mediaRecommendation {
                        id
                        title { romaji english }
                        coverImage { large medium }
                        format
                        averageScore
                    }
                }
            }
        }
    }"
);

const TRENDING_QUERY: &str = concat!(
    "query TrendingAnime($page: Int, $perPage: Int) {
        Page(page: $page, perPage: $perPage) {
            media(type: ANIME, sort: TRENDING_DESC, status: RELEASING) {",
    media_list_fields!(),
    "}
        }
    }"
);

const TOP_RATED_QUERY: &str = concat!(
    "query TopRatedAnime($page: Int, $perPage: Int) {
        Page(page: $page, perPage: $perPage) {
            media(type: ANIME, sort: SCORE_DESC, status: FINISHED) {",
    media_list_fields!(),
    "}
        }
    }"
);

const NEW_RELEASES_QUERY: &str = concat!(
    "query NewReleases($page: Int, $perPage: Int) {
        Page(page: $page, perPage: $perPage) {
            media(type: ANIME, sort: START_DATE_DESC, status_in: [RELEASING, FINISHED]) {",
    media_list_fields!(),
    "}
        }
    }"
);

/// AniList GraphQL client
pub struct AniListClient {
    ctx: ApiContext,
    endpoint: String,
    per_page: usize,
}

impl AniListClient {
    pub fn new(ctx: ApiContext, endpoint: impl Into<String>, per_page: usize) -> Self {
        Self {
            ctx,
            endpoint: endpoint.into(),
            per_page,
        }
    }

    /// Run a GraphQL query; `Ok(None)` when AniList reports the item as not found
    async fn query<T: DeserializeOwned>(&self, query: &str, variables: Value) -> ApiResult<Option<T>> {
        let request = self
            .ctx
            .client()
            .post(&self.endpoint)
            .header(ACCEPT, "application/json")
            .json(&json!({ "query": query, "variables": variables }));

        let envelope: GraphQlResponse<T> =
            match self.ctx.send_json(Source::AniList, request).await? {
                Some(envelope) => envelope,
                None => return Ok(None),
            };

        if !envelope.errors.is_empty() {
            if envelope.errors.iter().all(|e| e.status == Some(404)) {
                return Ok(None);
            }

            let message = envelope
                .errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            warn!(source = "anilist", error = %message, "GraphQL errors");
            return Err(ApiError::data(Source::AniList, message));
        }

        envelope
            .data
            .map(Some)
            .ok_or_else(|| ApiError::data(Source::AniList, "Response has no data"))
    }

    /// Fetch one page of a `Page { media }` query
    async fn page(&self, query: &str, variables: Value) -> ApiResult<SearchPage> {
        let page = self
            .query::<PageData>(query, variables)
            .await?
            .and_then(|data| data.page)
            .ok_or_else(|| ApiError::data(Source::AniList, "Response has no Page"))?;

        let info = page.page_info.unwrap_or_default();
        let results = page
            .media
            .into_iter()
            .map(|media| normalize(RawMedia::AniList(media), false, self.ctx.fallback_image()))
            .collect();

        Ok(SearchPage {
            results,
            has_next_page: info.has_next_page,
            total: info.total,
        })
    }

    fn listing_query(&self, category: ListingCategory) -> (&'static str, Duration) {
        let ttl = self.ctx.ttl();
        match category {
            ListingCategory::Trending => (TRENDING_QUERY, ttl.trending),
            ListingCategory::TopRated => (TOP_RATED_QUERY, ttl.top_rated),
            ListingCategory::NewReleases => (NEW_RELEASES_QUERY, ttl.trending),
        }
    }
}

#[async_trait]
impl MediaSource for AniListClient {
    fn source(&self) -> Source {
        Source::AniList
    }

    async fn search(&self, query: &str, page: u32) -> ApiResult<SearchPage> {
        let key = cache_key("anilist_search", query, page);

        self.ctx
            .cached(&key, self.ctx.ttl().search_results, move || async move {
                info!(source = "anilist", query = %query, page, "Searching");
                let variables = json!({
                    "search": query,
                    "page": page,
                    "perPage": self.per_page,
                });
                let results = self.page(SEARCH_QUERY, variables).await?;
                debug!(source = "anilist", count = results.results.len(), "Search complete");
                Ok(results)
            })
            .await
    }

    async fn details(&self, id: &str) -> ApiResult<Option<MediaRecord>> {
        let Ok(numeric_id) = id.trim().parse::<u64>() else {
            debug!(source = "anilist", id = %id, "Not an AniList id");
            return Ok(None);
        };

        let key = cache_key("anilist_details", numeric_id, 1);
        if let Some(record) = self.ctx.lookup::<MediaRecord>(&key).await {
            return Ok(Some(record));
        }

        info!(source = "anilist", id = numeric_id, "Fetching details");
        let media = self
            .query::<MediaData>(DETAILS_QUERY, json!({ "id": numeric_id }))
            .await?
            .and_then(|data| data.media);

        let Some(media) = media else {
            info!(source = "anilist", id = numeric_id, "Media not found");
            return Ok(None);
        };

        let record = normalize(RawMedia::AniList(media), true, self.ctx.fallback_image());
        self.ctx.store(&key, &record, self.ctx.ttl().details).await;
        Ok(Some(record))
    }

    async fn listing(&self, category: ListingCategory, page: u32) -> ApiResult<Vec<MediaRecord>> {
        let (query, ttl) = self.listing_query(category);
        let key = cache_key(&format!("anilist_{}", category), "all", page);

        self.ctx
            .cached(&key, ttl, move || async move {
                info!(source = "anilist", category = %category, page, "Fetching listing");
                let variables = json!({ "page": page, "perPage": self.per_page });
                Ok(self.page(query, variables).await?.results)
            })
            .await
    }
}
