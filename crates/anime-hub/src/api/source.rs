//! The interface every upstream adapter implements.

use crate::error::{ApiError, ApiResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared::{EpisodeRating, MediaRecord, Source};
use std::fmt;

/// Curated listings served by catalog sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingCategory {
    Trending,
    TopRated,
    NewReleases,
}

impl ListingCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingCategory::Trending => "trending",
            ListingCategory::TopRated => "top_rated",
            ListingCategory::NewReleases => "new_releases",
        }
    }
}

impl fmt::Display for ListingCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One page of normalized search results from a single source
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SearchPage {
    pub results: Vec<MediaRecord>,
    pub has_next_page: bool,
    /// Total matches reported upstream, when the source provides it
    pub total: Option<u32>,
}

/// A media API normalized into [`MediaRecord`]s
///
/// Implementations own their caching and rate limiting; callers only see
/// normalized records or an [`ApiError`].
#[async_trait]
pub trait MediaSource: Send + Sync {
    fn source(&self) -> Source;

    /// Free-text search, 1-based page
    async fn search(&self, query: &str, page: u32) -> ApiResult<SearchPage>;

    /// Detailed record by source-specific id; `Ok(None)` when the id is unknown
    async fn details(&self, id: &str) -> ApiResult<Option<MediaRecord>>;

    /// Per-episode ratings, only meaningful for sources that track them
    async fn episode_ratings(&self, _id: &str) -> ApiResult<Vec<EpisodeRating>> {
        Ok(Vec::new())
    }

    async fn listing(&self, category: ListingCategory, _page: u32) -> ApiResult<Vec<MediaRecord>> {
        Err(ApiError::Unsupported {
            api: self.source(),
            operation: category.as_str(),
        })
    }
}
