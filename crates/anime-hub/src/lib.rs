//! Anime discovery library.
//!
//! Searches several public media APIs (AniList, Jikan/MyAnimeList, OMDb/IMDb),
//! normalizes their payloads into one record shape, and merges, ranks and
//! rating-reconciles the results. Responses are cached in memory and every
//! source has its own request budget.

pub mod aggregator;
pub mod api;
pub mod cache;
pub mod error;
pub mod history;
pub mod normalize;
pub mod suggest;

#[cfg(test)]
pub(crate) mod test_support;

pub use aggregator::{dedupe, rank_by_relevance, Aggregator, CacheStatus, HomeSections, SearchResults};
pub use api::{ApiContext, ListingCategory, MediaSource, RequestBudget, SearchPage};
pub use cache::{cache_key, CacheTtl, TtlCache};
pub use error::{ApiError, ApiResult};
pub use history::{HistoryEntry, SearchHistory};
pub use normalize::{normalize, RawMedia};
pub use suggest::SuggestionSearch;
