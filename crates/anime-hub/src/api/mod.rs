//! Upstream media API clients.
//!
//! Each source is wrapped behind the [`MediaSource`] trait. The clients share
//! one HTTP client, one response cache and one request budget through
//! [`ApiContext`], and report failures as [`crate::ApiError`].

pub mod anilist;
pub mod http;
pub mod jikan;
pub mod omdb;
pub mod rate_limiter;
pub mod source;
pub mod types;

pub use anilist::AniListClient;
pub use http::{ApiContext, SharedBudget, SharedCache};
pub use jikan::JikanClient;
pub use omdb::OmdbClient;
pub use rate_limiter::RequestBudget;
pub use source::{ListingCategory, MediaSource, SearchPage};
