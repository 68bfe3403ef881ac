//! Raw upstream response types.
//!
//! These mirror the JSON returned by each API. Nearly every field is optional:
//! upstreams omit or null fields freely and a missing field must never fail a
//! decode.

use serde::{Deserialize, Serialize};

// ========== AniList (GraphQL) ==========

/// GraphQL response envelope
#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlError {
    pub message: String,
    #[serde(default)]
    pub status: Option<u16>,
}

/// `{ Page { pageInfo media } }`
#[derive(Debug, Clone, Deserialize)]
pub struct PageData {
    #[serde(rename = "Page")]
    pub page: Option<AniListPage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AniListPage {
    #[serde(default)]
    pub page_info: Option<AniListPageInfo>,
    #[serde(default)]
    pub media: Vec<AniListMedia>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AniListPageInfo {
    #[serde(default)]
    pub has_next_page: bool,
    #[serde(default)]
    pub total: Option<u32>,
}

/// `{ Media }`
#[derive(Debug, Clone, Deserialize)]
pub struct MediaData {
    #[serde(rename = "Media")]
    pub media: Option<AniListMedia>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AniListMedia {
    pub id: u64,
    pub title: Option<AniListTitle>,
    pub cover_image: Option<AniListCoverImage>,
    pub banner_image: Option<String>,
    pub start_date: Option<FuzzyDate>,
    pub end_date: Option<FuzzyDate>,
    pub description: Option<String>,
    pub episodes: Option<u32>,
    pub duration: Option<u32>,
    pub status: Option<String>,
    pub genres: Option<Vec<String>>,
    /// Mean score on a 0-100 scale
    pub average_score: Option<f64>,
    pub popularity: Option<u32>,
    pub favourites: Option<u32>,
    pub format: Option<String>,
    pub source: Option<String>,
    pub season: Option<String>,
    pub season_year: Option<i32>,
    pub site_url: Option<String>,
    pub studios: Option<Connection<NamedNode>>,
    pub staff: Option<Connection<PersonNode>>,
    pub characters: Option<Connection<PersonNode>>,
    pub external_links: Option<Vec<AniListExternalLink>>,
    pub streaming_episodes: Option<Vec<AniListStreamingEpisode>>,
    pub relations: Option<Connection<AniListRelatedMedia>>,
    pub recommendations: Option<Connection<AniListRecommendation>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AniListTitle {
    pub romaji: Option<String>,
    pub english: Option<String>,
    pub native: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AniListCoverImage {
    pub extra_large: Option<String>,
    pub large: Option<String>,
    pub medium: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct FuzzyDate {
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub day: Option<u32>,
}

/// GraphQL `{ nodes [...] }` connection
#[derive(Debug, Clone, Deserialize)]
pub struct Connection<T> {
    #[serde(default = "Vec::new")]
    pub nodes: Vec<Option<T>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NamedNode {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PersonNode {
    pub name: Option<PersonName>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PersonName {
    pub full: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AniListExternalLink {
    pub url: Option<String>,
    pub site: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AniListStreamingEpisode {
    pub title: Option<String>,
    pub thumbnail: Option<String>,
    pub url: Option<String>,
    pub site: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AniListRelatedMedia {
    pub id: u64,
    pub title: Option<AniListTitle>,
    pub cover_image: Option<AniListCoverImage>,
    #[serde(rename = "type")]
    pub media_type: Option<String>,
    pub format: Option<String>,
    pub average_score: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AniListRecommendation {
    pub media_recommendation: Option<AniListRelatedMedia>,
}

// ========== Jikan (MyAnimeList REST) ==========

/// Generic pagination wrapper
#[derive(Debug, Clone, Deserialize)]
pub struct PaginatedResponse<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

/// Single-item wrapper
#[derive(Debug, Clone, Deserialize)]
pub struct DataResponse<T> {
    pub data: Option<T>,
}

/// Pagination metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Pagination {
    pub last_visible_page: Option<u32>,
    pub has_next_page: bool,
    pub current_page: Option<u32>,
    pub items: Option<PaginationItems>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PaginationItems {
    pub count: u32,
    pub total: u32,
    pub per_page: u32,
}

/// Anime entry as returned by search, top and details endpoints
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct JikanAnime {
    pub mal_id: u64,
    pub url: Option<String>,
    pub images: Option<AnimeImages>,

    // Titles
    pub title: Option<String>,
    pub title_english: Option<String>,
    pub title_japanese: Option<String>,

    // Type and status
    #[serde(rename = "type")]
    pub anime_type: Option<String>,
    pub source: Option<String>,
    pub episodes: Option<u32>,
    pub status: Option<String>,

    // Dates
    pub aired: Option<Aired>,
    pub duration: Option<String>,

    // Scores and rankings
    pub score: Option<f64>,
    pub scored_by: Option<u32>,
    pub rank: Option<u32>,
    pub popularity: Option<u32>,
    pub members: Option<u32>,
    pub favorites: Option<u32>,

    pub synopsis: Option<String>,

    // Season
    pub season: Option<String>,
    pub year: Option<i32>,

    // Producers, licensors, studios
    pub producers: Vec<MalEntity>,
    pub licensors: Vec<MalEntity>,
    pub studios: Vec<MalEntity>,

    // Genres, themes, demographics
    pub genres: Vec<MalEntity>,
    pub themes: Vec<MalEntity>,
    pub demographics: Vec<MalEntity>,
}

/// Anime images
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AnimeImages {
    pub jpg: Option<ImageSet>,
    pub webp: Option<ImageSet>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ImageSet {
    pub image_url: Option<String>,
    pub small_image_url: Option<String>,
    pub large_image_url: Option<String>,
}

/// Aired dates (ISO-8601 timestamps)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Aired {
    pub from: Option<String>,
    pub to: Option<String>,
}

/// MAL entity (genre, studio, producer, etc.)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MalEntity {
    pub mal_id: u64,
    #[serde(rename = "type")]
    pub entity_type: Option<String>,
    pub name: String,
}

/// `/anime/{id}/statistics`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct JikanStatistics {
    pub watching: Option<u32>,
    pub completed: Option<u32>,
    pub on_hold: Option<u32>,
    pub dropped: Option<u32>,
    pub plan_to_watch: Option<u32>,
    pub total: Option<u32>,
}

/// `/anime/{id}/episodes` entry
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct JikanEpisode {
    pub mal_id: u32,
    pub title: Option<String>,
    pub aired: Option<String>,
    pub score: Option<f64>,
}

/// Error body returned with non-2xx statuses
#[derive(Debug, Clone, Deserialize)]
pub struct JikanError {
    #[serde(default)]
    pub status: Option<u16>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(rename = "type", default)]
    pub error_type: Option<String>,
}

// ========== OMDb (IMDb REST) ==========

/// `?s=` search envelope
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OmdbSearchResponse {
    #[serde(rename = "Search")]
    pub search: Vec<OmdbTitle>,
    #[serde(rename = "totalResults")]
    pub total_results: Option<String>,
    #[serde(rename = "Response")]
    pub response: Option<String>,
    #[serde(rename = "Error")]
    pub error: Option<String>,
}

/// Title as returned by both search and `?i=` details; "N/A" marks absent values
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OmdbTitle {
    #[serde(rename = "imdbID")]
    pub imdb_id: String,
    #[serde(rename = "Title")]
    pub title: Option<String>,
    #[serde(rename = "Year")]
    pub year: Option<String>,
    #[serde(rename = "Poster")]
    pub poster: Option<String>,
    #[serde(rename = "Type")]
    pub title_type: Option<String>,
    #[serde(rename = "imdbRating")]
    pub imdb_rating: Option<String>,
    #[serde(rename = "imdbVotes")]
    pub imdb_votes: Option<String>,
    #[serde(rename = "Plot")]
    pub plot: Option<String>,
    #[serde(rename = "Genre")]
    pub genre: Option<String>,
    #[serde(rename = "Runtime")]
    pub runtime: Option<String>,
    #[serde(rename = "Released")]
    pub released: Option<String>,
    #[serde(rename = "Director")]
    pub director: Option<String>,
    #[serde(rename = "Writer")]
    pub writer: Option<String>,
    #[serde(rename = "Actors")]
    pub actors: Option<String>,
    #[serde(rename = "Language")]
    pub language: Option<String>,
    #[serde(rename = "Country")]
    pub country: Option<String>,
    #[serde(rename = "Awards")]
    pub awards: Option<String>,
    #[serde(rename = "Metascore")]
    pub metascore: Option<String>,
    #[serde(rename = "totalSeasons")]
    pub total_seasons: Option<String>,
    #[serde(rename = "Response")]
    pub response: Option<String>,
    #[serde(rename = "Error")]
    pub error: Option<String>,
}
