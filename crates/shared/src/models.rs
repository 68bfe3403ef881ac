//! Data models for the project.
//!
//! This module defines the canonical, source-agnostic media record that every
//! upstream payload is normalized into, plus the rating types used when
//! reconciling scores across sources.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Upper bound of the canonical rating scale
pub const RATING_MAX: &str = "10.0";

/// Display title used when a source gives no usable title
pub const UNKNOWN_TITLE: &str = "Unknown Title";

/// Upstream media API a record came from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// AniList GraphQL catalog
    AniList,
    /// Jikan (MyAnimeList) REST catalog
    Jikan,
    /// OMDb (IMDb) REST ratings service
    Omdb,
}

impl Source {
    pub const ALL: [Source; 3] = [Source::AniList, Source::Jikan, Source::Omdb];

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::AniList => "anilist",
            Source::Jikan => "jikan",
            Source::Omdb => "omdb",
        }
    }

    /// Human-facing name of the rating provider behind this source
    pub fn label(&self) -> &'static str {
        match self {
            Source::AniList => "AniList",
            Source::Jikan => "MyAnimeList",
            Source::Omdb => "IMDb",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Source {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "anilist" => Ok(Source::AniList),
            "jikan" | "mal" | "myanimelist" => Ok(Source::Jikan),
            "omdb" | "imdb" => Ok(Source::Omdb),
            _ => Err(anyhow::anyhow!("Invalid source: {}", s)),
        }
    }
}

/// Title variants plus the computed display string
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MediaTitle {
    pub english: Option<String>,
    pub romaji: Option<String>,
    pub native: Option<String>,
    pub display: String,
}

impl MediaTitle {
    /// Build a title, computing `display` as english → romaji → native → "Unknown Title"
    pub fn new(english: Option<String>, romaji: Option<String>, native: Option<String>) -> Self {
        let english = non_blank(english);
        let romaji = non_blank(romaji);
        let native = non_blank(native);

        let display = english
            .as_deref()
            .or(romaji.as_deref())
            .or(native.as_deref())
            .unwrap_or(UNKNOWN_TITLE)
            .to_string();

        Self {
            english,
            romaji,
            native,
            display,
        }
    }

    /// Title to use when looking this work up in another source
    pub fn search_title(&self) -> &str {
        self.english
            .as_deref()
            .or(self.romaji.as_deref())
            .unwrap_or(&self.display)
    }
}

/// Cover images; both fields are always populated
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MediaImages {
    pub large: String,
    pub medium: String,
}

/// Date where month and day may be unknown
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PartialDate {
    pub year: i32,
    pub month: Option<u32>,
    pub day: Option<u32>,
}

impl fmt::Display for PartialDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.month, self.day) {
            (Some(month), Some(day)) => write!(f, "{:04}-{:02}-{:02}", self.year, month, day),
            (Some(month), None) => write!(f, "{:04}-{:02}", self.year, month),
            _ => write!(f, "{:04}", self.year),
        }
    }
}

/// Primary rating as reported by the record's own source
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Rating {
    /// Score on the 0-10 scale, `None` when the source has no data
    pub score: Option<f64>,
    pub source: String,
    pub max: String,
}

impl Rating {
    pub fn new(source: Source, score: Option<f64>) -> Self {
        Self {
            score,
            source: source.label().to_string(),
            max: RATING_MAX.to_string(),
        }
    }
}

/// Canonical media record shared by every source
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MediaRecord {
    /// Identifier, unique only within `source`
    pub id: String,
    pub source: Source,
    pub title: MediaTitle,
    pub images: MediaImages,
    pub banner: Option<String>,
    pub description: Option<String>,

    // Descriptive fields
    pub episodes: Option<u32>,
    pub duration_minutes: Option<u32>,
    pub status: Option<String>,
    pub genres: Vec<String>,
    pub year: Option<i32>,
    pub start_date: Option<PartialDate>,
    pub end_date: Option<PartialDate>,

    // Scores and audience
    pub rating: Rating,
    /// Audience size used for ranking (higher is more popular)
    pub popularity: Option<u32>,
    pub favourites: Option<u32>,
    pub members: Option<u32>,
    pub url: Option<String>,

    /// Only present when fetched in detailed mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<MediaDetails>,

    /// Only present on records returned by the aggregator's details query
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enhanced_ratings: Option<EnhancedRatings>,
}

/// Detail-only fields
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MediaDetails {
    pub media_type: Option<String>,
    pub source_material: Option<String>,
    pub season: Option<String>,
    pub season_year: Option<i32>,
    pub studios: Vec<String>,
    pub producers: Vec<String>,
    pub licensors: Vec<String>,
    pub themes: Vec<String>,
    pub demographics: Vec<String>,
    pub staff: Vec<String>,
    pub characters: Vec<String>,
    pub relations: Vec<RelatedWork>,
    pub recommendations: Vec<RelatedWork>,
    pub external_links: Vec<ExternalLink>,
    pub streaming_episodes: Vec<StreamingEpisode>,
    pub popularity_rank: Option<u32>,
    pub statistics: Option<AudienceStatistics>,
    pub credits: Option<Credits>,
}

/// Another work linked from a record (sequel, recommendation, ...)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelatedWork {
    pub id: String,
    pub title: String,
    pub image: Option<String>,
    pub format: Option<String>,
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExternalLink {
    pub site: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamingEpisode {
    pub title: Option<String>,
    pub url: Option<String>,
    pub site: Option<String>,
    pub thumbnail: Option<String>,
}

/// Watch-status counts reported by MyAnimeList
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AudienceStatistics {
    pub watching: Option<u32>,
    pub completed: Option<u32>,
    pub on_hold: Option<u32>,
    pub dropped: Option<u32>,
    pub plan_to_watch: Option<u32>,
    pub total: Option<u32>,
}

/// Production credits reported by IMDb
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Credits {
    pub director: Option<String>,
    pub writer: Option<String>,
    pub actors: Option<String>,
    pub language: Option<String>,
    pub country: Option<String>,
    pub awards: Option<String>,
    pub metascore: Option<u32>,
    pub votes: Option<u64>,
    pub total_seasons: Option<u32>,
}

/// One source's opinion of a work
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceRating {
    pub score: f64,
    pub max: String,
    pub source: String,
    /// Identifier of the matched work in the rating's own source
    pub external_id: String,
}

impl SourceRating {
    pub fn new(source: Source, score: f64, external_id: impl Into<String>) -> Self {
        Self {
            score,
            max: RATING_MAX.to_string(),
            source: source.label().to_string(),
            external_id: external_id.into(),
        }
    }
}

/// Rating of a single episode
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EpisodeRating {
    pub number: u32,
    pub title: Option<String>,
    pub rating: f64,
    pub aired: Option<String>,
}

/// Ratings reconciled across sources
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EnhancedRatings {
    pub anilist: Option<SourceRating>,
    pub mal: Option<SourceRating>,
    pub imdb: Option<SourceRating>,
    pub episodes: Vec<EpisodeRating>,
    pub average_rating: Option<f64>,
    pub rating_count: usize,
}

impl EnhancedRatings {
    /// Slot holding the rating for `source`
    pub fn slot_mut(&mut self, source: Source) -> &mut Option<SourceRating> {
        match source {
            Source::AniList => &mut self.anilist,
            Source::Jikan => &mut self.mal,
            Source::Omdb => &mut self.imdb,
        }
    }

    /// Recompute `average_rating` and `rating_count` from the per-source slots
    pub fn recompute_average(&mut self) {
        let scores: Vec<f64> = [&self.anilist, &self.mal, &self.imdb]
            .into_iter()
            .flatten()
            .map(|r| r.score)
            .collect();

        self.rating_count = scores.len();
        self.average_rating = if scores.is_empty() {
            None
        } else {
            Some(round_one_decimal(scores.iter().sum::<f64>() / scores.len() as f64))
        };
    }
}

/// Round to one decimal place, half away from zero
pub fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}
