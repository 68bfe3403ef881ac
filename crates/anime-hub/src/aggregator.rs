//! Cross-source queries.
//!
//! The aggregator fans searches out to both catalogs, merges and ranks the
//! results, enriches detail records with ratings from every source, and
//! serves the curated listings. It never talks HTTP itself; everything goes
//! through [`MediaSource`] handles.

use crate::api::{
    AniListClient, ApiContext, JikanClient, ListingCategory, MediaSource, OmdbClient,
    SharedBudget, SharedCache,
};
use crate::error::{ApiError, ApiResult};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use shared::config::SearchConfig;
use shared::{Config, EnhancedRatings, EpisodeRating, MediaRecord, Source, SourceRating};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Search limits taken from the `[search]` config section
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchSettings {
    pub min_query_length: usize,
    pub page_size: usize,
}

impl From<&SearchConfig> for SearchSettings {
    fn from(config: &SearchConfig) -> Self {
        Self {
            min_query_length: config.min_query_length,
            page_size: config.page_size,
        }
    }
}

/// Merged, deduplicated and ranked search results
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SearchResults {
    /// At most `page_size` records, best match first
    pub results: Vec<MediaRecord>,
    /// Number of records after deduplication, before truncation
    pub total: usize,
    /// Sources that failed; their results are missing from `results`
    pub failed_sources: Vec<Source>,
}

/// The three curated listings shown on the landing view
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HomeSections {
    pub trending: Vec<MediaRecord>,
    pub top_rated: Vec<MediaRecord>,
    pub new_releases: Vec<MediaRecord>,
}

/// Snapshot of the shared cache and request budget
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheStatus {
    pub size: usize,
    pub max_size: usize,
    pub per_source_counts: BTreeMap<Source, u32>,
}

/// Multi-source query service
pub struct Aggregator {
    anilist: Arc<dyn MediaSource>,
    jikan: Arc<dyn MediaSource>,
    omdb: Arc<dyn MediaSource>,
    cache: SharedCache,
    budget: SharedBudget,
    settings: SearchSettings,
}

impl Aggregator {
    pub fn new(
        anilist: Arc<dyn MediaSource>,
        jikan: Arc<dyn MediaSource>,
        omdb: Arc<dyn MediaSource>,
        cache: SharedCache,
        budget: SharedBudget,
        settings: SearchSettings,
    ) -> Self {
        Self {
            anilist,
            jikan,
            omdb,
            cache,
            budget,
            settings,
        }
    }

    /// Wire up the real HTTP clients described by `config`
    pub fn from_config(config: &Config) -> Result<Self> {
        let ctx = ApiContext::from_config(config)?;
        let page_size = config.search.page_size;
        let sources = &config.sources;

        let anilist = AniListClient::new(ctx.clone(), sources.anilist.endpoint.as_str(), page_size);
        let jikan = JikanClient::new(ctx.clone(), sources.jikan.endpoint.as_str(), page_size);
        let omdb = OmdbClient::new(
            ctx.clone(),
            sources.omdb.endpoint.as_str(),
            sources.omdb.api_key.as_str(),
        );

        Ok(Self::new(
            Arc::new(anilist),
            Arc::new(jikan),
            Arc::new(omdb),
            ctx.cache().clone(),
            ctx.budget().clone(),
            SearchSettings::from(&config.search),
        ))
    }

    pub fn settings(&self) -> SearchSettings {
        self.settings
    }

    /// Response cache shared with the source clients
    pub fn cache(&self) -> &SharedCache {
        &self.cache
    }

    fn adapter(&self, source: Source) -> &Arc<dyn MediaSource> {
        match source {
            Source::AniList => &self.anilist,
            Source::Jikan => &self.jikan,
            Source::Omdb => &self.omdb,
        }
    }

    /// Search both catalogs and merge the results
    ///
    /// Fails with [`ApiError::InvalidInput`] before any network call when the
    /// trimmed query is too short, and with [`ApiError::SearchFailed`] only if
    /// every catalog failed.
    pub async fn search(&self, query: &str, page: u32) -> ApiResult<SearchResults> {
        let query = query.trim();
        if query.chars().count() < self.settings.min_query_length {
            return Err(ApiError::InvalidInput {
                min_length: self.settings.min_query_length,
            });
        }

        info!(query = %query, page, "Searching all catalogs");
        let (anilist, jikan) = futures::join!(
            self.anilist.search(query, page),
            self.jikan.search(query, page)
        );

        let mut merged = Vec::new();
        let mut failures = Vec::new();
        let mut failed_sources = Vec::new();

        // Priority order: AniList results come first
        for (source, outcome) in [(Source::AniList, anilist), (Source::Jikan, jikan)] {
            match outcome {
                Ok(page) => merged.extend(page.results),
                Err(e) => {
                    warn!(source = %source, query = %query, error = %e, "Catalog search failed");
                    failed_sources.push(source);
                    failures.push(e);
                }
            }
        }

        if failed_sources.len() == 2 {
            return Err(ApiError::SearchFailed { failures });
        }

        let unique = dedupe(merged);
        let total = unique.len();
        let mut results = rank_by_relevance(unique, query);
        results.truncate(self.settings.page_size);

        info!(
            query = %query,
            returned = results.len(),
            total,
            failed = failed_sources.len(),
            "Search complete"
        );

        Ok(SearchResults {
            results,
            total,
            failed_sources,
        })
    }

    /// Detailed record from `preferred`, enriched with ratings from every source
    ///
    /// `Ok(None)` means the id is unknown to `preferred`. Enrichment steps are
    /// best effort and never fail the call.
    pub async fn details(&self, id: &str, preferred: Source) -> ApiResult<Option<MediaRecord>> {
        info!(id = %id, source = %preferred, "Fetching details");

        let mut record = match self.adapter(preferred).details(id).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                info!(id = %id, source = %preferred, "No such record");
                return Ok(None);
            }
            Err(e) => {
                warn!(id = %id, source = %preferred, error = %e, "Primary details fetch failed");
                return Err(ApiError::DetailsFailed { cause: Box::new(e) });
            }
        };

        let mut ratings = EnhancedRatings::default();
        if let Some(score) = record.rating.score {
            *ratings.slot_mut(preferred) = Some(SourceRating::new(preferred, score, record.id.as_str()));
        }

        let title = record.title.search_title().to_string();
        let alternate = match preferred {
            Source::AniList => Some(Source::Jikan),
            Source::Jikan => Some(Source::AniList),
            Source::Omdb => None,
        };

        let (alternate_rating, imdb_rating) = futures::join!(
            async {
                match alternate {
                    Some(source) => self.matched_rating(source, &title).await,
                    None => None,
                }
            },
            async {
                match preferred {
                    Source::Omdb => None,
                    _ => self.matched_rating(Source::Omdb, &title).await,
                }
            }
        );

        if let (Some(source), Some(rating)) = (alternate, alternate_rating) {
            *ratings.slot_mut(source) = Some(rating);
        }
        if let Some(rating) = imdb_rating {
            ratings.imdb = Some(rating);
        }

        // Episode ratings come from MyAnimeList, either the record itself or its match
        let mal_id = match preferred {
            Source::Jikan => Some(record.id.clone()),
            _ => ratings.mal.as_ref().map(|r| r.external_id.clone()),
        };
        if let Some(mal_id) = mal_id {
            ratings.episodes = self.episode_ratings(&mal_id).await;
        }

        ratings.recompute_average();
        debug!(
            id = %id,
            rating_count = ratings.rating_count,
            average = ?ratings.average_rating,
            episodes = ratings.episodes.len(),
            "Ratings reconciled"
        );

        record.enhanced_ratings = Some(ratings);
        Ok(Some(record))
    }

    /// Find `title` in `source` and return the first hit's rating
    async fn matched_rating(&self, source: Source, title: &str) -> Option<SourceRating> {
        let adapter = self.adapter(source);

        let candidate = match adapter.search(title, 1).await {
            Ok(page) => page.results.into_iter().next(),
            Err(e) => {
                warn!(source = %source, title = %title, error = %e, "Rating lookup search failed");
                return None;
            }
        };
        let Some(candidate) = candidate else {
            debug!(source = %source, title = %title, "No matching title");
            return None;
        };

        let detailed_score = match adapter.details(&candidate.id).await {
            Ok(record) => record.and_then(|r| r.rating.score),
            Err(e) => {
                warn!(source = %source, id = %candidate.id, error = %e, "Rating lookup details failed");
                None
            }
        };

        let score = detailed_score.or(candidate.rating.score)?;
        Some(SourceRating::new(source, score, candidate.id))
    }

    async fn episode_ratings(&self, mal_id: &str) -> Vec<EpisodeRating> {
        match self.jikan.episode_ratings(mal_id).await {
            Ok(episodes) => episodes,
            Err(e) => {
                warn!(mal_id = %mal_id, error = %e, "Failed to fetch episode ratings");
                Vec::new()
            }
        }
    }

    /// Curated listing from one source; empty when it is unavailable or unsupported
    pub async fn listing_from(
        &self,
        source: Source,
        category: ListingCategory,
        page: u32,
    ) -> Vec<MediaRecord> {
        match self.adapter(source).listing(category, page).await {
            Ok(records) => records,
            Err(e) => {
                warn!(source = %source, category = %category, page, error = %e, "Listing unavailable");
                Vec::new()
            }
        }
    }

    async fn listing(&self, category: ListingCategory, page: u32) -> Vec<MediaRecord> {
        self.listing_from(Source::AniList, category, page).await
    }

    /// Currently trending titles; empty when the catalog is unavailable
    pub async fn trending(&self, page: u32) -> Vec<MediaRecord> {
        self.listing(ListingCategory::Trending, page).await
    }

    /// Highest rated finished titles; empty when the catalog is unavailable
    pub async fn top_rated(&self, page: u32) -> Vec<MediaRecord> {
        self.listing(ListingCategory::TopRated, page).await
    }

    /// Most recently started titles; empty when the catalog is unavailable
    pub async fn new_releases(&self, page: u32) -> Vec<MediaRecord> {
        self.listing(ListingCategory::NewReleases, page).await
    }

    /// First page of every listing, fetched concurrently
    pub async fn home(&self) -> HomeSections {
        let (trending, top_rated, new_releases) =
            futures::join!(self.trending(1), self.top_rated(1), self.new_releases(1));

        HomeSections {
            trending,
            top_rated,
            new_releases,
        }
    }

    pub async fn clear_cache(&self) {
        self.cache.lock().await.clear();
        info!("Cache cleared");
    }

    pub async fn cache_status(&self) -> CacheStatus {
        let (size, max_size) = {
            let cache = self.cache.lock().await;
            (cache.len(), cache.max_entries())
        };
        let per_source_counts = self.budget.lock().await.counts();

        CacheStatus {
            size,
            max_size,
            per_source_counts,
        }
    }
}

fn dedupe_key(record: &MediaRecord) -> String {
    record.title.display.to_lowercase()
}

/// Drop records whose lowercase display title was already seen; first wins
pub fn dedupe(records: Vec<MediaRecord>) -> Vec<MediaRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|record| seen.insert(dedupe_key(record)))
        .collect()
}

/// Stable sort: exact title match, then prefix, then substring, then popularity
pub fn rank_by_relevance(mut records: Vec<MediaRecord>, query: &str) -> Vec<MediaRecord> {
    let query = query.trim().to_lowercase();

    let tier = |record: &MediaRecord| -> u8 {
        let title = record.title.display.to_lowercase();
        if title == query {
            0
        } else if title.starts_with(&query) {
            1
        } else if title.contains(&query) {
            2
        } else {
            3
        }
    };

    records.sort_by(|a, b| match tier(a).cmp(&tier(b)) {
        Ordering::Equal => b.popularity.unwrap_or(0).cmp(&a.popularity.unwrap_or(0)),
        decided => decided,
    });
    records
}
