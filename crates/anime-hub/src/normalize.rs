//! Conversion of raw upstream payloads into [`MediaRecord`]s.
//!
//! Everything here is pure: no I/O, no clock, no shared state. Missing or
//! malformed fields never fail a conversion; they fall back to `None`, empty
//! lists, [`UNKNOWN_TITLE`] or the configured placeholder image.

use crate::api::types::{
    AniListCoverImage, AniListMedia, AniListRelatedMedia, Connection, FuzzyDate, JikanAnime,
    MalEntity, OmdbTitle,
};
use chrono::{DateTime, Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use shared::{
    round_one_decimal, Credits, ExternalLink, MediaDetails, MediaImages, MediaRecord, MediaTitle,
    PartialDate, Rating, RelatedWork, Source, StreamingEpisode, UNKNOWN_TITLE,
};

/// Number of staff and character credits kept in detailed records
const MAX_CREDITS: usize = 5;

/// Number of recommendations kept in detailed records
const MAX_RECOMMENDATIONS: usize = 6;

static LINE_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<br\s*/?>").expect("line break pattern is valid"));
static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("tag pattern is valid"));
static EXTRA_BLANK_LINES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n{3,}").expect("blank line pattern is valid"));
static DURATION_PART: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d+)\s*(hr|hour|min|sec)").expect("duration pattern is valid")
});

/// A payload from any supported source
#[derive(Debug, Clone)]
pub enum RawMedia {
    AniList(AniListMedia),
    Jikan(JikanAnime),
    Omdb(OmdbTitle),
}

impl RawMedia {
    pub fn source(&self) -> Source {
        match self {
            RawMedia::AniList(_) => Source::AniList,
            RawMedia::Jikan(_) => Source::Jikan,
            RawMedia::Omdb(_) => Source::Omdb,
        }
    }
}

/// Normalize a raw payload; `detailed` additionally fills [`MediaRecord::details`]
pub fn normalize(raw: RawMedia, detailed: bool, fallback_image: &str) -> MediaRecord {
    match raw {
        RawMedia::AniList(media) => normalize_anilist(media, detailed, fallback_image),
        RawMedia::Jikan(anime) => normalize_jikan(anime, detailed, fallback_image),
        RawMedia::Omdb(title) => normalize_omdb(title, detailed, fallback_image),
    }
}

pub fn normalize_anilist(media: AniListMedia, detailed: bool, fallback_image: &str) -> MediaRecord {
    let details = detailed.then(|| anilist_details(&media));

    let title = media.title.unwrap_or_default();
    let cover = media.cover_image.unwrap_or_default();
    let start_date = media.start_date.and_then(fuzzy_date);

    MediaRecord {
        id: media.id.to_string(),
        source: Source::AniList,
        title: MediaTitle::new(title.english, title.romaji, title.native),
        images: MediaImages {
            large: first_image([cover.extra_large.as_deref(), cover.large.as_deref()], fallback_image),
            medium: first_image([cover.large.as_deref(), cover.medium.as_deref()], fallback_image),
        },
        banner: media.banner_image.filter(|url| is_usable_image(url)),
        description: media
            .description
            .as_deref()
            .map(strip_html)
            .filter(|text| !text.is_empty()),
        episodes: media.episodes,
        duration_minutes: media.duration,
        status: media.status,
        genres: media.genres.unwrap_or_default(),
        year: start_date.map(|date| date.year),
        start_date,
        end_date: media.end_date.and_then(fuzzy_date),
        rating: Rating::new(Source::AniList, scale_hundred(media.average_score)),
        popularity: media.popularity,
        favourites: media.favourites,
        members: None,
        url: media.site_url,
        details,
        enhanced_ratings: None,
    }
}

fn anilist_details(media: &AniListMedia) -> MediaDetails {
    MediaDetails {
        media_type: media.format.clone(),
        source_material: media.source.clone(),
        season: media.season.clone(),
        season_year: media.season_year,
        studios: nodes(media.studios.as_ref())
            .filter_map(|studio| studio.name.clone())
            .collect(),
        staff: nodes(media.staff.as_ref())
            .filter_map(|person| person.name.as_ref()?.full.clone())
            .take(MAX_CREDITS)
            .collect(),
        characters: nodes(media.characters.as_ref())
            .filter_map(|person| person.name.as_ref()?.full.clone())
            .take(MAX_CREDITS)
            .collect(),
        relations: nodes(media.relations.as_ref()).map(related_work).collect(),
        recommendations: nodes(media.recommendations.as_ref())
            .filter_map(|rec| rec.media_recommendation.as_ref())
            .take(MAX_RECOMMENDATIONS)
            .map(related_work)
            .collect(),
        external_links: media
            .external_links
            .iter()
            .flatten()
            .filter_map(|link| {
                Some(ExternalLink {
                    site: link.site.clone()?,
                    url: link.url.clone()?,
                })
            })
            .collect(),
        streaming_episodes: media
            .streaming_episodes
            .iter()
            .flatten()
            .map(|episode| StreamingEpisode {
                title: episode.title.clone(),
                url: episode.url.clone(),
                site: episode.site.clone(),
                thumbnail: episode.thumbnail.clone().filter(|url| is_usable_image(url)),
            })
            .collect(),
        ..Default::default()
    }
}

fn related_work(media: &AniListRelatedMedia) -> RelatedWork {
    let title = media
        .title
        .as_ref()
        .and_then(|t| {
            non_blank(t.english.as_deref()).or_else(|| non_blank(t.romaji.as_deref()))
        })
        .unwrap_or(UNKNOWN_TITLE);
    let image = media.cover_image.as_ref().and_then(|cover: &AniListCoverImage| {
        [cover.large.as_deref(), cover.medium.as_deref()]
            .into_iter()
            .flatten()
            .find(|url| is_usable_image(url))
            .map(str::to_string)
    });

    RelatedWork {
        id: media.id.to_string(),
        title: title.to_string(),
        image,
        format: media.format.clone(),
        score: scale_hundred(media.average_score),
    }
}

pub fn normalize_jikan(anime: JikanAnime, detailed: bool, fallback_image: &str) -> MediaRecord {
    let details = detailed.then(|| jikan_details(&anime));

    let images = anime.images.unwrap_or_default();
    let webp = images.webp.unwrap_or_default();
    let jpg = images.jpg.unwrap_or_default();
    let aired = anime.aired.unwrap_or_default();
    let start_date = aired.from.as_deref().and_then(iso_date);

    MediaRecord {
        id: anime.mal_id.to_string(),
        source: Source::Jikan,
        title: MediaTitle::new(anime.title_english, anime.title, anime.title_japanese),
        images: MediaImages {
            large: first_image(
                [webp.large_image_url.as_deref(), jpg.large_image_url.as_deref()],
                fallback_image,
            ),
            medium: first_image(
                [webp.image_url.as_deref(), jpg.image_url.as_deref()],
                fallback_image,
            ),
        },
        banner: None,
        description: anime
            .synopsis
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty()),
        episodes: anime.episodes,
        duration_minutes: anime.duration.as_deref().and_then(parse_duration_minutes),
        status: anime.status,
        genres: entity_names(&anime.genres),
        year: start_date.map(|date| date.year).or(anime.year),
        start_date,
        end_date: aired.to.as_deref().and_then(iso_date),
        rating: Rating::new(
            Source::Jikan,
            anime.score.filter(|score| *score > 0.0).map(round_one_decimal),
        ),
        // Jikan's `popularity` is a rank where 1 is best; member count is the audience size
        popularity: anime.members,
        favourites: anime.favorites,
        members: anime.members,
        url: anime.url,
        details,
        enhanced_ratings: None,
    }
}

fn jikan_details(anime: &JikanAnime) -> MediaDetails {
    MediaDetails {
        media_type: anime.anime_type.clone(),
        source_material: anime.source.clone(),
        season: anime.season.clone(),
        season_year: anime.year,
        studios: entity_names(&anime.studios),
        producers: entity_names(&anime.producers),
        licensors: entity_names(&anime.licensors),
        themes: entity_names(&anime.themes),
        demographics: entity_names(&anime.demographics),
        popularity_rank: anime.popularity,
        ..Default::default()
    }
}

pub fn normalize_omdb(title: OmdbTitle, detailed: bool, fallback_image: &str) -> MediaRecord {
    let released = present(title.released.as_deref()).and_then(released_date);
    let year = present(title.year.as_deref()).and_then(leading_year);

    let details = detailed.then(|| MediaDetails {
        media_type: present(title.title_type.as_deref()).map(str::to_string),
        credits: Some(Credits {
            director: present(title.director.as_deref()).map(str::to_string),
            writer: present(title.writer.as_deref()).map(str::to_string),
            actors: present(title.actors.as_deref()).map(str::to_string),
            language: present(title.language.as_deref()).map(str::to_string),
            country: present(title.country.as_deref()).map(str::to_string),
            awards: present(title.awards.as_deref()).map(str::to_string),
            metascore: present(title.metascore.as_deref()).and_then(|s| s.parse().ok()),
            votes: present(title.imdb_votes.as_deref()).and_then(|s| s.replace(',', "").parse().ok()),
            total_seasons: present(title.total_seasons.as_deref()).and_then(|s| s.parse().ok()),
        }),
        ..Default::default()
    });

    let url = (!title.imdb_id.is_empty())
        .then(|| format!("https://www.imdb.com/title/{}/", title.imdb_id));
    let poster = present(title.poster.as_deref());

    MediaRecord {
        url,
        source: Source::Omdb,
        title: MediaTitle::new(present(title.title.as_deref()).map(str::to_string), None, None),
        images: MediaImages {
            large: first_image([poster], fallback_image),
            medium: first_image([poster], fallback_image),
        },
        banner: None,
        description: present(title.plot.as_deref()).map(str::to_string),
        episodes: None,
        duration_minutes: present(title.runtime.as_deref()).and_then(parse_duration_minutes),
        status: None,
        genres: present(title.genre.as_deref())
            .map(|genres| {
                genres
                    .split(',')
                    .map(str::trim)
                    .filter(|g| !g.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
        year: year.or(released.map(|date| date.year)),
        start_date: released,
        end_date: None,
        rating: Rating::new(
            Source::Omdb,
            present(title.imdb_rating.as_deref())
                .and_then(|s| s.parse::<f64>().ok())
                .map(round_one_decimal),
        ),
        popularity: None,
        favourites: None,
        members: None,
        id: title.imdb_id,
        details,
        enhanced_ratings: None,
    }
}

/// Convert a 0-100 score to the 0-10 scale; zero means "not rated"
pub fn scale_hundred(score: Option<f64>) -> Option<f64> {
    score
        .filter(|score| *score > 0.0)
        .map(|score| round_one_decimal(score / 10.0))
}

/// Remove markup from an HTML fragment, keeping line breaks
pub fn strip_html(html: &str) -> String {
    let text = LINE_BREAK.replace_all(html, "\n");
    let text = HTML_TAG.replace_all(&text, "");
    let text = decode_entities(&text);
    EXTRA_BLANK_LINES
        .replace_all(text.trim(), "\n\n")
        .into_owned()
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#039;", "'")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&mdash;", "\u{2014}")
        .replace("&amp;", "&")
}

/// Parse durations such as "24 min per ep", "1 hr 30 min" or "142 min"
pub fn parse_duration_minutes(text: &str) -> Option<u32> {
    let mut minutes = 0u32;

    for part in DURATION_PART.captures_iter(text) {
        let value: u32 = part[1].parse().ok()?;
        let unit = part[2].to_ascii_lowercase();
        if unit.starts_with('h') {
            minutes = minutes.saturating_add(value.saturating_mul(60));
        } else if unit == "min" {
            minutes = minutes.saturating_add(value);
        }
    }

    (minutes > 0).then_some(minutes)
}

fn is_usable_image(url: &str) -> bool {
    let url = url.trim();
    url.starts_with("https://") || url.starts_with("http://")
}

fn first_image<'a>(candidates: impl IntoIterator<Item = Option<&'a str>>, fallback: &str) -> String {
    candidates
        .into_iter()
        .flatten()
        .find(|url| is_usable_image(url))
        .unwrap_or(fallback)
        .trim()
        .to_string()
}

fn nodes<T>(connection: Option<&Connection<T>>) -> impl Iterator<Item = &T> {
    connection
        .into_iter()
        .flat_map(|connection| connection.nodes.iter().flatten())
}

fn entity_names(entities: &[MalEntity]) -> Vec<String> {
    entities
        .iter()
        .map(|entity| entity.name.trim())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

fn fuzzy_date(date: FuzzyDate) -> Option<PartialDate> {
    Some(PartialDate {
        year: date.year?,
        month: date.month,
        day: date.month.and(date.day),
    })
}

fn iso_date(text: &str) -> Option<PartialDate> {
    let date = DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.date_naive())
        .ok()
        .or_else(|| NaiveDate::parse_from_str(text.get(..10)?, "%Y-%m-%d").ok())?;
    Some(naive_to_partial(date))
}

/// OMDb release dates look like "07 Apr 2013"
fn released_date(text: &str) -> Option<PartialDate> {
    NaiveDate::parse_from_str(text, "%d %b %Y")
        .ok()
        .map(naive_to_partial)
}

fn naive_to_partial(date: NaiveDate) -> PartialDate {
    PartialDate {
        year: date.year(),
        month: Some(date.month()),
        day: Some(date.day()),
    }
}

/// OMDb years may be ranges such as "2013–2023"
fn leading_year(text: &str) -> Option<i32> {
    text.get(..4)?.parse().ok()
}

fn present(value: Option<&str>) -> Option<&str> {
    non_blank(value).filter(|v| *v != "N/A")
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
