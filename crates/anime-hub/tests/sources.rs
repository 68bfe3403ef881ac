mod common;

use anime_hub::api::{AniListClient, JikanClient, OmdbClient};
use anime_hub::{ApiContext, ApiError, ListingCategory, MediaSource};
use common::{config_for, hits, json, mount_get};
use shared::{Config, Source};
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer};

const ANILIST_SEARCH: &str = r#"{
  "data": {
    "Page": {
      "pageInfo": { "hasNextPage": true, "total": 42 },
      "media": [
        {
          "id": 20,
          "title": { "romaji": "Naruto", "english": "Naruto", "native": "ナルト" },
          "coverImage": {
            "extraLarge": "https://img.anili.st/xl/20.jpg",
            "large": "https://img.anili.st/l/20.jpg"
          },
          "averageScore": 79,
          "popularity": 600000,
          "genres": ["Action", "Adventure"],
          "startDate": { "year": 2002, "month": 10, "day": 3 },
          "description": "<b>Naruto</b> Uzumaki<br>wants to be Hokage."
        },
        {
          "id": 1735,
          "title": { "romaji": "Naruto: Shippuuden", "english": "Naruto Shippuden" },
          "coverImage": null,
          "averageScore": 82,
          "popularity": 500000
        }
      ]
    }
  }
}"#;

const JIKAN_SEARCH: &str = r#"{
  "pagination": {
    "last_visible_page": 3,
    "has_next_page": true,
    "current_page": 1,
    "items": { "count": 1, "total": 30, "per_page": 12 }
  },
  "data": [
    {
      "mal_id": 20,
      "title": "Naruto",
      "title_english": "Naruto",
      "images": { "jpg": {
        "image_url": "https://cdn.myanimelist.net/images/anime/13/17405.jpg",
        "large_image_url": "https://cdn.myanimelist.net/images/anime/13/17405l.jpg"
      } },
      "score": 8.0,
      "members": 2800000,
      "popularity": 8,
      "aired": { "from": "2002-10-03T00:00:00+00:00", "to": "2007-02-08T00:00:00+00:00" },
      "duration": "23 min per ep"
    }
  ]
}"#;

const JIKAN_DETAILS: &str = r#"{
  "data": {
    "mal_id": 20,
    "title": "Naruto",
    "title_english": "Naruto",
    "score": 8.0,
    "members": 2800000,
    "popularity": 8,
    "episodes": 220,
    "studios": [{ "mal_id": 1, "type": "anime", "name": "Pierrot" }]
  }
}"#;

const JIKAN_STATISTICS: &str = r#"{
  "data": {
    "watching": 1000,
    "completed": 2000,
    "on_hold": 10,
    "dropped": 5,
    "plan_to_watch": 300,
    "total": 3315
  }
}"#;

const JIKAN_EPISODES: &str = r#"{
  "pagination": { "last_visible_page": 1, "has_next_page": false },
  "data": [
    { "mal_id": 1, "title": "Enter: Naruto Uzumaki!", "aired": "2002-10-03T00:00:00+00:00", "score": 4.5 },
    { "mal_id": 2, "title": "My Name is Konohamaru!", "score": null }
  ]
}"#;

const OMDB_SEARCH: &str = r#"{
  "Search": [
    {
      "Title": "Naruto",
      "Year": "2002–2007",
      "imdbID": "tt0409591",
      "Type": "series",
      "Poster": "https://m.media-amazon.com/images/naruto.jpg"
    }
  ],
  "totalResults": "3",
  "Response": "True"
}"#;

const OMDB_TITLE: &str = r#"{
  "Title": "Naruto",
  "Year": "2002–2007",
  "imdbID": "tt0409591",
  "imdbRating": "8.4",
  "imdbVotes": "123,456",
  "Poster": "N/A",
  "Response": "True"
}"#;

fn context(server: &MockServer) -> (Config, ApiContext) {
    let config = config_for(server);
    let ctx = ApiContext::from_config(&config).unwrap();
    (config, ctx)
}

// ========== AniList ==========

#[tokio::test]
async fn test_anilist_search_normalizes_and_caches() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_string_contains("POPULARITY_DESC"))
        .and(body_string_contains(r#""search":"naruto""#))
        .respond_with(json(200, ANILIST_SEARCH))
        .expect(1)
        .mount(&server)
        .await;

    let (config, ctx) = context(&server);
    let client = AniListClient::new(ctx, config.sources.anilist.endpoint.as_str(), 12);

    let page = client.search("naruto", 1).await.unwrap();
    assert!(page.has_next_page);
    assert_eq!(page.total, Some(42));
    assert_eq!(page.results.len(), 2);

    let naruto = &page.results[0];
    assert_eq!(naruto.id, "20");
    assert_eq!(naruto.source, Source::AniList);
    assert_eq!(naruto.rating.score, Some(7.9));
    assert_eq!(naruto.images.large, "https://img.anili.st/xl/20.jpg");
    assert_eq!(naruto.year, Some(2002));
    assert!(!naruto.description.as_deref().unwrap().contains('<'));

    // No cover image falls back to the placeholder
    assert_eq!(page.results[1].images.large, config.defaults.fallback_image);

    // Second call is served from the cache
    client.search("naruto", 1).await.unwrap();
}

#[tokio::test]
async fn test_anilist_graphql_errors_are_data_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(json(
            200,
            r#"{"data": null, "errors": [{"message": "Invalid query", "status": 400}]}"#,
        ))
        .expect(2)
        .mount(&server)
        .await;

    let (config, ctx) = context(&server);
    let client = AniListClient::new(ctx, config.sources.anilist.endpoint.as_str(), 12);

    match client.search("naruto", 1).await.unwrap_err() {
        ApiError::UpstreamData { api, message } => {
            assert_eq!(api, Source::AniList);
            assert!(message.contains("Invalid query"));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    // Failures are not cached
    assert!(client.search("naruto", 1).await.is_err());
}

#[tokio::test]
async fn test_anilist_missing_media_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_string_contains("query AnimeDetails"))
        .respond_with(json(
            404,
            r#"{"data": {"Media": null}, "errors": [{"message": "Not Found.", "status": 404}]}"#,
        ))
        .mount(&server)
        .await;

    let (config, ctx) = context(&server);
    let client = AniListClient::new(ctx, config.sources.anilist.endpoint.as_str(), 12);

    assert!(client.details("999999").await.unwrap().is_none());
}

#[tokio::test]
async fn test_anilist_listing_uses_category_query() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_string_contains("SCORE_DESC"))
        .respond_with(json(200, ANILIST_SEARCH))
        .expect(1)
        .mount(&server)
        .await;

    let (config, ctx) = context(&server);
    let client = AniListClient::new(ctx, config.sources.anilist.endpoint.as_str(), 12);

    let top = client.listing(ListingCategory::TopRated, 1).await.unwrap();
    assert_eq!(top.len(), 2);
}

// ========== Jikan ==========

async fn mount_jikan(server: &MockServer) {
    mount_get(server, "/v4/anime", 200, JIKAN_SEARCH).await;
    mount_get(server, "/v4/anime/20", 200, JIKAN_DETAILS).await;
    mount_get(server, "/v4/anime/20/statistics", 200, JIKAN_STATISTICS).await;
    mount_get(server, "/v4/anime/20/episodes", 200, JIKAN_EPISODES).await;
}

#[tokio::test]
async fn test_jikan_search() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v4/anime"))
        .and(query_param("q", "naruto"))
        .and(query_param("page", "1"))
        .and(query_param("limit", "12"))
        .respond_with(json(200, JIKAN_SEARCH))
        .expect(1)
        .mount(&server)
        .await;

    let (config, ctx) = context(&server);
    let client = JikanClient::new(ctx, config.sources.jikan.endpoint.as_str(), 12);

    let page = client.search("naruto", 1).await.unwrap();
    assert!(page.has_next_page);
    assert_eq!(page.total, Some(30));

    let naruto = &page.results[0];
    assert_eq!(naruto.source, Source::Jikan);
    assert_eq!(naruto.rating.score, Some(8.0));
    assert_eq!(naruto.popularity, Some(2800000));
    assert_eq!(naruto.duration_minutes, Some(23));
    assert_eq!(
        naruto.images.large,
        "https://cdn.myanimelist.net/images/anime/13/17405l.jpg"
    );
}

#[tokio::test]
async fn test_jikan_details_attach_statistics() {
    let server = MockServer::start().await;
    mount_jikan(&server).await;

    let (config, ctx) = context(&server);
    assert_eq!(config.rate_limit.min_interval_ms, 100);
    let client = JikanClient::new(ctx, config.sources.jikan.endpoint.as_str(), 12);

    // The statistics call follows the details call within the minimum gap
    let record = client.details("20").await.unwrap().unwrap();
    let details = record.details.unwrap();
    assert_eq!(details.studios, vec!["Pierrot".to_string()]);
    assert_eq!(details.popularity_rank, Some(8));
    assert_eq!(details.statistics.unwrap().total, Some(3315));
    assert_eq!(hits(&server, "/v4/anime/20/statistics").await, 1);
}

#[tokio::test]
async fn test_jikan_details_survive_statistics_failure() {
    let server = MockServer::start().await;
    mount_get(&server, "/v4/anime/20", 200, JIKAN_DETAILS).await;
    mount_get(&server, "/v4/anime/20/statistics", 500, r#"{"message": "boom"}"#).await;

    let (config, ctx) = context(&server);
    let client = JikanClient::new(ctx, config.sources.jikan.endpoint.as_str(), 12);

    let record = client.details("20").await.unwrap().unwrap();
    assert_eq!(record.episodes, Some(220));
    assert!(record.details.unwrap().statistics.is_none());
}

#[tokio::test]
async fn test_jikan_episode_ratings_skip_unrated() {
    let server = MockServer::start().await;
    mount_jikan(&server).await;

    let (config, ctx) = context(&server);
    let client = JikanClient::new(ctx, config.sources.jikan.endpoint.as_str(), 12);

    let episodes = client.episode_ratings("20").await.unwrap();
    assert_eq!(episodes.len(), 1);
    assert_eq!(episodes[0].number, 1);
    assert_eq!(episodes[0].rating, 4.5);
}

#[tokio::test]
async fn test_jikan_top_listing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v4/top/anime"))
        .and(query_param("page", "2"))
        .and(query_param("limit", "12"))
        .respond_with(json(200, JIKAN_SEARCH))
        .expect(1)
        .mount(&server)
        .await;

    let (config, ctx) = context(&server);
    let client = JikanClient::new(ctx, config.sources.jikan.endpoint.as_str(), 12);

    let top = client.listing(ListingCategory::TopRated, 2).await.unwrap();
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].id, "20");

    // Cached
    client.listing(ListingCategory::TopRated, 2).await.unwrap();
}

#[tokio::test]
async fn test_jikan_unknown_id_is_not_found() {
    let server = MockServer::start().await;
    mount_get(
        &server,
        "/v4/anime/123456789",
        404,
        r#"{"status": 404, "type": "BadResponseException", "message": "Resource does not exist"}"#,
    )
    .await;

    let (config, ctx) = context(&server);
    let client = JikanClient::new(ctx, config.sources.jikan.endpoint.as_str(), 12);

    assert!(client.details("123456789").await.unwrap().is_none());
}

#[tokio::test]
async fn test_jikan_throttled_by_server() {
    let server = MockServer::start().await;
    mount_get(&server, "/v4/anime", 429, r#"{"message": "slow down"}"#).await;

    let (config, ctx) = context(&server);
    let client = JikanClient::new(ctx, config.sources.jikan.endpoint.as_str(), 12);

    let err = client.search("naruto", 1).await.unwrap_err();
    assert!(matches!(err, ApiError::RateLimitExceeded { api: Source::Jikan }));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_jikan_server_error_carries_message() {
    let server = MockServer::start().await;
    mount_get(
        &server,
        "/v4/anime",
        500,
        r#"{"status": 500, "message": "Upstream is down"}"#,
    )
    .await;

    let (config, ctx) = context(&server);
    let client = JikanClient::new(ctx, config.sources.jikan.endpoint.as_str(), 12);

    match client.search("naruto", 1).await.unwrap_err() {
        ApiError::UpstreamHttp { api, status, body } => {
            assert_eq!(api, Source::Jikan);
            assert_eq!(status, 500);
            assert_eq!(body, "Upstream is down");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_jikan_malformed_body() {
    let server = MockServer::start().await;
    mount_get(&server, "/v4/anime", 200, "<html>maintenance</html>").await;

    let (config, ctx) = context(&server);
    let client = JikanClient::new(ctx, config.sources.jikan.endpoint.as_str(), 12);

    let err = client.search("naruto", 1).await.unwrap_err();
    assert!(matches!(err, ApiError::UpstreamData { api: Source::Jikan, .. }));
}

#[tokio::test]
async fn test_local_budget_fails_fast() {
    let server = MockServer::start().await;
    mount_jikan(&server).await;

    let mut config = config_for(&server);
    config.sources.jikan.requests_per_window = 1;
    let ctx = ApiContext::from_config(&config).unwrap();
    let client = JikanClient::new(ctx, config.sources.jikan.endpoint.as_str(), 12);

    client.search("naruto", 1).await.unwrap();
    let err = client.search("bleach", 1).await.unwrap_err();
    assert!(matches!(err, ApiError::RateLimitExceeded { api: Source::Jikan }));
    assert_eq!(hits(&server, "/v4/anime").await, 1);
}

// ========== OMDb ==========

#[tokio::test]
async fn test_omdb_search_and_details() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/omdb"))
        .and(query_param("apikey", "demo"))
        .and(query_param("s", "naruto"))
        .and(query_param("type", "series"))
        .respond_with(json(200, OMDB_SEARCH))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/omdb"))
        .and(query_param("i", "tt0409591"))
        .and(query_param("plot", "full"))
        .respond_with(json(200, OMDB_TITLE))
        .mount(&server)
        .await;

    let (config, ctx) = context(&server);
    let client = OmdbClient::new(ctx, config.sources.omdb.endpoint.as_str(), "demo");

    let page = client.search("naruto", 1).await.unwrap();
    assert_eq!(page.total, Some(3));
    assert!(!page.has_next_page);
    assert_eq!(page.results[0].id, "tt0409591");

    let record = client.details("tt0409591").await.unwrap().unwrap();
    assert_eq!(record.source, Source::Omdb);
    assert_eq!(record.rating.score, Some(8.4));
    assert_eq!(record.images.large, config.defaults.fallback_image);
}

#[tokio::test]
async fn test_omdb_not_found_is_empty() {
    let server = MockServer::start().await;
    mount_get(
        &server,
        "/omdb",
        200,
        r#"{"Response": "False", "Error": "Series not found!"}"#,
    )
    .await;

    let (config, ctx) = context(&server);
    let client = OmdbClient::new(ctx, config.sources.omdb.endpoint.as_str(), "demo");

    let page = client.search("zzzzzz", 1).await.unwrap();
    assert!(page.results.is_empty());
    assert!(client.details("tt0000000").await.unwrap().is_none());
}

#[tokio::test]
async fn test_omdb_error_envelope() {
    let server = MockServer::start().await;
    mount_get(
        &server,
        "/omdb",
        200,
        r#"{"Response": "False", "Error": "Invalid API key!"}"#,
    )
    .await;

    let (config, ctx) = context(&server);
    let client = OmdbClient::new(ctx, config.sources.omdb.endpoint.as_str(), "bad");

    match client.search("naruto", 1).await.unwrap_err() {
        ApiError::UpstreamData { api, message } => {
            assert_eq!(api, Source::Omdb);
            assert_eq!(message, "Invalid API key!");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
