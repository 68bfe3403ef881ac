//! OMDb client, used for IMDb ratings.

use super::http::ApiContext;
use super::source::{MediaSource, SearchPage};
use super::types::{OmdbSearchResponse, OmdbTitle};
use crate::cache::cache_key;
use crate::error::{ApiError, ApiResult};
use crate::normalize::{normalize, RawMedia};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use shared::{MediaRecord, Source};
use tracing::{debug, info, warn};

pub struct OmdbClient {
    ctx: ApiContext,
    endpoint: String,
    api_key: String,
}

/// OMDb reports "nothing matched" through its error envelope
fn is_not_found(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    message.contains("not found") || message.contains("incorrect imdb id")
}

/// Outcome of an OMDb call once the `Response`/`Error` envelope is unpacked
enum Envelope<T> {
    Found(T),
    NotFound,
}

/// Payloads that may carry OMDb's `"Error"` field
trait ErrorField {
    fn error_message(&self) -> Option<&str>;
}

impl ErrorField for OmdbSearchResponse {
    fn error_message(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

impl ErrorField for OmdbTitle {
    fn error_message(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

impl OmdbClient {
    pub fn new(ctx: ApiContext, endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            ctx,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        }
    }

    async fn fetch<T: DeserializeOwned + ErrorField>(
        &self,
        params: &[(&str, &str)],
    ) -> ApiResult<Envelope<T>> {
        if self.api_key.is_empty() {
            return Err(ApiError::data(Source::Omdb, "No API key configured"));
        }

        let request = self
            .ctx
            .client()
            .get(&self.endpoint)
            .query(&[("apikey", self.api_key.as_str())])
            .query(params);

        let Some(body) = self.ctx.send_json::<T>(Source::Omdb, request).await? else {
            return Ok(Envelope::NotFound);
        };

        if let Some(message) = body.error_message() {
            if is_not_found(message) {
                debug!(source = "omdb", error = %message, "No match");
                return Ok(Envelope::NotFound);
            }
            warn!(source = "omdb", error = %message, "OMDb error");
            return Err(ApiError::data(Source::Omdb, message));
        }

        Ok(Envelope::Found(body))
    }
}

#[async_trait]
impl MediaSource for OmdbClient {
    fn source(&self) -> Source {
        Source::Omdb
    }

    async fn search(&self, query: &str, page: u32) -> ApiResult<SearchPage> {
        let key = cache_key("omdb_search", query, page);

        self.ctx
            .cached(&key, self.ctx.ttl().search_results, move || async move {
                info!(source = "omdb", query = %query, page, "Searching titles");
                let page_param = page.to_string();
                let params = [("s", query), ("type", "series"), ("page", page_param.as_str())];

                let response = match self.fetch::<OmdbSearchResponse>(&params).await? {
                    Envelope::Found(response) => response,
                    Envelope::NotFound => return Ok(SearchPage::default()),
                };

                let total = response
                    .total_results
                    .as_deref()
                    .and_then(|t| t.parse::<u32>().ok());
                let results: Vec<MediaRecord> = response
                    .search
                    .into_iter()
                    .map(|title| normalize(RawMedia::Omdb(title), false, self.ctx.fallback_image()))
                    .collect();

                Ok(SearchPage {
                    has_next_page: total.is_some_and(|t| (page as usize) * 10 < t as usize),
                    results,
                    total,
                })
            })
            .await
    }

    async fn details(&self, id: &str) -> ApiResult<Option<MediaRecord>> {
        let id = id.trim();
        if id.is_empty() {
            return Ok(None);
        }

        let key = cache_key("omdb_details", id, 1);
        if let Some(record) = self.ctx.lookup::<MediaRecord>(&key).await {
            return Ok(Some(record));
        }

        info!(source = "omdb", imdb_id = %id, "Fetching title details");
        let params = [("i", id), ("plot", "full")];
        let title = match self.fetch::<OmdbTitle>(&params).await? {
            Envelope::Found(title) => title,
            Envelope::NotFound => return Ok(None),
        };

        let record = normalize(RawMedia::Omdb(title), true, self.ctx.fallback_image());
        self.ctx.store(&key, &record, self.ctx.ttl().details).await;
        Ok(Some(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::Config;

    #[test]
    fn test_not_found_messages() {
        assert!(is_not_found("Series not found!"));
        assert!(is_not_found("Movie not found!"));
        assert!(is_not_found("Incorrect IMDb ID."));
        assert!(!is_not_found("Invalid API key!"));
        assert!(!is_not_found("Too many results."));
    }

    #[tokio::test]
    async fn test_missing_api_key() {
        let ctx = ApiContext::from_config(&Config::default()).unwrap();
        let client = OmdbClient::new(ctx, "http://127.0.0.1:9", "");

        let err = client.search("naruto", 1).await.unwrap_err();
        assert!(matches!(err, ApiError::UpstreamData { api: Source::Omdb, .. }));
    }
}
