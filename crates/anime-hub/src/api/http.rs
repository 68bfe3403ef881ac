//! Request plumbing shared by every source adapter.
//!
//! An [`ApiContext`] owns the HTTP client and handles to the shared cache and
//! request budget. Adapters check the cache, then the budget, then go to the
//! network; every outcome is mapped onto [`ApiError`].

use super::rate_limiter::RequestBudget;
use super::types::JikanError;
use crate::cache::{CacheTtl, TtlCache};
use crate::error::{ApiError, ApiResult};
use anyhow::{Context, Result};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use shared::{Config, Source};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

pub type SharedCache = Arc<Mutex<TtlCache>>;
pub type SharedBudget = Arc<Mutex<RequestBudget>>;

/// HTTP client plus the state every adapter shares
#[derive(Debug, Clone)]
pub struct ApiContext {
    client: Client,
    cache: SharedCache,
    budget: SharedBudget,
    ttl: CacheTtl,
    fallback_image: Arc<str>,
}

impl ApiContext {
    /// Create a context around existing cache and budget handles
    pub fn new(
        client: Client,
        cache: SharedCache,
        budget: SharedBudget,
        ttl: CacheTtl,
        fallback_image: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            client,
            cache,
            budget,
            ttl,
            fallback_image: fallback_image.into(),
        }
    }

    /// Build the HTTP client, cache and budget described by `config`
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.sources.timeout_seconds))
            .user_agent(config.sources.user_agent.as_str())
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self::new(
            client,
            Arc::new(Mutex::new(TtlCache::new(config.cache.max_entries))),
            Arc::new(Mutex::new(RequestBudget::from_config(config))),
            CacheTtl::from(&config.cache),
            config.defaults.fallback_image.as_str(),
        ))
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn cache(&self) -> &SharedCache {
        &self.cache
    }

    pub fn budget(&self) -> &SharedBudget {
        &self.budget
    }

    pub fn ttl(&self) -> &CacheTtl {
        &self.ttl
    }

    pub fn fallback_image(&self) -> &str {
        &self.fallback_image
    }

    /// Look up a cached value
    pub async fn lookup<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.cache.lock().await.get(key)
    }

    /// Store a value with the given time-to-live
    pub async fn store<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        self.cache.lock().await.set(key, value, ttl);
    }

    /// Return the cached value for `key`, or run `fetch` and cache its success
    pub async fn cached<T, F, Fut>(&self, key: &str, ttl: Duration, fetch: F) -> ApiResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = ApiResult<T>>,
    {
        if let Some(hit) = self.lookup::<T>(key).await {
            return Ok(hit);
        }

        let value = fetch().await?;
        self.store(key, &value, ttl).await;
        Ok(value)
    }

    /// Send a request after charging it to `source`'s budget and decode a JSON body
    ///
    /// Waits out the minimum gap since the previous request to the same source.
    ///
    /// Returns `Ok(None)` for HTTP 404 so callers can treat it as "not found".
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        source: Source,
        request: RequestBuilder,
    ) -> ApiResult<Option<T>> {
        let wait = self.budget.lock().await.try_acquire(source)?;
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }

        let response = request.send().await.map_err(|error| {
            warn!(source = %source, error = %error, "Request error");
            ApiError::Transport { api: source, error }
        })?;

        let status = response.status();
        let url = response.url().clone();
        debug!(source = %source, url = %url, status = %status, "Received response");

        if status == StatusCode::NOT_FOUND {
            debug!(source = %source, url = %url, "Resource not found");
            return Ok(None);
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!(source = %source, url = %url, "Rate limited by server");
            return Err(ApiError::RateLimitExceeded { api: source });
        }

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let body = error_message(&error_text);

            warn!(
                source = %source,
                url = %url,
                status = %status,
                error = %body,
                "Request failed"
            );

            return Err(ApiError::UpstreamHttp {
                api: source,
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|error| ApiError::Transport { api: source, error })?;

        serde_json::from_slice(&bytes).map(Some).map_err(|e| {
            warn!(source = %source, url = %url, error = %e, "Failed to parse response");
            ApiError::data(source, format!("Failed to parse response: {}", e))
        })
    }
}

/// Pull the human-readable message out of a JSON error body, if there is one
fn error_message(body: &str) -> String {
    match serde_json::from_str::<JikanError>(body) {
        Ok(JikanError {
            message: Some(message),
            ..
        }) => message,
        _ => body.trim().to_string(),
    }
}
