//! Helpers for running the clients against a wiremock server.
#![allow(dead_code)]

use shared::Config;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Default config with every endpoint pointed at `server`
pub fn config_for(server: &MockServer) -> Config {
    let mut config = Config::default();
    config.sources.anilist.endpoint = format!("{}/graphql", server.uri());
    config.sources.jikan.endpoint = format!("{}/v4", server.uri());
    config.sources.omdb.endpoint = format!("{}/omdb", server.uri());
    config
}

/// JSON response with the given status
pub fn json(status: u16, body: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_raw(body.to_string(), "application/json")
}

/// Answer every GET to `route` with `body`
pub async fn mount_get(server: &MockServer, route: &str, status: u16, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(json(status, body))
        .mount(server)
        .await;
}

/// Number of requests the server received for `route`
pub async fn hits(server: &MockServer, route: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path() == route)
        .count()
}
