use std::sync::Arc;

use axum::{
    extract::{Query, RawQuery, State},
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::config::{Category, Config, FeedConfig, Layout};
use crate::error::RelayError;
use crate::fetcher::Fetcher;
use crate::normalizer::Article;

pub struct AppState {
    pub config: Config,
    pub fetcher: Fetcher,
}

pub fn router(state: Arc<AppState>) -> Router {
    let mut app = Router::new()
        .route("/api/rss", get(relay))
        .route("/api/feeds", get(feeds))
        .route("/api/settings", get(settings))
        .route("/health", get(health));

    if let Some(dir) = &state.config.static_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }

    app.layer(TraceLayer::new_for_http()).with_state(state)
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct RelayQuery {
    pub url: Option<String>,
}

impl RelayQuery {
    /// Read `url` from the raw query string. The first occurrence wins and
    /// other keys are ignored, so a repeated `url` still relays.
    pub fn parse(raw: Option<&str>) -> Result<Self, RelayError> {
        let pairs: Vec<(String, String)> =
            serde_urlencoded::from_str(raw.unwrap_or_default()).map_err(|_| RelayError::InvalidUrl)?;

        let url = pairs
            .into_iter()
            .find(|(key, _)| key == "url")
            .map(|(_, value)| value);
        Ok(Self { url })
    }
}

#[derive(Serialize, Deserialize)]
pub struct ArticlesResponse {
    pub articles: Vec<Article>,
}

pub async fn relay(
    State(state): State<Arc<AppState>>,
    RawQuery(query): RawQuery,
) -> Result<Json<ArticlesResponse>, RelayError> {
    let query = RelayQuery::parse(query.as_deref())?;
    let articles = state.fetcher.fetch_articles(query.url.as_deref()).await?;
    Ok(Json(ArticlesResponse { articles }))
}

#[derive(Deserialize)]
pub struct FeedsQuery {
    pub category: Option<Category>,
}

#[derive(Serialize, Deserialize)]
pub struct FeedsResponse {
    pub feeds: Vec<FeedConfig>,
}

pub async fn feeds(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FeedsQuery>,
) -> Json<FeedsResponse> {
    let feeds = state
        .config
        .feeds_in(query.category)
        .into_iter()
        .cloned()
        .collect();
    Json(FeedsResponse { feeds })
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct SettingsResponse {
    pub layout: Layout,
    pub articles_per_feed: u32,
}

pub async fn settings(State(state): State<Arc<AppState>>) -> Json<SettingsResponse> {
    Json(SettingsResponse {
        layout: state.config.layout,
        articles_per_feed: state.config.articles_per_feed,
    })
}

pub async fn health() -> impl IntoResponse {
    Html("OK")
}
