use std::time::Duration;

use reqwest::{Client, Url};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::RelayError;
use crate::normalizer::{self, Article, NormalizeError};

/// Fetches remote feeds on behalf of the dashboard and normalizes them.
/// Holds nothing but a pooled HTTP client, so one instance serves any
/// number of concurrent requests.
pub struct Fetcher {
    client: Client,
    timeout: Duration,
}

impl Fetcher {
    pub fn new(config: &Config) -> reqwest::Result<Self> {
        let timeout = Duration::from_secs(config.fetch_timeout_secs);
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(Self { client, timeout })
    }

    /// Validate the raw `url` query value: present, non-empty, absolute http(s).
    pub fn parse_feed_url(raw: Option<&str>) -> Result<Url, RelayError> {
        let raw = raw.filter(|s| !s.is_empty()).ok_or(RelayError::MissingUrl)?;
        let url = Url::parse(raw).map_err(|_| RelayError::InvalidUrl)?;

        match url.scheme() {
            "http" | "https" if url.has_host() => Ok(url),
            _ => Err(RelayError::InvalidUrl),
        }
    }

    pub async fn fetch_articles(&self, raw_url: Option<&str>) -> Result<Vec<Article>, RelayError> {
        let url = Self::parse_feed_url(raw_url)?;
        info!("Fetching feed: {}", url);

        let body = self.fetch_body(&url).await?;

        match normalizer::normalize(&body) {
            Ok(articles) => {
                info!("Normalized {} articles from {}", articles.len(), url);
                Ok(articles)
            }
            Err(NormalizeError::UnrecognizedFormat) => {
                warn!("No RSS channel or Atom feed root in {}", url);
                Err(RelayError::InvalidFormat)
            }
            Err(e) => {
                error!("Error parsing RSS feed {}: {}", url, e);
                Err(RelayError::Internal)
            }
        }
    }

    async fn fetch_body(&self, url: &Url) -> Result<String, RelayError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| self.transport_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            warn!("Feed {} returned {}", url, status);
            // reqwest does not expose the upstream reason phrase, only the
            // status code, so the canonical text stands in for it.
            return Err(RelayError::UpstreamStatus {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Unknown status").to_string(),
            });
        }

        response.text().await.map_err(|e| self.transport_error(url, e))
    }

    fn transport_error(&self, url: &Url, err: reqwest::Error) -> RelayError {
        warn!("Failed to fetch feed {}: {}", url, err);
        if err.is_timeout() {
            RelayError::Upstream(format!("request timed out after {}s", self.timeout.as_secs()))
        } else if err.is_connect() {
            RelayError::Upstream("could not connect to feed host".to_string())
        } else {
            RelayError::Upstream(err.without_url().to_string())
        }
    }
}
