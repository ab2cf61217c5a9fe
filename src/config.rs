use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::info;

pub const MAX_ARTICLES_PER_FEED: u32 = 20;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Upper bound on a single upstream fetch, in seconds
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Directory holding the dashboard's static assets
    #[serde(default)]
    pub static_dir: Option<PathBuf>,
    #[serde(default)]
    pub layout: Layout,
    #[serde(default = "default_articles_per_feed")]
    pub articles_per_feed: u32,
    #[serde(default = "default_feeds")]
    pub feeds: Vec<FeedConfig>,
}

fn default_listen_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_fetch_timeout() -> u64 {
    10
}

fn default_user_agent() -> String {
    "MorningDashboard/1.0 (RSS Relay)".to_string()
}

fn default_articles_per_feed() -> u32 {
    5
}

fn default_feeds() -> Vec<FeedConfig> {
    [
        (
            "New York Times",
            "https://rss.nytimes.com/services/xml/rss/nyt/HomePage.xml",
            Category::News,
        ),
        (
            "The Guardian",
            "https://feeds.theguardian.com/theguardian/world/rss",
            Category::News,
        ),
        (
            "Facebook Engineering",
            "https://engineering.fb.com/feed/",
            Category::Tech,
        ),
        ("Cloudflare Blog", "https://blog.cloudflare.com/rss/", Category::Tech),
        ("Stack Overflow Blog", "https://stackoverflow.blog/feed/", Category::Tech),
    ]
    .into_iter()
    .map(|(name, url, category)| FeedConfig {
        id: String::new(),
        name: name.to_string(),
        url: url.to_string(),
        category,
    })
    .collect()
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct FeedConfig {
    /// Derived from the name when omitted
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub category: Category,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[default]
    News,
    Tech,
    Other,
}

/// Dashboard grid arrangement.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum Layout {
    #[default]
    #[serde(rename = "3x2")]
    ThreeByTwo,
    #[serde(rename = "2x4")]
    TwoByFour,
    #[serde(rename = "1x6")]
    OneBySix,
}

impl Default for Config {
    fn default() -> Self {
        let mut config = Self {
            listen_addr: default_listen_addr(),
            fetch_timeout_secs: default_fetch_timeout(),
            user_agent: default_user_agent(),
            static_dir: None,
            layout: Layout::default(),
            articles_per_feed: default_articles_per_feed(),
            feeds: default_feeds(),
        };
        config.assign_feed_ids();
        config
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_str(&content)
    }

    /// Load the file when it exists, otherwise fall back to built-in defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            info!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let mut config: Config = toml::from_str(content)?;
        config.assign_feed_ids();
        config.validate()?;
        Ok(config)
    }

    fn assign_feed_ids(&mut self) {
        let mut taken: HashSet<String> = self
            .feeds
            .iter()
            .filter(|f| !f.id.is_empty())
            .map(|f| f.id.clone())
            .collect();

        for (index, feed) in self.feeds.iter_mut().enumerate() {
            if !feed.id.is_empty() {
                continue;
            }
            let base = match slugify(&feed.name) {
                slug if slug.is_empty() => format!("feed-{}", index + 1),
                slug => slug,
            };
            let mut id = base.clone();
            let mut suffix = 2;
            while taken.contains(&id) {
                id = format!("{}-{}", base, suffix);
                suffix += 1;
            }
            taken.insert(id.clone());
            feed.id = id;
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.fetch_timeout_secs == 0 {
            bail!("fetch_timeout_secs must be positive");
        }
        if !(1..=MAX_ARTICLES_PER_FEED).contains(&self.articles_per_feed) {
            bail!(
                "articles_per_feed must be between 1 and {}, got {}",
                MAX_ARTICLES_PER_FEED,
                self.articles_per_feed
            );
        }

        let mut ids = HashSet::new();
        for feed in &self.feeds {
            if feed.name.trim().is_empty() {
                bail!("Feed name is required (url: {})", feed.url);
            }
            if !is_http_url(&feed.url) {
                bail!("Feed '{}' has an invalid URL: {}", feed.name, feed.url);
            }
            if !ids.insert(feed.id.as_str()) {
                bail!("Duplicate feed id: {}", feed.id);
            }
        }

        Ok(())
    }

    pub fn feeds_in(&self, category: Option<Category>) -> Vec<&FeedConfig> {
        self.feeds
            .iter()
            .filter(|f| category.map_or(true, |c| f.category == c))
            .collect()
    }
}

pub fn is_http_url(raw: &str) -> bool {
    Url::parse(raw)
        .map(|url| matches!(url.scheme(), "http" | "https") && url.has_host())
        .unwrap_or(false)
}

fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}
