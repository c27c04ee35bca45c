//! DEV.to article API client
//!
//! Read-only, paginated JSON API with three query shapes: articles by
//! author, a single article by id, and articles by tag. The pipeline talks
//! to it through the `ArticleSource` trait so tests can swap in fakes.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::ArticleSourceConfig;
use crate::error::SourceError;
use crate::models::Article;

const USER_AGENT: &str = concat!("vidya-catalog/", env!("CARGO_PKG_VERSION"));

/// Remote article source
#[async_trait]
pub trait ArticleSource: Send + Sync {
    async fn articles_by_author(
        &self,
        username: &str,
        per_page: usize,
        page: u32,
    ) -> Result<Vec<Article>, SourceError>;

    async fn article_by_id(&self, id: &str) -> Result<Article, SourceError>;

    async fn articles_by_tag(
        &self,
        tag: &str,
        per_page: usize,
        page: u32,
    ) -> Result<Vec<Article>, SourceError>;
}

// ============================================================================
// WIRE TYPES
// ============================================================================

/// Tag list as delivered: listings send an array, detail sends a comma-joined string
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagList {
    List(Vec<String>),
    Joined(String),
}

impl Default for TagList {
    fn default() -> Self {
        Self::List(Vec::new())
    }
}

impl TagList {
    pub fn normalize(self) -> Vec<String> {
        match self {
            Self::List(tags) => tags
                .into_iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
            Self::Joined(joined) => joined
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DevtoUser {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub profile_image: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevtoArticle {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub published_at: DateTime<Utc>,
    #[serde(default)]
    pub cover_image: Option<String>,
    #[serde(default)]
    pub tag_list: TagList,
    #[serde(default)]
    pub public_reactions_count: Option<u32>,
    #[serde(default)]
    pub comments_count: Option<u32>,
    #[serde(default)]
    pub user: Option<DevtoUser>,
    #[serde(default)]
    pub body_html: Option<String>,
}

impl From<DevtoArticle> for Article {
    fn from(a: DevtoArticle) -> Self {
        let user = a.user.unwrap_or_default();
        Self {
            id: a.id.to_string(),
            title: a.title,
            excerpt: a.description.unwrap_or_default(),
            author: user.name.unwrap_or_else(|| "Unknown".to_string()),
            author_avatar: user.profile_image.unwrap_or_default(),
            published_at: a.published_at,
            tags: a.tag_list.normalize(),
            likes: a.public_reactions_count.unwrap_or(0),
            comments: a.comments_count.unwrap_or(0),
            thumbnail: a.cover_image,
            body_html: a.body_html,
        }
    }
}

// ============================================================================
// CLIENT
// ============================================================================

pub struct DevtoClient {
    client: reqwest::Client,
    base_url: String,
}

impl DevtoClient {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &ArticleSourceConfig) -> Self {
        Self::new(&config.base_url, Duration::from_secs(config.timeout_secs))
    }

    fn listing_url(&self, key: &str, value: &str, per_page: usize, page: u32) -> String {
        format!(
            "{}/articles?{}={}&per_page={}&page={}",
            self.base_url,
            key,
            urlencoding::encode(value),
            per_page,
            page
        )
    }

    async fn fetch_listing(&self, url: &str) -> Result<Vec<Article>, SourceError> {
        debug!("Fetching articles: {}", url);

        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            warn!("Article API error {} for {}", status, url);
            return Err(SourceError::Status(status.as_u16()));
        }

        let articles: Vec<DevtoArticle> = response
            .json()
            .await
            .map_err(|e| SourceError::Decode(e.to_string()))?;

        debug!("Fetched {} articles", articles.len());
        Ok(articles.into_iter().map(Article::from).collect())
    }
}

#[async_trait]
impl ArticleSource for DevtoClient {
    async fn articles_by_author(
        &self,
        username: &str,
        per_page: usize,
        page: u32,
    ) -> Result<Vec<Article>, SourceError> {
        let url = self.listing_url("username", username, per_page, page);
        self.fetch_listing(&url).await
    }

    async fn article_by_id(&self, id: &str) -> Result<Article, SourceError> {
        let url = format!("{}/articles/{}", self.base_url, urlencoding::encode(id));
        debug!("Fetching article: {}", url);

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 404 {
            return Err(SourceError::NotFound);
        }
        if !status.is_success() {
            warn!("Article API error {} for {}", status, url);
            return Err(SourceError::Status(status.as_u16()));
        }

        let article: DevtoArticle = response
            .json()
            .await
            .map_err(|e| SourceError::Decode(e.to_string()))?;
        Ok(article.into())
    }

    async fn articles_by_tag(
        &self,
        tag: &str,
        per_page: usize,
        page: u32,
    ) -> Result<Vec<Article>, SourceError> {
        let url = self.listing_url("tag", tag, per_page, page);
        self.fetch_listing(&url).await
    }
}
