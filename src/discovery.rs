//! Blog discovery pipeline
//!
//! Builds one page of on-topic articles from the remote source:
//!
//! 1. fetch the curated author's page (failure jumps to the static fallback)
//! 2. keep articles that are on-topic by tag or keyword
//! 3. with a query, merge in the tag search for it, dedupe, and re-filter
//! 4. rank by reactions, 5. cap to the page size
//! 6. if nothing is left, sweep the fallback tags in order
//! 7. static fallback: featured article lookup, then the built-in article
//!
//! Every stage is a separate method so each can be exercised on its own.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::devto::ArticleSource;
use crate::error::SourceError;
use crate::models::Article;
use crate::seed;

/// Articles available without the network, looked up by id
pub trait LocalArticles: Send + Sync {
    fn local_article(&self, id: &str) -> Option<Article>;
}

/// Which stage produced a page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "tag", rename_all = "snake_case")]
pub enum Origin {
    Primary,
    TagSweep(String),
    Featured,
    StaticFallback,
    Empty,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Discovery {
    pub articles: Vec<Article>,
    pub origin: Origin,
}

impl Discovery {
    fn empty() -> Self {
        Self {
            articles: Vec::new(),
            origin: Origin::Empty,
        }
    }
}

/// Fixed inputs of the pipeline
#[derive(Debug, Clone)]
pub struct DiscoverySettings {
    pub curated_author: String,
    pub featured_article_id: Option<String>,
    pub allow_tags: Vec<String>,
    pub allow_words: Vec<String>,
    pub fallback_tags: Vec<String>,
}

impl DiscoverySettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            curated_author: config.article_source.curated_author.clone(),
            featured_article_id: config.article_source.featured_article_id.clone(),
            allow_tags: lowercase_all(&config.discovery.allow_tags),
            allow_words: lowercase_all(&config.discovery.allow_words),
            fallback_tags: config.discovery.fallback_tags.clone(),
        }
    }
}

fn lowercase_all(items: &[String]) -> Vec<String> {
    items.iter().map(|s| s.to_lowercase()).collect()
}

pub struct DiscoveryPipeline {
    source: Arc<dyn ArticleSource>,
    local: Option<Arc<dyn LocalArticles>>,
    settings: DiscoverySettings,
}

impl DiscoveryPipeline {
    pub fn new(source: Arc<dyn ArticleSource>, settings: DiscoverySettings) -> Self {
        Self {
            source,
            local: None,
            settings,
        }
    }

    /// Articles consulted when a detail lookup cannot reach the source
    pub fn with_local(mut self, local: Arc<dyn LocalArticles>) -> Self {
        self.local = Some(local);
        self
    }

    /// Run every stage for one page. Never fails: faults degrade to a
    /// fallback page or an empty one.
    pub async fn discover(&self, query: &str, page: u32, page_size: usize) -> Discovery {
        let query = query.trim().to_lowercase();
        let page = page.max(1);

        let primary = match self.fetch_primary(page, page_size).await {
            Ok(articles) => articles,
            Err(e) => {
                warn!("Primary article fetch failed: {}", e);
                return self.static_fallback().await;
            }
        };

        let mut candidates = self.relevance_filter(primary);
        if !query.is_empty() {
            candidates = self.augment(candidates, &query, page, page_size).await;
        }

        rank(&mut candidates);
        candidates.truncate(page_size);

        if !candidates.is_empty() {
            debug!(
                "Discovered {} articles for query '{}' page {}",
                candidates.len(),
                query,
                page
            );
            return Discovery {
                articles: candidates,
                origin: Origin::Primary,
            };
        }

        self.tag_sweep(page, page_size).await
    }

    /// Stage 1: the curated author's page
    pub async fn fetch_primary(
        &self,
        page: u32,
        page_size: usize,
    ) -> Result<Vec<Article>, SourceError> {
        self.source
            .articles_by_author(&self.settings.curated_author, page_size, page)
            .await
    }

    /// Stage 2: keep on-topic articles
    pub fn relevance_filter(&self, articles: Vec<Article>) -> Vec<Article> {
        articles
            .into_iter()
            .filter(|a| is_relevant(a, &self.settings.allow_tags, &self.settings.allow_words))
            .collect()
    }

    /// Stage 3: merge the tag search for `query` (already lowercased).
    /// A failing tag fetch leaves `base` as it was.
    pub async fn augment(
        &self,
        base: Vec<Article>,
        query: &str,
        page: u32,
        page_size: usize,
    ) -> Vec<Article> {
        match self.source.articles_by_tag(query, page_size, page).await {
            Ok(tagged) => merge_unique(base, tagged)
                .into_iter()
                .filter(|a| matches_query(a, query))
                .collect(),
            Err(e) => {
                debug!("Tag search for '{}' failed, keeping author results: {}", query, e);
                base
            }
        }
    }

    /// Stage 6: first fallback tag with any articles wins
    pub async fn tag_sweep(&self, page: u32, page_size: usize) -> Discovery {
        for tag in &self.settings.fallback_tags {
            match self.source.articles_by_tag(tag, page_size, page).await {
                Ok(mut articles) if !articles.is_empty() => {
                    info!("Fallback sweep found {} articles under '{}'", articles.len(), tag);
                    rank(&mut articles);
                    return Discovery {
                        articles,
                        origin: Origin::TagSweep(tag.clone()),
                    };
                }
                Ok(_) => debug!("Fallback tag '{}' is empty", tag),
                Err(e) => warn!("Fallback tag '{}' failed: {}", tag, e),
            }
        }

        Discovery::empty()
    }

    /// Stage 7: featured article if configured and reachable, else the built-in one
    pub async fn static_fallback(&self) -> Discovery {
        if let Some(id) = &self.settings.featured_article_id {
            match self.source.article_by_id(id).await {
                Ok(article) => {
                    return Discovery {
                        articles: vec![article],
                        origin: Origin::Featured,
                    }
                }
                Err(e) => warn!("Featured article {} unavailable: {}", id, e),
            }
        }

        info!("Serving static fallback article");
        Discovery {
            articles: vec![seed::static_article()],
            origin: Origin::StaticFallback,
        }
    }

    /// Single article for the detail view; falls back to local content by id
    pub async fn article(&self, id: &str) -> Option<Article> {
        match self.source.article_by_id(id).await {
            Ok(article) => Some(article),
            Err(e) => {
                if !e.is_not_found() {
                    warn!("Article {} fetch failed: {}", id, e);
                }
                self.local.as_ref().and_then(|local| local.local_article(id))
            }
        }
    }
}

/// On-topic when any tag is allow-listed or title/excerpt contains an allow-listed word.
/// Both lists are expected lowercased.
pub fn is_relevant(article: &Article, allow_tags: &[String], allow_words: &[String]) -> bool {
    let by_tag = allow_tags.iter().any(|t| article.has_tag(t));
    if by_tag {
        return true;
    }

    let title = article.title.to_lowercase();
    let excerpt = article.excerpt.to_lowercase();
    allow_words
        .iter()
        .any(|w| title.contains(w.as_str()) || excerpt.contains(w.as_str()))
}

/// Title, excerpt or any tag contains the (lowercased) query
pub fn matches_query(article: &Article, query: &str) -> bool {
    article.title.to_lowercase().contains(query)
        || article.excerpt.to_lowercase().contains(query)
        || article.tags.iter().any(|t| t.to_lowercase().contains(query))
}

/// `first` then `second`, keeping the first occurrence of each id
pub fn merge_unique(first: Vec<Article>, second: Vec<Article>) -> Vec<Article> {
    let mut seen = HashSet::new();
    first
        .into_iter()
        .chain(second)
        .filter(|a| seen.insert(a.id.clone()))
        .collect()
}

/// Stable sort by reactions, most liked first
pub fn rank(articles: &mut [Article]) {
    articles.sort_by(|a, b| b.likes.cmp(&a.likes));
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use parking_lot::Mutex;
    use std::collections::HashMap;

    pub fn article(id: &str, title: &str, tags: &[&str], likes: u32) -> Article {
        Article {
            id: id.to_string(),
            title: title.to_string(),
            excerpt: String::new(),
            author: "tester".to_string(),
            author_avatar: String::new(),
            published_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            likes,
            comments: 0,
            thumbnail: None,
            body_html: None,
        }
    }

    /// Scripted source; unscripted tags come back empty
    #[derive(Default)]
    pub struct FakeSource {
        pub author: Option<Vec<Article>>,
        pub tags: HashMap<String, Option<Vec<Article>>>,
        pub by_id: HashMap<String, Article>,
        pub calls: Mutex<Vec<String>>,
    }

    impl FakeSource {
        pub fn with_author(articles: Vec<Article>) -> Self {
            Self {
                author: Some(articles),
                ..Default::default()
            }
        }

        pub fn tag(mut self, tag: &str, articles: Option<Vec<Article>>) -> Self {
            self.tags.insert(tag.to_string(), articles);
            self
        }
    }

    #[async_trait]
    impl ArticleSource for FakeSource {
        async fn articles_by_author(
            &self,
            username: &str,
            _per_page: usize,
            _page: u32,
        ) -> Result<Vec<Article>, SourceError> {
            self.calls.lock().push(format!("author:{}", username));
            self.author
                .clone()
                .ok_or_else(|| SourceError::Transport("connection refused".to_string()))
        }

        async fn article_by_id(&self, id: &str) -> Result<Article, SourceError> {
            self.calls.lock().push(format!("id:{}", id));
            if self.author.is_none() {
                return Err(SourceError::Transport("connection refused".to_string()));
            }
            self.by_id.get(id).cloned().ok_or(SourceError::NotFound)
        }

        async fn articles_by_tag(
            &self,
            tag: &str,
            _per_page: usize,
            _page: u32,
        ) -> Result<Vec<Article>, SourceError> {
            self.calls.lock().push(format!("tag:{}", tag));
            match self.tags.get(tag) {
                Some(Some(articles)) => Ok(articles.clone()),
                Some(None) => Err(SourceError::Status(500)),
                None => Ok(Vec::new()),
            }
        }
    }

    pub fn settings() -> DiscoverySettings {
        DiscoverySettings::from_config(&Config::default())
    }

    fn pipeline(source: Arc<FakeSource>, settings: DiscoverySettings) -> DiscoveryPipeline {
        DiscoveryPipeline::new(source, settings)
    }

    fn ids(articles: &[Article]) -> Vec<&str> {
        articles.iter().map(|a| a.id.as_str()).collect()
    }

    #[test]
    fn test_relevance_by_tag_or_keyword() {
        let s = settings();
        let on_tag = article("1", "Weekly notes", &["AppSec"], 0);
        let on_word = article("2", "My first Bug Bounty payout", &["career"], 0);
        let off = article("3", "Sourdough at home", &["cooking"], 0);

        assert!(is_relevant(&on_tag, &s.allow_tags, &s.allow_words));
        assert!(is_relevant(&on_word, &s.allow_tags, &s.allow_words));
        assert!(!is_relevant(&off, &s.allow_tags, &s.allow_words));
    }

    #[test]
    fn test_merge_keeps_first_occurrence() {
        let primary = vec![article("1", "a", &[], 1), article("2", "primary", &[], 2)];
        let secondary = vec![article("2", "secondary", &[], 9), article("3", "c", &[], 3)];

        let merged = merge_unique(primary, secondary);
        assert_eq!(ids(&merged), vec!["1", "2", "3"]);
        assert_eq!(merged[1].title, "primary");
    }

    #[test]
    fn test_rank_is_stable() {
        let mut articles = vec![
            article("a", "", &[], 5),
            article("b", "", &[], 9),
            article("c", "", &[], 5),
        ];
        rank(&mut articles);
        assert_eq!(ids(&articles), vec!["b", "a", "c"]);
    }

    #[tokio::test]
    async fn test_primary_filtered_and_ranked() {
        let source = Arc::new(FakeSource::with_author(vec![
            article("1", "XSS in the wild", &["webdev"], 10),
            article("2", "Sourdough", &["cooking"], 99),
            article("3", "Recon tips", &["security"], 30),
        ]));
        let result = pipeline(source, settings()).discover("", 1, 15).await;

        assert_eq!(result.origin, Origin::Primary);
        assert_eq!(ids(&result.articles), vec!["3", "1"]);
    }

    #[tokio::test]
    async fn test_query_augmentation_dedupes() {
        let source = Arc::new(
            FakeSource::with_author(vec![
                article("1", "xss basics", &["security"], 1),
                article("2", "xss filters", &["security"], 2),
            ])
            .tag(
                "xss",
                Some(vec![
                    article("2", "xss filters (dup)", &["xss"], 50),
                    article("3", "stored xss", &["xss"], 3),
                ]),
            ),
        );
        let result = pipeline(source, settings()).discover("  XSS ", 1, 15).await;

        let mut got: Vec<&str> = ids(&result.articles);
        got.sort();
        assert_eq!(got, vec!["1", "2", "3"]);
        // first occurrence of "2" (likes 2) survived
        let dup = result.articles.iter().find(|a| a.id == "2").unwrap();
        assert_eq!(dup.likes, 2);
        assert_eq!(ids(&result.articles), vec!["3", "2", "1"]);
    }

    #[tokio::test]
    async fn test_query_refilters_combined_set() {
        let source = Arc::new(
            FakeSource::with_author(vec![
                article("1", "SQL injection primer", &["security"], 1),
                article("2", "Recon tips", &["security"], 2),
            ])
            .tag("sql", Some(vec![article("3", "Postgres tuning", &["sql"], 4)])),
        );
        let result = pipeline(source, settings()).discover("sql", 1, 15).await;
        assert_eq!(ids(&result.articles), vec!["3", "1"]);
    }

    #[tokio::test]
    async fn test_augmentation_failure_is_swallowed() {
        let source = Arc::new(
            FakeSource::with_author(vec![
                article("1", "Recon tips", &["security"], 1),
                article("2", "Fuzzing 101", &["security"], 2),
            ])
            .tag("ssrf", None),
        );
        let result = pipeline(source, settings()).discover("ssrf", 1, 15).await;

        assert_eq!(result.origin, Origin::Primary);
        assert_eq!(ids(&result.articles), vec!["2", "1"]);
    }

    #[tokio::test]
    async fn test_page_cap() {
        let many: Vec<Article> = (0..20)
            .map(|i| article(&i.to_string(), "ctf notes", &["ctf"], i))
            .collect();
        let source = Arc::new(FakeSource::with_author(many));
        let result = pipeline(source, settings()).discover("", 2, 15).await;

        assert_eq!(result.articles.len(), 15);
        assert_eq!(result.articles[0].likes, 19);
    }

    #[tokio::test]
    async fn test_transport_failure_serves_static_article() {
        let source = Arc::new(FakeSource::default());
        let result = pipeline(source, settings()).discover("", 1, 15).await;

        assert_eq!(result.origin, Origin::StaticFallback);
        assert_eq!(result.articles, vec![seed::static_article()]);
    }

    #[tokio::test]
    async fn test_featured_lookup_tried_before_static() {
        let source = Arc::new(FakeSource::default());
        let mut s = settings();
        s.featured_article_id = Some("42".to_string());

        let result = pipeline(source.clone(), s).discover("", 1, 15).await;
        assert_eq!(result.origin, Origin::StaticFallback);
        assert_eq!(
            *source.calls.lock(),
            vec!["author:luaxd777".to_string(), "id:42".to_string()]
        );
    }

    #[tokio::test]
    async fn test_tag_sweep_stops_at_first_hit() {
        let source = Arc::new(
            FakeSource::with_author(vec![article("0", "Sourdough", &["cooking"], 1)])
                .tag("cybersecurity", Some(Vec::new()))
                .tag("security", Some(Vec::new()))
                .tag(
                    "bug-bounty",
                    Some(vec![
                        article("a", "one", &["bug-bounty"], 3),
                        article("b", "two", &["bug-bounty"], 8),
                        article("c", "three", &["bug-bounty"], 5),
                    ]),
                )
                .tag("bugbounty", Some(vec![article("z", "never", &[], 100)])),
        );
        let mut s = settings();
        s.fallback_tags = vec![
            "cybersecurity".to_string(),
            "security".to_string(),
            "bug-bounty".to_string(),
            "bugbounty".to_string(),
        ];

        let result = pipeline(source.clone(), s).discover("", 1, 15).await;

        assert_eq!(result.origin, Origin::TagSweep("bug-bounty".to_string()));
        assert_eq!(ids(&result.articles), vec!["b", "c", "a"]);
        assert!(!source.calls.lock().contains(&"tag:bugbounty".to_string()));
    }

    #[tokio::test]
    async fn test_tag_sweep_exhausted_is_empty() {
        let source = Arc::new(FakeSource::with_author(Vec::new()).tag("security", None));
        let result = pipeline(source, settings()).discover("", 1, 15).await;

        assert_eq!(result.origin, Origin::Empty);
        assert!(result.articles.is_empty());
    }

    struct OneLocal(Article);

    impl LocalArticles for OneLocal {
        fn local_article(&self, id: &str) -> Option<Article> {
            (self.0.id == id).then(|| self.0.clone())
        }
    }

    #[tokio::test]
    async fn test_article_detail_falls_back_to_local() {
        let local = article("2", "Local copy", &[], 0);
        let source = Arc::new(FakeSource::default());
        let p = pipeline(source, settings()).with_local(Arc::new(OneLocal(local.clone())));

        assert_eq!(p.article("2").await, Some(local));
        assert_eq!(p.article("404").await, None);
    }

    #[tokio::test]
    async fn test_article_detail_prefers_remote() {
        let remote = article("5", "Remote", &[], 0);
        let mut source = FakeSource::with_author(Vec::new());
        source.by_id.insert("5".to_string(), remote.clone());
        let p = pipeline(Arc::new(source), settings());

        assert_eq!(p.article("5").await, Some(remote));
    }
}
