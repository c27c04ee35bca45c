//! Discovery session
//!
//! Owns the query window of one blog list view: raw input, debounced query,
//! and page. Changes trigger pipeline refreshes, and each refresh takes a
//! liveness token so only the latest request may publish its result.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::debounce::Debouncer;
use crate::discovery::{DiscoveryPipeline, Origin};
use crate::models::Article;

// ============================================================================
// LIVENESS
// ============================================================================

/// Generation counter. A token is current until a newer one is issued or
/// the counter is invalidated.
#[derive(Debug, Clone, Default)]
pub struct Liveness(Arc<AtomicU64>);

#[derive(Debug, Clone)]
pub struct LivenessToken {
    counter: Arc<AtomicU64>,
    generation: u64,
}

impl Liveness {
    pub fn begin(&self) -> LivenessToken {
        let generation = self.0.fetch_add(1, Ordering::SeqCst) + 1;
        LivenessToken {
            counter: self.0.clone(),
            generation,
        }
    }

    /// Make every outstanding token stale
    pub fn invalidate(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

impl LivenessToken {
    pub fn is_current(&self) -> bool {
        self.counter.load(Ordering::SeqCst) == self.generation
    }
}

// ============================================================================
// QUERY WINDOW
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryWindow {
    /// Text as typed
    pub raw: String,
    /// Trimmed text the last debounce settled on
    pub debounced: String,
    pub page: u32,
}

impl Default for QueryWindow {
    fn default() -> Self {
        Self {
            raw: String::new(),
            debounced: String::new(),
            page: 1,
        }
    }
}

impl QueryWindow {
    /// Restore from `q=<text>&page=<n>`; a leading `?` is allowed.
    /// The restored query is already settled, no debounce applies.
    pub fn from_location_query(location: &str) -> Self {
        let mut window = Self::default();

        for pair in location.trim_start_matches('?').split('&') {
            let Some((key, value)) = pair.split_once('=') else {
                continue;
            };
            let value = value.replace('+', " ");
            let value = urlencoding::decode(&value)
                .map(|v| v.into_owned())
                .unwrap_or(value);

            match key {
                "q" => {
                    window.debounced = value.trim().to_string();
                    window.raw = value;
                }
                "page" => window.page = parse_page(&value),
                _ => {}
            }
        }

        window
    }

    /// Window for an already settled query, as a request carries it
    pub fn settled(query: &str, page: u32) -> Self {
        Self {
            raw: query.to_string(),
            debounced: query.trim().to_string(),
            page: page.max(1),
        }
    }

    pub fn to_location_query(&self) -> String {
        if self.raw.is_empty() {
            format!("page={}", self.page)
        } else {
            format!("q={}&page={}", urlencoding::encode(&self.raw), self.page)
        }
    }
}

/// Page number from text; anything unparsable or below 1 is page 1
pub fn parse_page(value: &str) -> u32 {
    value
        .trim()
        .parse::<i64>()
        .ok()
        .map(|p| p.clamp(1, u32::MAX as i64) as u32)
        .unwrap_or(1)
}

// ============================================================================
// SESSION
// ============================================================================

/// What the list view renders
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiscoveryView {
    pub query: String,
    pub page: u32,
    pub articles: Vec<Article>,
    pub loading: bool,
    pub origin: Option<Origin>,
}

struct SessionState {
    pipeline: Arc<DiscoveryPipeline>,
    page_size: usize,
    window: Mutex<QueryWindow>,
    liveness: Liveness,
    view: watch::Sender<DiscoveryView>,
}

pub struct DiscoverySession {
    state: Arc<SessionState>,
    debouncer: Debouncer,
}

impl DiscoverySession {
    pub fn new(
        pipeline: Arc<DiscoveryPipeline>,
        page_size: usize,
        debounce: Duration,
        window: QueryWindow,
    ) -> Self {
        let (view, _) = watch::channel(DiscoveryView::default());
        Self {
            state: Arc::new(SessionState {
                pipeline,
                page_size,
                window: Mutex::new(window),
                liveness: Liveness::default(),
                view,
            }),
            debouncer: Debouncer::new(debounce),
        }
    }

    /// Initial load for the restored window
    pub fn start(&self) -> JoinHandle<()> {
        refresh(&self.state)
    }

    /// Record typed text; the debounced query follows after the quiet period
    pub fn input(&self, text: &str) {
        self.state.window.lock().raw = text.to_string();

        let state = self.state.clone();
        self.debouncer.schedule(move || {
            {
                let mut window = state.window.lock();
                window.debounced = window.raw.trim().to_string();
                window.page = 1;
            }
            refresh(&state);
        });
    }

    pub fn set_page(&self, page: u32) -> JoinHandle<()> {
        self.state.window.lock().page = page.max(1);
        refresh(&self.state)
    }

    pub fn next_page(&self) -> JoinHandle<()> {
        let page = self.state.window.lock().page.saturating_add(1);
        self.set_page(page)
    }

    pub fn previous_page(&self) -> JoinHandle<()> {
        let page = self.state.window.lock().page.saturating_sub(1);
        self.set_page(page)
    }

    pub fn window(&self) -> QueryWindow {
        self.state.window.lock().clone()
    }

    pub fn to_location_query(&self) -> String {
        self.state.window.lock().to_location_query()
    }

    pub fn view(&self) -> DiscoveryView {
        self.state.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DiscoveryView> {
        self.state.view.subscribe()
    }

    /// Current page narrowed by the raw input (title or tag), as the list shows it
    pub fn visible_articles(&self) -> Vec<Article> {
        let raw = self.state.window.lock().raw.to_lowercase();
        self.state
            .view
            .borrow()
            .articles
            .iter()
            .filter(|a| {
                a.title.to_lowercase().contains(&raw)
                    || a.tags.iter().any(|t| t.to_lowercase().contains(&raw))
            })
            .cloned()
            .collect()
    }
}

impl Drop for DiscoverySession {
    fn drop(&mut self) {
        self.state.liveness.invalidate();
    }
}

fn refresh(state: &Arc<SessionState>) -> JoinHandle<()> {
    let token = state.liveness.begin();
    let (query, page) = {
        let window = state.window.lock();
        (window.debounced.clone(), window.page)
    };
    state.view.send_modify(|view| view.loading = true);

    let state = state.clone();
    tokio::spawn(async move {
        let result = state
            .pipeline
            .discover(&query, page, state.page_size)
            .await;

        if !token.is_current() {
            debug!("Discarding stale result for '{}' page {}", query, page);
            return;
        }

        state.view.send_replace(DiscoveryView {
            query,
            page,
            articles: result.articles,
            loading: false,
            origin: Some(result.origin),
        });
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devto::ArticleSource;
    use crate::discovery::tests::{article, settings, FakeSource};
    use crate::error::SourceError;
    use async_trait::async_trait;
    use tokio::time::sleep;

    fn session(source: Arc<dyn ArticleSource>, window: QueryWindow) -> DiscoverySession {
        let pipeline = Arc::new(DiscoveryPipeline::new(source, settings()));
        DiscoverySession::new(pipeline, 15, Duration::from_millis(300), window)
    }

    #[test]
    fn test_liveness_tokens() {
        let liveness = Liveness::default();
        let first = liveness.begin();
        assert!(first.is_current());

        let second = liveness.begin();
        assert!(!first.is_current());
        assert!(second.is_current());

        liveness.invalidate();
        assert!(!second.is_current());
    }

    #[test]
    fn test_location_query_round_trip() {
        let window = QueryWindow {
            raw: "sql injection".to_string(),
            debounced: "sql injection".to_string(),
            page: 3,
        };
        let encoded = window.to_location_query();
        assert_eq!(encoded, "q=sql%20injection&page=3");
        assert_eq!(QueryWindow::from_location_query(&encoded), window);
    }

    #[test]
    fn test_location_query_defaults() {
        let empty = QueryWindow::default();
        assert_eq!(empty.to_location_query(), "page=1");

        let window = QueryWindow::from_location_query("?q=xss+filters&page=-4");
        assert_eq!(window.raw, "xss filters");
        assert_eq!(window.page, 1);

        let window = QueryWindow::from_location_query("page=banana&utm=1");
        assert_eq!(window.page, 1);
        assert_eq!(window.raw, "");

        assert_eq!(parse_page(" 7 "), 7);
        assert_eq!(parse_page("2&q=ctf"), 1);
        assert_eq!(QueryWindow::settled(" xss ", 0).debounced, "xss");
    }

    #[tokio::test(start_paused = true)]
    async fn test_input_burst_issues_one_refresh() {
        let source = Arc::new(FakeSource::with_author(vec![article(
            "1",
            "xss basics",
            &["security"],
            1,
        )]));
        let s = session(source.clone(), QueryWindow::default());
        s.set_page(4).await.unwrap();
        source.calls.lock().clear();

        s.input("xs");
        sleep(Duration::from_millis(100)).await;
        s.input("  xss ");
        sleep(Duration::from_millis(250)).await;
        assert!(source.calls.lock().is_empty());

        sleep(Duration::from_millis(100)).await;
        let calls = source.calls.lock().clone();
        assert_eq!(calls, vec!["author:luaxd777".to_string(), "tag:xss".to_string()]);

        let window = s.window();
        assert_eq!(window.debounced, "xss");
        assert_eq!(window.page, 1);
        assert_eq!(s.view().query, "xss");
        assert_eq!(s.to_location_query(), "q=%20%20xss%20&page=1");
    }

    #[tokio::test]
    async fn test_paging_clamps() {
        let source = Arc::new(FakeSource::with_author(Vec::new()));
        let s = session(source, QueryWindow::default());

        s.set_page(0).await.unwrap();
        assert_eq!(s.window().page, 1);
        s.previous_page().await.unwrap();
        assert_eq!(s.window().page, 1);
        s.next_page().await.unwrap();
        assert_eq!(s.window().page, 2);
        assert_eq!(s.view().page, 2);
    }

    #[tokio::test]
    async fn test_visible_articles_follow_raw_input() {
        let source = Arc::new(FakeSource::with_author(vec![
            article("1", "XSS basics", &["security"], 1),
            article("2", "Recon tips", &["security"], 2),
        ]));
        let s = session(source, QueryWindow::default());
        s.start().await.unwrap();
        assert_eq!(s.view().articles.len(), 2);

        s.input("xss");
        let visible = s.visible_articles();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, "1");
    }

    /// Page n answers after a page-specific delay
    struct SlowPages;

    #[async_trait]
    impl ArticleSource for SlowPages {
        async fn articles_by_author(
            &self,
            _username: &str,
            _per_page: usize,
            page: u32,
        ) -> Result<Vec<Article>, SourceError> {
            let delay = if page == 1 { 500 } else { 50 };
            sleep(Duration::from_millis(delay)).await;
            Ok(vec![article(&format!("p{}", page), "ctf notes", &["ctf"], 1)])
        }

        async fn article_by_id(&self, _id: &str) -> Result<Article, SourceError> {
            Err(SourceError::NotFound)
        }

        async fn articles_by_tag(
            &self,
            _tag: &str,
            _per_page: usize,
            _page: u32,
        ) -> Result<Vec<Article>, SourceError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_result_is_discarded() {
        let s = session(Arc::new(SlowPages), QueryWindow::default());
        let slow = s.start();
        let fast = s.set_page(2);
        assert!(s.view().loading);

        fast.await.unwrap();
        slow.await.unwrap();

        let view = s.view();
        assert_eq!(view.page, 2);
        assert!(!view.loading);
        assert_eq!(view.articles.len(), 1);
        assert_eq!(view.articles[0].id, "p2");
    }

    /// Tag search for "x" is slow, for "y" fast; the author feed is empty
    struct SlowQueries;

    #[async_trait]
    impl ArticleSource for SlowQueries {
        async fn articles_by_author(
            &self,
            _username: &str,
            _per_page: usize,
            _page: u32,
        ) -> Result<Vec<Article>, SourceError> {
            Ok(Vec::new())
        }

        async fn article_by_id(&self, _id: &str) -> Result<Article, SourceError> {
            Err(SourceError::NotFound)
        }

        async fn articles_by_tag(
            &self,
            tag: &str,
            _per_page: usize,
            _page: u32,
        ) -> Result<Vec<Article>, SourceError> {
            match tag {
                "x" => {
                    sleep(Duration::from_millis(1000)).await;
                    Ok(vec![article("x1", "x marks the spot", &["ctf"], 1)])
                }
                "y" => {
                    sleep(Duration::from_millis(50)).await;
                    Ok(vec![article("y1", "y notes", &["ctf"], 1)])
                }
                _ => Ok(Vec::new()),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_query_is_discarded() {
        let s = session(Arc::new(SlowQueries), QueryWindow::default());

        s.input("x");
        sleep(Duration::from_millis(350)).await;
        assert_eq!(s.window().debounced, "x");
        assert!(s.view().loading);

        s.input("y");
        sleep(Duration::from_millis(350)).await;
        assert_eq!(s.window().debounced, "y");

        // Long enough for the slow "x" request to finish too
        sleep(Duration::from_millis(2000)).await;

        let view = s.view();
        assert_eq!(view.query, "y");
        assert_eq!(view.page, 1);
        assert!(!view.loading);
        assert_eq!(view.articles.len(), 1);
        assert_eq!(view.articles[0].id, "y1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_session_publishes_nothing() {
        let s = session(Arc::new(SlowPages), QueryWindow::default());
        let mut rx = s.subscribe();
        let pending = s.start();
        let _ = rx.borrow_and_update();
        drop(s);

        pending.await.unwrap();
        assert!(!rx.has_changed().unwrap_or(false));
    }
}
