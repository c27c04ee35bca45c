//! Catalog HTTP server
//!
//! Read-only JSON endpoints over the report catalog and blog discovery.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::discovery::{Discovery, DiscoveryPipeline};
use crate::error::GatewayError;
use crate::filter::{self, Facets, QueryState};
use crate::models::{Article, Report, Status};
use crate::session::{parse_page, QueryWindow};
use crate::store::CatalogStore;

pub struct AppState {
    pub store: Arc<CatalogStore>,
    pub pipeline: Arc<DiscoveryPipeline>,
    pub page_size: usize,
    pub started_at: Instant,
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/reports", get(reports_handler))
        .route("/reports/facets", get(facets_handler))
        .route("/reports/:id", get(report_handler))
        .route("/blogs", get(blogs_handler))
        .route("/blogs/:id", get(article_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound,
    Gateway(GatewayError),
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        Self::Gateway(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            Self::NotFound => (StatusCode::NOT_FOUND, "not found".to_string()),
            Self::Gateway(err) => {
                error!("Gateway failure: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

// ============================================================================
// HANDLERS
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub uptime_secs: u64,
    pub version: String,
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        healthy: true,
        uptime_secs: state.started_at.elapsed().as_secs(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Raw query parameters of `/reports`; absent or "All" means no filter
#[derive(Debug, Default, Deserialize)]
pub struct ReportParams {
    pub q: Option<String>,
    pub category: Option<String>,
    pub year: Option<String>,
    pub organization: Option<String>,
    pub severity: Option<String>,
    pub sort: Option<String>,
}

impl ReportParams {
    pub fn into_query(self) -> Result<QueryState, ApiError> {
        fn bad(field: &str, value: &str) -> ApiError {
            ApiError::BadRequest(format!("invalid {}: {}", field, value))
        }

        let category = self.category.unwrap_or_default();
        let year = self.year.unwrap_or_default();
        let severity = self.severity.unwrap_or_default();

        Ok(QueryState {
            search: self.q.unwrap_or_default(),
            category: category.parse().map_err(|_| bad("category", &category))?,
            year: year.parse().map_err(|_| bad("year", &year))?,
            organization: self.organization.unwrap_or_default().parse().unwrap_or_default(),
            severity: severity.parse().map_err(|_| bad("severity", &severity))?,
            sort: self.sort.map(Into::into).unwrap_or_default(),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ReportsResponse {
    pub reports: Vec<Report>,
    pub total: usize,
    pub active_filters: usize,
}

async fn reports_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ReportParams>,
) -> Result<Json<ReportsResponse>, ApiError> {
    let query = params.into_query()?;
    let reports = filter::apply(&state.store.list_approved()?, &query);

    Ok(Json(ReportsResponse {
        total: reports.len(),
        active_filters: query.active_filter_count(),
        reports,
    }))
}

async fn facets_handler(State(state): State<Arc<AppState>>) -> Result<Json<Facets>, ApiError> {
    Ok(Json(Facets::collect(&state.store.list_approved()?)))
}

async fn report_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Report>, ApiError> {
    match state.store.report_by_id(&id)? {
        Some(report) if report.status == Status::Approved => Ok(Json(report)),
        _ => Err(ApiError::NotFound),
    }
}

#[derive(Debug, Deserialize)]
pub struct BlogParams {
    pub q: Option<String>,
    pub page: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BlogPage {
    pub query: String,
    pub page: u32,
    pub location: String,
    #[serde(flatten)]
    pub discovery: Discovery,
}

async fn blogs_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<BlogParams>,
) -> Json<BlogPage> {
    let page = params.page.as_deref().map(parse_page).unwrap_or(1);
    let window = QueryWindow::settled(params.q.as_deref().unwrap_or_default(), page);
    let discovery = state
        .pipeline
        .discover(&window.debounced, window.page, state.page_size)
        .await;

    Json(BlogPage {
        location: window.to_location_query(),
        query: window.debounced,
        page: window.page,
        discovery,
    })
}

async fn article_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Article>, ApiError> {
    state
        .pipeline
        .article(&id)
        .await
        .map(Json)
        .ok_or(ApiError::NotFound)
}

/// Run the server
pub async fn run_server(host: &str, port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);
    let addr = format!("{}:{}", host, port);

    info!("Starting catalog server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
