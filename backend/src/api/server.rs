//! HTTP Server for the retention API.
//!
//! Serves the views of the current snapshot as JSON. Uploading a CSV
//! replaces the snapshot for every later request.
//!
//! # API Endpoints
//!
//! | Method | Path                    | Description                          |
//! |--------|-------------------------|--------------------------------------|
//! | GET    | `/health`               | Health check                         |
//! | GET    | `/api/departments`      | Start departments in the data        |
//! | GET    | `/api/results`          | Raw result rows                      |
//! | GET    | `/api/timeline/{dept}`  | Outcome shares per cohort            |
//! | GET    | `/api/comparison`       | Retention rate per department        |
//! | GET    | `/api/undeclared`       | Undeclared admits per cohort         |
//! | POST   | `/api/upload`           | Upload CSV, replacing the dataset    |
//! | GET    | `/api/logs`             | SSE stream for real-time logs        |

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, Method},
    response::{sse::Event, Json, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{
    convert::Infallible,
    net::SocketAddr,
    path::PathBuf,
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::sync::RwLock;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::logs::{log_error, log_info, log_success, LOG_BROADCASTER};
use super::types::{ResultsQuery, ResultsResponse, UploadResponse, ViewQuery};
use crate::cache::SnapshotCache;
use crate::config::DepartmentConfig;
use crate::error::{PipelineResult, ServerError, ServerResult};
use crate::transform::Snapshot;
use crate::views::{self, Comparison, Timeline};

/// Largest accepted upload.
const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Shared server state: the configuration, the snapshot cache and the
/// snapshot requests are answered from.
///
/// Loads run on the blocking pool; `current` is only write-locked to swap
/// in the finished snapshot.
#[derive(Clone)]
pub struct AppState {
    config: Arc<DepartmentConfig>,
    cache: Arc<Mutex<SnapshotCache>>,
    current: Arc<RwLock<Option<Arc<Snapshot>>>>,
}

impl AppState {
    pub fn new(config: Arc<DepartmentConfig>) -> Self {
        Self {
            config,
            cache: Arc::new(Mutex::new(SnapshotCache::new())),
            current: Arc::new(RwLock::new(None)),
        }
    }

    /// The current snapshot.
    pub async fn snapshot(&self) -> ServerResult<Arc<Snapshot>> {
        self.current.read().await.clone().ok_or(ServerError::NoDataset)
    }

    /// Load a CSV file and make it current.
    pub async fn load_csv(&self, path: &std::path::Path) -> ServerResult<Arc<Snapshot>> {
        let path = path.to_path_buf();
        let snapshot = self
            .build(move |cache, config| cache.load_csv(&path, config))
            .await?;
        self.replace(snapshot).await
    }

    /// Load uploaded bytes and make them current.
    pub async fn load_bytes(&self, bytes: &[u8]) -> ServerResult<Arc<Snapshot>> {
        let bytes = bytes.to_vec();
        let snapshot = self
            .build(move |cache, config| cache.load_bytes(&bytes, config))
            .await?;
        self.replace(snapshot).await
    }

    async fn build<F>(&self, load: F) -> ServerResult<Arc<Snapshot>>
    where
        F: FnOnce(&mut SnapshotCache, Arc<DepartmentConfig>) -> PipelineResult<Arc<Snapshot>> + Send + 'static,
    {
        let cache = self.cache.clone();
        let config = self.config.clone();
        tokio::task::spawn_blocking(move || -> ServerResult<Arc<Snapshot>> {
            let mut cache = cache
                .lock()
                .map_err(|_| ServerError::Internal("snapshot cache lock poisoned".to_string()))?;
            Ok(load(&mut cache, config)?)
        })
        .await
        .map_err(|e| ServerError::Internal(format!("Load task failed: {}", e)))?
    }

    async fn replace(&self, snapshot: Arc<Snapshot>) -> ServerResult<Arc<Snapshot>> {
        *self.current.write().await = Some(snapshot.clone());
        Ok(snapshot)
    }
}

/// Build the router over `state`.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/departments", get(departments))
        .route("/api/results", get(results))
        .route("/api/timeline/{dept}", get(timeline))
        .route("/api/comparison", get(comparison))
        .route("/api/undeclared", get(undeclared))
        .route("/api/upload", post(upload_csv))
        .route("/api/logs", get(sse_logs))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server, optionally preloading a CSV file.
pub async fn start_server(
    port: u16,
    config: Arc<DepartmentConfig>,
    input: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let state = AppState::new(config);
    if let Some(path) = input {
        let snapshot = state.load_csv(&path).await?;
        log_success(format!("Preloaded {} ({})", path.display(), snapshot.run_id));
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    log_info(format!("Retention server running on http://localhost:{}", port));
    log_info("POST /api/upload         - Upload CSV file");
    log_info("GET  /api/timeline/{dept} - Department outcomes");
    log_info("GET  /api/comparison      - Retention by department");
    log_info("GET  /api/undeclared      - Undeclared outcomes");
    log_info("GET  /api/logs            - SSE log stream");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state)).await?;

    Ok(())
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    let dataset = state.snapshot().await.ok().map(|s| s.run_id.clone());
    Json(json!({
        "status": "ok",
        "service": "retention",
        "version": env!("CARGO_PKG_VERSION"),
        "dataset": dataset,
        "endpoints": {
            "upload": "POST /api/upload",
            "departments": "GET /api/departments",
            "results": "GET /api/results",
            "timeline": "GET /api/timeline/{dept}",
            "comparison": "GET /api/comparison",
            "undeclared": "GET /api/undeclared",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

async fn departments(State(state): State<AppState>) -> ServerResult<Json<Vec<String>>> {
    let snapshot = state.snapshot().await?;
    Ok(Json(views::departments(&snapshot)))
}

async fn results(
    State(state): State<AppState>,
    Query(query): Query<ResultsQuery>,
) -> ServerResult<Json<ResultsResponse>> {
    let snapshot = state.snapshot().await?;
    let subgroup = query.subgroup()?;
    let rule = query.rule(&snapshot)?;

    let mut filter = subgroup.filter();
    let department = query.department.as_deref().map(|d| d.trim().to_lowercase());
    if let Some(ref dept) = department {
        filter = filter.with_department(dept.clone());
    }

    Ok(Json(ResultsResponse {
        run_id: snapshot.run_id.clone(),
        rows: snapshot.results(&rule, &filter),
        rule,
        subgroup,
        department,
    }))
}

async fn timeline(
    State(state): State<AppState>,
    Path(dept): Path<String>,
    Query(query): Query<ViewQuery>,
) -> ServerResult<Json<Timeline>> {
    let snapshot = state.snapshot().await?;
    let view = views::department_timeline(&snapshot, &dept, query.subgroup()?)?;
    Ok(Json(view))
}

async fn comparison(
    State(state): State<AppState>,
    Query(query): Query<ViewQuery>,
) -> ServerResult<Json<Comparison>> {
    let snapshot = state.snapshot().await?;
    Ok(Json(views::department_comparison(&snapshot, query.subgroup()?)))
}

async fn undeclared(
    State(state): State<AppState>,
    Query(query): Query<ViewQuery>,
) -> ServerResult<Json<Timeline>> {
    let snapshot = state.snapshot().await?;
    Ok(Json(views::undeclared_timeline(&snapshot, query.subgroup()?)))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(entry) => {
            let json = serde_json::to_string(&entry).ok()?;
            Some(Ok(Event::default().data(json)))
        }
        // Lagged subscribers skip what they missed.
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

async fn upload_csv(State(state): State<AppState>, mut multipart: Multipart) -> ServerResult<Json<UploadResponse>> {
    let mut file_data: Option<Vec<u8>> = None;
    let mut file_name: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {}", e)))?
    {
        if field.name() == Some("file") {
            file_name = field.file_name().map(|s| s.to_string());
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?;
            file_data = Some(bytes.to_vec());
        }
    }

    let bytes = file_data.ok_or_else(|| ServerError::BadRequest("No file provided".to_string()))?;
    log_info(format!(
        "New upload: {} ({} bytes)",
        file_name.as_deref().unwrap_or("unknown"),
        bytes.len()
    ));

    let snapshot = state.load_bytes(&bytes).await.map_err(|e| {
        log_error(format!("Upload rejected: {}", e));
        e
    })?;
    log_success(format!(
        "Dataset replaced: {} rows, {} departments",
        snapshot.stats.raw_rows,
        views::departments(&snapshot).len()
    ));

    Ok(Json(UploadResponse::new(&snapshot, file_name)))
}
