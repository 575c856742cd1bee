//! HTTP admin plane (`meridian serve`) — section 6 of the specification.
//!
//! Everything here is a thin JSON facade over `meridian-control` and
//! `meridian-search`: the registry, the job queue, the health monitor, and
//! the hybrid retriever. No business logic lives in this file beyond
//! request parsing and response shaping; that mirrors the spec's error
//! layering rule that binary crates render, library crates decide.
//!
//! Route layout follows the `socket23-sidecar` webserver's nest-under-`/api`
//! shape (health outside, everything else inside one gated sub-router), but
//! targets axum 0.7 (`axum::serve` + `TcpListener`, not the 0.6
//! `Server::bind` that example uses).

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::{DefaultBodyLimit, Path as AxPath, Query, State};
use axum::http::{HeaderValue, Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Args;
use meridian_config::PrismConfig;
use meridian_control::{
    list_daemon_instances, ControlError, EnqueueOptions, JobQueue, JobType, NewRepo,
    RepoRegistration, RepoRegistry, RepoUpdate,
};
use meridian_search::{
    FtsIndex, HybridRetriever, HybridSearcher, QdrantConfig, QdrantStore, RetrievalFilters,
    SearchError, TagStore,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::signal;
use tokio::sync::Mutex as AsyncMutex;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

use super::{load_config, resolve_workspace};
use crate::GlobalOptions;

/// Run the HTTP admin plane: registry/job CRUD, hybrid search, stats, maintenance.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Path to the control database (default: {workspace}/.meridian/control.db)
    #[arg(long)]
    control_db: Option<PathBuf>,

    /// Bind address (overrides the `server.host` config key)
    #[arg(long)]
    host: Option<String>,

    /// Bind port (overrides the `server.port` config key)
    #[arg(long)]
    port: Option<u16>,

    /// API key required on every /api/* route (overrides config/env resolution)
    #[arg(long)]
    api_key: Option<String>,
}

/// Shared state reachable from every handler. Cheap to clone: everything
/// behind an `Arc`.
#[derive(Clone)]
struct AppState {
    registry: Arc<RepoRegistry>,
    queue: Arc<JobQueue>,
    control_db_path: PathBuf,
    qdrant_url: String,
    api_key: Option<Arc<str>>,
    config: Arc<PrismConfig>,
    /// Lazily built, cached per repo name: opening Qdrant + FTS + tags on
    /// every request would defeat the point of an admin plane meant to
    /// stay up across many requests.
    retrievers: Arc<AsyncMutex<HashMap<String, Arc<HybridRetriever>>>>,
}

pub async fn execute(args: ServeArgs, global: GlobalOptions) -> Result<()> {
    let workspace_path = resolve_workspace(&global).await?;
    let config = load_config(&global, &workspace_path)?;

    let control_db_path = args
        .control_db
        .clone()
        .unwrap_or_else(|| workspace_path.join(".meridian").join("control.db"));
    if let Some(parent) = control_db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let registry =
        Arc::new(RepoRegistry::open(&control_db_path).context("failed to open control database")?);
    let queue = Arc::new(JobQueue::open(&control_db_path).context("failed to open job queue")?);

    let host = args.host.clone().unwrap_or_else(|| config.server.host.clone());
    let port = args.port.unwrap_or(config.server.port);
    let api_key = args
        .api_key
        .clone()
        .or_else(|| config.server.resolve_api_key())
        .map(Arc::<str>::from);

    if api_key.is_none() {
        warn!("no API key configured: every /api/* route is unauthenticated");
    }

    let state = AppState {
        registry,
        queue,
        control_db_path,
        qdrant_url: global.qdrant_url.clone(),
        api_key,
        config: Arc::new(config),
        retrievers: Arc::new(AsyncMutex::new(HashMap::new())),
    };

    let app = build_router(state);
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .with_context(|| format!("invalid bind address '{host}:{port}'"))?;

    info!("Meridian admin API listening on {addr}");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("admin server failed")?;

    info!("Admin server shutdown complete");
    Ok(())
}

fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/registry", get(registry_list).post(registry_create))
        .route(
            "/registry/:name",
            get(registry_get).put(registry_update).delete(registry_delete),
        )
        .route(
            "/registry/:name/jobs",
            get(registry_jobs_list).post(registry_jobs_create),
        )
        .route("/jobs/:id", get(job_get))
        .route("/jobs/cancel", post(job_cancel))
        .route("/jobs/trigger", post(job_trigger))
        .route("/search/hybrid", post(search_hybrid))
        .route("/stats/overview", get(stats_overview))
        .route("/stats/daemon", get(stats_daemon))
        .route("/stats/jobs", get(stats_jobs))
        .route("/stats/capabilities", get(stats_capabilities))
        .route("/maintenance/vector-indexes", get(maintenance_vector_indexes))
        .route(
            "/maintenance/vector-indexes/rebuild",
            post(maintenance_vector_indexes_rebuild),
        )
        .route(
            "/maintenance/vector-indexes/switch",
            post(maintenance_vector_indexes_switch),
        )
        .route(
            "/maintenance/vector-indexes/recommendations",
            post(maintenance_vector_indexes_recommendations),
        )
        .route("/maintenance/embed-missing", post(maintenance_embed_missing))
        .route("/maintenance/reembed-table", post(maintenance_reembed_table))
        .route(
            "/maintenance/embedding-status",
            post(maintenance_embedding_status),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .nest("/api", api)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(CatchPanicLayer::new())
        .layer(DefaultBodyLimit::max(20 * 1024 * 1024))
        .with_state(state)
}

/// Wait for SIGINT or SIGTERM, same handling as the daemon command.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

// ---------------------------------------------------------------------
// Middleware
// ---------------------------------------------------------------------

/// Generate a request id, thread it into the tracing span, echo it back as
/// `X-Request-Id`. Runs on every route, including `/health`/`/ready`.
async fn request_id_middleware(request: Request<axum::body::Body>, next: Next) -> Response {
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("http_request", request_id = %request_id, path = %request.uri().path());

    let mut response = tracing::Instrument::instrument(next.run(request), span).await;
    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}

/// Gate every `/api/*` route behind a configured API key, checked as either
/// `X-Api-Key: <key>` or `Authorization: Bearer <key>`. A server started
/// with no key configured runs open (local-only use, logged at startup).
async fn auth_middleware(
    State(state): State<AppState>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(expected) = &state.api_key else {
        return Ok(next.run(request).await);
    };

    let header_key = request
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| {
            request
                .headers()
                .get(axum::http::header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
                .map(str::to_string)
        });

    match header_key {
        Some(ref key) if key == expected.as_ref() => Ok(next.run(request).await),
        _ => Err(ApiError::new(
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            "supply the API key via X-Api-Key or Authorization: Bearer",
        )),
    }
}

// ---------------------------------------------------------------------
// Error envelope
// ---------------------------------------------------------------------

/// `{error, detail?, recovery_hint, suggestions?}`, per section 6/7. The
/// service never 500s on an unknown repo — `From<ControlError>` maps
/// `RepoNotFound` to 404 with suggestions, not a generic failure.
struct ApiError {
    status: StatusCode,
    error: String,
    detail: Option<String>,
    recovery_hint: String,
    suggestions: Option<Vec<Value>>,
}

impl ApiError {
    fn new(status: StatusCode, error: impl Into<String>, recovery_hint: impl Into<String>) -> Self {
        Self {
            status,
            error: error.into(),
            detail: None,
            recovery_hint: recovery_hint.into(),
            suggestions: None,
        }
    }

    fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": self.error,
            "detail": self.detail,
            "recovery_hint": self.recovery_hint,
            "suggestions": self.suggestions,
        });
        (self.status, Json(body)).into_response()
    }
}

impl From<ControlError> for ApiError {
    fn from(err: ControlError) -> Self {
        match err {
            ControlError::RepoNotFound { query, suggestions } => ApiError {
                status: StatusCode::NOT_FOUND,
                error: "repo_not_found".into(),
                detail: Some(format!("no repo matching '{query}'")),
                recovery_hint: "check `GET /api/registry` for registered names, or register this repo first".into(),
                suggestions: (!suggestions.is_empty()).then(|| {
                    suggestions
                        .into_iter()
                        .map(|s| json!({"name": s.name, "similarity": s.similarity}))
                        .collect()
                }),
            },
            ControlError::SchemaConflict { schema_name } => ApiError::new(
                StatusCode::CONFLICT,
                "schema_conflict",
                "choose a different repo name; the derived schema is already owned",
            )
            .with_detail(schema_name),
            ControlError::JobNotFound(id) => {
                ApiError::new(StatusCode::NOT_FOUND, "job_not_found", "check the job id").with_detail(id.to_string())
            }
            ControlError::RepoDisabled(name) => ApiError::new(
                StatusCode::CONFLICT,
                "repo_disabled",
                "enable the repo via `PUT /api/registry/{name}` before enqueuing jobs",
            )
            .with_detail(name),
            ControlError::JobTimeout(id) => {
                ApiError::new(StatusCode::CONFLICT, "job_timeout", "the job was released back to PENDING; retry later")
                    .with_detail(id.to_string())
            }
            ControlError::Cancelled(id) => {
                ApiError::new(StatusCode::CONFLICT, "cancelled", "this job is terminal; trigger a new one")
                    .with_detail(id.to_string())
            }
            other => ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "retry; if this persists, check server logs")
                .with_detail(other.to_string()),
        }
    }
}

impl From<SearchError> for ApiError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::RetrievalUnavailable { vector_error, fts_error } => ApiError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "retrieval_unavailable",
                "both vector and lexical candidate sources failed; retry shortly",
            )
            .with_detail(format!("vector: {vector_error}; fts: {fts_error}")),
            other => ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "retry; if this persists, check server logs")
                .with_detail(other.to_string()),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "retry; if this persists, check server logs")
            .with_detail(err.to_string())
    }
}

type ApiResult<T> = Result<T, ApiError>;

// ---------------------------------------------------------------------
// Health & readiness
// ---------------------------------------------------------------------

async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

async fn ready(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    // A cheap liveness check on the control database; failure here means
    // the admin plane can't even see its own registry.
    state.registry.list()?;
    Ok(Json(json!({"status": "ready"})))
}

// ---------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RegisterRepoBody {
    name: String,
    root_path: PathBuf,
    #[serde(default)]
    enabled: Option<bool>,
    #[serde(default)]
    auto_index: Option<bool>,
    #[serde(default)]
    auto_embed: Option<bool>,
    #[serde(default)]
    auto_watch: Option<bool>,
    #[serde(default)]
    auto_summaries: Option<bool>,
    #[serde(default)]
    config: Option<Value>,
}

async fn registry_list(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let repos = state.registry.list()?;
    Ok(Json(json!({"status": "ok", "repos": repos})))
}

async fn registry_get(State(state): State<AppState>, AxPath(name): AxPath<String>) -> ApiResult<Json<Value>> {
    let repo = state.registry.resolve_with_suggestions(&name)?;
    Ok(Json(json!({"status": "ok", "repo": repo})))
}

async fn registry_create(State(state): State<AppState>, Json(body): Json<RegisterRepoBody>) -> ApiResult<Json<Value>> {
    let defaults = NewRepo::default();
    let new_repo = NewRepo {
        name: body.name,
        root_path: body.root_path,
        enabled: body.enabled.unwrap_or(defaults.enabled),
        auto_index: body.auto_index.unwrap_or(defaults.auto_index),
        auto_embed: body.auto_embed.unwrap_or(defaults.auto_embed),
        auto_watch: body.auto_watch.unwrap_or(defaults.auto_watch),
        auto_summaries: body.auto_summaries.unwrap_or(defaults.auto_summaries),
        embedding_dimension: None,
        config: body.config.unwrap_or(defaults.config),
    };

    let auto_index = new_repo.auto_index;
    let repo = state.registry.register(new_repo)?;

    let mut enqueued_job = None;
    if auto_index {
        let id = state.queue.enqueue(
            &repo.name,
            &repo.schema_name,
            JobType::FullIndex,
            json!({}),
            EnqueueOptions::default(),
        )?;
        enqueued_job = Some(id);
    }

    Ok(Json(json!({"status": "ok", "repo": repo, "enqueued_job": enqueued_job})))
}

#[derive(Debug, Deserialize, Default)]
struct UpdateRepoBody {
    enabled: Option<bool>,
    auto_index: Option<bool>,
    auto_embed: Option<bool>,
    auto_watch: Option<bool>,
    auto_summaries: Option<bool>,
    config: Option<Value>,
}

async fn registry_update(
    State(state): State<AppState>,
    AxPath(name): AxPath<String>,
    Json(body): Json<UpdateRepoBody>,
) -> ApiResult<Json<Value>> {
    let repo = state.registry.update(
        &name,
        RepoUpdate {
            enabled: body.enabled,
            auto_index: body.auto_index,
            auto_embed: body.auto_embed,
            auto_watch: body.auto_watch,
            auto_summaries: body.auto_summaries,
            config: body.config,
        },
    )?;
    Ok(Json(json!({"status": "ok", "repo": repo})))
}

#[derive(Debug, Deserialize, Default)]
struct DeleteRepoQuery {
    #[serde(default)]
    delete_schema: bool,
}

async fn registry_delete(
    State(state): State<AppState>,
    AxPath(name): AxPath<String>,
    Query(query): Query<DeleteRepoQuery>,
) -> ApiResult<Json<Value>> {
    let repo = state.registry.delete(&name)?;
    state.retrievers.lock().await.remove(&repo.name);

    if query.delete_schema {
        let meridian_dir = repo.root_path.join(".meridian");
        for file in ["fts.db", "tags.db", "fts.db-wal", "fts.db-shm", "tags.db-wal", "tags.db-shm"] {
            let _ = std::fs::remove_file(meridian_dir.join(file));
        }
        if let Ok(store) = QdrantStore::connect(QdrantConfig { url: state.qdrant_url.clone(), ..Default::default() }, repo.name.clone()).await {
            for collection in [meridian_search::schema::collections::SEMANTIC, meridian_search::schema::collections::CODE] {
                if let Err(err) = store.delete_collection(collection).await {
                    warn!(repo = %repo.name, collection, error = %err, "failed to drop vector collection during repo delete");
                }
            }
        }
    }

    Ok(Json(json!({"status": "ok", "repo": repo, "schema_deleted": query.delete_schema})))
}

#[derive(Debug, Deserialize)]
struct EnqueueJobBody {
    job_type: String,
    #[serde(default)]
    priority: Option<i32>,
    #[serde(default)]
    payload: Option<Value>,
}

async fn registry_jobs_create(
    State(state): State<AppState>,
    AxPath(name): AxPath<String>,
    Json(body): Json<EnqueueJobBody>,
) -> ApiResult<Json<Value>> {
    let repo = state.registry.resolve_with_suggestions(&name)?;
    if !repo.enabled {
        return Err(ControlError::RepoDisabled(repo.name).into());
    }
    let job_type: JobType = body
        .job_type
        .parse()
        .map_err(|_: ControlError| ApiError::new(StatusCode::BAD_REQUEST, "unknown_job_type", "see section 4.7 for the closed job-type set").with_detail(body.job_type.clone()))?;

    let id = state.queue.enqueue(
        &repo.name,
        &repo.schema_name,
        job_type,
        body.payload.unwrap_or_else(|| json!({})),
        EnqueueOptions { priority: body.priority, ..Default::default() },
    )?;
    Ok(Json(json!({"status": "ok", "job_id": id})))
}

#[derive(Debug, Deserialize, Default)]
struct JobListQuery {
    status: Option<String>,
    #[serde(default = "default_job_list_limit")]
    limit: i64,
}

fn default_job_list_limit() -> i64 {
    50
}

async fn registry_jobs_list(
    State(state): State<AppState>,
    AxPath(name): AxPath<String>,
    Query(query): Query<JobListQuery>,
) -> ApiResult<Json<Value>> {
    let repo = state.registry.resolve_with_suggestions(&name)?;
    let status = query
        .status
        .map(|s| meridian_control::JobStatus::from_str(&s))
        .transpose()
        .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, "invalid_status", "expected PENDING, CLAIMED, DONE, FAILED, or CANCELLED").with_detail(e))?;
    let jobs = state.queue.list_for_repo(&repo.name, status, query.limit)?;
    Ok(Json(json!({"status": "ok", "jobs": jobs})))
}

// ---------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------

async fn job_get(State(state): State<AppState>, AxPath(id): AxPath<Uuid>) -> ApiResult<Json<Value>> {
    let job = state.queue.get(id)?;
    Ok(Json(json!({"status": "ok", "job": job})))
}

#[derive(Debug, Deserialize)]
struct CancelJobBody {
    job_id: Uuid,
}

async fn job_cancel(State(state): State<AppState>, Json(body): Json<CancelJobBody>) -> ApiResult<Json<Value>> {
    let cancelled = state.queue.cancel(body.job_id)?;
    Ok(Json(json!({"status": "ok", "cancelled": cancelled})))
}

#[derive(Debug, Deserialize)]
struct TriggerJobBody {
    repo_name: String,
    job_type: String,
    #[serde(default)]
    priority: Option<i32>,
    #[serde(default)]
    payload: Option<Value>,
}

async fn job_trigger(State(state): State<AppState>, Json(body): Json<TriggerJobBody>) -> ApiResult<Json<Value>> {
    let repo = state.registry.resolve_with_suggestions(&body.repo_name)?;
    if !repo.enabled {
        return Err(ControlError::RepoDisabled(repo.name).into());
    }
    let job_type: JobType = body
        .job_type
        .parse()
        .map_err(|_: ControlError| ApiError::new(StatusCode::BAD_REQUEST, "unknown_job_type", "see section 4.7 for the closed job-type set").with_detail(body.job_type.clone()))?;

    let id = state.queue.enqueue(
        &repo.name,
        &repo.schema_name,
        job_type,
        body.payload.unwrap_or_else(|| json!({})),
        EnqueueOptions { priority: body.priority, ..Default::default() },
    )?;
    Ok(Json(json!({"status": "ok", "job_id": id})))
}

// ---------------------------------------------------------------------
// Retrieval
// ---------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct HybridSearchBody {
    query: String,
    repo: String,
    #[serde(default = "default_top_k")]
    top_k: usize,
    #[serde(default)]
    filters: RetrievalFiltersBody,
    #[serde(default)]
    require_text_match: bool,
}

fn default_top_k() -> usize {
    10
}

#[derive(Debug, Deserialize, Default)]
struct RetrievalFiltersBody {
    path_glob: Option<String>,
    languages: Option<Vec<String>>,
    tags_all: Option<Vec<String>>,
    tags_any: Option<Vec<String>>,
}

impl From<RetrievalFiltersBody> for RetrievalFilters {
    fn from(body: RetrievalFiltersBody) -> Self {
        RetrievalFilters {
            path_glob: body.path_glob,
            languages: body.languages,
            tags_all: body.tags_all,
            tags_any: body.tags_any,
        }
    }
}

async fn search_hybrid(State(state): State<AppState>, Json(body): Json<HybridSearchBody>) -> ApiResult<Response> {
    let repo = state.registry.resolve_with_suggestions(&body.repo)?;
    let retriever = get_or_build_retriever(&state, &repo).await?;

    let result = retriever
        .retrieve(&body.query, body.top_k, &body.filters.into(), body.require_text_match)
        .await?;

    let results: Vec<Value> = result
        .results
        .iter()
        .map(|r| {
            json!({
                "chunk_id": r.chunk_id,
                "file_path": r.file_path,
                "start_line": r.start_line,
                "end_line": r.end_line,
                "content": r.content,
                "score": r.final_score,
                "vec_rank": r.vec_rank,
                "vec_score": r.vec_score,
                "fts_rank": r.fts_rank,
                "fts_score": r.fts_score,
                "matched_tags": r.matched_tags,
            })
        })
        .collect();

    let mut response = Json(results).into_response();
    if result.degraded {
        if let Ok(value) = HeaderValue::from_str("true") {
            response.headers_mut().insert("x-degraded", value);
        }
    }
    Ok(response)
}

/// Build (or reuse) the `HybridRetriever` for `repo`: one Qdrant connection
/// plus the repo's FTS and tag SQLite files under `.meridian/`, the same
/// construction `meridian-mcp` uses for its own multi-repo tools.
async fn get_or_build_retriever(state: &AppState, repo: &RepoRegistration) -> ApiResult<Arc<HybridRetriever>> {
    {
        let cache = state.retrievers.lock().await;
        if let Some(retriever) = cache.get(&repo.name) {
            return Ok(retriever.clone());
        }
    }

    let meridian_dir = repo.root_path.join(".meridian");
    let fts = FtsIndex::open(meridian_dir.join("fts.db")).map_err(ApiError::from)?;
    let tags = TagStore::open(meridian_dir.join("tags.db")).map_err(ApiError::from)?;
    let searcher = HybridSearcher::connect(
        QdrantConfig { url: state.qdrant_url.clone(), ..Default::default() },
        repo.name.clone(),
    )
    .await
    .map_err(ApiError::from)?;
    let retriever = Arc::new(HybridRetriever::new(Arc::new(searcher), fts, tags));

    let mut cache = state.retrievers.lock().await;
    cache.insert(repo.name.clone(), retriever.clone());
    Ok(retriever)
}

// ---------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------

async fn stats_overview(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let repos = state.registry.list()?;
    let enabled = repos.iter().filter(|r| r.enabled).count();
    let job_counts = state.queue.status_counts()?;
    Ok(Json(json!({
        "status": "ok",
        "repos_total": repos.len(),
        "repos_enabled": enabled,
        "jobs_by_status": job_counts,
    })))
}

async fn stats_daemon(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let control_db_path = state.control_db_path.clone();
    let instances = tokio::task::spawn_blocking(move || -> meridian_control::Result<Vec<Value>> {
        let conn = rusqlite::Connection::open(&control_db_path).map_err(ControlError::from)?;
        let rows = list_daemon_instances(&conn)?;
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        Ok(rows
            .into_iter()
            .map(|d| {
                json!({
                    "instance_id": d.instance_id,
                    "status": format!("{:?}", d.status).to_uppercase(),
                    "started_at": d.started_at,
                    "last_heartbeat": d.last_heartbeat,
                    "heartbeat_age_secs": now - d.last_heartbeat,
                })
            })
            .collect())
    })
    .await
    .map_err(|e| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "retry").with_detail(e.to_string()))?
    .map_err(ApiError::from)?;

    Ok(Json(json!({"status": "ok", "daemons": instances})))
}

async fn stats_jobs(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let counts = state.queue.status_counts()?;
    let recent = state.queue.list_recent(50)?;
    Ok(Json(json!({"status": "ok", "counts": counts, "recent": recent})))
}

async fn stats_capabilities(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let workflow_order: Vec<&str> = JobType::ALL.iter().map(|jt| jt.as_str()).collect();
    Ok(Json(json!({
        "status": "ok",
        "embedding_provider": format!("{:?}", state.config.embedding.provider),
        "qdrant_url": state.qdrant_url,
        "job_types": workflow_order,
    })))
}

// ---------------------------------------------------------------------
// Maintenance (vector index lifecycle)
// ---------------------------------------------------------------------

/// `lists = max(10, sqrt(N))` below 100k points, else HNSW with
/// `m=16, ef_construction=64` — the sizing rule section 4.4 describes.
/// Qdrant itself always indexes with its own internal HNSW, so this is
/// reported as a recommendation rather than a switch a client can flip;
/// see DESIGN.md for why no literal IVFFlat/HNSW toggle exists here.
fn recommend_index(point_count: u64) -> Value {
    if point_count < 100_000 {
        json!({
            "index_type": "ivfflat",
            "lists": (point_count as f64).sqrt().max(10.0).round() as u64,
            "note": "advisory only: Qdrant manages indexing internally via HNSW regardless of this recommendation",
        })
    } else {
        json!({
            "index_type": "hnsw",
            "m": 16,
            "ef_construction": 64,
            "note": "advisory only: Qdrant manages indexing internally via HNSW regardless of this recommendation",
        })
    }
}

async fn vector_index_snapshot(state: &AppState, repo: &RepoRegistration) -> ApiResult<Value> {
    let store = QdrantStore::connect(
        QdrantConfig { url: state.qdrant_url.clone(), ..Default::default() },
        repo.name.clone(),
    )
    .await
    .map_err(ApiError::from)?;

    let mut collections = Vec::new();
    for name in [meridian_search::schema::collections::SEMANTIC, meridian_search::schema::collections::CODE] {
        let info = store.collection_info(name).await.map_err(ApiError::from)?;
        let point_count = info.as_ref().and_then(|i| i.points_count).unwrap_or(0);
        collections.push(json!({
            "collection": name,
            "exists": info.is_some(),
            "point_count": point_count,
            "recommendation": recommend_index(point_count),
        }));
    }
    Ok(json!({"repo": repo.name, "collections": collections}))
}

async fn maintenance_vector_indexes(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let repos = state.registry.list()?;
    let mut snapshots = Vec::with_capacity(repos.len());
    for repo in &repos {
        snapshots.push(vector_index_snapshot(&state, repo).await?);
    }
    Ok(Json(json!({"status": "ok", "repos": snapshots})))
}

#[derive(Debug, Deserialize)]
struct RepoOnlyBody {
    repo: String,
}

async fn maintenance_vector_indexes_rebuild(State(state): State<AppState>, Json(body): Json<RepoOnlyBody>) -> ApiResult<Json<Value>> {
    let repo = state.registry.resolve_with_suggestions(&body.repo)?;
    let store = QdrantStore::connect(
        QdrantConfig { url: state.qdrant_url.clone(), ..Default::default() },
        repo.name.clone(),
    )
    .await
    .map_err(ApiError::from)?;

    for config in [&meridian_search::CollectionConfig::SEMANTIC, &meridian_search::CollectionConfig::CODE] {
        if store.collection_exists(config.name).await.map_err(ApiError::from)? {
            store.delete_collection(config.name).await.map_err(ApiError::from)?;
        }
        store.create_collection(config).await.map_err(ApiError::from)?;
    }

    let job_id = state.queue.enqueue(
        &repo.name,
        &repo.schema_name,
        JobType::EmbedMissing,
        json!({"reembed": true}),
        EnqueueOptions { dedup_key: Some(format!("{}:REBUILD:{}", repo.name, Uuid::new_v4())), ..Default::default() },
    )?;

    Ok(Json(json!({"status": "ok", "repo": repo.name, "rebuilt": true, "embed_job_id": job_id})))
}

#[derive(Debug, Deserialize)]
struct SwitchIndexBody {
    repo: String,
    #[serde(default)]
    index_type: Option<String>,
}

async fn maintenance_vector_indexes_switch(State(state): State<AppState>, Json(body): Json<SwitchIndexBody>) -> ApiResult<Json<Value>> {
    let repo = state.registry.resolve_with_suggestions(&body.repo)?;
    Ok(Json(json!({
        "status": "ok",
        "repo": repo.name,
        "requested": body.index_type,
        "applied": false,
        "note": "Qdrant's wrapper always builds its own internal HNSW index; there is no manual index-type switch to apply. Use /api/maintenance/vector-indexes/recommendations for the sizing the spec's formula would choose.",
    })))
}

async fn maintenance_vector_indexes_recommendations(State(state): State<AppState>, Json(body): Json<RepoOnlyBody>) -> ApiResult<Json<Value>> {
    let repo = state.registry.resolve_with_suggestions(&body.repo)?;
    let snapshot = vector_index_snapshot(&state, &repo).await?;
    Ok(Json(json!({"status": "ok", "repo": repo.name, "snapshot": snapshot})))
}

async fn maintenance_embed_missing(State(state): State<AppState>, Json(body): Json<RepoOnlyBody>) -> ApiResult<Json<Value>> {
    let repo = state.registry.resolve_with_suggestions(&body.repo)?;
    let job_id = state.queue.enqueue(
        &repo.name,
        &repo.schema_name,
        JobType::EmbedMissing,
        json!({}),
        EnqueueOptions::default(),
    )?;
    Ok(Json(json!({"status": "ok", "job_id": job_id})))
}

#[derive(Debug, Deserialize)]
struct ReembedTableBody {
    repo: String,
    #[serde(default)]
    table: Option<String>,
}

/// The job taxonomy (section 4.7) has no dedicated REEMBED_TABLE type;
/// a forced full re-embed is EMBED_MISSING with `reembed: true` and a
/// fresh dedup key so it bypasses the normal "already outstanding" skip.
async fn maintenance_reembed_table(State(state): State<AppState>, Json(body): Json<ReembedTableBody>) -> ApiResult<Json<Value>> {
    let repo = state.registry.resolve_with_suggestions(&body.repo)?;
    let job_id = state.queue.enqueue(
        &repo.name,
        &repo.schema_name,
        JobType::EmbedMissing,
        json!({"reembed": true, "table": body.table}),
        EnqueueOptions { dedup_key: Some(format!("{}:REEMBED:{}", repo.name, Uuid::new_v4())), ..Default::default() },
    )?;
    Ok(Json(json!({"status": "ok", "job_id": job_id})))
}

async fn maintenance_embedding_status(State(state): State<AppState>, Json(body): Json<RepoOnlyBody>) -> ApiResult<Json<Value>> {
    let repo = state.registry.resolve_with_suggestions(&body.repo)?;
    let snapshot = vector_index_snapshot(&state, &repo).await?;
    Ok(Json(json!({"status": "ok", "repo": repo.name, "embedding_status": snapshot})))
}
