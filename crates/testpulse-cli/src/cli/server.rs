//! Read-only JSON API over the run store, served by `testpulse serve`.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use serde::{Deserialize, Serialize};
use serde_json::json;
use testpulse_core::analytics::{Analytics, FlakyReport, PassRateTrend, SlowTest};
use testpulse_core::config::AnalyticsConfig;
use testpulse_core::errors::{CoreError, ErrorKind};
use testpulse_core::model::{Run, RunId, RunOrder, RunScope, TestResult};
use testpulse_core::storage::Store;

/// Shared state for the API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub store: Store,
    pub analytics: AnalyticsConfig,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/runs", get(list_runs))
        .route("/runs/{run_id}", get(get_run))
        .route("/flaky", get(flaky))
        .route("/slow/{run_id}", get(slowest))
        .route("/trend", get(trend))
        .with_state(state)
}

/// Bind `host:port` and serve until Ctrl+C.
pub async fn serve(state: ApiState, host: &str, port: u16) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind((host, port))
        .await
        .map_err(|e| anyhow::anyhow!("failed to bind {}:{}: {}", host, port, e))?;
    let addr = listener.local_addr()?;
    tracing::info!(event = "api_listening", addr = %addr);
    eprintln!("Serving the testpulse API on http://{}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!(event = "api_stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(event = "signal_handler_failed", error = %e);
        std::future::pending::<()>().await;
    }
}

// ── Errors ──

/// A core error rendered as `{"error": <kind>, "message": <text>}`.
pub struct ApiError(CoreError);

impl From<CoreError> for ApiError {
    fn from(e: CoreError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.0.kind();
        let status = match kind {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::State => StatusCode::CONFLICT,
            ErrorKind::Storage => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(event = "api_error", kind = kind.as_str(), error = %self.0);
        }
        let body = json!({ "error": kind.as_str(), "message": self.0.to_string() });
        (status, Json(body)).into_response()
    }
}

/// Store calls block on SQLite, so they run off the async workers.
async fn blocking<T, F>(state: &ApiState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Store, &AnalyticsConfig) -> testpulse_core::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.store, &state.analytics))
        .await
        .map_err(|e| ApiError(CoreError::storage(format!("query task failed: {}", e))))?
        .map_err(ApiError)
}

// ── Handlers ──

async fn index() -> Json<serde_json::Value> {
    Json(json!({
        "name": "testpulse",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": ["/runs", "/runs/{run_id}", "/flaky", "/slow/{run_id}", "/trend"],
    }))
}

#[derive(Debug, Deserialize)]
struct RunsQuery {
    limit: Option<u32>,
    #[serde(default)]
    all: bool,
}

#[derive(Serialize)]
struct RunsBody {
    runs: Vec<Run>,
}

async fn list_runs(
    State(state): State<ApiState>,
    Query(q): Query<RunsQuery>,
) -> Result<Json<RunsBody>, ApiError> {
    let limit = q.limit.unwrap_or(20) as usize;
    let scope = if q.all {
        RunScope::IncludeInProgress
    } else {
        RunScope::Finalized
    };
    let runs = blocking(&state, move |store, _| {
        store.list_runs(limit, RunOrder::NewestFirst, scope)
    })
    .await?;
    Ok(Json(RunsBody { runs }))
}

#[derive(Serialize)]
struct RunBody {
    run: Run,
    results: Vec<TestResult>,
}

async fn get_run(
    State(state): State<ApiState>,
    Path(run_id): Path<RunId>,
) -> Result<Json<RunBody>, ApiError> {
    let body = blocking(&state, move |store, _| {
        let run = store.get_run(run_id)?;
        let results = store.get_results(run_id)?;
        Ok(RunBody { run, results })
    })
    .await?;
    Ok(Json(body))
}

#[derive(Debug, Deserialize)]
struct FlakyQuery {
    window: Option<u32>,
    min_fails: Option<u32>,
}

async fn flaky(
    State(state): State<ApiState>,
    Query(q): Query<FlakyQuery>,
) -> Result<Json<FlakyReport>, ApiError> {
    let report = blocking(&state, move |store, cfg| {
        let window = q.window.unwrap_or(cfg.window) as usize;
        let min_fails = q.min_fails.unwrap_or(cfg.min_fails);
        Analytics::new(store).detect_flaky(min_fails, window)
    })
    .await?;
    Ok(Json(report))
}

#[derive(Debug, Deserialize)]
struct SlowQuery {
    top: Option<u32>,
}

#[derive(Serialize)]
struct SlowBody {
    run_id: RunId,
    slowest: Vec<SlowTest>,
}

async fn slowest(
    State(state): State<ApiState>,
    Path(run_id): Path<RunId>,
    Query(q): Query<SlowQuery>,
) -> Result<Json<SlowBody>, ApiError> {
    let slowest = blocking(&state, move |store, cfg| {
        let top = q.top.unwrap_or(cfg.top_n) as usize;
        Analytics::new(store).slowest(run_id, top)
    })
    .await?;
    Ok(Json(SlowBody { run_id, slowest }))
}

#[derive(Debug, Deserialize)]
struct TrendQuery {
    limit: Option<u32>,
}

async fn trend(
    State(state): State<ApiState>,
    Query(q): Query<TrendQuery>,
) -> Result<Json<PassRateTrend>, ApiError> {
    let trend = blocking(&state, move |store, cfg| {
        let limit = q.limit.unwrap_or(cfg.trend_limit) as usize;
        Analytics::new(store).pass_rate_trend(limit)
    })
    .await?;
    Ok(Json(trend))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use testpulse_core::ingest::ingest_reader;
    use tower::ServiceExt;

    const SESSIONS: &str = r#"{"event":"session_start","timestamp":"2026-02-01T10:00:00Z"}
{"event":"test_result","test_id":"suite::A","outcome":"passed","duration":0.3}
{"event":"test_result","test_id":"suite::B","outcome":"failed","duration":1.25,"message":"boom"}
{"event":"session_end"}
{"event":"session_start","timestamp":"2026-02-01T11:00:00Z"}
{"event":"test_result","test_id":"suite::A","outcome":"passed","duration":0.2}
{"event":"test_result","test_id":"suite::B","outcome":"passed","duration":0.9}
{"event":"session_end"}
"#;

    fn app() -> Router {
        let store = Store::memory().unwrap();
        ingest_reader(&store, SESSIONS.as_bytes()).unwrap();
        router(ApiState {
            store,
            analytics: AnalyticsConfig::default(),
        })
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let resp = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn runs_are_listed_newest_first() {
        let (status, body) = get_json(app(), "/runs").await;
        assert_eq!(status, StatusCode::OK);
        let ids: Vec<i64> = body["runs"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["id"].as_i64().unwrap())
            .collect();
        assert_eq!(ids, vec![2, 1]);

        let (_, body) = get_json(app(), "/runs?limit=1").await;
        assert_eq!(body["runs"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn run_detail_includes_results() {
        let (status, body) = get_json(app(), "/runs/1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["run"]["id"], 1);
        let results = body["results"].as_array().unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[1]["test_id"], "suite::B");
        assert_eq!(results[1]["outcome"], "failed");
    }

    #[tokio::test]
    async fn unknown_run_is_404_with_error_kind() {
        let (status, body) = get_json(app(), "/runs/42").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");

        let (status, _) = get_json(app(), "/slow/42").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn flaky_uses_query_overrides() {
        let (status, body) = get_json(app(), "/flaky?window=2&min_fails=1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["runs_considered"], 2);
        assert_eq!(body["tests"][0]["test_id"], "suite::B");

        let (status, body) = get_json(app(), "/flaky?window=0").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation");
    }

    #[tokio::test]
    async fn slowest_and_trend() {
        let (status, body) = get_json(app(), "/slow/1?top=1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["run_id"], 1);
        assert_eq!(body["slowest"].as_array().unwrap().len(), 1);
        assert_eq!(body["slowest"][0]["test_id"], "suite::B");

        let (status, body) = get_json(app(), "/trend").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["points"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn index_lists_endpoints() {
        let (status, body) = get_json(app(), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "testpulse");
    }
}
