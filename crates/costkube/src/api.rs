use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::{Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use costkube_analysis::forecast::{
    BudgetRunway, Forecast, MIN_FORECAST_POINTS, SeasonalAnalysis, budget_runway, forecast_costs,
    seasonal_analysis,
};
use costkube_analysis::recommend::{AnalysisSummary, Recommender};
use costkube_collect::Collector;
use costkube_core::error::CostError;
use costkube_core::query::CostTrends;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::Level;

use crate::export::{export_filename, namespaces_csv, namespaces_json};
use crate::protocol::{
    ConfigResponse, CostsResponse, ErrorBody, HealthResponse, HistoryResponse, IdleResponse,
    PruneResponse, TopNamespacesResponse, WsFrame,
};

/// Trend window the forecast endpoints fit against.
const FORECAST_WINDOW_HOURS: u32 = 168;

#[derive(Clone)]
pub struct AppState {
    pub collector: Collector,
    pub recommender: Recommender,
}

impl AppState {
    pub fn new(collector: Collector) -> Self {
        let recommender = Recommender::new(collector.pricing().clone());
        Self {
            collector,
            recommender,
        }
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);
    Router::new()
        .route("/api/namespaces", get(namespaces))
        .route("/api/pods", get(pods))
        .route("/api/config", get(config))
        .route("/api/health", get(health))
        .route("/api/history/namespaces", get(namespace_history))
        .route("/api/history/pods", get(pod_history))
        .route("/api/history/trends", get(trends))
        .route("/api/history/top-namespaces", get(top_namespaces))
        .route("/api/history/prune", post(prune))
        .route("/api/export/namespaces/csv", get(export_csv))
        .route("/api/export/namespaces/json", get(export_json))
        .route("/api/recommendations", get(recommendations))
        .route("/api/recommendations/idle", get(idle))
        .route("/api/forecast", get(forecast))
        .route("/api/forecast/budget-runway", get(runway))
        .route("/api/forecast/seasonal", get(seasonal))
        .route("/ws/metrics", get(ws_metrics))
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .on_request(tower_http::trace::DefaultOnRequest::new().level(Level::DEBUG))
                .on_response(tower_http::trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}

pub struct ApiError(CostError);

impl From<CostError> for ApiError {
    fn from(err: CostError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            CostError::BackendUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            CostError::InvalidArgument(_) | CostError::InsufficientHistory { .. } => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::warn!(error = %self.0, "request failed");
        }
        let body = ErrorBody {
            error: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// Run a store call on the blocking pool.
async fn blocking<T, F>(f: F) -> ApiResult<T>
where
    F: FnOnce() -> costkube_core::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| CostError::Internal(format!("blocking task failed: {e}")))?
        .map_err(ApiError::from)
}

fn default_true() -> bool {
    true
}

fn default_history_hours() -> u32 {
    24
}

#[derive(Debug, Deserialize)]
struct NamespacesParams {
    #[serde(default = "default_true")]
    save_history: bool,
}

#[derive(Debug, Deserialize)]
struct PodsParams {
    namespace: Option<String>,
    #[serde(default = "default_true")]
    save_history: bool,
}

#[derive(Debug, Deserialize)]
struct HistoryParams {
    namespace: Option<String>,
    #[serde(default = "default_history_hours")]
    hours: u32,
}

#[derive(Debug, Deserialize)]
struct TrendsParams {
    #[serde(default = "default_trend_hours")]
    hours: u32,
}

fn default_trend_hours() -> u32 {
    FORECAST_WINDOW_HOURS
}

#[derive(Debug, Deserialize)]
struct TopParams {
    #[serde(default = "default_top_limit")]
    limit: usize,
    #[serde(default = "default_history_hours")]
    hours: u32,
}

fn default_top_limit() -> usize {
    10
}

#[derive(Debug, Deserialize)]
struct PruneParams {
    #[serde(default = "default_prune_days")]
    days: u32,
}

fn default_prune_days() -> u32 {
    30
}

#[derive(Debug, Deserialize)]
struct ForecastParams {
    #[serde(default = "default_forecast_days")]
    days: u32,
}

fn default_forecast_days() -> u32 {
    30
}

#[derive(Debug, Deserialize)]
struct RunwayParams {
    budget: f64,
}

async fn namespaces(
    State(state): State<AppState>,
    Query(params): Query<NamespacesParams>,
) -> ApiResult<Json<CostsResponse>> {
    let report = state.collector.namespace_costs(params.save_history).await?;
    Ok(Json(CostsResponse {
        data: report.costs,
        skipped: report.skipped,
        persistence: report.persistence,
        source: state.collector.source_kind(),
    }))
}

async fn pods(
    State(state): State<AppState>,
    Query(params): Query<PodsParams>,
) -> ApiResult<Json<CostsResponse>> {
    let report = state
        .collector
        .pod_costs(params.namespace.as_deref(), params.save_history)
        .await?;
    Ok(Json(CostsResponse {
        data: report.costs,
        skipped: report.skipped,
        persistence: report.persistence,
        source: state.collector.source_kind(),
    }))
}

async fn config(State(state): State<AppState>) -> Json<ConfigResponse> {
    Json(ConfigResponse {
        pricing: state.collector.pricing().clone(),
        source: state.collector.source_kind(),
        metrics_available: state.collector.is_available().await,
    })
}

async fn health(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    let store = state.collector.store().clone();
    let status = blocking(move || store.status()).await?;
    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        source: state.collector.source_kind(),
        metrics_available: state.collector.is_available().await,
        store: status,
    }))
}

async fn namespace_history(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> ApiResult<Json<HistoryResponse>> {
    let store = state.collector.store().clone();
    let namespace = params.namespace.clone();
    let data = blocking(move || store.query_namespace_history(namespace.as_deref(), params.hours))
        .await?;
    Ok(Json(HistoryResponse {
        count: data.len(),
        data,
        namespace: params.namespace,
        hours: params.hours,
    }))
}

async fn pod_history(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> ApiResult<Json<HistoryResponse>> {
    let store = state.collector.store().clone();
    let namespace = params.namespace.clone();
    let data =
        blocking(move || store.query_pod_history(namespace.as_deref(), params.hours)).await?;
    Ok(Json(HistoryResponse {
        count: data.len(),
        data,
        namespace: params.namespace,
        hours: params.hours,
    }))
}

async fn trends(
    State(state): State<AppState>,
    Query(params): Query<TrendsParams>,
) -> ApiResult<Json<CostTrends>> {
    let store = state.collector.store().clone();
    let trends = blocking(move || store.query_cost_trends(params.hours)).await?;
    Ok(Json(trends))
}

async fn top_namespaces(
    State(state): State<AppState>,
    Query(params): Query<TopParams>,
) -> ApiResult<Json<TopNamespacesResponse>> {
    let store = state.collector.store().clone();
    let data = blocking(move || store.query_top_namespaces(params.limit, params.hours)).await?;
    Ok(Json(TopNamespacesResponse {
        data,
        limit: params.limit,
        hours: params.hours,
    }))
}

async fn prune(
    State(state): State<AppState>,
    Query(params): Query<PruneParams>,
) -> ApiResult<Json<PruneResponse>> {
    let store = state.collector.store().clone();
    let summary = blocking(move || store.prune_older_than(params.days)).await?;
    Ok(Json(PruneResponse {
        days: params.days,
        namespace_rows: summary.namespace_rows,
        pod_rows: summary.pod_rows,
        deleted: summary.total(),
    }))
}

async fn export_csv(State(state): State<AppState>) -> ApiResult<Response> {
    let report = state.collector.namespace_costs(false).await?;
    let now = Utc::now();
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={}", export_filename(now, "csv")),
            ),
        ],
        namespaces_csv(&report.costs),
    )
        .into_response())
}

async fn export_json(State(state): State<AppState>) -> ApiResult<Response> {
    let report = state.collector.namespace_costs(false).await?;
    let now = Utc::now();
    let body = namespaces_json(report.costs, now)
        .map_err(|e| CostError::Internal(format!("export encode failed: {e}")))?;
    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={}", export_filename(now, "json")),
            ),
        ],
        body,
    )
        .into_response())
}

async fn recommendations(State(state): State<AppState>) -> ApiResult<Json<AnalysisSummary>> {
    let report = state.collector.namespace_costs(false).await?;
    Ok(Json(state.recommender.analyze_all(&report.costs)))
}

async fn idle(State(state): State<AppState>) -> ApiResult<Json<IdleResponse>> {
    let report = state.collector.namespace_costs(false).await?;
    let idle_resources = state.recommender.detect_all_idle(&report.costs);
    Ok(Json(IdleResponse {
        count: idle_resources.len(),
        total_potential_savings: idle_resources.iter().map(|i| i.potential_savings).sum(),
        idle_resources,
    }))
}

async fn forecast(
    State(state): State<AppState>,
    Query(params): Query<ForecastParams>,
) -> ApiResult<Json<Forecast>> {
    let points = forecast_points(&state).await?;
    Ok(Json(forecast_costs(&points, params.days)?))
}

async fn runway(
    State(state): State<AppState>,
    Query(params): Query<RunwayParams>,
) -> ApiResult<Json<BudgetRunway>> {
    let points = forecast_points(&state).await?;
    Ok(Json(budget_runway(&points, params.budget)?))
}

#[derive(Debug, Deserialize)]
struct SeasonalParams {
    #[serde(default = "default_seasonal_hours")]
    hours: u32,
}

fn default_seasonal_hours() -> u32 {
    30 * 24
}

async fn seasonal(
    State(state): State<AppState>,
    Query(params): Query<SeasonalParams>,
) -> ApiResult<Json<SeasonalAnalysis>> {
    let points = trend_points(&state, params.hours, MIN_FORECAST_POINTS).await?;
    Ok(Json(seasonal_analysis(&points)?))
}

async fn forecast_points(state: &AppState) -> ApiResult<Vec<(chrono::DateTime<Utc>, f64)>> {
    trend_points(state, FORECAST_WINDOW_HOURS, MIN_FORECAST_POINTS).await
}

async fn trend_points(
    state: &AppState,
    hours: u32,
    required: usize,
) -> ApiResult<Vec<(chrono::DateTime<Utc>, f64)>> {
    let store = state.collector.store().clone();
    let trends = blocking(move || store.query_cost_trends(hours)).await?;
    if trends.is_empty() {
        return Err(CostError::InsufficientHistory {
            required,
            available: 0,
        }
        .into());
    }
    Ok(trends.points().collect())
}

async fn ws_metrics(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) if text.as_str() == "ping" => {
                let frame = match state.collector.namespace_costs(false).await {
                    Ok(report) => WsFrame::MetricsUpdate {
                        data: report.costs,
                        timestamp: Utc::now(),
                    },
                    Err(e) => WsFrame::Error {
                        message: e.to_string(),
                    },
                };
                let payload = match serde_json::to_string(&frame) {
                    Ok(payload) => payload,
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to encode ws frame");
                        continue;
                    }
                };
                if sender.send(Message::Text(payload.into())).await.is_err() {
                    break;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
    tracing::debug!("metrics websocket closed");
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use costkube_collect::{SourceKind, StaticSource, UsageSource};
    use costkube_core::model::usage::ContainerUsage;
    use costkube_store::Store;
    use serde_json::Value;
    use testkit::{ManualClock, default_pricing, sample_containers};
    use tower::ServiceExt;

    use super::*;

    struct Offline;

    #[async_trait::async_trait]
    impl UsageSource for Offline {
        async fn list_containers(&self) -> Option<Vec<ContainerUsage>> {
            None
        }

        fn kind(&self) -> SourceKind {
            SourceKind::Kube
        }
    }

    fn ready_store() -> Store {
        let store = Store::open_in_memory()
            .unwrap()
            .with_clock(Arc::new(ManualClock::default()));
        store.initialize().unwrap();
        store
    }

    fn app_with(store: Store) -> Router {
        let collector = Collector::new(
            Arc::new(StaticSource::from_containers(sample_containers())),
            store,
            default_pricing(),
        );
        router(AppState::new(collector))
    }

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
    ) -> (StatusCode, Vec<u8>, axum::http::HeaderMap) {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap().to_vec();
        (status, body, headers)
    }

    async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
        let (status, body, _) = send(app, "GET", uri).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn namespaces_are_costed_and_saved() {
        let store = ready_store();
        let app = app_with(store.clone());

        let (status, body) = get_json(&app, "/api/namespaces").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"][0]["namespace"], "production");
        assert_eq!(body["data"][0]["monthly_cost"], 18.98);
        assert_eq!(body["persistence"]["status"], "persisted");
        assert_eq!(body["source"], "static");

        let (_, history) = get_json(&app, "/api/history/namespaces?hours=1").await;
        assert_eq!(history["count"], 2);
        assert_eq!(history["hours"], 1);
    }

    #[tokio::test]
    async fn save_history_false_skips_persistence() {
        let store = ready_store();
        let app = app_with(store.clone());
        let (_, body) = get_json(&app, "/api/pods?namespace=staging&save_history=false").await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
        assert_eq!(body["persistence"]["status"], "not_requested");
        assert_eq!(store.status().unwrap().pod_rows, 0);
    }

    #[tokio::test]
    async fn unavailable_backend_maps_to_503() {
        let collector = Collector::new(Arc::new(Offline), ready_store(), default_pricing());
        let app = router(AppState::new(collector));

        for uri in [
            "/api/namespaces",
            "/api/pods",
            "/api/recommendations",
            "/api/export/namespaces/csv",
        ] {
            let (status, body) = get_json(&app, uri).await;
            assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE, "{uri}");
            assert!(body["error"].as_str().unwrap().contains("unavailable"));
        }

        let (status, body) = get_json(&app, "/api/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["metrics_available"], false);
    }

    #[tokio::test]
    async fn forecast_without_history_is_bad_request() {
        let app = app_with(ready_store());
        let (status, body) = get_json(&app, "/api/forecast").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("insufficient history"));

        let (status, _) = get_json(&app, "/api/forecast/budget-runway?budget=100").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn forecast_fits_hourly_history() {
        let clock = Arc::new(ManualClock::default());
        let store = Store::open_in_memory().unwrap().with_clock(clock.clone());
        store.initialize().unwrap();
        let app = app_with(store);
        for _ in 0..8 {
            get_json(&app, "/api/namespaces").await;
            clock.advance(chrono::Duration::hours(1));
        }

        let (status, body) = get_json(&app, "/api/forecast?days=7").await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["data_points_used"], 8);
        assert_eq!(body["trend"], "stable");
        assert_eq!(body["forecast_costs"].as_array().unwrap().len(), 7);

        let (status, body) = get_json(&app, "/api/forecast?days=4294967295").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("365"));

        let (status, body) = get_json(&app, "/api/forecast/seasonal").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("30"));
    }

    #[tokio::test]
    async fn store_failures_map_to_500() {
        let app = app_with(Store::open_in_memory().unwrap());
        let (status, body) = get_json(&app, "/api/history/trends").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn csv_export_is_an_attachment() {
        let app = app_with(ready_store());
        let (status, body, headers) = send(&app, "GET", "/api/export/namespaces/csv").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::CONTENT_TYPE], "text/csv");
        let disposition = headers[header::CONTENT_DISPOSITION].to_str().unwrap();
        assert!(disposition.starts_with("attachment; filename=costkube_namespaces_"));
        assert!(disposition.ends_with(".csv"));

        let text = String::from_utf8(body).unwrap();
        assert!(text.starts_with("namespace,cpu_mcores"));
        assert_eq!(text.lines().count(), 3);
    }

    #[tokio::test]
    async fn prune_reports_deleted_rows() {
        let store = ready_store();
        let app = app_with(store.clone());
        get_json(&app, "/api/namespaces").await;

        let (status, body, _) = send(&app, "POST", "/api/history/prune?days=30").await;
        assert_eq!(status, StatusCode::OK);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["deleted"], 0);
        assert_eq!(body["days"], 30);
    }

    #[tokio::test]
    async fn top_namespaces_and_trends_read_history() {
        let app = app_with(ready_store());
        get_json(&app, "/api/namespaces").await;

        let (_, top) = get_json(&app, "/api/history/top-namespaces?limit=1").await;
        assert_eq!(top["data"].as_array().unwrap().len(), 1);
        assert_eq!(top["data"][0]["namespace"], "production");

        let (_, trends) = get_json(&app, "/api/history/trends").await;
        assert_eq!(trends["timestamps"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn budget_is_required() {
        let app = app_with(ready_store());
        let (status, _, _) = send(&app, "GET", "/api/forecast/budget-runway").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn config_reports_pricing_and_source() {
        let app = app_with(ready_store());
        let (_, body) = get_json(&app, "/api/config").await;
        assert_eq!(body["pricing"]["currency"], "USD");
        assert_eq!(body["source"], "static");
        assert_eq!(body["metrics_available"], true);
    }

    #[tokio::test]
    async fn idle_endpoint_sums_savings() {
        let app = app_with(ready_store());
        let (status, body) = get_json(&app, "/api/recommendations/idle").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 0);
        assert_eq!(body["total_potential_savings"], 0.0);
    }
}
