use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use std::{net::SocketAddr, sync::Arc};
use tower_http::services::{ServeDir, ServeFile};
use tracing::{info, warn};
use trendify::batch::{BatchPredictor, HttpBatchBackend};
use trendify::config::EngineConfig;
use trendify::engine::rng_from_seed;
use trendify::store::JsonFileStore;
use trendify::{EngineError, HistoryFilter, ModelId, ViralityEngine};

use crate::api::{
    ApiContent, BatchApiRequest, BatchApiResponse, CompareResponse, ErrorResponse, HistoryQuery,
    MetricsResponse, ModelMetricsResponse, PredictRequest, PredictResponse,
};

type ApiError = (StatusCode, Json<ErrorResponse>);

#[derive(Clone)]
struct AppState {
    engine: Arc<ViralityEngine<JsonFileStore>>,
    batch: Arc<BatchPredictor<HttpBatchBackend>>,
    seed: Option<u64>,
}

pub async fn serve(
    args: crate::ServeArgs,
    engine: Arc<ViralityEngine<JsonFileStore>>,
    config: EngineConfig,
) -> Result<(), String> {
    let backend = HttpBatchBackend::from_config(&config.batch).map_err(|err| err.to_string())?;
    let state = AppState {
        engine,
        batch: Arc::new(BatchPredictor::new(backend)),
        seed: config.scoring.seed,
    };

    let mut app = Router::new()
        .route("/api/health", get(health))
        .route("/api/predict", post(predict_handler))
        .route("/api/compare", post(compare_handler))
        .route("/api/predict/batch", post(batch_handler))
        .route("/api/history", get(history_handler))
        .route("/api/metrics", get(metrics_handler))
        .route("/api/metrics/:model", get(model_metrics_handler))
        .with_state(state);

    if let Some(web_root) = args.web_root {
        let index_path = format!("{}/index.html", web_root.trim_end_matches('/'));
        let static_service = ServeDir::new(web_root).not_found_service(ServeFile::new(index_path));
        app = app.nest_service("/", static_service);
    }

    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .map_err(|err| format!("invalid bind address: {}", err))?;
    info!(%addr, "listening");

    axum::serve(tokio::net::TcpListener::bind(addr).await.map_err(|err| {
        format!("failed to bind server: {}", err)
    })?, app)
    .await
    .map_err(|err| format!("server error: {}", err))?;

    Ok(())
}

async fn health() -> impl IntoResponse {
    StatusCode::OK
}

async fn predict_handler(
    State(state): State<AppState>,
    Json(request): Json<PredictRequest>,
) -> Result<Json<PredictResponse>, ApiError> {
    let (content, model) = request.into_parts().map_err(engine_error)?;
    let mut rng = rng_from_seed(state.seed);
    let outcome = state
        .engine
        .predict(&content, model, &mut rng)
        .await
        .map_err(engine_error)?;
    Ok(Json(PredictResponse::from_outcome(outcome)))
}

async fn compare_handler(
    State(state): State<AppState>,
    Json(request): Json<ApiContent>,
) -> Result<Json<CompareResponse>, ApiError> {
    let content = request.into_content().map_err(engine_error)?;
    let mut rng = rng_from_seed(state.seed);
    let results = state
        .engine
        .compare(&content, &mut rng)
        .await
        .map_err(engine_error)?;
    Ok(Json(CompareResponse { results }))
}

async fn batch_handler(
    State(state): State<AppState>,
    Json(request): Json<BatchApiRequest>,
) -> Result<Json<BatchApiResponse>, ApiError> {
    let model = match request.model.as_deref() {
        Some(value) => ModelId::from_str(value).map_err(engine_error)?,
        None => ModelId::LogisticRegression,
    };
    if request.rows.is_empty() {
        return Err(engine_error(EngineError::InvalidInput(
            "rows must not be empty".to_string(),
        )));
    }
    let response = state
        .batch
        .predict(model, request.rows)
        .await
        .map_err(engine_error)?;
    Ok(Json(BatchApiResponse::from_response(response)))
}

async fn history_handler(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<trendify::history::HistoryView>, ApiError> {
    let filter = HistoryFilter::parse(query.filter.as_deref().unwrap_or("all"));
    let view = match query.limit {
        Some(limit) => state.engine.history_with_limit(&filter, limit).await,
        None => state.engine.history(&filter).await,
    }
    .map_err(engine_error)?;
    Ok(Json(view))
}

async fn metrics_handler(State(state): State<AppState>) -> Result<Json<MetricsResponse>, ApiError> {
    let models = state.engine.roster().await.map_err(engine_error)?;
    Ok(Json(MetricsResponse { models }))
}

async fn model_metrics_handler(
    State(state): State<AppState>,
    Path(model): Path<String>,
) -> Result<Json<ModelMetricsResponse>, ApiError> {
    let (model, breakdown) = state
        .engine
        .metrics_for(&model)
        .await
        .map_err(engine_error)?;
    Ok(Json(ModelMetricsResponse { model, breakdown }))
}

fn status_for(err: &EngineError) -> StatusCode {
    match err {
        EngineError::UnknownModel(_) | EngineError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        EngineError::MismatchedRowCount { .. }
        | EngineError::InvalidConfidence { .. }
        | EngineError::Backend(_) => StatusCode::BAD_GATEWAY,
        EngineError::PersistenceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        EngineError::DivideByZeroClass { .. }
        | EngineError::InvalidMatrix(_)
        | EngineError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn engine_error(err: EngineError) -> ApiError {
    let status = status_for(&err);
    if status.is_server_error() {
        warn!(status = status.as_u16(), "request failed: {}", err);
    }
    (status, Json(ErrorResponse { error: err.to_string() }))
}
