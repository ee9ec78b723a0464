use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::analysis::Analysis;
use crate::columns::classify;
use crate::config::AnalysisConfig;
use crate::downloader::{to_csv, to_xlsx};
use crate::error::{ExportError, LoadError};
use crate::loader::{load_bytes, load_url};
use crate::row::Row;
use crate::session::{name_from_url, prepare, Dashboard, Ingested};

const UPLOAD_LIMIT: usize = 64 * 1024 * 1024;

pub struct AppState {
    dashboard: Mutex<Dashboard>,
    upload_limit: usize,
}

impl AppState {
    pub fn new(config: AnalysisConfig) -> Self {
        AppState {
            dashboard: Mutex::new(Dashboard::new(config)),
            upload_limit: UPLOAD_LIMIT,
        }
    }

    /// Maximum request body size for uploads, in bytes.
    pub fn with_upload_limit(mut self, limit: usize) -> Self {
        self.upload_limit = limit;
        self
    }

    fn dashboard(&self) -> MutexGuard<'_, Dashboard> {
        self.dashboard.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[derive(Deserialize)]
struct ExportQuery {
    format: Option<String>,
}

#[derive(Deserialize)]
struct FetchRequest {
    url: String,
}

#[derive(Serialize)]
struct StatusResponse {
    status: String,
    message: Option<String>,
}

#[derive(Serialize)]
struct UploadResponse {
    status: String,
    name: String,
    layout: String,
    records: usize,
}

fn error_response(code: StatusCode, message: impl Into<String>) -> Response {
    (
        code,
        Json(StatusResponse {
            status: "error".to_string(),
            message: Some(message.into()),
        }),
    )
        .into_response()
}

fn no_data() -> Response {
    error_response(StatusCode::NOT_FOUND, "No data loaded")
}

/// Build the router over a shared dashboard.
pub fn router(state: Arc<AppState>) -> Router {
    let upload_limit = state.upload_limit;
    Router::new()
        .route("/api/upload", post(upload))
        .route("/api/fetch", post(fetch))
        .route("/api/analysis", get(get_analysis))
        .route("/api/map", get(get_map))
        .route("/api/columns", get(get_columns))
        .route("/api/meter-history", get(get_meter_history))
        .route("/api/export/:subset", get(export_subset))
        .layer(DefaultBodyLimit::max(upload_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run(addr: &str, config: AnalysisConfig) -> Result<(), Box<dyn std::error::Error>> {
    let app_state = Arc::new(AppState::new(config));
    let app = router(app_state);

    let listener = TcpListener::bind(addr).await?;
    info!("Listening on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn upload(State(state): State<Arc<AppState>>, mut multipart: Multipart) -> Response {
    let mut file: Option<(String, Vec<u8>)> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return error_response(e.status(), e.body_text()),
        };
        if field.name() != Some("file") {
            continue;
        }
        let name = field.file_name().unwrap_or("upload.csv").to_string();
        match field.bytes().await {
            Ok(bytes) => file = Some((name, bytes.to_vec())),
            Err(e) => return error_response(e.status(), e.body_text()),
        }
    }

    let Some((name, bytes)) = file else {
        return error_response(StatusCode::BAD_REQUEST, "No file data received");
    };

    let config = state.dashboard().config().clone();
    let prepared = tokio::task::spawn_blocking(move || {
        let rows = load_bytes(&name, &bytes)
            .inspect_err(|e| warn!("Upload of {} rejected: {}", name, e))?;
        prepare(name, rows, &config)
    })
    .await;

    publish(&state, prepared)
}

async fn fetch(State(state): State<Arc<AppState>>, Json(request): Json<FetchRequest>) -> Response {
    let rows = match load_url(&request.url).await {
        Ok(rows) => rows,
        Err(e) => {
            warn!("Fetch of {} failed: {}", request.url, e);
            return load_error_response(&e);
        }
    };

    let name = name_from_url(&request.url);
    let config = state.dashboard().config().clone();
    let prepared = tokio::task::spawn_blocking(move || prepare(name, rows, &config)).await;

    publish(&state, prepared)
}

fn publish(
    state: &AppState,
    prepared: Result<Result<Ingested, LoadError>, tokio::task::JoinError>,
) -> Response {
    match prepared {
        Ok(Ok(ingested)) => {
            let dataset = state.dashboard().apply(ingested);
            Json(UploadResponse {
                status: "ok".to_string(),
                name: dataset.name.clone(),
                layout: format!("{:?}", dataset.layout),
                records: dataset.rows.len(),
            })
            .into_response()
        }
        Ok(Err(e)) => load_error_response(&e),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

fn load_error_response(e: &LoadError) -> Response {
    let code = match e {
        LoadError::Fetch(_) => StatusCode::BAD_GATEWAY,
        LoadError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        LoadError::Format(_) | LoadError::Empty { .. } => StatusCode::UNPROCESSABLE_ENTITY,
    };
    error_response(code, e.to_string())
}

async fn get_analysis(State(state): State<Arc<AppState>>) -> Response {
    match state.dashboard().analysis() {
        Some(analysis) => Json(analysis.as_ref()).into_response(),
        None => no_data(),
    }
}

async fn get_map(State(state): State<Arc<AppState>>) -> Response {
    let dashboard = state.dashboard();
    match dashboard.analysis() {
        Some(analysis) => Json(analysis.map_points(dashboard.config())).into_response(),
        None => no_data(),
    }
}

async fn get_columns(State(state): State<Arc<AppState>>) -> Response {
    match state.dashboard().dcus() {
        Some(dataset) => Json(classify(&dataset.rows)).into_response(),
        None => no_data(),
    }
}

async fn get_meter_history(State(state): State<Arc<AppState>>) -> Response {
    match state.dashboard().meter_summary() {
        Some(summary) => Json(summary.as_ref()).into_response(),
        None => no_data(),
    }
}

async fn export_subset(
    Path(subset): Path<String>,
    Query(params): Query<ExportQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let Some(analysis) = state.dashboard().analysis() else {
        return no_data();
    };

    let format = params.format.as_deref().unwrap_or("csv");
    match export(&analysis, &subset, format) {
        Ok(response) => response,
        Err(e @ ExportError::UnknownSubset(_)) => error_response(StatusCode::NOT_FOUND, e.to_string()),
        Err(e @ ExportError::Empty) => error_response(StatusCode::NOT_FOUND, e.to_string()),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

fn export(analysis: &Analysis, subset: &str, format: &str) -> Result<Response, ExportError> {
    let selection = analysis
        .selection(subset)
        .ok_or_else(|| ExportError::UnknownSubset(subset.to_string()))?;
    let rows: Vec<&Row> = analysis.rows(&selection).collect();

    let response = if format.eq_ignore_ascii_case("xlsx") {
        let buffer = to_xlsx(&rows)?;
        (
            [
                (
                    header::CONTENT_TYPE,
                    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet".to_string(),
                ),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}.xlsx\"", subset),
                ),
            ],
            buffer,
        )
            .into_response()
    } else {
        let csv = to_csv(&rows)?;
        (
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}.csv\"", subset),
                ),
            ],
            csv,
        )
            .into_response()
    };

    Ok(response)
}
