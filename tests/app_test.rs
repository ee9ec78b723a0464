#![cfg(feature = "web")]

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::routing::get;
use axum::Router;
use dcu_dashboard::app::{router, AppState};
use dcu_dashboard::config::AnalysisConfig;
use dcu_dashboard::error::LoadError;
use dcu_dashboard::session::Dashboard;
use rust_xlsxwriter::Workbook;
use serde_json::Value;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceExt;

const DCU_EXPORT: &str = "\
DCU;Status;Meters 01.01.2024;Meters 02.01.2024
A;Online;100;900
B;Offline;0;0
";

fn app() -> Router {
    router(Arc::new(AppState::new(AnalysisConfig::default())))
}

fn upload_request(file_name: &str, content: &[u8]) -> Request<Body> {
    multipart_request("file", file_name, content)
}

fn multipart_request(field: &str, file_name: &str, content: &[u8]) -> Request<Body> {
    let boundary = "dcu-dashboard-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/api/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn fetch_request(url: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/fetch")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::json!({ "url": url }).to_string()))
        .unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

async fn send_json(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, body) = send(app, request).await;
    (status, serde_json::from_slice(&body).unwrap())
}

fn workbook_bytes() -> Vec<u8> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    for (col, name) in ["DCU", "Status", "Meters 01.01.2024"].iter().enumerate() {
        worksheet.write_string(0, col as u16, *name).unwrap();
    }
    worksheet.write_string(1, 0, "R1").unwrap();
    worksheet.write_string(1, 1, "online").unwrap();
    worksheet.write_number(1, 2, 900.0).unwrap();
    workbook.save_to_buffer().unwrap()
}

/// Serves a good workbook, a broken one and nothing else, on a random local port.
async fn spawn_export_host() -> String {
    let host = Router::new()
        .route("/exports/carga.xlsx", get(|| async { workbook_bytes() }))
        .route("/exports/broken.xlsx", get(|| async { "not a workbook" }));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, host).await.unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn analysis_is_404_until_something_is_loaded() {
    let app = app();
    for uri in ["/api/analysis", "/api/map", "/api/columns", "/api/meter-history", "/api/export/all"] {
        let (status, body) = send_json(&app, get_request(uri)).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{}", uri);
        assert_eq!(body["status"], "error");
        assert_eq!(body["message"], "No data loaded");
    }
}

#[tokio::test]
async fn csv_upload_publishes_the_analysis() {
    let app = app();
    let (status, body) = send_json(&app, upload_request("carga.csv", DCU_EXPORT.as_bytes())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "carga.csv");
    assert_eq!(body["layout"], "DcuLoadWide");
    assert_eq!(body["records"], 2);

    let (status, analysis) = send_json(&app, get_request("/api/analysis")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(analysis["total"], 2);
    assert_eq!(analysis["load"]["overloaded"], serde_json::json!([0]));
}

#[tokio::test]
async fn upload_dispatches_on_the_file_name() {
    let app = app();
    send_json(&app, upload_request("carga.csv", DCU_EXPORT.as_bytes())).await;

    // same text, but named as a workbook: must go to the spreadsheet reader and fail
    let (status, body) = send_json(&app, upload_request("carga.xlsx", DCU_EXPORT.as_bytes())).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["message"].as_str().unwrap().starts_with("invalid spreadsheet"));

    let (status, analysis) = send_json(&app, get_request("/api/analysis")).await;
    assert_eq!(status, StatusCode::OK, "previous analysis is kept");
    assert_eq!(analysis["total"], 2);

    let (status, body) = send_json(&app, upload_request("carga.xlsx", &workbook_bytes())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["records"], 1);
}

#[tokio::test]
async fn upload_without_a_file_field_is_rejected() {
    let app = app();
    let request = multipart_request("notes", "carga.csv", DCU_EXPORT.as_bytes());
    let (status, body) = send_json(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "No file data received");
}

#[tokio::test]
async fn oversized_upload_reports_the_limit() {
    let state = AppState::new(AnalysisConfig::default()).with_upload_limit(64);
    let app = router(Arc::new(state));

    let big = DCU_EXPORT.repeat(10);
    let (status, body) = send_json(&app, upload_request("carga.csv", big.as_bytes())).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_ne!(body["message"], "No file data received");
}

#[tokio::test]
async fn export_endpoints() {
    let app = app();
    send_json(&app, upload_request("carga.csv", DCU_EXPORT.as_bytes())).await;

    let (status, body) = send_json(&app, get_request("/api/export/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "unknown subset: nope");

    let (status, body) = send(&app, get_request("/api/export/overloaded")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        String::from_utf8(body).unwrap(),
        "DCU,Status,Meters 01.01.2024,Meters 02.01.2024\nA,Online,100,900\n"
    );

    let (status, body) = send(&app, get_request("/api/export/all?format=xlsx")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..2], b"PK", "xlsx is a zip archive");

    let (status, _) = send_json(&app, get_request("/api/export/underloaded")).await;
    assert_eq!(status, StatusCode::NOT_FOUND, "empty subset");
}

#[tokio::test]
async fn fetch_loads_a_hosted_workbook() {
    let host = spawn_export_host().await;
    let app = app();

    let (status, body) = send_json(&app, fetch_request(&format!("{host}/exports/carga.xlsx"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "carga.xlsx");

    let (status, body) = send_json(&app, fetch_request(&format!("{host}/exports/missing.xlsx"))).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["status"], "error");

    let (_, analysis) = send_json(&app, get_request("/api/analysis")).await;
    assert_eq!(analysis["load"]["overloaded"], serde_json::json!([0]));
}

#[tokio::test]
async fn ingest_url_keeps_previous_state_on_failure() {
    let host = spawn_export_host().await;
    let mut dashboard = Dashboard::new(AnalysisConfig::default());

    let dataset = dashboard
        .ingest_url(&format!("{host}/exports/carga.xlsx"))
        .await
        .unwrap();
    assert_eq!(dataset.name, "carga.xlsx");
    let before = dashboard.analysis().unwrap();
    assert_eq!(before.load.overloaded.len(), 1);

    let err = dashboard
        .ingest_url(&format!("{host}/exports/broken.xlsx"))
        .await
        .unwrap_err();
    assert!(matches!(err, LoadError::Format(_)), "got {:?}", err);

    let err = dashboard
        .ingest_url(&format!("{host}/exports/missing.xlsx"))
        .await
        .unwrap_err();
    assert!(matches!(err, LoadError::Fetch(_)), "got {:?}", err);

    let err = dashboard
        .ingest_url("http://127.0.0.1:1/carga.xlsx")
        .await
        .unwrap_err();
    assert!(matches!(err, LoadError::Fetch(_)), "got {:?}", err);

    assert_eq!(*dashboard.analysis().unwrap(), *before);
}
