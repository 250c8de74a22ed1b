//! HTTP server for the enrollment import.
//!
//! # API Endpoints
//!
//! | Method | Path                 | Description                              |
//! |--------|----------------------|------------------------------------------|
//! | GET    | `/health`            | Health check                             |
//! | POST   | `/api/import`        | Upload a roster and enroll its students  |
//! | POST   | `/api/preview`       | Upload a roster, discover classes only   |
//! | GET    | `/api/logs`          | SSE stream for real-time logs/progress   |
//! | GET    | `/api/template.csv`  | Blank CSV roster                         |
//! | GET    | `/api/template.xlsx` | Blank XLSX roster                        |

use axum::{
    extract::{Multipart, State},
    http::{header, Method, StatusCode},
    response::{sse::Event, IntoResponse, Json, Response, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::logs::LOG_BROADCASTER;
use super::types::{error_response, ImportResponse};
use crate::config::EnrollConfig;
use crate::error::{ImportError, ServerError};
use crate::import::{import_bytes, preview, ImportPreview, LogProgress};
use crate::parser::read_bytes;
use crate::registry::Registry;
use crate::template::{csv_template, xlsx_template};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<dyn Registry>,
    pub config: EnrollConfig,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Import(ImportError::Read(_))
            | ServerError::Import(ImportError::NoClassesFound { .. }) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ServerError::Import(ImportError::Registry(_)) => StatusCode::BAD_GATEWAY,
            ServerError::Import(ImportError::Cancelled) => StatusCode::CONFLICT,
            ServerError::Config(_) | ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        eprintln!("❌ {}", self);
        (status, Json(error_response(&self.to_string()))).into_response()
    }
}

/// Build the router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE, header::CONTENT_DISPOSITION]);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/import", post(import_roster))
        .route("/api/preview", post(preview_roster))
        .route("/api/logs", get(sse_logs))
        .route("/api/template.csv", get(template_csv))
        .route("/api/template.xlsx", get(template_xlsx))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(port: u16, state: AppState) -> Result<(), Box<dyn std::error::Error>> {
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    println!("🚀 Enrollment import server running on http://localhost:{}", port);
    println!("   POST /api/import        - Import a roster file");
    println!("   POST /api/preview       - Preview class discovery");
    println!("   GET  /api/logs          - SSE log stream");
    println!("   GET  /api/template.csv  - CSV template");
    println!("   GET  /api/template.xlsx - XLSX template");
    println!("   GET  /health            - Health check");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint
async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "enroll",
        "version": env!("CARGO_PKG_VERSION"),
        "branch": state.config.branch_id,
        "endpoints": {
            "import": "POST /api/import",
            "preview": "POST /api/preview",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(entry) => {
            let json = serde_json::to_string(&entry).ok()?;
            Some(Ok(Event::default().data(json)))
        }
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Pull the `file` field out of a multipart upload.
async fn read_upload(mut multipart: Multipart) -> Result<(String, Vec<u8>), ServerError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| ServerError::BadRequest("Uploaded file has no name".to_string()))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?;
        return Ok((filename, bytes.to_vec()));
    }
    Err(ServerError::BadRequest("No file provided".to_string()))
}

/// Import endpoint
async fn import_roster(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ImportResponse>, ServerError> {
    let (filename, bytes) = read_upload(multipart).await?;

    println!("\n{}", "=".repeat(70));
    println!("📄 NEW IMPORT: {} ({} bytes)", filename, bytes.len());
    println!("{}\n", "=".repeat(70));

    let options = state.config.import_options();
    let summary = import_bytes(
        &bytes,
        &filename,
        state.registry.as_ref(),
        &options,
        &mut LogProgress,
    )
    .await?;

    Ok(Json(ImportResponse::new(filename, &summary)))
}

/// Preview endpoint
async fn preview_roster(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ImportPreview>, ServerError> {
    let (filename, bytes) = read_upload(multipart).await?;
    let parsed = read_bytes(&bytes, &filename).map_err(ImportError::from)?;
    let as_of = state.config.import_options().as_of;
    let result = preview(&parsed.rows, &filename, as_of, &mut LogProgress)?;
    Ok(Json(result))
}

async fn template_csv() -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"roster-template.csv\"",
            ),
        ],
        csv_template(),
    )
}

async fn template_xlsx() -> Result<impl IntoResponse, ServerError> {
    let bytes = xlsx_template().map_err(|e| ServerError::Internal(e.to_string()))?;
    Ok((
        [
            (
                header::CONTENT_TYPE,
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            ),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"roster-template.xlsx\"",
            ),
        ],
        bytes,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RegistryError;
    use crate::models::remote::BranchId;
    use crate::registry::MemoryRegistry;

    async fn spawn_server() -> String {
        let branch = BranchId::new("b1");
        let state = AppState {
            registry: Arc::new(MemoryRegistry::with_default_grade_levels(&branch)),
            config: EnrollConfig {
                branch_id: branch,
                ..EnrollConfig::default()
            },
        };
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(state)).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[test]
    fn test_error_status_mapping() {
        let status = |e: ServerError| e.into_response().status();
        assert_eq!(
            status(ServerError::BadRequest("no file".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(ImportError::NoClassesFound { filename: "x.csv".into() }.into()),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status(ImportError::Registry(RegistryError::Http("down".into())).into()),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(status(ImportError::Cancelled.into()), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_health_and_template() {
        let base = spawn_server().await;
        let client = reqwest::Client::new();

        let health: Value = client
            .get(format!("{}/health", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(health["status"], "ok");
        assert_eq!(health["branch"], "b1");

        let template = client
            .get(format!("{}/api/template.csv", base))
            .send()
            .await
            .unwrap();
        assert!(template.status().is_success());
        assert!(template.text().await.unwrap().starts_with("GRADE 1 - A"));
    }

    async fn upload(base: &str, path: &str, filename: &str, content: &str) -> reqwest::Response {
        let part = reqwest::multipart::Part::bytes(content.as_bytes().to_vec()).file_name(filename.to_string());
        reqwest::Client::new()
            .post(format!("{}{}", base, path))
            .multipart(reqwest::multipart::Form::new().part("file", part))
            .send()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_import_upload() {
        let base = spawn_server().await;
        let response = upload(&base, "/api/import", "roster.csv", "PRE KG - A\nAhmed Mohammed Ali\n").await;
        assert_eq!(response.status(), StatusCode::OK);

        let body: Value = response.json().await.unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["filename"], "roster.csv");
        assert_eq!(body["successCount"], 1);
        assert_eq!(body["failedCount"], 0);
        assert_eq!(body["classes"][0], "PRE-KG - A");
        assert!(body["jobId"].as_str().is_some_and(|id| !id.is_empty()));
    }

    #[tokio::test]
    async fn test_preview_upload() {
        let base = spawn_server().await;
        let response = upload(&base, "/api/preview", "5A.csv", "Sara Adel Nabil,F\n").await;
        assert_eq!(response.status(), StatusCode::OK);

        let body: Value = response.json().await.unwrap();
        assert_eq!(body["classes"][0]["className"], "GRADE 5 - A");
        assert_eq!(body["classes"][0]["students"][0]["gender"], "Female");
    }

    #[tokio::test]
    async fn test_upload_without_class_is_unprocessable() {
        let base = spawn_server().await;
        let response = upload(&base, "/api/import", "roster.csv", "Ahmed Mohammed Ali\nSara Adel Nabil\n").await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body: Value = response.json().await.unwrap();
        assert_eq!(body["status"], "error");
        assert!(body["error"].as_str().unwrap().contains("roster.csv"));
    }

    #[tokio::test]
    async fn test_upload_without_file_is_bad_request() {
        let base = spawn_server().await;
        let form = reqwest::multipart::Form::new().text("note", "no roster attached");
        let response = reqwest::Client::new()
            .post(format!("{}/api/import", base))
            .multipart(form)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
