//! Thin Axum REST mirror of the MCP tool, for clients that prefer plain
//! HTTP over the MCP transport.
//!
//! Grounded on the teacher's `server.rs` (same `AppState`/`AppError`/CORS
//! shape, same error-contract JSON), narrowed from four routes down to
//! one (`/tools/context_query`) since ctx-sys exposes a single operation.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use ctx_sys_core::api::{QueryContextOptions, QueryContextResult};
use ctx_sys_core::error::Error as CoreError;
use ctx_sys_core::project::ProjectHandle;
use rmcp::transport::streamable_http_server::session::local::LocalSessionManager;
use rmcp::transport::streamable_http_server::StreamableHttpService;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};

use crate::engine::ContextEngine;
use crate::mcp::McpBridge;

#[derive(Clone)]
struct AppState {
    engine: Arc<ContextEngine>,
}

/// Starts one HTTP server carrying both transports: the MCP streamable-HTTP
/// endpoint at `/mcp` (for Cursor/Claude-style MCP clients) and the plain
/// REST mirror at `/tools/context_query` (for anything that prefers a bare
/// JSON POST over the MCP session protocol).
pub async fn run_server(bind_addr: &str, engine: Arc<ContextEngine>, project: ProjectHandle) -> anyhow::Result<()> {
    let state = AppState { engine: engine.clone() };

    let mcp_service = StreamableHttpService::new(
        move || Ok(McpBridge::new(engine.clone(), project.clone())),
        LocalSessionManager::default().into(),
        Default::default(),
    );

    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    let app = Router::new()
        .route("/tools/context_query", post(handle_context_query))
        .route("/health", get(handle_health))
        .nest_service("/mcp", mcp_service)
        .layer(cors)
        .with_state(state);

    tracing::info!(bind_addr, "ctx-sys HTTP server listening (REST at /tools, MCP at /mcp)");
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody { error: ErrorDetail { code: self.code, message: self.message } };
        (self.status, Json(body)).into_response()
    }
}

impl From<CoreError> for AppError {
    fn from(e: CoreError) -> Self {
        let status = match &e {
            CoreError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            CoreError::NotFound { .. } => StatusCode::NOT_FOUND,
            CoreError::SchemaError { .. } => StatusCode::CONFLICT,
            CoreError::DimensionMismatch { .. } => StatusCode::BAD_REQUEST,
            CoreError::Cancelled => StatusCode::REQUEST_TIMEOUT,
            CoreError::StorageError(_) | CoreError::ProviderError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        AppError { status, code: e.code().to_string(), message: e.to_string() }
    }
}

async fn handle_health() -> impl IntoResponse {
    Json(serde_json::json!({ "version": env!("CARGO_PKG_VERSION") }))
}

async fn handle_context_query(
    State(state): State<AppState>,
    Json(opts): Json<QueryContextOptions>,
) -> Result<Json<QueryContextResult>, AppError> {
    if opts.query.trim().is_empty() {
        return Err(AppError {
            status: StatusCode::BAD_REQUEST,
            code: "invalid_input".to_string(),
            message: "query must not be empty".to_string(),
        });
    }

    let project = ProjectHandle::new(opts.project.clone());
    let result = state
        .engine
        .query_context(&project, opts, CancellationToken::new())
        .await?;
    Ok(Json(result))
}
