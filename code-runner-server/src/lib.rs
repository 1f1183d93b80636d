use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use code_runner::{decode_request, CodeExecutionService, ExecutionResult};
use serde_json::json;
use std::{future::Future, net::SocketAddr, sync::Arc};
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

pub mod config;

pub use config::ServerConfig;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Execution(#[from] code_runner::Error),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Server error: {0}")]
    ServerError(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServerError::Execution(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Clone)]
pub struct AppState {
    service: Arc<CodeExecutionService>,
}

/// `POST /` runs a snippet; every other path or method is a 404.
pub fn create_app(service: CodeExecutionService, max_body_bytes: usize) -> Router {
    let state = AppState {
        service: Arc::new(service),
    };

    Router::new()
        .route("/", post(execute).fallback(not_found))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// A bound listener plus the router it will serve.
pub struct Server {
    listener: TcpListener,
    app: Router,
}

impl Server {
    pub async fn bind(addr: SocketAddr, app: Router) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::ServerError(format!("Failed to bind {}: {}", addr, e)))?;
        Ok(Self { listener, app })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.listener
            .local_addr()
            .map_err(|e| ServerError::ServerError(e.to_string()))
    }

    /// Serve until `shutdown` resolves. In-flight requests are allowed to finish.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        info!("Starting code runner on {}", self.local_addr()?);
        axum::serve(self.listener, self.app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| ServerError::ServerError(e.to_string()))
    }
}

async fn execute(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ExecutionResult>, ServerError> {
    let request = decode_request(&body)
        .map_err(code_runner::Error::from)
        .inspect_err(|e| warn!("Rejected request: {}", e))?;

    let result = state.service.execute(request).await.map_err(|e| {
        error!("Execution error: {}", e);
        ServerError::Execution(e)
    })?;

    Ok(Json(result))
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Not Found")
}
