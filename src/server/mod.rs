//! HTTP delivery layer
//!
//! Serves the input page, accepts submissions and streams back the filled
//! PDF. Every request error is flashed to the user and redirected to the
//! input page; none is fatal to the server.

pub mod flash;
pub mod page;

use crate::config::AppConfig;
use crate::error::{Error, Result as FormResult};
use crate::form::{FormSchema, Submission};
use crate::output::OutputStore;
use crate::pipeline::Pipeline;
use anyhow::{Context, Result};
use axum::{
    body::{Body, Bytes},
    extract::{rejection::BytesRejection, DefaultBodyLimit, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use flash::Flash;
use serde::Serialize;
use std::sync::Arc;
use tokio::signal;
use tower_http::trace::TraceLayer;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AppConfig,
    pipeline: Pipeline,
    output: Option<Arc<OutputStore>>,
}

impl AppState {
    pub fn new(config: AppConfig, pipeline: Pipeline, output: Option<Arc<OutputStore>>) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                pipeline,
                output,
            }),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.inner.pipeline
    }

    pub fn output(&self) -> Option<&OutputStore> {
        self.inner.output.as_deref()
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    fields: usize,
}

/// Build the router with all routes and layers
pub fn router(state: AppState) -> Router {
    let body_limit = state.config().server.max_body_bytes;

    Router::new()
        .route("/", get(index))
        .route("/fill_form", post(fill_form))
        .route("/health", get(health_check))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        fields: state.pipeline().schema().fields().len(),
    })
}

async fn index(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let secret = &state.config().server.secret_key;

    let cookies = cookie_header(&headers);
    let flash_present = cookies.is_some_and(|c| {
        c.split(';')
            .any(|pair| pair.trim().split_once('=').is_some_and(|(name, _)| name == flash::FLASH_COOKIE))
    });
    let flash = cookies.and_then(|c| Flash::from_cookie_header(c, secret));

    let html = page::render(state.pipeline().schema(), flash.as_ref());
    let mut response = Html(html).into_response();

    if flash_present {
        if let Ok(value) = HeaderValue::from_str(&flash::clear_cookie()) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }
    response
}

async fn fill_form(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: std::result::Result<Bytes, BytesRejection>,
) -> Response {
    // Oversized or unreadable bodies go through the same flash-and-redirect
    let result = match body {
        Ok(body) => handle_submission(&state, &headers, &body).await,
        Err(rejection) => Err(Error::InvalidSubmission {
            reason: rejection.body_text(),
        }),
    };

    match result {
        Ok(response) => response,
        Err(e) => {
            let flash = match &e {
                Error::MissingApiKey | Error::InvalidSubmission { .. } => {
                    tracing::warn!(error = %e, "Submission rejected");
                    Flash::warning(e.client_message())
                }
                _ => {
                    tracing::error!(error = %e, "Form fill failed");
                    Flash::danger(e.client_message())
                }
            };
            redirect_with_flash(&state, &flash)
        }
    }
}

async fn handle_submission(
    state: &AppState,
    headers: &HeaderMap,
    body: &[u8],
) -> FormResult<Response> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_ascii_lowercase();
    if !content_type.starts_with("application/x-www-form-urlencoded") {
        return Err(Error::InvalidSubmission {
            reason: format!("unsupported content type {:?}", content_type),
        });
    }

    let submission = Submission::from_urlencoded(body);
    tracing::debug!(pairs = submission.len(), "Received submission");

    let filled = state.pipeline().run(&submission).await?;

    if let Some(store) = state.output() {
        if let Err(e) = store.save(&filled.pdf).await {
            tracing::warn!(error = %e, "Failed to archive filled form");
        }
    }

    let filename = attachment_name();
    tracing::info!(
        %filename,
        completed = filled.completed.len(),
        "Returning filled form"
    );

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/pdf")
        .header(header::CONTENT_LENGTH, filled.pdf.len())
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename),
        )
        .header(header::CACHE_CONTROL, "no-store")
        .body(Body::from(filled.pdf))
        .map_err(|e| Error::Internal {
            reason: e.to_string(),
        })
}

fn redirect_with_flash(state: &AppState, flash: &Flash) -> Response {
    let mut response = (StatusCode::SEE_OTHER, [(header::LOCATION, "/")]).into_response();
    match flash
        .to_set_cookie(&state.config().server.secret_key)
        .and_then(|cookie| HeaderValue::from_str(&cookie).ok())
    {
        Some(value) => {
            response.headers_mut().insert(header::SET_COOKIE, value);
        }
        None => tracing::warn!("Flash cookie could not be built"),
    }
    response
}

fn cookie_header(headers: &HeaderMap) -> Option<&str> {
    headers.get(header::COOKIE).and_then(|v| v.to_str().ok())
}

/// `filled_form_<YYYYMMDD>_<hex>.pdf`
fn attachment_name() -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "filled_form_{}_{}.pdf",
        chrono::Local::now().format("%Y%m%d"),
        &hex[..8]
    )
}

/// Load the schema, validate it against the template, and build shared state
pub async fn build_state(config: AppConfig) -> Result<AppState> {
    let schema = match &config.form.schema_path {
        Some(path) => FormSchema::from_json_file(path)
            .with_context(|| format!("Failed to load schema from {}", path.display()))?,
        None => FormSchema::builtin(),
    };

    let pipeline = Pipeline::new(schema, &config)?;
    pipeline
        .validate_template()
        .await
        .with_context(|| {
            format!(
                "Template {} does not fit the field schema",
                pipeline.template_path().display()
            )
        })?;

    let output = OutputStore::from_config(&config.output).map(Arc::new);
    if let Some(store) = &output {
        tracing::info!(dir = %store.dir().display(), "Archiving filled forms");
    }

    Ok(AppState::new(config, pipeline, output))
}

/// Run the HTTP server until Ctrl+C or SIGTERM
pub async fn run_server(config: AppConfig) -> Result<()> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let sweep_interval = config.output.sweep_interval;

    let state = build_state(config).await?;

    let sweeper = state
        .inner
        .output
        .clone()
        .map(|store| store.spawn_sweeper(sweep_interval));

    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Court form filler listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = sweeper {
        handle.abort();
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}
