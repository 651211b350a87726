use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use mcpsearch_core::autocomplete::{autocomplete_from_gateway, render_autocomplete_script};
use mcpsearch_core::markup::escape_html;
use mcpsearch_core::request::{LookupParams, LookupRequest, render_lookup};
use mcpsearch_core::store::SqliteGateway;
use mcpsearch_core::table::RenderOptions;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{error, info};

type SharedState = Arc<AppState>;

const BACK_LINK: &str = "<p><a href=\"javascript:history.go(-1)\">Back</a></p>";
const GENERIC_FAILURE: &str = "The chronology database could not be searched.";

#[derive(Debug, Clone)]
pub struct WebConfig {
    pub addr: SocketAddr,
    pub db_path: PathBuf,
    pub options: RenderOptions,
    pub autocomplete_limit: usize,
}

#[derive(Debug, Clone)]
struct AppState {
    db_path: PathBuf,
    options: RenderOptions,
    autocomplete_limit: usize,
}

#[derive(Debug)]
pub enum WebError {
    Io(std::io::Error),
}

impl fmt::Display for WebError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebError::Io(err) => write!(f, "io error: {err}"),
        }
    }
}

impl std::error::Error for WebError {}

impl From<std::io::Error> for WebError {
    fn from(value: std::io::Error) -> Self {
        WebError::Io(value)
    }
}

pub async fn serve(config: WebConfig) -> Result<(), WebError> {
    let state = Arc::new(AppState {
        db_path: config.db_path.clone(),
        options: config.options,
        autocomplete_limit: config.autocomplete_limit,
    });
    let router = build_router(state);
    info!(
        %config.addr,
        db = %config.db_path.display(),
        batched = config.options.batch_lookups,
        "binding HTTP listener"
    );
    let listener = TcpListener::bind(config.addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("HTTP server exited");
    Ok(())
}

/// Error page: a short message followed by a link back to the form.
#[derive(Debug)]
struct PageError {
    status: StatusCode,
    message: String,
}

impl PageError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: GENERIC_FAILURE.to_string(),
        }
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        let body = format!("<p>{}</p>{BACK_LINK}", escape_html(&self.message));
        (self.status, Html(body)).into_response()
    }
}

fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(search))
        .route("/search", get(search))
        .route("/autocomplete.js", get(autocomplete_script))
        .route("/healthz", get(health))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().include_headers(true)),
        )
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        if let Ok(mut stream) = signal(SignalKind::terminate()) {
            let _ = stream.recv().await;
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "service": "mcpsearch" }))
}

async fn search(
    State(state): State<SharedState>,
    Query(params): Query<LookupParams>,
) -> Result<Html<String>, PageError> {
    let request = match LookupRequest::from_params(&params) {
        Ok(Some(request)) => request,
        Ok(None) => return Ok(Html(String::new())),
        Err(err) => return Err(PageError::bad_request(err.to_string())),
    };

    let db_path = state.db_path.clone();
    let options = state.options;
    let rendered = tokio::task::spawn_blocking(move || {
        let gateway = SqliteGateway::open(&db_path)?;
        render_lookup(&gateway, &request, options)
    })
    .await;

    match rendered {
        Ok(Ok(html)) => Ok(Html(html)),
        Ok(Err(err)) => {
            error!(error = %err, "lookup failed");
            Err(PageError::internal())
        }
        Err(err) => {
            error!(error = %err, "lookup task panicked");
            Err(PageError::internal())
        }
    }
}

async fn autocomplete_script(State(state): State<SharedState>) -> Result<Response, PageError> {
    let db_path = state.db_path.clone();
    let limit = state.autocomplete_limit;
    let built = tokio::task::spawn_blocking(move || {
        let gateway = SqliteGateway::open(&db_path)?;
        autocomplete_from_gateway(&gateway, limit)
    })
    .await;

    let dictionary = match built {
        Ok(Ok(dictionary)) => dictionary,
        Ok(Err(err)) => {
            error!(error = %err, "autocomplete lookup failed");
            return Err(PageError::internal());
        }
        Err(err) => {
            error!(error = %err, "autocomplete task panicked");
            return Err(PageError::internal());
        }
    };
    let script = render_autocomplete_script(&dictionary).map_err(|err| {
        error!(error = %err, "failed to serialize autocomplete dictionary");
        PageError::internal()
    })?;
    Ok((
        [(header::CONTENT_TYPE, "application/javascript; charset=utf-8")],
        script,
    )
        .into_response())
}
