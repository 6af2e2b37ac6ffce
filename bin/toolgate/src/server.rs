//! HTTP surface: one route per capability plus the unified `/browser_tool`
//! dispatch. Every handler funnels into the same dispatcher, so the dedicated
//! routes and the unified route produce identical bodies for identical actions.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use toolgate_core::{ActionRequest, Config, UnifiedResponse};
use toolgate_tools::{
    BrowserManager, Dispatcher, LlamaSummarizer, PageBackend, SearchBackend, SearxClient,
    SessionGauge, SummaryBackend,
};
use tower_http::cors::CorsLayer;

#[derive(Clone)]
struct AppState {
    dispatcher: Arc<Dispatcher>,
    gauge: SessionGauge,
    search_available: bool,
    summarize_available: bool,
    started: Instant,
}

pub async fn run(config: Config) -> anyhow::Result<()> {
    let search: Option<Arc<dyn SearchBackend>> = match &config.searxng_url {
        Some(base_url) => match SearxClient::new(base_url.clone()) {
            Ok(client) => Some(Arc::new(client)),
            Err(e) => {
                tracing::warn!(error = %e, "search client unavailable");
                None
            }
        },
        None => None,
    };

    // The model is the one process-wide shared resource: loaded here once,
    // dropped at shutdown. A failed load disables only summarization.
    let summarizer: Option<Arc<dyn SummaryBackend>> = match &config.llm_model_path {
        Some(path) => match LlamaSummarizer::load(path) {
            Ok(s) => Some(Arc::new(s)),
            Err(e) => {
                tracing::warn!(error = %e, "summarizer unavailable");
                None
            }
        },
        None => None,
    };

    let browser = Arc::new(BrowserManager::new());
    let gauge = browser.gauge();

    let state = AppState {
        search_available: search.is_some(),
        summarize_available: summarizer.is_some(),
        dispatcher: Arc::new(Dispatcher::new(
            search,
            browser as Arc<dyn PageBackend>,
            summarizer,
        )),
        gauge,
        started: Instant::now(),
    };

    let app = Router::new()
        .route("/web_search", post(handle_web_search))
        .route("/navigate", post(handle_navigate))
        .route("/extract_content", post(handle_extract_content))
        .route("/summarize", post(handle_summarize))
        .route("/crawl", post(handle_crawl))
        .route("/browser_tool", post(handle_browser_tool))
        .route("/health", get(handle_health))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let bind_addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "toolgate listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await?;

    Ok(())
}

/// Dispatch a request and map its outcome onto an HTTP status.
async fn dispatch(state: &AppState, req: ActionRequest) -> Response {
    let resp = state.dispatcher.dispatch(&req).await;
    (status_for(&resp), Json(resp)).into_response()
}

fn status_for(resp: &UnifiedResponse) -> StatusCode {
    match resp.error() {
        None => StatusCode::OK,
        Some(err) => match err.kind.as_str() {
            "invalid_action" | "missing_field" | "empty_input" => StatusCode::BAD_REQUEST,
            // Soft failure: best-effort content travels with the error object.
            "element_wait_timeout" => StatusCode::OK,
            // Unconfigured capabilities, not transient backend faults.
            "model_unavailable" | "search_unavailable" => StatusCode::SERVICE_UNAVAILABLE,
            "navigation_error" | "search_backend_error" => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        },
    }
}

async fn handle_web_search(
    State(state): State<AppState>,
    Json(mut req): Json<ActionRequest>,
) -> Response {
    req.action = "search".to_string();
    dispatch(&state, req).await
}

async fn handle_navigate(
    State(state): State<AppState>,
    Json(mut req): Json<ActionRequest>,
) -> Response {
    req.action = "navigate".to_string();
    dispatch(&state, req).await
}

async fn handle_extract_content(
    State(state): State<AppState>,
    Json(mut req): Json<ActionRequest>,
) -> Response {
    req.action = "extract_content".to_string();
    dispatch(&state, req).await
}

async fn handle_summarize(
    State(state): State<AppState>,
    Json(mut req): Json<ActionRequest>,
) -> Response {
    req.action = "summarize".to_string();
    dispatch(&state, req).await
}

async fn handle_crawl(
    State(state): State<AppState>,
    Json(mut req): Json<ActionRequest>,
) -> Response {
    req.action = "crawl".to_string();
    dispatch(&state, req).await
}

/// Unified dispatch: the action comes from the body. Equivalent parameters
/// produce byte-identical bodies to the dedicated routes above.
async fn handle_browser_tool(
    State(state): State<AppState>,
    Json(req): Json<ActionRequest>,
) -> Response {
    dispatch(&state, req).await
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    uptime_secs: u64,
    search_available: bool,
    summarize_available: bool,
    active_browser_sessions: usize,
}

async fn handle_health(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.started.elapsed().as_secs(),
        search_available: state.search_available,
        summarize_available: state.summarize_available,
        active_browser_sessions: state.gauge.active(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use toolgate_core::{Error, PageContent, WaitTimeout};

    #[test]
    fn validation_errors_map_to_bad_request() {
        for err in [
            Error::InvalidAction("x".into()),
            Error::MissingField("query"),
            Error::EmptyInput,
        ] {
            let resp = UnifiedResponse::from_error(&err);
            assert_eq!(status_for(&resp), StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn backend_errors_map_to_bad_gateway() {
        for err in [
            Error::NavigationError {
                url: "https://x.invalid".into(),
                cause: "dns".into(),
            },
            Error::SearchBackendError("down".into()),
        ] {
            let resp = UnifiedResponse::from_error(&err);
            assert_eq!(status_for(&resp), StatusCode::BAD_GATEWAY);
        }
    }

    #[test]
    fn unconfigured_capabilities_map_to_service_unavailable() {
        for err in [
            Error::ModelUnavailable("not loaded".into()),
            Error::SearchUnavailable("SEARXNG_URL is not configured".into()),
        ] {
            let resp = UnifiedResponse::from_error(&err);
            assert_eq!(status_for(&resp), StatusCode::SERVICE_UNAVAILABLE);
        }
    }

    #[test]
    fn wait_timeout_is_a_soft_ok() {
        let resp = UnifiedResponse::from_page(PageContent {
            text: "partial".into(),
            wait_timed_out: Some(WaitTimeout {
                selector: ".spinner".into(),
                wait_secs: 1,
            }),
        });
        assert_eq!(status_for(&resp), StatusCode::OK);
    }

    #[test]
    fn success_maps_to_ok() {
        let resp = UnifiedResponse::from_summary("fine".into());
        assert_eq!(status_for(&resp), StatusCode::OK);
    }
}
