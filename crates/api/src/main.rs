use axum::{extract::State, http::StatusCode, routing::get, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stocksage_core::domain::analysis::StockAnalysis;
use stocksage_core::domain::signal::Signal;
use stocksage_core::flows;
use stocksage_core::flows::analysis::StockAnalysisRequest;
use stocksage_core::flows::prompts::PromptSuggestionRequest;
use stocksage_core::flows::search::SearchSuggestionRequest;
use stocksage_core::llm::gemini::GeminiClient;
use stocksage_core::llm::{ModelCallError, ModelCaller};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = stocksage_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let caller: Arc<dyn ModelCaller> = Arc::new(GeminiClient::from_settings(&settings)?);
    let state = AppState { caller };

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/api/search-suggestions", post(search_suggestions))
        .route("/api/prompt-suggestions", post(prompt_suggestions))
        .route("/api/stock-analysis", post(stock_analysis))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Clone)]
struct AppState {
    caller: Arc<dyn ModelCaller>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchSuggestionsBody {
    search_term: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptSuggestionsBody {
    stock_segment: String,
}

#[derive(Debug, Deserialize)]
struct StockAnalysisBody {
    ticker: String,
}

#[derive(Debug, Serialize)]
struct SuggestionsResponse {
    suggestions: Vec<String>,
}

#[derive(Debug, Serialize)]
struct StockAnalysisResponse {
    signal: Signal,

    #[serde(flatten)]
    analysis: StockAnalysis,
}

async fn search_suggestions(
    State(state): State<AppState>,
    Json(body): Json<SearchSuggestionsBody>,
) -> Result<Json<SuggestionsResponse>, StatusCode> {
    let request =
        SearchSuggestionRequest::try_new(body.search_term).map_err(|_| StatusCode::BAD_REQUEST)?;

    let suggestions = flows::search::suggest(state.caller.as_ref(), &request)
        .await
        .map_err(capture_model_error)?;

    Ok(Json(SuggestionsResponse { suggestions }))
}

async fn prompt_suggestions(
    State(state): State<AppState>,
    Json(body): Json<PromptSuggestionsBody>,
) -> Result<Json<SuggestionsResponse>, StatusCode> {
    let request =
        PromptSuggestionRequest::try_new(body.stock_segment).map_err(|_| StatusCode::BAD_REQUEST)?;

    let suggestions = flows::prompts::suggest(state.caller.as_ref(), &request)
        .await
        .map_err(capture_model_error)?;

    Ok(Json(SuggestionsResponse { suggestions }))
}

async fn stock_analysis(
    State(state): State<AppState>,
    Json(body): Json<StockAnalysisBody>,
) -> Result<Json<StockAnalysisResponse>, StatusCode> {
    let request =
        StockAnalysisRequest::try_new(body.ticker).map_err(|_| StatusCode::BAD_REQUEST)?;

    let analysis = flows::analysis::analyze(state.caller.as_ref(), &request)
        .await
        .map_err(capture_model_error)?;

    Ok(Json(StockAnalysisResponse {
        signal: Signal::from_color_code(&analysis.overall_color_code),
        analysis,
    }))
}

fn capture_model_error(err: ModelCallError) -> StatusCode {
    tracing::error!(flow = err.flow, kind = ?err.kind, error = %err, "model call failed");
    sentry_anyhow::capture_anyhow(&anyhow::Error::new(err));
    StatusCode::BAD_GATEWAY
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &stocksage_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
