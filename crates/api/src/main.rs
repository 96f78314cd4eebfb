use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use stockscope_core::chart::ChartData;
use stockscope_core::domain::news::{NewsItem, DEFAULT_NEWS_LIMIT};
use stockscope_core::domain::portfolio::{PortfolioHolding, PortfolioSummary};
use stockscope_core::market::provider::ProviderQuotes;
use stockscope_core::market::yahoo::YahooChartProvider;
use stockscope_core::market::{MarketDataProvider, Period};
use stockscope_core::portfolio::{self, PortfolioRules, SAMPLE_PORTFOLIO_CSV};
use stockscope_core::report::{self, AnalysisSettings, StockReport};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = stockscope_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let provider = YahooChartProvider::from_settings(&settings)?;
    tracing::info!(
        provider = provider.provider_name(),
        base_url = %settings.market_data_base_url,
        weighting = ?settings.portfolio_weighting,
        "market data provider ready"
    );

    let state = AppState {
        provider: Arc::new(provider),
        analysis: AnalysisSettings::default(),
        portfolio_rules: PortfolioRules {
            weighting: settings.portfolio_weighting,
            ..Default::default()
        },
    };

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/stocks/:symbol/analysis", get(get_stock_analysis))
        .route("/stocks/:symbol/chart", get(get_stock_chart))
        .route("/stocks/:symbol/news", get(get_stock_news))
        .route("/portfolio/analysis", post(post_portfolio_analysis))
        .route("/portfolio/analysis/csv", post(post_portfolio_csv))
        .route("/portfolio/template.csv", get(get_portfolio_template))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

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
    provider: Arc<dyn MarketDataProvider>,
    analysis: AnalysisSettings,
    portfolio_rules: PortfolioRules,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

impl ApiError {
    fn bad_request(err: anyhow::Error) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: format!("{err:#}"),
        }
    }

    /// Upstream data failures are reported to sentry; the client sees the message.
    fn upstream(err: anyhow::Error) -> Self {
        sentry_anyhow::capture_anyhow(&err);
        tracing::error!(error = %format!("{err:#}"), "market data request failed");
        Self {
            status: StatusCode::BAD_GATEWAY,
            message: format!("{err:#}"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { error: &self.message })).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct PeriodQuery {
    period: Option<String>,
}

impl PeriodQuery {
    fn period(&self) -> Result<Period, ApiError> {
        match self.period.as_deref() {
            Some(s) => s.parse::<Period>().map_err(ApiError::bad_request),
            None => Ok(Period::default()),
        }
    }
}

#[derive(Debug, Serialize)]
struct ApiAnalysis {
    analysis_id: Uuid,
    generated_at: DateTime<Utc>,
    provider: &'static str,
    report: StockReport,
}

async fn load_report(
    state: &AppState,
    symbol: &str,
    query: &PeriodQuery,
) -> Result<(StockReport, ChartData), ApiError> {
    let symbol = report::normalize_symbol(symbol).map_err(ApiError::bad_request)?;
    let period = query.period()?;

    report::fetch_report(state.provider.as_ref(), &symbol, period, &state.analysis)
        .await
        .map_err(ApiError::upstream)
}

async fn get_stock_analysis(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<ApiAnalysis>, ApiError> {
    let (report, _) = load_report(&state, &symbol, &query).await?;

    let recommendation = report.outcome.recommendation();
    tracing::info!(
        symbol = %report.symbol,
        period = %report.period,
        computed = report.outcome.is_computed(),
        recommendation = %recommendation.recommendation,
        risk = %recommendation.risk_level,
        "served stock analysis"
    );

    Ok(Json(ApiAnalysis {
        analysis_id: Uuid::new_v4(),
        generated_at: Utc::now(),
        provider: state.provider.provider_name(),
        report,
    }))
}

async fn get_stock_chart(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<ChartData>, ApiError> {
    let (_, chart) = load_report(&state, &symbol, &query).await?;
    Ok(Json(chart))
}

const MAX_NEWS_LIMIT: usize = 20;

#[derive(Debug, Deserialize)]
struct NewsQuery {
    limit: Option<usize>,
}

impl NewsQuery {
    fn limit(&self) -> Result<usize, ApiError> {
        match self.limit {
            None => Ok(DEFAULT_NEWS_LIMIT),
            Some(n) if (1..=MAX_NEWS_LIMIT).contains(&n) => Ok(n),
            Some(n) => Err(ApiError::bad_request(anyhow::anyhow!(
                "limit must be between 1 and {MAX_NEWS_LIMIT} (got {n})"
            ))),
        }
    }
}

async fn get_stock_news(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(query): Query<NewsQuery>,
) -> Result<Json<Vec<NewsItem>>, ApiError> {
    let symbol = report::normalize_symbol(&symbol).map_err(ApiError::bad_request)?;
    let limit = query.limit()?;
    let news = state
        .provider
        .fetch_news(&symbol, limit)
        .await
        .map_err(ApiError::upstream)?;
    Ok(Json(news))
}

#[derive(Debug, Deserialize)]
struct PortfolioRequest {
    holdings: Vec<PortfolioHolding>,
}

async fn post_portfolio_analysis(
    State(state): State<AppState>,
    Json(req): Json<PortfolioRequest>,
) -> Result<Json<PortfolioSummary>, ApiError> {
    let mut holdings = Vec::with_capacity(req.holdings.len());
    for h in req.holdings {
        let symbol = report::normalize_symbol(&h.symbol).map_err(ApiError::bad_request)?;
        if !h.shares.is_finite() || h.shares < 0.0 {
            return Err(ApiError::bad_request(anyhow::anyhow!(
                "share count for {symbol} must be a non-negative number"
            )));
        }
        holdings.push(PortfolioHolding {
            symbol,
            shares: h.shares,
        });
    }
    analyze_holdings(&state, &holdings).await
}

async fn post_portfolio_csv(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<PortfolioSummary>, ApiError> {
    let holdings = portfolio::parse_holdings_csv(&body).map_err(ApiError::bad_request)?;
    analyze_holdings(&state, &holdings).await
}

async fn analyze_holdings(
    state: &AppState,
    holdings: &[PortfolioHolding],
) -> Result<Json<PortfolioSummary>, ApiError> {
    let lookup = ProviderQuotes(state.provider.as_ref());
    let summary = portfolio::aggregate(holdings, &lookup, &state.portfolio_rules)
        .await
        .map_err(|e| ApiError::upstream(anyhow::Error::new(e)))?;
    Ok(Json(summary))
}

async fn get_portfolio_template() -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "text/csv"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"portfolio_template.csv\"",
            ),
        ],
        SAMPLE_PORTFOLIO_CSV,
    )
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &stockscope_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
