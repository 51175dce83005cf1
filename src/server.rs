//! HTTP surface of the container: health probe plus JSON endpoints over the
//! strategy engines.

use crate::analytics::session::season_development_trends;
use crate::launcher::{APP_PORT, HEALTH_PATH};
use crate::strategy::mcda::{DecisionEngine, EvaluatedStrategy, Scenario, Weights};
use crate::strategy::oracle::{NamedPlan, SimulationSummary, StrategyOracle};
use crate::utils::error::{ApexError, ErrorCategory, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

const DEFAULT_GENERATIONS: usize = 2000;
const DEFAULT_SIMULATIONS: usize = 500;
const MAX_SIMULATIONS: usize = 20_000;
const MAX_GENERATIONS: usize = 20_000;
const MAX_RACE_LAPS: u32 = 200;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Seed for every engine the server builds; `None` draws from entropy.
    pub seed: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: APP_PORT,
            seed: None,
        }
    }
}

#[derive(Clone)]
struct AppState {
    seed: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct RankRequest {
    #[serde(default)]
    pub scenario: Scenario,
    pub n_gen: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct RankResponse {
    pub weights: Weights,
    pub strategies: Vec<EvaluatedStrategy>,
}

#[derive(Debug, Deserialize)]
pub struct SimulateRequest {
    pub plans: Vec<NamedPlan>,
    pub total_laps: u32,
    pub n_sims: Option<usize>,
    pub seed: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct SimulateResponse {
    pub n_sims: usize,
    pub results: Vec<SimulationSummary>,
}

struct ApiError(ApexError);

impl From<ApexError> for ApiError {
    fn from(e: ApexError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0.category() {
            ErrorCategory::Configuration | ErrorCategory::Analysis => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        tracing::warn!("Request failed with {}: {}", status, self.0);
        (
            status,
            Json(serde_json::json!({
                "error": self.0.to_string(),
                "hint": self.0.recovery_suggestion(),
            })),
        )
            .into_response()
    }
}

pub fn router(config: &ServerConfig) -> Router {
    let state = Arc::new(AppState { seed: config.seed });
    Router::new()
        .route(HEALTH_PATH, get(health))
        .route("/api/strategy/rank", post(rank_strategies))
        .route("/api/strategy/simulate", post(simulate_strategies))
        .route("/api/season/trends", get(season_trends))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(config: ServerConfig) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| ApexError::InvalidConfigValueError {
            field: "server.host".to_string(),
            value: config.host.clone(),
            reason: format!("{}", e),
        })?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("🌐 Listening on http://{}", addr);
    axum::serve(listener, router(&config)).await?;
    Ok(())
}

async fn health() -> &'static str {
    "ok"
}

fn check_limit(field: &str, value: usize, max: usize) -> Result<()> {
    if value > max {
        return Err(ApexError::InvalidConfigValueError {
            field: field.to_string(),
            value: value.to_string(),
            reason: format!("at most {} per request", max),
        });
    }
    Ok(())
}

fn blocking_failed(e: tokio::task::JoinError) -> ApexError {
    ApexError::ProcessingError {
        message: format!("engine task aborted: {}", e),
    }
}

async fn rank_strategies(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RankRequest>,
) -> std::result::Result<Json<RankResponse>, ApiError> {
    let n_gen = req.n_gen.unwrap_or(DEFAULT_GENERATIONS);
    check_limit("n_gen", n_gen, MAX_GENERATIONS)?;
    check_limit(
        "scenario.circuit.n_laps",
        req.scenario.circuit.n_laps as usize,
        MAX_RACE_LAPS as usize,
    )?;

    let seed = state.seed;
    let response = tokio::task::spawn_blocking(move || {
        let mut engine = match seed {
            Some(seed) => DecisionEngine::with_seed(req.scenario, seed),
            None => DecisionEngine::new(req.scenario),
        };
        let weights = engine.dynamic_weights();
        engine
            .generate_optimal_strategies(n_gen)
            .map(|strategies| RankResponse { weights, strategies })
    })
    .await
    .map_err(blocking_failed)??;

    Ok(Json(response))
}

async fn simulate_strategies(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SimulateRequest>,
) -> std::result::Result<Json<SimulateResponse>, ApiError> {
    let n_sims = req.n_sims.unwrap_or(DEFAULT_SIMULATIONS);
    check_limit("n_sims", n_sims, MAX_SIMULATIONS)?;
    check_limit("total_laps", req.total_laps as usize, MAX_RACE_LAPS as usize)?;
    for plan in &req.plans {
        for stint in &plan.stints {
            check_limit("laps", stint.laps as usize, MAX_RACE_LAPS as usize)?;
        }
    }

    let seed = req.seed.or(state.seed);
    let results = tokio::task::spawn_blocking(move || {
        let mut oracle = match seed {
            Some(seed) => StrategyOracle::with_seed(seed),
            None => StrategyOracle::new(),
        };
        oracle.monte_carlo(&req.plans, n_sims, req.total_laps)
    })
    .await
    .map_err(blocking_failed)??;

    Ok(Json(SimulateResponse { n_sims, results }))
}

async fn season_trends() -> impl IntoResponse {
    Json(season_development_trends())
}
