use axum::{
    Router,
    extract::{Json, Query, State},
    http::{HeaderValue, StatusCode, header},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::core::{
    DEFAULT_RETURN_POOL, GoalSolveConfig, GoalSolveResult, HouseholdEvent, LoanPaymentStatus,
    LoanScheduleRow, LoanSummary, MAX_YEARS, MonteCarloOptions, MonteCarloResult,
    MonteCarloSession, PlanError, PlanScenario, PortfolioAllocation, PortfolioMonteCarloResult,
    PortfolioStats, RepaymentType, WealthSnapshot, fresh_seed, full_schedule, payment_at_month,
    portfolio_stats, project_scenario, project_wealth_by_year, run_monte_carlo,
    run_portfolio_monte_carlo, savings_rate, solve_goal, summarize_schedule, validate_allocation,
    with_blended_return,
};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Invalid(#[from] PlanError),
    #[error("invalid payload: {0}")]
    Payload(String),
    #[error("simulation task failed: {0}")]
    Task(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Invalid(_) | ApiError::Payload(_) => StatusCode::BAD_REQUEST,
            ApiError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        warn!(error = %self, "request rejected");
        error_response(self.status(), &self.to_string())
    }
}

/// A household scenario plus optional resampling settings. The scenario keys
/// sit at the top level of the document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlanRequest {
    #[serde(flatten)]
    pub scenario: PlanScenario,
    /// Annual percentage returns to resample; the bundled S&P 500 history when absent.
    pub historical_returns: Option<Vec<f64>>,
    pub monte_carlo: Option<MonteCarloOptions>,
}

impl PlanRequest {
    fn return_pool(&self) -> Result<Vec<f64>, PlanError> {
        let pool = self
            .historical_returns
            .clone()
            .unwrap_or_else(|| DEFAULT_RETURN_POOL.to_vec());
        if pool.is_empty() {
            return Err(PlanError::EmptyReturnPool);
        }
        if pool.iter().any(|r| !r.is_finite() || *r <= -100.0) {
            return Err(PlanError::invalid(
                "historicalReturns",
                "every return must be finite and > -100",
            ));
        }
        Ok(pool)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionResponse {
    pub years: u32,
    pub final_net_worth: f64,
    pub final_financial_assets: f64,
    pub single_track_final_wealth: f64,
    pub single_track_by_year: Vec<f64>,
    pub savings_rate: f64,
    pub snapshots: Vec<WealthSnapshot>,
    pub events: Vec<HouseholdEvent>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanResponse {
    pub projection: ProjectionResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monte_carlo: Option<MonteCarloResult>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct LoanPayload {
    principal: f64,
    annual_rate: f64,
    years: u32,
    repayment_type: RepaymentType,
    months_elapsed: u32,
}

impl Default for LoanPayload {
    fn default() -> Self {
        Self {
            principal: 350_000.0,
            annual_rate: 3.6,
            years: 30,
            repayment_type: RepaymentType::EqualPayment,
            months_elapsed: 0,
        }
    }
}

impl LoanPayload {
    fn validate(&self) -> Result<(), PlanError> {
        if !self.principal.is_finite() || self.principal < 0.0 {
            return Err(PlanError::invalid("principal", "must be >= 0"));
        }
        if !self.annual_rate.is_finite() || self.annual_rate < 0.0 {
            return Err(PlanError::invalid("annualRate", "must be >= 0"));
        }
        if self.years > MAX_YEARS {
            return Err(PlanError::invalid("years", format!("must be <= {MAX_YEARS}")));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LoanScheduleResponse {
    repayment_type: RepaymentType,
    summary: LoanSummary,
    rows: Vec<LoanScheduleRow>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PortfolioMonteCarloPayload {
    initial: f64,
    monthly: f64,
    allocation: PortfolioAllocation,
    years: u32,
    monthly_growth_rate: f64,
    num_simulations: u32,
    seed: Option<u32>,
}

impl Default for PortfolioMonteCarloPayload {
    fn default() -> Self {
        Self {
            initial: 10_000.0,
            monthly: 500.0,
            allocation: PortfolioAllocation::default(),
            years: 30,
            monthly_growth_rate: 0.0,
            num_simulations: 1_000,
            seed: None,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PortfolioMonteCarloResponse {
    seed: u32,
    #[serde(flatten)]
    result: PortfolioMonteCarloResult,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SolvePayload {
    #[serde(flatten)]
    scenario: PlanScenario,
    goal: GoalSolveConfig,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

/// Accumulate state shared by every Monte Carlo request the server handles.
#[derive(Clone, Default)]
struct AppState {
    session: Arc<Mutex<MonteCarloSession>>,
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "wealth planner HTTP API listening");
    info!("local access: http://127.0.0.1:{port}/health");

    axum::serve(listener, app()).await
}

fn app() -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/projection", post(projection_handler))
        .route("/api/loan/schedule", post(loan_schedule_handler))
        .route("/api/loan/payment", get(loan_payment_handler))
        .route("/api/portfolio", post(portfolio_handler))
        .route(
            "/api/portfolio/monte-carlo",
            post(portfolio_monte_carlo_handler),
        )
        .route("/api/monte-carlo", post(monte_carlo_handler))
        .route("/api/solve", post(solve_handler))
        .fallback(not_found_handler)
        .layer(middleware::map_response(no_store))
        .with_state(AppState::default())
}

async fn no_store(response: Response) -> Response {
    with_cache_control(response)
}

async fn health_handler() -> Response {
    json_response(StatusCode::OK, HealthResponse { status: "ok" })
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn projection_handler(Json(request): Json<PlanRequest>) -> Result<Response, ApiError> {
    request.scenario.validate()?;
    Ok(json_response(
        StatusCode::OK,
        build_projection_response(&request.scenario),
    ))
}

async fn loan_schedule_handler(Json(payload): Json<LoanPayload>) -> Result<Response, ApiError> {
    payload.validate()?;
    let rows = full_schedule(
        payload.principal,
        payload.annual_rate,
        payload.years,
        payload.repayment_type,
    );
    let response = LoanScheduleResponse {
        repayment_type: payload.repayment_type,
        summary: summarize_schedule(&rows),
        rows,
    };
    Ok(json_response(StatusCode::OK, response))
}

async fn loan_payment_handler(Query(payload): Query<LoanPayload>) -> Result<Response, ApiError> {
    payload.validate()?;
    let status: LoanPaymentStatus = payment_at_month(
        payload.principal,
        payload.annual_rate,
        payload.years,
        payload.repayment_type,
        payload.months_elapsed,
    );
    Ok(json_response(StatusCode::OK, status))
}

async fn portfolio_handler(
    Json(allocation): Json<PortfolioAllocation>,
) -> Result<Response, ApiError> {
    validate_allocation(&allocation)?;
    let stats: PortfolioStats = portfolio_stats(&allocation);
    Ok(json_response(StatusCode::OK, stats))
}

async fn portfolio_monte_carlo_handler(
    Json(payload): Json<PortfolioMonteCarloPayload>,
) -> Result<Response, ApiError> {
    validate_allocation(&payload.allocation)?;
    if !payload.initial.is_finite() || !payload.monthly.is_finite() {
        return Err(PlanError::invalid("initial", "amounts must be finite").into());
    }
    if !payload.monthly_growth_rate.is_finite() {
        return Err(PlanError::invalid("monthlyGrowthRate", "must be finite").into());
    }
    if payload.years > MAX_YEARS {
        return Err(PlanError::invalid("years", format!("must be <= {MAX_YEARS}")).into());
    }

    let seed = payload.seed.unwrap_or_else(fresh_seed);
    let result = tokio::task::spawn_blocking(move || {
        run_portfolio_monte_carlo(
            payload.initial,
            payload.monthly,
            &payload.allocation,
            payload.years,
            payload.monthly_growth_rate,
            payload.num_simulations,
            seed,
        )
    })
    .await
    .map_err(|e| ApiError::Task(e.to_string()))?;

    Ok(json_response(
        StatusCode::OK,
        PortfolioMonteCarloResponse { seed, result },
    ))
}

async fn monte_carlo_handler(
    State(state): State<AppState>,
    Json(request): Json<PlanRequest>,
) -> Result<Response, ApiError> {
    let result = run_session_monte_carlo(&state, request).await?;
    Ok(json_response(StatusCode::OK, result))
}

async fn run_session_monte_carlo(
    state: &AppState,
    request: PlanRequest,
) -> Result<MonteCarloResult, ApiError> {
    request.scenario.validate()?;
    let pool = request.return_pool()?;
    let options = request.monte_carlo.unwrap_or_default();
    let session = Arc::clone(&state.session);

    tokio::task::spawn_blocking(move || {
        let scenario = with_blended_return(&request.scenario);
        let mut session = session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        session.run(
            &scenario.person,
            scenario.years,
            &scenario.marriage,
            &scenario.retirement,
            &pool,
            &options,
        )
    })
    .await
    .map_err(|e| ApiError::Task(e.to_string()))
}

async fn solve_handler(Json(payload): Json<SolvePayload>) -> Result<Response, ApiError> {
    payload.scenario.validate()?;
    let scenario = with_blended_return(&payload.scenario);
    let result: GoalSolveResult = solve_goal(&scenario, payload.goal)?;
    info!(
        goal = ?result.goal_type,
        feasible = result.feasible,
        converged = result.converged,
        "goal solved"
    );
    Ok(json_response(StatusCode::OK, result))
}

fn build_projection_response(scenario: &PlanScenario) -> ProjectionResponse {
    let scenario = &with_blended_return(scenario);
    let projection = project_scenario(scenario);
    let single_track_by_year = project_wealth_by_year(
        &scenario.person,
        scenario.years,
        &scenario.crisis,
        Some(&scenario.retirement),
        scenario.use_compound,
    );
    ProjectionResponse {
        years: scenario.years,
        final_net_worth: projection.final_net_worth(),
        final_financial_assets: projection.final_financial_assets(),
        single_track_final_wealth: single_track_by_year
            .last()
            .copied()
            .unwrap_or(scenario.person.initial_wealth),
        single_track_by_year,
        savings_rate: savings_rate(&scenario.person),
        snapshots: projection.snapshots,
        events: projection.events,
    }
}

/// Runs a plan document outside the server: the deterministic projection, plus
/// a resampling run when the document carries `monteCarlo` options.
pub fn evaluate_plan(request: &PlanRequest) -> Result<PlanResponse, ApiError> {
    request.scenario.validate()?;
    let projection = build_projection_response(&request.scenario);
    let monte_carlo = match &request.monte_carlo {
        Some(options) => {
            let pool = request.return_pool()?;
            let scenario = &with_blended_return(&request.scenario);
            Some(run_monte_carlo(
                &scenario.person,
                scenario.years,
                &scenario.marriage,
                &scenario.retirement,
                &pool,
                options,
            ))
        }
        None => None,
    };
    Ok(PlanResponse {
        projection,
        monte_carlo,
    })
}

pub fn plan_request_from_json(json: &str) -> Result<PlanRequest, ApiError> {
    serde_json::from_str::<PlanRequest>(json)
        .map_err(|e| ApiError::Payload(format!("invalid plan JSON: {e}")))
}

fn with_cache_control<R: IntoResponse>(response: R) -> Response {
    let mut response = response.into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    with_cache_control((status, Json(body)))
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}
