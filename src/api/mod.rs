use axum::{
    Router,
    extract::{Json, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use clap::Args;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::net::TcpListener;

use crate::core::{
    AccumulationParameters, CashEvent, CashEventKind, DistributionParameters, GoalInputs,
    GoalResult, MonteCarloAggregate, MonteCarloOptions, OrchestratorResult, SimulationCache,
    SustainMode, run_monte_carlo, solve_retirement_goal,
};

pub const MAX_MONTE_CARLO_RUNS: u32 = 10_000;
pub const MAX_HORIZON_YEARS: u32 = 150;

#[derive(Debug, Error, PartialEq)]
pub enum InputError {
    #[error("{field} must be a finite number")]
    NotFinite { field: &'static str },
    #[error("{field} must be >= 0")]
    Negative { field: &'static str },
    #[error("{field} must be > -100")]
    RateTooLow { field: &'static str },
    #[error("{field} must be <= {max}")]
    TooLarge { field: &'static str, max: u32 },
    #[error("cash event #{index}: {reason}")]
    InvalidEvent { index: usize, reason: &'static str },
}

#[derive(Args, Debug, Clone)]
pub struct PlanArgs {
    #[arg(long, default_value_t = 500_000.0, help = "Lump sum invested at the start")]
    pub lump_sum: f64,
    #[arg(long, default_value_t = 25_000.0, help = "Monthly contribution in the first year")]
    pub monthly_contribution: f64,
    #[arg(
        long,
        default_value_t = 10.0,
        help = "Annual step-up of the monthly contribution in percent"
    )]
    pub step_up: f64,
    #[arg(long, default_value_t = 12.0, help = "Expected annual return in percent")]
    pub growth_rate: f64,
    #[arg(long, default_value_t = 20, help = "Years of accumulation")]
    pub years: u32,
    #[arg(long, default_value_t = 6.0, help = "Annual inflation in percent")]
    pub inflation: f64,
    #[arg(long, default_value_t = 200_000.0, help = "Monthly withdrawal in the first year of distribution")]
    pub withdrawal: f64,
    #[arg(long, default_value_t = 6.0, help = "Annual withdrawal growth in percent")]
    pub withdrawal_growth: f64,
    #[arg(long, default_value_t = 0.0, help = "Monthly contribution continued during distribution")]
    pub post_contribution: f64,
    #[arg(long, default_value_t = 0.0, help = "Annual step-up of the distribution contribution in percent")]
    pub post_step_up: f64,
    #[arg(long, help = "Expected annual return during distribution in percent, defaults to growth-rate")]
    pub post_growth_rate: Option<f64>,
    #[arg(long, default_value_t = 40, help = "Distribution years to simulate")]
    pub max_years: u32,
    #[arg(
        long = "event",
        value_parser = parse_cash_event,
        help = "One-off cash event as YEAR:+AMOUNT[:LABEL] or YEAR:-AMOUNT[:LABEL]"
    )]
    pub events: Vec<CashEvent>,
    #[arg(long, default_value_t = 100, help = "Monte Carlo runs")]
    pub runs: u32,
    #[arg(long, default_value_t = 15.0, help = "Annual return volatility in percent")]
    pub volatility: f64,
    #[arg(long, help = "Years the corpus must last for a run to succeed, defaults to max-years")]
    pub target_years: Option<u32>,
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

#[derive(Args, Debug, Clone)]
pub struct GoalArgs {
    #[arg(long, default_value_t = 100_000.0, help = "Monthly spend in today's money")]
    pub monthly_spend: f64,
    #[arg(long, default_value_t = 20)]
    pub years_to_retirement: u32,
    #[arg(long, default_value_t = 500_000.0)]
    pub lump_sum: f64,
    #[arg(long, default_value_t = 12.0, help = "Expected annual return in percent")]
    pub growth_rate: f64,
    #[arg(long, default_value_t = 10.0, help = "Annual contribution step-up in percent")]
    pub step_up: f64,
    #[arg(long, default_value_t = 6.0, help = "Inflation until retirement in percent")]
    pub inflation: f64,
    #[arg(long, default_value_t = 6.0, help = "Annual spending growth after retirement in percent")]
    pub spend_growth: f64,
    #[arg(long, help = "Years the corpus must last; omit to sustain indefinitely")]
    pub sustain_years: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct PlanRequest {
    pub accumulation: AccumulationParameters,
    pub distribution: DistributionParameters,
    pub events: Vec<CashEvent>,
    pub monte_carlo: MonteCarloOptions,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PlanPayload {
    lump_sum: Option<f64>,
    monthly_contribution: Option<f64>,
    step_up: Option<f64>,
    growth_rate: Option<f64>,
    years: Option<u32>,
    inflation: Option<f64>,
    withdrawal: Option<f64>,
    withdrawal_growth: Option<f64>,
    post_contribution: Option<f64>,
    post_step_up: Option<f64>,
    post_growth_rate: Option<f64>,
    max_years: Option<u32>,
    events: Option<Vec<CashEvent>>,
    runs: Option<u32>,
    volatility: Option<f64>,
    target_years: Option<u32>,
    seed: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct GoalPayload {
    monthly_spend: Option<f64>,
    years_to_retirement: Option<u32>,
    lump_sum: Option<f64>,
    growth_rate: Option<f64>,
    step_up: Option<f64>,
    inflation: Option<f64>,
    spend_growth: Option<f64>,
    sustain_years: Option<u32>,
    sustain_forever: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulateResponse {
    pub survival_label: String,
    #[serde(flatten)]
    pub result: OrchestratorResult,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Clone, Default)]
struct AppState {
    cache: Arc<Mutex<SimulationCache>>,
}

pub fn parse_cash_event(raw: &str) -> Result<CashEvent, String> {
    let mut parts = raw.splitn(3, ':');
    let year = parts
        .next()
        .and_then(|s| s.trim().parse::<u32>().ok())
        .ok_or_else(|| format!("invalid event year in '{raw}'"))?;
    let amount = parts
        .next()
        .map(str::trim)
        .ok_or_else(|| format!("missing event amount in '{raw}'"))?;
    let (kind, digits) = match amount.split_at_checked(1) {
        Some(("+", rest)) => (CashEventKind::Addition, rest),
        Some(("-", rest)) => (CashEventKind::Withdrawal, rest),
        _ => return Err(format!("event amount must start with + or - in '{raw}'")),
    };
    let amount = digits
        .parse::<f64>()
        .map_err(|e| format!("invalid event amount in '{raw}': {e}"))?;
    let label = parts.next().map(str::trim).unwrap_or_default().to_string();

    Ok(CashEvent {
        year_index: year,
        amount,
        kind,
        label,
    })
}

pub fn build_plan(args: &PlanArgs) -> Result<PlanRequest, InputError> {
    for (field, value) in [
        ("lumpSum", args.lump_sum),
        ("monthlyContribution", args.monthly_contribution),
        ("withdrawal", args.withdrawal),
        ("postContribution", args.post_contribution),
        ("volatility", args.volatility),
    ] {
        require_non_negative(field, value)?;
    }

    let post_growth_rate = args.post_growth_rate.unwrap_or(args.growth_rate);
    for (field, value) in [
        ("stepUp", args.step_up),
        ("growthRate", args.growth_rate),
        ("inflation", args.inflation),
        ("withdrawalGrowth", args.withdrawal_growth),
        ("postStepUp", args.post_step_up),
        ("postGrowthRate", post_growth_rate),
    ] {
        require_rate(field, value)?;
    }

    for (field, value) in [
        ("years", args.years),
        ("maxYears", args.max_years),
        ("targetYears", args.target_years.unwrap_or(args.max_years)),
    ] {
        if value > MAX_HORIZON_YEARS {
            return Err(InputError::TooLarge {
                field,
                max: MAX_HORIZON_YEARS,
            });
        }
    }
    if args.runs > MAX_MONTE_CARLO_RUNS {
        return Err(InputError::TooLarge {
            field: "runs",
            max: MAX_MONTE_CARLO_RUNS,
        });
    }

    for (index, event) in args.events.iter().enumerate() {
        if event.year_index == 0 {
            return Err(InputError::InvalidEvent {
                index,
                reason: "year index is 1-based",
            });
        }
        if !event.amount.is_finite() || event.amount <= 0.0 {
            return Err(InputError::InvalidEvent {
                index,
                reason: "amount must be a positive number",
            });
        }
    }

    Ok(PlanRequest {
        accumulation: AccumulationParameters {
            initial_lump_sum: args.lump_sum,
            base_monthly_contribution: args.monthly_contribution,
            annual_step_up_pct: args.step_up,
            annual_growth_pct: args.growth_rate,
            duration_years: args.years,
            annual_inflation_pct: args.inflation,
        },
        distribution: DistributionParameters {
            initial_monthly_withdrawal: args.withdrawal,
            annual_withdrawal_growth_pct: args.withdrawal_growth,
            ongoing_monthly_contribution: args.post_contribution,
            annual_contribution_step_up_pct: args.post_step_up,
            annual_growth_pct: post_growth_rate,
            max_years: args.max_years,
        },
        events: args.events.clone(),
        monte_carlo: MonteCarloOptions {
            run_count: args.runs,
            volatility_pct: args.volatility,
            target_survival_years: args.target_years.unwrap_or(args.max_years),
            seed: args.seed,
        },
    })
}

pub fn build_goal(args: &GoalArgs) -> Result<GoalInputs, InputError> {
    require_non_negative("monthlySpend", args.monthly_spend)?;
    require_non_negative("lumpSum", args.lump_sum)?;
    for (field, value) in [
        ("growthRate", args.growth_rate),
        ("stepUp", args.step_up),
        ("inflation", args.inflation),
        ("spendGrowth", args.spend_growth),
    ] {
        require_rate(field, value)?;
    }
    for (field, value) in [
        ("yearsToRetirement", Some(args.years_to_retirement)),
        ("sustainYears", args.sustain_years),
    ] {
        if value.is_some_and(|years| years > MAX_HORIZON_YEARS) {
            return Err(InputError::TooLarge {
                field,
                max: MAX_HORIZON_YEARS,
            });
        }
    }

    Ok(GoalInputs {
        monthly_spend_today: args.monthly_spend,
        years_to_retirement: args.years_to_retirement,
        current_lump_sum: args.lump_sum,
        annual_growth_pct: args.growth_rate,
        annual_step_up_pct: args.step_up,
        inflation_pct: args.inflation,
        spend_growth_pct: args.spend_growth,
        sustain: match args.sustain_years {
            Some(years) if years > 0 => SustainMode::FixedYears(years),
            _ => SustainMode::Indefinite,
        },
    })
}

fn require_finite(field: &'static str, value: f64) -> Result<(), InputError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(InputError::NotFinite { field })
    }
}

fn require_non_negative(field: &'static str, value: f64) -> Result<(), InputError> {
    require_finite(field, value)?;
    if value < 0.0 {
        return Err(InputError::Negative { field });
    }
    Ok(())
}

fn require_rate(field: &'static str, value: f64) -> Result<(), InputError> {
    require_finite(field, value)?;
    if value <= -100.0 {
        return Err(InputError::RateTooLow { field });
    }
    Ok(())
}

pub fn simulate_response(cache: &mut SimulationCache, request: &PlanRequest) -> SimulateResponse {
    let result = cache.run_full_simulation(
        &request.accumulation,
        &request.distribution,
        &request.events,
    );
    SimulateResponse {
        survival_label: result.distribution.survival.label(),
        result,
    }
}

pub fn monte_carlo_response(request: &PlanRequest) -> MonteCarloAggregate {
    run_monte_carlo(
        &request.accumulation,
        &request.distribution,
        &request.monte_carlo,
    )
}

pub fn goal_response(inputs: &GoalInputs) -> GoalResult {
    solve_retirement_goal(inputs)
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route("/health", get(health_handler))
        .route(
            "/api/simulate",
            get(simulate_get_handler).post(simulate_post_handler),
        )
        .route(
            "/api/monte-carlo",
            get(monte_carlo_get_handler).post(monte_carlo_post_handler),
        )
        .route("/api/goal", get(goal_get_handler).post(goal_post_handler))
        .fallback(not_found_handler)
        .with_state(AppState::default());

    let listener = TcpListener::bind(addr).await?;
    info!("projection API listening on http://{addr}");

    axum::serve(listener, app).await
}

async fn health_handler() -> Response {
    json_response(StatusCode::OK, HealthResponse { status: "ok" })
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn simulate_get_handler(
    State(state): State<AppState>,
    Query(payload): Query<PlanPayload>,
) -> Response {
    simulate_handler_impl(state, payload).await
}

async fn simulate_post_handler(
    State(state): State<AppState>,
    Json(payload): Json<PlanPayload>,
) -> Response {
    simulate_handler_impl(state, payload).await
}

async fn simulate_handler_impl(state: AppState, payload: PlanPayload) -> Response {
    let request = match plan_request_from_payload(payload) {
        Ok(request) => request,
        Err(e) => return rejected(e),
    };

    let response = match state.cache.lock() {
        Ok(mut cache) => simulate_response(&mut cache, &request),
        Err(_) => {
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "simulation cache poisoned");
        }
    };
    json_response(StatusCode::OK, response)
}

async fn monte_carlo_get_handler(Query(payload): Query<PlanPayload>) -> Response {
    monte_carlo_handler_impl(payload).await
}

async fn monte_carlo_post_handler(Json(payload): Json<PlanPayload>) -> Response {
    monte_carlo_handler_impl(payload).await
}

async fn monte_carlo_handler_impl(payload: PlanPayload) -> Response {
    let request = match plan_request_from_payload(payload) {
        Ok(request) => request,
        Err(e) => return rejected(e),
    };

    match tokio::task::spawn_blocking(move || monte_carlo_response(&request)).await {
        Ok(aggregate) => json_response(StatusCode::OK, aggregate),
        Err(e) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            &format!("Monte Carlo task failed: {e}"),
        ),
    }
}

async fn goal_get_handler(Query(payload): Query<GoalPayload>) -> Response {
    goal_handler_impl(payload).await
}

async fn goal_post_handler(Json(payload): Json<GoalPayload>) -> Response {
    goal_handler_impl(payload).await
}

async fn goal_handler_impl(payload: GoalPayload) -> Response {
    match goal_inputs_from_payload(payload) {
        Ok(inputs) => json_response(StatusCode::OK, goal_response(&inputs)),
        Err(e) => rejected(e),
    }
}

fn rejected(error: InputError) -> Response {
    warn!("rejected request: {error}");
    error_response(StatusCode::BAD_REQUEST, &error.to_string())
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
fn plan_request_from_json(json: &str) -> Result<PlanRequest, String> {
    let payload = serde_json::from_str::<PlanPayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    plan_request_from_payload(payload).map_err(|e| e.to_string())
}

fn plan_request_from_payload(payload: PlanPayload) -> Result<PlanRequest, InputError> {
    let mut args = default_plan_args();

    if let Some(v) = payload.lump_sum {
        args.lump_sum = v;
    }
    if let Some(v) = payload.monthly_contribution {
        args.monthly_contribution = v;
    }
    if let Some(v) = payload.step_up {
        args.step_up = v;
    }
    if let Some(v) = payload.growth_rate {
        args.growth_rate = v;
    }
    if let Some(v) = payload.years {
        args.years = v;
    }
    if let Some(v) = payload.inflation {
        args.inflation = v;
    }
    if let Some(v) = payload.withdrawal {
        args.withdrawal = v;
    }
    if let Some(v) = payload.withdrawal_growth {
        args.withdrawal_growth = v;
    }
    if let Some(v) = payload.post_contribution {
        args.post_contribution = v;
    }
    if let Some(v) = payload.post_step_up {
        args.post_step_up = v;
    }
    if let Some(v) = payload.post_growth_rate {
        args.post_growth_rate = Some(v);
    }
    if let Some(v) = payload.max_years {
        args.max_years = v;
    }
    if let Some(v) = payload.events {
        args.events = v;
    }
    if let Some(v) = payload.runs {
        args.runs = v;
    }
    if let Some(v) = payload.volatility {
        args.volatility = v;
    }
    if let Some(v) = payload.target_years {
        args.target_years = Some(v);
    }
    if let Some(v) = payload.seed {
        args.seed = v;
    }

    build_plan(&args)
}

fn goal_inputs_from_payload(payload: GoalPayload) -> Result<GoalInputs, InputError> {
    let mut args = default_goal_args();

    if let Some(v) = payload.monthly_spend {
        args.monthly_spend = v;
    }
    if let Some(v) = payload.years_to_retirement {
        args.years_to_retirement = v;
    }
    if let Some(v) = payload.lump_sum {
        args.lump_sum = v;
    }
    if let Some(v) = payload.growth_rate {
        args.growth_rate = v;
    }
    if let Some(v) = payload.step_up {
        args.step_up = v;
    }
    if let Some(v) = payload.inflation {
        args.inflation = v;
    }
    if let Some(v) = payload.spend_growth {
        args.spend_growth = v;
    }
    if let Some(v) = payload.sustain_years {
        args.sustain_years = Some(v);
    }
    if payload.sustain_forever == Some(true) {
        args.sustain_years = None;
    }

    build_goal(&args)
}

fn default_plan_args() -> PlanArgs {
    PlanArgs {
        lump_sum: 500_000.0,
        monthly_contribution: 25_000.0,
        step_up: 10.0,
        growth_rate: 12.0,
        years: 20,
        inflation: 6.0,
        withdrawal: 200_000.0,
        withdrawal_growth: 6.0,
        post_contribution: 0.0,
        post_step_up: 0.0,
        post_growth_rate: None,
        max_years: 40,
        events: Vec::new(),
        runs: 100,
        volatility: 15.0,
        target_years: None,
        seed: 42,
    }
}

fn default_goal_args() -> GoalArgs {
    GoalArgs {
        monthly_spend: 100_000.0,
        years_to_retirement: 20,
        lump_sum: 500_000.0,
        growth_rate: 12.0,
        step_up: 10.0,
        inflation: 6.0,
        spend_growth: 6.0,
        sustain_years: None,
    }
}
