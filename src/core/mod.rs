mod accumulation;
mod cache;
mod distribution;
mod engine;
mod events;
mod monte_carlo;
pub mod rates;
mod solver;
mod types;

pub use accumulation::{project_corpus, project_corpus_path, simulate_accumulation};
pub use cache::{DEFAULT_CACHE_CAPACITY, SimulationCache};
pub use distribution::simulate_distribution;
pub use engine::run_full_simulation;
pub use monte_carlo::{
    BoxMuller, NormalSampler, aggregate, horizon_years, percentile_band, run_monte_carlo,
    run_monte_carlo_with, simulate_run,
};
pub use solver::{
    CORPUS_TOLERANCE, INDEFINITE_HORIZON_YEARS, MAX_BISECTION_ITERATIONS, NEAR_ZERO_REAL_RATE,
    solve_retirement_goal,
};
pub use types::{
    AccumulationParameters, AccumulationResult, AccumulationSummary, AppliedCashEvent, CashEvent,
    CashEventKind, ChartPoint, DistributionParameters, DistributionResult, DistributionSummary,
    ExportParams, GoalInputs, GoalResult, GoalTrajectoryPoint, MonteCarloAggregate,
    MonteCarloOptions, MonteCarloRun, OrchestratorResult, PercentileBand, Phase, SurvivalOutcome,
    SustainMode, YearBand, YearRecord,
};
