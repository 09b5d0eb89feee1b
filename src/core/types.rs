use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    Accumulation,
    Distribution,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CashEventKind {
    Addition,
    Withdrawal,
}

/// A one-off cash movement applied at the start of an absolute, 1-based year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CashEvent {
    pub year_index: u32,
    pub amount: f64,
    pub kind: CashEventKind,
    #[serde(default)]
    pub label: String,
}

impl CashEvent {
    pub fn addition(year_index: u32, amount: f64, label: impl Into<String>) -> Self {
        Self {
            year_index,
            amount,
            kind: CashEventKind::Addition,
            label: label.into(),
        }
    }

    pub fn withdrawal(year_index: u32, amount: f64, label: impl Into<String>) -> Self {
        Self {
            year_index,
            amount,
            kind: CashEventKind::Withdrawal,
            label: label.into(),
        }
    }
}

/// Rates are whole-number percentages (12.0 means 12%).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccumulationParameters {
    pub initial_lump_sum: f64,
    pub base_monthly_contribution: f64,
    pub annual_step_up_pct: f64,
    pub annual_growth_pct: f64,
    pub duration_years: u32,
    pub annual_inflation_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionParameters {
    pub initial_monthly_withdrawal: f64,
    pub annual_withdrawal_growth_pct: f64,
    #[serde(default)]
    pub ongoing_monthly_contribution: f64,
    #[serde(default)]
    pub annual_contribution_step_up_pct: f64,
    pub annual_growth_pct: f64,
    pub max_years: u32,
}

/// Net effect of the cash events applied in one year. When several events share
/// a year, `label` and `kind` come from the last one applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedCashEvent {
    pub net_amount: f64,
    pub label: String,
    pub kind: CashEventKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearRecord {
    pub year: u32,
    pub phase: Phase,
    pub opening_balance: f64,
    pub contribution: f64,
    pub interest_earned: f64,
    pub withdrawal: f64,
    pub closing_balance: f64,
    pub cumulative_invested: f64,
    pub inflation_factor: f64,
    pub real_value: f64,
    pub months_funded: u32,
    pub applied_cash_event: Option<AppliedCashEvent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SurvivalOutcome {
    pub full_months_survived: u32,
    pub is_indefinite: bool,
    pub years_component: u32,
    pub months_remainder_component: u32,
}

impl SurvivalOutcome {
    pub fn from_months(full_months_survived: u32, is_indefinite: bool) -> Self {
        Self {
            full_months_survived,
            is_indefinite,
            years_component: full_months_survived / 12,
            months_remainder_component: full_months_survived % 12,
        }
    }

    pub fn label(&self) -> String {
        if self.is_indefinite {
            return "Indefinite".to_string();
        }
        let years = self.years_component;
        let months = self.months_remainder_component;
        let unit = |n: u32, one: &str, many: &str| {
            if n == 1 {
                format!("{n} {one}")
            } else {
                format!("{n} {many}")
            }
        };
        match (years, months) {
            (0, m) => unit(m, "month", "months"),
            (y, 0) => unit(y, "year", "years"),
            (y, m) => format!("{} {}", unit(y, "year", "years"), unit(m, "month", "months")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccumulationSummary {
    pub final_corpus: f64,
    pub total_invested: f64,
    pub total_contributions: f64,
    pub total_interest: f64,
    pub total_gains: f64,
    pub inflation_adjusted_corpus: f64,
    pub wealth_multiplier: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccumulationResult {
    pub yearly_records: Vec<YearRecord>,
    pub summary: AccumulationSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionSummary {
    pub starting_corpus: f64,
    pub final_balance: f64,
    pub total_withdrawn: f64,
    pub total_contributed: f64,
    pub total_interest: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionResult {
    pub yearly_records: Vec<YearRecord>,
    pub survival: SurvivalOutcome,
    pub summary: DistributionSummary,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartPoint {
    pub year: u32,
    pub phase: Phase,
    pub nominal: f64,
    pub real: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestratorResult {
    pub accumulation: AccumulationResult,
    pub distribution: DistributionResult,
    pub yearly_records: Vec<YearRecord>,
    pub chart_series: Vec<ChartPoint>,
    pub transition_year: u32,
    pub transition_corpus: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonteCarloOptions {
    pub run_count: u32,
    pub volatility_pct: f64,
    pub target_survival_years: u32,
    pub seed: u64,
}

impl Default for MonteCarloOptions {
    fn default() -> Self {
        Self {
            run_count: 100,
            volatility_pct: 15.0,
            target_survival_years: 30,
            seed: 42,
        }
    }
}

/// One trajectory under yearly-randomized returns. `balances[0]` is the lump sum.
#[derive(Debug, Clone, PartialEq)]
pub struct MonteCarloRun {
    pub balances: Vec<f64>,
    pub corpus_at_transition: f64,
    pub survived: bool,
    pub survival_years: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PercentileBand {
    pub p10: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearBand {
    pub year: u32,
    pub phase: Phase,
    pub band: PercentileBand,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonteCarloAggregate {
    pub run_count: u32,
    pub successful_runs: u32,
    pub success_rate: f64,
    pub transition_year: u32,
    pub yearly_bands: Vec<YearBand>,
    pub corpus_stats: PercentileBand,
    pub avg_failed_survival_years: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "mode", content = "years")]
pub enum SustainMode {
    Indefinite,
    FixedYears(u32),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalInputs {
    pub monthly_spend_today: f64,
    pub years_to_retirement: u32,
    pub current_lump_sum: f64,
    pub annual_growth_pct: f64,
    pub annual_step_up_pct: f64,
    pub inflation_pct: f64,
    pub spend_growth_pct: f64,
    pub sustain: SustainMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalTrajectoryPoint {
    pub year: u32,
    pub lump_sum_only: f64,
    pub with_contribution: f64,
    pub target: f64,
}

/// Parameter pair that feeds a solved goal straight into `run_full_simulation`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportParams {
    pub accumulation: AccumulationParameters,
    pub distribution: DistributionParameters,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalResult {
    pub real_rate_pct: f64,
    pub monthly_withdrawal_at_retirement: f64,
    pub annual_withdrawal_at_retirement: f64,
    pub target_corpus: f64,
    pub lump_sum_projection: f64,
    pub surplus: f64,
    pub required_monthly_contribution: Option<f64>,
    pub projected_corpus: f64,
    pub achievable: bool,
    pub converged: bool,
    pub iterations: u32,
    pub message: String,
    pub trajectory: Vec<GoalTrajectoryPoint>,
    pub export_params: Option<ExportParams>,
}
