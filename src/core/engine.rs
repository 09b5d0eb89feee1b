use log::debug;

use super::accumulation::simulate_accumulation;
use super::distribution::simulate_distribution;
use super::events::split_at_transition;
use super::types::{
    AccumulationParameters, CashEvent, ChartPoint, DistributionParameters, OrchestratorResult,
    Phase, YearRecord,
};

/// Runs accumulation then distribution over one timeline. Events up to and
/// including the last accumulation year go to accumulation; the rest go to
/// distribution with absolute year indices preserved.
pub fn run_full_simulation(
    acc_params: &AccumulationParameters,
    dist_params: &DistributionParameters,
    events: &[CashEvent],
) -> OrchestratorResult {
    let transition_year = acc_params.duration_years;
    let (acc_events, dist_events) = split_at_transition(events, transition_year);

    let accumulation = simulate_accumulation(acc_params, &acc_events);
    let transition_corpus = accumulation.summary.final_corpus;
    let distribution = simulate_distribution(
        dist_params,
        transition_corpus,
        transition_year,
        acc_params.annual_inflation_pct,
        &dist_events,
    );

    let invested_base = accumulation.summary.total_invested;
    let mut yearly_records = Vec::with_capacity(
        accumulation.yearly_records.len() + distribution.yearly_records.len(),
    );
    yearly_records.extend(accumulation.yearly_records.iter().cloned());
    yearly_records.extend(distribution.yearly_records.iter().cloned().map(|mut r| {
        r.cumulative_invested += invested_base;
        r
    }));

    let chart_series = build_chart_series(acc_params.initial_lump_sum, &yearly_records);

    debug!(
        "full simulation: transition at year {} with corpus {:.2}, {} records",
        transition_year,
        transition_corpus,
        yearly_records.len()
    );

    OrchestratorResult {
        accumulation,
        distribution,
        yearly_records,
        chart_series,
        transition_year,
        transition_corpus,
    }
}

fn build_chart_series(initial_lump_sum: f64, records: &[YearRecord]) -> Vec<ChartPoint> {
    let mut series = Vec::with_capacity(records.len() + 1);
    series.push(ChartPoint {
        year: 0,
        phase: Phase::Accumulation,
        nominal: initial_lump_sum,
        real: initial_lump_sum,
    });
    series.extend(records.iter().map(|r| ChartPoint {
        year: r.year,
        phase: r.phase,
        nominal: r.closing_balance,
        real: r.real_value,
    }));
    series
}
