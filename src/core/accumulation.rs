use log::debug;

use super::events::{Ledger, apply_cash_events};
use super::rates::{fraction, inflation_factor, monthly_rate};
use super::types::{
    AccumulationParameters, AccumulationResult, AccumulationSummary, CashEvent, Phase, YearRecord,
};

pub fn simulate_accumulation(
    params: &AccumulationParameters,
    events: &[CashEvent],
) -> AccumulationResult {
    let rate = monthly_rate(params.annual_growth_pct);
    let step_up = fraction(params.annual_step_up_pct);

    let mut ledger = Ledger {
        balance: params.initial_lump_sum,
        cumulative_invested: params.initial_lump_sum,
    };
    let mut contribution = params.base_monthly_contribution;
    let mut total_contributions = 0.0;
    let mut total_interest = 0.0;
    let mut records = Vec::with_capacity(params.duration_years as usize);

    for year in 1..=params.duration_years {
        let applied = apply_cash_events(&mut ledger, events, year);
        let opening_balance = ledger.balance;

        let mut year_interest = 0.0;
        let mut year_contribution = 0.0;
        for _ in 0..12 {
            let interest = ledger.balance * rate;
            ledger.balance += interest;
            ledger.balance += contribution;
            year_interest += interest;
            year_contribution += contribution;
        }
        ledger.cumulative_invested += year_contribution;
        total_contributions += year_contribution;
        total_interest += year_interest;

        let factor = inflation_factor(params.annual_inflation_pct, year);
        records.push(YearRecord {
            year,
            phase: Phase::Accumulation,
            opening_balance,
            contribution: year_contribution,
            interest_earned: year_interest,
            withdrawal: 0.0,
            closing_balance: ledger.balance,
            cumulative_invested: ledger.cumulative_invested,
            inflation_factor: factor,
            real_value: ledger.balance / factor,
            months_funded: 12,
            applied_cash_event: applied,
        });

        contribution *= 1.0 + step_up;
    }

    let final_corpus = records
        .last()
        .map_or(params.initial_lump_sum, |r| r.closing_balance);
    let total_invested = ledger.cumulative_invested;
    let wealth_multiplier = if total_invested > 0.0 {
        final_corpus / total_invested
    } else {
        0.0
    };

    debug!(
        "accumulation: {} years, final corpus {:.2}, invested {:.2}",
        params.duration_years, final_corpus, total_invested
    );

    AccumulationResult {
        yearly_records: records,
        summary: AccumulationSummary {
            final_corpus,
            total_invested,
            total_contributions,
            total_interest,
            total_gains: final_corpus - total_invested,
            inflation_adjusted_corpus: final_corpus
                / inflation_factor(params.annual_inflation_pct, params.duration_years),
            wealth_multiplier,
        },
    }
}

/// Year-end balances of the accumulation recurrence without cash events.
/// Element 0 is the lump sum.
pub fn project_corpus_path(
    lump_sum: f64,
    monthly_contribution: f64,
    annual_step_up_pct: f64,
    annual_growth_pct: f64,
    years: u32,
) -> Vec<f64> {
    let rate = monthly_rate(annual_growth_pct);
    let step_up = fraction(annual_step_up_pct);

    let mut balance = lump_sum;
    let mut contribution = monthly_contribution;
    let mut path = Vec::with_capacity(years as usize + 1);
    path.push(balance);
    for _ in 0..years {
        for _ in 0..12 {
            balance += balance * rate;
            balance += contribution;
        }
        path.push(balance);
        contribution *= 1.0 + step_up;
    }
    path
}

pub fn project_corpus(
    lump_sum: f64,
    monthly_contribution: f64,
    annual_step_up_pct: f64,
    annual_growth_pct: f64,
    years: u32,
) -> f64 {
    project_corpus_path(
        lump_sum,
        monthly_contribution,
        annual_step_up_pct,
        annual_growth_pct,
        years,
    )
    .last()
    .copied()
    .unwrap_or(lump_sum)
}
