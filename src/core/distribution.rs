use log::debug;

use super::events::{Ledger, apply_cash_events};
use super::rates::{fraction, inflation_factor, monthly_rate};
use super::types::{
    CashEvent, DistributionParameters, DistributionResult, DistributionSummary, Phase,
    SurvivalOutcome, YearRecord,
};

/// Runs the withdrawal phase starting from `starting_corpus`. Record years are
/// absolute: the first simulated year is `year_offset + 1`.
///
/// A non-positive corpus or withdrawal yields an empty result. Depletion is
/// terminal: once the balance reaches zero no further years are simulated.
pub fn simulate_distribution(
    params: &DistributionParameters,
    starting_corpus: f64,
    year_offset: u32,
    inflation_pct: f64,
    events: &[CashEvent],
) -> DistributionResult {
    if starting_corpus <= 0.0 || params.initial_monthly_withdrawal <= 0.0 {
        return empty_result(starting_corpus);
    }

    let rate = monthly_rate(params.annual_growth_pct);
    let withdrawal_growth = fraction(params.annual_withdrawal_growth_pct);
    let contribution_step_up = fraction(params.annual_contribution_step_up_pct);

    let mut ledger = Ledger {
        balance: starting_corpus,
        cumulative_invested: 0.0,
    };
    let mut withdrawal = params.initial_monthly_withdrawal;
    let mut contribution = params.ongoing_monthly_contribution;
    let mut months_survived = 0_u32;
    let mut total_withdrawn = 0.0;
    let mut total_contributed = 0.0;
    let mut total_interest = 0.0;
    let mut records = Vec::new();

    for offset_year in 1..=params.max_years {
        let year = year_offset.saturating_add(offset_year);
        let applied = apply_cash_events(&mut ledger, events, year);
        let opening_balance = ledger.balance;

        let mut year_interest = 0.0;
        let mut year_contribution = 0.0;
        let mut year_withdrawal = 0.0;
        let mut months_funded = 0_u32;
        let mut depleted = false;

        for _ in 0..12 {
            let interest = ledger.balance * rate;
            ledger.balance += interest;
            ledger.balance += contribution;
            let taken = withdrawal.min(ledger.balance);
            ledger.balance = (ledger.balance - taken).max(0.0);

            year_interest += interest;
            year_contribution += contribution;
            year_withdrawal += taken;
            if taken >= withdrawal {
                months_funded += 1;
            }
            if ledger.balance <= 0.0 {
                depleted = true;
                break;
            }
        }

        ledger.cumulative_invested += year_contribution;
        months_survived += months_funded;
        total_withdrawn += year_withdrawal;
        total_contributed += year_contribution;
        total_interest += year_interest;

        let factor = inflation_factor(inflation_pct, year);
        records.push(YearRecord {
            year,
            phase: Phase::Distribution,
            opening_balance,
            contribution: year_contribution,
            interest_earned: year_interest,
            withdrawal: year_withdrawal,
            closing_balance: ledger.balance,
            cumulative_invested: ledger.cumulative_invested,
            inflation_factor: factor,
            real_value: ledger.balance / factor,
            months_funded,
            applied_cash_event: applied,
        });

        if depleted {
            break;
        }

        withdrawal *= 1.0 + withdrawal_growth;
        contribution *= 1.0 + contribution_step_up;
    }

    let is_indefinite =
        ledger.balance > 0.0 && months_survived >= params.max_years.saturating_mul(12);
    let survival = SurvivalOutcome::from_months(months_survived, is_indefinite);

    debug!(
        "distribution: corpus {:.2} lasted {} months (indefinite: {})",
        starting_corpus, months_survived, is_indefinite
    );

    DistributionResult {
        yearly_records: records,
        survival,
        summary: DistributionSummary {
            starting_corpus,
            final_balance: ledger.balance,
            total_withdrawn,
            total_contributed,
            total_interest,
        },
    }
}

fn empty_result(starting_corpus: f64) -> DistributionResult {
    DistributionResult {
        yearly_records: Vec::new(),
        survival: SurvivalOutcome::default(),
        summary: DistributionSummary {
            starting_corpus,
            final_balance: starting_corpus.max(0.0),
            total_withdrawn: 0.0,
            total_contributed: 0.0,
            total_interest: 0.0,
        },
    }
}
