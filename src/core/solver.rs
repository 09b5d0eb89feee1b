use log::debug;

use super::accumulation::{project_corpus, project_corpus_path};
use super::rates::{fraction, real_rate};
use super::types::{
    AccumulationParameters, DistributionParameters, ExportParams, GoalInputs, GoalResult,
    GoalTrajectoryPoint, SustainMode,
};

pub const MAX_BISECTION_ITERATIONS: u32 = 100;
/// Absolute currency tolerance between projected and target corpus.
pub const CORPUS_TOLERANCE: f64 = 100.0;
pub const NEAR_ZERO_REAL_RATE: f64 = 0.0001;
/// Distribution horizon exported for goals that must last indefinitely.
pub const INDEFINITE_HORIZON_YEARS: u32 = 100;

#[derive(Debug, Clone, Copy)]
struct CorpusTarget {
    real_rate_pct: f64,
    monthly_withdrawal: f64,
    annual_withdrawal: f64,
    corpus: f64,
}

#[derive(Debug, Clone, Copy)]
struct BisectionOutcome {
    contribution: f64,
    projected: f64,
    iterations: u32,
    converged: bool,
}

pub fn solve_retirement_goal(inputs: &GoalInputs) -> GoalResult {
    let target = target_corpus(inputs);
    let lump_sum_projection = project_corpus(
        inputs.current_lump_sum,
        0.0,
        inputs.annual_step_up_pct,
        inputs.annual_growth_pct,
        inputs.years_to_retirement,
    );

    let mut result = GoalResult {
        real_rate_pct: target.real_rate_pct,
        monthly_withdrawal_at_retirement: target.monthly_withdrawal,
        annual_withdrawal_at_retirement: target.annual_withdrawal,
        target_corpus: target.corpus,
        lump_sum_projection,
        surplus: 0.0,
        required_monthly_contribution: None,
        projected_corpus: lump_sum_projection,
        achievable: false,
        converged: false,
        iterations: 0,
        message: String::new(),
        trajectory: Vec::new(),
        export_params: None,
    };

    if !target.corpus.is_finite() {
        result.message = format!(
            "Not achievable: a {:.2}% return does not outpace {:.2}% spending growth, so no corpus can fund this spending indefinitely.",
            inputs.annual_growth_pct, inputs.spend_growth_pct
        );
        return result;
    }

    let contribution = if lump_sum_projection >= target.corpus {
        result.surplus = lump_sum_projection - target.corpus;
        result.converged = true;
        result.message = "Current savings alone reach the target corpus.".to_string();
        0.0
    } else if inputs.years_to_retirement == 0 {
        result.message =
            "Not achievable: no years remain to contribute toward the target corpus.".to_string();
        return result;
    } else {
        let outcome = bisect_contribution(inputs, target.corpus);
        result.projected_corpus = outcome.projected;
        result.iterations = outcome.iterations;
        result.converged = outcome.converged;
        if outcome.projected < target.corpus - CORPUS_TOLERANCE {
            result.message = format!(
                "Not achievable: even a {:.2} monthly contribution projects only {:.2} against a {:.2} target.",
                outcome.contribution, outcome.projected, target.corpus
            );
            return result;
        }
        result.message = if outcome.converged {
            "Solved required monthly contribution.".to_string()
        } else {
            "Reached max iterations before tolerance was met; returning best estimate.".to_string()
        };
        outcome.contribution
    };

    result.achievable = true;
    result.required_monthly_contribution = Some(contribution);
    result.trajectory = build_trajectory(inputs, contribution, target.corpus);
    result.export_params = Some(export_params(inputs, contribution, target.monthly_withdrawal));

    debug!(
        "goal: target corpus {:.2}, contribution {:.2} after {} iterations",
        target.corpus, contribution, result.iterations
    );

    result
}

fn target_corpus(inputs: &GoalInputs) -> CorpusTarget {
    let real_rate_pct = real_rate(inputs.annual_growth_pct, inputs.spend_growth_pct);
    let r = fraction(real_rate_pct);
    let monthly_withdrawal = inputs.monthly_spend_today
        * (1.0 + fraction(inputs.inflation_pct)).powf(inputs.years_to_retirement as f64);
    let annual_withdrawal = monthly_withdrawal * 12.0;

    let corpus = match inputs.sustain {
        SustainMode::Indefinite => {
            if r > 0.0 {
                annual_withdrawal / r
            } else {
                f64::INFINITY
            }
        }
        SustainMode::FixedYears(years) => {
            if r.abs() < NEAR_ZERO_REAL_RATE {
                annual_withdrawal * years as f64
            } else {
                annual_withdrawal * (1.0 - (1.0 + r).powf(-(years as f64))) / r
            }
        }
    };

    CorpusTarget {
        real_rate_pct,
        monthly_withdrawal,
        annual_withdrawal,
        corpus,
    }
}

fn bisect_contribution(inputs: &GoalInputs, target: f64) -> BisectionOutcome {
    let project = |contribution: f64| {
        project_corpus(
            inputs.current_lump_sum,
            contribution,
            inputs.annual_step_up_pct,
            inputs.annual_growth_pct,
            inputs.years_to_retirement,
        )
    };

    let mut lo = 0.0;
    let mut hi = target / 12.0;
    let mut upper = (hi, project(hi));

    for iteration in 1..=MAX_BISECTION_ITERATIONS {
        let mid = (lo + hi) * 0.5;
        let projected = project(mid);

        if (projected - target).abs() <= CORPUS_TOLERANCE {
            return BisectionOutcome {
                contribution: mid,
                projected,
                iterations: iteration,
                converged: true,
            };
        }
        if projected < target {
            lo = mid;
        } else {
            hi = mid;
            upper = (mid, projected);
        }
    }

    // Unconverged: report the upper bracket, which never projects below target
    // unless the target was out of reach to begin with.
    BisectionOutcome {
        contribution: upper.0,
        projected: upper.1,
        iterations: MAX_BISECTION_ITERATIONS,
        converged: false,
    }
}

fn build_trajectory(inputs: &GoalInputs, contribution: f64, target: f64) -> Vec<GoalTrajectoryPoint> {
    let lump_only = project_corpus_path(
        inputs.current_lump_sum,
        0.0,
        inputs.annual_step_up_pct,
        inputs.annual_growth_pct,
        inputs.years_to_retirement,
    );
    let with_contribution = project_corpus_path(
        inputs.current_lump_sum,
        contribution,
        inputs.annual_step_up_pct,
        inputs.annual_growth_pct,
        inputs.years_to_retirement,
    );

    lump_only
        .into_iter()
        .zip(with_contribution)
        .enumerate()
        .map(|(year, (lump_sum_only, with_contribution))| GoalTrajectoryPoint {
            year: year as u32,
            lump_sum_only,
            with_contribution,
            target,
        })
        .collect()
}

fn export_params(inputs: &GoalInputs, contribution: f64, monthly_withdrawal: f64) -> ExportParams {
    let max_years = match inputs.sustain {
        SustainMode::Indefinite => INDEFINITE_HORIZON_YEARS,
        SustainMode::FixedYears(years) => years,
    };

    ExportParams {
        accumulation: AccumulationParameters {
            initial_lump_sum: inputs.current_lump_sum,
            base_monthly_contribution: contribution,
            annual_step_up_pct: inputs.annual_step_up_pct,
            annual_growth_pct: inputs.annual_growth_pct,
            duration_years: inputs.years_to_retirement,
            annual_inflation_pct: inputs.inflation_pct,
        },
        distribution: DistributionParameters {
            initial_monthly_withdrawal: monthly_withdrawal,
            annual_withdrawal_growth_pct: inputs.spend_growth_pct,
            ongoing_monthly_contribution: 0.0,
            annual_contribution_step_up_pct: 0.0,
            annual_growth_pct: inputs.annual_growth_pct,
            max_years,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::engine::run_full_simulation;
    use proptest::prelude::{prop_assert, proptest};

    fn assert_close(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "expected {expected}, got {actual}, tolerance {tol}"
        );
    }

    fn sample_inputs() -> GoalInputs {
        GoalInputs {
            monthly_spend_today: 100_000.0,
            years_to_retirement: 20,
            current_lump_sum: 500_000.0,
            annual_growth_pct: 12.0,
            annual_step_up_pct: 10.0,
            inflation_pct: 6.0,
            spend_growth_pct: 6.0,
            sustain: SustainMode::Indefinite,
        }
    }

    #[test]
    fn perpetuity_target_uses_real_rate() {
        let result = solve_retirement_goal(&sample_inputs());

        assert_close(result.real_rate_pct, 5.66, 0.01);
        assert_close(result.monthly_withdrawal_at_retirement, 320_713.547_221_284_8, 1e-6);
        assert_close(result.target_corpus, 67_991_272.010_912_4, 1e-3);
        assert!(result.target_corpus.is_finite() && result.target_corpus > 0.0);
        assert!(result.achievable);
    }

    #[test]
    fn solved_contribution_round_trips_within_tolerance() {
        let inputs = sample_inputs();
        let result = solve_retirement_goal(&inputs);
        let contribution = result.required_monthly_contribution.expect("solved");

        assert!(result.converged);
        assert!(contribution > 0.0);
        let projected = project_corpus(
            inputs.current_lump_sum,
            contribution,
            inputs.annual_step_up_pct,
            inputs.annual_growth_pct,
            inputs.years_to_retirement,
        );
        assert!((projected - result.target_corpus).abs() <= CORPUS_TOLERANCE);
        assert_close(result.projected_corpus, projected, 1e-9);
    }

    #[test]
    fn spending_growth_at_or_above_return_is_not_achievable() {
        let mut inputs = sample_inputs();
        inputs.spend_growth_pct = 12.0;
        let result = solve_retirement_goal(&inputs);

        assert_eq!(result.target_corpus, f64::INFINITY);
        assert!(!result.achievable);
        assert!(result.required_monthly_contribution.is_none());
        assert!(result.export_params.is_none());
        assert_eq!(result.iterations, 0);
        assert!(result.message.starts_with("Not achievable"));
    }

    #[test]
    fn fixed_years_uses_annuity_present_value() {
        let mut inputs = sample_inputs();
        inputs.sustain = SustainMode::FixedYears(25);
        let result = solve_retirement_goal(&inputs);

        let r = result.real_rate_pct / 100.0;
        let expected = result.annual_withdrawal_at_retirement * (1.0 - (1.0 + r).powi(-25)) / r;
        assert_close(result.target_corpus, expected, 1e-6);
        assert!(result.target_corpus < result.annual_withdrawal_at_retirement / r);
    }

    #[test]
    fn near_zero_real_rate_falls_back_to_straight_line() {
        let mut inputs = sample_inputs();
        inputs.annual_growth_pct = 8.0;
        inputs.spend_growth_pct = 8.0;
        inputs.sustain = SustainMode::FixedYears(30);
        let result = solve_retirement_goal(&inputs);

        assert_close(
            result.target_corpus,
            result.annual_withdrawal_at_retirement * 30.0,
            1e-6,
        );
    }

    #[test]
    fn large_lump_sum_reports_surplus_and_zero_contribution() {
        let mut inputs = sample_inputs();
        inputs.current_lump_sum = 1_000_000_000.0;
        let result = solve_retirement_goal(&inputs);

        assert_eq!(result.required_monthly_contribution, Some(0.0));
        assert!(result.surplus > 0.0);
        assert_close(
            result.surplus,
            result.lump_sum_projection - result.target_corpus,
            1e-6,
        );
        assert_eq!(result.iterations, 0);
    }

    #[test]
    fn zero_years_without_enough_savings_is_not_achievable() {
        let mut inputs = sample_inputs();
        inputs.years_to_retirement = 0;
        let result = solve_retirement_goal(&inputs);

        assert!(!result.achievable);
        assert!(result.required_monthly_contribution.is_none());
    }

    #[test]
    fn very_long_fixed_horizon_stays_positive_and_finite() {
        let mut inputs = sample_inputs();
        inputs.sustain = SustainMode::FixedYears(u32::MAX);
        let result = solve_retirement_goal(&inputs);

        let r = result.real_rate_pct / 100.0;
        assert!(result.target_corpus > 0.0);
        assert_close(
            result.target_corpus,
            result.annual_withdrawal_at_retirement / r,
            1e-3,
        );

        inputs.sustain = SustainMode::FixedYears(1 << 31);
        let result = solve_retirement_goal(&inputs);
        assert!(result.target_corpus > 0.0 && result.target_corpus.is_finite());
        assert!(result.surplus >= 0.0);
    }

    #[test]
    fn shrinking_returns_that_cannot_reach_target_are_not_achievable() {
        let inputs = GoalInputs {
            monthly_spend_today: 10_000.0,
            years_to_retirement: 1,
            current_lump_sum: 0.0,
            annual_growth_pct: -60.0,
            annual_step_up_pct: 0.0,
            inflation_pct: 0.0,
            spend_growth_pct: 0.0,
            sustain: SustainMode::FixedYears(10),
        };
        let result = solve_retirement_goal(&inputs);

        assert!(result.target_corpus.is_finite() && result.target_corpus > 0.0);
        assert!(!result.converged);
        assert!(!result.achievable);
        assert!(result.required_monthly_contribution.is_none());
        assert!(result.export_params.is_none());
        assert!(result.projected_corpus < result.target_corpus);
        assert!(result.message.starts_with("Not achievable"));
    }

    #[test]
    fn trajectory_spans_each_year_with_constant_target() {
        let inputs = sample_inputs();
        let result = solve_retirement_goal(&inputs);

        assert_eq!(result.trajectory.len(), 21);
        let first = result.trajectory[0];
        assert_eq!(first.lump_sum_only, inputs.current_lump_sum);
        assert_eq!(first.with_contribution, inputs.current_lump_sum);
        let last = result.trajectory[20];
        assert_close(last.lump_sum_only, result.lump_sum_projection, 1e-9);
        assert_close(last.with_contribution, result.projected_corpus, 1e-9);
        assert!(result.trajectory.iter().all(|p| p.target == result.target_corpus));
    }

    #[test]
    fn export_params_feed_the_forward_simulation() {
        let inputs = sample_inputs();
        let result = solve_retirement_goal(&inputs);
        let params = result.export_params.as_ref().expect("exported");

        assert_eq!(params.distribution.max_years, INDEFINITE_HORIZON_YEARS);
        assert_eq!(params.accumulation.duration_years, 20);

        let full = run_full_simulation(&params.accumulation, &params.distribution, &[]);
        assert!((full.transition_corpus - result.target_corpus).abs() <= CORPUS_TOLERANCE);
        assert!(!full.distribution.yearly_records.is_empty());
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(48))]

        #[test]
        fn prop_achievable_goals_round_trip(
            spend in 5_000u32..300_000,
            years in 1u32..40,
            lump in 0u32..5_000_000,
            growth_bp in 0u32..1_800,
            step_up_bp in 0u32..2_000,
            fixed_years in 5u32..50,
        ) {
            let inputs = GoalInputs {
                monthly_spend_today: spend as f64,
                years_to_retirement: years,
                current_lump_sum: lump as f64,
                annual_growth_pct: growth_bp as f64 / 100.0,
                annual_step_up_pct: step_up_bp as f64 / 100.0,
                inflation_pct: 5.0,
                spend_growth_pct: 4.0,
                sustain: SustainMode::FixedYears(fixed_years),
            };
            let result = solve_retirement_goal(&inputs);
            prop_assert!(result.achievable);
            let contribution = result.required_monthly_contribution.unwrap_or(f64::NAN);
            prop_assert!(contribution >= 0.0);
            if contribution > 0.0 && result.converged {
                prop_assert!((result.projected_corpus - result.target_corpus).abs() <= CORPUS_TOLERANCE);
            }
        }
    }
}
