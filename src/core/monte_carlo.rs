use std::f64::consts::PI;

use log::debug;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use super::rates::{fraction, monthly_rate};
use super::types::{
    AccumulationParameters, DistributionParameters, MonteCarloAggregate, MonteCarloOptions,
    MonteCarloRun, PercentileBand, Phase, YearBand,
};

/// Source of normally distributed annual returns.
pub trait NormalSampler {
    fn sample(&mut self, mean: f64, std_dev: f64) -> f64;
}

impl<F> NormalSampler for F
where
    F: FnMut(f64, f64) -> f64,
{
    fn sample(&mut self, mean: f64, std_dev: f64) -> f64 {
        self(mean, std_dev)
    }
}

/// Box–Muller transform: one standard normal per call from two uniforms.
pub struct BoxMuller<R> {
    rng: R,
}

impl<R: Rng> BoxMuller<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    pub fn standard_normal(&mut self) -> f64 {
        let u1 = self.rng.gen_range(0.0..1.0_f64).max(1e-12);
        let u2 = self.rng.gen_range(0.0..1.0_f64);
        (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
    }
}

impl BoxMuller<ChaCha8Rng> {
    pub fn seeded(seed: u64) -> Self {
        Self::new(ChaCha8Rng::seed_from_u64(seed))
    }
}

impl<R: Rng> NormalSampler for BoxMuller<R> {
    fn sample(&mut self, mean: f64, std_dev: f64) -> f64 {
        mean + std_dev * self.standard_normal()
    }
}

/// Seeded ensemble. Each run owns an RNG derived from `options.seed` and its
/// index, so runs execute in parallel and the result does not depend on
/// scheduling.
pub fn run_monte_carlo(
    acc_params: &AccumulationParameters,
    dist_params: &DistributionParameters,
    options: &MonteCarloOptions,
) -> MonteCarloAggregate {
    let runs = (0..options.run_count)
        .into_par_iter()
        .map(|run_id| {
            let mut sampler = BoxMuller::seeded(derive_seed(options.seed, run_id));
            simulate_run(acc_params, dist_params, options, &mut sampler)
        })
        .collect::<Vec<_>>();

    aggregate(&runs, options, acc_params.duration_years)
}

/// Sequential ensemble drawing every return from `sampler`.
pub fn run_monte_carlo_with<S: NormalSampler + ?Sized>(
    acc_params: &AccumulationParameters,
    dist_params: &DistributionParameters,
    options: &MonteCarloOptions,
    sampler: &mut S,
) -> MonteCarloAggregate {
    let runs = (0..options.run_count)
        .map(|_| simulate_run(acc_params, dist_params, options, &mut *sampler))
        .collect::<Vec<_>>();

    aggregate(&runs, options, acc_params.duration_years)
}

pub fn simulate_run<S: NormalSampler + ?Sized>(
    acc_params: &AccumulationParameters,
    dist_params: &DistributionParameters,
    options: &MonteCarloOptions,
    sampler: &mut S,
) -> MonteCarloRun {
    let total_years = horizon_years(acc_params, options);
    let mut balances = Vec::new();

    let mut balance = acc_params.initial_lump_sum;
    let mut contribution = acc_params.base_monthly_contribution;
    let step_up = fraction(acc_params.annual_step_up_pct);
    balances.push(balance);

    for _ in 0..acc_params.duration_years {
        let annual_return = sampler.sample(acc_params.annual_growth_pct, options.volatility_pct);
        // Negative years are floored while accumulating only.
        let rate = monthly_rate(annual_return.max(0.0));
        for _ in 0..12 {
            balance += balance * rate;
            balance += contribution;
        }
        balances.push(balance);
        contribution *= 1.0 + step_up;
    }
    let corpus_at_transition = balance;

    let withdrawal_growth = fraction(dist_params.annual_withdrawal_growth_pct);
    let contribution_step_up = fraction(dist_params.annual_contribution_step_up_pct);
    let mut withdrawal = dist_params.initial_monthly_withdrawal;
    let mut contribution = dist_params.ongoing_monthly_contribution;
    let mut months_survived = 0_u32;
    let mut depleted = false;

    for _ in 0..options.target_survival_years {
        let annual_return = sampler.sample(dist_params.annual_growth_pct, options.volatility_pct);
        let rate = monthly_rate(annual_return);
        for _ in 0..12 {
            balance += balance * rate;
            balance += contribution;
            let taken = withdrawal.min(balance);
            balance = (balance - taken).max(0.0);
            if taken >= withdrawal {
                months_survived += 1;
            }
            if balance <= 0.0 {
                depleted = true;
                break;
            }
        }
        balances.push(balance);
        if depleted {
            break;
        }
        withdrawal *= 1.0 + withdrawal_growth;
        contribution *= 1.0 + contribution_step_up;
    }

    balances.resize(total_years as usize + 1, 0.0);
    let survived = !depleted && balance > 0.0;
    let survival_years = if survived {
        options.target_survival_years as f64
    } else {
        months_survived as f64 / 12.0
    };

    MonteCarloRun {
        balances,
        corpus_at_transition,
        survived,
        survival_years,
    }
}

/// Years covered by one run's balance path, excluding the year-0 anchor.
pub fn horizon_years(acc_params: &AccumulationParameters, options: &MonteCarloOptions) -> u32 {
    acc_params
        .duration_years
        .saturating_add(options.target_survival_years)
}

pub fn aggregate(
    runs: &[MonteCarloRun],
    options: &MonteCarloOptions,
    transition_year: u32,
) -> MonteCarloAggregate {
    if runs.is_empty() {
        return MonteCarloAggregate {
            run_count: 0,
            successful_runs: 0,
            success_rate: 0.0,
            transition_year,
            yearly_bands: Vec::new(),
            corpus_stats: PercentileBand::default(),
            avg_failed_survival_years: options.target_survival_years as f64,
        };
    }

    let year_count = runs.iter().map(|r| r.balances.len()).max().unwrap_or(0);
    let mut yearly_bands = Vec::with_capacity(year_count);
    let mut column = Vec::with_capacity(runs.len());
    for year in 0..year_count {
        column.clear();
        column.extend(runs.iter().map(|r| r.balances.get(year).copied().unwrap_or(0.0)));
        let year = year as u32;
        yearly_bands.push(YearBand {
            year,
            phase: if year <= transition_year {
                Phase::Accumulation
            } else {
                Phase::Distribution
            },
            band: percentile_band(&mut column),
        });
    }

    let mut corpora = runs.iter().map(|r| r.corpus_at_transition).collect::<Vec<_>>();
    let corpus_stats = percentile_band(&mut corpora);

    let successful_runs = runs.iter().filter(|r| r.survived).count() as u32;
    let failed = runs.iter().filter(|r| !r.survived).collect::<Vec<_>>();
    let avg_failed_survival_years = if failed.is_empty() {
        options.target_survival_years as f64
    } else {
        failed.iter().map(|r| r.survival_years).sum::<f64>() / failed.len() as f64
    };

    let run_count = runs.len() as u32;
    let success_rate = 100.0 * successful_runs as f64 / run_count as f64;
    debug!(
        "monte carlo: {run_count} runs, success {success_rate:.1}%, median corpus {:.2}",
        corpus_stats.p50
    );

    MonteCarloAggregate {
        run_count,
        successful_runs,
        success_rate,
        transition_year,
        yearly_bands,
        corpus_stats,
        avg_failed_survival_years,
    }
}

/// Order-statistic percentiles: index `floor(n * q)`, no interpolation.
pub fn percentile_band(values: &mut [f64]) -> PercentileBand {
    if values.is_empty() {
        return PercentileBand::default();
    }
    values.sort_by(|a, b| a.total_cmp(b));

    let n = values.len();
    let at = |q: f64| values[((n as f64 * q).floor() as usize).min(n - 1)];
    PercentileBand {
        p10: at(0.10),
        p25: at(0.25),
        p50: at(0.50),
        p75: at(0.75),
        p90: at(0.90),
        min: values[0],
        max: values[n - 1],
    }
}

fn derive_seed(base_seed: u64, run_id: u32) -> u64 {
    splitmix64(base_seed ^ ((run_id as u64) << 32) ^ run_id as u64)
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::accumulation::project_corpus;
    use crate::core::distribution::simulate_distribution;
    use proptest::prelude::{any, prop_assert, proptest};

    fn assert_close(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "expected {expected}, got {actual}, tolerance {tol}"
        );
    }

    fn acc_params() -> AccumulationParameters {
        AccumulationParameters {
            initial_lump_sum: 500_000.0,
            base_monthly_contribution: 25_000.0,
            annual_step_up_pct: 10.0,
            annual_growth_pct: 12.0,
            duration_years: 20,
            annual_inflation_pct: 6.0,
        }
    }

    fn dist_params() -> DistributionParameters {
        DistributionParameters {
            initial_monthly_withdrawal: 250_000.0,
            annual_withdrawal_growth_pct: 6.0,
            ongoing_monthly_contribution: 0.0,
            annual_contribution_step_up_pct: 0.0,
            annual_growth_pct: 10.0,
            max_years: 30,
        }
    }

    fn options(run_count: u32) -> MonteCarloOptions {
        MonteCarloOptions {
            run_count,
            volatility_pct: 15.0,
            target_survival_years: 30,
            seed: 7,
        }
    }

    fn assert_band_ordered(band: &PercentileBand) {
        assert!(band.min <= band.p10);
        assert!(band.p10 <= band.p25);
        assert!(band.p25 <= band.p50);
        assert!(band.p50 <= band.p75);
        assert!(band.p75 <= band.p90);
        assert!(band.p90 <= band.max);
    }

    #[test]
    fn mean_only_sampler_reproduces_deterministic_accumulation() {
        let acc = acc_params();
        let mut sampler = |mean: f64, _std: f64| mean;
        let result = run_monte_carlo_with(&acc, &dist_params(), &options(5), &mut sampler);

        let expected = project_corpus(
            acc.initial_lump_sum,
            acc.base_monthly_contribution,
            acc.annual_step_up_pct,
            acc.annual_growth_pct,
            acc.duration_years,
        );
        assert_close(result.corpus_stats.p50, expected, 1e-6);
        assert_close(result.corpus_stats.min, result.corpus_stats.max, 1e-9);
        assert_eq!(result.yearly_bands.len(), 51);
        assert_eq!(result.yearly_bands[0].band.p50, acc.initial_lump_sum);
    }

    #[test]
    fn negative_returns_are_floored_only_while_accumulating() {
        let acc = AccumulationParameters {
            initial_lump_sum: 1_000.0,
            base_monthly_contribution: 0.0,
            annual_step_up_pct: 0.0,
            annual_growth_pct: -24.0,
            duration_years: 2,
            annual_inflation_pct: 0.0,
        };
        let dist = DistributionParameters {
            initial_monthly_withdrawal: 0.0,
            annual_withdrawal_growth_pct: 0.0,
            ongoing_monthly_contribution: 0.0,
            annual_contribution_step_up_pct: 0.0,
            annual_growth_pct: -24.0,
            max_years: 1,
        };
        let opts = MonteCarloOptions {
            run_count: 1,
            volatility_pct: 0.0,
            target_survival_years: 1,
            seed: 1,
        };
        let mut sampler = |mean: f64, _std: f64| mean;
        let run = simulate_run(&acc, &dist, &opts, &mut sampler);

        assert_eq!(run.corpus_at_transition, 1_000.0);
        assert_close(run.balances[3], 1_000.0 * 0.98_f64.powi(12), 1e-9);
        assert!(run.survived);
    }

    #[test]
    fn exact_depletion_counts_the_final_funded_month() {
        let acc = AccumulationParameters {
            initial_lump_sum: 30_000.0,
            base_monthly_contribution: 0.0,
            annual_step_up_pct: 0.0,
            annual_growth_pct: 0.0,
            duration_years: 0,
            annual_inflation_pct: 0.0,
        };
        let dist = DistributionParameters {
            initial_monthly_withdrawal: 1_000.0,
            annual_withdrawal_growth_pct: 0.0,
            ongoing_monthly_contribution: 0.0,
            annual_contribution_step_up_pct: 0.0,
            annual_growth_pct: 0.0,
            max_years: 10,
        };
        let opts = MonteCarloOptions {
            run_count: 1,
            volatility_pct: 0.0,
            target_survival_years: 10,
            seed: 3,
        };
        let mut sampler = |mean: f64, _std: f64| mean;
        let run = simulate_run(&acc, &dist, &opts, &mut sampler);

        let deterministic = simulate_distribution(&dist, 30_000.0, 0, 0.0, &[]);
        assert!(!run.survived);
        assert_eq!(deterministic.survival.full_months_survived, 30);
        assert_close(run.survival_years, 30.0 / 12.0, 1e-12);
        assert_eq!(run.balances.len(), 11);
    }

    #[test]
    fn short_final_withdrawal_is_not_a_funded_month() {
        let acc = AccumulationParameters {
            initial_lump_sum: 2_500.0,
            base_monthly_contribution: 0.0,
            annual_step_up_pct: 0.0,
            annual_growth_pct: 0.0,
            duration_years: 0,
            annual_inflation_pct: 0.0,
        };
        let mut dist = dist_params();
        dist.initial_monthly_withdrawal = 1_000.0;
        dist.annual_growth_pct = 0.0;
        let mut sampler = |mean: f64, _std: f64| mean;
        let run = simulate_run(&acc, &dist, &options(1), &mut sampler);

        assert_close(run.survival_years, 2.0 / 12.0, 1e-12);
    }

    #[test]
    fn horizon_saturates_instead_of_overflowing() {
        let mut acc = acc_params();
        acc.duration_years = u32::MAX - 1;
        assert_eq!(horizon_years(&acc, &options(1)), u32::MAX);
        assert_eq!(horizon_years(&acc_params(), &options(1)), 50);
    }

    #[test]
    fn overspending_fails_every_run() {
        let mut dist = dist_params();
        dist.initial_monthly_withdrawal = 50_000_000.0;
        let result = run_monte_carlo(&acc_params(), &dist, &options(50));

        assert_eq!(result.successful_runs, 0);
        assert_eq!(result.success_rate, 0.0);
        assert!(result.avg_failed_survival_years < 1.0);
        let last = result.yearly_bands.last().expect("bands");
        assert_eq!(last.band.max, 0.0);
        assert_eq!(last.phase, Phase::Distribution);
    }

    #[test]
    fn no_failures_reports_target_as_average_survival() {
        let mut dist = dist_params();
        dist.initial_monthly_withdrawal = 1.0;
        let mut sampler = |mean: f64, _std: f64| mean;
        let result = run_monte_carlo_with(&acc_params(), &dist, &options(10), &mut sampler);

        assert_eq!(result.success_rate, 100.0);
        assert_eq!(result.avg_failed_survival_years, 30.0);
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let a = run_monte_carlo(&acc_params(), &dist_params(), &options(64));
        let b = run_monte_carlo(&acc_params(), &dist_params(), &options(64));
        assert_eq!(a, b);

        let mut other = options(64);
        other.seed = 8;
        let c = run_monte_carlo(&acc_params(), &dist_params(), &other);
        assert_ne!(a.corpus_stats, c.corpus_stats);
    }

    #[test]
    fn zero_runs_yield_empty_aggregate() {
        let result = run_monte_carlo(&acc_params(), &dist_params(), &options(0));
        assert_eq!(result.run_count, 0);
        assert_eq!(result.success_rate, 0.0);
        assert!(result.yearly_bands.is_empty());
    }

    #[test]
    fn percentile_reads_floor_index() {
        let mut values = (0..100).rev().map(|v| v as f64).collect::<Vec<_>>();
        let band = percentile_band(&mut values);
        assert_eq!(band.p10, 10.0);
        assert_eq!(band.p25, 25.0);
        assert_eq!(band.p50, 50.0);
        assert_eq!(band.p90, 90.0);
        assert_eq!(band.min, 0.0);
        assert_eq!(band.max, 99.0);

        let mut single = vec![3.5];
        assert_eq!(percentile_band(&mut single).p90, 3.5);
    }

    #[test]
    fn box_muller_has_unit_moments() {
        let mut sampler = BoxMuller::seeded(99);
        let n = 20_000;
        let draws = (0..n).map(|_| sampler.standard_normal()).collect::<Vec<_>>();
        let mean = draws.iter().sum::<f64>() / n as f64;
        let var = draws.iter().map(|z| (z - mean).powi(2)).sum::<f64>() / n as f64;
        assert_close(mean, 0.0, 0.05);
        assert_close(var.sqrt(), 1.0, 0.05);

        let mut shifted = BoxMuller::seeded(99);
        let first = shifted.sample(12.0, 15.0);
        assert_close(first, 12.0 + 15.0 * draws[0], 1e-9);
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(16))]

        #[test]
        fn prop_bands_are_ordered_and_success_rate_bounded(
            seed in any::<u64>(),
            runs in 1u32..60,
            volatility_bp in 0u32..4_000,
            withdrawal in 10_000u32..600_000,
        ) {
            let mut dist = dist_params();
            dist.initial_monthly_withdrawal = withdrawal as f64;
            let opts = MonteCarloOptions {
                run_count: runs,
                volatility_pct: volatility_bp as f64 / 100.0,
                target_survival_years: 25,
                seed,
            };
            let result = run_monte_carlo(&acc_params(), &dist, &opts);

            prop_assert!((0.0..=100.0).contains(&result.success_rate));
            for year in &result.yearly_bands {
                assert_band_ordered(&year.band);
            }
            assert_band_ordered(&result.corpus_stats);
        }
    }
}
