//! Memoization of full simulations keyed by the complete parameter and event set.
//!
//! Floats are compared and hashed by bit pattern, so `0.0` and `-0.0` are
//! distinct keys and a `NaN` input still finds its own entry.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use log::debug;

use super::engine::run_full_simulation;
use super::types::{
    AccumulationParameters, CashEvent, CashEventKind, DistributionParameters, OrchestratorResult,
};

pub const DEFAULT_CACHE_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
struct CacheKey {
    accumulation: AccumulationParameters,
    distribution: DistributionParameters,
    events: Vec<CashEvent>,
}

impl CacheKey {
    fn float_bits(&self) -> impl Iterator<Item = u64> + '_ {
        let acc = &self.accumulation;
        let dist = &self.distribution;
        [
            acc.initial_lump_sum,
            acc.base_monthly_contribution,
            acc.annual_step_up_pct,
            acc.annual_growth_pct,
            acc.annual_inflation_pct,
            dist.initial_monthly_withdrawal,
            dist.annual_withdrawal_growth_pct,
            dist.ongoing_monthly_contribution,
            dist.annual_contribution_step_up_pct,
            dist.annual_growth_pct,
        ]
        .into_iter()
        .map(f64::to_bits)
    }
}

impl PartialEq for CacheKey {
    fn eq(&self, other: &Self) -> bool {
        self.accumulation.duration_years == other.accumulation.duration_years
            && self.distribution.max_years == other.distribution.max_years
            && self.float_bits().eq(other.float_bits())
            && self.events.len() == other.events.len()
            && self.events.iter().zip(&other.events).all(|(a, b)| {
                a.year_index == b.year_index
                    && a.amount.to_bits() == b.amount.to_bits()
                    && a.kind == b.kind
                    && a.label == b.label
            })
    }
}

impl Eq for CacheKey {}

impl Hash for CacheKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.accumulation.duration_years.hash(state);
        self.distribution.max_years.hash(state);
        for bits in self.float_bits() {
            bits.hash(state);
        }
        self.events.len().hash(state);
        for event in &self.events {
            event.year_index.hash(state);
            event.amount.to_bits().hash(state);
            matches!(event.kind, CashEventKind::Addition).hash(state);
            event.label.hash(state);
        }
    }
}

/// Bounded memo table for `run_full_simulation`. When full, it is cleared
/// before the next insert.
#[derive(Debug)]
pub struct SimulationCache {
    entries: HashMap<CacheKey, OrchestratorResult>,
    capacity: usize,
    hits: u64,
    misses: u64,
}

impl Default for SimulationCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }
}

impl SimulationCache {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            capacity: capacity.max(1),
            hits: 0,
            misses: 0,
        }
    }

    pub fn run_full_simulation(
        &mut self,
        acc_params: &AccumulationParameters,
        dist_params: &DistributionParameters,
        events: &[CashEvent],
    ) -> OrchestratorResult {
        let key = CacheKey {
            accumulation: acc_params.clone(),
            distribution: dist_params.clone(),
            events: events.to_vec(),
        };

        if let Some(hit) = self.entries.get(&key) {
            self.hits += 1;
            return hit.clone();
        }

        self.misses += 1;
        if self.entries.len() >= self.capacity {
            debug!("simulation cache full at {} entries, clearing", self.entries.len());
            self.entries.clear();
        }
        let result = run_full_simulation(acc_params, dist_params, events);
        self.entries.insert(key, result.clone());
        result
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}
