//! Percentage conversions shared by every engine.
//!
//! Inputs are whole-number percentages. The monthly rate is a plain `annual / 12`
//! split rather than a geometric equivalent, and every engine uses it that way.

pub fn fraction(pct: f64) -> f64 {
    pct / 100.0
}

pub fn monthly_rate(annual_pct: f64) -> f64 {
    annual_pct / 100.0 / 12.0
}

/// Fisher equation: `(1 + real) = (1 + nominal) / (1 + comparison)`, in percent.
pub fn real_rate(nominal_pct: f64, comparison_pct: f64) -> f64 {
    ((1.0 + nominal_pct / 100.0) / (1.0 + comparison_pct / 100.0) - 1.0) * 100.0
}

/// Cumulative inflation factor after `year` whole years.
pub fn inflation_factor(annual_inflation_pct: f64, year: u32) -> f64 {
    (1.0 + fraction(annual_inflation_pct)).powf(year as f64)
}
