//! Two-phase investment projection engine: deterministic accumulation and
//! distribution, Monte Carlo scenario bands, and an inverse goal solver.

pub mod api;
pub mod core;
