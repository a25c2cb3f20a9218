use tracing::{debug, warn};

use super::monte_carlo::clamp_iterations;
use super::portfolio::portfolio_stats;
use super::rng::{Rng, derive_seed};
use super::stats::year_percentiles;
use super::types::{MAX_YEARS, PortfolioAllocation, PortfolioMonteCarloResult};

/// Lower bound on a drawn annual return, in percent.
const MIN_ANNUAL_RETURN: f64 = -99.0;

/// Parametric resampler for a bare portfolio: one normal annual return per
/// simulated year, compounded monthly with a growing contribution. Independent
/// of the household resampler.
pub fn run_portfolio_monte_carlo(
    initial: f64,
    monthly: f64,
    allocation: &PortfolioAllocation,
    years: u32,
    monthly_growth_rate: f64,
    num_simulations: u32,
    seed: u32,
) -> PortfolioMonteCarloResult {
    let stats = portfolio_stats(allocation);
    let simulations = clamp_iterations(num_simulations);
    let years = if years > MAX_YEARS {
        warn!(requested = years, clamped = MAX_YEARS, "horizon out of range");
        MAX_YEARS
    } else {
        years
    };
    let width = years as usize + 1;
    let mut by_year = vec![Vec::with_capacity(simulations as usize); width];

    for simulation in 0..simulations {
        let mut rng = Rng::new(derive_seed(seed, simulation as u64));
        let mut wealth = initial;
        let mut contribution = monthly;
        by_year[0].push(wealth);

        for year in 1..width {
            let annual = rng
                .normal(stats.expected_return, stats.std_dev)
                .max(MIN_ANNUAL_RETURN);
            let monthly_rate = (1.0 + annual / 100.0).powf(1.0 / 12.0) - 1.0;
            for _ in 0..12 {
                wealth = wealth * (1.0 + monthly_rate) + contribution;
                contribution *= 1.0 + monthly_growth_rate / 100.0;
            }
            by_year[year].push(wealth);
        }
    }

    let percentiles = by_year
        .iter_mut()
        .map(|values| year_percentiles(values))
        .collect();
    debug!(
        simulations,
        years,
        expected_return = stats.expected_return,
        std_dev = stats.std_dev,
        "portfolio monte carlo finished"
    );

    PortfolioMonteCarloResult {
        percentiles,
        num_simulations: simulations,
        expected_return: stats.expected_return,
        std_dev: stats.std_dev,
    }
}
