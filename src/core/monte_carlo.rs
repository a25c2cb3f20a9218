use serde::Serialize;
use tracing::{debug, info, warn};

use super::household::{HouseholdPlan, ReturnPath};
use super::rng::{Rng, derive_seed, fresh_seed};
use super::stats::{mean, nearest_rank, sort_values, year_percentiles};
use super::types::{
    CrisisScenario, MarriagePlan, MonteCarloOptions, MonteCarloResult, PersonProfile,
    RetirementPlan,
};

pub const MIN_ITERATIONS: u32 = 100;
pub const MAX_ITERATIONS: u32 = 20_000;

/// S&P 500 calendar-year total returns 1975-2024, in percent.
pub const DEFAULT_RETURN_POOL: [f64; 50] = [
    37.2, 23.8, -7.2, 6.6, 18.4, 32.4, -4.9, 21.4, 22.5, 6.3,
    32.2, 18.5, 5.2, 16.8, 31.5, -3.1, 30.5, 7.6, 10.1, 1.3,
    37.6, 23.0, 33.4, 28.6, 21.0, -9.1, -11.9, -22.1, 28.7, 10.9,
    4.9, 15.8, 5.5, -37.0, 26.5, 15.1, 2.1, 16.0, 32.4, 13.7,
    1.4, 12.0, 21.8, -4.4, 31.5, 18.4, 28.7, -18.1, 26.3, 25.0,
];

pub fn clamp_iterations(requested: u32) -> u32 {
    let clamped = requested.clamp(MIN_ITERATIONS, MAX_ITERATIONS);
    if clamped != requested {
        warn!(requested, clamped, "iteration count out of range");
    }
    clamped
}

/// Resamples `years` annual returns per iteration from `pool` and runs the
/// joint projector on each path. Deterministic for a given seed; iteration `i`
/// is identical across runs of any length.
pub fn run_monte_carlo(
    person: &PersonProfile,
    years: u32,
    marriage: &MarriagePlan,
    retirement: &RetirementPlan,
    pool: &[f64],
    options: &MonteCarloOptions,
) -> MonteCarloResult {
    let iterations = clamp_iterations(options.iterations);
    let seed = options.seed.unwrap_or_else(fresh_seed);
    if years == 0 || pool.is_empty() {
        debug!(years, pool = pool.len(), "nothing to resample");
        return MonteCarloResult::empty(iterations, seed);
    }

    let no_crisis = CrisisScenario {
        enabled: false,
        ..CrisisScenario::default()
    };
    let plan = HouseholdPlan::new(
        person,
        years,
        marriage,
        retirement,
        &no_crisis,
        options.use_compound,
    );

    let n = iterations as usize;
    let width = years as usize + 1;
    let mut financial_by_year = vec![Vec::with_capacity(n); width];
    let mut total_by_year = vec![Vec::with_capacity(n); width];
    let mut finals = Vec::with_capacity(n);
    let mut draws = vec![0.0; years as usize];

    for iteration in 0..iterations {
        let mut rng = Rng::new(derive_seed(seed, iteration as u64));
        for draw in draws.iter_mut() {
            *draw = pool[rng.index(pool.len())];
        }

        let projection = plan.simulate(ReturnPath::Sampled(&draws), false);
        for (year, snapshot) in projection.snapshots.iter().enumerate().take(width) {
            financial_by_year[year].push(snapshot.financial_assets);
            total_by_year[year].push(snapshot.net_worth);
        }
        finals.push(projection.final_net_worth());
    }

    let percentiles_by_year = financial_by_year
        .iter_mut()
        .map(|values| year_percentiles(values))
        .collect();
    let percentiles_by_year_with_house = total_by_year
        .iter_mut()
        .map(|values| year_percentiles(values))
        .collect();

    let samples = options.include_samples.then(|| finals.clone());
    let below_zero = finals.iter().filter(|v| **v < 0.0).count();
    sort_values(&mut finals);

    let result = MonteCarloResult {
        iterations,
        seed,
        percentiles_by_year,
        percentiles_by_year_with_house,
        p5: nearest_rank(&finals, 0.05),
        p10: nearest_rank(&finals, 0.10),
        p25: nearest_rank(&finals, 0.25),
        median: nearest_rank(&finals, 0.50),
        p75: nearest_rank(&finals, 0.75),
        p90: nearest_rank(&finals, 0.90),
        p95: nearest_rank(&finals, 0.95),
        mean: mean(&finals),
        min: finals.first().copied().unwrap_or(0.0),
        max: finals.last().copied().unwrap_or(0.0),
        below_zero_probability: below_zero as f64 / finals.len().max(1) as f64,
        samples,
        accumulated: false,
    };
    debug!(
        iterations,
        seed,
        median = result.median,
        below_zero = result.below_zero_probability,
        "monte carlo run finished"
    );
    result
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Fingerprint<'a> {
    years: u32,
    person: &'a PersonProfile,
    marriage: &'a MarriagePlan,
    retirement: &'a RetirementPlan,
}

/// Identity of a resampling configuration for accumulate decisions.
pub fn configuration_fingerprint(
    person: &PersonProfile,
    years: u32,
    marriage: &MarriagePlan,
    retirement: &RetirementPlan,
) -> String {
    serde_json::to_string(&Fingerprint {
        years,
        person,
        marriage,
        retirement,
    })
    .unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PreviousRun {
    fingerprint: String,
    seed: u32,
    iterations: u32,
}

/// Caller-owned memory of the last run. With `accumulate` set and an unchanged
/// configuration, the next run reuses the seed and adds the iteration counts,
/// so it re-runs the whole resampling as one larger batch.
#[derive(Debug, Clone, Default)]
pub struct MonteCarloSession {
    previous: Option<PreviousRun>,
}

impl MonteCarloSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn run(
        &mut self,
        person: &PersonProfile,
        years: u32,
        marriage: &MarriagePlan,
        retirement: &RetirementPlan,
        pool: &[f64],
        options: &MonteCarloOptions,
    ) -> MonteCarloResult {
        let fingerprint = configuration_fingerprint(person, years, marriage, retirement);
        let continued = match &self.previous {
            Some(previous) if options.accumulate && previous.fingerprint == fingerprint => {
                Some((previous.seed, previous.iterations))
            }
            _ => None,
        };

        let mut effective = *options;
        match continued {
            Some((seed, previous_iterations)) => {
                effective.seed = Some(seed);
                effective.iterations = previous_iterations
                    .saturating_add(clamp_iterations(options.iterations))
                    .min(MAX_ITERATIONS);
                info!(
                    seed,
                    previous_iterations,
                    iterations = effective.iterations,
                    "accumulating monte carlo run"
                );
            }
            None => {
                effective.seed = Some(options.seed.unwrap_or_else(fresh_seed));
                if options.accumulate {
                    debug!("configuration changed or no previous run; starting fresh");
                }
            }
        }

        let mut result = run_monte_carlo(person, years, marriage, retirement, pool, &effective);
        result.accumulated = continued.is_some();
        self.previous = Some(PreviousRun {
            fingerprint,
            seed: result.seed,
            iterations: result.iterations,
        });
        result
    }

    pub fn reset(&mut self) {
        self.previous = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::SpouseProfile;
    use proptest::prelude::{prop_assert, proptest};

    fn person() -> PersonProfile {
        PersonProfile {
            initial_wealth: 50_000.0,
            monthly_contribution: 1_000.0,
            retirement_year: 100,
            ..PersonProfile::default()
        }
    }

    fn options(iterations: u32, seed: u32) -> MonteCarloOptions {
        MonteCarloOptions {
            iterations,
            seed: Some(seed),
            ..MonteCarloOptions::default()
        }
    }

    fn run(years: u32, opts: &MonteCarloOptions) -> MonteCarloResult {
        run_monte_carlo(
            &person(),
            years,
            &MarriagePlan::default(),
            &RetirementPlan::default(),
            &DEFAULT_RETURN_POOL,
            opts,
        )
    }

    #[test]
    fn same_seed_is_reproducible() {
        let a = run(20, &options(300, 42));
        let b = run(20, &options(300, 42));
        assert_eq!(a, b);
        assert_eq!(
            serde_json::to_string(&a.percentiles_by_year).expect("serialize"),
            serde_json::to_string(&b.percentiles_by_year).expect("serialize"),
        );
        let c = run(20, &options(300, 43));
        assert_ne!(a.median, c.median);
    }

    #[test]
    fn summary_percentiles_are_ordered() {
        let r = run(25, &options(500, 7));
        assert!(r.min <= r.p5);
        assert!(r.p5 <= r.p10);
        assert!(r.p10 <= r.p25);
        assert!(r.p25 <= r.median);
        assert!(r.median <= r.p75);
        assert!(r.p75 <= r.p90);
        assert!(r.p90 <= r.p95);
        assert!(r.p95 <= r.max);
        assert_eq!(r.percentiles_by_year.len(), 26);
        assert_eq!(r.percentiles_by_year_with_house.len(), 26);
        assert_eq!(r.percentiles_by_year[0].p50, 50_000.0);
    }

    #[test]
    fn constant_pool_collapses_to_one_outcome() {
        let r = run_monte_carlo(
            &person(),
            5,
            &MarriagePlan::default(),
            &RetirementPlan::default(),
            &[12.0],
            &options(100, 1),
        );
        assert_eq!(r.p5, r.p95);
        assert_eq!(r.min, r.max);
        assert!((r.mean - r.median).abs() < 1e-6);
        assert_eq!(r.below_zero_probability, 0.0);
    }

    #[test]
    fn larger_run_replays_smaller_run_as_prefix() {
        let mut small_opts = options(150, 99);
        small_opts.include_samples = true;
        let mut large_opts = options(300, 99);
        large_opts.include_samples = true;
        let small = run(15, &small_opts).samples.expect("samples");
        let large = run(15, &large_opts).samples.expect("samples");
        assert_eq!(small.len(), 150);
        assert_eq!(large.len(), 300);
        assert_eq!(small[..], large[..150]);
    }

    #[test]
    fn iterations_are_clamped() {
        assert_eq!(clamp_iterations(0), MIN_ITERATIONS);
        assert_eq!(clamp_iterations(1_000_000), MAX_ITERATIONS);
        assert_eq!(clamp_iterations(2_500), 2_500);
        assert_eq!(run(3, &options(1, 5)).iterations, MIN_ITERATIONS);
    }

    #[test]
    fn degenerate_inputs_give_empty_result() {
        let empty_pool = run_monte_carlo(
            &person(),
            10,
            &MarriagePlan::default(),
            &RetirementPlan::default(),
            &[],
            &options(200, 3),
        );
        assert!(empty_pool.percentiles_by_year.is_empty());
        assert_eq!(empty_pool.median, 0.0);
        assert_eq!(empty_pool.seed, 3);

        let no_years = run(0, &options(200, 3));
        assert!(no_years.percentiles_by_year.is_empty());
    }

    #[test]
    fn house_included_band_reflects_property_value() {
        let marriage = MarriagePlan {
            enabled: true,
            year_of_marriage: 0,
            spouse: SpouseProfile {
                name: "Alex".to_string(),
                profile: person(),
            },
            buy_house: true,
            year_of_house_purchase: 1,
            ..MarriagePlan::default()
        };
        let r = run_monte_carlo(
            &person(),
            10,
            &marriage,
            &RetirementPlan::default(),
            &DEFAULT_RETURN_POOL,
            &options(200, 11),
        );
        let last = r.percentiles_by_year.len() - 1;
        assert!(r.percentiles_by_year_with_house[last].p50 > r.percentiles_by_year[last].p50);
    }

    #[test]
    fn session_accumulates_with_same_seed() {
        let mut session = MonteCarloSession::new();
        let you = person();
        let marriage = MarriagePlan::default();
        let retirement = RetirementPlan::default();
        let first = session.run(&you, 10, &marriage, &retirement, &DEFAULT_RETURN_POOL, &options(200, 5));
        assert!(!first.accumulated);

        let mut more = MonteCarloOptions {
            iterations: 300,
            seed: None,
            accumulate: true,
            ..MonteCarloOptions::default()
        };
        let second = session.run(&you, 10, &marriage, &retirement, &DEFAULT_RETURN_POOL, &more);
        assert!(second.accumulated);
        assert_eq!(second.seed, 5);
        assert_eq!(second.iterations, 500);

        // Identical to one 500-iteration batch under the same seed.
        let batch = run(10, &options(500, 5));
        assert_eq!(second.percentiles_by_year, batch.percentiles_by_year);
        assert_eq!(second.median, batch.median);

        let changed = PersonProfile {
            monthly_contribution: 2_000.0,
            ..you.clone()
        };
        more.seed = Some(8);
        let third = session.run(&changed, 10, &marriage, &retirement, &DEFAULT_RETURN_POOL, &more);
        assert!(!third.accumulated);
        assert_eq!(third.seed, 8);
        assert_eq!(third.iterations, 300);
    }

    #[test]
    fn session_caps_accumulated_iterations() {
        let mut session = MonteCarloSession::new();
        let you = person();
        let marriage = MarriagePlan::default();
        let retirement = RetirementPlan::default();
        let mut opts = options(MAX_ITERATIONS, 1);
        session.run(&you, 1, &marriage, &retirement, &[5.0], &opts);
        opts.accumulate = true;
        let next = session.run(&you, 1, &marriage, &retirement, &[5.0], &opts);
        assert!(next.accumulated);
        assert_eq!(next.iterations, MAX_ITERATIONS);

        session.reset();
        let fresh = session.run(&you, 1, &marriage, &retirement, &[5.0], &opts);
        assert!(!fresh.accumulated);
    }

    #[test]
    fn fingerprint_tracks_configuration() {
        let you = person();
        let marriage = MarriagePlan::default();
        let retirement = RetirementPlan::default();
        let a = configuration_fingerprint(&you, 10, &marriage, &retirement);
        assert_eq!(a, configuration_fingerprint(&you, 10, &marriage, &retirement));
        assert_ne!(a, configuration_fingerprint(&you, 11, &marriage, &retirement));
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(8))]

        #[test]
        fn prop_year_bands_are_ordered(seed in 0u32..u32::MAX, years in 1u32..15) {
            let r = run(years, &options(100, seed));
            for band in r.percentiles_by_year.iter().chain(r.percentiles_by_year_with_house.iter()) {
                prop_assert!(band.p10 <= band.p25);
                prop_assert!(band.p25 <= band.p50);
                prop_assert!(band.p50 <= band.p75);
                prop_assert!(band.p75 <= band.p90);
            }
        }
    }
}
