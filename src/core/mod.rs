mod error;
mod household;
mod loan;
mod monte_carlo;
mod portfolio;
mod portfolio_mc;
mod projection;
mod rng;
mod solver;
mod stats;
mod types;

pub use error::PlanError;
pub use household::{
    Split, Trigger, final_household_wealth, project_household, project_scenario,
    split_proportionally,
};
pub use loan::{
    GrowthSearch, INCREASING_SEARCH, full_schedule, increasing_schedule, monthly_payment_equal,
    payment_at_month, solve_increasing_growth_rate, summarize_schedule,
};
pub use monte_carlo::{
    DEFAULT_RETURN_POOL, MAX_ITERATIONS, MIN_ITERATIONS, MonteCarloSession, clamp_iterations,
    configuration_fingerprint, run_monte_carlo,
};
pub use portfolio::{
    BaseAsset, CUSTOM_TICKER_CORRELATION, apply_blended_return, expected_return, portfolio_stats,
    std_dev, validate_allocation, with_blended_return,
};
pub use portfolio_mc::run_portfolio_monte_carlo;
pub use projection::{project_wealth, project_wealth_by_year, savings_rate};
pub use rng::fresh_seed;
pub use solver::{GoalSolveConfig, GoalSolveIteration, GoalSolveResult, GoalType, solve_goal};
pub use stats::{mean, nearest_rank};
pub use types::{
    AssetAssumption, ContributionAdjustment, CrisisScenario, HouseholdEvent, HouseholdEventKind,
    HouseholdProjection, LoanPaymentStatus, LoanScheduleRow, LoanSummary, MAX_YEARS, MarriagePlan,
    MonteCarloOptions, MonteCarloResult, PersonProfile, PlanScenario, PortfolioAllocation,
    PortfolioMonteCarloResult, PortfolioStats, RepaymentType, RetirementPlan, SpouseProfile,
    WealthSnapshot, YearPercentiles,
};
