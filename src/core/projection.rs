use super::types::{ContributionAdjustment, CrisisScenario, PersonProfile, RetirementPlan};

/// Annual price growth of the high-yield retirement slice, in percent.
pub(crate) const JEPQ_PRICE_GROWTH: f64 = 2.0;
/// Share of dividend income kept after withholding.
pub(crate) const DIVIDEND_RETENTION: f64 = 0.846;

/// Monthly contribution of one person, with year-boundary overrides and
/// month-over-month growth.
#[derive(Debug, Clone)]
pub(crate) struct ContributionTrack {
    current: f64,
    growth: f64,
    adjustments: Vec<ContributionAdjustment>,
    applied: Option<usize>,
}

impl ContributionTrack {
    pub(crate) fn new(person: &PersonProfile) -> Self {
        let mut adjustments = person.contribution_adjustments.clone();
        adjustments.sort_by(|a, b| a.year.total_cmp(&b.year));
        Self {
            current: person.monthly_contribution,
            growth: person.monthly_growth_rate / 100.0,
            adjustments,
            applied: None,
        }
    }

    /// Applies the latest adjustment due by `year` if it has not been applied yet.
    pub(crate) fn begin_year(&mut self, year: u32) {
        let latest = self
            .adjustments
            .iter()
            .rposition(|adj| adj.year <= year as f64);
        if let Some(idx) = latest {
            if self.applied != Some(idx) {
                self.current = self.adjustments[idx].monthly_amount;
                self.applied = Some(idx);
            }
        }
    }

    pub(crate) fn amount(&self) -> f64 {
        self.current
    }

    pub(crate) fn advance_month(&mut self) {
        self.current *= 1.0 + self.growth;
    }
}

/// One month of post-retirement return on `base`, before expenses.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct RetirementFlow {
    pub(crate) growth: f64,
    /// After withholding.
    pub(crate) dividend: f64,
}

pub(crate) fn retirement_flow(base: f64, plan: &RetirementPlan, overlay: f64) -> RetirementFlow {
    let growth_rate = plan.voo_growth_rate / 100.0 / 12.0 + overlay;
    if !plan.use_jepq {
        return RetirementFlow {
            growth: base * growth_rate,
            dividend: 0.0,
        };
    }

    let ratio = (plan.jepq_ratio / 100.0).clamp(0.0, 1.0);
    let income_slice = base * ratio;
    let growth_slice = base - income_slice;
    let income_rate = JEPQ_PRICE_GROWTH / 100.0 / 12.0 + overlay;
    let dividend =
        income_slice.max(0.0) * plan.jepq_dividend_rate / 100.0 / 12.0 * DIVIDEND_RETENTION;

    RetirementFlow {
        growth: income_slice * income_rate + growth_slice * growth_rate,
        dividend,
    }
}

/// Final wealth after `years` of monthly compounding.
pub fn project_wealth(
    person: &PersonProfile,
    years: u32,
    crisis: &CrisisScenario,
    retirement: Option<&RetirementPlan>,
    use_compound: bool,
) -> f64 {
    project_wealth_by_year(person, years, crisis, retirement, use_compound)
        .last()
        .copied()
        .unwrap_or(person.initial_wealth)
}

/// Wealth at the end of each year; index 0 is the starting wealth.
pub fn project_wealth_by_year(
    person: &PersonProfile,
    years: u32,
    crisis: &CrisisScenario,
    retirement: Option<&RetirementPlan>,
    use_compound: bool,
) -> Vec<f64> {
    let mut trajectory = Vec::with_capacity(years as usize + 1);
    let mut wealth = person.initial_wealth;
    let mut principal = person.initial_wealth;
    let base_rate = person.annual_return_rate / 100.0 / 12.0;
    let mut contributions = ContributionTrack::new(person);
    trajectory.push(wealth);

    for year in 0..years {
        contributions.begin_year(year);
        let overlay = crisis.monthly_overlay(year);
        let retirement_plan =
            retirement.filter(|plan| plan.enabled && year >= person.retirement_year);

        for _ in 0..12 {
            match retirement_plan {
                Some(plan) => {
                    let expense = plan.monthly_expense_in_year(year);
                    let base = if use_compound { wealth } else { principal };
                    let flow = retirement_flow(base, plan, overlay);
                    wealth += flow.growth + flow.dividend - expense;
                    principal += flow.dividend - expense;
                }
                None => {
                    let rate = base_rate + overlay;
                    if use_compound {
                        wealth *= 1.0 + rate;
                    } else {
                        wealth += principal * rate;
                    }
                    let contribution = contributions.amount();
                    wealth += contribution;
                    principal += contribution;
                    contributions.advance_month();
                }
            }
        }

        trajectory.push(wealth);
    }

    trajectory
}

/// Annual contributions as a percentage of salary; zero without a salary.
pub fn savings_rate(person: &PersonProfile) -> f64 {
    if !person.salary.is_finite() || person.salary <= 0.0 {
        return 0.0;
    }
    let rate = person.monthly_contribution * 12.0 / person.salary * 100.0;
    if rate.is_finite() { rate } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::{prop_assert, proptest};

    fn assert_close(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "expected {expected}, got {actual}, tolerance {tol}"
        );
    }

    fn saver(initial: f64, monthly: f64, annual_rate: f64) -> PersonProfile {
        PersonProfile {
            initial_wealth: initial,
            monthly_contribution: monthly,
            monthly_growth_rate: 0.0,
            annual_return_rate: annual_rate,
            salary: 60_000.0,
            monthly_expense: 0.0,
            retirement_year: 100,
            contribution_adjustments: Vec::new(),
        }
    }

    fn no_crisis() -> CrisisScenario {
        CrisisScenario::default()
    }

    #[test]
    fn one_year_annuity_matches_future_value() {
        let person = saver(0.0, 100.0, 12.0);
        let wealth = project_wealth(&person, 1, &no_crisis(), None, true);
        let expected: f64 = (1..=12).map(|m| 100.0 * 1.01_f64.powi(12 - m)).sum();
        assert_close(wealth, expected, 1e-9);
        assert_close(wealth, 1268.25, 0.01);
    }

    #[test]
    fn crisis_overlay_applies_monthly_drawdown() {
        let person = saver(1_000.0, 0.0, 0.0);
        let crisis = CrisisScenario {
            enabled: true,
            start_year: 0,
            duration: 1,
            drawdown_rate: -36.0,
        };
        let path = project_wealth_by_year(&person, 2, &crisis, None, true);
        assert_close(path[1], 1_000.0 * 0.97_f64.powi(12), 1e-9);
        // Outside the window the base rate (0%) applies again.
        assert_close(path[2], path[1], 1e-9);
    }

    #[test]
    fn simple_mode_accrues_only_on_principal() {
        let person = saver(1_000.0, 0.0, 12.0);
        let simple = project_wealth(&person, 2, &no_crisis(), None, false);
        assert_close(simple, 1_000.0 + 24.0 * 10.0, 1e-9);
        let compound = project_wealth(&person, 2, &no_crisis(), None, true);
        assert!(compound > simple);
    }

    #[test]
    fn contribution_adjustments_apply_in_year_order() {
        let mut person = saver(0.0, 100.0, 0.0);
        person.contribution_adjustments = vec![
            ContributionAdjustment {
                year: 2.0,
                monthly_amount: 300.0,
            },
            ContributionAdjustment {
                year: 1.0,
                monthly_amount: 200.0,
            },
        ];
        let path = project_wealth_by_year(&person, 3, &no_crisis(), None, true);
        assert_close(path[1], 1_200.0, 1e-9);
        assert_close(path[2], 1_200.0 + 2_400.0, 1e-9);
        assert_close(path[3], 1_200.0 + 2_400.0 + 3_600.0, 1e-9);
    }

    #[test]
    fn fractional_adjustment_year_waits_for_next_boundary() {
        let mut person = saver(0.0, 100.0, 0.0);
        person.contribution_adjustments = vec![ContributionAdjustment {
            year: 1.5,
            monthly_amount: 0.0,
        }];
        let path = project_wealth_by_year(&person, 3, &no_crisis(), None, true);
        assert_close(path[2], 2_400.0, 1e-9);
        assert_close(path[3], 2_400.0, 1e-9);
    }

    #[test]
    fn monthly_growth_compounds_contribution() {
        let mut person = saver(0.0, 100.0, 0.0);
        person.monthly_growth_rate = 1.0;
        let wealth = project_wealth(&person, 1, &no_crisis(), None, true);
        let expected: f64 = (0..12).map(|m| 100.0 * 1.01_f64.powi(m)).sum();
        assert_close(wealth, expected, 1e-9);
    }

    #[test]
    fn retirement_drawdown_declines_every_year() {
        let mut person = saver(500_000.0, 1_000.0, 7.0);
        person.retirement_year = 0;
        let plan = RetirementPlan {
            enabled: true,
            monthly_expense: 4_000.0,
            inflation_rate: 2.0,
            use_jepq: false,
            voo_growth_rate: 4.0,
            ..RetirementPlan::default()
        };
        let path = project_wealth_by_year(&person, 20, &no_crisis(), Some(&plan), true);
        assert!(path.windows(2).all(|w| w[1] < w[0]), "{path:?}");
    }

    #[test]
    fn disabled_retirement_keeps_contributing() {
        let mut person = saver(0.0, 100.0, 0.0);
        person.retirement_year = 0;
        let plan = RetirementPlan::default();
        let wealth = project_wealth(&person, 1, &no_crisis(), Some(&plan), true);
        assert_close(wealth, 1_200.0, 1e-9);
    }

    #[test]
    fn jepq_dividends_offset_expenses() {
        let plan = RetirementPlan {
            enabled: true,
            monthly_expense: 0.0,
            inflation_rate: 0.0,
            use_jepq: true,
            jepq_ratio: 100.0,
            jepq_dividend_rate: 12.0,
            voo_growth_rate: 0.0,
        };
        let flow = retirement_flow(1_000.0, &plan, 0.0);
        assert_close(flow.dividend, 1_000.0 * 0.01 * DIVIDEND_RETENTION, 1e-12);
        assert_close(flow.growth, 1_000.0 * 0.02 / 12.0, 1e-12);

        let split = RetirementPlan {
            jepq_ratio: 25.0,
            voo_growth_rate: 12.0,
            ..plan
        };
        let flow = retirement_flow(1_000.0, &split, 0.0);
        assert_close(flow.growth, 250.0 * 0.02 / 12.0 + 750.0 * 0.01, 1e-12);
    }

    #[test]
    fn savings_rate_is_zero_without_salary() {
        let mut person = saver(0.0, 1_000.0, 0.0);
        assert_close(savings_rate(&person), 20.0, 1e-12);
        person.salary = 0.0;
        assert_eq!(savings_rate(&person), 0.0);
        person.salary = f64::NAN;
        assert_eq!(savings_rate(&person), 0.0);
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(48))]

        #[test]
        fn prop_compounding_without_contributions_is_geometric(
            initial in 1.0f64..1_000_000.0,
            rate_bp in 1u32..2_000,
            years in 1u32..40,
        ) {
            let annual = rate_bp as f64 / 100.0;
            let person = saver(initial, 0.0, annual);
            let wealth = project_wealth(&person, years, &no_crisis(), None, true);
            let expected = initial * (1.0 + annual / 100.0 / 12.0).powi(12 * years as i32);
            prop_assert!(((wealth - expected) / expected).abs() <= 1e-9);
        }
    }
}
