use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::error::PlanError;
use super::portfolio::validate_allocation;

/// Permanent override of the monthly contribution from `year` onwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributionAdjustment {
    pub year: f64,
    pub monthly_amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PersonProfile {
    pub initial_wealth: f64,
    pub monthly_contribution: f64,
    /// Percent growth applied to the monthly contribution after every month.
    pub monthly_growth_rate: f64,
    /// Percent per year.
    pub annual_return_rate: f64,
    /// Annual gross salary.
    pub salary: f64,
    pub monthly_expense: f64,
    pub retirement_year: u32,
    pub contribution_adjustments: Vec<ContributionAdjustment>,
}

impl Default for PersonProfile {
    fn default() -> Self {
        Self {
            initial_wealth: 10_000.0,
            monthly_contribution: 1_000.0,
            monthly_growth_rate: 0.0,
            annual_return_rate: 7.0,
            salary: 60_000.0,
            monthly_expense: 2_000.0,
            retirement_year: 30,
            contribution_adjustments: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SpouseProfile {
    pub name: String,
    #[serde(flatten)]
    pub profile: PersonProfile,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RepaymentType {
    #[default]
    #[serde(alias = "equal-payment", alias = "equal_payment")]
    EqualPayment,
    #[serde(alias = "equal-principal", alias = "equal_principal")]
    EqualPrincipal,
    #[serde(alias = "graduated")]
    Increasing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MarriagePlan {
    pub enabled: bool,
    pub year_of_marriage: u32,
    pub spouse: SpouseProfile,
    pub buy_house: bool,
    pub year_of_house_purchase: u32,
    pub house_price: f64,
    pub down_payment: f64,
    pub loan_amount: f64,
    /// Percent per year.
    pub loan_rate: f64,
    pub loan_years: u32,
    pub repayment_type: RepaymentType,
    /// Percent per year.
    pub house_appreciation_rate: f64,
    pub prepay_enabled: bool,
    /// Years after loan origination; fractional values are honoured at month granularity.
    pub prepay_year: f64,
}

impl Default for MarriagePlan {
    fn default() -> Self {
        Self {
            enabled: false,
            year_of_marriage: 3,
            spouse: SpouseProfile::default(),
            buy_house: false,
            year_of_house_purchase: 5,
            house_price: 500_000.0,
            down_payment: 150_000.0,
            loan_amount: 350_000.0,
            loan_rate: 3.6,
            loan_years: 30,
            repayment_type: RepaymentType::EqualPayment,
            house_appreciation_rate: 2.0,
            prepay_enabled: false,
            prepay_year: 10.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetirementPlan {
    pub enabled: bool,
    /// Today's money; escalated by `inflation_rate` every simulated year.
    pub monthly_expense: f64,
    pub inflation_rate: f64,
    #[serde(rename = "useJEPQ", alias = "useJepq")]
    pub use_jepq: bool,
    /// Percent of retirement assets held in the high-yield slice.
    pub jepq_ratio: f64,
    pub jepq_dividend_rate: f64,
    pub voo_growth_rate: f64,
}

impl Default for RetirementPlan {
    fn default() -> Self {
        Self {
            enabled: false,
            monthly_expense: 3_000.0,
            inflation_rate: 2.5,
            use_jepq: false,
            jepq_ratio: 50.0,
            jepq_dividend_rate: 9.0,
            voo_growth_rate: 7.0,
        }
    }
}

impl RetirementPlan {
    pub fn monthly_expense_in_year(&self, year: u32) -> f64 {
        self.monthly_expense * (1.0 + self.inflation_rate / 100.0).powf(year as f64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CrisisScenario {
    pub enabled: bool,
    pub start_year: u32,
    pub duration: u32,
    /// Percent per year, typically negative.
    pub drawdown_rate: f64,
}

impl Default for CrisisScenario {
    fn default() -> Self {
        Self {
            enabled: false,
            start_year: 5,
            duration: 2,
            drawdown_rate: -30.0,
        }
    }
}

impl CrisisScenario {
    /// Additive monthly rate for `year`; zero outside the crisis window.
    pub fn monthly_overlay(&self, year: u32) -> f64 {
        let active = self.enabled
            && year >= self.start_year
            && year < self.start_year.saturating_add(self.duration);
        if active {
            self.drawdown_rate / 100.0 / 12.0
        } else {
            0.0
        }
    }
}

/// Everything one deterministic household projection needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlanScenario {
    pub person: PersonProfile,
    pub years: u32,
    pub marriage: MarriagePlan,
    pub retirement: RetirementPlan,
    pub crisis: CrisisScenario,
    pub use_compound: bool,
    /// When set, the person's return is the blend's expected return.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub portfolio: Option<PortfolioAllocation>,
}

impl Default for PlanScenario {
    fn default() -> Self {
        Self {
            person: PersonProfile::default(),
            years: 30,
            marriage: MarriagePlan::default(),
            retirement: RetirementPlan::default(),
            crisis: CrisisScenario::default(),
            use_compound: true,
            portfolio: None,
        }
    }
}

/// Longest horizon a plan may project.
pub const MAX_YEARS: u32 = 100;

fn finite(field: &'static str, value: f64) -> Result<(), PlanError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(PlanError::invalid(field, "must be a finite number"))
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<(), PlanError> {
    finite(field, value)?;
    if value < 0.0 {
        return Err(PlanError::invalid(field, "must be >= 0"));
    }
    Ok(())
}

impl PersonProfile {
    pub fn validate(&self) -> Result<(), PlanError> {
        finite("initialWealth", self.initial_wealth)?;
        non_negative("monthlyContribution", self.monthly_contribution)?;
        finite("monthlyGrowthRate", self.monthly_growth_rate)?;
        finite("annualReturnRate", self.annual_return_rate)?;
        if self.annual_return_rate <= -100.0 {
            return Err(PlanError::invalid("annualReturnRate", "must be > -100"));
        }
        finite("salary", self.salary)?;
        non_negative("monthlyExpense", self.monthly_expense)?;
        for adjustment in &self.contribution_adjustments {
            non_negative("contributionAdjustments.year", adjustment.year)?;
            non_negative("contributionAdjustments.monthlyAmount", adjustment.monthly_amount)?;
        }
        Ok(())
    }
}

impl PlanScenario {
    /// Rejects configurations the projectors cannot give a meaningful answer for.
    pub fn validate(&self) -> Result<(), PlanError> {
        if self.years > MAX_YEARS {
            return Err(PlanError::invalid(
                "years",
                format!("must be <= {MAX_YEARS}"),
            ));
        }
        self.person.validate()?;

        let marriage = &self.marriage;
        if marriage.enabled {
            marriage.spouse.profile.validate()?;
            if marriage.buy_house {
                non_negative("housePrice", marriage.house_price)?;
                non_negative("downPayment", marriage.down_payment)?;
                non_negative("loanAmount", marriage.loan_amount)?;
                non_negative("loanRate", marriage.loan_rate)?;
                if marriage.loan_years > MAX_YEARS {
                    return Err(PlanError::invalid(
                        "loanYears",
                        format!("must be <= {MAX_YEARS}"),
                    ));
                }
                finite("houseAppreciationRate", marriage.house_appreciation_rate)?;
                non_negative("prepayYear", marriage.prepay_year)?;
            }
        }

        let retirement = &self.retirement;
        if retirement.enabled {
            non_negative("retirement.monthlyExpense", retirement.monthly_expense)?;
            finite("retirement.inflationRate", retirement.inflation_rate)?;
            finite("retirement.vooGrowthRate", retirement.voo_growth_rate)?;
            non_negative("retirement.jepqDividendRate", retirement.jepq_dividend_rate)?;
            if !(0.0..=100.0).contains(&retirement.jepq_ratio) {
                return Err(PlanError::invalid("retirement.jepqRatio", "must be between 0 and 100"));
            }
        }

        if self.crisis.enabled {
            finite("crisis.drawdownRate", self.crisis.drawdown_rate)?;
        }
        if let Some(allocation) = &self.portfolio {
            validate_allocation(allocation)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanScheduleRow {
    /// 1-based month of the loan term.
    pub month: u32,
    pub payment: f64,
    pub principal: f64,
    pub interest: f64,
    pub remaining_principal: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanPaymentStatus {
    pub payment: f64,
    pub remaining_principal: f64,
    pub is_complete: bool,
}

impl LoanPaymentStatus {
    pub(crate) fn complete() -> Self {
        Self {
            payment: 0.0,
            remaining_principal: 0.0,
            is_complete: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanSummary {
    pub first_payment: f64,
    pub last_payment: f64,
    pub total_paid: f64,
    pub total_interest: f64,
}

/// End-of-year household state. Index 0 of a trajectory is the starting state.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WealthSnapshot {
    pub year: u32,
    pub you: f64,
    pub spouse: f64,
    pub financial_assets: f64,
    pub house_value: f64,
    pub loan_balance: f64,
    pub net_worth: f64,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HouseholdEventKind {
    SpouseMerge,
    DownPayment,
    FinancialIndependence,
    LoanPrepayment,
    LoanCompletion,
}

/// A one-time household event with both tracks observed around it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HouseholdEvent {
    pub kind: HouseholdEventKind,
    /// 0-based simulated month.
    pub month: u32,
    pub amount: f64,
    pub you_before: f64,
    pub spouse_before: f64,
    pub you_after: f64,
    pub spouse_after: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HouseholdProjection {
    pub snapshots: Vec<WealthSnapshot>,
    pub events: Vec<HouseholdEvent>,
}

impl HouseholdProjection {
    pub fn final_net_worth(&self) -> f64 {
        self.snapshots.last().map(|s| s.net_worth).unwrap_or(0.0)
    }

    pub fn final_financial_assets(&self) -> f64 {
        self.snapshots
            .last()
            .map(|s| s.financial_assets)
            .unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetAssumption {
    /// Percent per year.
    pub expected_return: f64,
    /// Percent per year.
    pub std_dev: f64,
}

/// Asset key to percent weight. Keys outside the base assets are custom tickers
/// and need an entry in `assets`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PortfolioAllocation {
    pub weights: BTreeMap<String, f64>,
    pub assets: BTreeMap<String, AssetAssumption>,
}

impl Default for PortfolioAllocation {
    fn default() -> Self {
        let weights = [("stocks", 60.0), ("bonds", 30.0), ("gold", 5.0), ("cash", 5.0)]
            .into_iter()
            .map(|(key, weight)| (key.to_string(), weight))
            .collect();
        Self {
            weights,
            assets: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioStats {
    pub expected_return: f64,
    pub std_dev: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YearPercentiles {
    pub p10: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
    pub mean: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MonteCarloOptions {
    pub iterations: u32,
    /// A fresh seed is drawn when absent.
    pub seed: Option<u32>,
    pub use_compound: bool,
    pub include_samples: bool,
    /// Only honoured by `MonteCarloSession`.
    pub accumulate: bool,
}

impl Default for MonteCarloOptions {
    fn default() -> Self {
        Self {
            iterations: 1_000,
            seed: None,
            use_compound: true,
            include_samples: false,
            accumulate: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonteCarloResult {
    pub iterations: u32,
    pub seed: u32,
    /// Financial assets only (house excluded), `years + 1` entries.
    pub percentiles_by_year: Vec<YearPercentiles>,
    /// Net worth including house value and net of the loan, `years + 1` entries.
    pub percentiles_by_year_with_house: Vec<YearPercentiles>,
    pub p5: f64,
    pub p10: f64,
    pub p25: f64,
    pub median: f64,
    pub p75: f64,
    pub p90: f64,
    pub p95: f64,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub below_zero_probability: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub samples: Option<Vec<f64>>,
    pub accumulated: bool,
}

impl MonteCarloResult {
    pub(crate) fn empty(iterations: u32, seed: u32) -> Self {
        Self {
            iterations,
            seed,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioMonteCarloResult {
    pub percentiles: Vec<YearPercentiles>,
    pub num_simulations: u32,
    pub expected_return: f64,
    pub std_dev: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_payload_layers_over_defaults() {
        let scenario: PlanScenario = serde_json::from_str(
            r#"{
                "years": 12,
                "person": { "initialWealth": 5000, "monthlyContribution": 250 },
                "retirement": { "enabled": true, "useJEPQ": true },
                "marriage": { "enabled": true, "spouse": { "name": "Kim", "initialWealth": 800 } }
            }"#,
        )
        .expect("valid scenario");
        assert_eq!(scenario.years, 12);
        assert_eq!(scenario.person.initial_wealth, 5_000.0);
        assert_eq!(scenario.person.annual_return_rate, 7.0);
        assert!(scenario.retirement.use_jepq);
        assert_eq!(scenario.retirement.jepq_ratio, 50.0);
        assert_eq!(scenario.marriage.spouse.name, "Kim");
        assert_eq!(scenario.marriage.spouse.profile.initial_wealth, 800.0);
        assert_eq!(scenario.marriage.spouse.profile.monthly_contribution, 1_000.0);
        assert!(scenario.use_compound);
        assert!(scenario.validate().is_ok());
    }

    #[test]
    fn repayment_type_accepts_aliases() {
        let parsed: RepaymentType = serde_json::from_str("\"equalPrincipal\"").expect("camel");
        assert_eq!(parsed, RepaymentType::EqualPrincipal);
        let parsed: RepaymentType = serde_json::from_str("\"graduated\"").expect("alias");
        assert_eq!(parsed, RepaymentType::Increasing);
    }

    #[test]
    fn validation_names_the_offending_field() {
        let mut scenario = PlanScenario::default();
        scenario.person.annual_return_rate = f64::NAN;
        match scenario.validate() {
            Err(PlanError::InvalidInput { field, .. }) => assert_eq!(field, "annualReturnRate"),
            other => panic!("unexpected: {other:?}"),
        }

        let mut scenario = PlanScenario::default();
        scenario.years = MAX_YEARS + 1;
        assert!(scenario.validate().is_err());

        let mut scenario = PlanScenario::default();
        scenario.retirement.enabled = true;
        scenario.retirement.jepq_ratio = 120.0;
        assert!(scenario.validate().is_err());

        // Disabled sections are not inspected.
        let mut scenario = PlanScenario::default();
        scenario.marriage.house_price = -1.0;
        assert!(scenario.validate().is_ok());
    }

    #[test]
    fn scenario_portfolio_and_loan_term_are_validated() {
        let scenario: PlanScenario = serde_json::from_str(
            r#"{ "portfolio": { "weights": { "stocks": 70, "bonds": 20 } } }"#,
        )
        .expect("valid json");
        assert!(matches!(
            scenario.validate(),
            Err(PlanError::AllocationSum { .. })
        ));

        let scenario: PlanScenario =
            serde_json::from_str(r#"{ "portfolio": { "weights": { "cash": 100 } } }"#)
                .expect("valid json");
        assert!(scenario.validate().is_ok());
        assert!(PlanScenario::default().portfolio.is_none());

        let mut scenario = PlanScenario::default();
        scenario.marriage.enabled = true;
        scenario.marriage.buy_house = true;
        scenario.marriage.loan_years = MAX_YEARS + 1;
        match scenario.validate() {
            Err(PlanError::InvalidInput { field, .. }) => assert_eq!(field, "loanYears"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn expense_inflates_yearly_and_crisis_window_is_half_open() {
        let plan = RetirementPlan {
            monthly_expense: 1_000.0,
            inflation_rate: 10.0,
            ..RetirementPlan::default()
        };
        assert_eq!(plan.monthly_expense_in_year(0), 1_000.0);
        assert!((plan.monthly_expense_in_year(2) - 1_210.0).abs() < 1e-9);

        let crisis = CrisisScenario {
            enabled: true,
            start_year: 2,
            duration: 2,
            drawdown_rate: -12.0,
        };
        assert_eq!(crisis.monthly_overlay(1), 0.0);
        assert!((crisis.monthly_overlay(2) + 0.01).abs() < 1e-12);
        assert!((crisis.monthly_overlay(3) + 0.01).abs() < 1e-12);
        assert_eq!(crisis.monthly_overlay(4), 0.0);
    }
}
