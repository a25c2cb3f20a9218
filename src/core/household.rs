use super::loan::Mortgage;
use super::projection::{ContributionTrack, retirement_flow};
use super::types::{
    CrisisScenario, HouseholdEvent, HouseholdEventKind, HouseholdProjection, MarriagePlan,
    PersonProfile, PlanScenario, RetirementPlan, WealthSnapshot,
};

/// State of a one-time event.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum Trigger {
    #[default]
    Pending,
    Fired,
}

impl Trigger {
    /// Moves `Pending` to `Fired`; true only on that transition.
    pub fn fire(&mut self) -> bool {
        match self {
            Trigger::Pending => {
                *self = Trigger::Fired;
                true
            }
            Trigger::Fired => false,
        }
    }

    pub fn has_fired(self) -> bool {
        self == Trigger::Fired
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
struct HouseholdTriggers {
    spouse_merge: Trigger,
    down_payment: Trigger,
    independence: Trigger,
    prepayment: Trigger,
    loan_completion: Trigger,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Split {
    pub a: f64,
    pub b: f64,
}

/// Divides `amount` in proportion to `share_a : share_b`. Negative shares count
/// as zero; with no positive share the amount is halved.
pub fn split_proportionally(amount: f64, share_a: f64, share_b: f64) -> Split {
    let share_a = share_a.max(0.0);
    let share_b = share_b.max(0.0);
    let total = share_a + share_b;
    if total <= 0.0 || !total.is_finite() {
        return Split {
            a: amount * 0.5,
            b: amount * 0.5,
        };
    }
    let a = amount * share_a / total;
    Split { a, b: amount - a }
}

/// Return source for a household run: each person's own rate, or one sampled
/// annual return (percent) per simulated year for both.
#[derive(Debug, Clone, Copy)]
pub(crate) enum ReturnPath<'a> {
    Static,
    Sampled(&'a [f64]),
}

#[derive(Debug, Clone, Copy, Default)]
struct Track {
    wealth: f64,
    principal: f64,
}

impl Track {
    fn grow(&mut self, rate: f64, use_compound: bool) {
        if use_compound {
            self.wealth *= 1.0 + rate;
        } else {
            self.wealth += self.principal * rate;
        }
    }

    fn add(&mut self, amount: f64) {
        self.wealth += amount;
        self.principal += amount;
    }

    fn base(&self, use_compound: bool) -> f64 {
        if use_compound {
            self.wealth
        } else {
            self.principal
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Household {
    you: Track,
    spouse: Track,
    spouse_active: bool,
}

impl Household {
    /// Shares an amount by current wealth; everything is yours before the merge.
    fn split_by_wealth(&self, amount: f64) -> Split {
        if self.spouse_active {
            split_proportionally(amount, self.you.wealth, self.spouse.wealth)
        } else {
            Split { a: amount, b: 0.0 }
        }
    }

    fn deduct_by_wealth(&mut self, amount: f64) {
        let split = self.split_by_wealth(amount);
        self.you.add(-split.a);
        self.spouse.add(-split.b);
    }

    fn combined(&self) -> f64 {
        self.you.wealth + self.spouse.wealth
    }
}

/// A household configuration prepared once and run against any return path.
pub(crate) struct HouseholdPlan<'a> {
    you: &'a PersonProfile,
    years: u32,
    marriage: &'a MarriagePlan,
    retirement: RetirementPlan,
    crisis: CrisisScenario,
    use_compound: bool,
    mortgage: Option<Mortgage>,
}

impl<'a> HouseholdPlan<'a> {
    pub(crate) fn new(
        you: &'a PersonProfile,
        years: u32,
        marriage: &'a MarriagePlan,
        retirement: &RetirementPlan,
        crisis: &CrisisScenario,
        use_compound: bool,
    ) -> Self {
        let mortgage = if marriage.enabled && marriage.buy_house {
            Mortgage::new(
                marriage.loan_amount,
                marriage.loan_rate,
                marriage.loan_years,
                marriage.repayment_type,
            )
        } else {
            None
        };

        Self {
            you,
            years,
            marriage,
            retirement: *retirement,
            crisis: *crisis,
            use_compound,
            mortgage,
        }
    }

    pub(crate) fn simulate(&self, returns: ReturnPath<'_>, record_events: bool) -> HouseholdProjection {
        let marriage = self.marriage;
        let retirement = &self.retirement;
        let spouse_profile = &marriage.spouse.profile;
        let use_compound = self.use_compound;

        let mut triggers = HouseholdTriggers::default();
        let mut events = Vec::new();
        let mut snapshots = Vec::with_capacity(self.years as usize + 1);

        let mut household = Household {
            you: Track {
                wealth: self.you.initial_wealth,
                principal: self.you.initial_wealth,
            },
            spouse: Track::default(),
            spouse_active: false,
        };
        let mut you_contributions = ContributionTrack::new(self.you);
        let mut spouse_contributions = ContributionTrack::new(spouse_profile);
        let mut house_value = 0.0;
        let mut loan_start: Option<u32> = None;
        let mut payments_made = 0_u32;

        snapshots.push(WealthSnapshot {
            year: 0,
            you: household.you.wealth,
            spouse: 0.0,
            financial_assets: household.combined(),
            house_value: 0.0,
            loan_balance: 0.0,
            net_worth: household.combined(),
        });

        for year in 0..self.years {
            you_contributions.begin_year(year);
            spouse_contributions.begin_year(year);
            let overlay = self.crisis.monthly_overlay(year);
            let expense = retirement.monthly_expense_in_year(year);
            let (you_rate, spouse_rate) = match returns {
                ReturnPath::Static => (
                    self.you.annual_return_rate / 100.0 / 12.0,
                    spouse_profile.annual_return_rate / 100.0 / 12.0,
                ),
                ReturnPath::Sampled(draws) => {
                    let annual = draws.get(year as usize).copied().unwrap_or(0.0);
                    let monthly = (1.0 + annual / 100.0).max(0.0).powf(1.0 / 12.0) - 1.0;
                    (monthly, monthly)
                }
            };

            for month in 0..12 {
                let month_index = year * 12 + month;
                let mut record = |kind: HouseholdEventKind,
                                  amount: f64,
                                  before: &Household,
                                  after: &Household| {
                    if record_events {
                        events.push(HouseholdEvent {
                            kind,
                            month: month_index,
                            amount,
                            you_before: before.you.wealth,
                            spouse_before: before.spouse.wealth,
                            you_after: after.you.wealth,
                            spouse_after: after.spouse.wealth,
                        });
                    }
                };

                if marriage.enabled
                    && year >= marriage.year_of_marriage
                    && triggers.spouse_merge.fire()
                {
                    let before = household;
                    household.spouse.add(spouse_profile.initial_wealth);
                    household.spouse_active = true;
                    record(
                        HouseholdEventKind::SpouseMerge,
                        spouse_profile.initial_wealth,
                        &before,
                        &household,
                    );
                }

                if marriage.buy_house
                    && household.spouse_active
                    && year >= marriage.year_of_house_purchase
                    && triggers.down_payment.fire()
                {
                    let before = household;
                    household.deduct_by_wealth(marriage.down_payment);
                    house_value = marriage.house_price;
                    if self.mortgage.is_some() {
                        loan_start = Some(month_index);
                    }
                    record(
                        HouseholdEventKind::DownPayment,
                        marriage.down_payment,
                        &before,
                        &household,
                    );
                }

                if retirement.enabled
                    && retirement.use_jepq
                    && marriage.enabled
                    && household.spouse_active
                    && !triggers.independence.has_fired()
                {
                    let dividend_income = household.combined() * retirement.jepq_ratio / 100.0
                        * retirement.jepq_dividend_rate
                        / 100.0
                        / 12.0;
                    if dividend_income >= expense {
                        triggers.independence.fire();
                        record(
                            HouseholdEventKind::FinancialIndependence,
                            dividend_income,
                            &household,
                            &household,
                        );
                    }
                }

                let you_retired = retirement.enabled && year >= self.you.retirement_year;
                let spouse_retired = retirement.enabled
                    && (year >= spouse_profile.retirement_year
                        || triggers.independence.has_fired());

                let mut mortgage_payment = 0.0;
                if let (Some(mortgage), Some(start)) = (&self.mortgage, loan_start) {
                    let loan_open = !triggers.prepayment.has_fired()
                        && !triggers.loan_completion.has_fired();
                    if loan_open {
                        let elapsed = month_index - start;
                        if elapsed >= mortgage.term_months() {
                            triggers.loan_completion.fire();
                            record(
                                HouseholdEventKind::LoanCompletion,
                                0.0,
                                &household,
                                &household,
                            );
                        } else if marriage.prepay_enabled
                            && elapsed as f64 >= marriage.prepay_year * 12.0
                            && triggers.prepayment.fire()
                        {
                            let before = household;
                            let outstanding = mortgage.outstanding_after(elapsed);
                            household.deduct_by_wealth(outstanding);
                            record(
                                HouseholdEventKind::LoanPrepayment,
                                outstanding,
                                &before,
                                &household,
                            );
                        } else {
                            mortgage_payment = mortgage.installment(elapsed);
                            payments_made = elapsed + 1;
                        }
                    }
                }

                let household_retired = if household.spouse_active {
                    you_retired && spouse_retired
                } else {
                    you_retired
                };

                if household_retired {
                    let base = household.you.base(use_compound)
                        + if household.spouse_active {
                            household.spouse.base(use_compound)
                        } else {
                            0.0
                        };
                    let flow = retirement_flow(base, retirement, overlay);
                    let growth = household.split_by_wealth(flow.growth);
                    let cash = household.split_by_wealth(flow.dividend - expense - mortgage_payment);
                    household.you.wealth += growth.a;
                    household.spouse.wealth += growth.b;
                    household.you.add(cash.a);
                    household.spouse.add(cash.b);
                } else {
                    household.you.grow(you_rate + overlay, use_compound);
                    if household.spouse_active {
                        household.spouse.grow(spouse_rate + overlay, use_compound);
                    }

                    let you_contribution = if you_retired {
                        0.0
                    } else {
                        you_contributions.amount()
                    };
                    let spouse_contributing = household.spouse_active && !spouse_retired;
                    let spouse_contribution = if spouse_contributing {
                        spouse_contributions.amount()
                    } else {
                        0.0
                    };

                    let pool = you_contribution + spouse_contribution - mortgage_payment;
                    let split = if you_contribution + spouse_contribution > 0.0 {
                        split_proportionally(pool, you_contribution, spouse_contribution)
                    } else {
                        household.split_by_wealth(pool)
                    };
                    household.you.add(split.a);
                    household.spouse.add(split.b);

                    if !you_retired {
                        you_contributions.advance_month();
                    }
                    if spouse_contributing {
                        spouse_contributions.advance_month();
                    }
                }

                if triggers.down_payment.has_fired() {
                    house_value *= 1.0 + marriage.house_appreciation_rate / 100.0 / 12.0;
                }
            }

            let loan_balance = match (&self.mortgage, loan_start) {
                (Some(mortgage), Some(_))
                    if !triggers.prepayment.has_fired()
                        && !triggers.loan_completion.has_fired() =>
                {
                    mortgage.outstanding_after(payments_made)
                }
                _ => 0.0,
            };
            let financial_assets = household.combined();
            snapshots.push(WealthSnapshot {
                year: year + 1,
                you: household.you.wealth,
                spouse: household.spouse.wealth,
                financial_assets,
                house_value,
                loan_balance,
                net_worth: financial_assets + house_value - loan_balance,
            });
        }

        HouseholdProjection { snapshots, events }
    }
}

/// Year-by-year joint projection with its event log.
pub fn project_household(
    you: &PersonProfile,
    years: u32,
    marriage: &MarriagePlan,
    retirement: &RetirementPlan,
    crisis: &CrisisScenario,
    use_compound: bool,
) -> HouseholdProjection {
    HouseholdPlan::new(you, years, marriage, retirement, crisis, use_compound)
        .simulate(ReturnPath::Static, true)
}

pub fn project_scenario(scenario: &PlanScenario) -> HouseholdProjection {
    project_household(
        &scenario.person,
        scenario.years,
        &scenario.marriage,
        &scenario.retirement,
        &scenario.crisis,
        scenario.use_compound,
    )
}

/// Net worth at `target_year`: both tracks, plus the house, minus the open loan.
pub fn final_household_wealth(
    you: &PersonProfile,
    target_year: u32,
    marriage: &MarriagePlan,
    retirement: &RetirementPlan,
    crisis: &CrisisScenario,
    use_compound: bool,
) -> f64 {
    HouseholdPlan::new(you, target_year, marriage, retirement, crisis, use_compound)
        .simulate(ReturnPath::Static, false)
        .final_net_worth()
}
