use super::types::{LoanPaymentStatus, LoanScheduleRow, LoanSummary, MAX_YEARS, RepaymentType};

/// Budget for the graduated-payment growth search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrowthSearch {
    pub lower: f64,
    pub upper: f64,
    pub max_iterations: u32,
    pub tolerance: f64,
}

/// Monthly payment growth searched in [0%, 2%] over 40 bisection steps.
pub const INCREASING_SEARCH: GrowthSearch = GrowthSearch {
    lower: 0.0,
    upper: 0.02,
    max_iterations: 40,
    tolerance: 1e-15,
};

fn monthly_rate(annual_rate_pct: f64) -> f64 {
    annual_rate_pct / 100.0 / 12.0
}

/// Terms beyond `MAX_YEARS` are degenerate and have no months.
fn term_months(years: u32) -> u32 {
    if years > MAX_YEARS {
        return 0;
    }
    years * 12
}

pub fn monthly_payment_equal(principal: f64, annual_rate_pct: f64, years: u32) -> f64 {
    let months = term_months(years);
    if principal <= 0.0 || months == 0 {
        return 0.0;
    }

    let r = monthly_rate(annual_rate_pct);
    if r == 0.0 {
        return principal / months as f64;
    }

    principal * r / (1.0 - (1.0 + r).powf(-(months as f64)))
}

/// Installment due in 0-based month `months_elapsed` and the balance left
/// once it is paid.
pub fn payment_at_month(
    principal: f64,
    annual_rate_pct: f64,
    years: u32,
    repayment: RepaymentType,
    months_elapsed: u32,
) -> LoanPaymentStatus {
    let months = term_months(years);
    if principal <= 0.0 || months == 0 || months_elapsed >= months {
        return LoanPaymentStatus::complete();
    }

    let r = monthly_rate(annual_rate_pct);
    match repayment {
        RepaymentType::EqualPayment => {
            let payment = monthly_payment_equal(principal, annual_rate_pct, years);
            let mut balance = principal;
            for _ in 0..=months_elapsed {
                balance -= payment - balance * r;
            }
            LoanPaymentStatus {
                payment,
                remaining_principal: balance.max(0.0),
                is_complete: false,
            }
        }
        RepaymentType::EqualPrincipal => {
            let principal_part = principal / months as f64;
            let balance_before = principal - principal_part * months_elapsed as f64;
            LoanPaymentStatus {
                payment: principal_part + balance_before * r,
                remaining_principal: (balance_before - principal_part).max(0.0),
                is_complete: false,
            }
        }
        RepaymentType::Increasing => {
            let schedule = increasing_schedule(principal, annual_rate_pct, years);
            match schedule.get(months_elapsed as usize) {
                Some(row) => LoanPaymentStatus {
                    payment: row.payment,
                    remaining_principal: row.remaining_principal.max(0.0),
                    is_complete: false,
                },
                None => LoanPaymentStatus::complete(),
            }
        }
    }
}

fn increasing_final_balance(principal: f64, r: f64, months: u32, growth: f64) -> f64 {
    let mut balance = principal;
    let mut payment = principal * r;
    for _ in 0..months {
        balance -= payment - balance * r;
        payment *= 1.0 + growth;
    }
    balance
}

/// Smallest monthly payment growth, within `search`, for which payments that
/// start at the first month's interest fully amortize `principal` over
/// `months`. Returns `search.upper` when no probed rate amortizes.
pub fn solve_increasing_growth_rate(
    principal: f64,
    monthly_rate: f64,
    months: u32,
    search: GrowthSearch,
) -> f64 {
    let mut lo = search.lower;
    let mut hi = search.upper;
    let mut best = None;

    for _ in 0..search.max_iterations {
        let mid = (lo + hi) * 0.5;
        if increasing_final_balance(principal, monthly_rate, months, mid) <= 0.0 {
            best = Some(mid);
            hi = mid;
        } else {
            lo = mid;
        }

        if (hi - lo).abs() <= search.tolerance {
            break;
        }
    }

    best.unwrap_or(search.upper)
}

pub fn increasing_schedule(principal: f64, annual_rate_pct: f64, years: u32) -> Vec<LoanScheduleRow> {
    let months = term_months(years);
    if principal <= 0.0 || months == 0 {
        return Vec::new();
    }

    let r = monthly_rate(annual_rate_pct);
    if r <= 0.0 {
        // An interest-only first payment is zero; nothing to grow from.
        return equal_payment_rows(principal, annual_rate_pct, years);
    }

    let growth = solve_increasing_growth_rate(principal, r, months, INCREASING_SEARCH);
    let mut rows = Vec::with_capacity(months as usize);
    let mut balance = principal;
    let mut payment = principal * r;
    for month in 1..=months {
        let interest = balance * r;
        let principal_paid = payment - interest;
        balance -= principal_paid;
        rows.push(LoanScheduleRow {
            month,
            payment,
            principal: principal_paid,
            interest,
            remaining_principal: balance,
        });
        payment *= 1.0 + growth;
    }

    // The growth cap can leave a short loan under-amortized; settle it as a balloon.
    if let Some(last) = rows.last_mut() {
        if last.remaining_principal > 0.0 {
            last.payment += last.remaining_principal;
            last.principal += last.remaining_principal;
            last.remaining_principal = 0.0;
        }
    }
    rows
}

fn equal_payment_rows(principal: f64, annual_rate_pct: f64, years: u32) -> Vec<LoanScheduleRow> {
    let months = term_months(years);
    let r = monthly_rate(annual_rate_pct);
    let payment = monthly_payment_equal(principal, annual_rate_pct, years);
    let mut balance = principal;
    (1..=months)
        .map(|month| {
            let interest = balance * r;
            let principal_paid = payment - interest;
            balance -= principal_paid;
            LoanScheduleRow {
                month,
                payment,
                principal: principal_paid,
                interest,
                remaining_principal: balance,
            }
        })
        .collect()
}

fn equal_principal_rows(principal: f64, annual_rate_pct: f64, years: u32) -> Vec<LoanScheduleRow> {
    let months = term_months(years);
    let r = monthly_rate(annual_rate_pct);
    let principal_part = principal / months as f64;
    let mut balance = principal;
    (1..=months)
        .map(|month| {
            let interest = balance * r;
            balance -= principal_part;
            LoanScheduleRow {
                month,
                payment: principal_part + interest,
                principal: principal_part,
                interest,
                remaining_principal: balance,
            }
        })
        .collect()
}

pub fn full_schedule(
    principal: f64,
    annual_rate_pct: f64,
    years: u32,
    repayment: RepaymentType,
) -> Vec<LoanScheduleRow> {
    if principal <= 0.0 || term_months(years) == 0 {
        return Vec::new();
    }

    match repayment {
        RepaymentType::EqualPayment => equal_payment_rows(principal, annual_rate_pct, years),
        RepaymentType::EqualPrincipal => equal_principal_rows(principal, annual_rate_pct, years),
        RepaymentType::Increasing => increasing_schedule(principal, annual_rate_pct, years),
    }
}

pub fn summarize_schedule(rows: &[LoanScheduleRow]) -> LoanSummary {
    LoanSummary {
        first_payment: rows.first().map(|r| r.payment).unwrap_or(0.0),
        last_payment: rows.last().map(|r| r.payment).unwrap_or(0.0),
        total_paid: rows.iter().map(|r| r.payment).sum(),
        total_interest: rows.iter().map(|r| r.interest).sum(),
    }
}

/// A loan with its schedule computed once, for month-by-month servicing.
#[derive(Debug, Clone)]
pub(crate) struct Mortgage {
    principal: f64,
    schedule: Vec<LoanScheduleRow>,
}

impl Mortgage {
    pub(crate) fn new(
        principal: f64,
        annual_rate_pct: f64,
        years: u32,
        repayment: RepaymentType,
    ) -> Option<Self> {
        let schedule = full_schedule(principal, annual_rate_pct, years, repayment);
        if schedule.is_empty() {
            return None;
        }
        Some(Self {
            principal,
            schedule,
        })
    }

    pub(crate) fn term_months(&self) -> u32 {
        self.schedule.len() as u32
    }

    pub(crate) fn installment(&self, month_index: u32) -> f64 {
        self.schedule
            .get(month_index as usize)
            .map(|row| row.payment)
            .unwrap_or(0.0)
    }

    pub(crate) fn outstanding_after(&self, payments_made: u32) -> f64 {
        if payments_made == 0 {
            return self.principal;
        }
        if payments_made >= self.term_months() {
            return 0.0;
        }
        self.schedule
            .get(payments_made as usize - 1)
            .map(|row| row.remaining_principal.max(0.0))
            .unwrap_or(0.0)
    }
}
