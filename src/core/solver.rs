use serde::{Deserialize, Serialize};

use super::error::PlanError;
use super::household::project_scenario;
use super::types::PlanScenario;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GoalType {
    /// Smallest monthly contribution that reaches `target_value` of net worth.
    RequiredContribution,
    /// Largest monthly retirement expense that keeps financial assets at or
    /// above `target_value` at the horizon.
    MaxRetirementExpense,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GoalSolveConfig {
    pub goal_type: GoalType,
    pub target_value: f64,
    pub search_min: f64,
    pub search_max: f64,
    pub tolerance: f64,
    pub max_iterations: u32,
}

impl Default for GoalSolveConfig {
    fn default() -> Self {
        Self {
            goal_type: GoalType::RequiredContribution,
            target_value: 1_000_000.0,
            search_min: 0.0,
            search_max: 20_000.0,
            tolerance: 1.0,
            max_iterations: 60,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalSolveIteration {
    pub iteration: u32,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub candidate_value: f64,
    pub achieved_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalSolveResult {
    pub goal_type: GoalType,
    pub target_value: f64,
    pub search_min: f64,
    pub search_max: f64,
    pub tolerance: f64,
    pub max_iterations: u32,
    pub solved_value: Option<f64>,
    pub achieved_value: Option<f64>,
    pub iterations: Vec<GoalSolveIteration>,
    pub converged: bool,
    pub feasible: bool,
    pub message: String,
}

pub fn solve_goal(scenario: &PlanScenario, config: GoalSolveConfig) -> Result<GoalSolveResult, PlanError> {
    validate_config(scenario, config)?;

    let mut iterations = Vec::with_capacity(config.max_iterations as usize);
    let low_value = evaluate_candidate(scenario, config, config.search_min);
    let high_value = evaluate_candidate(scenario, config, config.search_max);
    let meets = |achieved: f64| achieved + 1e-9 >= config.target_value;

    let mut solved_value = None;
    let mut converged = false;
    let feasible;
    let message;

    match config.goal_type {
        GoalType::RequiredContribution => {
            if meets(low_value) {
                solved_value = Some(config.search_min);
                converged = true;
                feasible = true;
                message = "Already meets target at lower contribution bound.".to_string();
            } else if !meets(high_value) {
                feasible = false;
                message = "No feasible contribution found within the search bounds.".to_string();
            } else {
                let mut lo = config.search_min;
                let mut hi = config.search_max;
                let mut it = 0;
                while it < config.max_iterations {
                    it += 1;
                    let mid = (lo + hi) * 0.5;
                    let achieved = evaluate_candidate(scenario, config, mid);
                    iterations.push(GoalSolveIteration {
                        iteration: it,
                        lower_bound: lo,
                        upper_bound: hi,
                        candidate_value: mid,
                        achieved_value: achieved,
                    });

                    if meets(achieved) {
                        hi = mid;
                    } else {
                        lo = mid;
                    }

                    if (hi - lo).abs() <= config.tolerance {
                        converged = true;
                        break;
                    }
                }
                solved_value = Some(hi);
                feasible = true;
                message = if converged {
                    "Solved required monthly contribution.".to_string()
                } else {
                    "Reached max iterations before tolerance was met; returning best estimate."
                        .to_string()
                };
            }
        }
        GoalType::MaxRetirementExpense => {
            if !meets(low_value) {
                feasible = false;
                message = "No feasible expense found within the search bounds.".to_string();
            } else if meets(high_value) {
                solved_value = Some(config.search_max);
                converged = true;
                feasible = true;
                message =
                    "Upper expense bound is still feasible; increase search max for a higher target."
                        .to_string();
            } else {
                let mut lo = config.search_min;
                let mut hi = config.search_max;
                let mut it = 0;
                while it < config.max_iterations {
                    it += 1;
                    let mid = (lo + hi) * 0.5;
                    let achieved = evaluate_candidate(scenario, config, mid);
                    iterations.push(GoalSolveIteration {
                        iteration: it,
                        lower_bound: lo,
                        upper_bound: hi,
                        candidate_value: mid,
                        achieved_value: achieved,
                    });

                    if meets(achieved) {
                        lo = mid;
                    } else {
                        hi = mid;
                    }

                    if (hi - lo).abs() <= config.tolerance {
                        converged = true;
                        break;
                    }
                }
                solved_value = Some(lo);
                feasible = true;
                message = if converged {
                    "Solved maximum monthly retirement expense.".to_string()
                } else {
                    "Reached max iterations before tolerance was met; returning best estimate."
                        .to_string()
                };
            }
        }
    }

    let achieved_value = solved_value.map(|value| evaluate_candidate(scenario, config, value));

    Ok(GoalSolveResult {
        goal_type: config.goal_type,
        target_value: config.target_value,
        search_min: config.search_min,
        search_max: config.search_max,
        tolerance: config.tolerance,
        max_iterations: config.max_iterations,
        solved_value,
        achieved_value,
        iterations,
        converged,
        feasible,
        message,
    })
}

/// Outcome of the scenario with the candidate substituted in: final net worth
/// for contributions, final financial assets for retirement expense.
fn evaluate_candidate(base: &PlanScenario, config: GoalSolveConfig, candidate_value: f64) -> f64 {
    let mut scenario = base.clone();
    match config.goal_type {
        GoalType::RequiredContribution => {
            scenario.person.monthly_contribution = candidate_value.max(0.0);
            scenario.person.contribution_adjustments.clear();
            project_scenario(&scenario).final_net_worth()
        }
        GoalType::MaxRetirementExpense => {
            scenario.retirement.monthly_expense = candidate_value.max(0.0);
            project_scenario(&scenario).final_financial_assets()
        }
    }
}

fn validate_config(scenario: &PlanScenario, config: GoalSolveConfig) -> Result<(), PlanError> {
    if config.goal_type == GoalType::MaxRetirementExpense && !scenario.retirement.enabled {
        return Err(PlanError::Solver(
            "retirement must be enabled to solve for the retirement expense".to_string(),
        ));
    }
    if scenario.years == 0 {
        return Err(PlanError::Solver("years must be > 0".to_string()));
    }
    if !config.target_value.is_finite() {
        return Err(PlanError::Solver("target_value must be finite".to_string()));
    }
    if !config.search_min.is_finite() || !config.search_max.is_finite() {
        return Err(PlanError::Solver("search bounds must be finite".to_string()));
    }
    if config.search_min < 0.0 {
        return Err(PlanError::Solver("search_min must be >= 0".to_string()));
    }
    if config.search_max <= config.search_min {
        return Err(PlanError::Solver(
            "search_max must be greater than search_min".to_string(),
        ));
    }
    if !config.tolerance.is_finite() || config.tolerance <= 0.0 {
        return Err(PlanError::Solver("tolerance must be > 0".to_string()));
    }
    if config.max_iterations == 0 {
        return Err(PlanError::Solver("max_iterations must be > 0".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{PersonProfile, RetirementPlan};

    fn assert_close(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "expected {expected}, got {actual}, tolerance {tol}"
        );
    }

    fn flat_scenario() -> PlanScenario {
        PlanScenario {
            person: PersonProfile {
                initial_wealth: 0.0,
                monthly_contribution: 0.0,
                monthly_growth_rate: 0.0,
                annual_return_rate: 0.0,
                retirement_year: 100,
                ..PersonProfile::default()
            },
            years: 10,
            ..PlanScenario::default()
        }
    }

    #[test]
    fn required_contribution_solver_finds_deterministic_solution() {
        let config = GoalSolveConfig {
            goal_type: GoalType::RequiredContribution,
            target_value: 120_000.0,
            search_min: 0.0,
            search_max: 5_000.0,
            tolerance: 0.5,
            max_iterations: 40,
        };

        let result = solve_goal(&flat_scenario(), config).expect("must solve");
        assert!(result.feasible);
        assert!(result.converged);
        assert_close(result.solved_value.expect("value expected"), 1_000.0, 0.5);
        assert!(result.achieved_value.expect("achieved expected") >= 120_000.0 - 1e-6);
        assert!(!result.iterations.is_empty());
    }

    #[test]
    fn required_contribution_solver_reports_infeasible_when_bounds_too_low() {
        let config = GoalSolveConfig {
            goal_type: GoalType::RequiredContribution,
            target_value: 120_000.0,
            search_min: 0.0,
            search_max: 500.0,
            tolerance: 0.5,
            max_iterations: 16,
        };

        let result = solve_goal(&flat_scenario(), config).expect("must return result");
        assert!(!result.feasible);
        assert!(result.solved_value.is_none());
        assert!(result.achieved_value.is_none());
    }

    #[test]
    fn max_expense_solver_finds_deterministic_solution() {
        let mut scenario = flat_scenario();
        scenario.person.initial_wealth = 120_000.0;
        scenario.person.retirement_year = 0;
        scenario.retirement = RetirementPlan {
            enabled: true,
            monthly_expense: 0.0,
            inflation_rate: 0.0,
            use_jepq: false,
            voo_growth_rate: 0.0,
            ..RetirementPlan::default()
        };
        let config = GoalSolveConfig {
            goal_type: GoalType::MaxRetirementExpense,
            target_value: 0.0,
            search_min: 0.0,
            search_max: 10_000.0,
            tolerance: 0.5,
            max_iterations: 40,
        };

        let result = solve_goal(&scenario, config).expect("must solve");
        assert!(result.feasible);
        assert_close(result.solved_value.expect("value expected"), 1_000.0, 0.5);
    }

    #[test]
    fn already_met_target_returns_lower_bound() {
        let mut scenario = flat_scenario();
        scenario.person.initial_wealth = 1_000_000.0;
        let config = GoalSolveConfig {
            target_value: 500_000.0,
            ..GoalSolveConfig::default()
        };
        let result = solve_goal(&scenario, config).expect("must solve");
        assert_eq!(result.solved_value, Some(0.0));
        assert!(result.iterations.is_empty());
    }

    #[test]
    fn invalid_configs_are_rejected() {
        let scenario = flat_scenario();
        let bad_bounds = GoalSolveConfig {
            search_min: 10.0,
            search_max: 5.0,
            ..GoalSolveConfig::default()
        };
        assert!(matches!(solve_goal(&scenario, bad_bounds), Err(PlanError::Solver(_))));

        let expense_without_retirement = GoalSolveConfig {
            goal_type: GoalType::MaxRetirementExpense,
            ..GoalSolveConfig::default()
        };
        assert!(matches!(
            solve_goal(&scenario, expense_without_retirement),
            Err(PlanError::Solver(_))
        ));

        let zero_tolerance = GoalSolveConfig {
            tolerance: 0.0,
            ..GoalSolveConfig::default()
        };
        assert!(solve_goal(&scenario, zero_tolerance).is_err());
    }
}
