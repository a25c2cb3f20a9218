use thiserror::Error;

/// Rejected plan configuration. Projections themselves never fail; this is
/// only produced by explicit validation and the goal solver.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlanError {
    #[error("invalid input: {field} {reason}")]
    InvalidInput { field: &'static str, reason: String },

    #[error("allocation must sum to 100%, got {total:.2}%")]
    AllocationSum { total: f64 },

    #[error("historical return pool is empty")]
    EmptyReturnPool,

    #[error("solver: {0}")]
    Solver(String),
}

impl PlanError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field,
            reason: reason.into(),
        }
    }
}
