use super::error::PlanError;
use super::types::{
    AssetAssumption, PersonProfile, PlanScenario, PortfolioAllocation, PortfolioStats,
};

/// Assumed correlation of any custom ticker with the base-asset blend.
pub const CUSTOM_TICKER_CORRELATION: f64 = 0.5;

const WEIGHT_SUM_TOLERANCE: f64 = 0.01;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BaseAsset {
    Stocks,
    Bonds,
    Gold,
    Cash,
}

impl BaseAsset {
    pub const ALL: [BaseAsset; 4] = [
        BaseAsset::Stocks,
        BaseAsset::Bonds,
        BaseAsset::Gold,
        BaseAsset::Cash,
    ];

    pub fn key(self) -> &'static str {
        match self {
            BaseAsset::Stocks => "stocks",
            BaseAsset::Bonds => "bonds",
            BaseAsset::Gold => "gold",
            BaseAsset::Cash => "cash",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|asset| asset.key() == key)
    }

    pub fn default_assumption(self) -> AssetAssumption {
        let (expected_return, std_dev) = match self {
            BaseAsset::Stocks => (10.0, 16.0),
            BaseAsset::Bonds => (4.0, 6.0),
            BaseAsset::Gold => (6.0, 15.0),
            BaseAsset::Cash => (2.0, 0.5),
        };
        AssetAssumption {
            expected_return,
            std_dev,
        }
    }

    /// Pairwise correlation; unlisted pairs (anything with cash) are zero.
    pub fn correlation(self, other: BaseAsset) -> f64 {
        use BaseAsset::*;
        match (self, other) {
            (a, b) if a == b => 1.0,
            (Stocks, Bonds) | (Bonds, Stocks) => 0.1,
            (Stocks, Gold) | (Gold, Stocks) => 0.05,
            (Bonds, Gold) | (Gold, Bonds) => 0.3,
            _ => 0.0,
        }
    }
}

/// A weighted position with its weight as a fraction.
#[derive(Debug, Clone, Copy)]
struct Position {
    base: Option<BaseAsset>,
    weight: f64,
    assumption: AssetAssumption,
}

fn assumption_for(allocation: &PortfolioAllocation, key: &str) -> Option<AssetAssumption> {
    allocation
        .assets
        .get(key)
        .copied()
        .or_else(|| BaseAsset::from_key(key).map(BaseAsset::default_assumption))
}

fn positions(allocation: &PortfolioAllocation) -> Vec<Position> {
    allocation
        .weights
        .iter()
        .filter_map(|(key, weight)| {
            let assumption = assumption_for(allocation, key)?;
            Some(Position {
                base: BaseAsset::from_key(key),
                weight: weight / 100.0,
                assumption,
            })
        })
        .collect()
}

/// Weighted expected annual return, in percent.
pub fn expected_return(allocation: &PortfolioAllocation) -> f64 {
    positions(allocation)
        .iter()
        .map(|p| p.weight * p.assumption.expected_return)
        .sum()
}

/// Annual standard deviation of the blend, in percent.
pub fn std_dev(allocation: &PortfolioAllocation) -> f64 {
    let positions = positions(allocation);
    let base: Vec<(BaseAsset, f64, f64)> = positions
        .iter()
        .filter_map(|p| p.base.map(|asset| (asset, p.weight, p.assumption.std_dev)))
        .collect();

    let mut base_variance = 0.0;
    for (i, (asset_i, w_i, s_i)) in base.iter().enumerate() {
        base_variance += w_i * w_i * s_i * s_i;
        for (asset_j, w_j, s_j) in &base[i + 1..] {
            base_variance += 2.0 * w_i * w_j * s_i * s_j * asset_i.correlation(*asset_j);
        }
    }
    let base_sd = base_variance.max(0.0).sqrt();

    let mut variance = base_variance;
    for custom in positions.iter().filter(|p| p.base.is_none()) {
        let weighted_sd = custom.weight * custom.assumption.std_dev;
        variance += weighted_sd * weighted_sd;
        variance += 2.0 * weighted_sd * base_sd * CUSTOM_TICKER_CORRELATION;
    }

    variance.max(0.0).sqrt()
}

pub fn portfolio_stats(allocation: &PortfolioAllocation) -> PortfolioStats {
    PortfolioStats {
        expected_return: expected_return(allocation),
        std_dev: std_dev(allocation),
    }
}

pub fn validate_allocation(allocation: &PortfolioAllocation) -> Result<(), PlanError> {
    for (key, weight) in &allocation.weights {
        if !weight.is_finite() || *weight < 0.0 {
            return Err(PlanError::invalid(
                "allocation.weights",
                format!("weight for `{key}` must be a non-negative number"),
            ));
        }
        if assumption_for(allocation, key).is_none() {
            return Err(PlanError::invalid(
                "allocation.assets",
                format!("custom ticker `{key}` needs an expected return and std dev"),
            ));
        }
    }
    for (key, assumption) in &allocation.assets {
        if !assumption.expected_return.is_finite()
            || !assumption.std_dev.is_finite()
            || assumption.std_dev < 0.0
        {
            return Err(PlanError::invalid(
                "allocation.assets",
                format!("assumption for `{key}` must be finite with std dev >= 0"),
            ));
        }
    }

    let total: f64 = allocation.weights.values().sum();
    if (total - 100.0).abs() > WEIGHT_SUM_TOLERANCE {
        return Err(PlanError::AllocationSum { total });
    }
    Ok(())
}

/// The person with their static return replaced by the blend's expected return.
pub fn apply_blended_return(person: &PersonProfile, allocation: &PortfolioAllocation) -> PersonProfile {
    PersonProfile {
        annual_return_rate: expected_return(allocation),
        ..person.clone()
    }
}

/// The scenario the projectors should run: the person's return blended from
/// the scenario's portfolio when one is set. The spouse keeps their own rate.
pub fn with_blended_return(scenario: &PlanScenario) -> PlanScenario {
    match &scenario.portfolio {
        Some(allocation) => PlanScenario {
            person: apply_blended_return(&scenario.person, allocation),
            ..scenario.clone()
        },
        None => scenario.clone(),
    }
}
