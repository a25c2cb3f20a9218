use super::types::YearPercentiles;

pub(crate) fn sort_values(values: &mut [f64]) {
    values.sort_by(|a, b| a.total_cmp(b));
}

/// Nearest-rank percentile of an ascending slice: `sorted[floor(p * (n - 1))]`
/// with `p` in `[0, 1]`. Zero for an empty slice.
pub fn nearest_rank(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (p.clamp(0.0, 1.0) * (sorted.len() - 1) as f64).floor() as usize;
    sorted[rank.min(sorted.len() - 1)]
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sorts `values` in place and reads the standard band off it.
pub(crate) fn year_percentiles(values: &mut [f64]) -> YearPercentiles {
    sort_values(values);
    YearPercentiles {
        p10: nearest_rank(values, 0.10),
        p25: nearest_rank(values, 0.25),
        p50: nearest_rank(values, 0.50),
        p75: nearest_rank(values, 0.75),
        p90: nearest_rank(values, 0.90),
        mean: mean(values),
    }
}
