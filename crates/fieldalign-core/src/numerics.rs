use std::time::Duration;

/// Indices that sort `values` ascending; equal values keep their index order.
pub fn deterministic_argsort(values: &[f64]) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..values.len()).collect();
    indices.sort_unstable_by(|lhs, rhs| {
        values[*lhs]
            .total_cmp(&values[*rhs])
            .then_with(|| lhs.cmp(rhs))
    });
    indices
}

/// Number of `resolution` units nearest to `value`, ties to even.
pub fn resolution_units(value: f64, resolution: f64) -> u64 {
    let units = (value / resolution).round_ties_even();
    if units.is_finite() && units > 0.0 {
        units as u64
    } else {
        0
    }
}

/// `None` for negative, non-finite or out-of-range seconds.
pub fn duration_from_seconds(seconds: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(seconds).ok()
}

pub fn is_close_abs(lhs: f64, rhs: f64, tolerance: f64) -> bool {
    (lhs - rhs).abs() <= tolerance
}

pub fn any_close_abs(value: f64, candidates: &[f64], tolerance: f64) -> bool {
    candidates
        .iter()
        .any(|candidate| is_close_abs(value, *candidate, tolerance))
}
