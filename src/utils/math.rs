//! Mathematical utility functions

use ndarray::ArrayView1;

/// Numerically stable `ln(Σ exp(x_i))`.
///
/// The maximum is factored out before exponentiating. Returns `-∞` for an
/// empty input or when every term is `-∞`.
pub fn log_sum_exp(values: ArrayView1<'_, f64>) -> f64 {
    let max_val = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if max_val.is_infinite() {
        return max_val;
    }

    let sum: f64 = values.iter().map(|&x| (x - max_val).exp()).sum();
    max_val + sum.ln()
}

/// Index of the largest value, lowest index on ties. `None` if empty.
pub fn argmax(values: ArrayView1<'_, f64>) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// Mean of the per-feature (population) variances of an N×D matrix.
pub fn mean_feature_variance(data: ndarray::ArrayView2<'_, f64>) -> f64 {
    let n = data.nrows();
    if n == 0 || data.ncols() == 0 {
        return 0.0;
    }
    data.var_axis(ndarray::Axis(0), 0.0).mean().unwrap_or(0.0)
}
