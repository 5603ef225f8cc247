//! Random initialization from Dirichlet soft assignments

use super::maximization::MaximizationStep;
use crate::error::{GmmError, Result};
use crate::models::{GaussianMixtureModel, Responsibilities};
use ndarray::{Array2, ArrayView2};
use rand::prelude::*;
use rand_distr::Dirichlet;

/// Seeded RNG, or one drawn from OS entropy
pub(crate) fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Check the data matrix is non-empty and finite
pub(crate) fn validate_data(data: ArrayView2<'_, f64>) -> Result<()> {
    if data.nrows() == 0 || data.ncols() == 0 {
        return Err(GmmError::invalid(format!(
            "data must have at least one sample and one feature, got {}x{}",
            data.nrows(),
            data.ncols()
        )));
    }
    if let Some(pos) = data.iter().position(|v| !v.is_finite()) {
        return Err(GmmError::invalid(format!(
            "data contains a non-finite value at row {}",
            pos / data.ncols()
        )));
    }
    Ok(())
}

/// Draw one symmetric-Dirichlet soft assignment per sample (N × K).
///
/// A draw in which every gamma variate underflows falls back to a one-hot
/// row at a uniformly chosen index, the `alpha → 0` limit.
pub fn dirichlet_responsibilities<R: Rng>(
    n_samples: usize,
    n_components: usize,
    alpha: f64,
    rng: &mut R,
) -> Result<Responsibilities> {
    if n_components == 0 {
        return Err(GmmError::invalid("n_components must be at least 1"));
    }
    if !(alpha.is_finite() && alpha > 0.0) {
        return Err(GmmError::invalid(format!("alpha must be positive, got {alpha}")));
    }

    let mut matrix = Array2::<f64>::zeros((n_samples, n_components));
    if n_components == 1 {
        matrix.fill(1.0);
        return Ok(Responsibilities::from_normalized(matrix));
    }

    let dirichlet = Dirichlet::new_with_size(alpha, n_components)
        .map_err(|e| GmmError::invalid(format!("cannot build Dirichlet({alpha}): {e}")))?;

    for mut row in matrix.rows_mut() {
        let draw: Vec<f64> = dirichlet.sample(rng);
        let sum: f64 = draw.iter().sum();
        if draw.iter().all(|p| p.is_finite() && *p >= 0.0) && (sum - 1.0).abs() < 1e-9 {
            for (slot, p) in row.iter_mut().zip(draw) {
                *slot = p;
            }
        } else {
            row[rng.gen_range(0..n_components)] = 1.0;
        }
    }

    Ok(Responsibilities::from_normalized(matrix))
}

/// Produce an initial model from random soft assignments.
///
/// Draws a Dirichlet(`alpha`) categorical vector for every sample and runs
/// one maximization step on them. Smaller `alpha` gives more peaked initial
/// assignments, larger `alpha` more uniform ones.
///
/// # Errors
/// `InvalidArgument` if `n_components` is 0 or exceeds the number of samples,
/// `alpha <= 0`, or the data is empty or non-finite; `EmptyComponent` if a
/// component receives no initial mass.
pub fn initialize(
    data: ArrayView2<'_, f64>,
    n_components: usize,
    alpha: f64,
    seed: Option<u64>,
) -> Result<GaussianMixtureModel> {
    let mut rng = make_rng(seed);
    initialize_with_rng(data, n_components, alpha, &MaximizationStep::default(), &mut rng)
}

/// [`initialize`] with a caller-provided RNG and maximization settings
pub fn initialize_with_rng<R: Rng>(
    data: ArrayView2<'_, f64>,
    n_components: usize,
    alpha: f64,
    step: &MaximizationStep,
    rng: &mut R,
) -> Result<GaussianMixtureModel> {
    validate_data(data)?;
    if n_components == 0 {
        return Err(GmmError::invalid("n_components must be at least 1"));
    }
    if n_components > data.nrows() {
        return Err(GmmError::invalid(format!(
            "n_components ({n_components}) exceeds number of samples ({})",
            data.nrows()
        )));
    }

    let responsibilities = dirichlet_responsibilities(data.nrows(), n_components, alpha, rng)?;

    let mut model = GaussianMixtureModel::placeholder(n_components, data.ncols());
    step.run(&mut model, &responsibilities, data, rng)?;

    tracing::debug!(
        "Initialized {} components on {}x{} data (alpha = {})",
        n_components,
        data.nrows(),
        data.ncols(),
        alpha
    );

    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn data() -> Array2<f64> {
        array![[0.0, 1.0], [1.0, 0.5], [2.0, 2.0], [3.0, 1.0], [4.0, 3.5], [5.0, 2.0]]
    }

    #[test]
    fn test_dirichlet_rows_are_distributions() {
        let mut rng = StdRng::seed_from_u64(1);
        let resp = dirichlet_responsibilities(50, 4, 0.5, &mut rng).unwrap();
        for row in resp.view().outer_iter() {
            assert_relative_eq!(row.sum(), 1.0, epsilon = 1e-9);
            assert!(row.iter().all(|&p| p >= 0.0));
        }
    }

    #[test]
    fn test_small_alpha_is_more_peaked() {
        let mut rng = StdRng::seed_from_u64(2);
        let peaked = dirichlet_responsibilities(500, 3, 0.05, &mut rng).unwrap();
        let flat = dirichlet_responsibilities(500, 3, 50.0, &mut rng).unwrap();

        let mean_max = |r: &Responsibilities| {
            r.view()
                .outer_iter()
                .map(|row| row.iter().cloned().fold(0.0, f64::max))
                .sum::<f64>()
                / r.n_samples() as f64
        };
        assert!(mean_max(&peaked) > 0.8);
        assert!(mean_max(&flat) < 0.5);
    }

    #[test]
    fn test_single_component() {
        let model = initialize(data().view(), 1, 1.0, Some(0)).unwrap();
        assert_eq!(model.n_components(), 1);
        assert_relative_eq!(model.weights()[0], 1.0);
        let mean = data().mean_axis(ndarray::Axis(0)).unwrap();
        assert_relative_eq!(model.means()[[0, 0]], mean[0], epsilon = 1e-12);
    }

    #[test]
    fn test_initialize_is_seeded() {
        let a = initialize(data().view(), 2, 1.0, Some(42)).unwrap();
        let b = initialize(data().view(), 2, 1.0, Some(42)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.n_components(), 2);
        assert_eq!(a.n_features(), 2);
        assert_relative_eq!(a.weights().sum(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_invalid_arguments() {
        let x = data();
        for (k, alpha) in [(0, 1.0), (7, 1.0), (2, 0.0), (2, -1.0), (2, f64::INFINITY)] {
            let result = initialize(x.view(), k, alpha, Some(0));
            assert!(
                matches!(result, Err(GmmError::InvalidArgument(_))),
                "k={k} alpha={alpha}"
            );
        }
    }

    #[test]
    fn test_rejects_non_finite_data() {
        let x = array![[0.0, 1.0], [f64::NAN, 0.0]];
        assert!(matches!(
            initialize(x.view(), 1, 1.0, None),
            Err(GmmError::InvalidArgument(_))
        ));
    }
}
