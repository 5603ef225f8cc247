//! Expectation step: posterior component probabilities

use crate::error::{GmmError, Result};
use crate::models::{GaussianMixtureModel, MultivariateGaussian, Responsibilities};
use crate::utils::log_sum_exp;
use ndarray::{Array1, Array2, ArrayView2, Axis};
use rayon::prelude::*;

/// Output of one expectation pass
#[derive(Debug, Clone)]
pub struct Expectation {
    /// Posterior component probabilities (N × K)
    pub responsibilities: Responsibilities,
    /// Per-sample log-likelihood `ln Σ_k w_k N(x_n | μ_k, Σ_k)`
    pub sample_log_likelihood: Array1<f64>,
}

impl Expectation {
    /// Total data log-likelihood
    pub fn log_likelihood(&self) -> f64 {
        self.sample_log_likelihood.sum()
    }
}

/// Compute responsibilities (N × K) for `data` under `model`.
///
/// # Errors
/// - `DimensionMismatch` if the data has a different feature count than the model
/// - `SingularCovariance` if a component covariance is not invertible
pub fn expect(model: &GaussianMixtureModel, data: ArrayView2<'_, f64>) -> Result<Responsibilities> {
    Ok(expectation(model, data, true)?.responsibilities)
}

/// Responsibilities together with the total data log-likelihood, from one pass
pub fn expect_with_log_likelihood(
    model: &GaussianMixtureModel,
    data: ArrayView2<'_, f64>,
) -> Result<(Responsibilities, f64)> {
    let e = expectation(model, data, true)?;
    let ll = e.log_likelihood();
    Ok((e.responsibilities, ll))
}

/// Total data log-likelihood `Σ_n ln Σ_k w_k N(x_n | μ_k, Σ_k)`
pub fn log_likelihood(model: &GaussianMixtureModel, data: ArrayView2<'_, f64>) -> Result<f64> {
    Ok(expectation(model, data, true)?.log_likelihood())
}

/// Per-sample log-likelihood
pub fn score_samples(model: &GaussianMixtureModel, data: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
    Ok(expectation(model, data, true)?.sample_log_likelihood)
}

/// Most probable component for every sample
pub fn predict(model: &GaussianMixtureModel, data: ArrayView2<'_, f64>) -> Result<Vec<usize>> {
    Ok(expect(model, data)?.hard_assignments())
}

/// Full expectation pass.
///
/// Weighted log densities `ln w_k + ln N(x_n | μ_k, Σ_k)` are evaluated one
/// component per task when `parallel` is set, then every row is normalized
/// with log-sum-exp. Columns are assembled in component order, so the result
/// does not depend on `parallel`.
pub fn expectation(
    model: &GaussianMixtureModel,
    data: ArrayView2<'_, f64>,
    parallel: bool,
) -> Result<Expectation> {
    if data.ncols() != model.n_features() {
        return Err(GmmError::mismatch("data columns", model.n_features(), data.ncols()));
    }

    // Factorize up front so the first singular component is the one reported
    let components = (0..model.n_components())
        .map(|k| model.component(k))
        .collect::<Result<Vec<_>>>()?;

    let weighted = |(k, gaussian): (usize, &MultivariateGaussian)| -> Result<Array1<f64>> {
        let log_weight = model.weights()[k].ln();
        let mut column = gaussian.log_pdf_rows(data)?;
        column += log_weight;
        Ok(column)
    };

    let columns: Vec<Array1<f64>> = if parallel {
        components.par_iter().enumerate().map(weighted).collect::<Result<_>>()?
    } else {
        components.iter().enumerate().map(weighted).collect::<Result<_>>()?
    };

    let mut log_resp = Array2::<f64>::zeros((data.nrows(), model.n_components()));
    for (k, column) in columns.iter().enumerate() {
        log_resp.column_mut(k).assign(column);
    }

    let mut sample_log_likelihood = Array1::<f64>::zeros(data.nrows());
    for (n, mut row) in log_resp.axis_iter_mut(Axis(0)).enumerate() {
        let lse = log_sum_exp(row.view());
        if !lse.is_finite() {
            return Err(GmmError::invalid(format!(
                "sample {n} has non-finite log-likelihood {lse}"
            )));
        }
        sample_log_likelihood[n] = lse;
        row.mapv_inplace(|l| (l - lse).exp());
    }

    Ok(Expectation {
        responsibilities: Responsibilities::from_normalized(log_resp),
        sample_log_likelihood,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{array, Array3};
    use std::f64::consts::PI;

    fn model_1d() -> GaussianMixtureModel {
        GaussianMixtureModel::new(
            array![[0.0], [4.0]],
            Array3::from_elem((2, 1, 1), 1.0),
            array![0.5, 0.5],
        )
        .unwrap()
    }

    #[test]
    fn test_rows_sum_to_one() {
        let data = array![[-1.0], [0.0], [2.0], [3.5], [10.0]];
        let resp = expect(&model_1d(), data.view()).unwrap();
        for row in resp.view().outer_iter() {
            assert_relative_eq!(row.sum(), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_midpoint_is_split_evenly() {
        let resp = expect(&model_1d(), array![[2.0]].view()).unwrap();
        assert_relative_eq!(resp.view()[[0, 0]], 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_matches_direct_formula() {
        let model = model_1d();
        let x = 1.0_f64;
        let p0 = 0.5 * (-0.5 * x * x).exp() / (2.0 * PI).sqrt();
        let p1 = 0.5 * (-0.5 * (x - 4.0) * (x - 4.0)).exp() / (2.0 * PI).sqrt();

        let data = array![[x]];
        let (resp, ll) = expect_with_log_likelihood(&model, data.view()).unwrap();
        assert_relative_eq!(resp.view()[[0, 0]], p0 / (p0 + p1), epsilon = 1e-12);
        assert_relative_eq!(ll, (p0 + p1).ln(), epsilon = 1e-12);
    }

    #[test]
    fn test_score_samples_sum_to_log_likelihood() {
        let data = array![[-1.0], [2.0], [5.0]];
        let scores = score_samples(&model_1d(), data.view()).unwrap();
        assert_eq!(scores.len(), 3);
        assert_relative_eq!(
            scores.sum(),
            log_likelihood(&model_1d(), data.view()).unwrap(),
            epsilon = 1e-12
        );

        // Midpoint of two unit components with equal weight: ln N(2 | 0, 1)
        let expected = -0.5 * ((2.0 * PI).ln() + 4.0);
        assert_relative_eq!(scores[1], expected, epsilon = 1e-12);
    }

    #[test]
    fn test_far_samples_do_not_underflow() {
        // Every density underflows to 0 in linear space here
        let data = array![[1e3], [-1e3]];
        let resp = expect(&model_1d(), data.view()).unwrap();
        assert_eq!(resp.hard_assignments(), vec![1, 0]);
        for r in resp.view().iter() {
            assert!(r.is_finite());
        }
        assert!(log_likelihood(&model_1d(), data.view()).unwrap().is_finite());
    }

    #[test]
    fn test_zero_weight_component_gets_no_mass() {
        let model = GaussianMixtureModel::new(
            array![[0.0], [0.1]],
            Array3::from_elem((2, 1, 1), 1.0),
            array![1.0, 0.0],
        )
        .unwrap();
        let resp = expect(&model, array![[0.1]].view()).unwrap();
        assert_eq!(resp.view()[[0, 1]], 0.0);
        assert_relative_eq!(resp.view()[[0, 0]], 1.0);
    }

    #[test]
    fn test_dimension_mismatch() {
        let err = expect(&model_1d(), array![[1.0, 2.0]].view()).unwrap_err();
        assert!(matches!(err, GmmError::DimensionMismatch { expected: 1, actual: 2, .. }));
    }

    #[test]
    fn test_singular_covariance_reports_component() {
        let model = GaussianMixtureModel::new(
            array![[0.0, 0.0], [1.0, 1.0]],
            array![[[1.0, 0.0], [0.0, 1.0]], [[2.0, 2.0], [2.0, 2.0]]],
            array![0.5, 0.5],
        )
        .unwrap();
        let err = expect(&model, array![[0.0, 0.0]].view()).unwrap_err();
        assert!(matches!(err, GmmError::SingularCovariance { component: 1, .. }));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let data = array![[-1.0], [0.3], [2.2], [3.9], [7.0]];
        let a = expectation(&model_1d(), data.view(), true).unwrap();
        let b = expectation(&model_1d(), data.view(), false).unwrap();
        assert_eq!(a.responsibilities, b.responsibilities);
        assert_eq!(a.sample_log_likelihood, b.sample_log_likelihood);
    }
}
