//! Multivariate Gaussian distribution for mixture components

use crate::error::{GmmError, Result};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use rand::Rng;
use rand_distr::StandardNormal;
use std::f64::consts::PI;

/// Relative Cholesky pivot below which a covariance counts as singular.
///
/// The determinant is the product of the squared pivots, so this keeps it
/// bounded away from zero relative to the scale of the matrix.
pub const SINGULAR_TOLERANCE: f64 = 1e-10;

/// Multivariate Gaussian distribution
#[derive(Debug, Clone)]
pub struct MultivariateGaussian {
    /// Mean vector
    mean: Array1<f64>,
    /// Covariance matrix
    covariance: Array2<f64>,
    /// Lower Cholesky factor of the covariance
    cholesky: Array2<f64>,
    /// ln |Σ|
    log_det: f64,
}

impl MultivariateGaussian {
    /// Create new multivariate Gaussian.
    ///
    /// # Errors
    /// [`GmmError::SingularCovariance`] (with component 0) if the covariance is
    /// not positive-definite, and [`GmmError::DimensionMismatch`] if the shapes
    /// disagree.
    pub fn new(mean: Array1<f64>, covariance: Array2<f64>) -> Result<Self> {
        let d = mean.len();
        if covariance.nrows() != d || covariance.ncols() != d {
            return Err(GmmError::mismatch("covariance size", d, covariance.nrows()));
        }

        let cholesky = cholesky(covariance.view())?;
        let log_det = 2.0 * cholesky.diag().iter().map(|l| l.ln()).sum::<f64>();

        Ok(Self {
            mean,
            covariance,
            cholesky,
            log_det,
        })
    }

    /// Create with identity covariance
    pub fn with_identity(mean: Array1<f64>) -> Self {
        let d = mean.len();
        Self {
            mean,
            covariance: Array2::eye(d),
            cholesky: Array2::eye(d),
            log_det: 0.0,
        }
    }

    /// Dimension of the distribution
    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    pub fn covariance(&self) -> &Array2<f64> {
        &self.covariance
    }

    /// Natural log of the covariance determinant
    pub fn log_det(&self) -> f64 {
        self.log_det
    }

    /// Squared Mahalanobis distance `(x - μ)ᵀ Σ⁻¹ (x - μ)`
    ///
    /// # Errors
    /// `DimensionMismatch` if `x` does not have `dim()` entries.
    pub fn mahalanobis_sq(&self, x: ArrayView1<'_, f64>) -> Result<f64> {
        self.check_point(x)?;
        Ok(self.mahalanobis_sq_unchecked(x))
    }

    /// Compute log probability density at a point
    ///
    /// # Errors
    /// `DimensionMismatch` if `x` does not have `dim()` entries.
    pub fn log_pdf(&self, x: ArrayView1<'_, f64>) -> Result<f64> {
        self.check_point(x)?;
        Ok(self.log_pdf_unchecked(x))
    }

    /// Log density of every row of an N×D matrix
    ///
    /// # Errors
    /// `DimensionMismatch` if `data` does not have `dim()` columns.
    pub fn log_pdf_rows(&self, data: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        if data.ncols() != self.dim() {
            return Err(GmmError::mismatch("data columns", self.dim(), data.ncols()));
        }
        Ok(data.rows().into_iter().map(|row| self.log_pdf_unchecked(row)).collect())
    }

    /// Compute probability density at a point
    pub fn pdf(&self, x: ArrayView1<'_, f64>) -> Result<f64> {
        Ok(self.log_pdf(x)?.exp())
    }

    fn check_point(&self, x: ArrayView1<'_, f64>) -> Result<()> {
        if x.len() != self.dim() {
            return Err(GmmError::mismatch("point length", self.dim(), x.len()));
        }
        Ok(())
    }

    fn mahalanobis_sq_unchecked(&self, x: ArrayView1<'_, f64>) -> f64 {
        let diff = &x - &self.mean;
        let z = forward_substitute(self.cholesky.view(), diff.view());
        z.dot(&z)
    }

    fn log_pdf_unchecked(&self, x: ArrayView1<'_, f64>) -> f64 {
        let d = self.dim() as f64;
        -0.5 * (d * (2.0 * PI).ln() + self.log_det + self.mahalanobis_sq_unchecked(x))
    }

    /// Draw one sample as `μ + L z` with `z` standard normal
    pub fn sample<R: Rng>(&self, rng: &mut R) -> Array1<f64> {
        let z: Array1<f64> = (0..self.dim()).map(|_| rng.sample(StandardNormal)).collect();
        &self.mean + &self.cholesky.dot(&z)
    }
}

/// Lower Cholesky factor `L` with `L Lᵀ = Σ`.
///
/// Fails with [`GmmError::SingularCovariance`] when a pivot is not finite or
/// falls below [`SINGULAR_TOLERANCE`] relative to its diagonal entry.
pub(crate) fn cholesky(matrix: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
    let d = matrix.nrows();
    let mut l = Array2::<f64>::zeros((d, d));

    for j in 0..d {
        let mut pivot = matrix[[j, j]];
        for k in 0..j {
            pivot -= l[[j, k]] * l[[j, k]];
        }

        let scale = matrix[[j, j]].abs().max(f64::MIN_POSITIVE);
        if !pivot.is_finite() || pivot <= SINGULAR_TOLERANCE * scale {
            return Err(GmmError::SingularCovariance {
                component: 0,
                pivot,
            });
        }

        let l_jj = pivot.sqrt();
        l[[j, j]] = l_jj;

        for i in (j + 1)..d {
            let mut sum = matrix[[i, j]];
            for k in 0..j {
                sum -= l[[i, k]] * l[[j, k]];
            }
            l[[i, j]] = sum / l_jj;
        }
    }

    Ok(l)
}

/// Solve `L z = b` for lower-triangular `L`
fn forward_substitute(l: ArrayView2<'_, f64>, b: ArrayView1<'_, f64>) -> Array1<f64> {
    let d = b.len();
    let mut z = Array1::<f64>::zeros(d);
    for i in 0..d {
        let mut sum = b[i];
        for k in 0..i {
            sum -= l[[i, k]] * z[k];
        }
        z[i] = sum / l[[i, i]];
    }
    z
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{array, Array2};
    use rand::prelude::*;

    #[test]
    fn test_gaussian_creation() {
        let g = MultivariateGaussian::new(array![0.0, 0.0], Array2::eye(2)).unwrap();
        assert_eq!(g.dim(), 2);
        assert_relative_eq!(g.log_det(), 0.0);
    }

    #[test]
    fn test_pdf_at_mean() {
        let mean = array![0.0, 0.0];
        let g = MultivariateGaussian::new(mean.clone(), Array2::eye(2)).unwrap();

        // PDF should be highest at mean
        let pdf_at_mean = g.pdf(mean.view()).unwrap();
        let pdf_away = g.pdf(array![1.0, 1.0].view()).unwrap();
        assert!(pdf_at_mean > pdf_away);
        assert_relative_eq!(pdf_at_mean, 1.0 / (2.0 * PI), epsilon = 1e-12);
    }

    #[test]
    fn test_log_pdf_full_covariance() {
        // Σ = [[2, 1], [1, 2]], |Σ| = 3, Σ⁻¹ = [[2, -1], [-1, 2]] / 3
        let g = MultivariateGaussian::new(array![1.0, -1.0], array![[2.0, 1.0], [1.0, 2.0]]).unwrap();
        let x = array![2.0, 0.0];
        // diff = [1, 1], quad = (2 - 1 - 1 + 2) / 3 = 2/3
        let expected = -0.5 * (2.0 * (2.0 * PI).ln() + 3.0_f64.ln() + 2.0 / 3.0);
        assert_relative_eq!(g.log_det(), 3.0_f64.ln(), epsilon = 1e-12);
        assert_relative_eq!(g.log_pdf(x.view()).unwrap(), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_wrong_length_point() {
        let g = MultivariateGaussian::with_identity(array![0.0, 0.0]);
        let point = array![1.0, 2.0, 3.0];
        for result in [g.log_pdf(point.view()), g.pdf(point.view()), g.mahalanobis_sq(point.view())] {
            assert!(matches!(
                result,
                Err(GmmError::DimensionMismatch { expected: 2, actual: 3, .. })
            ));
        }
        let rows = Array2::<f64>::zeros((4, 1));
        assert!(matches!(
            g.log_pdf_rows(rows.view()),
            Err(GmmError::DimensionMismatch { what: "data columns", .. })
        ));
        assert_relative_eq!(g.mahalanobis_sq(array![3.0, 4.0].view()).unwrap(), 25.0);
    }

    #[test]
    fn test_singular_covariance_rejected() {
        let result = MultivariateGaussian::new(array![0.0, 0.0], array![[1.0, 1.0], [1.0, 1.0]]);
        assert!(matches!(result, Err(GmmError::SingularCovariance { .. })));

        let zero = MultivariateGaussian::new(array![0.0], array![[0.0]]);
        assert!(matches!(zero, Err(GmmError::SingularCovariance { .. })));
    }

    #[test]
    fn test_cholesky_reconstructs_matrix() {
        let m = array![[4.0, 2.0, 0.4], [2.0, 3.0, 0.6], [0.4, 0.6, 1.5]];
        let l = cholesky(m.view()).unwrap();
        let rebuilt = l.dot(&l.t());
        for (a, b) in rebuilt.iter().zip(m.iter()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_sample_moments() {
        let cov = array![[1.0, 0.5], [0.5, 2.0]];
        let g = MultivariateGaussian::new(array![3.0, -2.0], cov).unwrap();
        let mut rng = StdRng::seed_from_u64(7);

        let n = 20_000;
        let mut samples = Array2::zeros((n, 2));
        for mut row in samples.rows_mut() {
            row.assign(&g.sample(&mut rng));
        }

        let mean = samples.mean_axis(ndarray::Axis(0)).unwrap();
        assert!((mean[0] - 3.0).abs() < 0.05);
        assert!((mean[1] + 2.0).abs() < 0.05);

        let var = samples.var_axis(ndarray::Axis(0), 0.0);
        assert!((var[0] - 1.0).abs() < 0.1);
        assert!((var[1] - 2.0).abs() < 0.1);
    }
}
