//! Gaussian mixture model parameters

use super::gaussian::MultivariateGaussian;
use crate::error::{GmmError, Result};
use ndarray::{s, Array1, Array2, Array3, Axis};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Tolerance on `Σ weights = 1` when validating a model
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Parameters of a K-component Gaussian mixture in D dimensions
///
/// - `means`: K × D, row k is the mean of component k
/// - `covariances`: K × D × D, slice k is the covariance of component k
/// - `weights`: K mixture proportions summing to 1
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "MixtureParts")]
pub struct GaussianMixtureModel {
    means: Array2<f64>,
    covariances: Array3<f64>,
    weights: Array1<f64>,
}

/// Unvalidated parameter bundle, used for deserialization
#[derive(Deserialize)]
struct MixtureParts {
    means: Array2<f64>,
    covariances: Array3<f64>,
    weights: Array1<f64>,
}

impl TryFrom<MixtureParts> for GaussianMixtureModel {
    type Error = GmmError;

    fn try_from(parts: MixtureParts) -> Result<Self> {
        Self::new(parts.means, parts.covariances, parts.weights)
    }
}

impl GaussianMixtureModel {
    /// Create a model from its parameters.
    ///
    /// # Errors
    /// - `DimensionMismatch` if K or D disagree across the three arrays
    /// - `InvalidArgument` if K or D is zero, a value is not finite, a weight
    ///   is negative, weights do not sum to 1, or a covariance is not symmetric
    ///
    /// Positive-definiteness is checked later by the expectation step.
    pub fn new(means: Array2<f64>, covariances: Array3<f64>, weights: Array1<f64>) -> Result<Self> {
        let (k, d) = means.dim();
        if k == 0 || d == 0 {
            return Err(GmmError::invalid("model needs at least one component and one feature"));
        }

        let (ck, cr, cc) = covariances.dim();
        if ck != k {
            return Err(GmmError::mismatch("number of covariances", k, ck));
        }
        if cr != d || cc != d {
            return Err(GmmError::mismatch("covariance size", d, if cr != d { cr } else { cc }));
        }
        if weights.len() != k {
            return Err(GmmError::mismatch("number of weights", k, weights.len()));
        }

        if means.iter().chain(covariances.iter()).chain(weights.iter()).any(|v| !v.is_finite()) {
            return Err(GmmError::invalid("model parameters must be finite"));
        }
        if weights.iter().any(|&w| w < 0.0) {
            return Err(GmmError::invalid("mixture weights must be non-negative"));
        }
        let total = weights.sum();
        if (total - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(GmmError::invalid(format!("mixture weights sum to {total}, expected 1")));
        }

        for (idx, cov) in covariances.outer_iter().enumerate() {
            let scale = cov.iter().fold(0.0_f64, |m, v| m.max(v.abs())).max(1.0);
            for i in 0..d {
                for j in (i + 1)..d {
                    if (cov[[i, j]] - cov[[j, i]]).abs() > 1e-8 * scale {
                        return Err(GmmError::invalid(format!(
                            "covariance of component {idx} is not symmetric"
                        )));
                    }
                }
            }
        }

        Ok(Self {
            means,
            covariances,
            weights,
        })
    }

    /// Zero-filled placeholder with the right shapes and uniform weights.
    ///
    /// Only valid as the target of a maximization step.
    pub(crate) fn placeholder(n_components: usize, n_features: usize) -> Self {
        Self {
            means: Array2::zeros((n_components, n_features)),
            covariances: Array3::zeros((n_components, n_features, n_features)),
            weights: Array1::from_elem(n_components, 1.0 / n_components as f64),
        }
    }

    /// Number of mixture components (K)
    pub fn n_components(&self) -> usize {
        self.weights.len()
    }

    /// Dimension of the feature space (D)
    pub fn n_features(&self) -> usize {
        self.means.ncols()
    }

    pub fn means(&self) -> &Array2<f64> {
        &self.means
    }

    pub fn covariances(&self) -> &Array3<f64> {
        &self.covariances
    }

    pub fn weights(&self) -> &Array1<f64> {
        &self.weights
    }

    /// Consume the model, returning `(means, covariances, weights)`
    pub fn into_parts(self) -> (Array2<f64>, Array3<f64>, Array1<f64>) {
        (self.means, self.covariances, self.weights)
    }

    /// Gaussian of component `k`.
    ///
    /// # Errors
    /// `InvalidArgument` if `k` is out of range, `SingularCovariance` tagged
    /// with `k` if its covariance is not positive-definite.
    pub fn component(&self, k: usize) -> Result<MultivariateGaussian> {
        if k >= self.n_components() {
            return Err(GmmError::invalid(format!(
                "component {k} out of range for {} components",
                self.n_components()
            )));
        }
        MultivariateGaussian::new(
            self.means.row(k).to_owned(),
            self.covariances.slice(s![k, .., ..]).to_owned(),
        )
        .map_err(|e| e.for_component(k))
    }

    /// Replace every parameter at once. Shapes are the caller's invariant.
    pub(crate) fn set_parameters(
        &mut self,
        means: Array2<f64>,
        covariances: Array3<f64>,
        weights: Array1<f64>,
    ) {
        debug_assert_eq!(means.dim(), self.means.dim());
        debug_assert_eq!(covariances.dim(), self.covariances.dim());
        debug_assert_eq!(weights.len(), self.weights.len());
        self.means = means;
        self.covariances = covariances;
        self.weights = weights;
    }

    /// Draw `n` samples, returning the data (N×D) and the generating component of each row.
    ///
    /// # Errors
    /// `SingularCovariance` if a component cannot be factorized.
    pub fn sample<R: Rng>(&self, n: usize, rng: &mut R) -> Result<(Array2<f64>, Vec<usize>)> {
        let components = (0..self.n_components())
            .map(|k| self.component(k))
            .collect::<Result<Vec<_>>>()?;

        let cumulative: Vec<f64> = self
            .weights
            .iter()
            .scan(0.0, |acc, &w| {
                *acc += w;
                Some(*acc)
            })
            .collect();

        let mut data = Array2::zeros((n, self.n_features()));
        let mut labels = Vec::with_capacity(n);
        for mut row in data.axis_iter_mut(Axis(0)) {
            let u: f64 = rng.gen::<f64>() * cumulative.last().copied().unwrap_or(1.0);
            let k = cumulative
                .iter()
                .position(|&c| u < c)
                .unwrap_or(self.n_components() - 1);
            row.assign(&components[k].sample(rng));
            labels.push(k);
        }

        Ok((data, labels))
    }
}
