//! Soft cluster assignments produced by the expectation step

use crate::error::{GmmError, Result};
use crate::utils::argmax;
use ndarray::{Array1, Array2, ArrayView2, Axis};

/// Tolerance on each row summing to 1
pub const ROW_SUM_TOLERANCE: f64 = 1e-6;

/// N × K matrix of posterior component probabilities (one categorical
/// distribution per sample)
#[derive(Debug, Clone, PartialEq)]
pub struct Responsibilities(Array2<f64>);

impl Responsibilities {
    /// Wrap a matrix after checking every row is a categorical distribution.
    ///
    /// # Errors
    /// `InvalidArgument` if the matrix has no columns, holds a negative or
    /// non-finite entry, or a row does not sum to 1 within [`ROW_SUM_TOLERANCE`].
    pub fn new(matrix: Array2<f64>) -> Result<Self> {
        if matrix.ncols() == 0 {
            return Err(GmmError::invalid("responsibilities need at least one component"));
        }

        for (n, row) in matrix.outer_iter().enumerate() {
            if row.iter().any(|&r| !r.is_finite() || r < 0.0) {
                return Err(GmmError::invalid(format!(
                    "responsibility row {n} has a negative or non-finite entry"
                )));
            }
            let sum = row.sum();
            if (sum - 1.0).abs() > ROW_SUM_TOLERANCE {
                return Err(GmmError::invalid(format!(
                    "responsibility row {n} sums to {sum}, expected 1"
                )));
            }
        }

        Ok(Self(matrix))
    }

    /// Hard assignments as a one-hot matrix.
    ///
    /// # Errors
    /// `InvalidArgument` if `n_components` is zero or a label is out of range.
    pub fn one_hot(labels: &[usize], n_components: usize) -> Result<Self> {
        if n_components == 0 {
            return Err(GmmError::invalid("responsibilities need at least one component"));
        }

        let mut matrix = Array2::zeros((labels.len(), n_components));
        for (n, &label) in labels.iter().enumerate() {
            if label >= n_components {
                return Err(GmmError::invalid(format!(
                    "label {label} at row {n} out of range for {n_components} components"
                )));
            }
            matrix[[n, label]] = 1.0;
        }

        Ok(Self(matrix))
    }

    /// Matrix already known to be valid (built by the E-step or initializer)
    pub(crate) fn from_normalized(matrix: Array2<f64>) -> Self {
        Self(matrix)
    }

    pub fn view(&self) -> ArrayView2<'_, f64> {
        self.0.view()
    }

    /// Number of samples (N)
    pub fn n_samples(&self) -> usize {
        self.0.nrows()
    }

    /// Number of components (K)
    pub fn n_components(&self) -> usize {
        self.0.ncols()
    }

    /// Effective sample count per component, `S_k = Σ_n r_nk`
    pub fn component_mass(&self) -> Array1<f64> {
        self.0.sum_axis(Axis(0))
    }

    /// Most probable component per sample (lowest index on ties)
    pub fn hard_assignments(&self) -> Vec<usize> {
        self.0
            .outer_iter()
            .map(|row| argmax(row).unwrap_or(0))
            .collect()
    }

    pub fn into_inner(self) -> Array2<f64> {
        self.0
    }
}
