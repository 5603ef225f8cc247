//! Maximization step: re-estimate mixture parameters from responsibilities

use crate::config::{EmptyComponentPolicy, FitConfig};
use crate::error::{GmmError, Result};
use crate::models::{GaussianMixtureModel, Responsibilities};
use crate::utils::mean_feature_variance;
use ndarray::{s, Array1, Array2, Array3, ArrayView1, ArrayView2, Axis};
use rand::{Rng, RngCore};
use rayon::prelude::*;

/// Configurable maximization step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaximizationStep {
    /// Handling of collapsed components
    pub policy: EmptyComponentPolicy,
    /// Mass below which a component counts as empty
    pub min_component_mass: f64,
    /// Estimate covariances one component per rayon task
    pub parallel: bool,
}

impl Default for MaximizationStep {
    fn default() -> Self {
        Self {
            policy: EmptyComponentPolicy::Fail,
            min_component_mass: 1e-8,
            parallel: true,
        }
    }
}

impl From<&FitConfig> for MaximizationStep {
    fn from(config: &FitConfig) -> Self {
        Self {
            policy: config.empty_component_policy,
            min_component_mass: config.min_component_mass,
            parallel: config.parallel,
        }
    }
}

/// Mean and covariance of one component
type ComponentEstimate = (Array1<f64>, Array2<f64>);

impl MaximizationStep {
    /// Re-estimate `model` in place.
    ///
    /// `rng` is consumed only when a component is reseeded. Returns the
    /// indices of reseeded components, in ascending order.
    ///
    /// # Errors
    /// See [`maximize`]. The model is left unchanged on error.
    pub fn run<R: Rng>(
        &self,
        model: &mut GaussianMixtureModel,
        responsibilities: &Responsibilities,
        data: ArrayView2<'_, f64>,
        rng: &mut R,
    ) -> Result<Vec<usize>> {
        self.update(model, responsibilities, data, Some(rng as &mut dyn RngCore))
    }

    fn update(
        &self,
        model: &mut GaussianMixtureModel,
        responsibilities: &Responsibilities,
        data: ArrayView2<'_, f64>,
        mut rng: Option<&mut dyn RngCore>,
    ) -> Result<Vec<usize>> {
        let n = data.nrows();
        let k = model.n_components();
        let d = model.n_features();

        if responsibilities.n_samples() != n {
            return Err(GmmError::mismatch("responsibility rows", n, responsibilities.n_samples()));
        }
        if responsibilities.n_components() != k {
            return Err(GmmError::mismatch(
                "responsibility columns",
                k,
                responsibilities.n_components(),
            ));
        }
        if data.ncols() != d {
            return Err(GmmError::mismatch("data columns", d, data.ncols()));
        }
        if n == 0 {
            return Err(GmmError::invalid("maximization needs at least one sample"));
        }

        let resp = responsibilities.view();
        let mut mass = responsibilities.component_mass();
        // k × d
        let weighted_sums = resp.t().dot(&data);

        let estimate = |j: usize| -> Option<ComponentEstimate> {
            if mass[j] < self.min_component_mass {
                return None;
            }
            Some(estimate_component(data, resp.column(j), weighted_sums.row(j), mass[j]))
        };

        let estimates: Vec<Option<ComponentEstimate>> = if self.parallel {
            (0..k).into_par_iter().map(estimate).collect()
        } else {
            (0..k).map(estimate).collect()
        };

        let mut means = Array2::<f64>::zeros((k, d));
        let mut covariances = Array3::<f64>::zeros((k, d, d));
        let mut reseeded = Vec::new();

        for (j, estimate) in estimates.into_iter().enumerate() {
            let (mean, covariance) = match (estimate, self.policy, rng.as_deref_mut()) {
                (Some(found), _, _) => found,
                (None, EmptyComponentPolicy::Reseed { variance_scale }, Some(rng)) => {
                    let idx = rng.gen_range(0..n);
                    let variance = (variance_scale * mean_feature_variance(data)).max(f64::EPSILON);
                    tracing::warn!(
                        "Component {} collapsed (mass {:.3e}), reseeding at sample {}",
                        j,
                        mass[j],
                        idx
                    );
                    mass[j] = 1.0;
                    reseeded.push(j);
                    (data.row(idx).to_owned(), Array2::eye(d) * variance)
                }
                (None, _, _) => {
                    return Err(GmmError::EmptyComponent {
                        component: j,
                        mass: mass[j],
                    })
                }
            };
            means.row_mut(j).assign(&mean);
            covariances.slice_mut(s![j, .., ..]).assign(&covariance);
        }

        // Σ S_k = N for normalized rows, so this is S_k / N up to rounding
        let weights = &mass / mass.sum();

        model.set_parameters(means, covariances, weights);
        Ok(reseeded)
    }
}

/// Weighted mean and covariance of one component.
///
/// `μ = Σ r_n x_n / S`, `Σ = Σ r_n (x_n − μ)(x_n − μ)ᵀ / S`, symmetrized.
fn estimate_component(
    data: ArrayView2<'_, f64>,
    resp: ArrayView1<'_, f64>,
    weighted_sum: ArrayView1<'_, f64>,
    mass: f64,
) -> ComponentEstimate {
    let mean = &weighted_sum / mass;

    // n × d
    let centered = &data - &mean.view().insert_axis(Axis(0));
    let weighted = &centered * &resp.insert_axis(Axis(1));

    let mut covariance = centered.t().dot(&weighted) / mass;
    let transposed = covariance.t().to_owned();
    covariance += &transposed;
    covariance /= 2.0;

    (mean, covariance)
}

/// Maximization step in the EM algorithm.
///
/// Re-estimates means, covariances and weights of `model` from
/// `responsibilities` (N × K) and `data` (N × D), failing on empty components.
///
/// # Errors
/// - `DimensionMismatch` if responsibility rows differ from data rows, or the
///   responsibility columns / data columns differ from the model's K / D
/// - `EmptyComponent` if a component's responsibility mass is below `1e-8`
pub fn maximize(
    model: &mut GaussianMixtureModel,
    responsibilities: &Responsibilities,
    data: ArrayView2<'_, f64>,
) -> Result<()> {
    MaximizationStep::default()
        .update(model, responsibilities, data, None)
        .map(|_| ())
}
