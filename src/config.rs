//! Fit configuration

use crate::error::{GmmError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What the maximization step does with a component whose responsibility
/// mass falls below [`FitConfig::min_component_mass`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub enum EmptyComponentPolicy {
    /// Stop with `EmptyComponent`
    #[default]
    Fail,
    /// Move the component onto a randomly chosen data point with an isotropic
    /// covariance of `variance_scale × mean feature variance` and weight `1/N`
    Reseed { variance_scale: f64 },
}

impl EmptyComponentPolicy {
    /// Reseed with a covariance at 1% of the mean feature variance
    pub fn reseed() -> Self {
        EmptyComponentPolicy::Reseed { variance_scale: 0.01 }
    }
}

/// EM fit configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitConfig {
    /// Number of mixture components (K)
    pub n_components: usize,
    /// Dirichlet concentration for the initial soft assignments
    pub alpha: f64,
    /// Maximum number of EM iterations
    pub max_iterations: usize,
    /// Relative log-likelihood change below which the fit has converged
    pub tolerance: f64,
    /// Absolute log-likelihood change below which the fit has converged
    pub absolute_tolerance: f64,
    /// Allowed log-likelihood drop (relative) before the run is failed
    pub monotonic_slack: f64,
    /// Random seed for reproducibility
    pub random_seed: Option<u64>,
    /// Handling of collapsed components
    pub empty_component_policy: EmptyComponentPolicy,
    /// Responsibility mass below which a component counts as empty
    pub min_component_mass: f64,
    /// Evaluate components on the rayon pool
    pub parallel: bool,
    /// Wall-clock budget, checked between iterations
    pub timeout: Option<Duration>,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            n_components: 1,
            alpha: 1.0,
            max_iterations: 100,
            tolerance: 1e-6,
            absolute_tolerance: 1e-10,
            monotonic_slack: 1e-9,
            random_seed: None,
            empty_component_policy: EmptyComponentPolicy::Fail,
            min_component_mass: 1e-8,
            parallel: true,
            timeout: None,
        }
    }
}

impl FitConfig {
    /// Create a new configuration with specified number of components
    pub fn new(n_components: usize) -> Self {
        Self {
            n_components,
            ..Default::default()
        }
    }

    /// Set Dirichlet concentration
    pub fn alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// Set maximum number of iterations
    pub fn max_iterations(mut self, n: usize) -> Self {
        self.max_iterations = n;
        self
    }

    /// Set relative convergence tolerance
    pub fn tolerance(mut self, tol: f64) -> Self {
        self.tolerance = tol;
        self
    }

    /// Set absolute convergence tolerance
    pub fn absolute_tolerance(mut self, tol: f64) -> Self {
        self.absolute_tolerance = tol;
        self
    }

    /// Set tolerated log-likelihood decrease, relative to `max(1, |ll|)`
    pub fn monotonic_slack(mut self, slack: f64) -> Self {
        self.monotonic_slack = slack;
        self
    }

    /// Set random seed
    pub fn random_seed(mut self, seed: u64) -> Self {
        self.random_seed = Some(seed);
        self
    }

    pub fn empty_component_policy(mut self, policy: EmptyComponentPolicy) -> Self {
        self.empty_component_policy = policy;
        self
    }

    pub fn min_component_mass(mut self, mass: f64) -> Self {
        self.min_component_mass = mass;
        self
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Check every field is in range.
    ///
    /// # Errors
    /// `InvalidArgument` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.n_components == 0 {
            return Err(GmmError::invalid("n_components must be at least 1"));
        }
        if !(self.alpha.is_finite() && self.alpha > 0.0) {
            return Err(GmmError::invalid(format!("alpha must be positive, got {}", self.alpha)));
        }
        if self.max_iterations == 0 {
            return Err(GmmError::invalid("max_iterations must be at least 1"));
        }
        for (name, value) in [
            ("tolerance", self.tolerance),
            ("absolute_tolerance", self.absolute_tolerance),
            ("monotonic_slack", self.monotonic_slack),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(GmmError::invalid(format!("{name} must be non-negative, got {value}")));
            }
        }
        if !(self.min_component_mass.is_finite() && self.min_component_mass > 0.0) {
            return Err(GmmError::invalid(format!(
                "min_component_mass must be positive, got {}",
                self.min_component_mass
            )));
        }
        if let EmptyComponentPolicy::Reseed { variance_scale } = self.empty_component_policy {
            if !(variance_scale.is_finite() && variance_scale > 0.0) {
                return Err(GmmError::invalid(format!(
                    "reseed variance_scale must be positive, got {variance_scale}"
                )));
            }
        }
        Ok(())
    }
}
