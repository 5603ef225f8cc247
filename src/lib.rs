//! Gaussian Mixtures in Rust
//!
//! Fits a Gaussian mixture model with full covariances to unlabeled data using
//! expectation-maximization.
//!
//! # Modules
//!
//! - `models`: Mixture parameters, component densities and responsibilities
//! - `em`: Initialization, expectation and maximization steps, fit driver
//! - `config`: Fit configuration
//! - `error`: Error types
//!
//! # Example
//!
//! ```no_run
//! use gaussian_mixtures::prelude::*;
//! # fn load_samples() -> ndarray::Array2<f64> { unimplemented!() }
//!
//! # fn main() -> gaussian_mixtures::Result<()> {
//! let data = load_samples();
//! let config = FitConfig::new(2).random_seed(42);
//! let result = fit(data.view(), &config)?;
//!
//! println!("log-likelihood: {}", result.log_likelihood);
//! println!("weights: {}", result.model.weights());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod em;
pub mod error;
pub mod models;
pub mod utils;

pub use config::{EmptyComponentPolicy, FitConfig};
pub use em::{expect, fit, initialize, maximize, EmFit, FitResult, FitState, StopReason};
pub use error::{ErrorKind, GmmError, Result};
pub use models::{GaussianMixtureModel, MultivariateGaussian, Responsibilities};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{EmptyComponentPolicy, FitConfig};
    pub use crate::em::{
        expect, expect_with_log_likelihood, fit, initialize, log_likelihood, maximize, predict,
        EmFit, FitResult, FitState, MaximizationStep, StopReason,
    };
    pub use crate::error::{ErrorKind, GmmError};
    pub use crate::models::{GaussianMixtureModel, MultivariateGaussian, Responsibilities};
}
