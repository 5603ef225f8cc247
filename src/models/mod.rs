//! Mixture model types
//!
//! Provides the parameter bundle of a Gaussian mixture, its per-component
//! multivariate normal densities, and the responsibility matrix exchanged
//! between the EM steps.

mod gaussian;
mod mixture;
mod responsibilities;

pub use gaussian::{MultivariateGaussian, SINGULAR_TOLERANCE};
pub use mixture::{GaussianMixtureModel, WEIGHT_SUM_TOLERANCE};
pub use responsibilities::{Responsibilities, ROW_SUM_TOLERANCE};
