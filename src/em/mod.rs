//! Expectation-maximization for Gaussian mixtures
//!
//! The initializer draws Dirichlet soft assignments and runs one
//! maximization step. The driver then alternates maximization and
//! expectation, tracking the data log-likelihood until it stops improving.

mod driver;
mod expectation;
mod initialization;
mod maximization;

pub use driver::{fit, EmFit, FitResult, FitState, StopReason};
pub use expectation::{
    expect, expect_with_log_likelihood, expectation, log_likelihood, predict, score_samples,
    Expectation,
};
pub use initialization::{dirichlet_responsibilities, initialize, initialize_with_rng};
pub use maximization::{maximize, MaximizationStep};
