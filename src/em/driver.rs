//! Fit driver: alternate maximization and expectation until convergence

use super::expectation::expectation;
use super::initialization::{initialize_with_rng, make_rng, validate_data};
use super::maximization::MaximizationStep;
use crate::config::FitConfig;
use crate::error::{GmmError, Result};
use crate::models::{GaussianMixtureModel, Responsibilities};
use ndarray::ArrayView2;
use rand::rngs::StdRng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Why a fit stopped successfully
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Log-likelihood change fell below tolerance
    Tolerance,
    /// Iteration budget exhausted
    MaxIterations,
    /// Cancellation flag was raised
    Cancelled,
    /// Wall-clock budget exhausted
    TimedOut,
}

/// Driver state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitState {
    Initializing,
    /// `iteration` EM iterations have completed
    Iterating { iteration: usize },
    Converged(StopReason),
    Failed,
}

impl FitState {
    /// Whether further `step` calls do nothing
    pub fn is_terminal(&self) -> bool {
        matches!(self, FitState::Converged(_) | FitState::Failed)
    }
}

/// Outcome of a successful fit
#[derive(Debug, Clone)]
pub struct FitResult {
    /// Final model
    pub model: GaussianMixtureModel,
    /// Responsibilities of the training data under the final model
    pub responsibilities: Responsibilities,
    /// Log-likelihood of the training data under the final model
    pub log_likelihood: f64,
    /// Number of completed EM iterations
    pub iterations: usize,
    /// Log-likelihood after initialization and after every iteration
    pub trajectory: Vec<f64>,
    pub stop_reason: StopReason,
}

impl FitResult {
    /// True only if the tolerance criterion was met
    pub fn converged(&self) -> bool {
        self.stop_reason == StopReason::Tolerance
    }

    /// Most probable component for every training sample
    pub fn labels(&self) -> Vec<usize> {
        self.responsibilities.hard_assignments()
    }
}

/// EM run as an explicit state machine.
///
/// `Initializing → Iterating → Converged`, with any step able to move to
/// `Failed`. Each [`step`](EmFit::step) call performs one transition. The
/// model is owned by the driver until [`finish`](EmFit::finish).
pub struct EmFit<'a> {
    data: ArrayView2<'a, f64>,
    config: FitConfig,
    step: MaximizationStep,
    rng: StdRng,
    state: FitState,
    model: Option<GaussianMixtureModel>,
    responsibilities: Option<Responsibilities>,
    trajectory: Vec<f64>,
    cancel: Option<Arc<AtomicBool>>,
    started: Instant,
}

impl<'a> EmFit<'a> {
    /// Prepare a fit.
    ///
    /// # Errors
    /// `InvalidArgument` for an invalid config or empty / non-finite data.
    pub fn new(data: ArrayView2<'a, f64>, config: FitConfig) -> Result<Self> {
        config.validate()?;
        validate_data(data)?;
        if config.n_components > data.nrows() {
            return Err(GmmError::invalid(format!(
                "n_components ({}) exceeds number of samples ({})",
                config.n_components,
                data.nrows()
            )));
        }

        Ok(Self {
            data,
            step: MaximizationStep::from(&config),
            rng: make_rng(config.random_seed),
            config,
            state: FitState::Initializing,
            model: None,
            responsibilities: None,
            trajectory: Vec::new(),
            cancel: None,
            started: Instant::now(),
        })
    }

    /// Stop at the next iteration boundary once `flag` is set
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn state(&self) -> FitState {
        self.state
    }

    /// Current model, once initialized
    pub fn model(&self) -> Option<&GaussianMixtureModel> {
        self.model.as_ref()
    }

    pub fn trajectory(&self) -> &[f64] {
        &self.trajectory
    }

    /// Perform one state transition and return the new state.
    ///
    /// # Errors
    /// Numerical failures, wrapped with the iteration they occurred at. The
    /// driver is `Failed` afterwards.
    pub fn step(&mut self) -> Result<FitState> {
        let outcome = match self.state {
            FitState::Initializing => self.initialize(),
            FitState::Iterating { iteration } => self.iterate(iteration),
            terminal => Ok(terminal),
        };

        match outcome {
            Ok(state) => {
                self.state = state;
                Ok(state)
            }
            Err(err) => {
                self.state = FitState::Failed;
                tracing::warn!("EM failed: {}", err);
                Err(err)
            }
        }
    }

    /// Step until a terminal state and return the result
    pub fn run(mut self) -> Result<FitResult> {
        while !self.step()?.is_terminal() {}
        self.finish()
    }

    /// Hand over the fitted model.
    ///
    /// # Errors
    /// `InvalidArgument` if the driver has not converged.
    pub fn finish(self) -> Result<FitResult> {
        let stop_reason = match self.state {
            FitState::Converged(reason) => reason,
            other => {
                return Err(GmmError::invalid(format!(
                    "fit has not converged (state {other:?})"
                )))
            }
        };

        match (self.model, self.responsibilities) {
            (Some(model), Some(responsibilities)) => Ok(FitResult {
                model,
                responsibilities,
                log_likelihood: self.trajectory.last().copied().unwrap_or(f64::NEG_INFINITY),
                iterations: self.trajectory.len().saturating_sub(1),
                trajectory: self.trajectory,
                stop_reason,
            }),
            _ => Err(GmmError::invalid("fit finished without a model")),
        }
    }

    fn initialize(&mut self) -> Result<FitState> {
        self.started = Instant::now();

        let model = initialize_with_rng(
            self.data,
            self.config.n_components,
            self.config.alpha,
            &self.step,
            &mut self.rng,
        )
        .map_err(|e| e.at_iteration(0))?;

        let e = expectation(&model, self.data, self.config.parallel).map_err(|e| e.at_iteration(0))?;
        let ll = e.log_likelihood();
        tracing::debug!("Initial log-likelihood = {:.6}", ll);

        self.trajectory.push(ll);
        self.model = Some(model);
        self.responsibilities = Some(e.responsibilities);
        Ok(FitState::Iterating { iteration: 0 })
    }

    fn iterate(&mut self, completed: usize) -> Result<FitState> {
        if let Some(reason) = self.interruption() {
            tracing::info!("EM stopped after {} iterations: {:?}", completed, reason);
            return Ok(FitState::Converged(reason));
        }

        let iteration = completed + 1;
        let (model, responsibilities) = match (self.model.as_mut(), self.responsibilities.as_ref()) {
            (Some(model), Some(responsibilities)) => (model, responsibilities),
            _ => return Err(GmmError::invalid("iterating without an initialized model")),
        };

        let reseeded = self
            .step
            .run(model, responsibilities, self.data, &mut self.rng)
            .map_err(|e| e.at_iteration(iteration))?;

        let e = expectation(model, self.data, self.config.parallel)
            .map_err(|e| e.at_iteration(iteration))?;
        let ll = e.log_likelihood();
        let previous = self.trajectory.last().copied().unwrap_or(f64::NEG_INFINITY);
        self.trajectory.push(ll);
        self.responsibilities = Some(e.responsibilities);

        let change = ll - previous;
        tracing::debug!(
            "Iteration {}: log-likelihood = {:.6} (change {:.3e})",
            iteration,
            ll,
            change
        );

        // No monotonicity bound on iterations that reseeded
        let slack = self.config.monotonic_slack * previous.abs().max(1.0);
        if reseeded.is_empty() && change < -slack {
            return Err(GmmError::LikelihoodDecreased {
                previous,
                current: ll,
            }
            .at_iteration(iteration));
        }

        if change.abs() <= self.config.absolute_tolerance
            || change.abs() <= self.config.tolerance * previous.abs()
        {
            tracing::info!(
                "Converged after {} iterations, log-likelihood = {:.6}",
                iteration,
                ll
            );
            return Ok(FitState::Converged(StopReason::Tolerance));
        }

        if iteration >= self.config.max_iterations {
            tracing::info!(
                "Reached {} iterations without converging, log-likelihood = {:.6}",
                iteration,
                ll
            );
            return Ok(FitState::Converged(StopReason::MaxIterations));
        }

        Ok(FitState::Iterating { iteration })
    }

    fn interruption(&self) -> Option<StopReason> {
        if self
            .cancel
            .as_ref()
            .map_or(false, |flag| flag.load(Ordering::Relaxed))
        {
            return Some(StopReason::Cancelled);
        }
        match self.config.timeout {
            Some(budget) if self.started.elapsed() >= budget => Some(StopReason::TimedOut),
            _ => None,
        }
    }
}

/// Fit a Gaussian mixture to `data` with EM.
///
/// # Errors
/// `InvalidArgument` for bad configuration or data, otherwise the first
/// numerical failure wrapped in [`GmmError::AtIteration`].
pub fn fit(data: ArrayView2<'_, f64>, config: &FitConfig) -> Result<FitResult> {
    EmFit::new(data, config.clone())?.run()
}
