//! Error types for mixture fitting
//!
//! Every fallible operation in the crate returns [`GmmError`]. Errors raised
//! inside the fit loop are wrapped in [`GmmError::AtIteration`] so the caller
//! can tell where the run stopped.

use thiserror::Error;

/// Errors that can occur while initializing or fitting a mixture
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GmmError {
    /// A caller-supplied argument is out of range or malformed
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Two shapes that must agree do not
    #[error("Dimension mismatch in {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Which quantity was compared
        what: &'static str,
        /// Expected size
        expected: usize,
        /// Actual size
        actual: usize,
    },

    /// A component covariance is not invertible
    #[error("Covariance of component {component} is singular (pivot {pivot:e})")]
    SingularCovariance {
        /// Component index
        component: usize,
        /// Offending Cholesky pivot
        pivot: f64,
    },

    /// A component received (almost) no responsibility mass
    #[error("Component {component} collapsed: responsibility mass {mass:e}")]
    EmptyComponent {
        /// Component index
        component: usize,
        /// Sum of the component's responsibilities
        mass: f64,
    },

    /// The data log-likelihood went down between two iterations
    #[error("Log-likelihood decreased from {previous} to {current}")]
    LikelihoodDecreased {
        /// Log-likelihood of the previous iteration
        previous: f64,
        /// Log-likelihood of the current iteration
        current: f64,
    },

    /// An error raised by the fit driver at a given iteration
    #[error("EM failed at iteration {iteration}: {source}")]
    AtIteration {
        /// Iteration at which the error occurred (0 = initialization)
        iteration: usize,
        /// Underlying error
        #[source]
        source: Box<GmmError>,
    },
}

/// Result type for mixture operations
pub type Result<T> = std::result::Result<T, GmmError>;

/// Coarse classification of a [`GmmError`], ignoring driver context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidArgument,
    DimensionMismatch,
    SingularCovariance,
    EmptyComponent,
    LikelihoodDecreased,
}

impl GmmError {
    /// Create an invalid argument error
    pub fn invalid(reason: impl Into<String>) -> Self {
        GmmError::InvalidArgument(reason.into())
    }

    /// Create a dimension mismatch error
    pub fn mismatch(what: &'static str, expected: usize, actual: usize) -> Self {
        GmmError::DimensionMismatch {
            what,
            expected,
            actual,
        }
    }

    /// Attach the iteration at which the driver hit this error
    pub fn at_iteration(self, iteration: usize) -> Self {
        match self {
            already @ GmmError::AtIteration { .. } => already,
            other => GmmError::AtIteration {
                iteration,
                source: Box::new(other),
            },
        }
    }

    /// Re-label a singular covariance error with the component it came from
    pub(crate) fn for_component(self, component: usize) -> Self {
        match self {
            GmmError::SingularCovariance { pivot, .. } => {
                GmmError::SingularCovariance { component, pivot }
            }
            other => other,
        }
    }

    /// The error without driver context
    pub fn root(&self) -> &GmmError {
        match self {
            GmmError::AtIteration { source, .. } => source.root(),
            other => other,
        }
    }

    /// Iteration at which the fit failed, if raised by the driver
    pub fn iteration(&self) -> Option<usize> {
        match self {
            GmmError::AtIteration { iteration, .. } => Some(*iteration),
            _ => None,
        }
    }

    /// Component index involved in the failure, if any
    pub fn component(&self) -> Option<usize> {
        match self.root() {
            GmmError::SingularCovariance { component, .. }
            | GmmError::EmptyComponent { component, .. } => Some(*component),
            _ => None,
        }
    }

    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self.root() {
            GmmError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            GmmError::DimensionMismatch { .. } => ErrorKind::DimensionMismatch,
            GmmError::SingularCovariance { .. } => ErrorKind::SingularCovariance,
            GmmError::EmptyComponent { .. } => ErrorKind::EmptyComponent,
            GmmError::LikelihoodDecreased { .. } => ErrorKind::LikelihoodDecreased,
            GmmError::AtIteration { source, .. } => source.kind(),
        }
    }

    /// Check if this error signals a degenerate fit rather than bad input.
    ///
    /// Numerical failures may go away with a different seed.
    pub fn is_numerical(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::SingularCovariance | ErrorKind::EmptyComponent | ErrorKind::LikelihoodDecreased
        )
    }
}
