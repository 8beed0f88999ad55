use thiserror::Error;

/// A result type for search engine errors
pub type Result<T> = std::result::Result<T, EgoError>;

/// An error for the acquisition search engine
#[derive(Error, Debug)]
pub enum EgoError {
    /// When gaussian process computation fails
    #[error("GP error")]
    GpError(#[from] bayesbox_gp::GpError),
    /// When an invalid value is encountered
    #[error("Value error: {0}")]
    InvalidValue(String),
    /// When a domain description is malformed
    #[error("Invalid domain: {0}")]
    InvalidDomain(String),
    /// When the feasible region of a constrained domain is empty or degenerate
    #[error("Infeasible domain: {0}")]
    InfeasibleDomain(String),
    /// When dimensions of collaborating objects do not match
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    /// When a closed form improvement turns non finite, the posterior
    /// covariance upstream is not positive semi-definite
    #[error("Non positive semi-definite covariance: {0}")]
    NonPsdCovariance(String),
    /// When a gradient is requested from a function without gradient
    #[error("Not differentiable: {0}")]
    NotDifferentiable(String),
    /// When point generation cannot satisfy the request
    #[error("Sampling error: {0}")]
    SamplingError(String),
    /// When a `linfa-linalg` error occurs
    #[error(transparent)]
    LinalgError(#[from] linfa_linalg::LinalgError),
}
