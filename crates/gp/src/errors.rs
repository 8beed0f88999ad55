use thiserror::Error;

/// A result type for Gaussian process computations
pub type Result<T> = std::result::Result<T, GpError>;

/// An error when building or querying a [`GaussianProcess`](crate::GaussianProcess)
#[derive(Error, Debug)]
pub enum GpError {
    /// When linear algebra computation fails
    #[error(transparent)]
    LinalgError(#[from] linfa_linalg::LinalgError),
    /// When the regularized kernel matrix cannot be factorized
    #[error("Kernel matrix factorization error: {0}")]
    FactorizationError(String),
    /// When a gradient is requested from a covariance which is not translation invariant
    #[error("Covariance {0} is not translation invariant")]
    NotTranslationInvariant(String),
    /// When likelihood computation fails
    #[error("Likelihood computation error: {0}")]
    LikelihoodComputationError(String),
    /// When dimensions of inputs do not match
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// expected dimension
        expected: usize,
        /// given dimension
        actual: usize,
    },
    /// When error dur to a bad value
    #[error("InvalidValue error: {0}")]
    InvalidValueError(String),
}
