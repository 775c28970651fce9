//! Crate-wide error type.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while building or running a simulation.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid configuration, rejected before any simulation step runs.
    #[error("configuration error: {0}")]
    Config(String),

    /// An array does not have the shape implied by the configuration.
    #[error("shape mismatch for {what}: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        what: &'static str,
        expected: (usize, usize),
        got: (usize, usize),
    },

    /// The state became non-finite or its trace drifted beyond tolerance.
    #[error("numerical instability at step {step}: {reason}")]
    NumericalInstability { step: usize, reason: String },

    /// A constructed Kraus set failed the completeness check under strict
    /// checking.
    #[error("Kraus completeness violated: deviation {deviation:.3e} > tolerance {tol:.3e}")]
    Completeness { deviation: f64, tol: f64 },

    /// A LAPACK-backed routine failed.
    #[error("linear algebra failure: {0}")]
    Linalg(#[from] ndarray_linalg::error::LinalgError),

    /// Malformed TOML configuration.
    #[error("could not parse configuration: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Shorthand for [`Error::Config`].
    pub fn config<S: Into<String>>(msg: S) -> Self { Self::Config(msg.into()) }

    /// Return `true` if this error is a [`Error::NumericalInstability`].
    pub fn is_instability(&self) -> bool {
        matches!(self, Self::NumericalInstability { .. })
    }
}
