//! Error types shared across the crate.
//!
//! Everything here is a local, recoverable-by-caller condition: propagation
//! through the stack, operator construction and the inverse solver all return
//! [`TraceResult`] rather than panicking. Retry policies (random restarts of
//! the fit and so on) belong to the caller.

use std::{error::Error, fmt::Display};

/// Crate-wide result type.
pub type TraceResult<T> = std::result::Result<T, TraceError>;

/// Errors that can be returned while tracing or fitting a mirror stack.
#[derive(Debug, Clone, PartialEq)]
pub enum TraceError {
    /// Exact-mode refraction where `(n1/n2)*sin(incident - wedge)` exceeds
    /// unit magnitude. Carries the offending sine argument.
    TotalInternalReflection(f64),
    /// Propagation was requested on a stack with no mirrors.
    EmptyStack,
    /// A refractive index was zero or negative.
    RefractiveIndex(f64),
    /// An input vector did not match the shape the stack produces.
    ShapeMismatch { expected: usize, found: usize },
    /// The minimizer terminated without meeting its convergence criteria.
    /// Carries the best-effort parameter vector and its residual norm.
    NonConvergence { params: Vec<f64>, residual: f64, iterations: usize },
}

impl Display for TraceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TraceError::TotalInternalReflection(s) => {
                write!(f, "total internal reflection: |sin| argument {} exceeds 1", s)
            }
            TraceError::EmptyStack => {
                write!(f, "stack contains no mirrors")
            }
            TraceError::RefractiveIndex(n) => {
                write!(f, "refractive index must be strictly positive, got {}", n)
            }
            TraceError::ShapeMismatch { expected, found } => {
                write!(f, "shape mismatch: expected {} values, found {}", expected, found)
            }
            TraceError::NonConvergence { residual, iterations, .. } => {
                write!(
                    f,
                    "optimizer did not converge after {} iterations (residual {})",
                    iterations, residual
                )
            }
        }
    }
}

impl Error for TraceError {}
