//! Wedge angle representations.
//!
//! Every surface in the stack carries a wedge: either a scalar tilt angle
//! (one-dimensional treatment) or a 2-D tilt direction vector, where each
//! component is the tilt about one transverse axis. The propagation algebra
//! is identical in both cases and applies component-wise, so the rest of the
//! crate is generic over [`Wedge`] rather than dispatching on the shape of
//! its inputs. The two forms are never coerced into each other; clocking is
//! only defined for the vector form.

use std::fmt::Debug;
use std::ops::{Add, Neg, Sub};

use nalgebra::Vector2;

use crate::error::TraceResult;

/// A wedge angle: scalar tilt or 2-D tilt direction.
///
/// All angles are in radians, measured against the optical axis. The
/// component accessors exist so that the closed-form operator and the
/// inverse solver can pack wedges into flat coefficient vectors and back.
pub trait Wedge:
    Copy
    + Debug
    + PartialEq
    + Send
    + Sync
    + Add<Output = Self>
    + Sub<Output = Self>
    + Neg<Output = Self>
{
    /// Degrees of freedom per wedge: 1 for a scalar tilt, 2 for a direction.
    const DOF: usize;

    /// The flat (zero-tilt) wedge.
    fn zero() -> Self;

    /// Multiplies every component by `factor`.
    fn scale(self, factor: f64) -> Self;

    /// Returns the component along the given transverse axis.
    fn component(self, axis: usize) -> f64;

    /// Rebuilds a wedge from `DOF` components.
    fn from_components(components: &[f64]) -> Self;

    /// Applies a fallible scalar function to every component.
    /// The exact-mode Snell transform routes its domain check through here.
    fn try_map(self, f: impl Fn(f64) -> TraceResult<f64>) -> TraceResult<Self>;

    /// Euclidean norm over the components.
    fn norm(self) -> f64;
}

impl Wedge for f64 {
    const DOF: usize = 1;

    fn zero() -> Self {
        0.0
    }

    fn scale(self, factor: f64) -> Self {
        self * factor
    }

    fn component(self, _axis: usize) -> f64 {
        self
    }

    fn from_components(components: &[f64]) -> Self {
        components[0]
    }

    fn try_map(self, f: impl Fn(f64) -> TraceResult<f64>) -> TraceResult<Self> {
        f(self)
    }

    fn norm(self) -> f64 {
        self.abs()
    }
}

impl Wedge for Vector2<f64> {
    const DOF: usize = 2;

    fn zero() -> Self {
        Vector2::zeros()
    }

    fn scale(self, factor: f64) -> Self {
        self * factor
    }

    fn component(self, axis: usize) -> f64 {
        self[axis]
    }

    fn from_components(components: &[f64]) -> Self {
        Vector2::new(components[0], components[1])
    }

    fn try_map(self, f: impl Fn(f64) -> TraceResult<f64>) -> TraceResult<Self> {
        Ok(Vector2::new(f(self.x)?, f(self.y)?))
    }

    fn norm(self) -> f64 {
        nalgebra::Vector2::norm(&self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TraceError;

    #[test]
    fn scalar_components_roundtrip() {
        let w = 0.0125_f64;
        assert_eq!(f64::from_components(&[w.component(0)]), w);
    }

    #[test]
    fn vector_components_roundtrip() {
        let w = Vector2::new(0.01, -0.02);
        let c = [w.component(0), w.component(1)];
        assert_eq!(Vector2::from_components(&c), w);
    }

    #[test]
    fn try_map_propagates_errors() {
        let w = Vector2::new(0.5, 2.0);
        let result = w.try_map(|x| {
            if x > 1.0 {
                Err(TraceError::TotalInternalReflection(x))
            } else {
                Ok(x)
            }
        });
        assert_eq!(result, Err(TraceError::TotalInternalReflection(2.0)));
    }
}
