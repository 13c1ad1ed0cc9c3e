//! Closed-form reflection operator for the small-angle approximation.
//!
//! To first order every output reflection angle is a linear function of the
//! surface wedges, with coefficients that depend only on the refractive index
//! sequence. This module builds that linear map once per index sequence as a
//! dense lower-triangular-plus-diagonal matrix; applying it reproduces the
//! recursive propagation's approximate output at normal incidence without
//! re-deriving the recursion for every wedge configuration. The inverse
//! solver leans on this: the matrix is reused across all of its objective
//! evaluations for a fixed index sequence.

use nalgebra::{DMatrix, DVector};

use crate::error::{TraceError, TraceResult};
use crate::stack::Stack;
use crate::wedge::Wedge;

#[cfg(test)]
mod tests {

    use super::*;
    use nalgebra::Vector2;
    use rand::Rng;

    const TOL: f64 = 1e-9;

    fn random_stack(indices: &[f64]) -> Stack<f64> {
        let mut rng = rand::rng();
        let mut stack = Stack::new(1.0);
        for &n in indices {
            let front = rng.random_range(-0.02..0.02);
            let back = rng.random_range(-0.02..0.02);
            stack.add_mirror(front, back, n);
        }
        stack
    }

    #[test]
    fn matches_recursive_propagation() {
        let cases: [&[f64]; 3] = [
            &[1.5],
            &[1.5, 1.33],
            &[1.5, 1.33, 2.4, 1.7, 1.5],
        ];
        for indices in cases {
            let stack = random_stack(indices);
            let operator = ReflectionOperator::from_stack(&stack).unwrap();
            let wedges: Vec<f64> = stack
                .iter()
                .flat_map(|m| [m.front, m.back])
                .collect();
            let linear = operator.apply(&wedges).unwrap();
            let recursive = stack.reflection_angles(0.0, false).unwrap();
            assert_eq!(linear.len(), recursive.len());
            for (l, r) in linear.iter().zip(recursive.iter()) {
                assert!((l - r).abs() < TOL, "linear {} vs recursive {}", l, r);
            }
        }
    }

    #[test]
    fn matches_recursive_propagation_for_vector_wedges() {
        let mut stack = Stack::new(1.0);
        stack.add_mirror(Vector2::new(0.01, -0.005), Vector2::new(-0.02, 0.003), 1.5);
        stack.add_mirror(Vector2::new(0.004, 0.012), Vector2::new(0.007, -0.009), 1.33);

        let operator = ReflectionOperator::from_stack(&stack).unwrap();
        let wedges: Vec<Vector2<f64>> = stack.iter().flat_map(|m| [m.front, m.back]).collect();
        let linear = operator.apply(&wedges).unwrap();
        let recursive = stack.reflection_angles(Vector2::zeros(), false).unwrap();
        for (l, r) in linear.iter().zip(recursive.iter()) {
            assert!((l - r).norm() < TOL);
        }
    }

    #[test]
    fn single_mirror_matrix_entries() {
        let n = 1.5;
        let operator = ReflectionOperator::new(1.0, &[n]).unwrap();
        let m = operator.matrix();
        assert_eq!(m.nrows(), 2);
        assert!((m[(0, 0)] - 2.0).abs() < 1e-15);
        assert!((m[(0, 1)] - 0.0).abs() < 1e-15);
        assert!((m[(1, 0)] + 2.0 * (n - 1.0)).abs() < 1e-15);
        assert!((m[(1, 1)] - 2.0 * n).abs() < 1e-15);
    }

    #[test]
    fn rejects_bad_inputs() {
        assert_eq!(
            ReflectionOperator::new(1.0, &[]),
            Err(TraceError::EmptyStack)
        );
        assert_eq!(
            ReflectionOperator::new(1.0, &[1.5, 0.0]),
            Err(TraceError::RefractiveIndex(0.0))
        );
        let operator = ReflectionOperator::new(1.0, &[1.5]).unwrap();
        assert_eq!(
            operator.apply(&[0.01_f64]),
            Err(TraceError::ShapeMismatch {
                expected: 2,
                found: 1
            })
        );
    }
}

/// The linear map from all surface wedges to all output reflection angles,
/// valid in the small-angle approximation at normal incidence.
///
/// Row/column `2i` corresponds to mirror `i`'s front surface, `2i + 1` to its
/// back surface; wedge vectors passed to [`ReflectionOperator::apply`] use the
/// same interleaving.
#[derive(Debug, Clone, PartialEq)]
pub struct ReflectionOperator {
    matrix: DMatrix<f64>,
}

impl ReflectionOperator {
    /// Builds the operator for mirrors with the given refractive indices,
    /// embedded in an ambient medium with index `ambient`.
    pub fn new(ambient: f64, refr_indices: &[f64]) -> TraceResult<Self> {
        if refr_indices.is_empty() {
            return Err(TraceError::EmptyStack);
        }
        if ambient <= 0.0 {
            return Err(TraceError::RefractiveIndex(ambient));
        }
        if let Some(&bad) = refr_indices.iter().find(|&&n| n <= 0.0) {
            return Err(TraceError::RefractiveIndex(bad));
        }

        let alphas: Vec<f64> = refr_indices.iter().map(|n| n / ambient).collect();
        let size = 2 * refr_indices.len();
        let mut matrix = DMatrix::zeros(size, size);

        for row in 0..size {
            // Front rows see the ambient side directly; back rows pick up
            // the relative index of their own substrate.
            matrix[(row, row)] = if row % 2 == 0 { 1.0 } else { alphas[row / 2] };
            for col in 0..row {
                let beta = alphas[col / 2] - 1.0;
                matrix[(row, col)] = if col % 2 == 0 { -beta } else { beta };
            }
        }
        matrix *= 2.0;

        Ok(Self { matrix })
    }

    /// Convenience constructor taking the index sequence from a stack.
    pub fn from_stack<W: Wedge>(stack: &Stack<W>) -> TraceResult<Self> {
        Self::new(stack.ambient(), &stack.refr_indices())
    }

    /// Number of reflection outputs (and expected wedge entries): `2m`.
    pub fn len(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.matrix.nrows() == 0
    }

    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    /// Applies the operator to the interleaved wedge sequence
    /// `[front_0, back_0, front_1, back_1, ...]`, component-wise for vector
    /// wedges. Equals `reflection_angles(0, approximate)` on the same stack.
    pub fn apply<W: Wedge>(&self, wedges: &[W]) -> TraceResult<Vec<W>> {
        if wedges.len() != self.len() {
            return Err(TraceError::ShapeMismatch {
                expected: self.len(),
                found: wedges.len(),
            });
        }

        let mut per_axis = Vec::with_capacity(W::DOF);
        for axis in 0..W::DOF {
            let x = DVector::from_iterator(
                wedges.len(),
                wedges.iter().map(|w| w.component(axis)),
            );
            per_axis.push(&self.matrix * x);
        }

        let out = (0..self.len())
            .map(|k| {
                let components: Vec<f64> = per_axis.iter().map(|y| y[k]).collect();
                W::from_components(&components)
            })
            .collect();
        Ok(out)
    }
}
