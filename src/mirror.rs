//! A single wedged mirror element.

use nalgebra::{Rotation2, Vector2};

use crate::settings::DEFAULT_REFR_INDEX;
use crate::wedge::Wedge;


/// A mirror element: a front and a back wedged surface enclosing a bulk
/// medium of the given refractive index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mirror<W: Wedge> {
    pub front: W,
    pub back: W,
    pub refr_index: f64,
}

impl<W: Wedge> Mirror<W> {
    pub fn new(front: W, back: W, refr_index: f64) -> Self {
        Self {
            front,
            back,
            refr_index,
        }
    }

    /// A perfectly flat element with the default glass index.
    pub fn flat() -> Self {
        Self::new(W::zero(), W::zero(), DEFAULT_REFR_INDEX)
    }
}

impl Mirror<Vector2<f64>> {
    /// Rotates both wedge directions jointly by `angle` about the optical
    /// axis. Only the 2-D representation supports clocking; a scalar wedge
    /// has no transverse orientation to rotate.
    pub fn clock(&mut self, angle: f64) {
        let rotation = Rotation2::new(angle);
        self.front = rotation * self.front;
        self.back = rotation * self.back;
    }

    /// Returns a clocked copy, leaving `self` untouched. The inverse solver
    /// uses this to evaluate candidate rotations on independent snapshots.
    pub fn clocked(&self, angle: f64) -> Self {
        let mut mirror = *self;
        mirror.clock(angle);
        mirror
    }
}
