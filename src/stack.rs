//! An ordered stack of wedged mirrors and the angle propagation through it.
//!
//! The stack owns the recursive propagation: a single forward pass records
//! the reflection/transmission pair at every surface (the per-call RTS
//! table), then each secondary reflection is propagated back out through
//! every preceding mirror. The sign convention is the one the single-surface
//! transform expects: whenever a ray reverses direction relative to the
//! surface normals, its angle is negated before being treated as incident on
//! the next surface, and the wedge of a surface crossed in reverse enters
//! with flipped sign.

use crate::error::{TraceError, TraceResult};
use crate::mirror::Mirror;
use crate::surface::{angles, Deflection};
use crate::wedge::Wedge;


/// Reflection and transmission at the two surfaces of one mirror, recorded
/// during a single propagation pass. Transient: rebuilt on every call.
#[derive(Debug, Clone, Copy)]
struct SurfaceEvents<W: Wedge> {
    front: Deflection<W>,
    back: Deflection<W>,
}

/// An ordered sequence of mirrors in physical propagation order, embedded in
/// an ambient medium whose refractive index is fixed at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Stack<W: Wedge> {
    mirrors: Vec<Mirror<W>>,
    ambient: f64,
}

impl<W: Wedge> Stack<W> {
    pub fn new(ambient: f64) -> Self {
        Self {
            mirrors: Vec::new(),
            ambient,
        }
    }

    /// Builds a new mirror from raw parameters and appends it.
    pub fn add_mirror(&mut self, front: W, back: W, refr_index: f64) {
        self.mirrors.push(Mirror::new(front, back, refr_index));
    }

    /// Appends an existing mirror element.
    pub fn push(&mut self, mirror: Mirror<W>) {
        self.mirrors.push(mirror);
    }

    /// Removes and returns the mirror at `index`.
    pub fn remove_mirror(&mut self, index: usize) -> Mirror<W> {
        self.mirrors.remove(index)
    }

    pub fn len(&self) -> usize {
        self.mirrors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mirrors.is_empty()
    }

    pub fn ambient(&self) -> f64 {
        self.ambient
    }

    pub fn mirrors(&self) -> &[Mirror<W>] {
        &self.mirrors
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Mirror<W>> {
        self.mirrors.iter()
    }

    /// The refractive index sequence, one entry per mirror.
    pub fn refr_indices(&self) -> Vec<f64> {
        self.mirrors.iter().map(|m| m.refr_index).collect()
    }

    fn validate(&self) -> TraceResult<()> {
        if self.mirrors.is_empty() {
            return Err(TraceError::EmptyStack);
        }
        if self.ambient <= 0.0 {
            return Err(TraceError::RefractiveIndex(self.ambient));
        }
        for mirror in &self.mirrors {
            if mirror.refr_index <= 0.0 {
                return Err(TraceError::RefractiveIndex(mirror.refr_index));
            }
        }
        Ok(())
    }

    /// One forward pass: the reflection/transmission pair at the front and
    /// back surface of every mirror. The incident angle on each front surface
    /// is the sign-flipped transmission out of the previous back surface.
    fn surface_table(&self, incident: W, exact: bool) -> TraceResult<Vec<SurfaceEvents<W>>> {
        let mut table = Vec::with_capacity(self.mirrors.len());
        let mut incoming = incident;
        for mirror in &self.mirrors {
            let front = angles(incoming, mirror.front, self.ambient, mirror.refr_index, exact)?;
            let back = angles(
                -front.transmitted,
                mirror.back,
                mirror.refr_index,
                self.ambient,
                exact,
            )?;
            incoming = -back.transmitted;
            table.push(SurfaceEvents { front, back });
        }
        Ok(table)
    }

    /// Every reflection angle the stack sends back towards the observer, in
    /// a fixed order: the direct front reflection of mirror 0, the ray that
    /// round-trips mirror 0's substrate, then for each further mirror the
    /// front- and back-surface reflections, each propagated back out through
    /// all preceding mirrors. The result has exactly `2 * len()` entries.
    pub fn reflection_angles(&self, incident: W, exact: bool) -> TraceResult<Vec<W>> {
        self.validate()?;
        let table = self.surface_table(incident, exact)?;
        let m0 = &self.mirrors[0];

        let mut out = Vec::with_capacity(2 * self.mirrors.len());
        out.push(table[0].front.reflected);
        // Back-surface reflection of mirror 0, re-transmitted out through its
        // own front surface. Crossing a surface in reverse flips the wedge.
        out.push(
            angles(
                -table[0].back.reflected,
                -m0.front,
                m0.refr_index,
                self.ambient,
                exact,
            )?
            .transmitted,
        );

        for (i, mirror) in self.mirrors.iter().enumerate().skip(1) {
            for back_surface in [false, true] {
                let mut next = if back_surface {
                    // Bring the back-surface reflection forward through this
                    // mirror's own front surface first.
                    angles(
                        -table[i].back.reflected,
                        -mirror.front,
                        mirror.refr_index,
                        self.ambient,
                        exact,
                    )?
                    .transmitted
                } else {
                    table[i].front.reflected
                };

                // Propagate back out through every earlier mirror: back
                // surface first, then front, negating on each reversal.
                for earlier in self.mirrors[..i].iter().rev() {
                    next = angles(
                        -next,
                        -earlier.back,
                        self.ambient,
                        earlier.refr_index,
                        exact,
                    )?
                    .transmitted;
                    next = angles(
                        -next,
                        -earlier.front,
                        earlier.refr_index,
                        self.ambient,
                        exact,
                    )?
                    .transmitted;
                }

                out.push(next);
            }
        }

        Ok(out)
    }

    /// The angle of the ray that makes it through the whole stack, after the
    /// last mirror's back surface. No secondary reflections are tracked.
    pub fn transmission_angle(&self, incident: W, exact: bool) -> TraceResult<W> {
        self.validate()?;
        let table = self.surface_table(incident, exact)?;
        let last = table.last().ok_or(TraceError::EmptyStack)?;
        Ok(last.back.transmitted)
    }
}

impl<'a, W: Wedge> IntoIterator for &'a Stack<W> {
    type Item = &'a Mirror<W>;
    type IntoIter = std::slice::Iter<'a, Mirror<W>>;

    fn into_iter(self) -> Self::IntoIter {
        self.mirrors.iter()
    }
}
