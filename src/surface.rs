//! Reflection and refraction at a single wedged surface.
//!
//! A surface is described by its wedge angle: the tilt of the surface normal
//! against the optical axis. All intermediate algebra happens in the frame of
//! the surface normal (`incident - wedge`) and is converted back to the
//! optical-axis frame before returning.
//!
//! Two transmission modes are supported:
//! - the small-angle approximation, `-(n1/n2) * theta`, which is linear in
//!   all angles and is what the closed-form operator linearises;
//! - exact Snell's law, `asin(-(n1/n2) * sin(theta))`, which fails with a
//!   distinct domain error on total internal reflection.
//!
//! Reflection never depends on the indices: in both modes it reduces to
//! `2*wedge - incident` exactly.

use crate::error::{TraceError, TraceResult};
use crate::wedge::Wedge;


/// Reflected and transmitted angles produced by one surface interaction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Deflection<W: Wedge> {
    pub reflected: W,
    pub transmitted: W,
}

/// Computes the reflected and transmitted angles at a wedged interface
/// between media with refractive indices `n1` (incident side) and `n2`.
///
/// Angles are measured against the optical axis; the wedge tilts the surface
/// normal away from that axis. With `exact` set, transmission uses Snell's
/// law and returns [`TraceError::TotalInternalReflection`] when the refracted
/// sine exceeds unit magnitude. Otherwise the first-order form is used, which
/// is defined for any input.
pub fn angles<W: Wedge>(incident: W, wedge: W, n1: f64, n2: f64, exact: bool) -> TraceResult<Deflection<W>> {
    // Angle of incidence measured from the surface normal.
    let normal_incident = incident - wedge;

    // The reflected ray mirrors about the normal; back in the axis frame
    // this collapses to 2*wedge - incident, with no index dependence.
    let reflected = incident + normal_incident.scale(-2.0);

    let normal_transmitted = if exact {
        normal_incident.try_map(|theta| {
            let s = -(n1 / n2) * theta.sin();
            if s.abs() > 1.0 {
                Err(TraceError::TotalInternalReflection(s))
            } else {
                Ok(s.asin())
            }
        })?
    } else {
        normal_incident.scale(-(n1 / n2))
    };
    let transmitted = normal_transmitted - wedge;

    Ok(Deflection {
        reflected,
        transmitted,
    })
}
