//! Inverse problems on a mirror stack.
//!
//! Two fits are posed as box-constrained nonlinear least squares and solved
//! with a damped Gauss-Newton (Levenberg-Marquardt) loop:
//! - wedge recovery: find every surface wedge from a vector of observed
//!   reflection angles at normal incidence, with a fixed index sequence;
//! - clocking: find a per-mirror rotation that best nulls the transmitted
//!   beam deviation of a vector-wedge stack.
//!
//! The forward model is immutable: every objective evaluation builds its own
//! stack snapshot from the flat parameter vector, so the Jacobian columns can
//! be probed in parallel without sharing mirror state. Convergence is local
//! only; restart policies belong to the caller.

use std::f64::consts::{PI, TAU};

use itertools::Itertools;
use nalgebra::{DMatrix, DVector, Vector2};
use rayon::prelude::*;

use crate::error::{TraceError, TraceResult};
use crate::mirror::Mirror;
use crate::stack::Stack;
use crate::wedge::Wedge;


/// Default box half-width for wedge recovery.
pub const MAX_WEDGE_ANGLE: f64 = std::f64::consts::FRAC_PI_2;

/// Damping attempts per outer iteration before giving up on a downhill step.
const MAX_REJECTS: usize = 24;

/// Floor for the damped diagonal, guards stacks with degenerate columns.
const MIN_DIAG: f64 = 1e-12;

/// Tuning knobs for the Levenberg-Marquardt loop.
#[derive(Debug, Clone, PartialEq)]
pub struct FitOptions {
    /// Maximum outer iterations.
    pub max_iterations: usize,
    /// Convergence threshold on the residual norm.
    pub tolerance: f64,
    /// Convergence threshold on the accepted parameter step norm.
    pub step_tolerance: f64,
    /// Convergence threshold on the projected gradient once no downhill
    /// step can be found.
    pub gradient_tolerance: f64,
    /// Initial damping factor.
    pub lambda_init: f64,
    /// Damping increase on a rejected step.
    pub lambda_up: f64,
    /// Damping decrease on an accepted step.
    pub lambda_down: f64,
    /// Relative finite-difference step for the Jacobian.
    pub fd_step: f64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            tolerance: 1e-10,
            step_tolerance: 1e-12,
            gradient_tolerance: 1e-9,
            lambda_init: 1e-3,
            lambda_up: 10.0,
            lambda_down: 0.1,
            fd_step: 1e-7,
        }
    }
}

/// Outcome of a minimizer run. `converged` reflects the criteria in
/// [`FitOptions`]; the parameters are best-effort either way.
#[derive(Debug, Clone, PartialEq)]
pub struct FitReport {
    pub params: Vec<f64>,
    pub residual: f64,
    pub iterations: usize,
    pub converged: bool,
}

/// Recovered wedge geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct WedgeFit<W: Wedge> {
    pub mirrors: Vec<Mirror<W>>,
    pub residual: f64,
    pub iterations: usize,
}

/// Recovered per-mirror clocking.
#[derive(Debug, Clone, PartialEq)]
pub struct ClockingFit {
    pub rotations: Vec<f64>,
    pub residual: f64,
    pub iterations: usize,
}

/// Finds the surface wedges that reproduce `observed`, the reflection angles
/// of a stack probed at normal incidence, given the refractive index
/// sequence. Each wedge component is constrained to
/// `[-max_angle, max_angle]`.
///
/// `observed` must hold exactly `2 * refr_indices.len()` entries in the
/// ordering of [`Stack::reflection_angles`]. Returns
/// [`TraceError::NonConvergence`] with the best-effort parameters when the
/// minimizer fails its criteria.
pub fn fit_wedges<W: Wedge>(
    observed: &[W],
    ambient: f64,
    refr_indices: &[f64],
    exact: bool,
    max_angle: f64,
    options: &FitOptions,
) -> TraceResult<WedgeFit<W>> {
    if refr_indices.is_empty() {
        return Err(TraceError::EmptyStack);
    }
    let expected = 2 * refr_indices.len();
    if observed.len() != expected {
        return Err(TraceError::ShapeMismatch {
            expected,
            found: observed.len(),
        });
    }

    let target = flatten(observed);
    let residual_fn = |params: &[f64]| -> TraceResult<DVector<f64>> {
        let mut stack = Stack::new(ambient);
        for mirror in mirrors_from_params::<W>(params, refr_indices) {
            stack.push(mirror);
        }
        let model = stack.reflection_angles(W::zero(), exact)?;
        Ok(flatten(&model) - &target)
    };

    let n_params = expected * W::DOF;
    let report = levenberg_marquardt(
        &residual_fn,
        vec![0.0; n_params],
        &vec![-max_angle; n_params],
        &vec![max_angle; n_params],
        options,
    )?;

    if !report.converged {
        return Err(TraceError::NonConvergence {
            params: report.params,
            residual: report.residual,
            iterations: report.iterations,
        });
    }

    Ok(WedgeFit {
        mirrors: mirrors_from_params::<W>(&report.params, refr_indices),
        residual: report.residual,
        iterations: report.iterations,
    })
}

/// Finds per-mirror rotation angles in `[0, 2*pi]` minimising the norm of
/// the transmitted angle of a vector-wedge stack. The stack itself is left
/// untouched; apply the returned rotations with [`Mirror::clocked`].
pub fn optimize_clocking(
    stack: &Stack<Vector2<f64>>,
    exact: bool,
    options: &FitOptions,
) -> TraceResult<ClockingFit> {
    if stack.is_empty() {
        return Err(TraceError::EmptyStack);
    }

    let residual_fn = |rotations: &[f64]| -> TraceResult<DVector<f64>> {
        let mut trial = Stack::new(stack.ambient());
        for (mirror, &angle) in stack.iter().zip(rotations) {
            trial.push(mirror.clocked(angle));
        }
        let t = trial.transmission_angle(Vector2::zeros(), exact)?;
        Ok(DVector::from_column_slice(&[t.x, t.y]))
    };

    let m = stack.len();
    // Start in the interior of the box so the first steps are unclamped.
    let report = levenberg_marquardt(
        &residual_fn,
        vec![PI; m],
        &vec![0.0; m],
        &vec![TAU; m],
        options,
    )?;

    if !report.converged {
        return Err(TraceError::NonConvergence {
            params: report.params,
            residual: report.residual,
            iterations: report.iterations,
        });
    }

    Ok(ClockingFit {
        rotations: report.params,
        residual: report.residual,
        iterations: report.iterations,
    })
}

/// Unpacks a flat parameter vector into mirrors, pairing consecutive wedges
/// as (front, back) per mirror in stack order.
fn mirrors_from_params<W: Wedge>(params: &[f64], refr_indices: &[f64]) -> Vec<Mirror<W>> {
    params
        .chunks(W::DOF)
        .map(W::from_components)
        .tuples()
        .zip(refr_indices)
        .map(|((front, back), &n)| Mirror::new(front, back, n))
        .collect()
}

/// Flattens a wedge sequence into a residual-space vector, component-major
/// per wedge.
fn flatten<W: Wedge>(values: &[W]) -> DVector<f64> {
    DVector::from_iterator(
        values.len() * W::DOF,
        values
            .iter()
            .flat_map(|w| (0..W::DOF).map(move |axis| w.component(axis))),
    )
}

/// Box-constrained Levenberg-Marquardt with a forward-difference Jacobian.
///
/// Steps solve the damped normal equations and are clamped into the box.
/// A trial step that lands in a total-internal-reflection region of the
/// exact forward model is treated like any uphill step: rejected, with the
/// damping increased. An infeasible starting point propagates the domain
/// error instead.
fn levenberg_marquardt<F>(
    residual_fn: &F,
    x0: Vec<f64>,
    lower: &[f64],
    upper: &[f64],
    options: &FitOptions,
) -> TraceResult<FitReport>
where
    F: Fn(&[f64]) -> TraceResult<DVector<f64>> + Sync,
{
    let n = x0.len();
    let mut x = x0;
    let mut residual = residual_fn(&x)?;
    let mut cost = residual.norm_squared();
    let mut lambda = options.lambda_init;
    let mut converged = cost.sqrt() < options.tolerance;
    let mut iterations = 0;

    while !converged && iterations < options.max_iterations {
        iterations += 1;

        let jacobian = finite_difference_jacobian(residual_fn, &x, &residual, upper, options)?;
        let jt = jacobian.transpose();
        let gram = &jt * &jacobian;
        let gradient = &jt * &residual;

        let mut accepted = false;
        for _ in 0..MAX_REJECTS {
            let mut damped = gram.clone();
            for i in 0..n {
                damped[(i, i)] += lambda * gram[(i, i)].max(MIN_DIAG);
            }
            let step = match damped.cholesky() {
                Some(factor) => factor.solve(&gradient),
                None => {
                    lambda *= options.lambda_up;
                    continue;
                }
            };

            let candidate: Vec<f64> = x
                .iter()
                .enumerate()
                .map(|(i, xi)| (xi - step[i]).clamp(lower[i], upper[i]))
                .collect();

            match residual_fn(&candidate) {
                Ok(trial_residual) => {
                    let trial_cost = trial_residual.norm_squared();
                    if trial_cost < cost {
                        let step_norm = x
                            .iter()
                            .zip(candidate.iter())
                            .map(|(a, b)| (a - b).powi(2))
                            .sum::<f64>()
                            .sqrt();
                        x = candidate;
                        residual = trial_residual;
                        cost = trial_cost;
                        lambda = (lambda * options.lambda_down).max(1e-12);
                        accepted = true;
                        converged = cost.sqrt() < options.tolerance
                            || step_norm < options.step_tolerance;
                        break;
                    }
                    lambda *= options.lambda_up;
                }
                Err(TraceError::TotalInternalReflection(_)) => {
                    lambda *= options.lambda_up;
                }
                Err(e) => return Err(e),
            }
        }

        if !accepted {
            // No downhill step at any damping tried: accept the point if it
            // is first-order optimal within the box, otherwise report the
            // failure to converge.
            converged = projected_gradient_norm(&x, &gradient, lower, upper)
                < options.gradient_tolerance;
            break;
        }
    }

    Ok(FitReport {
        params: x,
        residual: cost.sqrt(),
        iterations,
        converged,
    })
}

/// Forward-difference Jacobian, one column per parameter, probed in
/// parallel. Every probe evaluates the forward model on its own snapshot.
/// A probe that crosses into a total-internal-reflection region retries
/// from the other side of the point, so a fit sitting right at the domain
/// boundary can still differentiate.
fn finite_difference_jacobian<F>(
    residual_fn: &F,
    x: &[f64],
    residual: &DVector<f64>,
    upper: &[f64],
    options: &FitOptions,
) -> TraceResult<DMatrix<f64>>
where
    F: Fn(&[f64]) -> TraceResult<DVector<f64>> + Sync,
{
    let columns = (0..x.len())
        .into_par_iter()
        .map(|j| {
            let mut h = options.fd_step * x[j].abs().max(1.0);
            // Probe backwards rather than stepping out of the box.
            if x[j] + h > upper[j] {
                h = -h;
            }
            let mut probe = x.to_vec();
            probe[j] = x[j] + h;
            let probed = match residual_fn(&probe) {
                Ok(r) => r,
                Err(TraceError::TotalInternalReflection(_)) => {
                    h = -h;
                    probe[j] = x[j] + h;
                    residual_fn(&probe)?
                }
                Err(e) => return Err(e),
            };
            Ok((probed - residual) / h)
        })
        .collect::<TraceResult<Vec<DVector<f64>>>>()?;

    Ok(DMatrix::from_columns(&columns))
}

/// Infinity norm of the gradient with box-blocked components zeroed. The
/// descent direction is `-gradient`; a component pressing against its bound
/// is not an obstruction to optimality.
fn projected_gradient_norm(x: &[f64], gradient: &DVector<f64>, lower: &[f64], upper: &[f64]) -> f64 {
    let mut norm = 0.0_f64;
    for i in 0..x.len() {
        let g = gradient[i];
        let blocked_low = x[i] <= lower[i] && g > 0.0;
        let blocked_high = x[i] >= upper[i] && g < 0.0;
        if !(blocked_low || blocked_high) {
            norm = norm.max(g.abs());
        }
    }
    norm
}
