use anyhow::{format_err, Result};
use full::slice::norm_inf;
use num_complex::Complex64;
use sparsetools::csr::CSR;
use spsolve::Solver;
use std::iter::zip;

use crate::corrector::cpf_corrector;
use crate::debug::format_rect_vec;
use crate::opt::{CpfOpt, StopAt};
use crate::param::Parameterization;
use crate::predictor::cpf_predictor;
use crate::progress::ProgressMonitor;

/// Absolute lambda tolerance for the stop-target checks.
const LAMBDA_TOL: f64 = 1e-8;

/// Continuation power flow results.
pub struct CpfResult {
    /// Complex bus voltages from the corrector steps, one entry per
    /// accepted continuation step.
    pub v_c: Vec<Vec<Complex64>>,
    /// Lambda values from the corrector steps.
    pub lam_c: Vec<f64>,
    /// Complex bus voltages from the predictor steps.
    pub v_p: Vec<Vec<Complex64>>,
    /// Lambda values from the predictor steps.
    pub lam_p: Vec<f64>,
    /// Maximum lambda reached along the trace.
    pub max_lam: f64,
    /// Number of continuation steps performed.
    pub steps: usize,
    /// Final augmented mismatch norm.
    pub norm_f: f64,
    /// Overall success flag; false when the corrector failed to converge
    /// and the trace was aborted at the last accepted point.
    pub success: bool,
}

/// Runs a full AC continuation power flow using a normalized tangent
/// predictor and the selected parameterization scheme.
///
/// The loading is ramped from the base case injections `s_bus_base`
/// (lambda = 0) toward the target case injections `s_bus_target`
/// (lambda = 1 and beyond) along the scheduled transfer
/// `Sxfr = Sbus_target - Sbus_base`. `v0` must be a converged power flow
/// solution of the base case; `ref_`, `pv` and `pq` partition the bus
/// indices `0..nb` and are fixed for the whole run (no PV/PQ
/// re-classification on generator limits).
///
/// Each continuation step predicts a trial point along the normalized
/// tangent and corrects it with an augmented Newton iteration. The step
/// size is optionally adapted from the local prediction error; the trace
/// terminates according to `opt.stop_at`, or when the corrector fails to
/// converge, in which case the trajectory accumulated so far is returned
/// with the success flag cleared.
#[allow(clippy::too_many_arguments)]
pub fn runcpf(
    y_bus: &CSR<usize, Complex64>,
    s_bus_base: &[Complex64],
    s_bus_target: &[Complex64],
    v0: &[Complex64],
    ref_: &[usize],
    pv: &[usize],
    pq: &[usize],
    opt: &CpfOpt,
    solver: &dyn Solver<usize, f64>,
    progress: Option<&dyn ProgressMonitor>,
) -> Result<CpfResult> {
    let nb = v0.len();
    check_bus_sets(nb, ref_, pv, pq)?;

    // scheduled transfer
    let s_xfr: Vec<Complex64> = zip(s_bus_target, s_bus_base).map(|(t, b)| t - b).collect();
    log::trace!("Sxfr: {}", format_rect_vec(&s_xfr));
    let pvpq = [pv, pq].concat();

    let mut step = opt.step;
    let mut parameterization = opt.parameterization;
    let mut adapt_step = opt.adapt_step;

    let mut lam = 0.0;
    let mut lam_prv = lam; // lam at previous step
    let mut v = v0.to_vec();
    let mut v_prv = v.clone(); // V at previous step
    let mut continuation = true;
    let mut cont_steps = 0;
    let mut success = true;
    let mut norm_f = 0.0;

    // tangent: unit vector in the lambda direction
    let mut z = vec![0.0; 2 * nb + 1];
    z[2 * nb] = 1.0;

    // result arrays
    let mut v_c: Vec<Vec<Complex64>> = Vec::new();
    let mut lam_c: Vec<f64> = Vec::new();
    let mut v_p: Vec<Vec<Complex64>> = Vec::new();
    let mut lam_p: Vec<f64> = Vec::new();

    while continuation {
        cont_steps += 1;

        // prediction for next step
        let (v0, lam0, z_new) = cpf_predictor(
            y_bus, &v, lam, &s_xfr, pv, pq, step, &z, &v_prv, lam_prv, parameterization, solver,
        )?;
        z = z_new;

        // save previous voltage and lambda before updating
        v_prv = v.clone();
        lam_prv = lam;

        // correction
        let (v_new, converged, i, lam_new, norm_f_new) = cpf_corrector(
            y_bus,
            s_bus_base,
            &v0,
            pv,
            pq,
            lam0,
            &s_xfr,
            &v_prv,
            lam_prv,
            &z,
            step,
            parameterization,
            opt,
            solver,
            progress,
        )?;
        v = v_new;
        lam = lam_new;
        norm_f = norm_f_new;

        if !converged {
            success = false;
            log::warn!(
                "step {} : lambda = {:.6}, corrector did not converge in {} iterations",
                cont_steps,
                lam,
                i
            );
            break;
        }

        v_p.push(v0.clone());
        lam_p.push(lam0);
        v_c.push(v.clone());
        lam_c.push(lam);

        if let Some(pm) = progress {
            pm.step_accepted(cont_steps, lam, i);
        }
        if opt.verbose > 2 {
            log::info!("step {} : lambda = {:.6}", cont_steps, lam);
        } else if opt.verbose > 1 {
            log::info!(
                "step {}: lambda = {:.6}, {} corrector Newton steps",
                cont_steps,
                lam,
                i
            );
        }

        match opt.stop_at {
            StopAt::Full => {
                if lam.abs() < LAMBDA_TOL {
                    // traced the full continuation curve
                    if opt.verbose > 0 {
                        log::info!(
                            "Traced full continuation curve in {} continuation steps",
                            cont_steps
                        );
                    }
                    continuation = false;
                } else if lam < lam_prv && lam - step < 0.0 {
                    // the next step would overshoot lambda = 0
                    step = lam;
                    parameterization = Parameterization::Natural;
                    adapt_step = false;
                }
            }
            StopAt::Nose => {
                if lam < lam_prv {
                    // reached the nose point
                    if opt.verbose > 0 {
                        log::info!(
                            "Reached steady state loading limit in {} continuation steps",
                            cont_steps
                        );
                    }
                    continuation = false;
                }
            }
            StopAt::Lambda(stop_at) => {
                if lam < lam_prv {
                    // reached the nose point before the target
                    if opt.verbose > 0 {
                        log::info!(
                            "Reached steady state loading limit in {} continuation steps",
                            cont_steps
                        );
                    }
                    continuation = false;
                } else if (stop_at - lam).abs() < LAMBDA_TOL {
                    // reached the desired lambda
                    if opt.verbose > 0 {
                        log::info!(
                            "Reached desired lambda {} in {} continuation steps",
                            stop_at,
                            cont_steps
                        );
                    }
                    continuation = false;
                } else if lam + step > stop_at {
                    // the next step would overshoot the target
                    step = stop_at - lam;
                    parameterization = Parameterization::Natural;
                    adapt_step = false;
                }
            }
        }

        if adapt_step && continuation {
            // local prediction error over [Va(pq), Vm(pv ∪ pq), lambda]
            let error = {
                let d: Vec<f64> = pq
                    .iter()
                    .map(|&b| v[b].arg() - v0[b].arg())
                    .chain(pvpq.iter().map(|&b| v[b].norm() - v0[b].norm()))
                    .chain([lam - lam0])
                    .collect();
                norm_inf(&d)
            };
            step = adapt_step_size(step, error, opt);
            log::debug!("step_{}: {}", cont_steps, step);
        }
    }

    if let Some(pm) = progress {
        pm.terminated(cont_steps, lam, success);
    }

    let max_lam = lam_c.iter().cloned().fold(0.0, f64::max);

    Ok(CpfResult {
        v_c,
        lam_c,
        v_p,
        lam_p,
        max_lam,
        steps: cont_steps,
        norm_f,
        success,
    })
}

/// Scales the step by the prediction-error ratio, clamped to the
/// configured bounds.
fn adapt_step_size(step: f64, error: f64, opt: &CpfOpt) -> f64 {
    (step * opt.error_tol / error).clamp(opt.step_min, opt.step_max)
}

fn check_bus_sets(nb: usize, ref_: &[usize], pv: &[usize], pq: &[usize]) -> Result<()> {
    let mut seen = vec![false; nb];
    for &b in ref_.iter().chain(pv).chain(pq) {
        if b >= nb {
            return Err(format_err!("bus index {} out of range ({} buses)", b, nb));
        }
        if seen[b] {
            return Err(format_err!("bus {} appears in more than one bus set", b));
        }
        seen[b] = true;
    }
    if let Some(b) = seen.iter().position(|&s| !s) {
        return Err(format_err!("bus {} missing from ref/pv/pq bus sets", b));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_growth_is_capped_at_step_max() {
        let opt = CpfOpt::default();
        // tiny prediction error wants a huge step
        assert_eq!(adapt_step_size(0.1, 1e-9, &opt), opt.step_max);
        // exact prediction must not produce NaN
        assert_eq!(adapt_step_size(0.1, 0.0, &opt), opt.step_max);
    }

    #[test]
    fn step_shrinkage_is_floored_at_step_min() {
        let opt = CpfOpt::default();
        assert_eq!(adapt_step_size(0.1, 1e3, &opt), opt.step_min);
    }

    #[test]
    fn step_scales_by_the_error_ratio_between_the_bounds() {
        let opt = CpfOpt::default();
        let step = adapt_step_size(0.1, 2e-3, &opt);
        assert!((step - 0.05).abs() < 1e-12);
    }

    #[test]
    fn bus_sets_must_partition_the_buses() {
        assert!(check_bus_sets(3, &[0], &[1], &[2]).is_ok());
        assert!(check_bus_sets(3, &[0], &[1], &[]).is_err()); // bus 2 missing
        assert!(check_bus_sets(3, &[0], &[1], &[1, 2]).is_err()); // bus 1 twice
        assert!(check_bus_sets(3, &[0], &[1], &[3]).is_err()); // out of range
    }
}
