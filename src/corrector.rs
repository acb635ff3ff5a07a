use anyhow::Result;
use full::slice::norm_inf;
use itertools::izip;
use num_complex::Complex64;
use sparsetools::csr::CSR;
use spsolve::Solver;
use std::iter::zip;

use crate::debug::{format_f64_vec, format_polar_vec};
use crate::jacobian::{make_cpf_jacobian, solve_augmented};
use crate::opt::CpfOpt;
use crate::param::{cpf_p, Parameterization};
use crate::progress::ProgressMonitor;

/// Solves the corrector step of a continuation power flow using a full
/// Newton method with the selected parameterization scheme.
///
/// Solves for bus voltages and lambda given the full system admittance
/// matrix (for all buses), the complex bus power injection vector of the
/// base case (for all buses), the predicted vector of complex bus voltages
/// and slices with the lists of bus indices for PV and PQ buses. The power
/// mismatch equations are augmented with the scalar parameterization
/// residual so that the voltage unknowns and lambda are corrected
/// simultaneously; convergence is on the infinity norm of the augmented
/// mismatch.
///
/// The extra continuation inputs are `lam0` (initial predicted lambda),
/// `s_xfr` (scheduled transfer vector for all buses), `v_prv`/`lam_prv`
/// (corrector solution from the previous continuation step), `z`
/// (normalized tangent vector) and `step` (continuation step size).
///
/// Returns the final complex voltages, a flag which indicates whether it
/// converged or not, the number of iterations performed, the final lambda
/// and the final mismatch norm.
#[allow(clippy::too_many_arguments)]
pub fn cpf_corrector(
    y_bus: &CSR<usize, Complex64>,
    s_bus: &[Complex64],
    v0: &[Complex64],
    pv: &[usize],
    pq: &[usize],
    lam0: f64,
    s_xfr: &[Complex64],
    v_prv: &[Complex64],
    lam_prv: f64,
    z: &[f64],
    step: f64,
    parameterization: Parameterization,
    opt: &CpfOpt,
    solver: &dyn Solver<usize, f64>,
    progress: Option<&dyn ProgressMonitor>,
) -> Result<(Vec<Complex64>, bool, usize, f64, f64)> {
    let tol = opt.tol;
    let max_it = opt.max_it;

    // initialize
    let mut converged = false;
    let mut i = 0;
    let mut v: Vec<Complex64> = v0.to_vec();
    let mut va: Vec<f64> = v.iter().map(|v| v.arg()).collect();
    let mut vm: Vec<f64> = v.iter().map(|v| v.norm()).collect();
    let mut lam = lam0;

    // set up indexing for updating V
    let npv = pv.len();
    let npq = pq.len();
    let pvpq = [pv, pq].concat();
    let (j1, j2) = (0, npv); // j1:j2 - V angle of pv buses
    let (j3, j4) = (j2, j2 + npq); // j3:j4 - V angle of pq buses
    let (j5, j6) = (j4, j4 + npq); // j5:j6 - V mag of pq buses
    let j7 = j6; // j7 - lambda

    // evaluate F(x0, lam0), including the Sxfr transfer/loading
    let mut f: Vec<f64> = {
        let i_bus: Vec<Complex64> = y_bus * &v;
        let mis: Vec<Complex64> = izip!(&v, &i_bus, s_bus, s_xfr)
            .map(|(v, i_bus, s_bus, s_xfr)| v * i_bus.conj() - s_bus - s_xfr.scale(lam))
            .collect();
        let p = cpf_p(
            parameterization, step, z, &v, lam, v_prv, lam_prv, &pvpq, pq,
        );
        [
            pvpq.iter().map(|&i| mis[i].re).collect::<Vec<_>>(),
            pq.iter().map(|&i| mis[i].im).collect::<Vec<_>>(),
            vec![p],
        ]
        .concat()
    };

    // check tolerance
    let mut norm_f = norm_inf(&f);
    if let Some(pm) = progress {
        pm.update(i, norm_f);
    }
    if norm_f < tol {
        converged = true;
        log::info!("Converged!");
    }
    log::debug!("norm_f0: {}", norm_f);

    // do Newton iterations
    while !converged && i < max_it {
        // update iteration counter
        i = i + 1;

        // evaluate Jacobian, augmented with the lambda column and the
        // parameterization gradient row
        let jac = make_cpf_jacobian(
            y_bus, &v, s_xfr, parameterization, z, lam, v_prv, lam_prv, &pvpq, pq,
        )?;

        // compute update step
        let dx = {
            let mut neg_f: Vec<f64> = f.iter().map(|f| -f).collect();
            log::trace!("-F: {}", format_f64_vec(&neg_f));
            solve_augmented(jac, &mut neg_f, solver)?;
            neg_f
        };
        log::trace!("dx: {}", format_f64_vec(&dx));

        // update voltage
        for (i, j) in (j1..j2).enumerate() {
            va[pv[i]] += dx[j];
        }
        for (i, j) in (j3..j4).enumerate() {
            va[pq[i]] += dx[j];
        }
        for (i, j) in (j5..j6).enumerate() {
            vm[pq[i]] += dx[j];
        }

        // update Vm and Va again in case we wrapped around with a negative Vm
        v = zip(vm, va)
            .map(|(vm, va)| Complex64::from_polar(vm, va))
            .collect();
        va = v.iter().map(|v| v.arg()).collect();
        vm = v.iter().map(|v| v.norm()).collect();
        log::debug!("V_{}: {}", i, format_polar_vec(&v));

        // update lambda
        lam += dx[j7];

        // evaluate F(x, lam)
        let i_bus: Vec<Complex64> = y_bus * &v;
        let mis: Vec<Complex64> = izip!(&v, &i_bus, s_bus, s_xfr)
            .map(|(v, i_bus, s_bus, s_xfr)| v * i_bus.conj() - s_bus - s_xfr.scale(lam))
            .collect();
        let p = cpf_p(
            parameterization, step, z, &v, lam, v_prv, lam_prv, &pvpq, pq,
        );
        f = [
            pvpq.iter().map(|&i| mis[i].re).collect::<Vec<_>>(),
            pq.iter().map(|&i| mis[i].im).collect::<Vec<_>>(),
            vec![p],
        ]
        .concat();

        // check for convergence
        norm_f = norm_inf(&f);
        if let Some(pm) = progress {
            pm.update(i, norm_f);
        }
        if norm_f < tol {
            converged = true;
            if opt.verbose > 0 {
                log::info!("Newton's method corrector converged in {} iterations.", i);
            }
        }
        log::debug!("norm_f{}: {}", i, norm_f);
    }

    if !converged && opt.verbose > 0 {
        log::info!(
            "Newton's method corrector did not converge in {} iterations.",
            i
        );
    }

    Ok((v, converged, i, lam, norm_f))
}
