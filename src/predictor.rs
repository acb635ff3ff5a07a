use anyhow::Result;
use num_complex::Complex64;
use sparsetools::csr::CSR;
use spsolve::Solver;
use std::iter::zip;

use crate::jacobian::{make_cpf_jacobian, solve_augmented};
use crate::math::norm;
use crate::param::Parameterization;

/// Performs the predictor step of the continuation power flow.
///
/// Computes a prediction (approximation) to the next solution by solving
/// the augmented system for the raw tangent at the current solution,
/// normalizing it to unit Euclidean norm and extrapolating `step` along it.
///
/// `v` and `lam` are the current solution, `v_prv`/`lam_prv` the previous
/// one and `z` the normalized tangent vector from the previous step (laid
/// out as `[Va(0..nb), Vm(nb..2nb), lambda]`), consumed by the
/// pseudo-arc-length gradient.
///
/// Returns the predicted complex bus voltages, the predicted lambda and
/// the new normalized tangent vector. A singular augmented Jacobian is
/// surfaced as a linear solve error.
#[allow(clippy::too_many_arguments)]
pub fn cpf_predictor(
    y_bus: &CSR<usize, Complex64>,
    v: &[Complex64],
    lam: f64,
    s_xfr: &[Complex64],
    pv: &[usize],
    pq: &[usize],
    step: f64,
    z: &[f64],
    v_prv: &[Complex64],
    lam_prv: f64,
    parameterization: Parameterization,
    solver: &dyn Solver<usize, f64>,
) -> Result<(Vec<Complex64>, f64, Vec<f64>)> {
    let nb = v.len();
    let npv = pv.len();
    let npq = pq.len();
    let npvpq = npv + npq;
    let nj = npv + npq * 2;
    let pvpq = [pv, pq].concat();

    let jac = make_cpf_jacobian(
        y_bus, v, s_xfr, parameterization, z, lam, v_prv, lam_prv, &pvpq, pq,
    )?;

    // raw tangent: solve against the unit vector in the lambda direction
    let mut s = vec![0.0; nj + 1];
    s[nj] = 1.0;
    solve_augmented(jac, &mut s, solver)?;

    let mut z = vec![0.0; 2 * nb + 1];
    for (k, &b) in pvpq.iter().enumerate() {
        z[b] = s[k];
    }
    for (k, &b) in pq.iter().enumerate() {
        z[nb + b] = s[npvpq + k];
    }
    z[2 * nb] = s[nj];

    // normalize the tangent predictor
    let zn = norm(&z);
    z.iter_mut().for_each(|z| *z /= zn);

    let mut va: Vec<f64> = v.iter().map(|v| v.arg()).collect();
    let mut vm: Vec<f64> = v.iter().map(|v| v.norm()).collect();

    // prediction for the next step
    for &b in &pvpq {
        va[b] += step * z[b];
    }
    for &b in pq {
        vm[b] += step * z[nb + b];
    }
    let lam0 = lam + step * z[2 * nb];
    let v0: Vec<Complex64> = zip(vm, va)
        .map(|(vm, va)| Complex64::from_polar(vm, va))
        .collect();

    Ok((v0, lam0, z))
}
