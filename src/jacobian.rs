use anyhow::Result;
use num_complex::Complex64;
use sparsetools::coo::Coo;
use sparsetools::csr::{CCSR, CSR};
use spsolve::Solver;

use crate::derivative::d_sbus_d_v;
use crate::param::{cpf_p_jac, Parameterization};

/// Assembles the reduced real-valued Newton power-flow Jacobian.
///
/// Rows and columns are restricted to the voltage angle unknowns at
/// non-reference buses and the voltage magnitude unknowns at PQ buses:
///
/// ```text
/// J = [ dP/dVa(pvpq, pvpq)  dP/dVm(pvpq, pq) ]
///     [ dQ/dVa(pq, pvpq)    dQ/dVm(pq, pq)   ]
/// ```
pub fn make_jacobian(
    y_bus: &CSR<usize, Complex64>,
    v: &[Complex64],
    pvpq: &[usize],
    pq: &[usize],
) -> Result<Coo<usize, f64>> {
    let (d_sbus_d_va, d_sbus_d_vm) = d_sbus_d_v(y_bus, v)?;
    log::trace!("dSbus_dVa:\n{}", d_sbus_d_va.to_table());
    log::trace!("dSbus_dVm:\n{}", d_sbus_d_vm.to_table());

    let j11 = d_sbus_d_va.select(Some(pvpq), Some(pvpq))?.real();
    let j12 = d_sbus_d_vm.select(Some(pvpq), Some(pq))?.real();
    let j21 = d_sbus_d_va.select(Some(pq), Some(pvpq))?.imag();
    let j22 = d_sbus_d_vm.select(Some(pq), Some(pq))?.imag();

    Coo::compose([
        [&j11.to_coo(), &j12.to_coo()],
        [&j21.to_coo(), &j22.to_coo()],
    ])
}

/// Stacks the power-flow Jacobian, the lambda transfer column and the
/// parameterization gradient row into the augmented continuation operator:
///
/// ```text
/// [   J    dF/dlam ]
/// [ dP/dV  dP/dlam ]
/// ```
///
/// The predictor solves it against the unit vector in the lambda direction
/// and the corrector against the augmented mismatch, so the assembly is
/// shared and only the right-hand side differs.
#[allow(clippy::too_many_arguments)]
pub(crate) fn make_cpf_jacobian(
    y_bus: &CSR<usize, Complex64>,
    v: &[Complex64],
    s_xfr: &[Complex64],
    parameterization: Parameterization,
    z: &[f64],
    lam: f64,
    v_prv: &[Complex64],
    lam_prv: f64,
    pvpq: &[usize],
    pq: &[usize],
) -> Result<Coo<usize, f64>> {
    let jac = make_jacobian(y_bus, v, pvpq, pq)?;

    let d_f_d_lam: Vec<f64> = pvpq
        .iter()
        .map(|&i| -s_xfr[i].re)
        .chain(pq.iter().map(|&i| -s_xfr[i].im))
        .collect();
    let (d_p_d_v, d_p_d_lam) =
        cpf_p_jac(parameterization, z, v, lam, v_prv, lam_prv, pvpq, pq);

    let nj = d_f_d_lam.len();
    let lam_col = Coo::new(nj, 1, (0..nj).collect(), vec![0; nj], d_f_d_lam)?;
    let p_row = Coo::new(1, nj, vec![0; nj], (0..nj).collect(), d_p_d_v)?;
    let p_lam = Coo::new(1, 1, vec![0], vec![0], vec![d_p_d_lam])?;

    Coo::compose([[&jac, &lam_col], [&p_row, &p_lam]])
}

/// Factorizes the augmented operator and solves against `rhs` in place.
pub(crate) fn solve_augmented(
    jac: Coo<usize, f64>,
    rhs: &mut Vec<f64>,
    solver: &dyn Solver<usize, f64>,
) -> Result<()> {
    let jac = jac.to_csc();
    solver.solve(
        jac.cols(),
        jac.rowidx(),
        jac.colptr(),
        jac.values(),
        rhs,
        false,
    )?;
    Ok(())
}
