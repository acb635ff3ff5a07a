use anyhow::Result;
use num_complex::Complex64;
use sparsetools::coo::Coo;
use sparsetools::csr::CSR;

use crate::math::J;

/// Computes partial derivatives of complex bus power injections w.r.t.
/// voltage.
///
/// Returns two matrices containing the partial derivatives of the complex
/// bus power injections w.r.t. voltage angle and voltage magnitude,
/// respectively (for all buses):
///
/// ```text
/// dS/dVa = j * diag(V) * conj(diag(Ibus) - Ybus * diag(V))
/// dS/dVm = diag(V) * conj(Ybus * diag(Vnorm)) + conj(diag(Ibus)) * diag(Vnorm)
/// ```
///
/// where `Ibus = Ybus*V` and `Vnorm = V ./ abs(V)`. Both results share the
/// sparsity pattern of `Ybus` plus the diagonal.
///
/// Voltage magnitudes must be non-zero; entries are divided by `abs(V)`
/// without guarding.
pub fn d_sbus_d_v(
    y_bus: &CSR<usize, Complex64>,
    v: &[Complex64],
) -> Result<(CSR<usize, Complex64>, CSR<usize, Complex64>)> {
    let nb = v.len();
    let i_bus: Vec<Complex64> = y_bus * v;
    let v_norm: Vec<Complex64> = v.iter().map(|v| *v / v.norm()).collect();

    let rowptr = y_bus.rowptr();
    let colidx = y_bus.colidx();
    let values = y_bus.values();

    let nnz = values.len();
    let mut rows: Vec<usize> = Vec::with_capacity(nnz + nb);
    let mut cols: Vec<usize> = Vec::with_capacity(nnz + nb);
    let mut d_va: Vec<Complex64> = Vec::with_capacity(nnz + nb);
    let mut d_vm: Vec<Complex64> = Vec::with_capacity(nnz + nb);

    for i in 0..nb {
        let mut diag = false;
        for k in rowptr[i]..rowptr[i + 1] {
            let j = colidx[k];
            let y = values[k];

            let mut dva = -J * v[i] * (y * v[j]).conj();
            let mut dvm = v[i] * (y * v_norm[j]).conj();
            if j == i {
                dva += J * v[i] * i_bus[i].conj();
                dvm += i_bus[i].conj() * v_norm[i];
                diag = true;
            }
            rows.push(i);
            cols.push(j);
            d_va.push(dva);
            d_vm.push(dvm);
        }
        // Ybus rows without a stored diagonal still have one in dS/dV
        if !diag {
            rows.push(i);
            cols.push(i);
            d_va.push(J * v[i] * i_bus[i].conj());
            d_vm.push(i_bus[i].conj() * v_norm[i]);
        }
    }

    let d_sbus_d_va = Coo::new(nb, nb, rows.clone(), cols.clone(), d_va)?.to_csr();
    let d_sbus_d_vm = Coo::new(nb, nb, rows, cols, d_vm)?.to_csr();

    Ok((d_sbus_d_va, d_sbus_d_vm))
}
