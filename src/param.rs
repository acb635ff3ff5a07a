use clap::ValueEnum;
use num_complex::Complex64;

/// Parameterization scheme of the continuation.
///
/// Centralizes the scheme -> (P, dP/dV, dP/dlam) mapping consumed by both
/// the predictor and the corrector; the same variant must be used for
/// [cpf_p] and [cpf_p_jac] within one predictor or corrector call.
#[derive(Debug, PartialEq, Copy, Clone, ValueEnum)]
pub enum Parameterization {
    /// Natural parameterization (progress measured directly in lambda).
    Natural = 0,
    /// Arc length.
    ArcLength = 1,
    /// Pseudo arc length (normalized tangent).
    PseudoArcLength = 2,
}

/// Computes the value of the CPF parameterization function at the current
/// solution point.
///
/// `z` is the normalized tangent prediction vector from the previous step,
/// laid out as `[Va(0..nb), Vm(nb..2nb), lambda]`. `v_prv` and `lam_prv`
/// are the solution accepted at the previous continuation step and `step`
/// is the continuation step size.
#[allow(clippy::too_many_arguments)]
pub fn cpf_p(
    parameterization: Parameterization,
    step: f64,
    z: &[f64],
    v: &[Complex64],
    lam: f64,
    v_prv: &[Complex64],
    lam_prv: f64,
    pvpq: &[usize],
    pq: &[usize],
) -> f64 {
    match parameterization {
        Parameterization::Natural => {
            if lam >= lam_prv {
                lam - lam_prv - step
            } else {
                lam_prv - lam - step
            }
        }
        Parameterization::ArcLength => {
            let dlam = lam - lam_prv;
            let p: f64 = pvpq
                .iter()
                .map(|&i| (v[i].arg() - v_prv[i].arg()).powi(2))
                .chain(
                    pq.iter()
                        .map(|&i| (v[i].norm() - v_prv[i].norm()).powi(2)),
                )
                .sum();
            p + dlam * dlam - step * step
        }
        Parameterization::PseudoArcLength => {
            let nb = v.len();
            let p: f64 = pvpq
                .iter()
                .map(|&i| z[i] * (v[i].arg() - v_prv[i].arg()))
                .chain(
                    pq.iter()
                        .map(|&i| z[nb + i] * (v[i].norm() - v_prv[i].norm())),
                )
                .sum();
            p + z[2 * nb] * (lam - lam_prv) - step
        }
    }
}

/// Computes the partial derivatives of the CPF parameterization function
/// w.r.t. the voltage unknowns and lambda.
///
/// The voltage gradient is laid out over `[Va(pvpq), Vm(pq)]`, matching the
/// Newton correction vector.
#[allow(clippy::too_many_arguments)]
pub fn cpf_p_jac(
    parameterization: Parameterization,
    z: &[f64],
    v: &[Complex64],
    lam: f64,
    v_prv: &[Complex64],
    lam_prv: f64,
    pvpq: &[usize],
    pq: &[usize],
) -> (Vec<f64>, f64) {
    match parameterization {
        Parameterization::Natural => {
            let d_p_d_v = vec![0.0; pvpq.len() + pq.len()];
            let d_p_d_lam = if lam >= lam_prv { 1.0 } else { -1.0 };
            (d_p_d_v, d_p_d_lam)
        }
        Parameterization::ArcLength => {
            let d_p_d_v: Vec<f64> = pvpq
                .iter()
                .map(|&i| 2.0 * (v[i].arg() - v_prv[i].arg()))
                .chain(
                    pq.iter()
                        .map(|&i| 2.0 * (v[i].norm() - v_prv[i].norm())),
                )
                .collect();
            let d_p_d_lam = if lam == lam_prv {
                // first step; a zero row here would make the augmented
                // Jacobian singular
                1.0
            } else {
                2.0 * (lam - lam_prv)
            };
            (d_p_d_v, d_p_d_lam)
        }
        Parameterization::PseudoArcLength => {
            let nb = v.len();
            let d_p_d_v: Vec<f64> = pvpq
                .iter()
                .map(|&i| z[i])
                .chain(pq.iter().map(|&i| z[nb + i]))
                .collect();
            (d_p_d_v, z[2 * nb])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PVPQ: [usize; 2] = [1, 2];
    const PQ: [usize; 1] = [2];

    fn state() -> (Vec<Complex64>, Vec<Complex64>, Vec<f64>) {
        let v = vec![
            Complex64::from_polar(1.0, 0.0),
            Complex64::from_polar(1.02, -0.02),
            Complex64::from_polar(0.97, -0.05),
        ];
        let v_prv = vec![
            Complex64::from_polar(1.0, 0.0),
            Complex64::from_polar(1.03, -0.015),
            Complex64::from_polar(0.99, -0.04),
        ];
        // layout [Va(0..3), Vm(3..6), lambda]; ref/pv magnitude slots unused
        let z = vec![0.0, 0.4, -0.3, 0.0, 0.0, 0.5, 0.7];
        (v, v_prv, z)
    }

    /// Perturbs `(Va[pvpq], Vm[pq], lam)` by `eps` along `dir`.
    fn perturb(
        v: &[Complex64],
        lam: f64,
        dir: &[f64],
        eps: f64,
    ) -> (Vec<Complex64>, f64) {
        let mut va: Vec<f64> = v.iter().map(|v| v.arg()).collect();
        let mut vm: Vec<f64> = v.iter().map(|v| v.norm()).collect();
        for (k, &b) in PVPQ.iter().enumerate() {
            va[b] += eps * dir[k];
        }
        for (k, &b) in PQ.iter().enumerate() {
            vm[b] += eps * dir[PVPQ.len() + k];
        }
        let lam = lam + eps * dir[PVPQ.len() + PQ.len()];
        let v = va
            .iter()
            .zip(&vm)
            .map(|(&a, &m)| Complex64::from_polar(m, a))
            .collect();
        (v, lam)
    }

    fn check_gradient(parameterization: Parameterization) {
        let (v, v_prv, z) = state();
        let (lam, lam_prv, step) = (0.45, 0.4, 0.07);
        let dir = [0.3, -0.2, 0.5, 0.7];
        let eps = 1e-7;

        let (d_p_d_v, d_p_d_lam) =
            cpf_p_jac(parameterization, &z, &v, lam, &v_prv, lam_prv, &PVPQ, &PQ);
        let analytic: f64 = d_p_d_v
            .iter()
            .zip(&dir[..3])
            .map(|(g, d)| g * d)
            .sum::<f64>()
            + d_p_d_lam * dir[3];

        let (v_pos, lam_pos) = perturb(&v, lam, &dir, eps);
        let (v_neg, lam_neg) = perturb(&v, lam, &dir, -eps);
        let p_pos = cpf_p(
            parameterization, step, &z, &v_pos, lam_pos, &v_prv, lam_prv, &PVPQ, &PQ,
        );
        let p_neg = cpf_p(
            parameterization, step, &z, &v_neg, lam_neg, &v_prv, lam_prv, &PVPQ, &PQ,
        );
        let fd = (p_pos - p_neg) / (2.0 * eps);

        assert!(
            (analytic - fd).abs() < 1e-6,
            "{:?}: analytic = {}, fd = {}",
            parameterization,
            analytic,
            fd
        );
    }

    #[test]
    fn natural_gradient_matches_finite_difference() {
        check_gradient(Parameterization::Natural);
    }

    #[test]
    fn arc_length_gradient_matches_finite_difference() {
        check_gradient(Parameterization::ArcLength);
    }

    #[test]
    fn pseudo_arc_length_gradient_matches_finite_difference() {
        check_gradient(Parameterization::PseudoArcLength);
    }

    #[test]
    fn arc_length_falls_back_to_unit_lambda_gradient_on_first_step() {
        let (v, _, z) = state();
        // first step: lam == lam_prv and V == Vprv
        let (d_p_d_v, d_p_d_lam) =
            cpf_p_jac(Parameterization::ArcLength, &z, &v, 0.0, &v, 0.0, &PVPQ, &PQ);
        assert!(d_p_d_v.iter().all(|&g| g == 0.0));
        assert_eq!(d_p_d_lam, 1.0);
    }

    #[test]
    fn natural_measures_progress_against_the_direction_of_travel() {
        let (v, v_prv, z) = state();
        // decreasing lambda on the lower branch of the curve
        let p = cpf_p(
            Parameterization::Natural, 0.1, &z, &v, 0.3, &v_prv, 0.45, &PVPQ, &PQ,
        );
        assert!((p - (0.45 - 0.3 - 0.1)).abs() < 1e-15);
        let (_, d_p_d_lam) = cpf_p_jac(
            Parameterization::Natural, &z, &v, 0.3, &v_prv, 0.45, &PVPQ, &PQ,
        );
        assert_eq!(d_p_d_lam, -1.0);
    }
}
