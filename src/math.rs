use num_complex::Complex64;

pub(crate) const J: Complex64 = Complex64 { re: 0.0, im: 1.0 };

/// Euclidean norm of a real vector.
pub(crate) fn norm(x: &[f64]) -> f64 {
    x.iter().map(|x| x * x).sum::<f64>().sqrt()
}
