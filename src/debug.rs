use num_complex::Complex64;

pub fn format_f64_vec(v: &[f64]) -> String {
    let s: Vec<String> = v.iter().map(|x| format!("{:.6}", x)).collect();
    format!("[{}]", s.join(", "))
}

pub fn format_rect_vec(v: &[Complex64]) -> String {
    let s: Vec<String> = v
        .iter()
        .map(|x| format!("{:.6}{:+.6}j", x.re, x.im))
        .collect();
    format!("[{}]", s.join(", "))
}

pub fn format_polar_vec(v: &[Complex64]) -> String {
    let s: Vec<String> = v
        .iter()
        .map(|x| format!("{:.6}∠{:.4}", x.norm(), x.arg()))
        .collect();
    format!("[{}]", s.join(", "))
}
