use anyhow::format_err;
use std::str::FromStr;

use crate::param::Parameterization;

/// Continuation stopping criterion.
#[derive(Debug, PartialEq, Copy, Clone)]
pub enum StopAt {
    /// Stop at the maximum loadability (nose) point.
    Nose,
    /// Trace the full continuation curve, back down to lambda = 0.
    Full,
    /// Stop at the given target lambda value.
    Lambda(f64),
}

impl FromStr for StopAt {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "NOSE" => Ok(Self::Nose),
            "FULL" => Ok(Self::Full),
            _ => s
                .parse::<f64>()
                .map(Self::Lambda)
                .map_err(|_| format_err!("stop point {:?} not recognized", s)),
        }
    }
}

/// Continuation power flow options.
pub struct CpfOpt {
    /// Continuation step length.
    pub step: f64,

    /// Parameterization scheme.
    pub parameterization: Parameterization,

    /// Use adaptive step size?
    pub adapt_step: bool,
    /// Minimum step size.
    pub step_min: f64,
    /// Maximum step size.
    pub step_max: f64,
    /// Target prediction error for the adaptive step size policy.
    pub error_tol: f64,

    /// Termination tolerance on the per unit augmented mismatch norm.
    pub tol: f64,
    /// Maximum number of Newton iterations per corrector call.
    pub max_it: usize,

    /// Stopping criterion.
    pub stop_at: StopAt,

    /// Progress reporting level: 0 silent, 1 stage summaries, >=2 per-step
    /// and per-iteration detail.
    pub verbose: usize,
}

impl Default for CpfOpt {
    fn default() -> Self {
        Self {
            step: 0.05,
            parameterization: Parameterization::PseudoArcLength,
            adapt_step: false,
            step_min: 1e-4,
            step_max: 0.2,
            error_tol: 1e-3,
            tol: 1e-6,
            max_it: 20,
            stop_at: StopAt::Nose,
            verbose: 0,
        }
    }
}
