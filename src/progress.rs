/// Observer of continuation progress, invoked at well-defined points of
/// the predictor/corrector loop. Implementations must not mutate solver
/// state; reporting is their only concern.
pub trait ProgressMonitor {
    /// A corrector Newton iteration completed (`i == 0` for the initial
    /// mismatch check).
    fn update(&self, i: usize, norm_f: f64);

    /// A continuation step was accepted.
    fn step_accepted(&self, cont_steps: usize, lam: f64, iterations: usize);

    /// The continuation run terminated.
    fn terminated(&self, cont_steps: usize, lam: f64, success: bool);
}

/// Prints progress to standard output, honoring the configured verbosity
/// level: 0 silent, 1 stage summaries, >=2 per-step and per-iteration
/// detail.
pub struct PrintProgress {
    pub verbose: usize,
}

impl ProgressMonitor for PrintProgress {
    fn update(&self, i: usize, norm_f: f64) {
        if self.verbose > 1 {
            if i == 0 {
                println!(" it    max P & Q mismatch (p.u.)");
                println!("----  ---------------------------");
            }
            println!("{:3}        {:10.3e}", i, norm_f);
        }
    }

    fn step_accepted(&self, cont_steps: usize, lam: f64, iterations: usize) {
        if self.verbose > 1 {
            println!(
                "step {}: lambda = {:.6}, {} corrector Newton steps",
                cont_steps, lam, iterations
            );
        }
    }

    fn terminated(&self, cont_steps: usize, lam: f64, success: bool) {
        if self.verbose > 0 {
            if success {
                println!(
                    "continuation terminated in {} steps, lambda = {:.6}",
                    cont_steps, lam
                );
            } else {
                println!(
                    "continuation aborted in {} steps, lambda = {:.6}",
                    cont_steps, lam
                );
            }
        }
    }
}
