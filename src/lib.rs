mod corrector;
pub mod debug;
mod dense;
mod derivative;
mod jacobian;
mod math;
mod opt;
mod param;
mod predictor;
mod progress;
mod runcpf;

pub use corrector::*;
pub use dense::*;
pub use derivative::*;
pub use jacobian::*;
pub use opt::*;
pub use param::*;
pub use predictor::*;
pub use progress::*;
pub use runcpf::*;
