//! Capture requests, per-frame results and the convergence rules over them.

mod policy;
mod request;
mod result;

pub use policy::{ae_convergence, af_convergence, Convergence};
pub use request::{AeMode, AfMode, AfTrigger, CaptureRequest, PrecaptureTrigger, RequestTemplate};
pub use result::{AeState, AfState, CaptureResult, Completion, ResultKey};
