//! Table rendering for runtimes and pod injection state.

mod pod_status_ext;
mod runtime_ext;

pub use self::{pod_status_ext::PodStatusExt, runtime_ext::RuntimeExt};
