//! Extensions to Kubernetes API types.
//!
//! Lookups on `k8s_openapi` values that the mutator and the CLI share.

mod pod;

pub use self::pod::PodExt;
