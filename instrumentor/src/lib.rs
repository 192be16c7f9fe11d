//! Admission-time auto-instrumentation injection for Kubernetes pods.
//!
//! The [`instrumentation`] module holds the pure pod-mutation engine: it
//! decides which containers receive instrumentation, attaches the scratch
//! volume and initializer, and rewrites container environments without ever
//! clobbering a value the application owner set. [`mutator`] drives the
//! engine for a whole pod and a set of instrumentation descriptors.

pub mod config;
pub mod ext;
pub mod instrumentation;
pub mod mutator;

pub use instrumentor_base::{CLI_CONFIG_NAME, CLI_PROGRAM_NAME, PROJECT_NAME, PROJECT_VERSION};
