//! The pod-mutation engine.
//!
//! Pure functions over `k8s-openapi` values: nothing here logs or talks to a
//! cluster. Failures are returned as [`Error`] and it is up to the caller to
//! decide whether a pod is rejected or admitted unchanged.

mod common;
mod descriptor;
mod env;
mod error;
mod injector;
mod selection;
mod state;
mod volume;

pub use self::{
    common::{apply_common_env, inherit_security_context},
    descriptor::{ImagePullPolicy, Instrumentation, ParseRuntimeError, Runtime},
    env::{
        EnvClaim, append_to_path_list, index_of_env, merge_env, merge_unclaimed_env, set_if_absent,
        validate_container_env,
    },
    error::{EnvSource, Error},
    injector::{
        InjectOptions, Injection, Injector, PhpInjector, PreloadInjector, Step, inject,
    },
    selection::{
        annotation_value, check_targets, find_duplicates, resolve_targets,
        validate_container_names,
    },
    state::{KnownInitializer, already_instrumented, init_container_missing, present_initializers},
    volume::{build_volume, default_volume_size_limit},
};
