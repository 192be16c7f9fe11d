//! Conflict-aware environment variable insertion.
//!
//! Bindings the application already defines always win: nothing here ever
//! overwrites an existing binding, except for path-list variables which are
//! extended in place.

use k8s_openapi::api::core::v1::{Container, EnvVar};

use crate::instrumentation::error::{ConflictingEnvVarSnafu, EnvSource, Error};

/// A variable an injector needs to own, checked before any mutation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EnvClaim {
    /// Must not exist at all, e.g. a dynamic-loader hook. Any existing
    /// binding is a conflict.
    Exclusive(&'static str),

    /// May exist with a literal value that the injector extends or keeps.
    /// Only a `valueFrom` reference is a conflict, since it cannot be
    /// extended at admission time.
    Extensible(&'static str),
}

impl EnvClaim {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Exclusive(name) | Self::Extensible(name) => name,
        }
    }
}

#[must_use]
pub fn index_of_env(env: &[EnvVar], name: &str) -> Option<usize> {
    env.iter().position(|var| var.name == name)
}

/// Rejects `env` if it already binds a variable in `claims` in a way the claim
/// forbids.
///
/// # Errors
///
/// Returns [`Error::ConflictingEnvVar`] naming the first offending variable
/// and whether it is set through `value` or `valueFrom`.
pub fn validate_container_env(env: &[EnvVar], claims: &[EnvClaim]) -> Result<(), Error> {
    for claim in claims {
        let Some(existing) = env.iter().find(|var| var.name == claim.name()) else {
            continue;
        };
        let via = if existing.value_from.is_some() { EnvSource::ValueFrom } else { EnvSource::Value };
        let conflicting = match claim {
            EnvClaim::Exclusive(_) => true,
            EnvClaim::Extensible(_) => via == EnvSource::ValueFrom,
        };
        if conflicting {
            return ConflictingEnvVarSnafu { name: existing.name.clone(), via }.fail();
        }
    }
    Ok(())
}

/// Appends every candidate whose name the container does not bind yet,
/// keeping candidate order.
pub fn merge_env(container: &mut Container, candidates: &[EnvVar]) {
    let env = container.env.get_or_insert_with(Vec::new);
    for candidate in candidates {
        if index_of_env(env, &candidate.name).is_none() {
            env.push(candidate.clone());
        }
    }
}

/// Like [`merge_env`], but leaves out candidates whose name is reserved by one
/// of `claims`. Claimed variables are set by the injector alone.
pub fn merge_unclaimed_env(container: &mut Container, candidates: &[EnvVar], claims: &[EnvClaim]) {
    let unclaimed = candidates
        .iter()
        .filter(|var| claims.iter().all(|claim| claim.name() != var.name))
        .cloned()
        .collect::<Vec<_>>();
    merge_env(container, &unclaimed);
}

/// Sets `name` to `value` unless the container already binds it.
pub fn set_if_absent(container: &mut Container, name: &str, value: &str) {
    let env = container.env.get_or_insert_with(Vec::new);
    if index_of_env(env, name).is_none() {
        env.push(literal(name, value));
    }
}

/// Appends `value` to the colon-separated list held by `name`, or sets it when
/// the variable is absent. Existing entries keep their order.
pub fn append_to_path_list(container: &mut Container, name: &str, value: &str) {
    let env = container.env.get_or_insert_with(Vec::new);
    match index_of_env(env, name) {
        None => env.push(literal(name, value)),
        Some(idx) => {
            let existing = &mut env[idx];
            // references are rejected up front; leave them alone
            if existing.value_from.is_none() {
                let current = existing.value.take().unwrap_or_default();
                existing.value = Some(format!("{current}:{value}"));
            }
        }
    }
}

fn literal(name: &str, value: &str) -> EnvVar {
    EnvVar { name: name.to_string(), value: Some(value.to_string()), ..EnvVar::default() }
}
