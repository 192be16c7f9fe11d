use std::{fmt, str::FromStr};

use instrumentor_base::consts::k8s::annotations;
use k8s_openapi::{
    api::core::v1::{EnvVar, PersistentVolumeClaimTemplate, ResourceRequirements},
    apimachinery::pkg::api::resource::Quantity,
};
use serde::{Deserialize, Serialize};
use snafu::Snafu;

use crate::instrumentation::injector::{Injector, PhpInjector, PreloadInjector};

/// Runtimes the engine knows how to instrument.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Runtime {
    /// Language-agnostic instrumentation through the dynamic-loader preload
    /// hook.
    #[default]
    Preload,
    Php,
}

impl Runtime {
    pub const ALL: [Self; 2] = [Self::Preload, Self::Php];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Preload => "preload",
            Self::Php => "php",
        }
    }

    /// The annotation naming this runtime's target containers when a pod
    /// requests more than one runtime.
    #[must_use]
    pub const fn container_names_annotation(self) -> &'static str {
        match self {
            Self::Preload => annotations::PRELOAD_CONTAINER_NAMES,
            Self::Php => annotations::PHP_CONTAINER_NAMES,
        }
    }

    #[must_use]
    pub fn injector(self) -> &'static dyn Injector {
        match self {
            Self::Preload => &PreloadInjector,
            Self::Php => &PhpInjector,
        }
    }
}

impl fmt::Display for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for Runtime {
    type Err = ParseRuntimeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|runtime| runtime.as_str().eq_ignore_ascii_case(value))
            .ok_or_else(|| ParseRuntimeError::Unknown { value: value.to_string() })
    }
}

#[derive(Debug, Snafu)]
pub enum ParseRuntimeError {
    #[snafu(display("'{value}' is not a supported runtime"))]
    Unknown { value: String },
}

/// Pull policy applied to the initializer container.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum ImagePullPolicy {
    #[default]
    IfNotPresent,
    Always,
    Never,
}

impl ImagePullPolicy {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::IfNotPresent => "IfNotPresent",
            Self::Always => "Always",
            Self::Never => "Never",
        }
    }
}

impl fmt::Display for ImagePullPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Runtime-specific instrumentation settings resolved from cluster
/// configuration. The engine only reads descriptors, except for the target
/// list filled in by [`resolve_targets`](crate::instrumentation::resolve_targets).
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Instrumentation {
    pub runtime: Runtime,

    /// Image of the initializer that places the instrumentation artifacts.
    pub image: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_pull_policy: Option<ImagePullPolicy>,

    #[serde(default)]
    pub resources: ResourceRequirements,

    /// Size limit of the scratch directory. Ignored when
    /// `volume_claim_template` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_size_limit: Option<Quantity>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_claim_template: Option<PersistentVolumeClaimTemplate>,

    /// Bindings merged into every target container unless the container
    /// already defines them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,

    /// Names of the main containers to instrument. Empty means the pod's
    /// default container.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub containers: Vec<String>,
}

impl Instrumentation {
    #[must_use]
    pub fn new(runtime: Runtime, image: impl Into<String>) -> Self {
        Self { runtime, image: image.into(), ..Self::default() }
    }
}
