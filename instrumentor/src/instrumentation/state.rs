//! Idempotence checks over a pod.

use instrumentor_base::consts::k8s::{containers, env};
use k8s_openapi::api::core::v1::Pod;

/// Every initializer container name that marks a pod as instrumented,
/// including runtimes this engine does not inject itself.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum KnownInitializer {
    Java,
    NodeJs,
    Python,
    DotNet,
    Php,
    Preload,
    ApacheHttpd,
    Nginx,
}

impl KnownInitializer {
    pub const ALL: [Self; 8] = [
        Self::Java,
        Self::NodeJs,
        Self::Python,
        Self::DotNet,
        Self::Php,
        Self::Preload,
        Self::ApacheHttpd,
        Self::Nginx,
    ];

    #[must_use]
    pub const fn container_name(self) -> &'static str {
        match self {
            Self::Java => containers::JAVA_INIT,
            Self::NodeJs => containers::NODEJS_INIT,
            Self::Python => containers::PYTHON_INIT,
            Self::DotNet => containers::DOTNET_INIT,
            Self::Php => containers::PHP_INIT,
            Self::Preload => containers::PRELOAD_INIT,
            Self::ApacheHttpd => containers::APACHE_HTTPD_INIT,
            Self::Nginx => containers::NGINX_INIT,
        }
    }

    #[must_use]
    pub fn from_container_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|known| known.container_name() == name)
    }
}

/// Whether the pod has no init container named exactly `name`.
#[must_use]
pub fn init_container_missing(pod: &Pod, name: &str) -> bool {
    !pod.spec
        .iter()
        .flat_map(|spec| spec.init_containers.iter().flatten())
        .any(|container| container.name == name)
}

/// Known initializers present among the pod's init containers, in pod order.
#[must_use]
pub fn present_initializers(pod: &Pod) -> Vec<KnownInitializer> {
    pod.spec
        .iter()
        .flat_map(|spec| spec.init_containers.iter().flatten())
        .filter_map(|container| KnownInitializer::from_container_name(&container.name))
        .collect()
}

/// Whether any runtime has already instrumented the pod.
///
/// True when a known initializer is present, when the sidecar marker
/// container runs among the main containers, or when a main container other
/// than the sidecar carries the node-identity marker variable.
#[must_use]
pub fn already_instrumented(pod: &Pod) -> bool {
    if !present_initializers(pod).is_empty() {
        return true;
    }

    let Some(spec) = &pod.spec else {
        return false;
    };
    spec.containers.iter().any(|container| {
        container.name == containers::SIDECAR_MARKER
            || container.env.iter().flatten().any(|var| var.name == env::NODE_NAME_MARKER)
    })
}
