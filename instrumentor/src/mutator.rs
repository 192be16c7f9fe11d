//! Applies a set of instrumentation descriptors to a whole pod.

use instrumentor_base::consts::k8s::annotations;
use k8s_openapi::{api::core::v1::Pod, apimachinery::pkg::apis::meta::v1::ObjectMeta};
use snafu::{ResultExt, Snafu};

use crate::{
    config::{Config, FailurePolicy},
    ext::PodExt,
    instrumentation::{
        self, InjectOptions, Instrumentation, Runtime, already_instrumented, apply_common_env,
        check_targets, find_duplicates, inherit_security_context, inject, resolve_targets,
    },
};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("Refusing to instrument pod {pod_name}, error: {source}"))]
    InvalidTargets { pod_name: String, source: instrumentation::Error },

    /// An injector failed under [`FailurePolicy::Reject`]. `pod` holds the
    /// pod as mutated by the injections that succeeded before.
    #[snafu(display(
        "Failed to inject {runtime} instrumentation into container {container} of pod \
         {pod_name}, error: {source}"
    ))]
    Inject {
        runtime: Runtime,
        container: String,
        pod_name: String,
        source: instrumentation::Error,
        pod: Box<Pod>,
    },
}

impl Error {
    /// The partially mutated pod, if the failure happened after some
    /// containers were instrumented.
    #[must_use]
    pub fn pod(&self) -> Option<&Pod> {
        match self {
            Self::InvalidTargets { .. } => None,
            Self::Inject { pod, .. } => Some(pod.as_ref()),
        }
    }
}

/// Drives the injectors over every target container of a pod.
#[derive(Clone, Debug, Default)]
pub struct PodMutator {
    instrumentations: Vec<Instrumentation>,
    options: InjectOptions,
    failure_policy: FailurePolicy,
}

impl PodMutator {
    #[must_use]
    pub const fn new(
        instrumentations: Vec<Instrumentation>,
        options: InjectOptions,
        failure_policy: FailurePolicy,
    ) -> Self {
        Self { instrumentations, options, failure_policy }
    }

    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.instrumentations.clone(), config.inject_options(), config.failure_policy)
    }

    #[must_use]
    pub fn instrumentations(&self) -> &[Instrumentation] { &self.instrumentations }

    /// Instruments `pod`, which lives in the namespace described by `ns`.
    ///
    /// Every container an injector succeeds on also receives the common
    /// service and resource environment, and the runtime's initializer takes
    /// over its security context.
    ///
    /// Pods that are already instrumented or have no main containers are
    /// returned unchanged, as are all pods when no descriptor is configured.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTargets`] when the container selection is
    /// invalid, before any container is touched, and [`Error::Inject`] when
    /// an injector fails under [`FailurePolicy::Reject`].
    pub fn mutate(&self, ns: &ObjectMeta, pod: Pod) -> Result<Pod, Error> {
        let pod_name = pod.display_name();
        if already_instrumented(&pod) {
            tracing::info!("Pod {pod_name} is already instrumented, skipping injection");
            return Ok(pod);
        }
        if self.instrumentations.is_empty() {
            tracing::debug!("No instrumentation configured, leaving pod {pod_name} unchanged");
            return Ok(pod);
        }
        if pod.main_container_count() == 0 {
            tracing::warn!("Pod {pod_name} has no containers, skipping injection");
            return Ok(pod);
        }

        let descriptors = self
            .resolve_descriptors(ns, &pod)
            .with_context(|_| InvalidTargetsSnafu { pod_name: pod_name.clone() })?;

        let mut pod = pod;
        for descriptor in &descriptors {
            let injector = descriptor.runtime.injector();
            for (index, container) in Self::target_containers(descriptor, &pod, &pod_name) {
                match inject(injector, descriptor, &pod, index, &self.options) {
                    Ok(mut mutated) => {
                        apply_common_env(&mut mutated, index, ns);
                        inherit_security_context(
                            &mut mutated,
                            index,
                            injector.init_container_name(),
                        );
                        tracing::info!(
                            "Injected {} instrumentation into container {container} of pod \
                             {pod_name}",
                            injector.runtime()
                        );
                        pod = mutated;
                    }
                    Err(source) if self.failure_policy == FailurePolicy::Skip => {
                        tracing::warn!(
                            "Skipping {} instrumentation of container {container} in pod \
                             {pod_name}, error: {source}",
                            injector.runtime()
                        );
                    }
                    Err(source) => {
                        return Err(source).context(InjectSnafu {
                            runtime: injector.runtime(),
                            container,
                            pod_name,
                            pod: Box::new(pod),
                        });
                    }
                }
            }
        }

        Ok(pod)
    }

    /// Copies of the configured descriptors with their target lists filled in
    /// from annotations, validated as a whole together with the pod's own
    /// container names.
    fn resolve_descriptors(
        &self,
        ns: &ObjectMeta,
        pod: &Pod,
    ) -> Result<Vec<Instrumentation>, instrumentation::Error> {
        if let Some(spec) = &pod.spec {
            find_duplicates(spec.containers.iter().map(|container| container.name.as_str()))?;
            find_duplicates(
                spec.init_containers.iter().flatten().map(|container| container.name.as_str()),
            )?;
        }

        let single = self.instrumentations.len() == 1;
        let mut descriptors = self.instrumentations.clone();
        for descriptor in &mut descriptors {
            let key = if single {
                annotations::CONTAINER_NAMES
            } else {
                descriptor.runtime.container_names_annotation()
            };
            resolve_targets(descriptor, ns, &pod.metadata, key)?;
        }
        check_targets(&descriptors)?;
        Ok(descriptors)
    }

    /// Index and name of every container `descriptor` applies to.
    fn target_containers(
        descriptor: &Instrumentation,
        pod: &Pod,
        pod_name: &str,
    ) -> Vec<(usize, String)> {
        let name_of = |index: usize| {
            pod.spec.as_ref().map(|spec| spec.containers[index].name.clone()).unwrap_or_default()
        };

        if descriptor.containers.is_empty() {
            return pod
                .default_container_index()
                .map(|index| (index, name_of(index)))
                .into_iter()
                .collect();
        }

        descriptor
            .containers
            .iter()
            .filter_map(|name| {
                let index = pod.container_index(name);
                if index.is_none() {
                    tracing::warn!(
                        "Container '{name}' of pod {pod_name} does not exist, skipping {} \
                         instrumentation",
                        descriptor.runtime
                    );
                }
                index.map(|index| (index, name.clone()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use instrumentor_base::consts::k8s::{containers, env};
    use k8s_openapi::api::core::v1::{Container, EnvVar, PodSpec, SecurityContext};

    use super::*;

    fn meta(annotations: &[(&str, &str)]) -> ObjectMeta {
        ObjectMeta {
            name: Some("checkout".to_string()),
            namespace: Some("shop".to_string()),
            annotations: Some(
                annotations.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect(),
            ),
            ..ObjectMeta::default()
        }
    }

    fn pod(annotations: &[(&str, &str)], names: &[&str]) -> Pod {
        Pod {
            metadata: meta(annotations),
            spec: Some(PodSpec {
                containers: names
                    .iter()
                    .map(|name| Container { name: (*name).to_string(), ..Container::default() })
                    .collect(),
                ..PodSpec::default()
            }),
            ..Pod::default()
        }
    }

    fn mutator(runtimes: &[Runtime], failure_policy: FailurePolicy) -> PodMutator {
        PodMutator::new(
            runtimes.iter().map(|runtime| Instrumentation::new(*runtime, "init:1.0")).collect(),
            InjectOptions::default(),
            failure_policy,
        )
    }

    fn env_names(pod: &Pod, index: usize) -> Vec<String> {
        pod.spec.as_ref().unwrap().containers[index]
            .env
            .iter()
            .flatten()
            .map(|var| var.name.clone())
            .collect()
    }

    fn init_names(pod: &Pod) -> Vec<String> {
        pod.spec
            .as_ref()
            .unwrap()
            .init_containers
            .iter()
            .flatten()
            .map(|container| container.name.clone())
            .collect()
    }

    fn preloaded() -> Vec<String> {
        [env::LD_PRELOAD, env::OTEL_SERVICE_NAME, env::NODE_NAME_MARKER, env::OTEL_RESOURCE_ATTRIBUTES]
            .into_iter()
            .map(ToString::to_string)
            .collect()
    }

    #[test]
    fn test_single_runtime_uses_default_container() {
        let input = pod(&[(annotations::DEFAULT_CONTAINER, "web")], &["sidecar", "web"]);
        let pod = mutator(&[Runtime::Preload], FailurePolicy::Reject)
            .mutate(&ObjectMeta::default(), input)
            .unwrap();

        assert!(env_names(&pod, 0).is_empty());
        assert_eq!(env_names(&pod, 1), preloaded());
        assert_eq!(init_names(&pod), vec![containers::PRELOAD_INIT.to_string()]);
    }

    #[test]
    fn test_single_runtime_uses_generic_annotation() {
        let ns = meta(&[(annotations::CONTAINER_NAMES, "web,worker")]);
        let pod = mutator(&[Runtime::Php], FailurePolicy::Reject)
            .mutate(&ns, pod(&[], &["web", "worker", "proxy"]))
            .unwrap();

        assert_eq!(env_names(&pod, 0), env_names(&pod, 1));
        assert!(!env_names(&pod, 0).is_empty());
        assert!(env_names(&pod, 2).is_empty());
        assert_eq!(init_names(&pod), vec![containers::PHP_INIT.to_string()]);
        assert_eq!(pod.spec.as_ref().unwrap().volumes.as_ref().map(Vec::len), Some(1));
    }

    #[test]
    fn test_multiple_runtimes_use_runtime_annotations() {
        let input = pod(
            &[
                (annotations::PHP_CONTAINER_NAMES, "web"),
                (annotations::PRELOAD_CONTAINER_NAMES, "worker,gone"),
            ],
            &["web", "worker"],
        );
        let pod = mutator(&[Runtime::Preload, Runtime::Php], FailurePolicy::Reject)
            .mutate(&ObjectMeta::default(), input)
            .unwrap();

        assert!(env_names(&pod, 0).contains(&env::PHP_INI_SCAN_DIR.to_string()));
        assert_eq!(env_names(&pod, 1), preloaded());
        assert_eq!(init_names(&pod), vec![
            containers::PRELOAD_INIT.to_string(),
            containers::PHP_INIT.to_string()
        ]);
    }

    #[test]
    fn test_multiple_runtimes_require_names() {
        let input = pod(&[(annotations::PHP_CONTAINER_NAMES, "web")], &["web", "worker"]);
        let err = mutator(&[Runtime::Preload, Runtime::Php], FailurePolicy::Reject)
            .mutate(&ObjectMeta::default(), input)
            .unwrap_err();

        assert!(matches!(
            err,
            Error::InvalidTargets { source: instrumentation::Error::MissingContainerNames, .. }
        ));
        assert!(err.pod().is_none());
    }

    #[test]
    fn test_shared_container_is_rejected() {
        let input = pod(
            &[
                (annotations::PHP_CONTAINER_NAMES, "web"),
                (annotations::PRELOAD_CONTAINER_NAMES, "web"),
            ],
            &["web"],
        );
        let err = mutator(&[Runtime::Preload, Runtime::Php], FailurePolicy::Skip)
            .mutate(&ObjectMeta::default(), input)
            .unwrap_err();

        assert!(err.to_string().contains("duplicated container names detected: [web]"));
    }

    #[test]
    fn test_duplicated_pod_containers_are_rejected() {
        let err = mutator(&[Runtime::Php], FailurePolicy::Reject)
            .mutate(&ObjectMeta::default(), pod(&[], &["app", "app"]))
            .unwrap_err();

        assert!(matches!(
            err,
            Error::InvalidTargets {
                source: instrumentation::Error::DuplicatedContainerNames { .. },
                ..
            }
        ));
    }

    #[test]
    fn test_already_instrumented_pod_is_unchanged() {
        let mut input = pod(&[], &["app"]);
        input.spec.as_mut().unwrap().init_containers = Some(vec![Container {
            name: containers::JAVA_INIT.to_string(),
            ..Container::default()
        }]);

        let pod = mutator(&[Runtime::Preload], FailurePolicy::Reject)
            .mutate(&ObjectMeta::default(), input.clone())
            .unwrap();
        assert_eq!(pod, input);
    }

    #[test]
    fn test_initializer_inherits_security_context() {
        let restricted = SecurityContext { run_as_non_root: Some(true), ..SecurityContext::default() };
        let mut input = pod(&[], &["app"]);
        input.spec.as_mut().unwrap().containers[0].security_context = Some(restricted.clone());
        let engine = mutator(&[Runtime::Php], FailurePolicy::Reject);

        let pod = engine.mutate(&ObjectMeta::default(), input).unwrap();
        let init = &pod.spec.as_ref().unwrap().init_containers.as_ref().unwrap()[0];
        assert_eq!(init.name, containers::PHP_INIT);
        assert_eq!(init.security_context, Some(restricted));

        let again = engine.mutate(&ObjectMeta::default(), pod.clone()).unwrap();
        assert_eq!(again, pod);
    }

    #[test]
    fn test_failure_policy() {
        let ld_preload = EnvVar {
            name: env::LD_PRELOAD.to_string(),
            value: Some("/usr/lib/libjemalloc.so".to_string()),
            ..EnvVar::default()
        };
        let mut input = pod(&[(annotations::CONTAINER_NAMES, "a,b")], &["a", "b"]);
        input.spec.as_mut().unwrap().containers[1].env = Some(vec![ld_preload]);

        let err = mutator(&[Runtime::Preload], FailurePolicy::Reject)
            .mutate(&ObjectMeta::default(), input.clone())
            .unwrap_err();
        assert!(matches!(err, Error::Inject { ref container, .. } if container == "b"));
        let partial = err.pod().unwrap();
        assert_eq!(env_names(partial, 0), preloaded());
        assert_eq!(init_names(partial), vec![containers::PRELOAD_INIT.to_string()]);

        let pod = mutator(&[Runtime::Preload], FailurePolicy::Skip)
            .mutate(&ObjectMeta::default(), input.clone())
            .unwrap();
        assert_eq!(env_names(&pod, 0), preloaded());
        assert_eq!(
            pod.spec.as_ref().unwrap().containers[1],
            input.spec.as_ref().unwrap().containers[1]
        );
    }

    #[test]
    fn test_nothing_to_do() {
        let input = pod(&[], &["app"]);
        let pod =
            mutator(&[], FailurePolicy::Reject).mutate(&ObjectMeta::default(), input.clone()).unwrap();
        assert_eq!(pod, input);

        let empty = pod_without_containers();
        let pod = mutator(&[Runtime::Php], FailurePolicy::Reject)
            .mutate(&ObjectMeta::default(), empty.clone())
            .unwrap();
        assert_eq!(pod, empty);
    }

    fn pod_without_containers() -> Pod { pod(&[], &[]) }
}
