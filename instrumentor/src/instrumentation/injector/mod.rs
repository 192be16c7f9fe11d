//! Per-runtime injection.
//!
//! Every runtime follows the same sequence, modelled by [`Injection`]:
//! reject conflicting environment, merge the descriptor's bindings except the
//! ones the runtime claims, apply the runtime's own variables, mount the instrumentation volume, and on the
//! first call for a pod provision the volume and the initializer.

mod php;
mod preload;

use k8s_openapi::{
    api::core::v1::{Container, EnvVar, Pod, PodSpec, VolumeMount},
    apimachinery::pkg::api::resource::Quantity,
};

pub use self::{php::PhpInjector, preload::PreloadInjector};
use crate::instrumentation::{
    descriptor::{Instrumentation, Runtime},
    env::{self, EnvClaim},
    error::Error,
    state::init_container_missing,
    volume::{build_volume, default_volume_size_limit},
};

/// Settings shared by every injector call, supplied by the caller.
#[derive(Clone, Debug, PartialEq)]
pub struct InjectOptions {
    /// Scratch size for descriptors that set neither a size limit nor a
    /// claim template.
    pub default_volume_size_limit: Quantity,
}

impl Default for InjectOptions {
    fn default() -> Self { Self { default_volume_size_limit: default_volume_size_limit() } }
}

/// The runtime-specific half of an injection.
pub trait Injector {
    fn runtime(&self) -> Runtime;

    fn init_container_name(&self) -> &'static str;

    fn volume_name(&self) -> &'static str;

    fn mount_path(&self) -> &'static str;

    /// Variables that must be checked before the container is touched.
    fn env_claims(&self) -> &'static [EnvClaim];

    /// Sets the runtime's own variables on a target container.
    fn apply_runtime_env(&self, container: &mut Container);

    /// Command of the initializer, `None` to run the image entrypoint.
    fn init_command(&self) -> Option<Vec<String>> { None }

    /// Environment of the initializer.
    fn init_env(&self) -> Option<Vec<EnvVar>> { None }

    fn volume_mount(&self) -> VolumeMount {
        VolumeMount {
            name: self.volume_name().to_string(),
            mount_path: self.mount_path().to_string(),
            ..VolumeMount::default()
        }
    }

    /// The init container that places the artifacts into the volume.
    fn init_container(&self, descriptor: &Instrumentation) -> Container {
        Container {
            name: self.init_container_name().to_string(),
            image: Some(descriptor.image.clone()),
            image_pull_policy: descriptor.image_pull_policy.map(|policy| policy.to_string()),
            command: self.init_command(),
            env: self.init_env(),
            resources: Some(descriptor.resources.clone()),
            volume_mounts: Some(vec![self.volume_mount()]),
            ..Container::default()
        }
    }
}

/// Position of an [`Injection`] in its sequence.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Step {
    CheckConflict,
    MergeEnv,
    RuntimeEnv,
    MountVolume,
    Provision,
    Done,
}

/// One injector applied to one container of one pod.
///
/// The injection works on its own copy of the pod, so a failing step never
/// affects the caller's pod.
pub struct Injection<'a> {
    injector: &'a dyn Injector,
    descriptor: &'a Instrumentation,
    options: &'a InjectOptions,
    pod: Pod,
    index: usize,
    step: Step,
}

impl<'a> Injection<'a> {
    #[must_use]
    pub fn new(
        injector: &'a dyn Injector,
        descriptor: &'a Instrumentation,
        options: &'a InjectOptions,
        pod: &Pod,
        index: usize,
    ) -> Self {
        Self { injector, descriptor, options, pod: pod.clone(), index, step: Step::CheckConflict }
    }

    #[must_use]
    pub const fn step(&self) -> Step { self.step }

    #[must_use]
    pub const fn pod(&self) -> &Pod { &self.pod }

    /// Runs the current step and moves to the next one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConflictingEnvVar`] from [`Step::CheckConflict`].
    ///
    /// # Panics
    ///
    /// Panics if the container index does not point at a main container.
    pub fn advance(&mut self) -> Result<Step, Error> {
        self.step = match self.step {
            Step::CheckConflict => {
                let env = self.container().env.as_deref().unwrap_or_default();
                env::validate_container_env(env, self.injector.env_claims())?;
                Step::MergeEnv
            }
            Step::MergeEnv => {
                let Self { injector, descriptor, .. } = *self;
                env::merge_unclaimed_env(
                    self.container_mut(),
                    &descriptor.env,
                    injector.env_claims(),
                );
                Step::RuntimeEnv
            }
            Step::RuntimeEnv => {
                let injector = self.injector;
                injector.apply_runtime_env(self.container_mut());
                Step::MountVolume
            }
            Step::MountVolume => {
                let mount = self.injector.volume_mount();
                self.container_mut().volume_mounts.get_or_insert_with(Vec::new).push(mount);
                Step::Provision
            }
            Step::Provision => {
                if init_container_missing(&self.pod, self.injector.init_container_name()) {
                    self.provision();
                }
                Step::Done
            }
            Step::Done => Step::Done,
        };
        Ok(self.step)
    }

    /// Runs every remaining step and returns the mutated pod.
    ///
    /// # Errors
    ///
    /// See [`Injection::advance`].
    pub fn run(mut self) -> Result<Pod, Error> {
        while self.step != Step::Done {
            let _step = self.advance()?;
        }
        Ok(self.pod)
    }

    fn provision(&mut self) {
        let Self { injector, descriptor, options, .. } = *self;
        let volume = build_volume(
            descriptor.volume_claim_template.as_ref(),
            injector.volume_name(),
            descriptor.volume_size_limit.as_ref(),
            &options.default_volume_size_limit,
        );
        let spec = self.spec_mut();
        spec.volumes.get_or_insert_with(Vec::new).push(volume);
        spec.init_containers
            .get_or_insert_with(Vec::new)
            .push(injector.init_container(descriptor));
    }

    fn spec_mut(&mut self) -> &mut PodSpec { self.pod.spec.get_or_insert_with(PodSpec::default) }

    fn container(&self) -> &Container {
        let containers = self.pod.spec.as_ref().map(|spec| spec.containers.as_slice());
        &containers.unwrap_or_default()[self.index]
    }

    fn container_mut(&mut self) -> &mut Container {
        let index = self.index;
        &mut self.spec_mut().containers[index]
    }
}

/// Applies `injector` to the main container at `index`.
///
/// Returns a new pod; `pod` itself is never modified, so on error the caller
/// still holds the pod exactly as it was before the call. Only the first call
/// for a given pod adds the volume and the initializer.
///
/// # Errors
///
/// Returns [`Error::ConflictingEnvVar`] if the container already binds a
/// variable the runtime must own.
///
/// # Panics
///
/// Panics if `index` does not point at a main container; callers must check
/// that the pod has one.
pub fn inject(
    injector: &dyn Injector,
    descriptor: &Instrumentation,
    pod: &Pod,
    index: usize,
    options: &InjectOptions,
) -> Result<Pod, Error> {
    Injection::new(injector, descriptor, options, pod, index).run()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn app_pod(names: &[&str]) -> Pod {
        Pod {
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

    pub(crate) fn env_of(pod: &Pod, index: usize) -> Vec<(String, Option<String>)> {
        pod.spec.as_ref().unwrap().containers[index]
            .env
            .iter()
            .flatten()
            .map(|var| (var.name.clone(), var.value.clone()))
            .collect()
    }

    #[test]
    fn test_steps_run_in_order() {
        let descriptor = Instrumentation {
            env: vec![EnvVar {
                name: "OTEL_SERVICE_NAME".to_string(),
                value: Some("checkout".to_string()),
                ..EnvVar::default()
            }],
            ..Instrumentation::new(Runtime::Preload, "injector:1.0")
        };
        let options = InjectOptions::default();
        let pod = app_pod(&["app"]);
        let mut injection = Injection::new(&PreloadInjector, &descriptor, &options, &pod, 0);

        assert_eq!(injection.step(), Step::CheckConflict);
        assert_eq!(injection.advance().unwrap(), Step::MergeEnv);
        assert!(env_of(injection.pod(), 0).is_empty());

        assert_eq!(injection.advance().unwrap(), Step::RuntimeEnv);
        assert_eq!(env_of(injection.pod(), 0).len(), 1);

        assert_eq!(injection.advance().unwrap(), Step::MountVolume);
        assert_eq!(env_of(injection.pod(), 0).len(), 2);

        assert_eq!(injection.advance().unwrap(), Step::Provision);
        let spec = injection.pod().spec.as_ref().unwrap();
        assert_eq!(spec.containers[0].volume_mounts.as_ref().map(Vec::len), Some(1));
        assert!(spec.init_containers.is_none());

        assert_eq!(injection.advance().unwrap(), Step::Done);
        let spec = injection.pod().spec.as_ref().unwrap();
        assert_eq!(spec.init_containers.as_ref().map(Vec::len), Some(1));
        assert_eq!(spec.volumes.as_ref().map(Vec::len), Some(1));

        assert_eq!(injection.advance().unwrap(), Step::Done);
    }

    #[test]
    fn test_inject_leaves_input_untouched() {
        let descriptor = Instrumentation::new(Runtime::Php, "php:1.0");
        let pod = app_pod(&["app"]);
        let mutated = inject(&PhpInjector, &descriptor, &pod, 0, &InjectOptions::default()).unwrap();

        assert_eq!(pod, app_pod(&["app"]));
        assert_ne!(mutated, pod);
    }
}
