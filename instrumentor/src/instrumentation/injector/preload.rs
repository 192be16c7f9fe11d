//! Language-agnostic instrumentation through the dynamic-loader preload hook.
//!
//! The initializer image places its shared object into the volume by itself;
//! it is only told where the volume is mounted.

use instrumentor_base::consts::k8s::{containers, env, mount_paths, volumes};
use k8s_openapi::api::core::v1::{Container, EnvVar};

use crate::instrumentation::{
    descriptor::Runtime,
    env::{EnvClaim, set_if_absent},
    injector::Injector,
};

#[derive(Clone, Copy, Debug, Default)]
pub struct PreloadInjector;

impl Injector for PreloadInjector {
    fn runtime(&self) -> Runtime { Runtime::Preload }

    fn init_container_name(&self) -> &'static str { containers::PRELOAD_INIT }

    fn volume_name(&self) -> &'static str { volumes::PRELOAD }

    fn mount_path(&self) -> &'static str { mount_paths::PRELOAD }

    fn env_claims(&self) -> &'static [EnvClaim] { &[EnvClaim::Exclusive(env::LD_PRELOAD)] }

    fn apply_runtime_env(&self, container: &mut Container) {
        set_if_absent(container, env::LD_PRELOAD, env::LD_PRELOAD_VALUE);
    }

    fn init_env(&self) -> Option<Vec<EnvVar>> {
        Some(vec![EnvVar {
            name: env::INJECTOR_DESTINATION_FOLDER.to_string(),
            value: Some(mount_paths::PRELOAD.to_string()),
            ..EnvVar::default()
        }])
    }
}

#[cfg(test)]
mod tests {
    use k8s_openapi::{
        api::core::v1::{EnvVarSource, Pod, SecretKeySelector},
        apimachinery::pkg::api::resource::Quantity,
    };

    use super::*;
    use crate::instrumentation::{
        Error,
        descriptor::Instrumentation,
        error::EnvSource,
        injector::{
            InjectOptions, inject,
            tests::{app_pod, env_of},
        },
    };

    fn descriptor() -> Instrumentation {
        Instrumentation {
            volume_size_limit: Some(Quantity("100Mi".to_string())),
            ..Instrumentation::new(Runtime::Preload, "ghcr.io/example/injector:1.0")
        }
    }

    fn with_env(pod: &mut Pod, index: usize, var: EnvVar) {
        pod.spec.as_mut().unwrap().containers[index].env = Some(vec![var]);
    }

    #[test]
    fn test_inject_preload() {
        let pod =
            inject(&PreloadInjector, &descriptor(), &app_pod(&["app"]), 0, &InjectOptions::default())
                .unwrap();
        let spec = pod.spec.as_ref().unwrap();

        assert_eq!(env_of(&pod, 0), vec![(
            "LD_PRELOAD".to_string(),
            Some("/otel-auto-instrumentation-injector/libotelinject.so".to_string())
        )]);

        let mounts = spec.containers[0].volume_mounts.as_ref().unwrap();
        assert_eq!(mounts.len(), 1);
        assert_eq!(mounts[0].name, volumes::PRELOAD);
        assert_eq!(mounts[0].mount_path, "/otel-auto-instrumentation-injector");

        let volumes = spec.volumes.as_ref().unwrap();
        assert_eq!(volumes.len(), 1);
        assert_eq!(
            volumes[0].empty_dir.as_ref().and_then(|dir| dir.size_limit.clone()),
            Some(Quantity("100Mi".to_string()))
        );

        let init = &spec.init_containers.as_ref().unwrap()[0];
        assert_eq!(init.name, containers::PRELOAD_INIT);
        assert_eq!(init.image.as_deref(), Some("ghcr.io/example/injector:1.0"));
        assert!(init.command.is_none());
        assert_eq!(init.env.as_ref().unwrap()[0].name, "OTEL_INJECTOR_DESTINATION_FOLDER");
        assert_eq!(
            init.env.as_ref().unwrap()[0].value.as_deref(),
            Some("/otel-auto-instrumentation-injector")
        );
        assert_eq!(init.volume_mounts.as_ref().unwrap()[0].mount_path, mount_paths::PRELOAD);
    }

    #[test]
    fn test_inject_twice_provisions_once() {
        let options = InjectOptions::default();
        let original = app_pod(&["app1", "app2"]);
        let first = inject(&PreloadInjector, &descriptor(), &original, 0, &options).unwrap();
        let second = inject(&PreloadInjector, &descriptor(), &first, 1, &options).unwrap();
        let spec = second.spec.as_ref().unwrap();

        assert_eq!(spec.volumes.as_ref().map(Vec::len), Some(1));
        assert_eq!(spec.init_containers.as_ref().map(Vec::len), Some(1));
        for index in [0, 1] {
            assert_eq!(env_of(&second, index).len(), 1);
            assert_eq!(spec.containers[index].volume_mounts.as_ref().map(Vec::len), Some(1));
        }
    }

    #[test]
    fn test_descriptor_cannot_override_preload_hook() {
        let descriptor = Instrumentation {
            env: vec![
                EnvVar {
                    name: "LD_PRELOAD".to_string(),
                    value: Some("/x.so".to_string()),
                    ..EnvVar::default()
                },
                EnvVar {
                    name: "OTEL_SERVICE_NAME".to_string(),
                    value: Some("checkout".to_string()),
                    ..EnvVar::default()
                },
            ],
            ..descriptor()
        };
        let pod = inject(&PreloadInjector, &descriptor, &app_pod(&["app"]), 0, &InjectOptions::default())
            .unwrap();

        assert_eq!(env_of(&pod, 0), vec![
            ("OTEL_SERVICE_NAME".to_string(), Some("checkout".to_string())),
            (
                "LD_PRELOAD".to_string(),
                Some("/otel-auto-instrumentation-injector/libotelinject.so".to_string())
            ),
        ]);
    }

    #[test]
    fn test_conflict_via_value_keeps_pod() {
        let mut pod = app_pod(&["app"]);
        with_env(&mut pod, 0, EnvVar {
            name: "LD_PRELOAD".to_string(),
            value: Some("/usr/lib/libjemalloc.so".to_string()),
            ..EnvVar::default()
        });

        let err =
            inject(&PreloadInjector, &descriptor(), &pod, 0, &InjectOptions::default()).unwrap_err();
        assert_eq!(err, Error::ConflictingEnvVar {
            name: "LD_PRELOAD".to_string(),
            via: EnvSource::Value
        });
        assert!(err.to_string().contains("via Value,"));
        assert!(err.to_string().contains("LD_PRELOAD"));
    }

    #[test]
    fn test_conflict_via_value_from() {
        let mut pod = app_pod(&["app"]);
        with_env(&mut pod, 0, EnvVar {
            name: "LD_PRELOAD".to_string(),
            value_from: Some(EnvVarSource {
                secret_key_ref: Some(SecretKeySelector {
                    name: "preload".to_string(),
                    key: "path".to_string(),
                    ..SecretKeySelector::default()
                }),
                ..EnvVarSource::default()
            }),
            ..EnvVar::default()
        });

        let err =
            inject(&PreloadInjector, &descriptor(), &pod, 0, &InjectOptions::default()).unwrap_err();
        assert!(err.to_string().contains("via ValueFrom"));
    }
}
