use instrumentor_base::consts::{
    PHP_ARTIFACTS_DIR,
    k8s::{containers, env, mount_paths, volumes},
};
use k8s_openapi::api::core::v1::Container;

use crate::instrumentation::{
    descriptor::Runtime,
    env::{EnvClaim, append_to_path_list, set_if_absent},
    injector::Injector,
};

/// Loads the PHP extension through an extra `.ini` scan directory.
#[derive(Clone, Copy, Debug, Default)]
pub struct PhpInjector;

impl Injector for PhpInjector {
    fn runtime(&self) -> Runtime { Runtime::Php }

    fn init_container_name(&self) -> &'static str { containers::PHP_INIT }

    fn volume_name(&self) -> &'static str { volumes::PHP }

    fn mount_path(&self) -> &'static str { mount_paths::PHP }

    fn env_claims(&self) -> &'static [EnvClaim] {
        &[
            EnvClaim::Extensible(env::PHP_INI_SCAN_DIR),
            EnvClaim::Extensible(env::OTEL_PHP_AUTOLOAD_ENABLED),
        ]
    }

    fn apply_runtime_env(&self, container: &mut Container) {
        append_to_path_list(container, env::PHP_INI_SCAN_DIR, env::PHP_INI_SCAN_DIR_VALUE);
        set_if_absent(container, env::OTEL_PHP_AUTOLOAD_ENABLED, env::OTEL_PHP_AUTOLOAD_ENABLED_VALUE);
    }

    fn init_command(&self) -> Option<Vec<String>> {
        Some(
            ["cp", "-r", PHP_ARTIFACTS_DIR, mount_paths::PHP]
                .into_iter()
                .map(ToString::to_string)
                .collect(),
        )
    }
}
