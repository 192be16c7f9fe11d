//! Well-known strings that form the contract between the injection engine,
//! the workloads it mutates and the initializer images it schedules.
//!
//! None of these values are user-configurable.

pub mod k8s {
    pub mod annotations {
        //! Pod and namespace annotations consumed by the engine.

        /// Generic container-selection annotation, used when exactly one
        /// runtime is requested for a pod.
        pub const CONTAINER_NAMES: &str = "instrumentation.opentelemetry.io/container-names";

        /// Container-selection annotation for the generic preload injector.
        pub const PRELOAD_CONTAINER_NAMES: &str =
            "instrumentation.opentelemetry.io/injector-container-names";

        /// Container-selection annotation for the PHP injector.
        pub const PHP_CONTAINER_NAMES: &str =
            "instrumentation.opentelemetry.io/php-container-names";

        /// The `kubectl.kubernetes.io/default-container` annotation, naming the
        /// container that receives instrumentation when no explicit targets
        /// are given.
        pub const DEFAULT_CONTAINER: &str = "kubectl.kubernetes.io/default-container";
    }

    pub mod containers {
        //! Names of containers added or recognised by the engine.

        pub const JAVA_INIT: &str = "opentelemetry-auto-instrumentation-java";
        pub const NODEJS_INIT: &str = "opentelemetry-auto-instrumentation-nodejs";
        pub const PYTHON_INIT: &str = "opentelemetry-auto-instrumentation-python";
        pub const DOTNET_INIT: &str = "opentelemetry-auto-instrumentation-dotnet";
        pub const PHP_INIT: &str = "opentelemetry-auto-instrumentation-php";
        pub const PRELOAD_INIT: &str = "opentelemetry-auto-instrumentation-injector";
        pub const APACHE_HTTPD_INIT: &str = "otel-agent-attach-apache";
        pub const NGINX_INIT: &str = "otel-agent-attach-nginx";

        /// Main container added by sidecar-based runtimes.
        pub const SIDECAR_MARKER: &str = "opentelemetry-auto-instrumentation";
    }

    pub mod volumes {
        pub const PRELOAD: &str = "opentelemetry-auto-instrumentation-injector";
        pub const PHP: &str = "opentelemetry-auto-instrumentation-php";
    }

    pub mod mount_paths {
        pub const PRELOAD: &str = "/otel-auto-instrumentation-injector";
        pub const PHP: &str = "/otel-auto-instrumentation-php";
    }

    pub mod env {
        //! Environment variables with engine-owned semantics.

        /// Downward-API reference to the node name, added to every
        /// instrumented container whose pod is not scheduled yet. Its
        /// presence marks a pod as already processed.
        pub const NODE_NAME_MARKER: &str = "OTEL_RESOURCE_ATTRIBUTES_NODE_NAME";

        /// Downward-API reference to the pod name, for pods created from a
        /// template without a final name.
        pub const POD_NAME_REFERENCE: &str = "OTEL_RESOURCE_ATTRIBUTES_POD_NAME";

        pub const OTEL_SERVICE_NAME: &str = "OTEL_SERVICE_NAME";
        pub const OTEL_RESOURCE_ATTRIBUTES: &str = "OTEL_RESOURCE_ATTRIBUTES";

        /// Dynamic-loader preload hook.
        pub const LD_PRELOAD: &str = "LD_PRELOAD";
        pub const LD_PRELOAD_VALUE: &str = "/otel-auto-instrumentation-injector/libotelinject.so";

        /// Destination folder handed to the preload initializer image.
        pub const INJECTOR_DESTINATION_FOLDER: &str = "OTEL_INJECTOR_DESTINATION_FOLDER";

        /// Colon-separated list of directories PHP scans for `.ini` files.
        ///
        /// The leading separator keeps the compile-time scan directory in
        /// the list.
        pub const PHP_INI_SCAN_DIR: &str = "PHP_INI_SCAN_DIR";
        pub const PHP_INI_SCAN_DIR_VALUE: &str = ":/otel-auto-instrumentation-php/php_ini_scan_dir";

        pub const OTEL_PHP_AUTOLOAD_ENABLED: &str = "OTEL_PHP_AUTOLOAD_ENABLED";
        pub const OTEL_PHP_AUTOLOAD_ENABLED_VALUE: &str = "true";
    }
}

/// Size limit of an instrumentation scratch volume when neither the
/// descriptor nor the configuration provides one.
pub const DEFAULT_VOLUME_SIZE_LIMIT: &str = "200Mi";

/// Directory inside the PHP initializer image holding the artifacts.
pub const PHP_ARTIFACTS_DIR: &str = "/autoinstrumentation/.";
