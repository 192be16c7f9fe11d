use std::path::PathBuf;

use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("{source}"))]
    Configuration { source: instrumentor::config::Error },

    #[snafu(display("{source}"))]
    Mutate {
        #[snafu(source(from(instrumentor::mutator::Error, Box::new)))]
        source: Box<instrumentor::mutator::Error>,
    },

    #[snafu(display("Either --pod-file or --pod-name must be provided"))]
    NoPodSource,

    #[snafu(display("Failed to read manifest from {}, error: {source}", path.display()))]
    ReadManifest { path: PathBuf, source: std::io::Error },

    #[snafu(display("Failed to read manifest from stdin, error: {source}"))]
    ReadStdin { source: std::io::Error },

    #[snafu(display("Failed to parse manifest from {}, error: {source}", path.display()))]
    ParseManifest { path: PathBuf, source: serde_yaml::Error },

    #[snafu(display("Failed to serialize pod as YAML, error: {source}"))]
    SerializePodYaml { source: serde_yaml::Error },

    #[snafu(display("Failed to serialize pod as JSON, error: {source}"))]
    SerializePodJson { source: serde_json::Error },

    #[snafu(display("Failed to write to stdout, error: {source}"))]
    WriteStdout { source: std::io::Error },

    #[snafu(display("Failed to initialize Kubernetes client configuration, error: {source}"))]
    KubeConfig {
        #[snafu(source(from(kube::Error, Box::new)))]
        source: Box<kube::Error>,
    },

    #[snafu(display("Failed to get pod {pod_name} in namespace {namespace}, error: {source}"))]
    GetPod {
        namespace: String,
        pod_name: String,
        #[snafu(source(from(kube::Error, Box::new)))]
        source: Box<kube::Error>,
    },

    #[snafu(display("Failed to get namespace {namespace}, error: {source}"))]
    GetNamespace {
        namespace: String,
        #[snafu(source(from(kube::Error, Box::new)))]
        source: Box<kube::Error>,
    },

    #[snafu(display("Failed to create tokio runtime, error: {source}"))]
    InitializeTokioRuntime { source: std::io::Error },
}

impl From<instrumentor::config::Error> for Error {
    fn from(source: instrumentor::config::Error) -> Self { Self::Configuration { source } }
}

impl From<instrumentor::mutator::Error> for Error {
    fn from(source: instrumentor::mutator::Error) -> Self { Self::Mutate { source: Box::new(source) } }
}
