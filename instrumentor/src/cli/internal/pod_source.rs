use std::path::{Path, PathBuf};

use clap::Args;
use k8s_openapi::{
    api::core::v1::{Namespace, Pod},
    apimachinery::pkg::apis::meta::v1::ObjectMeta,
};
use kube::Api;
use serde::de::DeserializeOwned;
use snafu::ResultExt;
use tokio::io::AsyncReadExt;

use crate::cli::error::{self, Error};

/// Where a command reads its pod from: a manifest file or the cluster.
#[derive(Args, Clone)]
pub struct PodSource {
    #[arg(
        long = "pod-file",
        short = 'f',
        conflicts_with = "pod_name",
        help = "Read the pod manifest (YAML or JSON) from a file, or '-' for stdin."
    )]
    pub pod_file: Option<PathBuf>,

    #[arg(
        long = "namespace-file",
        requires = "pod_file",
        help = "Read the namespace manifest (YAML or JSON) whose annotations apply to the pod."
    )]
    pub namespace_file: Option<PathBuf>,

    #[arg(long = "pod-name", short = 'p', help = "Fetch the pod with this name from the cluster.")]
    pub pod_name: Option<String>,

    #[arg(
        short,
        long,
        requires = "pod_name",
        help = "Kubernetes namespace of the pod. Defaults to the current Kubernetes context's \
                namespace."
    )]
    pub namespace: Option<String>,
}

/// A pod together with the metadata of its namespace.
pub struct SourcedPod {
    pub namespace: ObjectMeta,
    pub pod: Pod,
}

impl PodSource {
    pub async fn load(self) -> Result<SourcedPod, Error> {
        let Self { pod_file, namespace_file, pod_name, namespace } = self;

        if let Some(pod_file) = pod_file {
            let pod = read_manifest::<Pod>(&pod_file).await?;
            let namespace = match namespace_file {
                Some(path) => read_manifest::<Namespace>(&path).await?.metadata,
                None => ObjectMeta { name: pod.metadata.namespace.clone(), ..ObjectMeta::default() },
            };
            return Ok(SourcedPod { namespace, pod });
        }

        let Some(pod_name) = pod_name.filter(|name| !name.is_empty()) else {
            return error::NoPodSourceSnafu.fail();
        };
        let kube_client = kube::Client::try_default().await.context(error::KubeConfigSnafu)?;
        let namespace = namespace
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| kube_client.default_namespace().to_string());
        tracing::debug!("Fetching pod {pod_name} from namespace {namespace}");

        let pod = Api::<Pod>::namespaced(kube_client.clone(), &namespace)
            .get(&pod_name)
            .await
            .with_context(|_| error::GetPodSnafu { namespace: namespace.clone(), pod_name })?;
        let namespace = Api::<Namespace>::all(kube_client)
            .get(&namespace)
            .await
            .with_context(|_| error::GetNamespaceSnafu { namespace: namespace.clone() })?;

        Ok(SourcedPod { namespace: namespace.metadata, pod })
    }
}

async fn read_manifest<T: DeserializeOwned>(path: &Path) -> Result<T, Error> {
    let data = if path == Path::new("-") {
        let mut data = Vec::new();
        let _size =
            tokio::io::stdin().read_to_end(&mut data).await.context(error::ReadStdinSnafu)?;
        data
    } else {
        tokio::fs::read(path).await.with_context(|_| error::ReadManifestSnafu { path })?
    };
    serde_yaml::from_slice(&data).with_context(|_| error::ParseManifestSnafu { path })
}
