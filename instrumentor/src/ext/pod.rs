use instrumentor_base::consts::k8s::annotations;
use k8s_openapi::{Metadata, api::core::v1::Pod};

pub trait PodExt {
    /// `namespace/name`, falling back to `generateName` for pods that are not
    /// yet persisted.
    fn display_name(&self) -> String;

    fn main_container_count(&self) -> usize;

    /// Index of the main container named `name`.
    fn container_index(&self, name: &str) -> Option<usize>;

    /// The container named by `kubectl.kubernetes.io/default-container` when
    /// it exists, else the first main container.
    fn default_container_index(&self) -> Option<usize>;
}

impl PodExt for Pod {
    fn display_name(&self) -> String {
        let meta = self.metadata();
        let name = meta
            .name
            .as_deref()
            .or(meta.generate_name.as_deref())
            .filter(|name| !name.is_empty())
            .unwrap_or("<unnamed>");
        match meta.namespace.as_deref() {
            Some(namespace) if !namespace.is_empty() => format!("{namespace}/{name}"),
            _ => name.to_string(),
        }
    }

    fn main_container_count(&self) -> usize {
        self.spec.as_ref().map_or(0, |spec| spec.containers.len())
    }

    fn container_index(&self, name: &str) -> Option<usize> {
        self.spec.as_ref()?.containers.iter().position(|container| container.name == name)
    }

    fn default_container_index(&self) -> Option<usize> {
        if self.main_container_count() == 0 {
            return None;
        }
        self.metadata()
            .annotations
            .as_ref()
            .and_then(|map| map.get(annotations::DEFAULT_CONTAINER))
            .and_then(|name| self.container_index(name))
            .or(Some(0))
    }
}
