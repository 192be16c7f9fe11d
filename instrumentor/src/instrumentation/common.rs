//! Settings every instrumented container receives, whatever its runtime.
//!
//! Applied once per successful injection: the container learns which service
//! and workload it belongs to through `OTEL_SERVICE_NAME` and
//! `OTEL_RESOURCE_ATTRIBUTES`, and the runtime's initializer runs with the
//! container's security context.

use std::collections::{BTreeMap, BTreeSet};

use instrumentor_base::consts::k8s::env;
use k8s_openapi::{
    api::core::v1::{Container, EnvVar, EnvVarSource, ObjectFieldSelector, Pod},
    apimachinery::pkg::apis::meta::v1::ObjectMeta,
};

use crate::instrumentation::env::index_of_env;

const CONTAINER_NAME: &str = "k8s.container.name";
const CRONJOB_NAME: &str = "k8s.cronjob.name";
const DAEMONSET_NAME: &str = "k8s.daemonset.name";
const DEPLOYMENT_NAME: &str = "k8s.deployment.name";
const JOB_NAME: &str = "k8s.job.name";
const NAMESPACE_NAME: &str = "k8s.namespace.name";
const NODE_NAME: &str = "k8s.node.name";
const POD_NAME: &str = "k8s.pod.name";
const REPLICASET_NAME: &str = "k8s.replicaset.name";
const STATEFULSET_NAME: &str = "k8s.statefulset.name";
const SERVICE_INSTANCE_ID: &str = "service.instance.id";
const SERVICE_VERSION: &str = "service.version";

/// Attributes that may name the service, most specific workload first.
const SERVICE_NAME_SOURCES: [&str; 6] =
    [DEPLOYMENT_NAME, STATEFULSET_NAME, DAEMONSET_NAME, JOB_NAME, CRONJOB_NAME, POD_NAME];

/// Label the deployment controller puts on its replica sets and pods.
const POD_TEMPLATE_HASH: &str = "pod-template-hash";

/// Adds the service name and resource attributes to the main container at
/// `index` of `pod`, which lives in the namespace described by `ns`.
///
/// Values the container already defines win: `OTEL_SERVICE_NAME` is only set
/// when absent, and attributes already listed in `OTEL_RESOURCE_ATTRIBUTES`
/// are not repeated. Names the pod does not know yet, such as the node of an
/// unscheduled pod, are read through the downward API. `OTEL_RESOURCE_ATTRIBUTES`
/// is moved to the end of the list so that the references it uses are
/// defined before it.
///
/// # Panics
///
/// Panics if `index` does not point at a main container.
pub fn apply_common_env(pod: &mut Pod, index: usize, ns: &ObjectMeta) {
    let Some(container) = pod.spec.as_ref().map(|spec| &spec.containers[index]) else {
        return;
    };
    let listed = listed_attributes(container);
    let mut attributes = discover_attributes(pod, container, ns);
    attributes.retain(|key, _| !listed.contains(*key));

    let Some(spec) = pod.spec.as_mut() else {
        return;
    };
    let container = &mut spec.containers[index];
    let env = container.env.get_or_insert_with(Vec::new);

    if index_of_env(env, env::OTEL_SERVICE_NAME).is_none() {
        let service_name = SERVICE_NAME_SOURCES
            .iter()
            .find_map(|key| attributes.get(key))
            .cloned()
            .unwrap_or_else(|| container.name.clone());
        env.push(literal(env::OTEL_SERVICE_NAME, service_name));
    }

    for (key, reference, field_path) in [
        (POD_NAME, env::POD_NAME_REFERENCE, "metadata.name"),
        (NODE_NAME, env::NODE_NAME_MARKER, "spec.nodeName"),
    ] {
        if listed.contains(key) || attributes.contains_key(key) {
            continue;
        }
        if index_of_env(env, reference).is_none() {
            env.push(field_ref(reference, field_path));
        }
        let _previous = attributes.insert(key, format!("$({reference})"));
    }

    let rendered =
        attributes.iter().map(|(key, value)| format!("{key}={value}")).collect::<Vec<_>>().join(",");
    match index_of_env(env, env::OTEL_RESOURCE_ATTRIBUTES) {
        None if rendered.is_empty() => {}
        None => env.push(literal(env::OTEL_RESOURCE_ATTRIBUTES, rendered)),
        Some(idx) => {
            let mut existing = env.remove(idx);
            // a reference cannot be extended here
            if existing.value_from.is_none() && !rendered.is_empty() {
                let mut value = existing.value.take().unwrap_or_default();
                if !value.is_empty() && !value.ends_with(',') {
                    value.push(',');
                }
                value.push_str(&rendered);
                existing.value = Some(value);
            }
            env.push(existing);
        }
    }
}

/// Gives the init container named `init_container_name` the security context
/// of the main container at `index`. The last instrumented container wins
/// when several share an initializer.
///
/// # Panics
///
/// Panics if `index` does not point at a main container.
pub fn inherit_security_context(pod: &mut Pod, index: usize, init_container_name: &str) {
    let Some(spec) = pod.spec.as_mut() else {
        return;
    };
    let security_context = spec.containers[index].security_context.clone();
    if let Some(init) =
        spec.init_containers.iter_mut().flatten().find(|init| init.name == init_container_name)
    {
        init.security_context = security_context;
    }
}

/// Keys already present in the container's `OTEL_RESOURCE_ATTRIBUTES`.
fn listed_attributes(container: &Container) -> BTreeSet<String> {
    container
        .env
        .iter()
        .flatten()
        .find(|var| var.name == env::OTEL_RESOURCE_ATTRIBUTES)
        .and_then(|var| var.value.as_deref())
        .map(|value| {
            value
                .split(',')
                .filter_map(|pair| pair.trim().split_once('='))
                .map(|(key, _)| key.to_string())
                .collect()
        })
        .unwrap_or_default()
}

fn discover_attributes(
    pod: &Pod,
    container: &Container,
    ns: &ObjectMeta,
) -> BTreeMap<&'static str, String> {
    let namespace =
        ns.name.clone().or_else(|| pod.metadata.namespace.clone()).unwrap_or_default();
    let pod_name = pod.metadata.name.clone().unwrap_or_default();
    let node_name =
        pod.spec.as_ref().and_then(|spec| spec.node_name.clone()).unwrap_or_default();

    let mut attributes = owner_attributes(&pod.metadata);
    if !namespace.is_empty() && !pod_name.is_empty() && !container.name.is_empty() {
        let _previous = attributes
            .insert(SERVICE_INSTANCE_ID, format!("{namespace}.{pod_name}.{}", container.name));
    }
    if let Some(version) = container.image.as_deref().and_then(image_tag) {
        let _previous = attributes.insert(SERVICE_VERSION, version.to_string());
    }
    attributes.extend([
        (NAMESPACE_NAME, namespace),
        (CONTAINER_NAME, container.name.clone()),
        (POD_NAME, pod_name),
        (NODE_NAME, node_name),
    ]);
    attributes.retain(|_, value| !value.is_empty());
    attributes
}

/// Workload names taken from the pod's owner references. A replica set owned
/// by a deployment carries the pod template hash as its name suffix, which
/// gives the deployment name without asking the cluster.
fn owner_attributes(meta: &ObjectMeta) -> BTreeMap<&'static str, String> {
    let template_hash = meta.labels.as_ref().and_then(|labels| labels.get(POD_TEMPLATE_HASH));
    let mut attributes = BTreeMap::new();
    for owner in meta.owner_references.iter().flatten() {
        let key = match owner.kind.to_ascii_lowercase().as_str() {
            "replicaset" => {
                let deployment = template_hash
                    .and_then(|hash| owner.name.strip_suffix(hash.as_str()))
                    .and_then(|prefix| prefix.strip_suffix('-'));
                if let Some(deployment) = deployment {
                    let _previous = attributes.insert(DEPLOYMENT_NAME, deployment.to_string());
                }
                REPLICASET_NAME
            }
            "deployment" => DEPLOYMENT_NAME,
            "statefulset" => STATEFULSET_NAME,
            "daemonset" => DAEMONSET_NAME,
            "job" => JOB_NAME,
            "cronjob" => CRONJOB_NAME,
            _ => continue,
        };
        let _previous = attributes.insert(key, owner.name.clone());
    }
    attributes
}

/// The tag of an image reference, if it has one. A colon followed by a path
/// belongs to a registry port, not a tag.
fn image_tag(image: &str) -> Option<&str> {
    let image = image.split_once('@').map_or(image, |(name, _digest)| name);
    let (_, tag) = image.rsplit_once(':')?;
    (!tag.is_empty() && !tag.contains('/')).then_some(tag)
}

fn literal(name: &str, value: String) -> EnvVar {
    EnvVar { name: name.to_string(), value: Some(value), ..EnvVar::default() }
}

fn field_ref(name: &str, field_path: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value_from: Some(EnvVarSource {
            field_ref: Some(ObjectFieldSelector {
                field_path: field_path.to_string(),
                ..ObjectFieldSelector::default()
            }),
            ..EnvVarSource::default()
        }),
        ..EnvVar::default()
    }
}
