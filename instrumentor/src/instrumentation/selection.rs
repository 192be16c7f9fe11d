//! Which containers a descriptor applies to.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use snafu::ensure;

use crate::instrumentation::{
    descriptor::Instrumentation,
    error::{
        DuplicatedContainerNamesSnafu, Error, InvalidContainerNamesSnafu,
        MissingContainerNamesSnafu,
    },
};

/// Effective value of `key`: the pod's annotation wins, the namespace's is the
/// fallback. Empty values count as absent.
#[must_use]
pub fn annotation_value<'a>(ns: &'a ObjectMeta, pod: &'a ObjectMeta, key: &str) -> Option<&'a str> {
    let lookup = |meta: &'a ObjectMeta| {
        meta.annotations
            .as_ref()
            .and_then(|annotations| annotations.get(key))
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    };
    lookup(pod).or_else(|| lookup(ns))
}

/// Checks that a container-names annotation only uses `[A-Za-z0-9,-]`.
///
/// # Errors
///
/// Returns [`Error::InvalidContainerNames`] carrying the offending value.
pub fn validate_container_names(annotation: &str, value: &str) -> Result<(), Error> {
    ensure!(
        !value.is_empty()
            && value.chars().all(|c| c.is_ascii_alphanumeric() || c == ',' || c == '-'),
        InvalidContainerNamesSnafu { annotation, value }
    );
    Ok(())
}

/// Appends the containers named by the `key` annotation to the descriptor's
/// target list, in annotation order.
///
/// Empty tokens between consecutive commas are kept as empty names. An absent
/// or empty annotation leaves the descriptor untouched.
///
/// # Errors
///
/// Returns [`Error::InvalidContainerNames`] if the annotation contains a
/// character outside `[A-Za-z0-9,-]`.
pub fn resolve_targets(
    descriptor: &mut Instrumentation,
    ns: &ObjectMeta,
    pod: &ObjectMeta,
    key: &str,
) -> Result<(), Error> {
    let Some(value) = annotation_value(ns, pod, key) else {
        return Ok(());
    };
    validate_container_names(key, value)?;
    descriptor.containers.extend(value.split(',').map(ToString::to_string));
    Ok(())
}

/// Rejects a name list in which any non-empty name occurs more than once.
///
/// # Errors
///
/// Returns [`Error::DuplicatedContainerNames`] listing every duplicated name
/// once, sorted.
pub fn find_duplicates<I, S>(names: I) -> Result<(), Error>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut counts = BTreeMap::<String, usize>::new();
    for name in names {
        let name = name.as_ref();
        if !name.is_empty() {
            *counts.entry(name.to_string()).or_default() += 1;
        }
    }

    let names = counts
        .into_iter()
        .filter_map(|(name, count)| (count > 1).then_some(name))
        .collect::<Vec<_>>();
    ensure!(names.is_empty(), DuplicatedContainerNamesSnafu { names });
    Ok(())
}

/// Pre-flight gate over every descriptor requested for one pod, run before
/// any mutation.
///
/// A container may be targeted by one runtime only, and once a pod requests
/// several runtimes each of them must name its containers.
///
/// # Errors
///
/// Returns [`Error::DuplicatedContainerNames`] or
/// [`Error::MissingContainerNames`].
pub fn check_targets(descriptors: &[Instrumentation]) -> Result<(), Error> {
    find_duplicates(descriptors.iter().flat_map(|descriptor| descriptor.containers.iter()))?;

    let without_targets =
        descriptors.iter().filter(|descriptor| descriptor.containers.is_empty()).count();
    ensure!(descriptors.len() < 2 || without_targets == 0, MissingContainerNamesSnafu);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrumentation::descriptor::Runtime;

    const KEY: &str = "instrumentation.opentelemetry.io/container-names";

    fn meta(value: Option<&str>) -> ObjectMeta {
        ObjectMeta {
            annotations: value.map(|value| BTreeMap::from([(KEY.to_string(), value.to_string())])),
            ..ObjectMeta::default()
        }
    }

    fn targets(names: &[&str]) -> Vec<String> { names.iter().map(ToString::to_string).collect() }

    #[test]
    fn test_annotation_precedence() {
        assert_eq!(annotation_value(&meta(Some("ns")), &meta(Some("pod")), KEY), Some("pod"));
        assert_eq!(annotation_value(&meta(Some("ns")), &meta(None), KEY), Some("ns"));
        assert_eq!(annotation_value(&meta(Some("ns")), &meta(Some("")), KEY), Some("ns"));
        assert_eq!(annotation_value(&meta(None), &meta(None), KEY), None);
    }

    #[test]
    fn test_resolve_targets_appends_in_order() {
        let mut descriptor = Instrumentation {
            containers: targets(&["sidecar"]),
            ..Instrumentation::new(Runtime::Php, "img")
        };
        resolve_targets(&mut descriptor, &meta(None), &meta(Some("web,worker-1")), KEY).unwrap();

        assert_eq!(descriptor.containers, targets(&["sidecar", "web", "worker-1"]));
    }

    #[test]
    fn test_resolve_targets_keeps_empty_tokens() {
        let mut descriptor = Instrumentation::default();
        resolve_targets(&mut descriptor, &meta(Some("a,,b")), &meta(None), KEY).unwrap();

        assert_eq!(descriptor.containers, targets(&["a", "", "b"]));
    }

    #[test]
    fn test_resolve_targets_without_annotation() {
        let mut descriptor = Instrumentation::default();
        resolve_targets(&mut descriptor, &meta(None), &meta(None), KEY).unwrap();

        assert!(descriptor.containers.is_empty());
    }

    #[test]
    fn test_resolve_targets_rejects_invalid_characters() {
        let mut descriptor = Instrumentation::default();
        let err = resolve_targets(&mut descriptor, &meta(None), &meta(Some("web,work_er")), KEY)
            .unwrap_err();

        assert_eq!(err, Error::InvalidContainerNames {
            annotation: KEY.to_string(),
            value: "web,work_er".to_string()
        });
        assert!(err.to_string().contains("web,work_er"));
        assert!(descriptor.containers.is_empty());

        for value in ["web app", "web;app", "wéb", "web.app"] {
            assert!(validate_container_names(KEY, value).is_err(), "{value}");
        }
    }

    #[test]
    fn test_find_duplicates() {
        let err = find_duplicates(["app1", "app2", "app1", "app1", "app3", "app4", "app4"])
            .unwrap_err();
        assert_eq!(err, Error::DuplicatedContainerNames { names: targets(&["app1", "app4"]) });
        assert_eq!(err.to_string(), "duplicated container names detected: [app1 app4]");

        assert!(find_duplicates(["app1", "app2", "app3", "app4", "app5"]).is_ok());
        assert!(find_duplicates(["", "", "app1"]).is_ok());
        assert!(find_duplicates(Vec::<String>::new()).is_ok());
    }

    #[test]
    fn test_check_targets_across_descriptors() {
        let php = Instrumentation {
            containers: targets(&["web", "api"]),
            ..Instrumentation::new(Runtime::Php, "php")
        };
        let preload = Instrumentation {
            containers: targets(&["api"]),
            ..Instrumentation::new(Runtime::Preload, "preload")
        };
        assert_eq!(
            check_targets(&[php.clone(), preload]).unwrap_err(),
            Error::DuplicatedContainerNames { names: targets(&["api"]) }
        );

        let untargeted = Instrumentation::new(Runtime::Preload, "preload");
        assert_eq!(
            check_targets(&[php.clone(), untargeted.clone()]).unwrap_err(),
            Error::MissingContainerNames
        );

        assert!(check_targets(&[untargeted]).is_ok());
        assert!(check_targets(&[php]).is_ok());
        assert!(check_targets(&[]).is_ok());
    }
}
