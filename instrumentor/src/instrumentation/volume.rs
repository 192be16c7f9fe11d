use instrumentor_base::consts::DEFAULT_VOLUME_SIZE_LIMIT;
use k8s_openapi::{
    api::core::v1::{
        EmptyDirVolumeSource, EphemeralVolumeSource, PersistentVolumeClaimTemplate, Volume,
    },
    apimachinery::pkg::api::resource::Quantity,
};

/// The scratch size used when neither the descriptor nor the configuration
/// sets one.
#[must_use]
pub fn default_volume_size_limit() -> Quantity { Quantity(DEFAULT_VOLUME_SIZE_LIMIT.to_string()) }

/// Builds the pod-level volume holding instrumentation artifacts.
///
/// A claim template that is absent or empty yields an `emptyDir` limited to
/// `size_limit`, or `default_size_limit` when no limit is given. Any other
/// template is wrapped verbatim in an ephemeral volume and `size_limit` is
/// ignored, since the claim defines its own capacity.
#[must_use]
pub fn build_volume(
    claim_template: Option<&PersistentVolumeClaimTemplate>,
    name: &str,
    size_limit: Option<&Quantity>,
    default_size_limit: &Quantity,
) -> Volume {
    match claim_template.filter(|template| **template != PersistentVolumeClaimTemplate::default()) {
        Some(template) => Volume {
            name: name.to_string(),
            ephemeral: Some(EphemeralVolumeSource {
                volume_claim_template: Some(template.clone()),
            }),
            ..Volume::default()
        },
        None => Volume {
            name: name.to_string(),
            empty_dir: Some(EmptyDirVolumeSource {
                size_limit: Some(size_limit.unwrap_or(default_size_limit).clone()),
                ..EmptyDirVolumeSource::default()
            }),
            ..Volume::default()
        },
    }
}
