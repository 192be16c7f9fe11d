use comfy_table::{Cell, ContentArrangement};
use instrumentor::{
    ext::PodExt,
    instrumentation::{already_instrumented, present_initializers},
};
use k8s_openapi::api::core::v1::Pod;

pub trait PodStatusExt {
    /// Renders whether the pod is instrumented and by which initializers.
    fn render_status_table(&self) -> String;
}

impl PodStatusExt for Pod {
    fn render_status_table(&self) -> String {
        let initializers = present_initializers(self)
            .into_iter()
            .map(|known| known.container_name())
            .collect::<Vec<_>>();
        let initializers =
            if initializers.is_empty() { "-".to_string() } else { initializers.join(", ") };
        let containers = self
            .spec
            .iter()
            .flat_map(|spec| spec.containers.iter().map(|container| container.name.as_str()))
            .collect::<Vec<_>>();
        let instrumented = if already_instrumented(self) { "yes" } else { "no" };

        comfy_table::Table::new()
            .load_preset(comfy_table::presets::NOTHING)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec!["POD", "INSTRUMENTED", "INITIALIZERS", "CONTAINERS"])
            .add_row(vec![
                Cell::new(self.display_name()),
                Cell::new(instrumented),
                Cell::new(initializers),
                Cell::new(containers.join(", ")),
            ])
            .to_string()
    }
}
