use comfy_table::{Cell, ContentArrangement};
use instrumentor::instrumentation::{Instrumentation, Runtime};

pub trait RuntimeExt {
    /// Renders the runtimes with the names each injector adds to a pod and
    /// the image configured for it, if any.
    fn render_table(&self, configured: &[Instrumentation]) -> String;
}

impl RuntimeExt for [Runtime] {
    fn render_table(&self, configured: &[Instrumentation]) -> String {
        let rows = self
            .iter()
            .map(|runtime| {
                let injector = runtime.injector();
                let claims = injector
                    .env_claims()
                    .iter()
                    .map(|claim| claim.name())
                    .collect::<Vec<_>>()
                    .join(", ");
                let image = configured
                    .iter()
                    .find(|descriptor| descriptor.runtime == *runtime)
                    .map_or("-", |descriptor| descriptor.image.as_str());
                [
                    Cell::new(runtime),
                    Cell::new(injector.init_container_name()),
                    Cell::new(injector.mount_path()),
                    Cell::new(claims),
                    Cell::new(runtime.container_names_annotation()),
                    Cell::new(image),
                ]
            })
            .collect::<Vec<_>>();

        comfy_table::Table::new()
            .load_preset(comfy_table::presets::NOTHING)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                "RUNTIME",
                "INIT CONTAINER",
                "MOUNT PATH",
                "ENV",
                "CONTAINER NAMES ANNOTATION",
                "IMAGE",
            ])
            .add_rows(rows)
            .to_string()
    }
}
