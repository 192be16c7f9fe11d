fn main() {
    let _shadow = shadow_rs::ShadowBuilder::builder()
        .build()
        .expect("build information should be generated for the CLI long version");
}
