use symcoll::{
    skip::{ExternalClass, is_skipped, patch_schema_libraries_once, register_external_class},
    utils::conf::TraceConfig,
};

// Everything touching the once-per-process patch lives in this single test.
#[test]
fn schema_libraries_are_patched_once() {
    register_external_class(ExternalClass {
        module: "transformers.utils.generic".into(),
        name: "ModelOutput".into(),
        callables: vec!["__init__".into(), "__post_init__".into(), "to_tuple".into()],
    });

    let config = TraceConfig::default();
    assert_eq!(patch_schema_libraries_once(&config), 3);
    assert!(is_skipped(
        "transformers.utils.generic.ModelOutput",
        "__post_init__"
    ));
    assert!(!is_skipped("diffusers.utils.outputs.BaseOutput", "__init__"));

    // classes registered after the patch are not picked up
    register_external_class(ExternalClass {
        module: "diffusers.utils.outputs".into(),
        name: "BaseOutput".into(),
        callables: vec!["__init__".into()],
    });
    assert_eq!(patch_schema_libraries_once(&config), 3);
    assert!(!is_skipped("diffusers.utils.outputs.BaseOutput", "__init__"));
}
