use symcoll::{magic::ENV_CONFIG_PATH, utils::conf::TraceConfig};

#[test]
fn the_environment_variable_selects_the_config_file() {
    let dir = std::env::temp_dir().join(format!("symcoll-{}", uuid::Uuid::new_v4()));
    let path = dir.join("trace.toml");
    // SAFETY: this is the only test of this binary, so nothing reads the environment concurrently.
    unsafe { std::env::set_var(ENV_CONFIG_PATH, &path) };
    assert_eq!(TraceConfig::default_path(), path);

    assert_eq!(TraceConfig::load_or_default().unwrap(), TraceConfig::default());

    let conf = TraceConfig {
        record_include_none: true,
        ..TraceConfig::default()
    };
    conf.save_to_toml(&path).unwrap();
    assert_eq!(TraceConfig::load_or_default().unwrap(), conf);

    std::fs::remove_dir_all(&dir).unwrap();
}
