/// Name of the environment variable containing the path to the configuration file.
/// If not set, defaults to
///  (1) on Linux and macOS: `$XDG_CONFIG_HOME/symcoll/config.toml`
///      or `$HOME/.config/symcoll/config.toml`
///  (2) on Windows: `%APPDATA%\symcoll\config.toml`
pub const ENV_CONFIG_PATH: &str = "SYMCOLL_CONFIG_PATH";

/// Default qualified name of the external module registry.
pub const DEFAULT_REGISTRY_NAME: &str = "sys.modules";

/// Schema libraries recognised out of the box, as `(module prefix, record base class)`.
pub const DEFAULT_SCHEMA_LIBRARIES: &[(&str, &str)] = &[
    ("transformers.", "ModelOutput"),
    ("diffusers.", "BaseOutput"),
];

/// Members of a customized mapping class that are never traced into when the
/// class is constructed during tracing.
pub const CUSTOMIZED_SKIPPED_MEMBERS: &[&str] =
    &["__init__", "__post_init__", "__setattr__", "__setitem__"];
