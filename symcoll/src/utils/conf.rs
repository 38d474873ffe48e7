use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{
    magic::{DEFAULT_REGISTRY_NAME, DEFAULT_SCHEMA_LIBRARIES, ENV_CONFIG_PATH},
    utils::error::{Error, SymResult},
};

/// An external library whose record classes are modelled as
/// [`StructuredRecordMapping`](crate::collections::record::StructuredRecordMapping).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaLibrary {
    /// Classes must live in a module starting with this prefix.
    pub module_prefix: String,
    /// Name of the library's record base class.
    pub base_class: String,
}

/// Settings consulted by the symbolic collection model for one trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    pub schema_libraries: Vec<SchemaLibrary>,
    /// Whether absent record fields contribute their literal default instead of being dropped.
    pub record_include_none: bool,
    pub registry_name: String,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            schema_libraries: DEFAULT_SCHEMA_LIBRARIES
                .iter()
                .map(|(prefix, base)| SchemaLibrary {
                    module_prefix: prefix.to_string(),
                    base_class: base.to_string(),
                })
                .collect(),
            record_include_none: false,
            registry_name: DEFAULT_REGISTRY_NAME.to_string(),
        }
    }
}

impl TraceConfig {
    /// Get the default path to the configuration file.
    pub fn default_path() -> PathBuf {
        if let Ok(config_path) = std::env::var(ENV_CONFIG_PATH) {
            return config_path.into();
        }

        let mut path = PathBuf::new();

        #[cfg(target_os = "windows")]
        {
            if let Ok(appdata) = std::env::var("APPDATA") {
                path.push(appdata);
            }
        }
        #[cfg(not(target_os = "windows"))]
        {
            if let Ok(xdg_config_home) = std::env::var("XDG_CONFIG_HOME") {
                path.push(xdg_config_home);
            } else if let Ok(home) = std::env::var("HOME") {
                path.push(home);
                path.push(".config");
            }
        }

        path.push("symcoll");
        path.push("config.toml");
        path
    }

    /// Load the configuration from the default path, or the defaults if no file exists there.
    pub fn load_or_default() -> SymResult<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from_toml(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_toml_str(toml_str: &str) -> SymResult<Self> {
        toml::from_str(toml_str).map_err(|e| Error::ConfigParse {
            source: e,
            file: "<inline>".to_string(),
        })
    }

    /// Load a configuration from a TOML file.
    pub fn load_from_toml(path: &Path) -> SymResult<Self> {
        let toml_str = std::fs::read_to_string(path)?;

        toml::from_str(&toml_str).map_err(|e| Error::ConfigParse {
            source: e,
            file: path.display().to_string(),
        })
    }

    /// Save the configuration to a TOML file.
    pub fn save_to_toml(&self, path: &Path) -> SymResult<()> {
        let toml_str = toml::to_string(self).map_err(|e| {
            Error::unsupported(format!(
                "Failed during serialization of TOML to path `{}`: {}",
                path.display(),
                e
            ))
        })?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, toml_str)?;
        Ok(())
    }

    /// The configured schema library matching `module`, if any.
    pub fn schema_library_for(&self, module: &str) -> Option<&SchemaLibrary> {
        self.schema_libraries
            .iter()
            .find(|lib| module.starts_with(&lib.module_prefix))
    }
}
