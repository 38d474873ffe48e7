//! Process-wide table of callables the interpreter must not trace into.
//!
//! Constructing a schema record during tracing runs the record's real
//! constructor, which must not re-enter the tracer. Instead of patching those
//! constructors, their `(class, member)` pairs are registered here and the
//! interpreter loop consults [`is_skipped`] before entering any call.
//!
//! The members of the external schema base classes are registered at most once
//! per process ([`patch_schema_libraries_once`]); per-class registrations are
//! idempotent inserts.
use std::collections::BTreeSet;

use log::debug;
use once_cell::sync::{Lazy, OnceCell};
use parking_lot::RwLock;

use crate::utils::conf::TraceConfig;

/// An external class the host reports as importable, with its callable members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalClass {
    pub module: String,
    pub name: String,
    pub callables: Vec<String>,
}

impl ExternalClass {
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.module, self.name)
    }
}

static SKIP_TABLE: Lazy<RwLock<BTreeSet<(String, String)>>> = Lazy::new(Default::default);
static EXTERNAL_CLASSES: Lazy<RwLock<Vec<ExternalClass>>> = Lazy::new(Default::default);
static SCHEMA_PATCH: OnceCell<usize> = OnceCell::new();

/// Make an external class known. Libraries that were never registered are
/// treated as unavailable.
pub fn register_external_class(class: ExternalClass) {
    debug!("External class `{}` is available", class.qualified_name());
    EXTERNAL_CLASSES.write().push(class);
}

/// Record that `class.member` must not be traced into. Returns `true` if the
/// entry is new.
pub fn skip_member(class: &str, member: &str) -> bool {
    let inserted = SKIP_TABLE
        .write()
        .insert((class.to_string(), member.to_string()));
    if inserted {
        debug!("Skipping `{}.{}` during tracing", class, member);
    }
    inserted
}

pub fn is_skipped(class: &str, member: &str) -> bool {
    SKIP_TABLE
        .read()
        .contains(&(class.to_string(), member.to_string()))
}

/// Register every callable member of the schema base classes configured in
/// `config`. Only the first call in the process does any work; later calls
/// return the number of members registered by the first one.
pub fn patch_schema_libraries_once(config: &TraceConfig) -> usize {
    *SCHEMA_PATCH.get_or_init(|| {
        let externals = EXTERNAL_CLASSES.read();
        let mut count = 0;
        for library in &config.schema_libraries {
            let base = externals.iter().find(|class| {
                class.module.starts_with(&library.module_prefix)
                    && class.name == library.base_class
            });
            let Some(base) = base else {
                debug!(
                    "Schema library `{}` is not available, nothing to patch",
                    library.module_prefix
                );
                continue;
            };
            let qualified = base.qualified_name();
            for member in &base.callables {
                if skip_member(&qualified, member) {
                    count += 1;
                }
            }
        }
        debug!("Schema libraries patched, {} members skipped", count);
        count
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registrations_are_idempotent() {
        assert!(!is_skipped("app.Unique", "__init__"));
        assert!(skip_member("app.Unique", "__init__"));
        assert!(!skip_member("app.Unique", "__init__"));
        assert!(is_skipped("app.Unique", "__init__"));
        assert!(!is_skipped("app.Unique", "__setitem__"));
    }
}
