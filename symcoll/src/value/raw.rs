//! Concrete runtime values, as handed to the tracer when it first meets them.
use std::{rc::Rc, sync::Arc};

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::value::{class::RuntimeClass, constant::Constant};

/// A runtime tensor, identified by object identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawTensor {
    pub id: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DictKind {
    Dict,
    OrderedDict,
    DefaultDict,
}

/// An instance of a record class together with the attributes it currently carries.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub class: Rc<RuntimeClass>,
    pub attrs: IndexMap<String, RawValue>,
}

/// A loaded module, as stored in the external module registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RawModule {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    /// Literals, enum members, builtins and method wrappers.
    Constant(Constant),
    Tensor(RawTensor),
    Tuple(Vec<RawValue>),
    List(Vec<RawValue>),
    Dict {
        kind: DictKind,
        default_factory: Option<Box<RawValue>>,
        items: Vec<(RawValue, RawValue)>,
    },
    Set(Vec<RawValue>),
    Record(RawRecord),
    Module(RawModule),
    Class(Rc<RuntimeClass>),
}

impl RawValue {
    pub fn none() -> Self {
        RawValue::Constant(Constant::None)
    }

    pub fn is_none(&self) -> bool {
        matches!(self, RawValue::Constant(Constant::None))
    }

    pub fn dict(items: impl IntoIterator<Item = (RawValue, RawValue)>) -> Self {
        RawValue::Dict {
            kind: DictKind::Dict,
            default_factory: None,
            items: items.into_iter().collect(),
        }
    }
}

macro_rules! raw_from_constant {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for RawValue {
                fn from(value: $ty) -> Self {
                    RawValue::Constant(value.into())
                }
            }
        )*
    };
}

raw_from_constant!(Constant, bool, i32, i64, f64, &str, String);

/// Handle to the host's global name-to-module table.
///
/// The table is shared with, and mutated by, the host at any time between
/// queries; the collection model only ever reads it.
#[derive(Debug, Clone, Default)]
pub struct ModuleRegistry {
    modules: Arc<RwLock<IndexMap<String, RawModule>>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, name: impl Into<String>) {
        let name = name.into();
        self.modules
            .write()
            .insert(name.clone(), RawModule { name });
    }

    pub fn remove(&self, name: &str) -> Option<RawModule> {
        self.modules.write().shift_remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modules.read().contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<RawModule> {
        self.modules.read().get(name).cloned()
    }

    /// Copy of the current contents, as a runtime dict.
    pub fn snapshot(&self) -> RawValue {
        let modules = self.modules.read();
        RawValue::dict(modules.iter().map(|(name, module)| {
            (
                RawValue::from(name.as_str()),
                RawValue::Module(module.clone()),
            )
        }))
    }
}
