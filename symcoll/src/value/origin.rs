//! Provenance of abstract values.
use crate::value::{
    constant::Constant,
    guard::{Guard, GuardKind},
};

/// How an abstract value was derived from the program inputs.
///
/// Two values with distinct origins may still denote the same runtime object;
/// that fact is what alias guards record.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Origin {
    /// A local variable of the traced frame.
    Local(String),
    /// A global variable of the traced frame.
    Global(String),
    /// Attribute `name` of the object at the inner origin.
    Attr(Box<Origin>, String),
    /// Item `key` of the container at the inner origin.
    GetItem(Box<Origin>, Constant),
}

impl Origin {
    pub fn local(name: impl Into<String>) -> Self {
        Origin::Local(name.into())
    }

    pub fn global(name: impl Into<String>) -> Self {
        Origin::Global(name.into())
    }

    pub fn attr(&self, name: impl Into<String>) -> Self {
        Origin::Attr(Box::new(self.clone()), name.into())
    }

    pub fn item(&self, key: impl Into<Constant>) -> Self {
        Origin::GetItem(Box::new(self.clone()), key.into())
    }

    pub fn make_guard(&self, kind: GuardKind) -> Guard {
        Guard {
            origin: self.clone(),
            kind,
        }
    }
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Origin::Local(name) => write!(f, "L['{}']", name),
            Origin::Global(name) => write!(f, "G['{}']", name),
            Origin::Attr(inner, name) => write!(f, "{}.{}", inner, name),
            Origin::GetItem(inner, key) => write!(f, "{}[{}]", inner, key),
        }
    }
}
