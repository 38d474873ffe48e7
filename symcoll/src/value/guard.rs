//! Guard conditions attached to abstract values.
//!
//! Guards are opaque to this crate: they are constructed and attached, never
//! evaluated. The guard subsystem consuming them keys each one by its origin,
//! its kind and the kind's parameters.
use std::collections::BTreeSet;

use crate::value::{constant::Constant, origin::Origin};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GuardKind {
    /// The runtime value equals this constant.
    ConstantMatch(Constant),
    /// The runtime value has exactly this type.
    TypeMatch(String),
    /// The runtime value is the same object as when the trace was compiled.
    IdMatch,
    /// The runtime tensor matches the recorded tensor properties.
    TensorMatch,
    /// `key` is present in the mapping at the origin, or absent if `invert`.
    DictContains { key: Constant, invert: bool },
    /// The runtime object at the origin is the very same object as the one at `other`.
    Duplicate { other: Origin },
    /// A symbolic number was specialized to this constant.
    Specialized(Constant),
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Guard {
    pub origin: Origin,
    pub kind: GuardKind,
}

impl std::fmt::Display for Guard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            GuardKind::ConstantMatch(c) => write!(f, "{} == {}", self.origin, c),
            GuardKind::TypeMatch(ty) => write!(f, "type({}) is {}", self.origin, ty),
            GuardKind::IdMatch => write!(f, "id({}) is unchanged", self.origin),
            GuardKind::TensorMatch => write!(f, "tensor_match({})", self.origin),
            GuardKind::DictContains { key, invert } => {
                let op = if *invert { "not in" } else { "in" };
                write!(f, "{} {} {}", key, op, self.origin)
            }
            GuardKind::Duplicate { other } => write!(f, "{} is {}", self.origin, other),
            GuardKind::Specialized(c) => write!(f, "{} specialized to {}", self.origin, c),
        }
    }
}

/// An ordered, deduplicated set of guards.
pub type GuardSet = BTreeSet<Guard>;

/// Build the alias guard stating that the objects at `a` and `b` are one object.
///
/// Returns [`None`] when either origin is unknown or when both are the same
/// origin, since there is then nothing to check.
pub fn make_dupe_guard(a: Option<&Origin>, b: Option<&Origin>) -> Option<GuardKind> {
    match (a, b) {
        (Some(a), Some(b)) if a != b => Some(GuardKind::Duplicate { other: b.clone() }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dupe_guard_requires_two_distinct_origins() {
        let a = Origin::local("a");
        let b = Origin::local("b");
        assert_eq!(
            make_dupe_guard(Some(&a), Some(&b)),
            Some(GuardKind::Duplicate { other: b.clone() })
        );
        assert_eq!(make_dupe_guard(Some(&a), Some(&a)), None);
        assert_eq!(make_dupe_guard(None, Some(&b)), None);
    }

    #[test]
    fn guard_display() {
        let guard = Origin::global("sys")
            .attr("modules")
            .make_guard(GuardKind::DictContains {
                key: Constant::from("numpy"),
                invert: true,
            });
        assert_eq!(guard.to_string(), "'numpy' not in G['sys'].modules");
    }
}
