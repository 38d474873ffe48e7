//! Symbolic sets.
//!
//! A [`SymbolicSet`] is a sequence of abstract values kept free of duplicates
//! under per-kind element equality: tensor-like elements compare by placeholder
//! identity, everything else by value.
use log::debug;

use crate::{
    codegen::{BuildOp, Codegen},
    collections::{MethodName, ensure_mutable, expect_args, expect_no_args, propagate_call},
    trace::TraceState,
    utils::error::{Error, SymResult},
    value::{
        Kwargs, PlaceholderId, Value, ValueKind,
        constant::Constant,
        guard::{GuardSet, make_dupe_guard},
    },
};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ElementKey {
    Identity(PlaceholderId),
    Value(Constant),
}

/// Per-kind equality adapter used only inside sets.
#[derive(Debug, Clone)]
struct SetElement {
    key: ElementKey,
}

impl SetElement {
    fn of(value: &Value) -> SymResult<Self> {
        let key = match value.kind() {
            ValueKind::Tensor {
                placeholder: Some(placeholder),
            } => ElementKey::Identity(*placeholder),
            ValueKind::Tensor { placeholder: None } => {
                return Err(Error::UnsupportedSetElement {
                    kind: value.type_name(),
                    reason: "cannot check tensor identity without its placeholder".into(),
                });
            }
            ValueKind::Constant(c) => ElementKey::Value(c.clone()),
            ValueKind::MethodWrapper(_) | ValueKind::Builtin(_) | ValueKind::Enum(_) => {
                ElementKey::Value(value.as_constant()?)
            }
            _ => {
                return Err(Error::UnsupportedSetElement {
                    kind: value.type_name(),
                    reason: "not yet implemented".into(),
                });
            }
        };
        Ok(Self { key })
    }

    fn compares_by_identity(&self) -> bool {
        matches!(self.key, ElementKey::Identity(_))
    }
}

impl PartialEq for SetElement {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

#[derive(Debug, Clone, Default)]
pub struct SymbolicSet {
    items: Vec<Value>,
}

impl SymbolicSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set by adding `items` in order.
    pub fn from_items(items: impl IntoIterator<Item = Value>) -> SymResult<Self> {
        let mut set = Self::new();
        for item in items {
            set.add(item)?;
        }
        Ok(set)
    }

    pub fn items(&self) -> &[Value] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Add `item` unless an equal element is present.
    ///
    /// When an equal element is found and equality is by identity, the two values
    /// provably denote one runtime object; if they come from different origins an
    /// alias guard recording that fact is attached to the element already present.
    pub(crate) fn add(&mut self, item: Value) -> SymResult<()> {
        let element = SetElement::of(&item)?;

        for existing in self.items.iter_mut() {
            if SetElement::of(existing)? != element {
                continue;
            }
            if element.compares_by_identity() {
                let alias_guard = make_dupe_guard(existing.origin(), item.origin())
                    .and_then(|kind| existing.origin().map(|origin| origin.make_guard(kind)));
                if let Some(guard) = alias_guard {
                    debug!("Set alias detected, adding guard `{}`", guard);
                    *existing = existing.with_guards([&guard]);
                }
            }
            return Ok(());
        }

        self.items.push(item);
        Ok(())
    }

    pub fn contains(&self, item: &Value) -> SymResult<bool> {
        let probe = SetElement::of(item)?;
        for existing in &self.items {
            if SetElement::of(existing)? == probe {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub fn guards(&self) -> GuardSet {
        Value::propagate(&self.items)
    }

    pub fn into_value(self) -> Value {
        let guards = self.guards();
        Value::from_parts(ValueKind::Set(self), None, guards, true)
    }

    pub fn call_method(
        &self,
        tx: &mut TraceState,
        this: &Value,
        method: MethodName,
        args: &[Value],
        kwargs: &Kwargs,
    ) -> SymResult<Value> {
        let options = propagate_call(this, args, kwargs);

        let result = match method {
            MethodName::Add => {
                let [item] = expect_args::<1>(this, method, args, kwargs)?;
                ensure_mutable(this, method)?;
                let mut new = self.clone();
                new.add(item.clone())?;
                let new = this
                    .next_version(ValueKind::Set(new))
                    .with_guards(&options);
                tx.replace_all(this, new)?;
                Value::none()
            }
            MethodName::Pop => {
                expect_no_args(this, method, args, kwargs)?;
                ensure_mutable(this, method)?;
                let mut items = self.items.clone();
                let popped = items.pop().ok_or_else(|| Error::KeyNotFound {
                    container: this.type_name(),
                    key: "pop from an empty set".into(),
                })?;
                tx.replace_all(
                    this,
                    this.next_version(ValueKind::Set(SymbolicSet { items })),
                )?;
                popped
            }
            MethodName::Len => {
                expect_no_args(this, method, args, kwargs)?;
                Value::literal(self.len())
            }
            MethodName::Contains => {
                let [item] = expect_args::<1>(this, method, args, kwargs)?;
                Value::literal(self.contains(item)?)
            }
            MethodName::GetItem => {
                return Err(Error::NotSubscriptable {
                    kind: this.type_name(),
                });
            }
            _ => {
                return Err(Error::UnsupportedMethod {
                    container: this.type_name(),
                    name: method.to_string(),
                });
            }
        };

        Ok(result.with_guards(&options))
    }

    pub fn reconstruct(&self, codegen: &mut Codegen) -> SymResult<()> {
        codegen.push(BuildOp::load_global("builtins", "set"));
        codegen.emit_all(&self.items)?;
        codegen.push(BuildOp::BuildSet(self.items.len()));
        codegen.push(BuildOp::CallFunction(1));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{constant::BuiltinFn, origin::Origin};

    #[test]
    fn equal_literals_collapse() {
        let set = SymbolicSet::from_items([
            Value::literal(1),
            Value::literal("a"),
            Value::literal(1),
        ])
        .unwrap();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn equal_literals_from_distinct_origins_get_no_alias_guard() {
        let a = Value::literal(3).with_origin(Origin::local("a"));
        let b = Value::literal(3).with_origin(Origin::local("b"));
        let set = SymbolicSet::from_items([a, b]).unwrap();
        assert_eq!(set.len(), 1);
        assert!(set.items()[0].guards().is_empty());
    }

    #[test]
    fn builtins_are_allowed_elements() {
        let set = SymbolicSet::from_items([
            Value::builtin(BuiltinFn::Len),
            Value::builtin(BuiltinFn::Len),
        ])
        .unwrap();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn unsupported_elements() {
        let err = SymbolicSet::from_items([Value::list(vec![])]).unwrap_err();
        assert!(err.is_unsupported_set_element());
        let err = SymbolicSet::from_items([Value::unresolved_tensor()]).unwrap_err();
        assert!(err.is_unsupported_set_element());
    }
}
