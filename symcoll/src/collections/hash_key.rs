use std::hash::{Hash, Hasher};

use crate::{
    hashable::is_hashable,
    utils::error::{Error, SymResult},
    value::{
        PlaceholderId, Value, ValueKind,
        constant::Constant,
        guard::{GuardKind, GuardSet},
    },
};

/// What a [`HashKey`] hashes and compares.
///
/// Tensor-like keys are represented by their placeholder, so they compare by
/// identity; everything else compares by value. Distinct variants (and distinct
/// constant types) never compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyValue {
    Placeholder(PlaceholderId),
    Tuple(Vec<KeyValue>),
    Const(Constant),
}

/// An abstract value usable as a mapping key.
///
/// Two keys are equal iff the runtime values they stand for would be equal
/// keys: tensors by identity, everything else by value.
#[derive(Clone)]
pub struct HashKey {
    value: Value,
    underlying: KeyValue,
}

impl HashKey {
    /// Wrap `value` as a key. Symbolic numbers, including those nested in
    /// tuples, are specialized to their hint first; the specialization guards
    /// end up on [`HashKey::value`].
    pub fn wrap(value: &Value) -> SymResult<Self> {
        let value = specialize(value);
        if !is_hashable(&value) {
            return Err(Error::UnhashableValue {
                kind: value.type_name(),
            });
        }
        let underlying = underlying_value(&value)?;
        Ok(Self { value, underlying })
    }

    /// Shorthand for a string-literal key.
    pub fn str(name: &str) -> Self {
        Self {
            value: Value::literal(name),
            underlying: KeyValue::Const(Constant::from(name)),
        }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Guards a lookup by this key depends on.
    pub fn guards(&self) -> &GuardSet {
        self.value.guards()
    }

    pub fn underlying_value(&self) -> &KeyValue {
        &self.underlying
    }

    /// The key as a constant, when it is one.
    pub fn as_constant(&self) -> Option<&Constant> {
        match &self.underlying {
            KeyValue::Const(c) => Some(c),
            _ => None,
        }
    }
}

fn specialize(value: &Value) -> Value {
    match value.kind() {
        ValueKind::SymNumber { hint } => {
            let specialized = Value::literal(hint.clone()).with_guards(value.guards());
            match value.origin() {
                Some(origin) => {
                    let guard = origin.make_guard(GuardKind::Specialized(hint.clone()));
                    specialized.with_origin(origin.clone()).with_guards([&guard])
                }
                None => specialized,
            }
        }
        ValueKind::Tuple(items) => {
            let specialized: Vec<Value> = items.iter().map(specialize).collect();
            if specialized.iter().zip(items).all(|(new, old)| new.is(old)) {
                return value.clone();
            }
            let tuple = Value::tuple(specialized).with_guards(value.guards());
            match value.origin() {
                Some(origin) => tuple.with_origin(origin.clone()),
                None => tuple,
            }
        }
        _ => value.clone(),
    }
}

fn underlying_value(value: &Value) -> SymResult<KeyValue> {
    match value.kind() {
        ValueKind::Tensor {
            placeholder: Some(placeholder),
        } => Ok(KeyValue::Placeholder(*placeholder)),
        ValueKind::Tuple(items) => Ok(KeyValue::Tuple(
            items
                .iter()
                .map(underlying_value)
                .collect::<SymResult<_>>()?,
        )),
        _ => Ok(KeyValue::Const(value.as_constant()?)),
    }
}

impl PartialEq for HashKey {
    fn eq(&self, other: &Self) -> bool {
        self.underlying == other.underlying
    }
}

impl Eq for HashKey {}

impl Hash for HashKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.underlying.hash(state);
    }
}

impl std::fmt::Debug for HashKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HashKey({:?})", self.underlying)
    }
}

impl std::fmt::Display for HashKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value)
    }
}
