//! Hashability classifier
//!
//! Decides whether a value may be used as a mapping key. There is one
//! classification table ([`eligibility`]) from value *class* to eligibility;
//! both the predicate over runtime values ([`is_hashable_raw`]) and the one
//! over abstract values ([`is_hashable`]) classify their input and then consult
//! that same table, so the two cannot drift apart.
use strum::{EnumIter, IntoStaticStr};

use crate::value::{Value, ValueKind, constant::Constant, raw::RawValue};

/// Kinds of values, as far as key eligibility is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, IntoStaticStr)]
pub enum KeyClass {
    Literal,
    Tensor,
    Enum,
    Builtin,
    SymNumber,
    Tuple,
    Unhashable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    Always,
    /// A tensor is only eligible once its identity can be checked. Runtime
    /// tensors always can; abstract ones need a resolved placeholder.
    RequiresIdentity,
    /// Eligible iff every element is.
    Elementwise,
    Never,
}

pub const fn eligibility(class: KeyClass) -> Eligibility {
    match class {
        KeyClass::Literal | KeyClass::Enum | KeyClass::Builtin | KeyClass::SymNumber => {
            Eligibility::Always
        }
        KeyClass::Tensor => Eligibility::RequiresIdentity,
        KeyClass::Tuple => Eligibility::Elementwise,
        KeyClass::Unhashable => Eligibility::Never,
    }
}

fn classify_constant(c: &Constant) -> KeyClass {
    match c {
        Constant::None
        | Constant::Bool(_)
        | Constant::Int(_)
        | Constant::Float(_)
        | Constant::Str(_) => KeyClass::Literal,
        Constant::Tuple(_) => KeyClass::Tuple,
        Constant::Enum(_) => KeyClass::Enum,
        Constant::Builtin(_) => KeyClass::Builtin,
        Constant::Method(_) => KeyClass::Unhashable,
    }
}

pub fn classify_raw(raw: &RawValue) -> KeyClass {
    match raw {
        RawValue::Constant(c) => classify_constant(c),
        RawValue::Tensor(_) => KeyClass::Tensor,
        RawValue::Tuple(_) => KeyClass::Tuple,
        _ => KeyClass::Unhashable,
    }
}

pub fn classify(value: &Value) -> KeyClass {
    match value.kind() {
        ValueKind::Constant(c) => classify_constant(c),
        ValueKind::Tensor { .. } => KeyClass::Tensor,
        ValueKind::Tuple(_) => KeyClass::Tuple,
        ValueKind::Builtin(_) => KeyClass::Builtin,
        ValueKind::Enum(_) => KeyClass::Enum,
        ValueKind::SymNumber { .. } => KeyClass::SymNumber,
        _ => KeyClass::Unhashable,
    }
}

/// Whether a runtime value may be used as a mapping key.
pub fn is_hashable_raw(raw: &RawValue) -> bool {
    match eligibility(classify_raw(raw)) {
        Eligibility::Always | Eligibility::RequiresIdentity => true,
        Eligibility::Elementwise => match raw {
            RawValue::Tuple(items) => items.iter().all(is_hashable_raw),
            RawValue::Constant(Constant::Tuple(items)) => items
                .iter()
                .all(|c| is_hashable_raw(&RawValue::Constant(c.clone()))),
            _ => false,
        },
        Eligibility::Never => false,
    }
}

/// Whether an abstract value may be used as a mapping key.
pub fn is_hashable(value: &Value) -> bool {
    match eligibility(classify(value)) {
        Eligibility::Always => true,
        Eligibility::RequiresIdentity => matches!(
            value.kind(),
            ValueKind::Tensor {
                placeholder: Some(_)
            }
        ),
        Eligibility::Elementwise => match value.kind() {
            ValueKind::Tuple(items) => items.iter().all(is_hashable),
            _ => false,
        },
        Eligibility::Never => false,
    }
}
