//! Symbolic collections.
//!
//! Every collection is modelled by an immutable container type wrapped in a
//! [`Value`]; methods take the receiving value (`this`) alongside the container so
//! that mutations can build the next version and substitute it through the
//! [`TraceState`].
//!
//! Submodules:
//! - `hash_key`: key wrapper with per-kind equality
//! - `mapping`: `dict`, `OrderedDict` and `defaultdict`
//! - `set`: sets with identity-aware element equality
//! - `record`: records of external schema libraries
//! - `customized`: user `OrderedDict` subclasses
//! - `registry`: the global module registry
use std::{rc::Rc, str::FromStr};

use strum::{AsRefStr, Display, EnumIs, EnumString};

use crate::{
    collections::{
        customized::CustomizedMapping,
        hash_key::HashKey,
        mapping::{DefaultMapping, Items, MappingLike, MappingType, SymbolicMapping},
        record::StructuredRecordMapping,
        set::SymbolicSet,
    },
    trace::TraceState,
    utils::{
        conf::TraceConfig,
        error::{Error, SymResult},
    },
    value::{
        Kwargs, Value, ValueKind,
        class::{ClassMember, RuntimeClass},
        constant::{BuiltinFn, Constant},
        guard::GuardSet,
    },
};

pub mod customized;
pub mod hash_key;
pub mod mapping;
pub mod record;
pub mod registry;
pub mod set;

/// Methods the collections know how to model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
pub enum MethodName {
    #[strum(serialize = "__getitem__")]
    GetItem,
    #[strum(serialize = "__setitem__")]
    SetItem,
    #[strum(serialize = "__contains__")]
    Contains,
    #[strum(serialize = "__len__")]
    Len,
    #[strum(serialize = "items")]
    Items,
    #[strum(serialize = "keys")]
    Keys,
    #[strum(serialize = "values")]
    Values,
    #[strum(serialize = "get")]
    Get,
    #[strum(serialize = "pop")]
    Pop,
    #[strum(serialize = "update")]
    Update,
    #[strum(serialize = "add")]
    Add,
    #[strum(serialize = "to_tuple")]
    ToTuple,
    #[strum(serialize = "__setattr__")]
    SetAttr,
}

impl MethodName {
    /// Methods a user subclass may override and still be traced by inlining.
    pub fn is_overridable(self) -> bool {
        matches!(
            self,
            MethodName::GetItem | MethodName::SetItem | MethodName::ToTuple | MethodName::SetAttr
        )
    }

    /// Methods inherited from the plain mapping implementation.
    pub fn is_mapping_base(self) -> bool {
        !matches!(self, MethodName::Add | MethodName::ToTuple | MethodName::SetAttr)
    }
}

/// How calls of a runtime class are modelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIs)]
pub enum CollectionClass {
    StructuredRecord,
    PlainMap,
    OrderedMap,
    DefaultMap,
    Customized,
    Other,
}

pub fn classify_class(class: &RuntimeClass, config: &TraceConfig) -> CollectionClass {
    if StructuredRecordMapping::is_matching_class(class, config) {
        return CollectionClass::StructuredRecord;
    }
    match (class.module.as_str(), class.name.as_str()) {
        ("builtins", "dict") => CollectionClass::PlainMap,
        ("collections", "OrderedDict") => CollectionClass::OrderedMap,
        ("collections", "defaultdict") => CollectionClass::DefaultMap,
        _ if CustomizedMapping::is_matching_class(class) => CollectionClass::Customized,
        _ => CollectionClass::Other,
    }
}

/// The positional arguments of a call taking exactly `N` of them.
pub(crate) fn expect_args<'a, const N: usize>(
    this: &Value,
    method: MethodName,
    args: &'a [Value],
    kwargs: &Kwargs,
) -> SymResult<&'a [Value; N]> {
    match <&[Value; N]>::try_from(args) {
        Ok(args) if kwargs.is_empty() => Ok(args),
        _ => Err(Error::unsupported(format!(
            "{}.{}() takes {} positional arguments ({} positional and {} keyword given)",
            this.type_name(),
            method,
            N,
            args.len(),
            kwargs.len()
        ))),
    }
}

pub(crate) fn expect_no_args(
    this: &Value,
    method: MethodName,
    args: &[Value],
    kwargs: &Kwargs,
) -> SymResult<()> {
    expect_args::<0>(this, method, args, kwargs).map(|_| ())
}

pub(crate) fn ensure_mutable(this: &Value, method: MethodName) -> SymResult<()> {
    if this.is_mutable() {
        return Ok(());
    }
    Err(Error::MutationOfImmutable {
        container: this.type_name(),
        method: method.to_string(),
    })
}

/// Guards every result of a call inherits: those of the receiver and of all arguments.
pub(crate) fn propagate_call(this: &Value, args: &[Value], kwargs: &Kwargs) -> GuardSet {
    Value::propagate(std::iter::once(this).chain(args).chain(kwargs.values()))
}

/// The mapping container of any mapping-like value.
pub(crate) fn mapping_like(value: &Value) -> Option<&dyn MappingLike> {
    match value.kind() {
        ValueKind::Mapping(m) => Some(m),
        ValueKind::DefaultMapping(m) => Some(m),
        ValueKind::Record(r) => Some(r),
        ValueKind::Customized(c) => Some(c),
        _ => None,
    }
}

/// The mapping underlying any mapping-like value.
pub fn as_mapping(value: &Value) -> Option<&SymbolicMapping> {
    mapping_like(value).map(|m| m.base())
}

/// `seq[index]` for tuples and lists; negative indices count from the end.
pub(crate) fn sequence_getitem(this: &Value, index: &Value) -> SymResult<Value> {
    let (ValueKind::Tuple(items) | ValueKind::List(items)) = this.kind() else {
        return Err(Error::NotSubscriptable {
            kind: this.type_name(),
        });
    };
    let Constant::Int(i) = index.as_constant()? else {
        return Err(Error::unsupported(format!(
            "{} indices must be integers, not `{}`",
            this.type_name(),
            index.type_name()
        )));
    };

    let position = if i < 0 { i + items.len() as i64 } else { i };
    usize::try_from(position)
        .ok()
        .and_then(|p| items.get(p))
        .cloned()
        .ok_or_else(|| Error::KeyNotFound {
            container: this.type_name(),
            key: format!("index {} out of range", i),
        })
}

fn call_sequence_method(
    this: &Value,
    items: &[Value],
    method: MethodName,
    args: &[Value],
    kwargs: &Kwargs,
) -> SymResult<Value> {
    let options = propagate_call(this, args, kwargs);
    let result = match method {
        MethodName::GetItem => {
            let [index] = expect_args::<1>(this, method, args, kwargs)?;
            sequence_getitem(this, index)?
        }
        MethodName::Len => {
            expect_no_args(this, method, args, kwargs)?;
            Value::literal(items.len())
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

/// Items of `dict(arg, **kwargs)`: a mapping is copied, any other iterable must
/// yield key/value pairs.
fn dict_items(args: &[Value], kwargs: &Kwargs) -> SymResult<Items> {
    let mut items = match args {
        [] => Items::new(),
        [source] => match as_mapping(source) {
            Some(mapping) => mapping.items().clone(),
            None => {
                let mut items = Items::new();
                for pair in source.unpack_sequence()? {
                    let [key, value]: [Value; 2] =
                        pair.unpack_sequence()?.try_into().map_err(|_| {
                            Error::unsupported("dict() sequence element is not a pair")
                        })?;
                    items.insert(HashKey::wrap(&key)?, value);
                }
                items
            }
        },
        _ => {
            return Err(Error::unsupported(format!(
                "dict() expected at most 1 positional argument, got {}",
                args.len()
            )));
        }
    };
    for (name, value) in kwargs {
        items.insert(HashKey::str(name), value.clone());
    }
    Ok(items)
}

fn single_iterable(builtin: BuiltinFn, args: &[Value], kwargs: &Kwargs) -> SymResult<Vec<Value>> {
    match (args, kwargs.is_empty()) {
        ([], true) => Ok(Vec::new()),
        ([iterable], true) => iterable.unpack_sequence(),
        _ => Err(Error::unsupported(format!(
            "{}() with {} positional and {} keyword arguments",
            builtin,
            args.len(),
            kwargs.len()
        ))),
    }
}

fn call_builtin(
    tx: &mut TraceState,
    builtin: BuiltinFn,
    args: &[Value],
    kwargs: &Kwargs,
) -> SymResult<Value> {
    let options = Value::propagate(args.iter().chain(kwargs.values()));
    let result = match builtin {
        BuiltinFn::Dict => {
            SymbolicMapping::from_keyed(MappingType::Dict, dict_items(args, kwargs)?).into_value()
        }
        BuiltinFn::List => Value::list(single_iterable(builtin, args, kwargs)?),
        BuiltinFn::Tuple => Value::tuple(single_iterable(builtin, args, kwargs)?),
        BuiltinFn::Set => {
            SymbolicSet::from_items(single_iterable(builtin, args, kwargs)?)?.into_value()
        }
        BuiltinFn::Len => match args {
            [container] if kwargs.is_empty() => {
                container.call_method(tx, MethodName::Len.as_ref(), &[], &Kwargs::new())?
            }
            _ => return Err(Error::unsupported("len() takes exactly one argument")),
        },
        _ => {
            return Err(Error::unsupported(format!(
                "call of builtin `{}`",
                builtin
            )));
        }
    };
    Ok(result.with_guards(&options))
}

fn construct(
    tx: &mut TraceState,
    class: &Rc<RuntimeClass>,
    args: &[Value],
    kwargs: &Kwargs,
) -> SymResult<Value> {
    match classify_class(class, tx.config()) {
        CollectionClass::StructuredRecord => {
            StructuredRecordMapping::create(tx, class, args, kwargs)
        }
        CollectionClass::Customized => CustomizedMapping::create(tx, class, args, kwargs),
        CollectionClass::PlainMap => call_builtin(tx, BuiltinFn::Dict, args, kwargs),
        CollectionClass::OrderedMap => {
            let options = Value::propagate(args.iter().chain(kwargs.values()));
            let items = dict_items(args, kwargs)?;
            Ok(SymbolicMapping::from_keyed(MappingType::OrderedDict, items)
                .into_value()
                .with_guards(&options))
        }
        CollectionClass::DefaultMap => {
            let (factory, rest) = match args.split_first() {
                Some((factory, rest))
                    if matches!(factory.kind(), ValueKind::Constant(Constant::None)) =>
                {
                    (None, rest)
                }
                Some((factory, rest)) => (Some(factory.clone()), rest),
                None => (None, args),
            };
            let options = Value::propagate(args.iter().chain(kwargs.values()));
            let items = dict_items(rest, kwargs)?;
            Ok(DefaultMapping::new(items, factory)?
                .into_value()
                .with_guards(&options))
        }
        CollectionClass::Other => Err(Error::unsupported(format!(
            "call of class `{}`",
            class.qualified_name()
        ))),
    }
}

impl Value {
    /// Model `self.name(*args, **kwargs)`.
    pub fn call_method(
        &self,
        tx: &mut TraceState,
        name: &str,
        args: &[Value],
        kwargs: &Kwargs,
    ) -> SymResult<Value> {
        if let ValueKind::Customized(customized) = self.kind() {
            return customized.call_method(tx, self, name, args, kwargs);
        }

        let method = MethodName::from_str(name).map_err(|_| Error::UnsupportedMethod {
            container: self.type_name(),
            name: name.to_string(),
        })?;
        match self.kind() {
            ValueKind::Mapping(m) => m.call_method(tx, self, method, args, kwargs),
            ValueKind::DefaultMapping(m) => m.call_method(tx, self, method, args, kwargs),
            ValueKind::Set(s) => s.call_method(tx, self, method, args, kwargs),
            ValueKind::Record(r) => r.call_method(tx, self, method, args, kwargs),
            ValueKind::Registry(r) => r.call_method(tx, self, method, args, kwargs),
            ValueKind::Tuple(items) | ValueKind::List(items) => {
                call_sequence_method(self, items, method, args, kwargs)
            }
            _ => Err(Error::UnsupportedMethod {
                container: self.type_name(),
                name: name.to_string(),
            }),
        }
    }

    /// Model `self.name`.
    pub fn var_getattr(&self, tx: &mut TraceState, name: &str) -> SymResult<Value> {
        let not_found = || Error::AttributeNotFound {
            class: self.type_name(),
            name: name.to_string(),
        };
        match self.kind() {
            ValueKind::Record(r) => r.var_getattr(tx, self, name),
            ValueKind::Customized(c) => c.var_getattr(tx, self, name),
            ValueKind::Class(class) => match class.member(name) {
                Some(ClassMember::Function(function)) => {
                    Ok(Value::function(function.clone()).with_guards(self.guards()))
                }
                Some(ClassMember::Attribute(constant)) => {
                    Ok(Value::literal(constant.clone()).with_guards(self.guards()))
                }
                None => Err(not_found()),
            },
            _ => Err(not_found()),
        }
    }

    /// Model `self(*args, **kwargs)`.
    pub fn call_function(
        &self,
        tx: &mut TraceState,
        args: &[Value],
        kwargs: &Kwargs,
    ) -> SymResult<Value> {
        match self.kind() {
            ValueKind::Builtin(builtin) => call_builtin(tx, *builtin, args, kwargs),
            ValueKind::UserFunction(function) => {
                tx.inline_user_function(function, args.to_vec(), kwargs)
            }
            ValueKind::Class(class) => construct(tx, class, args, kwargs),
            _ => Err(Error::unsupported(format!(
                "call of a `{}` value",
                self.type_name()
            ))),
        }
    }
}
