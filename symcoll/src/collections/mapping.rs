//! Ordered symbolic mappings.
//!
//! [`SymbolicMapping`] models `dict`, `OrderedDict` and, through wrappers, every
//! other mapping-like container of the crate. The method implementations in this
//! module are written once against the [`MappingLike`] seam so that a mutation
//! of a wrapper (say a [`DefaultMapping`]) produces a new version of the same
//! wrapper rather than a plain mapping.
use std::rc::Rc;

use indexmap::IndexMap;
use log::trace;
use smallvec::SmallVec;

use crate::{
    codegen::{BuildOp, Codegen},
    collections::{
        MethodName, as_mapping, ensure_mutable, expect_args, expect_no_args, hash_key::HashKey,
        propagate_call, set::SymbolicSet,
    },
    trace::TraceState,
    utils::error::{Error, SymResult},
    value::{
        Kwargs, Value, ValueKind,
        class::RuntimeClass,
        constant::{BuiltinFn, Constant},
        guard::GuardSet,
    },
};

/// Items of a mapping, in insertion order.
pub type Items = IndexMap<HashKey, Value>;

/// The runtime container type a mapping stands for.
#[derive(Debug, Clone, PartialEq)]
pub enum MappingType {
    Dict,
    OrderedDict,
    DefaultDict,
    UserClass(Rc<RuntimeClass>),
}

impl std::fmt::Display for MappingType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MappingType::Dict => write!(f, "dict"),
            MappingType::OrderedDict => write!(f, "OrderedDict"),
            MappingType::DefaultDict => write!(f, "defaultdict"),
            MappingType::UserClass(class) => write!(f, "{}", class.name),
        }
    }
}

/// Containers backed by a [`SymbolicMapping`].
pub trait MappingLike {
    fn base(&self) -> &SymbolicMapping;

    /// This same container holding `items` instead.
    fn with_items(&self, items: Items) -> ValueKind;
}

#[derive(Debug, Clone)]
pub struct SymbolicMapping {
    items: Items,
    mapping_type: MappingType,
}

impl MappingLike for SymbolicMapping {
    fn base(&self) -> &SymbolicMapping {
        self
    }

    fn with_items(&self, items: Items) -> ValueKind {
        ValueKind::Mapping(self.replace_items(items))
    }
}

impl SymbolicMapping {
    pub fn new(mapping_type: MappingType) -> Self {
        Self {
            items: Items::new(),
            mapping_type,
        }
    }

    /// Build a mapping from `(key, value)` pairs; later duplicates overwrite
    /// earlier ones in place.
    pub fn from_items(
        mapping_type: MappingType,
        items: impl IntoIterator<Item = (Value, Value)>,
    ) -> SymResult<Self> {
        let mut keyed = Items::new();
        for (key, value) in items {
            keyed.insert(HashKey::wrap(&key)?, value);
        }
        Ok(Self::from_keyed(mapping_type, keyed))
    }

    pub fn from_keyed(mapping_type: MappingType, items: Items) -> Self {
        Self {
            items,
            mapping_type,
        }
    }

    pub(crate) fn replace_items(&self, items: Items) -> Self {
        Self {
            items,
            mapping_type: self.mapping_type.clone(),
        }
    }

    pub fn mapping_type(&self) -> &MappingType {
        &self.mapping_type
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, key: &HashKey) -> Option<&Value> {
        self.items.get(key)
    }

    /// Membership test. Values that cannot be keys are simply absent.
    pub fn contains(&self, key: &Value) -> bool {
        HashKey::wrap(key)
            .map(|key| self.items.contains_key(&key))
            .unwrap_or(false)
    }

    pub fn keys(&self) -> impl Iterator<Item = &Value> {
        self.items.keys().map(HashKey::value)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.items.values()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&HashKey, &Value)> {
        self.items.iter()
    }

    pub fn items(&self) -> &Items {
        &self.items
    }

    /// Guards of every key and value.
    pub fn guards(&self) -> GuardSet {
        Value::propagate(self.keys().chain(self.values()))
    }

    pub fn into_value(self) -> Value {
        let guards = self.guards();
        Value::from_parts(ValueKind::Mapping(self), None, guards, true)
    }

    pub fn call_method(
        &self,
        tx: &mut TraceState,
        this: &Value,
        method: MethodName,
        args: &[Value],
        kwargs: &Kwargs,
    ) -> SymResult<Value> {
        call_mapping_method(self, tx, this, method, args, kwargs)
    }

    pub(crate) fn emit_pairs(&self, codegen: &mut Codegen) -> SymResult<()> {
        for (key, value) in self.iter() {
            codegen.emit(key.value())?;
            codegen.emit(value)?;
        }
        Ok(())
    }

    pub fn reconstruct(&self, codegen: &mut Codegen) -> SymResult<()> {
        match &self.mapping_type {
            MappingType::Dict => {
                self.emit_pairs(codegen)?;
                codegen.push(BuildOp::BuildMap(self.len()));
            }
            MappingType::OrderedDict => {
                codegen.push(BuildOp::load_global("collections", "OrderedDict"));
                self.emit_pairs(codegen)?;
                codegen.push(BuildOp::BuildMap(self.len()));
                codegen.push(BuildOp::CallFunction(1));
            }
            MappingType::DefaultDict => {
                return Err(Error::unsupported(
                    "a defaultdict is rebuilt together with its default factory",
                ));
            }
            MappingType::UserClass(class) => self.reconstruct_as_call(codegen, class)?,
        }
        Ok(())
    }

    /// `Class(key0=value0, key1=value1, ...)`; every key must be a string.
    pub(crate) fn reconstruct_as_call(
        &self,
        codegen: &mut Codegen,
        class: &RuntimeClass,
    ) -> SymResult<()> {
        codegen.push(BuildOp::LoadClass {
            module: class.module.clone(),
            name: class.name.clone(),
        });
        let mut names: SmallVec<[String; 4]> = SmallVec::new();
        for (key, value) in self.iter() {
            let name = key.as_constant().and_then(Constant::as_str).ok_or_else(|| {
                Error::unsupported(format!(
                    "cannot pass key {} of `{}` as a keyword argument",
                    key, class.name
                ))
            })?;
            names.push(name.to_string());
            codegen.emit(value)?;
        }
        codegen.push(BuildOp::CallFunctionKw {
            argc: names.len(),
            names,
        });
        Ok(())
    }
}

/// Guards of the key argument of a lookup, which may have specialized a
/// symbolic number.
fn key_guards(method: MethodName, args: &[Value]) -> GuardSet {
    let takes_key = matches!(
        method,
        MethodName::GetItem
            | MethodName::Get
            | MethodName::Pop
            | MethodName::Contains
            | MethodName::SetItem
    );
    match args.first() {
        Some(key) if takes_key => HashKey::wrap(key)
            .map(|key| key.guards().clone())
            .unwrap_or_default(),
        _ => GuardSet::new(),
    }
}

fn key_not_found(this: &Value, key: &HashKey) -> Error {
    Error::KeyNotFound {
        container: this.type_name(),
        key: key.to_string(),
    }
}

pub(crate) fn get_item(m: &dyn MappingLike, this: &Value, key: &Value) -> SymResult<Value> {
    let key = HashKey::wrap(key)?;
    m.base()
        .get(&key)
        .cloned()
        .ok_or_else(|| key_not_found(this, &key))
}

/// Upsert `key`, keeping its position if already present. Returns the new version of the container.
pub(crate) fn set_item(
    m: &dyn MappingLike,
    tx: &mut TraceState,
    this: &Value,
    key: &Value,
    value: &Value,
) -> SymResult<Value> {
    ensure_mutable(this, MethodName::SetItem)?;
    let key = HashKey::wrap(key)?;
    trace!("{}[{}] = {}", this, key, value);

    let guards = Value::propagate([key.value(), value]);
    let mut items = m.base().items.clone();
    items.insert(key, value.clone());
    let new = this.next_version(m.with_items(items)).with_guards(&guards);
    tx.replace_all(this, new)
}

/// Remove `key` and return its value; a missing key yields `default` without
/// touching the container.
pub(crate) fn pop(
    m: &dyn MappingLike,
    tx: &mut TraceState,
    this: &Value,
    key: &Value,
    default: Option<&Value>,
) -> SymResult<Value> {
    let key = HashKey::wrap(key)?;
    let Some(old) = m.base().get(&key).cloned() else {
        return default.cloned().ok_or_else(|| key_not_found(this, &key));
    };

    ensure_mutable(this, MethodName::Pop)?;
    let mut items = m.base().items.clone();
    items.shift_remove(&key);
    tx.replace_all(this, this.next_version(m.with_items(items)))?;
    Ok(old)
}

/// Merge `other` and then `kwargs` into the container, later values winning.
pub(crate) fn update(
    m: &dyn MappingLike,
    tx: &mut TraceState,
    this: &Value,
    other: Option<&Value>,
    kwargs: &Kwargs,
) -> SymResult<Value> {
    ensure_mutable(this, MethodName::Update)?;
    let mut items = m.base().items.clone();
    let mut guards = Value::propagate(kwargs.values());

    if let Some(other) = other {
        let other_mapping = as_mapping(other).ok_or_else(|| {
            Error::unsupported(format!(
                "update() of a {} with a `{}`",
                this.type_name(),
                other.type_name()
            ))
        })?;
        for (key, value) in other_mapping.iter() {
            items.insert(key.clone(), value.clone());
        }
        guards.extend(other.guards().iter().cloned());
    }
    for (name, value) in kwargs {
        items.insert(HashKey::str(name), value.clone());
    }

    let new = this.next_version(m.with_items(items)).with_guards(&guards);
    tx.replace_all(this, new)
}

pub(crate) fn call_mapping_method(
    m: &dyn MappingLike,
    tx: &mut TraceState,
    this: &Value,
    method: MethodName,
    args: &[Value],
    kwargs: &Kwargs,
) -> SymResult<Value> {
    let mut options = propagate_call(this, args, kwargs);
    options.extend(key_guards(method, args));
    let base = m.base();

    let result = match method {
        MethodName::GetItem => {
            let [key] = expect_args::<1>(this, method, args, kwargs)?;
            get_item(m, this, key)?
        }
        MethodName::Items => {
            expect_no_args(this, method, args, kwargs)?;
            Value::tuple(
                base.iter()
                    .map(|(k, v)| Value::tuple(vec![k.value().clone(), v.clone()]))
                    .collect(),
            )
        }
        MethodName::Keys => {
            expect_no_args(this, method, args, kwargs)?;
            SymbolicSet::from_items(base.keys().cloned())?.into_value()
        }
        MethodName::Values => {
            expect_no_args(this, method, args, kwargs)?;
            Value::tuple(base.values().cloned().collect())
        }
        MethodName::Len => {
            expect_no_args(this, method, args, kwargs)?;
            Value::literal(base.len())
        }
        MethodName::SetItem => {
            let [key, value] = expect_args::<2>(this, method, args, kwargs)?;
            set_item(m, tx, this, key, value)?;
            Value::none()
        }
        MethodName::Get if (1..=2).contains(&args.len()) && kwargs.is_empty() => {
            let key = HashKey::wrap(&args[0])?;
            match base.get(&key) {
                Some(value) => value.clone(),
                None => args.get(1).cloned().unwrap_or_else(Value::none),
            }
        }
        MethodName::Pop if (1..=2).contains(&args.len()) && kwargs.is_empty() => {
            pop(m, tx, this, &args[0], args.get(1))?
        }
        MethodName::Update if args.len() <= 1 => {
            update(m, tx, this, args.first(), kwargs)?;
            Value::none()
        }
        MethodName::Contains => {
            let [key] = expect_args::<1>(this, method, args, kwargs)?;
            Value::literal(base.contains(key))
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

/// A `defaultdict`: a mapping whose lookups of missing keys insert and return
/// a value produced by its default factory.
#[derive(Debug, Clone)]
pub struct DefaultMapping {
    base: SymbolicMapping,
    default_factory: Option<Value>,
}

impl MappingLike for DefaultMapping {
    fn base(&self) -> &SymbolicMapping {
        &self.base
    }

    fn with_items(&self, items: Items) -> ValueKind {
        ValueKind::DefaultMapping(DefaultMapping {
            base: self.base.replace_items(items),
            default_factory: self.default_factory.clone(),
        })
    }
}

impl DefaultMapping {
    pub fn new(items: Items, default_factory: Option<Value>) -> SymResult<Self> {
        if let Some(factory) = &default_factory {
            if !Self::is_supported_factory(factory) {
                return Err(Error::unsupported(format!(
                    "defaultdict with a `{}` default factory",
                    factory.type_name()
                )));
            }
        }
        Ok(Self {
            base: SymbolicMapping::from_keyed(MappingType::DefaultDict, items),
            default_factory,
        })
    }

    /// The builtins `list`, `tuple`, `dict`, or a user function.
    pub fn is_supported_factory(factory: &Value) -> bool {
        match factory.kind() {
            ValueKind::Builtin(builtin) => {
                matches!(builtin, BuiltinFn::List | BuiltinFn::Tuple | BuiltinFn::Dict)
            }
            ValueKind::UserFunction(_) => true,
            _ => false,
        }
    }

    pub fn default_factory(&self) -> Option<&Value> {
        self.default_factory.as_ref()
    }

    /// An empty mapping whose factory is not one of the builtin containers is
    /// never constant; otherwise the mapping is constant iff all its items are.
    pub fn is_python_constant(&self) -> bool {
        let builtin_factory = matches!(
            self.default_factory.as_ref().map(Value::kind),
            Some(ValueKind::Builtin(
                BuiltinFn::List | BuiltinFn::Tuple | BuiltinFn::Dict
            ))
        );
        if !builtin_factory && self.base.is_empty() {
            return false;
        }
        self.base
            .iter()
            .all(|(k, v)| k.as_constant().is_some() && v.as_constant().is_ok())
    }

    pub fn into_value(self) -> Value {
        let mut guards = self.base.guards();
        if let Some(factory) = &self.default_factory {
            guards.extend(factory.guards().iter().cloned());
        }
        Value::from_parts(ValueKind::DefaultMapping(self), None, guards, true)
    }

    pub fn call_method(
        &self,
        tx: &mut TraceState,
        this: &Value,
        method: MethodName,
        args: &[Value],
        kwargs: &Kwargs,
    ) -> SymResult<Value> {
        if method != MethodName::GetItem {
            return call_mapping_method(self, tx, this, method, args, kwargs);
        }

        let [key] = expect_args::<1>(this, method, args, kwargs)?;
        let hashed = HashKey::wrap(key)?;
        if self.base.get(&hashed).is_some() {
            return call_mapping_method(self, tx, this, method, args, kwargs);
        }

        let Some(factory) = &self.default_factory else {
            return Err(key_not_found(this, &hashed));
        };
        ensure_mutable(this, method)?;
        let mut options = propagate_call(this, args, kwargs);
        options.extend(hashed.guards().iter().cloned());
        let default = factory.call_function(tx, &[], &Kwargs::new())?;

        let mut items = self.base.items.clone();
        items.insert(hashed, default.clone());
        tx.replace_all(this, this.next_version(self.with_items(items)))?;
        Ok(default.with_guards(&options))
    }

    pub fn reconstruct(&self, codegen: &mut Codegen) -> SymResult<()> {
        codegen.push(BuildOp::load_global("collections", "defaultdict"));
        match &self.default_factory {
            Some(factory) => codegen.emit(factory)?,
            None => codegen.push(BuildOp::LoadConst(Constant::None)),
        }
        self.base.emit_pairs(codegen)?;
        codegen.push(BuildOp::BuildMap(self.base.len()));
        codegen.push(BuildOp::CallFunction(2));
        Ok(())
    }
}
