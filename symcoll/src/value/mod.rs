//! Abstract values
//!
//! An abstract [`Value`] stands in for a runtime value while a program is being
//! traced. It is immutable and cheap to clone; clones share one identity
//! ([`VarId`]). Mutating a collection never touches an existing value: a new
//! version with a fresh identity is built and the trace state redirects every
//! live reference to it (see [`TraceState::replace_all`](crate::trace::TraceState::replace_all)).
//!
//! Submodules:
//! - `constant`: literal extraction results
//! - `origin`: provenance of values
//! - `guard`: guard conditions attached to values
//! - `class`: runtime class descriptors and inlinable user functions
//! - `raw`: concrete runtime values and the external module registry
use std::rc::Rc;

use indexmap::IndexMap;
use uuid::Uuid;

use crate::{
    collections::{
        customized::CustomizedMapping, mapping::DefaultMapping, mapping::SymbolicMapping,
        record::StructuredRecordMapping, registry::GlobalRegistrySnapshot, set::SymbolicSet,
    },
    utils::error::{Error, SymResult},
    value::{
        class::{RuntimeClass, UserFunction},
        constant::{BuiltinFn, Constant, EnumMember},
        guard::{Guard, GuardSet},
        origin::Origin,
    },
};

pub mod class;
pub mod constant;
pub mod guard;
pub mod origin;
pub mod raw;

/// Keyword arguments of a call, in call order.
pub type Kwargs = IndexMap<String, Value>;

/// Identity of an abstract value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarId(Uuid);

impl VarId {
    fn fresh() -> Self {
        VarId(Uuid::new_v4())
    }
}

impl std::fmt::Display for VarId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", &self.0.simple().to_string()[..8])
    }
}

/// Identity of the shape/dtype placeholder associated with a tensor-like value.
///
/// Two tensor-like values denote the same runtime tensor iff their placeholders
/// are the same.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PlaceholderId(Uuid);

impl PlaceholderId {
    pub fn fresh() -> Self {
        PlaceholderId(Uuid::new_v4())
    }
}

#[derive(Debug, Clone)]
pub enum ValueKind {
    /// A literal constant (see [`Constant::is_literal`]).
    Constant(Constant),
    /// A symbolic number; `hint` is its value in the example inputs.
    SymNumber { hint: Constant },
    /// A tensor-like value. Without a placeholder its identity cannot be checked.
    Tensor { placeholder: Option<PlaceholderId> },
    Tuple(Vec<Value>),
    List(Vec<Value>),
    Builtin(BuiltinFn),
    Enum(EnumMember),
    MethodWrapper(String),
    UserFunction(Rc<UserFunction>),
    Class(Rc<RuntimeClass>),
    Module(String),
    Mapping(SymbolicMapping),
    DefaultMapping(DefaultMapping),
    Set(SymbolicSet),
    Record(StructuredRecordMapping),
    Customized(CustomizedMapping),
    Registry(GlobalRegistrySnapshot),
}

#[derive(Debug)]
struct ValueData {
    id: VarId,
    origin: Option<Origin>,
    guards: GuardSet,
    mutable: bool,
    kind: ValueKind,
}

#[derive(Clone)]
pub struct Value(Rc<ValueData>);

impl Value {
    pub fn new(kind: ValueKind) -> Self {
        Self::from_parts(kind, None, GuardSet::new(), false)
    }

    pub fn from_parts(
        kind: ValueKind,
        origin: Option<Origin>,
        guards: GuardSet,
        mutable: bool,
    ) -> Self {
        Value(Rc::new(ValueData {
            id: VarId::fresh(),
            origin,
            guards,
            mutable,
            kind,
        }))
    }

    /// A literal constant. Non-literal constants are built with their own kind.
    pub fn literal(value: impl Into<Constant>) -> Self {
        let constant = value.into();
        match constant {
            Constant::Tuple(items) => Value::tuple(items.into_iter().map(Value::literal).collect()),
            Constant::Enum(member) => Value::new(ValueKind::Enum(member)),
            Constant::Builtin(builtin) => Value::new(ValueKind::Builtin(builtin)),
            Constant::Method(name) => Value::new(ValueKind::MethodWrapper(name)),
            literal => Value::new(ValueKind::Constant(literal)),
        }
    }

    pub fn none() -> Self {
        Value::literal(Constant::None)
    }

    pub fn tensor(placeholder: PlaceholderId) -> Self {
        Value::new(ValueKind::Tensor {
            placeholder: Some(placeholder),
        })
    }

    pub fn unresolved_tensor() -> Self {
        Value::new(ValueKind::Tensor { placeholder: None })
    }

    pub fn sym_number(hint: impl Into<Constant>) -> Self {
        Value::new(ValueKind::SymNumber { hint: hint.into() })
    }

    pub fn tuple(items: Vec<Value>) -> Self {
        let guards = Value::propagate(&items);
        Value::from_parts(ValueKind::Tuple(items), None, guards, false)
    }

    pub fn list(items: Vec<Value>) -> Self {
        let guards = Value::propagate(&items);
        Value::from_parts(ValueKind::List(items), None, guards, true)
    }

    pub fn builtin(builtin: BuiltinFn) -> Self {
        Value::new(ValueKind::Builtin(builtin))
    }

    pub fn function(function: Rc<UserFunction>) -> Self {
        Value::new(ValueKind::UserFunction(function))
    }

    pub fn class(class: RuntimeClass) -> Self {
        Value::new(ValueKind::Class(Rc::new(class)))
    }

    pub fn id(&self) -> VarId {
        self.0.id
    }

    pub fn origin(&self) -> Option<&Origin> {
        self.0.origin.as_ref()
    }

    pub fn guards(&self) -> &GuardSet {
        &self.0.guards
    }

    pub fn kind(&self) -> &ValueKind {
        &self.0.kind
    }

    pub fn is_mutable(&self) -> bool {
        self.0.mutable
    }

    /// Whether both handles denote the same abstract value.
    pub fn is(&self, other: &Value) -> bool {
        self.id() == other.id()
    }

    /// The same value, now known to come from `origin`.
    pub fn with_origin(&self, origin: Origin) -> Value {
        self.rebuild(|data| data.origin = Some(origin))
    }

    /// The same value flagged as mutable.
    pub fn into_mutable(self) -> Value {
        if self.is_mutable() {
            return self;
        }
        self.rebuild(|data| data.mutable = true)
    }

    /// The same value carrying additional guards.
    pub fn with_guards<'a>(&self, guards: impl IntoIterator<Item = &'a Guard>) -> Value {
        let mut guards = guards.into_iter().peekable();
        if guards.peek().is_none() {
            return self.clone();
        }
        let extra: Vec<Guard> = guards.cloned().collect();
        self.rebuild(|data| data.guards.extend(extra))
    }

    /// The same value (same identity) with different contents. Used when a
    /// nested value is substituted.
    pub(crate) fn with_kind(&self, kind: ValueKind) -> Value {
        self.rebuild(|data| data.kind = kind)
    }

    /// A new version of this value: fresh identity, same origin, guards and mutability.
    pub(crate) fn next_version(&self, kind: ValueKind) -> Value {
        Value::from_parts(
            kind,
            self.0.origin.clone(),
            self.0.guards.clone(),
            self.0.mutable,
        )
    }

    fn rebuild(&self, f: impl FnOnce(&mut ValueData)) -> Value {
        let mut data = ValueData {
            id: self.0.id,
            origin: self.0.origin.clone(),
            guards: self.0.guards.clone(),
            mutable: self.0.mutable,
            kind: self.0.kind.clone(),
        };
        f(&mut data);
        Value(Rc::new(data))
    }

    /// Union of the guards carried by `values`.
    pub fn propagate<'a>(values: impl IntoIterator<Item = &'a Value>) -> GuardSet {
        values
            .into_iter()
            .flat_map(|v| v.guards().iter().cloned())
            .collect()
    }

    /// Literal extraction. Fails unless the value is a compile-time constant.
    pub fn as_constant(&self) -> SymResult<Constant> {
        match self.kind() {
            ValueKind::Constant(c) => Ok(c.clone()),
            ValueKind::Tuple(items) => Ok(Constant::Tuple(
                items
                    .iter()
                    .map(Value::as_constant)
                    .collect::<SymResult<_>>()?,
            )),
            ValueKind::Enum(member) => Ok(Constant::Enum(member.clone())),
            ValueKind::Builtin(builtin) => Ok(Constant::Builtin(*builtin)),
            ValueKind::MethodWrapper(name) => Ok(Constant::Method(name.clone())),
            _ => Err(Error::NotALiteral {
                kind: self.type_name(),
            }),
        }
    }

    pub fn is_python_constant(&self) -> bool {
        match self.kind() {
            ValueKind::DefaultMapping(m) => m.is_python_constant(),
            _ => self.as_constant().is_ok(),
        }
    }

    /// Name of the runtime type this value stands for.
    pub fn type_name(&self) -> String {
        match self.kind() {
            ValueKind::Constant(c) => c.type_name(),
            ValueKind::SymNumber { hint } => format!("Sym{}", hint.type_name()),
            ValueKind::Tensor { .. } => "Tensor".into(),
            ValueKind::Tuple(_) => "tuple".into(),
            ValueKind::List(_) => "list".into(),
            ValueKind::Builtin(_) => "builtin_function_or_method".into(),
            ValueKind::Enum(member) => member.class.clone(),
            ValueKind::MethodWrapper(_) => "method-wrapper".into(),
            ValueKind::UserFunction(_) => "function".into(),
            ValueKind::Class(_) => "type".into(),
            ValueKind::Module(_) => "module".into(),
            ValueKind::Mapping(m) => m.mapping_type().to_string(),
            ValueKind::DefaultMapping(_) => "defaultdict".into(),
            ValueKind::Set(_) => "set".into(),
            ValueKind::Record(r) => r.class().name.clone(),
            ValueKind::Customized(c) => c.class().name.clone(),
            ValueKind::Registry(_) => "dict".into(),
        }
    }

    /// Items produced by iterating over this value.
    pub fn unpack_sequence(&self) -> SymResult<Vec<Value>> {
        let guards = self.guards();
        let items = match self.kind() {
            ValueKind::Tuple(items) | ValueKind::List(items) => items.clone(),
            ValueKind::Set(set) => set.items().to_vec(),
            _ => match crate::collections::as_mapping(self) {
                Some(mapping) => mapping.keys().cloned().collect(),
                None => {
                    return Err(Error::unsupported(format!(
                        "cannot iterate over a value of kind `{}`",
                        self.type_name()
                    )));
                }
            },
        };
        Ok(items.into_iter().map(|v| v.with_guards(guards)).collect())
    }
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Value")
            .field("id", &self.0.id)
            .field("origin", &self.0.origin)
            .field("mutable", &self.0.mutable)
            .field("kind", &self.0.kind)
            .finish()
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.as_constant() {
            Ok(c) => write!(f, "{}", c),
            Err(_) => match self.origin() {
                Some(origin) => write!(f, "<{} {}>", self.type_name(), origin),
                None => write!(f, "<{} {}>", self.type_name(), self.id()),
            },
        }
    }
}
