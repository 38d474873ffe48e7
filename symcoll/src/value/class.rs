//! Descriptors of runtime classes and user functions seen during tracing.
use std::rc::Rc;

use indexmap::IndexMap;

use crate::{
    trace::TraceState,
    utils::error::SymResult,
    value::{Kwargs, Value, constant::Constant},
};

type FunctionBody = dyn Fn(&mut TraceState, &[Value], &Kwargs) -> SymResult<Value>;

/// A user function the interpreter can inline.
///
/// The body stands in for interpreting the function's code: it receives the
/// trace state so it may itself call methods on abstract values.
pub struct UserFunction {
    pub name: String,
    body: Box<FunctionBody>,
}

impl UserFunction {
    pub fn new(
        name: impl Into<String>,
        body: impl Fn(&mut TraceState, &[Value], &Kwargs) -> SymResult<Value> + 'static,
    ) -> Rc<Self> {
        Rc::new(Self {
            name: name.into(),
            body: Box::new(body),
        })
    }

    pub(crate) fn invoke(
        &self,
        tx: &mut TraceState,
        args: &[Value],
        kwargs: &Kwargs,
    ) -> SymResult<Value> {
        (self.body)(tx, args, kwargs)
    }
}

impl std::fmt::Debug for UserFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<function {}>", self.name)
    }
}

/// A field declared by a record class, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDecl {
    pub name: String,
    pub default: Option<Constant>,
}

impl FieldDecl {
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: None,
        }
    }

    pub fn with_default(name: impl Into<String>, default: impl Into<Constant>) -> Self {
        Self {
            name: name.into(),
            default: Some(default.into()),
        }
    }
}

#[derive(Debug, Clone)]
pub enum ClassMember {
    Function(Rc<UserFunction>),
    Attribute(Constant),
}

/// A runtime class as far as the collection model needs to know it.
///
/// `bases` lists the names of every base class, nearest first, as they appear in
/// the method resolution order. `members` holds what the class (or one of its
/// user-defined bases) defines itself; anything inherited from builtin bases is
/// absent.
#[derive(Debug, Clone)]
pub struct RuntimeClass {
    pub module: String,
    pub name: String,
    pub bases: Vec<String>,
    pub fields: Option<Vec<FieldDecl>>,
    pub members: IndexMap<String, ClassMember>,
}

impl RuntimeClass {
    pub fn new(module: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            name: name.into(),
            bases: Vec::new(),
            fields: None,
            members: IndexMap::new(),
        }
    }

    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.bases.push(base.into());
        self
    }

    /// Declare dataclass-style fields.
    pub fn with_fields(mut self, fields: impl IntoIterator<Item = FieldDecl>) -> Self {
        self.fields = Some(fields.into_iter().collect());
        self
    }

    pub fn with_method(mut self, name: impl Into<String>, function: Rc<UserFunction>) -> Self {
        self.members
            .insert(name.into(), ClassMember::Function(function));
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Constant>) -> Self {
        self.members
            .insert(name.into(), ClassMember::Attribute(value.into()));
        self
    }

    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.module, self.name)
    }

    pub fn is_subclass_of(&self, base: &str) -> bool {
        self.name == base || self.bases.iter().any(|b| b == base)
    }

    pub fn defines(&self, member: &str) -> bool {
        self.members.contains_key(member)
    }

    pub fn member(&self, member: &str) -> Option<&ClassMember> {
        self.members.get(member)
    }

    pub fn field(&self, name: &str) -> Option<&FieldDecl> {
        self.fields.as_ref()?.iter().find(|f| f.name == name)
    }
}

impl PartialEq for RuntimeClass {
    fn eq(&self, other: &Self) -> bool {
        self.module == other.module && self.name == other.name
    }
}
