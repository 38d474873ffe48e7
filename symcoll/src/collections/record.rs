//! Schema-backed records.
//!
//! Models instances of record classes from external schema libraries (classes
//! that are at once a dataclass and an ordered mapping). Keys are drawn from the
//! class's declared fields; fields left at their default are dropped unless the
//! trace is configured to include them.
use std::rc::Rc;

use indexmap::IndexMap;

use crate::{
    builder::ValueBuilder,
    codegen::Codegen,
    collections::{
        MethodName, expect_args, expect_no_args,
        hash_key::HashKey,
        mapping::{Items, MappingLike, MappingType, SymbolicMapping, call_mapping_method},
        propagate_call, sequence_getitem,
    },
    skip,
    trace::TraceState,
    utils::{
        conf::TraceConfig,
        error::{Error, SymResult},
    },
    value::{
        Kwargs, Value, ValueKind,
        class::{FieldDecl, RuntimeClass},
        constant::Constant,
        origin::Origin,
        raw::RawRecord,
    },
};

/// A constructor argument after binding to a declared field.
#[derive(Debug, Clone)]
pub(crate) enum Bound {
    Given(Value),
    Default(Constant),
}

/// Bind positional and keyword arguments to `fields`, then apply defaults.
///
/// Fails with [`Error::SchemaMismatch`] unless every field ends up bound exactly once.
pub(crate) fn bind_arguments(
    class: &RuntimeClass,
    fields: &[FieldDecl],
    args: &[Value],
    kwargs: &Kwargs,
) -> SymResult<IndexMap<String, Bound>> {
    let mismatch = |found: Vec<String>| Error::SchemaMismatch {
        class: class.qualified_name(),
        expected: fields.iter().map(|f| f.name.clone()).collect(),
        found,
    };
    let given_names = || {
        fields
            .iter()
            .take(args.len())
            .map(|f| f.name.clone())
            .chain(kwargs.keys().cloned())
            .collect::<Vec<_>>()
    };

    if args.len() > fields.len() {
        return Err(mismatch(given_names()));
    }

    let mut bound: IndexMap<String, Bound> = fields
        .iter()
        .zip(args)
        .map(|(field, arg)| (field.name.clone(), Bound::Given(arg.clone())))
        .collect();

    for (name, value) in kwargs {
        if class.field(name).is_none() || bound.contains_key(name) {
            return Err(mismatch(given_names()));
        }
        bound.insert(name.clone(), Bound::Given(value.clone()));
    }

    let mut ordered = IndexMap::with_capacity(fields.len());
    for field in fields {
        let value = match bound.shift_remove(&field.name) {
            Some(value) => value,
            None => match &field.default {
                Some(default) => Bound::Default(default.clone()),
                None => return Err(mismatch(given_names())),
            },
        };
        ordered.insert(field.name.clone(), value);
    }
    Ok(ordered)
}

fn declared_fields(class: &RuntimeClass) -> SymResult<&[FieldDecl]> {
    class.fields.as_deref().ok_or_else(|| {
        Error::unsupported(format!(
            "record class `{}` declares no fields",
            class.qualified_name()
        ))
    })
}

#[derive(Debug, Clone)]
pub struct StructuredRecordMapping {
    base: SymbolicMapping,
    class: Rc<RuntimeClass>,
    include_none: bool,
}

impl MappingLike for StructuredRecordMapping {
    fn base(&self) -> &SymbolicMapping {
        &self.base
    }

    fn with_items(&self, items: Items) -> ValueKind {
        ValueKind::Record(StructuredRecordMapping {
            base: self.base.replace_items(items),
            class: self.class.clone(),
            include_none: self.include_none,
        })
    }
}

impl StructuredRecordMapping {
    /// Whether `class` derives from the record base of a configured schema library.
    pub fn is_matching_class(class: &RuntimeClass, config: &TraceConfig) -> bool {
        config
            .schema_library_for(&class.module)
            .is_some_and(|library| class.is_subclass_of(&library.base_class))
    }

    fn from_items(class: &Rc<RuntimeClass>, items: Items, include_none: bool) -> Self {
        Self {
            base: SymbolicMapping::from_keyed(MappingType::UserClass(class.clone()), items),
            class: class.clone(),
            include_none,
        }
    }

    /// Model a call of the record class with `args` and `kwargs`.
    pub fn create(
        tx: &mut TraceState,
        class: &Rc<RuntimeClass>,
        args: &[Value],
        kwargs: &Kwargs,
    ) -> SymResult<Value> {
        skip::patch_schema_libraries_once(tx.config());
        skip::skip_member(&class.qualified_name(), "__init__");

        let fields = declared_fields(class)?;
        let include_none = tx.config().record_include_none;
        let bound = bind_arguments(class, fields, args, kwargs)?;

        let mut items = Items::new();
        for (name, value) in bound {
            match value {
                Bound::Given(value) => {
                    items.insert(HashKey::str(&name), value);
                }
                Bound::Default(default) if include_none => {
                    if !default.is_literal() {
                        return Err(Error::unsupported(format!(
                            "non-literal default {} for field `{}` of `{}`",
                            default, name, class.name
                        )));
                    }
                    items.insert(HashKey::str(&name), Value::literal(default));
                }
                Bound::Default(_) => {}
            }
        }

        if items.len() == 1 {
            let only_tensor = items
                .values()
                .all(|v| matches!(v.kind(), ValueKind::Tensor { .. }));
            if !only_tensor {
                return Err(Error::unsupported(format!(
                    "iterator-style construction of single-field record `{}`",
                    class.name
                )));
            }
        }

        Ok(Self::from_items(class, items, include_none).into_value(None))
    }

    /// Model a live record instance met for the first time.
    pub fn wrap(
        tx: &mut TraceState,
        record: &RawRecord,
        origin: Option<Origin>,
    ) -> SymResult<Value> {
        let class = &record.class;
        let fields = declared_fields(class)?;
        let include_none = tx.config().record_include_none;

        let mut items = Items::new();
        let mut excluded = Vec::new();
        for field in fields {
            // the constructor may not have set every field yet
            let Some(raw) = record.attrs.get(&field.name) else {
                continue;
            };
            let child_origin = origin.as_ref().map(|o| o.attr(&field.name));
            let value = ValueBuilder::new(tx, child_origin).wrap(raw)?;
            if !raw.is_none() || include_none {
                items.insert(HashKey::str(&field.name), value);
            } else {
                excluded.push(value);
            }
        }

        let value = Self::from_items(class, items, include_none).into_value(origin);
        Ok(value.with_guards(&Value::propagate(&excluded)))
    }

    pub fn class(&self) -> &RuntimeClass {
        &self.class
    }

    pub fn into_value(self, origin: Option<Origin>) -> Value {
        let guards = self.base.guards();
        Value::from_parts(ValueKind::Record(self), origin, guards, true)
    }

    /// Attribute access: present fields read through `__getitem__`; absent ones
    /// fall back to the declared default when defaults are not materialized.
    pub fn var_getattr(&self, tx: &mut TraceState, this: &Value, name: &str) -> SymResult<Value> {
        if self.base.get(&HashKey::str(name)).is_some() {
            return self.call_method(
                tx,
                this,
                MethodName::GetItem,
                &[Value::literal(name)],
                &Kwargs::new(),
            );
        }

        if !self.include_none {
            let default = self.class.field(name).and_then(|f| f.default.as_ref());
            if let Some(default) = default {
                if !default.is_literal() {
                    return Err(Error::unsupported(format!(
                        "non-literal default {} for field `{}` of `{}`",
                        default, name, self.class.name
                    )));
                }
                return Ok(Value::literal(default.clone()).with_guards(this.guards()));
            }
        }

        Err(Error::AttributeNotFound {
            class: self.class.name.clone(),
            name: name.to_string(),
        })
    }

    pub fn call_method(
        &self,
        tx: &mut TraceState,
        this: &Value,
        method: MethodName,
        args: &[Value],
        kwargs: &Kwargs,
    ) -> SymResult<Value> {
        match method {
            MethodName::GetItem => {
                let [key] = expect_args::<1>(this, method, args, kwargs)?;
                if matches!(key.kind(), ValueKind::Constant(Constant::Str(_))) {
                    return call_mapping_method(self, tx, this, method, args, kwargs);
                }
                let options = propagate_call(this, args, kwargs);
                let tuple = self.call_method(tx, this, MethodName::ToTuple, &[], &Kwargs::new())?;
                Ok(sequence_getitem(&tuple, key)?.with_guards(&options))
            }
            MethodName::ToTuple => {
                expect_no_args(this, method, args, kwargs)?;
                let options = propagate_call(this, args, kwargs);
                Ok(Value::tuple(self.base.values().cloned().collect()).with_guards(&options))
            }
            MethodName::SetAttr => {
                call_mapping_method(self, tx, this, MethodName::SetItem, args, kwargs)
            }
            _ => call_mapping_method(self, tx, this, method, args, kwargs),
        }
    }

    pub fn reconstruct(&self, codegen: &mut Codegen) -> SymResult<()> {
        self.base.reconstruct_as_call(codegen, &self.class)
    }
}
