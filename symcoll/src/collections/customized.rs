//! User subclasses of `OrderedDict`.
//!
//! A [`CustomizedMapping`] behaves like the mapping it derives from, except that
//! methods the user class overrides are inlined instead of modelled.
use std::{rc::Rc, str::FromStr};

use log::debug;

use crate::{
    codegen::Codegen,
    collections::{
        MethodName, as_mapping,
        hash_key::HashKey,
        mapping::{Items, MappingLike, MappingType, SymbolicMapping, call_mapping_method},
        propagate_call,
        record::{Bound, bind_arguments},
    },
    magic::CUSTOMIZED_SKIPPED_MEMBERS,
    skip,
    trace::TraceState,
    utils::error::{Error, SymResult},
    value::{
        Kwargs, Value, ValueKind,
        class::{ClassMember, RuntimeClass},
        origin::Origin,
    },
};

#[derive(Debug, Clone)]
pub struct CustomizedMapping {
    base: SymbolicMapping,
    class: Rc<RuntimeClass>,
}

impl MappingLike for CustomizedMapping {
    fn base(&self) -> &SymbolicMapping {
        &self.base
    }

    fn with_items(&self, items: Items) -> ValueKind {
        ValueKind::Customized(CustomizedMapping {
            base: self.base.replace_items(items),
            class: self.class.clone(),
        })
    }
}

impl CustomizedMapping {
    /// An `OrderedDict` subclass that keeps the inherited constructor.
    pub fn is_matching_class(class: &RuntimeClass) -> bool {
        class.is_subclass_of("OrderedDict")
            && !class.defines("__init__")
            && !class.defines("__post_init__")
    }

    pub fn from_items(class: &Rc<RuntimeClass>, items: Items) -> Self {
        Self {
            base: SymbolicMapping::from_keyed(MappingType::UserClass(class.clone()), items),
            class: class.clone(),
        }
    }

    /// Model a call of the class with `args` and `kwargs`.
    ///
    /// Dataclasses bind their fields; other classes accept either keyword
    /// arguments alone or a single mapping to copy.
    pub fn create(
        tx: &mut TraceState,
        class: &Rc<RuntimeClass>,
        args: &[Value],
        kwargs: &Kwargs,
    ) -> SymResult<Value> {
        let qualified = class.qualified_name();
        for member in CUSTOMIZED_SKIPPED_MEMBERS {
            if class.defines(member) {
                skip::skip_member(&qualified, member);
            }
        }

        let mut items = Items::new();
        if let Some(fields) = class.fields.as_deref() {
            for (name, value) in bind_arguments(class, fields, args, kwargs)? {
                let value = match value {
                    Bound::Given(value) => value,
                    Bound::Default(default) if default.is_literal() => Value::literal(default),
                    Bound::Default(default) => {
                        return Err(Error::unsupported(format!(
                            "non-literal default {} for field `{}` of `{}`",
                            default, name, class.name
                        )));
                    }
                };
                items.insert(HashKey::str(&name), value);
            }
        } else if args.is_empty() {
            for (name, value) in kwargs {
                items.insert(HashKey::str(name), value.clone());
            }
        } else if let ([source], true) = (args, kwargs.is_empty()) {
            let mapping = as_mapping(source).ok_or_else(|| {
                Error::unsupported(format!(
                    "`{}` built from a `{}`",
                    class.name,
                    source.type_name()
                ))
            })?;
            items = mapping.items().clone();
        } else {
            return Err(Error::unsupported(format!(
                "`{}` built from {} positional and {} keyword arguments",
                class.name,
                args.len(),
                kwargs.len()
            )));
        }

        debug!("Created `{}` with {} items", qualified, items.len());
        Ok(Self::from_items(class, items).into_value(None))
    }

    pub fn class(&self) -> &RuntimeClass {
        &self.class
    }

    pub fn into_value(self, origin: Option<Origin>) -> Value {
        let guards = self.base.guards();
        Value::from_parts(ValueKind::Customized(self), origin, guards, true)
    }

    /// Dispatch `name`: user overrides of the overridable methods are inlined,
    /// inherited mapping methods are modelled, anything else is unsupported.
    pub fn call_method(
        &self,
        tx: &mut TraceState,
        this: &Value,
        name: &str,
        args: &[Value],
        kwargs: &Kwargs,
    ) -> SymResult<Value> {
        let unsupported = || Error::UnsupportedMethod {
            container: self.class.name.clone(),
            name: name.to_string(),
        };
        let method = MethodName::from_str(name).ok();

        match self.class.member(name) {
            Some(ClassMember::Function(function)) => match method {
                Some(method) if method.is_overridable() => {
                    debug!("Inlining `{}.{}`", self.class.name, name);
                    let options = propagate_call(this, args, kwargs);
                    let call_args: Vec<Value> =
                        std::iter::once(this.clone()).chain(args.iter().cloned()).collect();
                    Ok(tx
                        .inline_user_function(function, call_args, kwargs)?
                        .with_guards(&options))
                }
                _ => Err(unsupported()),
            },
            Some(ClassMember::Attribute(_)) => Err(unsupported()),
            None => match method {
                Some(method) if method.is_mapping_base() => {
                    call_mapping_method(self, tx, this, method, args, kwargs)
                }
                _ => Err(unsupported()),
            },
        }
    }

    pub fn var_getattr(&self, tx: &mut TraceState, this: &Value, name: &str) -> SymResult<Value> {
        if self.base.get(&HashKey::str(name)).is_some() {
            return self.call_method(
                tx,
                this,
                MethodName::GetItem.as_ref(),
                &[Value::literal(name)],
                &Kwargs::new(),
            );
        }
        Err(Error::AttributeNotFound {
            class: self.class.name.clone(),
            name: name.to_string(),
        })
    }

    pub fn reconstruct(&self, codegen: &mut Codegen) -> SymResult<()> {
        self.base.reconstruct_as_call(codegen, &self.class)
    }
}
